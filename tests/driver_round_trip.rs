use std::sync::Arc;

use ml_ingest::config::SourceConfig;
use ml_ingest::datasource::{DataSource, SourceRequest};
use ml_ingest::sources::{
    CsvDriver, JoblibDriver, JsonDriver, LocalObjectStore, MemoryKeyValueStore, MemoryQueue,
    PickleDriver, SourceDriver, SqlDriver,
};
use ml_ingest::types::{sample_table, DataSet, DataType, Field, Schema, Value};
use ml_ingest::Error;

fn location(dir: &tempfile::TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

fn with_nulls_and_bools() -> DataSet {
    let schema = Schema::new(vec![
        Field::new("id", DataType::Int64),
        Field::new("active", DataType::Bool),
        Field::new("note", DataType::Utf8),
    ]);
    DataSet::new(
        schema,
        vec![
            vec![Value::Int64(1), Value::Bool(true), Value::Utf8("first".into())],
            vec![Value::Int64(2), Value::Bool(false), Value::Null],
        ],
    )
}

#[test]
fn file_drivers_round_trip_the_sample_table() {
    let dir = tempfile::tempdir().unwrap();
    let drivers: Vec<(Box<dyn SourceDriver>, &str)> = vec![
        (Box::new(CsvDriver::new(SourceConfig::default())), "t.csv"),
        (Box::new(JsonDriver::new(SourceConfig::default())), "t.json"),
        (
            Box::new(JsonDriver::new(SourceConfig::default().with("lines", true))),
            "t_lines.json",
        ),
        (Box::new(PickleDriver::new(SourceConfig::default())), "t.pkl"),
        (Box::new(JoblibDriver::new(SourceConfig::default())), "t.joblib"),
        (
            Box::new(JoblibDriver::new(SourceConfig::default().with("compress", 0))),
            "t_plain.joblib",
        ),
    ];

    for (driver, name) in drivers {
        let loc = location(&dir, name);
        let written = driver.write_sample_table(&loc).unwrap();
        assert_eq!(written, sample_table());
        assert_eq!(driver.read(&loc).unwrap(), sample_table(), "round trip through {name}");
    }
}

#[test]
fn nulls_and_bools_survive_text_formats() {
    let dir = tempfile::tempdir().unwrap();
    let source = DataSource::new();
    for name in ["nb.csv", "nb.json", "nb.pkl", "nb.joblib"] {
        let loc = location(&dir, name);
        source.write_table(&with_nulls_and_bools(), &loc).unwrap();
        assert_eq!(source.read_table(&loc).unwrap(), with_nulls_and_bools(), "{name}");
    }
}

#[test]
fn writes_create_missing_directories() {
    let dir = tempfile::tempdir().unwrap();
    let source = DataSource::new();
    for ext in ["csv", "json", "pkl", "joblib"] {
        let loc = location(&dir, &format!("newdir/sub/{ext}/file.{ext}"));
        source.write_table(&sample_table(), &loc).unwrap();
        assert!(std::path::Path::new(&loc).exists());
        // Second write over the same path is fine.
        source.write_table(&sample_table(), &loc).unwrap();
    }
}

#[test]
fn joblib_compression_shrinks_repetitive_tables() {
    let dir = tempfile::tempdir().unwrap();
    let schema = Schema::new(vec![Field::new("text", DataType::Utf8)]);
    let rows = (0..500).map(|_| vec![Value::Utf8("repeated value".into())]).collect();
    let table = DataSet::new(schema, rows);

    let plain = location(&dir, "plain.joblib");
    let packed = location(&dir, "packed.joblib");
    JoblibDriver::new(SourceConfig::default().with("compress", 0))
        .write(&table, &plain)
        .unwrap();
    JoblibDriver::new(SourceConfig::default().with("compress", 9))
        .write(&table, &packed)
        .unwrap();

    let plain_len = std::fs::metadata(&plain).unwrap().len();
    let packed_len = std::fs::metadata(&packed).unwrap().len();
    assert!(packed_len < plain_len);
    // Either file reads back with a default-configured driver.
    let reader = JoblibDriver::new(SourceConfig::default());
    assert_eq!(reader.read(&plain).unwrap(), table);
    assert_eq!(reader.read(&packed).unwrap(), table);
}

#[test]
fn sql_round_trip_stores_bools_as_integers() {
    let dir = tempfile::tempdir().unwrap();
    let config = SourceConfig::default()
        .with("database", location(&dir, "db/app.sqlite"))
        .with("table", "people");
    let driver = SqlDriver::new(config.clone()).unwrap();
    assert!(driver.canonical_location().unwrap().ends_with("app.sqlite.people"));

    driver.write_sample_table("").unwrap();
    assert_eq!(driver.read("").unwrap(), sample_table());

    let source = DataSource::new();
    let request = SourceRequest::of_kind("sqlite", config);
    source.write(&with_nulls_and_bools(), &request).unwrap();
    let back = source.read(&request).unwrap();
    assert_eq!(back.rows[0][1], Value::Int64(1));
    assert_eq!(back.rows[1][1], Value::Int64(0));
    assert_eq!(back.rows[1][2], Value::Null);
}

#[test]
fn sql_query_and_append() {
    let dir = tempfile::tempdir().unwrap();
    let db = location(&dir, "q.sqlite");
    let source = DataSource::new();

    let append = SourceRequest::of_kind(
        "sql",
        SourceConfig::default()
            .with("database", db.clone())
            .with("table", "people")
            .with_write_option("if_exists", "append"),
    );
    source.write(&sample_table(), &append).unwrap();
    source.write(&sample_table(), &append).unwrap();

    let query = SourceRequest::of_kind(
        "sql",
        SourceConfig::default()
            .with("database", db)
            .with("query", "SELECT name FROM people WHERE score > 80 ORDER BY name"),
    );
    let out = source.read(&query).unwrap();
    assert_eq!(out.row_count(), 4);
    assert_eq!(out.rows[0], vec![Value::Utf8("Alice".into())]);
}

#[test]
fn object_store_round_trip_via_facade() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalObjectStore::new(dir.path()));
    let source = DataSource::new().with_object_store(store);

    for key in ["exports/people.csv", "exports/people.json"] {
        let request = SourceRequest::of_kind("s3", SourceConfig::default().with("bucket", "ml"))
            .with_location(key);
        source.write(&sample_table(), &request).unwrap();
        assert!(dir.path().join("ml").join(key).exists());
        assert_eq!(source.read(&request).unwrap(), sample_table(), "{key}");
    }
}

#[test]
fn object_store_defaults_to_a_local_root_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = SourceConfig::default()
        .with("bucket", "b")
        .with("root", location(&dir, "store"))
        .with("file_type", "json");
    let request = SourceRequest::of_kind("object_store", config).with_location("obj");
    let source = DataSource::new();
    source.write(&sample_table(), &request).unwrap();
    assert!(dir.path().join("store/b/obj").exists());
    assert_eq!(source.read(&request).unwrap(), sample_table());
}

#[test]
fn key_value_round_trip_via_facade() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let source = DataSource::new().with_key_value(store.clone());
    let request = SourceRequest::of_kind("redis", SourceConfig::default()).with_location("people");

    source.write(&sample_table(), &request).unwrap();
    assert_eq!(store.len(), 3);
    assert_eq!(source.read(&request).unwrap(), sample_table());
}

#[test]
fn queue_reads_are_bounded_and_writes_fail() {
    let queue = Arc::new(MemoryQueue::new());
    for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
        queue
            .publish("events", format!(r#"{{"id": {id}, "name": "{name}"}}"#))
            .unwrap();
    }
    let source = DataSource::new().with_queue(queue.clone());
    let request = SourceRequest::of_kind(
        "kafka",
        SourceConfig::default()
            .with("topic", "events")
            .with("max_messages", 2)
            .with("poll_timeout_ms", 10),
    );

    let first = source.read(&request).unwrap();
    assert_eq!(first.row_count(), 2);
    let rest = source.read(&request).unwrap();
    assert_eq!(rest.rows, vec![vec![Value::Int64(3), Value::Utf8("c".into())]]);
    assert_eq!(source.read(&request).unwrap().row_count(), 0);

    let err = source.write(&sample_table(), &request).unwrap_err();
    match err {
        Error::DataSource(e) => assert!(e.is_write()),
        other => panic!("expected a data source error, got {other:?}"),
    }
}

#[test]
fn unknown_options_are_backend_errors() {
    let dir = tempfile::tempdir().unwrap();
    let loc = location(&dir, "o.csv");
    let source = DataSource::new();
    source.write_table(&sample_table(), &loc).unwrap();

    let request = SourceRequest::at(loc).with_config(SourceConfig::default().with_option("bogus", 1));
    let err = source.read(&request).unwrap_err();
    assert!(err.to_string().contains("bogus"));
}
