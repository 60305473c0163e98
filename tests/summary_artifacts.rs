use ml_ingest::datasource::DataSource;
use ml_ingest::summary::{summarize, write_summary_artifacts};
use ml_ingest::types::{sample_table, DataSet, DataType, Field, Schema, Value};

#[test]
fn summary_artifacts_are_written_through_the_facade() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("eda");
    let source = DataSource::new();

    let summary = summarize(&sample_table());
    let written = write_summary_artifacts(&summary, &out, &source).unwrap();

    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "preview.csv",
            "shape.csv",
            "describe.csv",
            "hist_id.csv",
            "hist_score.csv",
            "correlation.csv"
        ]
    );
    assert!(written.iter().all(|p| p.exists()));

    let shape = source
        .read_table(&out.join("shape.csv").to_string_lossy())
        .unwrap();
    assert_eq!(shape.rows, vec![vec![Value::Int64(3), Value::Int64(3)]]);

    let hist = source
        .read_table(&out.join("hist_score.csv").to_string_lossy())
        .unwrap();
    assert_eq!(hist.row_count(), 10);
    let total: i64 = hist
        .column_values("count")
        .unwrap()
        .into_iter()
        .map(|v| match v {
            Value::Int64(n) => *n,
            _ => 0,
        })
        .sum();
    assert_eq!(total, 3);
}

#[test]
fn categorical_only_table_has_no_numeric_artifacts() {
    let schema = Schema::new(vec![Field::new("city", DataType::Utf8)]);
    let rows = ["Oslo", "Lima", "Oslo", ""]
        .into_iter()
        .map(|c| {
            if c.is_empty() {
                vec![Value::Null]
            } else {
                vec![Value::Utf8(c.to_string())]
            }
        })
        .collect();
    let table = DataSet::new(schema, rows);

    let summary = summarize(&table);
    assert!(summary.histograms.is_empty());
    assert!(summary.correlation.is_none());

    let d = &summary.describe;
    let stat = |label: &str| -> Value {
        d.rows
            .iter()
            .find(|r| r[0] == Value::Utf8(label.to_string()))
            .map(|r| r[1].clone())
            .unwrap()
    };
    assert_eq!(d.row_count(), 5);
    assert_eq!(stat("count"), Value::Utf8("3".into()));
    assert_eq!(stat("unique"), Value::Utf8("2".into()));
    assert_eq!(stat("top"), Value::Utf8("Oslo".into()));
    assert_eq!(stat("freq"), Value::Utf8("2".into()));
    assert_eq!(stat("nulls"), Value::Utf8("1".into()));

    let dir = tempfile::tempdir().unwrap();
    let written = write_summary_artifacts(&summary, dir.path(), &DataSource::new()).unwrap();
    assert_eq!(written.len(), 3);
}
