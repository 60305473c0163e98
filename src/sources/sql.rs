//! Relational-database driver (SQLite).
//!
//! Config keys: `database` (file path, required), `table`, `query`. Reads run `query`, or
//! `SELECT * FROM "<table>"` when no query is set; the table comes from the `table` key or,
//! failing that, the location. Writes honor the `if_exists` write option (`replace`, `append`,
//! `fail`).

use std::path::{Path, PathBuf};

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};

use crate::config::{opt_str, SourceConfig};
use crate::error::{SourceError, SourceResult};
use crate::infer;
use crate::types::{DataSet, DataType, Value};

use super::{ensure_parent_dir, SourceDriver, SourceKind};

const BACKEND: &str = "sql";

/// What to do when the destination table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfExists {
    Replace,
    Append,
    Fail,
}

/// Reads query results from and writes tables to a SQLite database.
#[derive(Debug, Clone)]
pub struct SqlDriver {
    config: SourceConfig,
    database: PathBuf,
    table: Option<String>,
}

impl SqlDriver {
    /// Build the driver. The config's location is normalized to `<database>.<table>` when both
    /// are known and no location was given.
    pub fn new(mut config: SourceConfig) -> SourceResult<Self> {
        let database = config.required_str(BACKEND, "database")?.to_string();
        let table = config.str_key(BACKEND, "table")?.map(str::to_string);
        if config.location.is_none() {
            if let Some(table) = &table {
                config.location = Some(format!("{database}.{table}"));
            }
        }
        Ok(Self {
            config,
            database: PathBuf::from(database),
            table,
        })
    }

    /// Canonical identifier of the configured table, if any.
    pub fn canonical_location(&self) -> Option<&str> {
        self.config.location.as_deref()
    }

    fn table_for<'a>(&'a self, location: &'a str) -> SourceResult<&'a str> {
        match self.table.as_deref() {
            Some(table) => Ok(table),
            None if !location.is_empty() => Ok(location),
            None => Err(SourceError::MissingConfig {
                backend: BACKEND,
                key: "table".to_string(),
            }),
        }
    }

    fn if_exists(&self) -> SourceResult<IfExists> {
        let options = &self.config.write_options;
        for key in options.keys() {
            if key != "if_exists" && key != "index" {
                return Err(SourceError::InvalidOption {
                    backend: BACKEND,
                    option: key.clone(),
                    message: "not a recognized sql write option".to_string(),
                });
            }
        }
        match opt_str(options, BACKEND, "if_exists")? {
            None | Some("replace") => Ok(IfExists::Replace),
            Some("append") => Ok(IfExists::Append),
            Some("fail") => Ok(IfExists::Fail),
            Some(other) => Err(SourceError::InvalidOption {
                backend: BACKEND,
                option: "if_exists".to_string(),
                message: format!("expected replace, append or fail, got '{other}'"),
            }),
        }
    }
}

impl SourceDriver for SqlDriver {
    fn kind(&self) -> SourceKind {
        SourceKind::Sql
    }

    fn read(&self, location: &str) -> SourceResult<DataSet> {
        if let Some(key) = self.config.options.keys().next() {
            return Err(SourceError::InvalidOption {
                backend: BACKEND,
                option: key.clone(),
                message: "not a recognized sql read option".to_string(),
            });
        }
        let query = match self.config.str_key(BACKEND, "query")? {
            Some(q) => q.to_string(),
            None => format!("SELECT * FROM {}", quote_ident(self.table_for(location)?)),
        };

        // Read-only open: a missing database is an error rather than a new empty file.
        let conn = Connection::open_with_flags(&self.database, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        query_table(&conn, &query)
    }

    fn write(&self, table: &DataSet, location: &str) -> SourceResult<()> {
        let if_exists = self.if_exists()?;
        let name = self.table_for(location)?;
        ensure_parent_dir(Path::new(&self.database))?;

        let mut conn = Connection::open(&self.database)?;
        let tx = conn.transaction()?;
        let exists: i64 = tx.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        let exists = exists > 0;

        match (if_exists, exists) {
            (IfExists::Fail, true) => {
                return Err(SourceError::Backend {
                    backend: BACKEND,
                    message: format!("table '{name}' already exists"),
                });
            }
            (IfExists::Append, true) => {}
            (IfExists::Replace, true) => {
                tx.execute(&format!("DROP TABLE {}", quote_ident(name)), ())?;
                tx.execute(&create_table_sql(name, table), ())?;
            }
            (_, false) => {
                tx.execute(&create_table_sql(name, table), ())?;
            }
        }

        {
            let mut stmt = tx.prepare(&insert_sql(name, table))?;
            for row in &table.rows {
                stmt.execute(params_from_iter(row.iter().map(to_sql_value)))?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

/// Run `query` and collect the result set into a [`DataSet`], unifying column types.
pub fn query_table(conn: &Connection, query: &str) -> SourceResult<DataSet> {
    let mut stmt = conn.prepare(query)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); names.len()];

    let mut rows = stmt.query(())?;
    while let Some(row) = rows.next()? {
        for (i, column) in columns.iter_mut().enumerate() {
            column.push(from_sql_value(row.get_ref(i)?));
        }
    }
    Ok(infer::from_columns(names, columns))
}

fn from_sql_value(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(t) => Value::Utf8(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Utf8(b.iter().map(|byte| format!("{byte:02x}")).collect()),
    }
}

fn to_sql_value(v: &Value) -> SqlValue {
    match v {
        Value::Null => SqlValue::Null,
        Value::Int64(i) => SqlValue::Integer(*i),
        Value::Float64(f) => SqlValue::Real(*f),
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Utf8(s) => SqlValue::Text(s.clone()),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(ty: DataType) -> &'static str {
    match ty {
        DataType::Int64 | DataType::Bool => "INTEGER",
        DataType::Float64 => "REAL",
        DataType::Utf8 => "TEXT",
    }
}

fn create_table_sql(name: &str, table: &DataSet) -> String {
    let columns: Vec<String> = table
        .schema
        .fields
        .iter()
        .map(|f| format!("{} {}", quote_ident(&f.name), sql_type(f.data_type)))
        .collect();
    format!("CREATE TABLE {} ({})", quote_ident(name), columns.join(", "))
}

fn insert_sql(name: &str, table: &DataSet) -> String {
    let columns: Vec<String> = table.schema.field_names().map(quote_ident).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(name),
        columns.join(", "),
        placeholders.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_is_normalized_from_database_and_table() {
        let cfg = SourceConfig::default()
            .with("database", "db/app.sqlite")
            .with("table", "people");
        let driver = SqlDriver::new(cfg).unwrap();
        assert_eq!(driver.canonical_location(), Some("db/app.sqlite.people"));
    }

    #[test]
    fn database_key_is_required() {
        let err = SqlDriver::new(SourceConfig::default()).unwrap_err();
        assert!(err.to_string().contains("missing required config key 'database'"));
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn in_memory_query_unifies_column_types() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (a, b); INSERT INTO t VALUES (1, 'x'); INSERT INTO t VALUES (2.5, NULL);",
        )
        .unwrap();
        let ds = query_table(&conn, "SELECT a, b FROM t").unwrap();
        assert_eq!(ds.schema.fields[0].data_type, DataType::Float64);
        assert_eq!(ds.rows[0], vec![Value::Float64(1.0), Value::Utf8("x".into())]);
        assert_eq!(ds.rows[1], vec![Value::Float64(2.5), Value::Null]);
    }
}
