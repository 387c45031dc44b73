//! SQLite sessions over rusqlite

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection as RusqliteConnection, OpenFlags, params_from_iter};
use std::sync::Arc;
use tabula_core::{
    ColumnMeta, Connection, QueryResult, Result, Row, SchemaIntrospection, StatementResult,
    TabulaError, Transaction, Value,
};

/// Convert a rusqlite error into a `TabulaError`, keeping the extended result code.
pub(crate) fn map_sqlite_error(context: &str, error: rusqlite::Error) -> TabulaError {
    match &error {
        rusqlite::Error::SqliteFailure(failure, _) => TabulaError::Database {
            message: format!("{}: {}", context, error),
            code: Some(failure.extended_code.to_string()),
        },
        _ => TabulaError::Query(format!("{}: {}", context, error)),
    }
}

/// A rusqlite connection behind a mutex, shared with its open transaction
pub struct SqliteConnection {
    conn: Arc<Mutex<RusqliteConnection>>,
}

impl SqliteConnection {
    /// Open a SQLite database
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path = %path, "opening SQLite database");
        let expanded_path = Self::expand_path(path)?;

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory()
                .map_err(|e| map_sqlite_error("failed to open in-memory database", e))?
        } else {
            if !expanded_path.starts_with("file:") {
                let file_path = std::path::Path::new(&expanded_path);
                if let Some(parent) = file_path.parent()
                    && !parent.exists()
                {
                    return Err(TabulaError::Connection(format!(
                        "parent directory does not exist: {}",
                        parent.display()
                    )));
                }
            }

            RusqliteConnection::open_with_flags(&expanded_path, flags).map_err(|e| {
                map_sqlite_error(
                    &format!("failed to open SQLite database at '{}'", expanded_path),
                    e,
                )
            })?
        };

        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| map_sqlite_error("failed to enable foreign keys", e))?;
        if path != ":memory:" {
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|e| map_sqlite_error("failed to set journal mode", e))?;
        }
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| map_sqlite_error("failed to set synchronous mode", e))?;

        tracing::debug!(path = %expanded_path, "SQLite database connection established");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Expand `~/` to the home directory and make relative paths absolute
    fn expand_path(path: &str) -> Result<String> {
        if path == ":memory:" || path.starts_with("file:") {
            return Ok(path.to_string());
        }

        let expanded = if let Some(rest) = path.strip_prefix("~/") {
            let home = dirs::home_dir().ok_or_else(|| {
                TabulaError::Configuration("unable to determine home directory".into())
            })?;
            home.join(rest).to_string_lossy().to_string()
        } else if path.starts_with('~') {
            return Err(TabulaError::Configuration(
                "user-specific home directories (~user) are not supported".into(),
            ));
        } else {
            path.to_string()
        };

        let path_buf = std::path::PathBuf::from(&expanded);
        if path_buf.is_relative() {
            Ok(std::env::current_dir()?
                .join(path_buf)
                .to_string_lossy()
                .to_string())
        } else {
            Ok(expanded)
        }
    }
}

/// SQLite storage class for a value; dates and JSON are stored as text
fn to_sql_value(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;

    match value {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(i64::from(*b)),
        Value::Int16(i) => Sql::Integer(i64::from(*i)),
        Value::Int32(i) => Sql::Integer(i64::from(*i)),
        Value::Int64(i) => Sql::Integer(*i),
        Value::Float32(f) => Sql::Real(f64::from(*f)),
        Value::Float64(f) => Sql::Real(*f),
        Value::Bytes(b) => Sql::Blob(b.clone()),
        Value::DateTime(dt) => Sql::Text(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        Value::DateTimeUtc(dt) => Sql::Text(dt.to_rfc3339()),
        Value::Json(serde_json::Value::String(s)) => Sql::Text(s.clone()),
        Value::Decimal(text) | Value::String(text) => Sql::Text(text.clone()),
        other => Sql::Text(other.to_string()),
    }
}

fn bind(params: &[Value]) -> Vec<rusqlite::types::Value> {
    params.iter().map(to_sql_value).collect()
}

fn from_sql_value(value: rusqlite::types::ValueRef<'_>) -> Value {
    use rusqlite::types::ValueRef;

    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

fn run_query(conn: &RusqliteConnection, sql: &str, params: &[Value]) -> Result<QueryResult> {
    let started = std::time::Instant::now();
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| map_sqlite_error("failed to prepare query", e))?;

    // decl_type is the type written in CREATE TABLE, if any
    let columns: Vec<ColumnMeta> = stmt
        .columns()
        .iter()
        .enumerate()
        .map(|(ordinal, col)| ColumnMeta {
            name: col.name().to_string(),
            data_type: col.decl_type().unwrap_or("DYNAMIC").to_string(),
            nullable: true,
            ordinal,
        })
        .collect();
    let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

    let mut cursor = stmt
        .query(params_from_iter(bind(params)))
        .map_err(|e| map_sqlite_error("failed to execute query", e))?;

    let mut rows = Vec::new();
    while let Some(row) = cursor
        .next()
        .map_err(|e| map_sqlite_error("failed to fetch row", e))?
    {
        let values = (0..names.len())
            .map(|idx| row.get_ref(idx).map(from_sql_value))
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| map_sqlite_error("failed to read column", e))?;
        rows.push(Row::new(names.clone(), values));
    }

    tracing::debug!(
        row_count = rows.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "query finished"
    );
    Ok(QueryResult { columns, rows })
}

fn run_execute(conn: &RusqliteConnection, sql: &str, params: &[Value]) -> Result<StatementResult> {
    let affected = conn
        .execute(sql, params_from_iter(bind(params)))
        .map_err(|e| map_sqlite_error("failed to execute statement", e))?;

    tracing::debug!(affected_rows = affected, "statement finished");
    Ok(StatementResult::affected(affected as u64))
}

#[async_trait]
impl Connection for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let conn = self.conn.lock();
        run_execute(&conn, sql, params)
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let conn = self.conn.lock();
        run_query(&conn, sql, params)
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        tracing::debug!("beginning SQLite transaction");
        {
            let conn = self.conn.lock();
            conn.execute_batch("BEGIN DEFERRED")
                .map_err(|e| map_sqlite_error("failed to begin transaction", e))?;
        }
        Ok(Box::new(SqliteTransaction {
            conn: Arc::clone(&self.conn),
            finished: false,
        }))
    }

    async fn server_version(&self) -> Result<String> {
        Ok(format!("SQLite {}", rusqlite::version()))
    }

    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        Some(self)
    }
}

/// SQLite transaction wrapper.
///
/// Issues raw `BEGIN DEFERRED` / `COMMIT` / `ROLLBACK` so it can share the
/// connection mutex without rusqlite's borrow-scoped `Transaction`.
pub struct SqliteTransaction {
    conn: Arc<Mutex<RusqliteConnection>>,
    finished: bool,
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("SQLite transaction dropped without commit or rollback, rolling back");
            let conn = self.conn.lock();
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                tracing::error!(error = %e, "automatic rollback on drop failed");
            }
        }
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("committing SQLite transaction");
        let outcome = self.conn.lock().execute_batch("COMMIT");
        match outcome {
            Ok(()) => {
                self.finished = true;
                Ok(())
            }
            // a failed COMMIT leaves the transaction open; Drop rolls it back
            Err(e) => Err(map_sqlite_error("failed to commit transaction", e)),
        }
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("rolling back SQLite transaction");
        let outcome = self.conn.lock().execute_batch("ROLLBACK");
        self.finished = true;
        outcome.map_err(|e| map_sqlite_error("failed to roll back transaction", e))
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing query in SQLite transaction");
        let conn = self.conn.lock();
        run_query(&conn, sql, params)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing statement in SQLite transaction");
        let conn = self.conn.lock();
        run_execute(&conn, sql, params)
    }
}
