//! Live connections and the transactions they open

use crate::{QueryResult, Result, SchemaIntrospection, StatementResult, TabulaError, Value};
use async_trait::async_trait;

/// One open session with a database server or file.
///
/// Parameters are positional; placeholders follow the driver's dialect
/// (`$1` for PostgreSQL, `?` for SQLite).
#[async_trait]
pub trait Connection: Send + Sync {
    /// Backend name as the server reports it ("postgresql", "sqlite")
    fn driver_name(&self) -> &str;

    /// Run a statement and report how many rows it touched
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Run a statement and collect every row it returns
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Start a transaction; dropping it uncommitted rolls back
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>>;

    /// Server version string as reported by the database
    async fn server_version(&self) -> Result<String> {
        Err(TabulaError::NotSupported(format!(
            "server version is not available for {}",
            self.driver_name()
        )))
    }

    /// Catalog access, for drivers that provide it
    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        None
    }
}

/// Statements run through a `Transaction` become visible together on
/// `commit`, or not at all. An uncommitted transaction rolls back when dropped.
#[async_trait]
pub trait Transaction: Send + Sync {
    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;
}
