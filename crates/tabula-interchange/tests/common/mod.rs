//! Shared fixtures for transfer tests
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::{Arc, Once};
use tabula_core::{
    ColumnInfo, Connection, ConnectionConfig, ConnectionSource, PrimaryKeyInfo, QueryResult,
    Result, SchemaIntrospection, StatementResult, TableInfo, TabulaError, Transaction, Value,
};
use tabula_drivers::DriverRegistry;
use tabula_services::{RowStore, SchemaIntrospector};
use tabula_interchange::JsonTransfer;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// What happened on the mock, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Query(String),
    Begin,
    Execute { sql: String, params: Vec<Value> },
    Commit,
    Rollback,
}

type EventLog = Arc<Mutex<Vec<Event>>>;

/// One table whose columns are served through `SchemaIntrospection`.
/// Inserts inside a transaction can be told to fail from a given call on.
pub struct MockConnection {
    columns: Vec<String>,
    fail_from_insert: Option<usize>,
    events: EventLog,
}

impl MockConnection {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            fail_from_insert: None,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail the `n`th insert (0-based) and every one after it
    pub fn failing_insert(mut self, n: usize) -> Self {
        self.fail_from_insert = Some(n);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn executes(&self) -> Vec<(String, Vec<Value>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Execute { sql, params } => Some((sql, params)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "postgresql"
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.events.lock().push(Event::Execute {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        Ok(StatementResult::affected(1))
    }

    async fn query(&self, sql: &str, _params: &[Value]) -> Result<QueryResult> {
        self.events.lock().push(Event::Query(sql.to_string()));
        Ok(QueryResult::empty())
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        self.events.lock().push(Event::Begin);
        Ok(Box::new(MockTransaction {
            events: Arc::clone(&self.events),
            fail_from_insert: self.fail_from_insert,
            inserts: Mutex::new(0),
        }))
    }

    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        Some(self)
    }
}

#[async_trait]
impl SchemaIntrospection for MockConnection {
    async fn list_tables(&self, _schema: Option<&str>) -> Result<Vec<TableInfo>> {
        Ok(Vec::new())
    }

    async fn get_columns(&self, _schema: Option<&str>, table: &str) -> Result<Vec<ColumnInfo>> {
        if table != "people" {
            return Ok(Vec::new());
        }
        Ok(self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| ColumnInfo {
                name: name.clone(),
                ordinal: i + 1,
                data_type: "text".to_string(),
                nullable: true,
                default_value: None,
                is_primary_key: false,
            })
            .collect())
    }

    async fn get_primary_key(
        &self,
        _schema: Option<&str>,
        _table: &str,
    ) -> Result<Option<PrimaryKeyInfo>> {
        Ok(None)
    }

    async fn get_unique_columns(&self, _schema: Option<&str>, _table: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

struct MockTransaction {
    events: EventLog,
    fail_from_insert: Option<usize>,
    inserts: Mutex<usize>,
}

#[async_trait]
impl Transaction for MockTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.events.lock().push(Event::Commit);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.events.lock().push(Event::Rollback);
        Ok(())
    }

    async fn query(&self, sql: &str, _params: &[Value]) -> Result<QueryResult> {
        self.events.lock().push(Event::Query(sql.to_string()));
        Ok(QueryResult::empty())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.events.lock().push(Event::Execute {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        let n = {
            let mut inserts = self.inserts.lock();
            let n = *inserts;
            *inserts += 1;
            n
        };
        match self.fail_from_insert {
            Some(from) if n >= from => Err(TabulaError::Database {
                message: "duplicate key value violates unique constraint".into(),
                code: Some("23505".into()),
            }),
            _ => Ok(StatementResult::affected(1)),
        }
    }
}

/// Hands out the shared mock and counts acquisitions
pub struct MockSource {
    connection: Arc<MockConnection>,
    config: ConnectionConfig,
    acquisitions: Mutex<usize>,
}

impl MockSource {
    pub fn new(connection: MockConnection) -> Self {
        Self {
            connection: Arc::new(connection),
            config: ConnectionConfig::new("postgres"),
            acquisitions: Mutex::new(0),
        }
    }

    pub fn connection(&self) -> &MockConnection {
        &self.connection
    }

    pub fn acquisitions(&self) -> usize {
        *self.acquisitions.lock()
    }
}

#[async_trait]
impl ConnectionSource for MockSource {
    async fn acquire(&self) -> Result<Arc<dyn Connection>> {
        *self.acquisitions.lock() += 1;
        Ok(self.connection.clone() as Arc<dyn Connection>)
    }

    fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

pub fn transfer_for(source: Arc<dyn ConnectionSource>) -> JsonTransfer {
    JsonTransfer::new(
        Arc::new(RowStore::new(source.clone())),
        Arc::new(SchemaIntrospector::new(source.clone())),
        source,
    )
}

/// A SQLite database file in a temp dir, set up with `statements`
pub struct SqliteFixture {
    _dir: tempfile::TempDir,
    pub source: Arc<dyn ConnectionSource>,
    pub transfer: JsonTransfer,
}

impl SqliteFixture {
    pub async fn new(statements: &[&str]) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("transfer.db");
        let source: Arc<dyn ConnectionSource> = Arc::new(
            DriverRegistry::with_defaults()
                .connection_source(ConnectionConfig::new_sqlite(&path.to_string_lossy()))
                .expect("sqlite driver should be registered"),
        );

        let conn = source.acquire().await.expect("Failed to open database");
        for statement in statements {
            conn.execute(statement, &[])
                .await
                .expect("Failed to setup schema");
        }

        Self {
            _dir: dir,
            transfer: transfer_for(source.clone()),
            source,
        }
    }

    pub async fn scalar(&self, sql: &str) -> Value {
        let conn = self.source.acquire().await.expect("Failed to open database");
        let result = conn.query(sql, &[]).await.expect("Query failed");
        result.scalar().cloned().unwrap_or(Value::Null)
    }
}
