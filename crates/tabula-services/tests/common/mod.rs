//! Common test utilities and mocks
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Once;
use tabula_core::{
    ColumnInfo, ColumnMeta, Connection, ConnectionConfig, ConnectionSource, PrimaryKeyInfo,
    QueryResult, Result, Row, SchemaIntrospection, StatementResult, TableInfo, TableType,
    TabulaError, Transaction, Value,
};
use tabula_services::ValueMap;

static TRACING: Once = Once::new();

/// Route engine logs to the test harness output (`RUST_LOG=debug` to see them)
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// A call the engine made against the mock
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Query { sql: String, params: Vec<Value> },
    Execute { sql: String, params: Vec<Value> },
}

impl Call {
    pub fn sql(&self) -> &str {
        match self {
            Call::Query { sql, .. } | Call::Execute { sql, .. } => sql,
        }
    }

    pub fn params(&self) -> &[Value] {
        match self {
            Call::Query { params, .. } | Call::Execute { params, .. } => params,
        }
    }

    pub fn is_execute(&self) -> bool {
        matches!(self, Call::Execute { .. })
    }
}

/// Mock connection for exercising the engine without a database.
///
/// Serves a scripted catalog through `SchemaIntrospection`, answers queries
/// by SQL substring, and records every query and execute call.
pub struct MockConnection {
    driver: String,
    tables: Vec<String>,
    columns: HashMap<String, Vec<ColumnInfo>>,
    primary_keys: HashMap<String, Vec<String>>,
    unique_columns: HashMap<String, Vec<String>>,
    query_responses: Vec<(String, QueryResult)>,
    failing_queries: Vec<String>,
    affected_rows: u64,
    execute_error_code: Option<String>,
    catalog_fails: bool,
    log: Mutex<Vec<Call>>,
}

impl MockConnection {
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            tables: Vec::new(),
            columns: HashMap::new(),
            primary_keys: HashMap::new(),
            unique_columns: HashMap::new(),
            query_responses: Vec::new(),
            failing_queries: Vec::new(),
            affected_rows: 1,
            execute_error_code: None,
            catalog_fails: false,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Add a table; columns are `(name, data_type, nullable)`
    pub fn with_table(mut self, name: &str, columns: &[(&str, &str, bool)]) -> Self {
        self.tables.push(name.to_string());
        let columns = columns
            .iter()
            .enumerate()
            .map(|(i, (column, data_type, nullable))| ColumnInfo {
                name: column.to_string(),
                ordinal: i + 1,
                data_type: data_type.to_string(),
                nullable: *nullable,
                default_value: None,
                is_primary_key: false,
            })
            .collect();
        self.columns.insert(name.to_string(), columns);
        self
    }

    pub fn with_default(mut self, table: &str, column: &str, default: &str) -> Self {
        if let Some(columns) = self.columns.get_mut(table) {
            for c in columns.iter_mut().filter(|c| c.name == column) {
                c.default_value = Some(default.to_string());
            }
        }
        self
    }

    pub fn with_primary_key(mut self, table: &str, columns: &[&str]) -> Self {
        self.primary_keys.insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    pub fn with_unique(mut self, table: &str, columns: &[&str]) -> Self {
        self.unique_columns.insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    /// Register a response for queries containing the given SQL pattern
    pub fn with_query_response(mut self, sql_contains: &str, result: QueryResult) -> Self {
        self.query_responses.push((sql_contains.to_string(), result));
        self
    }

    /// Make queries containing `sql_contains` fail
    pub fn with_failing_query(mut self, sql_contains: &str) -> Self {
        self.failing_queries.push(sql_contains.to_string());
        self
    }

    pub fn with_affected_rows(mut self, affected_rows: u64) -> Self {
        self.affected_rows = affected_rows;
        self
    }

    /// Make every execute fail with a database error carrying `code`
    pub fn with_execute_error(mut self, code: &str) -> Self {
        self.execute_error_code = Some(code.to_string());
        self
    }

    pub fn with_catalog_failure(mut self) -> Self {
        self.catalog_fails = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().clone()
    }

    pub fn executes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_execute).collect()
    }

    fn catalog_guard(&self) -> Result<()> {
        if self.catalog_fails {
            Err(TabulaError::Schema("catalog unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        &self.driver
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.log.lock().push(Call::Execute {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        match &self.execute_error_code {
            Some(code) => Err(TabulaError::Database {
                message: "mock execute failure".into(),
                code: Some(code.clone()),
            }),
            None => Ok(StatementResult::affected(self.affected_rows)),
        }
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.log.lock().push(Call::Query {
            sql: sql.to_string(),
            params: params.to_vec(),
        });

        if self.failing_queries.iter().any(|p| sql.contains(p.as_str())) {
            return Err(TabulaError::Query("mock query failure".into()));
        }
        for (pattern, result) in &self.query_responses {
            if sql.contains(pattern.as_str()) {
                return Ok(result.clone());
            }
        }
        Ok(QueryResult::empty())
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        Err(TabulaError::NotSupported(
            "transactions not implemented in mock".into(),
        ))
    }

    async fn server_version(&self) -> Result<String> {
        Ok("Mock 1.0".into())
    }

    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        Some(self)
    }
}

#[async_trait]
impl SchemaIntrospection for MockConnection {
    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<TableInfo>> {
        self.catalog_guard()?;
        let mut tables: Vec<TableInfo> = self
            .tables
            .iter()
            .map(|name| TableInfo {
                schema: schema.map(str::to_string),
                name: name.clone(),
                table_type: TableType::Table,
            })
            .collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tables)
    }

    async fn get_columns(&self, _schema: Option<&str>, table: &str) -> Result<Vec<ColumnInfo>> {
        self.catalog_guard()?;
        Ok(self.columns.get(table).cloned().unwrap_or_default())
    }

    async fn get_primary_key(
        &self,
        _schema: Option<&str>,
        table: &str,
    ) -> Result<Option<PrimaryKeyInfo>> {
        self.catalog_guard()?;
        Ok(self.primary_keys.get(table).map(|columns| PrimaryKeyInfo {
            name: Some(format!("{}_pkey", table)),
            columns: columns.clone(),
        }))
    }

    async fn get_unique_columns(&self, _schema: Option<&str>, table: &str) -> Result<Vec<String>> {
        self.catalog_guard()?;
        let mut columns: Vec<String> = self
            .primary_keys
            .get(table)
            .into_iter()
            .chain(self.unique_columns.get(table))
            .flatten()
            .cloned()
            .collect();
        columns.sort();
        columns.dedup();
        Ok(columns)
    }
}

/// Connection source that always hands out the same mock and counts how
/// often it was asked.
pub struct MockSource {
    connection: Arc<MockConnection>,
    config: ConnectionConfig,
    acquisitions: Mutex<usize>,
    fail_with: Option<String>,
}

impl MockSource {
    pub fn new(connection: MockConnection) -> Self {
        let config = ConnectionConfig::new(&connection.driver);
        Self {
            connection: Arc::new(connection),
            config,
            acquisitions: Mutex::new(0),
            fail_with: None,
        }
    }

    /// Fail every acquisition with a database error carrying `code`
    pub fn failing(connection: MockConnection, code: &str) -> Self {
        let mut source = Self::new(connection);
        source.fail_with = Some(code.to_string());
        source
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
        if let Some(code) = &self.fail_with {
            return Err(TabulaError::Database {
                message: "password authentication failed".into(),
                code: Some(code.clone()),
            });
        }
        Ok(self.connection.clone() as Arc<dyn Connection>)
    }

    fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

/// Helper to create a query result with row data
pub fn mock_query_result(column_names: Vec<&str>, row_data: Vec<Vec<Value>>) -> QueryResult {
    let columns: Vec<ColumnMeta> = column_names
        .iter()
        .enumerate()
        .map(|(i, name)| ColumnMeta {
            name: name.to_string(),
            data_type: "TEXT".to_string(),
            nullable: true,
            ordinal: i,
        })
        .collect();

    let rows: Vec<Row> = row_data
        .into_iter()
        .map(|values| Row::new(column_names.iter().map(|s| s.to_string()).collect(), values))
        .collect();

    QueryResult { columns, rows }
}

pub fn count_result(count: i64) -> QueryResult {
    mock_query_result(vec!["count"], vec![vec![Value::Int64(count)]])
}

pub fn row(pairs: &[(&str, Value)]) -> Row {
    Row::new(
        pairs.iter().map(|(c, _)| c.to_string()).collect(),
        pairs.iter().map(|(_, v)| v.clone()).collect(),
    )
}

pub fn map(pairs: &[(&str, Value)]) -> ValueMap {
    pairs
        .iter()
        .map(|(c, v)| (c.to_string(), v.clone()))
        .collect()
}
