//! Catalog lookups with name validation and the engine's failure policy
//!
//! The catalog queries themselves live in the drivers (`SchemaIntrospection`).
//! This layer validates names before touching the database, acquires a fresh
//! connection per call, and turns failures into empty results.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tabula_core::{
    Connection, ConnectionSource, SchemaIntrospection, TableType, is_valid_identifier,
};

use crate::error::{ServiceError, ServiceResult};
use crate::query_builder::QueryBuilder;

/// Kind of relation as reported by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    BaseTable,
    View,
    Other,
}

impl From<TableType> for TableKind {
    fn from(table_type: TableType) -> Self {
        match table_type {
            TableType::Table => TableKind::BaseTable,
            TableType::View => TableKind::View,
            TableType::Other => TableKind::Other,
        }
    }
}

/// Snapshot of one table taken by [`SchemaIntrospector::list_tables`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub schema: Option<String>,
    pub kind: TableKind,
    pub row_count: i64,
}

impl TableDescriptor {
    /// Descriptor for a base table known only by name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            kind: TableKind::BaseTable,
            row_count: 0,
        }
    }
}

/// One column of a table, in ordinal order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub ordinal: usize,
}

/// Schema-level lookups against whatever the connection source points at
pub struct SchemaIntrospector {
    source: Arc<dyn ConnectionSource>,
}

impl SchemaIntrospector {
    pub fn new(source: Arc<dyn ConnectionSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn ConnectionSource> {
        &self.source
    }

    fn schema(&self) -> Option<&str> {
        self.source.config().schema()
    }

    fn catalog(conn: &dyn Connection) -> ServiceResult<&dyn SchemaIntrospection> {
        conn.as_schema_introspection()
            .ok_or_else(|| ServiceError::SchemaNotSupported(conn.driver_name().to_string()))
    }

    /// Base tables ordered by name, each with a fresh `COUNT(*)`.
    ///
    /// A table whose count fails (or whose name cannot be safely quoted) is
    /// still listed, with a count of 0. Only a failing catalog query is an
    /// error.
    #[tracing::instrument(skip(self))]
    pub async fn list_tables(&self) -> ServiceResult<Vec<TableDescriptor>> {
        let conn = self.source.acquire().await.inspect_err(|e| {
            tracing::error!(error = %e, code = e.code(), "failed to connect for table listing");
        })?;
        let tables = Self::catalog(conn.as_ref())?
            .list_tables(self.schema())
            .await
            .inspect_err(|e| {
                tracing::error!(error = %e, code = e.code(), "failed to list tables");
            })?;

        let builder = QueryBuilder::for_driver(conn.driver_name()).with_schema(self.schema());
        let mut descriptors = Vec::with_capacity(tables.len());
        for table in tables.into_iter().filter(|t| t.table_type == TableType::Table) {
            let row_count = match builder.count(&table.name) {
                Ok(count) => match conn.query(&count.sql, &count.params).await {
                    Ok(result) => result.scalar().and_then(|v| v.as_i64()).unwrap_or(0),
                    Err(e) => {
                        tracing::warn!(table = %table.name, error = %e, code = e.code(), "row count failed");
                        0
                    }
                },
                Err(e) => {
                    tracing::warn!(table = %table.name, error = %e, "table name cannot be counted safely");
                    0
                }
            };

            descriptors.push(TableDescriptor {
                name: table.name,
                schema: table.schema,
                kind: table.table_type.into(),
                row_count,
            });
        }

        tracing::info!(count = descriptors.len(), "tables listed");
        Ok(descriptors)
    }

    /// Columns of `table` in ordinal order; empty on failure or invalid name
    #[tracing::instrument(skip(self))]
    pub async fn list_columns(&self, table: &str) -> Vec<ColumnDescriptor> {
        if !is_valid_identifier(table) {
            tracing::warn!(table = %table, "refusing to inspect columns of invalid table name");
            return Vec::new();
        }

        let result = async {
            let conn = self.source.acquire().await?;
            let columns = Self::catalog(conn.as_ref())?
                .get_columns(self.schema(), table)
                .await?;
            Ok::<_, ServiceError>(columns)
        }
        .await;

        match result {
            Ok(mut columns) => {
                columns.sort_by_key(|c| c.ordinal);
                columns
                    .into_iter()
                    .map(|c| ColumnDescriptor {
                        name: c.name,
                        data_type: c.data_type,
                        nullable: c.nullable,
                        default_value: c.default_value,
                        ordinal: c.ordinal,
                    })
                    .collect()
            }
            Err(e) => {
                tracing::warn!(table = %table, error = %e, code = e.code(), "failed to list columns");
                Vec::new()
            }
        }
    }

    /// Column names of `table` in ordinal order
    pub async fn list_column_names(&self, table: &str) -> Vec<String> {
        self.list_columns(table)
            .await
            .into_iter()
            .map(|c| c.name)
            .collect()
    }

    /// Primary-key columns in key order; empty when there is no key
    #[tracing::instrument(skip(self))]
    pub async fn list_primary_key_columns(&self, table: &str) -> Vec<String> {
        if !is_valid_identifier(table) {
            tracing::warn!(table = %table, "refusing to inspect primary key of invalid table name");
            return Vec::new();
        }

        let result = async {
            let conn = self.source.acquire().await?;
            let key = Self::catalog(conn.as_ref())?
                .get_primary_key(self.schema(), table)
                .await?;
            Ok::<_, ServiceError>(key)
        }
        .await;

        match result {
            Ok(key) => key.map(|k| k.columns).unwrap_or_default(),
            Err(e) => {
                tracing::warn!(table = %table, error = %e, code = e.code(), "failed to read primary key");
                Vec::new()
            }
        }
    }

    /// Distinct primary-key and unique-constraint columns, ordered by name
    #[tracing::instrument(skip(self))]
    pub async fn list_unique_columns(&self, table: &str) -> Vec<String> {
        if !is_valid_identifier(table) {
            tracing::warn!(table = %table, "refusing to inspect constraints of invalid table name");
            return Vec::new();
        }

        let result = async {
            let conn = self.source.acquire().await?;
            let columns = Self::catalog(conn.as_ref())?
                .get_unique_columns(self.schema(), table)
                .await?;
            Ok::<_, ServiceError>(columns)
        }
        .await;

        match result {
            Ok(mut columns) => {
                columns.sort();
                columns.dedup();
                columns
            }
            Err(e) => {
                tracing::warn!(table = %table, error = %e, code = e.code(), "failed to read unique columns");
                Vec::new()
            }
        }
    }
}
