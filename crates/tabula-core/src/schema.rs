//! Catalog reads: tables, columns and keys

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Catalog queries a driver answers for the table editor.
///
/// Implementations only read the catalog; they do not validate names or
/// apply any failure policy. `schema` of `None` means the connection's
/// configured schema.
#[async_trait]
pub trait SchemaIntrospection: Send + Sync {
    /// List user tables in a schema, ordered by name, system tables excluded
    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<TableInfo>>;

    /// Columns in ordinal order; empty when the table does not exist
    async fn get_columns(&self, schema: Option<&str>, table: &str) -> Result<Vec<ColumnInfo>>;

    /// `None` for tables without a primary key
    async fn get_primary_key(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Option<PrimaryKeyInfo>>;

    /// Distinct union of primary-key and unique-constraint columns, ordered by name
    async fn get_unique_columns(&self, schema: Option<&str>, table: &str) -> Result<Vec<String>>;
}

/// A table or view as the catalog lists it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub schema: Option<String>,
    pub name: String,
    pub table_type: TableType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableType {
    Table,
    View,
    Other,
}

impl TableType {
    /// Map a catalog type string (`BASE TABLE`, `VIEW`, `table`, ...) to a `TableType`
    pub fn from_catalog(kind: &str) -> Self {
        match kind.to_ascii_uppercase().as_str() {
            "BASE TABLE" | "TABLE" => TableType::Table,
            "VIEW" => TableType::View,
            _ => TableType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// 1-based position in the table definition
    pub ordinal: usize,
    pub data_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub is_primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKeyInfo {
    pub name: Option<String>,
    /// Columns in key order
    pub columns: Vec<String>,
}
