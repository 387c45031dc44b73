//! Catalog reads for SQLite
//!
//! Uses the table-valued pragma functions so table names travel as bound
//! parameters rather than being spliced into PRAGMA statements.

use async_trait::async_trait;
use tabula_core::{
    ColumnInfo, Connection, PrimaryKeyInfo, Result, Row, SchemaIntrospection, TableInfo,
    TableType, Value,
};

use crate::SqliteConnection;

const MAIN_SCHEMA: &str = "main";

fn text(row: &Row, idx: usize) -> Option<String> {
    row.get(idx).and_then(Value::as_str).map(str::to_string)
}

fn int(row: &Row, idx: usize) -> i64 {
    row.get(idx).and_then(Value::as_i64).unwrap_or(0)
}

fn names(rows: &[Row]) -> Vec<String> {
    rows.iter().filter_map(|row| text(row, 0)).collect()
}

#[async_trait]
impl SchemaIntrospection for SqliteConnection {
    #[tracing::instrument(skip(self))]
    async fn list_tables(&self, _schema: Option<&str>) -> Result<Vec<TableInfo>> {
        let result = self
            .query(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
                &[],
            )
            .await?;

        let tables: Vec<TableInfo> = names(&result.rows)
            .into_iter()
            .map(|name| TableInfo {
                schema: Some(MAIN_SCHEMA.to_string()),
                name,
                table_type: TableType::Table,
            })
            .collect();

        tracing::debug!(count = tables.len(), "listed tables");
        Ok(tables)
    }

    #[tracing::instrument(skip(self))]
    async fn get_columns(&self, _schema: Option<&str>, table: &str) -> Result<Vec<ColumnInfo>> {
        let result = self
            .query(
                "SELECT cid, name, type, \"notnull\", dflt_value, pk
                 FROM pragma_table_info(?1)
                 ORDER BY cid",
                &[Value::String(table.to_string())],
            )
            .await?;

        // cid is 0-based
        Ok(result
            .rows
            .iter()
            .filter_map(|row| {
                Some(ColumnInfo {
                    name: text(row, 1)?,
                    ordinal: int(row, 0) as usize + 1,
                    data_type: text(row, 2).unwrap_or_default(),
                    nullable: int(row, 3) == 0,
                    default_value: text(row, 4),
                    is_primary_key: int(row, 5) > 0,
                })
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn get_primary_key(
        &self,
        _schema: Option<&str>,
        table: &str,
    ) -> Result<Option<PrimaryKeyInfo>> {
        let result = self
            .query(
                "SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk",
                &[Value::String(table.to_string())],
            )
            .await?;

        let columns = names(&result.rows);
        Ok((!columns.is_empty()).then_some(PrimaryKeyInfo {
            name: None,
            columns,
        }))
    }

    #[tracing::instrument(skip(self))]
    async fn get_unique_columns(&self, _schema: Option<&str>, table: &str) -> Result<Vec<String>> {
        let result = self
            .query(
                "SELECT ii.name
                 FROM pragma_index_list(?1) il
                 JOIN pragma_index_info(il.name) ii
                 WHERE il.\"unique\" = 1 AND ii.name IS NOT NULL
                 UNION
                 SELECT name FROM pragma_table_info(?1) WHERE pk > 0
                 ORDER BY 1",
                &[Value::String(table.to_string())],
            )
            .await?;

        Ok(names(&result.rows))
    }
}
