//! Catalog reads through information_schema
//!
//! information_schema columns are domain types (`sql_identifier`,
//! `cardinal_number`), so every selected column is cast to a plain type.

use async_trait::async_trait;
use tabula_core::{
    ColumnInfo, Connection, PrimaryKeyInfo, Result, Row, SchemaIntrospection, TableInfo,
    TableType, Value,
};

use crate::PostgresConnection;

impl PostgresConnection {
    fn resolve_schema<'a>(&'a self, schema: Option<&'a str>) -> &'a str {
        schema.unwrap_or(self.schema())
    }
}

fn text(row: &Row, idx: usize) -> Option<String> {
    row.get(idx).and_then(Value::as_str).map(str::to_string)
}

fn schema_and_table(schema: &str, table: &str) -> [Value; 2] {
    [
        Value::String(schema.to_string()),
        Value::String(table.to_string()),
    ]
}

#[async_trait]
impl SchemaIntrospection for PostgresConnection {
    #[tracing::instrument(skip(self))]
    async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<TableInfo>> {
        let schema = self.resolve_schema(schema);
        let result = self
            .query(
                "SELECT table_name::text, table_type::text
                 FROM information_schema.tables
                 WHERE table_schema = $1
                   AND table_type = 'BASE TABLE'
                   AND table_name::text NOT LIKE 'pg\\_%'
                 ORDER BY table_name",
                &[Value::String(schema.to_string())],
            )
            .await?;

        let tables = result
            .rows
            .iter()
            .filter_map(|row| {
                Some(TableInfo {
                    schema: Some(schema.to_string()),
                    name: text(row, 0)?,
                    table_type: text(row, 1)
                        .map_or(TableType::Table, |kind| TableType::from_catalog(&kind)),
                })
            })
            .collect::<Vec<_>>();

        tracing::debug!(schema = %schema, count = tables.len(), "listed tables");
        Ok(tables)
    }

    #[tracing::instrument(skip(self))]
    async fn get_columns(&self, schema: Option<&str>, table: &str) -> Result<Vec<ColumnInfo>> {
        let schema = self.resolve_schema(schema);
        let primary_key = self
            .get_primary_key(Some(schema), table)
            .await?
            .map(|pk| pk.columns)
            .unwrap_or_default();

        let result = self
            .query(
                "SELECT
                    column_name::text,
                    ordinal_position::int4,
                    data_type::text,
                    is_nullable::text,
                    column_default::text
                 FROM information_schema.columns
                 WHERE table_schema = $1 AND table_name = $2
                 ORDER BY ordinal_position",
                &schema_and_table(schema, table),
            )
            .await?;

        let columns = result
            .rows
            .iter()
            .filter_map(|row| {
                let name = text(row, 0)?;
                Some(ColumnInfo {
                    ordinal: row.get(1).and_then(Value::as_i64).unwrap_or(0) as usize,
                    data_type: text(row, 2).unwrap_or_default(),
                    nullable: text(row, 3).as_deref() == Some("YES"),
                    default_value: text(row, 4),
                    is_primary_key: primary_key.contains(&name),
                    name,
                })
            })
            .collect();

        Ok(columns)
    }

    #[tracing::instrument(skip(self))]
    async fn get_primary_key(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Option<PrimaryKeyInfo>> {
        let schema = self.resolve_schema(schema);
        let result = self
            .query(
                "SELECT tc.constraint_name::text, kcu.column_name::text
                 FROM information_schema.table_constraints tc
                 JOIN information_schema.key_column_usage kcu
                   ON tc.constraint_name = kcu.constraint_name
                  AND tc.table_schema = kcu.table_schema
                  AND tc.table_name = kcu.table_name
                 WHERE tc.constraint_type = 'PRIMARY KEY'
                   AND tc.table_schema = $1
                   AND tc.table_name = $2
                 ORDER BY kcu.ordinal_position",
                &schema_and_table(schema, table),
            )
            .await?;

        let Some(first) = result.rows.first() else {
            return Ok(None);
        };
        Ok(Some(PrimaryKeyInfo {
            name: text(first, 0),
            columns: result.rows.iter().filter_map(|row| text(row, 1)).collect(),
        }))
    }

    #[tracing::instrument(skip(self))]
    async fn get_unique_columns(&self, schema: Option<&str>, table: &str) -> Result<Vec<String>> {
        let schema = self.resolve_schema(schema);
        let result = self
            .query(
                "SELECT DISTINCT kcu.column_name::text
                 FROM information_schema.table_constraints tc
                 JOIN information_schema.key_column_usage kcu
                   ON tc.constraint_name = kcu.constraint_name
                  AND tc.table_schema = kcu.table_schema
                  AND tc.table_name = kcu.table_name
                 WHERE tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE')
                   AND tc.table_schema = $1
                   AND tc.table_name = $2
                 ORDER BY 1",
                &schema_and_table(schema, table),
            )
            .await?;

        Ok(result.rows.iter().filter_map(|row| text(row, 0)).collect())
    }
}
