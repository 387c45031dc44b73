//! Table export to, and import from, a JSON array of objects

use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tabula_core::{ConnectionSource, validate_identifier};
use tabula_services::{BuiltQuery, RowStore, SchemaIntrospector, ServiceError, ValueMap};

use crate::error::TransferError;
use crate::value_encoding::{json_to_column_value, row_to_json};

/// Result of a successful import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    /// Objects with no key naming a live column
    pub skipped: usize,
}

/// Moves whole tables in and out as JSON
pub struct JsonTransfer {
    store: Arc<RowStore>,
    introspector: Arc<SchemaIntrospector>,
    source: Arc<dyn ConnectionSource>,
}

impl JsonTransfer {
    pub fn new(
        store: Arc<RowStore>,
        introspector: Arc<SchemaIntrospector>,
        source: Arc<dyn ConnectionSource>,
    ) -> Self {
        Self {
            store,
            introspector,
            source,
        }
    }

    /// Pretty-printed JSON of up to the row store's cap of rows.
    ///
    /// Any failure yields `"[]"`.
    pub async fn export_table(&self, table: &str) -> String {
        match self.try_export_table(table).await {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(table = %table, error = %e, code = e.code(), "export failed");
                "[]".to_string()
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn try_export_table(&self, table: &str) -> Result<String, TransferError> {
        let data = self.store.try_read_rows(table).await?;
        if data.truncated {
            tracing::warn!(
                table = %table,
                row_cap = self.store.row_cap(),
                "export truncated to the row cap"
            );
        }

        let rows: Vec<JsonValue> = data.rows.iter().map(row_to_json).collect();
        let json = serde_json::to_string_pretty(&rows)?;
        tracing::info!(table = %table, rows = rows.len(), "table exported");
        Ok(json)
    }

    /// Insert every object of `payload` into `table` inside one transaction.
    ///
    /// Keys that are not live columns are ignored. The first failing insert
    /// rolls the whole import back.
    #[tracing::instrument(skip(self, payload), fields(bytes = payload.len()))]
    pub async fn import_table(
        &self,
        table: &str,
        payload: &str,
    ) -> Result<ImportSummary, TransferError> {
        validate_identifier(table)
            .map_err(|_| TransferError::InvalidIdentifier(table.to_string()))?;

        let objects: Vec<Map<String, JsonValue>> = serde_json::from_str(payload)
            .map_err(|e| TransferError::Parse(e.to_string()))?;
        if objects.is_empty() {
            tracing::debug!(table = %table, "nothing to import");
            return Ok(ImportSummary::default());
        }

        let live: HashMap<String, String> = self
            .introspector
            .list_columns(table)
            .await
            .into_iter()
            .map(|c| (c.name, c.data_type))
            .collect();
        if live.is_empty() {
            return Err(TransferError::UnknownTable(table.to_string()));
        }

        let builder = self.store.query_builder();
        let mut summary = ImportSummary::default();
        let mut inserts: Vec<(usize, BuiltQuery)> = Vec::with_capacity(objects.len());
        for (index, object) in objects.iter().enumerate() {
            let values: ValueMap = object
                .iter()
                .filter_map(|(key, value)| {
                    let data_type = live.get(key.as_str())?;
                    Some((key.clone(), json_to_column_value(value, data_type)))
                })
                .collect();
            if values.is_empty() {
                summary.skipped += 1;
                continue;
            }
            inserts.push((index, builder.insert(table, &values)?));
        }
        if inserts.is_empty() {
            tracing::info!(table = %table, skipped = summary.skipped, "no importable objects");
            return Ok(summary);
        }

        let conn = self.source.acquire().await?;
        let tx = conn.begin_transaction().await?;
        for (index, query) in &inserts {
            if let Err(e) = tx.execute(&query.sql, &query.params).await {
                tracing::warn!(table = %table, index, error = %e, code = e.code(), "import insert failed");
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!("rollback failed after import error: {}", rollback_err);
                }
                return Err(TransferError::Insert {
                    row: *index,
                    source: ServiceError::from(e),
                });
            }
        }
        tx.commit().await?;

        summary.inserted = inserts.len();
        tracing::info!(
            table = %table,
            inserted = summary.inserted,
            skipped = summary.skipped,
            "import committed"
        );
        Ok(summary)
    }
}
