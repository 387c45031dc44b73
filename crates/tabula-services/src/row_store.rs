//! Row reads and single-row mutations
//!
//! Every call builds (and so validates) its statement before acquiring a
//! connection: an invalid identifier never reaches the database.

use std::sync::Arc;
use tabula_core::{ConnectionSource, Row, Value};

use crate::ValueMap;
use crate::error::ServiceResult;
use crate::query_builder::{BuiltQuery, QueryBuilder};

/// Maximum number of rows [`RowStore::read_rows`] returns by default
pub const DEFAULT_ROW_CAP: usize = 1000;

/// Rows of one table as read by [`RowStore::read_rows`]
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// More rows exist than the cap allowed through
    pub truncated: bool,
}

impl TableData {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads and writes rows through per-call connections
pub struct RowStore {
    source: Arc<dyn ConnectionSource>,
    row_cap: usize,
}

impl RowStore {
    pub fn new(source: Arc<dyn ConnectionSource>) -> Self {
        Self {
            source,
            row_cap: DEFAULT_ROW_CAP,
        }
    }

    pub fn with_row_cap(mut self, row_cap: usize) -> Self {
        self.row_cap = row_cap;
        self
    }

    pub fn row_cap(&self) -> usize {
        self.row_cap
    }

    pub fn source(&self) -> &Arc<dyn ConnectionSource> {
        &self.source
    }

    /// Statement builder for the configured driver and schema
    pub fn query_builder(&self) -> QueryBuilder {
        let config = self.source.config();
        QueryBuilder::for_driver(&config.driver).with_schema(config.schema())
    }

    async fn execute(&self, query: BuiltQuery) -> ServiceResult<u64> {
        let conn = self.source.acquire().await?;
        let result = conn.execute(&query.sql, &query.params).await?;
        Ok(result.affected_rows)
    }

    /// Up to `row_cap` rows of `table`; `None` on failure or invalid name
    #[tracing::instrument(skip(self))]
    pub async fn read_rows(&self, table: &str) -> Option<TableData> {
        match self.try_read_rows(table).await {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(table = %table, error = %e, code = e.code(), "failed to read rows");
                None
            }
        }
    }

    /// Like [`RowStore::read_rows`], but says why the read failed
    pub async fn try_read_rows(&self, table: &str) -> ServiceResult<TableData> {
        let query = self
            .query_builder()
            .select_all(table, self.row_cap.saturating_add(1))?;
        let conn = self.source.acquire().await?;
        let mut result = conn.query(&query.sql, &query.params).await?;

        let truncated = result.rows.len() > self.row_cap;
        result.rows.truncate(self.row_cap);
        tracing::debug!(table = %table, rows = result.rows.len(), truncated, "rows read");
        Ok(TableData {
            columns: result.column_names(),
            rows: result.rows,
            truncated,
        })
    }

    /// `COUNT(*)` of `table`; 0 on any failure
    #[tracing::instrument(skip(self))]
    pub async fn row_count(&self, table: &str) -> i64 {
        let result = async {
            let query = self.query_builder().count(table)?;
            let conn = self.source.acquire().await?;
            Ok::<_, crate::ServiceError>(conn.query(&query.sql, &query.params).await?)
        }
        .await;

        match result {
            Ok(result) => result.scalar().and_then(Value::as_i64).unwrap_or(0),
            Err(e) => {
                tracing::warn!(table = %table, error = %e, code = e.code(), "failed to count rows");
                0
            }
        }
    }

    /// Insert one row; true iff exactly one row was affected
    #[tracing::instrument(skip(self, data), fields(columns = data.len()))]
    pub async fn insert_row(&self, table: &str, data: &ValueMap) -> bool {
        let result = match self.query_builder().insert(table, data) {
            Ok(query) => self.execute(query).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(1) => {
                tracing::info!(table = %table, "row inserted");
                true
            }
            Ok(affected_rows) => {
                tracing::warn!(table = %table, affected_rows, "insert affected an unexpected number of rows");
                false
            }
            Err(e) => {
                tracing::warn!(table = %table, error = %e, code = e.code(), "insert failed");
                false
            }
        }
    }

    /// Delete the rows matching `keys`; true iff at least one was removed
    #[tracing::instrument(skip(self, keys))]
    pub async fn delete_row(&self, table: &str, keys: &ValueMap) -> bool {
        let result = match self.query_builder().delete(table, keys) {
            Ok(query) => self.execute(query).await,
            Err(e) => Err(e),
        };
        self.report_write("delete", table, result)
    }

    /// Set `set` on the rows matching `keys`; true iff at least one changed
    #[tracing::instrument(skip(self, set, keys))]
    pub async fn update_row(&self, table: &str, set: &ValueMap, keys: &ValueMap) -> bool {
        let result = match self.query_builder().update(table, set, keys) {
            Ok(query) => self.execute(query).await,
            Err(e) => Err(e),
        };
        self.report_write("update", table, result)
    }

    /// Update a row that has no usable key by matching every original value.
    ///
    /// Only columns whose new value differs from the original are written.
    /// Returns false without touching the database when nothing differs.
    /// On PostgreSQL a table holding a column type without `=` (`xml`,
    /// `point`, ...) cannot be matched this way, so the update reports false.
    #[tracing::instrument(skip(self, new_values, original_values))]
    pub async fn update_row_by_full_match(
        &self,
        table: &str,
        new_values: &ValueMap,
        original_values: &ValueMap,
    ) -> bool {
        let changed: ValueMap = new_values
            .iter()
            .filter(|(column, value)| original_values.get(column.as_str()) != Some(value))
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect();

        if changed.is_empty() {
            tracing::debug!(table = %table, "full-match update has nothing to change");
            return false;
        }

        let result = match self.query_builder().update(table, &changed, original_values) {
            Ok(query) => self.execute(query).await,
            Err(e) => Err(e),
        };
        self.report_write("full-match update", table, result)
    }

    fn report_write(&self, operation: &str, table: &str, result: ServiceResult<u64>) -> bool {
        match result {
            Ok(0) => {
                tracing::warn!(table = %table, operation, "no rows matched");
                false
            }
            Ok(affected_rows) => {
                tracing::info!(table = %table, operation, affected_rows, "rows written");
                true
            }
            Err(e) => {
                tracing::warn!(table = %table, operation, error = %e, code = e.code(), "write failed");
                false
            }
        }
    }
}
