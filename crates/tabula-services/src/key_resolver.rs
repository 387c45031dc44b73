//! Row identification strategy per table

use std::collections::HashSet;
use std::sync::Arc;

use crate::schema_introspector::SchemaIntrospector;

/// Where the identifying columns came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    PrimaryKey,
    Unique,
    /// No key exists; rows are matched on every column
    FullRow,
}

/// The columns used to single out one row of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySet {
    columns: Vec<String>,
    mode: KeyMode,
}

impl KeySet {
    pub fn primary_key(columns: Vec<String>) -> Self {
        Self {
            columns,
            mode: KeyMode::PrimaryKey,
        }
    }

    pub fn unique(columns: Vec<String>) -> Self {
        Self {
            columns,
            mode: KeyMode::Unique,
        }
    }

    pub fn full_row() -> Self {
        Self {
            columns: Vec::new(),
            mode: KeyMode::FullRow,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn mode(&self) -> KeyMode {
        self.mode
    }

    /// False when rows can only be matched on all of their values
    pub fn is_reliable(&self) -> bool {
        self.mode != KeyMode::FullRow
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// Picks the key columns for a table: primary key, else unique columns,
/// else full-row matching.
pub struct KeyResolver {
    introspector: Arc<SchemaIntrospector>,
}

impl KeyResolver {
    pub fn new(introspector: Arc<SchemaIntrospector>) -> Self {
        Self { introspector }
    }

    #[tracing::instrument(skip(self))]
    pub async fn resolve_keys(&self, table: &str) -> KeySet {
        let primary_key = self.introspector.list_primary_key_columns(table).await;
        if !primary_key.is_empty() {
            return KeySet::primary_key(primary_key);
        }

        let unique = self.introspector.list_unique_columns(table).await;
        if !unique.is_empty() {
            tracing::debug!(table = %table, columns = ?unique, "no primary key, using unique columns");
            return KeySet::unique(unique);
        }

        tracing::debug!(table = %table, "no primary key or unique columns, falling back to full-row matching");
        KeySet::full_row()
    }
}

/// Tracks which keyless tables the user has already been warned about.
///
/// Owned by whoever drives the edits, typically one per
/// [`EditSessionManager`](crate::EditSessionManager).
#[derive(Debug, Clone, Default)]
pub struct WarningState {
    warned: HashSet<String>,
    suppress_warnings: bool,
}

impl WarningState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A state that never asks
    pub fn suppressed() -> Self {
        Self {
            warned: HashSet::new(),
            suppress_warnings: true,
        }
    }

    pub fn set_suppressed(&mut self, suppress: bool) {
        self.suppress_warnings = suppress;
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppress_warnings
    }

    pub fn needs_warning(&self, table: &str, keys: &KeySet) -> bool {
        keys.mode() == KeyMode::FullRow
            && !self.suppress_warnings
            && !self.warned.contains(table)
    }

    pub fn mark_warned(&mut self, table: &str) {
        self.warned.insert(table.to_string());
    }
}
