//! Row edit sessions: snapshot on begin, diff and write on commit, restore on
//! cancel or failure.
//!
//! No connection is held between `begin_edit` and `commit_edit`. Two managers
//! editing the same row race with last-write-wins semantics; neither sees the
//! other's snapshot.

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tabula_core::Row;

use crate::ValueMap;
use crate::column_types::default_value_for;
use crate::key_resolver::{KeyMode, KeyResolver, KeySet, WarningState};
use crate::row_store::RowStore;
use crate::schema_introspector::{SchemaIntrospector, TableDescriptor};
use crate::transaction_log::TransactionLog;

/// Caller-chosen identity of a displayed row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub u64);

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    Idle,
    Editing,
    Committing,
    Cancelling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    Started,
    /// The row already has an open session; its snapshot is kept
    AlreadyEditing,
    /// The user refused to edit a table without a usable key
    Declined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing differed from the snapshot; no statement was issued
    NoChanges,
    Committed { changed_columns: Vec<String> },
    /// The write failed or matched no row; the row was restored
    Failed,
    NoSession,
}

/// Asks whether editing a table that has no primary key or unique columns
/// should go ahead.
///
/// Any `Fn(String) -> impl Future<Output = bool>` is a prompt.
#[async_trait]
pub trait KeylessEditPrompt: Send + Sync {
    async fn confirm_keyless_edit(&self, table: &str) -> bool;
}

#[async_trait]
impl<F, Fut> KeylessEditPrompt for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send,
{
    async fn confirm_keyless_edit(&self, table: &str) -> bool {
        (self)(table.to_string()).await
    }
}

/// Prompt that refuses every keyless edit
pub struct DeclineKeylessEdits;

#[async_trait]
impl KeylessEditPrompt for DeclineKeylessEdits {
    async fn confirm_keyless_edit(&self, _table: &str) -> bool {
        false
    }
}

/// An open edit of one row
#[derive(Debug, Clone)]
pub struct EditSession {
    pub row: RowId,
    pub table: TableDescriptor,
    /// Every column's value when the edit began
    pub original: ValueMap,
    pub keys: KeySet,
    pub state: EditState,
}

/// Tracks open edit sessions and turns commits into row-store writes
pub struct EditSessionManager {
    store: Arc<RowStore>,
    introspector: Arc<SchemaIntrospector>,
    resolver: KeyResolver,
    warnings: WarningState,
    prompt: Box<dyn KeylessEditPrompt>,
    sessions: HashMap<RowId, EditSession>,
    log: TransactionLog,
}

impl EditSessionManager {
    pub fn new(store: Arc<RowStore>, introspector: Arc<SchemaIntrospector>) -> Self {
        Self {
            store,
            resolver: KeyResolver::new(Arc::clone(&introspector)),
            introspector,
            warnings: WarningState::new(),
            prompt: Box::new(DeclineKeylessEdits),
            sessions: HashMap::new(),
            log: TransactionLog::new(),
        }
    }

    pub fn with_warning_state(mut self, warnings: WarningState) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_prompt(mut self, prompt: impl KeylessEditPrompt + 'static) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    pub fn warning_state(&self) -> &WarningState {
        &self.warnings
    }

    pub fn transaction_log(&self) -> &TransactionLog {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub fn session(&self, row_id: RowId) -> Option<&EditSession> {
        self.sessions.get(&row_id)
    }

    pub fn state(&self, row_id: RowId) -> EditState {
        self.sessions
            .get(&row_id)
            .map(|s| s.state)
            .unwrap_or(EditState::Idle)
    }

    /// Snapshot `row` and open a session for it
    #[tracing::instrument(skip(self, table, row), fields(table = %table.name))]
    pub async fn begin_edit(
        &mut self,
        table: &TableDescriptor,
        row_id: RowId,
        row: &Row,
    ) -> BeginOutcome {
        if self.sessions.contains_key(&row_id) {
            self.log.record(format!(
                "Row {} of {} is already being edited; keeping the original snapshot",
                row_id, table.name
            ));
            return BeginOutcome::AlreadyEditing;
        }

        let keys = self.resolver.resolve_keys(&table.name).await;
        if self.warnings.needs_warning(&table.name, &keys) {
            self.log.record(format!(
                "Table {} has no primary key or unique columns; asking for confirmation",
                table.name
            ));
            if !self.prompt.confirm_keyless_edit(&table.name).await {
                self.log
                    .record(format!("Edit of row {} in {} declined", row_id, table.name));
                return BeginOutcome::Declined;
            }
            self.warnings.mark_warned(&table.name);
        }

        self.log.record(format!(
            "Begin edit of row {} in {} ({})",
            row_id,
            table.name,
            describe_keys(&keys)
        ));
        self.sessions.insert(
            row_id,
            EditSession {
                row: row_id,
                table: table.clone(),
                original: row.to_map(),
                keys,
                state: EditState::Editing,
            },
        );
        BeginOutcome::Started
    }

    /// Write the columns of `row` that differ from the snapshot.
    ///
    /// On failure every snapshotted value is written back into `row`.
    #[tracing::instrument(skip(self, row))]
    pub async fn commit_edit(&mut self, row_id: RowId, row: &mut Row) -> CommitOutcome {
        let Some(session) = self.sessions.get_mut(&row_id) else {
            self.log
                .record(format!("Commit of row {} ignored: no edit in progress", row_id));
            return CommitOutcome::NoSession;
        };
        session.state = EditState::Committing;

        let table = session.table.name.clone();
        let original = session.original.clone();
        let keys = session.keys.clone();

        let changed: ValueMap = original
            .iter()
            .filter_map(|(column, before)| {
                let current = row.get_by_name(column)?;
                (current != before).then(|| (column.clone(), current.clone()))
            })
            .collect();

        if changed.is_empty() {
            self.sessions.remove(&row_id);
            self.log
                .record(format!("Row {} of {}: no changes to commit", row_id, table));
            return CommitOutcome::NoChanges;
        }

        let changed_columns: Vec<String> = changed.keys().cloned().collect();
        self.log.record(format!(
            "Committing row {} of {}: {}",
            row_id,
            table,
            describe_changes(&original, &changed)
        ));

        let key_edited = changed_columns.iter().any(|c| keys.contains(c));
        let key_values: ValueMap = keys
            .columns()
            .iter()
            .filter_map(|c| original.get(c).map(|v| (c.clone(), v.clone())))
            .collect();
        let keyed = keys.is_reliable() && !key_edited && key_values.len() == keys.columns().len();

        let written = if keyed {
            self.store.update_row(&table, &changed, &key_values).await
        } else {
            self.log.record(format!(
                "Row {} of {}: matching on all original values",
                row_id, table
            ));
            self.store
                .update_row_by_full_match(&table, &changed, &original)
                .await
        };

        self.sessions.remove(&row_id);
        if written {
            self.log
                .record(format!("Row {} of {} committed", row_id, table));
            CommitOutcome::Committed { changed_columns }
        } else {
            restore(row, &original);
            self.log.record(format!(
                "Commit of row {} in {} failed; original values restored",
                row_id, table
            ));
            CommitOutcome::Failed
        }
    }

    /// Put the snapshot back into `row` and close the session.
    /// Returns false when the row had no session.
    #[tracing::instrument(skip(self, row))]
    pub fn cancel_edit(&mut self, row_id: RowId, row: &mut Row) -> bool {
        let Some(session) = self.sessions.get_mut(&row_id) else {
            return false;
        };
        session.state = EditState::Cancelling;
        restore(row, &session.original);
        let table = session.table.name.clone();

        self.sessions.remove(&row_id);
        self.log
            .record(format!("Edit of row {} in {} cancelled", row_id, table));
        true
    }

    /// Insert a placeholder row: every required column without a database
    /// default gets a value typed after the column.
    #[tracing::instrument(skip(self))]
    pub async fn add_row(&mut self, table: &str) -> bool {
        let data: ValueMap = self
            .introspector
            .list_columns(table)
            .await
            .into_iter()
            .filter(|c| !c.nullable && c.default_value.is_none())
            .map(|c| {
                let value = default_value_for(&c.data_type);
                (c.name, value)
            })
            .collect();

        if data.is_empty() {
            self.log.record(format!(
                "Add row to {} skipped: no required columns to fill",
                table
            ));
            return false;
        }

        let inserted = self.store.insert_row(table, &data).await;
        self.log.record(if inserted {
            format!("Row added to {}", table)
        } else {
            format!("Adding a row to {} failed", table)
        });
        inserted
    }
}

fn restore(row: &mut Row, original: &ValueMap) {
    for (column, value) in original {
        row.set(column, value.clone());
    }
}

fn describe_keys(keys: &KeySet) -> String {
    match keys.mode() {
        KeyMode::PrimaryKey => format!("primary key: {}", keys.columns().join(", ")),
        KeyMode::Unique => format!("unique columns: {}", keys.columns().join(", ")),
        KeyMode::FullRow => "no key, full-row match".to_string(),
    }
}

fn describe_changes(original: &ValueMap, changed: &ValueMap) -> String {
    changed
        .iter()
        .map(|(column, after)| {
            let before = original.get(column).map(|v| v.to_string()).unwrap_or_default();
            format!("{}: {} -> {}", column, before, after)
        })
        .collect::<Vec<_>>()
        .join("; ")
}
