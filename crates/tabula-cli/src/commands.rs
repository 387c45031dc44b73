//! Command implementations over the engine

use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use tabula_core::{ConnectionSource, parse_connection_string, redact};
use tabula_drivers::DriverRegistry;
use tabula_interchange::JsonTransfer;
use tabula_services::column_types::parse_input;
use tabula_services::{
    BeginOutcome, CommitOutcome, EditSessionManager, KeyMode, KeyResolver, RowId, RowStore,
    SchemaIntrospector, TableDescriptor, TransactionLog, ValueMap, WarningState, test_connection,
};

use crate::Assignment;
use crate::output;
use crate::settings::Settings;

/// Everything a command needs, wired to one connection source
pub struct Engine {
    source: Arc<dyn ConnectionSource>,
    store: Arc<RowStore>,
    introspector: Arc<SchemaIntrospector>,
}

impl Engine {
    pub fn connect(settings: &Settings, flag: Option<&str>) -> Result<Self> {
        let connection_string = settings.connection_string(flag);
        let mut config = parse_connection_string(&connection_string)
            .with_context(|| format!("Invalid connection string {}", redact(&connection_string)))?;
        if config.schema().is_none()
            && let Some(schema) = &settings.schema
        {
            config.params.insert("schema".to_string(), schema.clone());
        }
        tracing::debug!(driver = %config.driver, "using connection {}", redact(&connection_string));

        let source: Arc<dyn ConnectionSource> =
            Arc::new(DriverRegistry::with_defaults().connection_source(config)?);
        Ok(Self {
            store: Arc::new(RowStore::new(source.clone()).with_row_cap(settings.row_cap)),
            introspector: Arc::new(SchemaIntrospector::new(source.clone())),
            source,
        })
    }

    pub async fn tables(&self) -> Result<()> {
        let tables = self
            .introspector
            .list_tables()
            .await
            .context("Failed to list tables")?;
        println!("{}", output::tables(&tables));
        Ok(())
    }

    pub async fn columns(&self, table: &str) -> Result<()> {
        let columns = self.introspector.list_columns(table).await;
        if columns.is_empty() {
            bail!("Table {:?} has no columns or does not exist", table);
        }
        println!("{}", output::columns(&columns));
        Ok(())
    }

    pub async fn show(&self, table: &str) -> Result<()> {
        let data = self
            .store
            .try_read_rows(table)
            .await
            .with_context(|| format!("Failed to read rows of {:?}", table))?;
        println!("{}", output::rows(&data));
        if data.truncated {
            eprintln!("showing the first {} rows", self.store.row_cap());
        }
        Ok(())
    }

    pub async fn count(&self, table: &str) -> Result<()> {
        println!("{}", self.store.row_count(table).await);
        Ok(())
    }

    pub async fn keys(&self, table: &str) -> Result<()> {
        let keys = KeyResolver::new(self.introspector.clone())
            .resolve_keys(table)
            .await;
        println!("{}", output::keys(table, &keys));
        Ok(())
    }

    pub async fn insert(&self, table: &str, set: &[Assignment]) -> Result<()> {
        let values = self.typed_values(table, set).await;
        if !self.store.insert_row(table, &values).await {
            bail!("Insert into {:?} failed", table);
        }
        println!("1 row inserted");
        Ok(())
    }

    pub async fn update(
        &self,
        table: &str,
        set: &[Assignment],
        key: &[Assignment],
        matching: &[Assignment],
    ) -> Result<()> {
        let values = self.typed_values(table, set).await;
        let updated = if key.is_empty() {
            let original = self.typed_values(table, matching).await;
            self.store
                .update_row_by_full_match(table, &values, &original)
                .await
        } else {
            let keys = self.typed_values(table, key).await;
            self.store.update_row(table, &values, &keys).await
        };
        if !updated {
            bail!("No row of {:?} was updated", table);
        }
        println!("row updated");
        Ok(())
    }

    pub async fn delete(&self, table: &str, key: &[Assignment]) -> Result<()> {
        let keys = KeyResolver::new(self.introspector.clone())
            .resolve_keys(table)
            .await;
        if keys.mode() == KeyMode::FullRow {
            bail!(
                "Refusing to delete from {:?}: it has no primary key or unique columns",
                table
            );
        }

        let values = self.typed_values(table, key).await;
        if !self.store.delete_row(table, &values).await {
            bail!("No row of {:?} matched", table);
        }
        println!("row deleted");
        Ok(())
    }

    pub async fn edit(&self, table: &str, row_index: u64, set: &[Assignment], yes: bool) -> Result<()> {
        let data = self
            .store
            .try_read_rows(table)
            .await
            .with_context(|| format!("Failed to read rows of {:?}", table))?;
        let index = usize::try_from(row_index).context("Row index out of range")?;
        let Some(mut row) = data.rows.get(index).cloned() else {
            bail!("{:?} has no row #{} (it has {})", table, row_index, data.len());
        };

        let manager = EditSessionManager::new(self.store.clone(), self.introspector.clone());
        let mut manager = if yes {
            manager.with_warning_state(WarningState::suppressed())
        } else {
            manager.with_prompt(confirm_keyless_edit)
        };

        let row_id = RowId(row_index);
        match manager
            .begin_edit(&TableDescriptor::named(table), row_id, &row)
            .await
        {
            BeginOutcome::Started => {}
            BeginOutcome::Declined => {
                print_log(manager.transaction_log());
                bail!("Edit declined");
            }
            BeginOutcome::AlreadyEditing => bail!("Row {} is already being edited", row_id),
        }

        let values = self.typed_values(table, set).await;
        for (column, value) in values {
            if !row.set(&column, value) {
                manager.cancel_edit(row_id, &mut row);
                print_log(manager.transaction_log());
                bail!("{:?} has no column {:?}", table, column);
            }
        }

        let outcome = manager.commit_edit(row_id, &mut row).await;
        print_log(manager.transaction_log());
        match outcome {
            CommitOutcome::Committed { .. } | CommitOutcome::NoChanges => Ok(()),
            CommitOutcome::Failed => bail!("Commit failed; the row was left unchanged"),
            CommitOutcome::NoSession => bail!("No edit in progress for row {}", row_id),
        }
    }

    pub async fn add_row(&self, table: &str) -> Result<()> {
        let mut manager = EditSessionManager::new(self.store.clone(), self.introspector.clone());
        let added = manager.add_row(table).await;
        print_log(manager.transaction_log());
        if !added {
            bail!("No row was added to {:?}", table);
        }
        Ok(())
    }

    pub async fn export(&self, table: &str, path: Option<&Path>) -> Result<()> {
        let json = self
            .transfer()
            .try_export_table(table)
            .await
            .with_context(|| format!("Failed to export {:?}", table))?;
        match path {
            Some(path) => {
                std::fs::write(path, json.as_bytes())
                    .with_context(|| format!("Failed to write {:?}", path))?;
                eprintln!("exported {:?} to {}", table, path.display());
            }
            None => println!("{}", json),
        }
        Ok(())
    }

    pub async fn import(&self, table: &str, file: &Path) -> Result<()> {
        let payload = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {:?}", file))?;
        let summary = self
            .transfer()
            .import_table(table, &payload)
            .await
            .with_context(|| format!("Import into {:?} failed; nothing was written", table))?;
        println!(
            "{} rows imported into {}, {} skipped",
            summary.inserted, table, summary.skipped
        );
        Ok(())
    }

    pub async fn test_connection(&self) -> Result<()> {
        let report = test_connection(self.source.as_ref()).await;
        println!("{}", output::connection_report(&report));
        if !report.connected {
            bail!("Connection failed");
        }
        Ok(())
    }

    fn transfer(&self) -> JsonTransfer {
        JsonTransfer::new(
            self.store.clone(),
            self.introspector.clone(),
            self.source.clone(),
        )
    }

    /// Parse each assignment by its column's type
    async fn typed_values(&self, table: &str, assignments: &[Assignment]) -> ValueMap {
        let types: HashMap<String, String> = self
            .introspector
            .list_columns(table)
            .await
            .into_iter()
            .map(|c| (c.name, c.data_type))
            .collect();

        assignments
            .iter()
            .map(|(column, raw)| {
                let value = parse_input(raw, types.get(column).map(String::as_str));
                (column.clone(), value)
            })
            .collect()
    }
}

fn print_log(log: &TransactionLog) {
    for entry in log.entries() {
        println!("{}", entry);
    }
}

async fn confirm_keyless_edit(table: String) -> bool {
    let question = format!(
        "Table {} has no primary key or unique columns. The row will be matched on all of \
         its values and every identical row will change. Continue? [y/N] ",
        table
    );
    let answer = tokio::task::spawn_blocking(move || {
        print!("{}", question);
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok::<_, std::io::Error>(line)
    })
    .await;

    match answer {
        Ok(Ok(line)) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "could not read confirmation");
            false
        }
        Err(e) => {
            tracing::warn!(error = %e, "confirmation prompt failed");
            false
        }
    }
}
