//! Tabula Services Layer
//!
//! The table-editing engine. Every operation acquires its own connection
//! from a [`ConnectionSource`](tabula_core::ConnectionSource) and releases it
//! before returning.
//!
//! # Architecture
//!
//! ```text
//! Outer collaborator (tabula-cli)
//!     ↓
//! EditSessionManager / Bulk transfer (tabula-interchange)
//!     ↓
//! KeyResolver + QueryBuilder
//!     ↓
//! RowStore / SchemaIntrospector ← this crate
//!     ↓
//! Connection (tabula-drivers)
//! ```
//!
//! # Failure policy
//!
//! Reads degrade to empty results or zero, mutations report `false`, and the
//! cause is logged through `tracing`. Only [`test_connection`] returns a
//! structured failure, and [`SchemaIntrospector::list_tables`] propagates a
//! failed catalog query.

pub mod column_types;
mod edit_session;
mod error;
mod key_resolver;
mod query_builder;
mod row_store;
mod schema_introspector;
mod transaction_log;

pub use connection_test::{ConnectionFailure, ConnectionReport, ServerInfo, test_connection};
pub use edit_session::{
    BeginOutcome, CommitOutcome, DeclineKeylessEdits, EditSession, EditSessionManager, EditState,
    KeylessEditPrompt, RowId,
};
pub use error::{ServiceError, ServiceResult};
pub use key_resolver::{KeyMode, KeyResolver, KeySet, WarningState};
pub use query_builder::{BuiltQuery, PlaceholderStyle, QueryBuilder};
pub use row_store::{DEFAULT_ROW_CAP, RowStore, TableData};
pub use schema_introspector::{ColumnDescriptor, SchemaIntrospector, TableDescriptor, TableKind};
pub use transaction_log::{LogEntry, TransactionLog};

/// Ordered column → value map used for row snapshots, SET lists and key matches
pub type ValueMap = indexmap::IndexMap<String, tabula_core::Value>;
