//! Tabula Drivers - Database driver implementations
//!
//! Feature-gated re-exports of the driver crates plus a registry that maps
//! a `ConnectionConfig::driver` name to a driver instance.

#[cfg(feature = "postgres")]
pub use tabula_driver_postgres as postgres;
#[cfg(feature = "sqlite")]
pub use tabula_driver_sqlite as sqlite;

mod registry;

pub use registry::DriverRegistry;

/// Re-export commonly used types from tabula-core
pub use tabula_core::{
    ColumnMeta, Connection, ConnectionConfig, ConnectionSource, DatabaseDriver,
    DriverConnectionSource, QueryResult, Result, Row, SchemaIntrospection, StatementResult,
    TabulaError, Transaction, Value,
};
