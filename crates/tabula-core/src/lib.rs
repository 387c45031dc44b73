//! Tabula Core - Core abstractions and traits for the table-editing engine
//!
//! This crate provides the fundamental traits and types that all other
//! Tabula crates depend on. It defines:
//!
//! - `DatabaseDriver` - Trait for database driver implementations
//! - `Connection` / `Transaction` - Traits for live database sessions
//! - `SchemaIntrospection` - Trait for catalog inspection
//! - `ConnectionSource` - Per-operation connection acquisition
//! - Identifier validation for dynamically interpolated table/column names
//! - Common types like `Value`, `Row`, `QueryResult`, etc.

mod connection;
mod connection_string;
mod driver;
mod error;
pub mod identifier;
mod schema;
mod source;
mod types;

pub use connection::*;
pub use connection_string::*;
pub use driver::*;
pub use error::*;
pub use identifier::{is_valid_identifier, validate_identifier};
pub use schema::*;
pub use source::*;
pub use types::*;
