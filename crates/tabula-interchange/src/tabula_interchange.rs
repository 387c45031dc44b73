//! Tabula Interchange - bulk JSON transfer of table rows
//!
//! Exports a table as a pretty-printed JSON array of objects (one object per
//! row, keys in column order) and imports such an array back inside a single
//! transaction.
//!
//! # Wire format
//!
//! ```json
//! [
//!   { "id": 1, "name": "Ann", "avatar": "\\x89504e47", "joined": "2024-03-01" },
//!   { "id": 2, "name": null, "avatar": null, "joined": "2024-03-02" }
//! ]
//! ```
//!
//! See [`value_encoding`] for how each [`tabula_core::Value`] maps to JSON.

mod error;
mod json_transfer;
pub mod value_encoding;

pub use error::TransferError;
pub use json_transfer::{ImportSummary, JsonTransfer};
pub use value_encoding::{json_to_column_value, json_to_value, row_to_json, value_to_json};
