//! Error types for Tabula

use thiserror::Error;

/// Core error type for Tabula operations
#[derive(Error, Debug)]
pub enum TabulaError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    /// An error reported by the database server, with its native code
    /// (SQLSTATE for PostgreSQL, extended result code for SQLite).
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: Option<String>,
    },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("{0}")]
    Other(String),
}

impl TabulaError {
    /// Database-native error code, if the server supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            TabulaError::Database { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Result type alias for Tabula operations
pub type Result<T> = std::result::Result<T, TabulaError>;
