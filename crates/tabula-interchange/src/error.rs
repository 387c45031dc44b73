//! Bulk transfer errors

use tabula_core::TabulaError;
use tabula_services::ServiceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Invalid import payload: {0}")]
    Parse(String),

    #[error("Table {0:?} has no columns or does not exist")]
    UnknownTable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A row failed to insert; the whole import was rolled back
    #[error("Insert of row {row} failed: {source}")]
    Insert {
        row: usize,
        #[source]
        source: ServiceError,
    },

    #[error(transparent)]
    Database(#[from] TabulaError),
}

impl TransferError {
    /// Database-native error code, if the failure came from the server
    pub fn code(&self) -> Option<&str> {
        match self {
            TransferError::Insert { source, .. } => source.code(),
            TransferError::Database(e) => e.code(),
            _ => None,
        }
    }
}

impl From<ServiceError> for TransferError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::InvalidIdentifier(name) => TransferError::InvalidIdentifier(name),
            ServiceError::Database(e) => TransferError::Database(e),
            other => TransferError::Database(TabulaError::Other(other.to_string())),
        }
    }
}
