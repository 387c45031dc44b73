use tabula_core::TabulaError;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Engine-level errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("No values provided for {0}")]
    NoValues(&'static str),

    #[error("Refusing to build {0} without a WHERE condition")]
    UnboundedStatement(&'static str),

    #[error("Schema introspection not supported by driver '{0}'")]
    SchemaNotSupported(String),

    #[error(transparent)]
    Database(TabulaError),
}

impl ServiceError {
    /// Database-native error code, when the failure came from the server
    pub fn code(&self) -> Option<&str> {
        match self {
            ServiceError::Database(e) => e.code(),
            _ => None,
        }
    }
}

impl From<TabulaError> for ServiceError {
    fn from(error: TabulaError) -> Self {
        match error {
            TabulaError::InvalidIdentifier(name) => ServiceError::InvalidIdentifier(name),
            other => ServiceError::Database(other),
        }
    }
}
