//! Identifier validation
//!
//! Table and column names cannot be bound as query parameters, so every name
//! that ends up inside SQL text has to pass through here first. Only ASCII
//! letters, ASCII digits and underscore are accepted; anything else (quotes,
//! dots, whitespace, punctuation, non-ASCII letters) is rejected.

use crate::{Result, TabulaError};

/// Returns true when `name` is non-empty and made only of `[A-Za-z0-9_]`.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Fallible form of [`is_valid_identifier`] for use with `?`.
pub fn validate_identifier(name: &str) -> Result<&str> {
    if is_valid_identifier(name) {
        Ok(name)
    } else {
        tracing::warn!(identifier = %name, "rejected invalid identifier");
        Err(TabulaError::InvalidIdentifier(name.to_string()))
    }
}
