//! Error types for the model layer.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while building model values.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A type registry entry was rejected at registration time.
    #[error("invalid registration: {0}")]
    InvalidRegistration(String),

    /// Records could not be arranged into rows and columns.
    #[error("invalid table: {0}")]
    InvalidTable(String),
}
