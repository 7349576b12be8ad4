use std::io;
use thiserror::Error;

/// Unified error type for the deferred loading mechanism.
///
/// Each variant represents a category of failure with enough context to tell
/// a misconfigured integration apart from bad raw data or a failing loader.
#[derive(Error, Debug)]
pub enum DeferError {
    /// Invalid configuration: bad prefix syntax, an unusable cache
    /// directory, or a persisted artifact that does not match the request.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Raw field data that the target type cannot accept: an undeclared
    /// field name, or a resolved value of the wrong shape.
    #[error("Data mismatch for field '{field}': {message}")]
    DataMismatch { field: String, message: String },

    /// A failure raised by the external loader while resolving a reference.
    /// Propagated unchanged; the core never retries or suppresses it.
    #[error(transparent)]
    Resolution(Box<dyn std::error::Error + Send + Sync>),

    /// IO failure while reading or writing a proxy plan artifact.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serialization failure while encoding or decoding a proxy plan.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DeferError {
    /// Builds a configuration error from any displayable message.
    pub fn config(message: impl Into<String>) -> Self {
        DeferError::Config {
            message: message.into(),
        }
    }

    /// Builds a data mismatch error for the given field.
    pub fn data_mismatch(field: impl Into<String>, message: impl Into<String>) -> Self {
        DeferError::DataMismatch {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wraps a loader failure without altering it.
    pub fn resolution(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        DeferError::Resolution(Box::new(error))
    }
}

impl From<serde_json::Error> for DeferError {
    fn from(error: serde_json::Error) -> Self {
        DeferError::Serialization(error.to_string())
    }
}

/// Result type alias for operations that can fail with a [`DeferError`].
pub type DeferResult<T> = Result<T, DeferError>;
