//! Error types for pattern registration and classification.

use thiserror::Error;

/// Errors raised when a pattern definition is registered.
#[derive(Debug, Error)]
pub enum Error {
    /// The pattern source does not compile.
    #[error("Invalid pattern for type '{kind}': {source}")]
    InvalidPattern {
        kind: String,
        #[source]
        source: Box<fancy_regex::Error>,
    },

    /// The type name is empty or contains a reserved character.
    #[error("Invalid pattern type '{0}'")]
    InvalidType(String),

    /// A definition with this type is already registered.
    #[error("Pattern type '{0}' is already registered")]
    DuplicateType(String),

    /// A priority name that is neither a known rank nor a number.
    #[error("Invalid priority '{0}'")]
    InvalidPriority(String),
}

/// Result type for registration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A failed lookup inside a `classify` callback or its future.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Classification failed: {0}")]
pub struct ClassifyError(pub String);

impl ClassifyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
