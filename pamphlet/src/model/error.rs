//! Errors raised while building or validating model values.

use thiserror::Error;

/// Errors that can occur when parsing or validating model values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    /// Content hash is not a 64-character lowercase hex string.
    #[error("invalid content hash '{value}': {reason}")]
    InvalidHash { value: String, reason: String },

    /// Pamphlet identifier is empty or contains disallowed characters.
    #[error("invalid pamphlet id '{0}'")]
    InvalidPamphletId(String),

    /// Page range query could not be parsed.
    #[error("invalid page range '{0}'")]
    InvalidPageRange(String),

    /// Metadata document could not be (de)serialized.
    #[error("metadata document error: {0}")]
    Document(String),
}
