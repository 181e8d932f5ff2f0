//! Error types for Dealboard.
//!
//! Library crates use [`DealboardError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Dealboard operations.
#[derive(Debug, thiserror::Error)]
pub enum DealboardError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP transport error.
    #[error("network error: {0}")]
    Network(String),

    /// Search provider returned an error response.
    #[error("search error: {0}")]
    Search(String),

    /// Search returned no usable documents for a subject. Terminal for
    /// that subject; the batch continues.
    #[error("insufficient data for {subject}")]
    InsufficientData { subject: String },

    /// Generation provider error (transport, non-2xx, or empty completion).
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// No balanced JSON structure could be located in completion text.
    #[error("json extraction error: {message}")]
    JsonExtraction { message: String },

    /// Extracted text is not syntactically valid JSON.
    #[error("json syntax error: {message}")]
    JsonSyntax { message: String },

    /// Extracted JSON parsed but did not match the expected shape.
    #[error("schema validation error: {message}")]
    SchemaValidation { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid slug, bad import payload, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DealboardError>;

impl DealboardError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a JSON extraction error from any displayable message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::JsonExtraction {
            message: msg.into(),
        }
    }

    /// Create a JSON syntax error from any displayable message.
    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::JsonSyntax {
            message: msg.into(),
        }
    }

    /// Create a schema validation error from any displayable message.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaValidation {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a synthesis attempt hitting this error should be retried.
    ///
    /// Extraction, syntax, schema, and provider failures are transient
    /// (the model may do better on the next attempt); everything else
    /// is terminal for the current subject.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Synthesis(_)
                | Self::Network(_)
                | Self::JsonExtraction { .. }
                | Self::JsonSyntax { .. }
                | Self::SchemaValidation { .. }
        )
    }
}
