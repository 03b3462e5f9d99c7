//! Error types for Curator.
//!
//! Library crates use [`CuratorError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Curator operations.
#[derive(Debug, thiserror::Error)]
pub enum CuratorError {
    /// Missing credential or invalid parameter. Fatal to the stage that needs it.
    #[error("config error: {message}")]
    Config { message: String },

    /// Timeout, rate limit, or 5xx from a remote capability. Retried with backoff.
    #[error("transient service error: {0}")]
    Transient(String),

    /// Non-transient remote failure (4xx, rejected request). Never retried.
    #[error("service error: {0}")]
    Service(String),

    /// Unparseable or malformed response from a capability.
    #[error("data error: {message}")]
    Data { message: String },

    /// Durable backend read/write failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// The overall time budget left too little room to attempt a call.
    #[error("time budget exhausted before {operation}")]
    BudgetExhausted { operation: String },

    /// Every scoring batch failed; nothing useful could be produced.
    #[error("scoring failed for all {batches} batches")]
    AllBatchesFailed { batches: usize },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CuratorError>;

impl CuratorError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a data error from any displayable message.
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a budget-exhaustion error naming the skipped operation.
    pub fn budget_exhausted(operation: impl Into<String>) -> Self {
        Self::BudgetExhausted {
            operation: operation.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
