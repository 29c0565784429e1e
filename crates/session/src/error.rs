//! Error types for the render session core.

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by an external render executor.
///
/// The core treats `code` as opaque; it is only carried through to the run result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("executor failed with code {code}: {message}")]
pub struct ExecutorError {
    pub code: i32,
    pub message: String,
}

impl ExecutorError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error type for session, naming, and queue operations
#[derive(Debug, Error)]
pub enum SessionError {
    /// Frame range with start after end
    #[error("Invalid frame range: start {start} is after end {end}")]
    InvalidRange { start: u32, end: u32 },

    /// Malformed job descriptor
    #[error("Invalid render job: {reason}")]
    InvalidJob { reason: String },

    /// Writing to this path would replace an existing render
    #[error("Output already exists and overwriting is disabled: {}", path.display())]
    PathCollision { path: PathBuf },

    /// The render executor reported a failure
    #[error("Render failed: {0}")]
    Executor(#[from] ExecutorError),

    /// A queue run is already in progress
    #[error("A queue run is already in progress")]
    Busy,

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed persisted data
    #[error("Invalid stored data: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SessionError {
    pub fn invalid_job(reason: impl Into<String>) -> Self {
        Self::InvalidJob {
            reason: reason.into(),
        }
    }
}

/// Result alias used across the crate.
pub type SessionResult<T> = Result<T, SessionError>;
