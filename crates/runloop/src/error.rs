//! Error types for runloop operations.

use thiserror::Error;

/// Runloop errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunLoopError {
    /// A system call failed
    #[error("runloop I/O error: {message}")]
    Io { message: String },

    /// A monitor or timer handle does not name a live registration
    #[error("stale runloop handle: {handle}")]
    StaleHandle { handle: u64 },
}

impl RunLoopError {
    /// Creates a new I/O error.
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a new stale-handle error.
    pub fn stale_handle(handle: u64) -> Self {
        Self::StaleHandle { handle }
    }
}

impl From<std::io::Error> for RunLoopError {
    fn from(error: std::io::Error) -> Self {
        RunLoopError::io(error.to_string())
    }
}

/// Result type for runloop operations.
pub type RunLoopResult<T> = std::result::Result<T, RunLoopError>;
