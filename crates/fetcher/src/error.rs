//! Error types and response codes for the fetcher.

use thiserror::Error;

/// Response code reported when the user stops a request.
pub const RESP_CODE_USER_STOP: i32 = -1;
/// Response code reported when the user cancels a request.
pub const RESP_CODE_USER_CANCEL: i32 = -2;

/// Fetcher errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetcherError {
    /// The URI could not be parsed or rewritten
    #[error("invalid URI: {uri}")]
    InvalidUri { uri: String },

    /// No backend accepts the URI's scheme
    #[error("unsupported scheme for URI: {uri}")]
    UnsupportedScheme { uri: String },

    /// The resource does not exist
    #[error("resource not found: {uri}")]
    NotFound { uri: String },

    /// The request was cancelled
    #[error("request cancelled")]
    Cancelled,

    /// The request exceeded its timeout
    #[error("request timed out after {seconds} second(s)")]
    Timeout { seconds: u32 },

    /// I/O failure while reading the resource
    #[error("fetcher I/O error: {message}")]
    Io { message: String },
}

impl FetcherError {
    /// Creates a new invalid-URI error.
    pub fn invalid_uri<S: Into<String>>(uri: S) -> Self {
        Self::InvalidUri { uri: uri.into() }
    }

    /// Creates a new unsupported-scheme error.
    pub fn unsupported_scheme<S: Into<String>>(uri: S) -> Self {
        Self::UnsupportedScheme { uri: uri.into() }
    }

    /// Creates a new not-found error.
    pub fn not_found<S: Into<String>>(uri: S) -> Self {
        Self::NotFound { uri: uri.into() }
    }

    /// Creates a new timeout error.
    pub fn timeout(seconds: u32) -> Self {
        Self::Timeout { seconds }
    }

    /// Creates a new I/O error.
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for FetcherError {
    fn from(error: std::io::Error) -> Self {
        FetcherError::io(error.to_string())
    }
}

impl From<FetcherError> for purc_core::CoreError {
    fn from(error: FetcherError) -> Self {
        match error {
            FetcherError::InvalidUri { uri } => {
                purc_core::CoreError::invalid_value(format!("bad URI '{uri}'"))
            }
            FetcherError::UnsupportedScheme { uri } => purc_core::CoreError::not_supported(
                format!("no fetcher backend for '{uri}'"),
            ),
            FetcherError::NotFound { uri } => purc_core::CoreError::entity_not_found(uri),
            FetcherError::Cancelled => {
                purc_core::CoreError::request_failed("<cancelled>", "cancelled")
            }
            FetcherError::Timeout { seconds } => purc_core::CoreError::timeout(seconds),
            FetcherError::Io { message } => purc_core::CoreError::io(message),
        }
    }
}

/// Result type for fetcher operations.
pub type FetcherResult<T> = std::result::Result<T, FetcherError>;
