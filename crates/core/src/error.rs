//! Error types shared across the PurC-RS workspace.
//!
//! Interpreter elements translate these codes into coroutine exceptions;
//! the exception name returned by [`CoreError::exception_name`] is what a
//! `catch for="..."` clause matches against.

use thiserror::Error;

use crate::atom::{self, Atom};

/// The closed set of runtime error codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Allocation failure surfaced as an error, not a panic
    #[error("out of memory: {context}")]
    OutOfMemory { context: String },

    /// A value is syntactically acceptable but semantically wrong
    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },

    /// Type mismatch between what an operation needs and what it got
    #[error("wrong data type: expected {expected}, got {actual}")]
    WrongDataType { expected: String, actual: String },

    /// A required attribute or argument was not supplied
    #[error("argument missed: {name}")]
    ArgumentMissed { name: String },

    /// Attempting to set something that is already set
    #[error("duplicated: {what}")]
    Duplicated { what: String },

    /// A named entity could not be resolved
    #[error("entity not found: {entity}")]
    EntityNotFound { entity: String },

    /// A name violates the naming rules
    #[error("bad name: {name}")]
    BadName { name: String },

    /// Input failed UTF-8 validation
    #[error("bad encoding: input invalid from byte {valid_up_to}")]
    BadEncoding { valid_up_to: usize },

    /// A recognized operation that has no implementation yet
    #[error("not implemented: {feature}")]
    NotImplemented { feature: String },

    /// An operation or attribute combination that is rejected by design
    #[error("not supported: {operation}")]
    NotSupported { operation: String },

    /// Iteration exhausted; used by executors to end a loop
    #[error("no more data: {context}")]
    NotExists { context: String },

    /// A request to a remote party failed
    #[error("request failed: {uri}, reason: {reason}")]
    RequestFailed { uri: String, reason: String },

    /// A timed operation exceeded its deadline
    #[error("operation timed out after {seconds} second(s)")]
    Timeout { seconds: u32 },

    /// I/O error
    #[error("I/O error: {message}")]
    Io { message: String },
}

impl CoreError {
    /// Creates a new out-of-memory error.
    pub fn out_of_memory<S: Into<String>>(context: S) -> Self {
        Self::OutOfMemory {
            context: context.into(),
        }
    }

    /// Creates a new invalid-value error.
    pub fn invalid_value<S: Into<String>>(reason: S) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }

    /// Creates a new wrong-data-type error.
    pub fn wrong_data_type<S: Into<String>>(expected: S, actual: S) -> Self {
        Self::WrongDataType {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new argument-missed error.
    pub fn argument_missed<S: Into<String>>(name: S) -> Self {
        Self::ArgumentMissed { name: name.into() }
    }

    /// Creates a new duplicated error.
    pub fn duplicated<S: Into<String>>(what: S) -> Self {
        Self::Duplicated { what: what.into() }
    }

    /// Creates a new entity-not-found error.
    pub fn entity_not_found<S: Into<String>>(entity: S) -> Self {
        Self::EntityNotFound {
            entity: entity.into(),
        }
    }

    /// Creates a new bad-name error.
    pub fn bad_name<S: Into<String>>(name: S) -> Self {
        Self::BadName { name: name.into() }
    }

    /// Creates a new bad-encoding error.
    pub fn bad_encoding(valid_up_to: usize) -> Self {
        Self::BadEncoding { valid_up_to }
    }

    /// Creates a new not-implemented error.
    pub fn not_implemented<S: Into<String>>(feature: S) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
        }
    }

    /// Creates a new not-supported error.
    pub fn not_supported<S: Into<String>>(operation: S) -> Self {
        Self::NotSupported {
            operation: operation.into(),
        }
    }

    /// Creates a new not-exists error.
    pub fn not_exists<S: Into<String>>(context: S) -> Self {
        Self::NotExists {
            context: context.into(),
        }
    }

    /// Creates a new request-failed error.
    pub fn request_failed<S: Into<String>>(uri: S, reason: S) -> Self {
        Self::RequestFailed {
            uri: uri.into(),
            reason: reason.into(),
        }
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

    /// The exception name a `catch` clause matches against.
    pub fn exception_name(&self) -> &'static str {
        match self {
            CoreError::OutOfMemory { .. } => "MemoryFailure",
            CoreError::InvalidValue { .. } => "InvalidValue",
            CoreError::WrongDataType { .. } => "WrongDataType",
            CoreError::ArgumentMissed { .. } => "ArgumentMissed",
            CoreError::Duplicated { .. } => "Duplicated",
            CoreError::EntityNotFound { .. } => "EntityNotFound",
            CoreError::BadName { .. } => "BadName",
            CoreError::BadEncoding { .. } => "BadEncoding",
            CoreError::NotImplemented { .. } => "NotImplemented",
            CoreError::NotSupported { .. } => "Unsupported",
            CoreError::NotExists { .. } => "NoData",
            CoreError::RequestFailed { .. } => "RequestFailed",
            CoreError::Timeout { .. } => "TimeoutError",
            CoreError::Io { .. } => "IOFailure",
        }
    }

    /// Interns the exception name in the except bucket.
    pub fn except_atom(&self) -> Atom {
        Atom::from_static_str(atom::BUCKET_EXCEPT, self.exception_name())
    }

    /// True for errors an element marked `silently` may swallow without a
    /// warning log (exhaustion and lookup misses, not real faults).
    pub fn is_trivial(&self) -> bool {
        matches!(
            self,
            CoreError::NotExists { .. } | CoreError::EntityNotFound { .. }
        )
    }
}

/// Result type for core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Rich descriptor attached to parse errors reported by the tokenizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseErrorInfo {
    /// The offending character, if one could be isolated
    pub character: Option<char>,
    /// 1-based source line
    pub line: u32,
    /// 1-based source column
    pub column: u32,
    /// Absolute byte position in the input
    pub position: usize,
    /// Free-form extra diagnosis
    pub extra: Option<String>,
    /// Source lines surrounding the error
    pub code_snippets: Vec<String>,
}

impl From<std::io::Error> for CoreError {
    fn from(error: std::io::Error) -> Self {
        CoreError::io(error.to_string())
    }
}

impl From<std::str::Utf8Error> for CoreError {
    fn from(error: std::str::Utf8Error) -> Self {
        CoreError::bad_encoding(error.valid_up_to())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CoreError::wrong_data_type("string", "array");
        assert_eq!(
            error.to_string(),
            "wrong data type: expected string, got array"
        );

        let error = CoreError::argument_missed("as");
        assert_eq!(error.to_string(), "argument missed: as");
    }

    #[test]
    fn test_exception_names() {
        assert_eq!(CoreError::bad_name("9x").exception_name(), "BadName");
        assert_eq!(CoreError::not_exists("iterate").exception_name(), "NoData");
        assert_eq!(CoreError::timeout(5).exception_name(), "TimeoutError");
    }

    #[test]
    fn test_except_atom_round_trip() {
        let atom = CoreError::bad_name("x").except_atom();
        assert_eq!(crate::atom::to_string(atom), Some("BadName"));
        assert_eq!(atom.bucket(), atom::BUCKET_EXCEPT);
    }

    #[test]
    fn test_trivial_classification() {
        assert!(CoreError::not_exists("end of set").is_trivial());
        assert!(!CoreError::invalid_value("nan").is_trivial());
    }
}
