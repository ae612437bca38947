//! DOMException-style error type - WebCodecs spec compliant error handling
//!
//! Provides spec-compliant error handling following W3C DOMException conventions.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/DOMException
//!
//! Every caller-visible failure carries a stable kind (for programs) and a
//! message (for humans). Admit-side failures are returned synchronously from
//! the façade methods; codec-side failures travel through the delivery
//! channel and close the instance.

use std::fmt;

/// DOMException error names per WebCodecs spec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)] // DOMException names end in "Error"
pub enum ErrorKind {
    /// Encoding or decoding operation failed
    EncodingError,
    /// Unsupported codec or configuration
    NotSupportedError,
    /// Wrong state (e.g., operating on closed object)
    InvalidStateError,
    /// Invalid data format
    DataError,
    /// Operation was aborted
    AbortError,
    /// Caller supplied a value of the wrong shape
    TypeError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::EncodingError => "EncodingError",
            ErrorKind::NotSupportedError => "NotSupportedError",
            ErrorKind::InvalidStateError => "InvalidStateError",
            ErrorKind::DataError => "DataError",
            ErrorKind::AbortError => "AbortError",
            ErrorKind::TypeError => "TypeError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-visible error with DOMException-style naming
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct WebCodecsError {
    pub kind: ErrorKind,
    pub message: String,
}

impl WebCodecsError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result alias for caller-facing operations
pub type WebCodecsResult<T> = Result<T, WebCodecsError>;

/// Helper to create NotSupportedError for unsupported codecs/configs
pub fn not_supported_error(message: &str) -> WebCodecsError {
    WebCodecsError::new(ErrorKind::NotSupportedError, message)
}

/// Helper to create InvalidStateError for closed objects or wrong state
pub fn invalid_state_error(message: &str) -> WebCodecsError {
    WebCodecsError::new(ErrorKind::InvalidStateError, message)
}

/// Helper to create EncodingError for encoding/decoding failures
pub fn encoding_error(message: &str) -> WebCodecsError {
    WebCodecsError::new(ErrorKind::EncodingError, message)
}

/// Helper to create DataError for invalid data format
pub fn data_error(message: &str) -> WebCodecsError {
    WebCodecsError::new(ErrorKind::DataError, message)
}

/// Helper to create AbortError for aborted operations
pub fn abort_error(message: &str) -> WebCodecsError {
    WebCodecsError::new(ErrorKind::AbortError, message)
}

/// Helper to create TypeError for type-related errors
///
/// Use for invalid argument types or missing required fields.
pub fn type_error(message: &str) -> WebCodecsError {
    WebCodecsError::new(ErrorKind::TypeError, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = invalid_state_error("decoder is closed");
        assert_eq!(err.to_string(), "InvalidStateError: decoder is closed");
        assert_eq!(err.kind(), ErrorKind::InvalidStateError);
    }

    #[test]
    fn test_kind_strings() {
        assert_eq!(ErrorKind::EncodingError.as_str(), "EncodingError");
        assert_eq!(ErrorKind::TypeError.as_str(), "TypeError");
        assert_eq!(ErrorKind::AbortError.as_str(), "AbortError");
    }
}
