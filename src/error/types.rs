//! Error types
//!
//! Defines the error kinds every gateway operation reports, plus the errors
//! that can abort server startup.

use log::error;
use serde::Serialize;
use std::io;

/// Result type returned by every gateway operation
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Machine-readable error kind carried in every error envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    PathRejected,
    NotFound,
    Conflict,
    IoError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::PathRejected => "path_rejected",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::IoError => "io_error",
        }
    }
}

/// Gateway operation errors.
///
/// The detail string is what the caller sees. It only ever names the path
/// the caller supplied, never the host path behind it or raw OS error text.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Path rejected: {0}")]
    PathRejected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::InvalidInput(_) => ErrorKind::InvalidInput,
            GatewayError::PathRejected(_) => ErrorKind::PathRejected,
            GatewayError::NotFound(_) => ErrorKind::NotFound,
            GatewayError::Conflict(_) => ErrorKind::Conflict,
            GatewayError::IoError(_) => ErrorKind::IoError,
        }
    }

    /// Maps a host I/O failure on `subject` (the caller's path) to a gateway error.
    ///
    /// The OS error is logged here and dropped from the user-facing message.
    pub fn from_io(err: io::Error, subject: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => GatewayError::NotFound(subject.to_string()),
            io::ErrorKind::AlreadyExists => GatewayError::Conflict(subject.to_string()),
            _ => {
                error!("I/O failure on {}: {}", subject, err);
                GatewayError::IoError(format!("operation on {} failed", subject))
            }
        }
    }
}

/// Errors that abort server startup
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Failed to bind to {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("Server error: {0}")]
    Serve(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_match_wire_format() {
        for kind in [
            ErrorKind::InvalidInput,
            ErrorKind::PathRejected,
            ErrorKind::NotFound,
            ErrorKind::Conflict,
            ErrorKind::IoError,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err = GatewayError::from_io(io::Error::from(io::ErrorKind::NotFound), "a.txt");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Not found: a.txt");
    }

    #[test]
    fn test_io_already_exists_maps_to_conflict() {
        let err = GatewayError::from_io(io::Error::from(io::ErrorKind::AlreadyExists), "b");
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_other_io_errors_hide_os_text() {
        let raw = io::Error::new(io::ErrorKind::Other, "disk on fire at /srv/secret");
        let err = GatewayError::from_io(raw, "c.txt");
        assert_eq!(err.kind(), ErrorKind::IoError);
        assert!(!err.to_string().contains("/srv/secret"));
        assert!(err.to_string().contains("c.txt"));
    }
}
