//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Server returned an error reply.
    #[error("SMTP error {code}: {message}")]
    Smtp {
        /// Reply code (e.g. 550).
        code: u16,
        /// Error message from the server.
        message: String,
    },

    /// Protocol error (malformed or unexpected response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp(code: u16, message: impl Into<String>) -> Self {
        Self::Smtp {
            code,
            message: message.into(),
        }
    }

    /// Returns true if this is a permanent server error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Smtp { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient server error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Smtp { code, .. } if *code >= 400 && *code < 500)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_smtp_error_display() {
        let err = Error::smtp(550, "Mailbox unavailable");
        assert_eq!(err.to_string(), "SMTP error 550: Mailbox unavailable");
    }

    #[test]
    fn test_permanent_classification() {
        assert!(Error::smtp(550, "no").is_permanent());
        assert!(!Error::smtp(550, "no").is_transient());
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::smtp(451, "try later").is_transient());
        assert!(!Error::smtp(451, "try later").is_permanent());
    }

    #[test]
    fn test_non_smtp_errors_are_neither() {
        let err = Error::Protocol("bad reply".into());
        assert!(!err.is_permanent());
        assert!(!err.is_transient());
    }
}
