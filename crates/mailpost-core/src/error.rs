//! Error types for the core library.

use thiserror::Error;

/// Errors surfaced to resource callers.
///
/// The `Display` text of each variant is the user-facing diagnostic line.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration resolution or validation failed.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// The send pipeline failed.
    #[error(transparent)]
    Dispatch(#[from] crate::dispatch::DispatchError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
