//! Common error types for the Visionary crates

use thiserror::Error;

/// Common result type for storefront operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the storefront crates
#[derive(Error, Debug)]
pub enum Error {
    /// Hosted backend rejected a query or write (message is the backend's own text)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Transport-level failure talking to an external service
    #[error("HTTP error: {0}")]
    Http(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Row could not be mapped to or from an entity
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
