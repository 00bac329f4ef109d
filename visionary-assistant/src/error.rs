//! Assistant client errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// No API key configured
    #[error("Assistant is not configured")]
    NotConfigured,
}
