//! Image payloads for multimodal requests

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{AssistantError, Result};

pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Base64 image data plus its MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    /// Base64 text, validated but not decoded
    pub data: String,
}

impl ImagePayload {
    /// Parse a `data:<mime>;base64,<payload>` URL or bare base64
    ///
    /// The MIME type defaults to `image/jpeg` when the input is not a data URL
    /// or its prefix carries no usable type.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        let (mime_type, data) = match input.split_once(',') {
            Some((prefix, data)) if prefix.starts_with("data:") => (mime_from_prefix(prefix), data),
            Some((_, data)) => (DEFAULT_IMAGE_MIME.to_string(), data),
            None => (DEFAULT_IMAGE_MIME.to_string(), input),
        };

        let data: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        if data.is_empty() {
            return Err(AssistantError::InvalidImage("empty image data".to_string()));
        }

        STANDARD
            .decode(data.as_bytes())
            .map_err(|e| AssistantError::InvalidImage(format!("not valid base64: {}", e)))?;

        Ok(Self { mime_type, data })
    }
}

/// `data:image/png;base64` -> `image/png`
fn mime_from_prefix(prefix: &str) -> String {
    let mime = prefix
        .trim_start_matches("data:")
        .split(';')
        .next()
        .unwrap_or_default()
        .trim();

    let valid = mime
        .split_once('/')
        .map(|(kind, sub)| {
            !kind.is_empty()
                && !sub.is_empty()
                && kind.chars().all(|c| c.is_ascii_alphanumeric())
                && sub
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '+'))
        })
        .unwrap_or(false);

    if valid {
        mime.to_string()
    } else {
        DEFAULT_IMAGE_MIME.to_string()
    }
}
