//! Generative-language API client
//!
//! Plain `generateContent` calls: no streaming, no retries. The request
//! timeout comes from service configuration.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AssistantError, Result};
use crate::image::ImagePayload;
use crate::{Assistant, Role, Turn, EMPTY_CHAT_REPLY, EMPTY_IMAGE_REPLY, SYSTEM_INSTRUCTION};

const USER_AGENT: &str = concat!("Visionary/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub contents: Vec<Content>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn image(image: &ImagePayload) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: image.mime_type.clone(),
                data: image.data.clone(),
            }),
        }
    }
}

impl Content {
    fn turn(role: Role, text: &str) -> Self {
        Self {
            role: Some(role.as_str().to_string()),
            parts: vec![Part::text(text)],
        }
    }
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Client for `POST {base}/models/{model}:generateContent`
pub struct GeminiClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AssistantError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        debug!(model = %self.model, contents = request.contents.len(), "Calling generateContent");

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| AssistantError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AssistantError::ApiError(status.as_u16(), error_text));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::ParseError(e.to_string()))?;

        info!(
            model = %self.model,
            candidates = parsed.candidates.len(),
            "generateContent succeeded"
        );

        Ok(parsed)
    }
}

/// Conversation request: fixed system instruction, prior turns, new message
pub fn chat_request(history: &[Turn], message: &str) -> GenerateRequest {
    let mut contents: Vec<Content> = history
        .iter()
        .map(|turn| Content::turn(turn.role, &turn.text))
        .collect();
    contents.push(Content::turn(Role::User, message));

    GenerateRequest {
        system_instruction: Some(Content {
            role: None,
            parts: vec![Part::text(SYSTEM_INSTRUCTION)],
        }),
        contents,
    }
}

/// Single-turn multimodal request: the image, then the prompt
pub fn image_request(image: &ImagePayload, prompt: &str) -> GenerateRequest {
    GenerateRequest {
        system_instruction: None,
        contents: vec![Content {
            role: Some(Role::User.as_str().to_string()),
            parts: vec![Part::image(image), Part::text(prompt)],
        }],
    }
}

#[async_trait]
impl Assistant for GeminiClient {
    async fn chat(&self, history: &[Turn], message: &str) -> Result<String> {
        let text = self.generate(&chat_request(history, message)).await?.text();
        if text.trim().is_empty() {
            Ok(EMPTY_CHAT_REPLY.to_string())
        } else {
            Ok(text)
        }
    }

    async fn describe_image(&self, image: &ImagePayload, prompt: &str) -> Result<String> {
        let text = self.generate(&image_request(image, prompt)).await?.text();
        if text.trim().is_empty() {
            Ok(EMPTY_IMAGE_REPLY.to_string())
        } else {
            Ok(text)
        }
    }
}
