//! # Visionary Assistant
//!
//! AI helper for the storefront: a conversational assistant that answers
//! questions about templates and editing, and an image analyzer that suggests
//! a matching template style for an uploaded still.

pub mod error;
pub mod gemini;
pub mod image;
pub mod transcript;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::{AssistantError, Result};
pub use gemini::GeminiClient;
pub use image::ImagePayload;
pub use transcript::AssistantTranscript;

pub const SYSTEM_INSTRUCTION: &str = "You are a professional assistant for a video production website. \
Answer questions about video templates, editing techniques and the site's features. \
Reply in Chinese unless the user writes in another language. \
Be professional, enthusiastic and helpful.";

pub const ASSISTANT_WELCOME: &str =
    "Hello! I'm your AI video assistant. Ask me anything about templates, editing or creative ideas.";

/// Shown in the transcript when the assistant call fails
pub const CHAT_APOLOGY: &str =
    "Sorry, something went wrong reaching the AI service. Please check your network or try again later.";

pub const EMPTY_CHAT_REPLY: &str = "Sorry, I couldn't generate a reply.";
pub const EMPTY_IMAGE_REPLY: &str = "Unable to analyze this image.";
pub const IMAGE_ANALYSIS_FAILED: &str = "Image analysis failed, please try again.";

pub const DEFAULT_IMAGE_PROMPT: &str = "Describe this image or video frame in detail, \
and suggest which video template or editing style suits it best.";

/// Conversation role as the model API names it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One prior turn of conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Text-generation backend behind the assistant features
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Reply to `message` given the prior `history`
    async fn chat(&self, history: &[Turn], message: &str) -> Result<String>;

    /// Describe an image according to `prompt`
    async fn describe_image(&self, image: &ImagePayload, prompt: &str) -> Result<String>;
}

/// Stand-in used when no API key is configured; every call fails
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredAssistant;

#[async_trait]
impl Assistant for UnconfiguredAssistant {
    async fn chat(&self, _history: &[Turn], _message: &str) -> Result<String> {
        Err(AssistantError::NotConfigured)
    }

    async fn describe_image(&self, _image: &ImagePayload, _prompt: &str) -> Result<String> {
        Err(AssistantError::NotConfigured)
    }
}
