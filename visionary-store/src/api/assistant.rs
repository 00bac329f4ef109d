//! AI assistant panel endpoints
//!
//! The server holds no assistant state: the client sends its transcript back
//! with each question and receives the extended one.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;
use visionary_assistant::{
    AssistantError, AssistantTranscript, ImagePayload, DEFAULT_IMAGE_PROMPT, IMAGE_ANALYSIS_FAILED,
};
use visionary_common::ChatMessage;

use crate::error::ApiResult;
use crate::AppState;

/// Largest accepted analyze request (base64 inflates images by a third)
pub const MAX_ANALYZE_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct AssistantChatRequest {
    /// Transcript so far; empty starts a new one with the welcome message
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AssistantChatResponse {
    pub messages: Vec<ChatMessage>,
    pub reply: Option<ChatMessage>,
}

/// POST /api/assistant/chat
///
/// Blank input leaves the transcript as is and returns no reply.
pub async fn assistant_chat(
    State(state): State<AppState>,
    Json(req): Json<AssistantChatRequest>,
) -> Json<AssistantChatResponse> {
    let mut transcript = AssistantTranscript::from_messages(req.messages);
    let reply = transcript
        .ask(state.assistant.as_ref(), &req.message)
        .await
        .cloned();

    Json(AssistantChatResponse {
        messages: transcript.into_messages(),
        reply,
    })
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// Data URL or bare base64
    pub image: String,
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub text: String,
}

/// POST /api/assistant/analyze
///
/// A malformed image is a 400; a failed model call still answers 200 with
/// the canned failure text.
pub async fn analyze_image(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let image = ImagePayload::parse(&req.image)?;
    let prompt = req
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_IMAGE_PROMPT);

    let text = match state.assistant.describe_image(&image, prompt).await {
        Ok(text) => text,
        Err(e @ AssistantError::InvalidImage(_)) => return Err(e.into()),
        Err(e) => {
            warn!("Image analysis failed: {}", e);
            IMAGE_ANALYSIS_FAILED.to_string()
        }
    };

    Ok(Json(AnalyzeResponse { text }))
}
