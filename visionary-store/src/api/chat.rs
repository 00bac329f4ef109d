//! Visitor-facing chat widget endpoints

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use visionary_common::chat::{Party, VisitorId};
use visionary_common::{ChatSession, MessageKind, Sender};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Largest accepted attachment body
pub const MAX_ATTACHMENT_BYTES: usize = 50 * 1024 * 1024;

pub(crate) fn parse_visitor(raw: &str) -> ApiResult<VisitorId> {
    raw.parse::<VisitorId>().map_err(ApiError::from)
}

#[derive(Debug, Serialize)]
pub struct VisitorResponse {
    pub visitor_id: VisitorId,
    pub display_name: String,
}

/// POST /api/visitors
///
/// Issues a fresh visitor token; the client keeps it and sends it back.
pub async fn create_visitor() -> (StatusCode, Json<VisitorResponse>) {
    let visitor = VisitorId::generate();
    (
        StatusCode::CREATED,
        Json(VisitorResponse {
            display_name: visitor.display_name(),
            visitor_id: visitor,
        }),
    )
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub open: bool,
}

/// GET /api/chat/:visitor_id?open=bool
pub async fn get_session(
    State(state): State<AppState>,
    Path(visitor_id): Path<String>,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Json<ChatSession>> {
    let visitor = parse_visitor(&visitor_id)?;
    Ok(Json(state.chat.open_session(&visitor, query.open).await?))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// POST /api/chat/:visitor_id/messages
pub async fn send_message(
    State(state): State<AppState>,
    Path(visitor_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Json<ChatSession>> {
    let visitor = parse_visitor(&visitor_id)?;
    let session = state
        .chat
        .send(&visitor, Sender::Customer, MessageKind::Text, &req.content)
        .await?;
    Ok(Json(session))
}

/// POST /api/chat/:visitor_id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Path(visitor_id): Path<String>,
) -> ApiResult<Json<ChatSession>> {
    let visitor = parse_visitor(&visitor_id)?;
    Ok(Json(state.chat.mark_read(visitor.as_str(), Party::Customer).await?))
}

#[derive(Debug, Deserialize)]
pub struct AttachmentQuery {
    pub filename: Option<String>,
}

/// POST /api/chat/:visitor_id/attachments?filename=…
///
/// Raw file body; the Content-Type header decides image vs video.
pub async fn upload_attachment(
    State(state): State<AppState>,
    Path(visitor_id): Path<String>,
    Query(query): Query<AttachmentQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ChatSession>> {
    let visitor = parse_visitor(&visitor_id)?;
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Content-Type header is required".to_string()))?;

    let session = state
        .chat
        .upload_attachment(
            &visitor,
            Sender::Customer,
            query.filename.as_deref(),
            content_type,
            body.to_vec(),
        )
        .await?;
    Ok(Json(session))
}
