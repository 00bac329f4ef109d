//! Admin back-office endpoints (bearer-protected)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use visionary_common::catalog::Direction;
use visionary_common::models::SiteSettings;
use visionary_common::{ChatSession, SiteContent, Template};

use crate::error::ApiResult;
use crate::storefront::TemplateDraft;
use crate::AppState;

// ========================================
// Templates
// ========================================

/// POST /api/admin/templates
pub async fn create_template(
    State(state): State<AppState>,
    Json(draft): Json<TemplateDraft>,
) -> ApiResult<(StatusCode, Json<Template>)> {
    let template = state.storefront.create_template(draft).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

/// PUT /api/admin/templates/:id
pub async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<TemplateDraft>,
) -> ApiResult<Json<Template>> {
    Ok(Json(state.storefront.update_template(&id, draft).await?))
}

/// DELETE /api/admin/templates/:id
pub async fn delete_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.storefront.delete_template(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub index: usize,
    pub direction: Direction,
}

#[derive(Debug, Serialize)]
pub struct ReorderResponse {
    pub ids: Vec<String>,
}

/// POST /api/admin/templates/reorder
pub async fn reorder_templates(
    State(state): State<AppState>,
    Json(req): Json<ReorderRequest>,
) -> ApiResult<Json<ReorderResponse>> {
    let ids = state.storefront.reorder(req.index, req.direction).await?;
    Ok(Json(ReorderResponse { ids }))
}

// ========================================
// Settings
// ========================================

#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    pub contact_handle: Option<String>,
    pub learning_url: Option<String>,
}

/// PUT /api/admin/settings
pub async fn update_settings(
    State(state): State<AppState>,
    Json(req): Json<SettingsRequest>,
) -> ApiResult<Json<SiteSettings>> {
    let settings = state
        .storefront
        .update_settings(req.contact_handle, req.learning_url)
        .await?;
    info!("Settings saved");
    Ok(Json(settings))
}

/// PUT /api/admin/site-content
pub async fn update_site_content(
    State(state): State<AppState>,
    Json(content): Json<SiteContent>,
) -> ApiResult<Json<SiteContent>> {
    Ok(Json(state.storefront.update_site_content(content).await?))
}

// ========================================
// Chat console
// ========================================

/// GET /api/admin/chat/sessions
pub async fn list_sessions(State(state): State<AppState>) -> ApiResult<Json<Vec<ChatSession>>> {
    Ok(Json(state.chat.list_sessions().await?))
}

/// POST /api/admin/chat/sessions/:id/select
pub async fn select_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ChatSession>> {
    Ok(Json(state.chat.select_session(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub content: String,
}

/// POST /api/admin/chat/sessions/:id/messages
pub async fn reply(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReplyRequest>,
) -> ApiResult<Json<ChatSession>> {
    Ok(Json(state.chat.reply(&id, &req.content).await?))
}
