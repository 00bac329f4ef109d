//! Public storefront endpoints: site copy, catalog, template detail

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use visionary_common::catalog::{CatalogFilter, TagFilter};
use visionary_common::models::Locale;
use visionary_common::Template;

use crate::error::{ApiError, ApiResult};
use crate::storefront::{SiteView, TemplateDetail};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SiteQuery {
    pub locale: Option<String>,
}

/// GET /api/site?locale=zh|en
pub async fn get_site(
    State(state): State<AppState>,
    Query(query): Query<SiteQuery>,
) -> ApiResult<Json<SiteView>> {
    let locale = match query.locale.as_deref() {
        Some(raw) if !raw.trim().is_empty() => raw.parse::<Locale>()?,
        _ => Locale::default(),
    };
    Ok(Json(state.storefront.site_view(locale).await))
}

#[derive(Debug, Deserialize)]
pub struct TemplatesQuery {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub tag: TagFilter,
}

#[derive(Debug, Serialize)]
pub struct TemplatesResponse {
    pub templates: Vec<Template>,
    pub count: usize,
}

/// GET /api/templates?search=&tag=
pub async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<TemplatesQuery>,
) -> Json<TemplatesResponse> {
    let filter = CatalogFilter::new(query.search, query.tag);
    let templates = state.storefront.templates(&filter).await;
    Json(TemplatesResponse {
        count: templates.len(),
        templates,
    })
}

/// GET /api/tags
pub async fn list_tags(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.storefront.tags().await)
}

/// GET /api/templates/:id
pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TemplateDetail>> {
    state
        .storefront
        .detail(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Template {}", id)))
}

#[derive(Debug, Deserialize)]
pub struct ContactPromptQuery {
    pub template_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContactPromptResponse {
    pub prompt: String,
}

/// GET /api/contact-prompt?template_id=
pub async fn get_contact_prompt(
    State(state): State<AppState>,
    Query(query): Query<ContactPromptQuery>,
) -> Json<ContactPromptResponse> {
    let id = query.template_id.as_deref().filter(|id| !id.is_empty());
    Json(ContactPromptResponse {
        prompt: state.storefront.contact_prompt(id).await,
    })
}
