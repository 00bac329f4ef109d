//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::storefront::DataSource;
use crate::AppState;

/// Returns status, module name and version, plus which backend serves the
/// catalog right now
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub backend: String,
    pub data_source: DataSource,
}

/// GET /health
///
/// Does not require authentication.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (data_source, _) = state.storefront.data_source().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "visionary-store".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.storefront.backend_name().to_string(),
        data_source,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
