//! Admin passcode gate
//!
//! A correct passcode buys an opaque bearer token held in memory; restarting
//! the service logs every admin out. An empty passcode disables the gate.

use std::collections::HashSet;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub struct AdminAuth {
    passcode: String,
    tokens: RwLock<HashSet<String>>,
}

impl AdminAuth {
    pub fn new(passcode: impl Into<String>) -> Self {
        Self {
            passcode: passcode.into(),
            tokens: RwLock::new(HashSet::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.passcode.is_empty()
    }

    /// Issue a token for the right passcode
    pub async fn login(&self, passcode: &str) -> Option<String> {
        if self.is_enabled() && passcode != self.passcode {
            return None;
        }
        let token = Uuid::new_v4().to_string();
        self.tokens.write().await.insert(token.clone());
        Some(token)
    }

    pub async fn verify(&self, token: &str) -> bool {
        self.tokens.read().await.contains(token)
    }

    pub async fn logout(&self, token: &str) -> bool {
        self.tokens.write().await.remove(token)
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Bearer-token check for the admin routes
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Empty passcode disables the gate
    if !state.admin.is_enabled() {
        return Ok(next.run(request).await);
    }

    match bearer_token(&request) {
        Some(token) if state.admin.verify(token).await => Ok(next.run(request).await),
        Some(_) => {
            warn!("Rejected admin request with unknown token");
            Err(ApiError::Unauthorized("Invalid or expired admin token".to_string()))
        }
        None => Err(ApiError::Unauthorized("Missing bearer token".to_string())),
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub passcode: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// POST /api/admin/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    match state.admin.login(req.passcode.trim()).await {
        Some(token) => {
            info!("Admin logged in");
            Ok(Json(LoginResponse { token }))
        }
        None => {
            warn!("Admin login failed: wrong passcode");
            Err(ApiError::Unauthorized("Incorrect passcode".to_string()))
        }
    }
}

/// POST /api/admin/logout
pub async fn logout(State(state): State<AppState>, request: Request) -> Json<serde_json::Value> {
    let revoked = match bearer_token(&request) {
        Some(token) => state.admin.logout(token).await,
        None => false,
    };
    Json(serde_json::json!({ "logged_out": revoked }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_issues_verifiable_token() {
        let auth = AdminAuth::new("8888");
        assert!(auth.login("0000").await.is_none());

        let token = auth.login("8888").await.unwrap();
        assert!(auth.verify(&token).await);
        assert!(!auth.verify("forged").await);

        assert!(auth.logout(&token).await);
        assert!(!auth.verify(&token).await);
    }

    #[tokio::test]
    async fn test_empty_passcode_disables_gate() {
        let auth = AdminAuth::new("");
        assert!(!auth.is_enabled());
        assert!(auth.login("anything").await.is_some());
    }
}
