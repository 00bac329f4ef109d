//! visionary-store library - storefront, chat and admin service
//!
//! Serves the template catalog from the hosted backend (or the built-in
//! samples when it is unreachable), the visitor chat widget, the admin
//! back-office and the AI assistant panel.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use visionary_assistant::Assistant;
use visionary_common::config::StoreConfig;
use visionary_common::events::EventBus;
use visionary_common::models::SiteSettings;

pub mod api;
pub mod backend;
pub mod chat;
pub mod error;
pub mod feed;
pub mod storefront;

use crate::api::AdminAuth;
use crate::backend::Backend;
use crate::chat::ChatDesk;
use crate::storefront::Storefront;

/// Event bus capacity; a subscriber further behind than this skips ahead
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub storefront: Arc<Storefront>,
    pub chat: Arc<ChatDesk>,
    pub assistant: Arc<dyn Assistant>,
    pub bus: EventBus,
    pub admin: Arc<AdminAuth>,
}

impl AppState {
    /// Wire the services around one backend and one event bus
    pub fn new(backend: Arc<dyn Backend>, assistant: Arc<dyn Assistant>, config: &StoreConfig) -> Self {
        let bus = EventBus::new(EVENT_BUS_CAPACITY);
        let defaults = SiteSettings {
            contact_handle: config.contact_handle.clone(),
            ..SiteSettings::default()
        };

        Self {
            storefront: Arc::new(Storefront::new(backend.clone(), bus.clone(), defaults)),
            chat: Arc::new(ChatDesk::new(backend, bus.clone(), config.welcome_message.clone())),
            assistant,
            bus,
            admin: Arc::new(AdminAuth::new(config.admin_passcode.clone())),
        }
    }
}

/// Build application router
///
/// `/health`, the storefront, chat and assistant routes are public; admin
/// routes past `/api/admin/login` need a bearer token.
pub fn build_router(state: AppState) -> Router {
    use axum::extract::DefaultBodyLimit;
    use axum::middleware;
    use axum::routing::{get, post, put};

    // Protected routes (admin token)
    let protected = Router::new()
        .route("/api/admin/logout", post(api::logout))
        .route("/api/admin/templates", post(api::create_template))
        .route("/api/admin/templates/reorder", post(api::reorder_templates))
        .route(
            "/api/admin/templates/:id",
            put(api::update_template).delete(api::delete_template),
        )
        .route("/api/admin/settings", put(api::update_settings))
        .route("/api/admin/site-content", put(api::update_site_content))
        .route("/api/admin/chat/sessions", get(api::list_sessions))
        .route("/api/admin/chat/sessions/:id/select", post(api::select_session))
        .route("/api/admin/chat/sessions/:id/messages", post(api::reply))
        .route("/api/admin/events", get(api::admin_events))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes
    let public = Router::new()
        .route("/api/buildinfo", get(api::get_build_info))
        .route("/api/site", get(api::get_site))
        .route("/api/templates", get(api::list_templates))
        .route("/api/templates/:id", get(api::get_template))
        .route("/api/tags", get(api::list_tags))
        .route("/api/contact-prompt", get(api::get_contact_prompt))
        .route("/api/events", get(api::storefront_events))
        .route("/api/visitors", post(api::create_visitor))
        .route("/api/chat/:visitor_id", get(api::get_session))
        .route("/api/chat/:visitor_id/messages", post(api::send_message))
        .route("/api/chat/:visitor_id/read", post(api::mark_read))
        .route(
            "/api/chat/:visitor_id/attachments",
            post(api::upload_attachment)
                .layer(DefaultBodyLimit::max(api::chat::MAX_ATTACHMENT_BYTES)),
        )
        .route("/api/chat/:visitor_id/events", get(api::chat_events))
        .route("/api/assistant/chat", post(api::assistant_chat))
        .route(
            "/api/assistant/analyze",
            post(api::analyze_image).layer(DefaultBodyLimit::max(api::assistant::MAX_ANALYZE_BYTES)),
        )
        .route("/api/admin/login", post(api::login))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
