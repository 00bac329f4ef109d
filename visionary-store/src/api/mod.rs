//! HTTP API handlers for visionary-store

pub mod admin;
pub mod assistant;
pub mod auth;
pub mod buildinfo;
pub mod catalog;
pub mod chat;
pub mod health;
pub mod sse;

pub use admin::{
    create_template, delete_template, list_sessions, reorder_templates, reply, select_session,
    update_settings, update_site_content, update_template,
};
pub use assistant::{analyze_image, assistant_chat};
pub use auth::{auth_middleware, login, logout, AdminAuth};
pub use buildinfo::get_build_info;
pub use catalog::{get_contact_prompt, get_site, get_template, list_tags, list_templates};
pub use chat::{create_visitor, get_session, mark_read, send_message, upload_attachment};
pub use health::health_routes;
pub use sse::{admin_events, chat_events, storefront_events};
