//! # Visionary Common Library
//!
//! Shared code for the Visionary storefront crates:
//! - Entities (templates, chat sessions, site copy, settings)
//! - Schema mapping between backend rows and entities
//! - Catalog filtering, reordering and recommendations
//! - Video-link normalization for the template detail view
//! - Chat session rules (visitor identity, unread counters)
//! - Event types and the EventBus change feed
//! - Configuration loading

pub mod catalog;
pub mod chat;
pub mod config;
pub mod embed;
pub mod error;
pub mod events;
pub mod models;
pub mod schema;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
pub use models::{ChatMessage, ChatSession, MessageKind, Sender, SiteContent, Template};
