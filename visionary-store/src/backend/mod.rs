//! Hosted backend access
//!
//! The storefront talks to its relational store and blob storage only through
//! [`Backend`]. Three implementations exist:
//! - [`RestBackend`]: the hosted service over its REST conventions
//! - [`MemoryBackend`]: in-process, for `--offline` demo mode and tests
//! - [`DisconnectedBackend`]: credentials missing; every call fails

mod disconnected;
mod memory;
mod rest;

use async_trait::async_trait;
use visionary_common::schema::{SessionPatch, SettingRow};
use visionary_common::{ChatSession, Result, Template};

pub use disconnected::DisconnectedBackend;
pub use memory::MemoryBackend;
pub use rest::RestBackend;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name for logs and `/health`
    fn name(&self) -> &'static str;

    /// All templates, newest id first
    async fn fetch_templates(&self) -> Result<Vec<Template>>;

    async fn insert_template(&self, template: &Template) -> Result<()>;

    /// Overwrite the row with `template.id`
    async fn update_template(&self, template: &Template) -> Result<()>;

    async fn delete_template(&self, id: &str) -> Result<()>;

    async fn fetch_settings(&self) -> Result<Vec<SettingRow>>;

    /// Insert or replace by key
    async fn upsert_settings(&self, rows: &[SettingRow]) -> Result<()>;

    async fn fetch_session(&self, session_id: &str) -> Result<Option<ChatSession>>;

    /// All sessions, most recently updated first
    async fn fetch_sessions(&self) -> Result<Vec<ChatSession>>;

    async fn insert_session(&self, session: &ChatSession) -> Result<()>;

    async fn update_session(&self, session_id: &str, patch: &SessionPatch) -> Result<()>;

    /// Store an object and return its public URL
    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String>;
}
