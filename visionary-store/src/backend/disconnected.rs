//! Backend used when no credentials are configured

use async_trait::async_trait;
use visionary_common::schema::{SessionPatch, SettingRow};
use visionary_common::{ChatSession, Error, Result, Template};

use super::Backend;

/// Fails every call with the same reason, so the storefront falls back to
/// its built-in catalog and shows the reason in the connection banner.
pub struct DisconnectedBackend {
    reason: String,
}

impl DisconnectedBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> Result<T> {
        Err(Error::Backend(self.reason.clone()))
    }
}

impl Default for DisconnectedBackend {
    fn default() -> Self {
        Self::new("Backend not configured: set backend_url and backend_key")
    }
}

#[async_trait]
impl Backend for DisconnectedBackend {
    fn name(&self) -> &'static str {
        "disconnected"
    }

    async fn fetch_templates(&self) -> Result<Vec<Template>> {
        self.fail()
    }

    async fn insert_template(&self, _template: &Template) -> Result<()> {
        self.fail()
    }

    async fn update_template(&self, _template: &Template) -> Result<()> {
        self.fail()
    }

    async fn delete_template(&self, _id: &str) -> Result<()> {
        self.fail()
    }

    async fn fetch_settings(&self) -> Result<Vec<SettingRow>> {
        self.fail()
    }

    async fn upsert_settings(&self, _rows: &[SettingRow]) -> Result<()> {
        self.fail()
    }

    async fn fetch_session(&self, _session_id: &str) -> Result<Option<ChatSession>> {
        self.fail()
    }

    async fn fetch_sessions(&self) -> Result<Vec<ChatSession>> {
        self.fail()
    }

    async fn insert_session(&self, _session: &ChatSession) -> Result<()> {
        self.fail()
    }

    async fn update_session(&self, _session_id: &str, _patch: &SessionPatch) -> Result<()> {
        self.fail()
    }

    async fn upload_object(
        &self,
        _bucket: &str,
        _path: &str,
        _content_type: &str,
        _bytes: Vec<u8>,
    ) -> Result<String> {
        self.fail()
    }
}
