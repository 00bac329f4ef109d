//! REST client for the hosted backend
//!
//! Tables are reached at `{url}/rest/v1/{table}` with PostgREST filter syntax
//! (`column=eq.value`, `order=column.desc`); blobs at
//! `{url}/storage/v1/object/{bucket}/{path}`. Every request carries the
//! project key as both `apikey` and bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, info};
use visionary_common::schema::{
    self, SessionPatch, SettingRow, CHAT_SESSIONS_TABLE, SETTINGS_TABLE, TEMPLATES_TABLE,
};
use visionary_common::{ChatSession, Error, Result, Template};

use super::Backend;

const USER_AGENT: &str = concat!("visionary-store/", env!("CARGO_PKG_VERSION"));

pub struct RestBackend {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestBackend {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{url}/storage/v1/object/public/{bucket}/{path}`
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, path)
    }

    fn table(&self, method: Method, table: &str) -> RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        self.authorized(self.http_client.request(method, url))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::Backend(error_message(status.as_u16(), &body)))
    }

    async fn select(&self, request: RequestBuilder) -> Result<Vec<Value>> {
        let response = Self::send(request).await?;
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| Error::Backend(format!("Unexpected response: {}", e)))
    }
}

/// The backend's own error text when it sent one, else the status line
fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error_description", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                format!("HTTP {}: {}", status, body.trim())
            }
        })
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl Backend for RestBackend {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn fetch_templates(&self) -> Result<Vec<Template>> {
        let rows = self
            .select(
                self.table(Method::GET, TEMPLATES_TABLE)
                    .query(&[("select", "*"), ("order", "id.desc")]),
            )
            .await?;
        debug!(rows = rows.len(), "Fetched templates");
        schema::templates_from_rows(rows)
    }

    async fn insert_template(&self, template: &Template) -> Result<()> {
        Self::send(
            self.table(Method::POST, TEMPLATES_TABLE)
                .header("Prefer", "return=minimal")
                .json(&vec![schema::template_to_row(template)]),
        )
        .await?;
        info!(id = %template.id, "Inserted template");
        Ok(())
    }

    async fn update_template(&self, template: &Template) -> Result<()> {
        Self::send(
            self.table(Method::PATCH, TEMPLATES_TABLE)
                .query(&[("id", eq(&template.id))])
                .header("Prefer", "return=minimal")
                .json(&schema::template_to_row(template)),
        )
        .await?;
        info!(id = %template.id, "Updated template");
        Ok(())
    }

    async fn delete_template(&self, id: &str) -> Result<()> {
        Self::send(
            self.table(Method::DELETE, TEMPLATES_TABLE)
                .query(&[("id", eq(id))]),
        )
        .await?;
        info!(id = %id, "Deleted template");
        Ok(())
    }

    async fn fetch_settings(&self) -> Result<Vec<SettingRow>> {
        let rows = self
            .select(self.table(Method::GET, SETTINGS_TABLE).query(&[("select", "*")]))
            .await?;
        schema::setting_rows_from_values(rows)
    }

    async fn upsert_settings(&self, rows: &[SettingRow]) -> Result<()> {
        Self::send(
            self.table(Method::POST, SETTINGS_TABLE)
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(rows),
        )
        .await?;
        info!(keys = rows.len(), "Upserted settings");
        Ok(())
    }

    async fn fetch_session(&self, session_id: &str) -> Result<Option<ChatSession>> {
        let rows = self
            .select(
                self.table(Method::GET, CHAT_SESSIONS_TABLE)
                    .query(&[("select", "*".to_string()), ("session_id", eq(session_id))]),
            )
            .await?;
        rows.into_iter().next().map(schema::session_from_row).transpose()
    }

    async fn fetch_sessions(&self) -> Result<Vec<ChatSession>> {
        let rows = self
            .select(
                self.table(Method::GET, CHAT_SESSIONS_TABLE)
                    .query(&[("select", "*"), ("order", "last_updated.desc")]),
            )
            .await?;
        schema::sessions_from_rows(rows)
    }

    async fn insert_session(&self, session: &ChatSession) -> Result<()> {
        Self::send(
            self.table(Method::POST, CHAT_SESSIONS_TABLE)
                .header("Prefer", "return=minimal")
                .json(&vec![schema::session_to_row(session)]),
        )
        .await?;
        info!(session_id = %session.session_id, "Created chat session");
        Ok(())
    }

    async fn update_session(&self, session_id: &str, patch: &SessionPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        Self::send(
            self.table(Method::PATCH, CHAT_SESSIONS_TABLE)
                .query(&[("session_id", eq(session_id))])
                .header("Prefer", "return=minimal")
                .json(&patch.to_row()),
        )
        .await?;
        debug!(session_id = %session_id, "Updated chat session");
        Ok(())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path);
        let size = bytes.len();
        Self::send(
            self.authorized(self.http_client.post(url))
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(bytes),
        )
        .await?;
        info!(bucket = %bucket, path = %path, bytes = size, "Uploaded object");
        Ok(self.public_url(bucket, path))
    }
}
