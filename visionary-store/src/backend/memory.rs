//! In-process backend
//!
//! Mirrors the hosted service's observable behavior (ordering, upsert by key,
//! unique ids, silent no-op on unmatched updates) so the service can run
//! offline and be tested without a network.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use visionary_common::schema::{SessionPatch, SettingRow};
use visionary_common::{ChatSession, Error, Result, Template};

use super::Backend;

#[derive(Default)]
struct Tables {
    templates: Vec<Template>,
    settings: BTreeMap<String, SettingRow>,
    sessions: HashMap<String, ChatSession>,
    objects: HashMap<String, (String, Vec<u8>)>,
}

#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
    unreachable: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_templates(templates: Vec<Template>) -> Self {
        Self {
            tables: RwLock::new(Tables {
                templates,
                ..Default::default()
            }),
            unreachable: AtomicBool::new(false),
        }
    }

    /// Simulate an outage: every call fails until switched back
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, AtomicOrdering::SeqCst);
    }

    /// Stored object bytes and content type
    pub async fn object(&self, bucket: &str, path: &str) -> Option<(String, Vec<u8>)> {
        self.tables
            .read()
            .await
            .objects
            .get(&object_key(bucket, path))
            .cloned()
    }

    fn check(&self) -> Result<()> {
        if self.unreachable.load(AtomicOrdering::SeqCst) {
            Err(Error::Http("memory backend unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

fn object_key(bucket: &str, path: &str) -> String {
    format!("{}/{}", bucket, path)
}

/// Numeric ids compare numerically, everything else lexically
fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_templates(&self) -> Result<Vec<Template>> {
        self.check()?;
        let mut templates = self.tables.read().await.templates.clone();
        templates.sort_by(|a, b| compare_ids(&b.id, &a.id));
        Ok(templates)
    }

    async fn insert_template(&self, template: &Template) -> Result<()> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if tables.templates.iter().any(|t| t.id == template.id) {
            return Err(Error::Backend(format!(
                "duplicate key value violates unique constraint (id={})",
                template.id
            )));
        }
        tables.templates.push(template.clone());
        Ok(())
    }

    async fn update_template(&self, template: &Template) -> Result<()> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.templates.iter_mut().find(|t| t.id == template.id) {
            *existing = template.clone();
        }
        Ok(())
    }

    async fn delete_template(&self, id: &str) -> Result<()> {
        self.check()?;
        self.tables.write().await.templates.retain(|t| t.id != id);
        Ok(())
    }

    async fn fetch_settings(&self) -> Result<Vec<SettingRow>> {
        self.check()?;
        Ok(self.tables.read().await.settings.values().cloned().collect())
    }

    async fn upsert_settings(&self, rows: &[SettingRow]) -> Result<()> {
        self.check()?;
        let mut tables = self.tables.write().await;
        for row in rows {
            tables.settings.insert(row.key.clone(), row.clone());
        }
        Ok(())
    }

    async fn fetch_session(&self, session_id: &str) -> Result<Option<ChatSession>> {
        self.check()?;
        Ok(self.tables.read().await.sessions.get(session_id).cloned())
    }

    async fn fetch_sessions(&self) -> Result<Vec<ChatSession>> {
        self.check()?;
        let mut sessions: Vec<ChatSession> =
            self.tables.read().await.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(sessions)
    }

    async fn insert_session(&self, session: &ChatSession) -> Result<()> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if tables.sessions.contains_key(&session.session_id) {
            return Err(Error::Backend(format!(
                "duplicate key value violates unique constraint (session_id={})",
                session.session_id
            )));
        }
        tables
            .sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn update_session(&self, session_id: &str, patch: &SessionPatch) -> Result<()> {
        self.check()?;
        if let Some(session) = self.tables.write().await.sessions.get_mut(session_id) {
            patch.apply(session);
        }
        Ok(())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String> {
        self.check()?;
        let key = object_key(bucket, path);
        let mut tables = self.tables.write().await;
        if tables.objects.contains_key(&key) {
            return Err(Error::Backend(format!("The resource already exists: {}", key)));
        }
        tables.objects.insert(key, (content_type.to_string(), bytes));
        Ok(format!("memory://{}/{}", bucket, path))
    }
}
