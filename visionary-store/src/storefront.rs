//! Storefront state: catalog snapshot, site copy and admin catalog operations
//!
//! The snapshot is replaced wholesale on every refresh. Writes go to the
//! backend first; on success the affected collection is re-fetched and a
//! [`StoreEvent`] is emitted for SSE clients.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;
use visionary_common::catalog::{
    self, move_item, recommendations, CatalogFilter, Direction, ALL_TAGS, RECOMMENDATION_LIMIT,
};
use visionary_common::embed::{self, PlayerView};
use visionary_common::events::{EventBus, StoreEvent};
use visionary_common::models::{Locale, SiteSettings};
use visionary_common::schema::{self, keys, SettingRow};
use visionary_common::{chat, time, Error, Result, SiteContent, Template};

use crate::backend::Backend;

/// Where the current catalog came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Database,
    /// Backend unreachable; showing the sample catalog
    BuiltIn,
}

#[derive(Debug, Clone)]
struct Snapshot {
    templates: Vec<Template>,
    source: DataSource,
    connection_error: Option<String>,
    settings: SiteSettings,
}

/// Home page view in one locale
#[derive(Debug, Clone, Serialize)]
pub struct SiteView {
    pub locale: Locale,
    pub brand_name: String,
    pub hero_title: String,
    pub hero_subtitle: String,
    pub contact_handle: String,
    pub learning_url: String,
    pub data_source: DataSource,
    pub connection_error: Option<String>,
    /// `ALL` followed by every distinct tag
    pub tags: Vec<String>,
}

/// Template detail page
#[derive(Debug, Clone, Serialize)]
pub struct TemplateDetail {
    pub template: Template,
    pub player: PlayerView,
    pub recommendations: Vec<Template>,
}

/// Admin form input for creating or editing a template
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub tags: TagsInput,
}

/// Tags as the comma-separated form field or an explicit list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagsInput {
    List(Vec<String>),
    Text(String),
}

impl Default for TagsInput {
    fn default() -> Self {
        TagsInput::List(Vec::new())
    }
}

impl TagsInput {
    pub fn into_tags(self) -> Vec<String> {
        match self {
            TagsInput::Text(text) => catalog::parse_tags(&text),
            TagsInput::List(list) => list
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

impl TemplateDraft {
    fn into_template(self, id: String) -> Result<Template> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::InvalidInput("Template title is required".to_string()));
        }
        Ok(Template {
            id,
            title,
            price: self.price.trim().to_string(),
            description: self.description,
            image_url: self.image_url.trim().to_string(),
            video_url: self
                .video_url
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            tags: self.tags.into_tags(),
        })
    }
}

/// Backend message without the error-kind prefix
fn message(error: &Error) -> String {
    match error {
        Error::Backend(msg) | Error::Http(msg) => msg.clone(),
        other => other.to_string(),
    }
}

fn write_failed(op: &str, error: Error) -> Error {
    match error {
        Error::InvalidInput(_) | Error::NotFound(_) => error,
        other => Error::Backend(format!("{} failed: {}", op, message(&other))),
    }
}

fn same_content(a: &[Template], b: &[Template]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<&Template> = a.iter().collect();
    let mut b: Vec<&Template> = b.iter().collect();
    a.sort_by(|x, y| x.id.cmp(&y.id));
    b.sort_by(|x, y| x.id.cmp(&y.id));
    a == b
}

pub struct Storefront {
    backend: Arc<dyn Backend>,
    bus: EventBus,
    snapshot: RwLock<Snapshot>,
}

impl Storefront {
    /// `defaults` seeds the settings until the backend provides them
    pub fn new(backend: Arc<dyn Backend>, bus: EventBus, defaults: SiteSettings) -> Self {
        Self {
            backend,
            bus,
            snapshot: RwLock::new(Snapshot {
                templates: Vec::new(),
                source: DataSource::Database,
                connection_error: None,
                settings: defaults,
            }),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    // ========================================
    // Refresh
    // ========================================

    /// Re-fetch templates and settings
    pub async fn refresh(&self) {
        self.refresh_templates().await;
        self.refresh_settings().await;
    }

    /// Replace the catalog with the backend's, or the samples on failure
    ///
    /// Returns whether anything visible changed.
    pub async fn refresh_templates(&self) -> bool {
        self.load_templates(false).await
    }

    /// Poller variant: an identical catalog keeps the current (possibly
    /// reordered) order
    async fn load_templates(&self, keep_order: bool) -> bool {
        let fetched = self.backend.fetch_templates().await;

        let mut snapshot = self.snapshot.write().await;
        let before = (snapshot.templates.clone(), snapshot.source, snapshot.connection_error.clone());

        match fetched {
            Ok(templates) => {
                if templates.is_empty() {
                    info!("Backend connected but catalog is empty");
                }
                let keep = keep_order
                    && snapshot.source == DataSource::Database
                    && same_content(&snapshot.templates, &templates);
                if !keep {
                    snapshot.templates = templates;
                }
                snapshot.source = DataSource::Database;
                snapshot.connection_error = None;
            }
            Err(e) => {
                let msg = message(&e);
                warn!("Backend connection failed, showing built-in catalog: {}", msg);
                snapshot.templates = catalog::sample_templates();
                snapshot.source = DataSource::BuiltIn;
                snapshot.connection_error = Some(msg);
            }
        }

        let changed =
            before != (snapshot.templates.clone(), snapshot.source, snapshot.connection_error.clone());
        if changed {
            self.bus.emit_lossy(StoreEvent::SnapshotRefreshed {
                template_count: snapshot.templates.len(),
                from_database: snapshot.source == DataSource::Database,
                timestamp: time::now(),
            });
        }
        changed
    }

    /// Fold the settings rows into the snapshot; failures keep previous values
    pub async fn refresh_settings(&self) -> bool {
        match self.backend.fetch_settings().await {
            Ok(rows) => {
                let mut snapshot = self.snapshot.write().await;
                let mut settings = snapshot.settings.clone();
                schema::apply_settings(&mut settings, &rows);
                let changed = settings != snapshot.settings;
                snapshot.settings = settings;
                changed
            }
            Err(e) => {
                warn!("Settings fetch failed, keeping previous values: {}", message(&e));
                false
            }
        }
    }

    /// One poll cycle: emit change events for anything written elsewhere
    pub async fn poll(&self) {
        if self.load_templates(true).await {
            self.bus.emit_lossy(StoreEvent::templates_changed());
        }
        if self.refresh_settings().await {
            self.bus.emit_lossy(StoreEvent::settings_changed());
        }
    }

    async fn templates_written(&self) {
        self.refresh_templates().await;
        self.bus.emit_lossy(StoreEvent::templates_changed());
    }

    // ========================================
    // Reads
    // ========================================

    pub async fn templates(&self, filter: &CatalogFilter) -> Vec<Template> {
        filter.apply(&self.snapshot.read().await.templates)
    }

    pub async fn all_templates(&self) -> Vec<Template> {
        self.snapshot.read().await.templates.clone()
    }

    pub async fn tags(&self) -> Vec<String> {
        let snapshot = self.snapshot.read().await;
        let mut tags = vec![ALL_TAGS.to_string()];
        tags.extend(catalog::all_tags(&snapshot.templates));
        tags
    }

    pub async fn template(&self, id: &str) -> Option<Template> {
        self.snapshot
            .read()
            .await
            .templates
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    pub async fn detail(&self, id: &str) -> Option<TemplateDetail> {
        let snapshot = self.snapshot.read().await;
        let template = snapshot.templates.iter().find(|t| t.id == id)?.clone();
        let player = embed::normalize(
            template.preview().unwrap_or_default(),
            Some(template.image_url.as_str()).filter(|p| !p.is_empty()),
        );
        let recommendations = recommendations(&template, &snapshot.templates, RECOMMENDATION_LIMIT);
        Some(TemplateDetail {
            template,
            player,
            recommendations,
        })
    }

    pub async fn settings(&self) -> SiteSettings {
        self.snapshot.read().await.settings.clone()
    }

    pub async fn data_source(&self) -> (DataSource, Option<String>) {
        let snapshot = self.snapshot.read().await;
        (snapshot.source, snapshot.connection_error.clone())
    }

    pub async fn site_view(&self, locale: Locale) -> SiteView {
        let snapshot = self.snapshot.read().await;
        let defaults = SiteContent::defaults();
        let content = &snapshot.settings.site_content;

        let mut tags = vec![ALL_TAGS.to_string()];
        tags.extend(catalog::all_tags(&snapshot.templates));

        SiteView {
            locale,
            brand_name: content.brand_name.or_default(locale, &defaults.brand_name).to_string(),
            hero_title: content.hero_title.or_default(locale, &defaults.hero_title).to_string(),
            hero_subtitle: content
                .hero_subtitle
                .or_default(locale, &defaults.hero_subtitle)
                .to_string(),
            contact_handle: snapshot.settings.contact_handle.clone(),
            learning_url: snapshot.settings.learning_url.clone(),
            data_source: snapshot.source,
            connection_error: snapshot.connection_error.clone(),
            tags,
        }
    }

    pub async fn contact_prompt(&self, template_id: Option<&str>) -> String {
        let template = match template_id {
            Some(id) => self.template(id).await,
            None => None,
        };
        chat::contact_prompt(template.as_ref())
    }

    // ========================================
    // Admin writes
    // ========================================

    pub async fn create_template(&self, draft: TemplateDraft) -> Result<Template> {
        let id = draft
            .id
            .clone()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let template = draft.into_template(id)?;

        self.backend
            .insert_template(&template)
            .await
            .map_err(|e| write_failed("Add", e))?;

        info!(id = %template.id, title = %template.title, "Template added");
        self.templates_written().await;
        Ok(template)
    }

    pub async fn update_template(&self, id: &str, draft: TemplateDraft) -> Result<Template> {
        let template = draft.into_template(id.to_string())?;

        self.backend
            .update_template(&template)
            .await
            .map_err(|e| write_failed("Update", e))?;

        info!(id = %template.id, "Template updated");
        self.templates_written().await;
        Ok(template)
    }

    pub async fn delete_template(&self, id: &str) -> Result<()> {
        self.backend
            .delete_template(id)
            .await
            .map_err(|e| write_failed("Delete", e))?;

        info!(id = %id, "Template deleted");
        self.templates_written().await;
        Ok(())
    }

    /// Swap the template at `index` with its neighbour
    ///
    /// Only the in-memory order changes; the next full refresh restores the
    /// backend's order. Returns the resulting id order.
    pub async fn reorder(&self, index: usize, direction: Direction) -> Result<Vec<String>> {
        let mut snapshot = self.snapshot.write().await;
        if index >= snapshot.templates.len() {
            return Err(Error::InvalidInput(format!(
                "Index {} out of range (catalog has {} templates)",
                index,
                snapshot.templates.len()
            )));
        }

        let moved = move_item(&mut snapshot.templates, index, direction);
        let ids: Vec<String> = snapshot.templates.iter().map(|t| t.id.clone()).collect();
        if moved {
            self.bus.emit_lossy(StoreEvent::CatalogReordered {
                ids: ids.clone(),
                timestamp: time::now(),
            });
        }
        Ok(ids)
    }

    /// Upsert the contact handle and/or learning URL
    pub async fn update_settings(
        &self,
        contact_handle: Option<String>,
        learning_url: Option<String>,
    ) -> Result<SiteSettings> {
        let mut rows = Vec::new();
        if let Some(handle) = contact_handle {
            rows.push(SettingRow::new(keys::WECHAT_ID, handle.trim()));
        }
        if let Some(url) = learning_url {
            rows.push(SettingRow::new(keys::LEARNING_URL, url.trim()));
        }
        if rows.is_empty() {
            return Err(Error::InvalidInput("Nothing to update".to_string()));
        }

        self.backend
            .upsert_settings(&rows)
            .await
            .map_err(|e| write_failed("Save", e))?;

        {
            let mut snapshot = self.snapshot.write().await;
            // Only the written keys; site copy stays as is
            for row in &rows {
                match row.key.as_str() {
                    keys::WECHAT_ID => snapshot.settings.contact_handle = row.value_string(),
                    keys::LEARNING_URL => snapshot.settings.learning_url = row.value_string(),
                    _ => {}
                }
            }
        }
        self.refresh_settings().await;
        self.bus.emit_lossy(StoreEvent::settings_changed());
        Ok(self.settings().await)
    }

    /// Upsert the six site-copy keys, then apply them locally
    pub async fn update_site_content(&self, content: SiteContent) -> Result<SiteContent> {
        self.backend
            .upsert_settings(&schema::site_content_rows(&content))
            .await
            .map_err(|e| write_failed("Save", e))?;

        self.snapshot.write().await.settings.site_content = content.clone();
        info!("Site content updated");
        self.bus.emit_lossy(StoreEvent::settings_changed());
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use visionary_common::catalog::TagFilter;

    fn template(id: &str, title: &str, tags: &[&str]) -> Template {
        Template {
            id: id.to_string(),
            title: title.to_string(),
            price: "¥10".to_string(),
            description: String::new(),
            image_url: format!("https://img.test/{}.jpg", id),
            video_url: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn draft(title: &str, tags: &str) -> TemplateDraft {
        TemplateDraft {
            id: None,
            title: title.to_string(),
            price: "¥99".to_string(),
            description: "d".to_string(),
            image_url: String::new(),
            video_url: Some("  ".to_string()),
            tags: TagsInput::Text(tags.to_string()),
        }
    }

    async fn storefront(templates: Vec<Template>) -> (Arc<MemoryBackend>, Storefront) {
        let backend = Arc::new(MemoryBackend::with_templates(templates));
        let store = Storefront::new(backend.clone(), EventBus::new(16), SiteSettings::default());
        store.refresh().await;
        (backend, store)
    }

    #[tokio::test]
    async fn test_failed_fetch_falls_back_to_samples() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_unreachable(true);
        let store = Storefront::new(backend.clone(), EventBus::new(16), SiteSettings::default());
        store.refresh().await;

        let (source, error) = store.data_source().await;
        assert_eq!(source, DataSource::BuiltIn);
        assert_eq!(error.as_deref(), Some("memory backend unreachable"));
        assert_eq!(store.all_templates().await.len(), 6);

        backend.set_unreachable(false);
        store.refresh().await;
        let (source, error) = store.data_source().await;
        assert_eq!(source, DataSource::Database);
        assert_eq!(error, None);
        // Connected but empty: no samples
        assert!(store.all_templates().await.is_empty());
    }

    #[tokio::test]
    async fn test_filter_and_tags() {
        let (_, store) = storefront(vec![
            template("1", "City Vlog", &["travel"]),
            template("2", "Boardroom", &["business"]),
            template("3", "Mountain", &["travel", "4k"]),
        ])
        .await;

        let travel = store
            .templates(&CatalogFilter::new("", TagFilter::Tag("travel".into())))
            .await;
        let ids: Vec<_> = travel.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1"]);

        assert_eq!(store.tags().await, vec!["ALL", "travel", "4k", "business"]);
    }

    #[tokio::test]
    async fn test_detail_has_player_and_recommendations() {
        let mut with_video = template("1", "A", &["x", "y"]);
        with_video.video_url = Some("https://www.bilibili.com/video/BV1ab".into());
        let (_, store) = storefront(vec![
            with_video,
            template("2", "B", &["x"]),
            template("3", "C", &["x", "y"]),
            template("4", "D", &[]),
            template("5", "E", &["z"]),
        ])
        .await;

        let detail = store.detail("1").await.unwrap();
        assert_eq!(detail.player.kind(), "iframe");
        let rec_ids: Vec<_> = detail.recommendations.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(rec_ids, vec!["3", "2", "5"]);
        assert!(store.detail("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_create_assigns_uuid_and_parses_tags() {
        let (_, store) = storefront(vec![]).await;
        let created = store.create_template(draft("Neon", "gaming，intro, ")).await.unwrap();

        assert!(Uuid::parse_str(&created.id).is_ok());
        assert_eq!(created.tags, vec!["gaming", "intro"]);
        assert_eq!(created.video_url, None);
        assert_eq!(store.all_templates().await.len(), 1);
    }

    #[tokio::test]
    async fn test_write_failures_name_the_operation() {
        let (backend, store) = storefront(vec![template("1", "A", &[])]).await;
        backend.set_unreachable(true);

        let err = store.create_template(draft("X", "")).await.unwrap_err();
        assert_eq!(err.to_string(), "Backend error: Add failed: memory backend unreachable");

        let err = store.update_template("1", draft("Y", "")).await.unwrap_err();
        assert!(err.to_string().contains("Update failed"));

        let err = store.delete_template("1").await.unwrap_err();
        assert!(err.to_string().contains("Delete failed"));
    }

    #[tokio::test]
    async fn test_blank_title_rejected() {
        let (_, store) = storefront(vec![]).await;
        assert!(matches!(
            store.create_template(draft("  ", "")).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_reorder_is_local_and_bounded() {
        let (_, store) = storefront(vec![
            template("1", "A", &[]),
            template("2", "B", &[]),
            template("3", "C", &[]),
        ])
        .await;

        // Snapshot order is id desc: 3, 2, 1
        let ids = store.reorder(2, Direction::Up).await.unwrap();
        assert_eq!(ids, vec!["3", "1", "2"]);

        let ids = store.reorder(0, Direction::Up).await.unwrap();
        assert_eq!(ids, vec!["3", "1", "2"]);

        assert!(store.reorder(9, Direction::Down).await.is_err());

        // A poll with unchanged content keeps the local order
        store.poll().await;
        let order: Vec<_> = store.all_templates().await.into_iter().map(|t| t.id).collect();
        assert_eq!(order, vec!["3", "1", "2"]);

        // A full refresh restores backend order
        store.refresh_templates().await;
        let order: Vec<_> = store.all_templates().await.into_iter().map(|t| t.id).collect();
        assert_eq!(order, vec!["3", "2", "1"]);
    }

    #[tokio::test]
    async fn test_settings_and_site_content() {
        let (backend, store) = storefront(vec![]).await;

        store
            .update_settings(Some("wx_123".into()), None)
            .await
            .unwrap();
        let view = store.site_view(Locale::En).await;
        assert_eq!(view.contact_handle, "wx_123");
        assert_eq!(view.brand_name, SiteContent::defaults().brand_name.en);

        let mut content = SiteContent::default();
        content.brand_name.en = "Custom Brand".into();
        store.update_site_content(content).await.unwrap();

        let view = store.site_view(Locale::En).await;
        assert_eq!(view.brand_name, "Custom Brand");
        let view = store.site_view(Locale::Zh).await;
        assert_eq!(view.brand_name, SiteContent::defaults().brand_name.zh);

        // Stored rows survive a fresh refresh
        let rows = backend.fetch_settings().await.unwrap();
        assert_eq!(rows.len(), 7);
    }

    #[tokio::test]
    async fn test_settings_failure_keeps_previous() {
        let (backend, store) = storefront(vec![]).await;
        store.update_settings(Some("wx".into()), Some("https://learn.test".into())).await.unwrap();

        backend.set_unreachable(true);
        assert!(!store.refresh_settings().await);
        let settings = store.settings().await;
        assert_eq!(settings.contact_handle, "wx");
        assert_eq!(settings.learning_url, "https://learn.test");
    }

    #[tokio::test]
    async fn test_contact_prompt_uses_title() {
        let (_, store) = storefront(vec![template("7", "Wedding Glow", &[])]).await;
        assert_eq!(
            store.contact_prompt(Some("7")).await,
            "Hi, I'd like to ask about 【Wedding Glow】."
        );
        assert_eq!(store.contact_prompt(None).await, chat::contact_prompt(None));
    }
}
