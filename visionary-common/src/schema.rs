//! Mapping between hosted-backend rows and storefront entities
//!
//! This is the only place that knows column names. Rows come back from the
//! backend as loosely-typed JSON; everything outside this module sees the
//! typed entities from [`crate::models`].
//!
//! Tables:
//! - `templates`: `id, title, price, description, image_url, video_url, tags`
//! - `settings`: `key, value`
//! - `chat_sessions`: `session_id, user_id, user_name, avatar, messages (json),
//!   last_updated, unread_admin_count, unread_user_count`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{ChatMessage, ChatSession, LocalizedText, SiteContent, SiteSettings, Template};
use crate::{Error, Result};

pub const TEMPLATES_TABLE: &str = "templates";
pub const SETTINGS_TABLE: &str = "settings";
pub const CHAT_SESSIONS_TABLE: &str = "chat_sessions";
pub const CHAT_UPLOADS_BUCKET: &str = "chat-uploads";

/// Well-known keys of the `settings` table
pub mod keys {
    pub const WECHAT_ID: &str = "wechat_id";
    pub const LEARNING_URL: &str = "learning_url";
    pub const BRAND_NAME_ZH: &str = "brand_name_zh";
    pub const BRAND_NAME_EN: &str = "brand_name_en";
    pub const HERO_TITLE_ZH: &str = "hero_title_zh";
    pub const HERO_TITLE_EN: &str = "hero_title_en";
    pub const HERO_SUBTITLE_ZH: &str = "hero_subtitle_zh";
    pub const HERO_SUBTITLE_EN: &str = "hero_subtitle_en";
}

// ========================================
// Templates
// ========================================

/// Inbound template row. Older rows used camelCase media columns.
#[derive(Debug, Deserialize)]
struct TemplateRowIn {
    id: Value,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default, rename = "imageUrl")]
    image_url_legacy: Option<String>,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default, rename = "videoUrl")]
    video_url_legacy: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct TemplateRowOut<'a> {
    id: &'a str,
    title: &'a str,
    price: &'a str,
    description: &'a str,
    image_url: &'a str,
    video_url: Option<&'a str>,
    tags: &'a [String],
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Render a JSON scalar the way the storefront displays it
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn template_from_row(row: Value) -> Result<Template> {
    let row: TemplateRowIn = serde_json::from_value(row)?;
    let id = value_to_string(&row.id);
    if id.is_empty() {
        return Err(Error::InvalidInput("template row without id".to_string()));
    }

    Ok(Template {
        id,
        title: row.title.unwrap_or_default(),
        price: row.price.unwrap_or_default(),
        description: row.description.unwrap_or_default(),
        image_url: non_empty(row.image_url)
            .or_else(|| non_empty(row.image_url_legacy))
            .unwrap_or_default(),
        video_url: non_empty(row.video_url).or_else(|| non_empty(row.video_url_legacy)),
        tags: row.tags.unwrap_or_default(),
    })
}

pub fn templates_from_rows(rows: Vec<Value>) -> Result<Vec<Template>> {
    rows.into_iter().map(template_from_row).collect()
}

pub fn template_to_row(template: &Template) -> Value {
    let row = TemplateRowOut {
        id: &template.id,
        title: &template.title,
        price: &template.price,
        description: &template.description,
        image_url: &template.image_url,
        video_url: template.video_url.as_deref(),
        tags: &template.tags,
    };
    // Plain struct of strings; serialization cannot fail
    serde_json::to_value(row).unwrap_or(Value::Null)
}

// ========================================
// Settings
// ========================================

/// A generic key/value settings row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingRow {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl SettingRow {
    pub fn new(key: &str, value: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            value: Value::String(value.into()),
        }
    }

    pub fn value_string(&self) -> String {
        value_to_string(&self.value)
    }
}

pub fn setting_rows_from_values(rows: Vec<Value>) -> Result<Vec<SettingRow>> {
    rows.into_iter()
        .map(|r| serde_json::from_value(r).map_err(Error::from))
        .collect()
}

fn lookup<'a>(rows: &'a [SettingRow], key: &str) -> Option<&'a SettingRow> {
    rows.iter().find(|r| r.key == key)
}

/// Fold settings rows into `settings`
///
/// Contact handle and learning URL are only replaced when their row exists.
/// Site content is rebuilt every time; a missing key means "no override".
pub fn apply_settings(settings: &mut SiteSettings, rows: &[SettingRow]) {
    if let Some(row) = lookup(rows, keys::WECHAT_ID) {
        settings.contact_handle = row.value_string();
    }
    if let Some(row) = lookup(rows, keys::LEARNING_URL) {
        settings.learning_url = row.value_string();
    }

    let get = |key: &str| lookup(rows, key).map(SettingRow::value_string).unwrap_or_default();
    settings.site_content = SiteContent {
        brand_name: LocalizedText::new(get(keys::BRAND_NAME_ZH), get(keys::BRAND_NAME_EN)),
        hero_title: LocalizedText::new(get(keys::HERO_TITLE_ZH), get(keys::HERO_TITLE_EN)),
        hero_subtitle: LocalizedText::new(get(keys::HERO_SUBTITLE_ZH), get(keys::HERO_SUBTITLE_EN)),
    };
}

/// Rows to upsert when the admin saves site copy
pub fn site_content_rows(content: &SiteContent) -> Vec<SettingRow> {
    vec![
        SettingRow::new(keys::BRAND_NAME_ZH, content.brand_name.zh.clone()),
        SettingRow::new(keys::BRAND_NAME_EN, content.brand_name.en.clone()),
        SettingRow::new(keys::HERO_TITLE_ZH, content.hero_title.zh.clone()),
        SettingRow::new(keys::HERO_TITLE_EN, content.hero_title.en.clone()),
        SettingRow::new(keys::HERO_SUBTITLE_ZH, content.hero_subtitle.zh.clone()),
        SettingRow::new(keys::HERO_SUBTITLE_EN, content.hero_subtitle.en.clone()),
    ]
}

// ========================================
// Chat sessions
// ========================================

#[derive(Debug, Deserialize)]
struct ChatSessionRowIn {
    session_id: String,
    user_id: String,
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default)]
    messages: Option<Vec<ChatMessage>>,
    #[serde(default)]
    last_updated: Option<i64>,
    #[serde(default)]
    unread_admin_count: Option<i64>,
    #[serde(default)]
    unread_user_count: Option<i64>,
}

fn counter(value: Option<i64>) -> u32 {
    value.unwrap_or(0).clamp(0, u32::MAX as i64) as u32
}

pub fn session_from_row(row: Value) -> Result<ChatSession> {
    let row: ChatSessionRowIn = serde_json::from_value(row)?;
    Ok(ChatSession {
        session_id: row.session_id,
        user_id: row.user_id,
        user_name: row.user_name.unwrap_or_default(),
        avatar: row.avatar,
        messages: row.messages.unwrap_or_default(),
        last_updated: row.last_updated.unwrap_or(0),
        unread_admin_count: counter(row.unread_admin_count),
        unread_user_count: counter(row.unread_user_count),
    })
}

pub fn sessions_from_rows(rows: Vec<Value>) -> Result<Vec<ChatSession>> {
    rows.into_iter().map(session_from_row).collect()
}

pub fn session_to_row(session: &ChatSession) -> Value {
    // Column names equal the entity's serde names
    serde_json::to_value(session).unwrap_or(Value::Null)
}

/// Partial update of a chat session row
///
/// Unset fields are left untouched by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread_admin_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread_user_count: Option<u32>,
}

impl SessionPatch {
    /// Everything an append touches: full message list, timestamp, both counters
    pub fn full(session: &ChatSession) -> Self {
        Self {
            messages: Some(session.messages.clone()),
            last_updated: Some(session.last_updated),
            unread_admin_count: Some(session.unread_admin_count),
            unread_user_count: Some(session.unread_user_count),
        }
    }

    pub fn counters(session: &ChatSession) -> Self {
        Self {
            unread_admin_count: Some(session.unread_admin_count),
            unread_user_count: Some(session.unread_user_count),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn to_row(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Apply this patch to an in-memory session
    pub fn apply(&self, session: &mut ChatSession) {
        if let Some(messages) = &self.messages {
            session.messages = messages.clone();
        }
        if let Some(ts) = self.last_updated {
            session.last_updated = ts;
        }
        if let Some(n) = self.unread_admin_count {
            session.unread_admin_count = n;
        }
        if let Some(n) = self.unread_user_count {
            session.unread_user_count = n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageKind, Sender};
    use serde_json::json;

    #[test]
    fn test_template_from_snake_case_row() {
        let t = template_from_row(json!({
            "id": "abc",
            "title": "Travel Vlog",
            "price": "¥199",
            "description": "d",
            "image_url": "https://img.test/1.jpg",
            "video_url": "https://v.test/1.mp4",
            "tags": ["travel", "4K"]
        }))
        .unwrap();
        assert_eq!(t.id, "abc");
        assert_eq!(t.image_url, "https://img.test/1.jpg");
        assert_eq!(t.video_url.as_deref(), Some("https://v.test/1.mp4"));
        assert_eq!(t.tags, vec!["travel", "4K"]);
    }

    #[test]
    fn test_template_from_legacy_camel_case_row() {
        let t = template_from_row(json!({
            "id": 7,
            "title": "T",
            "price": "¥1",
            "description": "",
            "image_url": "",
            "imageUrl": "https://img.test/legacy.jpg",
            "videoUrl": "",
            "tags": null
        }))
        .unwrap();
        assert_eq!(t.id, "7");
        assert_eq!(t.image_url, "https://img.test/legacy.jpg");
        assert_eq!(t.video_url, None);
        assert!(t.tags.is_empty());
    }

    #[test]
    fn test_template_row_without_id_is_rejected() {
        assert!(template_from_row(json!({"id": null, "title": "x"})).is_err());
    }

    #[test]
    fn test_template_to_row_uses_column_names() {
        let t = Template {
            id: "1".into(),
            title: "T".into(),
            price: "¥9".into(),
            description: "D".into(),
            image_url: "i".into(),
            video_url: None,
            tags: vec!["a".into()],
        };
        let row = template_to_row(&t);
        assert_eq!(row["image_url"], "i");
        assert!(row["video_url"].is_null());
        assert!(row.get("imageUrl").is_none());
    }

    #[test]
    fn test_apply_settings_keeps_missing_scalars() {
        let mut settings = SiteSettings {
            contact_handle: "default-handle".into(),
            ..Default::default()
        };
        let rows = vec![
            SettingRow::new(keys::LEARNING_URL, "https://learn.test"),
            SettingRow::new(keys::BRAND_NAME_EN, "Brand"),
        ];
        apply_settings(&mut settings, &rows);
        assert_eq!(settings.contact_handle, "default-handle");
        assert_eq!(settings.learning_url, "https://learn.test");
        assert_eq!(settings.site_content.brand_name.en, "Brand");
        assert_eq!(settings.site_content.brand_name.zh, "");
    }

    #[test]
    fn test_setting_value_non_string_is_stringified() {
        let rows = setting_rows_from_values(vec![json!({"key": "wechat_id", "value": 16626191})]).unwrap();
        let mut settings = SiteSettings::default();
        apply_settings(&mut settings, &rows);
        assert_eq!(settings.contact_handle, "16626191");
    }

    #[test]
    fn test_site_content_rows_cover_all_keys() {
        let rows = site_content_rows(&SiteContent::defaults());
        let names: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(names.len(), 6);
        assert!(names.contains(&keys::HERO_SUBTITLE_EN));
    }

    #[test]
    fn test_session_row_round_trip_and_negative_counters() {
        let row = json!({
            "session_id": "user_abc",
            "user_id": "user_abc",
            "user_name": "Visitor _abc",
            "messages": [{"id": "welcome", "sender": "admin", "content": "hi", "timestamp": 1, "type": "text"}],
            "last_updated": 10,
            "unread_admin_count": -3,
            "unread_user_count": 1
        });
        let session = session_from_row(row).unwrap();
        assert_eq!(session.unread_admin_count, 0);
        assert_eq!(session.messages[0].sender, Sender::Admin);
        assert_eq!(session.messages[0].kind, MessageKind::Text);

        let back = session_to_row(&session);
        assert_eq!(back["messages"][0]["type"], "text");
        assert_eq!(back["unread_user_count"], 1);
    }

    #[test]
    fn test_session_patch_skips_unset_fields() {
        let patch = SessionPatch {
            unread_admin_count: Some(0),
            ..Default::default()
        };
        let row = patch.to_row();
        assert_eq!(row, json!({"unread_admin_count": 0}));
        assert!(!patch.is_empty());
        assert!(SessionPatch::default().is_empty());
    }
}
