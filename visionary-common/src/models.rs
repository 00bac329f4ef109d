//! Storefront entities
//!
//! These are the typed shapes the rest of the system works with. Backend rows
//! are converted to and from these types only in [`crate::schema`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A purchasable video-editing template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub title: String,
    /// Display price, free text (e.g. "¥199")
    pub price: String,
    pub description: String,
    pub image_url: String,
    /// Preview link or raw embed markup, see [`crate::embed`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Template {
    /// Preview source if one is set and non-blank
    pub fn preview(&self) -> Option<&str> {
        self.video_url
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Who wrote a chat message
///
/// Wire values match the stored message blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sender {
    #[serde(rename = "user")]
    Customer,
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "model")]
    Assistant,
}

/// Content kind of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Video,
    /// Only ever read back from stored rows
    System,
}

impl MessageKind {
    /// Attachment kind for an uploaded file's MIME type
    pub fn for_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            Some(MessageKind::Image)
        } else if mime.starts_with("video/") {
            Some(MessageKind::Video)
        } else {
            None
        }
    }
}

/// One entry of a chat transcript. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: Sender,
    pub content: String,
    /// Unix epoch milliseconds
    pub timestamp: i64,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
}

impl ChatMessage {
    pub fn new(sender: Sender, kind: MessageKind, content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            content: content.into(),
            timestamp,
            kind,
        }
    }

    pub fn text(sender: Sender, content: impl Into<String>, timestamp: i64) -> Self {
        Self::new(sender, MessageKind::Text, content, timestamp)
    }
}

/// The running conversation between one visitor and the admin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Same as `user_id`: the visitor token is the session's durable key
    pub session_id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub messages: Vec<ChatMessage>,
    /// Unix epoch milliseconds
    pub last_updated: i64,
    /// Customer messages the admin has not seen yet
    pub unread_admin_count: u32,
    /// Admin messages the customer has not seen yet
    pub unread_user_count: u32,
}

/// Site copy locale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Zh,
    En,
}

impl std::str::FromStr for Locale {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" => Ok(Locale::Zh),
            "en" | "en-us" => Ok(Locale::En),
            other => Err(crate::Error::InvalidInput(format!("Unknown locale: {}", other))),
        }
    }
}

/// A two-locale string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    #[serde(default)]
    pub zh: String,
    #[serde(default)]
    pub en: String,
}

impl LocalizedText {
    pub fn new(zh: impl Into<String>, en: impl Into<String>) -> Self {
        Self {
            zh: zh.into(),
            en: en.into(),
        }
    }

    pub fn get(&self, locale: Locale) -> &str {
        match locale {
            Locale::Zh => &self.zh,
            Locale::En => &self.en,
        }
    }

    /// Override for `locale`, or `fallback` when the override is blank
    pub fn or_default<'a>(&'a self, locale: Locale, fallback: &'a LocalizedText) -> &'a str {
        let value = self.get(locale);
        if value.trim().is_empty() {
            fallback.get(locale)
        } else {
            value
        }
    }
}

/// Admin-editable overrides for the hard-coded site copy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteContent {
    #[serde(default)]
    pub brand_name: LocalizedText,
    #[serde(default)]
    pub hero_title: LocalizedText,
    #[serde(default)]
    pub hero_subtitle: LocalizedText,
}

impl SiteContent {
    /// Built-in copy shown when no override is stored
    pub fn defaults() -> Self {
        Self {
            brand_name: LocalizedText::new("Visionary 模版商店", "Visionary Template Store"),
            hero_title: LocalizedText::new("让你的视频脱颖而出", "Make Your Videos Stand Out"),
            hero_subtitle: LocalizedText::new(
                "专业剪辑模版，一键套用",
                "Professional editing templates, ready in one click",
            ),
        }
    }
}

/// Decoded settings rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSettings {
    /// Contact handle shown in the footer (WeChat id in the stored row)
    pub contact_handle: String,
    /// External learning-resource link
    pub learning_url: String,
    pub site_content: SiteContent,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            contact_handle: String::new(),
            learning_url: DEFAULT_LEARNING_URL.to_string(),
            site_content: SiteContent::default(),
        }
    }
}

pub const DEFAULT_LEARNING_URL: &str = "https://www.bilibili.com";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_wire_values() {
        assert_eq!(serde_json::to_string(&Sender::Customer).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Sender::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&Sender::Assistant).unwrap(), "\"model\"");
    }

    #[test]
    fn test_message_kind_defaults_to_text() {
        let msg: ChatMessage = serde_json::from_str(
            r#"{"id":"1","sender":"user","content":"hi","timestamp":5}"#,
        )
        .unwrap();
        assert_eq!(msg.kind, MessageKind::Text);
    }

    #[test]
    fn test_message_kind_for_mime() {
        assert_eq!(MessageKind::for_mime("image/png"), Some(MessageKind::Image));
        assert_eq!(MessageKind::for_mime("VIDEO/mp4"), Some(MessageKind::Video));
        assert_eq!(MessageKind::for_mime("application/pdf"), None);
    }

    #[test]
    fn test_preview_ignores_blank() {
        let mut t = Template {
            id: "1".into(),
            title: "t".into(),
            price: "¥1".into(),
            description: String::new(),
            image_url: String::new(),
            video_url: Some("   ".into()),
            tags: vec![],
        };
        assert_eq!(t.preview(), None);
        t.video_url = Some(" https://x.test/a.mp4 ".into());
        assert_eq!(t.preview(), Some("https://x.test/a.mp4"));
    }

    #[test]
    fn test_localized_fallback() {
        let defaults = SiteContent::defaults();
        let overrides = LocalizedText::new("", "Custom");
        assert_eq!(overrides.or_default(Locale::En, &defaults.brand_name), "Custom");
        assert_eq!(
            overrides.or_default(Locale::Zh, &defaults.brand_name),
            defaults.brand_name.zh
        );
    }

    #[test]
    fn test_locale_parse() {
        assert_eq!("EN".parse::<Locale>().unwrap(), Locale::En);
        assert_eq!("zh".parse::<Locale>().unwrap(), Locale::Zh);
        assert!("fr".parse::<Locale>().is_err());
    }
}
