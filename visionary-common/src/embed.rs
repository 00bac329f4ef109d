//! Video-link normalization
//!
//! Turns whatever an admin pasted into a template's preview field (a share
//! text, a platform URL, a direct file link or raw embed markup) into a
//! [`PlayerView`] the front end can render without further parsing.
//!
//! Rules are tried in order; the first one that both matches and produces a
//! view wins. Normalization never fails: anything unrecognized ends up in the
//! generic iframe fallback.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Sandbox flags for third-party platform players
pub const PLATFORM_SANDBOX: &str = "allow-top-navigation allow-same-origin allow-forms allow-scripts";

/// Feature policy for the YouTube player
pub const YOUTUBE_ALLOW: &str =
    "accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture";

pub const NO_REFERRER: &str = "no-referrer";

const MEDIA_EXTENSIONS: [&str; 4] = [".mp4", ".webm", ".ogg", ".mov"];

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s"']+"#).expect("valid regex"));
static DOUYIN_VIDEO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"video/(\d+)").expect("valid regex"));
static DOUYIN_MODAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"modal_id=(\d+)").expect("valid regex"));
static BVID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"BV[a-zA-Z0-9]+").expect("valid regex"));

/// Renderable form of a preview source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayerView {
    /// Nothing to show
    Empty,
    /// Admin-supplied `<iframe>`/`<embed>` markup, passed through untouched
    RawEmbed { html: String },
    Iframe {
        src: String,
        /// Rule that produced this view ("douyin", "bilibili", ...)
        provider: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        referrer_policy: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sandbox: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        allow: Option<String>,
    },
    NativeVideo {
        src: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        poster: Option<String>,
    },
    /// Link that cannot be embedded; offer to open it externally
    Blocked { url: String, reason: String },
}

impl PlayerView {
    pub fn kind(&self) -> &'static str {
        match self {
            PlayerView::Empty => "empty",
            PlayerView::RawEmbed { .. } => "raw_embed",
            PlayerView::Iframe { .. } => "iframe",
            PlayerView::NativeVideo { .. } => "native_video",
            PlayerView::Blocked { .. } => "blocked",
        }
    }

    fn platform_iframe(provider: &str, src: String) -> Self {
        PlayerView::Iframe {
            src,
            provider: provider.to_string(),
            referrer_policy: Some(NO_REFERRER.to_string()),
            sandbox: Some(PLATFORM_SANDBOX.to_string()),
            allow: None,
        }
    }
}

/// One normalization rule
///
/// `matches` is a cheap host check; `build` may still decline (return `None`)
/// when the URL lacks the id it needs, in which case later rules are tried.
#[derive(Clone, Copy)]
pub struct EmbedRule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub build: fn(&str, Option<&str>) -> Option<PlayerView>,
}

impl EmbedRule {
    pub fn apply(&self, url: &str, poster: Option<&str>) -> Option<PlayerView> {
        if (self.matches)(url) {
            (self.build)(url, poster)
        } else {
            None
        }
    }
}

impl std::fmt::Debug for EmbedRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedRule").field("name", &self.name).finish()
    }
}

fn is_douyin_short(url: &str) -> bool {
    url.contains("v.douyin.com")
}

fn douyin_short_view(url: &str, _poster: Option<&str>) -> Option<PlayerView> {
    Some(PlayerView::Blocked {
        url: url.to_string(),
        reason: "Douyin short links cannot be embedded; use the desktop link or the embed code"
            .to_string(),
    })
}

fn is_douyin(url: &str) -> bool {
    url.contains("douyin.com")
}

fn douyin_view(url: &str, _poster: Option<&str>) -> Option<PlayerView> {
    let id = DOUYIN_VIDEO_RE
        .captures(url)
        .or_else(|| DOUYIN_MODAL_RE.captures(url))
        .and_then(|caps| caps.get(1))?;
    Some(PlayerView::platform_iframe(
        "douyin",
        format!("https://www.douyin.com/player/video/{}?autoplay=0&theme=0", id.as_str()),
    ))
}

fn is_bilibili(url: &str) -> bool {
    url.contains("bilibili.com")
}

fn bilibili_view(url: &str, _poster: Option<&str>) -> Option<PlayerView> {
    let bvid = BVID_RE.find(url)?;
    Some(PlayerView::platform_iframe(
        "bilibili",
        format!(
            "//player.bilibili.com/player.html?bvid={}&page=1&high_quality=1&danmaku=0",
            bvid.as_str()
        ),
    ))
}

fn is_youtube(url: &str) -> bool {
    url.contains("youtube.com") || url.contains("youtu.be")
}

fn youtube_view(url: &str, _poster: Option<&str>) -> Option<PlayerView> {
    let src = if let Some((_, rest)) = url.split_once("watch?v=") {
        let id = rest.split('&').next().unwrap_or(rest);
        format!("https://www.youtube.com/embed/{}", id)
    } else if let Some((_, rest)) = url.split_once("youtu.be/") {
        let id = rest.split('?').next().unwrap_or(rest);
        format!("https://www.youtube.com/embed/{}", id)
    } else {
        url.to_string()
    };
    Some(PlayerView::Iframe {
        src,
        provider: "youtube".to_string(),
        referrer_policy: None,
        sandbox: None,
        allow: Some(YOUTUBE_ALLOW.to_string()),
    })
}

fn native_video_view(url: &str, poster: Option<&str>) -> Option<PlayerView> {
    Some(PlayerView::NativeVideo {
        src: url.to_string(),
        poster: poster.map(str::to_string),
    })
}

fn any_url(_url: &str) -> bool {
    true
}

fn generic_view(url: &str, _poster: Option<&str>) -> Option<PlayerView> {
    Some(PlayerView::Iframe {
        src: url.to_string(),
        provider: "generic".to_string(),
        referrer_policy: Some(NO_REFERRER.to_string()),
        sandbox: None,
        allow: None,
    })
}

pub static DOUYIN_SHORT: EmbedRule = EmbedRule {
    name: "douyin_short",
    matches: is_douyin_short,
    build: douyin_short_view,
};

pub static DOUYIN: EmbedRule = EmbedRule {
    name: "douyin",
    matches: is_douyin,
    build: douyin_view,
};

pub static BILIBILI: EmbedRule = EmbedRule {
    name: "bilibili",
    matches: is_bilibili,
    build: bilibili_view,
};

pub static YOUTUBE: EmbedRule = EmbedRule {
    name: "youtube",
    matches: is_youtube,
    build: youtube_view,
};

pub static MEDIA_FILE: EmbedRule = EmbedRule {
    name: "media_file",
    matches: is_media_file,
    build: native_video_view,
};

pub static FALLBACK: EmbedRule = EmbedRule {
    name: "fallback",
    matches: any_url,
    build: generic_view,
};

/// Rules in evaluation order
pub static RULES: [&EmbedRule; 6] = [&DOUYIN_SHORT, &DOUYIN, &BILIBILI, &YOUTUBE, &MEDIA_FILE, &FALLBACK];

/// Path (query stripped) ends in a known video container extension
pub fn is_media_file(url: &str) -> bool {
    let path = url.split('?').next().unwrap_or(url).to_ascii_lowercase();
    MEDIA_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// First http(s) URL in a free-text share blurb
pub fn extract_url(text: &str) -> Option<&str> {
    URL_RE.find(text).map(|m| m.as_str())
}

/// Normalize a raw preview source
pub fn normalize(raw: &str, poster: Option<&str>) -> PlayerView {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return PlayerView::Empty;
    }

    if trimmed.starts_with("<iframe") || trimmed.starts_with("<embed") {
        return PlayerView::RawEmbed {
            html: trimmed.to_string(),
        };
    }

    let url = extract_url(trimmed).unwrap_or(trimmed);

    RULES
        .iter()
        .find_map(|rule| rule.apply(url, poster))
        .unwrap_or(PlayerView::Empty)
}
