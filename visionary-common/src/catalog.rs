//! Catalog filtering, ordering and recommendations
//!
//! Everything here is a linear scan over an in-memory list; the catalog is
//! small enough that no index is kept.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::Template;

/// Wire sentinel meaning "no tag restriction"
pub const ALL_TAGS: &str = "ALL";

/// Default number of related templates on the detail view
pub const RECOMMENDATION_LIMIT: usize = 3;

/// Tag restriction of a catalog query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TagFilter {
    #[default]
    All,
    Tag(String),
}

impl FromStr for TagFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == ALL_TAGS {
            Ok(TagFilter::All)
        } else {
            Ok(TagFilter::Tag(s.to_string()))
        }
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagFilter::All => f.write_str(ALL_TAGS),
            TagFilter::Tag(tag) => f.write_str(tag),
        }
    }
}

impl Serialize for TagFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TagFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        // Infallible
        Ok(raw.parse().unwrap_or_default())
    }
}

/// Search term plus tag selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFilter {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub tag: TagFilter,
}

impl CatalogFilter {
    pub fn new(search: impl Into<String>, tag: TagFilter) -> Self {
        Self {
            search: search.into(),
            tag,
        }
    }

    /// Title or any tag contains the term (case-insensitive), and the tag
    /// selection is `All` or an exact member of the template's tags.
    pub fn matches(&self, template: &Template) -> bool {
        let term = self.search.to_lowercase();
        let matches_search = template.title.to_lowercase().contains(&term)
            || template
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&term));

        let matches_tag = match &self.tag {
            TagFilter::All => true,
            TagFilter::Tag(selected) => template.tags.iter().any(|t| t == selected),
        };

        matches_search && matches_tag
    }

    pub fn apply(&self, templates: &[Template]) -> Vec<Template> {
        templates
            .iter()
            .filter(|t| self.matches(t))
            .cloned()
            .collect()
    }
}

/// Distinct tags in first-seen order
pub fn all_tags(templates: &[Template]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    for tag in templates.iter().flat_map(|t| t.tags.iter()) {
        if seen.insert(tag.as_str()) {
            tags.push(tag.clone());
        }
    }
    tags
}

/// Direction for a one-step reorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Swap the item at `index` with its neighbour
///
/// Returns `false` (and leaves the list alone) when the move would leave the
/// list bounds.
pub fn move_item(templates: &mut [Template], index: usize, direction: Direction) -> bool {
    match direction {
        Direction::Up => {
            if index == 0 || index >= templates.len() {
                return false;
            }
            templates.swap(index - 1, index);
        }
        Direction::Down => {
            if index + 1 >= templates.len() {
                return false;
            }
            templates.swap(index, index + 1);
        }
    }
    true
}

/// Other templates ranked by number of tags shared with `current`
///
/// The sort is stable so equally-scored templates keep catalog order.
pub fn recommendations(current: &Template, all: &[Template], limit: usize) -> Vec<Template> {
    let mut scored: Vec<(usize, &Template)> = all
        .iter()
        .filter(|t| t.id != current.id)
        .map(|t| {
            let score = t.tags.iter().filter(|tag| current.tags.contains(tag)).count();
            (score, t)
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(limit).map(|(_, t)| t.clone()).collect()
}

/// Split the admin form's tag input on ASCII and full-width commas
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split([',', '，'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Built-in catalog shown when the backend cannot be reached
pub fn sample_templates() -> Vec<Template> {
    const SAMPLE_VIDEO: &str = "https://interactive-examples.mdn.mozilla.net/media/cc0-videos/flower.mp4";

    let sample = |id: &str, title: &str, price: &str, description: &str, video: bool, tags: &[&str]| Template {
        id: id.to_string(),
        title: title.to_string(),
        price: price.to_string(),
        description: description.to_string(),
        image_url: format!("https://picsum.photos/800/450?random={}", id),
        video_url: video.then(|| SAMPLE_VIDEO.to_string()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    };

    vec![
        sample(
            "1",
            "Cinematic Travel Vlog",
            "¥199",
            "Energetic transitions and cinematic grading presets for travel content.",
            true,
            &["travel", "vlog", "4K"],
        ),
        sample(
            "2",
            "Corporate Promo",
            "¥299",
            "Clean typography and smooth animation for business presentations.",
            false,
            &["business", "minimal", "corporate"],
        ),
        sample(
            "3",
            "Short-Video Glitch Pack",
            "¥99",
            "Fast glitch effects built to catch attention on social feeds.",
            true,
            &["social", "glitch", "short-video"],
        ),
        sample(
            "4",
            "Wedding Highlights",
            "¥399",
            "Romantic slow-motion template with soft light-leak overlays.",
            false,
            &["wedding", "romantic", "elegant"],
        ),
        sample(
            "5",
            "Gaming Channel Intro",
            "¥149",
            "Neon styling and punchy motion graphics for gaming channels.",
            false,
            &["gaming", "neon", "intro"],
        ),
        sample(
            "6",
            "Minimal Product Showcase",
            "¥249",
            "Clean backgrounds and subtle text animation that keep focus on the product.",
            true,
            &["product", "minimal", "e-commerce"],
        ),
    ]
}
