use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_UPLOAD_TITLE: &str = "Untitled Shorts";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendItem {
    pub source: String,
    pub title: String,
    pub url: String,
    pub score: i64,
    pub comments: i64,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendReport {
    pub fetched_at: DateTime<Utc>,
    pub total_collected: usize,
    pub top_topics: Vec<TrendItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicCandidate {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TopicCandidate {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            slug: None,
            summary: None,
            hook: None,
            source_url: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicShortlist {
    #[serde(default)]
    pub candidates: Vec<TopicCandidate>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub visual_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub veo_prompt: Option<String>,
    #[serde(default)]
    pub text_overlay: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Narration {
    #[serde(default)]
    pub hook: String,
    #[serde(default)]
    pub main: String,
    #[serde(default)]
    pub cta: String,
}

impl Narration {
    /// Joins the non-empty fragments with a single space.
    pub fn full_text(&self) -> String {
        [&self.hook, &self.main, &self.cta]
            .iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A generated short-form script. Fields the model adds beyond the known ones
/// survive a load/save cycle through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub narration: Narration,
    #[serde(default)]
    pub subtitles: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Script {
    /// Looks up a scene by its 1-based index.
    pub fn scene(&self, index: usize) -> Option<&Scene> {
        index.checked_sub(1).and_then(|idx| self.scenes.get(idx))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub scene: usize,
    pub path: PathBuf,
    pub prompt: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub scene: usize,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationAsset {
    pub path: PathBuf,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeoPackage {
    #[serde(default)]
    pub titles: BTreeMap<String, String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SeoPackage {
    pub fn primary_title(&self) -> &str {
        self.titles
            .get("A")
            .map(String::as_str)
            .filter(|title| !title.trim().is_empty())
            .unwrap_or(DEFAULT_UPLOAD_TITLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narration_skips_empty_fragments() {
        let narration = Narration {
            hook: "Stop scrolling.".into(),
            main: "  ".into(),
            cta: "Follow for more.".into(),
        };
        assert_eq!(narration.full_text(), "Stop scrolling. Follow for more.");
        assert_eq!(Narration::default().full_text(), "");
    }

    #[test]
    fn script_keeps_unknown_fields() {
        let raw = r#"{
            "title": "Rust 2026",
            "scenes": [{"visual_prompt": "a crab", "text_overlay": "hi", "camera": "pan"}],
            "narration": {"hook": "h", "main": "m", "cta": "c"},
            "subtitles": ["one", "two"]
        }"#;
        let script: Script = serde_json::from_str(raw).unwrap();
        assert_eq!(script.extra.get("title"), Some(&Value::from("Rust 2026")));
        assert_eq!(
            script.scenes[0].extra.get("camera"),
            Some(&Value::from("pan"))
        );
        let reencoded = serde_json::to_value(&script).unwrap();
        assert_eq!(reencoded["title"], "Rust 2026");
        assert_eq!(reencoded["scenes"][0]["camera"], "pan");
    }

    #[test]
    fn scene_lookup_is_one_based() {
        let script = Script {
            scenes: vec![Scene {
                visual_prompt: "first".into(),
                veo_prompt: None,
                text_overlay: String::new(),
                extra: Map::new(),
            }],
            ..Script::default()
        };
        assert_eq!(script.scene(1).map(|s| s.visual_prompt.as_str()), Some("first"));
        assert!(script.scene(0).is_none());
        assert!(script.scene(2).is_none());
    }

    #[test]
    fn seo_title_falls_back() {
        let mut seo = SeoPackage::default();
        assert_eq!(seo.primary_title(), DEFAULT_UPLOAD_TITLE);
        seo.titles.insert("A".into(), "Title A".into());
        seo.titles.insert("B".into(), "Title B".into());
        assert_eq!(seo.primary_title(), "Title A");
    }
}
