use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{fetch_json, http_client, matches_keywords, unix_time, TrendResult, TrendSource};
use crate::config::TrendsSection;
use crate::models::TrendItem;
use crate::trends::TECH_KEYWORDS;

const MAX_TOP_IDS: usize = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HnItem {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub descendants: Option<i64>,
    #[serde(default)]
    pub time: Option<i64>,
}

/// Converts a story into a trend item when it is a story with a tech keyword
/// in its title.
pub fn story_from_item(id: u64, item: HnItem) -> Option<TrendItem> {
    if item.kind.as_deref() != Some("story") {
        return None;
    }
    let title = item.title?;
    if !matches_keywords(&title, TECH_KEYWORDS) {
        return None;
    }
    Some(TrendItem {
        source: "hackernews".into(),
        url: item
            .url
            .unwrap_or_else(|| format!("https://news.ycombinator.com/item?id={id}")),
        title,
        score: item.score.unwrap_or(0),
        comments: item.descendants.unwrap_or(0),
        time: unix_time(item.time.unwrap_or(0)),
    })
}

pub struct HackerNewsSource {
    client: reqwest::Client,
    top_url: String,
    item_url: String,
    scan_limit: usize,
    story_limit: usize,
}

impl HackerNewsSource {
    pub fn new(config: &TrendsSection) -> TrendResult<Self> {
        Ok(Self {
            client: http_client(config)?,
            top_url: config.hn_top_url.clone(),
            item_url: config.hn_item_url.trim_end_matches('/').to_string(),
            scan_limit: config.hn_scan_limit,
            story_limit: config.hn_story_limit,
        })
    }
}

#[async_trait]
impl TrendSource for HackerNewsSource {
    fn name(&self) -> &str {
        "hackernews"
    }

    async fn fetch(&self) -> TrendResult<Vec<TrendItem>> {
        let mut ids: Vec<u64> = fetch_json(&self.client, &self.top_url).await?;
        ids.truncate(MAX_TOP_IDS);

        let mut stories = Vec::new();
        for id in ids.into_iter().take(self.scan_limit) {
            let url = format!("{}/{id}.json", self.item_url);
            let item = match fetch_json::<Option<HnItem>>(&self.client, &url).await {
                Ok(Some(item)) => item,
                Ok(None) => continue,
                Err(err) => {
                    debug!(target: "trends", id, error = %err, "skipping hacker news item");
                    continue;
                }
            };
            if let Some(story) = story_from_item(id, item) {
                stories.push(story);
            }
            if stories.len() >= self.story_limit {
                break;
            }
        }
        Ok(stories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(title: &str) -> HnItem {
        HnItem {
            kind: Some("story".into()),
            title: Some(title.into()),
            url: None,
            score: Some(120),
            descendants: Some(30),
            time: Some(1_700_000_000),
        }
    }

    #[test]
    fn url_falls_back_to_discussion_page() {
        let item = story_from_item(42, story("Postgres 18 is out")).unwrap();
        assert_eq!(item.url, "https://news.ycombinator.com/item?id=42");
        assert_eq!(item.score, 120);
        assert_eq!(item.comments, 30);
        assert_eq!(item.source, "hackernews");
    }

    #[test]
    fn non_stories_and_off_topic_titles_are_dropped() {
        let mut job = story("Hiring Rust engineers");
        job.kind = Some("job".into());
        assert!(story_from_item(1, job).is_none());
        assert!(story_from_item(2, story("Medieval bread recipes")).is_none());
    }

    #[test]
    fn item_json_decodes() {
        let raw = r#"{"by":"x","descendants":5,"id":7,"score":9,"time":1700000000,"title":"Docker tips","type":"story","url":"https://d.test"}"#;
        let item: HnItem = serde_json::from_str(raw).unwrap();
        let trend = story_from_item(7, item).unwrap();
        assert_eq!(trend.url, "https://d.test");
        assert_eq!(trend.comments, 5);
    }
}
