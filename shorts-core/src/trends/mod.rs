pub mod hackernews;
pub mod reddit;
pub mod scoring;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::TrendsSection;
use crate::models::{TrendItem, TrendReport};

pub use hackernews::HackerNewsSource;
pub use reddit::RedditSource;
pub use scoring::{matches_keywords, rank_topics, score_topic, HOOK_KEYWORDS, TECH_KEYWORDS};

#[derive(Debug, Error)]
pub enum TrendError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{url} returned {status}")]
    Status { url: String, status: u16 },
}

pub type TrendResult<T> = std::result::Result<T, TrendError>;

#[async_trait]
pub trait TrendSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self) -> TrendResult<Vec<TrendItem>>;
}

pub struct TrendCollector {
    sources: Vec<Arc<dyn TrendSource>>,
    top_n: usize,
}

impl TrendCollector {
    pub fn new(sources: Vec<Arc<dyn TrendSource>>, top_n: usize) -> Self {
        Self { sources, top_n }
    }

    pub fn from_config(config: &TrendsSection) -> TrendResult<Self> {
        let sources: Vec<Arc<dyn TrendSource>> = vec![
            Arc::new(HackerNewsSource::new(config)?),
            Arc::new(RedditSource::new(config)?),
        ];
        Ok(Self::new(sources, config.top_n))
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Gathers every source and ranks the union. A failing source is logged
    /// and contributes nothing.
    pub async fn collect(&self) -> TrendReport {
        let mut all_items = Vec::new();
        for source in &self.sources {
            match source.fetch().await {
                Ok(items) => {
                    info!(target: "trends", source = source.name(), count = items.len(), "source collected");
                    all_items.extend(items);
                }
                Err(err) => {
                    warn!(target: "trends", source = source.name(), error = %err, "source unavailable");
                }
            }
        }
        let total_collected = all_items.len();
        let top_topics = rank_topics(all_items, self.top_n);
        info!(target: "trends", total_collected, selected = top_topics.len(), "trend collection finished");
        TrendReport {
            fetched_at: Utc::now(),
            total_collected,
            top_topics,
        }
    }
}

pub(crate) async fn fetch_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> TrendResult<T> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(TrendError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub(crate) fn http_client(config: &TrendsSection) -> TrendResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout())
        .build()?)
}

pub(crate) fn unix_time(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or_else(|| DateTime::<Utc>::from(std::time::UNIX_EPOCH))
}
