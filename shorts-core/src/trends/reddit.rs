use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::{fetch_json, http_client, unix_time, TrendResult, TrendSource};
use crate::config::TrendsSection;
use crate::models::TrendItem;

#[derive(Debug, Deserialize)]
pub struct Listing {
    pub data: ListingData,
}

#[derive(Debug, Deserialize)]
pub struct ListingData {
    #[serde(default)]
    pub children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
pub struct Child {
    pub data: Post,
}

#[derive(Debug, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub stickied: bool,
}

pub fn posts_from_listing(subreddit: &str, listing: Listing) -> Vec<TrendItem> {
    listing
        .data
        .children
        .into_iter()
        .map(|child| child.data)
        .filter(|post| !post.stickied)
        .map(|post| TrendItem {
            source: format!("reddit/r/{subreddit}"),
            url: format!("https://reddit.com{}", post.permalink),
            title: post.title,
            score: post.score,
            comments: post.num_comments,
            time: unix_time(post.created_utc as i64),
        })
        .collect()
}

pub struct RedditSource {
    client: reqwest::Client,
    base_url: String,
    subreddits: Vec<String>,
    limit: u32,
}

impl RedditSource {
    pub fn new(config: &TrendsSection) -> TrendResult<Self> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config.reddit_base_url.trim_end_matches('/').to_string(),
            subreddits: config.reddit_subreddits.clone(),
            limit: config.reddit_limit_per_sub,
        })
    }

    async fn fetch_subreddit(&self, subreddit: &str) -> TrendResult<Vec<TrendItem>> {
        let url = format!("{}/r/{subreddit}/hot.json?limit={}", self.base_url, self.limit);
        let listing: Listing = fetch_json(&self.client, &url).await?;
        Ok(posts_from_listing(subreddit, listing))
    }
}

#[async_trait]
impl TrendSource for RedditSource {
    fn name(&self) -> &str {
        "reddit"
    }

    async fn fetch(&self) -> TrendResult<Vec<TrendItem>> {
        let mut posts = Vec::new();
        for subreddit in &self.subreddits {
            match self.fetch_subreddit(subreddit).await {
                Ok(items) => posts.extend(items),
                Err(err) => {
                    warn!(target: "trends", subreddit = %subreddit, error = %err, "subreddit unavailable");
                }
            }
        }
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stickied_posts_are_skipped() {
        let raw = r#"{"kind":"Listing","data":{"children":[
            {"kind":"t3","data":{"title":"Weekly thread","permalink":"/r/aws/comments/1/","score":3,"num_comments":1,"created_utc":1700000000.0,"stickied":true}},
            {"kind":"t3","data":{"title":"Lambda cold starts","permalink":"/r/aws/comments/2/","score":250,"num_comments":40,"created_utc":1700000100.0,"stickied":false}}
        ]}}"#;
        let listing: Listing = serde_json::from_str(raw).unwrap();
        let posts = posts_from_listing("aws", listing);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].source, "reddit/r/aws");
        assert_eq!(posts[0].url, "https://reddit.com/r/aws/comments/2/");
        assert_eq!(posts[0].score, 250);
        assert_eq!(posts[0].comments, 40);
    }
}
