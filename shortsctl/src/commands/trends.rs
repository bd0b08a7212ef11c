use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use shorts_core::{ShortsConfig, TrendCollector, TrendItem, TrendReport};

use crate::{render, DisplayFallback, OutputFormat, Result};

/// Collect trending items and write the ranked report.
#[derive(Args, Debug, Clone)]
pub struct TrendsArgs {
    /// File receiving the JSON report
    #[arg(short, long, default_value = "trends.json")]
    pub output: PathBuf,
    /// Number of ranked items to keep
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

#[derive(Debug, Serialize)]
pub struct TrendListing {
    pub output: PathBuf,
    #[serde(flatten)]
    pub report: TrendReport,
}

impl DisplayFallback for TrendListing {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "Collected {} items, top {}:",
            self.report.total_collected,
            self.report.top_topics.len()
        )];
        lines.extend(
            self.report
                .top_topics
                .iter()
                .enumerate()
                .map(|(index, item)| format_item(index + 1, item)),
        );
        lines.push(format!("Saved to {}", self.output.display()));
        lines.join("\n")
    }
}

fn format_item(rank: usize, item: &TrendItem) -> String {
    format!(
        "{rank:>2}. [{}] {} ({} points, {} comments)",
        item.source, item.title, item.score, item.comments
    )
}

pub async fn run(config: &ShortsConfig, args: &TrendsArgs, format: OutputFormat) -> Result<()> {
    let collector = TrendCollector::from_config(&config.trends)?.with_top_n(args.top);
    let report = collector.collect().await;
    if let Some(parent) = args.output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&args.output, serde_json::to_vec_pretty(&report)?)?;
    render(
        &TrendListing {
            output: args.output.clone(),
            report,
        },
        format,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn listing_text_is_ranked() {
        let listing = TrendListing {
            output: PathBuf::from("trends.json"),
            report: TrendReport {
                fetched_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
                total_collected: 12,
                top_topics: vec![TrendItem {
                    source: "HackerNews".into(),
                    title: "Rust 2024".into(),
                    url: "https://example.com".into(),
                    score: 420,
                    comments: 99,
                    time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
                }],
            },
        };
        let text = listing.display();
        assert!(text.starts_with("Collected 12 items, top 1:"));
        assert!(text.contains(" 1. [HackerNews] Rust 2024 (420 points, 99 comments)"));
        assert!(text.ends_with("Saved to trends.json"));

        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["total_collected"], 12);
        assert_eq!(json["output"], "trends.json");
    }
}
