use crate::models::TrendItem;

pub const TECH_KEYWORDS: &[&str] = &[
    "ai",
    "llm",
    "kubernetes",
    "docker",
    "devops",
    "claude",
    "gemini",
    "gpt",
    "openai",
    "anthropic",
    "ml",
    "gpu",
    "serverless",
    "cicd",
    "terraform",
    "python",
    "rust",
    "go",
    "kafka",
    "redis",
    "postgres",
    "k8s",
    "helm",
    "agent",
    "rag",
    "vector",
    "embedding",
    "fine-tune",
    "open source",
    "github",
];

pub const HOOK_KEYWORDS: &[&str] = &[
    "new",
    "introduce",
    "release",
    "launch",
    "faster",
    "better",
    "free",
    "open source",
    "vs",
    "outperform",
    "beats",
];

pub const HOOK_BONUS: f64 = 500.0;

/// Case-insensitive substring match against a keyword list.
pub fn matches_keywords(title: &str, keywords: &[&str]) -> bool {
    let lowered = title.to_lowercase();
    keywords.iter().any(|keyword| lowered.contains(keyword))
}

pub fn score_topic(item: &TrendItem) -> f64 {
    let mut score = item.score as f64 * 0.5 + item.comments as f64 * 2.0;
    if matches_keywords(&item.title, HOOK_KEYWORDS) {
        score += HOOK_BONUS;
    }
    score
}

/// Sorts by descending score, keeping the input order among ties, and keeps
/// the first `top_n`.
pub fn rank_topics(items: Vec<TrendItem>, top_n: usize) -> Vec<TrendItem> {
    let mut scored: Vec<(f64, TrendItem)> = items
        .into_iter()
        .map(|item| (score_topic(&item), item))
        .collect();
    // sort_by is stable
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().take(top_n).map(|(_, item)| item).collect()
}
