pub mod prompts;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::llm::{parse_payload, LlmResult, TextGenerator, TextPayload, TextRequest};
use crate::models::{Script, SeoPackage, TopicShortlist, TrendReport};

pub use prompts::{PromptKind, PromptLibrary};

fn fenced_json<T: Serialize + ?Sized>(value: &T) -> LlmResult<String> {
    Ok(format!("```json\n{}\n```", serde_json::to_string_pretty(value)?))
}

fn log_outcome<T>(stage: &'static str, payload: &TextPayload<T>) {
    if payload.is_raw() {
        warn!(target: "llm", stage, "model answer was not valid json, keeping raw response");
    } else {
        info!(target: "llm", stage, "model answer parsed");
    }
}

pub struct TopicSelector {
    generator: Arc<dyn TextGenerator>,
    instruction: String,
}

impl TopicSelector {
    pub fn new(generator: Arc<dyn TextGenerator>, prompts: &PromptLibrary) -> Self {
        Self {
            generator,
            instruction: prompts.load(PromptKind::TopicResearch),
        }
    }

    pub async fn select(&self, report: &TrendReport) -> LlmResult<TextPayload<TopicShortlist>> {
        info!(target: "llm", items = report.top_topics.len(), "requesting topic shortlist");
        let contents = format!(
            "Below are today's trending items. Pick the three best topics for a Short.\n\n{}",
            fenced_json(&report.top_topics)?
        );
        let text = self
            .generator
            .generate(TextRequest::new(self.instruction.clone(), contents))
            .await?;
        let payload = parse_payload(&text);
        log_outcome("topics", &payload);
        Ok(payload)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScriptBrief {
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl ScriptBrief {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }
}

pub struct ScriptWriter {
    generator: Arc<dyn TextGenerator>,
    instruction: String,
}

impl ScriptWriter {
    pub fn new(generator: Arc<dyn TextGenerator>, prompts: &PromptLibrary) -> Self {
        Self {
            generator,
            instruction: prompts.load(PromptKind::ScriptWriter),
        }
    }

    pub async fn write(&self, brief: &ScriptBrief) -> LlmResult<TextPayload<Script>> {
        info!(target: "llm", topic = %brief.topic, "writing script");
        let contents = format!(
            "Write a 60-second Shorts script for this topic.\n\n{}",
            fenced_json(brief)?
        );
        let text = self
            .generator
            .generate(TextRequest::new(self.instruction.clone(), contents))
            .await?;
        let payload = parse_payload::<Script>(&text);
        if let Some(script) = payload.parsed() {
            info!(target: "llm", scenes = script.scenes.len(), "script ready");
        }
        log_outcome("script", &payload);
        Ok(payload)
    }
}

pub struct SeoPackager {
    generator: Arc<dyn TextGenerator>,
    instruction: String,
}

impl SeoPackager {
    pub fn new(generator: Arc<dyn TextGenerator>, prompts: &PromptLibrary) -> Self {
        Self {
            generator,
            instruction: prompts.load(PromptKind::SeoPackager),
        }
    }

    pub async fn package(&self, script: &Script) -> LlmResult<TextPayload<SeoPackage>> {
        info!(target: "llm", "generating seo package");
        let contents = format!(
            "Build the YouTube upload package for the script below.\n\n{}",
            fenced_json(script)?
        );
        let text = self
            .generator
            .generate(TextRequest::new(self.instruction.clone(), contents))
            .await?;
        let payload = parse_payload(&text);
        log_outcome("seo", &payload);
        Ok(payload)
    }
}
