use std::path::{Path, PathBuf};

use tracing::{debug, warn};

const TOPIC_RESEARCH: &str = include_str!("../../../prompts/topic_research.md");
const SCRIPT_WRITER: &str = include_str!("../../../prompts/script_writer.md");
const SEO_PACKAGER: &str = include_str!("../../../prompts/seo_packager.md");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    TopicResearch,
    ScriptWriter,
    SeoPackager,
}

impl PromptKind {
    pub fn file_name(self) -> &'static str {
        match self {
            PromptKind::TopicResearch => "topic_research.md",
            PromptKind::ScriptWriter => "script_writer.md",
            PromptKind::SeoPackager => "seo_packager.md",
        }
    }

    pub fn embedded(self) -> &'static str {
        match self {
            PromptKind::TopicResearch => TOPIC_RESEARCH,
            PromptKind::ScriptWriter => SCRIPT_WRITER,
            PromptKind::SeoPackager => SEO_PACKAGER,
        }
    }
}

/// Resolves instruction templates, preferring `<dir>/<name>.md` over the
/// compiled-in copy.
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    dir: Option<PathBuf>,
}

impl PromptLibrary {
    pub fn embedded() -> Self {
        Self { dir: None }
    }

    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: Some(dir.as_ref().to_path_buf()),
        }
    }

    pub fn load(&self, kind: PromptKind) -> String {
        let Some(dir) = &self.dir else {
            return kind.embedded().to_string();
        };
        let path = dir.join(kind.file_name());
        if !path.exists() {
            return kind.embedded().to_string();
        }
        match std::fs::read_to_string(&path) {
            Ok(content) if !content.trim().is_empty() => {
                debug!(target: "llm", path = %path.display(), "using prompt override");
                content
            }
            Ok(_) => {
                warn!(target: "llm", path = %path.display(), "prompt override is empty, using built-in prompt");
                kind.embedded().to_string()
            }
            Err(err) => {
                warn!(target: "llm", path = %path.display(), error = %err, "cannot read prompt override, using built-in prompt");
                kind.embedded().to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_prompts_mention_json() {
        for kind in [
            PromptKind::TopicResearch,
            PromptKind::ScriptWriter,
            PromptKind::SeoPackager,
        ] {
            assert!(kind.embedded().contains("```json"), "{kind:?}");
        }
    }

    #[test]
    fn override_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("seo_packager.md"), "custom seo prompt").unwrap();
        let library = PromptLibrary::from_dir(dir.path());
        assert_eq!(library.load(PromptKind::SeoPackager), "custom seo prompt");
        assert_eq!(
            library.load(PromptKind::ScriptWriter),
            PromptKind::ScriptWriter.embedded()
        );
    }
}
