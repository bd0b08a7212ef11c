use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ShortsConfig {
    pub paths: PathsSection,
    pub text: TextSection,
    pub media: MediaSection,
    pub video: VideoSection,
    pub compositor: CompositorSection,
    pub upload: UploadSection,
    pub trends: TrendsSection,
    #[serde(skip)]
    pub secrets: Secrets,
}

impl ShortsConfig {
    pub fn resolve_path<P: AsRef<Path>>(&self, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.paths.base_dir).join(path)
        }
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.outputs_dir)
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.prompts_dir)
    }

    pub fn client_secret_file(&self) -> PathBuf {
        self.resolve_path(&self.paths.client_secret_file)
    }

    pub fn token_file(&self) -> PathBuf {
        self.resolve_path(&self.paths.token_file)
    }

    pub fn renderer_dir(&self) -> PathBuf {
        self.resolve_path(&self.compositor.renderer_dir)
    }

    /// Copies secrets from the process environment into the config. This is the
    /// only place the environment is consulted.
    pub fn with_env_secrets(mut self) -> Self {
        self.secrets.gemini_api_key = std::env::var(GEMINI_API_KEY_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty());
        self
    }

    pub fn with_gemini_api_key(mut self, key: impl Into<String>) -> Self {
        self.secrets.gemini_api_key = Some(key.into());
        self
    }

    pub fn require_gemini_key(&self) -> Result<&str> {
        self.secrets
            .gemini_api_key
            .as_deref()
            .ok_or(ConfigError::MissingSecret {
                name: GEMINI_API_KEY_ENV,
                remediation: "export GEMINI_API_KEY with a Google AI Studio key before generating",
            })
    }

    pub fn require_client_secret(&self) -> Result<PathBuf> {
        let path = self.client_secret_file();
        if path.exists() {
            Ok(path)
        } else {
            Err(ConfigError::MissingFile {
                path,
                remediation: "download the OAuth client JSON from the Google Cloud console",
            })
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub gemini_api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub base_dir: String,
    pub outputs_dir: String,
    pub prompts_dir: String,
    pub client_secret_file: String,
    pub token_file: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            base_dir: ".".into(),
            outputs_dir: "outputs".into(),
            prompts_dir: "prompts".into(),
            client_secret_file: "credentials/client_secret.json".into(),
            token_file: "credentials/token.json".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TextSection {
    pub api_base: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl TextSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for TextSection {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-2.5-flash".into(),
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaSection {
    pub api_base: String,
    pub image_model: String,
    pub tts_model: String,
    pub voice_name: String,
    pub timeout_seconds: u64,
}

impl MediaSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for MediaSection {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".into(),
            image_model: "gemini-2.5-flash-image".into(),
            tts_model: "gemini-2.5-flash-preview-tts".into(),
            voice_name: "Kore".into(),
            timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VideoSection {
    pub fast_model: String,
    pub full_model: String,
    pub cost_fast_per_second: f64,
    pub cost_full_per_second: f64,
    pub clip_duration_seconds: u32,
    pub aspect_ratio: String,
    pub poll_interval_seconds: u64,
    pub max_poll_wait_seconds: u64,
}

impl VideoSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn max_poll_wait(&self) -> Duration {
        Duration::from_secs(self.max_poll_wait_seconds)
    }
}

impl Default for VideoSection {
    fn default() -> Self {
        Self {
            fast_model: "veo-3.1-fast-generate-preview".into(),
            full_model: "veo-3.1-generate-preview".into(),
            cost_fast_per_second: 0.10,
            cost_full_per_second: 0.30,
            clip_duration_seconds: 8,
            aspect_ratio: "9:16".into(),
            poll_interval_seconds: 10,
            max_poll_wait_seconds: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompositorSection {
    pub renderer_program: String,
    pub renderer_args: Vec<String>,
    pub renderer_dir: String,
    pub render_timeout_seconds: u64,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub ffmpeg_path: String,
}

impl CompositorSection {
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_seconds)
    }
}

impl Default for CompositorSection {
    fn default() -> Self {
        Self {
            renderer_program: "npx".into(),
            renderer_args: vec![
                "remotion".into(),
                "render".into(),
                "src/Root.tsx".into(),
                "ShortsVideo".into(),
            ],
            renderer_dir: "remotion".into(),
            render_timeout_seconds: 1200,
            fps: 30,
            width: 1080,
            height: 1920,
            ffmpeg_path: "ffmpeg".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSection {
    pub upload_url: String,
    pub chunk_size_bytes: usize,
    pub max_retries: u32,
    pub retriable_statuses: Vec<u16>,
    pub category_id: String,
    pub scopes: Vec<String>,
    pub timeout_seconds: u64,
}

impl UploadSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            upload_url: "https://www.googleapis.com/upload/youtube/v3/videos".into(),
            chunk_size_bytes: 256 * 1024,
            max_retries: 5,
            retriable_statuses: vec![500, 502, 503, 504],
            category_id: "28".into(),
            scopes: vec!["https://www.googleapis.com/auth/youtube.upload".into()],
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendsSection {
    pub top_n: usize,
    pub hn_top_url: String,
    pub hn_item_url: String,
    pub hn_scan_limit: usize,
    pub hn_story_limit: usize,
    pub reddit_base_url: String,
    pub reddit_subreddits: Vec<String>,
    pub reddit_limit_per_sub: u32,
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl TrendsSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for TrendsSection {
    fn default() -> Self {
        Self {
            top_n: 10,
            hn_top_url: "https://hacker-news.firebaseio.com/v0/topstories.json".into(),
            hn_item_url: "https://hacker-news.firebaseio.com/v0/item".into(),
            hn_scan_limit: 50,
            hn_story_limit: 30,
            reddit_base_url: "https://www.reddit.com".into(),
            reddit_subreddits: [
                "devops",
                "MachineLearning",
                "kubernetes",
                "LocalLLaMA",
                "programming",
                "aws",
            ]
            .iter()
            .map(|sub| sub.to_string())
            .collect(),
            reddit_limit_per_sub: 10,
            user_agent: "shorts-pipeline-bot/1.0".into(),
            timeout_seconds: 10,
        }
    }
}

pub fn load_shorts_config<P: AsRef<Path>>(path: P) -> Result<ShortsConfig> {
    load_toml(path)
}

/// Loads the config file when present, otherwise falls back to built-in defaults.
pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<ShortsConfig> {
    let path = path.as_ref();
    if path.exists() {
        load_shorts_config(path)
    } else {
        tracing::debug!(target: "config", path = %path.display(), "config file absent, using defaults");
        Ok(ShortsConfig::default())
    }
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
