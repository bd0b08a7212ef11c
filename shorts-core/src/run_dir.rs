use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const TRENDS_FILE: &str = "trends.json";
pub const SCRIPT_FILE: &str = "script.json";
pub const SEO_FILE: &str = "seo.json";
pub const PROPS_FILE: &str = "composition-props.json";
pub const FINAL_VIDEO_FILE: &str = "final_shorts.mp4";
pub const NARRATION_FILE: &str = "narration.wav";
pub const FRAMES_DIR: &str = "frames";
pub const CLIPS_DIR: &str = "clips";
pub const FRAMES_MANIFEST_FILE: &str = "frames_manifest.json";
pub const CONCAT_LIST_FILE: &str = "concat_list.txt";

const SLUG_MAX_CHARS: usize = 30;

fn path_hostile() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).expect("valid regex"))
}

/// Lowercases, turns spaces into `-` and keeps at most 30 characters.
/// Characters that cannot appear in a directory name become `-` as well.
pub fn slugify(topic: &str) -> String {
    let lowered = topic.trim().to_lowercase().replace(' ', "-");
    let truncated: String = lowered.chars().take(SLUG_MAX_CHARS).collect();
    let cleaned = path_hostile().replace_all(&truncated, "-").into_owned();
    if cleaned.is_empty() {
        "untitled".into()
    } else {
        cleaned
    }
}

/// Cleans a slug proposed by the topic model without truncating it.
/// Returns `None` when nothing usable remains.
pub fn sanitize_slug(slug: &str) -> Option<String> {
    let cleaned = path_hostile().replace_all(slug.trim(), "-").into_owned();
    (!cleaned.trim_matches('-').is_empty()).then_some(cleaned)
}

/// One pipeline invocation's working directory, `<YYYY-MM-DD>-<slug>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectory {
    root: PathBuf,
}

impl RunDirectory {
    pub fn create(outputs_dir: &Path, date: NaiveDate, slug: &str) -> io::Result<Self> {
        let name = format!("{}-{}", date.format("%Y-%m-%d"), slug);
        let run = Self {
            root: outputs_dir.join(name),
        };
        fs::create_dir_all(run.frames_dir())?;
        fs::create_dir_all(run.clips_dir())?;
        Ok(run)
    }

    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.join(FRAMES_DIR)
    }

    pub fn clips_dir(&self) -> PathBuf {
        self.root.join(CLIPS_DIR)
    }

    pub fn frame_path(&self, scene: usize) -> PathBuf {
        self.frames_dir().join(format!("frame_{scene:02}.png"))
    }

    pub fn clip_path(&self, scene: usize) -> PathBuf {
        self.clips_dir().join(format!("clip_{scene:02}.mp4"))
    }

    pub fn frames_manifest(&self) -> PathBuf {
        self.frames_dir().join(FRAMES_MANIFEST_FILE)
    }

    pub fn concat_list(&self) -> PathBuf {
        self.clips_dir().join(CONCAT_LIST_FILE)
    }

    pub fn trends_file(&self) -> PathBuf {
        self.root.join(TRENDS_FILE)
    }

    pub fn script_file(&self) -> PathBuf {
        self.root.join(SCRIPT_FILE)
    }

    pub fn seo_file(&self) -> PathBuf {
        self.root.join(SEO_FILE)
    }

    pub fn props_file(&self) -> PathBuf {
        self.root.join(PROPS_FILE)
    }

    pub fn final_video(&self) -> PathBuf {
        self.root.join(FINAL_VIDEO_FILE)
    }

    pub fn narration_file(&self) -> PathBuf {
        self.root.join(NARRATION_FILE)
    }

    /// Path of `path` relative to the run directory, or `path` unchanged when
    /// it lives elsewhere.
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_vec_pretty(value)?;
        fs::write(path, body)
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> io::Result<T> {
        let body = fs::read(path)?;
        Ok(serde_json::from_slice(&body)?)
    }
}
