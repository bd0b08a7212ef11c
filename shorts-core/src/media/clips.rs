use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::{io_error, MediaBackend, MediaError, MediaResult, VideoPoll, VideoRequest};
use crate::config::VideoSection;
use crate::models::{Clip, Frame, Script};
use crate::run_dir::RunDirectory;

pub const DEFAULT_CLIP_SECONDS: u32 = 8;
pub const FAST_COST_PER_SECOND: f64 = 0.10;
pub const FULL_COST_PER_SECOND: f64 = 0.30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Fast,
    Full,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Fast => f.write_str("fast"),
            Quality::Full => f.write_str("full"),
        }
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Quality::Fast),
            "full" => Ok(Quality::Full),
            other => Err(format!("unknown quality tier `{other}` (expected fast or full)")),
        }
    }
}

/// Estimated spend for `clips` clips of the default length.
pub fn estimate_cost(clips: usize, quality: Quality) -> f64 {
    CostModel::default().estimate(clips, quality)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub fast_per_second: f64,
    pub full_per_second: f64,
    pub clip_seconds: u32,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            fast_per_second: FAST_COST_PER_SECOND,
            full_per_second: FULL_COST_PER_SECOND,
            clip_seconds: DEFAULT_CLIP_SECONDS,
        }
    }
}

impl CostModel {
    pub fn from_config(config: &VideoSection) -> Self {
        Self {
            fast_per_second: config.cost_fast_per_second,
            full_per_second: config.cost_full_per_second,
            clip_seconds: config.clip_duration_seconds,
        }
    }

    pub fn rate(&self, quality: Quality) -> f64 {
        match quality {
            Quality::Fast => self.fast_per_second,
            Quality::Full => self.full_per_second,
        }
    }

    pub fn estimate(&self, clips: usize, quality: Quality) -> f64 {
        self.rate(quality) * f64::from(self.clip_seconds) * clips as f64
    }
}

/// Prompt sent with each keyframe when requesting a clip.
pub fn clip_prompt(prompt: &str) -> String {
    format!(
        "9:16 vertical portrait video for YouTube Shorts. {prompt}. \
         Smooth motion, tech aesthetic, dark background."
    )
}

pub struct ClipGenerator {
    backend: Arc<dyn MediaBackend>,
    config: VideoSection,
    quality: Quality,
}

impl ClipGenerator {
    pub fn new(backend: Arc<dyn MediaBackend>, config: VideoSection, quality: Quality) -> Self {
        Self {
            backend,
            config,
            quality,
        }
    }

    fn model(&self) -> &str {
        match self.quality {
            Quality::Fast => &self.config.fast_model,
            Quality::Full => &self.config.full_model,
        }
    }

    /// Animates each frame into a clip. Failed scenes are skipped and the
    /// survivors keep their own scene index.
    pub async fn generate(&self, frames: &[Frame], script: &Script, run: &RunDirectory) -> Vec<Clip> {
        let costs = CostModel::from_config(&self.config);
        info!(
            target: "media",
            clips = frames.len(),
            model = self.model(),
            quality = %self.quality,
            estimated_cost = costs.estimate(frames.len(), self.quality),
            "generating clips"
        );
        let mut attempts = Vec::with_capacity(frames.len());
        for frame in frames {
            let prompt = script
                .scene(frame.scene)
                .and_then(|scene| scene.veo_prompt.clone())
                .filter(|prompt| !prompt.trim().is_empty())
                .unwrap_or_else(|| frame.prompt.clone());
            attempts.push((frame.scene, self.generate_one(frame, &prompt, run).await));
        }
        let clips: Vec<Clip> = attempts
            .into_iter()
            .filter_map(|(scene, attempt)| match attempt {
                Ok(clip) => Some(clip),
                Err(err) => {
                    warn!(target: "media", scene, error = %err, "clip skipped");
                    None
                }
            })
            .collect();
        info!(target: "media", generated = clips.len(), requested = frames.len(), "clips finished");
        clips
    }

    async fn generate_one(&self, frame: &Frame, prompt: &str, run: &RunDirectory) -> MediaResult<Clip> {
        let image = tokio::fs::read(&frame.path)
            .await
            .map_err(io_error(&frame.path))?;
        let request = VideoRequest {
            model: self.model().to_string(),
            prompt: clip_prompt(prompt),
            image,
            image_mime_type: "image/png".into(),
            aspect_ratio: self.config.aspect_ratio.clone(),
            duration_seconds: self.config.clip_duration_seconds,
        };
        let handle = self.backend.submit_video(request).await?;
        debug!(target: "media", scene = frame.scene, operation = %handle.0, "clip submitted");

        let max_wait = self.config.max_poll_wait();
        let started = Instant::now();
        let video = loop {
            sleep(self.config.poll_interval()).await;
            match self.backend.poll_video(&handle).await? {
                VideoPoll::Done(video) => break video,
                VideoPoll::Failed(reason) => return Err(MediaError::VideoFailed(reason)),
                VideoPoll::Pending => {
                    let waited = started.elapsed();
                    if waited >= max_wait {
                        return Err(MediaError::PollTimeout(round_secs(waited)));
                    }
                    debug!(target: "media", scene = frame.scene, waited_secs = waited.as_secs(), "clip pending");
                }
            }
        };

        let clips_dir = run.clips_dir();
        tokio::fs::create_dir_all(&clips_dir)
            .await
            .map_err(io_error(&clips_dir))?;
        let path = run.clip_path(frame.scene);
        let bytes = self.backend.download_video(&video, &path).await?;
        info!(target: "media", scene = frame.scene, bytes, path = %path.display(), "clip saved");
        Ok(Clip {
            scene: frame.scene,
            path,
        })
    }
}

fn round_secs(duration: Duration) -> Duration {
    Duration::from_secs(duration.as_secs())
}
