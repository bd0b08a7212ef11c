pub mod allocation;
pub mod concat;
pub mod process;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{error, info};

use crate::config::ShortsConfig;
use crate::models::{Clip, NarrationAsset, Script};
use crate::run_dir::RunDirectory;

pub use allocation::{allocate_frames, total_frames};
pub use concat::FallbackConcatenator;
pub use process::{CommandExecutor, SystemCommandExecutor};

#[derive(Debug, Error)]
pub enum CompositorError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type CompositorResult<T> = std::result::Result<T, CompositorError>;

pub(crate) fn io_error(path: &std::path::Path) -> impl FnOnce(std::io::Error) -> CompositorError {
    let path = path.to_path_buf();
    move |source| CompositorError::Io { path, source }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderScene {
    pub clip_file: String,
    pub text_overlay: String,
    pub duration_frames: u64,
}

/// Props consumed by the external renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSpec {
    pub scenes: Vec<RenderScene>,
    pub subtitles: Vec<String>,
    pub narration_file: String,
    pub total_duration_frames: u64,
}

/// Builds the render props. Returns `None` when there are no clips.
pub fn build_render_spec(
    script: &Script,
    clips: &[Clip],
    narration: Option<&NarrationAsset>,
    run: &RunDirectory,
    fps: u32,
    clip_seconds: u32,
) -> Option<RenderSpec> {
    if clips.is_empty() {
        return None;
    }
    let target_seconds = match narration {
        Some(asset) => asset.duration_seconds,
        None => clips.len() as f64 * f64::from(clip_seconds),
    };
    let total = total_frames(target_seconds, fps);
    let allocations = allocate_frames(total, clips.len());
    let scenes = clips
        .iter()
        .zip(allocations)
        .map(|(clip, duration_frames)| RenderScene {
            clip_file: run.relative(&clip.path).to_string_lossy().into_owned(),
            text_overlay: script
                .scene(clip.scene)
                .map(|scene| scene.text_overlay.clone())
                .unwrap_or_default(),
            duration_frames,
        })
        .collect();
    Some(RenderSpec {
        scenes,
        subtitles: script.subtitles.clone(),
        narration_file: narration
            .map(|asset| run.relative(&asset.path).to_string_lossy().into_owned())
            .unwrap_or_default(),
        total_duration_frames: total,
    })
}

#[derive(Debug, Clone)]
pub struct RendererSettings {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub timeout: Duration,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub clip_seconds: u32,
}

impl RendererSettings {
    pub fn from_config(config: &ShortsConfig) -> Self {
        Self {
            program: config.compositor.renderer_program.clone(),
            args: config.compositor.renderer_args.clone(),
            working_dir: config.renderer_dir(),
            timeout: config.compositor.render_timeout(),
            fps: config.compositor.fps,
            width: config.compositor.width,
            height: config.compositor.height,
            clip_seconds: config.video.clip_duration_seconds,
        }
    }
}

pub struct Compositor {
    executor: Arc<dyn CommandExecutor>,
    settings: RendererSettings,
}

impl Compositor {
    pub fn new(executor: Arc<dyn CommandExecutor>, settings: RendererSettings) -> Self {
        Self { executor, settings }
    }

    /// Writes the render props and runs the external renderer. Any renderer
    /// problem yields `Ok(None)` so the caller can fall back.
    pub async fn render(
        &self,
        script: &Script,
        clips: &[Clip],
        narration: Option<&NarrationAsset>,
        run: &RunDirectory,
    ) -> CompositorResult<Option<PathBuf>> {
        let Some(spec) = build_render_spec(
            script,
            clips,
            narration,
            run,
            self.settings.fps,
            self.settings.clip_seconds,
        ) else {
            error!(target: "compositor", "no clips to compose");
            return Ok(None);
        };

        let props_path = run.props_file();
        run.write_json(&props_path, &spec)
            .map_err(io_error(&props_path))?;
        info!(
            target: "compositor",
            path = %props_path.display(),
            scenes = spec.scenes.len(),
            total_frames = spec.total_duration_frames,
            "render props written"
        );

        let props_abs = process::absolute(&props_path).map_err(io_error(&props_path))?;
        let public_abs = process::absolute(run.root()).map_err(io_error(run.root()))?;
        let output = public_abs.join(crate::run_dir::FINAL_VIDEO_FILE);

        let mut command = Command::new(&self.settings.program);
        command
            .kill_on_drop(true)
            .current_dir(&self.settings.working_dir)
            .args(&self.settings.args)
            .arg(&output)
            .arg(format!("--props={}", props_abs.display()))
            .arg(format!("--public-dir={}", public_abs.display()))
            .arg(format!("--width={}", self.settings.width))
            .arg(format!("--height={}", self.settings.height))
            .arg(format!("--fps={}", self.settings.fps));
        info!(target: "compositor", command = %process::describe(&command), "starting renderer");

        match timeout(self.settings.timeout, self.executor.run(&mut command)).await {
            Ok(Ok(result)) if result.status.success() => {
                if output.exists() {
                    info!(target: "compositor", path = %output.display(), "render finished");
                    Ok(Some(output))
                } else {
                    error!(target: "compositor", path = %output.display(), "renderer exited cleanly but wrote no video");
                    Ok(None)
                }
            }
            Ok(Ok(result)) => {
                error!(
                    target: "compositor",
                    status = ?result.status.code(),
                    stderr = %process::stderr_tail(&result),
                    "renderer failed"
                );
                Ok(None)
            }
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                error!(
                    target: "compositor",
                    program = %self.settings.program,
                    "renderer not found; install Node.js and run `npm install` in the renderer directory"
                );
                Ok(None)
            }
            Ok(Err(err)) => {
                error!(target: "compositor", error = %err, "renderer could not be started");
                Ok(None)
            }
            Err(_) => {
                error!(target: "compositor", timeout_secs = self.settings.timeout.as_secs(), "renderer timed out");
                Ok(None)
            }
        }
    }
}
