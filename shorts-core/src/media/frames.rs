use std::sync::Arc;

use image::ImageFormat;
use tracing::{info, warn};

use super::{io_error, MediaBackend, MediaResult};
use crate::models::{Frame, Scene, Script};
use crate::run_dir::RunDirectory;

/// Wraps a scene's visual prompt in the channel's portrait keyframe style.
pub fn keyframe_prompt(visual_prompt: &str) -> String {
    format!(
        "Create a tech-focused YouTube Shorts keyframe image for a developer audience.\n\
         9:16 portrait format, 1080x1920px equivalent.\n\
         Style: dark background, modern tech aesthetic, neon accents.\n\
         Content: {visual_prompt}\n\
         No text overlays, clean visual only."
    )
}

pub struct KeyframeGenerator {
    backend: Arc<dyn MediaBackend>,
}

impl KeyframeGenerator {
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self { backend }
    }

    /// Generates one frame per scene. Scenes that fail are skipped; the
    /// manifest lists only the frames that were written.
    pub async fn generate(&self, script: &Script, run: &RunDirectory) -> MediaResult<Vec<Frame>> {
        let frames_dir = run.frames_dir();
        std::fs::create_dir_all(&frames_dir).map_err(io_error(&frames_dir))?;
        info!(target: "media", scenes = script.scenes.len(), "generating keyframes");

        let mut attempts = Vec::with_capacity(script.scenes.len());
        for (offset, scene) in script.scenes.iter().enumerate() {
            let index = offset + 1;
            attempts.push((index, self.generate_one(index, scene, run).await));
        }
        let frames: Vec<Frame> = attempts
            .into_iter()
            .filter_map(|(index, attempt)| match attempt {
                Ok(frame) => Some(frame),
                Err(err) => {
                    warn!(target: "media", scene = index, error = %err, "keyframe skipped");
                    None
                }
            })
            .collect();

        let manifest = run.frames_manifest();
        run.write_json(&manifest, &frames)
            .map_err(io_error(&manifest))?;
        info!(
            target: "media",
            generated = frames.len(),
            requested = script.scenes.len(),
            "keyframes finished"
        );
        Ok(frames)
    }

    async fn generate_one(
        &self,
        index: usize,
        scene: &Scene,
        run: &RunDirectory,
    ) -> MediaResult<Frame> {
        let bytes = self
            .backend
            .generate_image(&keyframe_prompt(&scene.visual_prompt))
            .await?;
        let decoded = image::load_from_memory(&bytes)?;
        let path = run.frame_path(index);
        if matches!(image::guess_format(&bytes), Ok(ImageFormat::Png)) {
            std::fs::write(&path, &bytes).map_err(io_error(&path))?;
        } else {
            decoded.save_with_format(&path, ImageFormat::Png)?;
        }
        info!(target: "media", scene = index, path = %path.display(), "keyframe saved");
        Ok(Frame {
            scene: index,
            path,
            prompt: scene.visual_prompt.clone(),
            width: decoded.width(),
            height: decoded.height(),
        })
    }
}
