use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::process::Command;
use tracing::{error, info};

use super::process::{self, CommandExecutor};
use super::{io_error, CompositorResult};
use crate::models::Clip;
use crate::run_dir::RunDirectory;

/// One `file '<path>'` line per clip, quoting for ffmpeg's concat demuxer.
pub fn concat_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| {
            let escaped = path.to_string_lossy().replace('\'', r"'\''");
            format!("file '{escaped}'\n")
        })
        .collect()
}

/// Joins clips with ffmpeg stream copy when the renderer is unavailable.
pub struct FallbackConcatenator {
    executor: Arc<dyn CommandExecutor>,
    ffmpeg: PathBuf,
}

impl FallbackConcatenator {
    pub fn new(executor: Arc<dyn CommandExecutor>, ffmpeg: impl AsRef<Path>) -> Self {
        Self {
            executor,
            ffmpeg: ffmpeg.as_ref().to_path_buf(),
        }
    }

    pub async fn concat(&self, clips: &[Clip], run: &RunDirectory) -> CompositorResult<Option<PathBuf>> {
        if clips.is_empty() {
            error!(target: "compositor", "no clips to concatenate");
            return Ok(None);
        }
        let mut paths = Vec::with_capacity(clips.len());
        for clip in clips {
            paths.push(process::absolute(&clip.path).map_err(io_error(&clip.path))?);
        }
        let list_path = run.concat_list();
        if let Some(parent) = list_path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        std::fs::write(&list_path, concat_list(&paths)).map_err(io_error(&list_path))?;

        let output = run.final_video();
        let mut command = Command::new(&self.ffmpeg);
        command
            .kill_on_drop(true)
            .arg("-y")
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(&list_path)
            .args(["-c", "copy"])
            .arg(&output);
        info!(target: "compositor", command = %process::describe(&command), "concatenating clips");

        match self.executor.run(&mut command).await {
            Ok(result) if result.status.success() => {
                info!(target: "compositor", path = %output.display(), clips = clips.len(), "fallback video written");
                Ok(Some(output))
            }
            Ok(result) => {
                error!(
                    target: "compositor",
                    status = ?result.status.code(),
                    stderr = %process::stderr_tail(&result),
                    "ffmpeg concat failed"
                );
                Ok(None)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                error!(target: "compositor", program = %self.ffmpeg.display(), "ffmpeg is not installed");
                Ok(None)
            }
            Err(err) => {
                error!(target: "compositor", error = %err, "ffmpeg could not be started");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_quotes_each_path() {
        let list = concat_list(&[
            PathBuf::from("/runs/a/clips/clip_01.mp4"),
            PathBuf::from("/runs/it's/clips/clip_03.mp4"),
        ]);
        assert_eq!(
            list,
            "file '/runs/a/clips/clip_01.mp4'\nfile '/runs/it'\\''s/clips/clip_03.mp4'\n"
        );
    }
}
