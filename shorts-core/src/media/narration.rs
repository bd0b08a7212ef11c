use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use super::{MediaBackend, MediaResult};
use crate::models::{NarrationAsset, Script};
use crate::run_dir::RunDirectory;

pub const SAMPLE_RATE: u32 = 24_000;
const BYTES_PER_SAMPLE: usize = 2;

/// Playback length of 16-bit mono PCM at 24 kHz.
pub fn pcm_duration_seconds(byte_len: usize) -> f64 {
    (byte_len / BYTES_PER_SAMPLE) as f64 / f64::from(SAMPLE_RATE)
}

pub fn write_wav(path: &Path, pcm: &[u8]) -> MediaResult<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in pcm.chunks_exact(BYTES_PER_SAMPLE) {
        writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?;
    }
    writer.finalize()?;
    Ok(())
}

pub struct NarrationGenerator {
    backend: Arc<dyn MediaBackend>,
}

impl NarrationGenerator {
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self { backend }
    }

    /// Synthesizes the script's narration into `narration.wav`. Any failure
    /// leaves the run without narration.
    pub async fn generate(&self, script: &Script, run: &RunDirectory) -> Option<NarrationAsset> {
        let text = script.narration.full_text();
        if text.is_empty() {
            warn!(target: "media", "narration text is empty, skipping speech synthesis");
            return None;
        }
        info!(target: "media", chars = text.chars().count(), "synthesizing narration");
        match self.synthesize(&text, run).await {
            Ok(asset) => {
                info!(
                    target: "media",
                    path = %asset.path.display(),
                    duration_seconds = asset.duration_seconds,
                    "narration saved"
                );
                Some(asset)
            }
            Err(err) => {
                error!(target: "media", error = %err, "narration failed");
                None
            }
        }
    }

    async fn synthesize(&self, text: &str, run: &RunDirectory) -> MediaResult<NarrationAsset> {
        let pcm = self.backend.synthesize_speech(text).await?;
        let path = run.narration_file();
        write_wav(&path, &pcm)?;
        Ok(NarrationAsset {
            path,
            duration_seconds: pcm_duration_seconds(pcm.len()),
        })
    }
}
