pub mod client;
pub mod clips;
pub mod frames;
pub mod narration;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use client::GeminiMediaClient;
pub use clips::{estimate_cost, ClipGenerator, CostModel, Quality};
pub use frames::KeyframeGenerator;
pub use narration::{pcm_duration_seconds, NarrationGenerator, SAMPLE_RATE};

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("media service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("media service response carried no {0}")]
    EmptyResponse(&'static str),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("generated image is not decodable: {0}")]
    Image(#[from] image::ImageError),
    #[error("wav encoding failed: {0}")]
    Wav(#[from] hound::Error),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("video generation failed: {0}")]
    VideoFailed(String),
    #[error("video generation still pending after {0:?}")]
    PollTimeout(Duration),
}

pub type MediaResult<T> = std::result::Result<T, MediaError>;

pub(crate) fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> MediaError {
    let path = path.to_path_buf();
    move |source| MediaError::Io { path, source }
}

/// Image-to-video job submitted to the generation service.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRequest {
    pub model: String,
    pub prompt: String,
    pub image: Vec<u8>,
    pub image_mime_type: String,
    pub aspect_ratio: String,
    pub duration_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoHandle(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoPoll {
    Pending,
    Done(VideoRef),
    Failed(String),
}

#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> MediaResult<Vec<u8>>;
    async fn submit_video(&self, request: VideoRequest) -> MediaResult<VideoHandle>;
    async fn poll_video(&self, handle: &VideoHandle) -> MediaResult<VideoPoll>;
    /// Downloads the finished video into `dest`, returning the bytes written.
    async fn download_video(&self, video: &VideoRef, dest: &Path) -> MediaResult<u64>;
    /// Returns raw 16-bit little-endian mono PCM at 24 kHz.
    async fn synthesize_speech(&self, text: &str) -> MediaResult<Vec<u8>>;
}
