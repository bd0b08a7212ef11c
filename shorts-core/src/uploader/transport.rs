use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{redirect, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::VideoMetadata;
use crate::config::UploadSection;

const RESUME_INCOMPLETE: u16 = 308;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("server still holds {committed} of {total} bytes")]
    NoProgress { committed: u64, total: u64 },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Transport(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkResponse {
    /// Server holds bytes `[0, committed)`; `None` when the 308 carried no
    /// `Range` header, meaning nothing has been stored yet.
    Incomplete { committed: Option<u64> },
    Complete { video_id: String },
}

#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn start_session(
        &self,
        access_token: &str,
        metadata: &VideoMetadata,
        total_bytes: u64,
    ) -> Result<UploadSession, TransportError>;

    async fn send_chunk(
        &self,
        access_token: &str,
        session: &UploadSession,
        chunk: &[u8],
        offset: u64,
        total_bytes: u64,
    ) -> Result<ChunkResponse, TransportError>;
}

/// Parses the `Range: bytes=0-N` header of a 308 response into the number of
/// bytes the server has committed.
pub fn committed_from_range(range: Option<&str>) -> Option<u64> {
    range
        .and_then(|value| value.trim().strip_prefix("bytes="))
        .and_then(|value| value.split('-').nth(1))
        .and_then(|end| end.trim().parse::<u64>().ok())
        .map(|end| end + 1)
}

pub fn content_range(offset: u64, len: usize, total: u64) -> String {
    if len == 0 {
        format!("bytes */{total}")
    } else {
        format!("bytes {offset}-{}/{total}", offset + len as u64 - 1)
    }
}

#[derive(Debug, Deserialize)]
struct InsertedVideo {
    id: String,
}

pub struct YouTubeTransport {
    client: reqwest::Client,
    upload_url: String,
}

impl YouTubeTransport {
    pub fn new(config: &UploadSection) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(15))
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            upload_url: config.upload_url.clone(),
        })
    }

    async fn http_error(response: reqwest::Response) -> TransportError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        TransportError::Http { status, body }
    }
}

#[async_trait]
impl UploadTransport for YouTubeTransport {
    async fn start_session(
        &self,
        access_token: &str,
        metadata: &VideoMetadata,
        total_bytes: u64,
    ) -> Result<UploadSession, TransportError> {
        let response = self
            .client
            .post(&self.upload_url)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(access_token)
            .header("X-Upload-Content-Type", "video/mp4")
            .header("X-Upload-Content-Length", total_bytes)
            .json(&metadata.to_resource())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::http_error(response).await);
        }
        let url = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| TransportError::Transport("session response had no Location header".into()))?;
        debug!(target: "uploader", "resumable session opened");
        Ok(UploadSession { url })
    }

    async fn send_chunk(
        &self,
        access_token: &str,
        session: &UploadSession,
        chunk: &[u8],
        offset: u64,
        total_bytes: u64,
    ) -> Result<ChunkResponse, TransportError> {
        let response = self
            .client
            .put(&session.url)
            .bearer_auth(access_token)
            .header(CONTENT_TYPE, "video/mp4")
            .header(CONTENT_RANGE, content_range(offset, chunk.len(), total_bytes))
            .body(chunk.to_vec())
            .send()
            .await?;
        let status = response.status();
        if status.as_u16() == RESUME_INCOMPLETE {
            let range = response
                .headers()
                .get(RANGE)
                .and_then(|value| value.to_str().ok());
            return Ok(ChunkResponse::Incomplete {
                committed: committed_from_range(range),
            });
        }
        if status == StatusCode::OK || status == StatusCode::CREATED {
            let bytes = response.bytes().await?;
            let video: InsertedVideo = serde_json::from_slice(&bytes)
                .map_err(|err| TransportError::Transport(format!("malformed upload response: {err}")))?;
            return Ok(ChunkResponse::Complete { video_id: video.id });
        }
        Err(Self::http_error(response).await)
    }
}
