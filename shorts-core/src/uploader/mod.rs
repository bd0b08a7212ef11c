pub mod auth;
pub mod retry;
pub mod transport;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::ShortsConfig;
use crate::models::SeoPackage;
use crate::run_dir::{RunDirectory, FINAL_VIDEO_FILE};

pub use auth::{
    AuthError, AuthPath, Authorizer, ClientSecrets, CredentialManager, HttpAuthorizer,
    StoredCredential,
};
pub use retry::{RetryDecision, UploadRetryPolicy};
pub use transport::{ChunkResponse, TransportError, UploadSession, UploadTransport, YouTubeTransport};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("video file {0} does not exist")]
    MissingVideo(PathBuf),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("upload gave up after {retries} retries: {last_error}")]
    RetriesExhausted {
        retries: u32,
        last_error: TransportError,
    },
    #[error("upload rejected: {0}")]
    NonRetriable(TransportError),
}

pub type UploadResult<T> = std::result::Result<T, UploadError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> UploadError {
    let path = path.to_path_buf();
    move |source| UploadError::Io { path, source }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Public,
    Unlisted,
    #[default]
    Private,
}

impl Privacy {
    pub fn as_str(self) -> &'static str {
        match self {
            Privacy::Public => "public",
            Privacy::Unlisted => "unlisted",
            Privacy::Private => "private",
        }
    }
}

impl fmt::Display for Privacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Privacy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Privacy::Public),
            "unlisted" => Ok(Privacy::Unlisted),
            "private" => Ok(Privacy::Private),
            other => Err(format!("unknown privacy `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: Privacy,
}

impl VideoMetadata {
    pub fn new(title: impl Into<String>, privacy: Privacy) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            tags: Vec::new(),
            category_id: "28".into(),
            privacy,
        }
    }

    pub fn from_seo(seo: &SeoPackage, privacy: Privacy) -> Self {
        Self {
            title: seo.primary_title().to_string(),
            description: seo.description.clone(),
            tags: seo.tags.clone(),
            ..Self::new(String::new(), privacy)
        }
    }

    /// Metadata for a finished run directory: `seo.json` when present,
    /// otherwise the directory name as title.
    pub fn from_run_dir(dir: &Path, privacy: Privacy) -> UploadResult<Self> {
        let run = RunDirectory::open(dir);
        let seo_path = run.seo_file();
        if seo_path.exists() {
            let seo: SeoPackage = run.read_json(&seo_path).map_err(io_error(&seo_path))?;
            return Ok(Self::from_seo(&seo, privacy));
        }
        warn!(target: "uploader", dir = %dir.display(), "no seo metadata, using directory name as title");
        let title = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| crate::models::DEFAULT_UPLOAD_TITLE.to_string());
        Ok(Self::new(title, privacy))
    }

    /// Video resource body for the insert call.
    pub fn to_resource(&self) -> Value {
        json!({
            "snippet": {
                "title": self.title,
                "description": self.description,
                "tags": self.tags,
                "categoryId": self.category_id,
            },
            "status": {
                "privacyStatus": self.privacy.as_str(),
                "selfDeclaredMadeForKids": false,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadState {
    Unauthenticated,
    Authenticated(AuthPath),
    Uploading { committed: u64, total: u64 },
    Succeeded { video_id: String },
    Failed { reason: String },
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadState::Unauthenticated => f.write_str("unauthenticated"),
            UploadState::Authenticated(path) => write!(f, "authenticated ({path:?})"),
            UploadState::Uploading { committed, total } => {
                write!(f, "uploading {committed}/{total}")
            }
            UploadState::Succeeded { video_id } => write!(f, "succeeded ({video_id})"),
            UploadState::Failed { reason } => write!(f, "failed ({reason})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub video_id: String,
    pub url: String,
    pub retries: u32,
}

impl UploadReceipt {
    fn new(video_id: String, retries: u32) -> Self {
        Self {
            url: format!("https://youtu.be/{video_id}"),
            video_id,
            retries,
        }
    }
}

pub fn progress(committed: u64, total: u64) -> f64 {
    if total == 0 {
        1.0
    } else {
        (committed as f64 / total as f64).clamp(0.0, 1.0)
    }
}

struct StateLog {
    state: UploadState,
}

impl StateLog {
    fn new() -> Self {
        Self {
            state: UploadState::Unauthenticated,
        }
    }

    fn advance(&mut self, next: UploadState) {
        match &next {
            UploadState::Uploading { committed, total } => {
                info!(
                    target: "uploader",
                    percent = (progress(*committed, *total) * 100.0) as u32,
                    "upload progress"
                );
            }
            UploadState::Failed { reason } => {
                error!(target: "uploader", from = %self.state, reason = %reason, "upload failed");
            }
            other => info!(target: "uploader", from = %self.state, to = %other, "upload state changed"),
        }
        self.state = next;
    }
}

/// Chunked resumable upload with bounded exponential backoff.
pub struct ResumableUploader {
    transport: Arc<dyn UploadTransport>,
    credentials: CredentialManager,
    policy: UploadRetryPolicy,
    chunk_size: usize,
    category_id: String,
}

impl ResumableUploader {
    pub fn new(
        transport: Arc<dyn UploadTransport>,
        credentials: CredentialManager,
        policy: UploadRetryPolicy,
        chunk_size: usize,
    ) -> Self {
        Self {
            transport,
            credentials,
            policy,
            chunk_size: chunk_size.max(1),
            category_id: "28".into(),
        }
    }

    pub fn from_config(
        config: &ShortsConfig,
        transport: Arc<dyn UploadTransport>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        let credentials = CredentialManager::new(
            authorizer,
            config.client_secret_file(),
            config.token_file(),
            config.upload.scopes.clone(),
        );
        Self::new(
            transport,
            credentials,
            UploadRetryPolicy::from_config(&config.upload),
            config.upload.chunk_size_bytes,
        )
        .with_category(config.upload.category_id.clone())
    }

    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = category_id.into();
        self
    }

    /// Uploads `final_shorts.mp4` from a run directory. Returns `Ok(None)`
    /// without authenticating when the video is missing.
    pub async fn upload_from_dir(&self, dir: &Path, privacy: Privacy) -> UploadResult<Option<UploadReceipt>> {
        let video = dir.join(FINAL_VIDEO_FILE);
        if !video.exists() {
            error!(target: "uploader", path = %video.display(), "video file missing, nothing to upload");
            return Ok(None);
        }
        let metadata = VideoMetadata::from_run_dir(dir, privacy)?;
        self.upload(&video, &metadata).await.map(Some)
    }

    pub async fn upload(&self, video: &Path, metadata: &VideoMetadata) -> UploadResult<UploadReceipt> {
        if !video.exists() {
            return Err(UploadError::MissingVideo(video.to_path_buf()));
        }
        let mut metadata = metadata.clone();
        metadata.category_id = self.category_id.clone();

        let mut state = StateLog::new();
        let (credential, path) = match self.credentials.authenticate().await {
            Ok(result) => result,
            Err(err) => {
                state.advance(UploadState::Failed {
                    reason: err.to_string(),
                });
                return Err(err.into());
            }
        };
        state.advance(UploadState::Authenticated(path));
        info!(
            target: "uploader",
            title = %metadata.title,
            privacy = %metadata.privacy,
            "starting upload"
        );

        match self.send(video, &metadata, &credential.token, &mut state).await {
            Ok(receipt) => {
                state.advance(UploadState::Succeeded {
                    video_id: receipt.video_id.clone(),
                });
                info!(target: "uploader", url = %receipt.url, retries = receipt.retries, "upload complete");
                Ok(receipt)
            }
            Err(err) => {
                state.advance(UploadState::Failed {
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn send(
        &self,
        video: &Path,
        metadata: &VideoMetadata,
        token: &str,
        state: &mut StateLog,
    ) -> UploadResult<UploadReceipt> {
        let mut file = tokio::fs::File::open(video).await.map_err(io_error(video))?;
        let total = file.metadata().await.map_err(io_error(video))?.len();
        let mut retries = 0u32;

        let session = loop {
            match self.transport.start_session(token, metadata, total).await {
                Ok(session) => break session,
                Err(err) => self.backoff(&mut retries, err).await?,
            }
        };
        state.advance(UploadState::Uploading { committed: 0, total });

        let mut offset = 0u64;
        loop {
            let chunk = read_chunk(&mut file, video, offset, self.chunk_size, total).await?;
            let response = loop {
                match self
                    .transport
                    .send_chunk(token, &session, &chunk, offset, total)
                    .await
                {
                    Ok(response) => break response,
                    Err(err) => self.backoff(&mut retries, err).await?,
                }
            };
            match response {
                ChunkResponse::Complete { video_id } => {
                    return Ok(UploadReceipt::new(video_id, retries));
                }
                ChunkResponse::Incomplete { committed } => {
                    let committed = committed.unwrap_or(0).min(total);
                    if committed <= offset {
                        // A 308 that stored nothing new costs a retry.
                        self.backoff(&mut retries, TransportError::NoProgress { committed, total })
                            .await?;
                    }
                    offset = committed;
                    state.advance(UploadState::Uploading {
                        committed: offset,
                        total,
                    });
                }
            }
        }
    }

    async fn backoff(&self, retries: &mut u32, err: TransportError) -> UploadResult<()> {
        match self.policy.decide(retries, &err) {
            RetryDecision::Retry { retry, wait } => {
                warn!(
                    target: "uploader",
                    error = %err,
                    retry,
                    max_retries = self.policy.max_retries(),
                    wait_secs = wait.as_secs_f64(),
                    "transient upload failure, retrying"
                );
                sleep(wait).await;
                Ok(())
            }
            RetryDecision::Exhausted => Err(UploadError::RetriesExhausted {
                retries: self.policy.max_retries(),
                last_error: err,
            }),
            RetryDecision::NotRetriable => Err(UploadError::NonRetriable(err)),
        }
    }
}

async fn read_chunk(
    file: &mut tokio::fs::File,
    path: &Path,
    offset: u64,
    chunk_size: usize,
    total: u64,
) -> UploadResult<Vec<u8>> {
    let remaining = total.saturating_sub(offset);
    let len = remaining.min(chunk_size as u64) as usize;
    let mut buffer = vec![0u8; len];
    file.seek(std::io::SeekFrom::Start(offset))
        .await
        .map_err(io_error(path))?;
    file.read_exact(&mut buffer).await.map_err(io_error(path))?;
    Ok(buffer)
}
