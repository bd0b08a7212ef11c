use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use shorts_core::uploader::auth::{AuthResult, ClientSecrets};
use shorts_core::{
    AuthError, AuthPath, Authorizer, ChunkResponse, CredentialManager, Privacy,
    ResumableUploader, StoredCredential, TransportError, UploadError, UploadRetryPolicy,
    UploadSession, UploadTransport, VideoMetadata,
};
use tempfile::{tempdir, TempDir};

#[derive(Default)]
struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<ChunkResponse, TransportError>>>,
    chunks: Mutex<Vec<(u64, usize)>>,
    sessions: AtomicUsize,
}

impl ScriptedTransport {
    fn with(responses: Vec<Result<ChunkResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        })
    }

    fn chunks(&self) -> Vec<(u64, usize)> {
        self.chunks.lock().unwrap().clone()
    }
}

#[async_trait]
impl UploadTransport for ScriptedTransport {
    async fn start_session(
        &self,
        access_token: &str,
        _metadata: &VideoMetadata,
        _total_bytes: u64,
    ) -> Result<UploadSession, TransportError> {
        assert_eq!(access_token, "ya29.stored");
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(UploadSession {
            url: "https://upload.example/session/1".into(),
        })
    }

    async fn send_chunk(
        &self,
        _access_token: &str,
        _session: &UploadSession,
        chunk: &[u8],
        offset: u64,
        _total_bytes: u64,
    ) -> Result<ChunkResponse, TransportError> {
        self.chunks.lock().unwrap().push((offset, chunk.len()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(ChunkResponse::Complete {
                    video_id: "vid-default".into(),
                })
            })
    }
}

#[derive(Default)]
struct CountingAuthorizer {
    refreshes: AtomicUsize,
    interactive: AtomicUsize,
    fail_refresh: bool,
}

fn credential(token: &str, expiry: chrono::DateTime<Utc>) -> StoredCredential {
    StoredCredential {
        token: token.into(),
        refresh_token: Some("1//refresh".into()),
        token_uri: "https://oauth2.example/token".into(),
        client_id: "client".into(),
        client_secret: "secret".into(),
        scopes: vec!["https://www.googleapis.com/auth/youtube.upload".into()],
        expiry: Some(expiry),
    }
}

#[async_trait]
impl Authorizer for CountingAuthorizer {
    async fn refresh(&self, _credential: &StoredCredential) -> AuthResult<StoredCredential> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.fail_refresh {
            return Err(AuthError::Denied("invalid_grant".into()));
        }
        Ok(credential("ya29.refreshed", Utc::now() + Duration::hours(1)))
    }

    async fn authorize_interactive(
        &self,
        secrets: &ClientSecrets,
        _scopes: &[String],
    ) -> AuthResult<StoredCredential> {
        assert_eq!(secrets.client_id, "client");
        self.interactive.fetch_add(1, Ordering::SeqCst);
        Ok(credential("ya29.interactive", Utc::now() + Duration::hours(1)))
    }
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("client_secret.json"),
            r#"{"installed":{"client_id":"client","client_secret":"secret"}}"#,
        )
        .unwrap();
        Self { dir }
    }

    fn with_token(self, credential: &StoredCredential) -> Self {
        credential.save(&self.token_file()).unwrap();
        self
    }

    fn token_file(&self) -> PathBuf {
        self.dir.path().join("token.json")
    }

    fn credentials(&self, authorizer: Arc<CountingAuthorizer>) -> CredentialManager {
        CredentialManager::new(
            authorizer,
            self.dir.path().join("client_secret.json"),
            self.token_file(),
            vec!["https://www.googleapis.com/auth/youtube.upload".into()],
        )
    }

    fn video(&self, len: usize) -> PathBuf {
        let path = self.dir.path().join("final_shorts.mp4");
        std::fs::write(&path, vec![7u8; len]).unwrap();
        path
    }

    fn uploader(&self, transport: Arc<ScriptedTransport>, chunk_size: usize) -> ResumableUploader {
        ResumableUploader::new(
            transport,
            self.credentials(Arc::new(CountingAuthorizer::default())),
            UploadRetryPolicy::default(),
            chunk_size,
        )
    }
}

fn valid_fixture() -> Fixture {
    Fixture::new().with_token(&credential("ya29.stored", Utc::now() + Duration::hours(1)))
}

fn http(status: u16) -> Result<ChunkResponse, TransportError> {
    Err(TransportError::Http {
        status,
        body: "backend error".into(),
    })
}

fn metadata() -> VideoMetadata {
    VideoMetadata::new("A title", Privacy::Private)
}

#[tokio::test(start_paused = true)]
async fn transient_failures_exhaust_after_five_retries() {
    let fixture = valid_fixture();
    let transport = ScriptedTransport::with((0..10).map(|_| http(503)).collect());
    let uploader = fixture.uploader(transport.clone(), 1024);

    let err = uploader
        .upload(&fixture.video(100), &metadata())
        .await
        .unwrap_err();
    match err {
        UploadError::RetriesExhausted { retries, last_error } => {
            assert_eq!(retries, 5);
            assert!(matches!(last_error, TransportError::Http { status: 503, .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(transport.chunks().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn success_on_third_attempt_returns_that_id() {
    let fixture = valid_fixture();
    let transport = ScriptedTransport::with(vec![
        http(500),
        Err(TransportError::Transport("connection reset".into())),
        Ok(ChunkResponse::Complete {
            video_id: "abc123".into(),
        }),
    ]);
    let uploader = fixture.uploader(transport.clone(), 1024);

    let receipt = uploader.upload(&fixture.video(100), &metadata()).await.unwrap();
    assert_eq!(receipt.video_id, "abc123");
    assert_eq!(receipt.url, "https://youtu.be/abc123");
    assert_eq!(receipt.retries, 2);
    assert_eq!(transport.chunks(), vec![(0, 100); 3]);
}

#[tokio::test(start_paused = true)]
async fn sixth_attempt_still_counts() {
    let fixture = valid_fixture();
    let mut responses: Vec<_> = (0..5).map(|_| http(502)).collect();
    responses.push(Ok(ChunkResponse::Complete {
        video_id: "last-chance".into(),
    }));
    let transport = ScriptedTransport::with(responses);
    let uploader = fixture.uploader(transport.clone(), 1024);

    let receipt = uploader.upload(&fixture.video(10), &metadata()).await.unwrap();
    assert_eq!(receipt.video_id, "last-chance");
    assert_eq!(receipt.retries, 5);
}

#[tokio::test]
async fn client_errors_fail_without_retry() {
    let fixture = valid_fixture();
    let transport = ScriptedTransport::with(vec![http(403)]);
    let uploader = fixture.uploader(transport.clone(), 1024);

    let err = uploader
        .upload(&fixture.video(100), &metadata())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        UploadError::NonRetriable(TransportError::Http { status: 403, .. })
    ));
    assert_eq!(transport.chunks().len(), 1);
}

#[tokio::test]
async fn chunks_follow_server_committed_offset() {
    let fixture = valid_fixture();
    let transport = ScriptedTransport::with(vec![
        Ok(ChunkResponse::Incomplete {
            committed: Some(262_144),
        }),
        // Server only kept part of the second chunk.
        Ok(ChunkResponse::Incomplete {
            committed: Some(400_000),
        }),
        Ok(ChunkResponse::Complete {
            video_id: "chunked".into(),
        }),
    ]);
    let uploader = fixture.uploader(transport.clone(), 262_144);

    let receipt = uploader
        .upload(&fixture.video(600_000), &metadata())
        .await
        .unwrap();
    assert_eq!(receipt.video_id, "chunked");
    assert_eq!(receipt.retries, 0);
    assert_eq!(
        transport.chunks(),
        vec![(0, 262_144), (262_144, 262_144), (400_000, 200_000)]
    );
}

#[tokio::test(start_paused = true)]
async fn missing_range_header_resends_from_start() {
    let fixture = valid_fixture();
    let transport = ScriptedTransport::with(vec![
        Ok(ChunkResponse::Incomplete { committed: None }),
        Ok(ChunkResponse::Incomplete {
            committed: Some(262_144),
        }),
        Ok(ChunkResponse::Complete {
            video_id: "resent".into(),
        }),
    ]);
    let uploader = fixture.uploader(transport.clone(), 262_144);

    let receipt = uploader
        .upload(&fixture.video(600_000), &metadata())
        .await
        .unwrap();
    assert_eq!(receipt.video_id, "resent");
    assert_eq!(receipt.retries, 1);
    assert_eq!(
        transport.chunks(),
        vec![(0, 262_144), (0, 262_144), (262_144, 262_144)]
    );
}

#[tokio::test(start_paused = true)]
async fn stalled_server_exhausts_retry_budget() {
    let fixture = valid_fixture();
    let transport = ScriptedTransport::with(
        (0..50)
            .map(|_| Ok(ChunkResponse::Incomplete { committed: Some(100) }))
            .collect(),
    );
    let uploader = fixture.uploader(transport.clone(), 1024);

    let err = uploader
        .upload(&fixture.video(100), &metadata())
        .await
        .unwrap_err();
    match err {
        UploadError::RetriesExhausted { retries, last_error } => {
            assert_eq!(retries, 5);
            assert_eq!(
                last_error,
                TransportError::NoProgress {
                    committed: 100,
                    total: 100
                }
            );
        }
        other => panic!("unexpected error {other:?}"),
    }
    let chunks = transport.chunks();
    assert_eq!(chunks.len(), 7);
    assert_eq!(chunks[0], (0, 100));
    assert!(chunks[1..].iter().all(|chunk| *chunk == (100, 0)));
}

#[tokio::test]
async fn missing_video_skips_authentication() {
    let fixture = valid_fixture();
    let authorizer = Arc::new(CountingAuthorizer::default());
    let transport = ScriptedTransport::with(Vec::new());
    let uploader = ResumableUploader::new(
        transport.clone(),
        fixture.credentials(authorizer.clone()),
        UploadRetryPolicy::default(),
        1024,
    );

    let run = fixture.dir.path().join("2026-01-01-empty");
    std::fs::create_dir_all(&run).unwrap();
    let result = uploader.upload_from_dir(&run, Privacy::Public).await.unwrap();
    assert!(result.is_none());
    assert_eq!(transport.sessions.load(Ordering::SeqCst), 0);
    assert_eq!(authorizer.interactive.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn upload_from_dir_uses_seo_title() {
    let fixture = valid_fixture();
    let run = fixture.dir.path().join("2026-01-01-seo");
    std::fs::create_dir_all(&run).unwrap();
    std::fs::write(run.join("final_shorts.mp4"), b"mp4").unwrap();
    std::fs::write(
        run.join("seo.json"),
        r#"{"titles":{"A":"Primary"},"description":"d","tags":["t"]}"#,
    )
    .unwrap();
    let transport = ScriptedTransport::with(Vec::new());
    let uploader = fixture.uploader(transport, 1024);

    let receipt = uploader
        .upload_from_dir(&run, Privacy::Public)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(receipt.video_id, "vid-default");
}

async fn authenticate(fixture: &Fixture, authorizer: Arc<CountingAuthorizer>) -> (StoredCredential, AuthPath) {
    fixture.credentials(authorizer).authenticate().await.unwrap()
}

#[tokio::test]
async fn valid_stored_credential_is_used_as_is() {
    let fixture = valid_fixture();
    let authorizer = Arc::new(CountingAuthorizer::default());
    let (credential, path) = authenticate(&fixture, authorizer.clone()).await;
    assert_eq!(path, AuthPath::Stored);
    assert_eq!(credential.token, "ya29.stored");
    assert_eq!(authorizer.refreshes.load(Ordering::SeqCst), 0);
    assert_eq!(authorizer.interactive.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn expired_credential_is_refreshed_and_saved() {
    let fixture =
        Fixture::new().with_token(&credential("ya29.old", Utc::now() - Duration::minutes(5)));
    let authorizer = Arc::new(CountingAuthorizer::default());
    let (credential, path) = authenticate(&fixture, authorizer.clone()).await;
    assert_eq!(path, AuthPath::Refreshed);
    assert_eq!(credential.token, "ya29.refreshed");
    let saved = StoredCredential::load(&fixture.token_file()).unwrap();
    assert_eq!(saved.token, "ya29.refreshed");
}

#[tokio::test]
async fn failed_refresh_falls_back_to_consent() {
    let fixture =
        Fixture::new().with_token(&credential("ya29.old", Utc::now() - Duration::minutes(5)));
    let authorizer = Arc::new(CountingAuthorizer {
        fail_refresh: true,
        ..CountingAuthorizer::default()
    });
    let (credential, path) = authenticate(&fixture, authorizer.clone()).await;
    assert_eq!(path, AuthPath::Interactive);
    assert_eq!(credential.token, "ya29.interactive");
    assert_eq!(authorizer.refreshes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_token_file_runs_consent_flow() {
    let fixture = Fixture::new();
    let authorizer = Arc::new(CountingAuthorizer::default());
    let (credential, path) = authenticate(&fixture, authorizer.clone()).await;
    assert_eq!(path, AuthPath::Interactive);
    assert_eq!(credential.token, "ya29.interactive");
    assert!(fixture.token_file().exists());
}

#[tokio::test]
async fn missing_client_secret_is_reported() {
    let dir = tempdir().unwrap();
    let manager = CredentialManager::new(
        Arc::new(CountingAuthorizer::default()),
        dir.path().join("client_secret.json"),
        dir.path().join("token.json"),
        Vec::new(),
    );
    let err = manager.authenticate().await.unwrap_err();
    assert!(matches!(err, AuthError::MissingClientSecret { path } if path.ends_with("client_secret.json")));
}
