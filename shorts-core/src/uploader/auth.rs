use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

const EXPIRY_MARGIN_SECS: i64 = 60;
const CONSENT_TIMEOUT: Duration = Duration::from_secs(600);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("client secret {path} is missing")]
    MissingClientSecret { path: PathBuf },
    #[error("client secret {path} has no installed or web section")]
    InvalidClientSecret { path: PathBuf },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint returned {status}: {body}")]
    TokenEndpoint { status: u16, body: String },
    #[error("authorization was denied: {0}")]
    Denied(String),
    #[error("authorization callback was invalid: {0}")]
    InvalidCallback(String),
    #[error("timed out waiting for the browser consent")]
    ConsentTimeout,
    #[error("invalid authorization url: {0}")]
    Url(#[from] url::ParseError),
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> AuthError {
    let path = path.to_path_buf();
    move |source| AuthError::Io { path, source }
}

/// OAuth user credential as persisted in the token file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl StoredCredential {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry - chrono::Duration::seconds(EXPIRY_MARGIN_SECS) <= now,
            None => false,
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && !self.is_expired(now)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .map(|token| !token.is_empty())
            .unwrap_or(false)
    }

    pub fn load(path: &Path) -> AuthResult<Self> {
        let body = std::fs::read(path).map_err(io_error(path))?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub fn save(&self, path: &Path) -> AuthResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let body = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, body).map_err(io_error(path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".into()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".into()
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    #[serde(default)]
    installed: Option<ClientSecrets>,
    #[serde(default)]
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn load(path: &Path) -> AuthResult<Self> {
        if !path.exists() {
            return Err(AuthError::MissingClientSecret {
                path: path.to_path_buf(),
            });
        }
        let body = std::fs::read(path).map_err(io_error(path))?;
        let file: ClientSecretsFile = serde_json::from_slice(&body)?;
        file.installed
            .or(file.web)
            .ok_or_else(|| AuthError::InvalidClientSecret {
                path: path.to_path_buf(),
            })
    }
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn refresh(&self, credential: &StoredCredential) -> AuthResult<StoredCredential>;
    async fn authorize_interactive(
        &self,
        secrets: &ClientSecrets,
        scopes: &[String],
    ) -> AuthResult<StoredCredential>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expires_in
            .map(|seconds| Utc::now() + chrono::Duration::seconds(seconds))
    }

    fn scopes_or(&self, fallback: &[String]) -> Vec<String> {
        match &self.scope {
            Some(scope) => scope.split_whitespace().map(str::to_owned).collect(),
            None => fallback.to_vec(),
        }
    }
}

/// PKCE verifier and its S256 challenge.
pub fn pkce_pair() -> (String, String) {
    let verifier: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    (verifier, challenge)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Callback {
    Code(String),
    Error(String),
    Ignored,
}

fn parse_callback(params: &HashMap<String, String>, expected_state: &str) -> AuthResult<Callback> {
    if let Some(error) = params.get("error") {
        return Ok(Callback::Error(error.clone()));
    }
    let Some(code) = params.get("code") else {
        return Ok(Callback::Ignored);
    };
    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Err(AuthError::InvalidCallback("state mismatch".into()));
    }
    Ok(Callback::Code(code.clone()))
}

#[derive(Clone)]
struct ConsentCallback {
    expected_state: Arc<String>,
    sender: Arc<Mutex<Option<oneshot::Sender<AuthResult<String>>>>>,
}

async fn consent_callback(
    State(callback): State<ConsentCallback>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, &'static str) {
    let (outcome, reply) = match parse_callback(&params, &callback.expected_state) {
        Ok(Callback::Ignored) => return (StatusCode::NOT_FOUND, ""),
        Ok(Callback::Code(code)) => (Ok(code), (StatusCode::OK, "Authorization complete. You can close this window.")),
        Ok(Callback::Error(error)) => (Err(AuthError::Denied(error)), (StatusCode::OK, "Authorization was denied.")),
        Err(err) => (Err(err), (StatusCode::BAD_REQUEST, "Authorization callback was invalid.")),
    };
    match callback.sender.lock().await.take() {
        Some(sender) => {
            let _ = sender.send(outcome);
        }
        None => warn!(target: "uploader", "ignoring repeated browser callback"),
    }
    reply
}

/// Serves the loopback redirect until the first callback carrying a code or
/// an error arrives, then shuts the listener down.
async fn serve_consent_callback(listener: TcpListener, expected_state: &str) -> AuthResult<String> {
    let (sender, receiver) = oneshot::channel();
    let app = Router::new()
        .route("/", get(consent_callback))
        .with_state(ConsentCallback {
            expected_state: Arc::new(expected_state.to_string()),
            sender: Arc::new(Mutex::new(Some(sender))),
        });
    let (shutdown, stopped) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stopped.await;
            })
            .await
    });

    let outcome = tokio::time::timeout(CONSENT_TIMEOUT, receiver).await;
    let _ = shutdown.send(());
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
        Ok(Ok(Err(err))) => warn!(target: "uploader", error = %err, "callback server failed"),
        Ok(_) => {}
        Err(_) => server.abort(),
    }

    match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(AuthError::InvalidCallback("callback server stopped".into())),
        Err(_) => Err(AuthError::ConsentTimeout),
    }
}

/// Installed-app OAuth flow against Google's endpoints.
pub struct HttpAuthorizer {
    client: reqwest::Client,
}

impl HttpAuthorizer {
    pub fn new() -> AuthResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    async fn token_request(&self, token_uri: &str, form: &[(&str, &str)]) -> AuthResult<TokenResponse> {
        let response = self.client.post(token_uri).form(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl Authorizer for HttpAuthorizer {
    async fn refresh(&self, credential: &StoredCredential) -> AuthResult<StoredCredential> {
        let refresh_token = credential.refresh_token.clone().unwrap_or_default();
        let response = self
            .token_request(
                &credential.token_uri,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token.as_str()),
                    ("client_id", credential.client_id.as_str()),
                    ("client_secret", credential.client_secret.as_str()),
                ],
            )
            .await?;
        Ok(StoredCredential {
            expiry: response.expiry(),
            scopes: response.scopes_or(&credential.scopes),
            token: response.access_token,
            refresh_token: response.refresh_token.or(Some(refresh_token)),
            ..credential.clone()
        })
    }

    async fn authorize_interactive(
        &self,
        secrets: &ClientSecrets,
        scopes: &[String],
    ) -> AuthResult<StoredCredential> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|source| AuthError::Io {
                path: PathBuf::from("127.0.0.1:0"),
                source,
            })?;
        let port = listener
            .local_addr()
            .map_err(|source| AuthError::Io {
                path: PathBuf::from("127.0.0.1:0"),
                source,
            })?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{port}/");
        let (verifier, challenge) = pkce_pair();
        let state = Uuid::new_v4().to_string();
        let scope = scopes.join(" ");
        let consent_url = Url::parse_with_params(
            &secrets.auth_uri,
            &[
                ("client_id", secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", state.as_str()),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )?;
        println!("Open this URL in your browser to authorize uploads:\n\n  {consent_url}\n");
        info!(target: "uploader", port, "waiting for browser consent");

        let code = serve_consent_callback(listener, &state).await?;

        let response = self
            .token_request(
                &secrets.token_uri,
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code.as_str()),
                    ("redirect_uri", redirect_uri.as_str()),
                    ("client_id", secrets.client_id.as_str()),
                    ("client_secret", secrets.client_secret.as_str()),
                    ("code_verifier", verifier.as_str()),
                ],
            )
            .await?;
        Ok(StoredCredential {
            expiry: response.expiry(),
            scopes: response.scopes_or(scopes),
            token: response.access_token,
            refresh_token: response.refresh_token,
            token_uri: secrets.token_uri.clone(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPath {
    Stored,
    Refreshed,
    Interactive,
}

pub struct CredentialManager {
    authorizer: Arc<dyn Authorizer>,
    client_secret_file: PathBuf,
    token_file: PathBuf,
    scopes: Vec<String>,
}

impl CredentialManager {
    pub fn new(
        authorizer: Arc<dyn Authorizer>,
        client_secret_file: impl Into<PathBuf>,
        token_file: impl Into<PathBuf>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            authorizer,
            client_secret_file: client_secret_file.into(),
            token_file: token_file.into(),
            scopes,
        }
    }

    fn load_stored(&self) -> Option<StoredCredential> {
        if !self.token_file.exists() {
            return None;
        }
        match StoredCredential::load(&self.token_file) {
            Ok(credential) => Some(credential),
            Err(err) => {
                warn!(target: "uploader", path = %self.token_file.display(), error = %err, "ignoring unreadable token file");
                None
            }
        }
    }

    /// Returns a usable credential: the stored one when valid, a refreshed
    /// one when it has expired, otherwise a freshly authorized one. New or
    /// refreshed credentials are written back to the token file.
    pub async fn authenticate(&self) -> AuthResult<(StoredCredential, AuthPath)> {
        if !self.client_secret_file.exists() {
            return Err(AuthError::MissingClientSecret {
                path: self.client_secret_file.clone(),
            });
        }
        let now = Utc::now();
        let stored = self.load_stored();

        if let Some(credential) = &stored {
            if credential.is_valid(now) {
                info!(target: "uploader", "using stored credential");
                return Ok((credential.clone(), AuthPath::Stored));
            }
            if credential.is_expired(now) && credential.can_refresh() {
                info!(target: "uploader", "refreshing expired credential");
                match self.authorizer.refresh(credential).await {
                    Ok(refreshed) => {
                        refreshed.save(&self.token_file)?;
                        info!(target: "uploader", path = %self.token_file.display(), "credential saved");
                        return Ok((refreshed, AuthPath::Refreshed));
                    }
                    Err(err) => {
                        warn!(target: "uploader", error = %err, "refresh failed, falling back to browser consent");
                    }
                }
            }
        }

        let secrets = ClientSecrets::load(&self.client_secret_file)?;
        info!(target: "uploader", "starting browser authorization");
        let credential = self
            .authorizer
            .authorize_interactive(&secrets, &self.scopes)
            .await?;
        credential.save(&self.token_file)?;
        info!(target: "uploader", path = %self.token_file.display(), "credential saved");
        Ok((credential, AuthPath::Interactive))
    }
}
