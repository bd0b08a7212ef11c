use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{
    io_error, MediaBackend, MediaError, MediaResult, VideoHandle, VideoPoll, VideoRef,
    VideoRequest,
};
use crate::config::MediaSection;
use crate::gemini::{
    GenerateContentRequest, GenerateContentResponse, GenerationConfig, Operation,
    PredictLongRunningRequest, SpeechConfig, API_KEY_HEADER,
};

pub struct GeminiMediaClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    image_model: String,
    tts_model: String,
    voice_name: String,
}

impl std::fmt::Debug for GeminiMediaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiMediaClient")
            .field("api_base", &self.api_base)
            .field("image_model", &self.image_model)
            .field("tts_model", &self.tts_model)
            .finish()
    }
}

impl GeminiMediaClient {
    pub fn new(config: &MediaSection, api_key: impl Into<String>) -> MediaResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            image_model: config.image_model.clone(),
            tts_model: config.tts_model.clone(),
            voice_name: config.voice_name.clone(),
        })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{model}:{method}", self.api_base)
    }

    async fn post_json<B, T>(&self, url: &str, body: &B) -> MediaResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> MediaResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn inline_bytes(
        &self,
        model: &str,
        request: GenerateContentRequest,
        what: &'static str,
    ) -> MediaResult<Vec<u8>> {
        let url = self.model_url(model, "generateContent");
        let response: GenerateContentResponse = self.post_json(&url, &request).await?;
        let inline = response
            .first_inline_data()
            .ok_or(MediaError::EmptyResponse(what))?;
        debug!(target: "media", model, mime = ?inline.mime_type, "inline payload received");
        Ok(STANDARD.decode(inline.data.as_bytes())?)
    }
}

#[async_trait]
impl MediaBackend for GeminiMediaClient {
    async fn generate_image(&self, prompt: &str) -> MediaResult<Vec<u8>> {
        let request =
            GenerateContentRequest::user_text(prompt).with_generation_config(GenerationConfig {
                response_modalities: vec!["IMAGE"],
                speech_config: None,
            });
        self.inline_bytes(&self.image_model, request, "image").await
    }

    async fn submit_video(&self, request: VideoRequest) -> MediaResult<VideoHandle> {
        let url = self.model_url(&request.model, "predictLongRunning");
        let body = PredictLongRunningRequest {
            instances: vec![json!({
                "prompt": request.prompt,
                "image": {
                    "bytesBase64Encoded": STANDARD.encode(&request.image),
                    "mimeType": request.image_mime_type,
                },
            })],
            parameters: json!({
                "aspectRatio": request.aspect_ratio,
                "durationSeconds": request.duration_seconds,
            }),
        };
        let operation: Operation = self.post_json(&url, &body).await?;
        Ok(VideoHandle(operation.name))
    }

    async fn poll_video(&self, handle: &VideoHandle) -> MediaResult<VideoPoll> {
        let url = format!("{}/{}", self.api_base, handle.0);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let operation: Operation = Self::decode(response).await?;
        if !operation.done {
            return Ok(VideoPoll::Pending);
        }
        if let Some(error) = operation.error {
            return Ok(VideoPoll::Failed(error.message));
        }
        Ok(match operation.video_uri() {
            Some(uri) => VideoPoll::Done(VideoRef(uri)),
            None => VideoPoll::Failed("operation finished without a video".into()),
        })
    }

    async fn download_video(&self, video: &VideoRef, dest: &Path) -> MediaResult<u64> {
        let response = self
            .client
            .get(&video.0)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(io_error(dest))?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(io_error(dest))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_error(dest))?;
        Ok(written)
    }

    async fn synthesize_speech(&self, text: &str) -> MediaResult<Vec<u8>> {
        let request =
            GenerateContentRequest::user_text(text).with_generation_config(GenerationConfig {
                response_modalities: vec!["AUDIO"],
                speech_config: Some(SpeechConfig::voice(self.voice_name.clone())),
            });
        self.inline_bytes(&self.tts_model, request, "audio").await
    }
}
