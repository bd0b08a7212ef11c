pub mod compositor;
pub mod config;
pub mod error;
pub(crate) mod gemini;
pub mod llm;
pub mod media;
pub mod models;
pub mod pipeline;
pub mod run_dir;
pub mod trends;
pub mod uploader;
pub mod writer;

pub use compositor::{
    allocate_frames, build_render_spec, total_frames, CommandExecutor, Compositor,
    CompositorError, CompositorResult, FallbackConcatenator, RenderScene, RenderSpec,
    RendererSettings, SystemCommandExecutor,
};
pub use config::{
    load_or_default, load_shorts_config, CompositorSection, MediaSection, PathsSection,
    ShortsConfig, TextSection, TrendsSection, UploadSection, VideoSection, GEMINI_API_KEY_ENV,
};
pub use error::{ConfigError, Result};
pub use llm::{
    extract_json_block, parse_payload, GeminiTextClient, LlmError, LlmResult, TextGenerator,
    TextPayload, TextRequest, RAW_RESPONSE_KEY,
};
pub use media::{
    estimate_cost, ClipGenerator, CostModel, GeminiMediaClient, KeyframeGenerator, MediaBackend,
    MediaError, MediaResult, NarrationGenerator, Quality, VideoHandle, VideoPoll, VideoRef,
    VideoRequest,
};
pub use models::{
    Clip, Frame, Narration, NarrationAsset, Scene, Script, SeoPackage, TopicCandidate,
    TopicShortlist, TrendItem, TrendReport,
};
pub use pipeline::{
    AutoPrompter, PipelineDriver, PipelineError, PipelineOptions, PipelineOutcome,
    PipelineReport, PipelineResult, PipelineServices, Prompter, Stage, StdioPrompter,
    UploadStatus,
};
pub use run_dir::{slugify, RunDirectory};
pub use trends::{
    rank_topics, score_topic, HackerNewsSource, RedditSource, TrendCollector, TrendError,
    TrendResult, TrendSource,
};
pub use uploader::{
    AuthError, AuthPath, Authorizer, ChunkResponse, CredentialManager, HttpAuthorizer, Privacy,
    ResumableUploader, StoredCredential, TransportError, UploadError, UploadReceipt,
    UploadResult, UploadRetryPolicy, UploadSession, UploadTransport, VideoMetadata,
    YouTubeTransport,
};
pub use writer::{PromptKind, PromptLibrary, ScriptBrief, ScriptWriter, SeoPackager, TopicSelector};
