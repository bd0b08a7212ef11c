pub mod prompt;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::compositor::{
    Compositor, CompositorError, CommandExecutor, FallbackConcatenator, RendererSettings,
    SystemCommandExecutor,
};
use crate::config::ShortsConfig;
use crate::error::ConfigError;
use crate::llm::{GeminiTextClient, LlmError, TextGenerator, TextPayload};
use crate::media::{
    ClipGenerator, CostModel, GeminiMediaClient, KeyframeGenerator, MediaBackend, MediaError,
    NarrationGenerator, Quality,
};
use crate::models::{Script, TopicCandidate};
use crate::run_dir::{sanitize_slug, slugify, RunDirectory};
use crate::trends::{HackerNewsSource, RedditSource, TrendCollector, TrendError, TrendSource};
use crate::uploader::{
    AuthError, Authorizer, HttpAuthorizer, Privacy, ResumableUploader, TransportError,
    UploadError, UploadReceipt, UploadTransport, YouTubeTransport,
};
use crate::writer::{PromptLibrary, ScriptBrief, ScriptWriter, SeoPackager, TopicSelector};

pub use prompt::{AutoPrompter, Prompter, StdioPrompter};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("text generation failed: {0}")]
    Llm(#[from] LlmError),
    #[error("media generation failed: {0}")]
    Media(#[from] MediaError),
    #[error("composition failed: {0}")]
    Compositor(#[from] CompositorError),
    #[error("trend client setup failed: {0}")]
    Trend(#[from] TrendError),
    #[error("upload client setup failed: {0}")]
    Transport(#[from] TransportError),
    #[error("authorization client setup failed: {0}")]
    Auth(#[from] AuthError),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PipelineError {
    let path = path.to_path_buf();
    move |source| PipelineError::Io { path, source }
}

/// The external collaborators a pipeline run talks to.
pub struct PipelineServices {
    pub text: Arc<dyn TextGenerator>,
    pub media: Arc<dyn MediaBackend>,
    pub trend_sources: Vec<Arc<dyn TrendSource>>,
    pub executor: Arc<dyn CommandExecutor>,
    pub transport: Arc<dyn UploadTransport>,
    pub authorizer: Arc<dyn Authorizer>,
    pub prompter: Arc<dyn Prompter>,
}

impl PipelineServices {
    /// Production wiring. Fails early when the Gemini key is missing.
    pub fn from_config(config: &ShortsConfig, prompter: Arc<dyn Prompter>) -> PipelineResult<Self> {
        let key = config.require_gemini_key()?;
        Ok(Self {
            text: Arc::new(GeminiTextClient::new(&config.text, key)?),
            media: Arc::new(GeminiMediaClient::new(&config.media, key)?),
            trend_sources: vec![
                Arc::new(HackerNewsSource::new(&config.trends)?),
                Arc::new(RedditSource::new(&config.trends)?),
            ],
            executor: Arc::new(SystemCommandExecutor),
            transport: Arc::new(YouTubeTransport::new(&config.upload)?),
            authorizer: Arc::new(HttpAuthorizer::new()?),
            prompter,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub auto: bool,
    pub upload: bool,
    pub privacy: Privacy,
    pub quality: Quality,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            auto: false,
            upload: false,
            privacy: Privacy::Private,
            quality: Quality::Fast,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Trends,
    Topics,
    Selection,
    Script,
    Frames,
    CostCheckpoint,
    Clips,
    Narration,
    Composite,
    Seo,
    Upload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Trends => "trends",
            Stage::Topics => "topics",
            Stage::Selection => "selection",
            Stage::Script => "script",
            Stage::Frames => "frames",
            Stage::CostCheckpoint => "cost checkpoint",
            Stage::Clips => "clips",
            Stage::Narration => "narration",
            Stage::Composite => "composite",
            Stage::Seo => "seo",
            Stage::Upload => "upload",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineOutcome {
    NoTrends,
    NoCandidates,
    SelectionAborted,
    /// The script answer was not JSON; the raw text sits in `raw_output`.
    ScriptUnparsed { raw_output: PathBuf },
    NoFrames,
    Declined,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadStatus {
    NotRequested,
    NoVideo,
    Uploaded(UploadReceipt),
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub run_dir: Option<PathBuf>,
    pub stage: Stage,
    pub outcome: PipelineOutcome,
    pub topic: Option<String>,
    pub frames: usize,
    pub clips: usize,
    pub narration_seconds: Option<f64>,
    pub estimated_cost: Option<f64>,
    pub final_video: Option<PathBuf>,
    pub used_fallback: bool,
    pub seo_written: bool,
    pub upload: UploadStatus,
}

impl PipelineReport {
    fn new() -> Self {
        Self {
            run_dir: None,
            stage: Stage::Trends,
            outcome: PipelineOutcome::Completed,
            topic: None,
            frames: 0,
            clips: 0,
            narration_seconds: None,
            estimated_cost: None,
            final_video: None,
            used_fallback: false,
            seo_written: false,
            upload: UploadStatus::NotRequested,
        }
    }

    fn finish(mut self, outcome: PipelineOutcome) -> Self {
        info!(target: "pipeline", stage = %self.stage, outcome = ?outcome, "run finished");
        self.outcome = outcome;
        self
    }
}

fn candidate_label(candidate: &TopicCandidate) -> String {
    let mut label = candidate.topic.clone();
    if let Some(summary) = candidate.summary.as_deref().filter(|s| !s.is_empty()) {
        label.push_str(&format!("\n     {summary}"));
    }
    if let Some(hook) = candidate.hook.as_deref().filter(|h| !h.is_empty()) {
        label.push_str(&format!("\n     Hook: {hook}"));
    }
    label
}

/// Sequences trends, writing, media, composition, SEO and upload for one
/// run, persisting every stage's output before moving on.
pub struct PipelineDriver {
    config: ShortsConfig,
    collector: TrendCollector,
    topics: TopicSelector,
    scripts: ScriptWriter,
    seo: SeoPackager,
    media: Arc<dyn MediaBackend>,
    keyframes: KeyframeGenerator,
    narration: NarrationGenerator,
    compositor: Compositor,
    fallback: FallbackConcatenator,
    uploader: ResumableUploader,
    prompter: Arc<dyn Prompter>,
    run_date: Option<NaiveDate>,
}

impl PipelineDriver {
    pub fn new(config: ShortsConfig, services: PipelineServices) -> Self {
        let prompts = PromptLibrary::from_dir(config.prompts_dir());
        let collector = TrendCollector::new(services.trend_sources, config.trends.top_n);
        let compositor = Compositor::new(
            services.executor.clone(),
            RendererSettings::from_config(&config),
        );
        let fallback = FallbackConcatenator::new(
            services.executor,
            &config.compositor.ffmpeg_path,
        );
        let uploader =
            ResumableUploader::from_config(&config, services.transport, services.authorizer);
        Self {
            collector,
            topics: TopicSelector::new(services.text.clone(), &prompts),
            scripts: ScriptWriter::new(services.text.clone(), &prompts),
            seo: SeoPackager::new(services.text, &prompts),
            keyframes: KeyframeGenerator::new(services.media.clone()),
            narration: NarrationGenerator::new(services.media.clone()),
            media: services.media,
            compositor,
            fallback,
            uploader,
            prompter: services.prompter,
            run_date: None,
            config,
        }
    }

    /// Pins the date used for run directory names.
    pub fn with_run_date(mut self, date: NaiveDate) -> Self {
        self.run_date = Some(date);
        self
    }

    fn run_date(&self) -> NaiveDate {
        self.run_date.unwrap_or_else(|| Local::now().date_naive())
    }

    fn create_run(&self, slug: &str) -> PipelineResult<RunDirectory> {
        let outputs = self.config.outputs_dir();
        let run = RunDirectory::create(&outputs, self.run_date(), slug).map_err(io_error(&outputs))?;
        info!(target: "pipeline", dir = %run.root().display(), "run directory created");
        Ok(run)
    }

    /// Trends to upload, choosing the topic from the model's shortlist.
    pub async fn run_full(&self, options: PipelineOptions) -> PipelineResult<PipelineReport> {
        let mut report = PipelineReport::new();

        self.prompter.say("=== Collecting trends ===");
        let trends = self.collector.collect().await;
        self.prompter.say(&format!(
            "Collected {} items, keeping the top {}",
            trends.total_collected,
            trends.top_topics.len()
        ));

        if trends.top_topics.is_empty() {
            error!(target: "pipeline", "no trending items collected");
            self.prompter.say("No trending items were collected.");
            return Ok(report.finish(PipelineOutcome::NoTrends));
        }

        report.stage = Stage::Topics;
        self.prompter.say("=== Selecting topics ===");
        let candidates = match self.topics.select(&trends).await? {
            TextPayload::Parsed(shortlist) => shortlist.candidates,
            TextPayload::RawFallback(_) => {
                warn!(target: "pipeline", "topic shortlist was not parseable");
                Vec::new()
            }
        };
        if candidates.is_empty() {
            error!(target: "pipeline", "no topic candidates");
            self.prompter.say("No topic candidates were produced.");
            return Ok(report.finish(PipelineOutcome::NoCandidates));
        }

        report.stage = Stage::Selection;
        let index = if options.auto {
            Some(0)
        } else {
            let labels: Vec<String> = candidates.iter().map(candidate_label).collect();
            self.prompter.choose("Select a topic", &labels).await
        };
        let Some(selected) = index.and_then(|index| candidates.into_iter().nth(index)) else {
            self.prompter.say("Invalid selection.");
            return Ok(report.finish(PipelineOutcome::SelectionAborted));
        };
        self.prompter.say(&format!("Selected: {}", selected.topic));

        let slug = selected
            .slug
            .as_deref()
            .and_then(sanitize_slug)
            .unwrap_or_else(|| slugify(&selected.topic));
        let run = self.create_run(&slug)?;
        let trends_path = run.trends_file();
        run.write_json(&trends_path, &trends)
            .map_err(io_error(&trends_path))?;

        let brief = ScriptBrief {
            topic: selected.topic,
            source_url: selected.source_url,
            summary: selected.summary,
        };
        self.produce(&run, brief, options, report).await
    }

    /// Everything from the script stage on, for a topic given directly.
    pub async fn run_topic(&self, topic: &str, options: PipelineOptions) -> PipelineResult<PipelineReport> {
        let report = PipelineReport::new();
        let run = self.create_run(&slugify(topic))?;
        self.produce(&run, ScriptBrief::new(topic), options, report).await
    }

    async fn produce(
        &self,
        run: &RunDirectory,
        brief: ScriptBrief,
        options: PipelineOptions,
        mut report: PipelineReport,
    ) -> PipelineResult<PipelineReport> {
        report.run_dir = Some(run.root().to_path_buf());
        report.topic = Some(brief.topic.clone());

        report.stage = Stage::Script;
        self.prompter.say("=== Writing script ===");
        let payload = self.scripts.write(&brief).await?;
        let script_path = run.script_file();
        run.write_json(&script_path, &payload)
            .map_err(io_error(&script_path))?;
        let script = match payload {
            TextPayload::Parsed(script) => script,
            TextPayload::RawFallback(_) => {
                self.prompter.say(&format!(
                    "Script was not valid JSON, raw output kept in {}",
                    script_path.display()
                ));
                return Ok(report.finish(PipelineOutcome::ScriptUnparsed {
                    raw_output: script_path,
                }));
            }
        };
        self.prompter.say(&format!("Script has {} scenes", script.scenes.len()));

        report.stage = Stage::Frames;
        self.prompter.say("=== Generating keyframes ===");
        let frames = self.keyframes.generate(&script, run).await?;
        report.frames = frames.len();
        if frames.is_empty() {
            self.prompter.say("No keyframes were generated.");
            return Ok(report.finish(PipelineOutcome::NoFrames));
        }

        report.stage = Stage::CostCheckpoint;
        let cost = CostModel::from_config(&self.config.video).estimate(frames.len(), options.quality);
        report.estimated_cost = Some(cost);
        self.prompter.say(&format!(
            "Video generation: {} clips, quality {}, estimated cost ${cost:.2}",
            frames.len(),
            options.quality
        ));
        if !options.auto && !self.prompter.confirm("Proceed with video generation?").await {
            info!(target: "pipeline", "operator declined video generation");
            report.stage = Stage::Seo;
            report.seo_written = self.write_seo(&script, run).await?;
            return Ok(report.finish(PipelineOutcome::Declined));
        }

        report.stage = Stage::Clips;
        self.prompter.say("=== Generating clips ===");
        let clips = ClipGenerator::new(self.media.clone(), self.config.video.clone(), options.quality)
            .generate(&frames, &script, run)
            .await;
        report.clips = clips.len();

        report.stage = Stage::Narration;
        self.prompter.say("=== Synthesizing narration ===");
        let narration = self.narration.generate(&script, run).await;
        match &narration {
            Some(asset) => self
                .prompter
                .say(&format!("Narration: {:.1}s", asset.duration_seconds)),
            None => self.prompter.say("Narration failed, continuing without audio."),
        }
        report.narration_seconds = narration.as_ref().map(|asset| asset.duration_seconds);

        report.stage = Stage::Composite;
        if clips.is_empty() {
            warn!(target: "pipeline", "no clips survived, skipping composition");
            self.prompter.say("No clips were generated, skipping composition.");
        } else {
            self.prompter.say("=== Compositing ===");
            let mut video = self
                .compositor
                .render(&script, &clips, narration.as_ref(), run)
                .await?;
            if video.is_none() {
                self.prompter.say("Renderer unavailable, concatenating clips instead.");
                report.used_fallback = true;
                video = self.fallback.concat(&clips, run).await?;
            }
            match &video {
                Some(path) => self.prompter.say(&format!("Video: {}", path.display())),
                None => self.prompter.say("Composition failed."),
            }
            report.final_video = video;
        }

        report.stage = Stage::Seo;
        self.prompter.say("=== Packaging SEO ===");
        report.seo_written = self.write_seo(&script, run).await?;
        self.prompter.say(&format!("Done: {}", run.root().display()));

        if options.upload {
            report.stage = Stage::Upload;
            report.upload = self.upload(run.root(), options.privacy).await;
        }
        Ok(report.finish(PipelineOutcome::Completed))
    }

    /// Writes `seo.json`. Returns whether the answer parsed.
    async fn write_seo(&self, script: &Script, run: &RunDirectory) -> PipelineResult<bool> {
        let payload = self.seo.package(script).await?;
        let path = run.seo_file();
        run.write_json(&path, &payload).map_err(io_error(&path))?;
        if payload.is_raw() {
            self.prompter.say(&format!(
                "SEO answer was not valid JSON, raw output kept in {}",
                path.display()
            ));
        }
        Ok(!payload.is_raw())
    }

    /// Uploads a finished run directory. Failures are reported, not raised.
    pub async fn upload(&self, dir: &Path, privacy: Privacy) -> UploadStatus {
        self.prompter.say(&format!("=== Uploading ({privacy}) ==="));
        let status = upload_status(self.uploader.upload_from_dir(dir, privacy).await);
        match &status {
            UploadStatus::Uploaded(receipt) => self.prompter.say(&format!("Uploaded: {}", receipt.url)),
            UploadStatus::NoVideo => self.prompter.say("No final video to upload."),
            UploadStatus::Failed { reason } => self.prompter.say(&format!("Upload failed: {reason}")),
            UploadStatus::NotRequested => {}
        }
        status
    }
}

pub fn upload_status(result: Result<Option<UploadReceipt>, UploadError>) -> UploadStatus {
    match result {
        Ok(Some(receipt)) => UploadStatus::Uploaded(receipt),
        Ok(None) => UploadStatus::NoVideo,
        Err(err) => UploadStatus::Failed {
            reason: err.to_string(),
        },
    }
}
