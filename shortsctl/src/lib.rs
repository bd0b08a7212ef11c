pub mod commands;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::Serialize;
use shorts_core::{
    load_or_default, AuthError, AutoPrompter, PipelineError, PipelineOptions, PipelineOutcome,
    PipelineReport, Privacy, Prompter, Quality, ShortsConfig, StdioPrompter, TransportError,
    TrendError, UploadError, UploadStatus,
};
use thiserror::Error;
use tracing::debug;

use commands::{GenerateArgs, TrendsArgs, UploadArgs};

pub type Result<T> = std::result::Result<T, AppError>;

const ENV_FILE: &str = ".env";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] shorts_core::ConfigError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("trend collection failed: {0}")]
    Trend(#[from] TrendError),
    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),
    #[error("upload client failed: {0}")]
    Transport(#[from] TransportError),
    #[error("authorization failed: {0}")]
    Auth(#[from] AuthError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot load {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("required resource missing: {0}")]
    MissingResource(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Trend-to-YouTube-Shorts pipeline", long_about = None)]
pub struct Cli {
    /// Path to shorts.toml
    #[arg(long, default_value = "configs/shorts.toml")]
    pub config: PathBuf,
    /// Directory receiving run directories (overrides paths.outputs_dir)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Skip every interactive prompt
    #[arg(long, default_value_t = false)]
    pub auto: bool,
    /// Upload the finished video
    #[arg(long, default_value_t = false)]
    pub upload: bool,
    /// Upload as public instead of private
    #[arg(long, default_value_t = false)]
    pub public: bool,
    /// Video generation quality
    #[arg(long, value_enum, default_value_t = QualityArg::Fast)]
    pub quality: QualityArg,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QualityArg {
    Fast,
    Full,
}

impl From<QualityArg> for Quality {
    fn from(value: QualityArg) -> Self {
        match value {
            QualityArg::Fast => Quality::Fast,
            QualityArg::Full => Quality::Full,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect and rank trending items
    Trends(TrendsArgs),
    /// Produce a video for a given topic
    Generate(GenerateArgs),
    /// Upload an existing run directory
    Upload(UploadArgs),
    /// Print shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    #[arg(value_enum)]
    pub shell: Shell,
}

impl Cli {
    pub fn privacy(&self) -> Privacy {
        if self.public {
            Privacy::Public
        } else {
            Privacy::Private
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            auto: self.auto,
            upload: self.upload,
            privacy: self.privacy(),
            quality: self.quality.into(),
        }
    }

    /// Loads the config file when present, then `<base_dir>/.env`, and
    /// applies CLI overrides and environment secrets.
    pub fn load_config(&self) -> Result<ShortsConfig> {
        let config = load_or_default(&self.config)?;
        if let Some(path) = load_env_file(&config)? {
            debug!(target: "shortsctl", path = %path.display(), "environment file loaded");
        }
        let mut config = config.with_env_secrets();
        if let Some(dir) = &self.output_dir {
            config.paths.outputs_dir = dir.to_string_lossy().into_owned();
        }
        debug!(
            target: "shortsctl",
            path = %self.config.display(),
            outputs = %config.outputs_dir().display(),
            "configuration loaded"
        );
        Ok(config)
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    if let Some(Commands::Completions(args)) = &cli.command {
        clap_complete::generate(args.shell, &mut Cli::command(), "shortsctl", &mut std::io::stdout());
        return Ok(());
    }

    let config = cli.load_config()?;
    let options = cli.pipeline_options();
    match &cli.command {
        None => commands::generate::run_full(config, options, cli.format).await,
        Some(Commands::Trends(args)) => commands::trends::run(&config, args, cli.format).await,
        Some(Commands::Generate(args)) => {
            commands::generate::run(config, args, options, cli.format).await
        }
        Some(Commands::Upload(args)) => {
            commands::upload::run(&config, args, cli.privacy(), cli.format).await
        }
        Some(Commands::Completions(_)) => Ok(()),
    }
}

/// Exports `<base_dir>/.env` into the process environment. Variables that
/// are already set win.
fn load_env_file(config: &ShortsConfig) -> Result<Option<PathBuf>> {
    let path = Path::new(&config.paths.base_dir).join(ENV_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    dotenvy::from_path(&path).map_err(|source| AppError::EnvFile {
        path: path.clone(),
        source,
    })?;
    Ok(Some(path))
}

pub(crate) fn prompter(auto: bool) -> Arc<dyn Prompter> {
    if auto {
        Arc::new(AutoPrompter)
    } else {
        Arc::new(StdioPrompter::new())
    }
}

/// Prints the run report and turns a failed upload into a non-zero exit.
pub(crate) fn finish(report: &PipelineReport, format: OutputFormat) -> Result<()> {
    render(report, format)?;
    match &report.upload {
        UploadStatus::Failed { reason } => Err(AppError::UploadFailed(reason.clone())),
        _ => Ok(()),
    }
}

pub(crate) fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

pub(crate) trait DisplayFallback {
    fn display(&self) -> String;
}

impl DisplayFallback for PipelineReport {
    fn display(&self) -> String {
        let outcome = match &self.outcome {
            PipelineOutcome::NoTrends => "stopped: no trending items".to_string(),
            PipelineOutcome::NoCandidates => "stopped: no topic candidates".to_string(),
            PipelineOutcome::SelectionAborted => "stopped: invalid topic selection".to_string(),
            PipelineOutcome::ScriptUnparsed { raw_output } => {
                format!("stopped: script not parseable, see {}", raw_output.display())
            }
            PipelineOutcome::NoFrames => "stopped: no keyframes generated".to_string(),
            PipelineOutcome::Declined => "stopped: video generation declined".to_string(),
            PipelineOutcome::Completed => "completed".to_string(),
        };
        let mut lines = vec![format!("Run {outcome} (stage: {})", self.stage)];
        if let Some(dir) = &self.run_dir {
            lines.push(format!("Directory: {}", dir.display()));
        }
        if let Some(topic) = &self.topic {
            lines.push(format!("Topic: {topic}"));
        }
        if self.frames > 0 {
            lines.push(format!("Frames: {}  Clips: {}", self.frames, self.clips));
        }
        if let Some(cost) = self.estimated_cost {
            lines.push(format!("Estimated cost: ${cost:.2}"));
        }
        if let Some(video) = &self.final_video {
            let via = if self.used_fallback { " (ffmpeg concat)" } else { "" };
            lines.push(format!("Video: {}{via}", video.display()));
        }
        match &self.upload {
            UploadStatus::NotRequested => {}
            UploadStatus::NoVideo => lines.push("Upload: skipped, no video".into()),
            UploadStatus::Uploaded(receipt) => lines.push(format!("Upload: {}", receipt.url)),
            UploadStatus::Failed { reason } => lines.push(format!("Upload: failed ({reason})")),
        }
        lines.join("\n")
    }
}
