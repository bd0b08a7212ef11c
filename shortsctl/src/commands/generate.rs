use clap::Args;
use shorts_core::{PipelineDriver, PipelineOptions, PipelineServices, ShortsConfig};

use crate::{finish, prompter, OutputFormat, Result};

/// Produce a video for a given topic, skipping trend collection.
#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Topic to write about
    #[arg(short, long)]
    pub topic: String,
}

pub async fn run(
    config: ShortsConfig,
    args: &GenerateArgs,
    options: PipelineOptions,
    format: OutputFormat,
) -> Result<()> {
    let services = PipelineServices::from_config(&config, prompter(options.auto))?;
    let driver = PipelineDriver::new(config, services);
    let report = driver.run_topic(&args.topic, options).await?;
    finish(&report, format)
}

/// Full pipeline: trends, topic choice and everything after it.
pub async fn run_full(config: ShortsConfig, options: PipelineOptions, format: OutputFormat) -> Result<()> {
    let services = PipelineServices::from_config(&config, prompter(options.auto))?;
    let driver = PipelineDriver::new(config, services);
    let report = driver.run_full(options).await?;
    finish(&report, format)
}
