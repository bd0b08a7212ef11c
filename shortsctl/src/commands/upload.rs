use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde::Serialize;
use shorts_core::{
    HttpAuthorizer, Privacy, ResumableUploader, ShortsConfig, UploadReceipt, YouTubeTransport,
};

use crate::{render, AppError, DisplayFallback, OutputFormat, Result};

/// Upload the final video of an existing run directory.
#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// Run directory containing final_shorts.mp4
    #[arg(short, long)]
    pub dir: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct UploadSummary {
    pub dir: PathBuf,
    pub privacy: Privacy,
    #[serde(flatten)]
    pub receipt: UploadReceipt,
}

impl DisplayFallback for UploadSummary {
    fn display(&self) -> String {
        format!(
            "Uploaded {} as {} ({} retries)\n{}",
            self.dir.display(),
            self.privacy,
            self.receipt.retries,
            self.receipt.url
        )
    }
}

pub async fn run(
    config: &ShortsConfig,
    args: &UploadArgs,
    privacy: Privacy,
    format: OutputFormat,
) -> Result<()> {
    config.require_client_secret()?;
    let uploader = ResumableUploader::from_config(
        config,
        Arc::new(YouTubeTransport::new(&config.upload)?),
        Arc::new(HttpAuthorizer::new()?),
    );
    let receipt = uploader
        .upload_from_dir(&args.dir, privacy)
        .await?
        .ok_or_else(|| {
            AppError::MissingResource(format!(
                "{} has no final_shorts.mp4",
                args.dir.display()
            ))
        })?;
    render(
        &UploadSummary {
            dir: args.dir.clone(),
            privacy,
            receipt,
        },
        format,
    )
}
