use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { source: io::Error, path: PathBuf },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        source: toml::de::Error,
        path: PathBuf,
    },
    #[error("{name} is not set: {remediation}")]
    MissingSecret {
        name: &'static str,
        remediation: &'static str,
    },
    #[error("required file {path} is missing: {remediation}")]
    MissingFile {
        path: PathBuf,
        remediation: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
