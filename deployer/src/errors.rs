//! Error types for the deployer

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the deployer
#[derive(Error, Debug)]
pub enum DeployerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Unknown deployment type, malformed overlay or bad setting
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The configuration repository could not be fetched
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// An artifact could not be written
    #[error("Write error at {}: {message}", path.display())]
    WriteError { path: PathBuf, message: String },

    /// A deployment handler failed after generating its artifacts
    #[error("Handler error: {0}")]
    HandlerError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployerError {
    /// True for errors raised before any artifact could have been written
    pub fn is_config_error(&self) -> bool {
        matches!(self, DeployerError::ConfigError(_))
    }
}

impl From<anyhow::Error> for DeployerError {
    fn from(err: anyhow::Error) -> Self {
        DeployerError::Internal(err.to_string())
    }
}
