//! Error types for the core library

use thiserror::Error;

/// Errors raised while taking in the task configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("empty config on stdin")]
    Empty,

    #[error("invalid config JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("prompt is required")]
    MissingPrompt,

    #[error("failed to read config from stdin: {0}")]
    Io(#[from] std::io::Error),
}
