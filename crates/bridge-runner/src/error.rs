//! Error types for bridge-runner

use thiserror::Error;

use bridge_core::ConfigError;

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Longest stderr excerpt carried in an error message
pub const STDERR_EXCERPT_LIMIT: usize = 400;

/// Errors that end a bridge run
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Task config could not be taken in
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Backend binary is not on PATH / does not exist
    #[error("{backend} binary not found: {binary}")]
    BinaryNotFound { backend: String, binary: String },

    /// Working directory is missing or not a directory
    #[error("working directory not found: {}", .path.display())]
    WorkingDirNotFound { path: std::path::PathBuf },

    /// Failed to spawn the backend process
    #[error("failed to spawn {backend}: {source}")]
    SpawnFailed {
        backend: String,
        #[source]
        source: std::io::Error,
    },

    /// Backend process exited unsuccessfully
    #[error("{}", process_exit_message(.backend, .code, .detail))]
    ProcessExited {
        backend: String,
        code: Option<i32>,
        detail: String,
    },

    /// Backend exited cleanly without ever reporting a result
    #[error("{backend} finished without a result")]
    MissingResult { backend: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Classify a spawn failure
    pub fn spawn(backend: &str, binary: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::BinaryNotFound {
                backend: backend.to_string(),
                binary: binary.to_string(),
            }
        } else {
            Self::SpawnFailed {
                backend: backend.to_string(),
                source,
            }
        }
    }

    /// Create a WorkingDirNotFound error
    pub fn working_dir_not_found(path: impl Into<std::path::PathBuf>) -> Self {
        Self::WorkingDirNotFound { path: path.into() }
    }

    /// Create a ProcessExited error
    pub fn process_exited(backend: &str, code: Option<i32>, detail: impl Into<String>) -> Self {
        Self::ProcessExited {
            backend: backend.to_string(),
            code,
            detail: detail.into(),
        }
    }

    /// Create a MissingResult error
    pub fn missing_result(backend: &str) -> Self {
        Self::MissingResult {
            backend: backend.to_string(),
        }
    }
}

fn process_exit_message(backend: &str, code: &Option<i32>, detail: &str) -> String {
    let mut msg = match code {
        Some(code) => format!("{} exited with code {}", backend, code),
        None => format!("{} was terminated by a signal", backend),
    };
    if !detail.is_empty() {
        msg.push_str(" | ");
        msg.push_str(detail);
    }
    msg
}

/// Collapse whitespace and keep at most `limit` characters
pub fn compact_excerpt(text: &str, limit: usize) -> String {
    let compact = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&compact, limit).to_string()
}

/// Prefix of `text` holding at most `limit` characters
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Hint appended when stderr points at a login problem
pub fn auth_hint(backend: &str, stderr: &str) -> Option<&'static str> {
    let lower = stderr.to_lowercase();
    let (needles, hint): (&[&str], &'static str) = match backend {
        "claude" => (
            &["not logged", "unauthorized"],
            "Hint: ensure the Claude CLI is logged in (e.g. run `claude login`).",
        ),
        "codex" => (
            &["api key", "unauthorized", "authentication"],
            "Hint: ensure Codex has a valid login or API key configured.",
        ),
        _ => return None,
    };
    needles.iter().any(|n| lower.contains(n)).then_some(hint)
}
