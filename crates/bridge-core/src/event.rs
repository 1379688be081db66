//! Canonical events written to the host

use serde::{Deserialize, Serialize};

/// One line of the bridge protocol
///
/// Every backend driver reduces its upstream vocabulary to these three
/// records. `Result` and `Error` are terminal; `Tool` may repeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A forwarded tool invocation
    Tool {
        tool_name: String,
        summary: String,
        files: Vec<String>,
        iter: u32,
    },

    /// Normal completion
    Result {
        answer: String,
        tokens: u64,
        cost: f64,
        iters: u32,
        is_error: bool,
    },

    /// Fatal condition
    Error { message: String },
}

impl Event {
    /// Create a tool event
    pub fn tool(
        tool_name: impl Into<String>,
        summary: impl Into<String>,
        files: Vec<String>,
        iter: u32,
    ) -> Self {
        Self::Tool {
            tool_name: tool_name.into(),
            summary: summary.into(),
            files,
            iter,
        }
    }

    /// Create a result event
    pub fn result(
        answer: impl Into<String>,
        tokens: u64,
        cost: f64,
        iters: u32,
        is_error: bool,
    ) -> Self {
        Self::Result {
            answer: answer.into(),
            tokens,
            cost,
            iters,
            is_error,
        }
    }

    /// Create an error event
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Check if the event ends the run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result { .. } | Self::Error { .. })
    }

    /// Wire name of the event kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tool { .. } => "tool",
            Self::Result { .. } => "result",
            Self::Error { .. } => "error",
        }
    }
}
