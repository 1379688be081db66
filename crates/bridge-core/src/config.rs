//! Task configuration read from stdin

use std::path::PathBuf;

use serde::{Deserialize, Deserializer};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::error::ConfigError;

/// Directive appended to the prompt in plan mode
pub const PLAN_MODE_DIRECTIVE: &str = "\n\n---\n\
PLAN MODE: Produce an implementation plan only.\n\
- Do NOT create, modify, move or delete any files.\n\
- Do NOT run commands that change state (installs, builds that write artifacts, git commits, migrations or other destructive actions).\n\
- You may read files and search the codebase to inform the plan.\n\
Reply with the plan as your final answer.";

/// Whether the backend should act or only plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Execute,
    Plan,
}

/// The single task handed to a sidecar
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    /// Permission mode for the SDK backend (`autonomous` bypasses approval)
    #[serde(default)]
    pub mode: Option<String>,
    /// Autonomy level for the CLI backend (`full` selects full access)
    #[serde(default)]
    pub autonomy_level: Option<String>,
    #[serde(default)]
    pub max_turns: Option<u32>,
    #[serde(default)]
    pub max_budget_usd: Option<f64>,
    #[serde(default)]
    pub sandbox: Option<String>,
    #[serde(default)]
    pub approval_policy: Option<String>,
    #[serde(default, deserialize_with = "deserialize_tool_list")]
    pub allowed_tools: Option<Vec<String>>,
    /// MCP server map wired in as the interactive permission broker
    #[serde(default)]
    pub permission_mcp_config: Option<serde_json::Map<String, serde_json::Value>>,
    /// Backend binary name or path override
    #[serde(default)]
    pub binary: Option<String>,
}

impl TaskConfig {
    /// Parse and validate one config line
    pub fn from_line(line: &str) -> Result<Self, ConfigError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ConfigError::Empty);
        }

        let config: TaskConfig = serde_json::from_str(line)?;
        if config.prompt.trim().is_empty() {
            return Err(ConfigError::MissingPrompt);
        }
        Ok(config)
    }

    pub fn is_plan(&self) -> bool {
        self.execution_mode == ExecutionMode::Plan
    }

    /// Prompt as sent to the backend, with the plan directive when planning
    pub fn effective_prompt(&self) -> String {
        if self.is_plan() {
            format!("{}{}", self.prompt, PLAN_MODE_DIRECTIVE)
        } else {
            self.prompt.clone()
        }
    }

    /// Working directory, falling back to the process cwd
    pub fn resolve_working_dir(&self) -> PathBuf {
        match &self.working_dir {
            Some(dir) if !dir.as_os_str().is_empty() => dir.clone(),
            _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn model(&self) -> Option<&str> {
        non_empty(&self.model)
    }

    pub fn mode(&self) -> Option<&str> {
        non_empty(&self.mode)
    }

    pub fn autonomy_level(&self) -> Option<&str> {
        non_empty(&self.autonomy_level)
    }

    pub fn sandbox(&self) -> Option<&str> {
        non_empty(&self.sandbox)
    }

    pub fn approval_policy(&self) -> Option<&str> {
        non_empty(&self.approval_policy)
    }

    pub fn binary(&self) -> Option<&str> {
        non_empty(&self.binary)
    }

    /// Caller-supplied tool list, if it names at least one tool
    pub fn allowed_tools(&self) -> Option<&[String]> {
        self.allowed_tools
            .as_deref()
            .filter(|tools| !tools.is_empty())
    }
}

/// Read exactly one line from `reader` and turn it into a [`TaskConfig`]
pub async fn read_task_config<R>(reader: &mut R) -> Result<TaskConfig, ConfigError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = reader.read_line(&mut line).await?;
    debug!(bytes = read, "read config line");
    TaskConfig::from_line(&line)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Accept either a JSON list or one comma-separated string
fn deserialize_tool_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ToolList {
        List(Vec<String>),
        Csv(String),
    }

    let tools = match Option::<ToolList>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(ToolList::List(tools)) => tools,
        Some(ToolList::Csv(raw)) => raw.split(',').map(str::to_string).collect(),
    };

    Ok(Some(
        tools
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    ))
}
