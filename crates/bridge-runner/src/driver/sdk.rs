//! Claude driver
//!
//! Runs `claude -p --output-format stream-json --verbose` and forwards the
//! mutating tool calls found in assistant messages.

use serde_json::json;
use tracing::{debug, warn};

use bridge_core::{Event, TaskConfig};

use crate::error::{auth_hint, compact_excerpt, BridgeError, Result, STDERR_EXCERPT_LIMIT};
use crate::parser::claude::{ClaudeMessage, ResultMessage};
use crate::parser::parse_json_line;
use crate::process::{CommandSpec, ProcessExit};
use crate::tools::{base_name, extract_files, summarize, ToolKind};

use super::AgentBackend;

pub const BACKEND_NAME: &str = "claude";

/// Binary used when the config names none
pub const DEFAULT_BINARY: &str = "claude";

/// Tools granted in plan mode when the caller names none
pub const PLAN_ALLOWED_TOOLS: [&str; 6] = ["Read", "Glob", "Grep", "LS", "WebSearch", "WebFetch"];

/// Tools denied alongside [`PLAN_ALLOWED_TOOLS`]
pub const PLAN_DISALLOWED_TOOLS: [&str; 5] = ["Write", "Edit", "MultiEdit", "NotebookEdit", "Bash"];

/// Smallest budget the two-decimal flag can express
const MIN_BUDGET_USD: f64 = 0.01;

pub struct SdkDriver {
    config: TaskConfig,
    /// Incremented on every tool-use block, forwarded or not
    iterations: u32,
    result: Option<ResultMessage>,
}

impl SdkDriver {
    pub fn new(config: TaskConfig) -> Self {
        Self {
            config,
            iterations: 0,
            result: None,
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    fn push_permission_args(&self, spec: &mut CommandSpec) {
        let config = &self.config;
        let autonomous = config
            .mode()
            .is_some_and(|mode| mode.eq_ignore_ascii_case("autonomous"));

        if config.is_plan() {
            spec.arg("--permission-mode").arg("bypassPermissions");
            match config.allowed_tools() {
                Some(tools) => {
                    spec.arg("--allowedTools").arg(tools.join(","));
                }
                None => {
                    spec.arg("--allowedTools")
                        .arg(PLAN_ALLOWED_TOOLS.join(","))
                        .arg("--disallowedTools")
                        .arg(PLAN_DISALLOWED_TOOLS.join(","));
                }
            }
        } else if autonomous {
            spec.arg("--permission-mode").arg("bypassPermissions");
            spec.opt("--allowedTools", config.allowed_tools().map(|t| t.join(",")));
        } else {
            spec.arg("--permission-mode").arg("default");
            if let Some(servers) = config.permission_mcp_config.as_ref().filter(|s| !s.is_empty()) {
                let mcp_config = json!({ "mcpServers": servers });
                spec.arg("--mcp-config").arg(mcp_config.to_string());
                if let Some(server) = servers.keys().next() {
                    spec.arg("--permission-prompt-tool")
                        .arg(format!("mcp__{}__approve", server));
                }
            }
        }
    }

    fn handle_message(&mut self, message: ClaudeMessage) -> Vec<Event> {
        match message {
            ClaudeMessage::System { subtype, session_id } => {
                debug!(?subtype, ?session_id, "claude system message");
                Vec::new()
            }
            ClaudeMessage::Assistant { .. } => {
                let mut events = Vec::new();
                for (name, input) in message.tool_uses() {
                    self.iterations += 1;
                    let name = base_name(name);
                    let kind = ToolKind::from_name(name);
                    if !kind.is_forwarded() {
                        debug!(tool = name, "suppressing read-only tool");
                        continue;
                    }
                    events.push(Event::tool(
                        name,
                        summarize(kind, input),
                        extract_files(input),
                        self.iterations,
                    ));
                }
                events
            }
            ClaudeMessage::Result(result) => {
                debug!(subtype = ?result.subtype, is_error = result.is_error, "claude result");
                self.result = Some(result);
                Vec::new()
            }
            ClaudeMessage::Other => Vec::new(),
        }
    }
}

impl AgentBackend for SdkDriver {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn command(&self) -> CommandSpec {
        let config = &self.config;
        let binary = config.binary().unwrap_or(DEFAULT_BINARY);
        let mut spec = CommandSpec::new(binary, config.resolve_working_dir());

        spec.arg("-p")
            .arg("--output-format")
            .arg("stream-json")
            .arg("--verbose")
            .opt("--model", config.model())
            .opt(
                "--max-turns",
                config.max_turns.filter(|n| *n > 0).map(|n| n.to_string()),
            )
            .opt(
                "--max-budget-usd",
                config
                    .max_budget_usd
                    .filter(|b| *b > 0.0)
                    .map(|b| format!("{:.2}", b.max(MIN_BUDGET_USD))),
            );
        self.push_permission_args(&mut spec);

        spec.arg("--").arg(config.effective_prompt());
        spec
    }

    fn handle_line(&mut self, line: &str) -> Vec<Event> {
        match parse_json_line::<ClaudeMessage>(line) {
            Some(message) => self.handle_message(message),
            None => Vec::new(),
        }
    }

    fn finish(self, exit: ProcessExit) -> Result<Event> {
        if let Some(result) = self.result {
            if !exit.success() {
                warn!(code = ?exit.code, "claude exited unsuccessfully after its result");
            }
            debug!(
                num_turns = ?result.num_turns,
                iterations = self.iterations,
                "claude reported a result"
            );
            return Ok(Event::result(
                result.result.unwrap_or_default(),
                result.usage.total(),
                result.total_cost_usd.unwrap_or(0.0),
                self.iterations,
                result.is_error,
            ));
        }

        if exit.success() {
            return Err(BridgeError::missing_result(BACKEND_NAME));
        }

        let mut detail = compact_excerpt(&exit.stderr, STDERR_EXCERPT_LIMIT);
        if let Some(hint) = auth_hint(BACKEND_NAME, &exit.stderr) {
            if !detail.is_empty() {
                detail.push(' ');
            }
            detail.push_str(hint);
        }
        Err(BridgeError::process_exited(BACKEND_NAME, exit.code, detail))
    }
}
