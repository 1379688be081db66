//! Codex driver
//!
//! Runs `codex exec --json` and forwards shell commands and non-read MCP
//! tool calls as they start.

use tracing::{debug, warn};

use bridge_core::{Event, TaskConfig};

use crate::error::{auth_hint, compact_excerpt, BridgeError, Result, STDERR_EXCERPT_LIMIT};
use crate::parser::codex::{is_suppressed_mcp_tool, strip_shell_wrapper, CodexEvent, CodexItem};
use crate::parser::parse_json_line;
use crate::process::{CommandSpec, ProcessExit};
use crate::tools::command_summary;

use super::AgentBackend;

pub const BACKEND_NAME: &str = "codex";

/// Binary used when the config names none
pub const DEFAULT_BINARY: &str = "codex";

/// How the CLI is allowed to act without asking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalFlags {
    Never,
    FullAuto,
    Bypass,
}

impl ApprovalFlags {
    /// Map a policy name onto CLI flags; unknown names map to nothing
    pub fn from_policy(policy: &str) -> Option<Self> {
        match policy.trim() {
            "never" => Some(Self::Never),
            "full-auto" | "auto-edit" | "on-failure" => Some(Self::FullAuto),
            "bypass" | "yolo" | "dangerously-bypass-approvals-and-sandbox" => Some(Self::Bypass),
            _ => None,
        }
    }

    pub fn args(&self) -> &'static [&'static str] {
        match self {
            Self::Never => &["-c", "approval_policy=\"never\""],
            Self::FullAuto => &["--full-auto"],
            Self::Bypass => &["--dangerously-bypass-approvals-and-sandbox"],
        }
    }
}

pub struct CliDriver {
    config: TaskConfig,
    /// Incremented per forwarded tool or command
    iterations: u32,
    tokens: u64,
    answer: Option<String>,
    last_error: Option<String>,
}

impl CliDriver {
    pub fn new(config: TaskConfig) -> Self {
        Self {
            config,
            iterations: 0,
            tokens: 0,
            answer: None,
            last_error: None,
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    fn full_autonomy(&self) -> bool {
        self.config
            .autonomy_level()
            .is_some_and(|level| level.eq_ignore_ascii_case("full"))
    }

    /// Sandbox mode passed to `--sandbox`
    pub fn sandbox(&self) -> Option<&str> {
        if let Some(sandbox) = self.config.sandbox() {
            Some(sandbox)
        } else if self.config.is_plan() {
            Some("read-only")
        } else if self.full_autonomy() {
            Some("danger-full-access")
        } else {
            None
        }
    }

    /// Approval policy name before flag mapping
    pub fn approval_policy(&self) -> Option<&str> {
        if self.config.is_plan() || self.full_autonomy() {
            Some("never")
        } else {
            self.config.approval_policy()
        }
    }

    fn handle_event(&mut self, event: CodexEvent) -> Vec<Event> {
        match event {
            CodexEvent::ItemStarted { item } => match item {
                CodexItem::CommandExecution { command } => {
                    self.iterations += 1;
                    let command = strip_shell_wrapper(&command);
                    vec![Event::tool(
                        "Bash",
                        command_summary(command),
                        Vec::new(),
                        self.iterations,
                    )]
                }
                CodexItem::McpToolCall { server, tool } => {
                    if is_suppressed_mcp_tool(&tool) {
                        debug!(server = %server, tool = %tool, "suppressing read-only MCP tool");
                        return Vec::new();
                    }
                    self.iterations += 1;
                    vec![Event::tool(tool, "", Vec::new(), self.iterations)]
                }
                CodexItem::AgentMessage { .. } | CodexItem::Other => Vec::new(),
            },
            CodexEvent::ItemCompleted {
                item: CodexItem::AgentMessage { text },
            } if !text.is_empty() => {
                self.answer = Some(text);
                Vec::new()
            }
            CodexEvent::TurnCompleted { usage } => {
                self.tokens += usage.input_tokens + usage.output_tokens;
                Vec::new()
            }
            CodexEvent::TurnFailed { error } => {
                self.remember_error(error.message);
                Vec::new()
            }
            CodexEvent::Error { message } => {
                self.remember_error(message);
                Vec::new()
            }
            CodexEvent::ThreadStarted { thread_id } => {
                debug!(?thread_id, "codex thread started");
                Vec::new()
            }
            CodexEvent::ItemCompleted { .. } | CodexEvent::Other => Vec::new(),
        }
    }

    fn remember_error(&mut self, message: String) {
        if !message.trim().is_empty() {
            warn!("codex reported: {}", message);
            self.last_error = Some(message);
        }
    }
}

impl AgentBackend for CliDriver {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn command(&self) -> CommandSpec {
        let config = &self.config;
        let binary = config.binary().unwrap_or(DEFAULT_BINARY);
        let working_dir = config.resolve_working_dir();
        let mut spec = CommandSpec::new(binary, working_dir.clone());

        spec.arg("exec")
            .arg("--json")
            .opt("--model", config.model())
            .opt("--sandbox", self.sandbox());
        if let Some(flags) = self.approval_policy().and_then(ApprovalFlags::from_policy) {
            for arg in flags.args() {
                spec.arg(*arg);
            }
        }
        spec.arg("--cd")
            .arg(working_dir.to_string_lossy())
            .arg("--skip-git-repo-check")
            .arg("--")
            .arg(config.effective_prompt());
        spec
    }

    fn handle_line(&mut self, line: &str) -> Vec<Event> {
        match parse_json_line::<CodexEvent>(line) {
            Some(event) => self.handle_event(event),
            None => Vec::new(),
        }
    }

    fn finish(self, exit: ProcessExit) -> Result<Event> {
        if exit.success() {
            return Ok(Event::result(
                self.answer.unwrap_or_default(),
                self.tokens,
                0.0,
                self.iterations,
                false,
            ));
        }

        let mut parts = Vec::new();
        let excerpt = compact_excerpt(&exit.stderr, STDERR_EXCERPT_LIMIT);
        if !excerpt.is_empty() {
            parts.push(excerpt);
        }
        if let Some(message) = self.last_error {
            parts.push(compact_excerpt(&message, STDERR_EXCERPT_LIMIT));
        }
        if let Some(hint) = auth_hint(BACKEND_NAME, &exit.stderr) {
            parts.push(hint.to_string());
        }
        Err(BridgeError::process_exited(
            BACKEND_NAME,
            exit.code,
            parts.join(" | "),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::drive;
    use crate::driver::testing::{capturing_supervisor, ScriptedSource};

    fn driver(json: &str) -> CliDriver {
        CliDriver::new(TaskConfig::from_line(json).unwrap())
    }

    fn exit(code: i32, stderr: &str) -> ProcessExit {
        ProcessExit {
            code: Some(code),
            stderr: stderr.to_string(),
        }
    }

    fn command_started(command: &str) -> String {
        serde_json::json!({
            "type": "item.started",
            "item": {"id": "item_0", "type": "command_execution", "command": command, "status": "in_progress"}
        })
        .to_string()
    }

    #[test]
    fn test_command_defaults() {
        let spec = driver(r#"{"prompt":"do it","working_dir":"/repo"}"#).command();

        assert_eq!(spec.program, "codex");
        assert_eq!(
            spec.args,
            vec!["exec", "--json", "--cd", "/repo", "--skip-git-repo-check", "--", "do it"]
        );
    }

    #[test]
    fn test_command_overrides() {
        let spec = driver(
            r#"{"prompt":"p","working_dir":"/w","model":"o4-mini","sandbox":"workspace-write","approval_policy":"on-failure","binary":"/usr/local/bin/codex"}"#,
        )
        .command();

        assert_eq!(spec.program, "/usr/local/bin/codex");
        assert_eq!(spec.value_of("--model"), Some("o4-mini"));
        assert_eq!(spec.value_of("--sandbox"), Some("workspace-write"));
        assert!(spec.has_arg("--full-auto"));
    }

    #[test]
    fn test_plan_mode_is_read_only() {
        let d = driver(r#"{"prompt":"p","execution_mode":"plan","approval_policy":"yolo"}"#);
        assert_eq!(d.sandbox(), Some("read-only"));
        assert_eq!(d.approval_policy(), Some("never"));

        let spec = d.command();
        assert_eq!(spec.value_of("-c"), Some("approval_policy=\"never\""));
        assert!(!spec.has_arg("--dangerously-bypass-approvals-and-sandbox"));
        assert!(spec.args.last().unwrap().starts_with("p\n\n---"));
    }

    #[test]
    fn test_full_autonomy() {
        let d = driver(r#"{"prompt":"p","autonomy_level":"full"}"#);
        assert_eq!(d.sandbox(), Some("danger-full-access"));
        assert_eq!(d.approval_policy(), Some("never"));

        let d = driver(r#"{"prompt":"p","autonomy_level":"full","sandbox":"workspace-write"}"#);
        assert_eq!(d.sandbox(), Some("workspace-write"));
    }

    #[test]
    fn test_approval_mapping() {
        assert_eq!(ApprovalFlags::from_policy("never"), Some(ApprovalFlags::Never));
        assert_eq!(ApprovalFlags::from_policy("auto-edit"), Some(ApprovalFlags::FullAuto));
        assert_eq!(ApprovalFlags::from_policy("yolo"), Some(ApprovalFlags::Bypass));
        assert_eq!(ApprovalFlags::from_policy("untrusted"), None);

        let spec = driver(r#"{"prompt":"p","approval_policy":"untrusted"}"#).command();
        assert!(!spec.has_arg("-c"));
        assert!(!spec.has_arg("--full-auto"));
    }

    #[test]
    fn test_command_execution_is_forwarded() {
        let mut d = driver(r#"{"prompt":"p"}"#);
        let events = d.handle_line(&command_started("/bin/bash -lc 'cargo test --all'"));

        assert_eq!(
            events,
            vec![Event::tool("Bash", "command=cargo test --all", vec![], 1)]
        );
    }

    #[test]
    fn test_long_command_is_truncated() {
        let mut d = driver(r#"{"prompt":"p"}"#);
        let long = format!("/usr/bin/bash -lc '{}'", "y".repeat(300));
        let events = d.handle_line(&command_started(&long));

        match &events[0] {
            Event::Tool { summary, .. } => assert_eq!(summary.len(), "command=".len() + 120),
            other => panic!("Expected tool event, got {:?}", other),
        }
    }

    #[test]
    fn test_mcp_tool_calls() {
        let mut d = driver(r#"{"prompt":"p"}"#);
        let read = r#"{"type":"item.started","item":{"id":"1","type":"mcp_tool_call","server":"fs","tool":"Read_File"}}"#;
        let write = r#"{"type":"item.started","item":{"id":"2","type":"mcp_tool_call","server":"fs","tool":"write_file"}}"#;

        assert!(d.handle_line(read).is_empty());
        assert_eq!(d.iterations(), 0);
        assert_eq!(
            d.handle_line(write),
            vec![Event::tool("write_file", "", vec![], 1)]
        );
    }

    #[test]
    fn test_other_items_and_noise_are_ignored() {
        let mut d = driver(r#"{"prompt":"p"}"#);
        assert!(d
            .handle_line(r#"{"type":"item.started","item":{"id":"1","type":"file_change","changes":[]}}"#)
            .is_empty());
        assert!(d
            .handle_line(r#"{"type":"item.started","item":{"id":"2","type":"agent_message","text":"hi"}}"#)
            .is_empty());
        assert!(d
            .handle_line(r#"{"type":"item.completed","item":{"id":"3","type":"command_execution","command":"ls"}}"#)
            .is_empty());
        assert!(d.handle_line(r#"{"type":"turn.started"}"#).is_empty());
        assert!(d.handle_line("{broken").is_empty());
        assert_eq!(d.iterations(), 0);
    }

    #[test]
    fn test_finish_success_uses_last_answer_and_tokens() {
        let mut d = driver(r#"{"prompt":"p"}"#);
        d.handle_line(&command_started("ls"));
        d.handle_line(r#"{"type":"item.completed","item":{"id":"a","type":"agent_message","text":"first"}}"#);
        d.handle_line(r#"{"type":"item.completed","item":{"id":"b","type":"agent_message","text":""}}"#);
        d.handle_line(r#"{"type":"item.completed","item":{"id":"c","type":"agent_message","text":"second"}}"#);
        d.handle_line(r#"{"type":"turn.completed","usage":{"input_tokens":10,"output_tokens":5}}"#);
        d.handle_line(r#"{"type":"turn.completed","usage":{"input_tokens":1,"output_tokens":2}}"#);

        let event = d.finish(exit(0, "")).unwrap();
        assert_eq!(event, Event::result("second", 18, 0.0, 1, false));
    }

    #[test]
    fn test_finish_success_without_answer() {
        let event = driver(r#"{"prompt":"p"}"#).finish(exit(0, "")).unwrap();
        assert_eq!(event, Event::result("", 0, 0.0, 0, false));
    }

    #[test]
    fn test_finish_failure_message() {
        let mut d = driver(r#"{"prompt":"p"}"#);
        d.handle_line(r#"{"type":"item.completed","item":{"id":"a","type":"agent_message","text":"partial"}}"#);
        d.handle_line(r#"{"type":"turn.failed","error":{"message":"stream disconnected"}}"#);

        let err = d.finish(exit(2, "fatal:\n   bad   things\n")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "codex exited with code 2 | fatal: bad things | stream disconnected"
        );
    }

    #[test]
    fn test_finish_failure_auth_hint() {
        let err = driver(r#"{"prompt":"p"}"#)
            .finish(exit(1, "401 Unauthorized"))
            .unwrap_err()
            .to_string();
        assert!(err.starts_with("codex exited with code 1 | 401 Unauthorized | Hint:"));
    }

    #[test]
    fn test_stderr_excerpt_is_capped() {
        let err = driver(r#"{"prompt":"p"}"#)
            .finish(exit(1, &"e".repeat(1000)))
            .unwrap_err()
            .to_string();
        assert_eq!(err.len(), "codex exited with code 1 | ".len() + 400);
    }

    #[tokio::test]
    async fn test_drive_full_stream() {
        let (supervisor, captured) = capturing_supervisor();
        let mut source = ScriptedSource::new(
            &[
                r#"{"type":"thread.started","thread_id":"t1"}"#,
                r#"{"type":"turn.started"}"#,
                command_started("/bin/bash -lc 'git status'").as_str(),
                r#"{"type":"item.started","item":{"id":"2","type":"mcp_tool_call","server":"fs","tool":"grep"}}"#,
                r#"{"type":"item.started","item":{"id":"3","type":"mcp_tool_call","server":"gh","tool":"create_issue"}}"#,
                r#"{"type":"item.completed","item":{"id":"4","type":"agent_message","text":"Done."}}"#,
                r#"{"type":"turn.completed","usage":{"input_tokens":40,"output_tokens":2}}"#,
            ],
            0,
            "",
        );

        let terminal = drive(driver(r#"{"prompt":"p"}"#), &mut source, &supervisor)
            .await
            .unwrap();

        assert_eq!(terminal, Event::result("Done.", 42, 0.0, 2, false));
        assert_eq!(
            captured.events(),
            vec![
                Event::tool("Bash", "command=git status", vec![], 1),
                Event::tool("create_issue", "", vec![], 2),
            ]
        );
    }
}
