//! Codex `exec --json` events

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

/// One line of `codex exec --json`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum CodexEvent {
    #[serde(rename = "thread.started")]
    ThreadStarted {
        #[serde(default)]
        thread_id: Option<String>,
    },

    #[serde(rename = "item.started")]
    ItemStarted { item: CodexItem },

    #[serde(rename = "item.completed")]
    ItemCompleted { item: CodexItem },

    #[serde(rename = "turn.completed")]
    TurnCompleted {
        #[serde(default)]
        usage: TurnUsage,
    },

    #[serde(rename = "turn.failed")]
    TurnFailed {
        #[serde(default)]
        error: FailureDetail,
    },

    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        message: String,
    },

    #[serde(other)]
    Other,
}

/// Thread item carried by `item.*` events
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CodexItem {
    CommandExecution {
        #[serde(default)]
        command: String,
    },

    McpToolCall {
        #[serde(default)]
        server: String,
        #[serde(default)]
        tool: String,
    },

    AgentMessage {
        #[serde(default)]
        text: String,
    },

    /// Reasoning, file changes, todo lists, web searches
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TurnUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FailureDetail {
    #[serde(default)]
    pub message: String,
}

/// MCP tools that only read; compared case-insensitively
const SUPPRESSED_MCP_TOOLS: [&str; 9] = [
    "read_file",
    "read_multiple_files",
    "list_directory",
    "list_files",
    "directory_tree",
    "search_files",
    "get_file_info",
    "grep",
    "glob",
];

pub fn is_suppressed_mcp_tool(tool: &str) -> bool {
    SUPPRESSED_MCP_TOOLS
        .iter()
        .any(|name| name.eq_ignore_ascii_case(tool))
}

fn shell_wrapper() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^/(?:usr/(?:local/)?)?bin/\w+ -lc (.+)$").ok())
        .as_ref()
}

/// Unwrap `/bin/bash -lc '<cmd>'` (and the `/usr/bin`, `/usr/local/bin`
/// variants) to the inner command
pub fn strip_shell_wrapper(command: &str) -> &str {
    let command = command.trim();
    let Some(inner) = shell_wrapper()
        .and_then(|re| re.captures(command))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
    else {
        return command;
    };

    for quote in ['\'', '"'] {
        if inner.len() >= 2 && inner.starts_with(quote) && inner.ends_with(quote) {
            return &inner[1..inner.len() - 1];
        }
    }
    inner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_json_line;

    #[test]
    fn test_parse_command_started() {
        let event: CodexEvent = parse_json_line(
            r#"{"type":"item.started","item":{"id":"item_1","type":"command_execution","command":"/bin/bash -lc 'ls -la'","aggregated_output":"","status":"in_progress"}}"#,
        )
        .unwrap();
        match event {
            CodexEvent::ItemStarted {
                item: CodexItem::CommandExecution { command },
            } => assert_eq!(command, "/bin/bash -lc 'ls -la'"),
            _ => panic!("Expected command_execution item"),
        }
    }

    #[test]
    fn test_parse_mcp_tool_call() {
        let event: CodexEvent = parse_json_line(
            r#"{"type":"item.started","item":{"id":"item_2","type":"mcp_tool_call","server":"fs","tool":"write_file","status":"in_progress"}}"#,
        )
        .unwrap();
        match event {
            CodexEvent::ItemStarted {
                item: CodexItem::McpToolCall { server, tool },
            } => {
                assert_eq!(server, "fs");
                assert_eq!(tool, "write_file");
            }
            _ => panic!("Expected mcp_tool_call item"),
        }
    }

    #[test]
    fn test_parse_turn_events() {
        let event: CodexEvent = parse_json_line(
            r#"{"type":"turn.completed","usage":{"input_tokens":100,"cached_input_tokens":40,"output_tokens":25}}"#,
        )
        .unwrap();
        match event {
            CodexEvent::TurnCompleted { usage } => {
                assert_eq!(usage.input_tokens, 100);
                assert_eq!(usage.output_tokens, 25);
            }
            _ => panic!("Expected TurnCompleted"),
        }

        let event: CodexEvent =
            parse_json_line(r#"{"type":"turn.failed","error":{"message":"stream disconnected"}}"#)
                .unwrap();
        match event {
            CodexEvent::TurnFailed { error } => assert_eq!(error.message, "stream disconnected"),
            _ => panic!("Expected TurnFailed"),
        }
    }

    #[test]
    fn test_unknown_kinds_are_other() {
        let event: CodexEvent = parse_json_line(r#"{"type":"turn.started"}"#).unwrap();
        assert!(matches!(event, CodexEvent::Other));

        let event: CodexEvent = parse_json_line(
            r#"{"type":"item.completed","item":{"id":"i","type":"reasoning","text":"thinking"}}"#,
        )
        .unwrap();
        assert!(matches!(
            event,
            CodexEvent::ItemCompleted {
                item: CodexItem::Other
            }
        ));
    }

    #[test]
    fn test_strip_shell_wrapper() {
        assert_eq!(strip_shell_wrapper("/bin/bash -lc 'ls -la'"), "ls -la");
        assert_eq!(strip_shell_wrapper("/usr/bin/zsh -lc \"git status\""), "git status");
        assert_eq!(strip_shell_wrapper("/usr/local/bin/sh -lc make"), "make");
        assert_eq!(
            strip_shell_wrapper("/bin/bash -lc 'echo a\necho b'"),
            "echo a\necho b"
        );
        assert_eq!(strip_shell_wrapper("cargo test"), "cargo test");
        assert_eq!(strip_shell_wrapper("bash -lc 'ls'"), "bash -lc 'ls'");
    }

    #[test]
    fn test_suppressed_mcp_tools() {
        assert!(is_suppressed_mcp_tool("read_file"));
        assert!(is_suppressed_mcp_tool("Read_File"));
        assert!(is_suppressed_mcp_tool("GLOB"));
        assert!(!is_suppressed_mcp_tool("write_file"));
    }
}
