//! Tool-use classification and argument summaries

use serde_json::Value;

use crate::error::truncate_chars;

/// Characters of a shell command kept in a summary
pub const COMMAND_SUMMARY_CHARS: usize = 120;

/// Argument keys that name files, in priority order
const FILE_KEYS: [&str; 3] = ["file_path", "path", "notebook_path"];

/// Read-only or internal tools that never reach the host
const SUPPRESSED_TOOLS: [&str; 10] = [
    "Read",
    "Glob",
    "Grep",
    "LS",
    "WebFetch",
    "TodoWrite",
    "TodoRead",
    "Task",
    "TaskOutput",
    "Skill",
];

/// What a tool invocation is, as far as forwarding is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Write,
    Edit,
    Bash,
    WebSearch,
    NotebookEdit,
    /// Read-only or internal; dropped silently
    Suppressed,
    /// Anything unrecognized; forwarded
    Other,
}

impl ToolKind {
    /// Classify a base tool name
    pub fn from_name(base_name: &str) -> Self {
        match base_name {
            "Write" => Self::Write,
            "Edit" => Self::Edit,
            "Bash" => Self::Bash,
            "WebSearch" => Self::WebSearch,
            "NotebookEdit" => Self::NotebookEdit,
            name if SUPPRESSED_TOOLS.contains(&name) => Self::Suppressed,
            _ => Self::Other,
        }
    }

    pub fn is_forwarded(&self) -> bool {
        !matches!(self, Self::Suppressed)
    }
}

/// Strip a trailing parenthetical hint: `Bash(git *)` becomes `Bash`
pub fn base_name(name: &str) -> &str {
    let name = name.trim();
    if !name.ends_with(')') {
        return name;
    }
    match name.find('(') {
        Some(idx) => name[..idx].trim_end(),
        None => name,
    }
}

/// Short human-readable description of a tool's arguments
pub fn summarize(kind: ToolKind, input: &Value) -> String {
    match kind {
        ToolKind::Write | ToolKind::Edit => format!("file_path={}", str_arg(input, "file_path")),
        ToolKind::Bash => command_summary(str_arg(input, "command")),
        ToolKind::WebSearch => format!("query={}", str_arg(input, "query")),
        ToolKind::NotebookEdit => format!("notebook_path={}", str_arg(input, "notebook_path")),
        ToolKind::Suppressed | ToolKind::Other => input
            .as_object()
            .map(|args| {
                args.keys()
                    .take(3)
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default(),
    }
}

/// `command=` plus the command cut to [`COMMAND_SUMMARY_CHARS`]
pub fn command_summary(command: &str) -> String {
    format!("command={}", truncate_chars(command, COMMAND_SUMMARY_CHARS))
}

/// Non-empty string values of the file-naming keys
pub fn extract_files(input: &Value) -> Vec<String> {
    FILE_KEYS
        .iter()
        .filter_map(|key| input.get(*key).and_then(Value::as_str))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn str_arg<'a>(input: &'a Value, key: &str) -> &'a str {
    input.get(key).and_then(Value::as_str).unwrap_or_default()
}
