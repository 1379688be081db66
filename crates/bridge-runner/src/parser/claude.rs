//! Claude `stream-json` messages

use serde::Deserialize;

/// One line of `claude -p --output-format stream-json --verbose`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeMessage {
    /// Session init and other system notices
    System {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
    },

    /// Assistant turn: text, thinking and tool-use blocks
    Assistant { message: AssistantMessage },

    /// Final structured result
    Result(ResultMessage),

    /// User turns (tool results) and anything newer than this bridge
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },

    ToolUse {
        #[serde(default)]
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultMessage {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    #[serde(default)]
    pub num_turns: Option<u32>,
    #[serde(default)]
    pub usage: Usage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl ClaudeMessage {
    /// Tool-use blocks carried by this message, in order
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        let blocks: &[ContentBlock] = match self {
            Self::Assistant { message } => &message.content,
            _ => &[],
        };
        blocks.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { name, input, .. } => Some((name.as_str(), input)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_json_line;

    #[test]
    fn test_parse_system_init() {
        let msg: ClaudeMessage = parse_json_line(
            r#"{"type":"system","subtype":"init","session_id":"abc","tools":["Bash"],"model":"claude"}"#,
        )
        .unwrap();
        match msg {
            ClaudeMessage::System { subtype, session_id } => {
                assert_eq!(subtype.as_deref(), Some("init"));
                assert_eq!(session_id.as_deref(), Some("abc"));
            }
            _ => panic!("Expected System message"),
        }
    }

    #[test]
    fn test_parse_assistant_tool_uses() {
        let msg: ClaudeMessage = parse_json_line(
            r#"{"type":"assistant","message":{"id":"m1","content":[{"type":"thinking","thinking":"hmm"},{"type":"text","text":"Let me look."},{"type":"tool_use","id":"t1","name":"Bash","input":{"command":"ls"}},{"type":"tool_use","id":"t2","name":"Read","input":{"file_path":"/a"}}]},"session_id":"abc"}"#,
        )
        .unwrap();

        let tools: Vec<_> = msg.tool_uses().map(|(name, _)| name).collect();
        assert_eq!(tools, vec!["Bash", "Read"]);
    }

    #[test]
    fn test_parse_result() {
        let msg: ClaudeMessage = parse_json_line(
            r#"{"type":"result","subtype":"success","is_error":false,"result":"All done","total_cost_usd":0.0421,"num_turns":4,"usage":{"input_tokens":1200,"cache_read_input_tokens":50,"output_tokens":300}}"#,
        )
        .unwrap();
        match msg {
            ClaudeMessage::Result(result) => {
                assert_eq!(result.result.as_deref(), Some("All done"));
                assert!(!result.is_error);
                assert_eq!(result.total_cost_usd, Some(0.0421));
                assert_eq!(result.num_turns, Some(4));
                assert_eq!(result.usage.total(), 1500);
            }
            _ => panic!("Expected Result message"),
        }
    }

    #[test]
    fn test_user_and_unknown_messages_are_other() {
        let msg: ClaudeMessage = parse_json_line(
            r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"ok"}]}}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClaudeMessage::Other));

        let msg: ClaudeMessage = parse_json_line(r#"{"type":"stream_event","event":{}}"#).unwrap();
        assert!(matches!(msg, ClaudeMessage::Other));
        assert_eq!(msg.tool_uses().count(), 0);
    }
}
