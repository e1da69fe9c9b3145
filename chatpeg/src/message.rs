//! The mapper output (chat message) and the `Tool` declaration type mappers
//! and the dispatcher both need: `name`, `description`, `json_schema`,
//! `arguments` — no executable callback field, since this library parses
//! tool calls, it doesn't execute them.

use serde::{Deserialize, Serialize};

/// A tool the model was offered, described well enough to build a prompt
/// and a constrained grammar from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub json_schema: serde_json::Value,
}

/// One structured function invocation extracted from model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: Option<String>,
    pub name: String,
    /// Arguments, serialized as a JSON object string (not a parsed
    /// `Value`) so streaming callers can stream a growing string directly.
    pub arguments: String,
}

/// The mapper output: a structured assistant turn split into its three
/// orthogonal channels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub reasoning_content: String,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatMessage {
    pub const ROLE: &'static str = "assistant";
}
