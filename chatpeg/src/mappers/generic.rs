//! Generic mapper (component H): the fallback used when no format-specific
//! markers matched. Inspects a parsed top-level JSON object and dispatches
//! on whichever of `tool_calls` / `tool_call` / `response` is present; if
//! the content isn't JSON at all it's treated as plain text.

use serde_json::Value;

use crate::ast::{AstArena, ChatTag, NodeId};
use crate::message::{ChatMessage, ToolCall};

pub fn map_generic(ast: &AstArena, roots: &[NodeId], message: &mut ChatMessage) {
    for &root in roots {
        visit(ast, root, message);
    }
}

fn visit(ast: &AstArena, id: NodeId, message: &mut ChatMessage) {
    let node = ast.node(id);
    match node.tag {
        ChatTag::Reasoning => message.reasoning_content.push_str(&node.text),
        ChatTag::Content => dispatch_content(&node.text, message),
        ChatTag::Tool => {
            for &child in &node.children {
                let c = ast.node(child);
                if c.tag == ChatTag::ToolArgs {
                    dispatch_content(&c.text, message);
                }
            }
        }
        _ => {
            for &child in &node.children {
                visit(ast, child, message);
            }
        }
    }
}

fn dispatch_content(text: &str, message: &mut ChatMessage) {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        message.content.push_str(text);
        return;
    };
    let Value::Object(obj) = &value else {
        message.content.push_str(text);
        return;
    };
    if let Some(Value::Array(calls)) = obj.get("tool_calls") {
        for call in calls {
            push_tool_call(call, message);
        }
    } else if let Some(call) = obj.get("tool_call") {
        push_tool_call(call, message);
    } else if let Some(Value::String(response)) = obj.get("response") {
        message.content.push_str(response);
    } else {
        message.content.push_str(text);
    }
}

fn push_tool_call(call: &Value, message: &mut ChatMessage) {
    let Value::Object(obj) = call else { return };
    let name = obj.get("name").and_then(Value::as_str).unwrap_or("").to_string();
    let id = obj.get("id").and_then(Value::as_str).map(str::to_string);
    let arguments = obj
        .get("arguments")
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default();
    message.tool_calls.push(ToolCall { id, name, arguments });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_tool_calls_list() {
        let mut ast = AstArena::default();
        let content = ast.push(
            ChatTag::Content,
            0,
            0,
            r#"{"tool_calls": [{"name": "add", "arguments": {"a": 1}}]}"#,
            vec![],
        );
        let mut message = ChatMessage::default();
        map_generic(&ast, &[content], &mut message);
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].name, "add");
    }

    #[test]
    fn dispatches_response_string_to_content() {
        let mut ast = AstArena::default();
        let content = ast.push(ChatTag::Content, 0, 0, r#"{"response": "hi there"}"#, vec![]);
        let mut message = ChatMessage::default();
        map_generic(&ast, &[content], &mut message);
        assert_eq!(message.content, "hi there");
    }

    #[test]
    fn non_json_content_passes_through() {
        let mut ast = AstArena::default();
        let content = ast.push(ChatTag::Content, 0, 0, "just plain text", vec![]);
        let mut message = ChatMessage::default();
        map_generic(&ast, &[content], &mut message);
        assert_eq!(message.content, "just plain text");
    }
}
