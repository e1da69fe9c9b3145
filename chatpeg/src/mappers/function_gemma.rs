//! Function-Gemma mapper (component H): `name{key:<escape>value<escape>,other:123}`.
//! By the time the AST reaches this mapper the format's PEG has already told
//! apart `<escape>`-delimited strings (`TOOL_ARG_STRING_VALUE`) from raw
//! literals (`TOOL_ARG_JSON_VALUE`); rebuilding the arguments object is the
//! same shape as the constructed mapper.

use serde_json::{Map, Value};

use crate::ast::{AstArena, ChatTag, NodeId};
use crate::message::{ChatMessage, ToolCall};

pub fn map_function_gemma(ast: &AstArena, roots: &[NodeId], message: &mut ChatMessage) {
    for &root in roots {
        visit(ast, root, message);
    }
}

fn visit(ast: &AstArena, id: NodeId, message: &mut ChatMessage) {
    let node = ast.node(id);
    match node.tag {
        ChatTag::Reasoning => message.reasoning_content.push_str(&node.text),
        ChatTag::Content => message.content.push_str(&node.text),
        ChatTag::Tool => {
            let mut name = String::new();
            let mut id_field = None;
            let mut object = Map::new();
            let mut pending_key: Option<String> = None;
            for &child in &node.children {
                let c = ast.node(child);
                match c.tag {
                    ChatTag::ToolName => name.push_str(&c.text),
                    ChatTag::ToolId => id_field = Some(c.text.clone()),
                    ChatTag::ToolArgName => pending_key = Some(c.text.clone()),
                    ChatTag::ToolArgStringValue => {
                        if let Some(key) = pending_key.take() {
                            object.insert(key, Value::String(c.text.clone()));
                        }
                    }
                    ChatTag::ToolArgJsonValue => {
                        if let Some(key) = pending_key.take() {
                            let value = serde_json::from_str(&c.text).unwrap_or(Value::Null);
                            object.insert(key, value);
                        }
                    }
                    _ => {}
                }
            }
            message.tool_calls.push(ToolCall {
                id: id_field,
                name,
                arguments: Value::Object(object).to_string(),
            });
        }
        _ => {
            for &child in &node.children {
                visit(ast, child, message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mixes_escaped_string_and_raw_literal_values() {
        let mut ast = AstArena::default();
        let name = ast.push(ChatTag::ToolName, 0, 0, "lookup", vec![]);
        let key1 = ast.push(ChatTag::ToolArgName, 0, 0, "key", vec![]);
        let val1 = ast.push(ChatTag::ToolArgStringValue, 0, 0, "value", vec![]);
        let key2 = ast.push(ChatTag::ToolArgName, 0, 0, "other", vec![]);
        let val2 = ast.push(ChatTag::ToolArgJsonValue, 0, 0, "123", vec![]);
        let tool = ast.push(ChatTag::Tool, 0, 0, "", vec![name, key1, val1, key2, val2]);
        let mut message = ChatMessage::default();
        map_function_gemma(&ast, &[tool], &mut message);
        assert_eq!(message.tool_calls[0].name, "lookup");
        let parsed: serde_json::Value =
            serde_json::from_str(&message.tool_calls[0].arguments).unwrap();
        assert_eq!(parsed, json!({"key": "value", "other": 123}));
    }
}
