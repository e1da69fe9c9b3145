//! Constructed mapper (component H): the model emits `<parameter=k>v</parameter>`
//! pairs instead of JSON directly — rebuild the JSON object from
//! `TOOL_ARG_NAME`/`TOOL_ARG_STRING_VALUE`/`TOOL_ARG_JSON_VALUE` children.

use serde_json::{Map, Value};

use crate::ast::{AstArena, ChatTag, NodeId};
use crate::message::{ChatMessage, ToolCall};

pub fn map_constructed(ast: &AstArena, roots: &[NodeId], message: &mut ChatMessage) {
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
    fn rebuilds_object_from_parameter_pairs() {
        let mut ast = AstArena::default();
        let name = ast.push(ChatTag::ToolName, 0, 0, "add", vec![]);
        let key = ast.push(ChatTag::ToolArgName, 0, 0, "x", vec![]);
        let value = ast.push(ChatTag::ToolArgStringValue, 0, 0, "5", vec![]);
        let tool = ast.push(ChatTag::Tool, 0, 0, "", vec![name, key, value]);
        let mut message = ChatMessage::default();
        map_constructed(&ast, &[tool], &mut message);
        let parsed: serde_json::Value =
            serde_json::from_str(&message.tool_calls[0].arguments).unwrap();
        assert_eq!(parsed, json!({"x": "5"}));
    }

    #[test]
    fn json_value_child_is_parsed_not_stringified() {
        let mut ast = AstArena::default();
        let key = ast.push(ChatTag::ToolArgName, 0, 0, "n", vec![]);
        let value = ast.push(ChatTag::ToolArgJsonValue, 0, 0, "42", vec![]);
        let tool = ast.push(ChatTag::Tool, 0, 0, "", vec![key, value]);
        let mut message = ChatMessage::default();
        map_constructed(&ast, &[tool], &mut message);
        let parsed: serde_json::Value =
            serde_json::from_str(&message.tool_calls[0].arguments).unwrap();
        assert_eq!(parsed, json!({"n": 42}));
    }
}
