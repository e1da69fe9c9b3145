//! OAI-array mapper (component H): `[{"name": ..., "arguments": ..., "id": ...}, ...]`
//! carried in a single `TOOL_ARGS` slot.

use serde_json::Value;

use crate::ast::{AstArena, ChatTag, NodeId};
use crate::message::{ChatMessage, ToolCall};

pub fn map_oai_array(ast: &AstArena, roots: &[NodeId], message: &mut ChatMessage) {
    for &root in roots {
        visit(ast, root, message, field_names());
    }
}

fn field_names() -> (&'static str, &'static str, &'static str) {
    ("id", "name", "arguments")
}

fn visit(
    ast: &AstArena,
    id: NodeId,
    message: &mut ChatMessage,
    fields: (&'static str, &'static str, &'static str),
) {
    let node = ast.node(id);
    match node.tag {
        ChatTag::Reasoning => message.reasoning_content.push_str(&node.text),
        ChatTag::Content => message.content.push_str(&node.text),
        ChatTag::Tool => {
            for &child in &node.children {
                let c = ast.node(child);
                if c.tag == ChatTag::ToolArgs {
                    expand_blob(&c.text, message, fields);
                }
            }
        }
        _ => {
            for &child in &node.children {
                visit(ast, child, message, fields);
            }
        }
    }
}

pub(crate) fn expand_blob(
    text: &str,
    message: &mut ChatMessage,
    (id_field, name_field, args_field): (&str, &str, &str),
) {
    let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(text) else {
        return;
    };
    for entry in entries {
        let Value::Object(obj) = entry else { continue };
        let name = obj.get(name_field).and_then(Value::as_str).unwrap_or("").to_string();
        let id = obj.get(id_field).and_then(Value::as_str).map(str::to_string);
        let arguments = obj
            .get(args_field)
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        message.tool_calls.push(ToolCall { id, name, arguments });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_oai_style_array() {
        let mut ast = AstArena::default();
        let args = ast.push(
            ChatTag::ToolArgs,
            0,
            0,
            r#"[{"name": "add", "arguments": {"a": 1}, "id": "call_1"}]"#,
            vec![],
        );
        let tool = ast.push(ChatTag::Tool, 0, 0, "", vec![args]);
        let mut message = ChatMessage::default();
        map_oai_array(&ast, &[tool], &mut message);
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].name, "add");
        assert_eq!(message.tool_calls[0].id.as_deref(), Some("call_1"));
    }
}
