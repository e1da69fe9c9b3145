//! Short-form mapper (component H): `[{"func_name": {"arg1": value1}}]` —
//! the whole call list arrives as one JSON blob in a single `TOOL_ARGS`
//! slot; each outer-array element's lone key is the tool name, its value
//! the arguments object.

use serde_json::Value;

use crate::ast::{AstArena, ChatTag, NodeId};
use crate::message::{ChatMessage, ToolCall};

pub fn map_short_form(ast: &AstArena, roots: &[NodeId], message: &mut ChatMessage) {
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
            for &child in &node.children {
                let c = ast.node(child);
                if c.tag == ChatTag::ToolArgs {
                    expand_blob(&c.text, message);
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

fn expand_blob(text: &str, message: &mut ChatMessage) {
    let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(text) else {
        return;
    };
    for entry in entries {
        let Value::Object(obj) = entry else { continue };
        for (name, arguments) in obj {
            message.tool_calls.push(ToolCall {
                id: None,
                name,
                arguments: arguments.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_one_entry_per_array_element() {
        let mut ast = AstArena::default();
        let args = ast.push(
            ChatTag::ToolArgs,
            0,
            0,
            r#"[{"add": {"a": 1}}, {"sub": {"b": 2}}]"#,
            vec![],
        );
        let tool = ast.push(ChatTag::Tool, 0, 0, "", vec![args]);
        let mut message = ChatMessage::default();
        map_short_form(&ast, &[tool], &mut message);
        assert_eq!(message.tool_calls.len(), 2);
        assert_eq!(message.tool_calls[0].name, "add");
        assert_eq!(message.tool_calls[1].name, "sub");
    }
}
