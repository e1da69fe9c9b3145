//! Command-R7B mapper (component H): same shape as the OAI-array mapper,
//! `tool_call_id` / `tool_name` / `parameters` field names instead.

use crate::ast::{AstArena, ChatTag, NodeId};
use crate::mappers::oai_array;
use crate::message::ChatMessage;

pub fn map_command_r7b(ast: &AstArena, roots: &[NodeId], message: &mut ChatMessage) {
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
                    oai_array::expand_blob(&c.text, message, ("tool_call_id", "tool_name", "parameters"));
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_command_r7b_style_array() {
        let mut ast = AstArena::default();
        let args = ast.push(
            ChatTag::ToolArgs,
            0,
            0,
            r#"[{"tool_name": "add", "parameters": {"a": 1}, "tool_call_id": "c1"}]"#,
            vec![],
        );
        let tool = ast.push(ChatTag::Tool, 0, 0, "", vec![args]);
        let mut message = ChatMessage::default();
        map_command_r7b(&ast, &[tool], &mut message);
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].name, "add");
        assert_eq!(message.tool_calls[0].id.as_deref(), Some("c1"));
    }
}
