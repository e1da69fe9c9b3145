//! Native mapper (component H): the model emits a `TOOL` node whose
//! `TOOL_ARGS` child is already well-formed JSON — just concatenate tags
//! into the message fields verbatim.

use crate::ast::{AstArena, ChatTag, NodeId};
use crate::message::{ChatMessage, ToolCall};

pub fn map_native(ast: &AstArena, roots: &[NodeId], message: &mut ChatMessage) {
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
            let mut arguments = String::new();
            let mut id_field = None;
            for &child in &node.children {
                let c = ast.node(child);
                match c.tag {
                    ChatTag::ToolName => name.push_str(&c.text),
                    ChatTag::ToolArgs => arguments.push_str(&c.text),
                    ChatTag::ToolId => id_field = Some(c.text.clone()),
                    _ => {}
                }
            }
            message.tool_calls.push(ToolCall {
                id: id_field,
                name,
                arguments,
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

    #[test]
    fn concatenates_content_and_reasoning() {
        let mut ast = AstArena::default();
        let content = ast.push(ChatTag::Content, 0, 2, "hi", vec![]);
        let reasoning = ast.push(ChatTag::Reasoning, 2, 6, "think", vec![]);
        let mut message = ChatMessage::default();
        map_native(&ast, &[content, reasoning], &mut message);
        assert_eq!(message.content, "hi");
        assert_eq!(message.reasoning_content, "think");
    }

    #[test]
    fn builds_tool_call_from_children() {
        let mut ast = AstArena::default();
        let name = ast.push(ChatTag::ToolName, 0, 3, "add", vec![]);
        let args = ast.push(ChatTag::ToolArgs, 3, 10, "{\"a\":1}", vec![]);
        let tool = ast.push(ChatTag::Tool, 0, 10, "", vec![name, args]);
        let mut message = ChatMessage::default();
        map_native(&ast, &[tool], &mut message);
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].name, "add");
        assert_eq!(message.tool_calls[0].arguments, "{\"a\":1}");
    }
}
