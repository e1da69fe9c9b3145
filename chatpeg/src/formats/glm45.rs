//! GLM-4.5 XML-style format descriptor, grounded in
//! `original_source/common/chat-parsers/glm-4-5.cpp`: an optional
//! `<think>...</think>` block, then zero or more
//! `<tool_call>NAME\n<arg_key>K</arg_key>\n<arg_value>V</arg_value>\n...</tool_call>`
//! blocks. Arguments arrive as a sequence of key/value pairs rather than
//! JSON, so the constructed mapper rebuilds the JSON object.

use crate::ast::ChatTag;
use crate::dispatcher::{render_grammar, FormatDescriptor};
use crate::mappers::map_constructed;
use crate::message::Tool;
use crate::peg::arena::PegBuilder;

const TOOL_CALL_OPEN: &str = "<tool_call>";
const TOOL_CALL_CLOSE: &str = "</tool_call>";

pub fn build(_tools: &[Tool]) -> FormatDescriptor {
    let mut b = PegBuilder::new();

    let think_open = b.literal("<think>");
    let reasoning = {
        let u = b.until(vec!["</think>".to_string()]);
        b.tag(ChatTag::Reasoning, u)
    };
    let think_close = b.literal("</think>");
    let think_block = b.sequence(vec![think_open, reasoning, think_close]);
    let think_block = b.optional(think_block);

    let content = {
        let u = b.until_one_of(vec![TOOL_CALL_OPEN.to_string()]);
        b.tag(ChatTag::Content, u)
    };

    let arg_pair = {
        let key_open = b.literal("<arg_key>");
        let key = {
            let u = b.until(vec!["</arg_key>".to_string()]);
            b.tag(ChatTag::ToolArgName, u)
        };
        let mid = b.literal("</arg_key>\n<arg_value>");
        let value = {
            let u = b.until(vec!["</arg_value>".to_string()]);
            b.tag(ChatTag::ToolArgStringValue, u)
        };
        let tail = b.literal("</arg_value>\n");
        b.sequence(vec![key_open, key, mid, value, tail])
    };

    let tool_name = {
        let u = b.until(vec!["\n".to_string()]);
        b.tag(ChatTag::ToolName, u)
    };

    let one_call = {
        let open = b.literal(TOOL_CALL_OPEN);
        let newline = b.literal("\n");
        let pairs = b.repeat(arg_pair, 0, None);
        let close = b.literal(TOOL_CALL_CLOSE);
        let seq = b.sequence(vec![open, tool_name, newline, pairs, close]);
        b.tag(ChatTag::Tool, seq)
    };
    let tool_calls = b.repeat(one_call, 0, None);

    let root_body = b.sequence(vec![think_block, content, tool_calls]);
    let root = b.rule("glm-4-5-root", root_body).unwrap();
    b.set_root(root);
    let arena = b.build().expect("glm-4.5 grammar is well-formed");
    let grammar = render_grammar(&arena);

    FormatDescriptor {
        format_tag: "glm-4.5",
        arena,
        root,
        grammar,
        grammar_lazy: false,
        grammar_triggers: vec![],
        preserved_tokens: vec![
            "<tool_call>".to_string(),
            "</tool_call>".to_string(),
            "<arg_key>".to_string(),
            "</arg_key>".to_string(),
            "<arg_value>".to_string(),
            "</arg_value>".to_string(),
        ],
        additional_stops: vec![],
        thinking_forced_open: false,
        mapper: map_constructed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_xml_style_args_into_json_object() {
        let descriptor = build(&[]);
        let input = "<tool_call>add\n<arg_key>a</arg_key>\n<arg_value>1</arg_value>\n<arg_key>b</arg_key>\n<arg_value>2</arg_value>\n</tool_call>";
        let (message, outcome) = descriptor.parse(input, false);
        assert!(outcome.is_full());
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].name, "add");
        let parsed: serde_json::Value = serde_json::from_str(&message.tool_calls[0].arguments).unwrap();
        assert_eq!(parsed, serde_json::json!({"a": "1", "b": "2"}));
    }
}
