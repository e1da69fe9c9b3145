//! DeepSeek-R1 format descriptor, grounded in
//! `original_source/common/chat-parsers/deepseek-r1.cpp`: an optional
//! `<think>...</think>` reasoning block, plain content, then an optional
//! `<｜tool▁calls▁begin｜>...<｜tool▁calls▁end｜>` block wrapping one or more
//! `<｜tool▁call▁begin｜>function<｜tool▁sep｜>NAME\n```json\nARGS\n```<｜tool▁call▁end｜>`
//! entries. Tool args already arrive as JSON, so the native mapper applies
//! directly.

use crate::ast::ChatTag;
use crate::dispatcher::{render_grammar, FormatDescriptor};
use crate::mappers::map_native;
use crate::message::Tool;
use crate::peg::arena::PegBuilder;

const TOOL_CALLS_BEGIN: &str = "<｜tool▁calls▁begin｜>";
const TOOL_CALLS_END: &str = "<｜tool▁calls▁end｜>";
const TOOL_CALL_BEGIN: &str = "<｜tool▁call▁begin｜>";
const TOOL_CALL_END: &str = "<｜tool▁call▁end｜>";
const TOOL_SEP: &str = "<｜tool▁sep｜>";

pub fn build(_tools: &[Tool]) -> FormatDescriptor {
    let mut b = PegBuilder::new();

    let think_open = b.literal("<think>");
    let reasoning = b.tag(ChatTag::Reasoning, {
        let u = b.until(vec!["</think>".to_string()]);
        u
    });
    let think_close = b.literal("</think>");
    let think_block = b.sequence(vec![think_open, reasoning, think_close]);
    let think_block = b.optional(think_block);

    let content = {
        let u = b.until_one_of(vec![TOOL_CALLS_BEGIN.to_string()]);
        b.tag(ChatTag::Content, u)
    };

    let tool_name = {
        let u = b.until(vec!["\n".to_string()]);
        b.tag(ChatTag::ToolName, u)
    };
    let tool_args = {
        let u = b.until(vec!["\n```".to_string()]);
        b.tag(ChatTag::ToolArgs, u)
    };

    let one_call = {
        let open = b.literal(TOOL_CALL_BEGIN);
        let function_kw = b.literal("function");
        let sep = b.literal(TOOL_SEP);
        let fence_open = b.literal("\n```json\n");
        let fence_close = b.literal("\n```");
        let close = b.literal(TOOL_CALL_END);
        let seq = b.sequence(vec![open, function_kw, sep, tool_name, fence_open, tool_args, fence_close, close]);
        b.tag(ChatTag::Tool, seq)
    };
    let calls_begin = b.literal(TOOL_CALLS_BEGIN);
    let calls_end = b.literal(TOOL_CALLS_END);
    let repeated_calls = b.repeat(one_call, 1, None);
    let tool_calls_block = b.sequence(vec![calls_begin, repeated_calls, calls_end]);
    let tool_calls_block = b.optional(tool_calls_block);

    let root_body = b.sequence(vec![think_block, content, tool_calls_block]);
    let root = b.rule("deepseek-r1-root", root_body).unwrap();
    b.set_root(root);
    let arena = b.build().expect("deepseek-r1 grammar is well-formed");
    let grammar = render_grammar(&arena);

    FormatDescriptor {
        format_tag: "deepseek-r1",
        arena,
        root,
        grammar,
        grammar_lazy: false,
        grammar_triggers: vec![],
        preserved_tokens: vec![
            TOOL_CALLS_BEGIN.to_string(),
            TOOL_CALLS_END.to_string(),
            TOOL_CALL_BEGIN.to_string(),
            TOOL_CALL_END.to_string(),
            TOOL_SEP.to_string(),
        ],
        additional_stops: vec![],
        thinking_forced_open: false,
        mapper: map_native,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peg::eval::{evaluate, ParseOutcome};

    #[test]
    fn parses_reasoning_content_and_tool_call() {
        let descriptor = build(&[]);
        let input = "<think>let me think</think>OK<｜tool▁calls▁begin｜><｜tool▁call▁begin｜>function<｜tool▁sep｜>add\n```json\n{\"a\":1,\"b\":2}\n```<｜tool▁call▁end｜><｜tool▁calls▁end｜>";
        let (message, outcome) = descriptor.parse(input, false);
        assert!(outcome.is_full());
        assert_eq!(message.reasoning_content, "let me think");
        assert_eq!(message.content, "OK");
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].name, "add");
        assert_eq!(message.tool_calls[0].arguments, "{\"a\":1,\"b\":2}");
    }

    #[test]
    fn partial_truncation_inside_reasoning_opens_no_tool_call() {
        let descriptor = build(&[]);
        let (message, outcome) = descriptor.parse("<think>let me th", true);
        assert!(matches!(outcome, ParseOutcome::Partial { .. }));
        assert_eq!(message.reasoning_content, "let me th");
        assert_eq!(message.content, "");
        assert!(message.tool_calls.is_empty());
    }

    #[test]
    fn content_only_with_no_tool_calls() {
        let descriptor = build(&[]);
        let (message, outcome) = descriptor.parse("just an answer", false);
        assert!(outcome.is_full());
        assert_eq!(message.content, "just an answer");
        assert!(message.tool_calls.is_empty());
    }
}
