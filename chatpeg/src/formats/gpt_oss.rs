//! GPT-OSS format descriptor, grounded in
//! `original_source/common/chat-parsers/gpt-oss.cpp`'s channel-based
//! messaging: `<|channel|>analysis<|message|>...<|end|>` carries reasoning,
//! `<|channel|>final<|message|>...<|end|>` carries content, and
//! `<|channel|>commentary to=functions.NAME<|message|>{ARGS}<|end|>` carries
//! a tool call. The original builds one literal-name rule per registered
//! tool plus a role-prefixed alternate spelling and a `<|constrain|>json`
//! hint; this keeps the channel-form tool call with a generically captured
//! name (same simplification as the Hermes-2-Pro descriptor) and omits the
//! role-prefixed spelling, which the testable scenarios never exercise.

use crate::ast::ChatTag;
use crate::dispatcher::{render_grammar, FormatDescriptor};
use crate::mappers::map_native;
use crate::message::Tool;
use crate::peg::arena::PegBuilder;

pub fn build(_tools: &[Tool]) -> FormatDescriptor {
    let mut b = PegBuilder::new();

    let assistant_prefix = {
        let start = b.literal("<|start|>");
        let role = b.literal("assistant");
        let seq = b.sequence(vec![start, role]);
        b.optional(seq)
    };

    let reasoning_block = {
        let channel = b.literal("<|channel|>");
        let analysis = b.literal("analysis");
        let message = b.literal("<|message|>");
        let reasoning = {
            let u = b.until(vec!["<|end|>".to_string()]);
            b.tag(ChatTag::Reasoning, u)
        };
        let end = b.literal("<|end|>");
        let seq = b.sequence(vec![channel, analysis, message, reasoning, end]);
        b.optional(seq)
    };

    let tool_call = {
        let channel = b.literal("<|channel|>");
        let commentary = b.literal("commentary");
        let to_open = {
            let lit = b.literal(" to=functions.");
            b.atomic_tag(ChatTag::ToolOpen, lit)
        };
        let name = {
            let u = b.until(vec!["<|message|>".to_string()]);
            b.tag(ChatTag::ToolName, u)
        };
        let message = b.literal("<|message|>");
        let args = {
            let j = b.json();
            b.tag(ChatTag::ToolArgs, j)
        };
        let close = {
            let lit = b.literal("<|end|>");
            b.atomic_tag(ChatTag::ToolClose, lit)
        };
        let seq = b.sequence(vec![channel, commentary, to_open, name, message, args, close]);
        b.tag(ChatTag::Tool, seq)
    };
    let tool_calls = b.repeat(tool_call, 1, None);

    let final_content = {
        let channel = b.literal("<|channel|>");
        let final_kw = b.literal("final");
        let message = b.literal("<|message|>");
        let content = {
            let u = b.until(vec!["<|end|>".to_string()]);
            b.tag(ChatTag::Content, u)
        };
        let end = b.literal("<|end|>");
        b.sequence(vec![channel, final_kw, message, content, end])
    };

    let body = b.choice(vec![tool_calls, final_content]);
    let root_body = b.sequence(vec![reasoning_block, assistant_prefix, body]);
    let root = b.rule("gpt-oss-root", root_body).unwrap();
    b.set_root(root);
    let arena = b.build().expect("gpt-oss grammar is well-formed");
    let grammar = render_grammar(&arena);

    FormatDescriptor {
        format_tag: "gpt-oss",
        arena,
        root,
        grammar,
        grammar_lazy: false,
        grammar_triggers: vec![],
        preserved_tokens: vec![
            "<|channel|>".to_string(),
            "<|constrain|>".to_string(),
            "<|message|>".to_string(),
            "<|start|>".to_string(),
            "<|end|>".to_string(),
        ],
        additional_stops: vec![],
        thinking_forced_open: false,
        mapper: map_native,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_analysis_and_final_channels() {
        let descriptor = build(&[]);
        let input = "<|channel|>analysis<|message|>thinking<|end|><|start|>assistant<|channel|>final<|message|>Hello<|end|>";
        let (message, outcome) = descriptor.parse(input, false);
        assert!(outcome.is_full());
        assert_eq!(message.reasoning_content, "thinking");
        assert_eq!(message.content, "Hello");
        assert!(message.tool_calls.is_empty());
    }

    #[test]
    fn parses_commentary_tool_call() {
        let descriptor = build(&[]);
        let input = "<|channel|>commentary to=functions.add<|message|>{\"a\":1}<|end|>";
        let (message, outcome) = descriptor.parse(input, false);
        assert!(outcome.is_full());
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].name, "add");
    }
}
