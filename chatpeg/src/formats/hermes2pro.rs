//! Hermes-2-Pro format descriptor, grounded in
//! `original_source/common/chat-parsers/hermes-2-pro.cpp`'s three
//! interchangeable tool-call spellings:
//! - `<tool_call>{"name":"f","arguments":{...}}</tool_call>`
//! - `<function=f>{...}</function>`
//! - `<function name="f">{...}</function>`
//!
//! The original builds one literal-name rule per registered tool (so the
//! sampler can only ever emit a known name); here the name is captured
//! generically instead, since the dispatcher's job is recognizing whichever
//! of the three spellings the model used, not steering generation — the
//! `tools` list is accepted for signature parity with the other
//! descriptors but unused.

use crate::ast::ChatTag;
use crate::dispatcher::{render_grammar, FormatDescriptor};
use crate::mappers::map_native;
use crate::message::Tool;
use crate::peg::arena::{ExprId, PegBuilder};

fn think_block(b: &mut PegBuilder) -> ExprId {
    let open = b.literal("<think>");
    let reasoning = {
        let u = b.until(vec!["</think>".to_string()]);
        b.tag(ChatTag::Reasoning, u)
    };
    let close = b.literal("</think>");
    let block = b.sequence(vec![open, reasoning, close]);
    b.optional(block)
}

fn native_variant(b: &mut PegBuilder) -> ExprId {
    let open = {
        let lit = b.literal("<tool_call>");
        b.atomic_tag(ChatTag::ToolOpen, lit)
    };
    let sp1 = b.space();
    let brace_open = b.literal("{");
    let sp2 = b.space();
    let name_key = b.literal("\"name\"");
    let sp3 = b.space();
    let colon1 = b.literal(":");
    let sp4 = b.space();
    let quote1 = b.literal("\"");
    let name = {
        let u = b.until(vec!["\"".to_string()]);
        b.tag(ChatTag::ToolName, u)
    };
    let quote2 = b.literal("\"");
    let sp5 = b.space();
    let comma = b.literal(",");
    let sp6 = b.space();
    let args_key = b.literal("\"arguments\"");
    let sp7 = b.space();
    let colon2 = b.literal(":");
    let sp8 = b.space();
    let args = {
        let j = b.json();
        b.tag(ChatTag::ToolArgs, j)
    };
    let sp9 = b.space();
    let brace_close = b.literal("}");
    let sp10 = b.space();
    let close = {
        let lit = b.literal("</tool_call>");
        b.atomic_tag(ChatTag::ToolClose, lit)
    };
    let seq = b.sequence(vec![
        open, sp1, brace_open, sp2, name_key, sp3, colon1, sp4, quote1, name, quote2, sp5, comma, sp6, args_key,
        sp7, colon2, sp8, args, sp9, brace_close, sp10, close,
    ]);
    b.tag(ChatTag::Tool, seq)
}

fn function_eq_variant(b: &mut PegBuilder) -> ExprId {
    let open_lit = b.literal("<function=");
    let open = b.atomic_tag(ChatTag::ToolOpen, open_lit);
    let name = {
        let u = b.until(vec![">".to_string()]);
        b.tag(ChatTag::ToolName, u)
    };
    let angle = b.literal(">");
    let sp1 = b.space();
    let args = {
        let j = b.json();
        b.tag(ChatTag::ToolArgs, j)
    };
    let sp2 = b.space();
    let close = {
        let lit = b.literal("</function>");
        b.atomic_tag(ChatTag::ToolClose, lit)
    };
    let seq = b.sequence(vec![open, name, angle, sp1, args, sp2, close]);
    b.tag(ChatTag::Tool, seq)
}

fn function_name_variant(b: &mut PegBuilder) -> ExprId {
    let open_lit = b.literal("<function");
    let sp0 = b.space();
    let name_eq = b.literal("name=\"");
    let open = {
        let seq = b.sequence(vec![open_lit, sp0, name_eq]);
        b.atomic_tag(ChatTag::ToolOpen, seq)
    };
    let name = {
        let u = b.until(vec!["\"".to_string()]);
        b.tag(ChatTag::ToolName, u)
    };
    let close_quote_angle = b.literal("\">");
    let sp1 = b.space();
    let args = {
        let j = b.json();
        b.tag(ChatTag::ToolArgs, j)
    };
    let sp2 = b.space();
    let close = {
        let lit = b.literal("</function>");
        b.atomic_tag(ChatTag::ToolClose, lit)
    };
    let seq = b.sequence(vec![open, name, close_quote_angle, sp1, args, sp2, close]);
    b.tag(ChatTag::Tool, seq)
}

pub fn build(_tools: &[Tool]) -> FormatDescriptor {
    let mut b = PegBuilder::new();

    let reasoning = think_block(&mut b);

    let native = native_variant(&mut b);
    let func_eq = function_eq_variant(&mut b);
    let func_name = function_name_variant(&mut b);
    let one_call = b.choice(vec![native, func_eq, func_name]);
    let tool_calls = b.repeat(one_call, 1, None);

    let content = {
        let rest = b.rest();
        b.tag(ChatTag::Content, rest)
    };
    let body = b.choice(vec![tool_calls, content]);

    let root_body = b.sequence(vec![reasoning, body]);
    let root = b.rule("hermes-2-pro-root", root_body).unwrap();
    b.set_root(root);
    let arena = b.build().expect("hermes-2-pro grammar is well-formed");
    let grammar = render_grammar(&arena);

    FormatDescriptor {
        format_tag: "hermes-2-pro",
        arena,
        root,
        grammar,
        grammar_lazy: false,
        grammar_triggers: vec![],
        preserved_tokens: vec![
            "<think>".to_string(),
            "</think>".to_string(),
            "<tool_call>".to_string(),
            "</tool_call>".to_string(),
            "<function".to_string(),
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
    fn all_three_spellings_yield_the_same_tool_call() {
        let descriptor = build(&[]);
        let inputs = [
            r#"<tool_call>{"name":"f","arguments":{}}</tool_call>"#,
            r#"<function=f>{}</function>"#,
            r#"<function name="f">{}</function>"#,
        ];
        for input in inputs {
            let (message, outcome) = descriptor.parse(input, false);
            assert!(outcome.is_full(), "failed on {input}");
            assert_eq!(message.tool_calls.len(), 1, "failed on {input}");
            assert_eq!(message.tool_calls[0].name, "f");
            assert_eq!(message.tool_calls[0].arguments, "{}");
        }
    }
}
