//! Generic content-only fallback, grounded in
//! `original_source/common/chat-parsers/generic.cpp`: used when the
//! dispatcher recognizes no format-specific markers. The whole output is
//! captured as one `CONTENT` span and handed to the generic mapper, which
//! inspects it as JSON and dispatches on `tool_calls` / `tool_call` /
//! `response`, falling back to plain text.

use crate::ast::ChatTag;
use crate::dispatcher::{render_grammar, FormatDescriptor};
use crate::mappers::map_generic;
use crate::message::Tool;
use crate::peg::arena::PegBuilder;

pub fn build(_tools: &[Tool]) -> FormatDescriptor {
    let mut b = PegBuilder::new();
    let rest = b.rest();
    let content = b.tag(ChatTag::Content, rest);
    let root = b.rule("generic-root", content).unwrap();
    b.set_root(root);
    let arena = b.build().expect("generic grammar is well-formed");
    let grammar = render_grammar(&arena);

    FormatDescriptor {
        format_tag: "generic",
        arena,
        root,
        grammar,
        grammar_lazy: false,
        grammar_triggers: vec![],
        preserved_tokens: vec![],
        additional_stops: vec![],
        thinking_forced_open: false,
        mapper: map_generic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_string_becomes_content() {
        let descriptor = build(&[]);
        let (message, outcome) = descriptor.parse(r#"{"response":"hi"}"#, false);
        assert!(outcome.is_full());
        assert_eq!(message.content, "hi");
    }

    #[test]
    fn tool_calls_list_is_expanded() {
        let descriptor = build(&[]);
        let input = r#"{"tool_calls":[{"name":"x","arguments":{"q":1}}]}"#;
        let (message, outcome) = descriptor.parse(input, false);
        assert!(outcome.is_full());
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].name, "x");
    }
}
