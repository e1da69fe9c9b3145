//! Format dispatcher (component I).
//!
//! An ordered sequence of substring probes against the chat template
//! source, first match wins, with a content-only fallback when nothing
//! matches. The probe list is data (`(marker, builder)` pairs) rather than
//! a chain of `if` statements, so the precedence is a value you can
//! inspect, not buried control flow.

use crate::ast::{AstArena, NodeId};
use crate::message::{ChatMessage, Tool};
use crate::peg::arena::{GrammarTrigger, PegArena, RuleId};
use crate::peg::eval::{evaluate, ParseOutcome};
use crate::peg::gbnf_gen::peg_to_gbnf;

pub type MapperFn = fn(&AstArena, &[NodeId], &mut ChatMessage);

/// The contract between the dispatcher and the sampler/server: everything
/// needed to prompt the model, constrain its sampling, and later parse and
/// map what it produced.
pub struct FormatDescriptor {
    pub format_tag: &'static str,
    pub arena: PegArena,
    pub root: RuleId,
    pub grammar: gbnf::Grammar,
    pub grammar_lazy: bool,
    pub grammar_triggers: Vec<GrammarTrigger>,
    pub preserved_tokens: Vec<String>,
    pub additional_stops: Vec<String>,
    pub thinking_forced_open: bool,
    pub mapper: MapperFn,
}

impl FormatDescriptor {
    /// Run this format's parser over `input` and map the result into a
    /// message. `is_partial` selects streaming vs. final-close semantics.
    pub fn parse(&self, input: &str, is_partial: bool) -> (ChatMessage, ParseOutcome) {
        let (outcome, ast) = evaluate(&self.arena, input, is_partial);
        let mut message = ChatMessage::default();
        (self.mapper)(&ast, ast.roots(), &mut message);
        (message, outcome)
    }
}

type Builder = fn(&[Tool]) -> FormatDescriptor;

/// One `(marker, builder)` entry; `marker` is a literal substring probed
/// against the chat template source, in priority order (a more specific
/// marker must be checked before a more general one when two templates
/// could share a substring).
pub struct DispatcherConfig {
    pub rules: Vec<(&'static str, Builder)>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                ("<｜tool▁calls▁begin｜>", crate::formats::deepseek_r1::build as Builder),
                ("<|channel|>", crate::formats::gpt_oss::build as Builder),
                ("<arg_key>", crate::formats::glm45::build as Builder),
                ("<tool_call>", crate::formats::hermes2pro::build as Builder),
            ],
        }
    }
}

pub struct Dispatcher {
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self { config }
    }

    /// Select a format by probing `template_source` against the configured
    /// marker list, first match wins. Falls back to the generic
    /// content-only format when nothing matches (recognizing no format is
    /// not an error condition).
    pub fn select(&self, template_source: &str, tools: &[Tool]) -> FormatDescriptor {
        for (marker, build) in &self.config.rules {
            if template_source.contains(marker) {
                return build(tools);
            }
        }
        crate::formats::generic_format::build(tools)
    }
}

/// Convenience one-shot: detect the format from `template_source`, build its
/// descriptor, run it against `input`, and map the result.
pub fn dispatch(
    template_source: &str,
    tools: &[Tool],
    input: &str,
    is_partial: bool,
) -> (ChatMessage, ParseOutcome) {
    let dispatcher = Dispatcher::new(DispatcherConfig::default());
    let descriptor = dispatcher.select(template_source, tools);
    descriptor.parse(input, is_partial)
}

/// Attach the GBNF rendering for `arena` onto a descriptor under
/// construction; shared by every `formats::*::build`.
pub(crate) fn render_grammar(arena: &PegArena) -> gbnf::Grammar {
    peg_to_gbnf(arena)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_deepseek_on_marker() {
        let dispatcher = Dispatcher::new(DispatcherConfig::default());
        let descriptor = dispatcher.select("...<｜tool▁calls▁begin｜>...", &[]);
        assert_eq!(descriptor.format_tag, "deepseek-r1");
    }

    #[test]
    fn falls_back_to_generic_on_no_marker() {
        let dispatcher = Dispatcher::new(DispatcherConfig::default());
        let descriptor = dispatcher.select("no markers here", &[]);
        assert_eq!(descriptor.format_tag, "generic");
    }
}
