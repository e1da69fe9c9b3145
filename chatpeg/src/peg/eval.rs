//! PEG evaluator (component C).
//!
//! Single-threaded recursive descent with packrat memoization on named
//! rules only, keyed on `(RuleId, position)` via an `ahash`-backed map.
//! Produces a `ParseOutcome` plus a freshly populated `AstArena` per call;
//! nothing is retained across calls.

use ahash::AHashMap;
use tracing::trace;

use crate::ast::{AstArena, ChatTag, NodeId};
use crate::json_partial::{self, JsonOutcome};
use crate::peg::arena::{Expr, ExprId, PegArena, RuleId};
use crate::regex_partial::{MatchKind, PartialRegex};

/// The result of evaluating a grammar against an input string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Full { consumed: usize },
    Partial { consumed: usize, expected: Vec<String> },
    Failed { at: usize, expected: Vec<String> },
}

impl ParseOutcome {
    pub fn is_full(&self) -> bool {
        matches!(self, ParseOutcome::Full { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ParseOutcome::Failed { .. })
    }
}

/// Internal result, carried during recursive evaluation, distinct from
/// `ParseOutcome` only in that it never appears as the top-level public
/// return value directly (the public `evaluate` wraps the root result).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepResult {
    Full(usize),
    Partial(usize),
    Failed(usize),
}

struct Evaluator<'a> {
    arena: &'a PegArena,
    input: &'a str,
    is_partial_allowed: bool,
    /// Keyed on `(rule, position)`; caches both the step result and the
    /// subtree of AST nodes that rule produced, so a memo hit can re-attach
    /// the same tags instead of silently dropping them.
    memo: AHashMap<(RuleId, usize), (StepResult, Vec<NodeId>)>,
    ast: AstArena,
}

/// Evaluate `arena`'s root rule against `input`. When `is_partial` is true,
/// a parse that runs off the end of the input mid-expression is reported as
/// `Partial` rather than `Failed`.
pub fn evaluate(arena: &PegArena, input: &str, is_partial: bool) -> (ParseOutcome, AstArena) {
    let root = match arena.root() {
        Some(r) => r,
        None => return (ParseOutcome::Failed { at: 0, expected: vec![] }, AstArena::default()),
    };

    let mut ev = Evaluator {
        arena,
        input,
        is_partial_allowed: is_partial,
        memo: AHashMap::new(),
        ast: AstArena::default(),
    };

    let result = ev.eval_rule(root, 0);
    let outcome = match result {
        StepResult::Full(pos) => ParseOutcome::Full { consumed: pos },
        StepResult::Partial(pos) => ParseOutcome::Partial {
            consumed: pos,
            expected: Vec::new(),
        },
        StepResult::Failed(pos) => ParseOutcome::Failed {
            at: pos,
            expected: Vec::new(),
        },
    };
    (outcome, ev.ast)
}

impl<'a> Evaluator<'a> {
    fn eval_rule(&mut self, rule_id: RuleId, pos: usize) -> StepResult {
        if let Some((cached, nodes)) = self.memo.get(&(rule_id, pos)).cloned() {
            self.ast.extend_frame(&nodes);
            return cached;
        }
        let rule = self.arena.rule(rule_id);
        trace!(rule = %rule.name, pos, "enter rule");
        let mark = self.ast.len();
        let result = self.eval(rule.body, pos);
        trace!(rule = %rule.name, pos, ?result, "exit rule");
        let produced = self.ast.frame_since(mark).to_vec();
        self.memo.insert((rule_id, pos), (result, produced));
        result
    }

    fn eval(&mut self, id: ExprId, pos: usize) -> StepResult {
        match self.arena.expr(id).clone() {
            Expr::Literal(s) => self.eval_literal(&s, pos),
            Expr::PartialPattern(pattern) => self.eval_partial_pattern(&pattern, pos),
            Expr::CharClass { accept, negate, min, max } => {
                self.eval_char_class(&accept, negate, min, max, pos)
            }
            Expr::Until(delims) => self.eval_until(&delims, pos),
            Expr::UntilOneOf(delims) => self.eval_until(&delims, pos),
            Expr::End => {
                if pos == self.input.len() {
                    StepResult::Full(pos)
                } else {
                    StepResult::Failed(pos)
                }
            }
            Expr::Eps => StepResult::Full(pos),
            Expr::Space => {
                let mut p = pos;
                let bytes = self.input.as_bytes();
                while p < bytes.len() && bytes[p].is_ascii_whitespace() {
                    p += 1;
                }
                StepResult::Full(p)
            }
            Expr::Rest => StepResult::Full(self.input.len()),
            Expr::Peek(inner) => self.eval_peek(inner, pos),
            Expr::Seq(items) => self.eval_seq(&items, pos),
            Expr::Choice(alts) => self.eval_choice(&alts, pos),
            Expr::Optional(inner) => match self.eval(inner, pos) {
                StepResult::Full(end) => StepResult::Full(end),
                StepResult::Partial(end) if self.is_partial_allowed => StepResult::Partial(end),
                _ => StepResult::Full(pos),
            },
            Expr::Repeat { inner, min, max } => self.eval_repeat(inner, min, max, pos),
            Expr::Atomic(inner) => self.eval_atomic(inner, pos),
            Expr::Tag(tag, inner) => self.eval_tag(tag, inner, pos),
            Expr::RuleRef(rule_id) => self.eval_rule(rule_id, pos),
            Expr::Json => self.eval_json(pos),
            Expr::Schema { inner, rule_name: _, schema: _ } => self.eval(inner, pos),
            Expr::TriggerRule(_, inner) => self.eval(inner, pos),
        }
    }

    fn eval_literal(&self, s: &str, pos: usize) -> StepResult {
        let remaining = &self.input[pos..];
        if remaining.starts_with(s) {
            return StepResult::Full(pos + s.len());
        }
        if self.is_partial_allowed && s.starts_with(remaining) {
            return StepResult::Partial(self.input.len());
        }
        StepResult::Failed(pos)
    }

    fn eval_partial_pattern(&self, pattern: &str, pos: usize) -> StepResult {
        let regex = match PartialRegex::compile(pattern) {
            Ok(r) => r,
            Err(_) => return StepResult::Failed(pos),
        };
        let remaining = &self.input[pos..];
        let m = regex.search(remaining);
        match m.kind {
            MatchKind::Full => {
                let g0 = &m.groups[0];
                StepResult::Full(pos + g0.end)
            }
            MatchKind::Partial if self.is_partial_allowed => StepResult::Partial(self.input.len()),
            _ => StepResult::Failed(pos),
        }
    }

    fn eval_char_class(
        &self,
        accept: &[(char, char)],
        negate: bool,
        min: u32,
        max: Option<u32>,
        pos: usize,
    ) -> StepResult {
        let mut p = pos;
        let mut count = 0u32;
        for c in self.input[pos..].chars() {
            if max.map(|m| count >= m).unwrap_or(false) {
                break;
            }
            let in_class = accept.iter().any(|&(lo, hi)| c >= lo && c <= hi);
            if in_class != negate {
                p += c.len_utf8();
                count += 1;
            } else {
                break;
            }
        }
        if count >= min {
            StepResult::Full(p)
        } else if self.is_partial_allowed && p == self.input.len() {
            StepResult::Partial(p)
        } else {
            StepResult::Failed(pos)
        }
    }

    fn eval_until(&self, delimiters: &[String], pos: usize) -> StepResult {
        let remaining = &self.input[pos..];
        let first_hit = delimiters
            .iter()
            .filter_map(|d| remaining.find(d.as_str()))
            .min();
        match first_hit {
            Some(offset) => StepResult::Full(pos + offset),
            None => StepResult::Full(self.input.len()),
        }
    }

    fn eval_seq(&mut self, items: &[ExprId], pos: usize) -> StepResult {
        let mut p = pos;
        for (i, item) in items.iter().enumerate() {
            match self.eval(*item, p) {
                StepResult::Full(end) => p = end,
                StepResult::Partial(end) => {
                    if self.is_partial_allowed {
                        return StepResult::Partial(end);
                    }
                    return StepResult::Failed(p);
                }
                StepResult::Failed(_) => {
                    let _ = i;
                    return StepResult::Failed(p);
                }
            }
        }
        StepResult::Full(p)
    }

    fn eval_choice(&mut self, alts: &[ExprId], pos: usize) -> StepResult {
        let mut best_partial: Option<StepResult> = None;
        for alt in alts {
            match self.eval(*alt, pos) {
                StepResult::Full(end) => return StepResult::Full(end),
                StepResult::Partial(end) => {
                    if best_partial.is_none() {
                        best_partial = Some(StepResult::Partial(end));
                    }
                }
                StepResult::Failed(_) => {}
            }
        }
        best_partial.unwrap_or(StepResult::Failed(pos))
    }

    fn eval_repeat(&mut self, inner: ExprId, min: u32, max: Option<u32>, pos: usize) -> StepResult {
        let mut p = pos;
        let mut count = 0u32;
        loop {
            if max.map(|m| count >= m).unwrap_or(false) {
                break;
            }
            match self.eval(inner, p) {
                StepResult::Full(end) => {
                    if end == p {
                        // Zero-width match: stop to avoid looping forever.
                        break;
                    }
                    p = end;
                    count += 1;
                }
                StepResult::Partial(end) => {
                    if self.is_partial_allowed {
                        return StepResult::Partial(end);
                    }
                    break;
                }
                StepResult::Failed(_) => break,
            }
        }
        if count >= min {
            StepResult::Full(p)
        } else {
            StepResult::Failed(pos)
        }
    }

    /// `Peek(e)`: succeeds if `e` would succeed, consuming nothing and
    /// leaking no tags either way — always rewind the frame regardless of
    /// outcome, since a lookahead that happens to match must not leave its
    /// tagged spans behind for the surrounding rule to pick up.
    fn eval_peek(&mut self, inner: ExprId, pos: usize) -> StepResult {
        let mark = self.ast.len();
        let result = self.eval(inner, pos);
        self.ast.truncate(mark);
        match result {
            StepResult::Full(_) => StepResult::Full(pos),
            StepResult::Partial(_) => {
                if self.is_partial_allowed {
                    StepResult::Partial(pos)
                } else {
                    StepResult::Failed(pos)
                }
            }
            StepResult::Failed(_) => StepResult::Failed(pos),
        }
    }

    /// `Atomic(e)`: if `e` returns partial, rewind entirely — no tags
    /// emitted, position unchanged — rather than propagate the partial.
    fn eval_atomic(&mut self, inner: ExprId, pos: usize) -> StepResult {
        let mark = self.ast.len();
        match self.eval(inner, pos) {
            StepResult::Full(end) => StepResult::Full(end),
            StepResult::Partial(_) => {
                self.ast.truncate(mark);
                StepResult::Failed(pos)
            }
            StepResult::Failed(_) => {
                self.ast.truncate(mark);
                StepResult::Failed(pos)
            }
        }
    }

    fn eval_tag(&mut self, tag: ChatTag, inner: ExprId, pos: usize) -> StepResult {
        let mark = self.ast.len();
        match self.eval(inner, pos) {
            StepResult::Full(end) => {
                let children = self.ast.drain_from(mark);
                self.ast.push(tag, pos, end, &self.input[pos..end], children);
                StepResult::Full(end)
            }
            StepResult::Partial(end) => {
                let children = self.ast.drain_from(mark);
                self.ast.push(tag, pos, end, &self.input[pos..end.min(self.input.len())], children);
                StepResult::Partial(end)
            }
            StepResult::Failed(at) => {
                self.ast.truncate(mark);
                StepResult::Failed(at)
            }
        }
    }

    fn eval_json(&mut self, pos: usize) -> StepResult {
        match json_partial::parse(&self.input[pos..]) {
            JsonOutcome::Complete { consumed, .. } => StepResult::Full(pos + consumed),
            JsonOutcome::Partial { consumed, .. } => {
                if self.is_partial_allowed {
                    StepResult::Partial(pos + consumed)
                } else {
                    StepResult::Failed(pos)
                }
            }
            JsonOutcome::Invalid { at, .. } => StepResult::Failed(pos + at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peg::arena::PegBuilder;

    fn single_literal_arena(s: &str) -> PegArena {
        let mut b = PegBuilder::new();
        let lit = b.literal(s);
        let root = b.rule("root", lit).unwrap();
        b.set_root(root);
        b.build().unwrap()
    }

    #[test]
    fn full_match_of_exact_literal() {
        let arena = single_literal_arena("hello");
        let (outcome, _) = evaluate(&arena, "hello", false);
        assert_eq!(outcome, ParseOutcome::Full { consumed: 5 });
    }

    #[test]
    fn partial_match_of_truncated_literal() {
        let arena = single_literal_arena("hello");
        let (outcome, _) = evaluate(&arena, "hel", true);
        assert!(matches!(outcome, ParseOutcome::Partial { .. }));
    }

    #[test]
    fn failed_without_partial_flag() {
        let arena = single_literal_arena("hello");
        let (outcome, _) = evaluate(&arena, "hel", false);
        assert!(outcome.is_failed());
    }

    #[test]
    fn atomic_suppresses_partial_and_rewinds() {
        let mut b = PegBuilder::new();
        let lit = b.literal("<tool_call>");
        let tagged = b.tag(ChatTag::ToolOpen, lit);
        let atomic = b.atomic(tagged);
        let root = b.rule("root", atomic).unwrap();
        b.set_root(root);
        let arena = b.build().unwrap();

        let (outcome, ast) = evaluate(&arena, "<tool", true);
        assert!(outcome.is_failed());
        assert_eq!(ast.len(), 0);
    }

    #[test]
    fn choice_commits_to_first_success() {
        let mut b = PegBuilder::new();
        let a = b.literal("a");
        let ab = b.literal("ab");
        let choice = b.choice(vec![a, ab]);
        let root = b.rule("root", choice).unwrap();
        b.set_root(root);
        let arena = b.build().unwrap();

        let (outcome, _) = evaluate(&arena, "ab", false);
        // PEG ordered choice: "a" succeeds first and wins, consuming only 1 byte.
        assert_eq!(outcome, ParseOutcome::Full { consumed: 1 });
    }

    #[test]
    fn peek_does_not_leak_tags_into_ast() {
        let mut b = PegBuilder::new();
        let lit = b.literal("hi");
        let tagged = b.tag(ChatTag::Content, lit);
        let peeked = b.peek(tagged);
        let root = b.rule("root", peeked).unwrap();
        b.set_root(root);
        let arena = b.build().unwrap();

        let (outcome, ast) = evaluate(&arena, "hi", false);
        assert_eq!(outcome, ParseOutcome::Full { consumed: 0 });
        assert!(ast.roots().is_empty());
    }

    #[test]
    fn memoized_rule_replays_its_tags_on_second_visit() {
        // Peek(rule) then rule again at the same position: the second
        // visit must hit the memo but still produce the Content tag.
        let mut b = PegBuilder::new();
        let lit = b.literal("hi");
        let tagged = b.tag(ChatTag::Content, lit);
        let inner = b.rule("inner", tagged).unwrap();
        let peeked = {
            let r = b.rule_ref(inner);
            b.peek(r)
        };
        let second = b.rule_ref(inner);
        let seq = b.sequence(vec![peeked, second]);
        let root = b.rule("root", seq).unwrap();
        b.set_root(root);
        let arena = b.build().unwrap();

        let (outcome, ast) = evaluate(&arena, "hi", false);
        assert_eq!(outcome, ParseOutcome::Full { consumed: 2 });
        assert_eq!(ast.roots().len(), 1);
        assert_eq!(ast.node(ast.roots()[0]).tag, ChatTag::Content);
    }
}
