//! PEG arena & expression tree (component B).
//!
//! Rule references are small integer handles into an append-only arena,
//! never pointers — this makes the grammar graph trivially `Send + Sync`
//! and shareable across threads once frozen, mirroring the append-only,
//! `.rule()`-returns-`Self`, final-`.build()` shape of
//! `tool_calling/grammar_builder.rs`'s `GrammarBuilder`.

use std::collections::HashMap;

use crate::ast::ChatTag;
use crate::errors::PegBuildError;

/// A handle into the expression arena. Never dereferenced directly by
/// callers; always looked up through a `PegArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

/// A handle to a named rule. Distinct from `ExprId` so a rule reference in
/// the expression tree (`Expr::RuleRef`) can't be confused with a direct
/// expression handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub u32);

/// One alternative of a `GrammarTrigger`'s activation condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarTrigger {
    Word(String),
    Pattern(String),
    PatternFull(String),
}

/// The PEG expression sum type, stored by value in the arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(String),
    CharClass {
        accept: Vec<(char, char)>,
        negate: bool,
        min: u32,
        max: Option<u32>,
    },
    Until(Vec<String>),
    UntilOneOf(Vec<String>),
    End,
    Eps,
    Space,
    Rest,
    Peek(ExprId),
    Seq(Vec<ExprId>),
    Choice(Vec<ExprId>),
    Optional(ExprId),
    Repeat {
        inner: ExprId,
        min: u32,
        max: Option<u32>,
    },
    Atomic(ExprId),
    Tag(ChatTag, ExprId),
    RuleRef(RuleId),
    Json,
    Schema {
        inner: ExprId,
        rule_name: String,
        schema: serde_json::Value,
    },
    TriggerRule(String, ExprId),
    /// A reversed-partial-regex-backed literal, e.g. a sentinel token that
    /// must be detectable from a truncated tail.
    PartialPattern(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub body: ExprId,
}

/// The frozen, immutable grammar graph. `Send + Sync` because it has no
/// interior mutability once `PegBuilder::build()` returns one.
#[derive(Debug, Clone, Default)]
pub struct PegArena {
    exprs: Vec<Expr>,
    rules: Vec<Rule>,
    rule_by_name: HashMap<String, RuleId>,
    root: Option<RuleId>,
}

impl PegArena {
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.0 as usize]
    }

    pub fn rule_id(&self, name: &str) -> Option<RuleId> {
        self.rule_by_name.get(name).copied()
    }

    pub fn root(&self) -> Option<RuleId> {
        self.root
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

/// Append-only builder. Every constructor returns an `ExprId`; `rule()`
/// registers a named entry point; `build()` validates and freezes.
#[derive(Debug, Default)]
pub struct PegBuilder {
    exprs: Vec<Expr>,
    rules: Vec<Rule>,
    rule_by_name: HashMap<String, RuleId>,
    root: Option<RuleId>,
}

impl PegBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, expr: Expr) -> ExprId {
        self.exprs.push(expr);
        ExprId((self.exprs.len() - 1) as u32)
    }

    pub fn literal(&mut self, s: impl Into<String>) -> ExprId {
        self.push(Expr::Literal(s.into()))
    }

    pub fn char_class(&mut self, accept: Vec<(char, char)>, negate: bool, min: u32, max: Option<u32>) -> ExprId {
        self.push(Expr::CharClass { accept, negate, min, max })
    }

    pub fn until(&mut self, delimiters: Vec<String>) -> ExprId {
        self.push(Expr::Until(delimiters))
    }

    pub fn until_one_of(&mut self, delimiters: Vec<String>) -> ExprId {
        self.push(Expr::UntilOneOf(delimiters))
    }

    pub fn end(&mut self) -> ExprId {
        self.push(Expr::End)
    }

    pub fn eps(&mut self) -> ExprId {
        self.push(Expr::Eps)
    }

    pub fn space(&mut self) -> ExprId {
        self.push(Expr::Space)
    }

    pub fn rest(&mut self) -> ExprId {
        self.push(Expr::Rest)
    }

    pub fn peek(&mut self, inner: ExprId) -> ExprId {
        self.push(Expr::Peek(inner))
    }

    pub fn sequence(&mut self, items: Vec<ExprId>) -> ExprId {
        self.push(Expr::Seq(items))
    }

    pub fn choice(&mut self, alternatives: Vec<ExprId>) -> ExprId {
        self.push(Expr::Choice(alternatives))
    }

    pub fn optional(&mut self, inner: ExprId) -> ExprId {
        self.push(Expr::Optional(inner))
    }

    pub fn repeat(&mut self, inner: ExprId, min: u32, max: Option<u32>) -> ExprId {
        self.push(Expr::Repeat { inner, min, max })
    }

    pub fn atomic(&mut self, inner: ExprId) -> ExprId {
        self.push(Expr::Atomic(inner))
    }

    pub fn tag(&mut self, tag: ChatTag, inner: ExprId) -> ExprId {
        self.push(Expr::Tag(tag, inner))
    }

    pub fn atomic_tag(&mut self, tag: ChatTag, inner: ExprId) -> ExprId {
        let tagged = self.tag(tag, inner);
        self.atomic(tagged)
    }

    pub fn literal_tag(&mut self, tag: ChatTag, s: impl Into<String>) -> ExprId {
        let lit = self.literal(s);
        self.tag(tag, lit)
    }

    pub fn json(&mut self) -> ExprId {
        self.push(Expr::Json)
    }

    pub fn schema(&mut self, inner: ExprId, rule_name: impl Into<String>, schema: serde_json::Value) -> ExprId {
        self.push(Expr::Schema {
            inner,
            rule_name: rule_name.into(),
            schema,
        })
    }

    pub fn trigger_rule(&mut self, name: impl Into<String>, inner: ExprId) -> ExprId {
        self.push(Expr::TriggerRule(name.into(), inner))
    }

    pub fn partial_pattern(&mut self, pattern: impl Into<String>) -> ExprId {
        self.push(Expr::PartialPattern(pattern.into()))
    }

    /// Reserve a rule slot up front so mutually-recursive rules can
    /// reference each other's `RuleId` before either body is built.
    pub fn declare_rule(&mut self, name: impl Into<String>) -> Result<RuleId, PegBuildError> {
        let name = name.into();
        if self.rule_by_name.contains_key(&name) {
            return Err(PegBuildError::DuplicateRule(name));
        }
        let placeholder_expr = self.eps();
        let id = RuleId(self.rules.len() as u32);
        self.rules.push(Rule {
            name: name.clone(),
            body: placeholder_expr,
        });
        self.rule_by_name.insert(name, id);
        Ok(id)
    }

    pub fn define_rule(&mut self, id: RuleId, body: ExprId) {
        self.rules[id.0 as usize].body = body;
    }

    /// Declare and define a rule in one call, for the common non-recursive
    /// case.
    pub fn rule(&mut self, name: impl Into<String>, body: ExprId) -> Result<RuleId, PegBuildError> {
        let id = self.declare_rule(name)?;
        self.define_rule(id, body);
        Ok(id)
    }

    pub fn rule_ref(&mut self, id: RuleId) -> ExprId {
        self.push(Expr::RuleRef(id))
    }

    pub fn set_root(&mut self, root: RuleId) {
        self.root = Some(root);
    }

    /// Validate every rule reference resolves and that no rule
    /// left-recurses, then freeze into a `PegArena`.
    pub fn build(self) -> Result<PegArena, PegBuildError> {
        for rule in &self.rules {
            self.check_resolved(rule.body)?;
        }
        for (idx, _) in self.rules.iter().enumerate() {
            self.check_left_recursion(RuleId(idx as u32))?;
        }

        Ok(PegArena {
            exprs: self.exprs,
            rules: self.rules,
            rule_by_name: self.rule_by_name,
            root: self.root,
        })
    }

    fn check_resolved(&self, id: ExprId) -> Result<(), PegBuildError> {
        match &self.exprs[id.0 as usize] {
            Expr::Peek(e) | Expr::Optional(e) | Expr::Atomic(e) | Expr::Tag(_, e) => {
                self.check_resolved(*e)
            }
            Expr::Repeat { inner, .. } => self.check_resolved(*inner),
            Expr::Seq(items) | Expr::Choice(items) => {
                for item in items {
                    self.check_resolved(*item)?;
                }
                Ok(())
            }
            Expr::Schema { inner, .. } => self.check_resolved(*inner),
            Expr::TriggerRule(_, inner) => self.check_resolved(*inner),
            Expr::RuleRef(rule_id) => {
                if rule_id.0 as usize >= self.rules.len() {
                    return Err(PegBuildError::UnresolvedRule(format!("#{}", rule_id.0)));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Breadth-first search over first-position references: a rule
    /// left-recurses if, by only ever following the leftmost child of a
    /// `Seq` (and every branch of a `Choice`), it reaches itself again
    /// without having consumed input (`Literal`, `CharClass`, `Until*`,
    /// `Json`, `Space` with a non-zero `min`, etc. all count as consuming).
    fn check_left_recursion(&self, start: RuleId) -> Result<(), PegBuildError> {
        let mut visited = vec![false; self.rules.len()];
        let mut path = Vec::new();
        self.walk_first_position(start, start, &mut visited, &mut path)
    }

    fn walk_first_position(
        &self,
        start: RuleId,
        current: RuleId,
        visited: &mut [bool],
        path: &mut Vec<String>,
    ) -> Result<(), PegBuildError> {
        if visited[current.0 as usize] {
            return Ok(());
        }
        visited[current.0 as usize] = true;
        path.push(self.rules[current.0 as usize].name.clone());

        let body = self.rules[current.0 as usize].body;
        for reached in self.first_position_rule_refs(body) {
            if reached == start {
                return Err(PegBuildError::LeftRecursion(
                    self.rules[start.0 as usize].name.clone(),
                    path.clone(),
                ));
            }
            self.walk_first_position(start, reached, visited, path)?;
        }
        path.pop();
        Ok(())
    }

    /// Collect every `RuleId` reachable from `id` without first consuming
    /// any input, i.e. every leftmost branch that could recurse.
    fn first_position_rule_refs(&self, id: ExprId) -> Vec<RuleId> {
        match &self.exprs[id.0 as usize] {
            Expr::RuleRef(r) => vec![*r],
            Expr::Seq(items) => items
                .first()
                .map(|first| self.first_position_rule_refs(*first))
                .unwrap_or_default(),
            Expr::Choice(alts) => alts
                .iter()
                .flat_map(|a| self.first_position_rule_refs(*a))
                .collect(),
            Expr::Optional(e) | Expr::Peek(e) | Expr::Atomic(e) | Expr::Tag(_, e) => {
                self.first_position_rule_refs(*e)
            }
            Expr::Repeat { inner, .. } => self.first_position_rule_refs(*inner),
            Expr::TriggerRule(_, e) => self.first_position_rule_refs(*e),
            Expr::Schema { inner, .. } => self.first_position_rule_refs(*inner),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_unresolved_rule() {
        let mut b = PegBuilder::new();
        let placeholder = RuleId(999);
        let r = b.rule_ref(placeholder);
        let result = b.rule("root", r);
        assert!(result.is_ok()); // rule() itself succeeds; build() checks refs
        let b = b;
        assert!(matches!(
            b.build(),
            Err(PegBuildError::UnresolvedRule(_))
        ));
    }

    #[test]
    fn detects_duplicate_rule() {
        let mut b = PegBuilder::new();
        let e = b.eps();
        b.rule("dup", e).unwrap();
        let e2 = b.eps();
        assert!(matches!(b.rule("dup", e2), Err(PegBuildError::DuplicateRule(_))));
    }

    #[test]
    fn detects_direct_left_recursion() {
        let mut b = PegBuilder::new();
        let id = b.declare_rule("a").unwrap();
        let r = b.rule_ref(id);
        b.define_rule(id, r);
        assert!(matches!(b.build(), Err(PegBuildError::LeftRecursion(_, _))));
    }

    #[test]
    fn allows_recursion_through_consuming_choice_branch() {
        let mut b = PegBuilder::new();
        let id = b.declare_rule("a").unwrap();
        let lit = b.literal("x");
        let rref = b.rule_ref(id);
        let seq = b.sequence(vec![lit, rref]);
        let eps = b.eps();
        let choice = b.choice(vec![seq, eps]);
        b.define_rule(id, choice);
        b.set_root(id);
        assert!(b.build().is_ok());
    }

    #[test]
    fn builds_simple_grammar() {
        let mut b = PegBuilder::new();
        let lit = b.literal("hi");
        let root = b.rule("root", lit).unwrap();
        b.set_root(root);
        let arena = b.build().unwrap();
        assert_eq!(arena.root(), Some(root));
    }
}
