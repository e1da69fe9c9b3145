//! A fluent builder for assembling [`Grammar`]s without hand-writing GBNF
//! text, plus free functions for the common production-item shapes.
//!
//! Append-only: each `.rule()` call returns `Self`, and `.build()` hands
//! back the finished `Grammar`.

use crate::{
    CharacterSet, CharacterSetItem, Grammar, GrammarItem, NonTerminalSymbol, Production,
    ProductionItem, RepetitionType, Rule, TerminalSymbol,
};

pub struct GrammarBuilder {
    grammar: Grammar,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self {
            grammar: Grammar::default(),
        }
    }

    /// Start from an existing grammar (e.g. one produced by
    /// [`crate::json::json_schema_to_grammar`]) and keep adding rules to it.
    pub fn from_existing(grammar: Grammar) -> Self {
        Self { grammar }
    }

    /// Append a rule. Rules are emitted in the order they're added.
    pub fn rule(mut self, name: &str, items: Vec<ProductionItem>) -> Self {
        self.grammar.items.push(GrammarItem::Rule(Rule {
            lhs: NonTerminalSymbol { name: name.into() },
            rhs: Production { items },
        }));
        self
    }

    /// Append a rule shared across the grammar (e.g. `ws`); recurring rules
    /// are deduplicated by name and always rendered before ordinary rules.
    pub fn recurring_rule(mut self, name: &str, items: Vec<ProductionItem>) -> Self {
        self.grammar
            .recurring_items
            .insert(NonTerminalSymbol { name: name.into() }, Production { items });
        self
    }

    pub fn root(mut self, name: &str) -> Self {
        self.grammar.root_name = Some(name.to_string());
        self
    }

    pub fn build(self) -> Grammar {
        self.grammar
    }
}

impl Default for GrammarBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An exact-text match, matched exactly once.
pub fn t(s: &str) -> ProductionItem {
    ProductionItem::Terminal(TerminalSymbol { value: s.into() }, RepetitionType::One)
}

/// An exact-text match, matched zero or more times.
pub fn t_star(s: &str) -> ProductionItem {
    ProductionItem::Terminal(TerminalSymbol { value: s.into() }, RepetitionType::ZeroOrMore)
}

/// An exact-text match, optional.
pub fn t_opt(s: &str) -> ProductionItem {
    ProductionItem::Terminal(TerminalSymbol { value: s.into() }, RepetitionType::ZeroOrOne)
}

/// A reference to another rule, matched exactly once.
pub fn nt(name: &str) -> ProductionItem {
    ProductionItem::NonTerminal(NonTerminalSymbol { name: name.into() }, RepetitionType::One)
}

/// A reference to another rule, matched one or more times.
pub fn nt_plus(name: &str) -> ProductionItem {
    ProductionItem::NonTerminal(
        NonTerminalSymbol { name: name.into() },
        RepetitionType::OneOrMore,
    )
}

/// A reference to another rule, matched zero or more times.
pub fn nt_star(name: &str) -> ProductionItem {
    ProductionItem::NonTerminal(
        NonTerminalSymbol { name: name.into() },
        RepetitionType::ZeroOrMore,
    )
}

/// A reference to another rule, optional.
pub fn nt_opt(name: &str) -> ProductionItem {
    ProductionItem::NonTerminal(
        NonTerminalSymbol { name: name.into() },
        RepetitionType::ZeroOrOne,
    )
}

/// Any single character except the given ones, matched one or more times.
pub fn not_chars(chars: &[char]) -> ProductionItem {
    ProductionItem::CharacterSet(
        CharacterSet {
            is_complement: true,
            items: chars.iter().map(|&c| CharacterSetItem::Character(c)).collect(),
        },
        RepetitionType::OneOrMore,
    )
}

/// A parenthesized alternation of sequences, e.g. `("a" "b" | "c")`, matched
/// exactly once. Each `Vec<ProductionItem>` is one alternative.
pub fn alt(alternatives: Vec<Vec<ProductionItem>>) -> ProductionItem {
    ProductionItem::Group(
        alternatives
            .into_iter()
            .map(|items| Production { items })
            .collect(),
        RepetitionType::One,
    )
}

/// Concatenate item-builders into one `Vec`, for readability at call sites
/// that build up a rule's right-hand side piecemeal.
pub fn seq(items: &[ProductionItem]) -> Vec<ProductionItem> {
    items.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_renders() {
        let grammar = GrammarBuilder::new()
            .recurring_rule("ws", vec![t_star(" ")])
            .rule("root", seq(&[nt("ws"), t("hi")]))
            .build();
        assert_eq!(grammar.items.len(), 1);
        assert_eq!(grammar.recurring_items.len(), 1);
        assert_eq!(grammar.to_gbnf(), "ws ::= \" \"*\nroot ::= ws \"hi\"\n");
    }

    #[test]
    fn not_chars_builds_complement_set() {
        match not_chars(&['<', '>']) {
            ProductionItem::CharacterSet(set, RepetitionType::OneOrMore) => {
                assert!(set.is_complement);
                assert_eq!(set.items.len(), 2);
            }
            _ => panic!("expected CharacterSet with OneOrMore"),
        }
    }
}
