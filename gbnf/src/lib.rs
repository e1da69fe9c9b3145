//! GBNF grammar types, a fluent builder, and a JSON-Schema-to-GBNF translator.
//!
//! GBNF is the grammar dialect llama.cpp's sampler consumes to constrain token
//! emission. This crate models the grammar as a small AST (this module),
//! provides a builder for assembling rules without hand-writing GBNF text
//! (`builder`), and converts a JSON Schema into a grammar fragment (`json`).
//!
//! See <https://github.com/ggml-org/llama.cpp/blob/master/grammars/README.md>
//! for the target dialect.

pub mod builder;
pub mod json;

use std::collections::BTreeMap;
use std::fmt;

/// An exact string match, e.g. `"hello"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TerminalSymbol {
    pub value: String,
}

/// A reference to another rule by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonTerminalSymbol {
    pub name: String,
}

/// How many times a production item may repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepetitionType {
    One,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl RepetitionType {
    fn suffix(self) -> &'static str {
        match self {
            RepetitionType::One => "",
            RepetitionType::ZeroOrOne => "?",
            RepetitionType::ZeroOrMore => "*",
            RepetitionType::OneOrMore => "+",
        }
    }
}

/// A single character or an inclusive range inside a `CharacterSet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacterSetItem {
    Character(char),
    Range(char, char),
}

/// A POSIX-style character class, e.g. `[a-zA-Z_]` or its complement `[^"\\]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterSet {
    pub is_complement: bool,
    pub items: Vec<CharacterSetItem>,
}

/// One element of a production's right-hand side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductionItem {
    Terminal(TerminalSymbol, RepetitionType),
    NonTerminal(NonTerminalSymbol, RepetitionType),
    CharacterSet(CharacterSet, RepetitionType),
    /// A parenthesized alternation, e.g. `("a" | "b")*`.
    Group(Vec<Production>, RepetitionType),
}

/// An ordered sequence of production items (GBNF concatenation).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Production {
    pub items: Vec<ProductionItem>,
}

/// A named rule: `lhs ::= rhs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub lhs: NonTerminalSymbol,
    pub rhs: Production,
}

/// A top-level grammar item. Currently only plain rules, but kept as an enum
/// so the declaration list can grow (e.g. comments) without breaking callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarItem {
    Rule(Rule),
}

/// A complete GBNF grammar: an ordered list of rule declarations plus a set
/// of shared "recurring" rules (e.g. `ws`) that may be referenced from many
/// places but are only emitted once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Grammar {
    pub items: Vec<GrammarItem>,
    pub recurring_items: BTreeMap<NonTerminalSymbol, Production>,
    pub root_name: Option<String>,
}

impl Grammar {
    pub fn root_name(&self) -> &str {
        self.root_name.as_deref().unwrap_or_else(|| {
            self.items
                .first()
                .map(|item| match item {
                    GrammarItem::Rule(r) => r.lhs.name.as_str(),
                })
                .unwrap_or("root")
        })
    }

    /// Render the grammar as GBNF text, one rule per line.
    pub fn to_gbnf(&self) -> String {
        let mut out = String::new();
        for (name, production) in &self.recurring_items {
            out.push_str(&format!(
                "{} ::= {}\n",
                name.name,
                production_to_gbnf(production)
            ));
        }
        for GrammarItem::Rule(rule) in &self.items {
            out.push_str(&format!(
                "{} ::= {}\n",
                rule.lhs.name,
                production_to_gbnf(&rule.rhs)
            ));
        }
        out
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_gbnf())
    }
}

fn production_to_gbnf(production: &Production) -> String {
    production
        .items
        .iter()
        .map(item_to_gbnf)
        .collect::<Vec<_>>()
        .join(" ")
}

fn item_to_gbnf(item: &ProductionItem) -> String {
    match item {
        ProductionItem::Terminal(t, rep) => {
            format!("\"{}\"{}", escape_string(&t.value), rep.suffix())
        }
        ProductionItem::NonTerminal(nt, rep) => format!("{}{}", nt.name, rep.suffix()),
        ProductionItem::CharacterSet(set, rep) => format!("{}{}", charset_to_gbnf(set), rep.suffix()),
        ProductionItem::Group(alts, rep) => {
            let inner = alts
                .iter()
                .map(production_to_gbnf)
                .collect::<Vec<_>>()
                .join(" | ");
            format!("({}){}", inner, rep.suffix())
        }
    }
}

fn charset_to_gbnf(set: &CharacterSet) -> String {
    let neg = if set.is_complement { "^" } else { "" };
    let mut body = String::new();
    for item in &set.items {
        match item {
            CharacterSetItem::Character(c) => body.push_str(&escape_char(*c)),
            CharacterSetItem::Range(a, b) => {
                body.push_str(&escape_char(*a));
                body.push('-');
                body.push_str(&escape_char(*b));
            }
        }
    }
    format!("[{}{}]", neg, body)
}

fn escape_char(c: char) -> String {
    match c {
        '\n' => "\\n".to_string(),
        '\r' => "\\r".to_string(),
        '\t' => "\\t".to_string(),
        '\\' => "\\\\".to_string(),
        ']' => "\\]".to_string(),
        '^' => "\\^".to_string(),
        '-' => "\\-".to_string(),
        c if c.is_ascii_control() => format!("\\x{:02X}", c as u32),
        c => c.to_string(),
    }
}

fn escape_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\n' => "\\n".to_string(),
            '\r' => "\\r".to_string(),
            '\t' => "\\t".to_string(),
            '\\' => "\\\\".to_string(),
            '"' => "\\\"".to_string(),
            c => c.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use builder::{nt, t};

    #[test]
    fn renders_simple_rule() {
        let grammar = builder::GrammarBuilder::new()
            .rule("root", vec![t("hello"), t(" "), nt("name")])
            .rule("name", vec![t("world")])
            .build();

        assert_eq!(grammar.to_gbnf(), "root ::= \"hello\" \" \" name\nname ::= \"world\"\n");
    }

    #[test]
    fn escapes_quotes_and_backslashes() {
        let grammar = builder::GrammarBuilder::new()
            .rule("root", vec![t("say \"hi\"\\now")])
            .build();
        assert!(grammar.to_gbnf().contains("\\\"hi\\\""));
    }
}
