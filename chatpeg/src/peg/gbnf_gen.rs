//! GBNF generator (component F).
//!
//! Walks a `PegArena`'s expression tree and emits an equivalent `gbnf`
//! grammar. Grounded in `tool_calling/{qwen3,phi4mini,functiongemma}.rs`'s
//! pattern of building a `GrammarBuilder` from an existing (often
//! JSON-Schema-derived) grammar and layering wrapper rules on top — here,
//! each PEG `Rule` becomes a GBNF rule of the same name, and a `Schema`
//! node splices in the fragment `gbnf::json::json_schema_to_grammar`
//! produced for it.

use std::collections::BTreeMap;

use gbnf::builder::{alt, nt, t, GrammarBuilder};
use gbnf::{CharacterSet, CharacterSetItem, Grammar, Production, ProductionItem, RepetitionType};

use crate::peg::arena::{Expr, ExprId, PegArena, RuleId};

/// Render `arena` to a complete GBNF grammar rooted at its root rule. Every
/// named rule in the arena becomes a GBNF rule of the same name; anonymous
/// sub-expressions are inlined directly into their containing rule's body.
pub fn peg_to_gbnf(arena: &PegArena) -> Grammar {
    let mut builder = GrammarBuilder::new();
    let mut json_schema_fragments: BTreeMap<String, Grammar> = BTreeMap::new();

    for rule in arena.rules() {
        let items = expr_to_items(arena, rule.body, &mut json_schema_fragments);
        builder = builder.rule(&rule.name, items);
    }

    if let Some(root) = arena.root() {
        builder = builder.root(&arena.rule(root).name);
    }

    let mut grammar = builder.build();

    // `Json`/`Space`/`Rest` reference the shared "json-value"/"ws"/
    // "any-text" primitives directly, with no `Schema` node in the way to
    // pull them in; seed them unconditionally from a trivial schema
    // translation so they're always defined.
    if let Ok(seed) = gbnf::json::json_schema_to_grammar(&serde_json::json!({}), "__chatpeg_seed") {
        json_schema_fragments.insert("__chatpeg_seed".to_string(), seed);
    }
    grammar.recurring_items.entry(gbnf::NonTerminalSymbol { name: "any-text".to_string() }).or_insert(Production {
        items: vec![ProductionItem::CharacterSet(
            CharacterSet { is_complement: true, items: vec![] },
            RepetitionType::ZeroOrMore,
        )],
    });

    // Splice in every schema fragment's own rules (its JSON primitives and
    // per-field rules), skipping any primitive already present.
    for fragment in json_schema_fragments.into_values() {
        for (name, production) in fragment.recurring_items {
            grammar.recurring_items.entry(name).or_insert(production);
        }
        grammar.items.extend(fragment.items);
    }

    grammar
}

fn expr_to_items(
    arena: &PegArena,
    id: ExprId,
    fragments: &mut BTreeMap<String, Grammar>,
) -> Vec<ProductionItem> {
    match arena.expr(id) {
        Expr::Literal(s) => vec![t(s)],
        Expr::PartialPattern(_) => {
            // The sampler only ever sees complete output; the reversed-
            // partial form exists purely for the evaluator's own partial
            // detection, so the grammar side has nothing to translate it
            // to beyond "anything" — callers should prefer `Literal` or
            // `Until` for anything that must also constrain the sampler.
            vec![nt("any-text")]
        }
        Expr::CharClass { accept, negate, min, max } => {
            let rep = repetition_for(*min, *max);
            vec![ProductionItem::CharacterSet(
                CharacterSet {
                    is_complement: *negate,
                    items: accept
                        .iter()
                        .map(|&(lo, hi)| {
                            if lo == hi {
                                CharacterSetItem::Character(lo)
                            } else {
                                CharacterSetItem::Range(lo, hi)
                            }
                        })
                        .collect(),
                },
                rep,
            )]
        }
        Expr::Until(delims) | Expr::UntilOneOf(delims) => {
            let firsts: Vec<char> = delims.iter().filter_map(|d| d.chars().next()).collect();
            vec![ProductionItem::CharacterSet(
                CharacterSet {
                    is_complement: true,
                    items: firsts.into_iter().map(CharacterSetItem::Character).collect(),
                },
                RepetitionType::ZeroOrMore,
            )]
        }
        Expr::End | Expr::Eps => vec![],
        Expr::Space => vec![nt("ws")],
        Expr::Rest => vec![nt("any-text")],
        Expr::Peek(_) => vec![],
        Expr::Seq(items) => items
            .iter()
            .flat_map(|i| expr_to_items(arena, *i, fragments))
            .collect(),
        Expr::Choice(alts) => {
            let alternatives = alts.iter().map(|a| expr_to_items(arena, *a, fragments)).collect();
            vec![alt(alternatives)]
        }
        Expr::Optional(inner) => {
            let items = expr_to_items(arena, *inner, fragments);
            vec![wrap_group(items, RepetitionType::ZeroOrOne)]
        }
        Expr::Repeat { inner, min, max } => {
            let items = expr_to_items(arena, *inner, fragments);
            vec![wrap_group(items, repetition_for(*min, *max))]
        }
        Expr::Atomic(inner) | Expr::Tag(_, inner) => expr_to_items(arena, *inner, fragments),
        Expr::RuleRef(rule_id) => vec![nt(&arena.rule(*rule_id).name)],
        Expr::Json => vec![nt("json-value")],
        Expr::Schema { rule_name, schema, .. } => {
            if !fragments.contains_key(rule_name) {
                if let Ok(fragment) = gbnf::json::json_schema_to_grammar(schema, rule_name) {
                    fragments.insert(rule_name.clone(), fragment);
                }
            }
            vec![nt(rule_name)]
        }
        Expr::TriggerRule(_, inner) => expr_to_items(arena, *inner, fragments),
    }
}

fn repetition_for(min: u32, max: Option<u32>) -> RepetitionType {
    match (min, max) {
        (0, Some(1)) => RepetitionType::ZeroOrOne,
        (0, None) => RepetitionType::ZeroOrMore,
        (1, None) => RepetitionType::OneOrMore,
        (1, Some(1)) => RepetitionType::One,
        _ => RepetitionType::ZeroOrMore,
    }
}

fn wrap_group(items: Vec<ProductionItem>, rep: RepetitionType) -> ProductionItem {
    ProductionItem::Group(vec![Production { items }], rep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ChatTag;
    use crate::peg::arena::PegBuilder;

    #[test]
    fn renders_literal_rule() {
        let mut b = PegBuilder::new();
        let lit = b.literal("hi");
        let root = b.rule("root", lit).unwrap();
        b.set_root(root);
        let arena = b.build().unwrap();

        let grammar = peg_to_gbnf(&arena);
        assert_eq!(grammar.to_gbnf(), "root ::= \"hi\"\n");
    }

    #[test]
    fn renders_choice_as_alternation() {
        let mut b = PegBuilder::new();
        let a = b.literal("a");
        let c = b.literal("c");
        let choice = b.choice(vec![a, c]);
        let root = b.rule("root", choice).unwrap();
        b.set_root(root);
        let arena = b.build().unwrap();

        let text = peg_to_gbnf(&arena).to_gbnf();
        assert!(text.contains("\"a\" | \"c\""));
    }

    #[test]
    fn tag_is_transparent_to_grammar() {
        let mut b = PegBuilder::new();
        let lit = b.literal("hi");
        let tagged = b.tag(ChatTag::Content, lit);
        let root = b.rule("root", tagged).unwrap();
        b.set_root(root);
        let arena = b.build().unwrap();

        assert_eq!(peg_to_gbnf(&arena).to_gbnf(), "root ::= \"hi\"\n");
    }
}
