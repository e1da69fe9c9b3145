//! Reversed-partial-regex compiler (component A).
//!
//! Given a source pattern `R`, compiles a derived pattern that, matched
//! against the *reversed* tail of the input, reports the longest suffix of
//! the input that is a prefix of some string `R` would fully match. This is
//! how the PEG evaluator (`peg::eval`) tells "the input just ends mid
//! pattern" apart from "this will never match".
//!
//! Grounded in `original_source/common/regex-partial.cpp`'s algorithm:
//! split on top-level alternation, reverse each alternative atom-by-atom,
//! wrap every non-final atom as optional, and evaluate both the combined
//! and the per-alternative compiled forms, keeping the longest partial.

use regex::Regex;

use crate::errors::PatternError;

/// Outcome of matching a compiled pattern against an input string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchKind {
    None,
    Partial,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchGroup {
    pub str: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexMatch {
    pub kind: MatchKind,
    pub groups: Vec<MatchGroup>,
}

/// A compiled pattern: the regex as given (for full matches) plus the
/// reversed-partial form (for partial-suffix detection) and the per-
/// alternative reversed-partial forms (kept independently since a whole
/// reversed-partial pattern can fail where an individual alternative, tried
/// alone, still reports a partial match).
pub struct PartialRegex {
    full: Regex,
    reversed_partial: Regex,
    alternatives: Vec<Regex>,
}

impl PartialRegex {
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let full = Regex::new(pattern).map_err(|e| PatternError::PatternSyntax {
            pos: 0,
            reason: e.to_string(),
        })?;

        let alternative_sources = split_top_level_alternation(pattern)?;
        let mut alternatives = Vec::with_capacity(alternative_sources.len());
        let mut reversed_sources = Vec::with_capacity(alternative_sources.len());
        for alt in &alternative_sources {
            let reversed = reverse_partial_pattern(alt)?;
            alternatives.push(Regex::new(&reversed).map_err(|e| PatternError::PatternSyntax {
                pos: 0,
                reason: e.to_string(),
            })?);
            reversed_sources.push(reversed);
        }
        let combined_source = reversed_sources.join("|");
        let reversed_partial =
            Regex::new(&combined_source).map_err(|e| PatternError::PatternSyntax {
                pos: 0,
                reason: e.to_string(),
            })?;

        Ok(Self {
            full,
            reversed_partial,
            alternatives,
        })
    }

    /// Match `input`. Tries a full forward match first; if that fails,
    /// reverses the input and checks whether the tail is a prefix of some
    /// match, trying the combined reversed form and then each alternative's
    /// reversed form independently, keeping the longest non-empty result.
    pub fn search(&self, input: &str) -> RegexMatch {
        if let Some(caps) = self.full.captures(input) {
            return RegexMatch {
                kind: MatchKind::Full,
                groups: captures_to_groups(&caps, input),
            };
        }

        let reversed_input: String = input.chars().rev().collect();
        let mut best: Option<(usize, RegexMatch)> = None;

        if let Some(caps) = self.reversed_partial.captures(&reversed_input) {
            if let Some(g0) = caps.get(0) {
                if !g0.as_str().is_empty() {
                    let groups = reversed_groups_to_forward(&caps, input, &reversed_input);
                    best = Some((
                        g0.as_str().len(),
                        RegexMatch {
                            kind: MatchKind::Partial,
                            groups,
                        },
                    ));
                }
            }
        }

        for alt in &self.alternatives {
            if let Some(caps) = alt.captures(&reversed_input) {
                if let Some(g0) = caps.get(0) {
                    let len = g0.as_str().len();
                    if len > 0 && best.as_ref().map(|(best_len, _)| len > *best_len).unwrap_or(true) {
                        let groups = reversed_groups_to_forward(&caps, input, &reversed_input);
                        best = Some((
                            len,
                            RegexMatch {
                                kind: MatchKind::Partial,
                                groups,
                            },
                        ));
                    }
                }
            }
        }

        best.map(|(_, m)| m).unwrap_or(RegexMatch {
            kind: MatchKind::None,
            groups: Vec::new(),
        })
    }
}

fn captures_to_groups(caps: &regex::Captures, input: &str) -> Vec<MatchGroup> {
    caps.iter()
        .filter_map(|m| m)
        .map(|m| MatchGroup {
            str: m.as_str().to_string(),
            start: m.start(),
            end: m.end(),
        })
        .collect()
}

/// Map a capture taken against the reversed string back to forward-string
/// byte offsets. Only group 0 (the whole match) is remapped precisely since
/// that's what callers need (the matched suffix); named/numbered
/// sub-groups are reported with forward-mapped spans on a best-effort basis.
fn reversed_groups_to_forward(
    caps: &regex::Captures,
    input: &str,
    reversed_input: &str,
) -> Vec<MatchGroup> {
    caps.iter()
        .filter_map(|m| m)
        .map(|m| {
            let rev_start = m.start();
            let rev_end = m.end();
            let fwd_end = reversed_input.len() - rev_start;
            let fwd_start = reversed_input.len() - rev_end;
            MatchGroup {
                str: input[fwd_start..fwd_end].to_string(),
                start: fwd_start,
                end: fwd_end,
            }
        })
        .collect()
}

/// Split `pattern` at top-level `|`, tracking paren/bracket depth and
/// escape sequences so `\|`, `(a|b)`, and `[a|b]` are not mistaken for a
/// top-level split point.
fn split_top_level_alternation(pattern: &str) -> Result<Vec<String>, PatternError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut depth_paren = 0i32;
    let mut depth_bracket = 0i32;
    let mut alternatives = Vec::new();
    let mut current = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            current.push(c);
            current.push(chars[i + 1]);
            i += 2;
            continue;
        }
        match c {
            '(' if depth_bracket == 0 => depth_paren += 1,
            ')' if depth_bracket == 0 => {
                depth_paren -= 1;
                if depth_paren < 0 {
                    return Err(PatternError::PatternSyntax {
                        pos: i,
                        reason: "unbalanced ')'".to_string(),
                    });
                }
            }
            '[' if depth_bracket == 0 => depth_bracket += 1,
            ']' if depth_bracket > 0 => depth_bracket -= 1,
            '|' if depth_paren == 0 && depth_bracket == 0 => {
                alternatives.push(std::mem::take(&mut current));
                i += 1;
                continue;
            }
            _ => {}
        }
        current.push(c);
        i += 1;
    }
    if depth_paren != 0 {
        return Err(PatternError::PatternSyntax {
            pos: chars.len(),
            reason: "unbalanced '('".to_string(),
        });
    }
    if depth_bracket != 0 {
        return Err(PatternError::PatternSyntax {
            pos: chars.len(),
            reason: "unbalanced '['".to_string(),
        });
    }
    alternatives.push(current);
    Ok(alternatives)
}

/// One regex atom plus its quantifier, as tokenized left-to-right.
struct Atom {
    text: String,
    quantifier: Option<String>,
}

/// Tokenize `pattern` into atoms: a literal char, an escape sequence, a
/// bracket expression, or a parenthesized group — each possibly followed
/// by a quantifier (`*`, `+`, `?`, `{m,n}`, and their reluctant `?` forms).
fn tokenize_atoms(pattern: &str) -> Result<Vec<Atom>, PatternError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut atoms = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let start = i;
        let text = match chars[i] {
            '\\' => {
                if i + 1 >= chars.len() {
                    return Err(PatternError::PatternSyntax {
                        pos: i,
                        reason: "trailing '\\'".to_string(),
                    });
                }
                i += 2;
                chars[start..i].iter().collect()
            }
            '[' => {
                let mut depth = 1;
                i += 1;
                while i < chars.len() && depth > 0 {
                    if chars[i] == '\\' {
                        i += 2;
                        continue;
                    }
                    if chars[i] == ']' {
                        depth -= 1;
                    }
                    i += 1;
                }
                if depth != 0 {
                    return Err(PatternError::PatternSyntax {
                        pos: start,
                        reason: "unbalanced '['".to_string(),
                    });
                }
                chars[start..i].iter().collect()
            }
            '(' => {
                let mut depth = 1;
                i += 1;
                while i < chars.len() && depth > 0 {
                    if chars[i] == '\\' {
                        i += 2;
                        continue;
                    }
                    match chars[i] {
                        '(' => depth += 1,
                        ')' => depth -= 1,
                        _ => {}
                    }
                    i += 1;
                }
                if depth != 0 {
                    return Err(PatternError::PatternSyntax {
                        pos: start,
                        reason: "unbalanced '('".to_string(),
                    });
                }
                chars[start..i].iter().collect()
            }
            '*' | '+' | '?' | '{' => {
                return Err(PatternError::PatternSyntax {
                    pos: i,
                    reason: "quantifier with no preceding atom".to_string(),
                });
            }
            _ => {
                i += 1;
                chars[start..i].iter().collect()
            }
        };

        let mut quantifier = None;
        if i < chars.len() {
            match chars[i] {
                '*' | '+' | '?' => {
                    let mut q = String::new();
                    q.push(chars[i]);
                    i += 1;
                    if i < chars.len() && chars[i] == '?' {
                        q.push('?');
                        i += 1;
                    }
                    quantifier = Some(q);
                }
                '{' => {
                    let qstart = i;
                    i += 1;
                    while i < chars.len() && chars[i] != '}' {
                        i += 1;
                    }
                    if i >= chars.len() {
                        return Err(PatternError::PatternSyntax {
                            pos: qstart,
                            reason: "unbalanced '{'".to_string(),
                        });
                    }
                    i += 1;
                    let q: String = chars[qstart..i].iter().collect();
                    validate_bounded_quantifier(&q, qstart)?;
                    quantifier = Some(q);
                }
                _ => {}
            }
        }

        atoms.push(Atom { text, quantifier });
    }
    Ok(atoms)
}

fn validate_bounded_quantifier(q: &str, pos: usize) -> Result<(), PatternError> {
    let inner = &q[1..q.len() - 1];
    let parts: Vec<&str> = inner.splitn(2, ',').collect();
    let m: u32 = parts[0].parse().map_err(|_| PatternError::PatternSyntax {
        pos,
        reason: format!("invalid quantifier bound in {q}"),
    })?;
    if parts.len() == 2 && !parts[1].is_empty() {
        let n: u32 = parts[1].parse().map_err(|_| PatternError::PatternSyntax {
            pos,
            reason: format!("invalid quantifier bound in {q}"),
        })?;
        if n < m {
            return Err(PatternError::PatternSyntax {
                pos,
                reason: format!("quantifier {q} has n < m"),
            });
        }
    }
    Ok(())
}

/// Reverse one alternative (already split out of any top-level `|`) into
/// its prefix-matching form.
fn reverse_partial_pattern(alt: &str) -> Result<String, PatternError> {
    let atoms = tokenize_atoms(alt)?;
    let mut reversed_atoms: Vec<String> = Vec::with_capacity(atoms.len());

    for atom in atoms.iter() {
        let rendered = render_reversed_atom(atom)?;
        reversed_atoms.push(rendered);
    }

    // Reverse order; wrap every atom but the last (which, after reversal,
    // is the first atom of the original pattern and therefore the one that
    // must still be present for a meaningful partial match) as optional.
    reversed_atoms.reverse();
    let n = reversed_atoms.len();
    let mut out = String::new();
    out.push('(');
    for (idx, rendered) in reversed_atoms.iter().enumerate() {
        if idx + 1 == n {
            out.push_str(rendered);
        } else {
            out.push_str("(?:");
            out.push_str(rendered);
            out.push_str(")?");
        }
    }
    out.push(')');
    out.push_str(r"[\s\S]*");
    Ok(out)
}

fn render_reversed_atom(atom: &Atom) -> Result<String, PatternError> {
    let body = reverse_atom_body(&atom.text);
    let quant = match &atom.quantifier {
        None => String::new(),
        Some(q) if q == "*" || q == "*?" => "*?".to_string(),
        Some(q) if q == "+" => {
            // one mandatory copy followed by zero-or-more reluctant copies
            return Ok(format!("{body}{body}*?"));
        }
        Some(q) if q == "?" || q == "??" => "?".to_string(),
        Some(q) if q.starts_with('{') => {
            return Ok(expand_bounded_quantifier(&body, q));
        }
        Some(q) => q.clone(),
    };
    Ok(format!("{body}{quant}"))
}

/// `a{m,n}` → `m` unconditional copies followed by `n-m` optional copies.
fn expand_bounded_quantifier(body: &str, q: &str) -> String {
    let inner = &q[1..q.len() - 1];
    let parts: Vec<&str> = inner.splitn(2, ',').collect();
    let m: u32 = parts[0].parse().unwrap_or(0);
    let mut out = body.repeat(m as usize);
    if parts.len() == 2 {
        if parts[1].is_empty() {
            out.push_str(&format!("{body}*?"));
        } else {
            let n: u32 = parts[1].parse().unwrap_or(m);
            for _ in 0..(n.saturating_sub(m)) {
                out.push_str(&format!("{body}?"));
            }
        }
    }
    out
}

/// Reverse the literal character order inside a single atom's text. Escape
/// sequences (`\n`, `\d`, …), bracket expressions, and groups are kept as
/// single indivisible tokens — only bare literal runs get their characters
/// reversed (a multi-char literal atom only arises from the tokenizer
/// grouping consecutive plain characters, which `tokenize_atoms` does not
/// do — each plain character is its own atom — so this is effectively a
/// no-op for single chars and a structural passthrough for groups).
fn reverse_atom_body(text: &str) -> String {
    if text.starts_with('(') && text.ends_with(')') {
        // Parenthesized sub-expression: recursively reverse its contents,
        // one top-level alternative at a time.
        let inner = &text[1..text.len() - 1];
        let (prefix, body) = if let Some(rest) = inner.strip_prefix("?:") {
            ("?:", rest)
        } else {
            ("", inner)
        };
        match split_top_level_alternation(body) {
            Ok(alts) => {
                let reversed_alts: Vec<String> = alts
                    .iter()
                    .map(|a| reverse_partial_pattern(a).unwrap_or_else(|_| a.clone()))
                    .collect();
                format!("({}{})", prefix, reversed_alts.join("|"))
            }
            Err(_) => text.to_string(),
        }
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_match_short_circuits_reversed_form() {
        let p = PartialRegex::compile(r"hello").unwrap();
        let m = p.search("hello");
        assert_eq!(m.kind, MatchKind::Full);
    }

    #[test]
    fn detects_partial_suffix_of_literal() {
        let p = PartialRegex::compile(r"<tool_call>").unwrap();
        let m = p.search("<tool");
        assert_eq!(m.kind, MatchKind::Partial);
        assert_eq!(m.groups[0].str, "<tool");
    }

    #[test]
    fn no_match_when_suffix_is_not_a_prefix() {
        let p = PartialRegex::compile(r"<tool_call>").unwrap();
        let m = p.search("xyz");
        assert_eq!(m.kind, MatchKind::None);
    }

    #[test]
    fn splits_top_level_alternation_respecting_groups() {
        let alts = split_top_level_alternation(r"a(b|c)|d\|e").unwrap();
        assert_eq!(alts, vec![r"a(b|c)".to_string(), r"d\|e".to_string()]);
    }

    #[test]
    fn rejects_unbalanced_parens() {
        assert!(PartialRegex::compile("(abc").is_err());
    }

    #[test]
    fn star_quantifier_becomes_reluctant_in_reverse() {
        let reversed = reverse_partial_pattern("ab*").unwrap();
        assert!(reversed.contains("*?"));
    }
}
