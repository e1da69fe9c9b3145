//! Embedded JSON sub-parser with partial healing (component D).
//!
//! Grounded in `original_source/common/json-partial.h`'s 12-state flag
//! enum, modeled here as a Rust sum type (`JsonCursorState`) instead of a
//! bitset so mutual exclusivity of the states is the compiler's problem,
//! not the caller's. The state is tracked explicitly as
//! parsing proceeds (set right before every point that can hit end-of-input)
//! rather than guessed after the fact from the container stack, since two
//! different truncation points can leave an identical stack shape.

use serde_json::Value;

use crate::errors::JsonPartialError;

/// Where the cursor was when the input ran out: one of 12 distinct points a
/// JSON value can be truncated mid-parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonCursorState {
    ValueInsideIdent,
    ValueInsideString,
    ValueInsideStringAfterEscape,
    DictBeforeKey,
    DictInsideKey,
    DictAfterKey,
    DictBeforeValue,
    DictInsideValue,
    DictAfterValue,
    ArrayBeforeValue,
    ArrayInsideValue,
    ArrayAfterValue,
}

/// What it would take to turn a truncated JSON value into well-formed
/// JSON: a literal suffix of closing syntax (`nesting_closure`), the keys
/// still open at each enclosing level (`name_stack`), and the state the
/// cursor was in (which determines whether a value placeholder needs to be
/// inserted before the closures, e.g. completing a dangling `"key":`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealingMarker {
    pub state: JsonCursorState,
    pub nesting_closure: String,
    pub name_stack: Vec<String>,
}

impl HealingMarker {
    /// Produce the literal text to append to the truncated source so it
    /// becomes parseable JSON.
    pub fn heal(&self, truncated_source: &str) -> String {
        let mut healed = truncated_source.to_string();
        match self.state {
            JsonCursorState::ValueInsideString | JsonCursorState::ValueInsideStringAfterEscape => {
                healed.push('"');
            }
            JsonCursorState::DictInsideKey => healed.push_str("\":null"),
            JsonCursorState::DictAfterKey => healed.push_str(":null"),
            JsonCursorState::DictBeforeValue => healed.push_str("null"),
            JsonCursorState::ValueInsideIdent
            | JsonCursorState::DictBeforeKey
            | JsonCursorState::DictInsideValue
            | JsonCursorState::DictAfterValue
            | JsonCursorState::ArrayBeforeValue
            | JsonCursorState::ArrayInsideValue
            | JsonCursorState::ArrayAfterValue => {}
        }
        healed.push_str(&self.nesting_closure);
        healed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsonOutcome {
    Complete { consumed: usize, value: Value },
    Partial { consumed: usize, healing: HealingMarker },
    Invalid { at: usize, error: JsonPartialError },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

/// Parse one JSON value starting at byte 0 of `input`. Returns `Complete`
/// if a full value was consumed, `Partial` with a healing marker if the
/// input ran out mid-value, or `Invalid` if the input is not a prefix of
/// any valid JSON value at all (e.g. starts with a byte no JSON value can
/// start with).
pub fn parse(input: &str) -> JsonOutcome {
    let mut cursor = Cursor {
        bytes: input.as_bytes(),
        pos: 0,
        stack: Vec::new(),
        name_stack: Vec::new(),
        state: JsonCursorState::ValueInsideIdent,
    };
    match cursor.parse_value() {
        Ok(Some(value)) => JsonOutcome::Complete {
            consumed: cursor.pos,
            value,
        },
        Ok(None) => JsonOutcome::Partial {
            consumed: cursor.pos,
            healing: cursor.healing_marker(),
        },
        Err(e) => JsonOutcome::Invalid { at: cursor.pos, error: e },
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    /// Enclosing containers, outermost first.
    stack: Vec<Container>,
    /// Pending/most-recent key at each object level, outermost first.
    name_stack: Vec<String>,
    /// The cursor state as of the most recent thing it was about to do;
    /// meaningful only once parsing stops with `Ok(None)`.
    state: JsonCursorState,
}

impl<'a> Cursor<'a> {
    fn eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            if b == b' ' || b == b'\t' || b == b'\n' || b == b'\r' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Returns `Ok(Some(value))` on a complete value, `Ok(None)` if the
    /// input ran out partway through (`self.state` records where), or
    /// `Err` if the bytes present cannot begin any JSON value.
    fn parse_value(&mut self) -> Result<Option<Value>, JsonPartialError> {
        self.skip_ws();
        let Some(b) = self.peek() else {
            return Ok(None);
        };
        match b {
            b'"' => self.parse_string(false).map(|s| s.map(Value::String)),
            b'{' => self.parse_object(),
            b'[' => self.parse_array(),
            b't' | b'f' | b'n' => self.parse_ident(),
            b'-' | b'0'..=b'9' => self.parse_number(),
            other => Err(JsonPartialError::UnexpectedByte {
                pos: self.pos,
                found: other as char,
                expected: "a JSON value".to_string(),
            }),
        }
    }

    fn parse_string(&mut self, is_key: bool) -> Result<Option<String>, JsonPartialError> {
        debug_assert_eq!(self.peek(), Some(b'"'));
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => {
                    self.state = if is_key {
                        JsonCursorState::DictInsideKey
                    } else {
                        JsonCursorState::ValueInsideString
                    };
                    return Ok(None);
                }
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(Some(out));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        None => {
                            self.state = if is_key {
                                JsonCursorState::DictInsideKey
                            } else {
                                JsonCursorState::ValueInsideStringAfterEscape
                            };
                            return Ok(None);
                        }
                        Some(b'n') => {
                            out.push('\n');
                            self.pos += 1;
                        }
                        Some(b't') => {
                            out.push('\t');
                            self.pos += 1;
                        }
                        Some(b'r') => {
                            out.push('\r');
                            self.pos += 1;
                        }
                        Some(c @ (b'"' | b'\\' | b'/')) => {
                            out.push(c as char);
                            self.pos += 1;
                        }
                        Some(b'u') => {
                            self.pos += 1;
                            if self.pos + 4 > self.bytes.len() {
                                self.state = if is_key {
                                    JsonCursorState::DictInsideKey
                                } else {
                                    JsonCursorState::ValueInsideStringAfterEscape
                                };
                                return Ok(None);
                            }
                            let hex = std::str::from_utf8(&self.bytes[self.pos..self.pos + 4])
                                .ok()
                                .and_then(|s| u32::from_str_radix(s, 16).ok());
                            match hex.and_then(char::from_u32) {
                                Some(c) => out.push(c),
                                None => {
                                    return Err(JsonPartialError::UnexpectedByte {
                                        pos: self.pos,
                                        found: 'u',
                                        expected: "4 hex digits".to_string(),
                                    })
                                }
                            }
                            self.pos += 4;
                        }
                        Some(other) => {
                            return Err(JsonPartialError::UnexpectedByte {
                                pos: self.pos,
                                found: other as char,
                                expected: "a valid escape".to_string(),
                            })
                        }
                    }
                }
                Some(_) => {
                    // Advance by one full UTF-8 char so multi-byte text
                    // isn't split.
                    let rest = std::str::from_utf8(&self.bytes[self.pos..]).unwrap_or("");
                    if let Some(c) = rest.chars().next() {
                        out.push(c);
                        self.pos += c.len_utf8();
                    } else {
                        self.pos += 1;
                    }
                }
            }
        }
    }

    fn parse_ident(&mut self) -> Result<Option<Value>, JsonPartialError> {
        for (lit, value) in [("true", Value::Bool(true)), ("false", Value::Bool(false)), ("null", Value::Null)] {
            let remaining = &self.bytes[self.pos..];
            if remaining.len() >= lit.len() && &remaining[..lit.len()] == lit.as_bytes() {
                self.pos += lit.len();
                return Ok(Some(value));
            }
            if lit.as_bytes().starts_with(remaining) {
                self.pos = self.bytes.len();
                self.state = JsonCursorState::ValueInsideIdent;
                return Ok(None);
            }
        }
        Err(JsonPartialError::UnexpectedByte {
            pos: self.pos,
            found: self.peek().unwrap_or(b'?') as char,
            expected: "true, false, or null".to_string(),
        })
    }

    fn parse_number(&mut self) -> Result<Option<Value>, JsonPartialError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let mut saw_digit = false;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
            saw_digit = true;
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }
        if !saw_digit {
            self.state = JsonCursorState::ValueInsideIdent;
            return Ok(None);
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap();
        text.parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(|n| Some(Value::Number(n)))
            .ok_or(JsonPartialError::UnexpectedByte {
                pos: start,
                found: text.chars().next().unwrap_or('?'),
                expected: "a number".to_string(),
            })
    }

    fn parse_object(&mut self) -> Result<Option<Value>, JsonPartialError> {
        debug_assert_eq!(self.peek(), Some(b'{'));
        self.pos += 1;
        self.stack.push(Container::Object);
        let mut map = serde_json::Map::new();
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            self.stack.pop();
            return Ok(Some(Value::Object(map)));
        }
        loop {
            self.skip_ws();
            if self.eof() {
                self.state = JsonCursorState::DictBeforeKey;
                return Ok(None);
            }
            if self.peek() != Some(b'"') {
                return Err(JsonPartialError::UnexpectedByte {
                    pos: self.pos,
                    found: self.peek().unwrap() as char,
                    expected: "a quoted key".to_string(),
                });
            }
            let Some(key) = self.parse_string(true)? else {
                return Ok(None);
            };
            self.name_stack.push(key.clone());
            self.skip_ws();
            if self.eof() {
                self.state = JsonCursorState::DictAfterKey;
                return Ok(None);
            }
            if self.peek() != Some(b':') {
                return Err(JsonPartialError::UnexpectedByte {
                    pos: self.pos,
                    found: self.peek().unwrap() as char,
                    expected: "':'".to_string(),
                });
            }
            self.pos += 1;
            self.skip_ws();
            if self.eof() {
                self.state = JsonCursorState::DictBeforeValue;
                return Ok(None);
            }
            let Some(value) = self.parse_value()? else {
                return Ok(None);
            };
            map.insert(key, value);
            self.name_stack.pop();
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    continue;
                }
                Some(b'}') => {
                    self.pos += 1;
                    self.stack.pop();
                    return Ok(Some(Value::Object(map)));
                }
                None => {
                    self.state = JsonCursorState::DictAfterValue;
                    return Ok(None);
                }
                Some(other) => {
                    return Err(JsonPartialError::UnexpectedByte {
                        pos: self.pos,
                        found: other as char,
                        expected: "',' or '}'".to_string(),
                    })
                }
            }
        }
    }

    fn parse_array(&mut self) -> Result<Option<Value>, JsonPartialError> {
        debug_assert_eq!(self.peek(), Some(b'['));
        self.pos += 1;
        self.stack.push(Container::Array);
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            self.stack.pop();
            return Ok(Some(Value::Array(items)));
        }
        loop {
            self.skip_ws();
            if self.eof() {
                self.state = JsonCursorState::ArrayBeforeValue;
                return Ok(None);
            }
            let Some(value) = self.parse_value()? else {
                return Ok(None);
            };
            items.push(value);
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    continue;
                }
                Some(b']') => {
                    self.pos += 1;
                    self.stack.pop();
                    return Ok(Some(Value::Array(items)));
                }
                None => {
                    self.state = JsonCursorState::ArrayAfterValue;
                    return Ok(None);
                }
                Some(other) => {
                    return Err(JsonPartialError::UnexpectedByte {
                        pos: self.pos,
                        found: other as char,
                        expected: "',' or ']'".to_string(),
                    })
                }
            }
        }
    }

    fn healing_marker(&self) -> HealingMarker {
        let nesting_closure: String = self
            .stack
            .iter()
            .rev()
            .map(|c| match c {
                Container::Object => '}',
                Container::Array => ']',
            })
            .collect();

        HealingMarker {
            state: self.state,
            nesting_closure,
            name_stack: self.name_stack.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_object() {
        let outcome = parse(r#"{"a":1,"b":2}"#);
        match outcome {
            JsonOutcome::Complete { consumed, value } => {
                assert_eq!(consumed, 13);
                assert_eq!(value["a"], 1);
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn bare_literal_at_eof_is_complete() {
        assert!(matches!(parse("true"), JsonOutcome::Complete { .. }));
        assert!(matches!(parse("null"), JsonOutcome::Complete { .. }));
    }

    #[test]
    fn bare_number_at_eof_is_complete() {
        match parse("123") {
            JsonOutcome::Complete { consumed, value } => {
                assert_eq!(consumed, 3);
                assert_eq!(value, 123);
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }

    #[test]
    fn unterminated_string_is_partial_needing_quote() {
        let outcome = parse(r#"{"a":"hello"#);
        match outcome {
            JsonOutcome::Partial { healing, .. } => {
                assert_eq!(healing.state, JsonCursorState::ValueInsideString);
                assert_eq!(healing.heal(r#"{"a":"hello"#), r#"{"a":"hello"}"#);
            }
            other => panic!("expected Partial, got {other:?}"),
        }
    }

    #[test]
    fn string_ending_in_escape_is_after_escape_state() {
        let outcome = parse(r#""abc\"#);
        match outcome {
            JsonOutcome::Partial { healing, .. } => {
                assert_eq!(healing.state, JsonCursorState::ValueInsideStringAfterEscape);
            }
            other => panic!("expected Partial, got {other:?}"),
        }
    }

    #[test]
    fn dangling_key_heals_with_null() {
        let outcome = parse(r#"{"a""#);
        if let JsonOutcome::Partial { healing, .. } = outcome {
            assert_eq!(healing.state, JsonCursorState::DictAfterKey);
            assert_eq!(healing.heal(r#"{"a""#), r#"{"a":null}"#);
        } else {
            panic!("expected Partial");
        }
    }

    #[test]
    fn truncated_key_heals_to_null_value() {
        let outcome = parse(r#"{"ab"#);
        if let JsonOutcome::Partial { healing, .. } = outcome {
            assert_eq!(healing.state, JsonCursorState::DictInsideKey);
            assert_eq!(healing.heal(r#"{"ab"#), r#"{"ab":null}"#);
        } else {
            panic!("expected Partial");
        }
    }

    #[test]
    fn nested_containers_close_in_reverse_order() {
        let outcome = parse(r#"{"a":[1,2,{"b":3"#);
        if let JsonOutcome::Partial { healing, .. } = outcome {
            assert_eq!(healing.nesting_closure, "}]}");
        } else {
            panic!("expected Partial");
        }
    }

    #[test]
    fn invalid_start_byte_is_invalid() {
        assert!(matches!(parse("xyz"), JsonOutcome::Invalid { .. }));
    }
}
