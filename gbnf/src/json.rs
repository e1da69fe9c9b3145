//! Translates a JSON Schema document into a GBNF grammar fragment that
//! constrains token sampling to JSON text matching that schema.
//!
//! A recursive walk over the schema tree that allocates a fresh rule per
//! subschema and wires `$ref`/`$defs` into shared rules instead of inlining
//! them, which would blow up recursive schemas.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::builder::{alt, nt, nt_opt, nt_plus, nt_star, not_chars, seq, t, t_opt, GrammarBuilder};
use crate::{CharacterSet, CharacterSetItem, Production, ProductionItem, RepetitionType};
use crate::Grammar;

#[derive(Debug)]
pub enum JsonSchemaError {
    InvalidSchema(String),
    UnsupportedFeature(String),
    UnresolvedRef(String),
}

impl fmt::Display for JsonSchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonSchemaError::InvalidSchema(s) => write!(f, "invalid json schema: {s}"),
            JsonSchemaError::UnsupportedFeature(s) => write!(f, "unsupported schema feature: {s}"),
            JsonSchemaError::UnresolvedRef(s) => write!(f, "unresolved $ref: {s}"),
        }
    }
}

impl std::error::Error for JsonSchemaError {}

/// Convert a JSON Schema document into a grammar whose root rule is
/// `root_name` and which accepts exactly the JSON texts the schema allows
/// (modulo whitespace, which is always permitted between tokens).
pub fn json_schema_to_grammar(schema: &Value, root_name: &str) -> Result<Grammar, JsonSchemaError> {
    let mut conv = Converter {
        defs: HashMap::new(),
        converted_refs: HashMap::new(),
        rule_counter: 0,
        rules: Vec::new(),
    };
    conv.extract_definitions(schema);
    let root_items = conv.convert(schema, Some(root_name))?;

    let mut builder = add_json_primitives(GrammarBuilder::new());
    for (name, items) in conv.rules {
        builder = builder.rule(&name, items);
    }
    let builder = builder.rule(root_name, root_items).root(root_name);
    Ok(builder.build())
}

struct Converter {
    defs: HashMap<String, Value>,
    converted_refs: HashMap<String, String>,
    rule_counter: u32,
    rules: Vec<(String, Vec<ProductionItem>)>,
}

impl Converter {
    fn extract_definitions(&mut self, schema: &Value) {
        for key in ["$defs", "definitions"] {
            if let Some(Value::Object(map)) = schema.get(key) {
                for (name, sub) in map {
                    self.defs.insert(name.clone(), sub.clone());
                }
            }
        }
    }

    fn next_rule_name(&mut self, prefix: &str) -> String {
        self.rule_counter += 1;
        format!("{prefix}-{}", self.rule_counter)
    }

    /// Allocate a rule for `items` under a name derived from `hint`, push it
    /// to the rule list, and return a single non-terminal reference to it.
    fn hoist(&mut self, hint: &str, items: Vec<ProductionItem>) -> ProductionItem {
        let rule_name = self.next_rule_name(hint);
        self.rules.push((rule_name.clone(), items));
        nt(&rule_name)
    }

    /// Convert `schema` into production items usable directly inline.
    /// `hint` names the rules this call may need to hoist out (e.g. object
    /// field rules, array item rules); it need not be globally unique since
    /// `next_rule_name` appends a counter.
    fn convert(&mut self, schema: &Value, hint: Option<&str>) -> Result<Vec<ProductionItem>, JsonSchemaError> {
        let hint = hint.unwrap_or("val");

        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            return Ok(vec![self.convert_ref(reference)?]);
        }

        if let Some(Value::Array(variants)) = schema.get("oneOf").or_else(|| schema.get("anyOf")) {
            let alternatives = variants
                .iter()
                .map(|v| self.convert(v, Some(hint)))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(vec![alt(alternatives)]);
        }

        if let Some(Value::Array(all)) = schema.get("allOf") {
            let mut items = Vec::new();
            for sub in all {
                items.extend(self.convert(sub, Some(hint))?);
            }
            return Ok(items);
        }

        if let Some(Value::Array(values)) = schema.get("enum") {
            let alternatives = values
                .iter()
                .map(|v| Ok(vec![t(&json_literal(v)?)]))
                .collect::<Result<Vec<_>, JsonSchemaError>>()?;
            return Ok(vec![alt(alternatives)]);
        }

        if let Some(const_val) = schema.get("const") {
            return Ok(vec![t(&json_literal(const_val)?)]);
        }

        let ty = schema.get("type").and_then(Value::as_str).unwrap_or("any");
        match ty {
            "object" => self.convert_object(schema, hint),
            "array" => self.convert_array(schema, hint),
            "string" => Ok(vec![nt("json-string")]),
            "number" => Ok(vec![nt("json-number")]),
            "integer" => Ok(vec![nt("json-integer")]),
            "boolean" => Ok(vec![nt("json-boolean")]),
            "null" => Ok(vec![t("null")]),
            "any" => Ok(vec![nt("json-value")]),
            other => Err(JsonSchemaError::UnsupportedFeature(format!(
                "schema type \"{other}\""
            ))),
        }
    }

    fn convert_ref(&mut self, reference: &str) -> Result<ProductionItem, JsonSchemaError> {
        if let Some(rule_name) = self.converted_refs.get(reference) {
            return Ok(nt(rule_name));
        }
        let key = reference
            .rsplit('/')
            .next()
            .ok_or_else(|| JsonSchemaError::UnresolvedRef(reference.to_string()))?;
        let sub = self
            .defs
            .get(key)
            .cloned()
            .ok_or_else(|| JsonSchemaError::UnresolvedRef(reference.to_string()))?;

        let rule_name = self.next_rule_name(key);
        // Reserve the name before recursing so a self-referential $def
        // resolves to this same rule instead of recursing forever.
        self.converted_refs
            .insert(reference.to_string(), rule_name.clone());
        let items = self.convert(&sub, Some(key))?;
        self.rules.push((rule_name.clone(), items));
        Ok(nt(&rule_name))
    }

    fn convert_object(&mut self, schema: &Value, hint: &str) -> Result<Vec<ProductionItem>, JsonSchemaError> {
        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            return Ok(vec![nt("json-object")]);
        };
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut fields = Vec::new();
        for (key, sub_schema) in properties {
            let value_items = self.convert(sub_schema, Some(&format!("{hint}-{key}")))?;
            let field_items = seq(&[t(&json_literal(&Value::String(key.clone()))?), t(":"), nt("ws")])
                .into_iter()
                .chain(value_items)
                .collect();
            let field_ref = self.hoist(&format!("{hint}-{key}"), field_items);
            fields.push((field_ref, required.contains(&key.as_str())));
        }

        let mut items = vec![t("{"), nt("ws")];
        for (i, (field_ref, is_required)) in fields.into_iter().enumerate() {
            if i > 0 {
                items.push(t(","));
                items.push(nt("ws"));
            }
            if is_required {
                items.push(field_ref);
            } else {
                items.push(wrap_optional(field_ref));
            }
        }
        items.push(nt("ws"));
        items.push(t("}"));
        Ok(items)
    }

    fn convert_array(&mut self, schema: &Value, hint: &str) -> Result<Vec<ProductionItem>, JsonSchemaError> {
        let item_items = match schema.get("items") {
            Some(sub) => self.convert(sub, Some(&format!("{hint}-item")))?,
            None => vec![nt("json-value")],
        };
        let item_ref = self.hoist(&format!("{hint}-item"), item_items);

        let tail = ProductionItem::Group(
            vec![Production {
                items: seq(&[t(","), nt("ws"), item_ref.clone()]),
            }],
            RepetitionType::ZeroOrMore,
        );
        let body = self.hoist(
            &format!("{hint}-items"),
            vec![item_ref, nt("ws"), tail],
        );

        Ok(vec![t("["), nt("ws"), wrap_optional(body), nt("ws"), t("]")])
    }
}

/// Wrap a single production item in an optional group: `(item)?`.
fn wrap_optional(item: ProductionItem) -> ProductionItem {
    ProductionItem::Group(vec![Production { items: vec![item] }], RepetitionType::ZeroOrOne)
}

fn json_literal(v: &Value) -> Result<String, JsonSchemaError> {
    serde_json::to_string(v).map_err(|e| JsonSchemaError::InvalidSchema(e.to_string()))
}

fn char_class(items: Vec<CharacterSetItem>) -> ProductionItem {
    ProductionItem::CharacterSet(
        CharacterSet {
            is_complement: false,
            items,
        },
        RepetitionType::One,
    )
}

/// The shared JSON-value vocabulary (numbers, strings, booleans, a fully
/// generic `json-value`) every converted grammar depends on, plus `ws`.
fn add_json_primitives(builder: GrammarBuilder) -> GrammarBuilder {
    let digit = || char_class(vec![CharacterSetItem::Range('0', '9')]);
    builder
        .recurring_rule(
            "ws",
            vec![ProductionItem::CharacterSet(
                CharacterSet {
                    is_complement: false,
                    items: vec![
                        CharacterSetItem::Character(' '),
                        CharacterSetItem::Character('\t'),
                        CharacterSetItem::Character('\n'),
                    ],
                },
                RepetitionType::ZeroOrMore,
            )],
        )
        .recurring_rule(
            "json-boolean",
            vec![alt(vec![vec![t("true")], vec![t("false")]])],
        )
        .recurring_rule("json-digit", vec![digit()])
        .recurring_rule(
            "json-integer",
            seq(&[t_opt("-"), nt_plus("json-digit")]),
        )
        .recurring_rule(
            "json-number",
            seq(&[
                nt("json-integer"),
                nt_opt("json-frac"),
                nt_opt("json-exp"),
            ]),
        )
        .recurring_rule("json-frac", seq(&[t("."), nt_plus("json-digit")]))
        .recurring_rule(
            "json-exp",
            seq(&[
                alt(vec![vec![t("e")], vec![t("E")]]),
                t_opt("+"),
                nt_plus("json-digit"),
            ]),
        )
        .recurring_rule(
            "json-char",
            vec![alt(vec![
                vec![not_chars(&['"', '\\'])],
                vec![
                    t("\\"),
                    char_class(vec![
                        CharacterSetItem::Character('"'),
                        CharacterSetItem::Character('\\'),
                        CharacterSetItem::Character('/'),
                        CharacterSetItem::Character('b'),
                        CharacterSetItem::Character('f'),
                        CharacterSetItem::Character('n'),
                        CharacterSetItem::Character('r'),
                        CharacterSetItem::Character('t'),
                        CharacterSetItem::Character('u'),
                    ]),
                ],
            ])],
        )
        .recurring_rule("json-string", seq(&[t("\""), nt_star("json-char"), t("\"")]))
        .recurring_rule("json-object", seq(&[t("{"), nt("ws"), t("}")]))
        .recurring_rule(
            "json-value",
            vec![alt(vec![
                vec![nt("json-string")],
                vec![nt("json-number")],
                vec![nt("json-boolean")],
                vec![t("null")],
            ])],
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_flat_object_schema() {
        let schema = json!({
            "type": "object",
            "properties": {
                "city": {"type": "string"},
                "days": {"type": "integer"}
            },
            "required": ["city"]
        });
        let grammar = json_schema_to_grammar(&schema, "root").unwrap();
        let text = grammar.to_gbnf();
        assert!(text.contains("root ::="));
        assert!(text.contains("json-string"));
    }

    #[test]
    fn converts_enum_schema() {
        let schema = json!({"enum": ["celsius", "fahrenheit"]});
        let grammar = json_schema_to_grammar(&schema, "unit").unwrap();
        let text = grammar.to_gbnf();
        assert!(text.contains("\"celsius\""));
        assert!(text.contains("\"fahrenheit\""));
    }

    #[test]
    fn resolves_ref_to_defs() {
        let schema = json!({
            "$ref": "#/$defs/Point",
            "$defs": {
                "Point": {
                    "type": "object",
                    "properties": {"x": {"type": "number"}, "y": {"type": "number"}},
                    "required": ["x", "y"]
                }
            }
        });
        let grammar = json_schema_to_grammar(&schema, "root").unwrap();
        assert!(grammar.to_gbnf().contains("json-number"));
    }

    #[test]
    fn converts_array_of_strings() {
        let schema = json!({"type": "array", "items": {"type": "string"}});
        let grammar = json_schema_to_grammar(&schema, "root").unwrap();
        let text = grammar.to_gbnf();
        assert!(text.contains("root ::="));
        assert!(text.contains("json-string"));
    }
}
