//! JSON-Schema-constrained sub-parser (component E).
//!
//! Collects a JSON value via `json_partial` (component D), then validates
//! it against a declared schema with the `jsonschema` crate. Also produces
//! the schema-derived GBNF fragment (via `gbnf::json`) that the GBNF
//! generator (component F) layers into the sampler grammar.

use gbnf::Grammar;
use serde_json::Value;

use crate::errors::SchemaError;
use crate::json_partial::{self, JsonOutcome};

/// Outcome of evaluating a `Schema(e, rule_name, schema)` node: the same
/// full/partial shape as the underlying JSON sub-parser, plus a
/// `Failed`-like case for a complete value that didn't satisfy the schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaOutcome {
    Full { consumed: usize, value: Value },
    Partial { consumed: usize },
    Violated { at: usize, error: SchemaError },
}

/// Parse a JSON value at the start of `input` and validate it against
/// `schema`. A complete value that violates the schema is `Violated` at
/// the value's end position, never `Partial` — schema violation is a
/// property of a finished value, not something a longer buffer could fix.
pub fn parse_against_schema(input: &str, schema: &Value) -> SchemaOutcome {
    match json_partial::parse(input) {
        JsonOutcome::Complete { consumed, value } => match validate(&value, schema) {
            Ok(()) => SchemaOutcome::Full { consumed, value },
            Err(e) => SchemaOutcome::Violated { at: consumed, error: e },
        },
        JsonOutcome::Partial { consumed, .. } => SchemaOutcome::Partial { consumed },
        JsonOutcome::Invalid { at, error } => SchemaOutcome::Violated {
            at,
            error: SchemaError::Violation(error.to_string()),
        },
    }
}

fn validate(value: &Value, schema: &Value) -> Result<(), SchemaError> {
    let compiled = jsonschema::options()
        .build(schema)
        .map_err(|e| SchemaError::Violation(e.to_string()))?;
    match compiled.validate(value) {
        Ok(()) => Ok(()),
        Err(e) => Err(SchemaError::Violation(e.to_string())),
    }
}

/// Produce the GBNF grammar fragment a schema constrains generation to,
/// delegating to `gbnf::json::json_schema_to_grammar`.
pub fn schema_to_grammar(schema: &Value, rule_name: &str) -> Result<Grammar, SchemaError> {
    gbnf::json::json_schema_to_grammar(schema, rule_name).map_err(SchemaError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_value_passes() {
        let schema = json!({"type": "object", "properties": {"a": {"type": "integer"}}, "required": ["a"]});
        let outcome = parse_against_schema(r#"{"a":1}"#, &schema);
        assert!(matches!(outcome, SchemaOutcome::Full { .. }));
    }

    #[test]
    fn violation_is_reported_as_failure_not_partial() {
        let schema = json!({"type": "object", "properties": {"a": {"type": "string"}}, "required": ["a"]});
        let outcome = parse_against_schema(r#"{"a":1}"#, &schema);
        assert!(matches!(outcome, SchemaOutcome::Violated { .. }));
    }

    #[test]
    fn truncated_value_is_partial_regardless_of_schema() {
        let schema = json!({"type": "object"});
        let outcome = parse_against_schema(r#"{"a":1"#, &schema);
        assert!(matches!(outcome, SchemaOutcome::Partial { .. }));
    }

    #[test]
    fn schema_to_grammar_delegates_to_gbnf_crate() {
        let schema = json!({"type": "string"});
        let grammar = schema_to_grammar(&schema, "root").unwrap();
        assert!(grammar.to_gbnf().contains("root"));
    }
}
