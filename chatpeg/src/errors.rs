//! One `thiserror` enum per failing subsystem: granular error types with
//! `#[from]` conversions rather than a single flat catch-all.

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("malformed pattern at byte {pos}: {reason}")]
    PatternSyntax { pos: usize, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum PegBuildError {
    #[error("rule \"{0}\" is referenced but never defined")]
    UnresolvedRule(String),

    #[error("rule \"{0}\" is defined more than once")]
    DuplicateRule(String),

    #[error("rule \"{0}\" left-recurses through: {1:?}")]
    LeftRecursion(String, Vec<String>),
}

#[derive(Debug, thiserror::Error)]
pub enum JsonPartialError {
    #[error("unexpected byte {found:?} at position {pos}, expected one of {expected}")]
    UnexpectedByte {
        pos: usize,
        found: char,
        expected: String,
    },

    #[error("input ended with no value started")]
    EmptyInput,
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("could not translate schema to grammar: {0}")]
    Translation(String),

    #[error("value does not satisfy schema: {0}")]
    Violation(String),
}

impl From<gbnf::json::JsonSchemaError> for SchemaError {
    fn from(e: gbnf::json::JsonSchemaError) -> Self {
        SchemaError::Translation(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("parse failed at byte {at}, expected one of {expected:?}")]
    ParseFailed { at: usize, expected: Vec<String> },

    #[error("tool arguments violate their declared schema: {0}")]
    SchemaViolation(#[from] SchemaError),

    #[error("tool arguments are not valid JSON: {0}")]
    JsonMalformed(#[from] JsonPartialError),
}
