//! Error types for the query engine.

use thiserror::Error;

use crate::lexer::LexError;

/// A specialized Result type for query engine operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors that can occur while parsing a query into an AST.
///
/// Each variant is a distinct syntax failure so callers can render specific
/// messages; all carry the byte position of the offending token.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// A complete expression was parsed but input remained.
    #[error("unexpected token after expression: {token} at position {pos}")]
    UnexpectedTokenAfterExpression {
        /// The leftover token.
        token: String,
        /// Byte offset of the leftover token.
        pos: usize,
    },

    /// A `)` with no matching `(`.
    #[error("unexpected closing parenthesis at position {pos}")]
    UnexpectedClosingParen {
        /// Byte offset of the parenthesis.
        pos: usize,
    },

    /// A token that cannot start or continue an expression.
    #[error("unexpected token: {token} at position {pos}")]
    UnexpectedToken {
        /// The unexpected token.
        token: String,
        /// Byte offset of the token.
        pos: usize,
    },

    /// Expected a `(` to open a group.
    #[error("expected opening parenthesis at position {pos}")]
    ExpectedOpeningParen {
        /// Byte offset where the parenthesis was expected.
        pos: usize,
    },

    /// A group was opened but never closed.
    #[error("expected closing parenthesis at position {pos}, got {got}")]
    ExpectedClosingParen {
        /// Byte offset of the token found instead.
        pos: usize,
        /// The token found instead.
        got: String,
    },

    /// A colon appeared with no field name before it.
    #[error("expected field name at position {pos}")]
    ExpectedFieldName {
        /// Byte offset where the field name was expected.
        pos: usize,
    },

    /// A field name was not followed by a colon.
    #[error("expected colon after field {field:?} at position {pos}")]
    ExpectedColon {
        /// The field that lacked its colon.
        field: String,
        /// Byte offset of the token found instead.
        pos: usize,
    },

    /// A colon was not followed by a value.
    #[error("expected value after colon at position {pos}, got {got}")]
    ExpectedValue {
        /// Byte offset of the token found instead.
        pos: usize,
        /// The token found instead.
        got: String,
    },

    /// A term's value list ended up empty.
    #[error("expected at least one value for field {field:?}")]
    ExpectedAtLeastOneValue {
        /// The field with no values.
        field: String,
    },
}

/// Error produced by the validator.
///
/// Validation does not short-circuit: every problem in the tree is collected
/// and joined into one message, so a single call reports everything at once.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("validation failed: {}", problems.join("; "))]
pub struct ValidationError {
    /// All violations found, in tree order.
    pub problems: Vec<String>,
}

/// Umbrella error for the full query pipeline (lex, parse, validate).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// Tokenization failed.
    #[error("tokenization failed: {0}")]
    Lex(#[from] LexError),

    /// Parsing failed.
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    /// The parsed query references unknown fields or invalid values.
    #[error("{0}")]
    Validation(#[from] ValidationError),
}
