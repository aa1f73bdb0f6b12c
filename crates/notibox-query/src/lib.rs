//! Search-query language for notibox.
//!
//! This crate implements the query DSL used to filter developer notifications,
//! with two interchangeable backends over one AST:
//!
//! - [`build_query`] compiles a query string into parameterized SQL fragments
//!   for listing notifications from storage;
//! - [`Evaluator`] re-answers the same query in memory for a single
//!   notification snapshot, which powers [action hints](hints).
//!
//! # Supported Syntax
//!
//! ## Terms
//! - `field:value` - filter by a field
//! - `field:a,b` - multiple values, OR'd within the term
//! - `-field:value` - negated term
//!
//! ## Fields
//! - `in:` - lifecycle view: inbox, archive, snoozed, filtered, anywhere
//! - `is:` - status: unread, read, archived, muted, snoozed, starred, filtered
//! - `repo:`/`repository:`, `org:`, `author:`, `reason:`, `type:`/`subject_type:`,
//!   `state:`, `tags:`
//! - `read:`, `archived:`, `muted:`, `snoozed:`, `filtered:` - booleans
//!
//! ## Boolean Operators
//! - `AND` (or adjacency), `OR`, `NOT` (or a leading `-`), `()` for grouping
//!
//! ## Free Text
//! - bare words and `"quoted phrases"` match across title, type, repository,
//!   author, state and number
//!
//! # Example
//!
//! ```
//! use notibox_query_rs::{build_query, Evaluator};
//! use notibox_query_rs::model::{Notification, Repository};
//!
//! // Compile to SQL fragments.
//! let query = build_query("repo:cli AND is:unread", 50, 0).unwrap();
//! assert_eq!(
//!     query.where_clauses,
//!     vec!["(r.full_name LIKE ? AND n.is_read = 0)", "n.muted = 0"]
//! );
//!
//! // Or evaluate in memory.
//! let evaluator = Evaluator::parse("repo:cli AND is:unread").unwrap();
//! let repo = Repository { id: 1, full_name: "cli/cli".to_string() };
//! let notif = Notification {
//!     subject_title: "Fix crash".to_string(),
//!     ..Notification::default()
//! };
//! assert!(evaluator.matches(&notif, Some(&repo)));
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod helpers;
pub mod hints;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod sql;
pub mod validator;

pub use ast::Node;
pub use error::{QueryError, QueryResult};
pub use eval::Evaluator;
pub use hints::{compute_action_hints, compute_action_hints_with_evaluator, ActionHints};
pub use sql::{build_query, NotificationQuery};

use lexer::Lexer;
use parser::Parser;
use validator::Validator;

/// Parses a query string into an AST without validating it.
///
/// Empty input yields `Ok(None)`; callers must distinguish "no query" from a
/// parse error.
pub fn parse(query: &str) -> QueryResult<Option<Node>> {
    let tokens = Lexer::new(query).tokenize()?;
    Ok(Parser::new(tokens).parse()?)
}

/// Parses a query string and validates it against the known fields.
///
/// This is the front half of both backends: [`build_query`] and
/// [`Evaluator::parse`] go through here.
pub fn parse_and_validate(query: &str) -> QueryResult<Option<Node>> {
    let ast = parse(query)?;
    Validator::new().validate(ast.as_ref())?;
    Ok(ast)
}
