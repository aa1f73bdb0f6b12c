//! Semantic validation of parsed queries.

use crate::ast::{Node, Term};
use crate::error::ValidationError;

/// Fields accepted by the query language.
const KNOWN_FIELDS: &[&str] = &[
    "in",
    "is",
    "repo",
    "repository",
    "org",
    "reason",
    "type",
    "subject_type",
    "author",
    "state",
    "read",
    "archived",
    "muted",
    "snoozed",
    "filtered",
    "tags",
];

/// Valid values for the `in:` operator.
const IN_VALUES: &[&str] = &["inbox", "archive", "snoozed", "filtered", "anywhere"];

/// Valid values for the `is:` operator.
const IS_VALUES: &[&str] = &[
    "unread", "read", "archived", "muted", "snoozed", "starred", "filtered",
];

/// Fields that take a boolean value.
const BOOLEAN_FIELDS: &[&str] = &["read", "archived", "muted", "snoozed", "filtered"];

/// Accepted boolean literals, case-insensitive.
const BOOLEAN_VALUES: &[&str] = &["true", "false", "yes", "no", "1", "0"];

/// Validates query ASTs against the known fields and their value sets.
///
/// Validation does not short-circuit: every violation in the tree is collected
/// so one call reports all problems at once.
pub struct Validator {
    problems: Vec<String>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// Creates a new validator.
    pub fn new() -> Self {
        Validator {
            problems: Vec::new(),
        }
    }

    /// Validates an AST. An absent AST (empty query) is valid.
    pub fn validate(mut self, node: Option<&Node>) -> Result<(), ValidationError> {
        let Some(node) = node else {
            return Ok(());
        };

        self.validate_node(node);

        if self.problems.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                problems: self.problems,
            })
        }
    }

    fn validate_node(&mut self, node: &Node) {
        match node {
            Node::Binary(bin) => {
                self.validate_node(&bin.left);
                self.validate_node(&bin.right);
            }
            Node::Not(inner) | Node::Paren(inner) => self.validate_node(inner),
            Node::Term(term) => self.validate_term(term),
            // Free text is always valid.
            Node::FreeText(_) => {}
        }
    }

    fn validate_term(&mut self, term: &Term) {
        let field = term.field.trim().to_lowercase();

        if !KNOWN_FIELDS.contains(&field.as_str()) {
            self.problems.push(format!("unknown field: {field}"));
            return;
        }

        match field.as_str() {
            "in" => self.validate_values(
                &term.values,
                IN_VALUES,
                "invalid value for in: operator",
                "(valid: inbox, archive, snoozed, filtered, anywhere)",
            ),
            "is" => self.validate_values(
                &term.values,
                IS_VALUES,
                "invalid value for is: operator",
                "(valid: unread, read, archived, muted, snoozed, starred, filtered)",
            ),
            f if BOOLEAN_FIELDS.contains(&f) => {
                for value in &term.values {
                    let value = value.trim().to_lowercase();
                    if !BOOLEAN_VALUES.contains(&value.as_str()) {
                        self.problems.push(format!(
                            "invalid boolean value for {field}: {value} (valid: true, false, yes, no, 1, 0)"
                        ));
                    }
                }
            }
            _ => {}
        }
    }

    fn validate_values(&mut self, values: &[String], valid: &[&str], label: &str, hint: &str) {
        for value in values {
            let value = value.trim().to_lowercase();
            if !valid.contains(&value.as_str()) {
                self.problems.push(format!("{label}: {value} {hint}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn validate(input: &str) -> Result<(), ValidationError> {
        let tokens = Lexer::new(input).tokenize().unwrap();
        let ast = Parser::new(tokens).parse().unwrap();
        Validator::new().validate(ast.as_ref())
    }

    #[test]
    fn test_validate_empty_query() {
        assert!(Validator::new().validate(None).is_ok());
    }

    #[test]
    fn test_validate_known_fields() {
        for query in [
            "in:inbox",
            "is:unread",
            "repo:cli",
            "repository:cli",
            "org:github",
            "reason:mention",
            "type:Issue",
            "subject_type:PullRequest",
            "author:octocat",
            "state:open",
            "read:true",
            "archived:false",
            "muted:yes",
            "snoozed:no",
            "filtered:1",
            "tags:triage",
        ] {
            assert!(validate(query).is_ok(), "expected {query:?} to validate");
        }
    }

    #[test]
    fn test_validate_unknown_field() {
        let err = validate("badfield:value").unwrap_err();
        assert!(err.to_string().contains("unknown field: badfield"));
    }

    #[test]
    fn test_validate_field_case_insensitive() {
        assert!(validate("REPO:cli").is_ok());
        assert!(validate("Is:unread").is_ok());
    }

    #[test]
    fn test_validate_in_values() {
        assert!(validate("in:inbox,archive,snoozed,filtered,anywhere").is_ok());

        let err = validate("in:badvalue").unwrap_err();
        assert!(err
            .to_string()
            .contains("invalid value for in: operator: badvalue"));
    }

    #[test]
    fn test_validate_is_values() {
        assert!(validate("is:unread,read,archived,muted,snoozed,starred,filtered").is_ok());

        let err = validate("is:nope").unwrap_err();
        assert!(err
            .to_string()
            .contains("invalid value for is: operator: nope"));
    }

    #[test]
    fn test_validate_boolean_values() {
        assert!(validate("muted:TRUE").is_ok());
        assert!(validate("read:0").is_ok());

        let err = validate("archived:maybe").unwrap_err();
        assert!(err
            .to_string()
            .contains("invalid boolean value for archived: maybe"));
    }

    #[test]
    fn test_validate_recurses_into_operators() {
        let err = validate("NOT (is:unread AND badfield:x)").unwrap_err();
        assert!(err.to_string().contains("unknown field: badfield"));
    }

    #[test]
    fn test_validate_collects_all_problems() {
        let err = validate("badfield:x in:nowhere is:huh").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unknown field: badfield"));
        assert!(msg.contains("invalid value for in: operator: nowhere"));
        assert!(msg.contains("invalid value for is: operator: huh"));
        assert_eq!(err.problems.len(), 3);
    }

    #[test]
    fn test_validate_free_text_always_valid() {
        assert!(validate("anything at all").is_ok());
    }
}
