//! SQL compilation of query ASTs.
//!
//! Translates a validated AST into parameterized WHERE-clause fragments, bound
//! arguments and JOIN clauses. The caller assembles the final statement by
//! AND-ing the fragments and binding the arguments positionally.

use crate::ast::{BinaryExpr, FreeText, Node, Term};
use crate::error::QueryResult;
use crate::helpers::{default_filter, DefaultFilter};
use crate::parse_and_validate;

/// SQLite expression for the current time, formatted to match the stored
/// RFC3339 timestamps so string comparison is chronological.
const SQLITE_NOW_FN: &str = "strftime('%Y-%m-%dT%H:%M:%SZ', 'now')";

/// The repositories join, added whenever a compiled fragment references `r.*`.
pub const REPOSITORIES_JOIN: &str = "LEFT JOIN repositories r ON r.id = n.repository_id";

/// A compiled notification query.
///
/// `where_clauses` are boolean SQL expressions the caller ANDs together;
/// `args` are the values for the `?` placeholders, in order; `joins` is a
/// de-duplicated list of JOIN clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationQuery {
    /// WHERE fragments, to be AND-ed by the caller.
    pub where_clauses: Vec<String>,
    /// Bound arguments matching the `?` placeholders in order.
    pub args: Vec<String>,
    /// JOIN clauses, de-duplicated.
    pub joins: Vec<String>,
    /// Page size.
    pub limit: i64,
    /// Page offset.
    pub offset: i64,
}

/// Compiles a query string into a [`NotificationQuery`].
///
/// Pipeline: lex → parse → validate → compile → apply the shared
/// default-filter policy. The policy clauses are appended after the main
/// expression:
/// - empty query → the four inbox-default clauses;
/// - query with an `in:` operator → nothing extra;
/// - any other query → `n.muted = 0`, unless it explicitly asks for muted.
///
/// Lexer, parser and validator errors propagate; compilation of a validated
/// AST itself cannot fail.
pub fn build_query(query: &str, limit: i64, offset: i64) -> QueryResult<NotificationQuery> {
    let ast = parse_and_validate(query)?;

    let mut compiled = SqlBuilder::new().build(ast.as_ref());

    match default_filter(ast.as_ref()) {
        DefaultFilter::InboxDefaults => {
            compiled.where_clauses.extend(inbox_default_clauses());
        }
        DefaultFilter::MutedOnly => {
            compiled.where_clauses.push("n.muted = 0".to_string());
        }
        DefaultFilter::None => {}
    }

    compiled.limit = limit;
    compiled.offset = offset;
    Ok(compiled)
}

/// The four inbox-default WHERE clauses: exclude archived, actively snoozed,
/// muted and filtered notifications.
fn inbox_default_clauses() -> Vec<String> {
    vec![
        "n.archived = 0".to_string(),
        format!("(n.snoozed_until IS NULL OR n.snoozed_until <= {SQLITE_NOW_FN})"),
        "n.muted = 0".to_string(),
        "n.filtered = 0".to_string(),
    ]
}

/// Builds SQL fragments from AST nodes.
///
/// A pure translation: no default filters are applied here. Unknown fields or
/// values cannot survive validation; if a hand-built tree carries one anyway
/// it compiles to the never-matching literal `0`, mirroring the evaluator.
pub struct SqlBuilder {
    joins: Vec<String>,
    args: Vec<String>,
}

impl Default for SqlBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        SqlBuilder {
            joins: Vec::new(),
            args: Vec::new(),
        }
    }

    /// Compiles an AST into a query with no default filters and zero
    /// limit/offset.
    pub fn build(mut self, node: Option<&Node>) -> NotificationQuery {
        let mut where_clauses = Vec::new();
        if let Some(node) = node {
            where_clauses.push(self.visit_node(node));
        }

        NotificationQuery {
            where_clauses,
            args: self.args,
            joins: self.joins,
            limit: 0,
            offset: 0,
        }
    }

    fn visit_node(&mut self, node: &Node) -> String {
        match node {
            Node::Binary(bin) => self.visit_binary(bin),
            Node::Not(inner) => format!("NOT ({})", self.visit_node(inner)),
            Node::Term(term) => self.visit_term(term),
            Node::FreeText(ft) => self.visit_free_text(ft),
            // Grouping parens are re-added by Binary/Not as needed.
            Node::Paren(inner) => self.visit_node(inner),
        }
    }

    fn visit_binary(&mut self, bin: &BinaryExpr) -> String {
        let left = self.visit_node(&bin.left);
        let right = self.visit_node(&bin.right);
        format!("({left} {} {right})", bin.op)
    }

    fn visit_term(&mut self, term: &Term) -> String {
        let field = term.field.trim().to_lowercase();
        let values = &term.values;

        let sql = match field.as_str() {
            "in" => self.in_operator(values),
            "is" => Self::is_operator(values),
            "repo" | "repository" => {
                self.require_repo_join();
                self.string_filter("r.full_name", values)
            }
            "org" => self.org_filter(values),
            "reason" => self.string_filter("n.reason", values),
            "type" | "subject_type" => self.string_filter("n.subject_type", values),
            "author" => self.string_filter("n.author_login", values),
            "state" => self.state_filter(values),
            "read" => Self::boolean_filter("n.is_read", values),
            "archived" => Self::boolean_filter("n.archived", values),
            "muted" => Self::boolean_filter("n.muted", values),
            "snoozed" => Self::snoozed_filter(values),
            "filtered" => Self::boolean_filter("n.filtered", values),
            "tags" => self.tags_filter(values),
            _ => "0".to_string(),
        };

        if term.negated {
            format!("NOT ({sql})")
        } else {
            sql
        }
    }

    /// Free text is an OR'd LIKE across the subject, repository and author
    /// columns, one bound pattern per column.
    fn visit_free_text(&mut self, ft: &FreeText) -> String {
        self.require_repo_join();
        let pattern = format!("%{}%", ft.text);
        for _ in 0..6 {
            self.args.push(pattern.clone());
        }
        "(n.subject_title LIKE ? OR n.subject_type LIKE ? OR r.full_name LIKE ? OR \
         n.author_login LIKE ? OR n.subject_state LIKE ? OR CAST(n.subject_number AS TEXT) LIKE ?)"
            .to_string()
    }

    /// The `in:` operator controls lifecycle visibility. Each value expands to
    /// a fixed boolean expression; multiple values are OR'd.
    fn in_operator(&mut self, values: &[String]) -> String {
        let conditions: Vec<String> = values
            .iter()
            .map(|value| match value.trim().to_lowercase().as_str() {
                "inbox" => format!(
                    "(n.archived = 0 AND (n.snoozed_until IS NULL OR n.snoozed_until <= {SQLITE_NOW_FN}) \
                     AND n.muted = 0 AND n.filtered = 0)"
                ),
                "archive" => "(n.archived = 1 AND n.muted = 0)".to_string(),
                "snoozed" => format!(
                    "(n.snoozed_until IS NOT NULL AND n.snoozed_until > {SQLITE_NOW_FN} \
                     AND n.archived = 0 AND n.muted = 0)"
                ),
                "filtered" => format!(
                    "(n.filtered = 1 AND n.archived = 0 AND \
                     (n.snoozed_until IS NULL OR n.snoozed_until <= {SQLITE_NOW_FN}) AND n.muted = 0)"
                ),
                "anywhere" => "1".to_string(),
                _ => "0".to_string(),
            })
            .collect();

        join_or(conditions)
    }

    /// The `is:` operator is an alias for common status filters.
    fn is_operator(values: &[String]) -> String {
        let conditions: Vec<String> = values
            .iter()
            .map(|value| match value.trim().to_lowercase().as_str() {
                "unread" => "n.is_read = 0".to_string(),
                "read" => "n.is_read = 1".to_string(),
                "archived" => "n.archived = 1".to_string(),
                "muted" => "n.muted = 1".to_string(),
                "snoozed" => format!(
                    "(n.snoozed_until IS NOT NULL AND n.snoozed_until > {SQLITE_NOW_FN})"
                ),
                "starred" => "n.starred = 1".to_string(),
                "filtered" => "n.filtered = 1".to_string(),
                _ => "0".to_string(),
            })
            .collect();

        join_or(conditions)
    }

    /// Org is prefix matching: `org:cli` matches `cli/*`.
    fn org_filter(&mut self, values: &[String]) -> String {
        self.require_repo_join();
        let conditions: Vec<String> = values
            .iter()
            .map(|value| {
                self.args.push(format!("{value}/%"));
                "r.full_name LIKE ?".to_string()
            })
            .collect();
        join_or(conditions)
    }

    /// State is an exact match against the extracted subject_state column.
    fn state_filter(&mut self, values: &[String]) -> String {
        let conditions: Vec<String> = values
            .iter()
            .map(|value| {
                self.args.push(value.clone());
                "n.subject_state = ?".to_string()
            })
            .collect();
        join_or(conditions)
    }

    /// `tags:a,b` matches notifications carrying at least one of the tags.
    /// For AND semantics callers write separate terms: `tags:a AND tags:b`.
    fn tags_filter(&mut self, values: &[String]) -> String {
        let conditions: Vec<String> = values
            .iter()
            .map(|value| {
                self.args.push(format!("%{value}%"));
                "t.slug LIKE ?".to_string()
            })
            .collect();
        format!(
            "EXISTS (SELECT 1 FROM tag_assignments ta JOIN tags t ON t.id = ta.tag_id \
             WHERE ta.entity_type = 'notification' AND ta.entity_id = n.id AND ({}))",
            conditions.join(" OR ")
        )
    }

    fn string_filter(&mut self, column: &str, values: &[String]) -> String {
        let conditions: Vec<String> = values
            .iter()
            .map(|value| {
                self.args.push(format!("%{value}%"));
                format!("{column} LIKE ?")
            })
            .collect();
        join_or(conditions)
    }

    fn boolean_filter(column: &str, values: &[String]) -> String {
        let conditions: Vec<String> = values
            .iter()
            .map(|value| match value.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => format!("{column} = 1"),
                "false" | "no" | "0" => format!("{column} = 0"),
                _ => "0".to_string(),
            })
            .collect();
        join_or(conditions)
    }

    fn snoozed_filter(values: &[String]) -> String {
        let conditions: Vec<String> = values
            .iter()
            .map(|value| match value.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => format!(
                    "(n.snoozed_until IS NOT NULL AND n.snoozed_until > {SQLITE_NOW_FN})"
                ),
                "false" | "no" | "0" => format!(
                    "(n.snoozed_until IS NULL OR n.snoozed_until <= {SQLITE_NOW_FN})"
                ),
                _ => "0".to_string(),
            })
            .collect();
        join_or(conditions)
    }

    fn require_repo_join(&mut self) {
        if !self.joins.iter().any(|j| j == REPOSITORIES_JOIN) {
            self.joins.push(REPOSITORIES_JOIN.to_string());
        }
    }
}

/// Joins per-value conditions with OR, wrapping only when there is more than
/// one condition. An empty list compiles to the never-matching literal.
fn join_or(conditions: Vec<String>) -> String {
    match conditions.len() {
        0 => "0".to_string(),
        1 => conditions.into_iter().next().unwrap_or_default(),
        _ => format!("({})", conditions.join(" OR ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_empty_applies_inbox_defaults() {
        let query = build_query("", 50, 0).unwrap();
        assert_eq!(
            query.where_clauses,
            vec![
                "n.archived = 0",
                "(n.snoozed_until IS NULL OR n.snoozed_until <= strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))",
                "n.muted = 0",
                "n.filtered = 0",
            ]
        );
        assert!(query.args.is_empty());
        assert!(query.joins.is_empty());
        assert_eq!(query.limit, 50);
        assert_eq!(query.offset, 0);
    }

    #[test]
    fn test_build_query_in_anywhere_is_match_all() {
        let query = build_query("in:anywhere", 50, 0).unwrap();
        assert_eq!(query.where_clauses, vec!["1"]);
        assert!(query.args.is_empty());
        assert!(query.joins.is_empty());
    }

    #[test]
    fn test_build_query_repo_and_unread() {
        let query = build_query("repo:cli AND is:unread", 50, 0).unwrap();
        assert_eq!(
            query.where_clauses,
            vec!["(r.full_name LIKE ? AND n.is_read = 0)", "n.muted = 0"]
        );
        assert_eq!(query.args, vec!["%cli%"]);
        assert_eq!(
            query.joins,
            vec!["LEFT JOIN repositories r ON r.id = n.repository_id"]
        );
    }

    #[test]
    fn test_build_query_grouped_or_pins_double_parens() {
        let query = build_query("(repo:cli OR repo:other) AND is:unread", 50, 0).unwrap();
        assert_eq!(
            query.where_clauses[0],
            "((r.full_name LIKE ? OR r.full_name LIKE ?) AND n.is_read = 0)"
        );
        assert_eq!(query.args, vec!["%cli%", "%other%"]);
    }

    #[test]
    fn test_build_query_in_operator_suppresses_defaults() {
        let query = build_query("in:archive", 50, 0).unwrap();
        assert_eq!(
            query.where_clauses,
            vec!["(n.archived = 1 AND n.muted = 0)"]
        );
    }

    #[test]
    fn test_build_query_in_inbox_expansion() {
        let query = build_query("in:inbox", 50, 0).unwrap();
        let clause = &query.where_clauses[0];
        assert!(clause.contains("n.archived = 0"));
        assert!(clause.contains("n.snoozed_until"));
        assert!(clause.contains("n.muted = 0"));
        assert!(clause.contains("n.filtered = 0"));
        assert_eq!(query.where_clauses.len(), 1);
    }

    #[test]
    fn test_build_query_in_multiple_values_or() {
        let query = build_query("in:archive,snoozed", 50, 0).unwrap();
        let clause = &query.where_clauses[0];
        assert!(clause.starts_with('('));
        assert!(clause.contains(" OR "));
        assert!(clause.contains("n.archived = 1"));
        assert!(clause.contains("n.snoozed_until IS NOT NULL"));
    }

    #[test]
    fn test_build_query_is_operator() {
        for (input, want) in [
            ("is:unread", "n.is_read = 0"),
            ("is:read", "n.is_read = 1"),
            ("is:archived", "n.archived = 1"),
            ("is:muted", "n.muted = 1"),
            ("is:starred", "n.starred = 1"),
            ("is:filtered", "n.filtered = 1"),
            (
                "is:snoozed",
                "n.snoozed_until IS NOT NULL AND n.snoozed_until > strftime('%Y-%m-%dT%H:%M:%SZ', 'now')",
            ),
        ] {
            let query = build_query(input, 50, 0).unwrap();
            assert!(
                query.where_clauses[0].contains(want),
                "expected {input:?} to compile to a clause containing {want:?}, got {:?}",
                query.where_clauses[0]
            );
        }
    }

    #[test]
    fn test_build_query_muted_only_default_on_plain_queries() {
        let query = build_query("is:unread", 50, 0).unwrap();
        assert_eq!(query.where_clauses, vec!["n.is_read = 0", "n.muted = 0"]);
    }

    #[test]
    fn test_build_query_explicit_muted_suppresses_default() {
        let query = build_query("is:muted", 50, 0).unwrap();
        assert_eq!(query.where_clauses, vec!["n.muted = 1"]);

        let query = build_query("muted:true", 50, 0).unwrap();
        assert_eq!(query.where_clauses, vec!["n.muted = 1"]);
    }

    #[test]
    fn test_build_query_comma_values_or_within_term() {
        let query = build_query("reason:review_requested,mention", 50, 0).unwrap();
        assert_eq!(
            query.where_clauses[0],
            "(n.reason LIKE ? OR n.reason LIKE ?)"
        );
        assert_eq!(query.args, vec!["%review_requested%", "%mention%"]);
    }

    #[test]
    fn test_build_query_org_prefix_pattern() {
        let query = build_query("org:cli", 50, 0).unwrap();
        assert_eq!(query.where_clauses[0], "r.full_name LIKE ?");
        assert_eq!(query.args, vec!["cli/%"]);
        assert_eq!(query.joins, vec![REPOSITORIES_JOIN]);
    }

    #[test]
    fn test_build_query_state_exact_match() {
        let query = build_query("state:open", 50, 0).unwrap();
        assert_eq!(query.where_clauses[0], "n.subject_state = ?");
        assert_eq!(query.args, vec!["open"]);
    }

    #[test]
    fn test_build_query_boolean_fields_inline() {
        let query = build_query("read:false", 50, 0).unwrap();
        assert_eq!(query.where_clauses[0], "n.is_read = 0");
        assert!(query.args.is_empty());

        let query = build_query("archived:yes", 50, 0).unwrap();
        assert_eq!(query.where_clauses[0], "n.archived = 1");
    }

    #[test]
    fn test_build_query_tags_exists_subquery() {
        let query = build_query("tags:triage", 50, 0).unwrap();
        assert!(query.where_clauses[0].starts_with("EXISTS (SELECT 1 FROM tag_assignments"));
        assert!(query.where_clauses[0].contains("t.slug LIKE ?"));
        assert_eq!(query.args, vec!["%triage%"]);
        assert!(query.joins.is_empty());
    }

    #[test]
    fn test_build_query_free_text_six_columns() {
        let query = build_query("urgent", 50, 0).unwrap();
        let clause = &query.where_clauses[0];
        assert_eq!(clause.matches("LIKE ?").count(), 6);
        assert!(clause.contains("n.subject_title"));
        assert!(clause.contains("CAST(n.subject_number AS TEXT)"));
        assert_eq!(query.args, vec!["%urgent%"; 6]);
        assert_eq!(query.joins, vec![REPOSITORIES_JOIN]);
    }

    #[test]
    fn test_build_query_not_wraps_inner() {
        let query = build_query("NOT repo:cli", 50, 0).unwrap();
        assert_eq!(query.where_clauses[0], "NOT (r.full_name LIKE ?)");
    }

    #[test]
    fn test_build_query_join_deduplicated() {
        let query = build_query("repo:cli OR org:github OR other", 50, 0).unwrap();
        assert_eq!(query.joins, vec![REPOSITORIES_JOIN]);
    }

    #[test]
    fn test_build_query_validation_errors_propagate() {
        let err = build_query("badfield:value", 50, 0).unwrap_err();
        assert!(err.to_string().contains("unknown field: badfield"));

        let err = build_query("in:badvalue", 50, 0).unwrap_err();
        assert!(err
            .to_string()
            .contains("invalid value for in: operator: badvalue"));
    }

    #[test]
    fn test_build_query_parse_errors_propagate() {
        assert!(build_query("(repo:cli", 50, 0).is_err());
        assert!(build_query("repo:\"oops", 50, 0).is_err());
    }

    #[test]
    fn test_builder_negated_term_flag() {
        use crate::ast::{Node, Term};

        let mut term = Term::new("is", vec!["read".to_string()]);
        term.negated = true;
        let query = SqlBuilder::new().build(Some(&Node::Term(term)));
        assert_eq!(query.where_clauses, vec!["NOT (n.is_read = 1)"]);
    }
}
