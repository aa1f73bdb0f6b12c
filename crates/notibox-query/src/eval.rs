//! In-memory evaluation of queries against notification snapshots.
//!
//! The evaluator answers the same question as the compiled SQL, "does this
//! notification belong to this query's result set", without touching storage.
//! Its field semantics mirror the SQL compiler's column table: fields the
//! compiler matches with `LIKE` are case-insensitive substring matches here
//! (SQLite `LIKE` is ASCII case-insensitive), and `=`-backed fields are exact.
//! Any divergence between the two backends is a correctness bug.

use chrono::{DateTime, Utc};

use crate::ast::{BinaryOp, Node, Term};
use crate::error::QueryResult;
use crate::helpers::{default_filter, DefaultFilter};
use crate::model::{Notification, Repository};
use crate::parse_and_validate;

/// Evaluates whether notifications match a parsed query.
///
/// Construction requires an already parsed (and validated) AST; there is no
/// degraded mode for unparsable input; callers that hold an invalid query
/// string must treat evaluation conservatively themselves. One evaluator may
/// be shared freely across threads and reused for any number of [`matches`]
/// calls.
///
/// [`matches`]: Evaluator::matches
#[derive(Debug, Clone)]
pub struct Evaluator {
    ast: Option<Node>,
}

impl Evaluator {
    /// Creates an evaluator for the given AST. `None` is the empty query.
    pub fn new(ast: Option<Node>) -> Self {
        Evaluator { ast }
    }

    /// Parses and validates a query string into an evaluator.
    pub fn parse(query: &str) -> QueryResult<Self> {
        Ok(Evaluator::new(parse_and_validate(query)?))
    }

    /// Returns the AST this evaluator runs, if any.
    pub fn ast(&self) -> Option<&Node> {
        self.ast.as_ref()
    }

    /// Returns true if the notification matches the query, applying the same
    /// default-filter policy as the SQL compiler:
    /// - empty query → the four inbox defaults, checked directly;
    /// - query with an `in:` operator → plain AST evaluation;
    /// - any other query → muted notifications are excluded unless the query
    ///   explicitly asks for them.
    pub fn matches(&self, notif: &Notification, repo: Option<&Repository>) -> bool {
        let now = Utc::now();

        match default_filter(self.ast.as_ref()) {
            DefaultFilter::InboxDefaults => Self::matches_inbox_defaults(notif, now),
            // The policy only picks MutedOnly when the query does not
            // explicitly ask for muted items, so the exclusion is flat.
            DefaultFilter::MutedOnly => {
                if notif.muted {
                    return false;
                }
                self.eval_root(notif, repo, now)
            }
            DefaultFilter::None => self.eval_root(notif, repo, now),
        }
    }

    fn eval_root(&self, notif: &Notification, repo: Option<&Repository>, now: DateTime<Utc>) -> bool {
        match &self.ast {
            Some(node) => eval_node(notif, repo, now, node),
            None => true,
        }
    }

    /// The inbox defaults: exclude archived, actively snoozed, muted and
    /// filtered notifications.
    fn matches_inbox_defaults(notif: &Notification, now: DateTime<Utc>) -> bool {
        !notif.archived && !notif.is_snoozed_at(now) && !notif.muted && !notif.filtered
    }
}

fn eval_node(
    notif: &Notification,
    repo: Option<&Repository>,
    now: DateTime<Utc>,
    node: &Node,
) -> bool {
    match node {
        Node::Binary(bin) => {
            let left = eval_node(notif, repo, now, &bin.left);
            let right = eval_node(notif, repo, now, &bin.right);
            match bin.op {
                BinaryOp::And => left && right,
                BinaryOp::Or => left || right,
            }
        }
        Node::Not(inner) => !eval_node(notif, repo, now, inner),
        Node::Paren(inner) => eval_node(notif, repo, now, inner),
        Node::Term(term) => {
            let result = eval_term(notif, repo, now, term);
            if term.negated {
                !result
            } else {
                result
            }
        }
        Node::FreeText(ft) => eval_free_text(notif, repo, &ft.text),
    }
}

/// A term matches when any of its values matches (OR within the term).
fn eval_term(
    notif: &Notification,
    repo: Option<&Repository>,
    now: DateTime<Utc>,
    term: &Term,
) -> bool {
    let field = term.field.trim().to_lowercase();
    term.values
        .iter()
        .any(|value| eval_field_value(notif, repo, now, &field, value))
}

fn eval_field_value(
    notif: &Notification,
    repo: Option<&Repository>,
    now: DateTime<Utc>,
    field: &str,
    value: &str,
) -> bool {
    match field {
        "in" => eval_in_condition(notif, now, value),
        "is" => eval_is_condition(notif, now, value),
        "repo" | "repository" => {
            repo.is_some_and(|r| contains_ci(&r.full_name, value))
        }
        "org" => repo.is_some_and(|r| starts_with_ci(&r.full_name, &format!("{value}/"))),
        "reason" => notif
            .reason
            .as_deref()
            .is_some_and(|reason| contains_ci(reason, value)),
        "type" | "subject_type" => contains_ci(&notif.subject_type, value),
        "author" => notif
            .author_login
            .as_deref()
            .is_some_and(|author| contains_ci(author, value)),
        "state" => notif.subject_state.as_deref() == Some(value),
        "read" => parse_bool(value).is_some_and(|want| notif.is_read == want),
        "archived" => parse_bool(value).is_some_and(|want| notif.archived == want),
        "muted" => parse_bool(value).is_some_and(|want| notif.muted == want),
        "snoozed" => parse_bool(value).is_some_and(|want| notif.is_snoozed_at(now) == want),
        "filtered" => parse_bool(value).is_some_and(|want| notif.filtered == want),
        "tags" => notif
            .tag_slugs
            .iter()
            .any(|slug| contains_ci(slug, value)),
        // Unknown fields cannot survive validation; match nothing, like the
        // compiler's never-matching literal.
        _ => false,
    }
}

fn eval_is_condition(notif: &Notification, now: DateTime<Utc>, value: &str) -> bool {
    match value.trim().to_lowercase().as_str() {
        "unread" => !notif.is_read,
        "read" => notif.is_read,
        "archived" => notif.archived,
        "muted" => notif.muted,
        "snoozed" => notif.is_snoozed_at(now),
        "starred" => notif.starred,
        "filtered" => notif.filtered,
        _ => false,
    }
}

fn eval_in_condition(notif: &Notification, now: DateTime<Utc>, value: &str) -> bool {
    match value.trim().to_lowercase().as_str() {
        "inbox" => {
            !notif.archived && !notif.is_snoozed_at(now) && !notif.muted && !notif.filtered
        }
        "archive" => notif.archived && !notif.muted,
        "snoozed" => notif.is_snoozed_at(now) && !notif.archived && !notif.muted,
        "filtered" => {
            notif.filtered && !notif.archived && !notif.is_snoozed_at(now) && !notif.muted
        }
        "anywhere" => true,
        _ => false,
    }
}

/// Free text matches case-insensitively against the same columns the SQL
/// compiler searches: subject title, subject type, repository full name,
/// author login, subject state and the subject number rendered as text.
fn eval_free_text(notif: &Notification, repo: Option<&Repository>, text: &str) -> bool {
    if contains_ci(&notif.subject_title, text) {
        return true;
    }

    if contains_ci(&notif.subject_type, text) {
        return true;
    }

    if repo.is_some_and(|r| contains_ci(&r.full_name, text)) {
        return true;
    }

    if notif
        .author_login
        .as_deref()
        .is_some_and(|author| contains_ci(author, text))
    {
        return true;
    }

    if let Some(state) = notif.subject_state.as_deref() {
        if contains_ci(state, text) {
            return true;
        }
    } else if let Some(state) = raw_subject_state(notif) {
        // Legacy fallback: older rows may carry only the raw provider payload
        // without the extracted subject_state column.
        if contains_ci(&state, text) {
            return true;
        }
    }

    if let Some(number) = notif.subject_number {
        if number.to_string().contains(text) {
            return true;
        }
    }

    false
}

/// Parses the `state` field out of the raw subject JSON payload.
fn raw_subject_state(notif: &Notification) -> Option<String> {
    let raw = notif.subject_raw.as_deref()?;
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    value.get("state")?.as_str().map(str::to_string)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn starts_with_ci(haystack: &str, prefix: &str) -> bool {
    haystack.to_lowercase().starts_with(&prefix.to_lowercase())
}
