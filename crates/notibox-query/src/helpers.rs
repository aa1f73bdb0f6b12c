//! Pure AST inspection helpers and the shared default-filter policy.
//!
//! Both query backends (the SQL compiler and the in-memory evaluator) decide
//! which implicit lifecycle filters to apply from the same [`default_filter`]
//! function, so the two can never drift apart on the single most important
//! behavior in the engine.

use crate::ast::{Node, Term};

/// The implicit lifecycle filters a query shape calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultFilter {
    /// Empty query: exclude archived, actively-snoozed, muted and filtered.
    InboxDefaults,
    /// Non-empty query without `in:`: exclude muted only.
    MutedOnly,
    /// The query handles lifecycle visibility itself; add nothing.
    None,
}

/// Decides the default-filter policy for a query AST:
/// - absent AST (empty query) → inbox defaults;
/// - any `in:` operator present → no defaults, `in:` owns lifecycle visibility;
/// - otherwise → muted-only, unless the query explicitly asks for muted items.
pub fn default_filter(ast: Option<&Node>) -> DefaultFilter {
    let Some(node) = ast else {
        return DefaultFilter::InboxDefaults;
    };

    if has_in_operator(Some(node)) {
        return DefaultFilter::None;
    }

    if has_explicit_muted(Some(node)) {
        return DefaultFilter::None;
    }

    DefaultFilter::MutedOnly
}

/// Returns true if the AST contains an `in:` term anywhere.
pub fn has_in_operator(node: Option<&Node>) -> bool {
    walk_any(node, &|term| term.field.eq_ignore_ascii_case("in"))
}

/// Returns true if the AST contains an `in:anywhere` term.
pub fn has_in_anywhere(node: Option<&Node>) -> bool {
    walk_any(node, &|term| {
        term.field.eq_ignore_ascii_case("in")
            && term
                .values
                .iter()
                .any(|v| v.trim().eq_ignore_ascii_case("anywhere"))
    })
}

/// Returns true if the query explicitly asks for muted notifications, via
/// `is:muted` or `muted:true` (and its yes/1 spellings).
///
/// NOT subtrees are deliberately not inspected: negating a muted check is not
/// an explicit request to see muted items, so the muted-only default still
/// applies above it.
pub fn has_explicit_muted(node: Option<&Node>) -> bool {
    let Some(node) = node else {
        return false;
    };

    match node {
        Node::Term(term) => {
            let field = term.field.to_lowercase();
            match field.as_str() {
                "is" => term
                    .values
                    .iter()
                    .any(|v| v.trim().eq_ignore_ascii_case("muted")),
                "muted" => term.values.iter().any(|v| {
                    let v = v.trim().to_lowercase();
                    v == "true" || v == "yes" || v == "1"
                }),
                _ => false,
            }
        }
        Node::Binary(bin) => {
            has_explicit_muted(Some(&bin.left)) || has_explicit_muted(Some(&bin.right))
        }
        Node::Not(_) => false,
        Node::Paren(inner) => has_explicit_muted(Some(inner)),
        Node::FreeText(_) => false,
    }
}

/// Walks every node (including inside NOT) and reports whether any term
/// satisfies the predicate.
fn walk_any(node: Option<&Node>, pred: &dyn Fn(&Term) -> bool) -> bool {
    let Some(node) = node else {
        return false;
    };

    match node {
        Node::Term(term) => pred(term),
        Node::Binary(bin) => {
            walk_any(Some(&bin.left), pred) || walk_any(Some(&bin.right), pred)
        }
        Node::Not(inner) | Node::Paren(inner) => walk_any(Some(inner), pred),
        Node::FreeText(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn parse(input: &str) -> Option<Node> {
        let tokens = Lexer::new(input).tokenize().unwrap();
        Parser::new(tokens).parse().unwrap()
    }

    #[test]
    fn test_has_in_operator() {
        assert!(has_in_operator(parse("in:inbox").as_ref()));
        assert!(has_in_operator(parse("repo:cli AND in:archive").as_ref()));
        assert!(has_in_operator(parse("NOT in:inbox").as_ref()));
        assert!(has_in_operator(parse("(in:snoozed)").as_ref()));
        assert!(has_in_operator(parse("IN:inbox").as_ref()));

        assert!(!has_in_operator(None));
        assert!(!has_in_operator(parse("repo:cli").as_ref()));
        assert!(!has_in_operator(parse("inbox").as_ref()));
    }

    #[test]
    fn test_has_in_anywhere() {
        assert!(has_in_anywhere(parse("in:anywhere").as_ref()));
        assert!(has_in_anywhere(parse("in:inbox,anywhere").as_ref()));
        assert!(has_in_anywhere(parse("repo:cli in:ANYWHERE").as_ref()));

        assert!(!has_in_anywhere(parse("in:inbox").as_ref()));
        assert!(!has_in_anywhere(None));
    }

    #[test]
    fn test_has_explicit_muted() {
        assert!(has_explicit_muted(parse("is:muted").as_ref()));
        assert!(has_explicit_muted(parse("muted:true").as_ref()));
        assert!(has_explicit_muted(parse("muted:yes").as_ref()));
        assert!(has_explicit_muted(parse("muted:1").as_ref()));
        assert!(has_explicit_muted(parse("repo:cli AND is:muted").as_ref()));
        assert!(has_explicit_muted(parse("(is:muted)").as_ref()));

        assert!(!has_explicit_muted(parse("muted:false").as_ref()));
        assert!(!has_explicit_muted(parse("is:unread").as_ref()));
        assert!(!has_explicit_muted(None));
    }

    #[test]
    fn test_has_explicit_muted_ignores_not_subtrees() {
        // Negating muted is not an explicit request for muted items.
        assert!(!has_explicit_muted(parse("NOT is:muted").as_ref()));
        assert!(!has_explicit_muted(parse("NOT muted:true").as_ref()));
        assert!(!has_explicit_muted(parse("-is:muted").as_ref()));
        // But a positive occurrence alongside a NOT still counts.
        assert!(has_explicit_muted(
            parse("is:muted AND NOT is:read").as_ref()
        ));
    }

    #[test]
    fn test_default_filter_policy() {
        assert_eq!(default_filter(None), DefaultFilter::InboxDefaults);

        assert_eq!(
            default_filter(parse("in:archive").as_ref()),
            DefaultFilter::None
        );
        assert_eq!(
            default_filter(parse("repo:cli in:anywhere").as_ref()),
            DefaultFilter::None
        );

        assert_eq!(
            default_filter(parse("repo:cli").as_ref()),
            DefaultFilter::MutedOnly
        );
        assert_eq!(
            default_filter(parse("is:unread").as_ref()),
            DefaultFilter::MutedOnly
        );

        // Explicitly asking for muted suppresses the muted-only default.
        assert_eq!(
            default_filter(parse("is:muted").as_ref()),
            DefaultFilter::None
        );
        assert_eq!(
            default_filter(parse("muted:true").as_ref()),
            DefaultFilter::None
        );
        // ...but a negated muted does not.
        assert_eq!(
            default_filter(parse("NOT is:muted").as_ref()),
            DefaultFilter::MutedOnly
        );
    }
}
