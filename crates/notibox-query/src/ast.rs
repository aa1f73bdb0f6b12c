//! Abstract Syntax Tree (AST) for search queries.

use std::fmt;

/// A node in a parsed search query.
///
/// The `Node` enum is the AST for notibox search queries. An absent query
/// (empty input string) is represented by `Option::<Node>::None` rather than a
/// dedicated variant, so callers can distinguish "no query" from a parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A `field:value1,value2` term. Values are OR'd within the term.
    Term(Term),

    /// Unstructured search text, matched across several columns.
    FreeText(FreeText),

    /// Logical negation of a subexpression.
    Not(Box<Node>),

    /// Logical AND/OR of two subexpressions.
    Binary(BinaryExpr),

    /// An explicitly parenthesized subexpression.
    ///
    /// Kept as a distinct node (not collapsed into its child) so the parsed
    /// structure round-trips through the debug rendering.
    Paren(Box<Node>),
}

/// A `field:value1,value2` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    /// The field name, as written (case preserved; consumers lowercase it).
    pub field: String,
    /// One or more values; a notification matches if any value matches.
    pub values: Vec<String>,
    /// Set for the legacy `-field:value` form. The parser emits a [`Node::Not`]
    /// for a leading `-` instead, but both backends still honor the flag for
    /// programmatically built trees.
    pub negated: bool,
}

/// Unstructured search text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeText {
    /// The raw word or quoted phrase.
    pub text: String,
}

/// A binary AND/OR expression. Left-associative within one precedence level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryExpr {
    /// The operator joining the two sides.
    pub op: BinaryOp,
    /// Left operand.
    pub left: Box<Node>,
    /// Right operand.
    pub right: Box<Node>,
}

/// Binary operator kind. AND binds tighter than OR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Logical conjunction.
    And,
    /// Logical disjunction.
    Or,
}

impl Term {
    /// Creates a non-negated term.
    pub fn new(field: impl Into<String>, values: Vec<String>) -> Self {
        Term {
            field: field.into(),
            values,
            negated: false,
        }
    }
}

impl Node {
    /// Creates a term node with a single value.
    ///
    /// # Example
    ///
    /// ```
    /// use notibox_query_rs::ast::Node;
    ///
    /// let node = Node::term("repo", "cli");
    /// assert_eq!(node.to_string(), "repo:cli");
    /// ```
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Node::Term(Term::new(field, vec![value.into()]))
    }

    /// Creates a free-text node.
    pub fn free_text(text: impl Into<String>) -> Self {
        Node::FreeText(FreeText { text: text.into() })
    }

    /// Creates an AND node from two subexpressions.
    pub fn and(left: Node, right: Node) -> Self {
        Node::Binary(BinaryExpr {
            op: BinaryOp::And,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Creates an OR node from two subexpressions.
    pub fn or(left: Node, right: Node) -> Self {
        Node::Binary(BinaryExpr {
            op: BinaryOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Creates a NOT node.
    pub fn negate(inner: Node) -> Self {
        Node::Not(Box::new(inner))
    }

    /// Creates an explicit grouping node.
    pub fn paren(inner: Node) -> Self {
        Node::Paren(Box::new(inner))
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::And => f.write_str("AND"),
            BinaryOp::Or => f.write_str("OR"),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("-")?;
        }
        write!(f, "{}:{}", self.field, self.values.join(","))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Term(term) => term.fmt(f),
            Node::FreeText(ft) => write!(f, "FREE({:?})", ft.text),
            Node::Not(inner) => write!(f, "NOT({inner})"),
            Node::Binary(bin) => write!(f, "({} {} {})", bin.left, bin.op, bin.right),
            Node::Paren(inner) => write!(f, "({inner})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_term_single_value() {
        let node = Node::term("repo", "cli");
        assert_eq!(node.to_string(), "repo:cli");
    }

    #[test]
    fn test_display_term_multiple_values() {
        let node = Node::Term(Term::new(
            "reason",
            vec!["mention".to_string(), "assign".to_string()],
        ));
        assert_eq!(node.to_string(), "reason:mention,assign");
    }

    #[test]
    fn test_display_negated_term() {
        let mut term = Term::new("muted", vec!["true".to_string()]);
        term.negated = true;
        assert_eq!(Node::Term(term).to_string(), "-muted:true");
    }

    #[test]
    fn test_display_free_text() {
        let node = Node::free_text("urgent fix");
        assert_eq!(node.to_string(), "FREE(\"urgent fix\")");
    }

    #[test]
    fn test_display_nested_expression() {
        // (repo:cli OR repo:other) AND NOT(is:read)
        let node = Node::and(
            Node::paren(Node::or(Node::term("repo", "cli"), Node::term("repo", "other"))),
            Node::negate(Node::term("is", "read")),
        );
        assert_eq!(
            node.to_string(),
            "(((repo:cli OR repo:other)) AND NOT(is:read))"
        );
    }

    #[test]
    fn test_paren_preserved_as_distinct_node() {
        let inner = Node::term("is", "unread");
        let grouped = Node::paren(inner.clone());
        assert_ne!(grouped, inner);
        assert_eq!(grouped, Node::Paren(Box::new(inner)));
    }
}
