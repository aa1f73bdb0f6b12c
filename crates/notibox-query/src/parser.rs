//! Recursive descent parser for search queries.

use crate::ast::{FreeText, Node, Term};
use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};

/// Parser for notibox search queries.
///
/// # Grammar
///
/// ```text
/// expr    ::= or_expr
/// or_expr ::= and_expr ("OR" and_expr)*
/// and_expr::= not_expr (("AND" not_expr) | not_expr)*   -- implicit AND by adjacency
/// not_expr::= "NOT" not_expr | primary
/// primary ::= "(" expr ")" | term | freetext
/// term    ::= FIELD ":" value ("," value)*
/// ```
///
/// # Operator Precedence (highest to lowest)
///
/// 1. `NOT` - unary, right-associative (chainable: `NOT NOT x`)
/// 2. `AND` - binary, left-associative; adjacency is implicit AND
/// 3. `OR`  - binary, left-associative
///
/// A word is only recognized as a field when the next token is a colon, so
/// `repo:cli` is a term while a bare `repo` is free text.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Creates a parser over a token stream produced by the lexer.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        // The lexer always terminates the stream; guard hand-built inputs.
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let pos = tokens.last().map(|t| t.pos + t.value.len()).unwrap_or(0);
            tokens.push(Token {
                kind: TokenKind::Eof,
                value: String::new(),
                pos,
            });
        }
        Parser { tokens, pos: 0 }
    }

    /// Parses the tokens into an AST.
    ///
    /// Empty input (the first token is EOF) yields `Ok(None)`: callers must
    /// distinguish "no query" from a parse error.
    pub fn parse(mut self) -> Result<Option<Node>, ParseError> {
        if self.current().kind == TokenKind::Eof {
            return Ok(None);
        }

        let node = self.parse_expression()?;

        let current = self.current();
        if current.kind != TokenKind::Eof {
            return Err(ParseError::UnexpectedTokenAfterExpression {
                token: current.to_string(),
                pos: current.pos,
            });
        }

        Ok(Some(node))
    }

    fn current(&self) -> &Token {
        // The stream always ends with EOF (enforced in new), so indexing past
        // the end can only mean "stay on the final EOF token".
        let index = self.pos.min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn parse_expression(&mut self) -> Result<Node, ParseError> {
        self.parse_or_expr()
    }

    /// OR has the lowest precedence.
    fn parse_or_expr(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_and_expr()?;

        while self.current().kind == TokenKind::Or {
            self.advance();
            let right = self.parse_and_expr()?;
            left = Node::or(left, right);
        }

        Ok(left)
    }

    /// Explicit `AND` and implicit adjacency, both left-associative.
    fn parse_and_expr(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_not_expr()?;

        loop {
            if self.current().kind == TokenKind::And {
                self.advance();
                let right = self.parse_not_expr()?;
                left = Node::and(left, right);
                continue;
            }

            if self.is_start_of_primary() {
                let right = self.parse_not_expr()?;
                left = Node::and(left, right);
                continue;
            }

            break;
        }

        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Node, ParseError> {
        if self.current().kind == TokenKind::Not {
            self.advance();
            let inner = self.parse_not_expr()?;
            return Ok(Node::negate(inner));
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Node, ParseError> {
        let current = self.current().clone();

        match current.kind {
            TokenKind::LParen => self.parse_paren_expr(),
            TokenKind::RParen => Err(ParseError::UnexpectedClosingParen { pos: current.pos }),
            TokenKind::FreeText if self.is_start_of_term() => self.parse_term().map(Node::Term),
            TokenKind::FreeText | TokenKind::Value => {
                self.advance();
                Ok(Node::FreeText(FreeText {
                    text: current.value,
                }))
            }
            _ => Err(ParseError::UnexpectedToken {
                token: current.to_string(),
                pos: current.pos,
            }),
        }
    }

    fn parse_paren_expr(&mut self) -> Result<Node, ParseError> {
        let current = self.current();
        if current.kind != TokenKind::LParen {
            return Err(ParseError::ExpectedOpeningParen { pos: current.pos });
        }
        self.advance();

        let inner = self.parse_expression()?;

        let current = self.current();
        if current.kind != TokenKind::RParen {
            return Err(ParseError::ExpectedClosingParen {
                pos: current.pos,
                got: current.to_string(),
            });
        }
        self.advance();

        Ok(Node::paren(inner))
    }

    fn parse_term(&mut self) -> Result<Term, ParseError> {
        let current = self.current();
        if current.kind != TokenKind::FreeText {
            return Err(ParseError::ExpectedFieldName { pos: current.pos });
        }
        let field = current.value.clone();
        self.advance();

        let current = self.current();
        if current.kind != TokenKind::Colon {
            return Err(ParseError::ExpectedColon {
                field,
                pos: current.pos,
            });
        }
        self.advance();

        let mut values = Vec::new();
        loop {
            let current = self.current();
            if current.kind != TokenKind::FreeText && current.kind != TokenKind::Value {
                return Err(ParseError::ExpectedValue {
                    pos: current.pos,
                    got: current.to_string(),
                });
            }
            values.push(current.value.clone());
            self.advance();

            if self.current().kind == TokenKind::Comma {
                self.advance();
                continue;
            }
            break;
        }

        if values.is_empty() {
            return Err(ParseError::ExpectedAtLeastOneValue { field });
        }

        Ok(Term::new(field, values))
    }

    fn is_start_of_primary(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::LParen | TokenKind::FreeText | TokenKind::Value | TokenKind::Not
        )
    }

    /// A free-text word starts a term only when the next token is a colon.
    fn is_start_of_term(&self) -> bool {
        if self.current().kind != TokenKind::FreeText {
            return false;
        }
        self.tokens
            .get(self.pos + 1)
            .is_some_and(|next| next.kind == TokenKind::Colon)
    }
}
