//! Lexer (tokenizer) for search queries.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

/// Error encountered during lexical analysis.
///
/// An unterminated quoted string is the only way tokenization can fail; every
/// other input lexes successfully and any semantic problems are reported by the
/// parser or validator instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LexError {
    /// A double-quoted string was opened but never closed.
    #[error("unterminated quoted string at position {pos}")]
    UnterminatedString {
        /// Byte offset of the opening quote.
        pos: usize,
    },
}

/// The kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// End of input. Always the final token of a stream.
    Eof,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// The bare uppercase word `AND`.
    And,
    /// The bare uppercase word `OR`.
    Or,
    /// The bare uppercase word `NOT`, or a leading `-`.
    Not,
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// A field name. Never produced by the lexer; the parser recognizes a
    /// `FreeText` token followed by a colon as a field.
    Field,
    /// A quoted value.
    Value,
    /// An unquoted word.
    FreeText,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Eof => "EOF",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::Not => "NOT",
            TokenKind::Colon => "COLON",
            TokenKind::Comma => "COMMA",
            TokenKind::Field => "FIELD",
            TokenKind::Value => "VALUE",
            TokenKind::FreeText => "FREETEXT",
        };
        f.write_str(s)
    }
}

/// A lexical token with its position in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The token kind.
    pub kind: TokenKind,
    /// The token text. Empty for punctuation-only tokens and EOF.
    pub value: String,
    /// Byte offset where the token starts.
    pub pos: usize,
}

impl Token {
    fn new(kind: TokenKind, value: impl Into<String>, pos: usize) -> Self {
        Token {
            kind,
            value: value.into(),
            pos,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            write!(f, "{}@{}", self.kind, self.pos)
        } else {
            write!(f, "{}({:?})@{}", self.kind, self.value, self.pos)
        }
    }
}

/// Lexer for tokenizing search query strings.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    /// Current byte position in the input string.
    position: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input string.
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            position: 0,
        }
    }

    /// Tokenizes the whole input. The returned sequence always ends with an
    /// [`TokenKind::Eof`] token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.chars.next();
        if let Some(ch) = c {
            self.position += ch.len_utf8();
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.next_char();
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();

        let pos = self.position;
        let Some(c) = self.peek() else {
            return Ok(Token::new(TokenKind::Eof, "", pos));
        };

        match c {
            '(' => {
                self.next_char();
                Ok(Token::new(TokenKind::LParen, "(", pos))
            }
            ')' => {
                self.next_char();
                Ok(Token::new(TokenKind::RParen, ")", pos))
            }
            ':' => {
                self.next_char();
                Ok(Token::new(TokenKind::Colon, ":", pos))
            }
            ',' => {
                self.next_char();
                Ok(Token::new(TokenKind::Comma, ",", pos))
            }
            '"' => {
                let text = self.read_quoted_string(pos)?;
                Ok(Token::new(TokenKind::Value, text, pos))
            }
            // A hyphen at the start of a token is the shorthand NOT operator;
            // mid-word hyphens are consumed by read_word below.
            '-' => {
                self.next_char();
                Ok(Token::new(TokenKind::Not, "-", pos))
            }
            _ => {
                let word = self.read_word();
                Ok(Self::classify_word(word, pos))
            }
        }
    }

    /// Reads a run of word characters: anything that is not whitespace and not
    /// one of the punctuation characters `( ) : , "`.
    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if !is_word_char(c) {
                break;
            }
            word.push(c);
            self.next_char();
        }
        word
    }

    /// Reads a double-quoted string, handling backslash escapes.
    fn read_quoted_string(&mut self, start: usize) -> Result<String, LexError> {
        self.next_char(); // opening quote

        let mut result = String::new();
        loop {
            let Some(c) = self.next_char() else {
                return Err(LexError::UnterminatedString { pos: start });
            };
            match c {
                '"' => return Ok(result),
                '\\' => {
                    let Some(escaped) = self.next_char() else {
                        return Err(LexError::UnterminatedString { pos: start });
                    };
                    match escaped {
                        'n' => result.push('\n'),
                        't' => result.push('\t'),
                        other => result.push(other),
                    }
                }
                other => result.push(other),
            }
        }
    }

    /// Classifies a bare word as an operator or free text. Only the exact
    /// uppercase spellings are operators; `and`, `And` etc. are ordinary text.
    fn classify_word(word: String, pos: usize) -> Token {
        match word.as_str() {
            "AND" => Token::new(TokenKind::And, word, pos),
            "OR" => Token::new(TokenKind::Or, word, pos),
            "NOT" => Token::new(TokenKind::Not, word, pos),
            _ => Token::new(TokenKind::FreeText, word, pos),
        }
    }
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | ':' | ',' | '"')
}
