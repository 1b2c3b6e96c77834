// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Tokenizer for inline Pipeline scripts

use std::fmt;

/// Location of a token or error, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Error produced while lexing or parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub position: Position,
    pub message: String,
}

impl ParseError {
    pub fn new(position: Position, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.position, self.message)
    }
}

/// Piece of a double-quoted string
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    /// Source of a `${...}` expression and where it starts
    Expr(String, Position),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Template(Vec<TemplatePart>),
    Int(i64),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
    Semi,
    Newline,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(s) => write!(f, "identifier '{}'", s),
            Self::Str(_) | Self::Template(_) => write!(f, "string"),
            Self::Int(i) => write!(f, "number {}", i),
            Self::LParen => write!(f, "'('"),
            Self::RParen => write!(f, "')'"),
            Self::LBrace => write!(f, "'{{'"),
            Self::RBrace => write!(f, "'}}'"),
            Self::LBracket => write!(f, "'['"),
            Self::RBracket => write!(f, "']'"),
            Self::Comma => write!(f, "','"),
            Self::Colon => write!(f, "':'"),
            Self::Dot => write!(f, "'.'"),
            Self::Semi => write!(f, "';'"),
            Self::Newline => write!(f, "end of line"),
            Self::Eof => write!(f, "end of script"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: Position,
}

/// Split script text into tokens
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ParseError> {
    Lexer::new(source, Position { line: 1, column: 1 }).run()
}

/// Tokenize an embedded expression, keeping positions relative to the script
pub(crate) fn tokenize_at(source: &str, start: Position) -> Result<Vec<Spanned>, ParseError> {
    Lexer::new(source, start).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    /// Open `(` and `[`; newlines inside them are not statement breaks
    nesting: usize,
    tokens: Vec<Spanned>,
}

impl Lexer {
    fn new(source: &str, start: Position) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: start.line,
            column: start.column,
            nesting: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn here(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn push(&mut self, token: Token, position: Position) {
        self.tokens.push(Spanned { token, position });
    }

    fn run(mut self) -> Result<Vec<Spanned>, ParseError> {
        while let Some(c) = self.peek() {
            let start = self.here();
            match c {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\n' => {
                    self.bump();
                    if self.nesting == 0 {
                        self.push(Token::Newline, start);
                    }
                }
                '/' if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '/' if self.peek_next() == Some('*') => self.block_comment(start)?,
                '(' | '[' => {
                    self.bump();
                    self.nesting += 1;
                    let token = if c == '(' { Token::LParen } else { Token::LBracket };
                    self.push(token, start);
                }
                ')' | ']' => {
                    self.bump();
                    self.nesting = self.nesting.saturating_sub(1);
                    let token = if c == ')' { Token::RParen } else { Token::RBracket };
                    self.push(token, start);
                }
                '{' => {
                    self.bump();
                    self.push(Token::LBrace, start);
                }
                '}' => {
                    self.bump();
                    self.push(Token::RBrace, start);
                }
                ',' => {
                    self.bump();
                    self.push(Token::Comma, start);
                }
                ':' => {
                    self.bump();
                    self.push(Token::Colon, start);
                }
                '.' => {
                    self.bump();
                    self.push(Token::Dot, start);
                }
                ';' => {
                    self.bump();
                    self.push(Token::Semi, start);
                }
                '\'' => {
                    let s = self.single_quoted(start)?;
                    self.push(Token::Str(s), start);
                }
                '"' => {
                    let parts = self.double_quoted(start)?;
                    self.push(Token::Template(parts), start);
                }
                c if c.is_ascii_digit() || (c == '-' && self.peek_next().is_some_and(|n| n.is_ascii_digit())) => {
                    let n = self.number(start)?;
                    self.push(Token::Int(n), start);
                }
                c if c.is_alphabetic() || c == '_' => {
                    let mut ident = String::new();
                    while let Some(c) = self.peek() {
                        if c.is_alphanumeric() || c == '_' {
                            ident.push(c);
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    self.push(Token::Ident(ident), start);
                }
                other => {
                    return Err(ParseError::new(
                        start,
                        format!("unexpected character '{}'", other),
                    ))
                }
            }
        }

        let end = self.here();
        self.push(Token::Eof, end);
        Ok(self.tokens)
    }

    fn block_comment(&mut self, start: Position) -> Result<(), ParseError> {
        self.bump();
        self.bump();
        loop {
            match self.bump() {
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => {}
                None => return Err(ParseError::new(start, "unterminated comment")),
            }
        }
    }

    fn number(&mut self, start: Position) -> Result<i64, ParseError> {
        let mut text = String::new();
        if self.peek() == Some('-') {
            text.push('-');
            self.bump();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                if c != '_' {
                    text.push(c);
                }
                self.bump();
            } else {
                break;
            }
        }
        text.parse()
            .map_err(|_| ParseError::new(start, format!("invalid number '{}'", text)))
    }

    fn escape(&mut self, start: Position) -> Result<char, ParseError> {
        match self.bump() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some(c @ ('\\' | '\'' | '"' | '$')) => Ok(c),
            Some(c) => Err(ParseError::new(start, format!("unknown escape '\\{}'", c))),
            None => Err(ParseError::new(start, "unterminated string")),
        }
    }

    fn single_quoted(&mut self, start: Position) -> Result<String, ParseError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\'') => return Ok(out),
                Some('\\') => out.push(self.escape(start)?),
                Some('\n') | None => return Err(ParseError::new(start, "unterminated string")),
                Some(c) => out.push(c),
            }
        }
    }

    fn double_quoted(&mut self, start: Position) -> Result<Vec<TemplatePart>, ParseError> {
        self.bump();
        let mut parts = Vec::new();
        let mut literal = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    literal.push(self.escape(start)?);
                }
                Some('$') if self.peek_next() == Some('{') => {
                    self.bump();
                    self.bump();
                    let expr_start = self.here();
                    let mut expr = String::new();
                    loop {
                        match self.bump() {
                            Some('}') => break,
                            Some('\n') | None => {
                                return Err(ParseError::new(expr_start, "unterminated '${'"))
                            }
                            Some(c) => expr.push(c),
                        }
                    }
                    if expr.trim().is_empty() {
                        return Err(ParseError::new(expr_start, "empty '${}' expression"));
                    }
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(TemplatePart::Expr(expr, expr_start));
                }
                Some('\n') | None => return Err(ParseError::new(start, "unterminated string")),
                Some(c) => {
                    self.bump();
                    literal.push(c);
                }
            }
        }
        if !literal.is_empty() || parts.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_command_statement() {
        assert_eq!(
            kinds("echo 'hello'\n"),
            vec![
                Token::Ident("echo".into()),
                Token::Str("hello".into()),
                Token::Newline,
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_newlines_inside_brackets_are_ignored() {
        let tokens = kinds("withEnv([\n'A=b'\n]) {\n}");
        assert!(!tokens[..6].contains(&Token::Newline));
        assert_eq!(tokens[6], Token::LBrace);
        assert_eq!(tokens[7], Token::Newline);
    }

    #[test]
    fn test_interpolation_parts() {
        let tokens = kinds("\"FOO is ${env.FOO}!\"");
        match &tokens[0] {
            Token::Template(parts) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[0], TemplatePart::Literal("FOO is ".into()));
                assert!(matches!(&parts[1], TemplatePart::Expr(e, _) if e == "env.FOO"));
                assert_eq!(parts[2], TemplatePart::Literal("!".into()));
            }
            other => panic!("expected template, got {:?}", other),
        }
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("// note\necho 1 /* inline */"),
            vec![
                Token::Newline,
                Token::Ident("echo".into()),
                Token::Int(1),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_errors_carry_position() {
        let err = tokenize("echo 'open").unwrap_err();
        assert_eq!(err.position, Position { line: 1, column: 6 });

        let err = tokenize("echo 1\necho #").unwrap_err();
        assert_eq!(err.position.line, 2);
        assert!(err.message.contains("unexpected character"));
    }
}
