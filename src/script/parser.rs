// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Parser for inline Pipeline scripts
//!
//! A script is a list of step calls, each optionally followed by a block:
//!
//! ```text
//! echo 'hello'
//! withEnv(['FOO=bar']) {
//!     echo "FOO is ${env.FOO}"
//! }
//! shell script: 'make test', unstableOnFailure: true
//! ```

use super::lexer::{tokenize, tokenize_at, ParseError, Position, Spanned, TemplatePart, Token};

/// A parsed inline script
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub statements: Vec<Statement>,
}

impl Script {
    /// Every step name called in the script, at any depth, in source order
    pub fn call_names(&self) -> Vec<(&str, Position)> {
        let mut names = Vec::new();
        collect_names(&self.statements, &mut names);
        names
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

fn collect_names<'a>(statements: &'a [Statement], out: &mut Vec<(&'a str, Position)>) {
    for statement in statements {
        out.push((statement.name.as_str(), statement.position));
        if let Some(block) = &statement.block {
            collect_names(block, out);
        }
    }
}

/// One step call
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub name: String,
    pub args: Vec<Arg>,
    pub block: Option<Vec<Statement>>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    Named(String, Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Str(String),
    Int(i64),
    Bool(bool),
    Null,
    Template(Vec<Segment>),
    Ident(String, Position),
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
    Member {
        target: Box<Expr>,
        name: String,
        /// `None` for property access, `Some` for a call
        args: Option<Vec<Expr>>,
        position: Position,
    },
}

/// Piece of an interpolated string
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Expr(Expr),
}

/// Deepest nesting of blocks, brackets, member chains and interpolations
pub const MAX_NESTING: usize = 256;

/// Parse a complete script
pub fn parse_script(source: &str) -> Result<Script, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens, 0);
    let statements = parser.statements(None)?;
    Ok(Script { statements })
}

/// Parse text with `${...}` interpolations, as used in step parameters
pub fn parse_template(text: &str) -> Result<Vec<Segment>, ParseError> {
    let mut segments = Vec::new();
    let mut rest = text;
    let mut offset = 0;

    while let Some(start) = rest.find("${") {
        if start > 0 {
            segments.push(Segment::Literal(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let column = text[..offset + start + 2].chars().count() + 1;
        let end = after.find('}').ok_or_else(|| {
            ParseError::new(Position { line: 1, column }, "unterminated '${'")
        })?;
        let expr = parse_embedded(&after[..end], Position { line: 1, column }, 1)?;
        segments.push(Segment::Expr(expr));
        offset += start + 2 + end + 1;
        rest = &after[end + 1..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }
    Ok(segments)
}

fn parse_embedded(source: &str, at: Position, depth: usize) -> Result<Expr, ParseError> {
    if depth > MAX_NESTING {
        return Err(ParseError::new(at, "nesting too deep"));
    }
    let tokens = tokenize_at(source, at)?;
    let mut parser = Parser::new(tokens, depth);
    let expr = parser.expr()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(ParseError::new(
            parser.position(),
            format!("unexpected {} in expression", other),
        )),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>, depth: usize) -> Self {
        Self { tokens, pos: 0, depth }
    }

    fn enter(&mut self, position: Position) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ParseError::new(position, "nesting too deep"));
        }
        Ok(())
    }

    fn leave(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn position(&self) -> Position {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.position)
            .unwrap_or_default()
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if *self.peek() == expected {
            self.bump();
            Ok(())
        } else {
            Err(ParseError::new(
                self.position(),
                format!("expected {}, found {}", expected, self.peek()),
            ))
        }
    }

    /// Statements until end of input, or until the `}` closing the block
    /// opened at `open`
    fn statements(&mut self, open: Option<Position>) -> Result<Vec<Statement>, ParseError> {
        let mut statements = Vec::new();
        loop {
            while matches!(self.peek(), Token::Newline | Token::Semi) {
                self.bump();
            }
            match (self.peek(), open) {
                (Token::RBrace, Some(_)) => break,
                (Token::RBrace, None) => {
                    return Err(ParseError::new(self.position(), "unexpected '}'"))
                }
                (Token::Eof, Some(at)) => {
                    return Err(ParseError::new(at, "block is missing its closing '}'"))
                }
                (Token::Eof, None) => break,
                _ => {}
            }

            statements.push(self.statement()?);

            match self.peek() {
                Token::Newline | Token::Semi | Token::Eof | Token::RBrace => {}
                other => {
                    return Err(ParseError::new(
                        self.position(),
                        format!("expected end of statement, found {}", other),
                    ))
                }
            }
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Statement, ParseError> {
        let position = self.position();
        let name = match self.bump() {
            Token::Ident(name) => name,
            other => {
                return Err(ParseError::new(
                    position,
                    format!("expected a step name, found {}", other),
                ))
            }
        };

        let args = match self.peek() {
            Token::LParen => {
                self.bump();
                let args = if *self.peek() == Token::RParen {
                    Vec::new()
                } else {
                    self.args()?
                };
                self.expect(Token::RParen)?;
                args
            }
            Token::Newline | Token::Semi | Token::Eof | Token::LBrace | Token::RBrace => Vec::new(),
            Token::Dot => {
                return Err(ParseError::new(
                    self.position(),
                    format!("'{}' must be called as a step, not dereferenced", name),
                ))
            }
            _ => self.args()?,
        };

        let block = if *self.peek() == Token::LBrace {
            let open = self.position();
            self.enter(open)?;
            self.bump();
            let body = self.statements(Some(open))?;
            self.expect(Token::RBrace)?;
            self.leave(1);
            Some(body)
        } else {
            None
        };

        Ok(Statement {
            name,
            args,
            block,
            position,
        })
    }

    fn args(&mut self) -> Result<Vec<Arg>, ParseError> {
        let mut args = vec![self.arg()?];
        while *self.peek() == Token::Comma {
            self.bump();
            args.push(self.arg()?);
        }
        Ok(args)
    }

    fn arg(&mut self) -> Result<Arg, ParseError> {
        if let (Token::Ident(key) | Token::Str(key), Token::Colon) = (self.peek(), self.peek_at(1)) {
            let key = key.clone();
            self.bump();
            self.bump();
            return Ok(Arg::Named(key, self.expr()?));
        }
        Ok(Arg::Positional(self.expr()?))
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        let mut links = 0;
        while *self.peek() == Token::Dot {
            self.bump();
            let position = self.position();
            self.enter(position)?;
            links += 1;
            let name = match self.bump() {
                Token::Ident(name) => name,
                other => {
                    return Err(ParseError::new(
                        position,
                        format!("expected a member name after '.', found {}", other),
                    ))
                }
            };
            let args = if *self.peek() == Token::LParen {
                self.bump();
                let mut args = Vec::new();
                if *self.peek() != Token::RParen {
                    args.push(self.expr()?);
                    while *self.peek() == Token::Comma {
                        self.bump();
                        args.push(self.expr()?);
                    }
                }
                self.expect(Token::RParen)?;
                Some(args)
            } else {
                None
            };
            expr = Expr::Member {
                target: Box::new(expr),
                name,
                args,
                position,
            };
        }
        self.leave(links);
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let position = self.position();
        match self.bump() {
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Int(i) => Ok(Expr::Int(i)),
            Token::Template(parts) => {
                let mut segments = Vec::with_capacity(parts.len());
                for part in parts {
                    segments.push(match part {
                        TemplatePart::Literal(s) => Segment::Literal(s),
                        TemplatePart::Expr(src, at) => {
                            Segment::Expr(parse_embedded(&src, at, self.depth + 1)?)
                        }
                    });
                }
                Ok(Expr::Template(segments))
            }
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                "null" => Expr::Null,
                _ => Expr::Ident(name, position),
            }),
            Token::LParen => {
                self.enter(position)?;
                let expr = self.expr()?;
                self.expect(Token::RParen)?;
                self.leave(1);
                Ok(expr)
            }
            Token::LBracket => {
                self.enter(position)?;
                let collection = self.collection()?;
                self.leave(1);
                Ok(collection)
            }
            other => Err(ParseError::new(
                position,
                format!("expected an expression, found {}", other),
            )),
        }
    }

    /// `[a, b]`, `[k: v]` or `[:]`, after the opening bracket
    fn collection(&mut self) -> Result<Expr, ParseError> {
        if *self.peek() == Token::Colon && *self.peek_at(1) == Token::RBracket {
            self.bump();
            self.bump();
            return Ok(Expr::Map(Vec::new()));
        }
        if *self.peek() == Token::RBracket {
            self.bump();
            return Ok(Expr::List(Vec::new()));
        }

        let is_map = matches!(
            (self.peek(), self.peek_at(1)),
            (Token::Ident(_) | Token::Str(_), Token::Colon)
        );

        if is_map {
            let mut entries = Vec::new();
            loop {
                let position = self.position();
                let key = match self.bump() {
                    Token::Ident(k) | Token::Str(k) => k,
                    other => {
                        return Err(ParseError::new(
                            position,
                            format!("expected a map key, found {}", other),
                        ))
                    }
                };
                self.expect(Token::Colon)?;
                entries.push((key, self.expr()?));
                if *self.peek() != Token::Comma {
                    break;
                }
                self.bump();
            }
            self.expect(Token::RBracket)?;
            Ok(Expr::Map(entries))
        } else {
            let mut items = vec![self.expr()?];
            while *self.peek() == Token::Comma {
                self.bump();
                items.push(self.expr()?);
            }
            self.expect(Token::RBracket)?;
            Ok(Expr::List(items))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_and_call_forms() {
        let script = parse_script("echo 'hello'\necho('again'); error 'stop'").unwrap();
        let names: Vec<_> = script.call_names().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["echo", "echo", "error"]);
        assert_eq!(
            script.statements[0].args,
            vec![Arg::Positional(Expr::Str("hello".into()))]
        );
    }

    #[test]
    fn test_parse_block_and_named_args() {
        let script = parse_script(
            "withEnv(['FOO=bar']) {\n    echo \"FOO is ${env.FOO}\"\n}\nshell script: 'ls', shell: 'sh'",
        )
        .unwrap();
        assert_eq!(script.statements.len(), 2);

        let block = script.statements[0].block.as_ref().unwrap();
        assert_eq!(block[0].name, "echo");
        match &block[0].args[0] {
            Arg::Positional(Expr::Template(segments)) => {
                assert_eq!(segments[0], Segment::Literal("FOO is ".into()));
                assert!(matches!(&segments[1], Segment::Expr(Expr::Member { name, .. }) if name == "FOO"));
            }
            other => panic!("unexpected arg {:?}", other),
        }

        assert!(matches!(&script.statements[1].args[1], Arg::Named(k, _) if k == "shell"));
    }

    #[test]
    fn test_nested_names_are_collected() {
        let script = parse_script("stage('x') {\n parallel(a: 'b')\n node { echo 'hi' }\n}").unwrap();
        let names: Vec<_> = script.call_names().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["stage", "parallel", "node", "echo"]);
    }

    #[test]
    fn test_collections_and_members() {
        let script = parse_script("echo params.items.size()\necho [:]\necho [a: 1, 'b': [2, 3]]").unwrap();
        assert!(matches!(
            &script.statements[0].args[0],
            Arg::Positional(Expr::Member { name, args: Some(a), .. }) if name == "size" && a.is_empty()
        ));
        assert_eq!(
            script.statements[1].args[0],
            Arg::Positional(Expr::Map(vec![]))
        );
    }

    #[test]
    fn test_syntax_errors() {
        let err = parse_script("echo 'a' 'b'").unwrap_err();
        assert!(err.message.contains("expected end of statement"));

        let err = parse_script("node {\n echo 'x'\n").unwrap_err();
        assert_eq!(err.position, Position { line: 1, column: 6 });

        assert!(parse_script("}").is_err());
        assert!(parse_script("echo(").is_err());
        assert!(parse_script("env.FOO").is_err());
    }

    #[test]
    fn test_parse_template() {
        let segments = parse_template("hello ${phase.name} and ${action.name}!").unwrap();
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0], Segment::Literal("hello ".into()));
        assert_eq!(segments[4], Segment::Literal("!".into()));

        assert_eq!(
            parse_template("plain").unwrap(),
            vec![Segment::Literal("plain".into())]
        );
        assert!(parse_template("broken ${phase.name").is_err());
    }

    #[test]
    fn test_deep_nesting_is_a_syntax_error() {
        let deep = 200_000;
        let source = format!("echo {}1{}", "[".repeat(deep), "]".repeat(deep));
        let err = parse_script(&source).unwrap_err();
        assert_eq!(err.message, "nesting too deep");
        assert_eq!(err.position.line, 1);

        let blocks = format!("{}{}", "node {\n".repeat(MAX_NESTING + 1), "}\n".repeat(MAX_NESTING + 1));
        assert_eq!(parse_script(&blocks).unwrap_err().message, "nesting too deep");

        let chain = format!("echo env{}", ".a".repeat(MAX_NESTING + 1));
        assert_eq!(parse_script(&chain).unwrap_err().message, "nesting too deep");

        let fine = format!("echo {}1{}", "[".repeat(MAX_NESTING), "]".repeat(MAX_NESTING));
        assert!(parse_script(&fine).is_ok());
    }
}
