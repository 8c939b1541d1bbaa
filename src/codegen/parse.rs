//! Reader for builder scripts.
//!
//! Accepts the language written by the source emitter:
//!
//! ```text
//! script    := { "let" IDENT "=" expr ";" } [ expr ]
//! expr      := literal | list | tuple | IDENT | IDENT "(" args ")"
//!            | IDENT "." IDENT "(" args ")"
//! literal   := STRING | INT | FLOAT | "true" | "false" | "NaN" | "inf"
//! ```
//!
//! Each `let` is replayed through the builder surface, so every construction
//! check runs again. The script's value is its tail expression, or the last
//! binding when there is none.

use crate::builder;
use crate::dag::{GraphError, LazyValue, MediaKind, NodeRef, Options, Stream, Value};
use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

/// Error reading a builder script, with the 1-based line it occurred on.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Parse and replay a builder script, returning the stream it evaluates to.
pub fn parse(source: &str) -> ParseResult<Stream> {
    let tokens = Lexer::new(source).tokenize()?;
    let script = Parser::new(tokens).script()?;
    tracing::trace!("Parsed {} statements", script.statements.len());

    let mut interpreter = Interpreter::default();
    let mut last = None;
    for statement in &script.statements {
        let value = interpreter.eval(&statement.expr, statement.line)?;
        interpreter.bindings.insert(statement.name.clone(), value.clone());
        last = Some((value, statement.line));
    }
    if let Some((expr, line)) = &script.tail {
        last = Some((interpreter.eval(expr, *line)?, *line));
    }

    match last {
        Some((Binding::Stream(stream), _)) => Ok(stream),
        Some((Binding::Node(node), line)) => node
            .stream()
            .map_err(|e| ParseError::new(line, e.to_string())),
        None => Err(ParseError::new(1, "empty script")),
    }
}

// ── Lexer ──

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Punct(char),
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
        }
    }

    fn tokenize(mut self) -> ParseResult<Vec<(Token, usize)>> {
        let mut tokens = Vec::new();

        while let Some(&c) = self.chars.peek() {
            match c {
                '\n' => {
                    self.line += 1;
                    self.chars.next();
                }
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                '/' => {
                    self.chars.next();
                    if self.chars.next() != Some('/') {
                        return Err(ParseError::new(self.line, "unexpected '/'"));
                    }
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.chars.next();
                    }
                }
                '"' => {
                    let s = self.string()?;
                    tokens.push((Token::Str(s), self.line));
                }
                '-' => {
                    self.chars.next();
                    let next = self.chars.peek().copied();
                    let token = match next {
                        Some(c) if c.is_ascii_digit() => self.number("-")?,
                        _ => match self.ident().as_str() {
                            "inf" => Token::Float(f64::NEG_INFINITY),
                            _ => {
                                return Err(ParseError::new(
                                    self.line,
                                    "expected a number after '-'",
                                ))
                            }
                        },
                    };
                    tokens.push((token, self.line));
                }
                c if c.is_ascii_digit() => {
                    let token = self.number("")?;
                    tokens.push((token, self.line));
                }
                c if c.is_alphabetic() || c == '_' => {
                    let ident = self.ident();
                    tokens.push((Token::Ident(ident), self.line));
                }
                '(' | ')' | '[' | ']' | ',' | ';' | '=' | '.' => {
                    self.chars.next();
                    tokens.push((Token::Punct(c), self.line));
                }
                other => {
                    return Err(ParseError::new(
                        self.line,
                        format!("unexpected character {:?}", other),
                    ))
                }
            }
        }

        Ok(tokens)
    }

    fn ident(&mut self) -> String {
        let mut ident = String::new();
        while let Some(&c) = self.chars.peek() {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            ident.push(c);
            self.chars.next();
        }
        ident
    }

    fn number(&mut self, sign: &str) -> ParseResult<Token> {
        let mut text = sign.to_string();
        while let Some(&c) = self.chars.peek() {
            let exponent_sign = (c == '-' || c == '+') && text.ends_with(['e', 'E']);
            if !(c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign) {
                break;
            }
            text.push(c);
            self.chars.next();
        }

        if text.contains(['.', 'e', 'E']) {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|e| ParseError::new(self.line, format!("bad float '{}': {}", text, e)))
        } else {
            text.parse::<i64>()
                .map(Token::Int)
                .map_err(|e| ParseError::new(self.line, format!("bad integer '{}': {}", text, e)))
        }
    }

    /// A double-quoted literal with Rust escapes.
    fn string(&mut self) -> ParseResult<String> {
        self.chars.next();
        let mut out = String::new();

        loop {
            let c = self
                .chars
                .next()
                .ok_or_else(|| ParseError::new(self.line, "unterminated string"))?;
            match c {
                '"' => return Ok(out),
                '\n' => {
                    self.line += 1;
                    out.push('\n');
                }
                '\\' => out.push(self.escape()?),
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self) -> ParseResult<char> {
        let c = self
            .chars
            .next()
            .ok_or_else(|| ParseError::new(self.line, "unterminated escape"))?;
        Ok(match c {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            '0' => '\0',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            'u' => {
                if self.chars.next() != Some('{') {
                    return Err(ParseError::new(self.line, "expected '{' in unicode escape"));
                }
                let mut hex = String::new();
                loop {
                    match self.chars.next() {
                        Some('}') => break,
                        Some(h) if h.is_ascii_hexdigit() => hex.push(h),
                        _ => return Err(ParseError::new(self.line, "bad unicode escape")),
                    }
                }
                u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| ParseError::new(self.line, format!("bad code point '{}'", hex)))?
            }
            other => {
                return Err(ParseError::new(
                    self.line,
                    format!("unknown escape '\\{}'", other),
                ))
            }
        })
    }
}

// ── Parser ──

#[derive(Debug, Clone)]
enum Expr {
    Str(String),
    Int(i64),
    Float(f64),
    Ident(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Call { name: String, args: Vec<Expr> },
    Method { target: String, method: String, args: Vec<Expr> },
}

struct Statement {
    name: String,
    expr: Expr,
    line: usize,
}

struct Script {
    statements: Vec<Statement>,
    tail: Option<(Expr, usize)>,
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<(Token, usize)>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, line)| *line)
            .unwrap_or(1)
    }

    fn next(&mut self) -> ParseResult<Token> {
        let line = self.line();
        let token = self
            .tokens
            .get(self.pos)
            .map(|(t, _)| t.clone())
            .ok_or_else(|| ParseError::new(line, "unexpected end of script"))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, punct: char) -> ParseResult<()> {
        let line = self.line();
        match self.next()? {
            Token::Punct(c) if c == punct => Ok(()),
            other => Err(ParseError::new(
                line,
                format!("expected '{}', found {:?}", punct, other),
            )),
        }
    }

    fn eat(&mut self, punct: char) -> bool {
        if self.peek() == Some(&Token::Punct(punct)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn script(mut self) -> ParseResult<Script> {
        let mut statements = Vec::new();
        let mut tail = None;

        while let Some(token) = self.peek() {
            let line = self.line();
            if *token == Token::Ident("let".to_string()) {
                self.pos += 1;
                let name = match self.next()? {
                    Token::Ident(name) => name,
                    other => {
                        return Err(ParseError::new(
                            line,
                            format!("expected a name after 'let', found {:?}", other),
                        ))
                    }
                };
                self.expect('=')?;
                let expr = self.expr()?;
                self.expect(';')?;
                statements.push(Statement { name, expr, line });
            } else {
                let expr = self.expr()?;
                self.eat(';');
                if self.peek().is_some() {
                    return Err(ParseError::new(
                        self.line(),
                        "only the last expression may appear without 'let'",
                    ));
                }
                tail = Some((expr, line));
            }
        }

        Ok(Script { statements, tail })
    }

    fn expr(&mut self) -> ParseResult<Expr> {
        let line = self.line();
        match self.next()? {
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Int(v) => Ok(Expr::Int(v)),
            Token::Float(v) => Ok(Expr::Float(v)),
            Token::Punct('[') => Ok(Expr::List(self.items(']')?)),
            Token::Punct('(') => Ok(Expr::Tuple(self.items(')')?)),
            Token::Ident(name) => {
                if self.eat('(') {
                    let args = self.items(')')?;
                    Ok(Expr::Call { name, args })
                } else if self.eat('.') {
                    let method = match self.next()? {
                        Token::Ident(method) => method,
                        other => {
                            return Err(ParseError::new(
                                line,
                                format!("expected a method name, found {:?}", other),
                            ))
                        }
                    };
                    self.expect('(')?;
                    let args = self.items(')')?;
                    Ok(Expr::Method {
                        target: name,
                        method,
                        args,
                    })
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            other => Err(ParseError::new(line, format!("unexpected {:?}", other))),
        }
    }

    /// Comma-separated expressions up to `close`; a trailing comma is fine.
    fn items(&mut self, close: char) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.expr()?);
            if !self.eat(',') {
                self.expect(close)?;
                return Ok(items);
            }
        }
    }
}

// ── Interpreter ──

#[derive(Debug, Clone)]
enum Binding {
    Stream(Stream),
    Node(NodeRef),
}

#[derive(Default)]
struct Interpreter {
    bindings: HashMap<String, Binding>,
}

impl Interpreter {
    fn eval(&self, expr: &Expr, line: usize) -> ParseResult<Binding> {
        let graph_err = |e: GraphError| ParseError::new(line, e.to_string());

        let (name, args) = match expr {
            Expr::Call { name, args } => (name.as_str(), args.as_slice()),
            other => return Ok(Binding::Stream(self.stream(other, line)?)),
        };

        let binding = match (name, args) {
            ("input", [filename, args, kwargs]) => {
                let args = string_list(args, line)?;
                Binding::Stream(builder::input_with(
                    string(filename, line)?,
                    &as_strs(&args),
                    options(kwargs, line)?,
                ))
            }
            ("vfilter" | "afilter", [inputs, filter, typings, args, kwargs]) => {
                let inputs = self.streams(inputs, line)?;
                let filter = string(filter, line)?;
                let typings = typing_list(typings, line)?;
                let args = string_list(args, line)?;
                let kwargs = options(kwargs, line)?;
                let stream = if name == "vfilter" {
                    builder::vfilter(&inputs, &filter, &typings, &as_strs(&args), kwargs)
                } else {
                    builder::afilter(&inputs, &filter, &typings, &as_strs(&args), kwargs)
                };
                Binding::Stream(stream.map_err(graph_err)?)
            }
            ("filter_multi_output", [inputs, filter, in_typings, out_typings, args, kwargs]) => {
                let args = string_list(args, line)?;
                Binding::Node(
                    builder::filter_multi_output(
                        &self.streams(inputs, line)?,
                        &string(filter, line)?,
                        &typing_list(in_typings, line)?,
                        &typing_list(out_typings, line)?,
                        &as_strs(&args),
                        options(kwargs, line)?,
                    )
                    .map_err(graph_err)?,
                )
            }
            ("output", [inputs, filename, args, kwargs]) => {
                let args = string_list(args, line)?;
                Binding::Stream(
                    builder::output(
                        &self.streams(inputs, line)?,
                        string(filename, line)?,
                        &as_strs(&args),
                        options(kwargs, line)?,
                    )
                    .map_err(graph_err)?,
                )
            }
            ("merge_outputs", [inputs]) => Binding::Stream(
                builder::merge_outputs(&self.streams(inputs, line)?).map_err(graph_err)?,
            ),
            ("global_args", [inputs, args, kwargs]) => {
                let args = string_list(args, line)?;
                Binding::Stream(
                    builder::global_args(
                        &self.streams(inputs, line)?,
                        &as_strs(&args),
                        options(kwargs, line)?,
                    )
                    .map_err(graph_err)?,
                )
            }
            (name, args) => {
                return Err(ParseError::new(
                    line,
                    format!("unknown call {}() with {} arguments", name, args.len()),
                ))
            }
        };

        Ok(binding)
    }

    fn lookup(&self, name: &str, line: usize) -> ParseResult<&Binding> {
        self.bindings
            .get(name)
            .ok_or_else(|| ParseError::new(line, format!("unbound name '{}'", name)))
    }

    fn streams(&self, expr: &Expr, line: usize) -> ParseResult<Vec<Stream>> {
        match expr {
            Expr::List(items) => items.iter().map(|item| self.stream(item, line)).collect(),
            other => Err(ParseError::new(
                line,
                format!("expected a stream list, found {:?}", other),
            )),
        }
    }

    /// `name`, `name.video()`, `name.audio()`, `name.video(n)`,
    /// `name.audio(n)` or `name.output(n)`.
    fn stream(&self, expr: &Expr, line: usize) -> ParseResult<Stream> {
        let graph_err = |e: GraphError| ParseError::new(line, e.to_string());

        match expr {
            Expr::Ident(name) => match self.lookup(name, line)? {
                Binding::Stream(stream) => Ok(stream.clone()),
                Binding::Node(node) => node.stream().map_err(graph_err),
            },
            Expr::Method {
                target,
                method,
                args,
            } => match (self.lookup(target, line)?, method.as_str(), args.as_slice()) {
                (Binding::Stream(stream), "video", []) => stream.video().map_err(graph_err),
                (Binding::Stream(stream), "audio", []) => stream.audio().map_err(graph_err),
                (Binding::Node(node), "video", [Expr::Int(n)]) => {
                    node.video(index(*n, line)?).map_err(graph_err)
                }
                (Binding::Node(node), "audio", [Expr::Int(n)]) => {
                    node.audio(index(*n, line)?).map_err(graph_err)
                }
                (Binding::Node(node), "output", [Expr::Int(n)]) => {
                    node.output(index(*n, line)?).map_err(graph_err)
                }
                _ => Err(ParseError::new(
                    line,
                    format!("unsupported method {}.{}()", target, method),
                )),
            },
            other => Err(ParseError::new(line, format!("expected a stream, found {:?}", other))),
        }
    }
}

fn index(n: i64, line: usize) -> ParseResult<usize> {
    usize::try_from(n).map_err(|_| ParseError::new(line, format!("negative output index {}", n)))
}

fn as_strs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

fn string(expr: &Expr, line: usize) -> ParseResult<String> {
    match expr {
        Expr::Str(s) => Ok(s.clone()),
        other => Err(ParseError::new(line, format!("expected a string, found {:?}", other))),
    }
}

fn string_list(expr: &Expr, line: usize) -> ParseResult<Vec<String>> {
    match expr {
        Expr::List(items) => items.iter().map(|item| string(item, line)).collect(),
        other => Err(ParseError::new(line, format!("expected a string list, found {:?}", other))),
    }
}

fn typing_list(expr: &Expr, line: usize) -> ParseResult<Vec<MediaKind>> {
    let items = match expr {
        Expr::List(items) => items,
        other => {
            return Err(ParseError::new(line, format!("expected a typing list, found {:?}", other)))
        }
    };
    items
        .iter()
        .map(|item| match item {
            Expr::Ident(name) if name == "video" => Ok(MediaKind::Video),
            Expr::Ident(name) if name == "audio" => Ok(MediaKind::Audio),
            Expr::Ident(name) if name == "generic" => Ok(MediaKind::Generic),
            other => Err(ParseError::new(line, format!("unknown media kind {:?}", other))),
        })
        .collect()
}

/// `[("key", value), ...]`
fn options(expr: &Expr, line: usize) -> ParseResult<Options> {
    let items = match expr {
        Expr::List(items) => items,
        other => {
            return Err(ParseError::new(line, format!("expected an option list, found {:?}", other)))
        }
    };

    let mut options = Options::new();
    for item in items {
        match item {
            Expr::Tuple(pair) if pair.len() == 2 => {
                options.set(string(&pair[0], line)?, value(&pair[1], line)?);
            }
            other => {
                return Err(ParseError::new(
                    line,
                    format!("expected a (key, value) pair, found {:?}", other),
                ))
            }
        }
    }
    Ok(options)
}

fn value(expr: &Expr, line: usize) -> ParseResult<Value> {
    match expr {
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Int(v) => Ok(Value::Int(*v)),
        Expr::Float(v) => Ok(Value::Float(*v)),
        Expr::Ident(name) => match name.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            "NaN" => Ok(Value::Float(f64::NAN)),
            "inf" => Ok(Value::Float(f64::INFINITY)),
            _ => Err(ParseError::new(line, format!("unknown literal '{}'", name))),
        },
        Expr::Call { name, args } if name == "lazy" && args.len() == 1 => {
            Ok(Value::Lazy(lazy(&args[0], line)?))
        }
        other => Err(ParseError::new(line, format!("expected a value, found {:?}", other))),
    }
}

fn lazy(expr: &Expr, line: usize) -> ParseResult<LazyValue> {
    match expr {
        Expr::Int(v) => Ok(LazyValue::Int(*v)),
        Expr::Float(v) => Ok(LazyValue::Float(*v)),
        Expr::Ident(name) if name == "NaN" => Ok(LazyValue::Float(f64::NAN)),
        Expr::Ident(name) if name == "inf" => Ok(LazyValue::Float(f64::INFINITY)),
        Expr::Call { name, args } => match (name.as_str(), args.as_slice()) {
            ("ref", [key]) => Ok(LazyValue::Ref(string(key, line)?)),
            ("add", [a, b]) => Ok(lazy(a, line)?.add(lazy(b, line)?)),
            ("sub", [a, b]) => Ok(lazy(a, line)?.sub(lazy(b, line)?)),
            ("mul", [a, b]) => Ok(lazy(a, line)?.mul(lazy(b, line)?)),
            ("div", [a, b]) => Ok(lazy(a, line)?.div(lazy(b, line)?)),
            _ => Err(ParseError::new(line, format!("unknown lazy operation {}()", name))),
        },
        other => Err(ParseError::new(
            line,
            format!("expected a lazy expression, found {:?}", other),
        )),
    }
}
