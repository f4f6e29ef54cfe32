// packages/intercept/src/protocol/response.rs
//! Response grammar and parser
//!
//! ```text
//! response    := "" | "raise " expr | expr
//! expr        := None | True | False | number | string
//!              | "[" items "]" | "(" items ")" | "{" pairs "}"
//!              | ("Instance" | "NewStyleInstance") "(" token "," token ")"
//!              | dotted-name "(" items ")"        (only under "raise")
//! token       := string | bare run of characters other than , ( ) and whitespace
//! ```
//!
//! Nothing here is evaluated. The parser produces a closed [`Expr`] tree and
//! rejects anything outside the grammar with an offset-carrying decode error.

use crate::utils::errors::{InterceptError, Result};

const MAX_DEPTH: usize = 128;

/// Which deferred-instance marker introduced an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStyle {
    Classic,
    NewStyle,
}

/// Parsed response expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Instance {
        style: InstanceStyle,
        class_name: String,
        handle: String,
    },
    /// `Name(args)`; only meaningful as a raised exception
    Construct { callee: String, args: Vec<Expr> },
}

/// A complete decoded response
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// No remote binding: behave as if nothing was intercepted
    Empty,
    Value(Expr),
    Raise(Expr),
}

impl Response {
    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Ok(Response::Empty);
        }
        if let Some(rest) = text.strip_prefix("raise ") {
            let offset = text.len() - rest.len();
            return Ok(Response::Raise(Parser::new(rest, offset, true).parse_all()?));
        }
        Ok(Response::Value(Parser::new(text, 0, false).parse_all()?))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Response::Empty)
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    base: usize,
    depth: usize,
    /// Constructor calls are accepted only in a raised payload
    raised: bool,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, base: usize, raised: bool) -> Self {
        Self {
            input,
            pos: 0,
            base,
            depth: 0,
            raised,
        }
    }

    fn parse_all(mut self) -> Result<Expr> {
        let expr = self.parse_expr()?;
        self.skip_ws();
        if self.pos != self.input.len() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    fn error(&self, message: impl Into<String>) -> InterceptError {
        InterceptError::Decode {
            offset: self.base + self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        let expr = self.parse_expr_inner();
        self.depth -= 1;
        expr
    }

    fn parse_expr_inner(&mut self) -> Result<Expr> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("expected a value, found end of input")),
            Some('[') => {
                self.bump();
                Ok(Expr::List(self.parse_items(']')?.0))
            }
            Some('(') => {
                self.bump();
                let (mut items, trailing_comma) = self.parse_items(')')?;
                if items.len() == 1 && !trailing_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(Expr::Tuple(items))
                }
            }
            Some('{') => {
                self.bump();
                self.parse_dict()
            }
            Some('\'') | Some('"') => Ok(Expr::Str(self.parse_string(false)?)),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                self.parse_number()
            }
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_name_or_call(),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
        }
    }

    /// Comma-separated expressions up to `close`; also reports a trailing comma
    fn parse_items(&mut self, close: char) -> Result<(Vec<Expr>, bool)> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.bump();
                return Ok((items, trailing_comma));
            }
            items.push(self.parse_expr()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => trailing_comma = true,
                Some(c) if c == close => return Ok((items, false)),
                Some(c) => return Err(self.error(format!("unexpected '{}' in sequence", c))),
                None => return Err(self.error(format!("unterminated sequence, expected '{}'", close))),
            }
        }
    }

    fn parse_dict(&mut self) -> Result<Expr> {
        let mut pairs = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Expr::Dict(pairs));
            }
            let key = self.parse_expr()?;
            self.expect(':')?;
            let value = self.parse_expr()?;
            pairs.push((key, value));
            self.skip_ws();
            match self.bump() {
                Some(',') => {}
                Some('}') => return Ok(Expr::Dict(pairs)),
                Some(c) => return Err(self.error(format!("unexpected '{}' in mapping", c))),
                None => return Err(self.error("unterminated mapping")),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Expr> {
        let start = self.pos;
        let negative = self.peek() == Some('-');
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.bump();
        }
        if self.input[self.pos..].starts_with("inf") {
            self.pos += 3;
            return Ok(Expr::Float(if negative {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            }));
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {}
                '.' => is_float = true,
                'e' | 'E' => {
                    is_float = true;
                    self.bump();
                    if matches!(self.peek(), Some('-') | Some('+')) {
                        self.bump();
                    }
                    continue;
                }
                _ => break,
            }
            self.bump();
        }
        let input = self.input;
        let text = &input[start..self.pos];

        // Long-integer suffix
        if !is_float && matches!(self.peek(), Some('L') | Some('l')) {
            self.bump();
        }

        if is_float {
            text.parse::<f64>()
                .map(Expr::Float)
                .map_err(|_| self.error(format!("invalid float literal '{}'", text)))
        } else {
            text.parse::<i64>()
                .map(Expr::Int)
                .map_err(|_| self.error(format!("invalid or out-of-range integer '{}'", text)))
        }
    }

    fn parse_identifier(&mut self) -> &'a str {
        let input = self.input;
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
        {
            self.bump();
        }
        &input[start..self.pos]
    }

    fn parse_name_or_call(&mut self) -> Result<Expr> {
        let start = self.pos;
        let name = self.parse_identifier();

        // String prefixes: u'', b'', r'', ur'', br''
        if matches!(self.peek(), Some('\'') | Some('"')) {
            let lower = name.to_ascii_lowercase();
            if matches!(lower.as_str(), "u" | "b" | "r" | "ur" | "br" | "rb") {
                return Ok(Expr::Str(self.parse_string(lower.contains('r'))?));
            }
            self.pos = start;
            return Err(self.error(format!("unknown string prefix '{}'", name)));
        }

        match name {
            "None" => return Ok(Expr::None),
            "True" => return Ok(Expr::Bool(true)),
            "False" => return Ok(Expr::Bool(false)),
            "inf" => return Ok(Expr::Float(f64::INFINITY)),
            "nan" => return Ok(Expr::Float(f64::NAN)),
            _ => {}
        }

        self.skip_ws();
        if self.peek() != Some('(') {
            self.pos = start;
            return Err(self.error(format!("unsupported bare name '{}'", name)));
        }
        self.bump();

        match name {
            "Instance" | "NewStyleInstance" => {
                let style = if name == "Instance" {
                    InstanceStyle::Classic
                } else {
                    InstanceStyle::NewStyle
                };
                let class_name = self.parse_token()?;
                self.expect(',')?;
                let handle = self.parse_token()?;
                self.expect(')')?;
                Ok(Expr::Instance {
                    style,
                    class_name,
                    handle,
                })
            }
            _ if !self.raised => {
                self.pos = start;
                Err(self.error(format!(
                    "constructor call '{}(...)' is only valid after 'raise'",
                    name
                )))
            }
            _ => {
                let (args, _) = self.parse_items(')')?;
                Ok(Expr::Construct {
                    callee: name.to_string(),
                    args,
                })
            }
        }
    }

    /// Instance marker argument: quoted string or bare token
    fn parse_token(&mut self) -> Result<String> {
        self.skip_ws();
        if matches!(self.peek(), Some('\'') | Some('"')) {
            return self.parse_string(false);
        }
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && c != ',' && c != '(' && c != ')')
        {
            self.bump();
        }
        if start == self.pos {
            return Err(self.error("expected a class name or handle"));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_string(&mut self, raw: bool) -> Result<String> {
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected a string")),
        };
        let mut out = String::new();
        loop {
            let c = self
                .bump()
                .ok_or_else(|| self.error("unterminated string"))?;
            match c {
                c if c == quote => return Ok(out),
                '\\' if raw => {
                    out.push('\\');
                    if let Some(next) = self.bump() {
                        out.push(next);
                    }
                }
                '\\' => self.parse_escape(&mut out)?,
                c => out.push(c),
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> Result<()> {
        let c = self
            .bump()
            .ok_or_else(|| self.error("unterminated escape"))?;
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '\'' | '"' => out.push(c),
            'x' => out.push(self.parse_hex_escape(2)?),
            'u' => out.push(self.parse_hex_escape(4)?),
            'U' => out.push(self.parse_hex_escape(8)?),
            '\n' => {}
            // Unknown escapes are kept verbatim
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn parse_hex_escape(&mut self, digits: usize) -> Result<char> {
        let start = self.pos;
        for _ in 0..digits {
            match self.bump() {
                Some(c) if c.is_ascii_hexdigit() => {}
                _ => return Err(self.error("invalid hex escape")),
            }
        }
        let code = u32::from_str_radix(&self.input[start..self.pos], 16)
            .map_err(|_| self.error("invalid hex escape"))?;
        char::from_u32(code).ok_or_else(|| self.error("escape is not a valid character"))
    }
}
