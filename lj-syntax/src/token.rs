use std::fmt;

use crate::error::{ParseResult, SyntaxErrorKind, TemplateSyntaxError};
use crate::source::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Data(String),
    Name(String),
    String(String),
    Integer(i64),
    Float(f64),
    /// `(start..stop)` captured as raw bound text.
    Sequence { start: String, stop: String },
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Tilde,
    Pipe,
    Dot,
    Comma,
    Colon,
    Semicolon,
    Assign,
    Eq,
    Ne,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    VariableBegin,
    VariableEnd,
    BlockBegin,
    BlockEnd,
    Eof,
}

/// Data-less discriminant of [`TokenKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Data,
    Name,
    String,
    Integer,
    Float,
    Sequence,
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Tilde,
    Pipe,
    Dot,
    Comma,
    Colon,
    Semicolon,
    Assign,
    Eq,
    Ne,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    VariableBegin,
    VariableEnd,
    BlockBegin,
    BlockEnd,
    Eof,
}

impl TokenKind {
    pub fn ty(&self) -> TokenType {
        match self {
            TokenKind::Data(_) => TokenType::Data,
            TokenKind::Name(_) => TokenType::Name,
            TokenKind::String(_) => TokenType::String,
            TokenKind::Integer(_) => TokenType::Integer,
            TokenKind::Float(_) => TokenType::Float,
            TokenKind::Sequence { .. } => TokenType::Sequence,
            TokenKind::Add => TokenType::Add,
            TokenKind::Sub => TokenType::Sub,
            TokenKind::Mul => TokenType::Mul,
            TokenKind::Div => TokenType::Div,
            TokenKind::FloorDiv => TokenType::FloorDiv,
            TokenKind::Mod => TokenType::Mod,
            TokenKind::Pow => TokenType::Pow,
            TokenKind::Tilde => TokenType::Tilde,
            TokenKind::Pipe => TokenType::Pipe,
            TokenKind::Dot => TokenType::Dot,
            TokenKind::Comma => TokenType::Comma,
            TokenKind::Colon => TokenType::Colon,
            TokenKind::Semicolon => TokenType::Semicolon,
            TokenKind::Assign => TokenType::Assign,
            TokenKind::Eq => TokenType::Eq,
            TokenKind::Ne => TokenType::Ne,
            TokenKind::Lt => TokenType::Lt,
            TokenKind::LtEq => TokenType::LtEq,
            TokenKind::Gt => TokenType::Gt,
            TokenKind::GtEq => TokenType::GtEq,
            TokenKind::LParen => TokenType::LParen,
            TokenKind::RParen => TokenType::RParen,
            TokenKind::LBracket => TokenType::LBracket,
            TokenKind::RBracket => TokenType::RBracket,
            TokenKind::LBrace => TokenType::LBrace,
            TokenKind::RBrace => TokenType::RBrace,
            TokenKind::VariableBegin => TokenType::VariableBegin,
            TokenKind::VariableEnd => TokenType::VariableEnd,
            TokenKind::BlockBegin => TokenType::BlockBegin,
            TokenKind::BlockEnd => TokenType::BlockEnd,
            TokenKind::Eof => TokenType::Eof,
        }
    }
}

impl TokenType {
    pub fn describe(self) -> &'static str {
        match self {
            TokenType::Data => "template data / text",
            TokenType::Name => "name",
            TokenType::String => "string",
            TokenType::Integer => "integer",
            TokenType::Float => "float",
            TokenType::Sequence => "sequence",
            TokenType::Add => "+",
            TokenType::Sub => "-",
            TokenType::Mul => "*",
            TokenType::Div => "/",
            TokenType::FloorDiv => "//",
            TokenType::Mod => "%",
            TokenType::Pow => "**",
            TokenType::Tilde => "~",
            TokenType::Pipe => "|",
            TokenType::Dot => ".",
            TokenType::Comma => ",",
            TokenType::Colon => ":",
            TokenType::Semicolon => ";",
            TokenType::Assign => "=",
            TokenType::Eq => "==",
            TokenType::Ne => "!=",
            TokenType::Lt => "<",
            TokenType::LtEq => "<=",
            TokenType::Gt => ">",
            TokenType::GtEq => ">=",
            TokenType::LParen => "(",
            TokenType::RParen => ")",
            TokenType::LBracket => "[",
            TokenType::RBracket => "]",
            TokenType::LBrace => "{",
            TokenType::RBrace => "}",
            TokenType::VariableBegin => "begin of print statement",
            TokenType::VariableEnd => "end of print statement",
            TokenType::BlockBegin => "begin of statement block",
            TokenType::BlockEnd => "end of statement block",
            TokenType::Eof => "end of template",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, span: Span) -> Self {
        Self { kind, line, span }
    }

    pub fn ty(&self) -> TokenType {
        self.kind.ty()
    }

    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_name(&self, expected: &str) -> bool {
        self.name() == Some(expected)
    }

    pub fn test(&self, rule: &TokenRule) -> bool {
        match rule {
            TokenRule::Type(ty) => self.ty() == *ty,
            TokenRule::Name(name) => self.is_name(name),
        }
    }

    pub fn test_any(&self, rules: &[TokenRule]) -> bool {
        rules.iter().any(|rule| self.test(rule))
    }

    /// Human readable form used in error messages: names read as
    /// themselves, everything else as its type description.
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Name(name) => name.clone(),
            other => other.ty().describe().to_string(),
        }
    }
}

/// Pattern a token can be tested against: either a bare token type or a
/// name token with a specific value (`name:endfor`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenRule {
    Type(TokenType),
    Name(String),
}

impl TokenRule {
    pub fn name(value: impl Into<String>) -> Self {
        TokenRule::Name(value.into())
    }
}

impl From<TokenType> for TokenRule {
    fn from(value: TokenType) -> Self {
        TokenRule::Type(value)
    }
}

impl fmt::Display for TokenRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenRule::Type(ty) => f.write_str(ty.describe()),
            TokenRule::Name(name) => f.write_str(name),
        }
    }
}

/// Pull-based token sequence with one token of lookahead. Reading past the
/// end keeps returning the trailing `Eof` token.
#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
    name: Option<String>,
    filename: Option<String>,
}

impl TokenStream {
    pub fn new(mut tokens: Vec<Token>, name: Option<String>, filename: Option<String>) -> Self {
        if !matches!(tokens.last(), Some(token) if token.ty() == TokenType::Eof) {
            let (line, end) = tokens
                .last()
                .map(|token| (token.line, token.span.hi))
                .unwrap_or((1, 0));
            tokens.push(Token::new(TokenKind::Eof, line, Span::new(end, end)));
        }
        Self {
            tokens,
            pos: 0,
            name,
            filename,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub fn look(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    pub fn is_eof(&self) -> bool {
        self.current().ty() == TokenType::Eof
    }

    /// Returns the current token and moves to the next one.
    pub fn next(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub fn skip(&mut self, n: usize) {
        for _ in 0..n {
            self.next();
        }
    }

    pub fn next_if(&mut self, rule: &TokenRule) -> Option<Token> {
        if self.current().test(rule) {
            Some(self.next())
        } else {
            None
        }
    }

    pub fn skip_if(&mut self, rule: &TokenRule) -> bool {
        self.next_if(rule).is_some()
    }

    pub fn expect(&mut self, rule: &TokenRule) -> ParseResult<Token> {
        if self.current().test(rule) {
            return Ok(self.next());
        }
        let current = self.current();
        let err = if current.ty() == TokenType::Eof {
            TemplateSyntaxError::new(
                SyntaxErrorKind::UnexpectedEof,
                format!("unexpected end of template, expected '{rule}'"),
                current.line,
            )
        } else {
            TemplateSyntaxError::syntax(
                format!("expected token '{rule}', got '{}'", current.describe()),
                current.line,
            )
        };
        Err(err
            .with_span(current.span)
            .with_template(self.name(), self.filename()))
    }

    pub fn expect_type(&mut self, ty: TokenType) -> ParseResult<Token> {
        self.expect(&TokenRule::Type(ty))
    }

    pub fn expect_name(&mut self, name: &str) -> ParseResult<Token> {
        self.expect(&TokenRule::name(name))
    }

    pub fn skip_if_type(&mut self, ty: TokenType) -> bool {
        self.skip_if(&TokenRule::Type(ty))
    }

    pub fn skip_if_name(&mut self, name: &str) -> bool {
        self.skip_if(&TokenRule::name(name))
    }
}
