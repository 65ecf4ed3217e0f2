use std::sync::OnceLock;

use regex::Regex;

use crate::environment::SyntaxConfig;
use crate::error::{ParseResult, SyntaxErrorKind, TemplateSyntaxError};
use crate::source::Span;
use crate::token::{Token, TokenKind, TokenStream, TokenType};

const OPERATORS: &[(&str, TokenKind)] = &[
    ("//", TokenKind::FloorDiv),
    ("**", TokenKind::Pow),
    ("==", TokenKind::Eq),
    ("!=", TokenKind::Ne),
    ("<=", TokenKind::LtEq),
    (">=", TokenKind::GtEq),
    ("+", TokenKind::Add),
    ("-", TokenKind::Sub),
    ("*", TokenKind::Mul),
    ("/", TokenKind::Div),
    ("%", TokenKind::Mod),
    ("~", TokenKind::Tilde),
    ("|", TokenKind::Pipe),
    (".", TokenKind::Dot),
    (",", TokenKind::Comma),
    (":", TokenKind::Colon),
    (";", TokenKind::Semicolon),
    ("=", TokenKind::Assign),
    ("<", TokenKind::Lt),
    (">", TokenKind::Gt),
];

struct TagRules {
    sequence: Regex,
    float: Regex,
    integer: Regex,
    name: Regex,
    string: Regex,
}

static TAG_RULES: OnceLock<Result<TagRules, String>> = OnceLock::new();

fn tag_rules() -> ParseResult<&'static TagRules> {
    TAG_RULES
        .get_or_init(|| {
            let compile = |pattern: &str| Regex::new(pattern).map_err(|err| err.to_string());
            Ok(TagRules {
                // bounds are integers or dotted name paths, never quoted or joined text
                sequence: compile(concat!(
                    r"^\(\s*(?P<start>-?\d+|[A-Za-z_]\w*(?:\.\w+)*)",
                    r"\s*\.\.\s*",
                    r"(?P<stop>-?\d+|[A-Za-z_]\w*(?:\.\w+)*)\s*\)",
                ))?,
                float: compile(
                    r"^(?:\d+(?:_\d+)*\.\d+(?:_\d+)*(?:[eE][+-]?\d+)?|\d+(?:_\d+)*[eE][+-]?\d+)",
                )?,
                integer: compile(r"^\d+(?:_\d+)*")?,
                name: compile(r"^[a-zA-Z_][a-zA-Z0-9_]*")?,
                string: compile(r#"^(?s:'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*")"#)?,
            })
        })
        .as_ref()
        .map_err(|err| TemplateSyntaxError::syntax(format!("invalid lexer rule: {err}"), 1))
}

/// Delimiter-dependent patterns, built per configuration.
struct RootRules {
    opener: Regex,
    raw_begin: Regex,
    raw_end: Regex,
}

impl RootRules {
    fn new(config: &SyntaxConfig) -> ParseResult<Self> {
        let mut openers = [
            ("variable", config.variable_start.as_str()),
            ("block", config.block_start.as_str()),
            ("comment", config.comment_start.as_str()),
        ];
        // leftmost-first alternation: longer delimiters must win shared prefixes
        openers.sort_by_key(|(_, delim)| std::cmp::Reverse(delim.len()));
        let opener = openers
            .iter()
            .map(|(group, delim)| format!("(?P<{group}>{})", regex::escape(delim)))
            .collect::<Vec<_>>()
            .join("|");
        let block_start = regex::escape(&config.block_start);
        let block_end = regex::escape(&config.block_end);
        let compile = |pattern: String| {
            Regex::new(&pattern).map_err(|err| {
                TemplateSyntaxError::syntax(format!("invalid delimiter configuration: {err}"), 1)
            })
        };
        Ok(Self {
            opener: compile(opener)?,
            raw_begin: compile(format!(r"^-?\s*raw\s*(?P<strip>-?){block_end}"))?,
            raw_end: compile(format!(
                r"{block_start}(?P<strip>-?)\s*endraw\s*(?P<trail>-?){block_end}"
            ))?,
        })
    }
}

/// Splits template source into data, delimiter and expression tokens.
pub fn tokenize(
    config: &SyntaxConfig,
    source: &str,
    name: Option<&str>,
    filename: Option<&str>,
) -> ParseResult<TokenStream> {
    let mut source = source;
    if !config.keep_trailing_newline {
        source = source
            .strip_suffix("\r\n")
            .or_else(|| source.strip_suffix('\n'))
            .unwrap_or(source);
    }
    let rules = RootRules::new(config)?;
    let mut lexer = Lexer::new(source, 1, 0);
    lexer
        .lex_template(config, &rules)
        .map_err(|err| err.with_template(name, filename))?;
    let end = source.len();
    lexer
        .tokens
        .push(Token::new(TokenKind::Eof, lexer.line, Span::new(end, end)));
    Ok(TokenStream::new(
        lexer.tokens,
        name.map(str::to_string),
        filename.map(str::to_string),
    ))
}

/// Lexes a bare expression as if it appeared inside a tag. Line numbers and
/// spans are reported relative to `line` and `offset`.
pub fn tokenize_expression(text: &str, line: usize, offset: usize) -> ParseResult<Vec<Token>> {
    let mut lexer = Lexer::new(text, line, offset);
    lexer.lex_tag(None)?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
    offset: usize,
    tokens: Vec<Token>,
    lstrip_next: bool,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str, line: usize, offset: usize) -> Self {
        Self {
            source,
            pos: 0,
            line,
            offset,
            tokens: Vec::new(),
            lstrip_next: false,
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn span(&self, lo: usize, hi: usize) -> Span {
        Span::new(self.offset + lo, self.offset + hi)
    }

    fn push(&mut self, kind: TokenKind, lo: usize, hi: usize, line: usize) {
        let span = self.span(lo, hi);
        self.tokens.push(Token::new(kind, line, span));
    }

    fn advance_to(&mut self, pos: usize) {
        self.line += self.source[self.pos..pos].matches('\n').count();
        self.pos = pos;
    }

    fn error(&self, message: impl Into<String>) -> TemplateSyntaxError {
        let at = self.pos.min(self.source.len());
        TemplateSyntaxError::syntax(message, self.line).with_span(self.span(at, at))
    }

    fn lex_template(&mut self, config: &SyntaxConfig, rules: &RootRules) -> ParseResult<()> {
        while self.pos < self.source.len() {
            let Some(caps) = rules.opener.captures_at(self.source, self.pos) else {
                self.push_data(self.source.len(), false);
                break;
            };
            let Some(whole) = caps.get(0) else {
                break;
            };
            let after = whole.end();
            let strip_before = self.source[after..].starts_with('-');
            self.push_data(whole.start(), strip_before);

            let open_line = self.line;
            if caps.name("comment").is_some() {
                self.lex_comment(config, after)?;
            } else if caps.name("block").is_some() {
                if let Some(raw) = rules.raw_begin.captures(&self.source[after..]) {
                    let content_start = after + raw.get(0).map_or(0, |m| m.end());
                    self.lstrip_next = raw.name("strip").is_some_and(|m| !m.is_empty());
                    self.advance_to(content_start);
                    self.lex_raw(rules, open_line)?;
                    continue;
                }
                self.push(TokenKind::BlockBegin, whole.start(), after, open_line);
                self.advance_to(after + usize::from(strip_before));
                self.lex_tag(Some((config.block_end.as_str(), TokenKind::BlockEnd)))?;
                if config.trim_blocks && !self.lstrip_next {
                    let rest = self.rest();
                    if rest.starts_with("\r\n") {
                        self.advance_to(self.pos + 2);
                    } else if rest.starts_with('\n') {
                        self.advance_to(self.pos + 1);
                    }
                }
            } else {
                self.push(TokenKind::VariableBegin, whole.start(), after, open_line);
                self.advance_to(after + usize::from(strip_before));
                self.lex_tag(Some((config.variable_end.as_str(), TokenKind::VariableEnd)))?;
            }
        }
        Ok(())
    }

    fn push_data(&mut self, end: usize, strip_trailing: bool) {
        let raw = &self.source[self.pos..end];
        let mut text = raw;
        let mut lo = self.pos;
        if std::mem::take(&mut self.lstrip_next) {
            let trimmed = text.trim_start();
            lo += text.len() - trimmed.len();
            text = trimmed;
        }
        if strip_trailing {
            text = text.trim_end();
        }
        let line = self.line + self.source[self.pos..lo].matches('\n').count();
        if !text.is_empty() {
            self.push(TokenKind::Data(text.to_string()), lo, lo + text.len(), line);
        }
        self.advance_to(end);
    }

    fn lex_comment(&mut self, config: &SyntaxConfig, after: usize) -> ParseResult<()> {
        let Some(found) = self.source[after..].find(&config.comment_end) else {
            return Err(self.error("missing end of comment tag"));
        };
        let end = after + found;
        self.lstrip_next = self.source[..end].ends_with('-') && end > after;
        self.advance_to(end + config.comment_end.len());
        Ok(())
    }

    fn lex_raw(&mut self, rules: &RootRules, open_line: usize) -> ParseResult<()> {
        let Some(caps) = rules.raw_end.captures_at(self.source, self.pos) else {
            return Err(TemplateSyntaxError::syntax("missing end of raw directive", open_line)
                .with_span(self.span(self.pos, self.pos)));
        };
        let Some(whole) = caps.get(0) else {
            return Ok(());
        };
        let strip = caps.name("strip").is_some_and(|m| !m.is_empty());
        let trail = caps.name("trail").is_some_and(|m| !m.is_empty());
        self.push_data(whole.start(), strip);
        self.advance_to(whole.end());
        self.lstrip_next = trail;
        Ok(())
    }

    /// Lexes expression tokens until `end` (a closing delimiter and the token
    /// it produces) or, for bare expressions, until the input runs out.
    fn lex_tag(&mut self, end: Option<(&str, TokenKind)>) -> ParseResult<()> {
        let rules = tag_rules()?;
        let mut balance: Vec<(char, usize)> = Vec::new();
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.advance_to(self.pos + rest.len() - trimmed.len());

            if self.pos >= self.source.len() {
                if let Some((ch, line)) = balance.pop() {
                    return Err(TemplateSyntaxError::syntax(format!("unclosed '{ch}'"), line)
                        .with_span(self.span(self.pos, self.pos)));
                }
                if end.is_some() {
                    return Err(TemplateSyntaxError::new(
                        SyntaxErrorKind::UnexpectedEof,
                        "unexpected end of template, missing end of tag",
                        self.line,
                    )
                    .with_span(self.span(self.pos, self.pos)));
                }
                return Ok(());
            }

            if balance.is_empty()
                && let Some((delim, kind)) = &end
            {
                let rest = self.rest();
                let start = self.pos;
                if rest.starts_with('-') && rest[1..].starts_with(delim) {
                    self.push(kind.clone(), start, start + 1 + delim.len(), self.line);
                    self.advance_to(start + 1 + delim.len());
                    self.lstrip_next = true;
                    return Ok(());
                }
                if rest.starts_with(delim) {
                    self.push(kind.clone(), start, start + delim.len(), self.line);
                    self.advance_to(start + delim.len());
                    return Ok(());
                }
            }

            self.lex_tag_token(rules, &mut balance)?;
        }
    }

    fn lex_tag_token(
        &mut self,
        rules: &TagRules,
        balance: &mut Vec<(char, usize)>,
    ) -> ParseResult<()> {
        let rest = self.rest();
        let start = self.pos;
        let line = self.line;
        let after_dot = self
            .tokens
            .last()
            .is_some_and(|token| token.ty() == TokenType::Dot);

        if let Some(caps) = rules.sequence.captures(rest) {
            let len = caps.get(0).map_or(0, |m| m.len());
            let start_text = caps.name("start").map_or("", |m| m.as_str()).to_string();
            let stop_text = caps.name("stop").map_or("", |m| m.as_str()).to_string();
            self.push(
                TokenKind::Sequence {
                    start: start_text,
                    stop: stop_text,
                },
                start,
                start + len,
                line,
            );
            self.advance_to(start + len);
            return Ok(());
        }

        if !after_dot && let Some(m) = rules.float.find(rest) {
            let text = m.as_str().replace('_', "");
            let value = text
                .parse::<f64>()
                .map_err(|_| self.error(format!("invalid float literal '{}'", m.as_str())))?;
            self.push(TokenKind::Float(value), start, start + m.len(), line);
            self.advance_to(start + m.len());
            return Ok(());
        }

        if let Some(m) = rules.integer.find(rest) {
            let text = m.as_str().replace('_', "");
            let value = text
                .parse::<i64>()
                .map_err(|_| self.error(format!("integer literal '{}' out of range", m.as_str())))?;
            self.push(TokenKind::Integer(value), start, start + m.len(), line);
            self.advance_to(start + m.len());
            return Ok(());
        }

        if let Some(m) = rules.name.find(rest) {
            let mut value = m.as_str().to_string();
            let after_block_begin = self
                .tokens
                .last()
                .is_some_and(|token| token.ty() == TokenType::BlockBegin);
            if after_block_begin && value == "elsif" {
                value = "elif".to_string();
            }
            self.push(TokenKind::Name(value), start, start + m.len(), line);
            self.advance_to(start + m.len());
            return Ok(());
        }

        if let Some(m) = rules.string.find(rest) {
            let quoted = m.as_str();
            let value = unescape_string(&quoted[1..quoted.len() - 1]);
            self.push(TokenKind::String(value), start, start + m.len(), line);
            self.advance_to(start + m.len());
            return Ok(());
        }

        let Some(ch) = rest.chars().next() else {
            return Ok(());
        };
        let bracket = match ch {
            '(' => Some(TokenKind::LParen),
            '[' => Some(TokenKind::LBracket),
            '{' => Some(TokenKind::LBrace),
            ')' => Some(TokenKind::RParen),
            ']' => Some(TokenKind::RBracket),
            '}' => Some(TokenKind::RBrace),
            _ => None,
        };
        if let Some(kind) = bracket {
            match ch {
                '(' | '[' | '{' => balance.push((ch, line)),
                _ => {
                    let expected = match balance.pop() {
                        Some(('(', _)) => ')',
                        Some(('[', _)) => ']',
                        Some(_) => '}',
                        None => return Err(self.error(format!("unexpected '{ch}'"))),
                    };
                    if expected != ch {
                        return Err(
                            self.error(format!("unexpected '{ch}', expected '{expected}'"))
                        );
                    }
                }
            }
            self.push(kind, start, start + 1, line);
            self.advance_to(start + 1);
            return Ok(());
        }

        if let Some((op, kind)) = OPERATORS.iter().find(|(op, _)| rest.starts_with(op)) {
            self.push(kind.clone(), start, start + op.len(), line);
            self.advance_to(start + op.len());
            return Ok(());
        }

        if ch == '"' || ch == '\'' {
            return Err(self.error("unterminated string literal"));
        }
        Err(self.error(format!("unexpected char '{ch}'")))
    }
}

fn unescape_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(escaped @ ('\\' | '\'' | '"')) => out.push(escaped),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
