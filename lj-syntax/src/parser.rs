use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::environment::{Environment, Extension};
use crate::error::{ParseResult, SyntaxErrorKind, TemplateSyntaxError};
use crate::nodes::{Expr, Stmt, Template};
use crate::token::{TokenKind, TokenRule, TokenStream, TokenType};

mod expr;
mod stmt;

/// What a statement handler produced: extensions may expand one tag into
/// several statements.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Single(Stmt),
    Multiple(Vec<Stmt>),
}

impl From<Stmt> for Statement {
    fn from(value: Stmt) -> Self {
        Statement::Single(value)
    }
}

impl From<Vec<Stmt>> for Statement {
    fn from(value: Vec<Stmt>) -> Self {
        Statement::Multiple(value)
    }
}

/// Recursive-descent parser over one token stream. Extensions receive a
/// mutable reference and drive it through the public `parse_*` helpers.
pub struct Parser {
    env: Arc<Environment>,
    stream: TokenStream,
    extensions: HashMap<&'static str, Arc<dyn Extension>>,
    last_identifier: usize,
    tag_stack: Vec<String>,
    end_token_stack: Vec<Vec<TokenRule>>,
}

impl Parser {
    pub fn new(
        env: Arc<Environment>,
        source: &str,
        name: Option<&str>,
        filename: Option<&str>,
    ) -> ParseResult<Self> {
        let stream = env.tokenize(source, name, filename)?;
        Ok(Self::with_stream(env, stream))
    }

    pub fn with_stream(env: Arc<Environment>, stream: TokenStream) -> Self {
        let mut extensions = HashMap::new();
        for extension in env.extensions() {
            for tag in extension.tags() {
                extensions.insert(*tag, Arc::clone(extension));
            }
        }
        Self {
            env,
            stream,
            extensions,
            last_identifier: 0,
            tag_stack: Vec::new(),
            end_token_stack: Vec::new(),
        }
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.env
    }

    pub fn stream(&mut self) -> &mut TokenStream {
        &mut self.stream
    }

    pub fn error(
        &self,
        kind: SyntaxErrorKind,
        message: impl Into<String>,
        line: Option<usize>,
    ) -> TemplateSyntaxError {
        let current = self.stream.current();
        let line = line.unwrap_or(current.line);
        let mut err = TemplateSyntaxError::new(kind, message, line);
        if current.line == line {
            err = err.with_span(current.span);
        }
        err.with_template(self.stream.name(), self.stream.filename())
    }

    /// Fails with a syntax error at `line`, or at the current token.
    pub fn fail<T>(&self, message: impl Into<String>, line: Option<usize>) -> ParseResult<T> {
        Err(self.error(SyntaxErrorKind::Syntax, message, line))
    }

    pub fn fail_unknown_tag<T>(&self, name: &str, line: Option<usize>) -> ParseResult<T> {
        Err(self.unclosed_error(Some(name), &self.end_token_stack, line))
    }

    pub fn fail_eof<T>(&self, end_tokens: Option<&[TokenRule]>, line: Option<usize>) -> ParseResult<T> {
        let mut stack = self.end_token_stack.clone();
        if let Some(end_tokens) = end_tokens {
            stack.push(end_tokens.to_vec());
        }
        Err(self.unclosed_error(None, &stack, line))
    }

    fn unclosed_error(
        &self,
        name: Option<&str>,
        end_token_stack: &[Vec<TokenRule>],
        line: Option<usize>,
    ) -> TemplateSyntaxError {
        let expected = end_token_stack
            .iter()
            .flatten()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        let currently_looking = end_token_stack.last().map(|rules| {
            rules
                .iter()
                .map(|rule| format!("'{rule}'"))
                .collect::<Vec<_>>()
                .join(" or ")
        });

        let (kind, mut message) = match name {
            Some(name) => (
                SyntaxErrorKind::UnknownTag,
                vec![format!("Encountered unknown tag '{name}'.")],
            ),
            None => (
                SyntaxErrorKind::UnexpectedEof,
                vec!["Unexpected end of template.".to_string()],
            ),
        };
        if let Some(looking) = currently_looking.filter(|looking| !looking.is_empty()) {
            if name.is_some_and(|name| expected.iter().any(|tag| tag == name)) {
                message.push(format!(
                    "You probably made a nesting mistake. The parser is expecting this tag, \
                     but currently looking for {looking}."
                ));
            } else {
                message.push(format!(
                    "The parser was looking for the following tags: {looking}."
                ));
            }
        }
        if let Some(innermost) = self.tag_stack.last() {
            message.push(format!(
                "The innermost block that needs to be closed is '{innermost}'."
            ));
        }
        self.error(kind, message.join(" "), line)
    }

    pub fn is_tuple_end(&self, extra_end_rules: &[TokenRule]) -> bool {
        let current = self.stream.current();
        matches!(
            current.ty(),
            TokenType::VariableEnd | TokenType::BlockEnd | TokenType::RParen
        ) || current.test_any(extra_end_rules)
    }

    /// Returns a new parser-internal name. Generated names start with `$`,
    /// which the lexer never accepts in identifiers.
    pub fn free_identifier(&mut self, line: usize) -> Expr {
        self.last_identifier += 1;
        Expr::InternalName {
            name: format!("$fi{}", self.last_identifier),
            line,
        }
    }

    pub fn parse_statement(&mut self) -> ParseResult<Statement> {
        let token = self.stream.current().clone();
        let Some(tag) = token.name().map(str::to_string) else {
            return self.fail("tag name expected", Some(token.line));
        };
        self.tag_stack.push(tag.clone());
        let result = self.dispatch_statement(&tag);
        match result {
            Some(result) => {
                self.tag_stack.pop();
                result
            }
            None => {
                self.tag_stack.pop();
                self.fail_unknown_tag(&tag, Some(token.line))
            }
        }
    }

    fn dispatch_statement(&mut self, tag: &str) -> Option<ParseResult<Statement>> {
        let result = match tag {
            "for" => self.parse_for(),
            "if" => self.parse_if(),
            "unless" => self.parse_unless(),
            "break" => self.parse_break(),
            "continue" => self.parse_continue(),
            "block" => self.parse_block(),
            "extends" => self.parse_extends(),
            "print" => self.parse_print(),
            "macro" => self.parse_macro(),
            "include" => self.parse_include(),
            "section" => self.parse_section(),
            "from" => self.parse_from(),
            "import" => self.parse_import(),
            "set" | "assign" | "capture" => self.parse_set(tag),
            "with" => self.parse_with(),
            "autoescape" => self.parse_autoescape(),
            "call" => self.parse_call_block(),
            "filter" => self.parse_filter_block(),
            _ => {
                let extension = self.extensions.get(tag).cloned()?;
                trace!(tag, extension = extension.name(), "dispatching extension tag");
                return Some(extension.parse(self));
            }
        };
        Some(result.map(Statement::Single))
    }

    /// Parses a statement body up to one of `end_tokens`. The stream is left
    /// on the matched end token unless `drop_needle` is set.
    pub fn parse_statements(
        &mut self,
        end_tokens: &[TokenRule],
        drop_needle: bool,
    ) -> ParseResult<Vec<Stmt>> {
        self.stream.skip_if_type(TokenType::Colon);
        self.stream.expect_type(TokenType::BlockEnd)?;
        let result = self.subparse(Some(end_tokens))?;
        if self.stream.is_eof() {
            return self.fail_eof(Some(end_tokens), None);
        }
        if drop_needle {
            self.stream.next();
        }
        Ok(result)
    }

    pub fn subparse(&mut self, end_tokens: Option<&[TokenRule]>) -> ParseResult<Vec<Stmt>> {
        if let Some(end_tokens) = end_tokens {
            self.end_token_stack.push(end_tokens.to_vec());
        }
        let result = self.subparse_body(end_tokens);
        if end_tokens.is_some() {
            self.end_token_stack.pop();
        }
        result
    }

    fn subparse_body(&mut self, end_tokens: Option<&[TokenRule]>) -> ParseResult<Vec<Stmt>> {
        let mut body = Vec::new();
        let mut data_buffer: Vec<Expr> = Vec::new();

        fn flush(body: &mut Vec<Stmt>, buffer: &mut Vec<Expr>) {
            if let Some(first) = buffer.first() {
                let line = first.line();
                body.push(Stmt::Output {
                    nodes: std::mem::take(buffer),
                    line,
                });
            }
        }

        while !self.stream.is_eof() {
            let token = self.stream.current().clone();
            match &token.kind {
                TokenKind::Data(data) => {
                    if !data.is_empty() {
                        data_buffer.push(Expr::TemplateData {
                            data: data.clone(),
                            line: token.line,
                        });
                    }
                    self.stream.next();
                }
                TokenKind::VariableBegin => {
                    self.stream.next();
                    data_buffer.push(self.parse_tuple(false, true, &[], false)?);
                    self.stream.expect_type(TokenType::VariableEnd)?;
                }
                TokenKind::BlockBegin => {
                    flush(&mut body, &mut data_buffer);
                    self.stream.next();
                    if let Some(end_tokens) = end_tokens
                        && self.stream.current().test_any(end_tokens)
                    {
                        return Ok(body);
                    }
                    match self.parse_statement()? {
                        Statement::Single(stmt) => body.push(stmt),
                        Statement::Multiple(stmts) => body.extend(stmts),
                    }
                    self.stream.expect_type(TokenType::BlockEnd)?;
                }
                _ => {
                    return self.fail(
                        format!("unexpected '{}' outside of a tag", token.describe()),
                        Some(token.line),
                    );
                }
            }
        }
        flush(&mut body, &mut data_buffer);
        Ok(body)
    }

    /// Parses the whole stream into a template bound to this environment.
    pub fn parse(mut self) -> ParseResult<Template> {
        debug!(template = ?self.stream.name(), "parsing template");
        let body = self.subparse(None)?;
        debug!(
            template = ?self.stream.name(),
            statements = body.len(),
            "parsed template"
        );
        Ok(Template {
            body,
            environment: self.env,
        })
    }
}
