use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::ParseResult;
use crate::ext::{CaseExtension, DoExtension};
use crate::lexer;
use crate::parser::{Parser, Statement};
use crate::token::TokenStream;

/// Delimiters and whitespace options the lexer runs with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyntaxConfig {
    pub block_start: String,
    pub block_end: String,
    pub variable_start: String,
    pub variable_end: String,
    pub comment_start: String,
    pub comment_end: String,
    /// Drop the first newline after a block tag.
    pub trim_blocks: bool,
    /// Keep a single trailing newline at the end of the template.
    pub keep_trailing_newline: bool,
}

impl Default for SyntaxConfig {
    fn default() -> Self {
        Self {
            block_start: "{%".to_string(),
            block_end: "%}".to_string(),
            variable_start: "{{".to_string(),
            variable_end: "}}".to_string(),
            comment_start: "{#".to_string(),
            comment_end: "#}".to_string(),
            trim_blocks: false,
            keep_trailing_newline: false,
        }
    }
}

/// A syntax extension: owns one or more tag names and parses the statements
/// they introduce. The parser resolves the tag table once when it is built.
pub trait Extension: Send + Sync {
    fn name(&self) -> &'static str;

    fn tags(&self) -> &'static [&'static str];

    /// Called with the stream positioned on the tag name token.
    fn parse(&self, parser: &mut Parser) -> ParseResult<Statement>;
}

/// Read-only configuration shared by every parser built from it, including
/// the nested parsers used for range literals.
#[derive(Clone, Default)]
pub struct Environment {
    syntax: SyntaxConfig,
    extensions: Vec<Arc<dyn Extension>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment with the bundled Liquid-style tags registered.
    pub fn liquid() -> Self {
        Self::new()
            .with_extension(CaseExtension)
            .with_extension(DoExtension)
    }

    pub fn with_syntax(mut self, syntax: SyntaxConfig) -> Self {
        self.syntax = syntax;
        self
    }

    pub fn with_extension(mut self, extension: impl Extension + 'static) -> Self {
        self.extensions.push(Arc::new(extension));
        self
    }

    pub fn syntax(&self) -> &SyntaxConfig {
        &self.syntax
    }

    pub fn extensions(&self) -> &[Arc<dyn Extension>] {
        &self.extensions
    }

    pub fn tokenize(
        &self,
        source: &str,
        name: Option<&str>,
        filename: Option<&str>,
    ) -> ParseResult<TokenStream> {
        lexer::tokenize(&self.syntax, source, name, filename)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let extensions = self
            .extensions
            .iter()
            .map(|extension| extension.name())
            .collect::<Vec<_>>();
        f.debug_struct("Environment")
            .field("syntax", &self.syntax)
            .field("extensions", &extensions)
            .finish()
    }
}
