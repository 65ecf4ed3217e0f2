//! Template parser for Jinja-style templates with Liquid syntax extensions:
//! `assign`/`capture`/`unless` tags, `(a..b)` range literals, `limit:` /
//! `offset:` / `reversed` loop modifiers and colon-style filter arguments.

use std::sync::Arc;

pub mod diagnostics;
pub mod environment;
pub mod error;
pub mod ext;
pub mod lexer;
pub mod nodes;
pub mod parser;
pub mod source;
pub mod token;

pub use diagnostics::render_syntax_error;
pub use environment::{Environment, Extension, SyntaxConfig};
pub use error::{ParseResult, SyntaxErrorKind, TemplateSyntaxError};
pub use ext::{CaseExtension, DoExtension};
pub use nodes::{
    BinOpKind, CallArgs, CompareOp, Const, Ctx, Expr, ImportName, Keyword, Node, Operand, Pair,
    Stmt, Template,
};
pub use parser::{Parser, Statement};
pub use source::{Span, TemplateSource};
pub use token::{Token, TokenKind, TokenRule, TokenStream, TokenType};

/// Lexes and parses `source` into a template owned by the caller.
pub fn parse(
    env: &Arc<Environment>,
    source: &str,
    name: Option<&str>,
    filename: Option<&str>,
) -> ParseResult<Template> {
    Parser::new(Arc::clone(env), source, name, filename)?.parse()
}
