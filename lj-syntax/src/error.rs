use crate::source::Span;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyntaxErrorKind {
    /// Malformed grammar.
    Syntax,
    /// Grammatically valid but rejected, e.g. importing a private name.
    Assertion,
    /// The token stream ended while statement bodies were still open.
    UnexpectedEof,
    /// A block keyword that no statement or extension handles.
    UnknownTag,
}

impl SyntaxErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            SyntaxErrorKind::Syntax => "E_SYNTAX",
            SyntaxErrorKind::Assertion => "E_ASSERT",
            SyntaxErrorKind::UnexpectedEof => "E_EOF",
            SyntaxErrorKind::UnknownTag => "E_UNKNOWN_TAG",
        }
    }

    fn label(self) -> &'static str {
        match self {
            SyntaxErrorKind::Syntax
            | SyntaxErrorKind::UnexpectedEof
            | SyntaxErrorKind::UnknownTag => "syntax error",
            SyntaxErrorKind::Assertion => "assertion error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSyntaxError {
    pub kind: SyntaxErrorKind,
    pub message: String,
    pub line: usize,
    pub name: Option<String>,
    pub filename: Option<String>,
    pub span: Option<Span>,
}

impl TemplateSyntaxError {
    pub fn new(kind: SyntaxErrorKind, message: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            message: message.into(),
            line,
            name: None,
            filename: None,
            span: None,
        }
    }

    pub fn syntax(message: impl Into<String>, line: usize) -> Self {
        Self::new(SyntaxErrorKind::Syntax, message, line)
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attaches the template name and filename unless already present.
    pub fn with_template(mut self, name: Option<&str>, filename: Option<&str>) -> Self {
        if self.name.is_none() {
            self.name = name.map(str::to_string);
        }
        if self.filename.is_none() {
            self.filename = filename.map(str::to_string);
        }
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl std::fmt::Display for TemplateSyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)?;
        match self.filename.as_deref().or(self.name.as_deref()) {
            Some(location) => write!(f, " ({location}, line {})", self.line),
            None => write!(f, " (line {})", self.line),
        }
    }
}

impl std::error::Error for TemplateSyntaxError {}

pub type ParseResult<T> = Result<T, TemplateSyntaxError>;
