use crate::error::TemplateSyntaxError;
use crate::source::{Span, TemplateSource};

/// Renders a syntax error against its template source, pointing at the
/// offending token when the error carries a span.
pub fn render_syntax_error(source: &TemplateSource, err: &TemplateSyntaxError) -> String {
    let code_prefix = format!("error[{}]", err.code());

    if let Some(span) = err.span
        && let Some(rendered) = render_span_snippet(source, span, &err.message)
    {
        return format!("{code_prefix}: {}", rendered.trim_end());
    }

    if let Some(line_text) = source.line_text(err.line) {
        return format!(
            "{code_prefix}: {}\n --> {}:{}\n  |\n{:>3} | {line_text}",
            err.message, source.name, err.line, err.line
        );
    }

    format!("{code_prefix}: line {}: {}", err.line, err.message)
}

fn render_span_snippet(source: &TemplateSource, span: Span, message: &str) -> Option<String> {
    let (line, col) = source.line_col_for_offset(span.lo)?;
    let line_text = source.line_text(line)?;
    let visible = source
        .span_text(span)
        .map(|text| text.split('\n').next().unwrap_or("").chars().count())
        .unwrap_or(0);
    let pointer = format!(
        "{}{}",
        " ".repeat(col.saturating_sub(1)),
        "^".repeat(visible.max(1))
    );
    Some(format!(
        "{message}\n --> {}:{line}:{col}\n  |\n{line:>3} | {line_text}\n  | {pointer}",
        source.name
    ))
}
