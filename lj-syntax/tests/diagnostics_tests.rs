mod common;

use std::sync::Arc;

use common::*;
use syntax::{SyntaxConfig, TemplateSource, render_syntax_error};

#[test]
fn unknown_tag_inside_if_lists_expected_tags() {
    let err = parse_error("{% if a %}{% foo %}{% endif %}");
    assert_eq!(err.kind, SyntaxErrorKind::UnknownTag);
    assert_eq!(
        err.message,
        "Encountered unknown tag 'foo'. The parser was looking for the following tags: \
         'elif' or 'else' or 'endif'. The innermost block that needs to be closed is 'if'."
    );
}

#[test]
fn misplaced_end_tag_is_reported_as_nesting_mistake() {
    let err = parse_error("{% if a %}{% for x in y %}{% endif %}");
    assert_eq!(err.kind, SyntaxErrorKind::UnknownTag);
    assert!(err.message.contains("You probably made a nesting mistake."));
    assert!(err.message.contains("currently looking for 'endfor' or 'else'"));
    assert!(err.message.ends_with("The innermost block that needs to be closed is 'for'."));
}

#[test]
fn unexpected_end_of_template() {
    let err = parse_error("{% if a %}never closed");
    assert_eq!(err.kind, SyntaxErrorKind::UnexpectedEof);
    assert!(err.message.starts_with("Unexpected end of template."));
    assert!(err.message.contains("'elif' or 'else' or 'endif'"));
    assert!(err.message.contains("The innermost block that needs to be closed is 'if'."));
}

#[test]
fn unterminated_tag_is_an_eof_error() {
    let err = parse_error("{{ a ");
    assert_eq!(err.kind, SyntaxErrorKind::UnexpectedEof);
}

#[test]
fn errors_carry_template_name_and_line() {
    let err = parse_error("line one\n{% if a %}\n{% foo %}\n{% endif %}");
    assert_eq!(err.line, 3);
    assert_eq!(err.name.as_deref(), Some("test"));
    assert_eq!(err.code(), "E_UNKNOWN_TAG");
    assert!(err.to_string().ends_with("(test, line 3)"));
    assert!(err.to_string().starts_with("syntax error: Encountered unknown tag 'foo'."));
}

#[test]
fn render_syntax_error_points_at_offending_token() {
    let text = "{% if a %}\n{% foo %}\n{% endif %}";
    let err = parse_error(text);
    let source = TemplateSource::new("page.html", text);
    let rendered = render_syntax_error(&source, &err);
    assert!(rendered.starts_with("error[E_UNKNOWN_TAG]: Encountered unknown tag 'foo'."));
    assert!(rendered.contains(" --> page.html:2:4"));
    assert!(rendered.contains("  2 | {% foo %}"));
    assert!(rendered.contains("   ^^^"));
}

#[test]
fn render_syntax_error_without_span_falls_back_to_line() {
    let source = TemplateSource::new("page.html", "first\nsecond");
    let err = TemplateSyntaxError::syntax("broken", 2);
    let rendered = render_syntax_error(&source, &err);
    assert_eq!(
        rendered,
        "error[E_SYNTAX]: broken\n --> page.html:2\n  |\n  2 | second"
    );

    let err = TemplateSyntaxError::syntax("far away", 9);
    assert_eq!(
        render_syntax_error(&source, &err),
        "error[E_SYNTAX]: line 9: far away"
    );
}

#[test]
fn syntax_config_deserializes_with_defaults() {
    let config: SyntaxConfig = serde_json::from_value(serde_json::json!({
        "block_start": "<%",
        "block_end": "%>",
        "trim_blocks": true
    }))
    .expect("config should deserialize");
    assert_eq!(config.variable_start, "{{");
    assert!(config.trim_blocks);

    let env = Arc::new(Environment::liquid().with_syntax(config));
    let template = parse(&env, "<% if a %>\nyes<% endif %>{{ 'x' }}", None, None)
        .expect("custom delimiters should parse");
    assert_eq!(
        render_template(&template, serde_json::json!({"a": true})).expect("render"),
        "yesx"
    );
}
