mod logging;

use std::io::{self, Read};
use std::sync::Arc;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use syntax::lexer::tokenize_expression;
use syntax::{
    Environment, Expr, ParseResult, Parser, SyntaxConfig, Template, TemplateSource, Token,
    TokenKind, TokenStream, render_syntax_error,
};
use tracing::{debug, info};

const STDIN_SOURCE: &str = "-";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CliConfig {
    source: Option<String>,
    config_path: Option<String>,
    tokens: bool,
    liquid: bool,
    repl: bool,
    list_filters: bool,
    help: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init()?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli_args(&args).map_err(io::Error::other)?;
    if cli.help {
        print_usage();
        return Ok(());
    }
    if cli.list_filters {
        print_filters();
        return Ok(());
    }

    let env = Arc::new(build_environment(&cli)?);
    debug!(environment = ?env, "environment ready");
    if cli.repl {
        return run_repl(env, cli.tokens);
    }

    let Some(path) = cli.source.as_deref() else {
        return Err(Box::new(io::Error::other("missing template path")));
    };
    let text = read_source(path)?;
    let name = display_name(path);
    if cli.tokens {
        return dump_tokens(&env, &text, name);
    }

    match syntax::parse(&env, &text, Some(name), Some(name)) {
        Ok(template) => {
            info!(template = name, statements = template.body.len(), "parsed template");
            print_template(&template);
            Ok(())
        }
        Err(err) => {
            let source = TemplateSource::new(name, text.as_str());
            let rendered = render_syntax_error(&source, &err);
            eprintln!("{}", logging::highlight_diagnostic(&rendered, err.code()));
            std::process::exit(1);
        }
    }
}

fn parse_cli_args(args: &[String]) -> Result<CliConfig, String> {
    let mut cfg = CliConfig::default();
    if args.is_empty() {
        cfg.repl = true;
        return Ok(cfg);
    }
    let mut index = 0usize;

    if let Some(first) = args.first()
        && first == "repl"
    {
        cfg.repl = true;
        index = 1;
    }

    while index < args.len() {
        match args[index].as_str() {
            "-h" | "--help" => {
                cfg.help = true;
                index += 1;
            }
            "--config" => {
                let path = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --config".to_string())?;
                cfg.config_path = Some(path.clone());
                index += 2;
            }
            "--tokens" => {
                cfg.tokens = true;
                index += 1;
            }
            "--liquid" => {
                cfg.liquid = true;
                index += 1;
            }
            "--repl" => {
                cfg.repl = true;
                index += 1;
            }
            "--filters" => {
                cfg.list_filters = true;
                index += 1;
            }
            STDIN_SOURCE => {
                if cfg.source.is_some() {
                    return Err("multiple template paths provided".to_string());
                }
                cfg.source = Some(STDIN_SOURCE.to_string());
                index += 1;
            }
            value if value.starts_with('-') => {
                return Err(format!("unknown flag '{value}'"));
            }
            path => {
                if cfg.source.is_some() {
                    return Err("multiple template paths provided".to_string());
                }
                cfg.source = Some(path.to_string());
                index += 1;
            }
        }
    }

    if cfg.repl && cfg.source.is_some() {
        return Err("repl mode does not accept a template path".to_string());
    }
    if cfg.list_filters && (cfg.repl || cfg.source.is_some() || cfg.tokens) {
        return Err("--filters cannot be combined with other modes".to_string());
    }
    if !cfg.help && !cfg.repl && !cfg.list_filters && cfg.source.is_none() {
        return Err("missing template path".to_string());
    }
    Ok(cfg)
}

fn print_usage() {
    println!("Usage:");
    println!("  lj-parse                              (defaults to REPL)");
    println!("  lj-parse [--config <syntax.json>] [--liquid] <template|->");
    println!("  lj-parse [--config <syntax.json>] --tokens <template|->");
    println!("  lj-parse --repl [--liquid] [--tokens]");
    println!("  lj-parse repl");
    println!("  lj-parse --filters");
    println!();
    println!("Set RUST_LOG=debug to trace parser decisions.");
}

fn print_filters() {
    for filter in filters::StandardFilter::all() {
        println!("{}", filter.name());
    }
}

fn build_environment(cli: &CliConfig) -> Result<Environment, Box<dyn std::error::Error>> {
    let env = if cli.liquid {
        Environment::liquid()
    } else {
        Environment::new()
    };
    let Some(path) = cli.config_path.as_deref() else {
        return Ok(env);
    };
    let raw = std::fs::read_to_string(path)?;
    let config: SyntaxConfig = serde_json::from_str(&raw)
        .map_err(|err| io::Error::other(format!("invalid syntax config '{path}': {err}")))?;
    info!(config = path, "loaded syntax config");
    Ok(env.with_syntax(config))
}

fn read_source(path: &str) -> io::Result<String> {
    if path == STDIN_SOURCE {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(path)
}

fn display_name(path: &str) -> &str {
    if path == STDIN_SOURCE { "<stdin>" } else { path }
}

fn dump_tokens(
    env: &Arc<Environment>,
    text: &str,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stream = match env.tokenize(text, Some(name), Some(name)) {
        Ok(stream) => stream,
        Err(err) => {
            let source = TemplateSource::new(name, text);
            let rendered = render_syntax_error(&source, &err);
            eprintln!("{}", logging::highlight_diagnostic(&rendered, err.code()));
            std::process::exit(1);
        }
    };
    loop {
        let token = stream.next();
        println!("{}", format_token(&token));
        if matches!(token.kind, TokenKind::Eof) {
            break;
        }
    }
    Ok(())
}

fn format_token(token: &Token) -> String {
    let ty = logging::token_label(&format!("{:?}", token.ty()));
    let line = logging::line_label(token.line);
    match &token.kind {
        TokenKind::Data(value) | TokenKind::Name(value) | TokenKind::String(value) => {
            format!("{line} {ty} {value:?}")
        }
        TokenKind::Integer(value) => format!("{line} {ty} {value}"),
        TokenKind::Float(value) => format!("{line} {ty} {value}"),
        TokenKind::Sequence { start, stop } => format!("{line} {ty} ({start}..{stop})"),
        _ => format!("{line} {ty} {}", token.ty().describe()),
    }
}

fn print_template(template: &Template) {
    for stmt in &template.body {
        println!("{stmt:#?}");
    }
}

fn run_repl(env: Arc<Environment>, show_tokens: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("lj-parse REPL (expressions)");
    println!("history: up/down arrows, commands: .help, .tokens, .quit");
    let mut editor = DefaultEditor::new()?;
    let mut session = ReplSession { show_tokens };
    loop {
        match editor.readline(&logging::prompt_label()) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Some(action) = handle_repl_command(line, &mut session) {
                    if action == ReplAction::Break {
                        break;
                    }
                    continue;
                }
                let _ = editor.add_history_entry(line);
                if session.show_tokens {
                    match tokenize_expression(line, 1, 0) {
                        Ok(tokens) => {
                            for token in &tokens {
                                println!("{}", format_token(token));
                            }
                        }
                        Err(err) => {
                            print_repl_error(line, &err);
                            continue;
                        }
                    }
                }
                match parse_repl_expression(&env, line) {
                    Ok(expr) => println!("=> {expr:#?}"),
                    Err(err) => print_repl_error(line, &err),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("bye");
                break;
            }
            Err(err) => {
                return Err(Box::new(io::Error::other(err.to_string())));
            }
        }
    }
    Ok(())
}

struct ReplSession {
    show_tokens: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum ReplAction {
    Continue,
    Break,
}

fn handle_repl_command(line: &str, session: &mut ReplSession) -> Option<ReplAction> {
    match line {
        ".quit" | ".exit" => Some(ReplAction::Break),
        ".tokens" => {
            session.show_tokens = !session.show_tokens;
            println!(
                "token dump {}",
                if session.show_tokens { "on" } else { "off" }
            );
            Some(ReplAction::Continue)
        }
        ".help" => {
            println!("commands:");
            println!("  .help      show commands");
            println!("  .tokens    toggle token dump");
            println!("  .quit      quit repl");
            println!("  .exit      quit repl");
            Some(ReplAction::Continue)
        }
        _ if line.starts_with('.') => {
            println!("unknown command: {line}");
            Some(ReplAction::Continue)
        }
        _ => None,
    }
}

/// Parses one line as a full expression (conditional expressions and filters
/// included). Anything left over after the expression is an error.
fn parse_repl_expression(env: &Arc<Environment>, line: &str) -> ParseResult<Expr> {
    let tokens = tokenize_expression(line, 1, 0)?;
    let stream = TokenStream::new(tokens, Some("<repl>".to_string()), None);
    let mut parser = Parser::with_stream(Arc::clone(env), stream);
    let expr = parser.parse_tuple(false, true, &[], false)?;
    if !parser.stream().is_eof() {
        let current = parser.stream().current().clone();
        return parser.fail(
            format!("unexpected '{}'", current.describe()),
            Some(current.line),
        );
    }
    Ok(expr)
}

fn print_repl_error(line: &str, err: &syntax::TemplateSyntaxError) {
    let source = TemplateSource::new("<repl>", line);
    let rendered = render_syntax_error(&source, err);
    println!("{}", logging::highlight_diagnostic(&rendered, err.code()));
}
