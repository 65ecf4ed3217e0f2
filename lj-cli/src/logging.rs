use owo_colors::OwoColorize;
use std::sync::OnceLock;
use supports_color::Stream;
use tracing_subscriber::EnvFilter;

static ANSI_ENABLED: OnceLock<bool> = OnceLock::new();

/// Installs the global subscriber. Log lines go to stderr so tree and token
/// dumps on stdout stay machine readable.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let ansi = detect_ansi(Stream::Stderr);
    let _ = ANSI_ENABLED.set(detect_ansi(Stream::Stdout));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    Ok(())
}

pub fn error_label(code: &str) -> String {
    let text = format!("error[{code}]");
    if ansi_enabled() {
        format!("{}", text.bright_red().bold())
    } else {
        text
    }
}

pub fn prompt_label() -> String {
    if ansi_enabled() {
        format!("{}", "lj> ".bright_green().bold())
    } else {
        "lj> ".to_string()
    }
}

pub fn line_label(line: usize) -> String {
    let text = format!("{line:>4}");
    if ansi_enabled() {
        format!("{}", text.bright_black())
    } else {
        text
    }
}

/// Colours a token type by broad category.
pub fn token_label(ty: &str) -> String {
    if !ansi_enabled() {
        return ty.to_string();
    }

    match ty {
        "Data" => format!("{}", ty.bright_white()),
        "Name" => format!("{}", ty.bright_cyan()),
        "String" | "Integer" | "Float" => format!("{}", ty.bright_yellow()),
        "BlockBegin" | "BlockEnd" | "VariableBegin" | "VariableEnd" => {
            format!("{}", ty.bright_magenta())
        }
        "Eof" => format!("{}", ty.bright_black()),
        _ => format!("{}", ty.bright_blue()),
    }
}

/// Replaces the plain `error[CODE]` prefix of a rendered diagnostic with its
/// coloured form.
pub fn highlight_diagnostic(rendered: &str, code: &str) -> String {
    let plain = format!("error[{code}]");
    match rendered.strip_prefix(&plain) {
        Some(rest) if ansi_enabled() => format!("{}{rest}", error_label(code)),
        _ => rendered.to_string(),
    }
}

fn ansi_enabled() -> bool {
    *ANSI_ENABLED.get_or_init(|| detect_ansi(Stream::Stdout))
}

fn detect_ansi(stream: Stream) -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }

    supports_color::on_cached(stream).is_some()
}
