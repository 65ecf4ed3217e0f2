use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{trace, warn};
use url::form_urlencoded;

use crate::date::format_date;
use crate::error::FilterError;
use crate::number::{Number, to_index, to_integer, to_number};
use crate::value::Value;

/// Arguments a filter receives besides its input.
#[derive(Clone, Debug, Default)]
pub struct FilterArgs {
    pub args: Vec<Value>,
    pub kwargs: Vec<(String, Value)>,
}

impl FilterArgs {
    pub fn new(args: Vec<Value>) -> Self {
        Self {
            args,
            kwargs: Vec::new(),
        }
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.push((key.into(), value));
        self
    }

    /// Positional argument `index`, or the keyword argument `name`.
    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.args.get(index).or_else(|| {
            self.kwargs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value)
        })
    }

    fn required(
        &self,
        filter: StandardFilter,
        index: usize,
        name: &'static str,
    ) -> Result<&Value, FilterError> {
        self.get(index, name).ok_or(FilterError::MissingArgument {
            filter: filter.name(),
            argument: name,
        })
    }

    fn text_or(&self, index: usize, name: &str, default: &str) -> String {
        self.get(index, name)
            .map(ToString::to_string)
            .unwrap_or_else(|| default.to_string())
    }

    fn field_name(&self, index: usize, name: &str) -> Option<String> {
        self.get(index, name)
            .filter(|value| !value.is_none())
            .map(ToString::to_string)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StandardFilter {
    Abs,
    Append,
    Capitalize,
    Ceil,
    Compact,
    Date,
    Default,
    DividedBy,
    Downcase,
    Escape,
    EscapeOnce,
    First,
    Floor,
    Join,
    Last,
    Lstrip,
    Map,
    Minus,
    Modulo,
    NewlineToBr,
    Plus,
    Prepend,
    Range,
    Remove,
    RemoveFirst,
    Replace,
    ReplaceFirst,
    Reverse,
    Round,
    Rstrip,
    Size,
    Slice,
    Sort,
    SortNatural,
    Split,
    Strip,
    StripHtml,
    StripNewlines,
    Times,
    Truncate,
    Truncatewords,
    Uniq,
    Upcase,
    UrlDecode,
    UrlEncode,
}

const ALL_FILTERS: &[StandardFilter] = &[
    StandardFilter::Abs,
    StandardFilter::Append,
    StandardFilter::Capitalize,
    StandardFilter::Ceil,
    StandardFilter::Compact,
    StandardFilter::Date,
    StandardFilter::Default,
    StandardFilter::DividedBy,
    StandardFilter::Downcase,
    StandardFilter::Escape,
    StandardFilter::EscapeOnce,
    StandardFilter::First,
    StandardFilter::Floor,
    StandardFilter::Join,
    StandardFilter::Last,
    StandardFilter::Lstrip,
    StandardFilter::Map,
    StandardFilter::Minus,
    StandardFilter::Modulo,
    StandardFilter::NewlineToBr,
    StandardFilter::Plus,
    StandardFilter::Prepend,
    StandardFilter::Range,
    StandardFilter::Remove,
    StandardFilter::RemoveFirst,
    StandardFilter::Replace,
    StandardFilter::ReplaceFirst,
    StandardFilter::Reverse,
    StandardFilter::Round,
    StandardFilter::Rstrip,
    StandardFilter::Size,
    StandardFilter::Slice,
    StandardFilter::Sort,
    StandardFilter::SortNatural,
    StandardFilter::Split,
    StandardFilter::Strip,
    StandardFilter::StripHtml,
    StandardFilter::StripNewlines,
    StandardFilter::Times,
    StandardFilter::Truncate,
    StandardFilter::Truncatewords,
    StandardFilter::Uniq,
    StandardFilter::Upcase,
    StandardFilter::UrlDecode,
    StandardFilter::UrlEncode,
];

impl StandardFilter {
    pub fn all() -> &'static [StandardFilter] {
        ALL_FILTERS
    }

    pub fn name(self) -> &'static str {
        match self {
            StandardFilter::Abs => "abs",
            StandardFilter::Append => "append",
            StandardFilter::Capitalize => "capitalize",
            StandardFilter::Ceil => "ceil",
            StandardFilter::Compact => "compact",
            StandardFilter::Date => "date",
            StandardFilter::Default => "default",
            StandardFilter::DividedBy => "divided_by",
            StandardFilter::Downcase => "downcase",
            StandardFilter::Escape => "escape",
            StandardFilter::EscapeOnce => "escape_once",
            StandardFilter::First => "first",
            StandardFilter::Floor => "floor",
            StandardFilter::Join => "join",
            StandardFilter::Last => "last",
            StandardFilter::Lstrip => "lstrip",
            StandardFilter::Map => "map",
            StandardFilter::Minus => "minus",
            StandardFilter::Modulo => "modulo",
            StandardFilter::NewlineToBr => "newline_to_br",
            StandardFilter::Plus => "plus",
            StandardFilter::Prepend => "prepend",
            StandardFilter::Range => "range",
            StandardFilter::Remove => "remove",
            StandardFilter::RemoveFirst => "remove_first",
            StandardFilter::Replace => "replace",
            StandardFilter::ReplaceFirst => "replace_first",
            StandardFilter::Reverse => "reverse",
            StandardFilter::Round => "round",
            StandardFilter::Rstrip => "rstrip",
            StandardFilter::Size => "size",
            StandardFilter::Slice => "slice",
            StandardFilter::Sort => "sort",
            StandardFilter::SortNatural => "sort_natural",
            StandardFilter::Split => "split",
            StandardFilter::Strip => "strip",
            StandardFilter::StripHtml => "strip_html",
            StandardFilter::StripNewlines => "strip_newlines",
            StandardFilter::Times => "times",
            StandardFilter::Truncate => "truncate",
            StandardFilter::Truncatewords => "truncatewords",
            StandardFilter::Uniq => "uniq",
            StandardFilter::Upcase => "upcase",
            StandardFilter::UrlDecode => "url_decode",
            StandardFilter::UrlEncode => "url_encode",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        if name == "urldecode" {
            return Some(StandardFilter::UrlDecode);
        }
        ALL_FILTERS
            .iter()
            .copied()
            .find(|filter| filter.name() == name)
    }

    pub fn apply(self, value: &Value, args: &FilterArgs) -> Result<Value, FilterError> {
        trace!(filter = self.name(), input = value.type_name(), "applying filter");
        match self {
            StandardFilter::Abs => Ok(match to_number(value)? {
                Number::Int(value) => value
                    .checked_abs()
                    .map(Value::Int)
                    .unwrap_or(Value::Float((value as f64).abs())),
                Number::Float(value) => Value::Float(value.abs()),
            }),
            StandardFilter::Append => {
                let suffix = args.required(self, 0, "string")?;
                Ok(Value::Str(format!("{value}{suffix}")))
            }
            StandardFilter::Prepend => {
                let prefix = args.required(self, 0, "string")?;
                Ok(Value::Str(format!("{prefix}{value}")))
            }
            StandardFilter::Capitalize => Ok(map_text(value, |text| {
                let mut chars = text.chars();
                match chars.next() {
                    Some(first) => {
                        first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                    }
                    None => String::new(),
                }
            })),
            StandardFilter::Downcase => Ok(map_text(value, |text| text.to_lowercase())),
            StandardFilter::Upcase => Ok(map_text(value, |text| text.to_uppercase())),
            StandardFilter::Ceil => round_with(value, f64::ceil),
            StandardFilter::Floor => round_with(value, f64::floor),
            StandardFilter::Round => round(value, args.get(0, "digits")),
            StandardFilter::Plus => arithmetic(value, args.required(self, 0, "operand")?, i64::checked_add, |a, b| a + b),
            StandardFilter::Minus => arithmetic(value, args.required(self, 0, "operand")?, i64::checked_sub, |a, b| a - b),
            StandardFilter::Times => times(value, args.required(self, 0, "operand")?),
            StandardFilter::DividedBy => divided_by(value, args.required(self, 0, "divisor")?),
            StandardFilter::Modulo => modulo(value, args.required(self, 0, "modulus")?),
            StandardFilter::Compact => Ok(compact(value, args.get(0, "property"))),
            StandardFilter::Date => format_date(value, args.get(0, "format")),
            StandardFilter::Default => {
                let fallback = args.get(0, "default").cloned().unwrap_or_default();
                Ok(if value.is_truthy() {
                    value.clone()
                } else {
                    fallback
                })
            }
            StandardFilter::Escape => Ok(escape_value(value, false)),
            StandardFilter::EscapeOnce => Ok(escape_value(value, true)),
            StandardFilter::First => Ok(match value {
                Value::List(items) => items.first().cloned().unwrap_or(Value::None),
                Value::Str(text) => text
                    .chars()
                    .next()
                    .map(|ch| Value::Str(ch.to_string()))
                    .unwrap_or(Value::None),
                _ => Value::None,
            }),
            StandardFilter::Last => Ok(match value {
                Value::List(items) => items.last().cloned().unwrap_or(Value::None),
                Value::Str(text) => text
                    .chars()
                    .next_back()
                    .map(|ch| Value::Str(ch.to_string()))
                    .unwrap_or(Value::None),
                _ => Value::None,
            }),
            StandardFilter::Join => {
                let separator = args.text_or(0, "separator", " ");
                Ok(Value::Str(match value {
                    Value::List(items) => items
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(&separator),
                    other => other.to_string(),
                }))
            }
            StandardFilter::Lstrip => Ok(map_text(value, |text| text.trim_start().to_string())),
            StandardFilter::Rstrip => Ok(map_text(value, |text| text.trim_end().to_string())),
            StandardFilter::Strip => Ok(map_text(value, |text| text.trim().to_string())),
            StandardFilter::Map => {
                let field = args
                    .field_name(0, "property")
                    .ok_or(FilterError::MissingArgument {
                        filter: self.name(),
                        argument: "property",
                    })?;
                Ok(map_field(value, &field))
            }
            StandardFilter::NewlineToBr => Ok(map_text(value, |text| {
                text.replace("\r\n", "\n").replace('\n', "<br />\n")
            })),
            StandardFilter::Range => range(value, args.get(0, "inclusive")),
            StandardFilter::Remove => {
                let needle = args.required(self, 0, "string")?.to_string();
                Ok(Value::Str(value.to_string().replace(&needle, "")))
            }
            StandardFilter::RemoveFirst => {
                let needle = args.required(self, 0, "string")?.to_string();
                Ok(Value::Str(value.to_string().replacen(&needle, "", 1)))
            }
            StandardFilter::Replace => {
                let needle = args.required(self, 0, "string")?.to_string();
                let replacement = args.text_or(1, "replacement", "");
                Ok(Value::Str(value.to_string().replace(&needle, &replacement)))
            }
            StandardFilter::ReplaceFirst => {
                let needle = args.required(self, 0, "string")?.to_string();
                let replacement = args.text_or(1, "replacement", "");
                Ok(Value::Str(
                    value.to_string().replacen(&needle, &replacement, 1),
                ))
            }
            StandardFilter::Reverse => Ok(match value {
                Value::List(items) => Value::List(items.iter().rev().cloned().collect()),
                Value::Str(text) => Value::Str(text.chars().rev().collect()),
                other => other.clone(),
            }),
            StandardFilter::Size => Ok(Value::Int(match value {
                Value::List(items) => items.len() as i64,
                Value::Str(text) => text.chars().count() as i64,
                Value::Map(map) => map.len() as i64,
                _ => 0,
            })),
            StandardFilter::Slice => slice(
                value,
                args.required(self, 0, "offset")?,
                args.get(1, "length"),
            ),
            StandardFilter::Sort => Ok(sort_by(value, args.field_name(0, "property"), |a, b| {
                a.compare(b)
            })),
            StandardFilter::SortNatural => {
                Ok(sort_by(value, args.field_name(0, "property"), |a, b| {
                    a.to_string()
                        .to_lowercase()
                        .cmp(&b.to_string().to_lowercase())
                }))
            }
            StandardFilter::Split => {
                if value.is_none() {
                    return Ok(Value::List(Vec::new()));
                }
                let text = value.to_string();
                let separator = args.text_or(0, "separator", " ");
                let parts = if separator.is_empty() {
                    text.chars().map(|ch| Value::Str(ch.to_string())).collect()
                } else {
                    text.split(separator.as_str()).map(Value::from).collect()
                };
                Ok(Value::List(parts))
            }
            StandardFilter::StripHtml => Ok(map_text(value, strip_html)),
            StandardFilter::StripNewlines => Ok(map_text(value, |text| {
                text.replace("\r\n", "").replace('\n', "")
            })),
            StandardFilter::Truncate => truncate(value, args),
            StandardFilter::Truncatewords => truncate_words(value, args),
            StandardFilter::Uniq => Ok(uniq(value, args.field_name(0, "property"))),
            StandardFilter::UrlDecode => Ok(match value {
                Value::Undefined | Value::None => Value::None,
                other => Value::Str(url_decode(&other.to_string())),
            }),
            StandardFilter::UrlEncode => Ok(match value {
                Value::Undefined | Value::None => Value::None,
                other => Value::Str(
                    form_urlencoded::byte_serialize(other.to_string().as_bytes()).collect(),
                ),
            }),
        }
    }
}

/// Applies `op` to the text form of `value`; missing values read as "".
fn map_text(value: &Value, op: impl FnOnce(&str) -> String) -> Value {
    Value::Str(op(&value.to_string()))
}

fn round_with(value: &Value, op: fn(f64) -> f64) -> Result<Value, FilterError> {
    Ok(match to_number(value)? {
        Number::Int(value) => Value::Int(value),
        Number::Float(value) => float_to_int(op(value)),
    })
}

fn float_to_int(value: f64) -> Value {
    if value.is_finite() && value.abs() < i64::MAX as f64 {
        Value::Int(value as i64)
    } else {
        Value::Float(value)
    }
}

fn round(value: &Value, digits: Option<&Value>) -> Result<Value, FilterError> {
    let digits = match digits {
        Some(digits) => to_index(digits)?,
        None => 0,
    };
    Ok(match to_number(value)? {
        Number::Int(value) => Value::Int(value),
        Number::Float(value) if digits <= 0 => float_to_int(value.round()),
        Number::Float(value) => {
            let scale = 10f64.powi(digits.min(15) as i32);
            Value::Float((value * scale).round() / scale)
        }
    })
}

fn arithmetic(
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, FilterError> {
    let (left, right) = (to_number(left)?, to_number(right)?);
    if let (Number::Int(a), Number::Int(b)) = (left, right)
        && let Some(result) = int_op(a, b)
    {
        return Ok(Value::Int(result));
    }
    Ok(Value::Float(float_op(left.as_f64(), right.as_f64())))
}

fn times(left: &Value, right: &Value) -> Result<Value, FilterError> {
    let left = to_number(left).unwrap_or(Number::Int(0));
    let right = to_number(right).unwrap_or(Number::Int(0));
    if let (Number::Int(a), Number::Int(b)) = (left, right)
        && let Some(result) = a.checked_mul(b)
    {
        return Ok(Value::Int(result));
    }
    let product = left.as_f64() * right.as_f64();
    Ok(Value::Float((product * 1e10).round() / 1e10))
}

fn divided_by(left: &Value, right: &Value) -> Result<Value, FilterError> {
    let (left, right) = (to_number(left)?, to_number(right)?);
    if right.is_zero() {
        return Err(FilterError::DivisionByZero);
    }
    // `i64::MIN / -1` overflows and takes the float path
    if let (Number::Int(a), Number::Int(b)) = (left, right)
        && let (Some(quotient), Some(rem)) = (a.checked_div(b), a.checked_rem(b))
    {
        let floored = if rem != 0 && ((a < 0) != (b < 0)) {
            quotient - 1
        } else {
            quotient
        };
        return Ok(Value::Int(floored));
    }
    Ok(Value::Float(left.as_f64() / right.as_f64()))
}

/// Modulo with the sign of the divisor.
fn modulo(left: &Value, right: &Value) -> Result<Value, FilterError> {
    let (left, right) = (to_number(left)?, to_number(right)?);
    if right.is_zero() {
        return Err(FilterError::DivisionByZero);
    }
    match (left, right) {
        (Number::Int(a), Number::Int(b)) => {
            let mut rem = a.wrapping_rem(b);
            if rem != 0 && ((rem < 0) != (b < 0)) {
                rem += b;
            }
            Ok(Value::Int(rem))
        }
        _ => {
            let (a, b) = (left.as_f64(), right.as_f64());
            let mut rem = a % b;
            if rem != 0.0 && ((rem < 0.0) != (b < 0.0)) {
                rem += b;
            }
            Ok(Value::Float(rem))
        }
    }
}

/// Drops missing elements. With an argument, map and object elements are
/// dropped when that field is missing, other elements when they equal it.
fn compact(value: &Value, property: Option<&Value>) -> Value {
    let items = value.clone().into_items();
    let kept = items
        .into_iter()
        .filter(|item| match property {
            None | Some(Value::Undefined | Value::None) => !item.is_none(),
            Some(sentinel) => match item {
                Value::Map(_) | Value::Object(_) => item
                    .field(&sentinel.to_string())
                    .is_some_and(|field| !field.is_none()),
                other => other != sentinel,
            },
        })
        .collect();
    Value::List(kept)
}

fn map_field(value: &Value, field: &str) -> Value {
    let mut flat = Vec::new();
    flatten_into(value.clone(), &mut flat);
    let mapped = flat
        .into_iter()
        .filter_map(|item| {
            if let Value::Object(object) = &item {
                object.prepare();
            }
            item.field(field).filter(|found| !found.is_none())
        })
        .collect();
    Value::List(mapped)
}

fn flatten_into(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::List(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        Value::Undefined | Value::None => {}
        other => out.push(other),
    }
}

fn escape_value(value: &Value, once: bool) -> Value {
    match value {
        Value::Undefined | Value::None => Value::None,
        other => {
            let text = other.to_string();
            let text = if once { unescape(&text) } else { text };
            Value::Str(escape_html(&text))
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#34;", "\"")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

fn range(value: &Value, inclusive: Option<&Value>) -> Result<Value, FilterError> {
    let bounds = match value {
        Value::List(items) => items.clone(),
        other => vec![other.clone()],
    };
    let (start, stop, step) = match bounds.as_slice() {
        [stop] => (0, to_integer(stop)?, 1),
        [start, stop] => (to_integer(start)?, to_integer(stop)?, 1),
        [start, stop, step] => (to_integer(start)?, to_integer(stop)?, to_integer(step)?),
        _ => return Err(FilterError::TypeMismatch("one to three range bounds")),
    };
    if step == 0 {
        return Err(FilterError::TypeMismatch("non-zero range step"));
    }
    let stop = if inclusive.is_some_and(Value::is_truthy) {
        stop.saturating_add(step.signum())
    } else {
        stop
    };
    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        items.push(Value::Int(current));
        match current.checked_add(step) {
            Some(next) => current = next,
            None => break,
        }
    }
    Ok(Value::List(items))
}

fn slice(value: &Value, offset: &Value, length: Option<&Value>) -> Result<Value, FilterError> {
    let offset = to_index(offset)?;
    let length = match length {
        Some(length) => to_index(length)?,
        None => 1,
    };
    let window = |len: usize| -> Option<(usize, usize)> {
        let len = len as i64;
        let start = if offset < 0 { offset + len } else { offset };
        if start < 0 || start > len || length <= 0 {
            return None;
        }
        let end = start.saturating_add(length).min(len);
        Some((start as usize, end as usize))
    };
    Ok(match value {
        Value::List(items) => Value::List(
            window(items.len())
                .map(|(start, end)| items[start..end].to_vec())
                .unwrap_or_default(),
        ),
        Value::Undefined | Value::None => Value::Str(String::new()),
        other => {
            let chars = other.to_string().chars().collect::<Vec<_>>();
            Value::Str(
                window(chars.len())
                    .map(|(start, end)| chars[start..end].iter().collect())
                    .unwrap_or_default(),
            )
        }
    })
}

fn sort_by(
    value: &Value,
    property: Option<String>,
    cmp: impl Fn(&Value, &Value) -> Ordering,
) -> Value {
    let Value::List(items) = value else {
        return value.clone();
    };
    let mut items = items.clone();
    match property {
        Some(property) => items.sort_by(|a, b| {
            let a = a.field(&property).unwrap_or_default();
            let b = b.field(&property).unwrap_or_default();
            cmp(&a, &b)
        }),
        None => items.sort_by(|a, b| cmp(a, b)),
    }
    Value::List(items)
}

fn uniq(value: &Value, property: Option<String>) -> Value {
    let mut seen: Vec<Value> = Vec::new();
    let mut kept = Vec::new();
    for item in value.clone().into_items() {
        let key = match &property {
            Some(property) => item.field(property).unwrap_or_default(),
            None => item.clone(),
        };
        if !seen.contains(&key) {
            seen.push(key);
            kept.push(item);
        }
    }
    Value::List(kept)
}

fn truncate(value: &Value, args: &FilterArgs) -> Result<Value, FilterError> {
    let length = match args.get(0, "length") {
        Some(length) => to_index(length)?.max(0) as usize,
        None => 255,
    };
    let end = args.text_or(1, "end", "...");
    let leeway = match args.get(2, "leeway") {
        Some(leeway) => to_index(leeway)?.max(0) as usize,
        None => 5,
    };
    let text = value.to_string();
    let count = text.chars().count();
    if count <= length + leeway {
        return Ok(Value::Str(text));
    }
    let keep = length.saturating_sub(end.chars().count());
    let mut out = text.chars().take(keep).collect::<String>();
    out.push_str(&end);
    Ok(Value::Str(out))
}

fn truncate_words(value: &Value, args: &FilterArgs) -> Result<Value, FilterError> {
    let words = match args.get(0, "words") {
        Some(words) => to_index(words)?.max(1) as usize,
        None => 15,
    };
    let end = args.text_or(1, "end", "...");
    let text = value.to_string();
    let parts = text.split_whitespace().collect::<Vec<_>>();
    if parts.len() <= words {
        return Ok(Value::Str(text));
    }
    let mut out = parts[..words].join(" ");
    out.push_str(&end);
    Ok(Value::Str(out))
}

static STRIP_HTML: OnceLock<Option<(Regex, Regex)>> = OnceLock::new();

fn strip_html(text: &str) -> String {
    let rules = STRIP_HTML.get_or_init(|| {
        let blocks = Regex::new(r"(?is)<script.*?</script>|<!--.*?-->|<style.*?</style>");
        let tags = Regex::new(r"(?s)<.*?>");
        match (blocks, tags) {
            (Ok(blocks), Ok(tags)) => Some((blocks, tags)),
            (Err(err), _) | (_, Err(err)) => {
                warn!(error = %err, "strip_html patterns failed to compile");
                None
            }
        }
    });
    match rules {
        Some((blocks, tags)) => {
            let without_blocks = blocks.replace_all(text, "");
            tags.replace_all(&without_blocks, "").into_owned()
        }
        None => text.to_string(),
    }
}

/// Percent and `+` decoding of a whole string.
fn url_decode(text: &str) -> String {
    let escaped = text.replace('=', "%3D").replace('&', "%26");
    form_urlencoded::parse(escaped.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
        .unwrap_or_default()
}
