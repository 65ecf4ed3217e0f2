use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

use crate::error::FilterError;
use crate::value::Value;

/// Layouts tried, in order, when a string is read as a date.
const DATETIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%a %b %d %H:%M:%S %Y",
    "%a, %d %b %Y %H:%M:%S",
    "%B %d, %Y %H:%M:%S",
];

const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%B %d, %Y", "%d %B %Y"];

/// strftime-style formatting. Missing input stays missing, an empty format
/// returns the input as given, and input that does not read as a date is
/// passed through unchanged.
pub(crate) fn format_date(value: &Value, format: Option<&Value>) -> Result<Value, FilterError> {
    if value.is_none() {
        return Ok(Value::None);
    }
    let format = match format {
        Some(format) if !format.is_none() => format.to_string(),
        _ => String::new(),
    };
    if format.is_empty() {
        return Ok(value.clone());
    }
    let Some(moment) = to_datetime(value) else {
        return Ok(value.clone());
    };

    let items = StrftimeItems::new(&format).collect::<Vec<_>>();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(FilterError::InvalidFormat(format));
    }
    let mut out = String::new();
    write!(out, "{}", moment.format_with_items(items.into_iter()))
        .map_err(|_| FilterError::InvalidFormat(format))?;
    Ok(Value::Str(out))
}

fn to_datetime(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Int(seconds) => from_timestamp(*seconds),
        Value::Float(seconds) => from_timestamp(seconds.trunc() as i64),
        Value::Str(text) => parse_text(text.trim()),
        _ => None,
    }
}

fn from_timestamp(seconds: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(seconds, 0).map(|moment| moment.naive_utc())
}

fn parse_text(text: &str) -> Option<NaiveDateTime> {
    if text.is_empty() {
        return None;
    }
    if text.eq_ignore_ascii_case("now") || text.eq_ignore_ascii_case("today") {
        return Some(Local::now().naive_local());
    }
    if let Ok(seconds) = text.parse::<i64>() {
        return from_timestamp(seconds);
    }
    if let Ok(moment) = DateTime::parse_from_rfc3339(text) {
        return Some(moment.naive_local());
    }
    DATETIME_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
        .or_else(|| {
            DATE_LAYOUTS
                .iter()
                .find_map(|layout| NaiveDate::parse_from_str(text, layout).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
