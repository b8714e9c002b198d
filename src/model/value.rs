//! Field normalization shared by the parsers and the reconciliation diff.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Storage format for timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M",
    "%a %m/%d/%y %I:%M %p",
    "%m/%d/%y %I:%M %p",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%a %m/%d/%y", "%m/%d/%y", "%d.%m.%Y"];

/// Trim and drop empty text.
pub fn clean_text(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Parse an integer, accepting decimal text by truncation (`"1.00"` -> 1).
pub fn parse_int(s: &str) -> Option<i64> {
    let t = s.trim();
    if let Ok(n) = t.parse::<i64>() {
        return Some(n);
    }
    t.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(|f| f.trunc() as i64)
}

pub fn parse_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Try parsing a timestamp with several common formats.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Render a number the way it reads: integral values without a fraction.
pub fn format_number(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}

// ── Column value builders ───────────────────────────────────────

pub fn text_value(v: &Option<String>) -> Value {
    v.as_deref().map_or(Value::Null, Value::from)
}

pub fn int_value(v: Option<i64>) -> Value {
    v.map_or(Value::Null, Value::from)
}

pub fn float_value(v: Option<f64>) -> Value {
    v.map_or(Value::Null, Value::from)
}

pub fn timestamp_value(v: &Option<NaiveDateTime>) -> Value {
    v.as_ref()
        .map_or(Value::Null, |dt| Value::from(format_timestamp(dt)))
}

// ── Normalized equality ─────────────────────────────────────────

/// A column value reduced to what matters for change detection.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparable {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Comparable {
    pub fn as_text(&self) -> String {
        match self {
            Comparable::Number(n) => format_number(*n),
            Comparable::Bool(b) => b.to_string(),
            Comparable::Text(s) => s.clone(),
        }
    }
}

/// `None` for null, missing, and empty-or-blank text.
pub fn comparable(value: &Value) -> Option<Comparable> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(Comparable::Bool(*b)),
        Value::Number(n) => n.as_f64().map(Comparable::Number),
        Value::String(s) => clean_text(s).map(Comparable::Text),
        other => Some(Comparable::Text(other.to_string())),
    }
}

/// Normalized equality used by the update check.
///
/// `0`, `false` and `""` stay distinct; only null, missing and empty text
/// collapse to "no value".
pub fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    let a = a.and_then(comparable);
    let b = b.and_then(comparable);
    match (a, b) {
        (None, None) => true,
        (Some(Comparable::Number(x)), Some(Comparable::Number(y))) => x == y,
        (Some(Comparable::Bool(x)), Some(Comparable::Bool(y))) => x == y,
        (Some(x), Some(y)) => x.as_text() == y.as_text(),
        _ => false,
    }
}

/// [`values_equal`] for timestamp columns: texts that both parse as
/// timestamps compare as instants.
pub fn timestamps_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    if values_equal(a, b) {
        return true;
    }
    let text = |v: Option<&Value>| v.and_then(comparable).map(|c| c.as_text());
    match (
        text(a).as_deref().and_then(parse_timestamp),
        text(b).as_deref().and_then(parse_timestamp),
    ) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
