//! Value coercion by declared field kind.
//!
//! Coercion never fails. Inputs that cannot be interpreted degrade to `null`
//! (dates, non-numeric numbers) instead of raising an error. `None` stands for
//! a value that is not present at all, which some kinds keep absent.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::schema::{FieldKind, FieldSpec};
use crate::types::{display_value, is_truthy, is_truthy_opt, number_value};

static INT_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+").unwrap());

static FLOAT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(Infinity|(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?)").unwrap()
});

static YEAR_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})(?:-(\d{2}))?$").unwrap());

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Context for a single coercion.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoerceContext<'a> {
    /// Wire type of the resource that owns the value.
    pub parent_type: Option<&'a str>,
    /// Field declaration. Its kind takes precedence over the declared kind.
    pub field: Option<&'a FieldSpec>,
}

impl<'a> CoerceContext<'a> {
    pub fn with_parent(parent_type: &'a str) -> Self {
        Self {
            parent_type: Some(parent_type),
            field: None,
        }
    }
}

/// Coerce `value` to `declared` (or the context field's kind).
///
/// | kind | result |
/// |------|--------|
/// | `string` | `""` for null/absent, the text form otherwise |
/// | `number` / `float` | falsy values unchanged, else the parsed integer / float (`null` when not numeric) |
/// | `date` | RFC 3339 UTC string, `null` for null, booleans and unparseable input |
/// | `boolean` | `"false"` is `false`, everything else by truthiness |
/// | `type` | the parent type, else the value if truthy, else `null` |
/// | other | unchanged |
pub fn coerce(value: Option<&Value>, declared: &FieldKind, context: &CoerceContext) -> Option<Value> {
    let kind = context
        .field
        .and_then(|field| field.kind.as_ref())
        .unwrap_or(declared);

    match kind {
        FieldKind::String => Some(Value::String(match value {
            None | Some(Value::Null) => String::new(),
            Some(v) => display_value(v),
        })),
        FieldKind::Number => coerce_numeric(value, parse_int_prefix),
        FieldKind::Float => coerce_numeric(value, parse_float_prefix),
        FieldKind::Date => Some(match value {
            None | Some(Value::Null) | Some(Value::Bool(_)) => Value::Null,
            Some(v) => parse_date(v)
                .map(|date| Value::String(format_date(&date)))
                .unwrap_or(Value::Null),
        }),
        FieldKind::Boolean => Some(Value::Bool(match value {
            Some(Value::String(s)) if s == "false" => false,
            other => is_truthy_opt(other),
        })),
        FieldKind::Type => Some(match (context.parent_type, value) {
            (Some(parent), _) => Value::String(parent.to_string()),
            (None, Some(v)) if is_truthy(v) => v.clone(),
            _ => Value::Null,
        }),
        FieldKind::Other(_) => value.cloned(),
    }
}

fn coerce_numeric(value: Option<&Value>, parse: fn(&Value) -> f64) -> Option<Value> {
    match value {
        None => None,
        Some(v) if !is_truthy(v) => Some(v.clone()),
        Some(v) => Some(number_value(parse(v))),
    }
}

/// Leading base-10 integer of a value's text form, `NaN` when there is none.
///
/// Numbers are truncated toward zero.
pub fn parse_int_prefix(value: &Value) -> f64 {
    if let Some(n) = value.as_f64() {
        return n.trunc();
    }
    let text = display_value(value);
    INT_PREFIX
        .find(text.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// Leading floating point number of a value's text form, `NaN` when there is none.
pub fn parse_float_prefix(value: &Value) -> f64 {
    if let Some(n) = value.as_f64() {
        return n;
    }
    let text = display_value(value);
    let Some(m) = FLOAT_PREFIX.find(text.trim_start()) else {
        return f64::NAN;
    };
    match m.as_str().trim_start_matches('+') {
        "Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        digits => digits.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// Interpret a value as a point in time.
///
/// Numbers are milliseconds since the Unix epoch. Strings may be RFC 3339,
/// RFC 2822, a date (`2022-01-01`, `2022-01`, `2022`) or a date-time without
/// offset; values without an offset are taken as UTC.
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let millis = n.as_f64().filter(|f| f.is_finite())?;
            Utc.timestamp_millis_opt(millis.trunc() as i64).single()
        }
        Value::String(s) => parse_date_str(s.trim()),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(s) {
        return Some(date.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return day.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }
    let caps = YEAR_MONTH.captures(s)?;
    let year = caps.get(1)?.as_str().parse().ok()?;
    let month = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 1,
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Wire form of a date: RFC 3339 in UTC with millisecond precision.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}
