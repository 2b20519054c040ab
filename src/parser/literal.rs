//! Type inference for value literals
//!
//! Barewords become integers or floats when they look like numbers. Quoted
//! strings become date-times when they match `YYYY-MM-DDTHH:MM:SSZ` exactly
//! and name a real calendar date and clock time. Everything else stays a
//! string. A quoted value that only resembles a date (month 13, an extra
//! digit, ...) is a plain string, not an error.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([+-]?\d+)(?:[eE]\+?(\d+))?$").expect("valid integer regex"));

static FLOAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.\d*|\.\d+|\d+)(?:[eE][+-]?\d+)?$").expect("valid float regex")
});

static DATE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})T(\d{2}):(\d{2}):(\d{2})Z$").expect("valid date regex")
});

const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A typed scalar taken from a value list
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    DateTime(DateTime<Utc>),
    String(String),
}

impl Value {
    /// Infer the type of an unquoted token
    pub fn from_bareword(token: &str) -> Value {
        if let Some(i) = parse_integer(token) {
            return Value::Integer(i);
        }
        if let Some(f) = parse_float(token) {
            return Value::Float(f);
        }
        Value::String(token.to_string())
    }

    /// Infer the type of a quoted token, given its already unescaped content
    pub fn from_quoted(content: &str) -> Value {
        match parse_date_time(content) {
            Some(dt) => Value::DateTime(dt),
            None => Value::String(content.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_date_time(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    /// Plain text rendering used for string matching
    pub fn to_text(&self) -> String {
        match self {
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::DateTime(dt) => dt.format(DATE_TIME_FORMAT).to_string(),
            Value::String(s) => s.clone(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::DateTime(_) => "date-time",
            Value::String(_) => "string",
        }
    }
}

/// Renders the value back into filter-language syntax
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => f.write_str(&float_literal(*v)),
            Value::DateTime(dt) => write!(f, "\"{}\"", dt.format(DATE_TIME_FORMAT)),
            // quoting would turn a date-shaped string into a date-time
            Value::String(s) if parse_date_time(s).is_some() => f.write_str(s),
            Value::String(s) => write!(f, "\"{}\"", escape(s)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

/// Integers may carry a non-negative exponent: `5e+05` is 500000
fn parse_integer(token: &str) -> Option<i64> {
    let caps = INTEGER.captures(token)?;
    let mantissa: i64 = caps.get(1)?.as_str().parse().ok()?;
    match caps.get(2) {
        None => Some(mantissa),
        Some(exp) => {
            let exp: u32 = exp.as_str().parse().ok()?;
            10i64.checked_pow(exp)?.checked_mul(mantissa)
        }
    }
}

fn parse_float(token: &str) -> Option<f64> {
    if !FLOAT.is_match(token) {
        return None;
    }
    token.parse().ok()
}

fn parse_date_time(content: &str) -> Option<DateTime<Utc>> {
    let caps = DATE_TIME.captures(content)?;
    let field = |i: usize| -> Option<u32> { caps.get(i)?.as_str().parse().ok() };

    let year = i32::try_from(field(1)?).ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(2)?, field(3)?)?;
    let date_time = date.and_hms_opt(field(4)?, field(5)?, field(6)?)?;
    Some(date_time.and_utc())
}

/// Resolve `\"` and `\\` inside a quoted string; other escapes are kept as written
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(q @ ('"' | '\\')) => out.push(q),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Float text that never reads back as an integer: `1e16` becomes `1.0e16`
fn float_literal(v: f64) -> String {
    let text = format!("{:?}", v);
    match text.find(['e', 'E']) {
        Some(exp) if !text[..exp].contains('.') => {
            format!("{}.0{}", &text[..exp], &text[exp..])
        }
        _ => text,
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_integers() {
        assert_eq!(Value::from_bareword("34"), Value::Integer(34));
        assert_eq!(Value::from_bareword("-20"), Value::Integer(-20));
        assert_eq!(Value::from_bareword("+7"), Value::Integer(7));
        assert_eq!(Value::from_bareword("5e+05"), Value::Integer(500000));
        assert_eq!(Value::from_bareword("5E3"), Value::Integer(5000));
    }

    #[test]
    fn test_integer_overflow_becomes_float() {
        assert_eq!(Value::from_bareword("9e30"), Value::Float(9e30));
    }

    #[test]
    fn test_floats() {
        assert_eq!(Value::from_bareword("3.14"), Value::Float(3.14));
        assert_eq!(Value::from_bareword("5.5e-05"), Value::Float(5.5e-05));
        assert_eq!(Value::from_bareword("5e-05"), Value::Float(5e-05));
        assert_eq!(Value::from_bareword(".5"), Value::Float(0.5));
        assert_eq!(Value::from_bareword("-2.5"), Value::Float(-2.5));
    }

    #[test]
    fn test_barewords_stay_strings() {
        assert_eq!(Value::from_bareword("Main"), Value::from("Main"));
        assert_eq!(Value::from_bareword("1.2.3"), Value::from("1.2.3"));
        assert_eq!(Value::from_bareword("inf"), Value::from("inf"));
        assert_eq!(
            Value::from_bareword("1966-04-21T15:23:01Z"),
            Value::from("1966-04-21T15:23:01Z")
        );
    }

    #[test]
    fn test_quoted_numbers_stay_strings() {
        assert_eq!(Value::from_quoted("34"), Value::from("34"));
    }

    #[test]
    fn test_valid_date() {
        let value = Value::from_quoted("1966-04-21T15:23:01Z");
        let dt = value.as_date_time().unwrap();
        assert_eq!(dt.year(), 1966);
        assert_eq!(dt.month(), 4);
        assert_eq!(dt.day(), 21);
        assert_eq!(dt.hour(), 15);
        assert_eq!(dt.minute(), 23);
        assert_eq!(dt.second(), 1);
    }

    #[test]
    fn test_leap_day() {
        assert!(Value::from_quoted("2024-02-29T00:00:00Z").as_date_time().is_some());
        assert!(Value::from_quoted("2023-02-29T00:00:00Z").as_date_time().is_none());
    }

    #[test]
    fn test_invalid_dates_are_strings() {
        for s in [
            "19661-04-21T15:23:00Z",
            "1966-041-21T15:23:00Z",
            "1966-04-211T15:23:00Z",
            "1966-04-21T151:23:00Z",
            "1966-04-21T15:231:00Z",
            "1966-13-21T15:23:00Z",
            "1966-04-32T15:23:00Z",
            "1966-04-21T24:23:00Z",
            "1966-04-21T15:61:00Z",
            "1966-04-21T15:23:00",
        ] {
            assert_eq!(Value::from_quoted(s), Value::from(s), "for {}", s);
        }
    }

    #[test]
    fn test_display_round_trips_types() {
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(
            Value::from_bareword(&Value::Float(5.5e-05).to_string()),
            Value::Float(5.5e-05)
        );
        assert_eq!(Value::from("say \"hi\"").to_string(), r#""say \"hi\"""#);
        assert_eq!(
            Value::from_quoted("1966-04-21T15:23:01Z").to_string(),
            "\"1966-04-21T15:23:01Z\""
        );
    }

    #[test]
    fn test_exponent_floats_stay_floats() {
        for (v, text) in [(1e16, "1.0e16"), (1e-7, "1.0e-7"), (2.5e20, "2.5e20")] {
            let rendered = Value::Float(v).to_string();
            assert_eq!(rendered, text);
            assert_eq!(Value::from_bareword(&rendered), Value::Float(v));
        }
    }

    #[test]
    fn test_date_shaped_string_renders_bare() {
        let value = Value::from_bareword("1966-04-21T15:23:01Z");
        assert_eq!(value, Value::from("1966-04-21T15:23:01Z"));
        assert_eq!(value.to_string(), "1966-04-21T15:23:01Z");
        assert_eq!(Value::from_bareword(&value.to_string()), value);
        // not a real date, so quoting is harmless
        assert_eq!(Value::from("1966-13-21T15:23:01Z").to_string(), "\"1966-13-21T15:23:01Z\"");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r#"a\"b"#), "a\"b");
        assert_eq!(unescape(r"a\\b"), "a\\b");
        assert_eq!(unescape(r"a\nb"), "a\\nb");
    }
}
