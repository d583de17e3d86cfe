//! Helpers over `serde_json::Value`, the dynamic value type used by templates,
//! step configuration and step outputs.

use serde_json::{Number, Value};

/// Render a value as template output text.
///
/// `null` renders empty, integral numbers drop the fraction, arrays and
/// objects render as compact JSON.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    n.as_f64().map(format_f64).unwrap_or_default()
}

/// Significant digits kept when rendering fractional numbers.
const SIGNIFICANT_DIGITS: i32 = 14;

fn format_f64(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        return format!("{}", f as i64);
    }
    if !f.is_finite() || f == 0.0 {
        return format!("{f}");
    }
    let decimals = SIGNIFICANT_DIGITS - 1 - f.abs().log10().floor() as i32;
    if !(0..=17).contains(&decimals) {
        return format!("{f}");
    }
    let fixed = format!("{:.*}", decimals as usize, f);
    let trimmed = if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.')
    } else {
        fixed.as_str()
    };
    match trimmed {
        "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Build a JSON number from an `f64`, keeping integral values integral.
/// Non-finite results collapse to `0`.
pub fn number(f: f64) -> Value {
    if !f.is_finite() {
        return Value::from(0);
    }
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        return Value::from(f as i64);
    }
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::from(0))
}

/// Numeric view of a value: numbers, and strings that look like numbers.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_numeric(s),
        _ => None,
    }
}

pub fn parse_numeric(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    // Reject forms f64::from_str accepts but that are not numeric-looking text.
    if t.eq_ignore_ascii_case("nan")
        || t.to_ascii_lowercase().contains("inf")
        || t.starts_with('+')
    {
        return None;
    }
    t.parse::<f64>().ok()
}

/// Truthiness used by conditions and the `default` filter.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => {
            let t = s.trim();
            if t.eq_ignore_ascii_case("false") {
                return false;
            }
            if t.eq_ignore_ascii_case("true") {
                return true;
            }
            !s.is_empty()
        }
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Walk `segments` through nested objects and arrays. Missing segments
/// yield `None`.
pub fn walk<'a, I, S>(root: &'a Value, segments: I) -> Option<&'a Value>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut current = root;
    for seg in segments {
        let seg = seg.as_ref();
        current = match current {
            Value::Object(map) => map.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
