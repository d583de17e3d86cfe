//! Template filters: `value | name:arg`.
//!
//! Every filter is a pure function of the input value and an optional raw
//! argument. Unknown filter names return the input unchanged.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;
use std::fmt::Write as _;

use crate::value::{self, is_truthy, to_text};

pub const FILTERS: &[&str] = &[
    "trim",
    "lower",
    "upper",
    "slug",
    "default",
    "take",
    "date",
    "jsonpath",
    "json",
    "length",
    "first",
    "last",
    "join",
    "capitalize",
    "truncate",
    "slice",
    "startswith",
    "contains",
    "match",
    "split",
];

pub fn apply(name: &str, input: Value, arg: Option<&str>) -> Value {
    match name {
        "trim" => Value::String(to_text(&input).trim().to_string()),
        "lower" => Value::String(to_text(&input).to_lowercase()),
        "upper" => Value::String(to_text(&input).to_uppercase()),
        "slug" => Value::String(slugify(&to_text(&input))),
        "default" => {
            if is_truthy(&input) {
                input
            } else {
                Value::String(arg.unwrap_or_default().to_string())
            }
        }
        "take" => take(input, arg),
        "date" => date(input, arg.unwrap_or("Y-m-d")),
        "jsonpath" => jsonpath(&input, arg.unwrap_or("$")),
        "json" => Value::String(serde_json::to_string(&input).unwrap_or_default()),
        "length" => Value::from(length(&input)),
        "first" => first_or_last(input, true),
        "last" => first_or_last(input, false),
        "join" => join(input, arg.unwrap_or(", ")),
        "capitalize" => Value::String(capitalize(&to_text(&input))),
        "truncate" => truncate(input, arg),
        "slice" => slice(input, arg),
        "startswith" => Value::Bool(to_text(&input).starts_with(arg.unwrap_or_default())),
        "contains" => Value::Bool(contains(&input, arg.unwrap_or_default())),
        "match" => regex_match(&input, arg.unwrap_or_default()),
        "split" => split(&input, arg.unwrap_or(",")),
        other => {
            tracing::debug!(filter = other, "unknown filter, passing value through");
            input
        }
    }
}

fn int_arg(arg: Option<&str>) -> Option<i64> {
    let raw = arg?.trim();
    raw.parse::<i64>()
        .ok()
        .or_else(|| value::parse_numeric(raw).map(|f| f as i64))
}

fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn length(input: &Value) -> usize {
    match input {
        Value::Null => 0,
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => to_text(other).chars().count(),
    }
}

fn take(input: Value, arg: Option<&str>) -> Value {
    let Some(n) = int_arg(arg) else {
        return input;
    };
    let n = n.max(0) as usize;
    match input {
        Value::Array(items) => Value::Array(items.into_iter().take(n).collect()),
        Value::Null => Value::Null,
        other => Value::String(to_text(&other).chars().take(n).collect()),
    }
}

fn first_or_last(input: Value, first: bool) -> Value {
    match input {
        Value::Array(mut items) => {
            if items.is_empty() {
                Value::Null
            } else if first {
                items.swap_remove(0)
            } else {
                items.pop().unwrap_or(Value::Null)
            }
        }
        Value::String(s) => {
            let c = if first { s.chars().next() } else { s.chars().last() };
            c.map(|c| Value::String(c.to_string())).unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn join(input: Value, sep: &str) -> Value {
    match input {
        Value::Array(items) => Value::String(
            items
                .iter()
                .map(to_text)
                .collect::<Vec<_>>()
                .join(sep),
        ),
        other => other,
    }
}

fn truncate(input: Value, arg: Option<&str>) -> Value {
    let limit = int_arg(arg).unwrap_or(100).max(0) as usize;
    let text = to_text(&input);
    if text.chars().count() <= limit {
        return Value::String(text);
    }
    let mut cut: String = text.chars().take(limit).collect();
    cut.push_str("...");
    Value::String(cut)
}

/// `slice:start` or `slice:start,length`. Negative `start` counts from the end.
fn slice(input: Value, arg: Option<&str>) -> Value {
    let raw = arg.unwrap_or("0");
    let mut parts = raw.splitn(2, ',');
    let Some(start) = int_arg(parts.next()) else {
        return input;
    };
    let len = int_arg(parts.next());

    let window = |total: usize| -> (usize, usize) {
        let begin = if start < 0 {
            total.saturating_sub(start.unsigned_abs() as usize)
        } else {
            (start as usize).min(total)
        };
        let end = match len {
            Some(l) if l >= 0 => (begin + l as usize).min(total),
            Some(l) => total.saturating_sub(l.unsigned_abs() as usize).max(begin),
            None => total,
        };
        (begin, end)
    };

    match input {
        Value::Array(items) => {
            let (b, e) = window(items.len());
            Value::Array(items[b..e].to_vec())
        }
        Value::Null => Value::Null,
        other => {
            let chars: Vec<char> = to_text(&other).chars().collect();
            let (b, e) = window(chars.len());
            Value::String(chars[b..e].iter().collect())
        }
    }
}

fn contains(input: &Value, needle: &str) -> bool {
    match input {
        Value::Array(items) => items.iter().any(|item| to_text(item) == needle),
        Value::Object(map) => map.contains_key(needle),
        Value::Null => false,
        other => to_text(other).contains(needle),
    }
}

fn split(input: &Value, delim: &str) -> Value {
    let text = to_text(input);
    if text.is_empty() {
        return Value::Array(Vec::new());
    }
    let parts: Vec<Value> = if delim.is_empty() {
        text.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        text.split(delim)
            .map(|s| Value::String(s.to_string()))
            .collect()
    };
    Value::Array(parts)
}

// ---------------------------------------------------------------------------
// match
// ---------------------------------------------------------------------------

/// Accepts a bare pattern or a `/pattern/flags` form with `i`, `m`, `s`, `x`
/// flags. Returns the first capture group when the pattern has one,
/// otherwise the whole match; `null` on no match or an invalid pattern.
fn regex_match(input: &Value, pattern: &str) -> Value {
    let re = match compile_pattern(pattern) {
        Ok(re) => re,
        Err(e) => {
            tracing::warn!(pattern, error = %e, "invalid regex in match filter");
            return Value::Null;
        }
    };
    let text = to_text(input);
    let Some(caps) = re.captures(&text) else {
        return Value::Null;
    };
    let m = if caps.len() > 1 { caps.get(1) } else { caps.get(0) };
    m.map(|m| Value::String(m.as_str().to_string()))
        .unwrap_or(Value::Null)
}

pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    if let Some(body) = pattern.strip_prefix('/') {
        if let Some(end) = body.rfind('/') {
            let (inner, flags) = (&body[..end], &body[end + 1..]);
            if flags.chars().all(|f| matches!(f, 'i' | 'm' | 's' | 'x' | 'u')) {
                let flags: String = flags.chars().filter(|f| *f != 'u').collect();
                let full = if flags.is_empty() {
                    inner.to_string()
                } else {
                    format!("(?{flags}){inner}")
                };
                return Regex::new(&full);
            }
        }
    }
    Regex::new(pattern)
}

// ---------------------------------------------------------------------------
// jsonpath
// ---------------------------------------------------------------------------

/// Dot-only JSONPath: `$.a.b.0` or `$.a.b[0]`. String inputs are decoded
/// as JSON first.
fn jsonpath(input: &Value, path: &str) -> Value {
    let decoded;
    let root = match input {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(v) => {
                decoded = v;
                &decoded
            }
            Err(_) => return Value::Null,
        },
        other => other,
    };
    let normalized = path.trim().replace('[', ".").replace(']', "");
    let trimmed = normalized.trim_start_matches('$').trim_start_matches('.');
    if trimmed.is_empty() {
        return root.clone();
    }
    let segments = trimmed.split('.').filter(|s| !s.is_empty()).map(|s| {
        s.trim_matches(|c: char| c == '\'' || c == '"')
    });
    value::walk(root, segments).cloned().unwrap_or(Value::Null)
}

// ---------------------------------------------------------------------------
// date
// ---------------------------------------------------------------------------

fn date(input: Value, format: &str) -> Value {
    let Some(dt) = parse_datetime(&input) else {
        return input;
    };
    let pattern = if format.contains('%') {
        format.to_string()
    } else {
        php_to_strftime(format)
    };
    let mut out = String::new();
    match write!(out, "{}", dt.format(&pattern)) {
        Ok(()) => Value::String(out),
        Err(_) => {
            tracing::warn!(format, "invalid date format");
            input
        }
    }
}

fn parse_datetime(input: &Value) -> Option<DateTime<Utc>> {
    if let Value::Number(n) = input {
        return Utc.timestamp_opt(n.as_f64()? as i64, 0).single();
    }
    let text = to_text(input);
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("now") {
        return Some(Utc::now());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }
    if let Ok(ts) = text.parse::<i64>() {
        return Utc.timestamp_opt(ts, 0).single();
    }
    None
}

/// Translate PHP `date()` format letters to a strftime pattern.
/// `\` escapes the next character.
fn php_to_strftime(format: &str) -> String {
    let mut out = String::with_capacity(format.len() * 2);
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        let mapped = match c {
            '\\' => {
                if let Some(lit) = chars.next() {
                    push_literal(&mut out, lit);
                }
                continue;
            }
            'd' => "%d",
            'D' => "%a",
            'j' => "%-d",
            'l' => "%A",
            'N' => "%u",
            'w' => "%w",
            'z' => "%j",
            'W' => "%V",
            'F' => "%B",
            'm' => "%m",
            'M' => "%b",
            'n' => "%-m",
            'y' => "%y",
            'Y' => "%Y",
            'a' => "%P",
            'A' => "%p",
            'g' => "%-I",
            'G' => "%-H",
            'h' => "%I",
            'H' => "%H",
            'i' => "%M",
            's' => "%S",
            'u' => "%6f",
            'v' => "%3f",
            'e' | 'T' => "%Z",
            'P' => "%:z",
            'O' => "%z",
            'c' => "%Y-%m-%dT%H:%M:%S%:z",
            'r' => "%a, %d %b %Y %H:%M:%S %z",
            'U' => "%s",
            other => {
                push_literal(&mut out, other);
                continue;
            }
        };
        out.push_str(mapped);
    }
    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn f(name: &str, input: Value, arg: Option<&str>) -> Value {
        apply(name, input, arg)
    }

    #[test]
    fn string_case_filters() {
        assert_eq!(f("trim", json!("  hi  "), None), json!("hi"));
        assert_eq!(f("lower", json!("HeLLo"), None), json!("hello"));
        assert_eq!(f("upper", json!("hello"), None), json!("HELLO"));
        assert_eq!(f("capitalize", json!("hello world"), None), json!("Hello world"));
        assert_eq!(f("capitalize", json!(""), None), json!(""));
        assert_eq!(f("upper", Value::Null, None), json!(""));
    }

    #[test]
    fn slug_collapses_separators() {
        assert_eq!(f("slug", json!("  Hello, World!  Again "), None), json!("hello-world-again"));
        assert_eq!(f("slug", json!("already-a-slug"), None), json!("already-a-slug"));
    }

    #[test]
    fn default_applies_to_falsy_values() {
        for falsy in [Value::Null, json!(""), json!(false), json!(0), json!([])] {
            assert_eq!(f("default", falsy, Some("fallback")), json!("fallback"));
        }
        assert_eq!(f("default", json!("set"), Some("fallback")), json!("set"));
    }

    #[test]
    fn take_strings_and_arrays() {
        assert_eq!(f("take", json!("abcdef"), Some("3")), json!("abc"));
        assert_eq!(f("take", json!([1, 2, 3, 4]), Some("2")), json!([1, 2]));
        assert_eq!(f("take", json!("abc"), Some("x")), json!("abc"));
    }

    #[test]
    fn length_first_last() {
        assert_eq!(f("length", json!("héllo"), None), json!(5));
        assert_eq!(f("length", json!([1, 2]), None), json!(2));
        assert_eq!(f("length", Value::Null, None), json!(0));
        assert_eq!(f("first", json!(["a", "b"]), None), json!("a"));
        assert_eq!(f("last", json!(["a", "b"]), None), json!("b"));
        assert_eq!(f("first", json!("xyz"), None), json!("x"));
        assert_eq!(f("last", json!([]), None), Value::Null);
    }

    #[test]
    fn join_and_split() {
        assert_eq!(f("join", json!(["a", 1, true]), Some("-")), json!("a-1-true"));
        assert_eq!(f("join", json!(["a", "b"]), None), json!("a, b"));
        assert_eq!(f("split", json!("a,b,c"), Some(",")), json!(["a", "b", "c"]));
        assert_eq!(f("split", json!(""), Some(",")), json!([]));
    }

    #[test]
    fn truncate_appends_ellipsis_only_when_cut() {
        assert_eq!(f("truncate", json!("hello world"), Some("5")), json!("hello..."));
        assert_eq!(f("truncate", json!("short"), Some("10")), json!("short"));
    }

    #[test]
    fn slice_supports_negative_start() {
        assert_eq!(f("slice", json!("abcdef"), Some("2")), json!("cdef"));
        assert_eq!(f("slice", json!("abcdef"), Some("-2")), json!("ef"));
        assert_eq!(f("slice", json!("abcdef"), Some("1,3")), json!("bcd"));
        assert_eq!(f("slice", json!([1, 2, 3]), Some("1")), json!([2, 3]));
        assert_eq!(f("slice", json!("abc"), Some("10")), json!(""));
    }

    #[test]
    fn predicates() {
        assert_eq!(f("startswith", json!("fragment.create"), Some("fragment.")), json!(true));
        assert_eq!(f("contains", json!("hello"), Some("ell")), json!(true));
        assert_eq!(f("contains", json!(["a", "b"]), Some("b")), json!(true));
        assert_eq!(f("contains", json!(["a", "b"]), Some("c")), json!(false));
    }

    #[test]
    fn match_returns_group_or_whole() {
        assert_eq!(f("match", json!("order #1234"), Some(r"#(\d+)")), json!("1234"));
        assert_eq!(f("match", json!("order 1234"), Some(r"\d+")), json!("1234"));
        assert_eq!(f("match", json!("ORDER"), Some("/order/i")), json!("ORDER"));
        assert_eq!(f("match", json!("none"), Some(r"\d")), Value::Null);
        assert_eq!(f("match", json!("x"), Some("(")), Value::Null);
    }

    #[test]
    fn jsonpath_walks_objects_and_strings() {
        let v = json!({"a": {"b": [{"c": 7}]}});
        assert_eq!(f("jsonpath", v.clone(), Some("$.a.b.0.c")), json!(7));
        assert_eq!(f("jsonpath", v.clone(), Some("$.a.b[0].c")), json!(7));
        assert_eq!(f("jsonpath", v.clone(), Some("$.missing")), Value::Null);
        assert_eq!(f("jsonpath", json!("{\"k\": \"v\"}"), Some("$.k")), json!("v"));
        assert_eq!(f("jsonpath", json!("not json"), Some("$.k")), Value::Null);
    }

    #[test]
    fn json_serializes() {
        assert_eq!(f("json", json!({"a": [1]}), None), json!("{\"a\":[1]}"));
        assert_eq!(f("json", json!("s"), None), json!("\"s\""));
    }

    #[test]
    fn date_formats() {
        assert_eq!(f("date", json!("2024-03-05T14:07:09Z"), Some("Y-m-d H:i:s")), json!("2024-03-05 14:07:09"));
        assert_eq!(f("date", json!("2024-03-05"), Some("D, j M Y")), json!("Tue, 5 Mar 2024"));
        assert_eq!(f("date", json!(0), Some("Y")), json!("1970"));
        assert_eq!(f("date", json!("2024-03-05"), Some("%Y/%m")), json!("2024/03"));
        assert_eq!(f("date", json!("2024-03-05"), Some(r"\Y Y")), json!("Y 2024"));
        assert_eq!(f("date", json!("garbage"), Some("Y")), json!("garbage"));
    }

    #[test]
    fn unknown_filter_passes_through() {
        assert_eq!(f("frobnicate", json!({"k": 1}), Some("x")), json!({"k": 1}));
    }
}
