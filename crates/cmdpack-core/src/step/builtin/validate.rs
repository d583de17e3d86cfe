use serde_json::{json, Map, Value};

use crate::error::StepError;
use crate::step::handler::{StepContext, StepHandler};
use crate::template::filters::compile_pattern;
use crate::value::{as_number, to_text, walk};

/// `validate`: checks `data` (default: the caller input) against `rules`,
/// a map of dot path → `"rule|rule:arg"`. Every violation is reported.
///
/// `regex:` consumes the rest of the rule string, so patterns may contain `|`.
pub struct ValidateHandler;

impl StepHandler for ValidateHandler {
    fn execute(
        &self,
        config: &Map<String, Value>,
        ctx: &StepContext<'_>,
        _dry_run: bool,
    ) -> Result<Value, StepError> {
        let rules = match config.get("rules") {
            Some(Value::Object(rules)) => rules,
            Some(_) => return Err(StepError::invalid("rules", "expected a map of field to rules")),
            None => return Err(StepError::MissingField("rules".to_string())),
        };
        let data = match config.get("data") {
            None | Some(Value::Null) => ctx.execution.ctx.clone(),
            Some(Value::String(s)) => serde_json::from_str(s)
                .map_err(|e| StepError::invalid("data", format!("not a JSON document: {e}")))?,
            Some(other) => other.clone(),
        };

        let mut violations = Vec::new();
        for (field, rule_text) in rules {
            let Value::String(rule_text) = rule_text else {
                return Err(StepError::invalid(
                    format!("rules.{field}"),
                    "expected a rule string",
                ));
            };
            let value = walk(&data, field.split('.')).unwrap_or(&Value::Null);
            for rule in split_rules(rule_text) {
                if let Some(msg) = check(field, value, &rule)? {
                    violations.push(msg);
                }
            }
        }

        if violations.is_empty() {
            Ok(json!({"valid": true, "data": data}))
        } else {
            Err(StepError::Validation(violations.join("; ")))
        }
    }

    fn validate(&self, config: &Map<String, Value>) -> bool {
        matches!(config.get("rules"), Some(Value::Object(_)))
    }
}

#[derive(Debug, PartialEq)]
struct Rule<'a> {
    name: &'a str,
    arg: Option<&'a str>,
}

fn split_rules(rule_text: &str) -> Vec<Rule<'_>> {
    let mut rules = Vec::new();
    let mut rest = rule_text;
    while !rest.is_empty() {
        let (part, tail) = if rest.trim_start().starts_with("regex:") {
            (rest, "")
        } else {
            match rest.split_once('|') {
                Some((p, t)) => (p, t),
                None => (rest, ""),
            }
        };
        rest = tail;
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        rules.push(match part.split_once(':') {
            Some((name, arg)) => Rule {
                name: name.trim(),
                arg: Some(arg),
            },
            None => Rule {
                name: part,
                arg: None,
            },
        });
    }
    rules
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        _ => true,
    }
}

/// Size used by `min` / `max`: character count, element count or the number.
fn measure(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => as_number(value).or(Some(s.chars().count() as f64)),
        Value::Array(a) => Some(a.len() as f64),
        Value::Object(o) => Some(o.len() as f64),
        Value::Number(_) => as_number(value),
        _ => None,
    }
}

fn numeric_arg(rule: &Rule<'_>, field: &str) -> Result<f64, StepError> {
    rule.arg
        .and_then(|a| a.trim().parse::<f64>().ok())
        .ok_or_else(|| {
            StepError::invalid(
                format!("rules.{field}"),
                format!("rule '{}' needs a numeric argument", rule.name),
            )
        })
}

fn check(field: &str, value: &Value, rule: &Rule<'_>) -> Result<Option<String>, StepError> {
    if rule.name == "required" {
        return Ok((!is_present(value)).then(|| format!("{field} is required")));
    }
    // Optional fields that are absent pass every other rule.
    if value.is_null() {
        return Ok(None);
    }

    let failed = match rule.name {
        "string" => !value.is_string(),
        "numeric" => as_number(value).is_none(),
        "integer" => match value {
            Value::Number(n) => !(n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)),
            Value::String(s) => s.trim().parse::<i64>().is_err(),
            _ => true,
        },
        "boolean" => match value {
            Value::Bool(_) => false,
            Value::String(s) => !matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "false"),
            _ => true,
        },
        "array" => !value.is_array(),
        "min" => {
            let bound = numeric_arg(rule, field)?;
            measure(value).map_or(true, |m| m < bound)
        }
        "max" => {
            let bound = numeric_arg(rule, field)?;
            measure(value).map_or(true, |m| m > bound)
        }
        "in" => {
            let text = to_text(value);
            !rule
                .arg
                .unwrap_or_default()
                .split(',')
                .any(|opt| opt.trim() == text)
        }
        "regex" => {
            let pattern = rule.arg.unwrap_or_default();
            let re = compile_pattern(pattern).map_err(|e| {
                StepError::invalid(format!("rules.{field}"), format!("invalid regex: {e}"))
            })?;
            !re.is_match(&to_text(value))
        }
        other => {
            return Err(StepError::invalid(
                format!("rules.{field}"),
                format!("unknown rule '{other}'"),
            ))
        }
    };

    Ok(failed.then(|| match rule.arg {
        Some(arg) => format!("{field} failed {}:{arg}", rule.name),
        None => format!("{field} must be {}", rule.name),
    }))
}
