//! Per-execution evaluation environment.
//!
//! Reserved roots: `ctx`, `env`, `steps`, `now`, `uuid`, `ulid`, `prompts`.
//! A path whose first segment is not a reserved root resolves against `ctx`.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::value;

pub const RESERVED_ROOTS: &[&str] = &["ctx", "env", "steps", "now", "uuid", "ulid", "prompts"];

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionContext {
    /// Caller-supplied input.
    pub ctx: Value,
    pub env: Map<String, Value>,
    /// Step id → `{ "output": value }`, in execution order.
    pub steps: Map<String, Value>,
    pub now: String,
    pub uuid: String,
    pub ulid: String,
    pub prompts: Map<String, Value>,
}

impl ExecutionContext {
    /// Fresh context: `now`, `uuid` and `ulid` are captured here.
    pub fn new(input: Value) -> Self {
        Self {
            ctx: input,
            env: Map::new(),
            steps: Map::new(),
            now: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            uuid: uuid::Uuid::new_v4().to_string(),
            ulid: ulid::Ulid::new().to_string(),
            prompts: Map::new(),
        }
    }

    pub fn with_prompts(mut self, prompts: &BTreeMap<String, String>) -> Self {
        self.prompts = prompts
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        self
    }

    /// Copy the allow-listed process environment variables into `env`.
    /// Unset variables are skipped.
    pub fn with_env(mut self, allow: &[String]) -> Self {
        for name in allow {
            if let Ok(val) = std::env::var(name) {
                self.env.insert(name.clone(), Value::String(val));
            }
        }
        self
    }

    /// Make a step's output visible to the steps that run after it.
    pub fn record_output(&mut self, id: &str, output: Value) {
        let mut entry = Map::new();
        entry.insert("output".to_string(), output);
        self.steps.insert(id.to_string(), Value::Object(entry));
    }

    pub fn step_output(&self, id: &str) -> Option<&Value> {
        self.steps.get(id).and_then(|entry| entry.get("output"))
    }

    /// Resolve a dot path. Missing segments yield `null`.
    pub fn lookup(&self, path: &str) -> Value {
        let segments: Vec<&str> = path.split('.').map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Value::Null;
        }
        let (head, rest) = (segments[0], &segments[1..]);
        let found = match head {
            "ctx" => value::walk(&self.ctx, rest).cloned(),
            "env" => walk_map(&self.env, rest),
            "steps" => walk_map(&self.steps, rest),
            "prompts" => walk_map(&self.prompts, rest),
            "now" | "uuid" | "ulid" if rest.is_empty() => {
                let s = match head {
                    "now" => &self.now,
                    "uuid" => &self.uuid,
                    _ => &self.ulid,
                };
                Some(Value::String(s.clone()))
            }
            "now" | "uuid" | "ulid" => None,
            _ => value::walk(&self.ctx, &segments).cloned(),
        };
        found.unwrap_or(Value::Null)
    }

    /// The whole context as one JSON object.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn walk_map(map: &Map<String, Value>, rest: &[&str]) -> Option<Value> {
    match rest.split_first() {
        None => Some(Value::Object(map.clone())),
        Some((first, tail)) => value::walk(map.get(*first)?, tail).cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ExecutionContext {
        let mut prompts = BTreeMap::new();
        prompts.insert("system".to_string(), "You are terse.".to_string());
        ExecutionContext::new(json!({"user": {"name": "Ada", "tags": ["a", "b"]}, "body": "hello"}))
            .with_prompts(&prompts)
    }

    #[test]
    fn resolves_reserved_roots() {
        let mut cx = sample();
        cx.record_output("fetch", json!({"count": 3}));

        assert_eq!(cx.lookup("ctx.user.name"), json!("Ada"));
        assert_eq!(cx.lookup("ctx.user.tags.1"), json!("b"));
        assert_eq!(cx.lookup("steps.fetch.output.count"), json!(3));
        assert_eq!(cx.lookup("prompts.system"), json!("You are terse."));
        assert_eq!(cx.lookup("now"), json!(cx.now.clone()));
        assert_eq!(cx.lookup("uuid").as_str().map(str::len), Some(36));
        assert_eq!(cx.lookup("ulid").as_str().map(str::len), Some(26));
        assert_eq!(cx.lookup("env"), json!({}));
    }

    #[test]
    fn bare_paths_resolve_against_ctx() {
        let cx = sample();
        assert_eq!(cx.lookup("body"), json!("hello"));
        assert_eq!(cx.lookup("user.name"), json!("Ada"));
    }

    #[test]
    fn missing_segments_are_null() {
        let cx = sample();
        assert_eq!(cx.lookup("ctx.user.missing.deeper"), Value::Null);
        assert_eq!(cx.lookup("steps.never.output"), Value::Null);
        assert_eq!(cx.lookup("now.year"), Value::Null);
        assert_eq!(cx.lookup("ctx..user"), Value::Null);
    }

    #[test]
    fn steps_keep_execution_order() {
        let mut cx = sample();
        cx.record_output("zeta", json!(1));
        cx.record_output("alpha", json!(2));
        let keys: Vec<&String> = cx.steps.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(cx.step_output("alpha"), Some(&json!(2)));
    }

    #[test]
    fn fresh_identifiers_per_context() {
        let a = ExecutionContext::new(Value::Null);
        let b = ExecutionContext::new(Value::Null);
        assert_ne!(a.uuid, b.uuid);
        assert_ne!(a.ulid, b.ulid);
    }

    #[test]
    fn env_is_empty_unless_allowed() {
        let cx = ExecutionContext::new(Value::Null).with_env(&[]);
        assert!(cx.env.is_empty());
        let cx = ExecutionContext::new(Value::Null)
            .with_env(&["CMDPACK_SURELY_UNSET_VARIABLE".to_string()]);
        assert!(cx.env.is_empty());
    }
}
