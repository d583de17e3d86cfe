//! Template rendering: `{% if %}` control blocks, then `{{ expr }}`
//! substitution.
//!
//! Rendering never fails. Malformed expressions render as empty text and
//! malformed control blocks stay literal; both are reported through
//! `tracing` warnings.

pub mod ast;
pub mod blocks;
pub mod cache;
pub mod eval;
pub mod filters;
pub mod lexer;
pub mod parser;

use serde_json::Value;
use std::sync::Arc;

use crate::config::TemplateConfig;
use crate::context::ExecutionContext;
use crate::value::{is_truthy, to_text};

pub use blocks::Skeleton;
pub use cache::TemplateCache;
pub use parser::{parse, ParseError};

#[derive(Debug, Clone)]
pub struct TemplateEngine {
    config: TemplateConfig,
    cache: Arc<TemplateCache>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new(TemplateConfig::default())
    }
}

impl TemplateEngine {
    pub fn new(config: TemplateConfig) -> Self {
        let cache = Arc::new(TemplateCache::new(config.cache_capacity));
        Self { config, cache }
    }

    /// Share one cache between several engines.
    pub fn with_cache(config: TemplateConfig, cache: Arc<TemplateCache>) -> Self {
        Self { config, cache }
    }

    pub fn cache(&self) -> &Arc<TemplateCache> {
        &self.cache
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    pub fn render(&self, template: &str, cx: &ExecutionContext) -> String {
        let has_blocks = template.contains("{%");
        if !has_blocks && !template.contains("{{") {
            return template.to_string();
        }

        let expanded = if has_blocks || template.len() > self.config.cache_min_length {
            let skeleton = self.skeleton(template);
            skeleton.expand(&mut |cond: &str| self.evaluate_condition(cond, cx))
        } else {
            template.to_string()
        };

        self.substitute(&expanded, cx)
    }

    /// Parsed control structure for `template`, from the cache when possible.
    fn skeleton(&self, template: &str) -> Arc<Skeleton> {
        let key = TemplateCache::key(template);
        if let Some(hit) = self.cache.get(&key) {
            return hit;
        }
        let skeleton = Skeleton::parse(template, self.config.max_block_passes);
        if !self.cache.insert(key, Arc::clone(&skeleton)) {
            tracing::trace!("template cache full, skeleton not cached");
        }
        skeleton
    }

    fn substitute(&self, text: &str, cx: &ExecutionContext) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("{{") {
            let body = &rest[start + 2..];
            let Some(len) = closing_braces(body) else {
                break;
            };
            out.push_str(&rest[..start]);
            out.push_str(&to_text(&self.evaluate(&body[..len], cx)));
            rest = &body[len + 2..];
        }
        out.push_str(rest);
        out
    }

    /// Evaluate a bare expression (no `{{ }}`). Parse failures yield `null`.
    pub fn evaluate(&self, expr: &str, cx: &ExecutionContext) -> Value {
        match parser::parse(expr.trim()) {
            Ok(ast) => eval::evaluate(&ast, cx),
            Err(e) => {
                tracing::warn!(expression = expr.trim(), error = %e, "failed to parse template expression");
                Value::Null
            }
        }
    }

    /// Truthiness of a condition. Accepts a bare expression, a single
    /// `{{ expr }}`, or text mixing literal parts with `{{ }}` (which is
    /// rendered first and judged by its text). Parse failures are false.
    pub fn evaluate_condition(&self, condition: &str, cx: &ExecutionContext) -> bool {
        let trimmed = condition.trim();
        if trimmed.is_empty() {
            return false;
        }
        if let Some(inner) = single_expression(trimmed) {
            return is_truthy(&self.evaluate(inner, cx));
        }
        if trimmed.contains("{{") {
            return is_truthy(&Value::String(self.render(trimmed, cx)));
        }
        match parser::parse(trimmed) {
            Ok(ast) => is_truthy(&eval::evaluate(&ast, cx)),
            Err(e) => {
                tracing::warn!(condition = trimmed, error = %e, "failed to parse condition");
                false
            }
        }
    }

    /// Render every string leaf of `value`; arrays and objects are walked,
    /// other scalars are returned unchanged.
    pub fn render_value(&self, value: &Value, cx: &ExecutionContext) -> Value {
        match value {
            Value::String(s) => Value::String(self.render(s, cx)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.render_value(v, cx)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.render_value(v, cx)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

/// Byte offset of the `}}` closing an expression body, skipping quoted text.
fn closing_braces(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if b == b'}' && bytes.get(i + 1) == Some(&b'}') => return Some(i),
            None => {}
        }
        i += 1;
    }
    None
}

/// `{{ expr }}` spanning the whole string.
fn single_expression(s: &str) -> Option<&str> {
    let inner = s.strip_prefix("{{")?;
    let len = closing_braces(inner)?;
    (len + 2 == inner.len()).then(|| &inner[..len])
}
