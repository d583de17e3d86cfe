use serde_json::{Map, Value};

use crate::context::ExecutionContext;
use crate::error::StepError;
use crate::template::TemplateEngine;

// ---------------------------------------------------------------------------
// StepContext
// ---------------------------------------------------------------------------

/// What a handler can see while it runs: the execution context as of the
/// step's start, and the engine for any rendering of its own.
pub struct StepContext<'a> {
    pub execution: &'a ExecutionContext,
    pub templates: &'a TemplateEngine,
}

impl StepContext<'_> {
    pub fn render(&self, template: &str) -> String {
        self.templates.render(template, self.execution)
    }

    pub fn evaluate_condition(&self, condition: &str) -> bool {
        self.templates.evaluate_condition(condition, self.execution)
    }
}

// ---------------------------------------------------------------------------
// StepHandler
// ---------------------------------------------------------------------------

/// One step type. `config` arrives with every string leaf already rendered.
/// Under `dry_run` a handler must not perform external side effects.
pub trait StepHandler: Send + Sync {
    fn execute(
        &self,
        config: &Map<String, Value>,
        ctx: &StepContext<'_>,
        dry_run: bool,
    ) -> Result<Value, StepError>;

    /// Static configuration check. The runner does not call this.
    fn validate(&self, _config: &Map<String, Value>) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Config accessors
// ---------------------------------------------------------------------------

pub fn required_str<'a>(config: &'a Map<String, Value>, field: &str) -> Result<&'a str, StepError> {
    match config.get(field) {
        None | Some(Value::Null) => Err(StepError::MissingField(field.to_string())),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(StepError::invalid(field, "expected a string")),
    }
}

pub fn optional_str<'a>(
    config: &'a Map<String, Value>,
    field: &str,
) -> Result<Option<&'a str>, StepError> {
    match config.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(StepError::invalid(field, "expected a string")),
    }
}

/// Booleans, or strings that read as booleans after rendering.
pub fn flag(config: &Map<String, Value>, field: &str) -> bool {
    config
        .get(field)
        .map(crate::value::is_truthy)
        .unwrap_or(false)
}
