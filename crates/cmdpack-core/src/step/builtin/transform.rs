use serde_json::{Map, Value};

use crate::error::StepError;
use crate::step::handler::{flag, optional_str, required_str, StepContext, StepHandler};

/// `transform`: returns the rendered `template`, optionally trimmed and
/// decoded as JSON (`format: json`).
pub struct TransformHandler;

impl StepHandler for TransformHandler {
    fn execute(
        &self,
        config: &Map<String, Value>,
        _ctx: &StepContext<'_>,
        _dry_run: bool,
    ) -> Result<Value, StepError> {
        let template = required_str(config, "template")?;
        let text = if flag(config, "trim") {
            template.trim()
        } else {
            template
        };

        match optional_str(config, "format")? {
            None | Some("text") => Ok(Value::String(text.to_string())),
            Some("json") => serde_json::from_str(text).map_err(|e| {
                StepError::invalid("template", format!("rendered text is not valid JSON: {e}"))
            }),
            Some(other) => Err(StepError::invalid(
                "format",
                format!("unsupported format '{other}' (expected text or json)"),
            )),
        }
    }

    fn validate(&self, config: &Map<String, Value>) -> bool {
        matches!(config.get("template"), Some(Value::String(_)))
    }
}
