use serde_json::{json, Map, Value};

use crate::error::StepError;
use crate::step::handler::{StepContext, StepHandler};
use crate::value::is_truthy;

/// `condition`: evaluates `condition` and reports the selected branch along
/// with the matching `then` / `else` value.
pub struct ConditionHandler;

impl StepHandler for ConditionHandler {
    fn execute(
        &self,
        config: &Map<String, Value>,
        ctx: &StepContext<'_>,
        _dry_run: bool,
    ) -> Result<Value, StepError> {
        let result = match config.get("condition") {
            None => return Err(StepError::MissingField("condition".to_string())),
            Some(Value::String(s)) => ctx.evaluate_condition(s),
            Some(other) => is_truthy(other),
        };
        let branch = if result { "then" } else { "else" };
        let value = config.get(branch).cloned().unwrap_or(Value::Null);

        Ok(json!({
            "result": result,
            "branch": branch,
            "value": value,
        }))
    }

    fn validate(&self, config: &Map<String, Value>) -> bool {
        config.contains_key("condition")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::builtin::testing::run;

    #[test]
    fn evaluates_bare_expression() {
        let out = run(
            &ConditionHandler,
            json!({"condition": "ctx.n > 3 and ctx.ok", "then": "big", "else": "small"}),
            json!({"n": 5, "ok": true}),
            false,
        )
        .unwrap();
        assert_eq!(out, json!({"result": true, "branch": "then", "value": "big"}));
    }

    #[test]
    fn already_rendered_values() {
        let out = run(
            &ConditionHandler,
            json!({"condition": "false", "then": 1}),
            Value::Null,
            false,
        )
        .unwrap();
        assert_eq!(out, json!({"result": false, "branch": "else", "value": null}));

        let out = run(&ConditionHandler, json!({"condition": true}), Value::Null, false).unwrap();
        assert_eq!(out["result"], json!(true));
    }

    #[test]
    fn condition_is_required() {
        let err = run(&ConditionHandler, json!({"then": 1}), Value::Null, false).unwrap_err();
        assert_eq!(err.to_string(), "missing required field 'condition'");
    }
}
