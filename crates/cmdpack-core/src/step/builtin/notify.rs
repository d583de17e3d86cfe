use serde_json::{json, Map, Value};

use crate::error::StepError;
use crate::step::handler::{optional_str, required_str, StepContext, StepHandler};

const DEFAULT_CHANNEL: &str = "log";

/// `notify`: emits `message` on `channel` as a tracing event. Nothing is
/// sent under dry run.
pub struct NotifyHandler;

impl StepHandler for NotifyHandler {
    fn execute(
        &self,
        config: &Map<String, Value>,
        _ctx: &StepContext<'_>,
        dry_run: bool,
    ) -> Result<Value, StepError> {
        let message = required_str(config, "message")?;
        let channel = optional_str(config, "channel")?
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(DEFAULT_CHANNEL);

        if dry_run {
            tracing::debug!(channel, message, "notify skipped (dry run)");
        } else {
            tracing::info!(target: "cmdpack::notify", channel, message, "notification");
        }

        Ok(json!({
            "sent": !dry_run,
            "channel": channel,
            "message": message,
        }))
    }

    fn validate(&self, config: &Map<String, Value>) -> bool {
        matches!(config.get("message"), Some(Value::String(_)))
    }
}
