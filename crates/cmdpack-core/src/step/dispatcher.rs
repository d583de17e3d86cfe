use serde_json::{Map, Value};
use std::time::Instant;

use super::handler::StepContext;
use super::registry::HandlerRegistry;
use crate::context::ExecutionContext;
use crate::error::{catch_panic, CmdpackError};
use crate::registry::StepDeclaration;
use crate::template::TemplateEngine;
use crate::trace::StepResult;

/// Routes one step to its handler and captures the outcome. Never fails:
/// every problem becomes a failed [`StepResult`].
#[derive(Debug, Clone)]
pub struct StepDispatcher {
    handlers: HandlerRegistry,
    templates: TemplateEngine,
}

impl StepDispatcher {
    pub fn new(handlers: HandlerRegistry, templates: TemplateEngine) -> Self {
        Self {
            handlers,
            templates,
        }
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn templates(&self) -> &TemplateEngine {
        &self.templates
    }

    /// `id` is the step's resolved id (declared or synthesized). A handler
    /// panic fails the step with `internal error: <message>`.
    pub fn execute(
        &self,
        id: &str,
        step: &StepDeclaration,
        execution: &ExecutionContext,
        dry_run: bool,
    ) -> StepResult {
        let started = Instant::now();
        let elapsed = || started.elapsed().as_secs_f64() * 1000.0;

        let Some(handler) = self.handlers.get(&step.step_type) else {
            let err = CmdpackError::UnknownStepType(step.step_type.clone());
            return StepResult::failed(id, &step.step_type, err.to_string(), elapsed());
        };

        let config = self.render_config(&step.config, execution);
        let ctx = StepContext {
            execution,
            templates: &self.templates,
        };

        match catch_panic(|| handler.execute(&config, &ctx, dry_run)) {
            Ok(Ok(output)) => StepResult::succeeded(id, &step.step_type, output, elapsed()),
            Ok(Err(e)) => StepResult::failed(id, &step.step_type, e.to_string(), elapsed()),
            Err(panicked) => StepResult::failed(id, &step.step_type, panicked, elapsed()),
        }
    }

    fn render_config(&self, config: &Map<String, Value>, execution: &ExecutionContext) -> Map<String, Value> {
        config
            .iter()
            .map(|(k, v)| (k.clone(), self.templates.render_value(v, execution)))
            .collect()
    }
}
