//! Command execution: load a pack, run its steps in order, collect a trace.
//!
//! Steps run strictly sequentially. Each step sees the outputs of the steps
//! that finished before it; the first failure halts the run. Nothing escapes
//! [`Runner::execute`]: errors and panics both end up on the trace.

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::context::ExecutionContext;
use crate::error::{catch_panic, CmdpackError};
use crate::registry::{CommandPack, CommandPackRegistry, FsRegistry};
use crate::step::{HandlerRegistry, StepDispatcher};
use crate::template::TemplateEngine;
use crate::trace::ExecutionTrace;

pub struct Runner {
    registry: Arc<dyn CommandPackRegistry>,
    dispatcher: StepDispatcher,
    env_allow: Vec<String>,
}

impl Runner {
    pub fn new(
        registry: Arc<dyn CommandPackRegistry>,
        handlers: HandlerRegistry,
        templates: TemplateEngine,
    ) -> Self {
        Self {
            registry,
            dispatcher: StepDispatcher::new(handlers, templates),
            env_allow: Vec::new(),
        }
    }

    /// Filesystem registry under `root`, built-in handlers, engine tuned by
    /// `config.templates`, env allow-list from `config.env`.
    pub fn from_config(root: &Path, config: &Config) -> Self {
        Self::new(
            Arc::new(FsRegistry::from_config(root, config)),
            HandlerRegistry::with_builtins(),
            TemplateEngine::new(config.templates.clone()),
        )
        .with_env_allow(config.env.allow.clone())
    }

    /// Process environment variables copied into `env` for every execution.
    pub fn with_env_allow(mut self, allow: Vec<String>) -> Self {
        self.env_allow = allow;
        self
    }

    pub fn registry(&self) -> &Arc<dyn CommandPackRegistry> {
        &self.registry
    }

    pub fn templates(&self) -> &TemplateEngine {
        self.dispatcher.templates()
    }

    pub fn execute(&self, slug: &str, input: Value, dry_run: bool) -> ExecutionTrace {
        info!(command = slug, dry_run, "execution started");
        let trace = ExecutionTrace::new(slug, input.clone(), dry_run);

        let loaded = catch_panic(|| self.registry.load(slug));
        let trace = match loaded {
            Ok(Ok(Some(pack))) => return self.execute_pack(&pack, input, dry_run),
            Ok(Ok(None)) => trace.fail(CmdpackError::CommandNotFound(slug.to_string()).to_string()),
            Ok(Err(e)) => trace.fail(e.to_string()),
            Err(msg) => trace.fail(msg),
        };
        warn!(command = slug, error = trace.error.as_deref().unwrap_or_default(), "execution failed");
        trace
    }

    /// Run an already-loaded pack.
    pub fn execute_pack(&self, pack: &CommandPack, input: Value, dry_run: bool) -> ExecutionTrace {
        let mut trace = ExecutionTrace::new(&pack.slug, input.clone(), dry_run);

        let outcome = catch_panic(|| self.run_steps(pack, input, dry_run, &mut trace));
        let trace = match outcome {
            Ok(Ok(())) => trace.complete(),
            Ok(Err(error)) | Err(error) => trace.fail(error),
        };

        match &trace.error {
            None => info!(
                command = %pack.slug,
                steps = trace.steps.len(),
                duration_ms = trace.total_duration_ms(),
                "execution finished"
            ),
            Some(error) => warn!(
                command = %pack.slug,
                steps = trace.steps.len(),
                error = %error,
                "execution failed"
            ),
        }
        trace
    }

    fn run_steps(
        &self,
        pack: &CommandPack,
        input: Value,
        dry_run: bool,
        trace: &mut ExecutionTrace,
    ) -> Result<(), String> {
        pack.manifest.validate(&pack.slug).map_err(|e| e.to_string())?;

        let mut execution = ExecutionContext::new(input)
            .with_env(&self.env_allow)
            .with_prompts(&pack.prompts);

        for (index, step) in pack.manifest.steps.iter().enumerate() {
            let id = match &step.id {
                Some(id) => id.clone(),
                None => synthesize_id(index),
            };
            debug!(command = %pack.slug, step = %id, step_type = %step.step_type, "running step");

            let result = self.dispatcher.execute(&id, step, &execution, dry_run);
            let failure = result.error.clone().filter(|_| !result.success);
            if failure.is_none() {
                execution.record_output(&id, result.output.clone());
            }
            trace.steps.push(result);

            if let Some(error) = failure {
                warn!(command = %pack.slug, step = %id, error = %error, "step failed");
                return Err(error);
            }
        }
        Ok(())
    }
}

/// Placeholder id for a step declared without one: unique per run, not
/// stable across runs.
fn synthesize_id(index: usize) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("step_{index}_{}", &random[..8])
}
