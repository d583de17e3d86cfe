use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// StepResult
// ---------------------------------------------------------------------------

/// Outcome of one step. Finalized once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    pub success: bool,
    pub output: Value,
    pub error: Option<String>,
    pub duration_ms: f64,
}

impl StepResult {
    pub fn succeeded(id: &str, step_type: &str, output: Value, duration_ms: f64) -> Self {
        Self {
            id: id.to_string(),
            step_type: step_type.to_string(),
            success: true,
            output,
            error: None,
            duration_ms,
        }
    }

    pub fn failed(id: &str, step_type: &str, error: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            id: id.to_string(),
            step_type: step_type.to_string(),
            success: false,
            output: Value::Null,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionTrace
// ---------------------------------------------------------------------------

/// Full result of one command execution. Failures are data here: callers
/// branch on `success` rather than handling errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub command: String,
    pub context: Value,
    pub steps: Vec<StepResult>,
    pub success: bool,
    pub error: Option<String>,
    pub dry_run: bool,
}

impl ExecutionTrace {
    pub fn new(command: &str, context: Value, dry_run: bool) -> Self {
        Self {
            command: command.to_string(),
            context,
            steps: Vec::new(),
            success: false,
            error: None,
            dry_run,
        }
    }

    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }

    pub fn complete(mut self) -> Self {
        self.success = true;
        self.error = None;
        self
    }

    pub fn step(&self, id: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn total_duration_ms(&self) -> f64 {
        self.steps.iter().map(|s| s.duration_ms).sum()
    }
}
