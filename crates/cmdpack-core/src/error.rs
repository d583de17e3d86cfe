use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CmdpackError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("invalid slug '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlug(String),

    #[error("invalid manifest for '{slug}': {reason}")]
    InvalidManifest { slug: String, reason: String },

    #[error("duplicate step id '{0}'")]
    DuplicateStepId(String),

    #[error("unknown step type: {0}")]
    UnknownStepType(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CmdpackError>;

/// Failure raised by a step handler. Recorded on the step result; never
/// propagated past the dispatcher.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StepError {
    pub fn failed(msg: impl Into<String>) -> Self {
        StepError::Failed(msg.into())
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        StepError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Run `f`, turning a panic into an `internal error: ...` message.
pub(crate) fn catch_panic<T>(f: impl FnOnce() -> T) -> std::result::Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| format!("internal error: {}", panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
