pub mod config;
pub mod context;
pub mod error;
pub mod io;
pub mod paths;
pub mod registry;
pub mod runner;
pub mod step;
pub mod template;
pub mod trace;
pub mod value;

pub use error::{CmdpackError, Result, StepError};
pub use runner::Runner;
pub use trace::{ExecutionTrace, StepResult};
