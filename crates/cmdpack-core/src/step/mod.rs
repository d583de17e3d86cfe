//! Step dispatch: handler trait, type-tag registry, built-in handlers.

pub mod builtin;
pub mod dispatcher;
pub mod handler;
pub mod registry;

pub use dispatcher::StepDispatcher;
pub use handler::{StepContext, StepHandler};
pub use registry::HandlerRegistry;
