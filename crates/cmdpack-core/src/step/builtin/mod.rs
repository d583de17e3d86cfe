//! Handlers that ship with the engine. Anything touching storage, search or
//! model providers is registered by the embedding application instead.

mod condition;
mod notify;
mod transform;
mod validate;

pub use condition::ConditionHandler;
pub use notify::NotifyHandler;
pub use transform::TransformHandler;
pub use validate::ValidateHandler;
