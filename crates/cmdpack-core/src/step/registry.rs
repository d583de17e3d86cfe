use std::collections::HashMap;
use std::sync::Arc;

use super::builtin::{ConditionHandler, NotifyHandler, TransformHandler, ValidateHandler};
use super::handler::StepHandler;

/// Step type tag → handler. Populated once at startup.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn StepHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `transform`, `notify`, `condition` and `validate`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("transform", TransformHandler);
        registry.register("notify", NotifyHandler);
        registry.register("condition", ConditionHandler);
        registry.register("validate", ValidateHandler);
        registry
    }

    /// Install `handler` for `step_type`, replacing any previous one.
    pub fn register(&mut self, step_type: &str, handler: impl StepHandler + 'static) {
        self.register_arc(step_type, Arc::new(handler));
    }

    pub fn register_arc(&mut self, step_type: &str, handler: Arc<dyn StepHandler>) {
        if self.handlers.insert(step_type.to_string(), handler).is_some() {
            tracing::debug!(step_type, "step handler replaced");
        }
    }

    pub fn get(&self, step_type: &str) -> Option<Arc<dyn StepHandler>> {
        self.handlers.get(step_type).cloned()
    }

    pub fn contains(&self, step_type: &str) -> bool {
        self.handlers.contains_key(step_type)
    }

    /// Registered type tags, sorted.
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("types", &self.types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;
    use crate::step::handler::StepContext;
    use serde_json::{json, Map, Value};

    struct Fixed(Value);

    impl StepHandler for Fixed {
        fn execute(
            &self,
            _config: &Map<String, Value>,
            _ctx: &StepContext<'_>,
            _dry_run: bool,
        ) -> Result<Value, StepError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn builtins_are_registered() {
        let r = HandlerRegistry::with_builtins();
        assert_eq!(r.types(), vec!["condition", "notify", "transform", "validate"]);
        assert!(r.get("fragment.create").is_none());
    }

    #[test]
    fn register_replaces_existing() {
        let mut r = HandlerRegistry::new();
        r.register("x", Fixed(json!(1)));
        r.register("x", Fixed(json!(2)));
        assert_eq!(r.types().len(), 1);
        assert!(r.contains("x"));
    }
}
