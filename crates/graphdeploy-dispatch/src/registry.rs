use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};

use crate::error::ResolverError;
use crate::event::ResolverEvent;

/// Manifest marker for an invocable field. A plain string value spelling the
/// marker is written with a leading backslash.
pub const FUNCTION_MARKER: &str = "function";

pub type ResolverFuture = BoxFuture<'static, Result<Value, ResolverError>>;

/// Async resolver taking the field arguments and the full event.
pub type ResolverHandler = Arc<dyn Fn(Value, ResolverEvent) -> ResolverFuture + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Export {
    Handler(ResolverHandler),
    /// Exported but not callable.
    Value(Value),
}

/// Code resolvers of a compute function, keyed by type and field.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    types: BTreeMap<String, BTreeMap<String, Export>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an async resolver for `type_name.field_name`.
    pub fn register<F, Fut>(
        mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn(Value, ResolverEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ResolverError>> + Send + 'static,
    {
        let handler: ResolverHandler = Arc::new(move |args, event| handler(args, event).boxed());
        self.insert(type_name.into(), field_name.into(), Export::Handler(handler));
        self
    }

    /// Registers a plain value under `type_name.field_name`.
    pub fn register_value(
        mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        value: Value,
    ) -> Self {
        self.insert(type_name.into(), field_name.into(), Export::Value(value));
        self
    }

    fn insert(&mut self, type_name: String, field_name: String, export: Export) {
        self.types
            .entry(type_name)
            .or_default()
            .insert(field_name, export);
    }

    pub(crate) fn fields(&self, type_name: &str) -> Option<&BTreeMap<String, Export>> {
        self.types.get(type_name)
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Export manifest written into the bundle as `resolvers.json`.
    pub fn exports(&self) -> Value {
        let types = self
            .types
            .iter()
            .map(|(type_name, fields)| {
                let fields: Map<String, Value> = fields
                    .iter()
                    .map(|(field_name, export)| {
                        let value = match export {
                            Export::Handler(_) => Value::String(FUNCTION_MARKER.into()),
                            Export::Value(Value::String(s)) if s == FUNCTION_MARKER => {
                                Value::String(format!("\\{FUNCTION_MARKER}"))
                            }
                            Export::Value(value) => value.clone(),
                        };
                        (field_name.clone(), value)
                    })
                    .collect();
                (type_name.clone(), Value::Object(fields))
            })
            .collect();
        Value::Object(types)
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("exports", &self.exports())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exports_mark_handlers() {
        let registry = ResolverRegistry::new()
            .register("Query", "hello", |_, _| async { Ok(json!("hi")) })
            .register_value("Query", "limit", json!(10));

        assert_eq!(
            registry.exports(),
            json!({ "Query": { "hello": "function", "limit": 10 } })
        );
    }

    #[test]
    fn test_value_spelling_the_marker_is_escaped() {
        let registry = ResolverRegistry::new().register_value("Query", "mode", json!("function"));
        assert_eq!(
            registry.exports(),
            json!({ "Query": { "mode": "\\function" } })
        );
    }
}
