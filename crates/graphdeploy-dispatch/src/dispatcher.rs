use serde_json::Value;
use tracing::debug;

use crate::error::DispatchError;
use crate::event::ResolverEvent;
use crate::registry::{Export, ResolverRegistry};

/// Routes resolver invocations to the registered handler.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Option<ResolverRegistry>,
}

impl Dispatcher {
    /// `None` means the bundle shipped without a resolver module.
    pub fn new(registry: Option<ResolverRegistry>) -> Self {
        Self { registry }
    }

    pub async fn dispatch(&self, event: ResolverEvent) -> Result<Value, DispatchError> {
        let registry = self.registry.as_ref().ok_or(DispatchError::ModuleMissing)?;
        let type_name = event.info.parent_type_name.as_str();
        let field_name = event.info.field_name.as_str();

        let fields = registry
            .fields(type_name)
            .ok_or_else(|| DispatchError::type_not_exported(type_name))?;
        let export = fields
            .get(field_name)
            .ok_or_else(|| DispatchError::field_not_exported(type_name, field_name))?;
        let handler = match export {
            Export::Handler(handler) => handler.clone(),
            Export::Value(_) => return Err(DispatchError::not_invocable(type_name, field_name)),
        };

        debug!(type_name, field_name, "Dispatching resolver");
        let arguments = event.arguments.clone();
        Ok(handler(arguments, event).await?)
    }

    /// Deserialises a raw invocation payload and dispatches it.
    pub async fn dispatch_json(&self, payload: Value) -> Result<Value, DispatchError> {
        let event: ResolverEvent = serde_json::from_value(payload)?;
        self.dispatch(event).await
    }
}
