use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field being resolved.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverInfo {
    pub parent_type_name: String,
    pub field_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selection_set_list: Vec<String>,
    #[serde(
        default,
        rename = "selectionSetGraphQL",
        skip_serializing_if = "Option::is_none"
    )]
    pub selection_set_graphql: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub variables: Value,
}

/// Invocation payload delivered to the compute function for one field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverEvent {
    #[serde(default)]
    pub arguments: Value,
    pub info: ResolverInfo,
    /// Resolved parent object, `null` for root fields.
    #[serde(default)]
    pub source: Value,
    #[serde(default)]
    pub identity: Value,
    #[serde(default)]
    pub request: Value,
    #[serde(default)]
    pub prev: Value,
}

impl ResolverEvent {
    pub fn new(type_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            info: ResolverInfo {
                parent_type_name: type_name.into(),
                field_name: field_name.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_arguments(mut self, arguments: Value) -> Self {
        self.arguments = arguments;
        self
    }
}
