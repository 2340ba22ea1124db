//! Resolver definitions and code module exports.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Binding of one (type, field) pair to its implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResolverDefinition {
    /// Invoke a compute function.
    Delegate {
        /// Function name.
        function: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<String>,
    },
    /// Request/response mapping template pair.
    Template {
        request: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<String>,
    },
}

impl ResolverDefinition {
    /// Creates a plain function delegate.
    pub fn delegate(function: impl Into<String>) -> Self {
        Self::Delegate {
            function: function.into(),
            request: None,
            response: None,
        }
    }

    /// Creates a template pair.
    pub fn template(request: impl Into<String>, response: Option<String>) -> Self {
        Self::Template {
            request: request.into(),
            response,
        }
    }

    /// Function this resolver delegates to, if any.
    pub fn function(&self) -> Option<&str> {
        match self {
            Self::Delegate { function, .. } => Some(function),
            Self::Template { .. } => None,
        }
    }
}

/// Canonical merged resolver map, type name to field name to definition.
///
/// `BTreeMap` keeps serialization order independent of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolverMap(BTreeMap<String, BTreeMap<String, ResolverDefinition>>);

impl ResolverMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a definition, returning the previous one for the same key.
    pub fn insert(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        definition: ResolverDefinition,
    ) -> Option<ResolverDefinition> {
        self.0
            .entry(type_name.into())
            .or_default()
            .insert(field_name.into(), definition)
    }

    pub fn get(&self, type_name: &str, field_name: &str) -> Option<&ResolverDefinition> {
        self.0.get(type_name)?.get(field_name)
    }

    pub fn contains(&self, type_name: &str, field_name: &str) -> bool {
        self.get(type_name, field_name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    /// Number of (type, field) bindings.
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    /// Iterates bindings in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &ResolverDefinition)> {
        self.0.iter().flat_map(|(type_name, fields)| {
            fields
                .iter()
                .map(move |(field, def)| (type_name.as_str(), field.as_str(), def))
        })
    }

    /// Distinct function names referenced by delegate resolvers.
    pub fn delegated_functions(&self) -> BTreeSet<&str> {
        self.iter().filter_map(|(_, _, def)| def.function()).collect()
    }
}

/// Name of the code resolver manifest inside a source bundle.
pub const RESOLVER_MANIFEST: &str = "resolvers.json";

/// Shape of one value exported by the code resolver module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportKind {
    /// An invocable resolver.
    Function,
    /// A nested table of exports.
    Object(BTreeMap<String, ExportKind>),
    /// Any other exported value; carries a short description of its kind.
    Value(String),
}

impl ExportKind {
    /// Human readable kind, used in validation messages.
    pub fn describe(&self) -> &str {
        match self {
            Self::Function => "function",
            Self::Object(_) => "object",
            Self::Value(kind) => kind,
        }
    }

    /// Interprets a manifest value. The string `"function"` marks an
    /// invocable field; objects nest; everything else is a plain value.
    fn from_manifest(value: &Value) -> Self {
        match value {
            Value::String(s) if s == "function" => Self::Function,
            Value::Object(map) => Self::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), Self::from_manifest(value)))
                    .collect(),
            ),
            Value::Null => Self::Value("null".into()),
            Value::Bool(_) => Self::Value("boolean".into()),
            Value::Number(_) => Self::Value("number".into()),
            Value::String(_) => Self::Value("string".into()),
            Value::Array(_) => Self::Value("array".into()),
        }
    }
}

/// Top-level exports of a code resolver module, keyed by type name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleExports(BTreeMap<String, ExportKind>);

impl ModuleExports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `resolvers.json` manifest. A non-object document yields no
    /// exports.
    pub fn from_manifest(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self(
                map.iter()
                    .map(|(key, value)| (key.clone(), ExportKind::from_manifest(value)))
                    .collect(),
            ),
            _ => Self::default(),
        }
    }

    pub fn with_export(mut self, type_name: impl Into<String>, kind: ExportKind) -> Self {
        self.0.insert(type_name.into(), kind);
        self
    }

    /// Convenience for a type whose listed fields are all functions.
    pub fn with_functions<I, S>(self, type_name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|field| (field.into(), ExportKind::Function))
            .collect();
        self.with_export(type_name, ExportKind::Object(fields))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExportKind)> {
        self.0.iter().map(|(key, kind)| (key.as_str(), kind))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_manifest_parsing() {
        let exports = ModuleExports::from_manifest(&json!({
            "Query": { "getPost": "function", "limit": 10 },
            "Mutation": "function"
        }));

        let kinds: Vec<_> = exports.iter().collect();
        assert_eq!(kinds[0].0, "Mutation");
        assert_eq!(kinds[0].1, &ExportKind::Function);

        let ExportKind::Object(fields) = kinds[1].1 else {
            panic!("Query should be an object");
        };
        assert_eq!(fields["getPost"], ExportKind::Function);
        assert_eq!(fields["limit"].describe(), "number");
    }

    #[test]
    fn test_resolver_map_iteration_is_ordered() {
        let mut map = ResolverMap::new();
        map.insert("Query", "b", ResolverDefinition::delegate("fn-a"));
        map.insert("Mutation", "z", ResolverDefinition::template("req", None));
        map.insert("Query", "a", ResolverDefinition::delegate("fn-b"));

        let keys: Vec<_> = map.iter().map(|(t, f, _)| format!("{t}.{f}")).collect();
        assert_eq!(keys, vec!["Mutation.z", "Query.a", "Query.b"]);
        assert_eq!(map.len(), 3);
        assert_eq!(
            map.delegated_functions().into_iter().collect::<Vec<_>>(),
            vec!["fn-a", "fn-b"]
        );
    }

    #[test]
    fn test_definition_serialization_is_tagged() {
        let value = serde_json::to_value(ResolverDefinition::delegate("demo-abc")).unwrap();
        assert_eq!(value, json!({ "kind": "delegate", "function": "demo-abc" }));
    }
}
