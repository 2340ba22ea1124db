//! Merging of code-declared and config-declared resolvers.
//!
//! The merger is a pure validation pass followed by template inlining; it
//! never calls a [`ResourceClient`](crate::client::ResourceClient). Each
//! (type, field) key ends up with exactly one [`ResolverDefinition`].

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{DeployError, ResolverOrigin, Result};
use crate::resolver::{ExportKind, ModuleExports, ResolverDefinition, ResolverMap};
use crate::source::WorkingDir;

/// Result of a merge.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergedResolvers {
    pub resolvers: ResolverMap,
    /// At least one resolver is implemented by the code module, so the
    /// compute function must be deployed.
    pub should_deploy_function: bool,
}

/// Combines the code module exports with the config resolver table.
#[derive(Debug, Clone)]
pub struct ResolverMerger<'a> {
    function_name: &'a str,
    dir: &'a WorkingDir,
}

impl<'a> ResolverMerger<'a> {
    /// `function_name` is the deployment's logical name, which is also the
    /// name of the compute function code resolvers delegate to.
    pub fn new(function_name: &'a str, dir: &'a WorkingDir) -> Self {
        Self { function_name, dir }
    }

    pub async fn merge(
        &self,
        exports: Option<&ModuleExports>,
        config: &BTreeMap<String, Value>,
    ) -> Result<MergedResolvers> {
        let mut merged = MergedResolvers::default();

        if let Some(exports) = exports {
            self.merge_exports(exports, &mut merged)?;
        }

        let declared = validate_config(config, &merged.resolvers)?;
        for (type_name, field_name, entry) in declared {
            let definition = self.resolve_templates(entry).await;
            merged.resolvers.insert(type_name, field_name, definition);
        }

        debug!(
            resolvers = merged.resolvers.len(),
            function = merged.should_deploy_function,
            "Merged resolvers"
        );
        Ok(merged)
    }

    fn merge_exports(&self, exports: &ModuleExports, merged: &mut MergedResolvers) -> Result<()> {
        for (type_name, kind) in exports.iter() {
            let ExportKind::Object(fields) = kind else {
                return Err(DeployError::invalid_type_shape(
                    ResolverOrigin::Code,
                    type_name,
                    "an object",
                ));
            };

            for (field_name, field) in fields {
                if *field != ExportKind::Function {
                    return Err(DeployError::invalid_field_shape(
                        ResolverOrigin::Code,
                        type_name,
                        field_name,
                        "a function",
                    ));
                }
                merged.should_deploy_function = true;
                merged.resolvers.insert(
                    type_name,
                    field_name.as_str(),
                    ResolverDefinition::delegate(self.function_name),
                );
            }
        }
        Ok(())
    }

    async fn resolve_templates(&self, entry: ConfigEntry) -> ResolverDefinition {
        let request = match entry.request {
            Some(reference) => Some(self.load_template(reference).await),
            None => None,
        };
        let response = match entry.response {
            Some(reference) => Some(self.load_template(reference).await),
            None => None,
        };

        match (entry.lambda, request) {
            (Some(function), request) => ResolverDefinition::Delegate {
                function,
                request,
                response,
            },
            (None, Some(request)) => ResolverDefinition::Template { request, response },
            // validate_config rejects entries with neither.
            (None, None) => ResolverDefinition::Template {
                request: String::new(),
                response,
            },
        }
    }

    /// Inlines a template file when it exists inside the working directory;
    /// otherwise the reference is kept as-is for the provider to reject.
    async fn load_template(&self, reference: String) -> String {
        if !self.dir.exists(&reference).await {
            debug!(template = %reference, "Template file not found, leaving reference unresolved");
            return reference;
        }
        match self.dir.read_to_string(&reference).await {
            Ok(contents) => contents,
            Err(e) => {
                debug!(template = %reference, error = %e, "Template file unreadable");
                reference
            }
        }
    }
}

#[derive(Debug)]
struct ConfigEntry {
    lambda: Option<String>,
    request: Option<String>,
    response: Option<String>,
}

/// Validates the whole config table before anything is read from disk.
fn validate_config(
    config: &BTreeMap<String, Value>,
    existing: &ResolverMap,
) -> Result<Vec<(String, String, ConfigEntry)>> {
    let mut declared = Vec::new();

    for (type_name, fields) in config {
        let Value::Object(fields) = fields else {
            return Err(DeployError::invalid_type_shape(
                ResolverOrigin::Config,
                type_name,
                "an object",
            ));
        };

        for (field_name, resolver) in fields {
            let Value::Object(resolver) = resolver else {
                return Err(DeployError::invalid_field_shape(
                    ResolverOrigin::Config,
                    type_name,
                    field_name,
                    "an object",
                ));
            };

            if existing.contains(type_name, field_name) {
                return Err(DeployError::conflicting_resolver(type_name, field_name));
            }

            let entry = ConfigEntry {
                lambda: string_property(resolver, "lambda", type_name, field_name)?,
                request: string_property(resolver, "request", type_name, field_name)?,
                response: string_property(resolver, "response", type_name, field_name)?,
            };

            if entry.lambda.is_none() && entry.request.is_none() {
                return Err(DeployError::missing_request_template(type_name, field_name));
            }

            declared.push((type_name.clone(), field_name.clone(), entry));
        }
    }

    Ok(declared)
}

fn string_property(
    resolver: &Map<String, Value>,
    key: &str,
    type_name: &str,
    field_name: &str,
) -> Result<Option<String>> {
    match resolver.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(DeployError::invalid_field_shape(
            ResolverOrigin::Config,
            type_name,
            field_name,
            format!("an object whose \"{key}\" property is a string"),
        )),
    }
}
