//! Desired and converged state.
//!
//! [`DesiredState`] is the caller supplied description of one deployment and
//! is immutable for the duration of a run. [`ConvergedState`] is the record of
//! what previous runs achieved; the reconciler mutates it field by field and
//! the caller persists it through a [`StateStore`](crate::state::StateStore).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fingerprint::Fingerprint;
use crate::policy::PolicyStatement;

/// Region used when the desired state does not name one.
pub const DEFAULT_REGION: &str = "us-east-1";

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

/// API authentication mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthMode {
    /// Key based access; an API key is converged for the API.
    #[default]
    ApiKey,
    /// Signed requests using provider credentials.
    AwsIam,
    /// User pool tokens.
    UserPool,
    /// OpenID Connect tokens.
    OpenIdConnect,
}

impl AuthMode {
    /// Returns the provider identifier for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKey => "API_KEY",
            Self::AwsIam => "AWS_IAM",
            Self::UserPool => "AMAZON_COGNITO_USER_POOLS",
            Self::OpenIdConnect => "OPENID_CONNECT",
        }
    }
}

/// How the reconciler treats a missing source bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourcePolicy {
    /// Fall back to the bundled skeleton when no source is supplied.
    #[default]
    AllowSkeleton,
    /// A source bundle must be supplied.
    RequireSource,
    /// A source bundle with a code resolver module must be supplied.
    RequireResolvers,
}

impl SourcePolicy {
    /// Returns `true` when a missing `src` is an error.
    pub fn requires_source(&self) -> bool {
        !matches!(self, Self::AllowSkeleton)
    }

    /// Returns `true` when a missing resolver module is an error.
    pub fn requires_resolver_module(&self) -> bool {
        matches!(self, Self::RequireResolvers)
    }
}

/// Network placement of the compute function.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcConfig {
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    #[serde(default)]
    pub security_group_ids: Vec<String>,
}

/// Compute function tuning.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSettings {
    /// Memory size in megabytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,
    /// Timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    /// Environment variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Layer references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<String>,
    /// Description applied to the function and the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Network placement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_config: Option<VpcConfig>,
}

/// Caller supplied description of one deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredState {
    #[serde(default = "default_region")]
    pub region: String,
    pub name: String,
    /// Source bundle reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Adopt an API this deployment does not own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_id: Option<String>,
    /// Config-declared resolvers, type name to field table. Values are kept
    /// raw so the merger can report shape errors by key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resolvers: BTreeMap<String, Value>,
    /// Extra access statements appended to the role policy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy: Vec<PolicyStatement>,
    /// Absent means key based auth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(flatten)]
    pub function: FunctionSettings,
    #[serde(default)]
    pub source_policy: SourcePolicy,
}

impl DesiredState {
    /// Creates a desired state with defaults for everything but the name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            region: default_region(),
            name: name.into(),
            src: None,
            api_id: None,
            resolvers: BTreeMap::new(),
            policy: Vec::new(),
            auth: None,
            domain: None,
            function: FunctionSettings::default(),
            source_policy: SourcePolicy::default(),
        }
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn with_api_id(mut self, api_id: impl Into<String>) -> Self {
        self.api_id = Some(api_id.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_auth(mut self, auth: AuthMode) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_resolver_type(mut self, type_name: impl Into<String>, fields: Value) -> Self {
        self.resolvers.insert(type_name.into(), fields);
        self
    }

    /// Returns `true` when an API key should be converged for this auth mode.
    pub fn uses_api_key(&self) -> bool {
        matches!(self.auth, None | Some(AuthMode::ApiKey))
    }
}

/// Endpoint URLs reported for a managed API.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUrls {
    pub graphql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realtime: Option<String>,
}

/// Record of what this deployment has achieved so far.
///
/// Every field is optional so that the empty document `{}` is the state of a
/// deployment that was never created.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvergedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Stable logical name, assigned once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the recorded API is owned by this deployment.
    #[serde(default)]
    pub api_managed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_urls: Option<ApiUrls>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    /// Whether a compute function is currently deployed.
    #[serde(default)]
    pub function_deployed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_fingerprint: Option<Fingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolvers_fingerprint: Option<Fingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl ConvergedState {
    /// Returns `true` when nothing was ever deployed from this state.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
    }

    /// Resets every field.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Region recorded by the last run, falling back to the default region.
    pub fn region_or_default(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    /// Primary GraphQL endpoint of a managed API.
    pub fn graphql_url(&self) -> Option<&str> {
        self.api_urls.as_ref().map(|urls| urls.graphql.as_str())
    }

    /// Forgets fingerprints so the next run redeploys schema and resolvers.
    pub(crate) fn reset_fingerprints(&mut self) {
        self.schema_fingerprint = None;
        self.resolvers_fingerprint = None;
    }

    /// Forgets the recorded distribution.
    pub(crate) fn clear_distribution(&mut self) {
        self.distribution_id = None;
        self.distribution_url = None;
        self.domain = None;
    }
}

/// Summary returned by a successful deploy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOutput {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl DeployOutput {
    /// Assembles the summary from a converged state.
    pub fn from_state(state: &ConvergedState) -> Self {
        Self {
            name: state.name.clone().unwrap_or_default(),
            api_id: state.api_id.clone(),
            url: state.graphql_url().map(str::to_string),
            api_key: state.api_key.clone(),
            domain: state
                .domain
                .as_ref()
                .map(|domain| format!("https://{domain}/graphql")),
        }
    }
}
