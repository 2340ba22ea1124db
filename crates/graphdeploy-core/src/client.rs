//! Resource client contract.
//!
//! A [`ResourceClient`] executes create/update/delete for the concrete
//! resource kinds of a deployment. Every call is idempotent at the
//! single-call level: deploying an existing resource updates it in place and
//! removing a missing resource succeeds.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::model::{ApiUrls, AuthMode, VpcConfig};
use crate::policy::PolicyStatement;
use crate::resolver::ResolverMap;

/// Resource kinds managed by a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Role,
    Function,
    Api,
    Schema,
    DataSource,
    Resolvers,
    ApiKey,
    Distribution,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role => write!(f, "role"),
            Self::Function => write!(f, "function"),
            Self::Api => write!(f, "api"),
            Self::Schema => write!(f, "schema"),
            Self::DataSource => write!(f, "data source"),
            Self::Resolvers => write!(f, "resolvers"),
            Self::ApiKey => write!(f, "api key"),
            Self::Distribution => write!(f, "distribution"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRequest {
    pub role_name: String,
    pub service: Vec<String>,
    pub policy: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleOutput {
    pub role_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRequest {
    pub function_name: String,
    pub description: Option<String>,
    /// Entry point inside the bundle.
    pub handler: String,
    pub memory: Option<u32>,
    pub timeout: Option<u32>,
    pub env: BTreeMap<String, String>,
    pub layers: Vec<String>,
    pub vpc_config: Option<VpcConfig>,
    pub role_arn: String,
    /// Packaged bundle reference.
    pub bundle: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionOutput {
    pub function_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub api_name: String,
    pub auth: AuthMode,
    /// Existing API to update in place; `None` creates one.
    pub api_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiOutput {
    pub api_id: String,
    pub api_urls: ApiUrls,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRequest {
    pub api_id: String,
    pub schema: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceRequest {
    pub api_id: String,
    pub data_source_name: String,
    pub function_name: String,
    pub role_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolversRequest {
    pub api_id: String,
    pub role_name: String,
    /// Data source bound to delegate resolvers, when a function is deployed.
    pub data_source_name: Option<String>,
    pub resolvers: ResolverMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRequest {
    pub api_id: String,
    /// Previously issued key; the client revalidates it or mints a new one.
    pub api_key: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyOutput {
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionRequest {
    pub api_id: String,
    pub api_url: String,
    pub domain: String,
    /// Existing distribution to update in place; `None` creates one.
    pub distribution_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionOutput {
    pub distribution_id: String,
    pub distribution_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveDistributionRequest {
    pub distribution_id: Option<String>,
    pub domain: String,
}

/// Provider calls for every resource kind of a deployment.
///
/// Implementations must be thread-safe; the remove path issues several calls
/// concurrently. Errors are opaque to the reconciler and propagated unchanged.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Returns `false` when no provider credentials are configured.
    fn credentials_present(&self) -> bool;

    async fn deploy_role(&self, region: &str, request: RoleRequest)
    -> Result<RoleOutput, ProviderError>;

    async fn remove_role(&self, region: &str, role_name: &str) -> Result<(), ProviderError>;

    async fn deploy_function(
        &self,
        region: &str,
        request: FunctionRequest,
    ) -> Result<FunctionOutput, ProviderError>;

    async fn remove_function(&self, region: &str, function_name: &str)
    -> Result<(), ProviderError>;

    async fn deploy_api(&self, region: &str, request: ApiRequest)
    -> Result<ApiOutput, ProviderError>;

    async fn remove_api(&self, region: &str, api_id: &str) -> Result<(), ProviderError>;

    async fn deploy_schema(&self, region: &str, request: SchemaRequest)
    -> Result<(), ProviderError>;

    async fn deploy_data_source(
        &self,
        region: &str,
        request: DataSourceRequest,
    ) -> Result<(), ProviderError>;

    async fn deploy_resolvers(
        &self,
        region: &str,
        request: ResolversRequest,
    ) -> Result<(), ProviderError>;

    async fn deploy_api_key(
        &self,
        region: &str,
        request: ApiKeyRequest,
    ) -> Result<ApiKeyOutput, ProviderError>;

    async fn deploy_distribution(
        &self,
        region: &str,
        request: DistributionRequest,
    ) -> Result<DistributionOutput, ProviderError>;

    async fn remove_distribution(
        &self,
        region: &str,
        request: RemoveDistributionRequest,
    ) -> Result<(), ProviderError>;
}

/// Shared resource client handle.
pub type DynResourceClient = Arc<dyn ResourceClient>;
