//! Records of the resources the sandbox holds.

use std::collections::BTreeMap;
use std::path::PathBuf;

use graphdeploy_core::{ApiUrls, AuthMode, PolicyStatement, ResolverMap, VpcConfig};
use serde::{Deserialize, Serialize};

pub type LedgerKey = String; // Format: "region/name"

pub(crate) fn make_key(region: &str, name: &str) -> LedgerKey {
    format!("{region}/{name}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRecord {
    pub arn: String,
    pub service: Vec<String>,
    pub policy: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRecord {
    pub arn: String,
    pub handler: String,
    pub role_arn: String,
    pub bundle: PathBuf,
    #[serde(default)]
    pub memory: Option<u32>,
    #[serde(default)]
    pub timeout: Option<u32>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub layers: Vec<String>,
    #[serde(default)]
    pub vpc_config: Option<VpcConfig>,
    /// Incremented on every update.
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceRecord {
    pub function_name: String,
    pub role_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRecord {
    pub key: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRecord {
    pub name: String,
    pub auth: AuthMode,
    pub urls: ApiUrls,
    #[serde(default)]
    pub schema: Option<String>,
    /// Number of schema uploads.
    #[serde(default)]
    pub schema_revision: u64,
    #[serde(default)]
    pub data_sources: BTreeMap<String, DataSourceRecord>,
    #[serde(default)]
    pub resolvers: ResolverMap,
    #[serde(default)]
    pub api_keys: Vec<ApiKeyRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionRecord {
    pub domain: String,
    pub origin: String,
    pub url: String,
}

/// Everything the sandbox provider holds, across regions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    #[serde(default)]
    pub roles: BTreeMap<LedgerKey, RoleRecord>,
    #[serde(default)]
    pub functions: BTreeMap<LedgerKey, FunctionRecord>,
    /// Keyed by region and API id.
    #[serde(default)]
    pub apis: BTreeMap<LedgerKey, ApiRecord>,
    /// Distributions are global; keyed by distribution id.
    #[serde(default)]
    pub distributions: BTreeMap<String, DistributionRecord>,
}

impl Ledger {
    pub fn role(&self, region: &str, name: &str) -> Option<&RoleRecord> {
        self.roles.get(&make_key(region, name))
    }

    pub fn function(&self, region: &str, name: &str) -> Option<&FunctionRecord> {
        self.functions.get(&make_key(region, name))
    }

    pub fn api(&self, region: &str, api_id: &str) -> Option<&ApiRecord> {
        self.apis.get(&make_key(region, api_id))
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
            && self.functions.is_empty()
            && self.apis.is_empty()
            && self.distributions.is_empty()
    }

    /// Number of resources of every kind, counting nested API resources.
    pub fn resource_count(&self) -> usize {
        let nested: usize = self
            .apis
            .values()
            .map(|api| api.data_sources.len() + api.resolvers.len() + api.api_keys.len())
            .sum();
        self.roles.len() + self.functions.len() + self.apis.len() + self.distributions.len() + nested
    }
}
