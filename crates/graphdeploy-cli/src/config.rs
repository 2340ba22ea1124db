use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use graphdeploy_core::{
    AuthMode, DEFAULT_REGION, DesiredState, FunctionSettings, PolicyStatement, SourcePolicy,
    VpcConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Project file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "graphdeploy.toml";

const VALID_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectConfig {
    pub deployment: DeploymentConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeploymentConfig {
    pub name: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub api_id: Option<String>,
    #[serde(default)]
    pub auth: Option<AuthMode>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub memory: Option<u32>,
    #[serde(default)]
    pub timeout: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub layers: Vec<String>,
    #[serde(default)]
    pub vpc: Option<VpcSection>,
    #[serde(default)]
    pub policy: Vec<PolicyStatement>,
    /// Type name to field table, kept raw for the resolver merger. Re-read
    /// from the file by [`load_config`], as are `env` and `policy`, so keys
    /// keep their case.
    #[serde(default)]
    pub resolvers: BTreeMap<String, Value>,
    #[serde(default)]
    pub source_policy: SourcePolicy,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VpcSection {
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    #[serde(default)]
    pub security_group_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from(".graphdeploy/state.json")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SandboxConfig {
    #[serde(default = "default_ledger_path")]
    pub ledger: PathBuf,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            ledger: default_ledger_path(),
        }
    }
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from(".graphdeploy/sandbox.json")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl ProjectConfig {
    pub fn validate(&self) -> Result<(), String> {
        let deployment = &self.deployment;
        if deployment.name.trim().is_empty() {
            return Err("deployment.name must not be empty".into());
        }
        if !deployment
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err("deployment.name may only contain letters, digits, '-' and '_'".into());
        }
        if deployment.region.trim().is_empty() {
            return Err("deployment.region must not be empty".into());
        }
        if let Some(memory) = deployment.memory
            && !(128..=10240).contains(&memory)
        {
            return Err("deployment.memory must be between 128 and 10240".into());
        }
        if let Some(timeout) = deployment.timeout
            && !(1..=900).contains(&timeout)
        {
            return Err("deployment.timeout must be between 1 and 900".into());
        }
        if let Some(domain) = &deployment.domain
            && (domain.is_empty() || domain.contains("://") || domain.contains('/'))
        {
            return Err("deployment.domain must be a bare host name".into());
        }
        if self.state.path.as_os_str().is_empty() {
            return Err("state.path must not be empty".into());
        }
        let level = self.logging.level.to_ascii_lowercase();
        if !VALID_LEVELS.contains(&level.as_str()) {
            return Err(format!("logging.level must be one of {VALID_LEVELS:?}"));
        }
        Ok(())
    }
}

impl DeploymentConfig {
    /// Builds the desired state, resolving `src` against `base_dir`.
    pub fn to_desired(&self, base_dir: &Path) -> DesiredState {
        DesiredState {
            region: self.region.clone(),
            name: self.name.clone(),
            src: self
                .src
                .as_ref()
                .map(|src| base_dir.join(src).to_string_lossy().into_owned()),
            api_id: self.api_id.clone(),
            resolvers: self.resolvers.clone(),
            policy: self.policy.clone(),
            auth: self.auth,
            domain: self.domain.clone(),
            function: FunctionSettings {
                memory: self.memory,
                timeout: self.timeout,
                env: self.env.clone(),
                layers: self.layers.clone(),
                description: self.description.clone(),
                vpc_config: self.vpc.as_ref().map(|vpc| VpcConfig {
                    subnet_ids: vpc.subnet_ids.clone(),
                    security_group_ids: vpc.security_group_ids.clone(),
                }),
            },
            source_policy: self.source_policy,
        }
    }
}

/// Loads the project config from `path` (or `graphdeploy.toml`) with
/// `GRAPHDEPLOY__SECTION__KEY` environment overrides, then validates it.
pub fn load_config(path: Option<&Path>) -> Result<ProjectConfig, String> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    if !path.exists() {
        return Err(format!(
            "config file {} not found; run `graphdeploy init` to create one",
            path.display()
        ));
    }

    let raw = std::fs::read_to_string(&path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let cfg = Config::builder()
        .add_source(File::from(path.clone()))
        .add_source(
            Environment::with_prefix("GRAPHDEPLOY")
                .try_parsing(true)
                .separator("__"),
        )
        .build()
        .map_err(|e| format!("config build error: {e}"))?;
    let mut merged: ProjectConfig = cfg
        .try_deserialize()
        .map_err(|e| format!("config deserialize error: {e}"))?;
    let document: toml::Table = toml::from_str(&raw)
        .map_err(|e| format!("failed to parse {}: {e}", path.display()))?;
    merged.deployment.resolvers = raw_entry(&document, "resolvers")?;
    merged.deployment.policy = raw_entry(&document, "policy")?;
    let mut env: BTreeMap<String, String> = raw_entry(&document, "env")?;
    // Merged values win, filed under the key's spelling in the file.
    for (key, value) in std::mem::take(&mut merged.deployment.env) {
        let original = env.keys().find(|k| k.eq_ignore_ascii_case(&key)).cloned();
        env.insert(original.unwrap_or(key), value);
    }
    merged.deployment.env = env;
    merged.validate()?;
    Ok(merged)
}

/// Reads `deployment.<key>` straight from the TOML document, keeping the
/// case of its keys.
fn raw_entry<T>(document: &toml::Table, key: &str) -> Result<T, String>
where
    T: serde::de::DeserializeOwned + Default,
{
    let Some(table) = document
        .get("deployment")
        .and_then(|deployment| deployment.get(key))
    else {
        return Ok(T::default());
    };
    serde_json::to_value(table)
        .and_then(serde_json::from_value)
        .map_err(|e| format!("invalid deployment.{key}: {e}"))
}
