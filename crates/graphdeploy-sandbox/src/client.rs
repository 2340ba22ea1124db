use std::path::{Path, PathBuf};

use async_trait::async_trait;
use graphdeploy_core::client::{
    ApiKeyOutput, ApiKeyRequest, ApiOutput, ApiRequest, DataSourceRequest, DistributionOutput,
    DistributionRequest, FunctionOutput, FunctionRequest, RemoveDistributionRequest,
    ResolversRequest, RoleOutput, RoleRequest, SchemaRequest,
};
use graphdeploy_core::{ApiUrls, ProviderError, ResolverDefinition, ResourceClient, ResourceKind};
use rand::Rng;
use rand::distributions::Alphanumeric;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{SandboxError, invalid, not_found, persist_failed};
use crate::ledger::{
    ApiKeyRecord, ApiRecord, DataSourceRecord, DistributionRecord, FunctionRecord, Ledger,
    RoleRecord, make_key,
};

const ACCOUNT_ID: &str = "000000000000";

fn random_id(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// Simulated provider holding every resource in a [`Ledger`].
///
/// With a ledger path, every mutation is written through to a JSON file so
/// that separate CLI invocations see the same resources.
#[derive(Debug)]
pub struct SandboxClient {
    ledger: RwLock<Ledger>,
    path: Option<PathBuf>,
    credentials: bool,
}

impl Default for SandboxClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxClient {
    /// Creates an empty, in-memory sandbox.
    pub fn new() -> Self {
        Self {
            ledger: RwLock::new(Ledger::default()),
            path: None,
            credentials: true,
        }
    }

    /// Opens the ledger file at `path`, starting empty if it does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SandboxError> {
        let path = path.into();
        let read = tokio::fs::read_to_string(&path).await;
        let ledger = match read {
            Ok(raw) if raw.trim().is_empty() => Ledger::default(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| SandboxError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ledger::default(),
            Err(source) => return Err(SandboxError::Io { path, source }),
        };
        debug!(path = %path.display(), resources = ledger.resource_count(), "Opened sandbox ledger");
        Ok(Self {
            ledger: RwLock::new(ledger),
            path: Some(path),
            credentials: true,
        })
    }

    /// Simulates a missing credential chain.
    pub fn with_credentials(mut self, present: bool) -> Self {
        self.credentials = present;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns a copy of the ledger.
    pub async fn snapshot(&self) -> Ledger {
        self.ledger.read().await.clone()
    }

    async fn write_ledger(&self, ledger: &Ledger) -> Result<(), SandboxError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SandboxError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let contents = serde_json::to_string_pretty(ledger)?;
        let temp = path.with_extension("json.tmp");
        tokio::fs::write(&temp, contents)
            .await
            .map_err(|source| SandboxError::Io {
                path: temp.clone(),
                source,
            })?;
        tokio::fs::rename(&temp, path)
            .await
            .map_err(|source| SandboxError::Io {
                path: path.clone(),
                source,
            })
    }

    /// Writes the ledger through while the caller still holds the write lock.
    async fn commit(
        &self,
        ledger: &Ledger,
        kind: ResourceKind,
        operation: &str,
    ) -> Result<(), ProviderError> {
        self.write_ledger(ledger)
            .await
            .map_err(|e| persist_failed(kind, operation, e))
    }
}

fn api_mut<'a>(
    ledger: &'a mut Ledger,
    region: &str,
    api_id: &str,
    kind: ResourceKind,
) -> Result<&'a mut ApiRecord, ProviderError> {
    ledger
        .apis
        .get_mut(&make_key(region, api_id))
        .ok_or_else(|| not_found(kind, "deploy", format!("API \"{api_id}\"")))
}

#[async_trait]
impl ResourceClient for SandboxClient {
    fn credentials_present(&self) -> bool {
        self.credentials
    }

    async fn deploy_role(&self, region: &str, request: RoleRequest) -> Result<RoleOutput, ProviderError> {
        let arn = format!("arn:aws:iam::{ACCOUNT_ID}:role/{}", request.role_name);
        let mut ledger = self.ledger.write().await;
        ledger.roles.insert(
            make_key(region, &request.role_name),
            RoleRecord {
                arn: arn.clone(),
                service: request.service,
                policy: request.policy,
            },
        );
        self.commit(&ledger, ResourceKind::Role, "deploy").await?;
        debug!(%region, role = %request.role_name, "Role converged");
        Ok(RoleOutput { role_arn: arn })
    }

    async fn remove_role(&self, region: &str, role_name: &str) -> Result<(), ProviderError> {
        let mut ledger = self.ledger.write().await;
        if ledger.roles.remove(&make_key(region, role_name)).is_some() {
            self.commit(&ledger, ResourceKind::Role, "remove").await?;
        }
        Ok(())
    }

    async fn deploy_function(
        &self,
        region: &str,
        request: FunctionRequest,
    ) -> Result<FunctionOutput, ProviderError> {
        let kind = ResourceKind::Function;
        let mut ledger = self.ledger.write().await;
        if !ledger.roles.values().any(|role| role.arn == request.role_arn) {
            return Err(not_found(kind, "deploy", format!("role \"{}\"", request.role_arn)));
        }
        if tokio::fs::metadata(&request.bundle).await.is_err() {
            return Err(invalid(
                kind,
                "deploy",
                format!("bundle {} cannot be read", request.bundle.display()),
            ));
        }

        let key = make_key(region, &request.function_name);
        let arn = format!(
            "arn:aws:lambda:{region}:{ACCOUNT_ID}:function:{}",
            request.function_name
        );
        let revision = ledger.functions.get(&key).map_or(1, |f| f.revision + 1);
        ledger.functions.insert(
            key,
            FunctionRecord {
                arn: arn.clone(),
                handler: request.handler,
                role_arn: request.role_arn,
                bundle: request.bundle,
                memory: request.memory,
                timeout: request.timeout,
                env: request.env,
                layers: request.layers,
                vpc_config: request.vpc_config,
                revision,
            },
        );
        self.commit(&ledger, kind, "deploy").await?;
        debug!(%region, function = %request.function_name, revision, "Function converged");
        Ok(FunctionOutput { function_arn: arn })
    }

    async fn remove_function(&self, region: &str, function_name: &str) -> Result<(), ProviderError> {
        let mut ledger = self.ledger.write().await;
        if ledger.functions.remove(&make_key(region, function_name)).is_some() {
            self.commit(&ledger, ResourceKind::Function, "remove").await?;
        }
        Ok(())
    }

    async fn deploy_api(&self, region: &str, request: ApiRequest) -> Result<ApiOutput, ProviderError> {
        let mut ledger = self.ledger.write().await;
        let existing = request
            .api_id
            .filter(|id| ledger.apis.contains_key(&make_key(region, id)));

        let api_id = match existing {
            Some(api_id) => {
                if let Some(api) = ledger.apis.get_mut(&make_key(region, &api_id)) {
                    api.name = request.api_name;
                    api.auth = request.auth;
                }
                api_id
            }
            None => {
                let api_id = random_id(26);
                let urls = ApiUrls {
                    graphql: format!("https://{api_id}.appsync-api.{region}.amazonaws.com/graphql"),
                    realtime: Some(format!(
                        "wss://{api_id}.appsync-realtime-api.{region}.amazonaws.com/graphql"
                    )),
                };
                info!(%region, api_id = %api_id, "Created API");
                ledger.apis.insert(
                    make_key(region, &api_id),
                    ApiRecord {
                        name: request.api_name,
                        auth: request.auth,
                        urls,
                        schema: None,
                        schema_revision: 0,
                        data_sources: Default::default(),
                        resolvers: Default::default(),
                        api_keys: Vec::new(),
                    },
                );
                api_id
            }
        };

        let urls = ledger
            .api(region, &api_id)
            .map(|api| api.urls.clone())
            .unwrap_or_default();
        self.commit(&ledger, ResourceKind::Api, "deploy").await?;
        Ok(ApiOutput {
            api_id,
            api_urls: urls,
        })
    }

    async fn remove_api(&self, region: &str, api_id: &str) -> Result<(), ProviderError> {
        let mut ledger = self.ledger.write().await;
        if ledger.apis.remove(&make_key(region, api_id)).is_some() {
            self.commit(&ledger, ResourceKind::Api, "remove").await?;
        }
        Ok(())
    }

    async fn deploy_schema(&self, region: &str, request: SchemaRequest) -> Result<(), ProviderError> {
        let kind = ResourceKind::Schema;
        if request.schema.trim().is_empty() {
            return Err(invalid(kind, "deploy", "schema document is empty"));
        }
        let mut ledger = self.ledger.write().await;
        let api = api_mut(&mut ledger, region, &request.api_id, kind)?;
        api.schema = Some(request.schema);
        api.schema_revision += 1;
        self.commit(&ledger, kind, "deploy").await
    }

    async fn deploy_data_source(
        &self,
        region: &str,
        request: DataSourceRequest,
    ) -> Result<(), ProviderError> {
        let kind = ResourceKind::DataSource;
        let mut ledger = self.ledger.write().await;
        if ledger.function(region, &request.function_name).is_none() {
            return Err(not_found(
                kind,
                "deploy",
                format!("function \"{}\"", request.function_name),
            ));
        }
        let api = api_mut(&mut ledger, region, &request.api_id, kind)?;
        api.data_sources.insert(
            request.data_source_name,
            DataSourceRecord {
                function_name: request.function_name,
                role_arn: request.role_arn,
            },
        );
        self.commit(&ledger, kind, "deploy").await
    }

    async fn deploy_resolvers(
        &self,
        region: &str,
        request: ResolversRequest,
    ) -> Result<(), ProviderError> {
        let kind = ResourceKind::Resolvers;
        let mut ledger = self.ledger.write().await;
        let api = api_mut(&mut ledger, region, &request.api_id, kind)?;

        let bound = request
            .data_source_name
            .as_ref()
            .and_then(|name| api.data_sources.get(name));
        for (type_name, field_name, definition) in request.resolvers.iter() {
            match definition {
                ResolverDefinition::Delegate { function, .. } if *function == request.role_name => {
                    if bound.map(|ds| &ds.function_name) != Some(function) {
                        return Err(invalid(
                            kind,
                            "deploy",
                            format!(
                                "resolver \"{type_name}.{field_name}\" delegates to \"{function}\" but no data source is bound to it"
                            ),
                        ));
                    }
                }
                ResolverDefinition::Template { request, .. } if request.trim().is_empty() => {
                    return Err(invalid(
                        kind,
                        "deploy",
                        format!("resolver \"{type_name}.{field_name}\" has an empty request template"),
                    ));
                }
                _ => {}
            }
        }

        api.resolvers = request.resolvers;
        self.commit(&ledger, kind, "deploy").await
    }

    async fn deploy_api_key(
        &self,
        region: &str,
        request: ApiKeyRequest,
    ) -> Result<ApiKeyOutput, ProviderError> {
        let kind = ResourceKind::ApiKey;
        let mut ledger = self.ledger.write().await;
        let api = api_mut(&mut ledger, region, &request.api_id, kind)?;

        if let Some(key) = &request.api_key
            && api.api_keys.iter().any(|record| record.key == *key)
        {
            debug!(%region, api_id = %request.api_id, "API key still valid");
            return Ok(ApiKeyOutput {
                api_key: key.clone(),
            });
        }

        let key = format!("da2-{}", random_id(26));
        api.api_keys.push(ApiKeyRecord {
            key: key.clone(),
            description: request.description,
        });
        self.commit(&ledger, kind, "deploy").await?;
        info!(%region, api_id = %request.api_id, "Issued API key");
        Ok(ApiKeyOutput { api_key: key })
    }

    async fn deploy_distribution(
        &self,
        _region: &str,
        request: DistributionRequest,
    ) -> Result<DistributionOutput, ProviderError> {
        let mut ledger = self.ledger.write().await;
        let distribution_id = request
            .distribution_id
            .filter(|id| ledger.distributions.contains_key(id))
            .unwrap_or_else(|| format!("E{}", random_id(13).to_ascii_uppercase()));
        let url = format!("{}.cloudfront.net", distribution_id.to_ascii_lowercase());

        ledger.distributions.insert(
            distribution_id.clone(),
            DistributionRecord {
                domain: request.domain,
                origin: request.api_url,
                url: url.clone(),
            },
        );
        self.commit(&ledger, ResourceKind::Distribution, "deploy").await?;
        Ok(DistributionOutput {
            distribution_id,
            distribution_url: url,
        })
    }

    async fn remove_distribution(
        &self,
        _region: &str,
        request: RemoveDistributionRequest,
    ) -> Result<(), ProviderError> {
        let mut ledger = self.ledger.write().await;
        let id = request.distribution_id.or_else(|| {
            ledger
                .distributions
                .iter()
                .find(|(_, record)| record.domain == request.domain)
                .map(|(id, _)| id.clone())
        });
        let removed = id.is_some_and(|id| ledger.distributions.remove(&id).is_some());
        if removed {
            self.commit(&ledger, ResourceKind::Distribution, "remove").await?;
        }
        Ok(())
    }
}
