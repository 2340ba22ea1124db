#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use graphdeploy_core::client::{
    ApiKeyOutput, ApiKeyRequest, ApiOutput, ApiRequest, DataSourceRequest, DistributionOutput,
    DistributionRequest, FunctionOutput, FunctionRequest, RemoveDistributionRequest,
    ResolversRequest, RoleOutput, RoleRequest, SchemaRequest,
};
use graphdeploy_core::{
    ApiUrls, DynEventSink, LocalSourceProvider, ProviderError, Reconciler, RecordingSink,
    ResourceClient, ResourceKind,
};
use tempfile::TempDir;

/// A call received by [`MockClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DeployRole(RoleRequest),
    RemoveRole(String),
    DeployFunction(FunctionRequest),
    RemoveFunction(String),
    DeployApi(ApiRequest),
    RemoveApi(String),
    DeploySchema(SchemaRequest),
    DeployDataSource(DataSourceRequest),
    DeployResolvers(ResolversRequest),
    DeployApiKey(ApiKeyRequest),
    DeployDistribution(DistributionRequest),
    RemoveDistribution(RemoveDistributionRequest),
}

impl Call {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Call::DeployRole(_) | Call::RemoveRole(_) => ResourceKind::Role,
            Call::DeployFunction(_) | Call::RemoveFunction(_) => ResourceKind::Function,
            Call::DeployApi(_) | Call::RemoveApi(_) => ResourceKind::Api,
            Call::DeploySchema(_) => ResourceKind::Schema,
            Call::DeployDataSource(_) => ResourceKind::DataSource,
            Call::DeployResolvers(_) => ResourceKind::Resolvers,
            Call::DeployApiKey(_) => ResourceKind::ApiKey,
            Call::DeployDistribution(_) | Call::RemoveDistribution(_) => {
                ResourceKind::Distribution
            }
        }
    }

    pub fn is_remove(&self) -> bool {
        matches!(
            self,
            Call::RemoveRole(_)
                | Call::RemoveFunction(_)
                | Call::RemoveApi(_)
                | Call::RemoveDistribution(_)
        )
    }
}

/// Recording resource client with failure injection.
pub struct MockClient {
    credentials: bool,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashSet<(ResourceKind, &'static str)>>,
    counter: AtomicUsize,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            credentials: true,
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashSet::new()),
            counter: AtomicUsize::new(0),
        }
    }

    pub fn without_credentials() -> Self {
        Self {
            credentials: false,
            ..Self::new()
        }
    }

    /// Makes every `operation` ("deploy" or "remove") on `kind` fail.
    pub fn fail_on(&self, kind: ResourceKind, operation: &'static str) {
        self.failures.lock().unwrap().insert((kind, operation));
    }

    pub fn heal(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns and forgets the calls recorded so far.
    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn record(&self, call: Call) -> Result<(), ProviderError> {
        let kind = call.kind();
        let operation = if call.is_remove() { "remove" } else { "deploy" };
        self.calls.lock().unwrap().push(call);
        if self.failures.lock().unwrap().contains(&(kind, operation)) {
            return Err(ProviderError::new(kind, operation, "injected failure"));
        }
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}-{n}")
    }
}

#[async_trait]
impl ResourceClient for MockClient {
    fn credentials_present(&self) -> bool {
        self.credentials
    }

    async fn deploy_role(&self, _region: &str, request: RoleRequest) -> Result<RoleOutput, ProviderError> {
        let role_arn = format!("arn:aws:iam::000000000000:role/{}", request.role_name);
        self.record(Call::DeployRole(request))?;
        Ok(RoleOutput { role_arn })
    }

    async fn remove_role(&self, _region: &str, role_name: &str) -> Result<(), ProviderError> {
        self.record(Call::RemoveRole(role_name.to_string()))
    }

    async fn deploy_function(
        &self,
        _region: &str,
        request: FunctionRequest,
    ) -> Result<FunctionOutput, ProviderError> {
        let function_arn = format!("arn:aws:lambda:us-east-1:0:function:{}", request.function_name);
        self.record(Call::DeployFunction(request))?;
        Ok(FunctionOutput { function_arn })
    }

    async fn remove_function(&self, _region: &str, function_name: &str) -> Result<(), ProviderError> {
        self.record(Call::RemoveFunction(function_name.to_string()))
    }

    async fn deploy_api(&self, _region: &str, request: ApiRequest) -> Result<ApiOutput, ProviderError> {
        let api_id = match &request.api_id {
            Some(id) => id.clone(),
            None => self.next_id("api"),
        };
        self.record(Call::DeployApi(request))?;
        Ok(ApiOutput {
            api_urls: ApiUrls {
                graphql: format!("https://{api_id}.example/graphql"),
                realtime: None,
            },
            api_id,
        })
    }

    async fn remove_api(&self, _region: &str, api_id: &str) -> Result<(), ProviderError> {
        self.record(Call::RemoveApi(api_id.to_string()))
    }

    async fn deploy_schema(&self, _region: &str, request: SchemaRequest) -> Result<(), ProviderError> {
        self.record(Call::DeploySchema(request))
    }

    async fn deploy_data_source(
        &self,
        _region: &str,
        request: DataSourceRequest,
    ) -> Result<(), ProviderError> {
        self.record(Call::DeployDataSource(request))
    }

    async fn deploy_resolvers(
        &self,
        _region: &str,
        request: ResolversRequest,
    ) -> Result<(), ProviderError> {
        self.record(Call::DeployResolvers(request))
    }

    async fn deploy_api_key(
        &self,
        _region: &str,
        request: ApiKeyRequest,
    ) -> Result<ApiKeyOutput, ProviderError> {
        let api_key = match &request.api_key {
            Some(key) => key.clone(),
            None => self.next_id("key"),
        };
        self.record(Call::DeployApiKey(request))?;
        Ok(ApiKeyOutput { api_key })
    }

    async fn deploy_distribution(
        &self,
        _region: &str,
        request: DistributionRequest,
    ) -> Result<DistributionOutput, ProviderError> {
        let distribution_id = match &request.distribution_id {
            Some(id) => id.clone(),
            None => self.next_id("dist"),
        };
        self.record(Call::DeployDistribution(request))?;
        Ok(DistributionOutput {
            distribution_url: format!("{distribution_id}.cdn.example"),
            distribution_id,
        })
    }

    async fn remove_distribution(
        &self,
        _region: &str,
        request: RemoveDistributionRequest,
    ) -> Result<(), ProviderError> {
        self.record(Call::RemoveDistribution(request))
    }
}

/// Reconciler over a [`MockClient`] staging into a temporary directory.
pub struct Harness {
    pub client: Arc<MockClient>,
    pub events: Arc<RecordingSink>,
    pub reconciler: Reconciler,
    pub stage: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_client(MockClient::new())
    }

    pub fn with_client(client: MockClient) -> Self {
        let client = Arc::new(client);
        let events = Arc::new(RecordingSink::new());
        let stage = TempDir::new().unwrap();
        let reconciler = Reconciler::new(
            client.clone(),
            Arc::new(LocalSourceProvider::new(stage.path())),
        )
        .with_events(events.clone() as DynEventSink);
        Self {
            client,
            events,
            reconciler,
            stage,
        }
    }
}

/// Writes `files` into a fresh source directory.
pub fn source_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, contents) in files {
        write_file(dir.path(), name, contents);
    }
    dir
}

pub fn write_file(root: &Path, name: &str, contents: &str) -> PathBuf {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn path_str(dir: &TempDir) -> String {
    dir.path().to_str().unwrap().to_string()
}

pub const SCHEMA: &str = "type Query { post(id: ID!): String }";
