use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::debug;

use super::{DeployReport, DeployStep, Reconciler, StepOutcome, StepReport};
use crate::client::{
    ApiKeyRequest, ApiRequest, DataSourceRequest, DistributionRequest, FunctionRequest,
    RemoveDistributionRequest, ResolversRequest, ResourceKind, RoleRequest, SchemaRequest,
};
use crate::error::{DeployError, Result};
use crate::events::DeployEvent;
use crate::fingerprint::{ChangeDetector, Fingerprint};
use crate::merger::{MergedResolvers, ResolverMerger};
use crate::model::{ConvergedState, DeployOutput, DesiredState};
use crate::policy::{TRUSTED_SERVICES, role_policy};
use crate::resolver::RESOLVER_MANIFEST;
use crate::source::{SCHEMA_FILE, WorkingDir};

const NAME_SUFFIX_LEN: usize = 8;

pub(super) async fn run(
    reconciler: &Reconciler,
    desired: &DesiredState,
    state: &mut ConvergedState,
) -> Result<DeployReport> {
    if !reconciler.client.credentials_present() {
        return Err(DeployError::CredentialsMissing);
    }

    let mut run = DeployRun {
        reconciler,
        desired,
        state,
        name: String::new(),
        manage_api: desired.api_id.is_none(),
        dir: None,
        schema: None,
        merged: MergedResolvers::default(),
    };

    let mut steps = Vec::with_capacity(DeployStep::PIPELINE.len());
    for step in DeployStep::PIPELINE {
        let outcome = run.step(step).await?;
        debug!(deployment = %run.name, step = %step, ?outcome, "Step finished");
        if step.is_mutating() {
            reconciler.checkpoint(run.state).await?;
        }
        steps.push(StepReport { step, outcome });
    }

    reconciler.emit(DeployEvent::Deployed {
        deployment: run.name.clone(),
        region: desired.region.clone(),
    });

    Ok(DeployReport {
        output: DeployOutput::from_state(run.state),
        steps,
    })
}

/// Logical name for a new deployment: the desired name plus a random suffix.
pub(crate) fn logical_name(base: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NAME_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{base}-{suffix}")
}

/// Data source names only allow alphanumerics and underscores.
pub(crate) fn data_source_name(logical_name: &str) -> String {
    logical_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

struct DeployRun<'a> {
    reconciler: &'a Reconciler,
    desired: &'a DesiredState,
    state: &'a mut ConvergedState,
    name: String,
    manage_api: bool,
    dir: Option<WorkingDir>,
    schema: Option<String>,
    merged: MergedResolvers,
}

impl DeployRun<'_> {
    async fn step(&mut self, step: DeployStep) -> Result<StepOutcome> {
        match step {
            DeployStep::Identity => Ok(self.identity()),
            DeployStep::Source => self.source().await,
            DeployStep::Schema => self.schema().await,
            DeployStep::Resolvers => self.resolvers().await,
            DeployStep::Role => self.role().await,
            DeployStep::Function => self.function().await,
            DeployStep::Api => self.api().await,
            DeployStep::SchemaDocument => self.schema_document().await,
            DeployStep::DataSource => self.data_source().await,
            DeployStep::ResolverSet => self.resolver_set().await,
            DeployStep::ApiKey => self.api_key().await,
            DeployStep::Distribution => self.distribution().await,
        }
    }

    fn region(&self) -> &str {
        &self.desired.region
    }

    fn started(&self, step: DeployStep, detail: String) {
        self.reconciler.emit(DeployEvent::StepStarted {
            deployment: self.name.clone(),
            region: self.region().to_string(),
            step,
            detail,
        });
    }

    fn completed(&self, step: DeployStep) -> StepOutcome {
        self.reconciler.emit(DeployEvent::StepCompleted {
            deployment: self.name.clone(),
            step,
        });
        StepOutcome::Converged
    }

    fn skipped(&self, step: DeployStep, reason: &str) -> StepOutcome {
        self.reconciler.emit(DeployEvent::StepSkipped {
            deployment: self.name.clone(),
            step,
            reason: reason.to_string(),
        });
        StepOutcome::Skipped
    }

    fn removing(&self, kind: ResourceKind, target: &str) {
        self.reconciler.emit(DeployEvent::Removing {
            deployment: self.name.clone(),
            region: self.region().to_string(),
            kind,
            target: target.to_string(),
        });
    }

    fn warn(&self, message: String) {
        self.reconciler.emit(DeployEvent::Warning {
            deployment: self.name.clone(),
            message,
        });
    }

    fn working_dir(&self) -> Result<&WorkingDir> {
        self.dir
            .as_ref()
            .ok_or_else(|| DeployError::source_error("source bundle was not unpacked"))
    }

    fn identity(&mut self) -> StepOutcome {
        let name = match self.state.name.clone() {
            Some(name) => name,
            None => {
                let name = logical_name(&self.desired.name);
                self.state.name = Some(name.clone());
                name
            }
        };
        self.name = name;
        self.state.region = Some(self.desired.region.clone());
        StepOutcome::Completed
    }

    /// Switches the recorded API between managed and adopted mode. Must not
    /// run before validation has passed.
    fn settle_api_mode(&mut self) {
        let desired = self.desired;
        match &desired.api_id {
            Some(adopted) => {
                if self.state.api_id.as_deref() != Some(adopted.as_str()) {
                    if self.state.api_managed
                        && let Some(previous) = &self.state.api_id
                    {
                        self.warn(format!(
                            "The API \"{previous}\" created by a previous deploy is no longer managed and was left in place"
                        ));
                    }
                    self.forget_api();
                    self.state.api_id = Some(adopted.clone());
                }
                self.state.api_managed = false;
            }
            None => {
                if !self.state.api_managed && self.state.api_id.is_some() {
                    self.forget_api();
                }
                self.state.api_managed = true;
            }
        }
    }

    /// Drops everything tied to the recorded API identity.
    fn forget_api(&mut self) {
        self.state.api_id = None;
        self.state.api_urls = None;
        self.state.api_key = None;
        self.state.reset_fingerprints();
    }

    async fn source(&mut self) -> Result<StepOutcome> {
        let src = self.desired.src.as_deref();
        if src.is_none() && self.desired.source_policy.requires_source() {
            return Err(DeployError::MissingSource);
        }

        let source = &self.reconciler.source;
        let dir = source.unpack(&self.name, src).await?;
        if src.is_none() {
            debug!(deployment = %self.name, "No source supplied, using the bundled skeleton");
            source.materialize_skeleton(&dir).await?;
        }
        self.dir = Some(dir);
        Ok(StepOutcome::Completed)
    }

    async fn schema(&mut self) -> Result<StepOutcome> {
        if !self.manage_api {
            return Ok(StepOutcome::NotApplicable);
        }
        let dir = self.working_dir()?;
        if !dir.exists(SCHEMA_FILE).await {
            return Err(DeployError::missing_schema_file(SCHEMA_FILE));
        }
        let schema = dir.read_to_string(SCHEMA_FILE).await?;
        self.schema = Some(schema);
        Ok(StepOutcome::Completed)
    }

    async fn resolvers(&mut self) -> Result<StepOutcome> {
        let dir = self.working_dir()?;
        let exports = self.reconciler.source.resolver_exports(dir).await?;
        if exports.is_none() && self.desired.source_policy.requires_resolver_module() {
            return Err(DeployError::missing_resolver_file(RESOLVER_MANIFEST));
        }

        let merged = ResolverMerger::new(&self.name, dir)
            .merge(exports.as_ref(), &self.desired.resolvers)
            .await?;
        self.merged = merged;
        Ok(StepOutcome::Completed)
    }

    async fn role(&mut self) -> Result<StepOutcome> {
        let step = DeployStep::Role;
        self.settle_api_mode();
        self.started(step, format!("Deploying Role \"{}\"", self.name));

        let request = RoleRequest {
            role_name: self.name.clone(),
            service: TRUSTED_SERVICES.iter().map(|s| s.to_string()).collect(),
            policy: role_policy(&self.merged.resolvers, self.region(), &self.desired.policy),
        };
        let output = self
            .reconciler
            .client
            .deploy_role(self.region(), request)
            .await?;
        self.state.role_arn = Some(output.role_arn);
        Ok(self.completed(step))
    }

    async fn function(&mut self) -> Result<StepOutcome> {
        let step = DeployStep::Function;

        if !self.merged.should_deploy_function {
            if !self.state.function_deployed {
                return Ok(StepOutcome::NotApplicable);
            }
            self.removing(ResourceKind::Function, &self.name);
            self.reconciler
                .client
                .remove_function(self.region(), &self.name)
                .await?;
            self.state.function_deployed = false;
            return Ok(StepOutcome::Removed);
        }

        self.started(step, format!("Deploying Function \"{}\"", self.name));
        let source = &self.reconciler.source;
        let dir = self.working_dir()?;
        let handler = source.install_handler(dir).await?;
        let bundle = source.pack(dir).await?;

        let settings = &self.desired.function;
        let request = FunctionRequest {
            function_name: self.name.clone(),
            description: settings.description.clone(),
            handler,
            memory: settings.memory,
            timeout: settings.timeout,
            env: settings.env.clone(),
            layers: settings.layers.clone(),
            vpc_config: settings.vpc_config.clone(),
            role_arn: self.state.role_arn.clone().unwrap_or_default(),
            bundle,
        };
        self.reconciler
            .client
            .deploy_function(self.region(), request)
            .await?;
        self.state.function_deployed = true;
        Ok(self.completed(step))
    }

    async fn api(&mut self) -> Result<StepOutcome> {
        if !self.manage_api {
            return Ok(StepOutcome::NotApplicable);
        }
        let step = DeployStep::Api;
        self.started(step, format!("Deploying API \"{}\"", self.name));

        let request = ApiRequest {
            api_name: self.name.clone(),
            auth: self.desired.auth.unwrap_or_default(),
            api_id: self.state.api_id.clone(),
        };
        let output = self
            .reconciler
            .client
            .deploy_api(self.region(), request)
            .await?;

        if self.state.api_id.as_deref() != Some(output.api_id.as_str()) {
            self.forget_api();
        }
        self.state.api_id = Some(output.api_id);
        self.state.api_urls = Some(output.api_urls);
        Ok(self.completed(step))
    }

    async fn schema_document(&mut self) -> Result<StepOutcome> {
        let step = DeployStep::SchemaDocument;
        let (Some(schema), Some(api_id)) = (self.schema.clone(), self.state.api_id.clone()) else {
            return Ok(StepOutcome::NotApplicable);
        };

        let fingerprint = Fingerprint::of_schema(&schema);
        if !ChangeDetector::has_changed(self.state.schema_fingerprint.as_ref(), &fingerprint) {
            return Ok(self.skipped(step, "schema unchanged"));
        }

        self.started(step, format!("Deploying schema to API \"{api_id}\""));
        self.reconciler
            .client
            .deploy_schema(self.region(), SchemaRequest { api_id, schema })
            .await?;
        self.state.schema_fingerprint = Some(fingerprint);
        Ok(self.completed(step))
    }

    async fn data_source(&mut self) -> Result<StepOutcome> {
        let step = DeployStep::DataSource;
        let Some(api_id) = self.state.api_id.clone() else {
            return Ok(StepOutcome::NotApplicable);
        };
        if !self.merged.should_deploy_function {
            return Ok(StepOutcome::NotApplicable);
        }

        let data_source_name = data_source_name(&self.name);
        self.started(step, format!("Deploying data source \"{data_source_name}\""));
        let request = DataSourceRequest {
            api_id,
            data_source_name,
            function_name: self.name.clone(),
            role_arn: self.state.role_arn.clone().unwrap_or_default(),
        };
        self.reconciler
            .client
            .deploy_data_source(self.region(), request)
            .await?;
        Ok(self.completed(step))
    }

    async fn resolver_set(&mut self) -> Result<StepOutcome> {
        let step = DeployStep::ResolverSet;
        let Some(api_id) = self.state.api_id.clone() else {
            return Ok(StepOutcome::NotApplicable);
        };

        let fingerprint = Fingerprint::of_resolvers(&self.merged.resolvers);
        if !ChangeDetector::has_changed(self.state.resolvers_fingerprint.as_ref(), &fingerprint) {
            return Ok(self.skipped(step, "resolvers unchanged"));
        }

        self.started(
            step,
            format!("Deploying {} resolvers to API \"{api_id}\"", self.merged.resolvers.len()),
        );
        let request = ResolversRequest {
            api_id,
            role_name: self.name.clone(),
            data_source_name: self
                .merged
                .should_deploy_function
                .then(|| data_source_name(&self.name)),
            resolvers: self.merged.resolvers.clone(),
        };
        self.reconciler
            .client
            .deploy_resolvers(self.region(), request)
            .await?;
        self.state.resolvers_fingerprint = Some(fingerprint);
        Ok(self.completed(step))
    }

    async fn api_key(&mut self) -> Result<StepOutcome> {
        let step = DeployStep::ApiKey;
        if !self.manage_api || !self.desired.uses_api_key() {
            self.state.api_key = None;
            return Ok(StepOutcome::NotApplicable);
        }
        let Some(api_id) = self.state.api_id.clone() else {
            return Ok(StepOutcome::NotApplicable);
        };

        self.started(step, format!("Deploying API key for API \"{api_id}\""));
        let request = ApiKeyRequest {
            api_id,
            api_key: self.state.api_key.clone(),
            description: self.desired.function.description.clone(),
        };
        let output = self
            .reconciler
            .client
            .deploy_api_key(self.region(), request)
            .await?;
        self.state.api_key = Some(output.api_key);
        Ok(self.completed(step))
    }

    async fn distribution(&mut self) -> Result<StepOutcome> {
        let step = DeployStep::Distribution;
        let desired_domain = self.desired.domain.clone().filter(|_| self.manage_api);

        let Some(domain) = desired_domain else {
            return self.remove_distribution().await;
        };
        let (Some(api_id), Some(api_url)) = (
            self.state.api_id.clone(),
            self.state.graphql_url().map(str::to_string),
        ) else {
            return Ok(StepOutcome::NotApplicable);
        };

        self.started(step, format!("Deploying distribution for \"{domain}\""));
        let request = DistributionRequest {
            api_id,
            api_url,
            domain: domain.clone(),
            distribution_id: self.state.distribution_id.clone(),
        };
        let output = self
            .reconciler
            .client
            .deploy_distribution(self.region(), request)
            .await?;
        self.state.distribution_id = Some(output.distribution_id);
        self.state.distribution_url = Some(output.distribution_url);
        self.state.domain = Some(domain);
        Ok(self.completed(step))
    }

    async fn remove_distribution(&mut self) -> Result<StepOutcome> {
        let Some(domain) = self.state.domain.clone() else {
            if self.state.distribution_id.is_some() {
                self.state.clear_distribution();
            }
            return Ok(StepOutcome::NotApplicable);
        };

        self.removing(ResourceKind::Distribution, &domain);
        let request = RemoveDistributionRequest {
            distribution_id: self.state.distribution_id.clone(),
            domain,
        };
        self.reconciler
            .client
            .remove_distribution(self.region(), request)
            .await?;
        self.state.clear_distribution();
        Ok(StepOutcome::Removed)
    }
}
