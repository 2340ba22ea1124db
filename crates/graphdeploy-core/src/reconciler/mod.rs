//! The reconciliation engine.
//!
//! A deploy run walks [`DeployStep::PIPELINE`] in order. Steps up to and
//! including [`DeployStep::Resolvers`] only read and validate; from
//! [`DeployStep::Role`] on each step issues at most one converge call and
//! records its result in the [`ConvergedState`] before the next step starts.
//! A failure aborts the run and leaves the state as of the last successful
//! step, so re-running the same desired state resumes where it stopped.
//!
//! A remove run dispatches every teardown call concurrently and clears the
//! state only when all of them succeed.
//!
//! ```ignore
//! let reconciler = Reconciler::new(client, source).with_checkpoint(store.clone());
//! let report = reconciler.deploy_stored(&desired, store.as_ref()).await?;
//! println!("{}", report.output.url.unwrap_or_default());
//! ```

mod deploy;
mod remove;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::client::{DynResourceClient, ResourceKind};
use crate::error::Result;
use crate::events::{DeployEvent, DynEventSink, TracingSink};
use crate::model::{ConvergedState, DeployOutput, DesiredState};
use crate::source::SourceProvider;
use crate::state::{DynStateStore, StateStore};

/// Named steps of the deploy pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStep {
    Identity,
    Source,
    Schema,
    Resolvers,
    Role,
    Function,
    Api,
    SchemaDocument,
    DataSource,
    ResolverSet,
    ApiKey,
    Distribution,
}

impl DeployStep {
    /// Steps in execution order.
    pub const PIPELINE: [DeployStep; 12] = [
        Self::Identity,
        Self::Source,
        Self::Schema,
        Self::Resolvers,
        Self::Role,
        Self::Function,
        Self::Api,
        Self::SchemaDocument,
        Self::DataSource,
        Self::ResolverSet,
        Self::ApiKey,
        Self::Distribution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Source => "source",
            Self::Schema => "schema",
            Self::Resolvers => "resolvers",
            Self::Role => "role",
            Self::Function => "function",
            Self::Api => "api",
            Self::SchemaDocument => "schema_document",
            Self::DataSource => "data_source",
            Self::ResolverSet => "resolver_set",
            Self::ApiKey => "api_key",
            Self::Distribution => "distribution",
        }
    }

    /// Returns `true` for steps that may call the resource client.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Self::Identity | Self::Source | Self::Schema | Self::Resolvers
        )
    }
}

impl fmt::Display for DeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// A preparation or validation step finished.
    Completed,
    /// A converge call was issued and succeeded.
    Converged,
    /// The fingerprint matched the previous run; no call was issued.
    Skipped,
    /// The step does not apply to this deployment.
    NotApplicable,
    /// A previously deployed resource is no longer desired and was removed.
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: DeployStep,
    pub outcome: StepOutcome,
}

/// Result of a successful deploy run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    pub output: DeployOutput,
    pub steps: Vec<StepReport>,
}

impl DeployReport {
    /// Outcome of `step`, if the run reached it.
    pub fn outcome(&self, step: DeployStep) -> Option<StepOutcome> {
        self.steps
            .iter()
            .find(|report| report.step == step)
            .map(|report| report.outcome)
    }
}

/// Result of a remove run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RemoveReport {
    /// `false` when the state was already empty.
    pub removed: bool,
    /// Resource kinds a teardown call was issued for.
    pub resources: Vec<ResourceKind>,
}

/// Sequences resource client calls for one deployment.
pub struct Reconciler {
    client: DynResourceClient,
    source: Arc<dyn SourceProvider>,
    events: DynEventSink,
    checkpoint: Option<DynStateStore>,
}

impl Reconciler {
    pub fn new(client: DynResourceClient, source: Arc<dyn SourceProvider>) -> Self {
        Self {
            client,
            source,
            events: Arc::new(TracingSink),
            checkpoint: None,
        }
    }

    /// Replaces the default tracing event sink.
    pub fn with_events(mut self, events: DynEventSink) -> Self {
        self.events = events;
        self
    }

    /// Saves the state to `store` after every successful step.
    pub fn with_checkpoint(mut self, store: DynStateStore) -> Self {
        self.checkpoint = Some(store);
        self
    }

    /// Converges `desired`, mutating `state` as each step succeeds.
    pub async fn deploy(
        &self,
        desired: &DesiredState,
        state: &mut ConvergedState,
    ) -> Result<DeployReport> {
        deploy::run(self, desired, state).await
    }

    /// Tears down everything `state` records and clears it.
    pub async fn remove(&self, state: &mut ConvergedState) -> Result<RemoveReport> {
        remove::run(self, state).await
    }

    /// Loads the state from `store`, deploys, and saves the resulting state
    /// whether or not the run succeeded.
    pub async fn deploy_stored(
        &self,
        desired: &DesiredState,
        store: &dyn StateStore,
    ) -> Result<DeployReport> {
        let mut state = store.load().await?;
        let result = self.deploy(desired, &mut state).await;
        let saved = store.save(&state).await;
        let report = result?;
        saved?;
        Ok(report)
    }

    /// Loads the state from `store`, removes, and clears the store on success.
    pub async fn remove_stored(&self, store: &dyn StateStore) -> Result<RemoveReport> {
        let mut state = store.load().await?;
        let report = self.remove(&mut state).await?;
        if report.removed {
            store.clear().await?;
        }
        Ok(report)
    }

    fn emit(&self, event: DeployEvent) {
        self.events.emit(&event);
    }

    async fn checkpoint(&self, state: &ConvergedState) -> Result<()> {
        if let Some(store) = &self.checkpoint {
            store.save(state).await?;
        }
        Ok(())
    }

    async fn clear_checkpoint(&self) -> Result<()> {
        if let Some(store) = &self.checkpoint {
            store.clear().await?;
        }
        Ok(())
    }
}
