//! Progress events emitted by the reconciler.
//!
//! Events are notifications only; nothing in the engine depends on how a
//! sink handles them.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::client::ResourceKind;
use crate::reconciler::DeployStep;

/// A structured progress event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeployEvent {
    /// A step is about to issue its mutating call.
    StepStarted {
        deployment: String,
        region: String,
        step: DeployStep,
        detail: String,
    },
    /// A step converged its resource.
    StepCompleted { deployment: String, step: DeployStep },
    /// A fingerprint gated step found nothing to do.
    StepSkipped {
        deployment: String,
        step: DeployStep,
        reason: String,
    },
    /// A recorded resource is no longer desired and is being torn down.
    Removing {
        deployment: String,
        region: String,
        kind: ResourceKind,
        target: String,
    },
    /// A teardown call failed during a remove run.
    RemoveFailed {
        deployment: String,
        kind: ResourceKind,
        error: String,
    },
    /// Something the caller should know about that does not stop the run.
    Warning { deployment: String, message: String },
    /// A deploy run finished.
    Deployed { deployment: String, region: String },
    /// A remove run finished and the state was cleared.
    Removed { deployment: String, region: String },
    /// Remove was requested for a state with nothing deployed.
    NothingToRemove,
}

/// Receiver for [`DeployEvent`]s.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DeployEvent);
}

/// Shared event sink handle.
pub type DynEventSink = Arc<dyn EventSink>;

/// Sink forwarding events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &DeployEvent) {
        match event {
            DeployEvent::StepStarted {
                deployment,
                region,
                step,
                detail,
            } => tracing::info!(%deployment, %region, step = %step, "{detail}"),
            DeployEvent::StepCompleted { deployment, step } => {
                tracing::debug!(%deployment, step = %step, "Step converged")
            }
            DeployEvent::StepSkipped {
                deployment,
                step,
                reason,
            } => tracing::info!(%deployment, step = %step, "Skipping: {reason}"),
            DeployEvent::Removing {
                deployment,
                region,
                kind,
                target,
            } => tracing::info!(
                %deployment,
                %region,
                kind = %kind,
                "Removing {kind} \"{target}\" from the \"{region}\" region"
            ),
            DeployEvent::RemoveFailed {
                deployment,
                kind,
                error,
            } => tracing::error!(%deployment, kind = %kind, %error, "Teardown failed"),
            DeployEvent::Warning {
                deployment,
                message,
            } => tracing::warn!(%deployment, "{message}"),
            DeployEvent::Deployed { deployment, region } => tracing::info!(
                %deployment,
                %region,
                "Successfully deployed \"{deployment}\" to the \"{region}\" region"
            ),
            DeployEvent::Removed { deployment, region } => tracing::info!(
                %deployment,
                %region,
                "Successfully removed \"{deployment}\" from the \"{region}\" region"
            ),
            DeployEvent::NothingToRemove => tracing::info!("State is empty, nothing to remove"),
        }
    }
}

/// Sink collecting events in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DeployEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the events recorded so far.
    pub fn events(&self) -> Vec<DeployEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &DeployEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
