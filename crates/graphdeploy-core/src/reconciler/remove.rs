use futures_util::future::{BoxFuture, join_all};
use tracing::debug;

use super::{Reconciler, RemoveReport};
use crate::client::{RemoveDistributionRequest, ResourceKind};
use crate::error::{DeployError, ProviderError, Result};
use crate::events::DeployEvent;
use crate::model::ConvergedState;

pub(super) async fn run(reconciler: &Reconciler, state: &mut ConvergedState) -> Result<RemoveReport> {
    let Some(name) = state.name.clone() else {
        reconciler.emit(DeployEvent::NothingToRemove);
        return Ok(RemoveReport::default());
    };
    if !reconciler.client.credentials_present() {
        return Err(DeployError::CredentialsMissing);
    }

    let region = state.region_or_default().to_string();
    let client = &reconciler.client;

    // Role and function are torn down whether or not a function was recorded.
    let mut targets: Vec<(ResourceKind, String)> = vec![
        (ResourceKind::Role, name.clone()),
        (ResourceKind::Function, name.clone()),
    ];
    let managed_api = state.api_id.clone().filter(|_| state.api_managed);
    if let Some(api_id) = &managed_api {
        targets.push((ResourceKind::Api, api_id.clone()));
    }
    if let Some(domain) = &state.domain {
        targets.push((ResourceKind::Distribution, domain.clone()));
    }

    for (kind, target) in &targets {
        reconciler.emit(DeployEvent::Removing {
            deployment: name.clone(),
            region: region.clone(),
            kind: *kind,
            target: target.clone(),
        });
    }

    let mut calls: Vec<BoxFuture<'_, std::result::Result<(), ProviderError>>> = Vec::new();
    calls.push(client.remove_role(&region, &name));
    calls.push(client.remove_function(&region, &name));
    if let Some(api_id) = &managed_api {
        calls.push(client.remove_api(&region, api_id));
    }
    if let Some(domain) = &state.domain {
        calls.push(client.remove_distribution(
            &region,
            RemoveDistributionRequest {
                distribution_id: state.distribution_id.clone(),
                domain: domain.clone(),
            },
        ));
    }

    let results = join_all(calls).await;

    let mut first_failure = None;
    for ((kind, _), result) in targets.iter().zip(results) {
        if let Err(e) = result {
            reconciler.emit(DeployEvent::RemoveFailed {
                deployment: name.clone(),
                kind: *kind,
                error: e.to_string(),
            });
            first_failure.get_or_insert(e);
        }
    }
    if let Some(e) = first_failure {
        return Err(e.into());
    }

    debug!(deployment = %name, resources = targets.len(), "All teardown calls succeeded");
    state.clear();
    reconciler.clear_checkpoint().await?;
    reconciler.emit(DeployEvent::Removed {
        deployment: name,
        region,
    });

    Ok(RemoveReport {
        removed: true,
        resources: targets.into_iter().map(|(kind, _)| kind).collect(),
    })
}
