mod common;

use std::sync::Arc;

use common::{Call, Harness, MockClient, SCHEMA, path_str, source_dir};
use graphdeploy_core::{
    ConvergedState, DeployError, DeployEvent, DesiredState, FileStateStore, MemoryStateStore,
    ResourceKind, StateStore,
};
use serde_json::json;
use tempfile::TempDir;

#[tokio::test]
async fn remove_of_empty_state_is_a_no_op() {
    let harness = Harness::new();
    let mut state = ConvergedState::default();

    let report = harness.reconciler.remove(&mut state).await.unwrap();

    assert!(!report.removed);
    assert!(harness.client.calls().is_empty());
    assert_eq!(harness.events.events(), vec![DeployEvent::NothingToRemove]);
}

#[tokio::test]
async fn remove_tears_down_every_recorded_resource() {
    let harness = Harness::new();
    let mut state = ConvergedState::default();
    harness
        .reconciler
        .deploy(
            &DesiredState::new("graphql-app").with_domain("api.example.com"),
            &mut state,
        )
        .await
        .unwrap();
    let name = state.name.clone().unwrap();
    let api_id = state.api_id.clone().unwrap();
    harness.client.take_calls();

    let report = harness.reconciler.remove(&mut state).await.unwrap();

    assert!(report.removed);
    assert_eq!(
        report.resources,
        vec![
            ResourceKind::Role,
            ResourceKind::Function,
            ResourceKind::Api,
            ResourceKind::Distribution,
        ]
    );

    let calls = harness.client.calls();
    assert_eq!(calls.len(), 4);
    assert!(calls.contains(&Call::RemoveRole(name.clone())));
    assert!(calls.contains(&Call::RemoveFunction(name)));
    assert!(calls.contains(&Call::RemoveApi(api_id)));
    assert!(calls.iter().any(|call| matches!(
        call,
        Call::RemoveDistribution(request) if request.domain == "api.example.com"
    )));
    assert!(state.is_empty());
    assert!(matches!(
        harness.events.events().last(),
        Some(DeployEvent::Removed { .. })
    ));
}

#[tokio::test]
async fn remove_leaves_adopted_api_alone() {
    let harness = Harness::new();
    let src = source_dir(&[("schema.graphql", SCHEMA)]);
    let mut state = ConvergedState::default();
    harness
        .reconciler
        .deploy(
            &DesiredState::new("blog")
                .with_src(path_str(&src))
                .with_api_id("ext-1")
                .with_resolver_type("Query", json!({ "post": { "request": "{}" } })),
            &mut state,
        )
        .await
        .unwrap();
    harness.client.take_calls();

    let report = harness.reconciler.remove(&mut state).await.unwrap();

    assert_eq!(
        report.resources,
        vec![ResourceKind::Role, ResourceKind::Function]
    );
    assert!(
        !harness
            .client
            .calls()
            .iter()
            .any(|call| matches!(call, Call::RemoveApi(_)))
    );
}

#[tokio::test]
async fn remove_tears_down_function_even_when_none_was_recorded() {
    let harness = Harness::new();
    let src = source_dir(&[("schema.graphql", SCHEMA)]);
    let mut state = ConvergedState::default();
    harness
        .reconciler
        .deploy(
            &DesiredState::new("blog")
                .with_src(path_str(&src))
                .with_resolver_type("Query", json!({ "post": { "request": "{}" } })),
            &mut state,
        )
        .await
        .unwrap();
    assert!(!state.function_deployed);
    let name = state.name.clone().unwrap();
    let api_id = state.api_id.clone().unwrap();
    harness.client.take_calls();

    let report = harness.reconciler.remove(&mut state).await.unwrap();

    assert_eq!(
        report.resources,
        vec![ResourceKind::Role, ResourceKind::Function, ResourceKind::Api]
    );
    let calls = harness.client.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.contains(&Call::RemoveRole(name.clone())));
    assert!(calls.contains(&Call::RemoveFunction(name)));
    assert!(calls.contains(&Call::RemoveApi(api_id)));
}

#[tokio::test]
async fn remove_then_redeploy_creates_a_new_deployment() {
    let harness = Harness::new();
    let desired = DesiredState::new("graphql-app");
    let mut state = ConvergedState::default();

    harness.reconciler.deploy(&desired, &mut state).await.unwrap();
    let first_name = state.name.clone();
    let first_api = state.api_id.clone();
    harness.reconciler.remove(&mut state).await.unwrap();
    harness.client.take_calls();

    harness.reconciler.deploy(&desired, &mut state).await.unwrap();

    assert_ne!(state.name, first_name);
    assert_ne!(state.api_id, first_api);
    assert!(harness.client.calls().iter().any(|call| matches!(
        call,
        Call::DeployApi(request) if request.api_id.is_none()
    )));
    assert!(
        harness
            .client
            .calls()
            .iter()
            .any(|call| matches!(call, Call::DeploySchema(_)))
    );
}

#[tokio::test]
async fn failed_teardown_keeps_state() {
    let harness = Harness::new();
    let mut state = ConvergedState::default();
    harness
        .reconciler
        .deploy(&DesiredState::new("graphql-app"), &mut state)
        .await
        .unwrap();
    let before = state.clone();

    harness.client.fail_on(ResourceKind::Function, "remove");
    harness.client.fail_on(ResourceKind::Api, "remove");
    harness.client.take_calls();

    let err = harness.reconciler.remove(&mut state).await.unwrap_err();

    // Every call was dispatched even though two failed.
    assert_eq!(harness.client.calls().len(), 3);
    assert!(matches!(
        &err,
        DeployError::Provider(e) if e.kind == ResourceKind::Function
    ));
    assert_eq!(state, before);

    let failures: Vec<ResourceKind> = harness
        .events
        .events()
        .into_iter()
        .filter_map(|event| match event {
            DeployEvent::RemoveFailed { kind, .. } => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(failures, vec![ResourceKind::Function, ResourceKind::Api]);

    harness.client.heal();
    let report = harness.reconciler.remove(&mut state).await.unwrap();
    assert!(report.removed);
    assert!(state.is_empty());
}

#[tokio::test]
async fn remove_requires_credentials() {
    let harness = Harness::with_client(MockClient::without_credentials());
    let mut state = ConvergedState {
        name: Some("graphql-app-abcd1234".into()),
        ..Default::default()
    };

    let err = harness.reconciler.remove(&mut state).await.unwrap_err();

    assert!(matches!(err, DeployError::CredentialsMissing));
    assert!(!state.is_empty());
}

#[tokio::test]
async fn stored_remove_clears_file_state() {
    let dir = TempDir::new().unwrap();
    let store = FileStateStore::new(dir.path().join("state.json"));
    let harness = Harness::new();

    harness
        .reconciler
        .deploy_stored(&DesiredState::new("graphql-app"), &store)
        .await
        .unwrap();
    assert!(store.path().exists());

    let report = harness.reconciler.remove_stored(&store).await.unwrap();

    assert!(report.removed);
    assert!(!store.path().exists());
    assert!(store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn checkpoint_store_is_cleared_after_remove() {
    let store = Arc::new(MemoryStateStore::new());
    let Harness {
        reconciler,
        stage: _stage,
        ..
    } = Harness::new();
    let reconciler = reconciler.with_checkpoint(store.clone());

    let mut state = ConvergedState::default();
    reconciler
        .deploy(&DesiredState::new("graphql-app"), &mut state)
        .await
        .unwrap();
    assert!(!store.snapshot().await.is_empty());

    reconciler.remove(&mut state).await.unwrap();
    assert!(store.snapshot().await.is_empty());
}
