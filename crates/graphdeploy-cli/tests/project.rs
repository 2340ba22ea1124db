use std::path::Path;

use graphdeploy_cli::cli::OutputFormat;
use graphdeploy_cli::commands::{self, Project};
use graphdeploy_cli::config::load_config;
use graphdeploy_core::{AuthMode, ResolverDefinition, SourcePolicy, StateStore};
use graphdeploy_sandbox::SandboxClient;
use tempfile::TempDir;

const PROJECT: &str = r#"
[deployment]
name = "blog"
region = "eu-west-1"
auth = "apiKey"
memory = 512
source_policy = "allowSkeleton"

[deployment.env]
TABLE = "posts"

[deployment.resolvers.Query.getPost]
request = "{ \"version\": \"2018-05-29\" }"

[[deployment.policy]]
Action = "s3:GetObject"
Resource = "*"

[deployment.policy.Condition.Bool]
"aws:SecureTransport" = "true"

[logging]
level = "debug"
"#;

fn write_project(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("graphdeploy.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn config_file_is_loaded_and_validated() {
    let dir = TempDir::new().unwrap();
    let path = write_project(dir.path(), PROJECT);

    let cfg = load_config(Some(&path)).unwrap();
    assert_eq!(cfg.deployment.name, "blog");
    assert_eq!(cfg.deployment.region, "eu-west-1");
    assert_eq!(cfg.deployment.auth, Some(AuthMode::ApiKey));
    assert_eq!(cfg.deployment.memory, Some(512));
    assert_eq!(cfg.deployment.source_policy, SourcePolicy::AllowSkeleton);
    assert_eq!(cfg.deployment.env.get("TABLE").map(String::as_str), Some("posts"));
    assert_eq!(cfg.logging.level, "debug");

    let query = cfg.deployment.resolvers.get("Query").unwrap();
    assert!(query.get("getPost").is_some());

    let statement = &cfg.deployment.policy[0];
    assert_eq!(statement.action, vec!["s3:GetObject".to_string()]);
    assert_eq!(statement.resource, vec!["*".to_string()]);
    assert_eq!(
        statement.extra.get("Condition"),
        Some(&serde_json::json!({ "Bool": { "aws:SecureTransport": "true" } }))
    );
}

#[test]
fn missing_and_invalid_configs_are_rejected() {
    let dir = TempDir::new().unwrap();
    let err = load_config(Some(&dir.path().join("graphdeploy.toml"))).unwrap_err();
    assert!(err.contains("graphdeploy init"));

    let path = write_project(dir.path(), "[deployment]\nname = \"blog\"\ntimeout = 0\n");
    let err = load_config(Some(&path)).unwrap_err();
    assert_eq!(err, "deployment.timeout must be between 1 and 900");
}

#[test]
fn project_paths_resolve_against_the_config_directory() {
    let dir = TempDir::new().unwrap();
    let path = write_project(
        dir.path(),
        "[deployment]\nname = \"blog\"\nsrc = \"app\"\n\n[state]\npath = \"out/state.json\"\n",
    );

    let project = Project::load(Some(&path), Path::new(".graphdeploy/stage")).unwrap();
    assert_eq!(project.state_path, dir.path().join("out/state.json"));
    assert_eq!(project.ledger_path, dir.path().join(".graphdeploy/sandbox.json"));
    assert_eq!(project.stage_dir, dir.path().join(".graphdeploy/stage"));

    let desired = project.desired();
    let expected = dir.path().join("app");
    assert_eq!(desired.src.as_deref(), expected.to_str());
}

#[test]
fn init_writes_the_default_application_once() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("app");

    let written = commands::init::init(&target, false).unwrap();
    assert_eq!(written.len(), 3);
    assert!(target.join("schema.graphql").exists());
    assert!(target.join("resolvers.json").exists());
    assert!(target.join("graphdeploy.toml").exists());

    let err = commands::init::init(&target, false).unwrap_err();
    assert!(err.to_string().contains("--force"));
    assert!(commands::init::init(&target, true).is_ok());

    // The generated config is itself loadable.
    assert!(load_config(Some(&target.join("graphdeploy.toml"))).is_ok());
}

#[tokio::test]
async fn deploy_and_remove_through_the_sandbox() {
    let dir = TempDir::new().unwrap();
    let path = write_project(dir.path(), PROJECT);
    let project = Project::load(Some(&path), Path::new(".graphdeploy/stage")).unwrap();

    commands::deploy::deploy(&project, OutputFormat::Json)
        .await
        .unwrap();

    let state = project.state_store().load().await.unwrap();
    let name = state.name.clone().unwrap();
    assert!(name.starts_with("blog-"));
    assert_eq!(state.region.as_deref(), Some("eu-west-1"));
    assert!(state.api_key.is_some());

    let ledger = SandboxClient::open(&project.ledger_path)
        .await
        .unwrap()
        .snapshot()
        .await;
    let function = ledger.function("eu-west-1", &name).unwrap();
    assert_eq!(function.memory, Some(512));
    let api = ledger
        .api("eu-west-1", state.api_id.as_deref().unwrap())
        .unwrap();
    assert!(matches!(
        api.resolvers.get("Query", "getPost"),
        Some(ResolverDefinition::Template { .. })
    ));
    assert_eq!(
        api.resolvers.get("Query", "hello"),
        Some(&ResolverDefinition::delegate(name.as_str()))
    );

    commands::status::status(&project, OutputFormat::Json)
        .await
        .unwrap();

    commands::remove::remove(&project, OutputFormat::Table)
        .await
        .unwrap();
    assert!(!project.state_path.exists());
    let ledger = SandboxClient::open(&project.ledger_path)
        .await
        .unwrap()
        .snapshot()
        .await;
    assert!(ledger.is_empty());
}
