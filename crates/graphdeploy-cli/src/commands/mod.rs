pub mod deploy;
pub mod init;
pub mod remove;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use graphdeploy_core::{
    DeployEvent, DesiredState, EventSink, FileStateStore, LocalSourceProvider, Reconciler,
    TracingSink,
};
use graphdeploy_sandbox::SandboxClient;
use tracing::debug;

use crate::config::{DEFAULT_CONFIG_FILE, ProjectConfig, load_config};
use crate::output::print_warning;

/// A loaded project: its config and the paths derived from it.
#[derive(Debug, Clone)]
pub struct Project {
    pub config: ProjectConfig,
    /// Directory holding the config file; relative paths resolve against it.
    pub root: PathBuf,
    pub state_path: PathBuf,
    pub ledger_path: PathBuf,
    pub stage_dir: PathBuf,
}

impl Project {
    pub fn load(config_path: Option<&Path>, stage_dir: &Path) -> Result<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let config = load_config(Some(&path)).map_err(anyhow::Error::msg)?;
        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(Self {
            state_path: root.join(&config.state.path),
            ledger_path: root.join(&config.sandbox.ledger),
            stage_dir: root.join(stage_dir),
            root,
            config,
        })
    }

    pub fn desired(&self) -> DesiredState {
        self.config.deployment.to_desired(&self.root)
    }

    pub fn state_store(&self) -> FileStateStore {
        FileStateStore::new(&self.state_path)
    }

    /// Opens the sandbox ledger and wires a reconciler that checkpoints into
    /// the project's state file.
    pub async fn reconciler(&self) -> Result<Reconciler> {
        debug!(
            ledger = %self.ledger_path.display(),
            state = %self.state_path.display(),
            stage = %self.stage_dir.display(),
            "Opening sandbox provider"
        );
        let client = Arc::new(
            SandboxClient::open(&self.ledger_path)
                .await
                .with_context(|| format!("opening ledger {}", self.ledger_path.display()))?,
        );
        let reconciler = Reconciler::new(
            client,
            Arc::new(LocalSourceProvider::new(&self.stage_dir)),
        )
        .with_events(Arc::new(ConsoleSink))
        .with_checkpoint(Arc::new(self.state_store()));
        Ok(reconciler)
    }
}

/// Logs every event and repeats warnings on the terminal.
struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&self, event: &DeployEvent) {
        TracingSink.emit(event);
        if let DeployEvent::Warning { message, .. } = event {
            print_warning(message);
        }
    }
}
