//! Converged state persistence.
//!
//! A store holds the [`ConvergedState`] of exactly one deployment. It is
//! read once when a run starts and written after the run, or after every
//! step when the reconciler checkpoints.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::model::ConvergedState;

/// Errors that can occur while loading or saving state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt state document {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StateError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Persistent record of one deployment's converged state.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the stored state; a store that was never written yields the
    /// empty state.
    async fn load(&self) -> Result<ConvergedState, StateError>;

    /// Replaces the stored state.
    async fn save(&self, state: &ConvergedState) -> Result<(), StateError>;

    /// Resets the store to the empty state.
    async fn clear(&self) -> Result<(), StateError>;
}

/// Shared state store handle.
pub type DynStateStore = Arc<dyn StateStore>;

/// In-memory state store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: RwLock<ConvergedState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: ConvergedState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Returns a copy of the stored state.
    pub async fn snapshot(&self) -> ConvergedState {
        self.state.read().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<ConvergedState, StateError> {
        Ok(self.state.read().await.clone())
    }

    async fn save(&self, state: &ConvergedState) -> Result<(), StateError> {
        *self.state.write().await = state.clone();
        Ok(())
    }

    async fn clear(&self) -> Result<(), StateError> {
        self.state.write().await.clear();
        Ok(())
    }
}

/// JSON file state store.
///
/// Writes go to a sibling `.tmp` file which is then renamed over the target,
/// so a crash mid-write leaves the previous document intact.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<ConvergedState, StateError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file, starting empty");
                return Ok(ConvergedState::default());
            }
            Err(e) => return Err(StateError::io(&self.path, e)),
        };
        if raw.trim().is_empty() {
            return Ok(ConvergedState::default());
        }
        serde_json::from_str(&raw).map_err(|source| StateError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn save(&self, state: &ConvergedState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StateError::io(parent, e))?;
        }
        let contents = serde_json::to_string_pretty(state)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, contents)
            .await
            .map_err(|e| StateError::io(&temp, e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| StateError::io(&self.path, e))
    }

    async fn clear(&self) -> Result<(), StateError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StateError::io(&self.path, e)),
        }
    }
}
