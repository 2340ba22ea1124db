use std::path::PathBuf;

use graphdeploy_core::{ProviderError, ResourceKind};

/// Errors opening or writing the sandbox ledger.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("IO error on ledger {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt sandbox ledger {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub(crate) fn not_found(kind: ResourceKind, operation: &str, what: impl std::fmt::Display) -> ProviderError {
    ProviderError::new(kind, operation, format!("{what} does not exist"))
}

pub(crate) fn invalid(kind: ResourceKind, operation: &str, message: impl Into<String>) -> ProviderError {
    ProviderError::new(kind, operation, message)
}

pub(crate) fn persist_failed(kind: ResourceKind, operation: &str, err: SandboxError) -> ProviderError {
    ProviderError::new(kind, operation, err.to_string())
}
