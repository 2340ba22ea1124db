//! Source bundle acquisition and packaging.
//!
//! The reconciler reads everything it needs from a [`WorkingDir`] produced by
//! a [`SourceProvider`]. [`LocalSourceProvider`] implements the provider over
//! the local filesystem: directory sources are copied into a per-deployment
//! staging directory so that injecting the handler never touches the
//! caller's tree.

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{DeployError, Result};
use crate::resolver::{ModuleExports, RESOLVER_MANIFEST};

/// Schema document expected at the root of a source bundle.
pub const SCHEMA_FILE: &str = "schema.graphql";

/// Handler descriptor written into bundles that ship a compute function.
pub const HANDLER_FILE: &str = "handler.json";

/// Entry point of the injected dispatch handler.
pub const HANDLER_ENTRY: &str = "handler.dispatch";

/// Files of the bundled default application.
pub const SKELETON: [(&str, &str); 3] = [
    (SCHEMA_FILE, include_str!("../skeleton/schema.graphql")),
    (RESOLVER_MANIFEST, include_str!("../skeleton/resolvers.json")),
    ("graphdeploy.toml", include_str!("../skeleton/graphdeploy.toml")),
];

/// Root directory of an unpacked source bundle.
///
/// File access goes through [`WorkingDir::resolve`], which refuses absolute
/// paths and paths that climb out of the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDir {
    root: PathBuf,
}

impl WorkingDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `relative` inside the root, or `None` if it would escape.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Option<PathBuf> {
        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in relative.as_ref().components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        return None;
                    }
                    resolved.pop();
                    depth -= 1;
                }
                Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(resolved)
    }

    /// Returns `true` if `relative` names an existing file inside the root.
    pub async fn exists(&self, relative: impl AsRef<Path>) -> bool {
        match self.resolve(relative) {
            Some(path) => tokio::fs::metadata(path)
                .await
                .map(|meta| meta.is_file())
                .unwrap_or(false),
            None => false,
        }
    }

    pub async fn read_to_string(&self, relative: impl AsRef<Path>) -> io::Result<String> {
        let relative = relative.as_ref();
        let path = self.resolve(relative).ok_or_else(|| escape_error(relative))?;
        tokio::fs::read_to_string(path).await
    }

    pub async fn write(&self, relative: impl AsRef<Path>, contents: &str) -> io::Result<()> {
        let relative = relative.as_ref();
        let path = self.resolve(relative).ok_or_else(|| escape_error(relative))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await
    }
}

fn escape_error(relative: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("{} is outside the working directory", relative.display()),
    )
}

/// Source bundle collaborator.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Produces a working directory for `src`, or an empty one when `src` is
    /// `None`. `deployment` is the stable logical name.
    async fn unpack(&self, deployment: &str, src: Option<&str>) -> Result<WorkingDir>;

    /// Writes an injected dispatch handler into `dir` and returns its entry point.
    async fn install_handler(&self, dir: &WorkingDir) -> Result<String>;

    /// Packages `dir` and returns the bundle reference.
    async fn pack(&self, dir: &WorkingDir) -> Result<PathBuf>;

    /// Writes the bundled default application into `dir`.
    async fn materialize_skeleton(&self, dir: &WorkingDir) -> Result<()> {
        for (name, contents) in SKELETON {
            dir.write(name, contents).await?;
        }
        Ok(())
    }

    /// Reads the code resolver manifest, `None` if the bundle has none.
    async fn resolver_exports(&self, dir: &WorkingDir) -> Result<Option<ModuleExports>> {
        if !dir.exists(RESOLVER_MANIFEST).await {
            return Ok(None);
        }
        let raw = dir.read_to_string(RESOLVER_MANIFEST).await?;
        let manifest: Value = serde_json::from_str(&raw).map_err(|e| {
            DeployError::source_error(format!("{RESOLVER_MANIFEST} is not valid JSON: {e}"))
        })?;
        Ok(Some(ModuleExports::from_manifest(&manifest)))
    }
}

/// Filesystem source provider staging bundles under one root directory.
#[derive(Debug, Clone)]
pub struct LocalSourceProvider {
    stage_root: PathBuf,
}

impl LocalSourceProvider {
    pub fn new(stage_root: impl Into<PathBuf>) -> Self {
        Self {
            stage_root: stage_root.into(),
        }
    }

    pub fn stage_root(&self) -> &Path {
        &self.stage_root
    }
}

#[async_trait]
impl SourceProvider for LocalSourceProvider {
    async fn unpack(&self, deployment: &str, src: Option<&str>) -> Result<WorkingDir> {
        let target = self.stage_root.join(deployment);
        if tokio::fs::metadata(&target).await.is_ok() {
            tokio::fs::remove_dir_all(&target).await?;
        }
        tokio::fs::create_dir_all(&target).await?;

        if let Some(src) = src {
            let source = PathBuf::from(src);
            let meta = tokio::fs::metadata(&source).await.map_err(|e| {
                DeployError::source_error(format!("cannot read source {src}: {e}"))
            })?;
            if !meta.is_dir() {
                return Err(DeployError::source_error(format!(
                    "source {src} must be a directory"
                )));
            }
            // The stage may live inside the source, as with `src = "."`.
            let stage_root = tokio::fs::canonicalize(&self.stage_root).await?;
            copy_tree(&source, &target, &stage_root).await?;
            debug!(src, target = %target.display(), "Staged source bundle");
        }

        Ok(WorkingDir::new(target))
    }

    async fn install_handler(&self, dir: &WorkingDir) -> Result<String> {
        let descriptor = serde_json::json!({
            "entry": HANDLER_ENTRY,
            "manifest": RESOLVER_MANIFEST,
        });
        let contents = serde_json::to_string_pretty(&descriptor)
            .map_err(|e| DeployError::source_error(e.to_string()))?;
        dir.write(HANDLER_FILE, &contents).await?;
        Ok(HANDLER_ENTRY.to_string())
    }

    async fn pack(&self, dir: &WorkingDir) -> Result<PathBuf> {
        // Bundles are handed to the client as staged directories.
        Ok(dir.root().to_path_buf())
    }
}

/// Copies `from` into `to`, leaving out the `exclude` directory (canonical).
async fn copy_tree(from: &Path, to: &Path, exclude: &Path) -> io::Result<()> {
    let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];
    while let Some((src_dir, dst_dir)) = pending.pop() {
        tokio::fs::create_dir_all(&dst_dir).await?;
        let mut entries = tokio::fs::read_dir(&src_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let dst = dst_dir.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                if tokio::fs::canonicalize(entry.path()).await? == exclude {
                    continue;
                }
                pending.push((entry.path(), dst));
            } else {
                tokio::fs::copy(entry.path(), dst).await?;
            }
        }
    }
    Ok(())
}
