use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use graphdeploy_core::source::SKELETON;

use crate::output::print_success;

/// Writes the default application into `dir`, returning the files written.
///
/// Refuses to touch a directory that already holds one of the files unless
/// `force` is set.
pub fn init(dir: &Path, force: bool) -> Result<Vec<PathBuf>> {
    let targets: Vec<(PathBuf, &str)> = SKELETON
        .iter()
        .map(|(name, contents)| (dir.join(name), *contents))
        .collect();

    if !force
        && let Some((existing, _)) = targets.iter().find(|(path, _)| path.exists())
    {
        bail!(
            "{} already exists; pass --force to overwrite",
            existing.display()
        );
    }

    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut written = Vec::with_capacity(targets.len());
    for (path, contents) in targets {
        std::fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
        print_success(&format!("Created {}", path.display()));
        written.push(path);
    }
    Ok(written)
}
