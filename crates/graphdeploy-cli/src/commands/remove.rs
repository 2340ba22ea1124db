use anyhow::Result;

use super::Project;
use crate::cli::OutputFormat;
use crate::output::{print_success, print_value};

pub async fn remove(project: &Project, format: OutputFormat) -> Result<()> {
    let reconciler = project.reconciler().await?;
    let report = reconciler.remove_stored(&project.state_store()).await?;

    if format == OutputFormat::Table {
        if report.removed {
            print_success(&format!("Removed {} resources", report.resources.len()));
        } else {
            print_success("Nothing to remove");
        }
        return Ok(());
    }
    print_value(&serde_json::to_value(&report)?, format)
}
