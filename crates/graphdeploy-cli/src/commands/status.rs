use anyhow::Result;
use graphdeploy_core::StateStore;

use super::Project;
use crate::cli::OutputFormat;
use crate::output::{print_success, print_value};

pub async fn status(project: &Project, format: OutputFormat) -> Result<()> {
    let state = project.state_store().load().await?;
    if state.is_empty() && format == OutputFormat::Table {
        print_success("Nothing deployed");
        return Ok(());
    }
    print_value(&serde_json::to_value(&state)?, format)
}
