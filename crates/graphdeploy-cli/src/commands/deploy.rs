use anyhow::Result;

use super::Project;
use crate::cli::OutputFormat;
use crate::output::{print_success, print_value};

pub async fn deploy(project: &Project, format: OutputFormat) -> Result<()> {
    let desired = project.desired();
    let reconciler = project.reconciler().await?;
    let report = reconciler
        .deploy_stored(&desired, &project.state_store())
        .await?;

    if format == OutputFormat::Table {
        print_success(&format!(
            "Deployed \"{}\" to the \"{}\" region",
            report.output.name, desired.region
        ));
    }
    print_value(&serde_json::to_value(&report.output)?, format)
}
