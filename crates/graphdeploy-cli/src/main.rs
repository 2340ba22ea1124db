use anyhow::Result;
use clap::Parser;

use graphdeploy_cli::cli::{Cli, Commands};
use graphdeploy_cli::commands::{self, Project};
use graphdeploy_cli::observability::{init_tracing, init_tracing_with_level};
use graphdeploy_cli::output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();

    if let Commands::Init(args) = &cli.command {
        init_tracing();
        commands::init::init(&args.dir, args.force)?;
        return Ok(());
    }

    let project = Project::load(cli.config.as_deref(), &cli.stage_dir)?;
    init_tracing_with_level(&project.config.logging.level);

    match &cli.command {
        Commands::Deploy => commands::deploy::deploy(&project, format).await?,
        Commands::Remove => commands::remove::remove(&project, format).await?,
        Commands::Status => commands::status::status(&project, format).await?,
        Commands::Init(_) => {}
    }
    Ok(())
}
