use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "graphdeploy")]
#[command(about = "Deploy and remove GraphQL backends")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project config file (defaults to ./graphdeploy.toml)
    #[arg(short, long, global = true, env = "GRAPHDEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory where source bundles are staged, relative to the project
    #[arg(long, global = true, default_value = ".graphdeploy/stage")]
    pub stage_dir: PathBuf,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Toml,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy or update the backend described by the project config
    Deploy,
    /// Remove every resource created by previous deploys
    Remove,
    /// Show the recorded state of the deployment
    Status,
    /// Write the default application into a directory
    Init(InitArgs),
}

#[derive(clap::Args)]
pub struct InitArgs {
    /// Target directory
    #[arg(default_value = ".")]
    pub dir: PathBuf,
    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["graphdeploy", "deploy", "-f", "table"]).unwrap();
        assert!(matches!(cli.command, Commands::Deploy));
        assert_eq!(cli.format, Some(OutputFormat::Table));
        assert_eq!(cli.stage_dir, PathBuf::from(".graphdeploy/stage"));
    }
}
