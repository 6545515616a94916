//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use routestack::output::OutputConfig;

use crate::commands;

/// routestack - Deploy routed serverless functions as one converged stack
#[derive(Parser, Debug)]
#[command(name = "routestack")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deploy a stage: support stack, artifacts, template and main stack
    Deploy(commands::deploy::DeployArgs),

    /// Upload static assets to the assets bucket of a deployed stage
    DeployAssets(commands::deploy_assets::DeployAssetsArgs),

    /// Render the inner and outer documents without contacting the cloud
    Template(commands::template::TemplateArgs),

    /// Print the status and outputs of a deployed stage
    Describe(commands::describe::DescribeArgs),
}

impl Cli {
    pub fn output_config(&self) -> OutputConfig {
        OutputConfig::from_env_and_flag(&self.color)
    }

    /// Execute the CLI command
    pub fn execute(self, output: &OutputConfig) -> Result<()> {
        // RUST_LOG wins over --log-level when both are given.
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(self.log_level.as_str()),
        )
        .format_timestamp(None)
        .init();

        match self.command {
            Commands::Deploy(args) => commands::deploy::execute(args, output),
            Commands::DeployAssets(args) => commands::deploy_assets::execute(args, output),
            Commands::Template(args) => commands::template::execute(args, output),
            Commands::Describe(args) => commands::describe::execute(args, output),
        }
    }
}
