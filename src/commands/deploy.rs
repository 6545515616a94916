//! # Deploy Command Implementation
//!
//! This module implements the `deploy` subcommand, which runs the complete
//! deployment pipeline for one stage.
//!
//! ## Functionality
//!
//! - **Partial Uploads**: `--function-name` uploads one function and reuses the
//!   stored bundles of all others; `--skip-upload` reuses every bundle
//! - **Build Artifacts**: `--artifacts` reads the manifest of bundles uploaded
//!   by the build pipeline
//! - **Destructive Updates**: `--danger-delete-resources` lifts the stack
//!   policy for this update only, after a confirmation prompt
//! - **Non-interactive Mode**: Skip prompts with --yes for automation

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Confirm};

use routestack::artifacts::SkipPolicy;
use routestack::converge::{ConvergeAction, ThreadSleeper};
use routestack::orchestrator::{DeployOutcome, DeployRequest, Deployer};
use routestack::output::{emoji, OutputConfig};

use super::{check_function_name, load_manifest, AwsArgs, StatusSpinner, TargetArgs};

/// Deploy a stage
#[derive(Args, Debug)]
pub struct DeployArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub aws: AwsArgs,

    /// Upload only this function; all others reuse their stored bundles
    #[arg(short, long, value_name = "NAME")]
    pub function_name: Option<String>,

    /// Reuse the stored bundle of every function
    #[arg(long)]
    pub skip_upload: bool,

    /// Allow updates that replace or delete protected resources
    #[arg(long)]
    pub danger_delete_resources: bool,

    /// Artifacts manifest written by the build pipeline
    #[arg(long, value_name = "FILE")]
    pub artifacts: Option<PathBuf>,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Execute the `deploy` command.
pub fn execute(args: DeployArgs, output: &OutputConfig) -> Result<()> {
    let start_time = Instant::now();
    let (config, project_dir) = args.target.load()?;
    if let Some(name) = &args.function_name {
        check_function_name(&config, name)?;
    }
    let uploaded = load_manifest(args.artifacts.as_deref())?;
    let stack_name = args.target.stack_name(&config);

    if args.danger_delete_resources && !args.yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Allow {} to replace or delete protected resources such as buckets and distributions?",
                stack_name
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted. Nothing was deployed.");
            return Ok(());
        }
    }

    println!(
        "{} Deploying {} (stage {})",
        emoji(output, "🚀", "[DEPLOY]"),
        stack_name,
        args.target.stage
    );

    let aws = args.aws.client();
    let spinner = StatusSpinner::default();
    let request = DeployRequest {
        config: &config,
        project_dir: &project_dir,
        stage_name: &args.target.stage,
        skip: SkipPolicy {
            skip_all: args.skip_upload,
            only_function: args.function_name.clone(),
        },
        uploaded,
        allow_destructive: args.danger_delete_resources,
    };
    let outcome = Deployer::new(&aws, &aws, &ThreadSleeper)
        .with_observer(&spinner)
        .deploy(&request)?;

    print_outcome(output, &outcome);
    println!("   Finished in {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

fn print_outcome(output: &OutputConfig, outcome: &DeployOutcome) {
    let verb = match outcome.action {
        ConvergeAction::Created => "Created",
        ConvergeAction::Updated => "Updated",
        ConvergeAction::NoChanges => "No changes to",
    };
    println!("{} {} {}", emoji(output, "✅", "[OK]"), verb, outcome.stack_name);

    for change in &outcome.changes {
        let replacement = match change.replacement.as_deref() {
            Some("True") => " (replacement)",
            _ => "",
        };
        println!(
            "   {} {} {}{}",
            change.action, change.logical_resource_id, change.resource_type, replacement
        );
    }

    for endpoint in &outcome.endpoints {
        println!("{} {}", emoji(output, "🌐", "[URL]"), endpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routestack::config::DEFAULT_STAGE;
    use tempfile::TempDir;

    fn args(config: PathBuf) -> DeployArgs {
        DeployArgs {
            target: TargetArgs {
                config,
                stage: DEFAULT_STAGE.to_string(),
            },
            aws: AwsArgs {
                region: None,
                profile: None,
            },
            function_name: None,
            skip_upload: false,
            danger_delete_resources: false,
            artifacts: None,
            yes: true,
        }
    }

    #[test]
    fn test_execute_missing_config() {
        let result = execute(
            args(PathBuf::from("/nonexistent/routestack.yaml")),
            &OutputConfig { use_color: false },
        );
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Configuration file not found"));
    }

    #[test]
    fn test_execute_unknown_function_name() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("routestack.yaml");
        std::fs::write(&config_path, "app: shop\nfunctions:\n  - name: index\n    path: \"\"\n")
            .unwrap();

        let mut deploy_args = args(config_path);
        deploy_args.function_name = Some("indx".to_string());
        let message = execute(deploy_args, &OutputConfig { use_color: false })
            .unwrap_err()
            .to_string();
        assert!(message.contains("Unknown function: indx"));
        assert!(message.contains("Did you mean 'index'?"));
    }

    #[test]
    fn test_execute_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("routestack.yaml");
        std::fs::write(&config_path, "app: shop\nfunctions:\n  - name: index\n    path: /users\n")
            .unwrap();

        let error = execute(args(config_path), &OutputConfig { use_color: false }).unwrap_err();
        assert!(error.downcast_ref::<routestack::error::Error>().is_some());
    }
}
