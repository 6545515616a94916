//! Describe command implementation
//!
//! Prints the status and outputs of a deployed stage. With `--json` only the
//! outputs are printed, as a JSON object, for use in scripts.

use anyhow::Result;
use clap::Args;
use console::style;

use routestack::orchestrator;
use routestack::output::{emoji, OutputConfig};

use super::{AwsArgs, TargetArgs};

/// Print the status and outputs of a deployed stage
#[derive(Args, Debug)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub aws: AwsArgs,

    /// Print the outputs as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the `describe` command.
pub fn execute(args: DescribeArgs, output: &OutputConfig) -> Result<()> {
    let (config, _) = args.target.load()?;
    let stack = orchestrator::describe_stage(&args.aws.client(), &config, &args.target.stage)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stack.outputs)?);
        return Ok(());
    }

    println!(
        "{} {} {}",
        emoji(output, "📦", "[STACK]"),
        style(&stack.name).bold(),
        stack.status
    );
    if let Some(reason) = &stack.status_reason {
        println!("   {}", reason);
    }
    if stack.mutation_locked {
        println!("   Protected resources are locked against replacement");
    }
    let width = stack.outputs.keys().map(String::len).max().unwrap_or(0);
    for (key, value) in &stack.outputs {
        println!("   {:<width$}  {}", key, value, width = width);
    }
    Ok(())
}
