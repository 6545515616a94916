//! Deploy-assets command implementation
//!
//! Uploads the files of `assets-dir` to the assets bucket of an already
//! deployed stage. The bucket name is read from the stage's outputs, so the
//! stage must have been deployed once.

use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use routestack::orchestrator;
use routestack::output::{emoji, OutputConfig};

use super::{AwsArgs, TargetArgs};

/// Upload static assets of a deployed stage
#[derive(Args, Debug)]
pub struct DeployAssetsArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub aws: AwsArgs,
}

/// Execute the `deploy-assets` command.
pub fn execute(args: DeployAssetsArgs, output: &OutputConfig) -> Result<()> {
    let start_time = Instant::now();
    let (config, project_dir) = args.target.load()?;
    let aws = args.aws.client();

    let bar = ProgressBar::new_spinner().with_style(ProgressStyle::default_spinner());
    bar.enable_steady_tick(Duration::from_millis(120));
    let result = orchestrator::deploy_assets(
        &aws,
        &aws,
        &config,
        &project_dir,
        &args.target.stage,
        |asset| bar.set_message(asset.key.clone()),
    );
    bar.finish_and_clear();
    let count = result?;

    println!(
        "{} Uploaded {} asset{} for {} in {:.2}s",
        emoji(output, "✅", "[OK]"),
        count,
        if count == 1 { "" } else { "s" },
        args.target.stack_name(&config),
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}
