//! # Template Command Implementation
//!
//! Renders the inner and outer documents of a stage to a directory without
//! contacting the cloud. Useful to review a composition or to feed it to
//! other tooling.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use routestack::orchestrator;
use routestack::output::{emoji, OutputConfig};

use super::{load_manifest, TargetArgs};

pub const INNER_FILE: &str = "inner.json";
pub const OUTER_FILE: &str = "outer.json";

/// Render the templates of a stage
#[derive(Args, Debug)]
pub struct TemplateArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Directory the documents are written to
    #[arg(short, long, value_name = "DIR", default_value = "routestack-out")]
    pub output: PathBuf,

    /// Artifacts manifest written by the build pipeline
    #[arg(long, value_name = "FILE")]
    pub artifacts: Option<PathBuf>,
}

/// Execute the `template` command.
pub fn execute(args: TemplateArgs, output: &OutputConfig) -> Result<()> {
    let (config, project_dir) = args.target.load()?;
    let uploaded = load_manifest(args.artifacts.as_deref())?;

    let composed = orchestrator::render(&config, &project_dir, &args.target.stage, &uploaded)?;

    fs::create_dir_all(&args.output)
        .with_context(|| format!("Cannot create {}", args.output.display()))?;
    for (file_name, document) in [(INNER_FILE, &composed.inner), (OUTER_FILE, &composed.outer)] {
        let path = args.output.join(file_name);
        fs::write(&path, serde_json::to_string_pretty(document)?)
            .with_context(|| format!("Cannot write {}", path.display()))?;
    }

    let resource_count = composed.inner["Resources"]
        .as_object()
        .map(|resources| resources.len())
        .unwrap_or(0);
    println!(
        "{} Rendered {} ({} resources, {} routes) to {}",
        emoji(output, "✅", "[OK]"),
        args.target.stack_name(&config),
        resource_count,
        composed.methods.len(),
        args.output.display()
    );
    Ok(())
}
