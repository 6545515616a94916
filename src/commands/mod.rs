//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `routestack` command-line tool. Each subcommand is defined in its own file
//! to keep the logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic.
//!
//! Argument groups shared by several commands ([`TargetArgs`], [`AwsArgs`])
//! and the progress spinner live here.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use routestack::artifacts::{self, CodeLocation};
use routestack::aws_cli::AwsCli;
use routestack::config::{self, Config, DEFAULT_CONFIG_FILE, DEFAULT_STAGE};
use routestack::converge::PollObserver;
use routestack::suggestions;

pub mod deploy;
pub mod deploy_assets;
pub mod describe;
pub mod template;

/// Which configuration file and stage a command works on.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Path to the routestack.yaml configuration file
    #[arg(short, long, value_name = "FILE", env = "ROUTESTACK_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Deployment stage
    #[arg(short, long, value_name = "STAGE", env = "ROUTESTACK_STAGE", default_value = DEFAULT_STAGE)]
    pub stage: String,
}

impl TargetArgs {
    /// Load and validate the configuration.
    ///
    /// Returns the configuration and the directory it lives in, which hook
    /// paths are relative to.
    pub fn load(&self) -> Result<(Config, PathBuf)> {
        if !self.config.exists() {
            return Err(suggestions::config_not_found(&self.config));
        }
        let config = config::from_file(&self.config)?;
        let project_dir = self
            .config
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok((config, project_dir))
    }

    pub fn stack_name(&self, config: &Config) -> String {
        config::stack_name(&config.app, &self.stage)
    }
}

/// Credentials selection forwarded to the `aws` command line.
#[derive(Args, Debug, Clone)]
pub struct AwsArgs {
    /// AWS region
    #[arg(long, value_name = "REGION", env = "AWS_REGION")]
    pub region: Option<String>,

    /// Named AWS profile
    #[arg(long, value_name = "PROFILE", env = "AWS_PROFILE")]
    pub profile: Option<String>,
}

impl AwsArgs {
    pub fn client(&self) -> AwsCli {
        AwsCli::new()
            .with_region(self.region.clone())
            .with_profile(self.profile.clone())
    }
}

/// Read an artifacts manifest, if one was given.
pub fn load_manifest(path: Option<&Path>) -> Result<BTreeMap<String, CodeLocation>> {
    let Some(path) = path else {
        return Ok(BTreeMap::new());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read artifacts manifest {}", path.display()))?;
    Ok(artifacts::parse_manifest(&content)?)
}

/// Fail with a suggestion when `--function-name` names no function.
pub fn check_function_name(config: &Config, name: &str) -> Result<()> {
    if config.function(name).is_some() {
        return Ok(());
    }
    let names: Vec<&str> = config
        .deployable_functions()
        .map(|function| function.name.as_str())
        .collect();
    Err(suggestions::unknown_function(name, &names))
}

/// Spinner showing the latest stack status while polling.
///
/// A new spinner is started for every stack; finished spinners are cleared.
#[derive(Default)]
pub struct StatusSpinner {
    bar: RefCell<Option<ProgressBar>>,
}

impl PollObserver for StatusSpinner {
    fn on_status(&self, stack_name: &str, status: &str) {
        let mut bar = self.bar.borrow_mut();
        let bar = bar.get_or_insert_with(|| {
            let bar = ProgressBar::new_spinner().with_style(ProgressStyle::default_spinner());
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });
        bar.set_message(format!("{}: {}", stack_name, status));
    }

    fn on_finish(&self, _stack_name: &str) {
        if let Some(bar) = self.bar.borrow_mut().take() {
            bar.finish_and_clear();
        }
    }
}
