//! Orchestrator for a complete deployment
//!
//! This module chains the library stages into one operation:
//!
//! 1. Validate the configuration, every route path and that each uploaded
//!    function has a bundle (no remote calls), then run `pre-deploy`
//! 2. Converge the support stack and read its bucket name
//! 3. Resolve code locations, failing on never-deployed skipped functions
//! 4. Compose the inner and outer documents
//! 5. Upload the inner document to the support bucket
//! 6. Converge the main stack with the outer document, then run `post-deploy`
//! 7. Collect endpoints and outputs into a [`DeployOutcome`]

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::artifacts::{self, ArtifactRequest, CodeLocation, SkipPolicy};
use crate::assets::{self, Asset};
use crate::compose::{
    ComposeSettings, ComposedTemplate, Composer, OUTPUT_API_URL, OUTPUT_ASSETS_BUCKET,
    OUTPUT_DISTRIBUTION,
};
use crate::config::{self, Config};
use crate::control_plane::{ArtifactStore, ControlPlane, ResourceChange, StackDescriptor};
use crate::converge::{
    ConvergeAction, ConvergeOptions, Convergence, ConvergenceEngine, PollObserver, Sleeper,
};
use crate::error::{Error, Result};
use crate::fragments::support::{support_stack_name, support_template, SUPPORT_BUCKET_OUTPUT};
use crate::hooks::{ShellHook, POST_DEPLOY_HOOK, PRE_DEPLOY_HOOK};

/// Inputs of one deployment.
#[derive(Debug, Clone)]
pub struct DeployRequest<'a> {
    pub config: &'a Config,
    /// Directory hook paths resolve against
    pub project_dir: &'a Path,
    pub stage_name: &'a str,
    pub skip: SkipPolicy,
    /// Locations of bundles uploaded by the build pipeline in this run
    pub uploaded: BTreeMap<String, CodeLocation>,
    /// Lift the mutation lock for this deployment
    pub allow_destructive: bool,
}

/// What a deployment did and where the application is reachable.
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub stack_name: String,
    pub action: ConvergeAction,
    /// Public URLs, CDN first
    pub endpoints: Vec<String>,
    pub outputs: BTreeMap<String, String>,
    pub changes: Vec<ResourceChange>,
}

/// Runs deployments against one control plane and artifact store.
pub struct Deployer<'a, C: ControlPlane + ?Sized, S: ArtifactStore + ?Sized> {
    control_plane: &'a C,
    store: &'a S,
    sleeper: &'a dyn Sleeper,
    observer: &'a dyn PollObserver,
}

impl<'a, C: ControlPlane + ?Sized, S: ArtifactStore + ?Sized> Deployer<'a, C, S> {
    pub fn new(control_plane: &'a C, store: &'a S, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            control_plane,
            store,
            sleeper,
            observer: &(),
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn PollObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Execute a complete deployment.
    pub fn deploy(&self, request: &DeployRequest<'_>) -> Result<DeployOutcome> {
        let config = request.config;
        let stage = config.stage(request.stage_name);
        let stack_name = config::stack_name(&config.app, request.stage_name);

        // Step 1: local validation
        config.validate()?;
        if let Some(only) = &request.skip.only_function {
            if config.function(only).is_none() {
                return Err(Error::ConfigValidation {
                    function: Some(only.clone()),
                    message: "function is not declared".to_string(),
                    hint: None,
                });
            }
        }
        let composer = Composer::from_config(config, request.project_dir)?;
        composer.validate(&config.functions)?;
        if let Some(missing) = config
            .deployable_functions()
            .map(|function| function.name.as_str())
            .find(|name| !request.skip.is_skipped(name) && !request.uploaded.contains_key(*name))
        {
            return Err(Error::ConfigValidation {
                function: Some(missing.to_string()),
                message: "no bundle was uploaded for this deployment".to_string(),
                hint: Some(
                    "Pass --artifacts with a manifest listing it, or reuse the stored bundle with --skip-upload or --function-name".to_string(),
                ),
            });
        }
        if let Some(command) = &config.pre_deploy {
            ShellHook::new(PRE_DEPLOY_HOOK, command)
                .current_dir(request.project_dir)
                .run()?;
        }

        // Step 2: support stack
        let bucket = self.converge_support(&stack_name, config)?;

        // Step 3: code locations
        let function_names: Vec<&str> = config
            .deployable_functions()
            .map(|function| function.name.as_str())
            .collect();
        let needs_versions = function_names
            .iter()
            .any(|name| request.skip.is_skipped(name));
        let known_versions = if needs_versions {
            self.store.list_versions(&bucket, stage.artifact_prefix())?
        } else {
            Vec::new()
        };
        let code = artifacts::resolve_code_locations(
            &ArtifactRequest {
                app_name: &config.app,
                bucket: &bucket,
                prefix: stage.artifact_prefix(),
                policy: &request.skip,
            },
            function_names.iter().copied(),
            &known_versions,
            &request.uploaded,
        )?;

        // Step 4: composition
        let composed = composer.compose(
            &config.functions,
            &ComposeSettings {
                app_name: &config.app,
                stage_name: request.stage_name,
                stage: &stage,
                root: config.root,
                support_bucket: &bucket,
            },
            &code,
        )?;
        log::info!(
            "Composed {} with {} routes",
            stack_name,
            composed.methods.len()
        );

        // Step 5: upload the inner document
        let body = serde_json::to_vec_pretty(&composed.inner)?;
        self.store.put_object(&bucket, &composed.inner_key, &body)?;
        log::debug!("Uploaded {}", composed.inner_url);

        // Step 6: main stack
        let options = ConvergeOptions {
            preview_changes: config.preview_changes,
            allow_destructive: request.allow_destructive,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            ..ConvergeOptions::default()
        };
        let outer = serde_json::to_string_pretty(&composed.outer)?;
        let convergence = ConvergenceEngine::new(self.control_plane, self.sleeper, options)
            .with_observer(self.observer)
            .converge(&stack_name, &outer)?;
        if let Some(command) = &config.post_deploy {
            ShellHook::new(POST_DEPLOY_HOOK, command)
                .current_dir(request.project_dir)
                .run()?;
        }

        // Step 7: outcome
        Ok(outcome(stack_name, &stage, convergence))
    }

    fn converge_support(&self, stack_name: &str, config: &Config) -> Result<String> {
        let support_name = support_stack_name(stack_name);
        let options = ConvergeOptions {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            ..ConvergeOptions::default()
        };
        let body = support_template().to_json_pretty()?;
        let convergence = ConvergenceEngine::new(self.control_plane, self.sleeper, options)
            .with_observer(self.observer)
            .converge(&support_name, &body)?;
        convergence
            .outputs()
            .get(SUPPORT_BUCKET_OUTPUT)
            .cloned()
            .ok_or_else(|| Error::MissingOutput {
                stack: support_name,
                output: SUPPORT_BUCKET_OUTPUT.to_string(),
            })
    }
}

fn outcome(
    stack_name: String,
    stage: &config::StageConfig,
    convergence: Convergence,
) -> DeployOutcome {
    let outputs = convergence.stack.outputs;
    let mut endpoints = Vec::new();
    if let Some(domain) = stage.cloudfront.custom_domain() {
        endpoints.push(format!("https://{}", domain));
    } else if let Some(domain) = outputs.get(OUTPUT_DISTRIBUTION) {
        endpoints.push(format!("https://{}", domain));
    }
    if let Some(url) = outputs.get(OUTPUT_API_URL) {
        endpoints.push(url.clone());
    }
    DeployOutcome {
        stack_name,
        action: convergence.action,
        endpoints,
        outputs,
        changes: convergence.changes,
    }
}

/// Compose a stage without any remote call.
///
/// The support bucket is only known after deployment, so the rendered
/// documents point at a bucket named after the support stack.
pub fn render(
    config: &Config,
    project_dir: &Path,
    stage_name: &str,
    uploaded: &BTreeMap<String, CodeLocation>,
) -> Result<ComposedTemplate> {
    config.validate()?;
    let stage = config.stage(stage_name);
    let stack_name = config::stack_name(&config.app, stage_name);
    let bucket = support_stack_name(&stack_name).to_lowercase();
    Composer::from_config(config, project_dir)?.compose(
        &config.functions,
        &ComposeSettings {
            app_name: &config.app,
            stage_name,
            stage: &stage,
            root: config.root,
            support_bucket: &bucket,
        },
        uploaded,
    )
}

/// Current state of a deployed stage.
pub fn describe_stage<C: ControlPlane + ?Sized>(
    control_plane: &C,
    config: &Config,
    stage_name: &str,
) -> Result<StackDescriptor> {
    let stack_name = config::stack_name(&config.app, stage_name);
    control_plane
        .describe_stack(&stack_name)?
        .ok_or(Error::StackNotFound { stack: stack_name })
}

/// Upload the static assets of a deployed stage to its assets bucket and
/// return how many files were stored.
///
/// Files are listed before any remote call, so a missing directory fails
/// fast. With `assets-dir: false` nothing is uploaded.
pub fn deploy_assets<C: ControlPlane + ?Sized, S: ArtifactStore + ?Sized>(
    control_plane: &C,
    store: &S,
    config: &Config,
    project_dir: &Path,
    stage_name: &str,
    on_upload: impl FnMut(&Asset),
) -> Result<usize> {
    let Some(dir) = &config.assets_dir else {
        log::info!("assets-dir is disabled; nothing to upload");
        return Ok(0);
    };
    let files = assets::collect(&project_dir.join(dir), &config.ignore)?;

    let stack = describe_stage(control_plane, config, stage_name)?;
    let bucket = stack
        .outputs
        .get(OUTPUT_ASSETS_BUCKET)
        .ok_or_else(|| Error::MissingOutput {
            stack: stack.name.clone(),
            output: OUTPUT_ASSETS_BUCKET.to_string(),
        })?;

    log::info!("Uploading {} assets to {}", files.len(), bucket);
    assets::upload(store, bucket, &files, on_upload)?;
    Ok(files.len())
}
