//! # Configuration Schema and Parsing
//!
//! This module defines the data structures that represent the
//! `routestack.yaml` configuration file and the logic for parsing and
//! validating it.
//!
//! ## Key Components
//!
//! - **`Config`**: the whole file: application name, routing root mode,
//!   per-stage settings, function definitions and template hooks.
//! - **`StageConfig`**: settings that vary per deployment stage, such as
//!   whether a CDN distribution is created and under which domain.
//! - **`FunctionDef`**: one route definition. Every downstream logical id
//!   is derived from its `name`.
//!
//! ## Validation
//!
//! [`Config::validate`] checks everything that can be checked locally:
//! unique and well-formed names, HTTP methods, content types, policy
//! statement shape, authorizer references and glob patterns. Path naming
//! conflicts are detected by the composer when the paths are resolved.
//! Every failure is an [`Error::ConfigValidation`] raised before any remote
//! call.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::fragments::cdn::{CdnSetting, RootMode};
use crate::hooks::is_reserved_name;
use crate::suggestions;
use crate::template::pascal_case;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "routestack.yaml";

/// Stage used when none is given on the command line or in the environment.
pub const DEFAULT_STAGE: &str = "default";

pub const DEFAULT_RUNTIME: &str = "nodejs18.x";
pub const DEFAULT_CONTENT_TYPE: &str = "text/html";
pub const DEFAULT_ARTIFACT_PREFIX: &str = "bundles";

/// HTTP methods a route may bind.
pub const HTTP_METHODS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "HEAD", "DELETE", "OPTIONS"];

/// Top-level keys of the configuration file.
const CONFIG_KEYS: [&str; 12] = [
    "app",
    "root",
    "ignore",
    "preview-changes",
    "poll-interval-secs",
    "stages",
    "functions",
    "custom-fragment",
    "post-process",
    "pre-deploy",
    "post-deploy",
    "assets-dir",
];

/// Directory of static assets when `assets-dir` is not set.
pub const DEFAULT_ASSETS_DIR: &str = "assets";

static CONTENT_TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+/[\w.\-]+$").unwrap());
static APP_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9\-]*$").unwrap());
static FUNCTION_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*$").unwrap());

fn default_poll_interval() -> u64 {
    1
}

fn default_assets_dir() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_ASSETS_DIR))
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

fn default_runtime() -> String {
    DEFAULT_RUNTIME.to_string()
}

/// The complete `routestack.yaml` file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Application name; the stack name is this plus the capitalized stage
    pub app: String,
    /// Which origin serves the CDN root
    #[serde(default)]
    pub root: RootMode,
    /// Glob patterns excluded from uploads
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Diff through a change preview before updating
    #[serde(default)]
    pub preview_changes: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub stages: BTreeMap<String, StageConfig>,
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
    /// Document overlaid on the inner template before composition
    #[serde(default)]
    pub custom_fragment: Option<PathBuf>,
    /// Command that rewrites the finished inner template
    #[serde(default)]
    pub post_process: Option<Vec<String>>,
    /// Shell command run before anything is deployed
    #[serde(default)]
    pub pre_deploy: Option<String>,
    /// Shell command run after the main stack converged
    #[serde(default)]
    pub post_deploy: Option<String>,
    /// Static assets uploaded by `deploy-assets`; `false` disables them
    #[serde(
        default = "default_assets_dir",
        deserialize_with = "deserialize_assets_dir"
    )]
    pub assets_dir: Option<PathBuf>,
}

/// Per-stage settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct StageConfig {
    /// Production stages do not let the deploying account assume function roles
    #[serde(default)]
    pub production: bool,
    /// `true`, `false` or a custom domain name
    #[serde(default)]
    pub cloudfront: CdnSetting,
    /// Hosted zone for the custom domain's alias record
    #[serde(default)]
    pub hosted_zone: Option<String>,
    /// Certificate for the custom domain
    #[serde(default)]
    pub acm_certificate: Option<String>,
    /// Key prefix of function bundles in the support bucket
    #[serde(default)]
    pub artifact_prefix: Option<String>,
}

impl StageConfig {
    pub fn artifact_prefix(&self) -> &str {
        self.artifact_prefix
            .as_deref()
            .unwrap_or(DEFAULT_ARTIFACT_PREFIX)
    }
}

/// One route definition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FunctionDef {
    pub name: String,
    /// `None` when the function is not exposed over HTTP (`path: false` or
    /// no `path` key); `Some("")` binds to the routing root
    #[serde(default, deserialize_with = "deserialize_route_path")]
    pub path: Option<String>,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_content_type")]
    pub response_content_type: String,
    #[serde(default)]
    pub policy_statements: Vec<Value>,
    /// Name of another function acting as token authorizer
    #[serde(default)]
    pub authorizer: Option<String>,
    #[serde(default)]
    pub redirects: bool,
    #[serde(default = "default_runtime")]
    pub runtime: String,
    /// Output keys not injected into this function's environment
    #[serde(default)]
    pub exclude_env: Vec<String>,
}

impl FunctionDef {
    /// A function with defaults for everything but its name and path.
    pub fn new(name: &str, path: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            path: path.map(str::to_string),
            method: default_method(),
            response_content_type: default_content_type(),
            policy_statements: Vec::new(),
            authorizer: None,
            redirects: false,
            runtime: default_runtime(),
            exclude_env: Vec::new(),
        }
    }

    pub fn is_http(&self) -> bool {
        self.path.is_some()
    }
}

fn deserialize_route_path<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Path(String),
    }
    match Option::<Raw>::deserialize(deserializer)? {
        None | Some(Raw::Flag(false)) => Ok(None),
        Some(Raw::Flag(true)) => Err(serde::de::Error::custom(
            "path must be a string or false",
        )),
        Some(Raw::Path(path)) => Ok(Some(path)),
    }
}

fn deserialize_assets_dir<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<PathBuf>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Dir(PathBuf),
    }
    match Option::<Raw>::deserialize(deserializer)? {
        None | Some(Raw::Flag(false)) => Ok(None),
        Some(Raw::Flag(true)) => Ok(default_assets_dir()),
        Some(Raw::Dir(dir)) => Ok(Some(dir)),
    }
}

impl Config {
    /// Settings of `stage`, or defaults when the stage is not declared.
    pub fn stage(&self, stage: &str) -> StageConfig {
        self.stages.get(stage).cloned().unwrap_or_default()
    }

    /// Functions that are deployed, i.e. everything except hook names.
    pub fn deployable_functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.functions
            .iter()
            .filter(|function| !is_reserved_name(&function.name))
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.iter().find(|function| function.name == name)
    }

    /// Check everything that does not need the path resolver or a remote call.
    pub fn validate(&self) -> Result<()> {
        if !APP_NAME_RE.is_match(&self.app) {
            return Err(invalid(
                None,
                format!("app name '{}' is not a valid stack name", self.app),
                "Use letters, digits and '-', starting with a letter",
            ));
        }

        if self.poll_interval_secs == 0 {
            return Err(invalid(
                None,
                "poll-interval-secs must be at least 1",
                "Status is polled with whole-second granularity",
            ));
        }

        for pattern in &self.ignore {
            if let Err(e) = glob::Pattern::new(pattern) {
                return Err(invalid(
                    None,
                    format!("invalid ignore pattern '{}': {}", pattern, e),
                    "Use * for a single path component and ** for recursive matching",
                ));
            }
        }

        if let Some(argv) = &self.post_process {
            if argv.is_empty() {
                return Err(invalid(
                    None,
                    "post-process command is empty",
                    "Give the program and its arguments, e.g. [\"./process.sh\"]",
                ));
            }
        }

        for (key, command) in [("pre-deploy", &self.pre_deploy), ("post-deploy", &self.post_deploy)] {
            if command.as_deref().is_some_and(|command| command.trim().is_empty()) {
                return Err(invalid(
                    None,
                    format!("{} command is empty", key),
                    format!("Give a shell command line or remove '{}'", key),
                ));
            }
        }

        for (name, stage) in &self.stages {
            validate_stage(name, stage)?;
        }

        let mut seen = HashSet::new();
        for function in &self.functions {
            if !seen.insert(function.name.as_str()) {
                return Err(invalid(
                    Some(&function.name),
                    "function name is declared more than once",
                    "Every logical id derives from the function name, so names must be unique",
                ));
            }
        }

        for function in self.deployable_functions() {
            self.validate_function(function)?;
        }
        Ok(())
    }

    fn validate_function(&self, function: &FunctionDef) -> Result<()> {
        let name = Some(function.name.as_str());

        if !FUNCTION_NAME_RE.is_match(&function.name) {
            return Err(invalid(
                name,
                "function names may only contain letters and digits",
                "Names become part of resource ids such as 'Lambda<Name>'",
            ));
        }

        if let Some(path) = &function.path {
            if path.starts_with('/') || path.ends_with('/') {
                return Err(invalid(
                    name,
                    format!("path '{}' must not begin or end with '/'", path),
                    "Write 'users/{id}', not '/users/{id}/'",
                ));
            }
            if path.contains('#') || path.contains('?') {
                return Err(invalid(
                    name,
                    format!("path '{}' must not contain '#' or '?'", path),
                    "Query strings are forwarded automatically; declare only the path",
                ));
            }
        }

        let method = function.method.to_uppercase();
        if !HTTP_METHODS.contains(&method.as_str()) {
            let hint = suggestions::did_you_mean(&method, &HTTP_METHODS)
                .unwrap_or_else(|| format!("Use one of {}", HTTP_METHODS.join(", ")));
            return Err(invalid(
                name,
                format!("unsupported HTTP method '{}'", function.method),
                hint,
            ));
        }

        if !CONTENT_TYPE_RE.is_match(&function.response_content_type) {
            return Err(invalid(
                name,
                format!(
                    "response-content-type '{}' is not a valid content type",
                    function.response_content_type
                ),
                "Use a type/subtype value such as 'application/json'",
            ));
        }

        for statement in &function.policy_statements {
            let missing: Vec<&str> = ["Effect", "Action", "Resource"]
                .into_iter()
                .filter(|key| statement.get(key).is_none())
                .collect();
            if !missing.is_empty() {
                return Err(invalid(
                    name,
                    format!("policy statement is missing {}", missing.join(", ")),
                    "Every policy statement needs Effect, Action and Resource",
                ));
            }
        }

        if let Some(authorizer) = &function.authorizer {
            let target = self.function(authorizer).ok_or_else(|| {
                let names: Vec<&str> = self.functions.iter().map(|f| f.name.as_str()).collect();
                invalid(
                    name,
                    format!("authorizer '{}' is not a declared function", authorizer),
                    suggestions::did_you_mean(authorizer, &names)
                        .unwrap_or_else(|| "Declare the authorizer as a function with path: false".to_string()),
                )
            })?;
            if target.name == function.name {
                return Err(invalid(
                    name,
                    "a function cannot be its own authorizer",
                    "Declare a separate authorizer function with path: false",
                ));
            }
            if target.is_http() {
                return Err(invalid(
                    name,
                    format!("authorizer '{}' must not have a path", authorizer),
                    format!("Set 'path: false' on '{}'", authorizer),
                ));
            }
        }
        Ok(())
    }
}

fn validate_stage(name: &str, stage: &StageConfig) -> Result<()> {
    if let CdnSetting::CustomDomain(domain) = &stage.cloudfront {
        if stage.acm_certificate.is_none() {
            return Err(invalid(
                None,
                format!("stage '{}' uses domain '{}' without acm-certificate", name, domain),
                "Request a certificate for the domain and set acm-certificate to its ARN",
            ));
        }
    }
    if stage.hosted_zone.is_some() && stage.cloudfront.custom_domain().is_none() {
        log::warn!(
            "Stage '{}' sets hosted-zone without a custom domain; no DNS record will be created",
            name
        );
    }
    Ok(())
}

fn invalid(function: Option<&str>, message: impl Into<String>, hint: impl Into<String>) -> Error {
    Error::ConfigValidation {
        function: function.map(str::to_string),
        message: message.into(),
        hint: Some(hint.into()),
    }
}

/// Name of the main stack for `app` deployed to `stage`.
pub fn stack_name(app: &str, stage: &str) -> String {
    format!("{}{}", app, pascal_case(stage))
}

/// Parses a YAML string into a `Config` without validating it.
pub fn parse(yaml_content: &str) -> Result<Config> {
    serde_yaml::from_str(yaml_content).map_err(|e| {
        let message = e.to_string();
        let hint = suggestions::unknown_field_hint(&message, &CONFIG_KEYS);
        Error::ConfigParse { message, hint }
    })
}

/// Parse and validate a configuration file.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigParse {
        message: format!("cannot read {}: {}", path.display(), e),
        hint: Some(format!(
            "Create {} or pass --config / set ROUTESTACK_CONFIG",
            DEFAULT_CONFIG_FILE
        )),
    })?;
    let config = parse(&content)?;
    config.validate()?;
    Ok(config)
}
