//! # Template Composer
//!
//! Assembles the fragments of every function and the shared infrastructure
//! into a two-layer document.
//!
//! ## Layers
//!
//! - **Inner** holds the bulk: compute units, routing nodes and methods,
//!   storage, the REST root, CDN, DNS, the account logging role and the
//!   deployment marker. It is uploaded to the support bucket.
//! - **Outer** holds the nested-stack resource pointing at the uploaded
//!   inner document, the stage binding and re-exports of the inner outputs.
//!
//! ## Order of work
//!
//! 1. The custom fragment hook runs first; the outputs it declares become
//!    environment variables and stage variables.
//! 2. Every deployable function yields its fragment, in declaration order.
//!    Path-bearing functions contribute a method id.
//! 3. Shared infrastructure and the deployment marker are added. The marker
//!    depends on exactly the collected method ids.
//! 4. The custom fragment is deep-merged over the inner document.
//! 5. The post-process hook may replace the inner document entirely.
//!
//! Output is deterministic except for the [`DeploymentUid`].

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::{json, Map, Value};
use url::Url;

use crate::artifacts::CodeLocation;
use crate::config::{self, Config, FunctionDef, StageConfig};
use crate::error::{Error, Result};
use crate::fragments::api::{self, API_ID, API_STAGE_NAME};
use crate::fragments::cdn::{self, DistributionSpec, RootMode, DISTRIBUTION_ID};
use crate::fragments::compute::{self, ComputeSpec};
use crate::fragments::nested::{self, inner_output};
use crate::fragments::routing::{self, RouteBinding};
use crate::fragments::{dns, storage};
use crate::hooks::{
    is_reserved_name, CommandHook, FileHook, TemplateHook, CUSTOM_FRAGMENT_HOOK, POST_PROCESS_HOOK,
};
use crate::path::PathResolver;
use crate::template::{get_att, join, reference, sub, Fragment, Output, Template};

pub const OUTPUT_REST_API_ID: &str = "RestApiId";
pub const OUTPUT_DEPLOYMENT_ID: &str = "DeploymentId";
pub const OUTPUT_ASSETS_BUCKET: &str = "BucketAssets";
pub const OUTPUT_ASSETS_WEBSITE: &str = "AssetsWebsite";
pub const OUTPUT_API_DOMAIN: &str = "ApiDomain";
pub const OUTPUT_DISTRIBUTION: &str = "DistributionWWW";
/// Outer-only output with the public URL of the API stage.
pub const OUTPUT_API_URL: &str = "ApiUrl";

/// Identifies one composition run.
///
/// Only the deployment marker's logical id, its description and the
/// locations derived from it depend on this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentUid {
    id: String,
    timestamp: DateTime<Utc>,
}

impl DeploymentUid {
    /// Millisecond timestamp followed by a random number below 1000.
    pub fn generate() -> Self {
        let now = Utc::now();
        let jitter: u16 = rand::thread_rng().gen_range(0..1000);
        Self::new(format!("{}{}", now.timestamp_millis(), jitter), now)
    }

    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            timestamp,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Stage-level inputs of a composition.
#[derive(Debug, Clone)]
pub struct ComposeSettings<'a> {
    pub app_name: &'a str,
    pub stage_name: &'a str,
    pub stage: &'a StageConfig,
    pub root: RootMode,
    /// Bucket of the support stack, where the inner document is uploaded
    pub support_bucket: &'a str,
}

impl ComposeSettings<'_> {
    pub fn stack_name(&self) -> String {
        config::stack_name(self.app_name, self.stage_name)
    }
}

/// The result of a composition run.
#[derive(Debug, Clone)]
pub struct ComposedTemplate {
    pub inner: Value,
    pub outer: Value,
    /// Logical id of the deployment marker
    pub deployment_id: String,
    /// Method ids the deployment marker depends on, in declaration order
    pub methods: Vec<String>,
    /// Key of the inner document in the support bucket
    pub inner_key: String,
    pub inner_url: String,
}

/// Builds composed templates, optionally extended by hooks.
#[derive(Default)]
pub struct Composer {
    custom_fragment: Option<Box<dyn TemplateHook>>,
    post_process: Option<Box<dyn TemplateHook>>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A composer with the hooks declared in `config`.
    ///
    /// Relative hook paths resolve against `project_dir`, which is also the
    /// working directory of the post-process command.
    pub fn from_config(config: &Config, project_dir: &Path) -> Result<Self> {
        let mut composer = Self::new();
        if let Some(path) = &config.custom_fragment {
            composer = composer.with_custom_fragment(FileHook::new(
                CUSTOM_FRAGMENT_HOOK,
                project_dir.join(path),
            ));
        }
        if let Some(argv) = &config.post_process {
            composer = composer.with_post_process(
                CommandHook::from_argv(POST_PROCESS_HOOK, argv)?.current_dir(project_dir),
            );
        }
        Ok(composer)
    }

    pub fn with_custom_fragment(mut self, hook: impl TemplateHook + 'static) -> Self {
        self.custom_fragment = Some(Box::new(hook));
        self
    }

    pub fn with_post_process(mut self, hook: impl TemplateHook + 'static) -> Self {
        self.post_process = Some(Box::new(hook));
        self
    }

    /// Run every input check of [`Composer::compose`] without building
    /// anything: path resolution, duplicate routes and names, authorizer
    /// references.
    pub fn validate(&self, functions: &[FunctionDef]) -> Result<()> {
        let mut resolver = PathResolver::new();
        let mut routing_nodes = Fragment::new();
        let mut names = HashSet::new();
        let mut routes = HashSet::new();

        for function in deployable(functions) {
            if !names.insert(function.name.as_str()) {
                return Err(invalid(&function.name, "function name is declared more than once"));
            }

            if let Some(path) = &function.path {
                let resolved = resolver.resolve(path)?;
                let method_id =
                    routing::method_logical_id(resolved.terminal(), &function.method.to_uppercase());
                routing_nodes.merge(resolved.fragment)?;
                if !routes.insert(method_id) {
                    return Err(invalid(
                        &function.name,
                        format!(
                            "{} '{}' is already bound to another function",
                            function.method.to_uppercase(),
                            path
                        ),
                    ));
                }
            }

            if let Some(authorizer) = &function.authorizer {
                match functions.iter().find(|f| &f.name == authorizer) {
                    None => {
                        return Err(invalid(
                            &function.name,
                            format!("authorizer '{}' is not a declared function", authorizer),
                        ))
                    }
                    Some(target) if target.name == function.name || target.is_http() => {
                        return Err(invalid(
                            &function.name,
                            format!("authorizer '{}' must be a separate function without a path", authorizer),
                        ))
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }

    /// Compose with a freshly generated [`DeploymentUid`].
    pub fn compose(
        &self,
        functions: &[FunctionDef],
        settings: &ComposeSettings<'_>,
        code: &BTreeMap<String, CodeLocation>,
    ) -> Result<ComposedTemplate> {
        self.compose_with_uid(functions, settings, code, &DeploymentUid::generate())
    }

    /// Compose the inner and outer documents.
    ///
    /// Functions without an entry in `code` get the inline placeholder.
    pub fn compose_with_uid(
        &self,
        functions: &[FunctionDef],
        settings: &ComposeSettings<'_>,
        code: &BTreeMap<String, CodeLocation>,
        uid: &DeploymentUid,
    ) -> Result<ComposedTemplate> {
        self.validate(functions)?;
        let stack_name = settings.stack_name();

        let custom = match &self.custom_fragment {
            Some(hook) => {
                log::debug!("Applying {} hook", hook.name());
                hook.apply(Value::Object(Map::new()))?
            }
            None => Value::Object(Map::new()),
        };
        let custom_outputs = output_values(&custom, CUSTOM_FRAGMENT_HOOK)?;

        let mut environment = environment_outputs(settings.stage);
        environment.extend(custom_outputs.clone());

        let mut inner = Template::new();
        inner.description = Some(format!("{} resources", stack_name));

        let authorizers: BTreeSet<&str> = functions
            .iter()
            .filter_map(|function| function.authorizer.as_deref())
            .collect();
        let mut resolver = PathResolver::new();
        let mut methods = Vec::new();
        let placeholder = CodeLocation::placeholder();

        for function in deployable(functions) {
            let name = function.name.as_str();
            let function_env: BTreeMap<String, Value> = environment
                .iter()
                .filter(|(key, _)| !function.exclude_env.contains(key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();

            inner.add_fragment(compute::compute_unit(&ComputeSpec {
                function_name: name,
                runtime: &function.runtime,
                policy_statements: &function.policy_statements,
                code: code.get(name).unwrap_or(&placeholder),
                environment: &function_env,
                production: settings.stage.production,
            }))?;

            if authorizers.contains(name) {
                inner.add_fragment(routing::authorizer(name))?;
                inner.add_fragment(compute::invoke_permission(name))?;
            }

            let Some(path) = &function.path else {
                continue;
            };
            let resolved = resolver.resolve(path)?;
            let terminal = resolved.terminal().map(str::to_string);
            inner.add_fragment(resolved.fragment)?;

            let http_method = function.method.to_uppercase();
            let binding = RouteBinding {
                function_name: name,
                resource_name: terminal.as_deref(),
                http_method: &http_method,
                response_content_type: &function.response_content_type,
                authorizer: function.authorizer.as_deref(),
                redirects: function.redirects,
            };
            log::debug!("Binding {} {} to {}", http_method, path, name);
            methods.push(binding.method_id());
            inner.add_fragment(routing::route_binding(&binding))?;
            inner.add_fragment(compute::invoke_permission(name))?;
        }

        add_shared_infrastructure(&mut inner, settings, &stack_name)?;

        let deployment_id = api::deployment_logical_id(uid.as_str());
        let date = uid.timestamp().format("%Y-%m-%d %H:%M:%S UTC").to_string();
        inner.add_fragment(api::deployment(uid.as_str(), &methods, &date))?;

        inner.outputs.insert(OUTPUT_REST_API_ID.to_string(), Output::new(reference(API_ID)));
        inner.outputs.insert(
            OUTPUT_DEPLOYMENT_ID.to_string(),
            Output::new(reference(&deployment_id)),
        );
        for (key, value) in environment_outputs(settings.stage) {
            inner.outputs.insert(key, Output::new(value));
        }

        inner.overlay(&custom)?;

        let mut inner_doc = inner.to_value()?;
        if let Some(hook) = &self.post_process {
            log::debug!("Applying {} hook", hook.name());
            inner_doc = hook.apply(inner_doc)?;
        }

        let inner_key = format!("templates/{}/{}-inner.json", stack_name, uid.as_str());
        let inner_url = template_url(settings.support_bucket, &inner_key)?;

        let outer = outer_document(&stack_name, &inner_doc, &inner_url, &custom_outputs)?;

        Ok(ComposedTemplate {
            inner: inner_doc,
            outer,
            deployment_id,
            methods,
            inner_key,
            inner_url,
        })
    }
}

fn deployable(functions: &[FunctionDef]) -> impl Iterator<Item = &FunctionDef> {
    functions
        .iter()
        .filter(|function| !is_reserved_name(&function.name))
}

fn invalid(function: &str, message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        function: Some(function.to_string()),
        message: message.into(),
        hint: None,
    }
}

/// Built-in outputs that are also injected into every function.
///
/// `RestApiId` and `DeploymentId` are outputs only: a function referencing
/// the deployment marker would close a dependency cycle through its method.
fn environment_outputs(stage: &StageConfig) -> BTreeMap<String, Value> {
    let mut outputs = BTreeMap::from([
        (
            OUTPUT_ASSETS_BUCKET.to_string(),
            reference(storage::ASSETS_BUCKET_ID),
        ),
        (
            OUTPUT_ASSETS_WEBSITE.to_string(),
            get_att(storage::ASSETS_BUCKET_ID, "WebsiteURL"),
        ),
        (
            OUTPUT_API_DOMAIN.to_string(),
            sub(&format!("${{{}}}.execute-api.${{AWS::Region}}.amazonaws.com", API_ID)),
        ),
    ]);
    if stage.cloudfront.is_enabled() {
        outputs.insert(
            OUTPUT_DISTRIBUTION.to_string(),
            get_att(DISTRIBUTION_ID, "DomainName"),
        );
    }
    outputs
}

/// `Outputs.<name>.Value` of every output a document declares.
fn output_values(document: &Value, hook: &str) -> Result<BTreeMap<String, Value>> {
    let Some(outputs) = document.get("Outputs").and_then(Value::as_object) else {
        return Ok(BTreeMap::new());
    };
    outputs
        .iter()
        .map(|(name, output)| match output.get("Value") {
            Some(value) => Ok((name.clone(), value.clone())),
            None => Err(Error::Hook {
                hook: hook.to_string(),
                message: format!("output '{}' has no Value", name),
            }),
        })
        .collect()
}

fn add_shared_infrastructure(
    inner: &mut Template,
    settings: &ComposeSettings<'_>,
    stack_name: &str,
) -> Result<()> {
    let stage = settings.stage;
    inner.add_fragment(storage::assets_bucket())?;
    inner.add_fragment(api::rest_api(stack_name))?;
    inner.add_fragment(api::account())?;

    if stage.cloudfront.is_enabled() {
        let custom_domain = stage.cloudfront.custom_domain();
        inner.add_fragment(cdn::distribution(&DistributionSpec {
            root: settings.root,
            custom_domain,
            acm_certificate: stage.acm_certificate.as_deref(),
        }))?;
        if let (Some(domain), Some(zone)) = (custom_domain, stage.hosted_zone.as_deref()) {
            inner.add_fragment(dns::alias_record(zone, domain))?;
        }
    }
    Ok(())
}

/// Virtual-hosted URL of an object in the support bucket.
fn template_url(bucket: &str, key: &str) -> Result<String> {
    let mut url = Url::parse(&format!("https://{}.s3.amazonaws.com/", bucket))?;
    url.set_path(key);
    Ok(url.to_string())
}

fn outer_document(
    stack_name: &str,
    inner: &Value,
    inner_url: &str,
    custom_outputs: &BTreeMap<String, Value>,
) -> Result<Value> {
    let mut outer = Template::new();
    outer.description = Some(stack_name.to_string());
    outer.add_fragment(nested::inner_stack(inner_url))?;

    let variables: BTreeMap<String, Value> = custom_outputs
        .keys()
        .map(|key| (key.clone(), inner_output(key)))
        .collect();
    outer.add_fragment(api::stage(
        API_STAGE_NAME,
        inner_output(OUTPUT_REST_API_ID),
        inner_output(OUTPUT_DEPLOYMENT_ID),
        &variables,
    ))?;

    if let Some(outputs) = inner.get("Outputs").and_then(Value::as_object) {
        for key in outputs.keys() {
            outer
                .outputs
                .insert(key.clone(), Output::new(inner_output(key)));
        }
    }
    outer.outputs.insert(
        OUTPUT_API_URL.to_string(),
        Output::new(join(vec![
            json!("https://"),
            inner_output(OUTPUT_REST_API_ID),
            json!(".execute-api."),
            reference("AWS::Region"),
            json!(format!(".amazonaws.com/{}", API_STAGE_NAME)),
        ])),
    );
    outer.to_value()
}
