//! `aws` command line adapter.
//!
//! Implements [`ControlPlane`] and [`ArtifactStore`] by running the `aws`
//! program with `--output json` and parsing its stdout. Credentials, region
//! and retries are whatever the installed CLI is configured with.
//!
//! A failed invocation becomes [`Error::ControlPlane`] carrying the CLI's
//! stderr, so service messages such as "No updates are to be performed"
//! reach the convergence engine unchanged.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::artifacts::ArtifactVersion;
use crate::control_plane::{
    ArtifactStore, ChangeSetDescription, ControlPlane, ResourceChange, StackDescriptor, StackEvent,
    StackRequest,
};
use crate::error::{Error, Result};

/// Runs `aws` subcommands.
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
    program_args: Vec<String>,
    region: Option<String>,
    profile: Option<String>,
}

impl Default for AwsCli {
    fn default() -> Self {
        Self {
            program: "aws".to_string(),
            program_args: Vec::new(),
            region: None,
            profile: None,
        }
    }
}

impl AwsCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    /// Use another executable in place of `aws`, e.g. a wrapper script
    /// run through `sh`.
    pub fn with_program(mut self, program: impl Into<String>, leading_args: &[&str]) -> Self {
        self.program = program.into();
        self.program_args = leading_args.iter().map(|arg| arg.to_string()).collect();
        self
    }

    /// Run `aws <service> <operation> <args>` and return stdout.
    fn run(&self, service: &str, operation: &str, args: &[String]) -> Result<String> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.program_args)
            .args([service, operation])
            .args(args)
            .args(["--output", "json"]);
        if let Some(region) = &self.region {
            command.args(["--region", region]);
        }
        if let Some(profile) = &self.profile {
            command.args(["--profile", profile]);
        }

        log::debug!("aws {} {}", service, operation);
        let output = command
            .output()
            .map_err(|e| Error::control_plane(operation, format!("cannot run '{}': {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::control_plane(operation, stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run_json<T: for<'de> Deserialize<'de>>(
        &self,
        service: &str,
        operation: &str,
        args: &[String],
    ) -> Result<T> {
        let stdout = self.run(service, operation, args)?;
        parse_json(operation, &stdout)
    }

    fn cloudformation(&self, operation: &str, args: &[String]) -> Result<String> {
        self.run("cloudformation", operation, args)
    }

    fn mutation_locked(&self, stack_name: &str) -> Result<bool> {
        let policy: StackPolicyOutput = self.run_json(
            "cloudformation",
            "get-stack-policy",
            &args(&[("--stack-name", stack_name)]),
        )?;
        Ok(policy
            .stack_policy_body
            .is_some_and(|body| body.contains("\"Deny\"")))
    }

    /// Arguments shared by create-stack, update-stack and create-change-set.
    fn request_args(&self, request: &StackRequest, body: &BodyFile) -> Vec<String> {
        let mut list = args(&[
            ("--stack-name", request.stack_name.as_str()),
            ("--template-body", body.uri().as_str()),
        ]);
        list.push("--capabilities".to_string());
        list.extend(request.capabilities().iter().map(|c| c.to_string()));
        if !request.tags.is_empty() {
            list.push("--tags".to_string());
            list.extend(
                request
                    .tags
                    .iter()
                    .map(|(key, value)| format!("Key={},Value={}", key, value)),
            );
        }
        list
    }
}

impl ControlPlane for AwsCli {
    fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescriptor>> {
        let stdout = match self.cloudformation("describe-stacks", &args(&[("--stack-name", stack_name)])) {
            Ok(stdout) => stdout,
            Err(Error::ControlPlane { message, .. }) if message.contains("does not exist") => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };
        let Some(mut stack) = parse_stack(&stdout)? else {
            return Ok(None);
        };
        if !stack.status.ends_with("_IN_PROGRESS") {
            stack.mutation_locked = self.mutation_locked(stack_name)?;
        }
        Ok(Some(stack))
    }

    fn create_stack(&self, request: &StackRequest) -> Result<()> {
        let body = BodyFile::write(".json", request.template_body.as_bytes())?;
        let mut list = self.request_args(request, &body);
        if let Some(policy) = &request.stack_policy {
            list.extend(args(&[("--stack-policy-body", policy.as_str())]));
        }
        if let Some(on_failure) = &request.on_failure {
            list.extend(args(&[("--on-failure", on_failure.as_str())]));
        }
        self.cloudformation("create-stack", &list).map(drop)
    }

    fn update_stack(&self, request: &StackRequest) -> Result<()> {
        let body = BodyFile::write(".json", request.template_body.as_bytes())?;
        let list = self.request_args(request, &body);
        self.cloudformation("update-stack", &list).map(drop)
    }

    fn create_change_set(&self, request: &StackRequest, change_set_name: &str) -> Result<()> {
        let body = BodyFile::write(".json", request.template_body.as_bytes())?;
        let mut list = self.request_args(request, &body);
        list.extend(args(&[
            ("--change-set-name", change_set_name),
            ("--change-set-type", "UPDATE"),
        ]));
        self.cloudformation("create-change-set", &list).map(drop)
    }

    fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<ChangeSetDescription> {
        let stdout = self.cloudformation(
            "describe-change-set",
            &args(&[("--stack-name", stack_name), ("--change-set-name", change_set_name)]),
        )?;
        parse_change_set(&stdout)
    }

    fn execute_change_set(&self, stack_name: &str, change_set_name: &str) -> Result<()> {
        self.cloudformation(
            "execute-change-set",
            &args(&[("--stack-name", stack_name), ("--change-set-name", change_set_name)]),
        )
        .map(drop)
    }

    fn set_stack_policy(&self, stack_name: &str, policy_body: &str) -> Result<()> {
        self.cloudformation(
            "set-stack-policy",
            &args(&[("--stack-name", stack_name), ("--stack-policy-body", policy_body)]),
        )
        .map(drop)
    }

    fn describe_stack_events(&self, stack_name: &str) -> Result<Vec<StackEvent>> {
        let stdout = self.cloudformation("describe-stack-events", &args(&[("--stack-name", stack_name)]))?;
        parse_events(&stdout)
    }
}

impl ArtifactStore for AwsCli {
    fn list_versions(&self, bucket: &str, prefix: &str) -> Result<Vec<ArtifactVersion>> {
        let stdout = self.run(
            "s3api",
            "list-object-versions",
            &args(&[("--bucket", bucket), ("--prefix", prefix)]),
        )?;
        parse_versions(&stdout)
    }

    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<Option<String>> {
        let file = BodyFile::write(".body", body)?;
        let path = file.path().to_string_lossy().into_owned();
        let output: PutObjectOutput = self.run_json(
            "s3api",
            "put-object",
            &args(&[("--bucket", bucket), ("--key", key), ("--body", path.as_str())]),
        )?;
        Ok(output.version_id)
    }

    fn put_asset(&self, bucket: &str, key: &str, body: &[u8], content_type: &str) -> Result<()> {
        let file = BodyFile::write(".body", body)?;
        let path = file.path().to_string_lossy().into_owned();
        self.run(
            "s3api",
            "put-object",
            &args(&[
                ("--bucket", bucket),
                ("--key", key),
                ("--body", path.as_str()),
                ("--content-type", content_type),
            ]),
        )?;
        Ok(())
    }
}

fn args(pairs: &[(&str, &str)]) -> Vec<String> {
    pairs
        .iter()
        .flat_map(|(flag, value)| [flag.to_string(), value.to_string()])
        .collect()
}

fn parse_json<T: for<'de> Deserialize<'de>>(operation: &str, stdout: &str) -> Result<T> {
    serde_json::from_str(stdout)
        .map_err(|e| Error::control_plane(operation, format!("unexpected output: {}", e)))
}

/// A request body staged in a temp file, removed on drop.
///
/// Template bodies easily exceed the argument length limit, so they are
/// passed as `file://` references.
struct BodyFile {
    file: tempfile::NamedTempFile,
}

impl BodyFile {
    fn write(suffix: &str, body: &[u8]) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("routestack-")
            .suffix(suffix)
            .tempfile()?;
        file.write_all(body)?;
        file.flush()?;
        Ok(Self { file })
    }

    fn path(&self) -> &Path {
        self.file.path()
    }

    fn uri(&self) -> String {
        format!("file://{}", self.path().display())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksOutput {
    #[serde(default)]
    stacks: Vec<StackRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackRecord {
    stack_name: String,
    stack_status: String,
    #[serde(default)]
    stack_status_reason: Option<String>,
    #[serde(default)]
    outputs: Vec<OutputRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OutputRecord {
    output_key: String,
    output_value: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackPolicyOutput {
    #[serde(default)]
    stack_policy_body: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ChangeSetOutput {
    status: String,
    #[serde(default)]
    status_reason: Option<String>,
    #[serde(default)]
    changes: Vec<ChangeRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ChangeRecord {
    resource_change: ResourceChangeRecord,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResourceChangeRecord {
    action: String,
    logical_resource_id: String,
    resource_type: String,
    #[serde(default)]
    replacement: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackEventsOutput {
    #[serde(default)]
    stack_events: Vec<EventRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EventRecord {
    timestamp: DateTime<Utc>,
    logical_resource_id: String,
    #[serde(default)]
    physical_resource_id: Option<String>,
    resource_type: String,
    resource_status: String,
    #[serde(default)]
    resource_status_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListVersionsOutput {
    #[serde(default)]
    versions: Vec<VersionRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VersionRecord {
    key: String,
    version_id: String,
    is_latest: bool,
    #[serde(default)]
    last_modified: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PutObjectOutput {
    #[serde(default)]
    version_id: Option<String>,
}

fn parse_stack(stdout: &str) -> Result<Option<StackDescriptor>> {
    let output: DescribeStacksOutput = parse_json("describe-stacks", stdout)?;
    Ok(output.stacks.into_iter().next().map(|stack| StackDescriptor {
        name: stack.stack_name,
        status: stack.stack_status,
        status_reason: stack.stack_status_reason,
        outputs: stack
            .outputs
            .into_iter()
            .map(|output| (output.output_key, output.output_value))
            .collect::<BTreeMap<_, _>>(),
        mutation_locked: false,
    }))
}

fn parse_change_set(stdout: &str) -> Result<ChangeSetDescription> {
    let output: ChangeSetOutput = parse_json("describe-change-set", stdout)?;
    Ok(ChangeSetDescription {
        status: output.status,
        status_reason: output.status_reason,
        changes: output
            .changes
            .into_iter()
            .map(|change| {
                let change = change.resource_change;
                ResourceChange {
                    action: change.action,
                    logical_resource_id: change.logical_resource_id,
                    resource_type: change.resource_type,
                    replacement: change.replacement,
                }
            })
            .collect(),
    })
}

fn parse_events(stdout: &str) -> Result<Vec<StackEvent>> {
    let output: StackEventsOutput = parse_json("describe-stack-events", stdout)?;
    Ok(output
        .stack_events
        .into_iter()
        .map(|event| StackEvent {
            timestamp: event.timestamp,
            logical_resource_id: event.logical_resource_id,
            physical_resource_id: event.physical_resource_id,
            resource_type: event.resource_type,
            resource_status: event.resource_status,
            resource_status_reason: event.resource_status_reason,
        })
        .collect())
}

fn parse_versions(stdout: &str) -> Result<Vec<ArtifactVersion>> {
    // An empty bucket prints nothing at all.
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    let output: ListVersionsOutput = parse_json("list-object-versions", stdout)?;
    Ok(output
        .versions
        .into_iter()
        .map(|version| ArtifactVersion {
            key: version.key,
            version_id: version.version_id,
            is_latest: version.is_latest,
            last_modified: version.last_modified,
        })
        .collect())
}
