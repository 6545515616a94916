//! # Control Plane Capabilities
//!
//! The remote service that owns stacks and the object store that holds
//! bundles and inner documents are only reached through the two traits in
//! this module. [`crate::aws_cli`] implements both by shelling out to the
//! `aws` command line; tests use in-memory fakes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifacts::ArtifactVersion;
use crate::error::Result;

/// Capability acknowledgements every stack mutation carries.
pub const STACK_CAPABILITIES: [&str; 2] = ["CAPABILITY_IAM", "CAPABILITY_NAMED_IAM"];

/// One entry of a stack's event history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEvent {
    pub timestamp: DateTime<Utc>,
    pub logical_resource_id: String,
    /// Stack id for `AWS::CloudFormation::Stack` resources
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    pub resource_type: String,
    pub resource_status: String,
    #[serde(default)]
    pub resource_status_reason: Option<String>,
}

/// Current state of a stack as reported by the control plane.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackDescriptor {
    pub name: String,
    pub status: String,
    pub status_reason: Option<String>,
    /// Only meaningful once the status is a terminal success
    pub outputs: BTreeMap<String, String>,
    /// Whether the stack policy currently denies destructive updates
    pub mutation_locked: bool,
}

/// Parameters shared by create, update and change-set requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackRequest {
    pub stack_name: String,
    pub template_body: String,
    pub tags: BTreeMap<String, String>,
    /// Stack policy document, only honored on create
    pub stack_policy: Option<String>,
    /// Action on create failure, e.g. `DO_NOTHING`; ignored on update
    pub on_failure: Option<String>,
}

impl StackRequest {
    pub fn capabilities(&self) -> &'static [&'static str] {
        &STACK_CAPABILITIES
    }
}

/// One planned change of a change preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub action: String,
    pub logical_resource_id: String,
    pub resource_type: String,
    #[serde(default)]
    pub replacement: Option<String>,
}

/// Result of describing a change preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetDescription {
    pub status: String,
    pub status_reason: Option<String>,
    pub changes: Vec<ResourceChange>,
}

/// Client side of the stack control plane.
///
/// Errors are returned as [`crate::error::Error::ControlPlane`] carrying the
/// raw service message, which the convergence engine inspects to recognize
/// empty updates.
pub trait ControlPlane {
    /// `None` when the stack does not exist.
    fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescriptor>>;

    fn create_stack(&self, request: &StackRequest) -> Result<()>;

    fn update_stack(&self, request: &StackRequest) -> Result<()>;

    fn create_change_set(&self, request: &StackRequest, change_set_name: &str) -> Result<()>;

    fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<ChangeSetDescription>;

    fn execute_change_set(&self, stack_name: &str, change_set_name: &str) -> Result<()>;

    fn set_stack_policy(&self, stack_name: &str, policy_body: &str) -> Result<()>;

    fn describe_stack_events(&self, stack_name: &str) -> Result<Vec<StackEvent>>;
}

/// Versioned object storage for bundles and inner documents.
pub trait ArtifactStore {
    /// Every stored version under `prefix`, latest and noncurrent.
    fn list_versions(&self, bucket: &str, prefix: &str) -> Result<Vec<ArtifactVersion>>;

    /// Store `body` and return the new version id, if the bucket is versioned.
    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<Option<String>>;

    /// Store a static asset served with `content_type`.
    fn put_asset(&self, bucket: &str, key: &str, body: &[u8], content_type: &str) -> Result<()>;
}
