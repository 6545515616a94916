//! Stack policies and the guard that lifts the mutation lock.
//!
//! Every stack is created with [`safe_policy`], which denies replacing or
//! deleting data-bearing resources. A deploy with `--danger-delete-resources`
//! swaps in [`unsafe_policy`] for the duration of one update through a
//! [`PolicyGuard`]; the guard puts the safe policy back exactly once.

use serde_json::{json, Value};

use crate::control_plane::ControlPlane;
use crate::error::Result;

/// Resource types a safe policy protects from replacement and deletion.
pub const PROTECTED_RESOURCE_TYPES: [&str; 4] = [
    "AWS::DynamoDB::Table",
    "AWS::ApiGateway::RestApi",
    "AWS::CloudFront::Distribution",
    "AWS::S3::Bucket",
];

pub fn safe_policy() -> Value {
    json!({
        "Statement": [
            {
                "Effect": "Deny",
                "Action": ["Update:Replace", "Update:Delete"],
                "Principal": "*",
                "Resource": "*",
                "Condition": {
                    "StringEquals": { "ResourceType": PROTECTED_RESOURCE_TYPES },
                },
            },
            {
                "Effect": "Allow",
                "Action": "Update:*",
                "Principal": "*",
                "Resource": "*",
            },
        ],
    })
}

pub fn unsafe_policy() -> Value {
    json!({
        "Statement": [{
            "Effect": "Allow",
            "Action": "Update:*",
            "Principal": "*",
            "Resource": "*",
        }],
    })
}

/// Holds the mutation lock open for one stack.
///
/// Call [`PolicyGuard::restore`] on every path. If the guard is dropped
/// without it (a panic while converging) the safe policy is re-applied from
/// `Drop` and any failure is logged.
pub struct PolicyGuard<'a, C: ControlPlane + ?Sized> {
    control_plane: &'a C,
    stack_name: String,
    restored: bool,
}

impl<'a, C: ControlPlane + ?Sized> PolicyGuard<'a, C> {
    /// Lift the lock by applying the unsafe policy.
    pub fn lift(control_plane: &'a C, stack_name: &str) -> Result<Self> {
        log::warn!(
            "Stack policy of {} lifted: resources may be replaced or deleted",
            stack_name
        );
        control_plane.set_stack_policy(stack_name, &unsafe_policy().to_string())?;
        Ok(Self {
            control_plane,
            stack_name: stack_name.to_string(),
            restored: false,
        })
    }

    /// Re-apply the safe policy.
    pub fn restore(mut self) -> Result<()> {
        self.restored = true;
        self.apply_safe()
    }

    fn apply_safe(&self) -> Result<()> {
        log::debug!("Restoring safe stack policy of {}", self.stack_name);
        self.control_plane
            .set_stack_policy(&self.stack_name, &safe_policy().to_string())
    }
}

impl<C: ControlPlane + ?Sized> Drop for PolicyGuard<'_, C> {
    fn drop(&mut self) {
        if !self.restored {
            self.restored = true;
            if let Err(e) = self.apply_safe() {
                log::warn!(
                    "Failed to restore stack policy of {}: {}",
                    self.stack_name,
                    e
                );
            }
        }
    }
}
