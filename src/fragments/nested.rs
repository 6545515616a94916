//! Outer-layer wrapper around the inner document.
//!
//! The control plane caps the number of resources per document, so the bulk
//! of a deployment lives in an inner document stored in the support bucket.
//! The outer document holds the nested-stack resource, the stage binding and
//! re-exports of the inner outputs.

use serde_json::{json, Value};

use crate::template::{get_att, Fragment, Resource};

pub const INNER_STACK_ID: &str = "InnerStack";

pub fn inner_stack(template_url: &str) -> Fragment {
    Fragment::single(
        INNER_STACK_ID,
        Resource::new(
            "AWS::CloudFormation::Stack",
            json!({ "TemplateURL": template_url }),
        ),
    )
}

/// Read an output of the inner stack from the outer document.
pub fn inner_output(output_name: &str) -> Value {
    get_att(INNER_STACK_ID, &format!("Outputs.{}", output_name))
}
