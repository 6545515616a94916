//! Support stack: a versioned bucket holding inner documents and bundles.
//!
//! Old versions expire after [`NONCURRENT_EXPIRATION_DAYS`]; the current
//! version of every key is kept.

use serde_json::json;

use crate::template::{reference, Output, Resource, Template};

pub const SUPPORT_BUCKET_ID: &str = "BucketSupport";
pub const SUPPORT_BUCKET_OUTPUT: &str = "SupportBucket";
pub const NONCURRENT_EXPIRATION_DAYS: u32 = 7;

/// Name of the support stack for a main stack.
pub fn support_stack_name(stack_name: &str) -> String {
    format!("{}Support", stack_name)
}

pub fn support_template() -> Template {
    let mut template = Template::new();
    template.description = Some("routestack support resources".to_string());
    template.resources.insert(
        SUPPORT_BUCKET_ID.to_string(),
        Resource::new(
            "AWS::S3::Bucket",
            json!({
                "VersioningConfiguration": { "Status": "Enabled" },
                "LifecycleConfiguration": {
                    "Rules": [{
                        "Id": "ExpireOldVersions",
                        "Status": "Enabled",
                        "NoncurrentVersionExpirationInDays": NONCURRENT_EXPIRATION_DAYS,
                    }],
                },
            }),
        ),
    );
    template.outputs.insert(
        SUPPORT_BUCKET_OUTPUT.to_string(),
        Output::new(reference(SUPPORT_BUCKET_ID)),
    );
    template
}
