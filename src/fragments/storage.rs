//! Static website bucket and its public-read policy.

use serde_json::json;

use crate::template::{join, reference, Fragment, Resource};

pub const ASSETS_BUCKET_ID: &str = "Assets";
pub const ASSETS_POLICY_ID: &str = "AssetsBucketPolicy";

pub fn assets_bucket() -> Fragment {
    Fragment::single(
        ASSETS_BUCKET_ID,
        Resource::new(
            "AWS::S3::Bucket",
            json!({
                "WebsiteConfiguration": {
                    "IndexDocument": "index.html",
                    "ErrorDocument": "index.html",
                },
            }),
        ),
    )
    .with(
        ASSETS_POLICY_ID,
        Resource::new(
            "AWS::S3::BucketPolicy",
            json!({
                "Bucket": reference(ASSETS_BUCKET_ID),
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Sid": "PublicReadForGetBucketObjects",
                        "Effect": "Allow",
                        "Principal": "*",
                        "Action": "s3:GetObject",
                        "Resource": join(vec![
                            json!("arn:aws:s3:::"),
                            reference(ASSETS_BUCKET_ID),
                            json!("/*"),
                        ]),
                    }],
                },
            }),
        ),
    )
}
