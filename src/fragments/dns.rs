//! Alias record pointing a custom domain at the CDN distribution.

use serde_json::json;

use crate::fragments::cdn::DISTRIBUTION_ID;
use crate::template::{get_att, Fragment, Resource};

pub const RECORD_ID: &str = "Route53Record";

/// Fixed hosted zone id of every CloudFront distribution.
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

pub fn alias_record(hosted_zone_id: &str, domain: &str) -> Fragment {
    Fragment::single(
        RECORD_ID,
        Resource::new(
            "AWS::Route53::RecordSetGroup",
            json!({
                "HostedZoneId": hosted_zone_id,
                "RecordSets": [{
                    "Name": domain,
                    "Type": "A",
                    "AliasTarget": {
                        "HostedZoneId": CLOUDFRONT_HOSTED_ZONE_ID,
                        "DNSName": get_att(DISTRIBUTION_ID, "DomainName"),
                    },
                }],
            }),
        ),
    )
}
