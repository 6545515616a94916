//! # CDN Distribution
//!
//! One distribution with two origins: the assets bucket website endpoint
//! and the REST API. Exactly one of two layouts is emitted, chosen by
//! [`RootMode`]:
//!
//! | root     | default behavior | additional behavior | default root object |
//! |----------|------------------|---------------------|---------------------|
//! | `api`    | API              | `assets/*` → bucket | (empty)             |
//! | `assets` | bucket           | `prod/*` → API      | `index.html`        |
//!
//! In `assets` mode 403 and 404 answers are rewritten to `/index.html` with
//! status 200 so client-side routers can handle deep links.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::fragments::api::{API_ID, API_STAGE_NAME};
use crate::fragments::storage::ASSETS_BUCKET_ID;
use crate::template::{get_att, join, reference, sub, Fragment, Resource};

pub const DISTRIBUTION_ID: &str = "WWWDistribution";

const S3_ORIGIN_ID: &str = "s3www";
const API_ORIGIN_ID: &str = "api";

/// Headers forwarded to the API origin.
pub const API_FORWARDED_HEADERS: [&str; 7] = [
    "Authorization",
    "Accept",
    "Content-Type",
    "Origin",
    "Referer",
    "Access-Control-Request-Headers",
    "Access-Control-Request-Method",
];

const ALL_METHODS: [&str; 7] = ["DELETE", "GET", "HEAD", "OPTIONS", "PATCH", "POST", "PUT"];

/// Which origin serves the distribution root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootMode {
    #[default]
    Api,
    Assets,
}

/// Per-stage CDN setting: `false`, `true` or a custom domain name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CdnSetting {
    Disabled,
    #[default]
    DefaultCertificate,
    CustomDomain(String),
}

impl CdnSetting {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, CdnSetting::Disabled)
    }

    pub fn custom_domain(&self) -> Option<&str> {
        match self {
            CdnSetting::CustomDomain(domain) => Some(domain),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for CdnSetting {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Domain(String),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => CdnSetting::DefaultCertificate,
            Raw::Flag(false) => CdnSetting::Disabled,
            Raw::Domain(domain) => CdnSetting::CustomDomain(domain),
        })
    }
}

/// Inputs for [`distribution`].
#[derive(Debug, Clone)]
pub struct DistributionSpec<'a> {
    pub root: RootMode,
    pub custom_domain: Option<&'a str>,
    pub acm_certificate: Option<&'a str>,
}

pub fn distribution(spec: &DistributionSpec<'_>) -> Fragment {
    let (default_behavior, extra_behavior) = match spec.root {
        RootMode::Api => (api_behavior(None), s3_behavior(Some("assets/*"))),
        RootMode::Assets => (
            s3_behavior(None),
            api_behavior(Some(&format!("{}/*", API_STAGE_NAME))),
        ),
    };

    let mut config = json!({
        "Enabled": true,
        "Comment": sub("${AWS::StackName}"),
        "PriceClass": "PriceClass_200",
        "Origins": [s3_origin(), api_origin(spec.root)],
        "DefaultCacheBehavior": default_behavior,
        "CacheBehaviors": [extra_behavior],
        "ViewerCertificate": viewer_certificate(spec),
    });

    match spec.root {
        RootMode::Api => {
            config["DefaultRootObject"] = json!("");
        }
        RootMode::Assets => {
            config["DefaultRootObject"] = json!("index.html");
            let rewrites: Vec<Value> = [404, 403]
                .iter()
                .map(|code| {
                    json!({
                        "ErrorCode": code,
                        "ResponseCode": 200,
                        "ResponsePagePath": "/index.html",
                        "ErrorCachingMinTTL": 30,
                    })
                })
                .collect();
            config["CustomErrorResponses"] = Value::Array(rewrites);
        }
    }

    if let Some(domain) = spec.custom_domain {
        config["Aliases"] = json!([domain]);
    }

    Fragment::single(
        DISTRIBUTION_ID,
        Resource::new(
            "AWS::CloudFront::Distribution",
            json!({ "DistributionConfig": config }),
        )
        .depends_on(vec![API_ID.to_string(), ASSETS_BUCKET_ID.to_string()]),
    )
}

fn s3_origin() -> Value {
    json!({
        "Id": S3_ORIGIN_ID,
        "DomainName": {
            "Fn::Select": [1, { "Fn::Split": ["://", get_att(ASSETS_BUCKET_ID, "WebsiteURL")] }],
        },
        "CustomOriginConfig": { "OriginProtocolPolicy": "http-only" },
    })
}

fn api_origin(root: RootMode) -> Value {
    let mut origin = json!({
        "Id": API_ORIGIN_ID,
        "DomainName": join(vec![
            reference(API_ID),
            json!(".execute-api."),
            reference("AWS::Region"),
            json!(".amazonaws.com"),
        ]),
        "CustomOriginConfig": { "OriginProtocolPolicy": "https-only" },
    });
    if root == RootMode::Api {
        origin["OriginPath"] = json!(format!("/{}", API_STAGE_NAME));
    }
    origin
}

fn s3_behavior(path_pattern: Option<&str>) -> Value {
    let mut behavior = json!({
        "TargetOriginId": S3_ORIGIN_ID,
        "ForwardedValues": { "QueryString": true },
        "ViewerProtocolPolicy": "allow-all",
    });
    if let Some(pattern) = path_pattern {
        behavior["PathPattern"] = json!(pattern);
    }
    behavior
}

fn api_behavior(path_pattern: Option<&str>) -> Value {
    let mut behavior = json!({
        "TargetOriginId": API_ORIGIN_ID,
        "AllowedMethods": ALL_METHODS,
        "ForwardedValues": {
            "QueryString": true,
            "Headers": API_FORWARDED_HEADERS,
        },
        "ViewerProtocolPolicy": "redirect-to-https",
        "DefaultTTL": 0,
        "MaxTTL": 0,
        "MinTTL": 0,
    });
    if let Some(pattern) = path_pattern {
        behavior["PathPattern"] = json!(pattern);
    }
    behavior
}

fn viewer_certificate(spec: &DistributionSpec<'_>) -> Value {
    match (spec.custom_domain, spec.acm_certificate) {
        (Some(_), Some(certificate)) => json!({
            "AcmCertificateArn": certificate,
            "SslSupportMethod": "sni-only",
        }),
        _ => json!({ "CloudFrontDefaultCertificate": true }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(spec: &DistributionSpec<'_>) -> Value {
        distribution(spec)
            .get(DISTRIBUTION_ID)
            .unwrap()
            .properties["DistributionConfig"]
            .clone()
    }

    #[test]
    fn test_api_root_layout() {
        let config = config(&DistributionSpec {
            root: RootMode::Api,
            custom_domain: None,
            acm_certificate: None,
        });
        assert_eq!(config["DefaultRootObject"], "");
        assert_eq!(config["DefaultCacheBehavior"]["TargetOriginId"], "api");
        assert_eq!(config["CacheBehaviors"].as_array().unwrap().len(), 1);
        assert_eq!(config["CacheBehaviors"][0]["TargetOriginId"], "s3www");
        assert_eq!(config["CacheBehaviors"][0]["PathPattern"], "assets/*");
        assert_eq!(config["Origins"][1]["OriginPath"], "/prod");
        assert!(config.get("CustomErrorResponses").is_none());
        assert_eq!(
            config["ViewerCertificate"],
            json!({ "CloudFrontDefaultCertificate": true })
        );
    }

    #[test]
    fn test_assets_root_layout() {
        let config = config(&DistributionSpec {
            root: RootMode::Assets,
            custom_domain: None,
            acm_certificate: None,
        });
        assert_eq!(config["DefaultRootObject"], "index.html");
        assert_eq!(config["DefaultCacheBehavior"]["TargetOriginId"], "s3www");
        assert_eq!(config["CacheBehaviors"][0]["TargetOriginId"], "api");
        assert_eq!(config["CacheBehaviors"][0]["PathPattern"], "prod/*");
        assert!(config["Origins"][1].get("OriginPath").is_none());

        let errors = config["CustomErrorResponses"].as_array().unwrap();
        assert_eq!(errors.len(), 2);
        for error in errors {
            assert_eq!(error["ResponseCode"], 200);
            assert_eq!(error["ResponsePagePath"], "/index.html");
        }
    }

    #[test]
    fn test_api_behavior_forwards_fixed_headers() {
        let config = config(&DistributionSpec {
            root: RootMode::Api,
            custom_domain: None,
            acm_certificate: None,
        });
        let forwarded = &config["DefaultCacheBehavior"]["ForwardedValues"];
        assert_eq!(forwarded["QueryString"], true);
        assert_eq!(forwarded["Headers"], json!(API_FORWARDED_HEADERS));
        assert_eq!(config["CacheBehaviors"][0]["ForwardedValues"]["QueryString"], true);
    }

    #[test]
    fn test_custom_domain() {
        let config = config(&DistributionSpec {
            root: RootMode::Api,
            custom_domain: Some("www.example.com"),
            acm_certificate: Some("arn:aws:acm:us-east-1:1:certificate/abc"),
        });
        assert_eq!(config["Aliases"], json!(["www.example.com"]));
        assert_eq!(
            config["ViewerCertificate"]["AcmCertificateArn"],
            "arn:aws:acm:us-east-1:1:certificate/abc"
        );
    }

    #[test]
    fn test_distribution_depends_on_origins() {
        let fragment = distribution(&DistributionSpec {
            root: RootMode::Api,
            custom_domain: None,
            acm_certificate: None,
        });
        assert_eq!(
            fragment.get(DISTRIBUTION_ID).unwrap().depends_on,
            Some(vec!["API".to_string(), "Assets".to_string()])
        );
    }

    #[test]
    fn test_cdn_setting_deserialize() {
        let parsed: Vec<CdnSetting> = serde_yaml::from_str("[true, false, www.example.com]").unwrap();
        assert_eq!(
            parsed,
            vec![
                CdnSetting::DefaultCertificate,
                CdnSetting::Disabled,
                CdnSetting::CustomDomain("www.example.com".to_string()),
            ]
        );
        assert_eq!(parsed[2].custom_domain(), Some("www.example.com"));
        assert!(!parsed[1].is_enabled());
    }
}
