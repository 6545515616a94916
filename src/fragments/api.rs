//! REST API root, deployment marker, stage and account-level logging role.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::template::{pascal_case, reference, sub, Fragment, Resource};

/// Logical id of the REST API root.
pub const API_ID: &str = "API";

/// Name of the API stage every function is served from.
pub const API_STAGE_NAME: &str = "prod";

/// Logical id of the role that lets the API push logs.
pub const ACCOUNT_ROLE_ID: &str = "RoleAPIGatewayAccount";

/// Logical id of the account-level API settings.
pub const ACCOUNT_ID: &str = "APIGatewayAccount";

pub fn deployment_logical_id(deployment_uid: &str) -> String {
    format!("Deployment{}", deployment_uid)
}

pub fn stage_logical_id(stage_name: &str) -> String {
    format!("Stage{}", pascal_case(stage_name))
}

/// The REST API all routing nodes and methods hang off.
pub fn rest_api(stack_name: &str) -> Fragment {
    Fragment::single(
        API_ID,
        Resource::new(
            "AWS::ApiGateway::RestApi",
            json!({
                "Description": format!("REST API for {}", stack_name),
                "Name": format!("{}API", stack_name),
            }),
        ),
    )
}

/// The deployment marker.
///
/// The control plane refuses a deployment of an API that has no methods
/// yet, so the marker depends explicitly on every bound method even though
/// it never reads their values. An empty list is valid.
pub fn deployment(deployment_uid: &str, depends_on_methods: &[String], date: &str) -> Fragment {
    Fragment::single(
        deployment_logical_id(deployment_uid),
        Resource::new(
            "AWS::ApiGateway::Deployment",
            json!({
                "RestApiId": reference(API_ID),
                "Description": format!("Automated deployment by routestack on {}", date),
            }),
        )
        .depends_on(depends_on_methods.to_vec()),
    )
}

/// Binds a deployment to the public stage.
///
/// `rest_api_id` and `deployment_id` are passed in because the stage lives
/// in the outer document and reaches the inner one through its outputs.
pub fn stage(
    stage_name: &str,
    rest_api_id: Value,
    deployment_id: Value,
    variables: &BTreeMap<String, Value>,
) -> Fragment {
    let mut properties = json!({
        "CacheClusterEnabled": false,
        "DeploymentId": deployment_id,
        "Description": format!("{} Stage", stage_name),
        "RestApiId": rest_api_id,
        "StageName": stage_name,
        "MethodSettings": [{
            "HttpMethod": "*",
            "ResourcePath": "/*",
            "LoggingLevel": "INFO",
            "DataTraceEnabled": true,
        }],
    });
    if !variables.is_empty() {
        properties["Variables"] = json!(variables);
    }
    Fragment::single(
        stage_logical_id(stage_name),
        Resource::new("AWS::ApiGateway::Stage", properties),
    )
}

/// Account-level role allowing the API to write execution logs.
pub fn account() -> Fragment {
    Fragment::single(
        ACCOUNT_ROLE_ID,
        Resource::new(
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": ["apigateway.amazonaws.com"] },
                        "Action": "sts:AssumeRole",
                    }],
                },
                "Path": "/",
                "ManagedPolicyArns": [
                    "arn:aws:iam::aws:policy/service-role/AmazonAPIGatewayPushToCloudWatchLogs"
                ],
            }),
        ),
    )
    .with(
        ACCOUNT_ID,
        Resource::new(
            "AWS::ApiGateway::Account",
            json!({ "CloudWatchRoleArn": sub(&format!("${{{}.Arn}}", ACCOUNT_ROLE_ID)) }),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_ids() {
        assert_eq!(deployment_logical_id("123456"), "Deployment123456");
        assert_eq!(stage_logical_id("prod"), "StageProd");
    }

    #[test]
    fn test_rest_api() {
        let fragment = rest_api("ShopProd");
        let api = fragment.get(API_ID).unwrap();
        assert_eq!(api.resource_type, "AWS::ApiGateway::RestApi");
        assert_eq!(api.properties["Name"], "ShopProdAPI");
    }

    #[test]
    fn test_deployment_depends_on_methods_in_order() {
        let methods = vec!["MethodUsersGET".to_string(), "MethodRootGET".to_string()];
        let fragment = deployment("42", &methods, "2026-01-01T00:00:00Z");
        let marker = fragment.get("Deployment42").unwrap();
        assert_eq!(marker.depends_on.as_deref(), Some(methods.as_slice()));
        assert!(marker.properties["Description"]
            .as_str()
            .unwrap()
            .ends_with("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn test_deployment_without_methods() {
        let fragment = deployment("42", &[], "now");
        let marker = fragment.get("Deployment42").unwrap();
        assert_eq!(marker.depends_on, Some(Vec::new()));
    }

    #[test]
    fn test_stage_variables_only_when_present() {
        let empty = stage("prod", json!("api"), json!("dep"), &BTreeMap::new());
        assert!(empty.get("StageProd").unwrap().properties.get("Variables").is_none());

        let mut variables = BTreeMap::new();
        variables.insert("TableName".to_string(), json!("users"));
        let with = stage("prod", json!("api"), json!("dep"), &variables);
        assert_eq!(
            with.get("StageProd").unwrap().properties["Variables"]["TableName"],
            "users"
        );
    }

    #[test]
    fn test_account_references_role() {
        let fragment = account();
        assert_eq!(fragment.len(), 2);
        assert_eq!(
            fragment.get(ACCOUNT_ID).unwrap().properties["CloudWatchRoleArn"],
            json!({ "Fn::Sub": "${RoleAPIGatewayAccount.Arn}" })
        );
    }
}
