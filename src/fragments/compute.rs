//! Compute unit, execution identity and invoke permission.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::artifacts::CodeLocation;
use crate::fragments::api::API_ID;
use crate::template::{get_att, pascal_case, sub, Fragment, Resource};

pub const DEFAULT_MEMORY_SIZE: u32 = 1024;
pub const DEFAULT_TIMEOUT_SECS: u32 = 30;

pub fn lambda_logical_id(function_name: &str) -> String {
    format!("Lambda{}", pascal_case(function_name))
}

pub fn role_logical_id(function_name: &str) -> String {
    format!("ExecutionRoleForLambda{}", pascal_case(function_name))
}

pub fn permission_logical_id(function_name: &str) -> String {
    format!("LambdaPermission{}", pascal_case(function_name))
}

/// Everything needed to build one compute unit.
#[derive(Debug, Clone)]
pub struct ComputeSpec<'a> {
    pub function_name: &'a str,
    pub runtime: &'a str,
    pub policy_statements: &'a [Value],
    pub code: &'a CodeLocation,
    pub environment: &'a BTreeMap<String, Value>,
    /// Production stages do not let the deploying account assume the role.
    pub production: bool,
}

/// Build the function and its execution role.
pub fn compute_unit(spec: &ComputeSpec<'_>) -> Fragment {
    let role_id = role_logical_id(spec.function_name);
    Fragment::single(role_id.clone(), execution_role(spec)).with(
        lambda_logical_id(spec.function_name),
        Resource::new(
            "AWS::Lambda::Function",
            json!({
                "Handler": format!("index.{}", spec.function_name),
                "Role": get_att(&role_id, "Arn"),
                "Code": code_property(spec.code),
                "Runtime": spec.runtime,
                "MemorySize": DEFAULT_MEMORY_SIZE,
                "Timeout": DEFAULT_TIMEOUT_SECS,
                "Environment": { "Variables": spec.environment },
            }),
        ),
    )
}

/// Let the routing API invoke `function_name`.
pub fn invoke_permission(function_name: &str) -> Fragment {
    Fragment::single(
        permission_logical_id(function_name),
        Resource::new(
            "AWS::Lambda::Permission",
            json!({
                "Action": "lambda:InvokeFunction",
                "FunctionName": get_att(&lambda_logical_id(function_name), "Arn"),
                "Principal": "apigateway.amazonaws.com",
                "SourceArn": sub(&format!(
                    "arn:aws:execute-api:${{AWS::Region}}:${{AWS::AccountId}}:${{{}}}/*",
                    API_ID
                )),
            }),
        ),
    )
}

fn code_property(code: &CodeLocation) -> Value {
    match code {
        CodeLocation::Inline { source } => json!({ "ZipFile": source }),
        CodeLocation::Stored {
            bucket,
            key,
            version_id,
        } => json!({
            "S3Bucket": bucket,
            "S3Key": key,
            "S3ObjectVersion": version_id,
        }),
    }
}

fn execution_role(spec: &ComputeSpec<'_>) -> Resource {
    let mut principal = json!({ "Service": ["lambda.amazonaws.com"] });
    if !spec.production {
        principal["AWS"] = json!([sub("arn:aws:iam::${AWS::AccountId}:root")]);
    }

    let mut statements = vec![
        json!({
            "Effect": "Allow",
            "Action": ["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
            "Resource": { "Fn::Sub": "arn:aws:logs:${AWS::Region}:${AWS::AccountId}:*" },
        }),
        json!({
            "Effect": "Allow",
            "Action": ["cloudformation:DescribeStacks"],
            "Resource": { "Fn::Sub": "arn:aws:cloudformation:${AWS::Region}:${AWS::AccountId}:stack/${AWS::StackName}/*" },
        }),
    ];
    statements.extend(spec.policy_statements.iter().cloned());

    Resource::new(
        "AWS::IAM::Role",
        json!({
            "AssumeRolePolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": principal,
                    "Action": ["sts:AssumeRole"],
                }],
            },
            "Path": "/",
            "Policies": [{
                "PolicyName": "ExecutionPolicy",
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": statements,
                },
            }],
        }),
    )
}
