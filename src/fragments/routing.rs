//! # Route Bindings
//!
//! A route binding is the method resource that connects one routing node to
//! one function. It carries:
//!
//! - a request transform that wraps path/query parameters, headers, body
//!   and stage variables into a JSON event, stamped with the content type
//!   the caller expects back;
//! - a success transform (200, or 307 for redirecting functions) and one
//!   failure transform per status in [`ERROR_STATUS_CODES`], selected by
//!   the `"httpStatus":<code>` marker a function embeds in its error
//!   message;
//! - a reference to the shared content model.
//!
//! Functions marked as authorizers produce a token authorizer instead of a
//! method; methods that reference one switch to `CUSTOM` authorization and
//! declare an explicit dependency on it.

use serde_json::{json, Map, Value};

use crate::fragments::api::API_ID;
use crate::fragments::compute::lambda_logical_id;
use crate::path::resource_logical_id;
use crate::template::{get_att, pascal_case, reference, sub, Fragment, Resource};

/// Status codes with a dedicated failure transform, in emission order.
pub const ERROR_STATUS_CODES: [u16; 4] = [500, 400, 403, 404];

/// Status emitted by redirecting functions on success.
pub const REDIRECT_STATUS_CODE: u16 = 307;

/// Content type forced on redirecting functions.
pub const REDIRECT_CONTENT_TYPE: &str = "text/plain";

/// Header the token authorizer reads the caller identity from.
pub const AUTHORIZER_IDENTITY_HEADER: &str = "token";

/// Name of the shared content model.
pub const SHARED_MODEL_NAME: &str = "Default";

pub fn method_logical_id(resource_name: Option<&str>, http_method: &str) -> String {
    format!(
        "Method{}{}",
        resource_name.unwrap_or("Root"),
        http_method.to_uppercase()
    )
}

pub fn model_logical_id(model_name: &str) -> String {
    format!("Model{}", pascal_case(model_name))
}

pub fn authorizer_logical_id(function_name: &str) -> String {
    format!("APIGAuthorizer{}", pascal_case(function_name))
}

/// The `"httpStatus":<code>` selection pattern for a failure transform.
pub fn selection_pattern(status: u16) -> String {
    format!(".*\"httpStatus\":{}.*", status)
}

/// One function bound to one routing node.
#[derive(Debug, Clone)]
pub struct RouteBinding<'a> {
    pub function_name: &'a str,
    /// Terminal routing node, `None` for the routing root
    pub resource_name: Option<&'a str>,
    pub http_method: &'a str,
    pub response_content_type: &'a str,
    pub authorizer: Option<&'a str>,
    pub redirects: bool,
}

impl RouteBinding<'_> {
    pub fn method_id(&self) -> String {
        method_logical_id(self.resource_name, self.http_method)
    }

    /// The content type actually served; redirects always use [`REDIRECT_CONTENT_TYPE`].
    pub fn effective_content_type(&self) -> &str {
        if self.redirects {
            REDIRECT_CONTENT_TYPE
        } else {
            self.response_content_type
        }
    }
}

/// Build the method, its shared model and its authorizer wiring.
pub fn route_binding(binding: &RouteBinding<'_>) -> Fragment {
    let content_type = binding.effective_content_type();

    let resource_id = match binding.resource_name {
        Some(name) => reference(&resource_logical_id(name)),
        None => get_att(API_ID, "RootResourceId"),
    };

    let mut properties = json!({
        "RestApiId": reference(API_ID),
        "ResourceId": resource_id,
        "HttpMethod": binding.http_method.to_uppercase(),
        "AuthorizationType": "NONE",
        "Integration": integration(binding, content_type),
        "MethodResponses": method_responses(content_type),
    });

    let mut method = Resource::new("AWS::ApiGateway::Method", Value::Null);
    if let Some(authorizer) = binding.authorizer {
        let authorizer_id = authorizer_logical_id(authorizer);
        properties["AuthorizationType"] = json!("CUSTOM");
        properties["AuthorizerId"] = reference(&authorizer_id);
        method = method.depends_on(vec![authorizer_id]);
    }
    method.properties = properties;

    Fragment::single(binding.method_id(), method)
        .with(model_logical_id(SHARED_MODEL_NAME), shared_model())
}

/// A token authorizer backed by `function_name`.
pub fn authorizer(function_name: &str) -> Fragment {
    Fragment::single(
        authorizer_logical_id(function_name),
        Resource::new(
            "AWS::ApiGateway::Authorizer",
            json!({
                "Name": authorizer_logical_id(function_name),
                "Type": "TOKEN",
                "RestApiId": reference(API_ID),
                "IdentitySource": format!("method.request.header.{}", AUTHORIZER_IDENTITY_HEADER),
                "AuthorizerResultTtlInSeconds": 0,
                "AuthorizerUri": lambda_invocation_uri(function_name),
            }),
        ),
    )
}

/// The content model every method response refers to.
pub fn shared_model() -> Resource {
    Resource::new(
        "AWS::ApiGateway::Model",
        json!({
            "ContentType": "application/json",
            "Name": model_logical_id(SHARED_MODEL_NAME),
            "RestApiId": reference(API_ID),
            "Schema": {
                "$schema": "http://json-schema.org/draft-04/schema#",
                "title": "ResponseModel",
                "type": "object",
            },
        }),
    )
}

fn lambda_invocation_uri(function_name: &str) -> Value {
    sub(&format!(
        "arn:aws:apigateway:${{AWS::Region}}:lambda:path/2015-03-31/functions/${{{}.Arn}}/invocations",
        lambda_logical_id(function_name)
    ))
}

fn integration(binding: &RouteBinding<'_>, content_type: &str) -> Value {
    let mut responses = vec![success_response(binding.redirects, content_type)];
    responses.extend(
        ERROR_STATUS_CODES
            .iter()
            .map(|status| error_response(*status, binding.redirects, content_type)),
    );

    json!({
        "Type": "AWS",
        "IntegrationHttpMethod": "POST",
        "Uri": lambda_invocation_uri(binding.function_name),
        "PassthroughBehavior": "NEVER",
        "RequestTemplates": request_templates(content_type),
        "IntegrationResponses": responses,
    })
}

fn success_response(redirects: bool, content_type: &str) -> Value {
    if redirects {
        json!({
            "StatusCode": REDIRECT_STATUS_CODE.to_string(),
            "SelectionPattern": "",
            "ResponseParameters": {
                "method.response.header.Location": "integration.response.body.response.Location",
            },
            "ResponseTemplates": { REDIRECT_CONTENT_TYPE: "You are being redirected" },
        })
    } else {
        json!({
            "StatusCode": "200",
            "SelectionPattern": "",
            "ResponseTemplates": { content_type: success_body_template(content_type) },
        })
    }
}

fn error_response(status: u16, redirects: bool, content_type: &str) -> Value {
    let template = if redirects {
        "Cannot redirect because of an error".to_string()
    } else if is_json(content_type) {
        "$input.path('$.errorMessage')".to_string()
    } else {
        "$util.parseJson($input.path('$.errorMessage')).response".to_string()
    };
    json!({
        "StatusCode": status.to_string(),
        "SelectionPattern": selection_pattern(status),
        "ResponseTemplates": { content_type: template },
    })
}

fn success_body_template(content_type: &str) -> String {
    if is_json(content_type) {
        "$input.json('$.response')".to_string()
    } else {
        "#set($inputRoot = $input.path('$'))\n$inputRoot.response".to_string()
    }
}

fn method_responses(content_type: &str) -> Value {
    let mut models = Map::new();
    models.insert(content_type.to_string(), json!(model_logical_id(SHARED_MODEL_NAME)));

    let mut responses: Vec<Value> = std::iter::once(200)
        .chain(ERROR_STATUS_CODES)
        .map(|status| {
            json!({
                "StatusCode": status.to_string(),
                "ResponseModels": models,
            })
        })
        .collect();
    responses.push(json!({
        "StatusCode": REDIRECT_STATUS_CODE.to_string(),
        "ResponseParameters": { "method.response.header.Location": true },
    }));
    Value::Array(responses)
}

fn is_json(content_type: &str) -> bool {
    content_type == "application/json"
}

/// Form posts and JSON bodies map to the same event.
fn request_templates(content_type: &str) -> Value {
    let template = request_template(content_type);
    json!({
        "application/x-www-form-urlencoded": template,
        "application/json": template,
    })
}

/// Request mapping template producing the event a function receives.
pub fn request_template(content_type: &str) -> String {
    format!(
        r##"#set($allParams = $input.params())
{{
  "params": {{
    #foreach($type in $allParams.keySet())
    #set($params = $allParams.get($type))
    "$type": {{
      #foreach($paramName in $params.keySet())
      "$paramName": "$util.escapeJavaScript($params.get($paramName))"#if($foreach.hasNext),#end
      #end
    }}#if($foreach.hasNext),#end
    #end
  }},
  "body": $input.json('$'),
  "meta": {{
    "expectedResponseContentType": "{}"
  }},
  "stageVariables": {{
    #foreach($key in $stageVariables.keySet())
    "$key": "$util.escapeJavaScript($stageVariables.get($key))"#if($foreach.hasNext),#end
    #end
  }},
  "authorizer": {{
    "principalId": "$context.authorizer.principalId"
  }}
}}"##,
        content_type
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding<'a>(content_type: &'a str, redirects: bool) -> RouteBinding<'a> {
        RouteBinding {
            function_name: "listUsers",
            resource_name: Some("Users"),
            http_method: "get",
            response_content_type: content_type,
            authorizer: None,
            redirects,
        }
    }

    fn method(fragment: &Fragment) -> &Resource {
        fragment.get("MethodUsersGET").unwrap()
    }

    #[test]
    fn test_method_logical_id() {
        assert_eq!(method_logical_id(Some("Users"), "get"), "MethodUsersGET");
        assert_eq!(method_logical_id(None, "POST"), "MethodRootPOST");
    }

    #[test]
    fn test_json_binding_transforms() {
        let fragment = route_binding(&binding("application/json", false));
        let responses = method(&fragment).properties["Integration"]["IntegrationResponses"]
            .as_array()
            .unwrap()
            .clone();

        assert_eq!(responses.len(), 5);
        assert_eq!(responses[0]["StatusCode"], "200");
        assert!(responses[0]["ResponseTemplates"]
            .get("application/json")
            .is_some());

        let codes: Vec<_> = responses[1..]
            .iter()
            .map(|r| r["StatusCode"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(codes, vec!["500", "400", "403", "404"]);
        for response in &responses[1..] {
            let code = response["StatusCode"].as_str().unwrap();
            assert_eq!(
                response["SelectionPattern"],
                format!(".*\"httpStatus\":{}.*", code)
            );
            assert_eq!(
                response["ResponseTemplates"]["application/json"],
                "$input.path('$.errorMessage')"
            );
        }
    }

    #[test]
    fn test_redirect_forces_content_type() {
        let fragment = route_binding(&binding("application/json", true));
        let integration = &method(&fragment).properties["Integration"];
        let responses = integration["IntegrationResponses"].as_array().unwrap();

        assert_eq!(responses[0]["StatusCode"], "307");
        assert_eq!(
            responses[0]["ResponseParameters"]["method.response.header.Location"],
            "integration.response.body.response.Location"
        );
        for response in responses {
            let templates = response["ResponseTemplates"].as_object().unwrap();
            assert_eq!(templates.keys().collect::<Vec<_>>(), vec!["text/plain"]);
        }
        assert_eq!(
            responses[1]["ResponseTemplates"]["text/plain"],
            "Cannot redirect because of an error"
        );
        assert!(integration["RequestTemplates"]["application/json"]
            .as_str()
            .unwrap()
            .contains("\"expectedResponseContentType\": \"text/plain\""));
    }

    #[test]
    fn test_request_template_carries_content_type() {
        let template = request_template("text/html");
        assert!(template.contains("\"expectedResponseContentType\": \"text/html\""));
        assert!(template.starts_with("#set($allParams"));
    }

    #[test]
    fn test_form_posts_share_the_json_request_template() {
        let fragment = route_binding(&binding("text/html", false));
        let templates = method(&fragment).properties["Integration"]["RequestTemplates"]
            .as_object()
            .unwrap();

        assert_eq!(
            templates.keys().collect::<Vec<_>>(),
            vec!["application/json", "application/x-www-form-urlencoded"]
        );
        assert_eq!(
            templates["application/json"],
            templates["application/x-www-form-urlencoded"]
        );
    }

    #[test]
    fn test_html_success_body_is_the_response_field() {
        let fragment = route_binding(&binding("text/html", false));
        let success = &method(&fragment).properties["Integration"]["IntegrationResponses"][0];
        assert_eq!(
            success["ResponseTemplates"]["text/html"],
            "#set($inputRoot = $input.path('$'))\n$inputRoot.response"
        );

        let fragment = route_binding(&binding("application/json", false));
        let success = &method(&fragment).properties["Integration"]["IntegrationResponses"][0];
        assert_eq!(
            success["ResponseTemplates"]["application/json"],
            "$input.json('$.response')"
        );
    }

    #[test]
    fn test_root_binding() {
        let mut root = binding("text/html", false);
        root.resource_name = None;
        let fragment = route_binding(&root);
        let method = fragment.get("MethodRootGET").unwrap();
        assert_eq!(
            method.properties["ResourceId"],
            json!({ "Fn::GetAtt": ["API", "RootResourceId"] })
        );
    }

    #[test]
    fn test_shared_model_merges_idempotently() {
        let mut fragment = route_binding(&binding("text/html", false));
        let mut other = binding("text/html", false);
        other.http_method = "POST";
        fragment.merge(route_binding(&other)).unwrap();
        assert!(fragment.contains("ModelDefault"));
        assert!(fragment.contains("MethodUsersGET"));
        assert!(fragment.contains("MethodUsersPOST"));
        assert_eq!(fragment.len(), 3);
    }

    #[test]
    fn test_authorizer_wiring() {
        let mut guarded = binding("text/html", false);
        guarded.authorizer = Some("checkToken");
        let fragment = route_binding(&guarded);
        let method = method(&fragment);

        assert_eq!(method.properties["AuthorizationType"], "CUSTOM");
        assert_eq!(
            method.properties["AuthorizerId"],
            json!({ "Ref": "APIGAuthorizerCheckToken" })
        );
        assert_eq!(
            method.depends_on.as_deref(),
            Some(&["APIGAuthorizerCheckToken".to_string()][..])
        );
    }

    #[test]
    fn test_unguarded_method_has_no_dependencies() {
        let fragment = route_binding(&binding("text/html", false));
        assert_eq!(method(&fragment).properties["AuthorizationType"], "NONE");
        assert!(method(&fragment).depends_on.is_none());
    }

    #[test]
    fn test_authorizer_resource() {
        let fragment = authorizer("checkToken");
        let resource = fragment.get("APIGAuthorizerCheckToken").unwrap();
        assert_eq!(resource.properties["Type"], "TOKEN");
        assert_eq!(resource.properties["IdentitySource"], "method.request.header.token");
        assert_eq!(resource.properties["AuthorizerResultTtlInSeconds"], 0);
        assert_eq!(
            resource.properties["AuthorizerUri"]["Fn::Sub"],
            "arn:aws:apigateway:${AWS::Region}:lambda:path/2015-03-31/functions/${LambdaCheckToken.Arn}/invocations"
        );
    }

    #[test]
    fn test_method_responses_include_redirect() {
        let fragment = route_binding(&binding("text/html", false));
        let responses = method(&fragment).properties["MethodResponses"]
            .as_array()
            .unwrap()
            .clone();
        let codes: Vec<_> = responses
            .iter()
            .map(|r| r["StatusCode"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(codes, vec!["200", "500", "400", "403", "404", "307"]);
        assert_eq!(responses[0]["ResponseModels"]["text/html"], "ModelDefault");
    }
}
