//! End-to-end tests for the `template` command.
//!
//! `template` never contacts the cloud, so these tests run the real binary
//! against configurations in a temporary directory and inspect the rendered
//! documents.

mod common;
use common::prelude::*;

fn read_json(path: &std::path::Path) -> serde_json::Value {
    let content = std::fs::read_to_string(path).expect("document should exist");
    serde_json::from_str(&content).expect("document should be JSON")
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_template_renders_both_documents() {
    let fixture = TestFixture::new().with_minimal_config();

    fixture
        .command()
        .arg("template")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rendered shopDefault"))
        .stdout(predicate::str::contains("2 routes"));

    fixture.child("routestack-out/inner.json").assert(predicate::path::exists());
    fixture.child("routestack-out/outer.json").assert(predicate::path::exists());

    let inner = read_json(&fixture.path().join("routestack-out/inner.json"));
    let resources = &inner["Resources"];
    assert!(resources.get("MethodRootGET").is_some());
    assert!(resources.get("MethodIdGET").is_some());
    assert!(resources.get("LambdaGetUser").is_some());

    let outer = read_json(&fixture.path().join("routestack-out/outer.json"));
    let template_url = outer["Resources"]["InnerStack"]["Properties"]["TemplateURL"]
        .as_str()
        .unwrap();
    assert!(template_url
        .starts_with("https://shopdefaultsupport.s3.amazonaws.com/templates/shopDefault/"));
    assert!(template_url.ends_with("-inner.json"));
    assert!(outer["Outputs"].get("ApiUrl").is_some());
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_template_stage_and_output_dir() {
    let fixture = TestFixture::new().with_config(configs::WITH_AUTHORIZER);

    fixture
        .command()
        .args(["template", "--stage", "prod", "--output", "rendered"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shopProd"));

    let inner = read_json(&fixture.path().join("rendered/inner.json"));
    let resources = &inner["Resources"];
    assert_eq!(resources["APIGAuthorizerAuth"]["Properties"]["Type"], "TOKEN");
    assert_eq!(
        resources["MethodOrdersPOST"]["Properties"]["AuthorizationType"],
        "CUSTOM"
    );
    assert!(resources.get("WWWDistribution").is_none());
    assert!(inner["Outputs"].get("DistributionWWW").is_none());
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_template_with_custom_fragment() {
    let fixture = TestFixture::new()
        .with_config(&format!(
            "{}custom-fragment: fragment.yaml\n",
            configs::MINIMAL
        ))
        .with_file(
            "fragment.yaml",
            r#"Resources:
  Queue:
    Type: AWS::SQS::Queue
Outputs:
  QueueUrl:
    Value:
      Ref: Queue
"#,
        );

    fixture.command().arg("template").assert().success();

    let inner = read_json(&fixture.path().join("routestack-out/inner.json"));
    assert_eq!(inner["Resources"]["Queue"]["Type"], "AWS::SQS::Queue");
    assert_eq!(
        inner["Resources"]["LambdaIndex"]["Properties"]["Environment"]["Variables"]["QueueUrl"],
        serde_json::json!({ "Ref": "Queue" })
    );

    let outer = read_json(&fixture.path().join("routestack-out/outer.json"));
    assert_eq!(
        outer["Resources"]["StageProd"]["Properties"]["Variables"]["QueueUrl"],
        serde_json::json!({ "Fn::GetAtt": ["InnerStack", "Outputs.QueueUrl"] })
    );
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_template_missing_custom_fragment_fails() {
    let fixture = TestFixture::new().with_config(&format!(
        "{}custom-fragment: missing.yaml\n",
        configs::MINIMAL
    ));

    fixture
        .command()
        .arg("template")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("missing.yaml"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_template_path_conflict_fails() {
    let fixture = TestFixture::new().with_config(configs::PATH_CONFLICT);

    fixture
        .command()
        .arg("template")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Path naming conflict"))
        .stderr(predicate::str::contains("'user-list'"));

    fixture.child("routestack-out").assert(predicate::path::missing());
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_template_invalid_path_fails_with_hint() {
    let fixture = TestFixture::new().with_config(configs::LEADING_SLASH);

    fixture
        .command()
        .arg("template")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("must not begin or end with '/'"))
        .stderr(predicate::str::contains("function 'index'"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_template_unknown_key_suggests_fix() {
    let fixture = TestFixture::new().with_config(configs::UNKNOWN_KEY);

    fixture
        .command()
        .arg("template")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Did you mean 'functions'?"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_template_invalid_yaml_fails() {
    let fixture = TestFixture::new().with_config(configs::INVALID_YAML);

    fixture
        .command()
        .arg("template")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Configuration parsing error"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_template_missing_config_fails() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("template")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_template_config_from_env() {
    let fixture = TestFixture::new().with_file("deploy/app.yaml", configs::MINIMAL);

    fixture
        .command()
        .env("ROUTESTACK_CONFIG", "deploy/app.yaml")
        .env("ROUTESTACK_STAGE", "staging")
        .arg("template")
        .assert()
        .success()
        .stdout(predicate::str::contains("shopStaging"));
}
