//! End-to-end tests for the `describe` command.
//!
//! A stand-in `aws` script is put first on `PATH`. Everything runs in one
//! test so no other test thread can be spawning processes while the script
//! is still open for writing.

#![cfg(unix)]

mod common;
use common::prelude::*;

use std::os::unix::fs::PermissionsExt;

const FAKE_AWS: &str = r#"#!/bin/sh
case "$2" in
  describe-stacks)
    if [ "$4" = "shopProd" ]; then
      cat <<'EOF'
{
  "Stacks": [{
    "StackName": "shopProd",
    "StackStatus": "UPDATE_COMPLETE",
    "Outputs": [
      { "OutputKey": "ApiUrl", "OutputValue": "https://abc.execute-api.us-east-1.amazonaws.com/prod" },
      { "OutputKey": "BucketAssets", "OutputValue": "shopprod-assets" }
    ]
  }]
}
EOF
    else
      echo "An error occurred (ValidationError) when calling the DescribeStacks operation: Stack with id $4 does not exist" >&2
      exit 254
    fi
    ;;
  get-stack-policy)
    echo '{ "StackPolicyBody": "{\"Statement\":[{\"Effect\":\"Deny\"}]}" }'
    ;;
  *)
    echo "unexpected operation $2" >&2
    exit 1
    ;;
esac
"#;

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_describe_against_fake_aws() {
    let fixture = TestFixture::new().with_minimal_config();
    let script = fixture.child("bin/aws");
    script.write_str(FAKE_AWS).unwrap();
    std::fs::set_permissions(script.path(), std::fs::Permissions::from_mode(0o755)).unwrap();

    let original_path = std::env::var_os("PATH").unwrap_or_default();
    let path = std::env::join_paths(
        std::iter::once(fixture.path().join("bin")).chain(std::env::split_paths(&original_path)),
    )
    .unwrap();

    let describe = || {
        let mut cmd = fixture.command();
        cmd.env("PATH", &path)
            .env_remove("AWS_REGION")
            .env_remove("AWS_PROFILE")
            .arg("describe");
        cmd
    };

    describe()
        .args(["--stage", "prod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shopProd"))
        .stdout(predicate::str::contains("UPDATE_COMPLETE"))
        .stdout(predicate::str::contains("locked against replacement"))
        .stdout(predicate::str::contains("shopprod-assets"));

    let output = describe()
        .args(["--stage", "prod", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let outputs: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        outputs["ApiUrl"],
        "https://abc.execute-api.us-east-1.amazonaws.com/prod"
    );

    describe()
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Stack 'shopDefault' does not exist"));
}
