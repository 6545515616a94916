//! Configuration tests using datatest-stable for test data discovery
//!
//! Every file under `tests/testdata/valid` must parse, validate and compose
//! for each of its stages; every file under `tests/testdata/invalid` must be
//! rejected somewhere along that way.

use routestack::config::{self, Config};
use routestack::orchestrator;
use std::collections::BTreeMap;
use std::path::Path;

fn stages(config: &Config) -> Vec<String> {
    let mut stages: Vec<String> = config.stages.keys().cloned().collect();
    if !stages.iter().any(|stage| stage == config::DEFAULT_STAGE) {
        stages.push(config::DEFAULT_STAGE.to_string());
    }
    stages
}

/// Test that a configuration composes into both documents for every stage.
fn test_valid_config(path: &Path) -> datatest_stable::Result<()> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read test file {}: {}", path.display(), e))?;
    let config = config::parse(&content)
        .map_err(|e| format!("Failed to parse config from {}: {}", path.display(), e))?;

    let routes = config
        .deployable_functions()
        .filter(|function| function.is_http())
        .count();

    for stage in stages(&config) {
        let composed = orchestrator::render(&config, Path::new("."), &stage, &BTreeMap::new())
            .map_err(|e| format!("Failed to compose {} for stage {}: {}", path.display(), stage, e))?;

        assert_eq!(
            composed.methods.len(),
            routes,
            "every route in {} should be bound to a method",
            path.display()
        );
        assert_eq!(
            composed.inner["Resources"][&composed.deployment_id]["DependsOn"]
                .as_array()
                .map(Vec::len),
            Some(routes)
        );
        for function in config.deployable_functions() {
            let logical_id = format!("Lambda{}", routestack::template::pascal_case(&function.name));
            assert!(
                composed.inner["Resources"].get(&logical_id).is_some(),
                "{} should define {}",
                path.display(),
                logical_id
            );
        }
        assert!(composed.outer["Resources"].get("InnerStack").is_some());
        assert!(composed.outer["Outputs"].get("ApiUrl").is_some());
    }

    Ok(())
}

/// Test that a configuration is rejected before anything is deployed.
fn test_invalid_config(path: &Path) -> datatest_stable::Result<()> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read test file {}: {}", path.display(), e))?;

    let result = config::parse(&content).and_then(|config| {
        orchestrator::render(&config, Path::new("."), config::DEFAULT_STAGE, &BTreeMap::new())
    });
    assert!(result.is_err(), "{} should be rejected", path.display());

    Ok(())
}

datatest_stable::harness!(
    test_valid_config,
    "tests/testdata/valid",
    r".*\.yaml$",
    test_invalid_config,
    "tests/testdata/invalid",
    r".*\.yaml$",
);
