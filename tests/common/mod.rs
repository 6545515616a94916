//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures and configuration constants
//! to reduce duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_minimal_config();
//!     fixture.command().arg("template").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    pub use super::TestFixture;
}

/// Configuration file contents used across tests.
#[allow(dead_code)]
pub mod configs {
    /// A root page and one parameterized route.
    pub const MINIMAL: &str = r#"app: shop
functions:
  - name: index
    path: ""
  - name: getUser
    path: users/{id}
"#;

    /// A guarded route, its authorizer and a custom stage.
    pub const WITH_AUTHORIZER: &str = r#"app: shop
stages:
  prod:
    production: true
    cloudfront: false
functions:
  - name: auth
    path: false
  - name: listOrders
    path: orders
    method: GET
    response-content-type: application/json
    authorizer: auth
  - name: createOrder
    path: orders
    method: POST
    response-content-type: application/json
    authorizer: auth
"#;

    /// Two paths whose segments collapse to the same identifier.
    pub const PATH_CONFLICT: &str = r#"app: shop
functions:
  - name: a
    path: user-list
  - name: b
    path: userlist
"#;

    /// Path written with a leading slash.
    pub const LEADING_SLASH: &str = r#"app: shop
functions:
  - name: index
    path: /users
"#;

    /// Misspelled top-level key.
    pub const UNKNOWN_KEY: &str = r#"app: shop
functoins:
  - name: index
    path: ""
"#;

    /// Not YAML at all.
    pub const INVALID_YAML: &str = "app: [shop\nfunctions: {";
}

/// A test fixture that provides a temporary project directory.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::new()
///     .with_config(configs::MINIMAL)
///     .with_file("fragment.json", "{}");
///
/// fixture.command().arg("template").assert().success();
/// ```
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a `routestack.yaml` configuration file with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.with_file("routestack.yaml", content)
    }

    /// Add the minimal valid configuration.
    #[allow(dead_code)]
    pub fn with_minimal_config(self) -> Self {
        self.with_config(configs::MINIMAL)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the config file.
    #[allow(dead_code)]
    pub fn config_path(&self) -> PathBuf {
        self.temp_dir.path().join("routestack.yaml")
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command configured to run in this fixture's directory.
    ///
    /// Stage and config selection from the caller's environment is cleared
    /// so tests see the defaults.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("routestack");
        cmd.current_dir(self.path())
            .env_remove("ROUTESTACK_CONFIG")
            .env_remove("ROUTESTACK_STAGE")
            .env("NO_COLOR", "1");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_with_config() {
        let fixture = TestFixture::new().with_config("app: shop");
        assert!(fixture.config_path().exists());
    }

    #[test]
    fn test_configs_are_valid_yaml() {
        let configs = [
            configs::MINIMAL,
            configs::WITH_AUTHORIZER,
            configs::PATH_CONFLICT,
            configs::LEADING_SLASH,
            configs::UNKNOWN_KEY,
        ];

        for config in configs {
            serde_yaml::from_str::<serde_yaml::Value>(config).expect("Config should be valid YAML");
        }
    }

    #[test]
    fn test_invalid_yaml_is_actually_invalid() {
        let result = serde_yaml::from_str::<serde_yaml::Value>(configs::INVALID_YAML);
        assert!(result.is_err(), "INVALID_YAML should not parse");
    }
}
