//! # routestack
//!
//! This library turns a declarative list of function definitions into a
//! composed infrastructure template and drives a remote control plane until
//! the deployed stack converges. It is used by the `routestack` command-line
//! tool but every stage is usable on its own.
//!
//! ## Quick Example
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use routestack::compose::{ComposeSettings, Composer};
//! use routestack::config;
//!
//! let config = config::parse(r#"
//! app: shop
//! functions:
//!   - name: index
//!     path: ""
//!   - name: listUsers
//!     path: users/{id}
//! "#).unwrap();
//!
//! let stage = config.stage("prod");
//! let composed = Composer::new()
//!     .compose(
//!         &config.functions,
//!         &ComposeSettings {
//!             app_name: &config.app,
//!             stage_name: "prod",
//!             stage: &stage,
//!             root: config.root,
//!             support_bucket: "shop-support",
//!         },
//!         &BTreeMap::new(),
//!     )
//!     .unwrap();
//!
//! assert_eq!(composed.methods, vec!["MethodRootGET", "MethodIdGET"]);
//! assert!(composed.inner["Resources"].get("ResourceUsers").is_some());
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: the `routestack.yaml` schema: stages,
//!   function definitions and template hooks.
//! - **Path resolution (`path`)**: route paths become a tree of routing
//!   nodes; two segments that clean to the same identifier are rejected.
//! - **Fragments (`template`, `fragments`)**: pure builders for every
//!   resource kind, merged with conflict detection.
//! - **Composition (`compose`, `hooks`)**: assembles the inner and outer
//!   documents and runs user hooks.
//! - **Artifacts (`artifacts`)**: resolves stored bundle versions for
//!   functions that are not re-uploaded.
//! - **Convergence (`converge`, `control_plane`)**: create or update a stack,
//!   poll it to a terminal state and manage the mutation lock.
//! - **Assets (`assets`)**: static files uploaded to the assets bucket.
//!
//! ## Execution Flow
//!
//! [`orchestrator::Deployer::deploy`] runs the whole pipeline:
//!
//! 1.  **Validation**: configuration and route paths, before any remote call,
//!     followed by the `pre-deploy` hook.
//! 2.  **Support stack**: the bucket holding bundles and inner documents.
//! 3.  **Artifacts**: code locations for uploaded and skipped functions.
//! 4.  **Composition**: inner and outer documents.
//! 5.  **Upload**: the inner document to the support bucket.
//! 6.  **Convergence**: the main stack with the outer document, followed by
//!     the `post-deploy` hook.
//!
//! The remote side is reached only through the [`control_plane::ControlPlane`]
//! and [`control_plane::ArtifactStore`] traits; [`aws_cli::AwsCli`] implements
//! both on top of the `aws` command line.

pub mod artifacts;
pub mod assets;
pub mod aws_cli;
pub mod compose;
pub mod config;
pub mod control_plane;
pub mod converge;
pub mod error;
pub mod fragments;
pub mod hooks;
pub mod orchestrator;
pub mod output;
pub mod path;
pub mod suggestions;
pub mod template;

#[cfg(test)]
mod path_proptest;
