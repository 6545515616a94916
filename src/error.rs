//! # Error Handling
//!
//! This module defines the centralized error type for `routestack`. It uses
//! `thiserror` to build one `Error` enum covering every failure the library
//! can report, from input validation to remote convergence failures.
//!
//! ## Error classes
//!
//! - **Input validation** (`PathConflict`, `MalformedPath`,
//!   `InvalidPathParameter`, `FragmentConflict`, `ConfigParse`,
//!   `ConfigValidation`): fatal, raised before any remote call.
//! - **Skip without history** (`NeverDeployed`): a function was asked to
//!   reuse its last uploaded artifact but no artifact exists.
//! - **Convergence** (`StackFailed`, `ChangeSetFailed`, `ControlPlane`):
//!   the control plane rejected or failed the update.
//! - **Internal consistency** (`UnknownStackStatus`): never retried.
//!
//! Every variant exposes a short [`Error::kind`] and, where one exists, a
//! remediation [`Error::hint`]. The CLI uses both to render its report.

use thiserror::Error;

use crate::control_plane::StackEvent;

/// Main error type for routestack operations
#[derive(Error, Debug)]
pub enum Error {
    /// Two different literal path segments clean to the same identifier.
    #[error("Path naming conflict: '{existing}' and '{incoming}' both resolve to '{clean}'")]
    PathConflict {
        clean: String,
        existing: String,
        incoming: String,
    },

    /// A route path cannot be split into valid segments.
    #[error("Malformed path '{path}': {message}")]
    MalformedPath { path: String, message: String },

    /// A `{parameter}` segment contains characters outside `[A-Za-z0-9+]`.
    #[error("Invalid path parameter '{segment}' in '{path}'")]
    InvalidPathParameter { path: String, segment: String },

    /// Two fragments tried to define different resources under one logical id.
    #[error("Template fragment conflict: logical id '{logical_id}' is defined twice with different content")]
    FragmentConflict { logical_id: String },

    /// The configuration file could not be parsed.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// The configuration parsed but is semantically invalid.
    #[error("Invalid configuration{}: {message}{}", function.as_ref().map(|f| format!(" for function '{}'", f)).unwrap_or_default(), hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigValidation {
        /// The function definition at fault, if the error is function-scoped
        function: Option<String>,
        message: String,
        hint: Option<String>,
    },

    /// A skip-upload was requested for a function that was never uploaded.
    #[error("Function '{function}' has never been deployed: no stored artifact at '{key}'")]
    NeverDeployed { function: String, key: String },

    /// A call to the remote control plane failed.
    #[error("Control plane error during {operation}: {message}")]
    ControlPlane { operation: String, message: String },

    /// A change preview could not be created.
    #[error("Change set for stack '{stack}' failed: {reason}")]
    ChangeSetFailed { stack: String, reason: String },

    /// The stack reached a terminal failure status.
    #[error("Stack update failed for '{stack}' ({status}): {reason}")]
    StackFailed {
        stack: String,
        status: String,
        reason: String,
        /// Failed resource events observed since polling started, newest first
        events: Vec<StackEvent>,
    },

    /// The control plane reported a status this crate does not know.
    #[error("Unknown stack status: {status}")]
    UnknownStackStatus { status: String },

    /// The stack was expected to exist but was not found.
    #[error("Stack '{stack}' does not exist")]
    StackNotFound { stack: String },

    /// A stack output that the deployment relies on is missing.
    #[error("Stack '{stack}' has no output named '{output}'")]
    MissingOutput { stack: String, output: String },

    /// A user-supplied template or deploy hook failed.
    #[error("Hook '{hook}' failed: {message}")]
    Hook { hook: String, message: String },

    /// Polling was cancelled by the caller.
    #[error("Operation cancelled while waiting for stack '{stack}'")]
    Cancelled { stack: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Short classification shown as the report title.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::PathConflict { .. } => "Path naming conflict",
            Error::MalformedPath { .. } | Error::InvalidPathParameter { .. } => "Invalid path",
            Error::FragmentConflict { .. } => "Template conflict",
            Error::ConfigParse { .. } | Error::ConfigValidation { .. } => "Configuration error",
            Error::NeverDeployed { .. } => "Function never deployed",
            Error::ControlPlane { .. } => "Control plane request failed",
            Error::ChangeSetFailed { .. } => "Change set failed",
            Error::StackFailed { .. } => "Stack update failed",
            Error::UnknownStackStatus { .. } => "Unknown stack status",
            Error::StackNotFound { .. } => "Stack not found",
            Error::MissingOutput { .. } => "Missing stack output",
            Error::Hook { .. } => "Hook failed",
            Error::Cancelled { .. } => "Cancelled",
            Error::Io(_) => "I/O error",
            Error::Yaml(_) | Error::Json(_) | Error::UrlParse(_) => "Serialization error",
        }
    }

    /// Remediation hint, when one is known for this failure.
    pub fn hint(&self) -> Option<String> {
        match self {
            Error::PathConflict { existing, incoming, .. } => Some(format!(
                "Rename '{existing}' or '{incoming}' so they differ by more than punctuation"
            )),
            Error::MalformedPath { .. } => {
                Some("Paths must not begin with '/'; write 'users/{id}', not '/users/{id}'".to_string())
            }
            Error::InvalidPathParameter { .. } => Some(
                "Parameter names may only contain letters, digits and a trailing '+'".to_string(),
            ),
            Error::FragmentConflict { .. } => Some(
                "Two routes produce the same resource name; give nested segments unique names"
                    .to_string(),
            ),
            Error::ConfigParse { hint, .. } | Error::ConfigValidation { hint, .. } => hint.clone(),
            Error::NeverDeployed { function, .. } => Some(format!(
                "Deploy '{function}' once without --skip-upload or --function-name"
            )),
            Error::UnknownStackStatus { .. } => {
                Some("Upgrade routestack; the control plane reported a newer status".to_string())
            }
            Error::StackNotFound { .. } => {
                Some("Run 'routestack deploy' for this stage first".to_string())
            }
            _ => None,
        }
    }

    /// Whether this error was raised before any remote call was attempted.
    pub fn is_input_validation(&self) -> bool {
        matches!(
            self,
            Error::PathConflict { .. }
                | Error::MalformedPath { .. }
                | Error::InvalidPathParameter { .. }
                | Error::FragmentConflict { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
        )
    }

    pub(crate) fn control_plane(operation: &str, message: impl Into<String>) -> Self {
        Error::ControlPlane {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
