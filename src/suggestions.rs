//! # Error Suggestions
//!
//! This module provides helper functions for generating helpful error
//! messages with hints and suggestions. Following CLI recommendations,
//! errors should tell users what went wrong AND how to fix it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crate::suggestions;
//!
//! // Instead of:
//! anyhow::bail!("Configuration file not found: {}", path.display());
//!
//! // Use:
//! return Err(suggestions::config_not_found(path));
//! ```
//!
//! [`possible_causes`] lists the usual reasons behind a failed stack update;
//! the CLI prints them under the failed-event table.

use std::path::Path;

use crate::error::Error;

/// A mistake in how the tool was invoked, carried inside `anyhow::Error`.
///
/// `title` heads the CLI report in place of a library error kind.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct UsageError {
    pub title: &'static str,
    message: String,
}

impl UsageError {
    fn new(title: &'static str, message: String) -> anyhow::Error {
        anyhow::Error::new(Self { title, message })
    }
}

/// Generate an error for when the configuration file is not found.
///
/// Includes hints about:
/// - Creating a new config file
/// - Using the -c/--config flag
/// - Using the ROUTESTACK_CONFIG environment variable
pub fn config_not_found(path: &Path) -> anyhow::Error {
    UsageError::new(
        "Configuration error",
        format!(
            "Configuration file not found: {path}\n\n\
             hint: Create a routestack.yaml file in your project root\n\
             hint: Use -c/--config to specify a different path\n\
             hint: Set ROUTESTACK_CONFIG environment variable",
            path = path.display()
        ),
    )
}

/// Generate an error for a `--function-name` that matches no function.
pub fn unknown_function(name: &str, known: &[&str]) -> anyhow::Error {
    let suggestion = did_you_mean(name, known)
        .map(|s| format!("\nhint: {s}"))
        .unwrap_or_default();

    UsageError::new(
        "Invalid argument",
        format!(
            "Unknown function: {name}{suggestion}\n\n\
             Declared functions are: {names}",
            names = known.join(", ")
        ),
    )
}

/// `Did you mean '<candidate>'?` for the closest candidate, if any is close.
pub fn did_you_mean(input: &str, candidates: &[&str]) -> Option<String> {
    find_similar(input, candidates).map(|s| format!("Did you mean '{s}'?"))
}

/// Hint for a serde "unknown field `x`" message, suggesting a known key.
pub fn unknown_field_hint(message: &str, known: &[&str]) -> Option<String> {
    let rest = message.split("unknown field `").nth(1)?;
    let field = rest.split('`').next()?;
    did_you_mean(field, known)
}

/// Usual causes of a failed stack update, most likely first.
pub fn possible_causes(error: &Error) -> Vec<String> {
    let Error::StackFailed { reason, events, .. } = error else {
        return Vec::new();
    };

    let mut causes = Vec::new();
    let mentions = |needle: &str| {
        reason.contains(needle)
            || events.iter().any(|event| {
                event
                    .resource_status_reason
                    .as_deref()
                    .is_some_and(|r| r.contains(needle))
            })
    };

    if mentions("CNAME") {
        causes.push(
            "The custom domain is already used as an alias by another distribution".to_string(),
        );
    }
    if mentions("limit") || mentions("Limit") {
        causes.push("An account limit was reached; request an increase or remove unused resources".to_string());
    }
    if mentions("Policy") && mentions("denied") {
        causes.push(
            "The stack policy denied a replacement or deletion; rerun with --danger-delete-resources if intended"
                .to_string(),
        );
    }
    causes.push(
        "A resource in the custom template fragment is invalid or conflicts with a generated one"
            .to_string(),
    );
    causes.push("A resource type is not supported in the target region".to_string());
    causes
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
pub(crate) fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Calculate the Levenshtein edit distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut matrix = vec![vec![0usize; b_len + 1]; a_len + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, cell) in matrix[0].iter_mut().enumerate() {
        *cell = j;
    }

    for i in 1..=a_len {
        for j in 1..=b_len {
            let cost = if a_chars[i - 1] == b_chars[j - 1] {
                0
            } else {
                1
            };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[a_len][b_len]
}
