//! # Output Configuration
//!
//! This module provides utilities for controlling CLI output appearance,
//! including color and emoji support based on terminal capabilities and
//! user preferences, and the rendering of failure reports.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use routestack::output::{OutputConfig, emoji};
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//!
//! // Use emoji helper that respects config
//! println!("{} Deploying...", emoji(&config, "🚀", "[DEPLOY]"));
//! ```

use std::env;

use console::style;

use crate::control_plane::StackEvent;
use crate::error::Error;
use crate::suggestions;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// # Arguments
    /// * `color_flag` - The value of the --color CLI flag: "always", "never", or "auto"
    ///
    /// # Behavior
    /// - `--color=always`: Force colors on (overrides NO_COLOR)
    /// - `--color=never`: Force colors off
    /// - `--color=auto`: Detect based on environment
    ///
    /// In auto mode, colors are disabled if:
    /// - `NO_COLOR` environment variable is set (any value, including empty)
    /// - `CLICOLOR=0` is set
    /// - `TERM=dumb` is set
    /// - stdout is not a TTY (unless `CLICOLOR_FORCE=1`)
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        console::set_colors_enabled(use_color);
        console::set_colors_enabled_stderr(use_color);
        Self { use_color }
    }

    /// Detect whether color output is supported based on environment.
    fn detect_color_support() -> bool {
        // The presence of the variable (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the appropriate string based on color configuration.
///
/// When colors are enabled, returns the emoji. When disabled, returns
/// the plain text alternative.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// Render failed stack events as an aligned table.
pub fn event_table(events: &[StackEvent]) -> String {
    let header = ["Time", "Resource", "Type", "Status", "Reason"];
    let rows: Vec<[String; 5]> = events
        .iter()
        .map(|event| {
            [
                event.timestamp.format("%H:%M:%S").to_string(),
                event.logical_resource_id.clone(),
                event.resource_type.clone(),
                event.resource_status.clone(),
                event.resource_status_reason.clone().unwrap_or_default(),
            ]
        })
        .collect();

    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_row = |cells: [&str; 5]| -> String {
        let mut line = String::new();
        for (index, cell) in cells.iter().enumerate() {
            if index + 1 == cells.len() {
                line.push_str(cell);
            } else {
                line.push_str(&format!("{:<width$}  ", cell, width = widths[index]));
            }
        }
        line.trim_end().to_string()
    };

    let mut lines = vec![format_row(header)];
    for row in &rows {
        lines.push(format_row([&row[0], &row[1], &row[2], &row[3], &row[4]]));
    }
    lines.join("\n")
}

/// Render a library error as a report: kind, reason, failed-event table
/// and possible causes.
pub fn error_report(config: &OutputConfig, error: &Error) -> String {
    let bold = |text: &str| style(text).bold().force_styling(config.use_color).to_string();
    let message = error.to_string();
    let mut report = format!(
        "{} {}\n\n{}",
        emoji(config, "❌", "[ERROR]"),
        style(error.kind()).red().bold().force_styling(config.use_color),
        message
    );

    if let Error::StackFailed { events, .. } = error {
        if !events.is_empty() {
            report.push_str("\n\n");
            report.push_str(&bold("Failed resources"));
            report.push('\n');
            report.push_str(&event_table(events));
        }
    }

    // Configuration errors already carry their hint in the message.
    if let Some(hint) = error.hint().filter(|hint| !message.contains(hint.as_str())) {
        report.push_str(&format!("\n\n{} {}", emoji(config, "💡", "hint:"), hint));
    }

    let causes = suggestions::possible_causes(error);
    if !causes.is_empty() {
        report.push_str("\n\n");
        report.push_str(&bold("Possible causes"));
        for cause in causes {
            report.push_str(&format!("\n  - {}", cause));
        }
    }
    report
}
