//! # routestack CLI
//!
//! This is the binary entry point for the `routestack` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Executing the appropriate command based on the parsed arguments.
//! - Rendering failures as a report and exiting with status 1.
//!
//! The core application logic is defined in the `lib.rs` library crate, ensuring
//! that the binary is a thin wrapper around the reusable library functionality.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use routestack::output::{self, OutputConfig};
use routestack::suggestions::UsageError;

fn main() -> ExitCode {
    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are reported through the error path too.
            let failed = e.use_stderr();
            if let Err(print_error) = e.print() {
                eprintln!("{}", print_error);
            }
            return if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let output = cli.output_config();
    match cli.execute(&output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", report(&output, &error));
            ExitCode::FAILURE
        }
    }
}

fn report(output: &OutputConfig, error: &anyhow::Error) -> String {
    let library_error = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<routestack::error::Error>());
    if let Some(error) = library_error {
        return output::error_report(output, error);
    }

    let marker = output::emoji(output, "❌", "[ERROR]");
    if let Some(usage) = error.downcast_ref::<UsageError>() {
        return format!("{} {}\n\n{}", marker, usage.title, usage);
    }
    if error.chain().any(|cause| cause.is::<std::io::Error>()) {
        return format!("{} I/O error\n\n{:#}", marker, error);
    }
    format!(
        "{} Internal error\n\n{:#}\n\n{} This is unexpected; rerun with --log-level debug and report the output",
        marker,
        error,
        output::emoji(output, "💡", "hint:")
    )
}
