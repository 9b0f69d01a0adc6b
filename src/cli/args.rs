//! Defines the command-line arguments and subcommands for the Assay CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{Parser, Subcommand};

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "assay",
    version,
    about = "Run the assay engine's built-in self-check tests and suites."
)]
pub struct AssayArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the self-check tests and suites.
    List,
    /// Run a self-check test or suite.
    Run {
        /// Name of the test or suite to run.
        #[arg(default_value = "selfcheck")]
        unit: String,
        /// Propagate the first failure instead of reporting it.
        #[arg(long)]
        debug: bool,
        /// Suppress status lines.
        #[arg(long)]
        silent: bool,
        /// Print a JSON summary instead of colored output.
        #[arg(long)]
        json: bool,
        /// Override how deeply suites may nest within one run.
        #[arg(long, value_name = "N")]
        max_suite_depth: Option<usize>,
    },
}
