//! The Assay Command-Line Interface.
//!
//! This module is the main entry point for all CLI commands. It registers the
//! self-check units on a fresh engine and dispatches to the subcommand.

use std::cell::RefCell;
use std::process;
use std::rc::Rc;

use clap::Parser;

use crate::cli::args::{AssayArgs, Command};
use crate::cli::output::{RunSummary, StderrWarnings, StdoutSink};
use crate::config::EngineConfig;
use crate::output::{LogBuffer, SharedLog, SharedWarnings, WarningBuffer};
use crate::registry::RunOptions;
use crate::{selfcheck, AssayError, Engine};

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = AssayArgs::parse();

    let result = match args.command {
        Command::List => handle_list(),
        Command::Run {
            unit,
            debug,
            silent,
            json,
            max_suite_depth,
        } => {
            let mut config = EngineConfig::global().clone();
            if debug {
                config = config.debug(true);
            }
            if let Some(depth) = max_suite_depth {
                config = config.max_suite_depth(depth);
            }
            let options = RunOptions::new().silent(silent);
            if json {
                handle_run_json(&unit, config, options)
            } else {
                handle_run(&unit, config, options)
            }
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            process::exit(2);
        }
    }
}

/// Handles the `list` subcommand.
fn handle_list() -> Result<bool, AssayError> {
    let engine = Engine::new();
    selfcheck::register(&engine)?;
    let units: Vec<(String, &'static str)> = engine
        .unit_names()
        .into_iter()
        .filter_map(|name| engine.unit(&name).map(|unit| (name, unit.kind())))
        .collect();
    output::print_units(&units);
    Ok(true)
}

/// Handles the `run` subcommand with colored output.
fn handle_run(unit: &str, config: EngineConfig, options: RunOptions) -> Result<bool, AssayError> {
    let engine = Engine::builder()
        .log(SharedLog::new(StdoutSink::new()))
        .warnings(SharedWarnings::new(StderrWarnings::new()))
        .config(config)
        .build();
    selfcheck::register(&engine)?;
    engine.run_with(unit, options)
}

/// Handles `run --json`: buffers everything and prints one summary.
fn handle_run_json(
    unit: &str,
    config: EngineConfig,
    options: RunOptions,
) -> Result<bool, AssayError> {
    let log = Rc::new(RefCell::new(LogBuffer::new()));
    let warnings = Rc::new(RefCell::new(WarningBuffer::new()));
    let engine = Engine::builder()
        .log(SharedLog::from_rc(log.clone()))
        .warnings(SharedWarnings::from_rc(warnings.clone()))
        .config(config)
        .build();
    selfcheck::register(&engine)?;
    let passed = engine.run_with(unit, options)?;
    let log = log.borrow();
    let warnings = warnings.borrow();
    let summary = RunSummary {
        unit,
        passed,
        log: &log.lines,
        reports: &warnings.reports,
    };
    output::print_summary(&summary).map_err(|e| crate::err_msg!("cannot write summary: {}", e))?;
    Ok(passed)
}
