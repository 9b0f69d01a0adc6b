//! Handles all user-facing output for the CLI.
//!
//! Status lines and failure reports are colorized here; the engine itself only
//! talks to the sink traits in [`crate::output`].

// ============================================================================
// OUTPUT SINKS: StdoutSink and StderrWarnings implementations
// ============================================================================

use serde::Serialize;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::output::{LogSink, Report, WarningSink};

/// StdoutSink: writes status lines to stdout, colored by outcome.
pub struct StdoutSink {
    stream: StandardStream,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            stream: StandardStream::stdout(ColorChoice::Auto),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for StdoutSink {
    fn emit(&mut self, line: &str, _record: bool) {
        let _ = self.stream.set_color(&status_color(line));
        let _ = writeln!(self.stream, "{}", line);
        let _ = self.stream.reset();
    }
}

/// StderrWarnings: writes failure reports to stderr under a colored header.
pub struct StderrWarnings {
    stream: StandardStream,
}

impl StderrWarnings {
    pub fn new() -> Self {
        Self {
            stream: StandardStream::stderr(ColorChoice::Auto),
        }
    }
}

impl Default for StderrWarnings {
    fn default() -> Self {
        Self::new()
    }
}

impl WarningSink for StderrWarnings {
    fn report(&mut self, owner: &str, text: &str) {
        let _ = self
            .stream
            .set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true));
        let _ = writeln!(self.stream, "Warning ({}):", owner);
        let _ = self.stream.reset();
        let _ = writeln!(self.stream, "{}", text);
    }
}

// ============================================================================
// CORE OUTPUT FUNCTIONS: User-facing CLI output utilities
// ============================================================================

/// Machine-readable result of `assay run --json`.
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub unit: &'a str,
    pub passed: bool,
    pub log: &'a [String],
    pub reports: &'a [Report],
}

pub fn print_summary(summary: &RunSummary<'_>) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

/// Prints one unit per line with its kind.
pub fn print_units(units: &[(String, &'static str)]) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    for (name, kind) in units {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)));
        let _ = write!(stdout, "{:<6}", kind);
        let _ = stdout.reset();
        let _ = writeln!(stdout, "{}", name);
    }
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn status_color(line: &str) -> ColorSpec {
    let mut spec = ColorSpec::new();
    let trimmed = line.trim_start();
    if trimmed.starts_with("PASS") || line.ends_with("passed") {
        spec.set_fg(Some(Color::Green));
    } else if trimmed.starts_with("FAIL") || line.ends_with("FAILED") {
        spec.set_fg(Some(Color::Red)).set_bold(true);
    } else if trimmed.starts_with("SKIP") {
        spec.set_fg(Some(Color::Yellow));
    } else {
        spec.set_bold(true);
    }
    spec
}
