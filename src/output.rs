//! # Output Sinks
//!
//! The engine never prints. Status lines go to a [`LogSink`] and failure
//! reports to a [`WarningSink`]; both are injected when the engine is built,
//! which keeps runs testable and lets the CLI decide how to display them.

use std::cell::RefCell;
use std::rc::Rc;

/// Receives one status line per call.
pub trait LogSink {
    /// `record` is false when the line should be displayed but not kept in
    /// any persistent log.
    fn emit(&mut self, line: &str, record: bool);
}

/// Receives structured failure reports.
pub trait WarningSink {
    /// `owner` is the suite the failing test ran in.
    fn report(&mut self, owner: &str, text: &str);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn emit(&mut self, _line: &str, _record: bool) {}
}

impl WarningSink for NullSink {
    fn report(&mut self, _owner: &str, _text: &str) {}
}

// ============================================================================
// IN-MEMORY SINKS
// ============================================================================

/// Collects status lines for tests or programmatic capture.
#[derive(Debug, Default, Clone)]
pub struct LogBuffer {
    /// Every line emitted.
    pub lines: Vec<String>,
    /// The lines that were allowed into the persistent record.
    pub recorded: Vec<String>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_text(&self) -> String {
        self.lines.join("\n")
    }
}

impl LogSink for LogBuffer {
    fn emit(&mut self, line: &str, record: bool) {
        self.lines.push(line.to_string());
        if record {
            self.recorded.push(line.to_string());
        }
    }
}

/// A report delivered to a [`WarningBuffer`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Report {
    pub owner: String,
    pub text: String,
}

#[derive(Debug, Default, Clone)]
pub struct WarningBuffer {
    pub reports: Vec<Report>,
}

impl WarningBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

impl WarningSink for WarningBuffer {
    fn report(&mut self, owner: &str, text: &str) {
        self.reports.push(Report {
            owner: owner.to_string(),
            text: text.to_string(),
        });
    }
}

// ============================================================================
// SHARED HANDLES
// ============================================================================

/// Shared, mutable handle to a log sink.
#[derive(Clone)]
pub struct SharedLog(pub Rc<RefCell<dyn LogSink>>);

impl SharedLog {
    pub fn new<T: LogSink + 'static>(sink: T) -> Self {
        SharedLog(Rc::new(RefCell::new(sink)))
    }

    /// Wraps a sink the caller keeps a typed handle to.
    pub fn from_rc<T: LogSink + 'static>(sink: Rc<RefCell<T>>) -> Self {
        SharedLog(sink)
    }

    pub fn emit(&self, line: &str, record: bool) {
        self.0.borrow_mut().emit(line, record);
    }
}

impl Default for SharedLog {
    fn default() -> Self {
        Self::new(NullSink)
    }
}

/// Shared, mutable handle to a warning sink.
#[derive(Clone)]
pub struct SharedWarnings(pub Rc<RefCell<dyn WarningSink>>);

impl SharedWarnings {
    pub fn new<T: WarningSink + 'static>(sink: T) -> Self {
        SharedWarnings(Rc::new(RefCell::new(sink)))
    }

    pub fn from_rc<T: WarningSink + 'static>(sink: Rc<RefCell<T>>) -> Self {
        SharedWarnings(sink)
    }

    pub fn report(&self, owner: &str, text: &str) {
        self.0.borrow_mut().report(owner, text);
    }
}

impl Default for SharedWarnings {
    fn default() -> Self {
        Self::new(NullSink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_buffer_separates_displayed_from_recorded() {
        let buffer = Rc::new(RefCell::new(LogBuffer::new()));
        let log = SharedLog::from_rc(buffer.clone());
        log.emit("first", true);
        log.emit("second", false);
        assert_eq!(buffer.borrow().lines, vec!["first", "second"]);
        assert_eq!(buffer.borrow().recorded, vec!["first"]);
        assert_eq!(buffer.borrow().as_text(), "first\nsecond");
    }

    #[test]
    fn warning_buffer_keeps_owner() {
        let buffer = Rc::new(RefCell::new(WarningBuffer::new()));
        let warnings = SharedWarnings::from_rc(buffer.clone());
        warnings.report("suite", "text");
        assert_eq!(
            buffer.borrow().reports,
            vec![Report {
                owner: "suite".into(),
                text: "text".into()
            }]
        );
    }
}
