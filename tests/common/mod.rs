//! # Assay Test Harness
//!
//! Shared helpers for integration tests: an engine wired to in-memory sinks,
//! plus accessors for what it logged and reported.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use assay::output::{LogBuffer, Report, SharedLog, SharedWarnings, WarningBuffer};
use assay::{Engine, EngineConfig};

/// An engine whose status lines and reports are captured in memory.
pub struct Harness {
    pub engine: Engine,
    pub log: Rc<RefCell<LogBuffer>>,
    pub warnings: Rc<RefCell<WarningBuffer>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let log = Rc::new(RefCell::new(LogBuffer::new()));
        let warnings = Rc::new(RefCell::new(WarningBuffer::new()));
        let engine = Engine::builder()
            .log(SharedLog::from_rc(log.clone()))
            .warnings(SharedWarnings::from_rc(warnings.clone()))
            .config(config)
            .build();
        Self {
            engine,
            log,
            warnings,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.log.borrow().lines.clone()
    }

    pub fn recorded(&self) -> Vec<String> {
        self.log.borrow().recorded.clone()
    }

    /// Per-member status lines only (`PASS`/`FAIL`).
    pub fn member_lines(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.starts_with("  PASS") || line.starts_with("  FAIL"))
            .collect()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.warnings.borrow().reports.clone()
    }
}

/// Shared event log for ordering assertions.
#[derive(Clone, Default)]
pub struct Events(Rc<RefCell<Vec<String>>>);

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: &str) {
        self.0.borrow_mut().push(event.to_string());
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    /// A hook that records `event` each time it runs.
    pub fn hook(&self, event: &str) -> impl Fn() + 'static {
        let events = self.clone();
        let event = event.to_string();
        move || events.push(&event)
    }
}
