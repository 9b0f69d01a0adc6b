//! # Execution Engine
//!
//! Owns the registry of named tests and suites and drives every run.
//!
//! ## Run Protocol
//!
//! - **Suite run**: the suite's `wrap` (if any) surrounds the whole member
//!   loop once. Each member runs inside the suite's fixtures, in its own error
//!   boundary; one failing member never stops the rest. The suite passes when
//!   every member passed (an empty suite passes).
//! - **Test run**: when another test is already executing, the body is called
//!   directly with no fixtures. Otherwise the test runs as a member of its
//!   effective suite (explicit, else defining, else the `no-suite` fallback).
//! - **Batch mode** catches failures (including panics) at the member boundary
//!   and delivers a report to the warning sink. A failing or panicking `wrap`
//!   is caught the same way, around the unit it wraps. **Debug mode** lets
//!   them propagate to the caller; fixtures and teardown still apply.
//! - **Mode**: a test run directly uses the run's `debug` option, else its own
//!   debug default or the config's. A suite run uses the run's option, else the
//!   config's, and that mode governs every member: a member test's own debug
//!   default does not switch a batch suite run into debug mode.
//!
//! Status lines go to the log sink unless the run is silent. The `logged` flag
//! keeps lines out of the persistent record without hiding them.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::config::EngineConfig;
use crate::context;
use crate::errors::AssayError;
use crate::fixture;
use crate::output::{SharedLog, SharedWarnings};
use crate::registry::{
    IntoOutcome, Registry, RunOptions, SuiteOptions, SuiteUnit, TestOptions, TestUnit, Unit,
};

/// Owner of failure reports for tests that run outside any suite.
pub const NO_SUITE: &str = "no-suite";

// ============================================================================
// ENGINE
// ============================================================================

pub struct Engine {
    registry: RefCell<Registry>,
    log: SharedLog,
    warnings: SharedWarnings,
    config: EngineConfig,
    no_suite: Rc<RefCell<SuiteUnit>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`Engine`]. Sinks default to [`NullSink`](crate::output::NullSink)
/// and the configuration to [`EngineConfig::global`].
#[derive(Default)]
pub struct EngineBuilder {
    log: Option<SharedLog>,
    warnings: Option<SharedWarnings>,
    config: Option<EngineConfig>,
}

impl EngineBuilder {
    pub fn log(mut self, log: SharedLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn warnings(mut self, warnings: SharedWarnings) -> Self {
        self.warnings = Some(warnings);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            registry: RefCell::new(Registry::new()),
            log: self.log.unwrap_or_default(),
            warnings: self.warnings.unwrap_or_default(),
            config: self
                .config
                .unwrap_or_else(|| EngineConfig::global().clone()),
            no_suite: Rc::new(RefCell::new(SuiteUnit::new(NO_SUITE))),
        }
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn unit(&self, name: &str) -> Option<Unit> {
        self.registry.borrow().get(name)
    }

    pub fn test(&self, name: &str) -> Option<Rc<TestUnit>> {
        match self.registry.borrow().get(name) {
            Some(Unit::Test(test)) => Some(test),
            _ => None,
        }
    }

    pub fn suite(&self, name: &str) -> Option<Rc<RefCell<SuiteUnit>>> {
        match self.registry.borrow().get(name) {
            Some(Unit::Suite(suite)) => Some(suite),
            _ => None,
        }
    }

    /// Every defined test and suite, in order of first definition.
    pub fn unit_names(&self) -> Vec<String> {
        self.registry.borrow().names()
    }

    // ========================================================================
    // REGISTRATION
    // ========================================================================

    /// Defines (or redefines) a test.
    ///
    /// The test joins every suite named in `options` and, unless
    /// `no_auto_register` is set, the ambient suite of an enclosing
    /// [`define_suite`](Self::define_suite). Its defining suite is the first
    /// explicit suite, else the ambient one.
    pub fn define_test<F, R>(
        &self,
        name: &str,
        options: TestOptions,
        body: F,
    ) -> Result<Rc<TestUnit>, AssayError>
    where
        F: Fn(&Engine) -> R + 'static,
        R: IntoOutcome,
    {
        let ambient = context::ambient_suite().filter(|_| !options.no_auto_register);
        let defining = options.suites.first().cloned().or_else(|| ambient.clone());
        let test = self.registry.borrow_mut().insert_test(TestUnit {
            name: name.to_string(),
            description: options.description,
            run_now: options.run_now,
            debug: options.debug,
            fixtures: options.fixtures,
            suite: defining,
            body: Rc::new(move |engine: &Engine| body(engine).into_outcome()),
        })?;
        for suite in options.suites.iter().chain(ambient.iter()) {
            self.add_member(suite, name)?;
        }
        if test.run_now {
            self.run(name)?;
        }
        Ok(test)
    }

    /// Defines (or redefines) a suite, then calls `members` with this suite as
    /// the ambient suite so that units defined inside register into it.
    pub fn define_suite<F>(
        &self,
        name: &str,
        options: SuiteOptions,
        members: F,
    ) -> Result<Rc<RefCell<SuiteUnit>>, AssayError>
    where
        F: FnOnce(&Engine) -> Result<(), AssayError>,
    {
        let suite = self.registry.borrow_mut().suite_or_create(name)?;
        {
            let mut unit = suite.borrow_mut();
            unit.description = options.description;
            unit.fixtures = options.fixtures;
        }
        let ambient = context::ambient_suite()
            .filter(|parent| !options.no_auto_register && parent != name);
        for parent in options.parents.iter().chain(ambient.iter()) {
            self.add_member(parent, name)?;
        }
        {
            let _ambient = context::enter_ambient_suite(name);
            members(self)?;
        }
        if options.run_now {
            self.run(name)?;
        }
        Ok(suite)
    }

    /// Appends `unit` to `suite`, creating an empty suite if needed. The unit
    /// itself may be defined later. Returns false if it was already a member.
    pub fn add_member(&self, suite: &str, unit: &str) -> Result<bool, AssayError> {
        let suite = self.registry.borrow_mut().suite_or_create(suite)?;
        let added = suite.borrow_mut().add_member(unit);
        Ok(added)
    }

    // ========================================================================
    // RUNNING
    // ========================================================================

    /// Runs a test or suite with its default mode.
    pub fn run(&self, name: &str) -> Result<bool, AssayError> {
        self.run_with(name, RunOptions::default())
    }

    /// Runs in debug mode when the caller is attached to a terminal.
    pub fn run_interactive(&self, name: &str) -> Result<bool, AssayError> {
        let interactive = atty::is(atty::Stream::Stdin) && self.config.interactive_debug;
        self.run_with(name, RunOptions::new().debug(interactive))
    }

    /// Runs a test or suite.
    ///
    /// In batch mode the only error is an unknown unit name; every failure
    /// inside the run becomes `Ok(false)` plus a report. In debug mode the
    /// first failure is returned as-is.
    pub fn run_with(&self, name: &str, options: RunOptions) -> Result<bool, AssayError> {
        let _silent = options.silent.map(context::set_silent);
        let _logged = options.logged.map(context::set_logged);
        let unit = self
            .registry
            .borrow()
            .get(name)
            .ok_or_else(|| AssayError::UnknownUnit {
                name: name.to_string(),
            })?;
        match unit {
            Unit::Test(test) => self.run_test(&test, &options),
            Unit::Suite(suite) => self.run_suite(&suite, &options),
        }
    }

    fn run_test(&self, test: &TestUnit, options: &RunOptions) -> Result<bool, AssayError> {
        if context::current_test().is_some() {
            // The enclosing test provides the environment.
            return Ok((test.body)(self)?.is_truthy());
        }
        let suite = match options.suite.as_ref().or(test.suite.as_ref()) {
            Some(name) => self.registry.borrow_mut().suite_or_create(name)?,
            None => self.no_suite.clone(),
        };
        let debug = options
            .debug
            .unwrap_or(test.debug || self.config.debug);
        let run = || self.run_member_test(&suite, test, debug);
        let wrap = match &test.fixtures.wrap {
            Some(wrap) => wrap,
            None => return run(),
        };
        match within_boundary(debug, || wrap(&run)) {
            Err(error) if !debug => {
                self.emit_member_status(&test.name, false);
                let (owner, description) = {
                    let suite = suite.borrow();
                    (suite.name.clone(), suite.description.clone())
                };
                let report = compose_report(test, &owner, description.as_deref(), &error);
                self.warnings.report(&owner, &report);
                Ok(false)
            }
            outcome => outcome,
        }
    }

    fn run_suite(
        &self,
        suite: &Rc<RefCell<SuiteUnit>>,
        options: &RunOptions,
    ) -> Result<bool, AssayError> {
        let (name, description) = {
            let suite = suite.borrow();
            (suite.name.clone(), suite.description.clone())
        };
        let owner = context::current_suite().unwrap_or_else(|| name.clone());
        let (depth, _expansion) = context::enter_suite_expansion();
        if depth > self.config.max_suite_depth {
            self.emit(&format!(
                "  SKIP  {} (nested more than {} suites deep)",
                name, self.config.max_suite_depth
            ));
            return Ok(true);
        }
        let _current = context::enter_suite(&name);
        let explicit = !options.members.is_empty();
        let members: Vec<String> = if explicit {
            options.members.clone()
        } else {
            suite.borrow().members.iter().cloned().collect()
        };
        let debug = options.debug.unwrap_or(self.config.debug);
        let wrap = suite.borrow().fixtures.wrap.clone();
        let run_all = || -> Result<bool, AssayError> {
            if !explicit {
                self.emit(&format!("Running suite {}...", name));
            }
            let mut passed = true;
            for member in &members {
                passed &= self.run_member(suite, member, debug)?;
            }
            if passed {
                self.emit(&format!("Suite {} passed", name));
            } else {
                self.emit(&format!("Suite {} FAILED", name));
            }
            Ok(passed)
        };
        let wrap = match wrap {
            Some(wrap) => wrap,
            None => return run_all(),
        };
        match within_boundary(debug, || wrap(&run_all)) {
            Err(error) if !debug => {
                self.emit(&format!("Suite {} FAILED", name));
                let report = compose_suite_report(&name, description.as_deref(), &error);
                self.warnings.report(&owner, &report);
                Ok(false)
            }
            outcome => outcome,
        }
    }

    fn run_member(
        &self,
        suite: &Rc<RefCell<SuiteUnit>>,
        member: &str,
        debug: bool,
    ) -> Result<bool, AssayError> {
        let unit = self.registry.borrow().get(member);
        match unit {
            Some(Unit::Test(test)) => self.run_member_test(suite, &test, debug),
            Some(Unit::Suite(nested)) => self.run_suite(&nested, &RunOptions::new().debug(debug)),
            None => {
                let missing = AssayError::UnknownUnit {
                    name: member.to_string(),
                };
                let owner = suite.borrow().name.clone();
                self.emit(&format!("  FAIL  {}", member));
                if debug {
                    return Err(missing);
                }
                self.warnings.report(&owner, &missing.to_string());
                Ok(false)
            }
        }
    }

    /// One test inside one suite: suite fixtures outermost, the test's own
    /// innermost, all inside the member's error boundary.
    fn run_member_test(
        &self,
        suite: &Rc<RefCell<SuiteUnit>>,
        test: &TestUnit,
        debug: bool,
    ) -> Result<bool, AssayError> {
        let (suite_name, suite_description, suite_fixtures) = {
            let suite = suite.borrow();
            (
                suite.name.clone(),
                suite.description.clone(),
                suite.fixtures.clone(),
            )
        };
        let outcome = {
            let _suite = context::enter_suite(&suite_name);
            let _test = context::enter_test(&test.name);
            let layers = [&suite_fixtures, &test.fixtures];
            let body = || (test.body)(self);
            within_boundary(debug, || fixture::run_layered(&layers, &body))
        };
        match outcome {
            Ok(value) => {
                let passed = value.is_truthy();
                self.emit_member_status(&test.name, passed);
                Ok(passed)
            }
            Err(error) => {
                self.emit_member_status(&test.name, false);
                if debug {
                    return Err(error);
                }
                let report = compose_report(test, &suite_name, suite_description.as_deref(), &error);
                self.warnings.report(&suite_name, &report);
                Ok(false)
            }
        }
    }

    fn emit_member_status(&self, name: &str, passed: bool) {
        let status = if passed { "PASS" } else { "FAIL" };
        self.emit(&format!("  {}  {}", status, name));
    }

    fn emit(&self, line: &str) {
        if context::is_silent() {
            return;
        }
        self.log.emit(line, context::is_logged());
    }
}

// ============================================================================
// REPORTS
// ============================================================================

/// Builds the multi-line failure report delivered to the warning sink.
///
/// ```text
/// Test addition failed (assertion)
///   Description: adds small numbers
///   Suite: arithmetic
///   Assertion: should (sum)
///     (= (+ 1 1) 3) => nil, expected non-nil
///       (+ 1 1) => 2
/// ```
pub fn compose_report(
    test: &TestUnit,
    suite: &str,
    suite_description: Option<&str>,
    error: &AssayError,
) -> String {
    let mut lines = vec![format!("Test {} failed ({})", test.name, error.kind())];
    if let Some(description) = &test.description {
        lines.push(format!("  Description: {}", description));
    }
    lines.push(match suite_description {
        Some(description) => format!("  Suite: {} ({})", suite, description),
        None => format!("  Suite: {}", suite),
    });
    push_failure(&mut lines, error);
    lines.join("\n")
}

/// Report for a suite whose `wrap` failed outside any member.
pub fn compose_suite_report(
    suite: &str,
    suite_description: Option<&str>,
    error: &AssayError,
) -> String {
    let mut lines = vec![format!("Suite {} failed ({})", suite, error.kind())];
    if let Some(description) = suite_description {
        lines.push(format!("  Description: {}", description));
    }
    push_failure(&mut lines, error);
    lines.join("\n")
}

fn push_failure(lines: &mut Vec<String>, error: &AssayError) {
    let frames = error.frames();
    if !frames.is_empty() {
        let stack: Vec<String> = frames.iter().map(ToString::to_string).collect();
        lines.push(format!("  Assertion: {}", stack.join(" > ")));
    }
    lines.extend(error.to_string().lines().map(|line| format!("    {}", line)));
}

/// Batch mode turns a panic inside `run` into [`AssayError::Panic`]; debug
/// mode lets it unwind.
fn within_boundary<T>(
    debug: bool,
    run: impl FnOnce() -> Result<T, AssayError>,
) -> Result<T, AssayError> {
    if debug {
        return run();
    }
    panic::catch_unwind(AssertUnwindSafe(run)).unwrap_or_else(|payload| {
        Err(AssayError::Panic {
            message: panic_message(payload),
        })
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
