//! # Test and Suite Registry
//!
//! In-memory storage for named tests and suites and the option builders used
//! to define them. Tests and suites share one namespace.
//!
//! ## Registry Invariants
//!
//! - A test's fixtures and defining suite are fixed when it is defined.
//! - Suite membership is ordered by insertion and never holds duplicates.
//! - Referencing an undefined suite materializes it as an empty suite.
//! - Members are stored by name and resolved when the suite runs, so a suite
//!   may list units that are defined later (or itself).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use im::{HashMap, Vector};

use crate::engine::Engine;
use crate::errors::AssayError;
use crate::fixture::{Continuation, FixtureSet};
use crate::Value;

/// The executable part of a test.
pub type TestBody = Rc<dyn Fn(&Engine) -> Result<Value, AssayError>>;

// ============================================================================
// OUTCOMES
// ============================================================================

/// Conversion from whatever a test body returns into its outcome value.
pub trait IntoOutcome {
    fn into_outcome(self) -> Result<Value, AssayError>;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Result<Value, AssayError> {
        Ok(Value::T)
    }
}

impl IntoOutcome for bool {
    fn into_outcome(self) -> Result<Value, AssayError> {
        Ok(Value::from(self))
    }
}

impl IntoOutcome for Value {
    fn into_outcome(self) -> Result<Value, AssayError> {
        Ok(self)
    }
}

impl<T: IntoOutcome> IntoOutcome for Result<T, AssayError> {
    fn into_outcome(self) -> Result<Value, AssayError> {
        self?.into_outcome()
    }
}

// ============================================================================
// UNITS
// ============================================================================

pub struct TestUnit {
    pub name: String,
    pub description: Option<String>,
    pub run_now: bool,
    pub debug: bool,
    pub fixtures: FixtureSet,
    /// The suite the test was defined in, if any.
    pub suite: Option<String>,
    pub body: TestBody,
}

impl fmt::Debug for TestUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestUnit")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("suite", &self.suite)
            .field("fixtures", &self.fixtures)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct SuiteUnit {
    pub name: String,
    pub description: Option<String>,
    pub members: Vector<String>,
    pub fixtures: FixtureSet,
}

impl SuiteUnit {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Appends `member` unless it is already present. Returns true if added.
    pub fn add_member(&mut self, member: &str) -> bool {
        if self.members.iter().any(|m| m == member) {
            return false;
        }
        self.members.push_back(member.to_string());
        true
    }
}

#[derive(Debug, Clone)]
pub enum Unit {
    Test(Rc<TestUnit>),
    Suite(Rc<RefCell<SuiteUnit>>),
}

impl Unit {
    pub fn kind(&self) -> &'static str {
        match self {
            Unit::Test(_) => "test",
            Unit::Suite(_) => "suite",
        }
    }
}

/// Named units, in one namespace.
#[derive(Default)]
pub struct Registry {
    units: HashMap<String, Unit>,
    order: Vector<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Unit> {
        self.units.get(name).cloned()
    }

    /// Names in order of first definition.
    pub fn names(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    fn remember(&mut self, name: &str) {
        if !self.units.contains_key(name) {
            self.order.push_back(name.to_string());
        }
    }

    /// Inserts or replaces a test.
    pub fn insert_test(&mut self, test: TestUnit) -> Result<Rc<TestUnit>, AssayError> {
        if let Some(Unit::Suite(_)) = self.units.get(&test.name) {
            return Err(AssayError::NameConflict {
                name: test.name,
                existing: "suite",
            });
        }
        let name = test.name.clone();
        let test = Rc::new(test);
        self.remember(&name);
        self.units.insert(name, Unit::Test(test.clone()));
        Ok(test)
    }

    /// Returns the suite named `name`, materializing an empty one if needed.
    pub fn suite_or_create(&mut self, name: &str) -> Result<Rc<RefCell<SuiteUnit>>, AssayError> {
        match self.units.get(name) {
            Some(Unit::Suite(suite)) => Ok(suite.clone()),
            Some(Unit::Test(_)) => Err(AssayError::NameConflict {
                name: name.to_string(),
                existing: "test",
            }),
            None => {
                let suite = Rc::new(RefCell::new(SuiteUnit::new(name)));
                self.remember(name);
                self.units.insert(name.to_string(), Unit::Suite(suite.clone()));
                Ok(suite)
            }
        }
    }
}

// ============================================================================
// OPTIONS
// ============================================================================

/// Fixture slot builders shared by test and suite options.
macro_rules! fixture_builders {
    () => {
        /// Runs before the body.
        pub fn setup<F, R>(mut self, setup: F) -> Self
        where
            F: Fn() -> R + 'static,
            R: IntoOutcome,
        {
            self.fixtures.setup = Some(Rc::new(move || setup().into_outcome().map(drop)));
            self
        }

        /// Runs after the body, even when it failed.
        pub fn teardown<F, R>(mut self, teardown: F) -> Self
        where
            F: Fn() -> R + 'static,
            R: IntoOutcome,
        {
            self.fixtures.teardown = Some(Rc::new(move || teardown().into_outcome().map(drop)));
            self
        }

        /// Receives the body as a continuation and decides when to run it.
        pub fn fixture<F>(mut self, fixture: F) -> Self
        where
            F: Fn(Continuation<'_>) -> Result<Value, AssayError> + 'static,
        {
            self.fixtures.fixture = Some(Rc::new(fixture));
            self
        }

        /// Intercepts a whole `run` call on the unit.
        pub fn wrap<F>(mut self, wrap: F) -> Self
        where
            F: Fn(&dyn Fn() -> Result<bool, AssayError>) -> Result<bool, AssayError> + 'static,
        {
            self.fixtures.wrap = Some(Rc::new(wrap));
            self
        }
    };
}

/// Options for [`Engine::define_test`].
#[derive(Debug, Default)]
pub struct TestOptions {
    pub description: Option<String>,
    pub run_now: bool,
    pub debug: bool,
    pub suites: Vec<String>,
    pub fixtures: FixtureSet,
    pub no_auto_register: bool,
}

impl TestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Run the test as soon as it is defined.
    pub fn run_now(mut self) -> Self {
        self.run_now = true;
        self
    }

    /// Run the test in debug mode unless a run says otherwise.
    pub fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    /// Registers the test into `suite`. The first suite named becomes the
    /// test's defining suite.
    pub fn suite(mut self, suite: &str) -> Self {
        self.suites.push(suite.to_string());
        self
    }

    /// Do not add the test to the ambient suite.
    pub fn no_auto_register(mut self) -> Self {
        self.no_auto_register = true;
        self
    }

    fixture_builders!();
}

/// Options for [`Engine::define_suite`].
#[derive(Debug, Default)]
pub struct SuiteOptions {
    pub description: Option<String>,
    pub run_now: bool,
    pub parents: Vec<String>,
    pub fixtures: FixtureSet,
    pub no_auto_register: bool,
}

impl SuiteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn run_now(mut self) -> Self {
        self.run_now = true;
        self
    }

    /// Registers the suite as a member of `parent`.
    pub fn parent(mut self, parent: &str) -> Self {
        self.parents.push(parent.to_string());
        self
    }

    pub fn no_auto_register(mut self) -> Self {
        self.no_auto_register = true;
        self
    }

    fixture_builders!();
}

/// Options for a single [`Engine::run_with`] call.
#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    /// `None` uses the unit's own default.
    pub debug: Option<bool>,
    /// Partial suite run: these members instead of the suite's own.
    pub members: Vec<String>,
    /// Run a test as a member of this suite instead of its defining suite.
    pub suite: Option<String>,
    pub silent: Option<bool>,
    pub logged: Option<bool>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members = members.into_iter().map(Into::into).collect();
        self
    }

    pub fn suite(mut self, suite: &str) -> Self {
        self.suite = Some(suite.to_string());
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = Some(silent);
        self
    }

    pub fn logged(mut self, logged: bool) -> Self {
        self.logged = Some(logged);
        self
    }
}
