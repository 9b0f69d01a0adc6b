//! # Fixture Composition
//!
//! A [`FixtureSet`] holds the optional environment layers of a test or suite.
//! [`run_layered`] nests a list of sets around a body, outermost first:
//!
//! ```text
//! setup -> fixture(|| <inner layers> -> body) -> teardown
//! ```
//!
//! Every layer is also a mock/stub scope: replacements installed while a layer
//! is active (including by its `setup`) are released when the layer exits.
//! `teardown` runs exactly once for every layer that was entered, whether the
//! inner code returned, failed or panicked.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::errors::AssayError;
use crate::mocks;
use crate::Value;

pub type Hook = Rc<dyn Fn() -> Result<(), AssayError>>;

/// The continuation a fixture calls to run the test body.
pub type Continuation<'a> = &'a dyn Fn() -> Result<Value, AssayError>;

pub type FixtureFn = Rc<dyn Fn(Continuation<'_>) -> Result<Value, AssayError>>;

/// Interceptor around an entire run of a unit.
pub type WrapFn = Rc<dyn Fn(&dyn Fn() -> Result<bool, AssayError>) -> Result<bool, AssayError>>;

/// The four optional environment slots of a test or suite.
#[derive(Clone, Default)]
pub struct FixtureSet {
    pub setup: Option<Hook>,
    pub teardown: Option<Hook>,
    pub fixture: Option<FixtureFn>,
    pub wrap: Option<WrapFn>,
}

impl FixtureSet {
    pub fn is_empty(&self) -> bool {
        self.setup.is_none() && self.teardown.is_none() && self.fixture.is_none() && self.wrap.is_none()
    }

    /// True when the set has any per-run layer (everything but `wrap`).
    pub fn has_layers(&self) -> bool {
        self.setup.is_some() || self.teardown.is_some() || self.fixture.is_some()
    }
}

impl fmt::Debug for FixtureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureSet")
            .field("setup", &self.setup.is_some())
            .field("teardown", &self.teardown.is_some())
            .field("fixture", &self.fixture.is_some())
            .field("wrap", &self.wrap.is_some())
            .finish()
    }
}

// ============================================================================
// TEARDOWN GUARD
// ============================================================================

/// Runs a teardown hook exactly once: explicitly through [`finish`], or from
/// `Drop` when the layer is unwinding.
///
/// [`finish`]: TeardownGuard::finish
struct TeardownGuard {
    hook: Option<Hook>,
}

impl TeardownGuard {
    fn new(hook: Option<Hook>) -> Self {
        Self { hook }
    }

    fn finish(mut self) -> Result<(), AssayError> {
        match self.hook.take() {
            Some(hook) => hook(),
            None => Ok(()),
        }
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        if let Some(hook) = self.hook.take() {
            // Already unwinding; a teardown failure here has nowhere to go.
            let _ = hook();
        }
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Runs `body` inside every set of `layers`, the first set outermost.
pub fn run_layered(
    layers: &[&FixtureSet],
    body: &dyn Fn() -> Result<Value, AssayError>,
) -> Result<Value, AssayError> {
    match layers.split_first() {
        None => body(),
        Some((outer, inner)) => run_layer(outer, &|| run_layered(inner, body)),
    }
}

fn run_layer(
    fixtures: &FixtureSet,
    inner: &dyn Fn() -> Result<Value, AssayError>,
) -> Result<Value, AssayError> {
    let _scope = mocks::open_scope();
    let teardown = TeardownGuard::new(fixtures.teardown.clone());
    let result = enter_layer(fixtures, inner);
    let finished = teardown.finish();
    let value = result?;
    finished?;
    Ok(value)
}

fn enter_layer(
    fixtures: &FixtureSet,
    inner: &dyn Fn() -> Result<Value, AssayError>,
) -> Result<Value, AssayError> {
    if let Some(setup) = &fixtures.setup {
        setup()?;
    }
    match &fixtures.fixture {
        Some(fixture) => invoke_fixture(fixture, inner),
        None => inner(),
    }
}

/// A fixture that never calls its continuation skips the body; that run is
/// reported as a pass (`t`) whatever the fixture returned.
fn invoke_fixture(
    fixture: &FixtureFn,
    inner: &dyn Fn() -> Result<Value, AssayError>,
) -> Result<Value, AssayError> {
    let ran = Cell::new(false);
    let continuation = || {
        ran.set(true);
        inner()
    };
    let value = fixture(&continuation)?;
    if ran.get() {
        Ok(value)
    } else {
        Ok(Value::T)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) -> Hook) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let handle = log.clone();
        let make = move |label: &str| -> Hook {
            let log = handle.clone();
            let label = label.to_string();
            Rc::new(move || {
                log.borrow_mut().push(label.clone());
                Ok(())
            })
        };
        (log, make)
    }

    #[test]
    fn layers_nest_outermost_first() {
        let (log, hook) = recorder();
        let outer = FixtureSet {
            setup: Some(hook("outer setup")),
            teardown: Some(hook("outer teardown")),
            ..Default::default()
        };
        let inner = FixtureSet {
            setup: Some(hook("inner setup")),
            teardown: Some(hook("inner teardown")),
            ..Default::default()
        };
        let body_log = log.clone();
        let value = run_layered(&[&outer, &inner], &|| {
            body_log.borrow_mut().push("body".into());
            Ok(Value::T)
        })
        .unwrap();
        assert_eq!(value, Value::T);
        assert_eq!(
            *log.borrow(),
            vec!["outer setup", "inner setup", "body", "inner teardown", "outer teardown"]
        );
    }

    #[test]
    fn teardown_runs_once_after_body_failure() {
        let (log, hook) = recorder();
        let set = FixtureSet {
            setup: Some(hook("setup")),
            teardown: Some(hook("teardown")),
            ..Default::default()
        };
        let result = run_layered(&[&set], &|| Err(crate::err_msg!("broken")));
        assert!(result.is_err());
        assert_eq!(*log.borrow(), vec!["setup", "teardown"]);
    }

    #[test]
    fn teardown_runs_after_setup_failure() {
        let (log, hook) = recorder();
        let set = FixtureSet {
            setup: Some(Rc::new(|| -> Result<(), AssayError> {
                Err(crate::err_msg!("setup failed"))
            })),
            teardown: Some(hook("teardown")),
            ..Default::default()
        };
        let result = run_layered(&[&set], &|| Ok(Value::T));
        assert_eq!(result.unwrap_err().to_string(), "setup failed");
        assert_eq!(*log.borrow(), vec!["teardown"]);
    }

    #[test]
    fn teardown_failure_fails_a_passing_body() {
        let set = FixtureSet {
            teardown: Some(Rc::new(|| -> Result<(), AssayError> {
                Err(crate::err_msg!("cleanup failed"))
            })),
            ..Default::default()
        };
        let result = run_layered(&[&set], &|| Ok(Value::T));
        assert_eq!(result.unwrap_err().to_string(), "cleanup failed");
    }

    #[test]
    fn fixture_controls_when_body_runs() {
        let (log, hook) = recorder();
        let around = hook("around");
        let set = FixtureSet {
            fixture: Some(Rc::new(move |body: &dyn Fn() -> Result<Value, AssayError>| {
                around()?;
                let value = body()?;
                around()?;
                Ok(value)
            })),
            ..Default::default()
        };
        let body_log = log.clone();
        run_layered(&[&set], &|| {
            body_log.borrow_mut().push("body".into());
            Ok(Value::from(1))
        })
        .unwrap();
        assert_eq!(*log.borrow(), vec!["around", "body", "around"]);
    }

    #[test]
    fn fixture_that_skips_body_passes_silently() {
        let set = FixtureSet {
            fixture: Some(Rc::new(|_body: &dyn Fn() -> Result<Value, AssayError>| {
                Ok(Value::Nil)
            })),
            ..Default::default()
        };
        let value = run_layered(&[&set], &|| Err(crate::err_msg!("never runs"))).unwrap();
        assert_eq!(value, Value::T);
    }

    #[test]
    fn layer_releases_stubs_installed_by_setup() {
        mocks::defun("fixture-test-target", |_| Ok(Value::from("real")));
        let set = FixtureSet {
            setup: Some(Rc::new(|| mocks::stub_value("fixture-test-target", "stubbed"))),
            ..Default::default()
        };
        let value = run_layered(&[&set], &|| mocks::funcall("fixture-test-target", &[])).unwrap();
        assert_eq!(value, Value::from("stubbed"));
        assert_eq!(
            mocks::funcall("fixture-test-target", &[]).unwrap(),
            Value::from("real")
        );
    }

    #[test]
    fn teardown_runs_when_body_panics() {
        let (log, hook) = recorder();
        let set = FixtureSet {
            teardown: Some(hook("teardown")),
            ..Default::default()
        };
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            run_layered(&[&set], &|| panic!("boom"))
        }));
        assert!(result.is_err());
        assert_eq!(*log.borrow(), vec!["teardown"]);
    }
}
