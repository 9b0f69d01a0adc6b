//! # Run Context
//!
//! Dynamically scoped run state: the executing test and suite, the assertion
//! stacks used for diagnostics, mock/stub activation flags, status emission
//! flags and the ambient suite used while definitions are being evaluated.
//!
//! The context is thread-local. It is never assigned directly; every change is
//! made through an `enter_*` function returning a [`ContextGuard`] that restores
//! the previous value when dropped, so state unwinds correctly on normal return,
//! on `?` propagation and during a panic.

use std::cell::RefCell;

use crate::errors::AssertionFrame;

/// Snapshot of the dynamically scoped run state.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub current_test: Option<String>,
    pub current_suite: Option<String>,
    pub assertion_names: Vec<String>,
    pub assertion_descriptions: Vec<Option<String>>,
    pub mocks_active: bool,
    pub stubs_active: bool,
    pub silent: bool,
    pub logged: bool,
    pub ambient_suites: Vec<String>,
    pub suite_depth: usize,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            current_test: None,
            current_suite: None,
            assertion_names: Vec::new(),
            assertion_descriptions: Vec::new(),
            mocks_active: true,
            stubs_active: true,
            silent: false,
            logged: true,
            ambient_suites: Vec::new(),
            suite_depth: 0,
        }
    }
}

thread_local! {
    static CONTEXT: RefCell<RunContext> = RefCell::new(RunContext::default());
}

fn with_context<R>(f: impl FnOnce(&mut RunContext) -> R) -> R {
    CONTEXT.with(|ctx| f(&mut ctx.borrow_mut()))
}

/// Returns a copy of the current context.
pub fn snapshot() -> RunContext {
    with_context(|ctx| ctx.clone())
}

// ============================================================================
// GUARD
// ============================================================================

type Restore = Box<dyn FnOnce(&mut RunContext)>;

/// Restores one piece of the run context when dropped.
#[must_use = "the previous context is restored as soon as the guard is dropped"]
pub struct ContextGuard {
    restore: Option<Restore>,
}

impl ContextGuard {
    fn new(restore: impl FnOnce(&mut RunContext) + 'static) -> Self {
        Self {
            restore: Some(Box::new(restore)),
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(restore) = self.restore.take() {
            // The thread-local may already be gone during thread teardown.
            let _ = CONTEXT.try_with(|ctx| restore(&mut ctx.borrow_mut()));
        }
    }
}

// ============================================================================
// SCOPED ENTRY POINTS
// ============================================================================

pub fn enter_test(name: &str) -> ContextGuard {
    let prev = with_context(|ctx| ctx.current_test.replace(name.to_string()));
    ContextGuard::new(move |ctx| ctx.current_test = prev)
}

pub fn enter_suite(name: &str) -> ContextGuard {
    let prev = with_context(|ctx| ctx.current_suite.replace(name.to_string()));
    ContextGuard::new(move |ctx| ctx.current_suite = prev)
}

/// Pushes an assertion name and description onto the diagnostic stacks.
pub fn enter_assertion(name: &str, description: Option<&str>) -> ContextGuard {
    with_context(|ctx| {
        ctx.assertion_names.push(name.to_string());
        ctx.assertion_descriptions
            .push(description.map(str::to_string));
    });
    ContextGuard::new(|ctx| {
        ctx.assertion_names.pop();
        ctx.assertion_descriptions.pop();
    })
}

pub fn set_mocks_active(active: bool) -> ContextGuard {
    let prev = with_context(|ctx| std::mem::replace(&mut ctx.mocks_active, active));
    ContextGuard::new(move |ctx| ctx.mocks_active = prev)
}

pub fn set_stubs_active(active: bool) -> ContextGuard {
    let prev = with_context(|ctx| std::mem::replace(&mut ctx.stubs_active, active));
    ContextGuard::new(move |ctx| ctx.stubs_active = prev)
}

pub fn set_silent(silent: bool) -> ContextGuard {
    let prev = with_context(|ctx| std::mem::replace(&mut ctx.silent, silent));
    ContextGuard::new(move |ctx| ctx.silent = prev)
}

pub fn set_logged(logged: bool) -> ContextGuard {
    let prev = with_context(|ctx| std::mem::replace(&mut ctx.logged, logged));
    ContextGuard::new(move |ctx| ctx.logged = prev)
}

/// Makes `name` the ambient suite for definitions evaluated under the guard.
pub fn enter_ambient_suite(name: &str) -> ContextGuard {
    with_context(|ctx| ctx.ambient_suites.push(name.to_string()));
    ContextGuard::new(|ctx| {
        ctx.ambient_suites.pop();
    })
}

/// Increments the suite expansion depth and returns the new depth.
pub fn enter_suite_expansion() -> (usize, ContextGuard) {
    let depth = with_context(|ctx| {
        ctx.suite_depth += 1;
        ctx.suite_depth
    });
    (
        depth,
        ContextGuard::new(|ctx| ctx.suite_depth = ctx.suite_depth.saturating_sub(1)),
    )
}

// ============================================================================
// ACCESSORS
// ============================================================================

pub fn current_test() -> Option<String> {
    with_context(|ctx| ctx.current_test.clone())
}

pub fn current_suite() -> Option<String> {
    with_context(|ctx| ctx.current_suite.clone())
}

pub fn ambient_suite() -> Option<String> {
    with_context(|ctx| ctx.ambient_suites.last().cloned())
}

pub fn mocks_active() -> bool {
    with_context(|ctx| ctx.mocks_active)
}

pub fn stubs_active() -> bool {
    with_context(|ctx| ctx.stubs_active)
}

pub fn is_silent() -> bool {
    with_context(|ctx| ctx.silent)
}

pub fn is_logged() -> bool {
    with_context(|ctx| ctx.logged)
}

/// The assertion stack, outermost first.
pub fn assertion_frames() -> Vec<AssertionFrame> {
    with_context(|ctx| {
        ctx.assertion_names
            .iter()
            .zip(ctx.assertion_descriptions.iter())
            .map(|(name, description)| AssertionFrame {
                name: name.clone(),
                description: description.clone(),
            })
            .collect()
    })
}
