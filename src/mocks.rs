//! # Mock/Stub Registry
//!
//! Named callables are reached through an explicit indirection table: code that
//! may be replaced during a test calls [`funcall`] instead of the function
//! directly, and the table resolves the name to its current implementation.
//!
//! ## Layers
//!
//! - **Originals**: the true definitions installed with [`defun`] (plus the
//!   builtins from [`crate::builtins`]).
//! - **Replacements**: stubs and mocks, each owned by the innermost open scope
//!   at the time it was installed. Scopes nest strictly; closing a scope drops
//!   every replacement it owns, which exposes the immediately prior layer again.
//!
//! Resolution walks replacements newest first, skipping mocks while mocks are
//! suspended and stubs while stubs are suspended (see
//! [`without_mocks`]/[`without_stubs`]), and falls back to the original.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::context;
use crate::errors::AssayError;
use crate::Value;

/// The implementation bound to a callable name.
pub type Definition = Rc<dyn Fn(&[Value]) -> Result<Value, AssayError>>;

/// Which kind of replacement a binding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplacementKind {
    Stub,
    Mock,
}

/// One temporarily replaced callable.
#[derive(Clone)]
pub struct MockStubBinding {
    pub target: String,
    /// The definition in effect when the replacement was installed.
    pub previous: Option<Definition>,
    pub replacement: Definition,
    pub kind: ReplacementKind,
}

impl fmt::Debug for MockStubBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockStubBinding")
            .field("target", &self.target)
            .field("previous", &self.previous.as_ref().map(|_| "<fn>"))
            .field("kind", &self.kind)
            .finish()
    }
}

struct ScopeFrame {
    id: u64,
    bindings: Vec<MockStubBinding>,
}

struct FunctionTable {
    originals: HashMap<String, Definition>,
    scopes: Vec<ScopeFrame>,
    next_scope: u64,
}

impl FunctionTable {
    fn with_builtins() -> Self {
        let mut originals: HashMap<String, Definition> = HashMap::new();
        for (name, func) in crate::builtins::standard_functions() {
            originals.insert(name.to_string(), Rc::new(func));
        }
        Self {
            originals,
            scopes: Vec::new(),
            next_scope: 0,
        }
    }

    /// Replacements for `target`, newest first.
    fn replacements<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a MockStubBinding> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.bindings.iter().rev())
            .filter(move |binding| binding.target == target)
    }

    fn resolve(&self, name: &str, mocks: bool, stubs: bool) -> Option<Definition> {
        self.replacements(name)
            .find(|binding| match binding.kind {
                ReplacementKind::Mock => mocks,
                ReplacementKind::Stub => stubs,
            })
            .map(|binding| binding.replacement.clone())
            .or_else(|| self.originals.get(name).cloned())
    }

    fn current_definition(&self, name: &str) -> Option<Definition> {
        self.resolve(name, true, true)
    }

    fn install(&mut self, binding: MockStubBinding) -> Result<(), AssayError> {
        let Some(scope) = self.scopes.last_mut() else {
            return Err(AssayError::NoMockScope {
                target: binding.target,
            });
        };
        scope.bindings.push(binding);
        Ok(())
    }
}

thread_local! {
    static TABLE: RefCell<FunctionTable> = RefCell::new(FunctionTable::with_builtins());
}

fn with_table<R>(f: impl FnOnce(&mut FunctionTable) -> R) -> R {
    TABLE.with(|table| f(&mut table.borrow_mut()))
}

// ============================================================================
// ORIGINAL DEFINITIONS AND CALLS
// ============================================================================

/// Defines (or redefines) the true original implementation of `name`.
pub fn defun<F>(name: &str, func: F)
where
    F: Fn(&[Value]) -> Result<Value, AssayError> + 'static,
{
    with_table(|table| table.originals.insert(name.to_string(), Rc::new(func)));
}

/// Removes the original definition of `name`. Active replacements stay.
pub fn fmakunbound(name: &str) {
    with_table(|table| table.originals.remove(name));
}

/// True when calling `name` right now would resolve to an implementation.
pub fn fboundp(name: &str) -> bool {
    resolve(name).is_some()
}

fn resolve(name: &str) -> Option<Definition> {
    let mocks = context::mocks_active();
    let stubs = context::stubs_active();
    with_table(|table| table.resolve(name, mocks, stubs))
}

/// Calls `name` through the indirection table.
///
/// # Examples
///
/// ```rust
/// use assay::{funcall, Value};
/// let sum = funcall("+", &[Value::from(2), Value::from(3)]).unwrap();
/// assert_eq!(sum, Value::from(5));
/// ```
pub fn funcall(name: &str, args: &[Value]) -> Result<Value, AssayError> {
    let def = resolve(name).ok_or_else(|| AssayError::VoidFunction {
        name: name.to_string(),
    })?;
    def(args)
}

// ============================================================================
// SCOPES
// ============================================================================

/// An open mock/stub scope. Dropping it releases every replacement it owns.
#[must_use = "replacements are released as soon as the scope is dropped"]
pub struct MockScope {
    id: u64,
}

impl Drop for MockScope {
    fn drop(&mut self) {
        let id = self.id;
        let _ = TABLE.try_with(|table| {
            let mut table = table.borrow_mut();
            if let Some(pos) = table.scopes.iter().rposition(|scope| scope.id == id) {
                table.scopes.truncate(pos);
            }
        });
    }
}

/// Opens a fresh scope with no replacements of its own. Replacements made by
/// outer scopes stay in effect.
pub fn open_scope() -> MockScope {
    let id = with_table(|table| {
        table.next_scope += 1;
        let id = table.next_scope;
        table.scopes.push(ScopeFrame {
            id,
            bindings: Vec::new(),
        });
        id
    });
    MockScope { id }
}

/// Runs `block` inside a fresh mock/stub scope, releasing its replacements on
/// every exit path.
pub fn with_mocks_and_stubs<R>(block: impl FnOnce() -> R) -> R {
    let _scope = open_scope();
    block()
}

/// Runs `block` with every active mock suspended.
pub fn without_mocks<R>(block: impl FnOnce() -> R) -> R {
    let _mocks = context::set_mocks_active(false);
    block()
}

/// Runs `block` with every active stub suspended.
pub fn without_stubs<R>(block: impl FnOnce() -> R) -> R {
    let _stubs = context::set_stubs_active(false);
    block()
}

/// Runs `block` against the true originals only.
pub fn without_replacements<R>(block: impl FnOnce() -> R) -> R {
    without_mocks(|| without_stubs(block))
}

// ============================================================================
// INSTALLING REPLACEMENTS
// ============================================================================

/// Stubs `target` to return `nil`.
pub fn stub(target: &str) -> Result<(), AssayError> {
    stub_value(target, Value::Nil)
}

/// Stubs `target` to return a fixed value.
pub fn stub_value(target: &str, value: impl Into<Value>) -> Result<(), AssayError> {
    let value = value.into();
    stub_with(target, move |_| Ok(value.clone()))
}

/// Stubs `target` with a body that receives the call's arguments. The real
/// implementation never runs while stubs are active. A stub on an undefined
/// target degrades to a zero-argument mock.
pub fn stub_with<F>(target: &str, body: F) -> Result<(), AssayError>
where
    F: Fn(&[Value]) -> Result<Value, AssayError> + 'static,
{
    with_table(|table| {
        let previous = table.current_definition(target);
        let binding = match previous {
            Some(_) => MockStubBinding {
                target: target.to_string(),
                previous,
                replacement: Rc::new(body),
                kind: ReplacementKind::Stub,
            },
            None => {
                let name = target.to_string();
                MockStubBinding {
                    target: target.to_string(),
                    previous: None,
                    replacement: Rc::new(move |args: &[Value]| {
                        if !args.is_empty() {
                            return Err(AssayError::arity(&name, "0", args.len()));
                        }
                        body(args)
                    }),
                    kind: ReplacementKind::Mock,
                }
            }
        };
        table.install(binding)
    })
}

/// Replaces `target` with `body` over the parameter list `params`.
///
/// `params` may contain `&optional` and `&rest` markers. Missing optional
/// parameters are bound to `nil`; the `&rest` parameter is bound to a list.
///
/// # Examples
///
/// ```rust
/// use assay::mocks::{funcall, mock, with_mocks_and_stubs};
/// use assay::Value;
/// with_mocks_and_stubs(|| {
///     mock("greet", &["name"], |args| {
///         Ok(Value::from(format!("hi {}", args.get("name").as_str().unwrap_or(""))))
///     })
///     .unwrap();
///     assert_eq!(funcall("greet", &["bob".into()]).unwrap(), Value::from("hi bob"));
/// });
/// ```
pub fn mock<F>(target: &str, params: &[&str], body: F) -> Result<(), AssayError>
where
    F: Fn(&Bindings) -> Result<Value, AssayError> + 'static,
{
    let params = ParamList::parse(target, params)?;
    let name = target.to_string();
    let replacement: Definition = Rc::new(move |args: &[Value]| {
        let bindings = params.bind(&name, args)?;
        body(&bindings)
    });
    with_table(|table| {
        let previous = table.current_definition(target);
        table.install(MockStubBinding {
            target: target.to_string(),
            previous,
            replacement,
            kind: ReplacementKind::Mock,
        })
    })
}

/// Releases the newest replacement of `target` owned by the innermost scope.
/// Returns false (and does nothing) when there is none.
pub fn release(target: &str) -> bool {
    with_table(|table| {
        let Some(scope) = table.scopes.last_mut() else {
            return false;
        };
        match scope.bindings.iter().rposition(|b| b.target == target) {
            Some(pos) => {
                scope.bindings.remove(pos);
                true
            }
            None => false,
        }
    })
}

// ============================================================================
// INTROSPECTION
// ============================================================================

/// Every active replacement across all open scopes, oldest first.
pub fn active_bindings() -> Vec<MockStubBinding> {
    with_table(|table| {
        table
            .scopes
            .iter()
            .flat_map(|scope| scope.bindings.iter().cloned())
            .collect()
    })
}

/// Replacements owned by the innermost open scope.
pub fn scope_bindings() -> Vec<MockStubBinding> {
    with_table(|table| {
        table
            .scopes
            .last()
            .map(|scope| scope.bindings.clone())
            .unwrap_or_default()
    })
}

/// Names of every replaced target.
pub fn active_targets() -> BTreeSet<String> {
    active_bindings().into_iter().map(|b| b.target).collect()
}

pub fn scope_depth() -> usize {
    with_table(|table| table.scopes.len())
}

// ============================================================================
// PARAMETER BINDING
// ============================================================================

/// Arguments of a mock call, bound to the mock's parameter names.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: Vec<(String, Value)>,
}

impl Bindings {
    /// The value bound to `name`, or `nil` when it is unbound.
    pub fn get(&self, name: &str) -> &Value {
        const NIL: &Value = &Value::Nil;
        self.values
            .iter()
            .find(|(param, _)| param == name)
            .map_or(NIL, |(_, value)| value)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().map(|(_, value)| value)
    }
}

#[derive(Debug, Clone)]
struct ParamList {
    required: Vec<String>,
    optional: Vec<String>,
    rest: Option<String>,
}

impl ParamList {
    fn parse(target: &str, params: &[&str]) -> Result<Self, AssayError> {
        let invalid = |reason: &str| AssayError::InvalidArguments {
            assertion: format!("mock {}", target),
            reason: reason.to_string(),
        };
        let mut list = ParamList {
            required: Vec::new(),
            optional: Vec::new(),
            rest: None,
        };
        let mut optional = false;
        let mut iter = params.iter();
        while let Some(param) = iter.next() {
            match *param {
                "&optional" if optional => return Err(invalid("duplicate &optional")),
                "&optional" => optional = true,
                "&rest" => {
                    let Some(name) = iter.next() else {
                        return Err(invalid("&rest needs a parameter name"));
                    };
                    if iter.next().is_some() {
                        return Err(invalid("&rest must be the last parameter"));
                    }
                    list.rest = Some(name.to_string());
                }
                name if optional => list.optional.push(name.to_string()),
                name => list.required.push(name.to_string()),
            }
        }
        Ok(list)
    }

    fn expected(&self) -> String {
        let min = self.required.len();
        match (&self.rest, self.optional.len()) {
            (Some(_), _) => format!("at least {}", min),
            (None, 0) => min.to_string(),
            (None, extra) => format!("{}-{}", min, min + extra),
        }
    }

    fn bind(&self, name: &str, args: &[Value]) -> Result<Bindings, AssayError> {
        let min = self.required.len();
        let max = min + self.optional.len();
        if args.len() < min || (self.rest.is_none() && args.len() > max) {
            return Err(AssayError::arity(name, self.expected(), args.len()));
        }
        let mut values = Vec::with_capacity(max + 1);
        let mut args_iter = args.iter();
        for param in self.required.iter().chain(self.optional.iter()) {
            let value = args_iter.next().cloned().unwrap_or_default();
            values.push((param.clone(), value));
        }
        if let Some(rest) = &self.rest {
            let extra: Vec<Value> = args_iter.cloned().collect();
            let extra = if extra.is_empty() {
                Value::Nil
            } else {
                Value::List(extra)
            };
            values.push((rest.clone(), extra));
        }
        Ok(Bindings { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacement_outside_scope_is_rejected() {
        let err = stub_value("mocks-test-unscoped", 1).unwrap_err();
        assert!(matches!(err, AssayError::NoMockScope { .. }));
    }

    #[test]
    fn nested_scopes_restore_the_immediately_prior_layer() {
        defun("mocks-test-layered", |_| Ok(Value::from("original")));
        with_mocks_and_stubs(|| {
            stub_value("mocks-test-layered", "outer").unwrap();
            with_mocks_and_stubs(|| {
                stub_value("mocks-test-layered", "inner").unwrap();
                assert_eq!(funcall("mocks-test-layered", &[]).unwrap(), Value::from("inner"));
            });
            assert_eq!(funcall("mocks-test-layered", &[]).unwrap(), Value::from("outer"));
        });
        assert_eq!(funcall("mocks-test-layered", &[]).unwrap(), Value::from("original"));
    }

    #[test]
    fn stub_on_undefined_target_degrades_to_mock() {
        with_mocks_and_stubs(|| {
            stub_value("mocks-test-undefined", 7).unwrap();
            let bindings = scope_bindings();
            assert_eq!(bindings[0].kind, ReplacementKind::Mock);
            assert!(bindings[0].previous.is_none());
            assert_eq!(funcall("mocks-test-undefined", &[]).unwrap(), Value::from(7));
            assert!(funcall("mocks-test-undefined", &[Value::T]).is_err());
        });
        assert!(!fboundp("mocks-test-undefined"));
    }

    #[test]
    fn stubs_receive_arguments() {
        defun("mocks-test-args", |_| Ok(Value::Nil));
        with_mocks_and_stubs(|| {
            stub_with("mocks-test-args", |args| Ok(Value::from(args.len()))).unwrap();
            let v = funcall("mocks-test-args", &[Value::T, Value::T]).unwrap();
            assert_eq!(v, Value::from(2));
        });
    }

    #[test]
    fn suspension_exposes_the_true_original() {
        defun("mocks-test-suspend", |_| Ok(Value::from(1)));
        with_mocks_and_stubs(|| {
            mock("mocks-test-suspend", &[], |_| Ok(Value::from(2))).unwrap();
            stub_value("mocks-test-suspend", 3).unwrap();
            assert_eq!(funcall("mocks-test-suspend", &[]).unwrap(), Value::from(3));
            without_stubs(|| {
                assert_eq!(funcall("mocks-test-suspend", &[]).unwrap(), Value::from(2));
            });
            without_replacements(|| {
                assert_eq!(funcall("mocks-test-suspend", &[]).unwrap(), Value::from(1));
            });
            assert_eq!(funcall("mocks-test-suspend", &[]).unwrap(), Value::from(3));
        });
    }

    #[test]
    fn release_of_unknown_target_is_a_noop() {
        with_mocks_and_stubs(|| {
            assert!(!release("mocks-test-never-replaced"));
        });
        assert!(!release("mocks-test-never-replaced"));
    }

    #[test]
    fn mock_parameters_support_optional_and_rest() {
        with_mocks_and_stubs(|| {
            mock("mocks-test-params", &["a", "&optional", "b", "&rest", "more"], |args| {
                Ok(Value::List(vec![
                    args.get("a").clone(),
                    args.get("b").clone(),
                    args.get("more").clone(),
                ]))
            })
            .unwrap();
            let v = funcall("mocks-test-params", &[Value::from(1)]).unwrap();
            assert_eq!(v.to_string(), "(1 nil nil)");
            let v = funcall("mocks-test-params", &[1.into(), 2.into(), 3.into(), 4.into()]).unwrap();
            assert_eq!(v.to_string(), "(1 2 (3 4))");
            let err = funcall("mocks-test-params", &[]).unwrap_err();
            assert!(err.to_string().contains("at least 1"));
        });
    }

    #[test]
    fn scope_is_released_when_block_panics() {
        let before = active_targets();
        let result = std::panic::catch_unwind(|| {
            with_mocks_and_stubs(|| {
                stub("mocks-test-panic").unwrap();
                panic!("boom");
            })
        });
        assert!(result.is_err());
        assert_eq!(active_targets(), before);
        assert_eq!(scope_depth(), 0);
    }
}
