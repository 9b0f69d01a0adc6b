//! # Diagnostic Engine
//!
//! Turns a failing check into a nested, value-annotated trace.
//!
//! Checks are built explicitly as a [`Check`] tree rather than introspected
//! from arbitrary code: each evaluable node (a function application or one of
//! the allowed control forms) is paired with the value it produced, and the
//! resulting [`Trace`] renders as one line per node, outermost first.
//!
//! ```text
//! (= (+ 2 2) 5) => nil, expected non-nil
//!   (+ 2 2) => 4
//! ```
//!
//! ## Evaluable forms
//!
//! - function application: [`Check::call`] (through the function table) and
//!   [`Check::apply`] (inline closure)
//! - `and`, `or`
//! - `if`, `when`, `unless`
//! - `progn`
//! - `without-mocks`, `without-stubs`
//!
//! Literals are not evaluable and never get a line of their own.

use std::fmt;
use std::rc::Rc;

use crate::errors::AssayError;
use crate::mocks::{self, Definition};
use crate::Value;

/// An explicit expression tree for the assertion layer.
#[derive(Clone)]
pub enum Check {
    Literal(Value),
    Call {
        name: String,
        args: Vec<Check>,
    },
    Apply {
        label: String,
        args: Vec<Check>,
        func: Definition,
    },
    And(Vec<Check>),
    Or(Vec<Check>),
    If {
        cond: Box<Check>,
        then: Box<Check>,
        otherwise: Box<Check>,
    },
    When(Box<Check>, Vec<Check>),
    Unless(Box<Check>, Vec<Check>),
    Progn(Vec<Check>),
    WithoutMocks(Vec<Check>),
    WithoutStubs(Vec<Check>),
}

/// A literal leaf.
pub fn lit(value: impl Into<Value>) -> Check {
    Check::Literal(value.into())
}

impl Check {
    /// Applies the callable `name`, resolved through the function table.
    pub fn call(name: &str, args: impl IntoIterator<Item = Check>) -> Self {
        Check::Call {
            name: name.to_string(),
            args: args.into_iter().collect(),
        }
    }

    /// Applies an inline function, shown under `label` in traces.
    pub fn apply<F>(label: &str, args: impl IntoIterator<Item = Check>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, AssayError> + 'static,
    {
        Check::Apply {
            label: label.to_string(),
            args: args.into_iter().collect(),
            func: Rc::new(func),
        }
    }

    /// A zero-argument inline application, for wrapping arbitrary code.
    pub fn thunk<F>(label: &str, func: F) -> Self
    where
        F: Fn() -> Result<Value, AssayError> + 'static,
    {
        Check::apply(label, [], move |_| func())
    }

    pub fn and(items: impl IntoIterator<Item = Check>) -> Self {
        Check::And(items.into_iter().collect())
    }

    pub fn or(items: impl IntoIterator<Item = Check>) -> Self {
        Check::Or(items.into_iter().collect())
    }

    pub fn if_(cond: Check, then: Check, otherwise: Check) -> Self {
        Check::If {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn when(cond: Check, body: impl IntoIterator<Item = Check>) -> Self {
        Check::When(Box::new(cond), body.into_iter().collect())
    }

    pub fn unless(cond: Check, body: impl IntoIterator<Item = Check>) -> Self {
        Check::Unless(Box::new(cond), body.into_iter().collect())
    }

    pub fn progn(body: impl IntoIterator<Item = Check>) -> Self {
        Check::Progn(body.into_iter().collect())
    }

    pub fn without_mocks(body: impl IntoIterator<Item = Check>) -> Self {
        Check::WithoutMocks(body.into_iter().collect())
    }

    pub fn without_stubs(body: impl IntoIterator<Item = Check>) -> Self {
        Check::WithoutStubs(body.into_iter().collect())
    }

    /// Source-like text of the check.
    pub fn form(&self) -> String {
        self.to_string()
    }

    fn is_evaluable(&self) -> bool {
        !matches!(self, Check::Literal(_))
    }

    // ------------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------------

    /// Evaluates the check once, recording every evaluable node it visits.
    pub fn evaluate(&self) -> Result<Trace, AssayError> {
        let mut children = Vec::new();
        let value = self.eval_into(&mut children)?;
        Ok(Trace {
            form: self.form(),
            value,
            children,
        })
    }

    /// Evaluates `self` as a child of some parent node, pushing its trace onto
    /// `siblings` when it is evaluable, and returns its value.
    fn eval_child(&self, siblings: &mut Vec<Trace>) -> Result<Value, AssayError> {
        if let Check::Literal(value) = self {
            return Ok(value.clone());
        }
        let trace = self.evaluate()?;
        let value = trace.value.clone();
        siblings.push(trace);
        Ok(value)
    }

    fn eval_into(&self, children: &mut Vec<Trace>) -> Result<Value, AssayError> {
        match self {
            Check::Literal(value) => Ok(value.clone()),
            Check::Call { name, args } => {
                let values = eval_args(args, children)?;
                mocks::funcall(name, &values)
            }
            Check::Apply { args, func, .. } => {
                let values = eval_args(args, children)?;
                func(&values)
            }
            Check::And(items) => {
                let mut last = Value::T;
                for item in items {
                    last = item.eval_child(children)?;
                    if last.is_nil() {
                        break;
                    }
                }
                Ok(last)
            }
            Check::Or(items) => {
                for item in items {
                    let value = item.eval_child(children)?;
                    if value.is_truthy() {
                        return Ok(value);
                    }
                }
                Ok(Value::Nil)
            }
            Check::If {
                cond,
                then,
                otherwise,
            } => {
                if cond.eval_child(children)?.is_truthy() {
                    then.eval_child(children)
                } else {
                    otherwise.eval_child(children)
                }
            }
            Check::When(cond, body) => {
                if cond.eval_child(children)?.is_truthy() {
                    eval_sequence(body, children)
                } else {
                    Ok(Value::Nil)
                }
            }
            Check::Unless(cond, body) => {
                if cond.eval_child(children)?.is_nil() {
                    eval_sequence(body, children)
                } else {
                    Ok(Value::Nil)
                }
            }
            Check::Progn(body) => eval_sequence(body, children),
            Check::WithoutMocks(body) => mocks::without_mocks(|| eval_sequence(body, children)),
            Check::WithoutStubs(body) => mocks::without_stubs(|| eval_sequence(body, children)),
        }
    }
}

fn eval_args(args: &[Check], children: &mut Vec<Trace>) -> Result<Vec<Value>, AssayError> {
    args.iter().map(|arg| arg.eval_child(children)).collect()
}

fn eval_sequence(body: &[Check], children: &mut Vec<Trace>) -> Result<Value, AssayError> {
    let mut last = Value::Nil;
    for item in body {
        last = item.eval_child(children)?;
    }
    Ok(last)
}

fn fmt_form(f: &mut fmt::Formatter<'_>, head: &str, items: &[&Check]) -> fmt::Result {
    write!(f, "({}", head)?;
    for item in items {
        write!(f, " {}", item)?;
    }
    write!(f, ")")
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Literal(value) => match value {
                // Quote lists and symbols so they read as data, not calls.
                Value::List(_) | Value::Symbol(_) => write!(f, "'{}", value),
                _ => write!(f, "{}", value),
            },
            Check::Call { name, args } => fmt_form(f, name, &args.iter().collect::<Vec<_>>()),
            Check::Apply { label, args, .. } => {
                fmt_form(f, label, &args.iter().collect::<Vec<_>>())
            }
            Check::And(items) => fmt_form(f, "and", &items.iter().collect::<Vec<_>>()),
            Check::Or(items) => fmt_form(f, "or", &items.iter().collect::<Vec<_>>()),
            Check::If {
                cond,
                then,
                otherwise,
            } => fmt_form(f, "if", &[&**cond, &**then, &**otherwise]),
            Check::When(cond, body) => {
                fmt_form(f, "when", &std::iter::once(&**cond).chain(body).collect::<Vec<_>>())
            }
            Check::Unless(cond, body) => {
                fmt_form(f, "unless", &std::iter::once(&**cond).chain(body).collect::<Vec<_>>())
            }
            Check::Progn(body) => fmt_form(f, "progn", &body.iter().collect::<Vec<_>>()),
            Check::WithoutMocks(body) => {
                fmt_form(f, "without-mocks", &body.iter().collect::<Vec<_>>())
            }
            Check::WithoutStubs(body) => {
                fmt_form(f, "without-stubs", &body.iter().collect::<Vec<_>>())
            }
        }
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Check({})", self)
    }
}

// ============================================================================
// TRACE AND RENDERING
// ============================================================================

/// An evaluated check node paired with its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub form: String,
    pub value: Value,
    pub children: Vec<Trace>,
}

/// What the assertion expected the checked value to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    NonNil,
    Nil,
}

impl Expectation {
    pub fn is_met_by(&self, value: &Value) -> bool {
        match self {
            Expectation::NonNil => value.is_truthy(),
            Expectation::Nil => value.is_nil(),
        }
    }

    pub fn clause(&self) -> &'static str {
        match self {
            Expectation::NonNil => "expected non-nil",
            Expectation::Nil => "expected nil",
        }
    }
}

/// Renders `trace` as an indented multi-line description, with the
/// expectation clause on the root line. A child whose value is identical to
/// its parent's gets no line of its own; its children move up a level.
pub fn render(trace: &Trace, expectation: Expectation) -> String {
    let mut lines = vec![format!(
        "{} => {}, {}",
        trace.form,
        trace.value,
        expectation.clause()
    )];
    for child in &trace.children {
        render_into(child, &trace.value, 1, &mut lines);
    }
    lines.join("\n")
}

fn render_into(trace: &Trace, parent_value: &Value, depth: usize, lines: &mut Vec<String>) {
    let depth = if trace.value == *parent_value {
        depth
    } else {
        lines.push(format!("{}{} => {}", "  ".repeat(depth), trace.form, trace.value));
        depth + 1
    };
    for child in &trace.children {
        render_into(child, &trace.value, depth, lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_calls_outermost_first() {
        let check = Check::call("=", [Check::call("+", [lit(2), lit(2)]), lit(5)]);
        let trace = check.evaluate().unwrap();
        assert_eq!(
            render(&trace, Expectation::NonNil),
            "(= (+ 2 2) 5) => nil, expected non-nil\n  (+ 2 2) => 4"
        );
    }

    #[test]
    fn pass_through_values_are_not_repeated() {
        let check = Check::and([
            Check::call("identity", [lit(1)]),
            Check::call("null", [lit(1)]),
        ]);
        let trace = check.evaluate().unwrap();
        let rendered = render(&trace, Expectation::NonNil);
        assert_eq!(
            rendered,
            "(and (identity 1) (null 1)) => nil, expected non-nil\n  (identity 1) => 1"
        );
    }

    #[test]
    fn and_short_circuits() {
        let check = Check::and([lit(Value::Nil), Check::call("no-such-function", [])]);
        let trace = check.evaluate().unwrap();
        assert!(trace.value.is_nil());
        assert!(trace.children.is_empty());
    }

    #[test]
    fn conditionals_evaluate_one_branch() {
        let check = Check::if_(
            Check::call("<", [lit(1), lit(2)]),
            lit("yes"),
            Check::call("no-such-function", []),
        );
        assert_eq!(check.evaluate().unwrap().value, Value::from("yes"));
        let unless = Check::unless(lit(Value::T), [lit(1)]);
        assert_eq!(unless.evaluate().unwrap().value, Value::Nil);
        let when = Check::when(lit(Value::T), [lit(1), lit(2)]);
        assert_eq!(when.evaluate().unwrap().value, Value::from(2));
    }

    #[test]
    fn literal_lists_are_quoted_in_forms() {
        let check = Check::call("member", [lit(2), lit(vec![1, 3])]);
        assert_eq!(check.form(), "(member 2 '(1 3))");
    }

    #[test]
    fn errors_propagate_from_evaluation() {
        let err = Check::call("no-such-function", [lit(1)]).evaluate().unwrap_err();
        assert!(matches!(err, AssayError::VoidFunction { .. }));
    }
}
