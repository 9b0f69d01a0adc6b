//! # Assertions
//!
//! Two families of checks, both of which record their name and description on
//! the run context's assertion stacks for as long as they run:
//!
//! - **Tree assertions** ([`should`], [`should_not`]): evaluate a [`Check`]
//!   with every mock and stub suspended and, on failure, raise the rendered
//!   diagnostic trace.
//! - **Simple assertions** ([`assert_equal`], [`assert_member`],
//!   [`assert_match`]): compare operands the caller already evaluated and
//!   report `"X was A, expected B"`.
//!
//! Simple assertions take an optional description followed by a positive,
//! even number of operands, checked pairwise. The macros of the same name
//! label each operand with its source text:
//!
//! ```rust
//! use assay::{assert_equal, AssayError};
//! fn body() -> Result<(), AssayError> {
//!     assert_equal!("arithmetic"; 2 + 2, 4, 3 * 3, 9)
//! }
//! assert!(body().is_ok());
//! ```

use difference::{Changeset, Difference};

use crate::context;
use crate::diagnostics::{render, Check, Expectation};
use crate::errors::AssayError;
use crate::mocks::{self, funcall};
use crate::Value;

/// An evaluated argument of a simple assertion, with the text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub label: String,
    pub value: Value,
}

impl Operand {
    pub fn new(label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

fn failure(message: String) -> AssayError {
    AssayError::Assertion {
        message,
        frames: context::assertion_frames(),
    }
}

/// Errors other than assertion failures keep the stack they were raised under.
fn attach_frames(error: AssayError) -> AssayError {
    error.within_assertion(context::assertion_frames())
}

// ============================================================================
// TREE ASSERTIONS
// ============================================================================

/// Fails unless `check` evaluates to non-nil. Returns the checked value.
pub fn should(check: Check) -> Result<Value, AssayError> {
    assert_tree("should", None, check, Expectation::NonNil)
}

pub fn should_described(description: &str, check: Check) -> Result<Value, AssayError> {
    assert_tree("should", Some(description), check, Expectation::NonNil)
}

/// Fails unless `check` evaluates to nil.
pub fn should_not(check: Check) -> Result<Value, AssayError> {
    assert_tree("should-not", None, check, Expectation::Nil)
}

pub fn should_not_described(description: &str, check: Check) -> Result<Value, AssayError> {
    assert_tree("should-not", Some(description), check, Expectation::Nil)
}

fn assert_tree(
    name: &str,
    description: Option<&str>,
    check: Check,
    expectation: Expectation,
) -> Result<Value, AssayError> {
    let _frame = context::enter_assertion(name, description);
    let trace = mocks::without_replacements(|| check.evaluate()).map_err(attach_frames)?;
    if expectation.is_met_by(&trace.value) {
        return Ok(trace.value);
    }
    Err(failure(render(&trace, expectation)))
}

// ============================================================================
// SIMPLE ASSERTIONS
// ============================================================================

/// Checks each `(actual, expected)` pair with `equal`.
pub fn assert_equal(description: Option<&str>, operands: &[Operand]) -> Result<(), AssayError> {
    check_pairs("assert-equal", description, operands, |actual, expected| {
        if funcall("equal", &[actual.value.clone(), expected.value.clone()])?.is_truthy() {
            return Ok(None);
        }
        let mut message = format!(
            "{} was {}, expected {}",
            actual.label, actual.value, expected.value
        );
        if let (Some(a), Some(e)) = (actual.value.as_str(), expected.value.as_str()) {
            if a.contains('\n') || e.contains('\n') {
                message.push('\n');
                message.push_str(&line_diff(e, a));
            }
        }
        Ok(Some(message))
    })
}

/// Checks each `(element, list)` pair with `member`.
pub fn assert_member(description: Option<&str>, operands: &[Operand]) -> Result<(), AssayError> {
    check_pairs("assert-member", description, operands, |element, list| {
        if funcall("member", &[element.value.clone(), list.value.clone()])?.is_truthy() {
            return Ok(None);
        }
        Ok(Some(format!(
            "{} was {}, expected a member of {}",
            element.label, element.value, list.value
        )))
    })
}

/// Checks each `(string, regex)` pair with `string-match`.
pub fn assert_match(description: Option<&str>, operands: &[Operand]) -> Result<(), AssayError> {
    check_pairs("assert-match", description, operands, |string, pattern| {
        if funcall("string-match", &[pattern.value.clone(), string.value.clone()])?.is_truthy() {
            return Ok(None);
        }
        Ok(Some(format!(
            "{} was {}, expected a match for {}",
            string.label, string.value, pattern.value
        )))
    })
}

/// Fails unless `body` returns an error. Returns the error it raised.
pub fn assert_error<F>(description: Option<&str>, label: &str, body: F) -> Result<AssayError, AssayError>
where
    F: FnOnce() -> Result<Value, AssayError>,
{
    let _frame = context::enter_assertion("assert-error", description);
    match body() {
        Err(raised) => Ok(raised),
        Ok(value) => Err(failure(format!(
            "{} was {}, expected an error",
            label, value
        ))),
    }
}

/// Raises an unexpected failure from test code.
pub fn fail(message: impl Into<String>) -> Result<Value, AssayError> {
    Err(AssayError::Unexpected {
        message: message.into(),
    })
}

fn check_pairs<F>(
    name: &str,
    description: Option<&str>,
    operands: &[Operand],
    check: F,
) -> Result<(), AssayError>
where
    F: Fn(&Operand, &Operand) -> Result<Option<String>, AssayError>,
{
    let _frame = context::enter_assertion(name, description);
    if operands.is_empty() || operands.len() % 2 != 0 {
        return Err(AssayError::InvalidArguments {
            assertion: name.to_string(),
            reason: format!(
                "expected a positive, even number of operands, got {}",
                operands.len()
            ),
        });
    }
    for pair in operands.chunks(2) {
        let verdict =
            mocks::without_replacements(|| check(&pair[0], &pair[1])).map_err(attach_frames)?;
        if let Some(message) = verdict {
            return Err(failure(message));
        }
    }
    Ok(())
}

fn line_diff(expected: &str, actual: &str) -> String {
    let changeset = Changeset::new(expected, actual, "\n");
    let mut lines = Vec::new();
    for diff in &changeset.diffs {
        let (prefix, text) = match diff {
            Difference::Same(x) => (" ", x),
            Difference::Add(x) => ("+", x),
            Difference::Rem(x) => ("-", x),
        };
        lines.extend(text.lines().map(|line| format!("{}{}", prefix, line)));
    }
    lines.join("\n")
}

// ============================================================================
// MACROS
// ============================================================================

/// Builds an [`Operand`] labelled with the expression's source text.
#[macro_export]
macro_rules! operand {
    ($e:expr) => {
        $crate::assertions::Operand::new(stringify!($e), $e)
    };
}

/// `assert_equal!([description;] actual, expected, ...)`
#[macro_export]
macro_rules! assert_equal {
    ($desc:literal; $($e:expr),+ $(,)?) => {
        $crate::assertions::assert_equal(Some($desc), &[$($crate::operand!($e)),+])
    };
    ($($e:expr),+ $(,)?) => {
        $crate::assertions::assert_equal(None, &[$($crate::operand!($e)),+])
    };
}

/// `assert_member!([description;] element, list, ...)`
#[macro_export]
macro_rules! assert_member {
    ($desc:literal; $($e:expr),+ $(,)?) => {
        $crate::assertions::assert_member(Some($desc), &[$($crate::operand!($e)),+])
    };
    ($($e:expr),+ $(,)?) => {
        $crate::assertions::assert_member(None, &[$($crate::operand!($e)),+])
    };
}

/// `assert_match!([description;] string, regex, ...)`
#[macro_export]
macro_rules! assert_match {
    ($desc:literal; $($e:expr),+ $(,)?) => {
        $crate::assertions::assert_match(Some($desc), &[$($crate::operand!($e)),+])
    };
    ($($e:expr),+ $(,)?) => {
        $crate::assertions::assert_match(None, &[$($crate::operand!($e)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::lit;
    use crate::mocks::{defun, stub_value, with_mocks_and_stubs};

    #[test]
    fn equal_reports_label_value_and_expectation() {
        let err = crate::assert_equal!(1 + 1, 3).unwrap_err();
        assert_eq!(err.to_string(), "1 + 1 was 2, expected 3");
        assert_eq!(err.frames()[0].name, "assert-equal");
    }

    #[test]
    fn odd_operand_count_is_rejected() {
        let err = assert_equal(None, &[Operand::new("a", 1)]).unwrap_err();
        assert!(matches!(err, AssayError::InvalidArguments { .. }));
        let err = assert_equal(Some("empty"), &[]).unwrap_err();
        assert!(matches!(err, AssayError::InvalidArguments { .. }));
    }

    #[test]
    fn every_pair_shares_the_description() {
        let err = crate::assert_equal!("pairs"; 1, 1, 2, 3).unwrap_err();
        assert_eq!(err.frames()[0].description.as_deref(), Some("pairs"));
        assert!(err.to_string().starts_with("2 was 2"));
    }

    #[test]
    fn multiline_strings_get_a_diff() {
        let err = assert_equal(
            None,
            &[Operand::new("text", "a\nb"), Operand::new("expected", "a\nc")],
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("-c"));
        assert!(message.contains("+b"));
    }

    #[test]
    fn member_and_match() {
        assert!(crate::assert_member!(2, vec![1, 2, 3]).is_ok());
        let err = crate::assert_member!(5, vec![1, 2]).unwrap_err();
        assert_eq!(err.to_string(), "5 was 5, expected a member of (1 2)");
        assert!(crate::assert_match!("hello world", "wor").is_ok());
        let err = crate::assert_match!("abc", "^z").unwrap_err();
        assert!(err.to_string().contains("expected a match for \"^z\""));
    }

    #[test]
    fn assert_error_returns_the_raised_error() {
        let raised = assert_error(None, "(boom)", || fail("boom")).unwrap();
        assert_eq!(raised.to_string(), "boom");
        let err = assert_error(None, "(quiet)", || Ok(Value::T)).unwrap_err();
        assert_eq!(err.to_string(), "(quiet) was t, expected an error");
    }

    #[test]
    fn should_renders_trace_with_expectation() {
        let err = should(Check::call("=", [lit(1), lit(2)])).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("(= 1 2) => nil, expected non-nil"));
        let err = should_not(Check::call("=", [lit(1), lit(1)])).unwrap_err();
        assert!(err.to_string().ends_with("expected nil"));
    }

    #[test]
    fn evaluation_errors_carry_the_assertion_stack() {
        let err = should_described("orders", Check::call("<", [lit("a"), lit(1)])).unwrap_err();
        assert!(matches!(err.root(), AssayError::WrongType { .. }));
        assert_eq!(err.frames()[0].to_string(), "should (orders)");
        assert!(err.to_string().starts_with("Wrong type argument to <"));
    }

    #[test]
    fn tree_assertions_see_true_originals() {
        defun("assertions-test-answer", |_| Ok(Value::from(1)));
        with_mocks_and_stubs(|| {
            stub_value("assertions-test-answer", 42).unwrap();
            assert_eq!(funcall("assertions-test-answer", &[]).unwrap(), Value::from(42));
            let value = should(Check::call("assertions-test-answer", [])).unwrap();
            assert_eq!(value, Value::from(1));
        });
    }

    #[test]
    fn simple_assertions_ignore_mocked_predicates() {
        with_mocks_and_stubs(|| {
            stub_value("equal", Value::T).unwrap();
            assert!(crate::assert_equal!(1, 2).is_err());
        });
    }

    #[test]
    fn assertion_stack_is_empty_after_failure() {
        let _ = should_described("doomed", Check::call("null", [lit(1)]));
        assert!(context::assertion_frames().is_empty());
    }
}
