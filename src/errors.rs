//! Assay Error Handling
//!
//! Every failure the engine can observe is an [`AssayError`]. Once a failure
//! reaches a batch-mode run boundary the engine only cares about its
//! [`FailureKind`] and its rendered text; everything else is detail for
//! debug-mode callers and `miette` reports.
//!
//! Use [`err_msg!`](crate::err_msg) for message-only unexpected failures.

use miette::Diagnostic;
use std::fmt;
use thiserror::Error;

/// One entry of the assertion stack at the moment an assertion failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFrame {
    pub name: String,
    pub description: Option<String>,
}

impl fmt::Display for AssertionFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(desc) => write!(f, "{} ({})", self.name, desc),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Coarse classification used by run boundaries and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Raised by the assertion layer; carries a rendered diagnostic.
    Assertion,
    /// Anything else raised by test code, fixtures or the engine.
    Unexpected,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Assertion => "assertion",
            FailureKind::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unified error type for all assay failure modes.
#[derive(Debug, Error)]
pub enum AssayError {
    #[error("{message}")]
    Assertion {
        message: String,
        frames: Vec<AssertionFrame>,
    },
    #[error("{message}")]
    Unexpected { message: String },
    #[error("Symbol's function definition is void: {name}")]
    VoidFunction { name: String },
    #[error("Wrong number of arguments to {name}: expected {expected}, got {actual}")]
    Arity {
        name: String,
        expected: String,
        actual: usize,
    },
    #[error("Wrong type argument to {name}: expected {expected}, got {actual}")]
    WrongType {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("Arithmetic error in {name}: {message}")]
    Arith { name: String, message: String },
    #[error("Cannot replace {target} outside of a mock scope")]
    NoMockScope { target: String },
    #[error("No test or suite named {name}")]
    UnknownUnit { name: String },
    #[error("{name} is already defined as a {existing}")]
    NameConflict { name: String, existing: &'static str },
    #[error("Invalid arguments to {assertion}: {reason}")]
    InvalidArguments { assertion: String, reason: String },
    #[error("Invalid regular expression: {0}")]
    Regex(#[from] regex::Error),
    #[error("Test code panicked: {message}")]
    Panic { message: String },
    #[error("Invalid configuration: {message}")]
    Config { message: String },
    /// A non-assertion error raised while an assertion was evaluating.
    #[error("{source}")]
    InAssertion {
        source: Box<AssayError>,
        frames: Vec<AssertionFrame>,
    },
}

impl AssayError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AssayError::Assertion { .. } => FailureKind::Assertion,
            _ => FailureKind::Unexpected,
        }
    }

    /// Assertion stack captured when the failure was raised (empty for
    /// failures raised outside any assertion).
    pub fn frames(&self) -> &[AssertionFrame] {
        match self {
            AssayError::Assertion { frames, .. } | AssayError::InAssertion { frames, .. } => frames,
            _ => &[],
        }
    }

    /// The error as raised, without any assertion stack attached.
    pub fn root(&self) -> &AssayError {
        match self {
            AssayError::InAssertion { source, .. } => source.root(),
            other => other,
        }
    }

    /// Attaches `frames` unless the error already carries an assertion stack.
    pub fn within_assertion(self, frames: Vec<AssertionFrame>) -> Self {
        match self {
            AssayError::Assertion { .. } | AssayError::InAssertion { .. } => self,
            other => AssayError::InAssertion {
                source: Box::new(other),
                frames,
            },
        }
    }

    pub fn wrong_type(name: &str, expected: &str, actual: &crate::Value) -> Self {
        AssayError::WrongType {
            name: name.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn arity(name: &str, expected: impl Into<String>, actual: usize) -> Self {
        AssayError::Arity {
            name: name.to_string(),
            expected: expected.into(),
            actual,
        }
    }

    fn code_suffix(&self) -> &'static str {
        match self {
            AssayError::InAssertion { source, .. } => source.code_suffix(),
            AssayError::Assertion { .. } => "assertion",
            AssayError::Unexpected { .. } => "unexpected",
            AssayError::VoidFunction { .. } => "void_function",
            AssayError::Arity { .. } => "arity",
            AssayError::WrongType { .. } => "wrong_type",
            AssayError::Arith { .. } => "arith",
            AssayError::NoMockScope { .. } => "no_mock_scope",
            AssayError::UnknownUnit { .. } => "unknown_unit",
            AssayError::NameConflict { .. } => "name_conflict",
            AssayError::InvalidArguments { .. } => "invalid_arguments",
            AssayError::Regex(_) => "regex",
            AssayError::Panic { .. } => "panic",
            AssayError::Config { .. } => "config",
        }
    }
}

impl Diagnostic for AssayError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(format!("assay::{}", self.code_suffix())))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match self {
            AssayError::InAssertion { source, .. } => return source.help(),
            AssayError::NoMockScope { .. } => {
                "Install mocks and stubs inside a test run or `with_mocks_and_stubs`."
            }
            AssayError::VoidFunction { .. } => "Define the callable with `defun` before calling it.",
            AssayError::UnknownUnit { .. } => "Define it with `define_test` or `define_suite` first.",
            AssayError::InvalidArguments { .. } => {
                "Pass an optional description followed by (actual, expected) pairs."
            }
            AssayError::Config { .. } => "Check ASSAY_DEBUG and ASSAY_MAX_SUITE_DEPTH.",
            _ => return None,
        };
        Some(Box::new(help))
    }
}

/// Constructs an [`AssayError::Unexpected`] with a formatted message.
///
/// ```rust
/// use assay::{err_msg, AssayError};
/// let e: AssayError = err_msg!("dependency {} unavailable", "db");
/// assert_eq!(e.to_string(), "dependency db unavailable");
/// ```
#[macro_export]
macro_rules! err_msg {
    ($($arg:tt)*) => {
        $crate::AssayError::Unexpected {
            message: format!($($arg)*),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_assertions_are_classified_as_assertions() {
        let assertion = AssayError::Assertion {
            message: "x".into(),
            frames: vec![],
        };
        assert_eq!(assertion.kind(), FailureKind::Assertion);
        assert_eq!(crate::err_msg!("boom").kind(), FailureKind::Unexpected);
        assert_eq!(
            AssayError::VoidFunction { name: "f".into() }.kind(),
            FailureKind::Unexpected
        );
    }

    #[test]
    fn diagnostic_codes_are_namespaced() {
        let e = AssayError::UnknownUnit { name: "s".into() };
        assert_eq!(e.code().map(|c| c.to_string()).as_deref(), Some("assay::unknown_unit"));
        assert!(e.help().is_some());
    }

    #[test]
    fn frames_display_with_description() {
        let frame = AssertionFrame {
            name: "should".into(),
            description: Some("sums".into()),
        };
        assert_eq!(frame.to_string(), "should (sums)");
    }

    #[test]
    fn errors_inside_assertions_keep_text_and_code() {
        let frame = AssertionFrame {
            name: "should".into(),
            description: None,
        };
        let e = AssayError::VoidFunction { name: "f".into() }.within_assertion(vec![frame.clone()]);
        assert_eq!(e.kind(), FailureKind::Unexpected);
        assert_eq!(e.frames(), &[frame.clone()][..]);
        assert_eq!(e.to_string(), "Symbol's function definition is void: f");
        assert!(matches!(e.root(), AssayError::VoidFunction { .. }));
        assert_eq!(e.code().map(|c| c.to_string()).as_deref(), Some("assay::void_function"));
        let again = e.within_assertion(vec![frame.clone(), frame]);
        assert_eq!(again.frames().len(), 1);
    }
}
