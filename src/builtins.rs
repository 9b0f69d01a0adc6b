//! # Builtin Callables
//!
//! The standard callables every function table starts with. They are installed
//! as true originals, so they can be stubbed or mocked like any user function
//! and are restored by the same scope rules.
//!
//! ## Callables Provided
//!
//! - **Comparison**: `=`, `/=`, `<`, `>`, `<=`, `>=`, `equal`
//! - **Arithmetic**: `+`, `-`, `*`, `/`
//! - **Logic**: `not`, `null`, `identity`
//! - **Lists**: `list`, `length`, `member`
//! - **Strings**: `concat`, `string-match`

use regex::Regex;

use crate::errors::AssayError;
use crate::Value;

/// Builtin function type: pure functions over evaluated arguments.
pub type NativeFn = fn(&[Value]) -> Result<Value, AssayError>;

/// Every builtin with its name.
pub fn standard_functions() -> Vec<(&'static str, NativeFn)> {
    vec![
        ("=", BUILTIN_NUM_EQ),
        ("/=", BUILTIN_NUM_NE),
        ("<", BUILTIN_LT),
        (">", BUILTIN_GT),
        ("<=", BUILTIN_LTE),
        (">=", BUILTIN_GTE),
        ("equal", BUILTIN_EQUAL),
        ("+", BUILTIN_ADD),
        ("-", BUILTIN_SUB),
        ("*", BUILTIN_MUL),
        ("/", BUILTIN_DIV),
        ("not", BUILTIN_NOT),
        ("null", BUILTIN_NOT),
        ("identity", BUILTIN_IDENTITY),
        ("list", BUILTIN_LIST),
        ("length", BUILTIN_LENGTH),
        ("member", BUILTIN_MEMBER),
        ("concat", BUILTIN_CONCAT),
        ("string-match", BUILTIN_STRING_MATCH),
    ]
}

// ============================================================================
// HELPERS
// ============================================================================

fn number(value: &Value, name: &str) -> Result<f64, AssayError> {
    value
        .as_number()
        .ok_or_else(|| AssayError::wrong_type(name, "number", value))
}

fn string<'a>(value: &'a Value, name: &str) -> Result<&'a str, AssayError> {
    value
        .as_str()
        .ok_or_else(|| AssayError::wrong_type(name, "string", value))
}

fn at_least(args: &[Value], min: usize, name: &str) -> Result<(), AssayError> {
    if args.len() < min {
        return Err(AssayError::arity(name, format!("at least {}", min), args.len()));
    }
    Ok(())
}

fn exactly(args: &[Value], n: usize, name: &str) -> Result<(), AssayError> {
    if args.len() != n {
        return Err(AssayError::arity(name, n.to_string(), args.len()));
    }
    Ok(())
}

/// Checks `cmp` over every adjacent pair of numeric arguments.
fn compare_chain(args: &[Value], name: &str, cmp: fn(f64, f64) -> bool) -> Result<Value, AssayError> {
    at_least(args, 1, name)?;
    let nums = args
        .iter()
        .map(|v| number(v, name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::from(nums.windows(2).all(|w| cmp(w[0], w[1]))))
}

/// Folds numeric arguments, staying integral until a float shows up.
fn arith(
    args: &[Value],
    name: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, AssayError> {
    let (first, rest) = args
        .split_first()
        .ok_or_else(|| AssayError::arity(name, "at least 1", 0))?;
    let mut acc = first.clone();
    number(&acc, name)?;
    for arg in rest {
        acc = match (&acc, arg) {
            (Value::Int(a), Value::Int(b)) => Value::Int(int_op(*a, *b).ok_or_else(|| {
                AssayError::Arith {
                    name: name.to_string(),
                    message: format!("cannot compute {} {} {}", a, name, b),
                }
            })?),
            (a, b) => Value::Float(float_op(number(a, name)?, number(b, name)?)),
        };
    }
    Ok(acc)
}

// ============================================================================
// COMPARISON
// ============================================================================

/// Numeric equality across every argument.
///
/// Example:
///   (= 2 2.0) ; => t
pub const BUILTIN_NUM_EQ: NativeFn = |args| compare_chain(args, "=", |a, b| a == b);

pub const BUILTIN_NUM_NE: NativeFn = |args| {
    exactly(args, 2, "/=")?;
    Ok(Value::from(number(&args[0], "/=")? != number(&args[1], "/=")?))
};

pub const BUILTIN_LT: NativeFn = |args| compare_chain(args, "<", |a, b| a < b);
pub const BUILTIN_GT: NativeFn = |args| compare_chain(args, ">", |a, b| a > b);
pub const BUILTIN_LTE: NativeFn = |args| compare_chain(args, "<=", |a, b| a <= b);
pub const BUILTIN_GTE: NativeFn = |args| compare_chain(args, ">=", |a, b| a >= b);

/// Structural equality of two values. Integers and floats are never `equal`.
pub const BUILTIN_EQUAL: NativeFn = |args| {
    exactly(args, 2, "equal")?;
    Ok(Value::from(args[0] == args[1]))
};

// ============================================================================
// ARITHMETIC
// ============================================================================

pub const BUILTIN_ADD: NativeFn = |args| {
    if args.is_empty() {
        return Ok(Value::Int(0));
    }
    arith(args, "+", i64::checked_add, |a, b| a + b)
};

/// Subtraction; with a single argument, negation.
pub const BUILTIN_SUB: NativeFn = |args| {
    if let [only] = args {
        return match only {
            Value::Int(n) => n.checked_neg().map(Value::Int).ok_or_else(|| AssayError::Arith {
                name: "-".to_string(),
                message: format!("cannot negate {}", n),
            }),
            other => Ok(Value::Float(-number(other, "-")?)),
        };
    }
    arith(args, "-", i64::checked_sub, |a, b| a - b)
};

pub const BUILTIN_MUL: NativeFn = |args| {
    if args.is_empty() {
        return Ok(Value::Int(1));
    }
    arith(args, "*", i64::checked_mul, |a, b| a * b)
};

/// Division. Integer division by zero is an arithmetic error.
pub const BUILTIN_DIV: NativeFn = |args| {
    at_least(args, 2, "/")?;
    arith(args, "/", i64::checked_div, |a, b| a / b)
};

// ============================================================================
// LOGIC
// ============================================================================

/// `t` when the argument is nil.
pub const BUILTIN_NOT: NativeFn = |args| {
    exactly(args, 1, "not")?;
    Ok(Value::from(args[0].is_nil()))
};

pub const BUILTIN_IDENTITY: NativeFn = |args| {
    exactly(args, 1, "identity")?;
    Ok(args[0].clone())
};

// ============================================================================
// LISTS
// ============================================================================

/// Builds a list. With no arguments, `nil`.
pub const BUILTIN_LIST: NativeFn = |args| {
    if args.is_empty() {
        return Ok(Value::Nil);
    }
    Ok(Value::List(args.to_vec()))
};

pub const BUILTIN_LENGTH: NativeFn = |args| {
    exactly(args, 1, "length")?;
    match &args[0] {
        Value::Str(s) => Ok(Value::from(s.chars().count())),
        other => other
            .as_list()
            .map(|items| Value::from(items.len()))
            .ok_or_else(|| AssayError::wrong_type("length", "sequence", other)),
    }
};

/// The tail of the list starting at the first `equal` element, or `nil`.
///
/// Example:
///   (member 2 (1 2 3)) ; => (2 3)
pub const BUILTIN_MEMBER: NativeFn = |args| {
    exactly(args, 2, "member")?;
    let items = args[1]
        .as_list()
        .ok_or_else(|| AssayError::wrong_type("member", "list", &args[1]))?;
    Ok(items
        .iter()
        .position(|item| *item == args[0])
        .map_or(Value::Nil, |pos| Value::List(items[pos..].to_vec())))
};

// ============================================================================
// STRINGS
// ============================================================================

pub const BUILTIN_CONCAT: NativeFn = |args| {
    let mut out = String::new();
    for arg in args {
        out.push_str(string(arg, "concat")?);
    }
    Ok(Value::Str(out))
};

/// Index of the first match of a regular expression, or `nil`.
///
/// Example:
///   (string-match "b+" "abbc") ; => 1
pub const BUILTIN_STRING_MATCH: NativeFn = |args| {
    exactly(args, 2, "string-match")?;
    let re = Regex::new(string(&args[0], "string-match")?)?;
    let haystack = string(&args[1], "string-match")?;
    Ok(re
        .find(haystack)
        .map_or(Value::Nil, |m| Value::from(m.start())))
};
