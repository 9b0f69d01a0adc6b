//! # Self-Check Units
//!
//! A small library of tests and suites that exercise the engine end to end:
//! assertions and diagnostics, scoped stubs and mocks, fixture layering and
//! nested test calls. The `assay` binary runs them, and they double as worked
//! examples of the registration API.
//!
//! Everything passing lives under [`ROOT_SUITE`]. [`DEMO_FAILURE`] is kept
//! outside it and fails on purpose, to show what a report looks like.

use std::cell::Cell;
use std::rc::Rc;

use crate::assertions::{should, should_described, should_not};
use crate::diagnostics::{lit, Check};
use crate::engine::Engine;
use crate::errors::AssayError;
use crate::mocks::{self, funcall};
use crate::registry::{SuiteOptions, TestOptions};
use crate::Value;

pub const ROOT_SUITE: &str = "selfcheck";
pub const DEMO_FAILURE: &str = "demo-failure";

const GREETING: &str = "selfcheck-greeting";
const DOUBLE: &str = "selfcheck-double";

/// Defines every self-check unit on `engine`.
pub fn register(engine: &Engine) -> Result<(), AssayError> {
    mocks::defun(GREETING, |args| {
        let name = args.first().and_then(Value::as_str).unwrap_or("world");
        Ok(Value::from(format!("hello {}", name)))
    });
    mocks::defun(DOUBLE, |args| {
        let n = args.first().cloned().unwrap_or_default();
        funcall("*", &[Value::from(2), n])
    });

    engine.define_suite(
        ROOT_SUITE,
        SuiteOptions::new().describe("engine self-check"),
        |engine| {
            arithmetic(engine)?;
            replacements(engine)?;
            fixtures(engine)?;
            nesting(engine)?;
            Ok(())
        },
    )?;

    engine.define_test(
        DEMO_FAILURE,
        TestOptions::new()
            .describe("fails on purpose to show a diagnostic report")
            .no_auto_register(),
        |_| should(Check::call("=", [Check::call("+", [lit(1), lit(1)]), lit(3)])),
    )?;
    Ok(())
}

// ============================================================================
// SUITES
// ============================================================================

fn arithmetic(engine: &Engine) -> Result<(), AssayError> {
    engine.define_suite("selfcheck-arithmetic", SuiteOptions::new(), |engine| {
        engine.define_test("sums-and-products", TestOptions::new(), |_| {
            should(Check::call("=", [Check::call("+", [lit(2), lit(2)]), lit(4)]))?;
            crate::assert_equal!("products"; 3 * 3, 9, 2 * 5, 10)
        })?;
        engine.define_test("membership-and-patterns", TestOptions::new(), |_| {
            crate::assert_member!(2, vec![1, 2, 3])?;
            crate::assert_match!("assay engine", "^assay")
        })?;
        engine.define_test("negative-checks", TestOptions::new(), |_| {
            should_not(Check::call("member", [lit(9), lit(vec![1, 2, 3])]))?;
            let raised = crate::assertions::assert_error(None, "(/ 1 0)", || {
                funcall("/", &[Value::from(1), Value::from(0)])
            })?;
            Ok::<bool, AssayError>(matches!(raised, AssayError::Arith { .. }))
        })?;
        Ok(())
    })?;
    Ok(())
}

fn replacements(engine: &Engine) -> Result<(), AssayError> {
    engine.define_suite("selfcheck-replacements", SuiteOptions::new(), |engine| {
        engine.define_test("stub-overrides-output", TestOptions::new(), |_| {
            mocks::stub_value(GREETING, "stubbed")?;
            let greeting = funcall(GREETING, &[Value::from("bob")])?;
            crate::assert_equal!(greeting, "stubbed")
        })?;
        engine.define_test("assertions-see-originals", TestOptions::new(), |_| {
            mocks::stub_value(GREETING, "stubbed")?;
            should_described(
                "original greeting",
                Check::call("equal", [Check::call(GREETING, [lit("ann")]), lit("hello ann")]),
            )
        })?;
        engine.define_test("mock-replaces-definition", TestOptions::new(), |_| {
            mocks::mock(DOUBLE, &["n", "&optional", "factor"], |args| {
                let factor = if args.get("factor").is_nil() {
                    Value::from(3)
                } else {
                    args.get("factor").clone()
                };
                funcall("*", &[args.get("n").clone(), factor])
            })?;
            let tripled = funcall(DOUBLE, &[Value::from(5)])?;
            crate::assert_equal!(tripled, 15)
        })?;
        engine.define_test("nested-scopes-restore", TestOptions::new(), |_| {
            mocks::stub_value(DOUBLE, 1)?;
            mocks::with_mocks_and_stubs(|| -> Result<(), AssayError> {
                mocks::stub_value(DOUBLE, 2)?;
                crate::assert_equal!(funcall(DOUBLE, &[])?, 2)
            })?;
            crate::assert_equal!(funcall(DOUBLE, &[])?, 1)
        })?;
        Ok(())
    })?;
    Ok(())
}

fn fixtures(engine: &Engine) -> Result<(), AssayError> {
    let entered = Rc::new(Cell::new(0));
    let counter = entered.clone();
    let observed = entered.clone();
    engine.define_suite(
        "selfcheck-fixtures",
        SuiteOptions::new().setup(move || counter.set(counter.get() + 1)),
        move |engine| {
            engine.define_test("suite-setup-ran", TestOptions::new(), move |_| observed.get() > 0)?;
            engine.define_test(
                "fixture-runs-body",
                TestOptions::new().fixture(|body| {
                    mocks::stub_value(GREETING, "from fixture")?;
                    body()
                }),
                |_| crate::assert_equal!(funcall(GREETING, &[])?, "from fixture"),
            )?;
            Ok(())
        },
    )?;
    Ok(())
}

fn nesting(engine: &Engine) -> Result<(), AssayError> {
    engine.define_suite("selfcheck-nesting", SuiteOptions::new(), |engine| {
        // Not a member: on its own its setup stubs the greeting away.
        engine.define_test(
            "greets-without-setup",
            TestOptions::new()
                .setup(|| mocks::stub_value(GREETING, "from setup"))
                .no_auto_register(),
            |_| crate::assert_equal!(funcall(GREETING, &[])?, "hello world"),
        )?;
        engine.define_test("calls-another-test", TestOptions::new(), |engine| {
            engine.run("greets-without-setup")
        })?;
        Ok(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    #[test]
    fn self_check_passes_and_demo_fails() {
        let engine = Engine::builder().config(EngineConfig::default()).build();
        register(&engine).unwrap();
        assert!(engine.run(ROOT_SUITE).unwrap());
        assert!(!engine.run(DEMO_FAILURE).unwrap());
    }
}
