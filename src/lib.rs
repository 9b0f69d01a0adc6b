//! # Assay
//!
//! A unit-test execution engine: named tests and suites, layered fixtures,
//! scoped mocks and stubs with guaranteed restoration, and assertion failures
//! rendered as indented evaluation traces.
//!
//! ```rust
//! use assay::prelude::*;
//!
//! let engine = Engine::new();
//! engine
//!     .define_test("arithmetic", TestOptions::new(), |_| {
//!         should(Check::call("=", [Check::call("+", [lit(2), lit(2)]), lit(4)]))?;
//!         assay::assert_equal!(3 * 3, 9)
//!     })
//!     .unwrap();
//! assert!(engine.run("arithmetic").unwrap());
//! ```

pub mod assertions;
pub mod builtins;
pub mod cli;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod engine;
pub mod errors;
pub mod fixture;
pub mod mocks;
pub mod output;
pub mod registry;
pub mod selfcheck;
pub mod value;

pub use crate::config::EngineConfig;
pub use crate::diagnostics::{lit, Check};
pub use crate::engine::{Engine, EngineBuilder};
pub use crate::errors::{AssayError, FailureKind};
pub use crate::mocks::funcall;
pub use crate::registry::{RunOptions, SuiteOptions, TestOptions};
pub use crate::value::Value;

/// Everything needed to define and run tests.
pub mod prelude {
    pub use crate::assertions::{
        assert_error, fail, should, should_described, should_not, should_not_described, Operand,
    };
    pub use crate::diagnostics::{lit, Check};
    pub use crate::engine::Engine;
    pub use crate::errors::AssayError;
    pub use crate::mocks::{
        defun, funcall, mock, stub, stub_value, stub_with, with_mocks_and_stubs, without_mocks,
        without_stubs,
    };
    pub use crate::output::{LogBuffer, SharedLog, SharedWarnings, WarningBuffer};
    pub use crate::registry::{RunOptions, SuiteOptions, TestOptions};
    pub use crate::value::Value;
}
