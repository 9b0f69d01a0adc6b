// Integration tests for scoped stubs and mocks: restoration, layering and
// suspension while assertions evaluate.

mod common;

use assay::mocks::{
    active_bindings, active_targets, defun, fboundp, funcall, mock, release, scope_bindings, stub,
    stub_value, stub_with, with_mocks_and_stubs, without_mocks, without_stubs, ReplacementKind,
};
use assay::prelude::*;
use assay::assert_equal;
use common::Harness;

#[test]
fn closing_a_scope_restores_the_active_target_set() {
    defun("scoping-a", |_| Ok(Value::from("a")));
    defun("scoping-b", |_| Ok(Value::from("b")));
    with_mocks_and_stubs(|| {
        stub_value("scoping-a", 1).unwrap();
        let before = active_targets();
        let result: Result<(), AssayError> = with_mocks_and_stubs(|| {
            stub_value("scoping-b", 2)?;
            mock("scoping-a", &[], |_| Ok(Value::from(3)))?;
            Err(assay::err_msg!("leave early"))
        });
        assert!(result.is_err());
        assert_eq!(active_targets(), before);
    });
    assert!(active_targets().is_empty());
}

#[test]
fn nested_scopes_restore_the_immediately_prior_layer() {
    defun("scoping-layered", |_| Ok(Value::from("original")));
    with_mocks_and_stubs(|| {
        mock("scoping-layered", &[], |_| Ok(Value::from("outer"))).unwrap();
        with_mocks_and_stubs(|| {
            mock("scoping-layered", &[], |_| Ok(Value::from("inner"))).unwrap();
            assert_eq!(funcall("scoping-layered", &[]).unwrap(), Value::from("inner"));
        });
        assert_eq!(funcall("scoping-layered", &[]).unwrap(), Value::from("outer"));
    });
    assert_eq!(funcall("scoping-layered", &[]).unwrap(), Value::from("original"));
}

#[test]
fn suspension_exposes_true_originals_across_scopes() {
    defun("scoping-mocked", |_| Ok(Value::from("real mock target")));
    defun("scoping-stubbed", |_| Ok(Value::from("real stub target")));
    with_mocks_and_stubs(|| {
        mock("scoping-mocked", &[], |_| Ok(Value::from("mocked"))).unwrap();
        with_mocks_and_stubs(|| {
            stub_value("scoping-stubbed", "stubbed").unwrap();
            without_mocks(|| {
                assert_eq!(funcall("scoping-mocked", &[]).unwrap(), Value::from("real mock target"));
                assert_eq!(funcall("scoping-stubbed", &[]).unwrap(), Value::from("stubbed"));
            });
            without_stubs(|| {
                assert_eq!(funcall("scoping-mocked", &[]).unwrap(), Value::from("mocked"));
                assert_eq!(funcall("scoping-stubbed", &[]).unwrap(), Value::from("real stub target"));
            });
            assert_eq!(funcall("scoping-stubbed", &[]).unwrap(), Value::from("stubbed"));
        });
    });
}

#[test]
fn stubs_see_arguments_but_not_the_real_body() {
    defun("scoping-echo", |_| Err(assay::err_msg!("real body ran")));
    with_mocks_and_stubs(|| {
        stub_with("scoping-echo", |args| Ok(Value::from(args.len()))).unwrap();
        assert_eq!(
            funcall("scoping-echo", &[Value::from(1), Value::from(2)]).unwrap(),
            Value::from(2)
        );
        assert_eq!(scope_bindings()[0].kind, ReplacementKind::Stub);
        assert!(scope_bindings()[0].previous.is_some());
    });
}

#[test]
fn stub_of_undefined_target_becomes_a_mock() {
    assert!(!fboundp("scoping-undefined"));
    with_mocks_and_stubs(|| {
        stub("scoping-undefined").unwrap();
        let binding = active_bindings().pop().unwrap();
        assert_eq!(binding.kind, ReplacementKind::Mock);
        assert!(binding.previous.is_none());
        assert_eq!(funcall("scoping-undefined", &[]).unwrap(), Value::Nil);
        assert!(funcall("scoping-undefined", &[Value::T]).is_err());
    });
    assert!(!fboundp("scoping-undefined"));
}

#[test]
fn replacement_outside_a_scope_is_an_error() {
    let err = stub_value("scoping-nowhere", 1).unwrap_err();
    assert!(matches!(err, AssayError::NoMockScope { .. }));
    assert!(!release("scoping-nowhere"));
}

#[test]
fn assertions_inside_a_mocked_test_check_real_code() {
    let h = Harness::new();
    defun("scoping-price", |_| Ok(Value::from(100)));
    h.engine
        .define_test("discounted", TestOptions::new(), |_| {
            stub_value("scoping-price", 50)?;
            // Operands are evaluated by the test and see the stub.
            assert_equal!(funcall("scoping-price", &[])?, 50)?;
            // The checked tree is evaluated with every replacement suspended.
            should(Check::call("=", [Check::call("scoping-price", []), lit(100)]))
        })
        .unwrap();
    assert!(h.engine.run("discounted").unwrap());
    assert!(active_targets().is_empty());
}

#[test]
fn fixture_layer_releases_what_setup_installed() {
    let h = Harness::new();
    defun("scoping-clock", |_| Ok(Value::from("now")));
    h.engine
        .define_suite(
            "frozen",
            SuiteOptions::new().setup(|| stub_value("scoping-clock", "noon")),
            |e| {
                e.define_test("reads-clock", TestOptions::new(), |_| {
                    assert_equal!(funcall("scoping-clock", &[])?, "noon")
                })?;
                Ok(())
            },
        )
        .unwrap();
    assert!(h.engine.run("frozen").unwrap());
    assert_eq!(funcall("scoping-clock", &[]).unwrap(), Value::from("now"));
}

#[test]
fn release_drops_only_the_newest_binding_of_the_innermost_scope() {
    defun("scoping-release", |_| Ok(Value::from(0)));
    with_mocks_and_stubs(|| {
        stub_value("scoping-release", 1).unwrap();
        stub_value("scoping-release", 2).unwrap();
        assert!(release("scoping-release"));
        assert_eq!(funcall("scoping-release", &[]).unwrap(), Value::from(1));
        assert!(!release("scoping-unknown"));
    });
}
