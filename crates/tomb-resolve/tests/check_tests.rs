//! Elaboration tests: diagnostics and in-place annotation.

use tomb_ast::{ExprKind, Literal, SourceText, Stmt, Type};
use tomb_resolve::elaborate;

fn check(source: &str) -> tomb_resolve::CheckedUnit {
    let text = SourceText::new(source);
    let unit = tomb_parser::parse(&text).expect("parse failed");
    elaborate(unit).expect("elaboration failed")
}

fn check_err(source: &str) -> tomb_ast::CompilerError {
    let text = SourceText::new(source);
    let unit = tomb_parser::parse(&text).expect("parse failed");
    elaborate(unit).expect_err("elaboration unexpectedly succeeded")
}

#[test]
fn test_duplicate_method_rejected() {
    let err = check_err(
        r#"
        contract test {
            public testme(): number { return 1; }
            public testme(): number { return 2; }
        }
        "#,
    );
    assert!(err.message.contains("duplicate"));
    assert!(err.message.contains("testme"));
}

#[test]
fn test_decimal_precision_overflow() {
    let err = check_err(
        r#"
        contract test {
            global amount: decimal<3>;
            constructor(owner: address) {
                amount = 2.4587;
            }
        }
        "#,
    );
    assert!(err.message.contains("precision"));
}

#[test]
fn test_decimal_literal_within_precision() {
    let checked = check(
        r#"
        contract test {
            global amount: decimal<4>;
            constructor(owner: address) {
                amount = 2.45;
            }
        }
        "#,
    );
    // 2.45 widens to 4 places: raw 24500.
    let ctor = checked.unit.modules[0].method("constructor").unwrap();
    match &ctor.body.stmts[0] {
        Stmt::Assign { value, .. } => match &value.kind {
            ExprKind::Literal(Literal::Decimal { raw, places }) => {
                assert_eq!(*places, 4);
                assert_eq!(raw.to_string(), "24500");
            }
            other => panic!("expected rescaled decimal literal, got {other:?}"),
        },
        other => panic!("expected assignment, got {other:?}"),
    }
}

#[test]
fn test_too_many_arguments() {
    let err = check_err(
        r#"
        contract test {
            private mycall(x: number): number { return x; }
            public run(): number { return this.mycall(2, 3); }
        }
        "#,
    );
    assert!(err.message.contains("too many arguments"));
}

#[test]
fn test_local_type_inference() {
    let checked = check(
        r#"
        contract test {
            public calculate(): string {
                local a = "hello ";
                local b = "world";
                return a + b;
            }
        }
        "#,
    );
    let body = &checked.unit.modules[0].methods[0].body;
    match &body.stmts[0] {
        Stmt::Local { ty, slot, .. } => {
            assert!(matches!(**ty.as_ref().unwrap(), Type::String));
            assert_eq!(*slot, Some(0));
        }
        other => panic!("expected local, got {other:?}"),
    }
}

#[test]
fn test_string_literal_folding() {
    let checked = check(
        r#"
        contract test {
            public greet(): string {
                return "hello " + "world";
            }
        }
        "#,
    );
    let body = &checked.unit.modules[0].methods[0].body;
    match &body.stmts[0] {
        Stmt::Return { value: Some(v), .. } => {
            assert!(
                matches!(&v.kind, ExprKind::Literal(Literal::String(s)) if s == "hello world")
            );
        }
        other => panic!("expected return, got {other:?}"),
    }
}

#[test]
fn test_string_concat_inserts_cast() {
    let checked = check(
        r#"
        contract test {
            public describe(x: number): string {
                return "value: " + x;
            }
        }
        "#,
    );
    let body = &checked.unit.modules[0].methods[0].body;
    match &body.stmts[0] {
        Stmt::Return { value: Some(v), .. } => match &v.kind {
            ExprKind::Binary { rhs, .. } => {
                assert!(matches!(rhs.kind, ExprKind::Cast { .. }));
            }
            other => panic!("expected concat, got {other:?}"),
        },
        other => panic!("expected return, got {other:?}"),
    }
}

#[test]
fn test_undeclared_identifier() {
    let err = check_err(
        r#"
        contract test {
            public run(): number { return missing; }
        }
        "#,
    );
    assert!(err.message.contains("undeclared"));
    assert!(err.message.contains("missing"));
}

#[test]
fn test_mixed_numeric_rejected() {
    let err = check_err(
        r#"
        contract test {
            global a: decimal<2>;
            public run(x: number): decimal<2> {
                return a + x;
            }
        }
        "#,
    );
    assert!(err.message.contains("convert"));
}

#[test]
fn test_variadic_bare_return_rule() {
    let err = check_err(
        r#"
        contract test {
            public getStrings(): string* {
                return "hello";
                return;
                return "world";
            }
        }
        "#,
    );
    assert!(err.message.contains("bare return"));
}

#[test]
fn test_variadic_multiple_returns_allowed() {
    check(
        r#"
        contract test {
            public getStrings(): string* {
                return "hello";
                return "world";
            }
        }
        "#,
    );
}

#[test]
fn test_break_outside_loop() {
    let err = check_err(
        r#"
        contract test {
            public run() { break; }
        }
        "#,
    );
    assert!(err.message.contains("break"));
}

#[test]
fn test_switch_requires_ordinal() {
    let err = check_err(
        r#"
        contract test {
            public run(flag: bool): number {
                switch (flag) {
                    default: return 0;
                }
            }
        }
        "#,
    );
    assert!(err.message.contains("ordinal"));
}

#[test]
fn test_enum_entries_fold() {
    let checked = check(
        r#"
        enum Color { Red, Green, Blue }
        contract test {
            public pick(): number {
                switch (Color.Green) {
                    case Color.Red: return 0;
                    default: return 1;
                }
            }
        }
        "#,
    );
    let body = &checked.unit.modules[0].methods[0].body;
    match &body.stmts[0] {
        Stmt::Switch { scrutinee, cases, .. } => {
            assert!(
                matches!(&scrutinee.kind, ExprKind::Literal(Literal::Number(n)) if n.to_string() == "1")
            );
            assert!(matches!(&cases[0].0.kind, ExprKind::Literal(_)));
        }
        other => panic!("expected switch, got {other:?}"),
    }
}

#[test]
fn test_macros_expand_to_literals() {
    let checked = check(
        r#"
        contract oracle {
            public me(): address { return $THIS_ADDRESS; }
            public sym(): string { return $THIS_SYMBOL; }
            public code(): number { return $TYPE_OF(string); }
        }
        "#,
    );
    let module = &checked.unit.modules[0];
    match &module.method("sym").unwrap().body.stmts[0] {
        Stmt::Return { value: Some(v), .. } => {
            assert!(matches!(&v.kind, ExprKind::Literal(Literal::String(s)) if s == "oracle"));
        }
        _ => unreachable!(),
    }
    match &module.method("code").unwrap().body.stmts[0] {
        Stmt::Return { value: Some(v), .. } => {
            assert!(
                matches!(&v.kind, ExprKind::Literal(Literal::Number(n)) if n.to_string() == "3")
            );
        }
        _ => unreachable!(),
    }
}

#[test]
fn test_library_requires_import() {
    let err = check_err(
        r#"
        contract test {
            public run() { Runtime.log("hi"); }
        }
        "#,
    );
    assert!(err.message.contains("undeclared"));
}

#[test]
fn test_imported_library_resolves() {
    check(
        r#"
        contract test {
            import Runtime;
            public run() { Runtime.log("hi"); }
        }
        "#,
    );
}

#[test]
fn test_value_method_without_import() {
    // Receiver-typed dispatch needs no import.
    check(
        r#"
        contract test {
            global name: string;
            public getLength(): number {
                return name.length();
            }
        }
        "#,
    );
}

#[test]
fn test_unknown_library() {
    let err = check_err("contract t { import Nope; }");
    assert!(err.message.contains("unknown library"));
}

#[test]
fn test_call_method_requires_literal_name() {
    let err = check_err(
        r#"
        contract test {
            import Call;
            public run(name: string) {
                Call.method(name);
            }
        }
        "#,
    );
    assert!(err.message.contains("literal method name"));
}

#[test]
fn test_assignment_to_const_rejected() {
    let err = check_err(
        r#"
        contract test {
            const LIMIT: number = 10;
            public run() { LIMIT = 20; }
        }
        "#,
    );
    assert!(err.message.contains("constant"));
}

#[test]
fn test_string_assign_from_number_rejected() {
    // Assignment never casts to string implicitly.
    let err = check_err(
        r#"
        contract test {
            public run(x: number) {
                local s: string = x;
            }
        }
        "#,
    );
    assert!(err.message.contains("type mismatch"));
}
