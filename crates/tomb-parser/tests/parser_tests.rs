//! Parser integration tests: module structure, statements, expression
//! precedence and the deprecated-operator diagnostic.

use tomb_ast::{
    BinaryOp, CallTarget, Expr, ExprKind, Literal, MethodKind, ModuleKind, SourceText, Stmt,
    Visibility,
};

fn parse(source: &str) -> tomb_ast::SourceUnit {
    let text = SourceText::new(source);
    tomb_parser::parse(&text).expect("parse failed")
}

fn parse_err(source: &str) -> tomb_ast::CompilerError {
    let text = SourceText::new(source);
    tomb_parser::parse(&text).expect_err("parse unexpectedly succeeded")
}

fn parse_expr(source: &str) -> Expr {
    let text = SourceText::new(source);
    let tokens = tomb_lexer::lex(source).expect("lex failed");
    let mut stream = tomb_parser::TokenStream::new(tokens, &text);
    tomb_parser::parse_expr(&mut stream).expect("expression parse failed")
}

fn binary_op(expr: &Expr) -> BinaryOp {
    match &expr.kind {
        ExprKind::Binary { op, .. } => *op,
        other => panic!("expected binary expression, got {other:?}"),
    }
}

#[test]
fn test_contract_shape() {
    let unit = parse(
        r#"
        contract bank {
            import Runtime;
            global balance: number;
            const FEE: number = 2;

            constructor(owner: address) {
                balance = 0;
            }

            public deposit(amount: number) {
                balance += amount;
            }

            private audit(): bool {
                return true;
            }

            trigger onUpgrade(from: address) {
                throw "not upgradeable";
            }
        }
        "#,
    );
    assert_eq!(unit.modules.len(), 1);
    let module = &unit.modules[0];
    assert_eq!(&*module.name, "bank");
    assert_eq!(module.kind, ModuleKind::Contract);
    assert_eq!(module.imports.len(), 1);
    assert_eq!(module.globals.len(), 1);
    assert_eq!(module.consts.len(), 1);
    assert_eq!(module.methods.len(), 4);

    let ctor = module.method("constructor").unwrap();
    assert_eq!(ctor.kind, MethodKind::Constructor);
    assert_eq!(ctor.params.len(), 1);

    let audit = module.method("audit").unwrap();
    assert_eq!(audit.visibility, Visibility::Private);

    let trigger = module.method("onUpgrade").unwrap();
    assert_eq!(trigger.kind, MethodKind::Trigger);
}

#[test]
fn test_property_forms() {
    let unit = parse(
        r#"
        token DOG {
            property name: string = "Dog Token";
            property supply: number {
                return 1000000;
            }
        }
        "#,
    );
    let module = &unit.modules[0];
    assert_eq!(module.kind, ModuleKind::Token);
    assert!(module.method("getName").is_some());
    assert!(module.method("getSupply").is_some());
    let name = module.method("getName").unwrap();
    assert_eq!(name.kind, MethodKind::Property);
    assert_eq!(name.body.stmts.len(), 1);
    assert!(matches!(name.body.stmts[0], Stmt::Return { .. }));
}

#[test]
fn test_nft_submodule() {
    let unit = parse(
        r#"
        token CROWN {
            nft Jewel<JewelRom, number> {
                property value: number = 10;
            }
        }
        "#,
    );
    let module = &unit.modules[0];
    assert_eq!(module.sub_modules.len(), 1);
    let nft = &module.sub_modules[0];
    assert_eq!(nft.kind, ModuleKind::Nft);
    assert!(nft.nft_types.is_some());
    let (rom, ram) = nft.nft_types.as_ref().unwrap();
    assert_eq!(&*rom.name, "JewelRom");
    assert_eq!(&*ram.name, "number");
}

#[test]
fn test_struct_and_enum() {
    let unit = parse(
        r#"
        struct Pair {
            first: number;
            second: string;
        }
        enum Color { Red, Green = 5, Blue }
        script run { }
        "#,
    );
    assert_eq!(unit.structs.len(), 1);
    let pair = unit.structs.get("Pair").unwrap();
    assert_eq!(pair.fields.len(), 2);

    let color = unit.enums.get("Color").unwrap();
    assert_eq!(
        color.entries,
        vec![("Red".into(), 0), ("Green".into(), 5), ("Blue".into(), 6)]
    );
}

#[test]
fn test_statement_kinds() {
    let unit = parse(
        r#"
        contract flow {
            public run(x: number): number {
                local total = 0;
                for (local i = 0; i < x; i += 1) {
                    total += i;
                }
                while (total > 100) {
                    total -= 10;
                }
                do {
                    total += 1;
                } while (total < 5);
                if (total == 0) {
                    return 0;
                } else if (total < 0) {
                    return -1;
                } else {
                    return total;
                }
            }
        }
        "#,
    );
    let body = &unit.modules[0].methods[0].body;
    assert_eq!(body.stmts.len(), 5);
    assert!(matches!(body.stmts[1], Stmt::For { .. }));
    assert!(matches!(body.stmts[2], Stmt::While { .. }));
    assert!(matches!(body.stmts[3], Stmt::DoWhile { .. }));
    assert!(matches!(body.stmts[4], Stmt::If { .. }));
}

#[test]
fn test_switch_statement() {
    let unit = parse(
        r#"
        contract test {
            public check(x: number): string {
                switch (x) {
                    case 0: return "zero";
                    case 1: return "one";
                    default: return "other";
                }
            }
        }
        "#,
    );
    let body = &unit.modules[0].methods[0].body;
    match &body.stmts[0] {
        Stmt::Switch { cases, default, .. } => {
            assert_eq!(cases.len(), 2);
            assert!(default.is_some());
        }
        other => panic!("expected switch, got {other:?}"),
    }
}

#[test]
fn test_precedence_or_vs_and() {
    // a || b && c parses as a || (b && c)
    let expr = parse_expr("a || b && c");
    assert_eq!(binary_op(&expr), BinaryOp::Or);
    match &expr.kind {
        ExprKind::Binary { rhs, .. } => assert_eq!(binary_op(rhs), BinaryOp::And),
        _ => unreachable!(),
    }
}

#[test]
fn test_precedence_add_vs_mul() {
    // a + b * c parses as a + (b * c)
    let expr = parse_expr("a + b * c");
    assert_eq!(binary_op(&expr), BinaryOp::Add);
    match &expr.kind {
        ExprKind::Binary { rhs, .. } => assert_eq!(binary_op(rhs), BinaryOp::Mul),
        _ => unreachable!(),
    }
}

#[test]
fn test_precedence_comparison_vs_shift() {
    // a << 1 > b parses as (a << 1) > b
    let expr = parse_expr("a << 1 > b");
    assert_eq!(binary_op(&expr), BinaryOp::Gt);
    match &expr.kind {
        ExprKind::Binary { lhs, .. } => assert_eq!(binary_op(lhs), BinaryOp::Shl),
        _ => unreachable!(),
    }
}

#[test]
fn test_left_associativity() {
    // a - b - c parses as (a - b) - c
    let expr = parse_expr("a - b - c");
    match &expr.kind {
        ExprKind::Binary { op, lhs, .. } => {
            assert_eq!(*op, BinaryOp::Sub);
            assert_eq!(binary_op(lhs), BinaryOp::Sub);
        }
        _ => unreachable!(),
    }
}

#[test]
fn test_call_targets() {
    let this_call = parse_expr("this.mycall(2, 3)");
    match &this_call.kind {
        ExprKind::Call { target, args, .. } => {
            assert!(matches!(target, CallTarget::This(name) if &**name == "mycall"));
            assert_eq!(args.len(), 2);
        }
        _ => panic!("expected call"),
    }

    let lib_call = parse_expr("Runtime.log(\"hi\")");
    match &lib_call.kind {
        ExprKind::Call { target, .. } => {
            assert!(matches!(target, CallTarget::Value { method, .. } if &**method == "log"));
        }
        _ => panic!("expected call"),
    }

    let ctor_call = parse_expr("Pair(1, \"two\")");
    match &ctor_call.kind {
        ExprKind::Call { target, .. } => {
            assert!(matches!(target, CallTarget::Bare(name) if &**name == "Pair"));
        }
        _ => panic!("expected call"),
    }
}

#[test]
fn test_generic_call_type_argument() {
    let expr = parse_expr("Call.interop<number>(\"Map.Count\", \"votes\")");
    match &expr.kind {
        ExprKind::Call {
            type_arg, args, ..
        } => {
            assert!(type_arg.is_some());
            assert_eq!(&*type_arg.as_ref().unwrap().name, "number");
            assert_eq!(args.len(), 2);
        }
        _ => panic!("expected call"),
    }
}

#[test]
fn test_generic_vs_comparison() {
    // `a.b < c` must stay a comparison, not a malformed generic call.
    let expr = parse_expr("a.b < c");
    assert_eq!(binary_op(&expr), BinaryOp::Lt);
}

#[test]
fn test_array_literal_and_index() {
    let expr = parse_expr("{1, 2, 3}[0]");
    match &expr.kind {
        ExprKind::Index { base, .. } => {
            assert!(matches!(base.kind, ExprKind::ArrayLiteral(ref items) if items.len() == 3));
        }
        _ => panic!("expected index"),
    }
}

#[test]
fn test_macros() {
    let expr = parse_expr("$TYPE_OF(string)");
    match &expr.kind {
        ExprKind::Macro { name, arg } => {
            assert_eq!(&**name, "TYPE_OF");
            assert!(arg.is_some());
        }
        _ => panic!("expected macro"),
    }
    assert!(matches!(
        parse_expr("$THIS_SYMBOL").kind,
        ExprKind::Macro { .. }
    ));
}

#[test]
fn test_deprecated_assignment_rejected() {
    let err = parse_err(
        r#"
        contract test {
            public run(y: number) {
                local _x = 0;
                _x := y;
            }
        }
        "#,
    );
    assert!(err.message.contains("deprecated"));
    assert_eq!(err.line, 5);
}

#[test]
fn test_negative_literal_case_labels() {
    let unit = parse(
        r#"
        contract test {
            public sign(x: number): number {
                switch (x) {
                    case -1: return -1;
                    default: return 0;
                }
            }
        }
        "#,
    );
    let body = &unit.modules[0].methods[0].body;
    assert!(matches!(body.stmts[0], Stmt::Switch { .. }));
}

#[test]
fn test_missing_semicolon_is_fatal() {
    let err = parse_err("contract t { public f() { local x = 1 } }");
    assert!(err.message.contains("expected"));
}

#[test]
fn test_const_requires_literal() {
    let err = parse_err("contract t { const X: number = 1 + 2; }");
    assert!(err.message.contains("literal"));
}

#[test]
fn test_string_literal_atom() {
    let expr = parse_expr(r#""hello ""#);
    assert!(
        matches!(expr.kind, ExprKind::Literal(Literal::String(ref s)) if s == "hello ")
    );
}
