//! Assembly-shape tests: labels, prologues, line annotations, builtin
//! inlining and the lowering of control flow.

use tomb_ast::SourceText;

fn compile_asm(source: &str) -> String {
    let text = SourceText::new(source);
    let unit = tomb_parser::parse(&text).expect("parse failed");
    let checked = tomb_resolve::elaborate(unit).expect("elaboration failed");
    let module = &checked.unit.modules[0];
    tomb_codegen::generate(&checked, module, &text).expect("codegen failed")
}

#[test]
fn test_method_entry_and_prologue() {
    let asm = compile_asm(
        r#"contract test {
            public add(a: number, b: number): number {
                return a + b;
            }
        }"#,
    );
    assert!(asm.contains("@entry_add:"));
    assert!(asm.contains("POP r0 // a"));
    assert!(asm.contains("POP r1 // b"));
    assert!(asm.contains("ADD"));
    assert!(asm.contains("RET"));
}

#[test]
fn test_line_annotations() {
    let asm = compile_asm(
        "contract test {\n    public run(): number {\n        local x = 1;\n        return x;\n    }\n}",
    );
    assert!(asm.contains("// Line 3: local x = 1;"));
    assert!(asm.contains("// Line 4: return x;"));
}

#[test]
fn test_if_else_labels() {
    let asm = compile_asm(
        r#"contract test {
            public sign(x: number): number {
                if (x < 0) {
                    return -1;
                } else {
                    return 1;
                }
            }
        }"#,
    );
    assert!(asm.contains("JMPNOT"));
    assert!(asm.contains("@else_0:"));
    assert!(asm.contains("@end_0:"));
}

#[test]
fn test_while_lowering() {
    let asm = compile_asm(
        r#"contract test {
            public run(): number {
                local x = 0;
                while (x < 3) {
                    x += 1;
                }
                return x;
            }
        }"#,
    );
    assert!(asm.contains("@loop_0:"));
    assert!(asm.contains("@end_0:"));
    assert!(asm.contains("JMP @loop_0"));
}

#[test]
fn test_switch_lowering() {
    let asm = compile_asm(
        r#"contract test {
            public check(x: number): string {
                switch (x) {
                    case 0: return "zero";
                    case 1: return "one";
                    default: return "other";
                }
            }
        }"#,
    );
    assert!(asm.contains("@case_0_0:"));
    assert!(asm.contains("@case_0_1:"));
    assert!(asm.contains("@default_0:"));
    assert!(asm.contains("EQUAL"));
    assert!(asm.contains("JMPIF"));
}

#[test]
fn test_builtin_emitted_once() {
    let asm = compile_asm(
        r#"contract test {
            import Math;
            public run(a: number, b: number): number {
                return Math.abs(a) + Math.abs(b);
            }
        }"#,
    );
    assert_eq!(asm.matches("@builtin_math_abs:").count(), 1);
    assert_eq!(asm.matches("CALL @builtin_math_abs").count(), 2);
    // Builtins trail the method bodies.
    let entry = asm.find("@entry_run:").unwrap();
    let builtin = asm.find("@builtin_math_abs:").unwrap();
    assert!(builtin > entry);
}

#[test]
fn test_global_storage_sequences() {
    let asm = compile_asm(
        r#"contract test {
            global name: string;
            constructor(owner: address) {
                name = "hello";
            }
            public getName(): string {
                return name;
            }
        }"#,
    );
    assert!(asm.contains("\"Data.Set\""));
    assert!(asm.contains("\"Data.Get\""));
    assert!(asm.contains("EXTCALL"));
}

#[test]
fn test_ext_call_lowering() {
    let asm = compile_asm(
        r#"contract test {
            import Runtime;
            public run() {
                Runtime.log("hi");
            }
        }"#,
    );
    assert!(asm.contains("LOAD r1 \"Runtime.Log\""));
    assert!(asm.contains("EXTCALL r1"));
}

#[test]
fn test_contract_call_lowering() {
    let asm = compile_asm(
        r#"contract test {
            import Token;
            public pay(from: address, to: address) {
                Token.transfer(from, to, "SOUL", 10);
            }
        }"#,
    );
    assert!(asm.contains("CTX"));
    assert!(asm.contains("SWITCH"));
}

#[test]
fn test_ne_lowering_uses_equal_not() {
    let asm = compile_asm(
        r#"contract test {
            public diff(a: number, b: number): bool {
                return a != b;
            }
        }"#,
    );
    assert!(asm.contains("EQUAL"));
    assert!(asm.contains("NOT"));
}

#[test]
fn test_throw_lowering() {
    let asm = compile_asm(
        r#"contract test {
            public run() {
                throw "bad state";
            }
        }"#,
    );
    assert!(asm.contains("THROW"));
    assert!(asm.contains("\"bad state\""));
}

#[test]
fn test_deterministic_output() {
    let source = r#"contract test {
        public run(x: number): number {
            local y = x * 2;
            return y + 1;
        }
    }"#;
    assert_eq!(compile_asm(source), compile_asm(source));
}

#[test]
fn test_not_implemented_custom() {
    let text = SourceText::new(
        r#"contract test {
            import Call;
            public run() {
                Call.task("background");
            }
        }"#,
    );
    let unit = tomb_parser::parse(&text).unwrap();
    let checked = tomb_resolve::elaborate(unit).unwrap();
    let module = &checked.unit.modules[0];
    let err = tomb_codegen::generate(&checked, module, &text).unwrap_err();
    assert!(err.message.contains("not implemented"));
}
