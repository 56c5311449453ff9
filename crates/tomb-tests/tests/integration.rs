//! End-to-end tests: compile TombLang source, execute the emitted binary on
//! the reference VM, and check observable behavior.

use tomb_compiler::{compile, AbiMethod, Module};
use tomb_tests::{Value, Vm, VmError};

fn compile_one(source: &str) -> Module {
    let mut modules = compile(source).expect("compilation failed");
    assert!(!modules.is_empty(), "no modules produced");
    modules.remove(0)
}

fn abi_method(module: &Module, name: &str) -> AbiMethod {
    let (_, methods) = tomb_compiler::parse_abi(&module.abi).expect("malformed ABI");
    methods
        .into_iter()
        .find(|m| m.name == name)
        .unwrap_or_else(|| panic!("method '{name}' missing from ABI"))
}

/// Call a method with arguments pushed right-to-left; returns the stack
/// after execution, bottom first.
fn call(vm: &mut Vm, module: &Module, name: &str, args: Vec<Value>) -> Vec<Value> {
    let method = abi_method(module, name);
    for arg in args.into_iter().rev() {
        vm.push(arg);
    }
    vm.run(method.offset).expect("execution failed");
    let mut results = Vec::new();
    while let Some(value) = vm.pop() {
        results.push(value);
    }
    results.reverse();
    results
}

#[test]
fn test_switch_dispatch() {
    let module = compile_one(
        r#"
        contract test {
            public check(x: number): string {
                switch (x) {
                    case 0: return "zero";
                    case 1: return "one";
                    case 2: return "two";
                    default: return "other";
                }
            }
        }
        "#,
    );
    let expected = [
        (-1, "other"),
        (0, "zero"),
        (1, "one"),
        (2, "two"),
        (3, "other"),
    ];
    for (input, output) in expected {
        let mut vm = Vm::new(&module.script, "test");
        let results = call(&mut vm, &module, "check", vec![Value::number(input)]);
        assert_eq!(results, vec![Value::string(output)], "check({input})");
    }
}

#[test]
fn test_for_loop_accumulation() {
    let module = compile_one(
        r#"
        contract test {
            public countStuff(): number {
                local x = 0;
                for (local i = 0; i < 9; i += 1) {
                    x += 2;
                }
                return x;
            }
        }
        "#,
    );
    let mut vm = Vm::new(&module.script, "test");
    let results = call(&mut vm, &module, "countStuff", vec![]);
    assert_eq!(results, vec![Value::number(18)]);
}

#[test]
fn test_global_init_and_string_length() {
    let module = compile_one(
        r#"
        contract test {
            global name: string;
            constructor(owner: address) {
                name = "hello";
            }
            public getLength(): number {
                return name.length();
            }
        }
        "#,
    );
    let mut vm = Vm::new(&module.script, "test");
    call(
        &mut vm,
        &module,
        "constructor",
        vec![Value::Bytes(vec![1; 32])],
    );
    assert_eq!(vm.storage_len(), 1, "constructor writes exactly one key");
    let results = call(&mut vm, &module, "getLength", vec![]);
    assert_eq!(results, vec![Value::number(5)]);
}

#[test]
fn test_chained_if_else_sign() {
    let module = compile_one(
        r#"
        contract test {
            public sign(x: number): number {
                if (x < 0) {
                    return -1;
                } else if (x == 0) {
                    return 0;
                } else {
                    return 1;
                }
            }
        }
        "#,
    );
    for (input, output) in [(-5, -1), (0, 0), (9, 1)] {
        let mut vm = Vm::new(&module.script, "test");
        let results = call(&mut vm, &module, "sign", vec![Value::number(input)]);
        assert_eq!(results, vec![Value::number(output)], "sign({input})");
    }
}

#[test]
fn test_inferred_locals_concat() {
    let module = compile_one(
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
    let mut vm = Vm::new(&module.script, "test");
    let results = call(&mut vm, &module, "calculate", vec![]);
    assert_eq!(results, vec![Value::string("hello world")]);
}

#[test]
fn test_duplicate_method_fails() {
    let err = compile(
        r#"
        contract test {
            public testme(): number { return 1; }
            public testme(): number { return 2; }
        }
        "#,
    )
    .unwrap_err();
    assert!(err.message.contains("duplicate"));
}

#[test]
fn test_deprecated_assignment_fails() {
    let err = compile(
        r#"
        contract test {
            public run(y: number) {
                local _x = 0;
                _x := y;
            }
        }
        "#,
    )
    .unwrap_err();
    assert!(err.message.contains("deprecated"));
}

#[test]
fn test_decimal_precision_overflow_fails() {
    let err = compile(
        r#"
        contract test {
            global amount: decimal<3>;
            constructor(owner: address) {
                amount = 2.4587;
            }
        }
        "#,
    )
    .unwrap_err();
    assert!(err.message.contains("precision"));
}

#[test]
fn test_too_many_arguments_fails() {
    let err = compile(
        r#"
        contract test {
            private mycall(x: number): number { return x; }
            public run(): number { return this.mycall(2, 3); }
        }
        "#,
    )
    .unwrap_err();
    assert!(err.message.contains("too many arguments"));
}

#[test]
fn test_variadic_multi_return() {
    let module = compile_one(
        r#"
        contract test {
            public getStrings(): string* {
                return "hello";
                return "world";
            }
        }
        "#,
    );
    let method = abi_method(&module, "getStrings");
    assert!(method.variadic);

    let mut vm = Vm::new(&module.script, "test");
    vm.run(method.offset).expect("execution failed");
    // Bottom "hello", top "world".
    assert_eq!(
        vm.stack(),
        &[Value::string("hello"), Value::string("world")]
    );
}

#[test]
fn test_private_method_call() {
    let module = compile_one(
        r#"
        contract test {
            private double(x: number): number { return x * 2; }
            public quadruple(x: number): number {
                return this.double(this.double(x));
            }
        }
        "#,
    );
    let mut vm = Vm::new(&module.script, "test");
    let results = call(&mut vm, &module, "quadruple", vec![Value::number(5)]);
    assert_eq!(results, vec![Value::number(20)]);

    // Private methods stay out of the ABI.
    let (_, methods) = tomb_compiler::parse_abi(&module.abi).unwrap();
    assert!(methods.iter().all(|m| m.name != "double"));
}

#[test]
fn test_builtin_math_abs_end_to_end() {
    let module = compile_one(
        r#"
        contract test {
            import Math;
            public dist(a: number, b: number): number {
                return Math.abs(a - b) + Math.abs(b - a);
            }
        }
        "#,
    );
    // The snippet is inlined once regardless of two call sites.
    assert_eq!(module.asm.matches("@builtin_math_abs:").count(), 1);

    let mut vm = Vm::new(&module.script, "test");
    let results = call(
        &mut vm,
        &module,
        "dist",
        vec![Value::number(3), Value::number(10)],
    );
    assert_eq!(results, vec![Value::number(14)]);
}

#[test]
fn test_while_and_compound_ops() {
    let module = compile_one(
        r#"
        contract test {
            public collatz(n: number): number {
                local steps = 0;
                while (n != 1) {
                    if (n % 2 == 0) {
                        n /= 2;
                    } else {
                        n *= 3;
                        n += 1;
                    }
                    steps += 1;
                }
                return steps;
            }
        }
        "#,
    );
    let mut vm = Vm::new(&module.script, "test");
    let results = call(&mut vm, &module, "collatz", vec![Value::number(6)]);
    assert_eq!(results, vec![Value::number(8)]);
}

#[test]
fn test_do_while_and_break() {
    let module = compile_one(
        r#"
        contract test {
            public run(): number {
                local x = 0;
                do {
                    x += 1;
                    if (x == 4) {
                        break;
                    }
                } while (x < 10);
                return x;
            }
        }
        "#,
    );
    let mut vm = Vm::new(&module.script, "test");
    let results = call(&mut vm, &module, "run", vec![]);
    assert_eq!(results, vec![Value::number(4)]);
}

#[test]
fn test_throw_surfaces_as_vm_error() {
    let module = compile_one(
        r#"
        contract test {
            public guarded(x: number): number {
                if (x < 0) {
                    throw "negative input";
                }
                return x;
            }
        }
        "#,
    );
    let method = abi_method(&module, "guarded");
    let mut vm = Vm::new(&module.script, "test");
    vm.push(Value::number(-1));
    match vm.run(method.offset) {
        Err(VmError::Thrown(message)) => assert_eq!(message, "negative input"),
        other => panic!("expected throw, got {other:?}"),
    }
}

#[test]
fn test_string_cast_in_concat() {
    let module = compile_one(
        r#"
        contract test {
            public describe(x: number): string {
                return "value: " + x;
            }
        }
        "#,
    );
    let mut vm = Vm::new(&module.script, "test");
    let results = call(&mut vm, &module, "describe", vec![Value::number(7)]);
    assert_eq!(results, vec![Value::string("value: 7")]);
}

#[test]
fn test_runtime_log() {
    let module = compile_one(
        r#"
        contract test {
            import Runtime;
            public hello() {
                Runtime.log("compiled " + $THIS_SYMBOL);
            }
        }
        "#,
    );
    let mut vm = Vm::new(&module.script, "test");
    call(&mut vm, &module, "hello", vec![]);
    assert_eq!(vm.logs(), &["compiled test".to_string()]);
}

#[test]
fn test_enum_switch_dispatch() {
    let module = compile_one(
        r#"
        enum Color { Red, Green, Blue }
        contract test {
            public hue(c: Color): string {
                switch (c) {
                    case Color.Red: return "red";
                    case Color.Green: return "green";
                    case Color.Blue: return "blue";
                }
            }
        }
        "#,
    );
    for (value, name) in [(0, "red"), (1, "green"), (2, "blue")] {
        let mut vm = Vm::new(&module.script, "test");
        let results = call(&mut vm, &module, "hue", vec![Value::number(value)]);
        assert_eq!(results, vec![Value::string(name)]);
    }
}

#[test]
fn test_deterministic_artifacts() {
    let source = r#"
        contract test {
            global counter: number;
            constructor(owner: address) { counter = 0; }
            public bump(): number {
                counter += 1;
                return counter;
            }
        }
    "#;
    let first = compile_one(source);
    let second = compile_one(source);
    assert_eq!(first.script, second.script);
    assert_eq!(first.abi, second.abi);
    assert_eq!(first.asm, second.asm);
}

#[test]
fn test_abi_method_order() {
    let module = compile_one(
        r#"
        contract test {
            public first(): number { return 1; }
            private hidden(): number { return 0; }
            trigger onUpgrade(from: address) { throw "sealed"; }
            public second(): number { return 2; }
        }
        "#,
    );
    let (name, methods) = tomb_compiler::parse_abi(&module.abi).unwrap();
    assert_eq!(name, "test");
    let names: Vec<&str> = methods.iter().map(|m| m.name.as_str()).collect();
    // Public methods in declaration order, then triggers.
    assert_eq!(names, vec!["first", "second", "onUpgrade"]);
    assert!(methods[2].trigger);
}

#[test]
fn test_property_getter() {
    let module = compile_one(
        r#"
        token DOG {
            property name: string = "Dog Token";
        }
        "#,
    );
    let mut vm = Vm::new(&module.script, "DOG");
    let results = call(&mut vm, &module, "getName", vec![]);
    assert_eq!(results, vec![Value::string("Dog Token")]);
}

#[test]
fn test_nft_submodule_artifact() {
    let modules = compile(
        r#"
        struct JewelRom {
            carats: number;
            cut: string;
        }
        token CROWN {
            property name: string = "Crown";
            nft Jewel<JewelRom, number> {
                property edition: number = 1;
            }
        }
        "#,
    )
    .expect("compilation failed");
    assert_eq!(modules.len(), 1);
    let crown = &modules[0];
    assert_eq!(crown.sub_modules.len(), 1);
    let jewel = &crown.sub_modules[0];
    assert_eq!(jewel.name, "Jewel");
    assert!(!jewel.script.is_empty());

    // The nft property receives _tokenID/_ROM/_RAM implicitly.
    let mut vm = Vm::new(&jewel.script, "Jewel");
    let results = call(
        &mut vm,
        jewel,
        "getEdition",
        vec![
            Value::number(1),
            Value::Bytes(vec![0; 4]),
            Value::number(0),
        ],
    );
    assert_eq!(results, vec![Value::number(1)]);
}

#[test]
fn test_multi_module_compilation() {
    let modules = compile(
        r#"
        contract alpha {
            public one(): number { return 1; }
        }
        contract beta {
            public two(): number { return 2; }
        }
        "#,
    )
    .expect("compilation failed");
    assert_eq!(modules.len(), 2);
    assert_eq!(modules[0].name, "alpha");
    assert_eq!(modules[1].name, "beta");

    let mut vm = Vm::new(&modules[1].script, "beta");
    let results = call(&mut vm, &modules[1], "two", vec![]);
    assert_eq!(results, vec![Value::number(2)]);
}

#[test]
fn test_compile_lines_entry_point() {
    let lines = [
        "contract test {",
        "    public seven(): number {",
        "        return 7;",
        "    }",
        "}",
    ];
    let modules = tomb_compiler::compile_lines(&lines).expect("compilation failed");
    let module = &modules[0];
    assert!(module.asm.contains("// Line 3: return 7;"));
}
