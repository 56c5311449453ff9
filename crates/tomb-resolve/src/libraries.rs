//! The built-in library catalog.
//!
//! Libraries are externally-defined sets of typed method signatures, each
//! tagged with the strategy the code generator uses to lower a call:
//! a VM intrinsic by name (ext-call), a platform contract (context switch),
//! an inlined builtin snippet, or a custom callback (the dynamic `Call.*`
//! surface). The catalog is table-driven; the checker consults it for
//! signatures and the code generator for lowering.

use indexmap::IndexMap;
use tomb_ast::{Type, TypeInterner, TypeRef};

/// Custom lowering callbacks for the `Call` library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomKind {
    /// `Call.method<T>(name, …)` — call a module method by literal name.
    CallMethod,
    /// `Call.interop<T>(name, …)` — invoke a VM intrinsic by dynamic name.
    CallInterop,
}

/// How a library method lowers to assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lowering {
    /// `LOAD r "<name>"; EXTCALL r` — VM intrinsic.
    ExtCall(&'static str),
    /// `CTX` + `SWITCH` into a platform contract.
    ContractCall {
        contract: &'static str,
        method: &'static str,
    },
    /// `CALL @entry_<name>` on a method synthesized in the current module.
    LocalCall,
    /// A canned snippet appended once per script; called by label.
    Builtin(&'static str),
    /// Library-supplied callback; `None` marks a reserved surface whose
    /// callbacks are not implemented.
    Custom(Option<CustomKind>),
}

/// A typed library method signature.
#[derive(Debug, Clone)]
pub struct LibMethod {
    pub name: &'static str,
    /// Parameter types; for value-method libraries the receiver is first.
    pub params: Vec<TypeRef>,
    /// Return type; `Type::None` for void.
    pub ret: TypeRef,
    /// Whether extra arguments beyond `params` are accepted (dynamic calls).
    pub varargs: bool,
    pub lowering: Lowering,
}

/// A named library: an ordered method table.
#[derive(Debug, Clone)]
pub struct Library {
    pub name: &'static str,
    pub methods: IndexMap<&'static str, LibMethod>,
}

/// Catalog of all built-in libraries.
#[derive(Debug, Clone)]
pub struct LibraryRegistry {
    libs: IndexMap<&'static str, Library>,
}

impl LibraryRegistry {
    /// The standard catalog.
    pub fn standard(types: &mut TypeInterner) -> Self {
        let none = types.none();
        let number = types.number();
        let boolean = types.bool_();
        let string = types.string();
        let timestamp = types.timestamp();
        let address = types.address();
        let hash = types.intern(Type::Hash);
        let any = types.any();

        let mut registry = Self {
            libs: IndexMap::new(),
        };

        registry.add(
            "Runtime",
            vec![
                ext("log", vec![string.clone()], none.clone(), "Runtime.Log"),
                ext(
                    "expect",
                    vec![boolean.clone(), string.clone()],
                    none.clone(),
                    "Runtime.Expect",
                ),
                ext(
                    "isWitness",
                    vec![address.clone()],
                    boolean.clone(),
                    "Runtime.IsWitness",
                ),
                ext("time", vec![], timestamp.clone(), "Runtime.Time"),
                ext(
                    "transactionHash",
                    vec![],
                    hash.clone(),
                    "Runtime.TransactionHash",
                ),
            ],
        );

        registry.add(
            "Math",
            vec![
                builtin("abs", vec![number.clone()], number.clone(), "math_abs"),
                builtin(
                    "min",
                    vec![number.clone(), number.clone()],
                    number.clone(),
                    "math_min",
                ),
                builtin(
                    "max",
                    vec![number.clone(), number.clone()],
                    number.clone(),
                    "math_max",
                ),
                ext(
                    "pow",
                    vec![number.clone(), number.clone()],
                    number.clone(),
                    "Math.Pow",
                ),
                ext("sqrt", vec![number.clone()], number.clone(), "Math.Sqrt"),
            ],
        );

        registry.add(
            "Data",
            vec![
                ext("get", vec![string.clone()], any.clone(), "Data.Get"),
                ext(
                    "set",
                    vec![string.clone(), any.clone()],
                    none.clone(),
                    "Data.Set",
                ),
                ext("delete", vec![string.clone()], none.clone(), "Data.Delete"),
            ],
        );

        registry.add(
            "Map",
            vec![
                ext("get", vec![any.clone(), any.clone()], any.clone(), "Map.Get"),
                ext(
                    "set",
                    vec![any.clone(), any.clone(), any.clone()],
                    none.clone(),
                    "Map.Set",
                ),
                ext(
                    "has",
                    vec![any.clone(), any.clone()],
                    boolean.clone(),
                    "Map.Has",
                ),
                ext(
                    "remove",
                    vec![any.clone(), any.clone()],
                    none.clone(),
                    "Map.Remove",
                ),
                ext("count", vec![any.clone()], number.clone(), "Map.Count"),
                ext("clear", vec![any.clone()], none.clone(), "Map.Clear"),
            ],
        );

        registry.add(
            "List",
            vec![
                ext(
                    "get",
                    vec![any.clone(), number.clone()],
                    any.clone(),
                    "List.Get",
                ),
                ext(
                    "add",
                    vec![any.clone(), any.clone()],
                    none.clone(),
                    "List.Add",
                ),
                ext(
                    "replace",
                    vec![any.clone(), number.clone(), any.clone()],
                    none.clone(),
                    "List.Replace",
                ),
                ext(
                    "removeAt",
                    vec![any.clone(), number.clone()],
                    none.clone(),
                    "List.RemoveAt",
                ),
                ext("count", vec![any.clone()], number.clone(), "List.Count"),
                ext("clear", vec![any.clone()], none.clone(), "List.Clear"),
            ],
        );

        registry.add(
            "Array",
            vec![
                ext("length", vec![any.clone()], number.clone(), "Array.Length"),
                ext(
                    "at",
                    vec![any.clone(), number.clone()],
                    any.clone(),
                    "Array.At",
                ),
            ],
        );

        registry.add(
            "Crypto",
            vec![
                ext("hash", vec![any.clone()], hash.clone(), "Crypto.Hash"),
                ext(
                    "checkSignature",
                    vec![address.clone(), any.clone(), any.clone()],
                    boolean.clone(),
                    "Crypto.CheckSignature",
                ),
            ],
        );

        registry.add(
            "NFT",
            vec![
                contract_call(
                    "mint",
                    vec![
                        address.clone(),
                        address.clone(),
                        string.clone(),
                        any.clone(),
                        any.clone(),
                    ],
                    number.clone(),
                    "nft",
                    "mint",
                ),
                contract_call(
                    "burn",
                    vec![number.clone()],
                    none.clone(),
                    "nft",
                    "burn",
                ),
                contract_call(
                    "transfer",
                    vec![address.clone(), number.clone()],
                    none.clone(),
                    "nft",
                    "transfer",
                ),
            ],
        );

        registry.add(
            "Token",
            vec![
                contract_call(
                    "transfer",
                    vec![
                        address.clone(),
                        address.clone(),
                        string.clone(),
                        number.clone(),
                    ],
                    none.clone(),
                    "token",
                    "transfer",
                ),
                contract_call(
                    "balance",
                    vec![address.clone(), string.clone()],
                    number.clone(),
                    "token",
                    "balance",
                ),
            ],
        );

        registry.add(
            "Time",
            vec![
                ext("now", vec![], timestamp.clone(), "Time.Now"),
                ext("unix", vec![number.clone()], timestamp.clone(), "Time.Unix"),
            ],
        );

        registry.add(
            "Call",
            vec![
                LibMethod {
                    name: "method",
                    params: vec![string.clone()],
                    ret: any.clone(),
                    varargs: true,
                    lowering: Lowering::Custom(Some(CustomKind::CallMethod)),
                },
                LibMethod {
                    name: "interop",
                    params: vec![string.clone()],
                    ret: any.clone(),
                    varargs: true,
                    lowering: Lowering::Custom(Some(CustomKind::CallInterop)),
                },
                LibMethod {
                    name: "task",
                    params: vec![string.clone()],
                    ret: none.clone(),
                    varargs: true,
                    lowering: Lowering::Custom(None),
                },
            ],
        );

        registry.add(
            "String",
            vec![
                ext("length", vec![string.clone()], number.clone(), "String.Length"),
                ext("toUpper", vec![string.clone()], string.clone(), "String.ToUpper"),
                ext("toLower", vec![string.clone()], string.clone(), "String.ToLower"),
                ext(
                    "substr",
                    vec![string.clone(), number.clone(), number.clone()],
                    string.clone(),
                    "String.Substr",
                ),
            ],
        );

        // Struct.NAME(…) constructors are resolved against declared structs;
        // the library itself has no fixed method table.
        registry.add("Struct", vec![]);

        registry
    }

    fn add(&mut self, name: &'static str, methods: Vec<LibMethod>) {
        let mut table = IndexMap::new();
        for method in methods {
            table.insert(method.name, method);
        }
        self.libs.insert(name, Library { name, methods: table });
    }

    /// Look up a library by name.
    pub fn library(&self, name: &str) -> Option<&Library> {
        self.libs.get(name)
    }

    /// Look up a method in a library.
    pub fn method(&self, lib: &str, name: &str) -> Option<&LibMethod> {
        self.libs.get(lib).and_then(|l| l.methods.get(name))
    }

    /// The library serving value methods of a receiver type, if any.
    ///
    /// `"hello".length()` dispatches through `String`, container values
    /// through their container library.
    pub fn receiver_library(ty: &Type) -> Option<&'static str> {
        match ty {
            Type::String => Some("String"),
            Type::Array(_) => Some("Array"),
            Type::Map(_, _) | Type::StorageMap(_, _) => Some("Map"),
            Type::StorageList(_) => Some("List"),
            _ => None,
        }
    }
}

fn ext(
    name: &'static str,
    params: Vec<TypeRef>,
    ret: TypeRef,
    qualified: &'static str,
) -> LibMethod {
    LibMethod {
        name,
        params,
        ret,
        varargs: false,
        lowering: Lowering::ExtCall(qualified),
    }
}

fn builtin(
    name: &'static str,
    params: Vec<TypeRef>,
    ret: TypeRef,
    snippet: &'static str,
) -> LibMethod {
    LibMethod {
        name,
        params,
        ret,
        varargs: false,
        lowering: Lowering::Builtin(snippet),
    }
}

fn contract_call(
    name: &'static str,
    params: Vec<TypeRef>,
    ret: TypeRef,
    contract: &'static str,
    method: &'static str,
) -> LibMethod {
    LibMethod {
        name,
        params,
        ret,
        varargs: false,
        lowering: Lowering::ContractCall { contract, method },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog() {
        let mut types = TypeInterner::new();
        let registry = LibraryRegistry::standard(&mut types);
        assert!(registry.library("Runtime").is_some());
        assert!(registry.library("Nope").is_none());

        let log = registry.method("Runtime", "log").unwrap();
        assert_eq!(log.lowering, Lowering::ExtCall("Runtime.Log"));
        assert_eq!(log.params.len(), 1);

        let abs = registry.method("Math", "abs").unwrap();
        assert_eq!(abs.lowering, Lowering::Builtin("math_abs"));
    }

    #[test]
    fn test_custom_callbacks() {
        let mut types = TypeInterner::new();
        let registry = LibraryRegistry::standard(&mut types);
        assert_eq!(
            registry.method("Call", "interop").unwrap().lowering,
            Lowering::Custom(Some(CustomKind::CallInterop))
        );
        // Reserved surface without callbacks; using it is a codegen error.
        assert_eq!(
            registry.method("Call", "task").unwrap().lowering,
            Lowering::Custom(None)
        );
    }

    #[test]
    fn test_receiver_dispatch() {
        let mut types = TypeInterner::new();
        let number = types.number();
        assert_eq!(LibraryRegistry::receiver_library(&Type::String), Some("String"));
        assert_eq!(
            LibraryRegistry::receiver_library(&Type::StorageList(number)),
            Some("List")
        );
        assert_eq!(LibraryRegistry::receiver_library(&Type::Bool), None);
    }
}
