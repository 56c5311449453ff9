//! Value types for TombLang.
//!
//! # Design
//!
//! - `Type` — tagged variant covering every value type the VM knows
//! - `TypeInterner` — hands out shared `Rc<Type>` so equal type expressions
//!   share identity; primitives are pre-seeded
//! - `TypeExpr` — the *syntactic* form written in source (`map<string,
//!   number>`, `decimal<3>`), resolved to a `Type` during elaboration once
//!   struct and enum names are known
//!
//! Type codes (`Type::code`) enumerate the VM's wire-level type tags; they
//! are fixed by the VM specification and surface in `$TYPE_OF(T)`, `CAST`
//! operands and the ABI.

use crate::span::Span;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Shared handle to an interned type.
pub type TypeRef = Rc<Type>;

/// A method signature, used for method-typed values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSig {
    /// Parameter types, in declaration order.
    pub params: Vec<TypeRef>,
    /// Return type; `Type::None` for void.
    pub ret: TypeRef,
    /// Whether the method returns a variadic stream (`T*`).
    pub variadic: bool,
}

/// A TombLang value type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Not yet resolved; only valid mid-elaboration.
    Unknown,
    /// The unit/absent value.
    None,
    /// Arbitrary-precision signed integer.
    Number,
    Bool,
    String,
    Timestamp,
    Address,
    Hash,
    Bytes,
    /// Fixed-point number with a compile-time precision.
    Decimal(u8),
    /// A declared enum, by name.
    Enum(Rc<str>),
    /// A declared struct, by name.
    Struct(Rc<str>),
    /// In-memory array.
    Array(TypeRef),
    /// In-memory map.
    Map(TypeRef, TypeRef),
    /// Contract-storage backed list.
    StorageList(TypeRef),
    /// Contract-storage backed map.
    StorageMap(TypeRef, TypeRef),
    /// A module reference, by name.
    Module(Rc<str>),
    /// A method value.
    Method(MethodSig),
    /// Matches any value; used by library signatures.
    Any,
}

impl Type {
    /// The VM type code, as fixed by the VM specification.
    pub fn code(&self) -> u8 {
        match self {
            Type::None => 0,
            Type::Number => 1,
            Type::Bool => 2,
            Type::String => 3,
            Type::Timestamp => 4,
            Type::Address => 5,
            Type::Hash => 6,
            Type::Bytes => 7,
            Type::Decimal(_) => 8,
            Type::Enum(_) => 9,
            Type::Struct(_) => 10,
            Type::Array(_) => 11,
            Type::Map(_, _) => 12,
            Type::StorageList(_) => 13,
            Type::StorageMap(_, _) => 14,
            Type::Module(_) => 15,
            Type::Method(_) => 16,
            Type::Any => 17,
            Type::Unknown => 255,
        }
    }

    /// Number or decimal.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Number | Type::Decimal(_) | Type::Timestamp)
    }

    /// Types usable as `switch` case labels.
    pub fn is_ordinal(&self) -> bool {
        matches!(self, Type::Number | Type::String | Type::Enum(_))
    }

    /// Types backed by contract storage rather than registers.
    pub fn is_storage_bound(&self) -> bool {
        matches!(self, Type::StorageList(_) | Type::StorageMap(_, _))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unknown => write!(f, "unknown"),
            Type::None => write!(f, "none"),
            Type::Number => write!(f, "number"),
            Type::Bool => write!(f, "bool"),
            Type::String => write!(f, "string"),
            Type::Timestamp => write!(f, "timestamp"),
            Type::Address => write!(f, "address"),
            Type::Hash => write!(f, "hash"),
            Type::Bytes => write!(f, "bytes"),
            Type::Decimal(places) => write!(f, "decimal<{places}>"),
            Type::Enum(name) => write!(f, "{name}"),
            Type::Struct(name) => write!(f, "{name}"),
            Type::Array(elem) => write!(f, "array<{elem}>"),
            Type::Map(k, v) => write!(f, "map<{k},{v}>"),
            Type::StorageList(elem) => write!(f, "storage_list<{elem}>"),
            Type::StorageMap(k, v) => write!(f, "storage_map<{k},{v}>"),
            Type::Module(name) => write!(f, "module<{name}>"),
            Type::Method(_) => write!(f, "method"),
            Type::Any => write!(f, "any"),
        }
    }
}

/// Interner handing out shared [`TypeRef`]s.
///
/// Two equal type expressions always resolve to the same `Rc`, so identity
/// comparison and cheap clones work throughout elaboration and codegen.
#[derive(Debug, Default)]
pub struct TypeInterner {
    cache: HashMap<Type, TypeRef>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a type, returning the canonical handle.
    pub fn intern(&mut self, ty: Type) -> TypeRef {
        if let Some(existing) = self.cache.get(&ty) {
            return existing.clone();
        }
        let handle: TypeRef = Rc::new(ty.clone());
        self.cache.insert(ty, handle.clone());
        handle
    }

    pub fn none(&mut self) -> TypeRef {
        self.intern(Type::None)
    }

    pub fn number(&mut self) -> TypeRef {
        self.intern(Type::Number)
    }

    pub fn bool_(&mut self) -> TypeRef {
        self.intern(Type::Bool)
    }

    pub fn string(&mut self) -> TypeRef {
        self.intern(Type::String)
    }

    pub fn timestamp(&mut self) -> TypeRef {
        self.intern(Type::Timestamp)
    }

    pub fn address(&mut self) -> TypeRef {
        self.intern(Type::Address)
    }

    pub fn bytes(&mut self) -> TypeRef {
        self.intern(Type::Bytes)
    }

    pub fn any(&mut self) -> TypeRef {
        self.intern(Type::Any)
    }
}

/// A type as written in source, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    /// The head name (`number`, `decimal`, `map`, a struct/enum name, …).
    pub name: Rc<str>,
    /// Generic arguments, if any.
    pub args: Vec<TypeArg>,
    pub span: Span,
}

/// A generic argument: a nested type or a numeric literal (`decimal<3>`).
#[derive(Debug, Clone, PartialEq)]
pub enum TypeArg {
    Type(TypeExpr),
    Number(u32),
}

impl TypeExpr {
    /// A plain named type with no arguments.
    pub fn named(name: Rc<str>, span: Span) -> Self {
        Self {
            name,
            args: Vec::new(),
            span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_shares_identity() {
        let mut types = TypeInterner::new();
        let a = types.number();
        let b = types.number();
        assert!(Rc::ptr_eq(&a, &b));

        let list_a = types.intern(Type::Array(a.clone()));
        let list_b = types.intern(Type::Array(b));
        assert!(Rc::ptr_eq(&list_a, &list_b));
    }

    #[test]
    fn test_decimal_precision_distinct() {
        let mut types = TypeInterner::new();
        let d2 = types.intern(Type::Decimal(2));
        let d3 = types.intern(Type::Decimal(3));
        assert_ne!(d2, d3);
    }

    #[test]
    fn test_display() {
        let mut types = TypeInterner::new();
        let key = types.string();
        let val = types.number();
        let map = types.intern(Type::StorageMap(key, val));
        assert_eq!(map.to_string(), "storage_map<string,number>");
        assert_eq!(types.intern(Type::Decimal(3)).to_string(), "decimal<3>");
    }

    #[test]
    fn test_type_codes_stable() {
        assert_eq!(Type::None.code(), 0);
        assert_eq!(Type::Number.code(), 1);
        assert_eq!(Type::String.code(), 3);
        assert_eq!(Type::Decimal(4).code(), 8);
    }
}
