//! Declarations and modules.
//!
//! A source file is a [`SourceUnit`]: top-level struct and enum type
//! declarations plus one or more modules (contract, token, script). NFT
//! descriptions nest inside their parent module as sub-modules.

use crate::literal::Literal;
use crate::span::Span;
use crate::stmt::Block;
use crate::types::{TypeExpr, TypeRef};
use indexmap::IndexMap;
use std::rc::Rc;

/// Method visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Callable from outside the module; listed in the ABI.
    Public,
    /// Callable only through `this.…`.
    Private,
    /// Compiler-synthesized; never written in source.
    Internal,
}

/// What kind of callable a [`MethodDecl`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Constructor,
    /// Script entry point.
    Task,
    /// VM lifecycle hook (`onMint`, `onBurn`, …); ABI-flagged.
    Trigger,
    /// Getter generated from a `property` declaration.
    Property,
}

/// A typed method parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: Rc<str>,
    pub declared: TypeExpr,
    /// Resolved by elaboration.
    pub ty: Option<TypeRef>,
}

/// A method, constructor, task, trigger or property getter.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: Rc<str>,
    pub kind: MethodKind,
    pub visibility: Visibility,
    pub params: Vec<Parameter>,
    /// Declared return type; `None` for void.
    pub ret: Option<TypeExpr>,
    /// Whether the return type was written `T*` (variadic stream).
    pub variadic: bool,
    pub body: Block,
    pub span: Span,
    /// Resolved by elaboration; `Type::None` for void.
    pub ret_ty: Option<TypeRef>,
}

/// `global NAME: TYPE;` — contract-storage backed state.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDecl {
    pub name: Rc<str>,
    pub declared: TypeExpr,
    pub ty: Option<TypeRef>,
    pub span: Span,
}

/// `const NAME: TYPE = literal;`
#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub name: Rc<str>,
    pub declared: TypeExpr,
    pub value: Literal,
    pub span: Span,
}

/// A named product type.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: Rc<str>,
    /// Ordered `(field, type)` pairs; order is the packing order.
    pub fields: Vec<(Rc<str>, TypeExpr)>,
    pub span: Span,
}

/// A named set of integer-valued entries.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: Rc<str>,
    /// Ordered `(entry, value)` pairs; values are unique.
    pub entries: Vec<(Rc<str>, u32)>,
    pub span: Span,
}

/// Module kinds; each top-level module produces one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Contract,
    Token,
    /// NFT description: always a sub-module of a token.
    Nft,
    Script,
}

impl ModuleKind {
    pub fn keyword(self) -> &'static str {
        match self {
            ModuleKind::Contract => "contract",
            ModuleKind::Token => "token",
            ModuleKind::Nft => "nft",
            ModuleKind::Script => "script",
        }
    }
}

/// A parsed module.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleAst {
    pub name: Rc<str>,
    pub kind: ModuleKind,
    /// Imported library names, with the import's source span.
    pub imports: Vec<(Rc<str>, Span)>,
    pub globals: Vec<GlobalDecl>,
    pub consts: Vec<ConstDecl>,
    pub methods: Vec<MethodDecl>,
    pub sub_modules: Vec<ModuleAst>,
    /// For `nft NAME<ROM, RAM>`: the ROM and RAM payload types.
    pub nft_types: Option<(TypeExpr, TypeExpr)>,
    pub span: Span,
}

impl ModuleAst {
    pub fn new(name: Rc<str>, kind: ModuleKind, span: Span) -> Self {
        Self {
            name,
            kind,
            imports: Vec::new(),
            globals: Vec::new(),
            consts: Vec::new(),
            methods: Vec::new(),
            sub_modules: Vec::new(),
            nft_types: None,
            span,
        }
    }

    /// Look up a method by name.
    pub fn method(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|m| &*m.name == name)
    }
}

/// A parsed source file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceUnit {
    /// Declared structs, in source order.
    pub structs: IndexMap<Rc<str>, StructDecl>,
    /// Declared enums, in source order.
    pub enums: IndexMap<Rc<str>, EnumDecl>,
    /// Top-level modules, in source order.
    pub modules: Vec<ModuleAst>,
}

/// Identifiers with reserved meaning inside method bodies.
pub const RESERVED_IDENTIFIERS: &[&str] = &["this", "result", "_ROM", "_RAM", "_tokenID"];
