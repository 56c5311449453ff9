//! AST and foundation types for the TombLang compiler.
//!
//! This crate holds everything the pipeline stages share: source/line
//! tracking, the single `CompilerError` diagnostic, the interned value-type
//! system, literals, and the abstract syntax tree produced by the parser and
//! annotated in place by semantic elaboration.

pub mod decl;
pub mod error;
pub mod expr;
pub mod literal;
pub mod span;
pub mod stmt;
pub mod types;

pub use decl::{
    ConstDecl, EnumDecl, GlobalDecl, MethodDecl, MethodKind, ModuleAst, ModuleKind, Parameter,
    SourceUnit, StructDecl, Visibility,
};
pub use error::{CompileResult, CompilerError, Phase};
pub use expr::{BinaryOp, Binding, CallTarget, Expr, ExprKind, ResolvedCall, UnaryOp};
pub use literal::{escape_asm_string, rescale_decimal, scale_decimal, Literal};
pub use span::{SourceText, Span};
pub use stmt::{AssignOp, Block, LValue, Stmt};
pub use types::{MethodSig, Type, TypeArg, TypeExpr, TypeInterner, TypeRef};
