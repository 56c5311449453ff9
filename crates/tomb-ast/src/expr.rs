//! Expression nodes.
//!
//! Expressions form a closed sum, matched exhaustively by the checker and
//! the code generator. Elaboration annotates nodes in place: every
//! expression receives its type, identifiers receive a [`Binding`], and
//! calls receive a [`ResolvedCall`] before code generation runs.

use crate::literal::Literal;
use crate::span::Span;
use crate::types::{TypeExpr, TypeRef};
use std::rc::Rc;

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical not (`!`)
    Not,
    /// Arithmetic negation (`-`)
    Neg,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Xor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// The VM mnemonic, where the operator maps to a single opcode.
    ///
    /// `!=` has no opcode of its own; it lowers to `EQUAL` + `NOT`.
    pub fn mnemonic(self) -> Option<&'static str> {
        match self {
            BinaryOp::Add => Some("ADD"),
            BinaryOp::Sub => Some("SUB"),
            BinaryOp::Mul => Some("MUL"),
            BinaryOp::Div => Some("DIV"),
            BinaryOp::Mod => Some("MOD"),
            BinaryOp::Shl => Some("SHL"),
            BinaryOp::Shr => Some("SHR"),
            BinaryOp::Xor => Some("XOR"),
            BinaryOp::Eq => Some("EQUAL"),
            BinaryOp::Ne => None,
            BinaryOp::Lt => Some("LT"),
            BinaryOp::Le => Some("LTE"),
            BinaryOp::Gt => Some("GT"),
            BinaryOp::Ge => Some("GTE"),
            BinaryOp::And => Some("AND"),
            BinaryOp::Or => Some("OR"),
        }
    }

    /// Comparison operators, which yield `bool`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    /// Logical operators, which require `bool` operands.
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// Resolution of an identifier, filled in by elaboration.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// A `local` variable; `slot` is unique within the method body.
    Local { slot: u32 },
    /// A method argument; `slot` shares the local numbering.
    Argument { slot: u32 },
    /// A module global, backed by contract storage.
    Global { name: Rc<str> },
}

/// Syntactic call target, as written in source.
#[derive(Debug, Clone, PartialEq)]
pub enum CallTarget {
    /// `name(args)` — a module method or a struct constructor.
    Bare(Rc<str>),
    /// `this.name(args)`
    This(Rc<str>),
    /// `expr.name(args)` — a value method, or `Lib.name(args)` when the
    /// base identifier resolves to an imported library.
    Value { base: Box<Expr>, method: Rc<str> },
}

/// Call resolution, filled in by elaboration.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedCall {
    /// A method of the current module (`CALL @entry_<name>`).
    Local { method: Rc<str> },
    /// A library method; the lowering strategy lives in the registry.
    Library { lib: Rc<str>, method: Rc<str> },
    /// A method on another module, lowered as a context switch.
    Contract { module: Rc<str>, method: Rc<str> },
    /// Packing of a declared struct's fields.
    StructCtor { name: Rc<str> },
}

/// An expression with its source span and (after elaboration) its type.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// Set by elaboration; `None` only before type checking.
    pub ty: Option<TypeRef>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            ty: None,
        }
    }

    /// The elaborated type.
    ///
    /// # Panics
    ///
    /// Panics if called before elaboration; the pipeline guarantees the
    /// checker runs before codegen.
    pub fn ty(&self) -> &TypeRef {
        self.ty
            .as_ref()
            .expect("BUG: expression type queried before elaboration")
    }
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// A literal; also the result of constant folding and macro expansion.
    Literal(Literal),
    /// Array literal `{a, b, c}`.
    ArrayLiteral(Vec<Expr>),
    /// An identifier reference.
    Ident {
        name: Rc<str>,
        binding: Option<Binding>,
    },
    /// Unary operation.
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Binary operation.
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// A call: method, library, or constructor.
    Call {
        target: CallTarget,
        /// Explicit type argument for `Call.method<T>` / `Call.interop<T>`.
        type_arg: Option<TypeExpr>,
        args: Vec<Expr>,
        resolved: Option<ResolvedCall>,
    },
    /// Indexing `base[index]`.
    Index { base: Box<Expr>, index: Box<Expr> },
    /// Field access `base.field` (struct field or enum entry).
    Field { base: Box<Expr>, field: Rc<str> },
    /// A `$`-macro before expansion.
    Macro {
        name: Rc<str>,
        arg: Option<TypeExpr>,
    },
    /// Implicit conversion inserted by elaboration; lowers to `CAST`.
    Cast { value: Box<Expr>, target: TypeRef },
}
