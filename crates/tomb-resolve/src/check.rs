//! Semantic elaboration: name resolution, bottom-up type checking, implicit
//! conversions, macro expansion and string-literal folding.
//!
//! The checker annotates the AST in place. After `elaborate` succeeds, every
//! expression carries a type, every identifier a binding, every call a
//! resolution, and every macro has been folded to a literal — the code
//! generator never resolves a name again.

use crate::libraries::LibraryRegistry;
use crate::macros::module_address;
use crate::scope::{ScopeArena, ScopeId, Symbol};
use indexmap::IndexMap;
use num_bigint::BigInt;
use std::rc::Rc;
use tomb_ast::{
    literal, AssignOp, BinaryOp, Binding, Block, CallTarget, CompileResult, CompilerError,
    EnumDecl, Expr, ExprKind, LValue, Literal, MethodDecl, MethodKind, ModuleAst, ModuleKind,
    Phase, ResolvedCall, SourceUnit, Span, Stmt, StructDecl, Type, TypeArg, TypeExpr,
    TypeInterner, TypeRef, UnaryOp, Visibility,
};

/// A fully elaborated source unit, ready for code generation.
#[derive(Debug)]
pub struct CheckedUnit {
    pub unit: SourceUnit,
    pub types: TypeInterner,
    pub registry: LibraryRegistry,
}

/// Signature of a module method, kept for call checking.
#[derive(Debug, Clone)]
pub struct MethodSig {
    pub params: Vec<TypeRef>,
    pub ret: TypeRef,
    pub variadic: bool,
    pub kind: MethodKind,
    pub visibility: Visibility,
}

/// Elaborate a parsed unit.
pub fn elaborate(mut unit: SourceUnit) -> CompileResult<CheckedUnit> {
    let mut types = TypeInterner::new();
    let registry = LibraryRegistry::standard(&mut types);
    let none = types.none();
    let mut checker = Checker {
        types,
        registry,
        structs: unit.structs.clone(),
        enums: unit.enums.clone(),
        module_sigs: IndexMap::new(),
        scopes: ScopeArena::new(),
        module_scope: None,
        module_name: Rc::from(""),
        method_sigs: IndexMap::new(),
        nft_implicits: Vec::new(),
        ret: none,
        variadic: false,
        bare_return_seen: false,
        next_slot: 0,
        loop_depth: 0,
    };

    // Signatures first, so modules can call across each other.
    for module in &mut unit.modules {
        let sigs = checker.collect_sigs(module)?;
        checker.module_sigs.insert(module.name.clone(), sigs);
    }
    for module in &mut unit.modules {
        checker.check_module(module)?;
    }

    Ok(CheckedUnit {
        unit,
        types: checker.types,
        registry: checker.registry,
    })
}

struct Checker {
    types: TypeInterner,
    registry: LibraryRegistry,
    structs: IndexMap<Rc<str>, StructDecl>,
    enums: IndexMap<Rc<str>, EnumDecl>,
    /// Method tables of every top-level module, for cross-module calls.
    module_sigs: IndexMap<Rc<str>, IndexMap<Rc<str>, MethodSig>>,

    // Per-module state.
    scopes: ScopeArena,
    module_scope: Option<ScopeId>,
    module_name: Rc<str>,
    method_sigs: IndexMap<Rc<str>, MethodSig>,
    /// Implicit leading arguments of nft sub-module methods.
    nft_implicits: Vec<(Rc<str>, TypeRef)>,

    // Per-method state.
    ret: TypeRef,
    variadic: bool,
    bare_return_seen: bool,
    next_slot: u32,
    loop_depth: u32,
}

impl Checker {
    // === Types ===

    fn resolve_type(&mut self, te: &TypeExpr) -> CompileResult<TypeRef> {
        let err = |msg: String| CompilerError::new(Phase::TypeCheck, te.span, msg);
        let generic = matches!(
            &*te.name,
            "decimal" | "array" | "storage_list" | "map" | "storage_map"
        );
        if !generic && !te.args.is_empty() {
            return Err(err(format!("type '{}' takes no arguments", te.name)));
        }
        let ty = match &*te.name {
            "number" => self.types.number(),
            "bool" => self.types.bool_(),
            "string" => self.types.string(),
            "timestamp" => self.types.timestamp(),
            "address" => self.types.address(),
            "hash" => self.types.intern(Type::Hash),
            "bytes" => self.types.bytes(),
            "any" => self.types.any(),
            "none" => self.types.none(),
            "decimal" => {
                let places = match te.args.as_slice() {
                    [TypeArg::Number(n)] if *n <= 32 => *n as u8,
                    [TypeArg::Number(n)] => {
                        return Err(err(format!("decimal precision {n} out of range")))
                    }
                    _ => return Err(err("decimal requires a numeric precision".to_string())),
                };
                self.types.intern(Type::Decimal(places))
            }
            "array" => {
                let elem = self.single_type_arg(te)?;
                self.types.intern(Type::Array(elem))
            }
            "storage_list" => {
                let elem = self.single_type_arg(te)?;
                self.types.intern(Type::StorageList(elem))
            }
            "map" => {
                let (key, val) = self.pair_type_args(te)?;
                self.types.intern(Type::Map(key, val))
            }
            "storage_map" => {
                let (key, val) = self.pair_type_args(te)?;
                self.types.intern(Type::StorageMap(key, val))
            }
            name if self.structs.contains_key(name) => {
                self.types.intern(Type::Struct(te.name.clone()))
            }
            name if self.enums.contains_key(name) => self.types.intern(Type::Enum(te.name.clone())),
            other => return Err(err(format!("unknown type '{other}'"))),
        };
        Ok(ty)
    }

    fn single_type_arg(&mut self, te: &TypeExpr) -> CompileResult<TypeRef> {
        match te.args.as_slice() {
            [TypeArg::Type(inner)] => self.resolve_type(inner),
            _ => Err(CompilerError::new(
                Phase::TypeCheck,
                te.span,
                format!("'{}' requires exactly one element type", te.name),
            )),
        }
    }

    fn pair_type_args(&mut self, te: &TypeExpr) -> CompileResult<(TypeRef, TypeRef)> {
        match te.args.as_slice() {
            [TypeArg::Type(key), TypeArg::Type(val)] => {
                Ok((self.resolve_type(key)?, self.resolve_type(val)?))
            }
            _ => Err(CompilerError::new(
                Phase::TypeCheck,
                te.span,
                format!("'{}' requires key and value types", te.name),
            )),
        }
    }

    // === Modules ===

    /// Resolve all method signatures of a module and reject duplicates.
    fn collect_sigs(
        &mut self,
        module: &mut ModuleAst,
    ) -> CompileResult<IndexMap<Rc<str>, MethodSig>> {
        let mut sigs = IndexMap::new();
        for method in &mut module.methods {
            if sigs.contains_key(&method.name) {
                return Err(CompilerError::new(
                    Phase::TypeCheck,
                    method.span,
                    format!(
                        "duplicate method '{}' in {} '{}'",
                        method.name,
                        module.kind.keyword(),
                        module.name
                    ),
                ));
            }
            let mut params = Vec::with_capacity(method.params.len());
            for param in &mut method.params {
                let ty = self.resolve_type(&param.declared)?;
                param.ty = Some(ty.clone());
                params.push(ty);
            }
            let ret = match &method.ret {
                Some(te) => self.resolve_type(te)?,
                None => self.types.none(),
            };
            method.ret_ty = Some(ret.clone());
            sigs.insert(
                method.name.clone(),
                MethodSig {
                    params,
                    ret,
                    variadic: method.variadic,
                    kind: method.kind,
                    visibility: method.visibility,
                },
            );
        }
        Ok(sigs)
    }

    fn check_module(&mut self, module: &mut ModuleAst) -> CompileResult<()> {
        let sigs = match self.module_sigs.get(&module.name) {
            Some(sigs) if module.kind != ModuleKind::Nft => sigs.clone(),
            _ => self.collect_sigs(module)?,
        };

        self.scopes = ScopeArena::new();
        let root = self.scopes.root();
        self.module_scope = Some(root);
        self.module_name = module.name.clone();
        self.method_sigs = sigs;

        // Type names are visible in every module.
        for name in self.structs.keys().cloned().collect::<Vec<_>>() {
            self.scopes
                .declare(root, name, Symbol::StructType, module.span)?;
        }
        for name in self.enums.keys().cloned().collect::<Vec<_>>() {
            self.scopes
                .declare(root, name, Symbol::EnumType, module.span)?;
        }
        // Sibling modules are callable through a context switch.
        for name in self.module_sigs.keys().cloned().collect::<Vec<_>>() {
            if name != module.name {
                self.scopes
                    .declare(root, name, Symbol::Module, module.span)?;
            }
        }

        for (lib, span) in &module.imports {
            if self.registry.library(lib).is_none() {
                return Err(CompilerError::new(
                    Phase::Resolve,
                    *span,
                    format!("unknown library '{lib}'"),
                ));
            }
            self.scopes
                .declare(root, lib.clone(), Symbol::Library, *span)?;
        }

        for decl in &mut module.consts {
            let ty = self.resolve_type(&decl.declared)?;
            let value = self.coerce_const(&decl.value, &ty, decl.span)?;
            decl.value = value.clone();
            self.scopes
                .declare(root, decl.name.clone(), Symbol::Const { value, ty }, decl.span)?;
        }

        for decl in &mut module.globals {
            if module.kind == ModuleKind::Script {
                return Err(CompilerError::new(
                    Phase::TypeCheck,
                    decl.span,
                    "scripts have no storage; globals are not allowed".to_string(),
                ));
            }
            let ty = self.resolve_type(&decl.declared)?;
            decl.ty = Some(ty.clone());
            self.scopes
                .declare(root, decl.name.clone(), Symbol::Global { ty }, decl.span)?;
        }

        for (name, sig) in self.method_sigs.clone() {
            self.scopes
                .declare(root, name, Symbol::Method { kind: sig.kind }, module.span)?;
        }

        // Implicit bindings of nft methods: token id, ROM and RAM payloads.
        self.nft_implicits = Vec::new();
        if module.kind == ModuleKind::Nft {
            let (rom_te, ram_te) = module
                .nft_types
                .clone()
                .expect("BUG: nft module without payload types");
            let rom = self.resolve_type(&rom_te)?;
            let ram = self.resolve_type(&ram_te)?;
            let number = self.types.number();
            self.nft_implicits = vec![
                (Rc::from("_tokenID"), number),
                (Rc::from("_ROM"), rom),
                (Rc::from("_RAM"), ram),
            ];
        }

        let mut methods = std::mem::take(&mut module.methods);
        for method in &mut methods {
            self.check_method(method)?;
        }
        module.methods = methods;

        let mut subs = std::mem::take(&mut module.sub_modules);
        for sub in &mut subs {
            if sub.kind != ModuleKind::Nft {
                return Err(CompilerError::new(
                    Phase::TypeCheck,
                    sub.span,
                    "only nft sub-modules may nest inside a module".to_string(),
                ));
            }
            self.check_module(sub)?;
        }
        module.sub_modules = subs;

        Ok(())
    }

    // === Methods ===

    fn check_method(&mut self, method: &mut MethodDecl) -> CompileResult<()> {
        self.ret = method.ret_ty.clone().unwrap_or_else(|| self.types.none());
        self.variadic = method.variadic;
        self.bare_return_seen = false;
        self.next_slot = 0;
        self.loop_depth = 0;

        let scope = self
            .scopes
            .child(self.module_scope.expect("module scope set"));
        for (name, ty) in self.nft_implicits.clone() {
            let slot = self.next_slot;
            self.next_slot += 1;
            self.scopes
                .declare(scope, name, Symbol::Argument { slot, ty }, method.span)?;
        }
        for param in &method.params {
            let slot = self.next_slot;
            self.next_slot += 1;
            self.scopes.declare(
                scope,
                param.name.clone(),
                Symbol::Argument {
                    slot,
                    ty: param.ty.clone().expect("param type resolved"),
                },
                method.span,
            )?;
        }

        let mut body = std::mem::take(&mut method.body);
        self.check_block(&mut body, scope)?;
        method.body = body;
        Ok(())
    }

    fn check_block(&mut self, block: &mut Block, parent: ScopeId) -> CompileResult<()> {
        let scope = self.scopes.child(parent);
        for stmt in &mut block.stmts {
            self.check_stmt(stmt, scope)?;
        }
        Ok(())
    }

    // === Statements ===

    fn check_stmt(&mut self, stmt: &mut Stmt, scope: ScopeId) -> CompileResult<()> {
        match stmt {
            Stmt::Local {
                name,
                declared,
                init,
                ty,
                slot,
                span,
            } => {
                let resolved = match (declared.as_ref().cloned(), init.as_mut()) {
                    (Some(te), Some(value)) => {
                        let target = self.resolve_type(&te)?;
                        self.check_expr(value, scope)?;
                        self.coerce(value, &target, false)?;
                        target
                    }
                    (Some(te), None) => self.resolve_type(&te)?,
                    (None, Some(value)) => self.check_expr(value, scope)?,
                    (None, None) => {
                        return Err(CompilerError::new(
                            Phase::TypeCheck,
                            *span,
                            format!("cannot infer the type of '{name}' without an initializer"),
                        ))
                    }
                };
                let new_slot = self.next_slot;
                self.next_slot += 1;
                self.scopes.declare(
                    scope,
                    name.clone(),
                    Symbol::Local {
                        slot: new_slot,
                        ty: resolved.clone(),
                    },
                    *span,
                )?;
                *ty = Some(resolved);
                *slot = Some(new_slot);
                Ok(())
            }
            Stmt::Assign {
                target,
                op,
                value,
                span,
            } => self.check_assign(target, *op, value, scope, *span),
            Stmt::Expr(expr) => {
                self.check_expr(expr, scope)?;
                Ok(())
            }
            Stmt::If {
                cond,
                then_block,
                or_else,
                ..
            } => {
                self.check_cond(cond, scope)?;
                self.check_block(then_block, scope)?;
                if let Some(block) = or_else {
                    self.check_block(block, scope)?;
                }
                Ok(())
            }
            Stmt::Switch {
                scrutinee,
                cases,
                default,
                span,
            } => {
                let scrutinee_ty = self.check_expr(scrutinee, scope)?;
                if !scrutinee_ty.is_ordinal() {
                    return Err(CompilerError::new(
                        Phase::TypeCheck,
                        *span,
                        format!("switch requires an ordinal type, got {scrutinee_ty}"),
                    ));
                }
                for (label, block) in cases.iter_mut() {
                    self.fold_case_label(label, &scrutinee_ty, scope)?;
                    self.check_block(block, scope)?;
                }
                if let Some(block) = default {
                    self.check_block(block, scope)?;
                }
                Ok(())
            }
            Stmt::While { cond, body, .. } => {
                self.check_cond(cond, scope)?;
                self.loop_depth += 1;
                self.check_block(body, scope)?;
                self.loop_depth -= 1;
                Ok(())
            }
            Stmt::DoWhile { body, cond, .. } => {
                self.loop_depth += 1;
                self.check_block(body, scope)?;
                self.loop_depth -= 1;
                self.check_cond(cond, scope)
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                // The induction variable lives in its own scope.
                let header = self.scopes.child(scope);
                self.check_stmt(init, header)?;
                self.check_cond(cond, header)?;
                self.loop_depth += 1;
                self.check_block(body, header)?;
                self.loop_depth -= 1;
                self.check_stmt(post, header)
            }
            Stmt::Break(span) => {
                if self.loop_depth == 0 {
                    return Err(CompilerError::new(
                        Phase::TypeCheck,
                        *span,
                        "break used outside of a loop".to_string(),
                    ));
                }
                Ok(())
            }
            Stmt::Continue(span) => {
                if self.loop_depth == 0 {
                    return Err(CompilerError::new(
                        Phase::TypeCheck,
                        *span,
                        "continue used outside of a loop".to_string(),
                    ));
                }
                Ok(())
            }
            Stmt::Return { value, span } => self.check_return(value, *span, scope),
            Stmt::Throw { message, .. } => {
                let ty = self.check_expr(message, scope)?;
                if !matches!(&*ty, Type::String) {
                    return Err(CompilerError::new(
                        Phase::TypeCheck,
                        message.span,
                        format!("throw requires a string message, got {ty}"),
                    ));
                }
                Ok(())
            }
        }
    }

    fn check_cond(&mut self, cond: &mut Expr, scope: ScopeId) -> CompileResult<()> {
        let ty = self.check_expr(cond, scope)?;
        if !matches!(&*ty, Type::Bool) {
            return Err(CompilerError::new(
                Phase::TypeCheck,
                cond.span,
                format!("condition must be bool, got {ty}"),
            ));
        }
        Ok(())
    }

    fn check_return(
        &mut self,
        value: &mut Option<Expr>,
        span: Span,
        scope: ScopeId,
    ) -> CompileResult<()> {
        let ret = self.ret.clone();
        match value {
            Some(expr) => {
                if self.variadic && self.bare_return_seen {
                    return Err(CompilerError::new(
                        Phase::TypeCheck,
                        span,
                        "no return value may follow a bare return in a variadic method".to_string(),
                    ));
                }
                if matches!(&*ret, Type::None) {
                    return Err(CompilerError::new(
                        Phase::TypeCheck,
                        span,
                        "cannot return a value from a void method".to_string(),
                    ));
                }
                self.check_expr(expr, scope)?;
                self.coerce(expr, &ret, false)
            }
            None => {
                if self.variadic {
                    self.bare_return_seen = true;
                    return Ok(());
                }
                if !matches!(&*ret, Type::None) {
                    return Err(CompilerError::new(
                        Phase::TypeCheck,
                        span,
                        format!("missing return value of type {ret}"),
                    ));
                }
                Ok(())
            }
        }
    }

    fn check_assign(
        &mut self,
        target: &mut LValue,
        op: AssignOp,
        value: &mut Expr,
        scope: ScopeId,
        span: Span,
    ) -> CompileResult<()> {
        self.check_expr(value, scope)?;

        match target {
            LValue::Name { name, binding } => {
                let symbol = self.scopes.resolve(scope, name).cloned().ok_or_else(|| {
                    CompilerError::new(
                        Phase::Resolve,
                        span,
                        format!("undeclared identifier '{name}'"),
                    )
                })?;
                let (bound, ty) = match symbol {
                    Symbol::Local { slot, ty } => (Binding::Local { slot }, ty),
                    Symbol::Argument { slot, ty } => (Binding::Argument { slot }, ty),
                    Symbol::Global { ty } => {
                        if ty.is_storage_bound() {
                            return Err(CompilerError::new(
                                Phase::TypeCheck,
                                span,
                                format!("storage container '{name}' cannot be reassigned"),
                            ));
                        }
                        (Binding::Global { name: name.clone() }, ty)
                    }
                    Symbol::Const { .. } => {
                        return Err(CompilerError::new(
                            Phase::TypeCheck,
                            span,
                            format!("cannot assign to constant '{name}'"),
                        ))
                    }
                    _ => {
                        return Err(CompilerError::new(
                            Phase::TypeCheck,
                            span,
                            format!("'{name}' is not assignable"),
                        ))
                    }
                };
                self.check_compound(op, &ty, value, span)?;
                *binding = Some(bound);
                Ok(())
            }
            LValue::Index { base, index } => {
                let base_ty = self.check_expr(base, scope)?;
                let (key_ty, elem_ty) = self.index_types(&base_ty, base.span)?;
                self.check_expr(index, scope)?;
                self.coerce(index, &key_ty, false)?;
                self.check_compound(op, &elem_ty, value, span)
            }
            LValue::Field { base, field } => {
                let base_ty = self.check_expr(base, scope)?;
                let field_ty = self.struct_field_type(&base_ty, field, span)?;
                self.check_compound(op, &field_ty, value, span)
            }
        }
    }

    /// Type rules for `target op= value`.
    fn check_compound(
        &mut self,
        op: AssignOp,
        target_ty: &TypeRef,
        value: &mut Expr,
        span: Span,
    ) -> CompileResult<()> {
        match op {
            AssignOp::Set => self.coerce(value, target_ty, false),
            AssignOp::Add if matches!(&**target_ty, Type::String) => {
                // String append: the right side is cast like in concatenation.
                self.coerce(value, target_ty, true)
            }
            _ => {
                if !target_ty.is_numeric() {
                    return Err(CompilerError::new(
                        Phase::TypeCheck,
                        span,
                        format!("compound assignment requires a numeric target, got {target_ty}"),
                    ));
                }
                self.coerce(value, target_ty, false)
            }
        }
    }

    /// Fold a case label to a literal of the scrutinee's type.
    fn fold_case_label(
        &mut self,
        label: &mut Expr,
        scrutinee_ty: &TypeRef,
        scope: ScopeId,
    ) -> CompileResult<()> {
        self.check_expr(label, scope)?;
        self.coerce(label, scrutinee_ty, false)?;
        let folded = match &label.kind {
            ExprKind::Literal(lit) => lit.clone(),
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand,
            } => match &operand.kind {
                ExprKind::Literal(Literal::Number(n)) => Literal::Number(-n),
                _ => {
                    return Err(CompilerError::new(
                        Phase::TypeCheck,
                        label.span,
                        "case label must be a literal".to_string(),
                    ))
                }
            },
            _ => {
                return Err(CompilerError::new(
                    Phase::TypeCheck,
                    label.span,
                    "case label must be a literal".to_string(),
                ))
            }
        };
        label.kind = ExprKind::Literal(folded);
        Ok(())
    }

    fn index_types(&mut self, base_ty: &TypeRef, span: Span) -> CompileResult<(TypeRef, TypeRef)> {
        match &**base_ty {
            Type::Array(elem) | Type::StorageList(elem) => Ok((self.types.number(), elem.clone())),
            Type::Map(key, val) | Type::StorageMap(key, val) => Ok((key.clone(), val.clone())),
            other => Err(CompilerError::new(
                Phase::TypeCheck,
                span,
                format!("type {other} cannot be indexed"),
            )),
        }
    }

    // === Expressions ===

    /// Check an expression, annotating it in place.
    ///
    /// Takes the node's kind by value so folding arms (constants, enum
    /// entries, macros, string concatenation) can rebuild it without
    /// fighting the borrow checker.
    fn check_expr(&mut self, expr: &mut Expr, scope: ScopeId) -> CompileResult<TypeRef> {
        let span = expr.span;
        let kind = std::mem::replace(&mut expr.kind, ExprKind::Literal(Literal::None));
        let (kind, ty) = self.check_kind(kind, span, scope)?;
        expr.kind = kind;
        expr.ty = Some(ty.clone());
        Ok(ty)
    }

    fn check_kind(
        &mut self,
        kind: ExprKind,
        span: Span,
        scope: ScopeId,
    ) -> CompileResult<(ExprKind, TypeRef)> {
        match kind {
            ExprKind::Literal(lit) => {
                let ty = lit.ty(&mut self.types);
                Ok((ExprKind::Literal(lit), ty))
            }
            ExprKind::ArrayLiteral(mut items) => {
                let mut elem: Option<TypeRef> = None;
                for item in items.iter_mut() {
                    let ty = self.check_expr(item, scope)?;
                    if elem.is_none() {
                        elem = Some(ty);
                    }
                }
                let elem = elem.unwrap_or_else(|| self.types.any());
                for item in items.iter_mut() {
                    self.coerce(item, &elem, false)?;
                }
                let ty = self.types.intern(Type::Array(elem));
                Ok((ExprKind::ArrayLiteral(items), ty))
            }
            ExprKind::Ident { name, .. } => {
                if &*name == "this" {
                    return Err(CompilerError::new(
                        Phase::Resolve,
                        span,
                        "'this' is only valid as a call receiver".to_string(),
                    ));
                }
                let symbol = self.scopes.resolve(scope, &name).cloned().ok_or_else(|| {
                    CompilerError::new(
                        Phase::Resolve,
                        span,
                        format!("undeclared identifier '{name}'"),
                    )
                })?;
                match symbol {
                    Symbol::Local { slot, ty } => Ok((
                        ExprKind::Ident {
                            name,
                            binding: Some(Binding::Local { slot }),
                        },
                        ty,
                    )),
                    Symbol::Argument { slot, ty } => Ok((
                        ExprKind::Ident {
                            name,
                            binding: Some(Binding::Argument { slot }),
                        },
                        ty,
                    )),
                    Symbol::Global { ty } => Ok((
                        ExprKind::Ident {
                            name: name.clone(),
                            binding: Some(Binding::Global { name }),
                        },
                        ty,
                    )),
                    Symbol::Const { value, ty } => Ok((ExprKind::Literal(value), ty)),
                    _ => Err(CompilerError::new(
                        Phase::Resolve,
                        span,
                        format!("'{name}' is not a value"),
                    )),
                }
            }
            ExprKind::Unary { op, mut operand } => {
                let operand_ty = self.check_expr(&mut operand, scope)?;
                match op {
                    UnaryOp::Not => {
                        if !matches!(&*operand_ty, Type::Bool) {
                            return Err(CompilerError::new(
                                Phase::TypeCheck,
                                span,
                                format!("'!' requires bool, got {operand_ty}"),
                            ));
                        }
                    }
                    UnaryOp::Neg => {
                        if !operand_ty.is_numeric() {
                            return Err(CompilerError::new(
                                Phase::TypeCheck,
                                span,
                                format!("'-' requires a numeric operand, got {operand_ty}"),
                            ));
                        }
                    }
                }
                Ok((ExprKind::Unary { op, operand }, operand_ty))
            }
            ExprKind::Binary {
                op,
                mut lhs,
                mut rhs,
            } => {
                self.check_expr(&mut lhs, scope)?;
                self.check_expr(&mut rhs, scope)?;
                let ty = self.check_binary(op, &mut lhs, &mut rhs, span)?;
                // Concatenation of two string literals folds at compile time.
                if op == BinaryOp::Add {
                    if let (
                        ExprKind::Literal(Literal::String(a)),
                        ExprKind::Literal(Literal::String(b)),
                    ) = (&lhs.kind, &rhs.kind)
                    {
                        return Ok((
                            ExprKind::Literal(Literal::String(format!("{a}{b}"))),
                            ty,
                        ));
                    }
                }
                Ok((ExprKind::Binary { op, lhs, rhs }, ty))
            }
            ExprKind::Call {
                mut target,
                type_arg,
                mut args,
                ..
            } => {
                let (resolved, ty) =
                    self.check_call(&mut target, &type_arg, &mut args, scope, span)?;
                Ok((
                    ExprKind::Call {
                        target,
                        type_arg,
                        args,
                        resolved: Some(resolved),
                    },
                    ty,
                ))
            }
            ExprKind::Index {
                mut base,
                mut index,
            } => {
                let base_ty = self.check_expr(&mut base, scope)?;
                let (key_ty, elem_ty) = self.index_types(&base_ty, base.span)?;
                self.check_expr(&mut index, scope)?;
                self.coerce(&mut index, &key_ty, false)?;
                Ok((ExprKind::Index { base, index }, elem_ty))
            }
            ExprKind::Field { mut base, field } => {
                // Enum entries look like field reads until resolution.
                if let ExprKind::Ident { name, .. } = &base.kind {
                    if matches!(self.scopes.resolve(scope, name), Some(Symbol::EnumType)) {
                        let enum_name = name.clone();
                        let decl = self.enums.get(&enum_name).expect("enum declared");
                        let value = decl
                            .entries
                            .iter()
                            .find(|(entry, _)| *entry == field)
                            .map(|(_, value)| *value)
                            .ok_or_else(|| {
                                CompilerError::new(
                                    Phase::Resolve,
                                    span,
                                    format!("enum '{enum_name}' has no entry '{field}'"),
                                )
                            })?;
                        let ty = self.types.intern(Type::Enum(enum_name));
                        return Ok((
                            ExprKind::Literal(Literal::Number(BigInt::from(value))),
                            ty,
                        ));
                    }
                }
                let base_ty = self.check_expr(&mut base, scope)?;
                let field_ty = self.struct_field_type(&base_ty, &field, span)?;
                Ok((ExprKind::Field { base, field }, field_ty))
            }
            ExprKind::Macro { name, arg } => {
                let (lit, ty) = self.expand_macro(&name, arg.as_ref(), span)?;
                Ok((ExprKind::Literal(lit), ty))
            }
            ExprKind::Cast { mut value, target } => {
                self.check_expr(&mut value, scope)?;
                let ty = target.clone();
                Ok((ExprKind::Cast { value, target }, ty))
            }
        }
    }

    fn check_binary(
        &mut self,
        op: BinaryOp,
        lhs: &mut Expr,
        rhs: &mut Expr,
        span: Span,
    ) -> CompileResult<TypeRef> {
        if op.is_logical() {
            for side in [&mut *lhs, &mut *rhs] {
                if !matches!(&**side.ty(), Type::Bool) {
                    return Err(CompilerError::new(
                        Phase::TypeCheck,
                        side.span,
                        format!("logical operator requires bool, got {}", side.ty()),
                    ));
                }
            }
            return Ok(self.types.bool_());
        }

        if op == BinaryOp::Add
            && (matches!(&**lhs.ty(), Type::String) || matches!(&**rhs.ty(), Type::String))
        {
            // `+` concatenates; the non-string side is cast to string.
            let string = self.types.string();
            for side in [&mut *lhs, &mut *rhs] {
                if !matches!(&**side.ty(), Type::String) {
                    self.coerce(side, &string, true)?;
                }
            }
            return Ok(string);
        }

        if op.is_comparison() {
            let unified = self.unify_operands(lhs, rhs, span)?;
            if matches!(op, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
                && !unified.is_numeric()
            {
                return Err(CompilerError::new(
                    Phase::TypeCheck,
                    span,
                    format!("ordering comparison requires numeric operands, got {unified}"),
                ));
            }
            return Ok(self.types.bool_());
        }

        if matches!(op, BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Xor) {
            for side in [&mut *lhs, &mut *rhs] {
                if !matches!(&**side.ty(), Type::Number) {
                    return Err(CompilerError::new(
                        Phase::TypeCheck,
                        side.span,
                        format!("bitwise operator requires number, got {}", side.ty()),
                    ));
                }
            }
            return Ok(self.types.number());
        }

        // Arithmetic: both sides Number, or Decimal with equal precision.
        let unified = self.unify_operands(lhs, rhs, span)?;
        if !unified.is_numeric() {
            return Err(CompilerError::new(
                Phase::TypeCheck,
                span,
                format!("arithmetic requires numeric operands, got {unified}"),
            ));
        }
        Ok(unified)
    }

    /// Unify two operand types, applying the literal conversions.
    fn unify_operands(
        &mut self,
        lhs: &mut Expr,
        rhs: &mut Expr,
        span: Span,
    ) -> CompileResult<TypeRef> {
        let lt = lhs.ty().clone();
        let rt = rhs.ty().clone();
        if lt == rt {
            return Ok(lt);
        }
        match (&*lt, &*rt) {
            (Type::Number, Type::Timestamp) | (Type::Timestamp, Type::Number) => {
                Ok(self.types.timestamp())
            }
            (Type::Decimal(_), Type::Number) => {
                self.coerce(rhs, &lt, false)?;
                Ok(lt)
            }
            (Type::Number, Type::Decimal(_)) => {
                self.coerce(lhs, &rt, false)?;
                Ok(rt)
            }
            _ => Err(CompilerError::new(
                Phase::TypeCheck,
                span,
                format!("mismatched operand types {lt} and {rt}"),
            )),
        }
    }

    fn struct_field_type(
        &mut self,
        base_ty: &TypeRef,
        field: &str,
        span: Span,
    ) -> CompileResult<TypeRef> {
        let Type::Struct(name) = &**base_ty else {
            return Err(CompilerError::new(
                Phase::TypeCheck,
                span,
                format!("type {base_ty} has no field '{field}'"),
            ));
        };
        let decl = self
            .structs
            .get(name)
            .cloned()
            .expect("struct type resolved from declaration");
        let field_te = decl
            .fields
            .iter()
            .find(|(fname, _)| &**fname == field)
            .map(|(_, te)| te.clone())
            .ok_or_else(|| {
                CompilerError::new(
                    Phase::TypeCheck,
                    span,
                    format!("struct '{name}' has no field '{field}'"),
                )
            })?;
        self.resolve_type(&field_te)
    }

    // === Calls ===

    fn check_call(
        &mut self,
        target: &mut CallTarget,
        type_arg: &Option<TypeExpr>,
        args: &mut [Expr],
        scope: ScopeId,
        span: Span,
    ) -> CompileResult<(ResolvedCall, TypeRef)> {
        match target {
            CallTarget::This(method) | CallTarget::Bare(method)
                if self.method_sigs.contains_key(method) =>
            {
                let method = method.clone();
                let sig = self.method_sigs.get(&method).cloned().expect("sig present");
                if sig.kind == MethodKind::Constructor {
                    return Err(CompilerError::new(
                        Phase::TypeCheck,
                        span,
                        "constructors cannot be called directly".to_string(),
                    ));
                }
                self.check_args(&method, &sig.params, false, args, scope, span)?;
                Ok((ResolvedCall::Local { method }, sig.ret))
            }
            CallTarget::Bare(name) => {
                // Not a method: try a struct constructor.
                let name = name.clone();
                let Some(decl) = self.structs.get(&name).cloned() else {
                    return Err(CompilerError::new(
                        Phase::Resolve,
                        span,
                        format!("no method or type named '{name}'"),
                    ));
                };
                self.check_struct_ctor(&decl, args, scope, span)?;
                let ty = self.types.intern(Type::Struct(name.clone()));
                Ok((ResolvedCall::StructCtor { name }, ty))
            }
            CallTarget::This(method) => Err(CompilerError::new(
                Phase::Resolve,
                span,
                format!("no method '{method}' in '{}'", self.module_name),
            )),
            CallTarget::Value { base, method } => {
                let method = method.clone();
                // A base identifier may name a library or a sibling module.
                if let ExprKind::Ident { name, .. } = &base.kind {
                    let name = name.clone();
                    match self.scopes.resolve(scope, &name) {
                        Some(Symbol::Library) => {
                            let ret = self
                                .check_library_call(&name, &method, type_arg, args, scope, span)?;
                            let resolved = if &*name == "Struct" {
                                ResolvedCall::StructCtor { name: method }
                            } else {
                                ResolvedCall::Library { lib: name, method }
                            };
                            return Ok((resolved, ret));
                        }
                        Some(Symbol::Module) => {
                            let sigs = self
                                .module_sigs
                                .get(&name)
                                .cloned()
                                .expect("module symbol has signatures");
                            let sig = sigs.get(&method).cloned().ok_or_else(|| {
                                CompilerError::new(
                                    Phase::Resolve,
                                    span,
                                    format!("module '{name}' has no method '{method}'"),
                                )
                            })?;
                            if sig.visibility != Visibility::Public {
                                return Err(CompilerError::new(
                                    Phase::TypeCheck,
                                    span,
                                    format!("method '{method}' of '{name}' is not public"),
                                ));
                            }
                            self.check_args(&method, &sig.params, false, args, scope, span)?;
                            return Ok((
                                ResolvedCall::Contract {
                                    module: name,
                                    method,
                                },
                                sig.ret,
                            ));
                        }
                        _ => {}
                    }
                }

                // Value method: the receiver dispatches through its library.
                let receiver_ty = self.check_expr(base, scope)?;
                let Some(lib) = LibraryRegistry::receiver_library(&receiver_ty) else {
                    return Err(CompilerError::new(
                        Phase::TypeCheck,
                        span,
                        format!("type {receiver_ty} has no method '{method}'"),
                    ));
                };
                let sig = self.registry.method(lib, &method).cloned().ok_or_else(|| {
                    CompilerError::new(
                        Phase::Resolve,
                        span,
                        format!("library '{lib}' has no method '{method}'"),
                    )
                })?;
                // The receiver is the first parameter.
                let rest = sig.params[1..].to_vec();
                self.check_args(&method, &rest, sig.varargs, args, scope, span)?;
                let ret = refine_container_ret(lib, &method, &receiver_ty)
                    .unwrap_or_else(|| sig.ret.clone());
                Ok((
                    ResolvedCall::Library {
                        lib: Rc::from(lib),
                        method,
                    },
                    ret,
                ))
            }
        }
    }

    fn check_library_call(
        &mut self,
        lib: &str,
        method: &str,
        type_arg: &Option<TypeExpr>,
        args: &mut [Expr],
        scope: ScopeId,
        span: Span,
    ) -> CompileResult<TypeRef> {
        if lib == "Struct" {
            let decl = self.structs.get(method).cloned().ok_or_else(|| {
                CompilerError::new(
                    Phase::Resolve,
                    span,
                    format!("unknown struct '{method}' in Struct constructor"),
                )
            })?;
            self.check_struct_ctor(&decl, args, scope, span)?;
            return Ok(self.types.intern(Type::Struct(Rc::from(method))));
        }

        let sig = self.registry.method(lib, method).cloned().ok_or_else(|| {
            CompilerError::new(
                Phase::Resolve,
                span,
                format!("library '{lib}' has no method '{method}'"),
            )
        })?;
        self.check_args(method, &sig.params, sig.varargs, args, scope, span)?;

        // `Call.method` synthesizes a local call and needs the name early.
        if lib == "Call" && method == "method" {
            match args.first().map(|a| &a.kind) {
                Some(ExprKind::Literal(Literal::String(name))) => {
                    if !self.method_sigs.contains_key(name.as_str()) {
                        return Err(CompilerError::new(
                            Phase::Resolve,
                            span,
                            format!("Call.method target '{name}' is not a method of this module"),
                        ));
                    }
                }
                _ => {
                    return Err(CompilerError::new(
                        Phase::TypeCheck,
                        span,
                        "Call.method requires a literal method name".to_string(),
                    ))
                }
            }
        }

        match type_arg {
            Some(te) => self.resolve_type(te),
            None => Ok(sig.ret.clone()),
        }
    }

    fn check_struct_ctor(
        &mut self,
        decl: &StructDecl,
        args: &mut [Expr],
        scope: ScopeId,
        span: Span,
    ) -> CompileResult<()> {
        if args.len() != decl.fields.len() {
            return Err(CompilerError::new(
                Phase::TypeCheck,
                span,
                format!(
                    "struct '{}' has {} fields, got {} arguments",
                    decl.name,
                    decl.fields.len(),
                    args.len()
                ),
            ));
        }
        for (arg, (_, field_te)) in args.iter_mut().zip(&decl.fields) {
            let field_ty = self.resolve_type(field_te)?;
            self.check_expr(arg, scope)?;
            self.coerce(arg, &field_ty, true)?;
        }
        Ok(())
    }

    fn check_args(
        &mut self,
        method: &str,
        params: &[TypeRef],
        varargs: bool,
        args: &mut [Expr],
        scope: ScopeId,
        span: Span,
    ) -> CompileResult<()> {
        if args.len() > params.len() && !varargs {
            return Err(CompilerError::new(
                Phase::TypeCheck,
                span,
                format!(
                    "too many arguments in call to '{method}': expected {}, got {}",
                    params.len(),
                    args.len()
                ),
            ));
        }
        if args.len() < params.len() {
            return Err(CompilerError::new(
                Phase::TypeCheck,
                span,
                format!(
                    "not enough arguments in call to '{method}': expected {}, got {}",
                    params.len(),
                    args.len()
                ),
            ));
        }
        for (i, arg) in args.iter_mut().enumerate() {
            self.check_expr(arg, scope)?;
            if let Some(param) = params.get(i) {
                // Numeric/string mismatches insert an implicit cast.
                self.coerce(arg, param, true)?;
            }
        }
        Ok(())
    }

    // === Conversions ===

    /// Make `expr` assignable to `target`, inserting casts or rewriting
    /// literals where the rules allow it.
    fn coerce(
        &mut self,
        expr: &mut Expr,
        target: &TypeRef,
        allow_string_cast: bool,
    ) -> CompileResult<()> {
        let actual = expr.ty().clone();
        if actual == *target || matches!(&**target, Type::Any) {
            return Ok(());
        }
        let span = expr.span;
        match (&*actual, &**target) {
            (Type::Number, Type::Timestamp) | (Type::Timestamp, Type::Number) => {
                expr.ty = Some(target.clone());
                Ok(())
            }
            (Type::Number, Type::Decimal(places)) => match &expr.kind {
                ExprKind::Literal(Literal::Number(value)) => {
                    let factor = BigInt::from(10u32).pow(*places as u32);
                    expr.kind = ExprKind::Literal(Literal::Decimal {
                        raw: value * factor,
                        places: *places,
                    });
                    expr.ty = Some(target.clone());
                    Ok(())
                }
                _ => Err(CompilerError::new(
                    Phase::TypeCheck,
                    span,
                    format!("cannot implicitly convert number to {target}; only literals convert"),
                )),
            },
            (Type::Decimal(from), Type::Decimal(to)) => match &expr.kind {
                ExprKind::Literal(Literal::Decimal { raw, .. }) => {
                    let rescaled = literal::rescale_decimal(raw, *from, *to, span)?;
                    expr.kind = ExprKind::Literal(Literal::Decimal {
                        raw: rescaled,
                        places: *to,
                    });
                    expr.ty = Some(target.clone());
                    Ok(())
                }
                _ => Err(CompilerError::new(
                    Phase::TypeCheck,
                    span,
                    format!("mismatched decimal precision: expected {target}, got {actual}"),
                )),
            },
            (Type::Bytes, Type::Address) => match &expr.kind {
                ExprKind::Literal(Literal::Bytes(bytes)) => {
                    expr.kind = ExprKind::Literal(Literal::Address(bytes.clone()));
                    expr.ty = Some(target.clone());
                    Ok(())
                }
                _ => Err(CompilerError::new(
                    Phase::TypeCheck,
                    span,
                    "only hex literals convert to address".to_string(),
                )),
            },
            (Type::Bytes, Type::Hash) => {
                expr.ty = Some(target.clone());
                Ok(())
            }
            (from, Type::String)
                if allow_string_cast
                    && matches!(
                        from,
                        Type::Number
                            | Type::Decimal(_)
                            | Type::Timestamp
                            | Type::Bool
                            | Type::Address
                            | Type::Enum(_)
                    ) =>
            {
                self.insert_cast(expr, target.clone());
                Ok(())
            }
            (Type::String, Type::Number) if allow_string_cast => {
                self.insert_cast(expr, target.clone());
                Ok(())
            }
            _ => Err(CompilerError::new(
                Phase::TypeCheck,
                span,
                format!("type mismatch: expected {target}, got {actual}"),
            )),
        }
    }

    fn insert_cast(&mut self, expr: &mut Expr, target: TypeRef) {
        let span = expr.span;
        let inner = std::mem::replace(expr, Expr::new(ExprKind::Literal(Literal::None), span));
        *expr = Expr {
            kind: ExprKind::Cast {
                value: Box::new(inner),
                target: target.clone(),
            },
            span,
            ty: Some(target),
        };
    }

    /// Check a const initializer against its declared type.
    fn coerce_const(
        &mut self,
        value: &Literal,
        target: &TypeRef,
        span: Span,
    ) -> CompileResult<Literal> {
        let mut expr = Expr::new(ExprKind::Literal(value.clone()), span);
        expr.ty = Some(value.ty(&mut self.types));
        self.coerce(&mut expr, target, false)?;
        match expr.kind {
            ExprKind::Literal(lit) => Ok(lit),
            _ => Err(CompilerError::new(
                Phase::TypeCheck,
                span,
                "const initializer must stay a literal".to_string(),
            )),
        }
    }

    // === Macros ===

    fn expand_macro(
        &mut self,
        name: &str,
        arg: Option<&TypeExpr>,
        span: Span,
    ) -> CompileResult<(Literal, TypeRef)> {
        match name {
            "THIS_ADDRESS" => Ok((
                Literal::Address(module_address(&self.module_name)),
                self.types.address(),
            )),
            "THIS_SYMBOL" => Ok((
                Literal::String(self.module_name.to_string()),
                self.types.string(),
            )),
            "TYPE_OF" => {
                let te = arg.ok_or_else(|| {
                    CompilerError::new(
                        Phase::TypeCheck,
                        span,
                        "$TYPE_OF requires a type argument".to_string(),
                    )
                })?;
                let ty = self.resolve_type(te)?;
                Ok((
                    Literal::Number(BigInt::from(ty.code())),
                    self.types.number(),
                ))
            }
            other => Err(CompilerError::new(
                Phase::Resolve,
                span,
                format!("unknown macro '${other}'"),
            )),
        }
    }
}

/// Container methods whose return type depends on the receiver's element
/// type (`list.get`, `map.get`, `array.at`).
fn refine_container_ret(lib: &str, method: &str, receiver: &Type) -> Option<TypeRef> {
    match (lib, method, receiver) {
        ("List", "get", Type::StorageList(elem)) => Some(elem.clone()),
        ("Array", "at", Type::Array(elem)) => Some(elem.clone()),
        ("Map", "get", Type::Map(_, val)) | ("Map", "get", Type::StorageMap(_, val)) => {
            Some(val.clone())
        }
        _ => None,
    }
}
