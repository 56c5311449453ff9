//! AST-walking code generation.
//!
//! Walks the elaborated AST of one module and emits textual VM assembly.
//! All state (label counter, register pool, builtin-emitted set, current
//! source line) lives in the `CodeGen` instance, so compilations can run
//! concurrently without interference.

use crate::builtins;
use crate::emitter::Emitter;
use crate::registers::{RegId, RegisterPool};
use std::collections::HashMap;
use std::rc::Rc;
use tomb_ast::{
    AssignOp, BinaryOp, Binding, Block, CallTarget, CompileResult, CompilerError, Expr, ExprKind,
    LValue, Literal, MethodDecl, ModuleAst, ModuleKind, Phase, ResolvedCall, SourceText, Span,
    Stmt, Type, TypeRef, UnaryOp,
};
use tomb_resolve::{CheckedUnit, CustomKind, Lowering};

/// Generate the assembly of one module.
///
/// Sub-modules are compiled separately by the pipeline; this walks exactly
/// one module's methods and appends the builtin section.
pub fn generate(
    checked: &CheckedUnit,
    module: &ModuleAst,
    source: &SourceText,
) -> CompileResult<String> {
    let mut gen = CodeGen {
        checked,
        module,
        source,
        em: Emitter::new(),
        regs: RegisterPool::new(),
        slots: HashMap::new(),
        loops: Vec::new(),
        variadic: false,
    };
    gen.run()
}

/// Jump targets of the innermost enclosing loop.
struct LoopLabels {
    continue_to: String,
    break_to: String,
}

struct CodeGen<'a> {
    checked: &'a CheckedUnit,
    module: &'a ModuleAst,
    source: &'a SourceText,
    em: Emitter,
    regs: RegisterPool,
    /// Live register of each local/argument slot.
    slots: HashMap<u32, RegId>,
    loops: Vec<LoopLabels>,
    /// Whether the current method returns a variadic stream.
    variadic: bool,
}

impl<'a> CodeGen<'a> {
    fn run(mut self) -> CompileResult<String> {
        self.em.comment(&format!(
            "===== {} {} =====",
            self.module.kind.keyword(),
            self.module.name
        ));
        for method in &self.module.methods {
            self.gen_method(method)?;
        }

        // Builtin section: each required snippet exactly once, at the end.
        let keys: Vec<&'static str> = self.em.builtins().collect();
        if !keys.is_empty() {
            self.em.comment("===== builtins =====");
            for key in keys {
                let text = builtins::snippet(key).expect("builtin key registered by codegen");
                self.em.raw(text);
            }
        }
        Ok(self.em.finish())
    }

    // === Methods ===

    fn gen_method(&mut self, method: &MethodDecl) -> CompileResult<()> {
        self.regs = RegisterPool::new();
        self.slots = HashMap::new();
        self.loops = Vec::new();
        self.variadic = method.variadic;

        self.em
            .source_line(method.span.line, self.source.line_text(method.span.line));
        self.em.label(&entry_label(&method.name));

        // Prologue: pop arguments into registers, first argument on top.
        let mut arg_names: Vec<Rc<str>> = Vec::new();
        if self.module.kind == ModuleKind::Nft {
            arg_names.extend(["_tokenID".into(), "_ROM".into(), "_RAM".into()]);
        }
        arg_names.extend(method.params.iter().map(|p| p.name.clone()));

        let mut owned: Vec<RegId> = Vec::new();
        for (slot, name) in arg_names.iter().enumerate() {
            let reg = self.regs.alloc(name, method.span)?;
            self.em.op(format!("POP {reg} // {name}"));
            self.slots.insert(slot as u32, reg);
            owned.push(reg);
        }

        self.gen_block(&method.body)?;

        // Epilogue: a method that falls off its end still returns.
        if !ends_with_return(&method.body) || method.variadic {
            self.em.op("RET");
        }

        // Locals acquired anywhere in the body are released here.
        let mut locals: Vec<RegId> = self
            .slots
            .values()
            .copied()
            .filter(|reg| !owned.contains(reg))
            .collect();
        locals.sort_by_key(|reg| reg.index());
        for reg in locals {
            self.regs.release(reg);
        }
        for reg in owned {
            self.regs.release(reg);
        }
        self.regs.assert_clean();
        Ok(())
    }

    fn gen_block(&mut self, block: &Block) -> CompileResult<()> {
        self.em.indent_push();
        for stmt in &block.stmts {
            self.gen_stmt(stmt)?;
        }
        self.em.indent_pop();
        Ok(())
    }

    // === Statements ===

    fn gen_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        let line = stmt.line();
        self.em.source_line(line, self.source.line_text(line));

        match stmt {
            Stmt::Local {
                name, init, slot, span, ..
            } => {
                let slot = (*slot).expect("local slot assigned by elaboration");
                let reg = self.regs.alloc(name, *span)?;
                self.slots.insert(slot, reg);
                match init {
                    Some(value) => {
                        let v = self.gen_expr(value)?;
                        self.em.op(format!("COPY {v} {reg}"));
                        self.release(v);
                    }
                    None => self.em.op(format!("LOAD {reg} none")),
                }
                Ok(())
            }
            Stmt::Assign {
                target,
                op,
                value,
                span,
            } => self.gen_assign(target, *op, value, *span),
            Stmt::Expr(expr) => {
                if let Some(reg) = self.gen_expr_opt(expr)? {
                    self.release(reg);
                }
                Ok(())
            }
            Stmt::If {
                cond,
                then_block,
                or_else,
                ..
            } => {
                let id = self.em.next_id();
                let end = format!("@end_{id}");
                let cond_reg = self.gen_expr(cond)?;
                match or_else {
                    Some(else_block) => {
                        let else_label = format!("@else_{id}");
                        self.em.op(format!("JMPNOT {cond_reg} {else_label}"));
                        self.release(cond_reg);
                        self.gen_block(then_block)?;
                        self.em.op(format!("JMP {end}"));
                        self.em.label(&else_label);
                        self.gen_block(else_block)?;
                    }
                    None => {
                        self.em.op(format!("JMPNOT {cond_reg} {end}"));
                        self.release(cond_reg);
                        self.gen_block(then_block)?;
                    }
                }
                self.em.label(&end);
                Ok(())
            }
            Stmt::Switch {
                scrutinee,
                cases,
                default,
                span,
            } => self.gen_switch(scrutinee, cases, default.as_ref(), *span),
            Stmt::While { cond, body, .. } => {
                let id = self.em.next_id();
                let loop_label = format!("@loop_{id}");
                let end = format!("@end_{id}");
                self.em.label(&loop_label);
                let cond_reg = self.gen_expr(cond)?;
                self.em.op(format!("JMPNOT {cond_reg} {end}"));
                self.release(cond_reg);
                self.loops.push(LoopLabels {
                    continue_to: loop_label.clone(),
                    break_to: end.clone(),
                });
                self.gen_block(body)?;
                self.loops.pop();
                self.em.op(format!("JMP {loop_label}"));
                self.em.label(&end);
                Ok(())
            }
            Stmt::DoWhile { body, cond, .. } => {
                let id = self.em.next_id();
                let loop_label = format!("@loop_{id}");
                let post = format!("@post_{id}");
                let end = format!("@end_{id}");
                self.em.label(&loop_label);
                self.loops.push(LoopLabels {
                    continue_to: post.clone(),
                    break_to: end.clone(),
                });
                self.gen_block(body)?;
                self.loops.pop();
                self.em.label(&post);
                let cond_reg = self.gen_expr(cond)?;
                self.em.op(format!("JMPIF {cond_reg} {loop_label}"));
                self.release(cond_reg);
                self.em.label(&end);
                Ok(())
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                self.gen_stmt(init)?;
                let id = self.em.next_id();
                let loop_label = format!("@loop_{id}");
                let post_label = format!("@post_{id}");
                let end = format!("@end_{id}");
                self.em.label(&loop_label);
                let cond_reg = self.gen_expr(cond)?;
                self.em.op(format!("JMPNOT {cond_reg} {end}"));
                self.release(cond_reg);
                self.loops.push(LoopLabels {
                    continue_to: post_label.clone(),
                    break_to: end.clone(),
                });
                self.gen_block(body)?;
                self.loops.pop();
                self.em.label(&post_label);
                self.gen_stmt(post)?;
                self.em.op(format!("JMP {loop_label}"));
                self.em.label(&end);
                Ok(())
            }
            Stmt::Break(span) => {
                let target = self
                    .loops
                    .last()
                    .map(|l| l.break_to.clone())
                    .ok_or_else(|| {
                        CompilerError::new(Phase::CodeGen, *span, "break outside of a loop")
                    })?;
                self.em.op(format!("JMP {target}"));
                Ok(())
            }
            Stmt::Continue(span) => {
                let target = self
                    .loops
                    .last()
                    .map(|l| l.continue_to.clone())
                    .ok_or_else(|| {
                        CompilerError::new(Phase::CodeGen, *span, "continue outside of a loop")
                    })?;
                self.em.op(format!("JMP {target}"));
                Ok(())
            }
            Stmt::Return { value, .. } => {
                match value {
                    Some(expr) => {
                        let reg = self.gen_expr(expr)?;
                        self.em.op(format!("PUSH {reg}"));
                        self.release(reg);
                        // A variadic return yields a value and keeps going.
                        if !self.variadic {
                            self.em.op("RET");
                        }
                    }
                    None => self.em.op("RET"),
                }
                Ok(())
            }
            Stmt::Throw { message, .. } => {
                let reg = self.gen_expr(message)?;
                self.em.op(format!("THROW {reg}"));
                self.release(reg);
                Ok(())
            }
        }
    }

    fn gen_switch(
        &mut self,
        scrutinee: &Expr,
        cases: &[(Expr, Block)],
        default: Option<&Block>,
        span: Span,
    ) -> CompileResult<()> {
        let id = self.em.next_id();
        let end = format!("@end_{id}");
        let default_label = format!("@default_{id}");

        // The scrutinee is evaluated exactly once.
        let scrutinee_reg = self.gen_expr(scrutinee)?;
        let probe = self.regs.alloc("case", span)?;
        for (index, (label, _)) in cases.iter().enumerate() {
            let literal = case_literal(label)?;
            self.em.op(format!("LOAD {probe} {}", literal.asm_operand()));
            self.em
                .op(format!("EQUAL {probe} {scrutinee_reg} {probe}"));
            self.em.op(format!("JMPIF {probe} @case_{id}_{index}"));
        }
        if default.is_some() {
            self.em.op(format!("JMP {default_label}"));
        } else {
            self.em.op(format!("JMP {end}"));
        }
        self.release(probe);
        self.release(scrutinee_reg);

        for (index, (_, block)) in cases.iter().enumerate() {
            self.em.label(&format!("@case_{id}_{index}"));
            self.gen_block(block)?;
            if !ends_with_return(block) {
                self.em.op(format!("JMP {end}"));
            }
        }
        if let Some(block) = default {
            self.em.label(&default_label);
            self.gen_block(block)?;
        }
        self.em.label(&end);
        Ok(())
    }

    fn gen_assign(
        &mut self,
        target: &LValue,
        op: AssignOp,
        value: &Expr,
        span: Span,
    ) -> CompileResult<()> {
        match target {
            LValue::Name { binding, .. } => {
                match binding.as_ref().expect("assignment target resolved") {
                    Binding::Local { slot } | Binding::Argument { slot } => {
                        let dst = *self
                            .slots
                            .get(slot)
                            .expect("slot register allocated before use");
                        let v = self.gen_expr(value)?;
                        match assign_mnemonic(op) {
                            None => self.em.op(format!("COPY {v} {dst}")),
                            Some(mnemonic) => {
                                self.em.op(format!("{mnemonic} {dst} {v} {dst}"))
                            }
                        }
                        self.release(v);
                        Ok(())
                    }
                    Binding::Global { name: global } => {
                        let v = self.gen_expr(value)?;
                        let result = match assign_mnemonic(op) {
                            None => v,
                            Some(mnemonic) => {
                                let cur = self.gen_global_read(global, span)?;
                                self.em.op(format!("{mnemonic} {cur} {v} {cur}"));
                                self.release(v);
                                cur
                            }
                        };
                        self.gen_global_write(global, result, span)?;
                        self.release(result);
                        Ok(())
                    }
                }
            }
            LValue::Index { base, index } => {
                let set_call = container_set_call(base.ty(), span)?;
                let get_call = container_get_call(base.ty(), span)?;
                let container = self.gen_expr(base)?;
                let key = self.gen_expr(index)?;
                let v = self.gen_expr(value)?;
                let stored = match assign_mnemonic(op) {
                    None => v,
                    Some(mnemonic) => {
                        // Read-modify-write through the container intrinsics.
                        let cur = self
                            .ext_call(get_call, &[container, key], true, span)?
                            .expect("container get yields a value");
                        self.em.op(format!("{mnemonic} {cur} {v} {cur}"));
                        self.release(v);
                        cur
                    }
                };
                self.ext_call(set_call, &[container, key, stored], false, span)?;
                self.release(container);
                self.release(key);
                self.release(stored);
                Ok(())
            }
            LValue::Field { base, field } => {
                let obj = self.gen_expr(base)?;
                let name_reg = self.regs.alloc("field", span)?;
                self.em
                    .op(format!("LOAD {name_reg} \"{}\"", escape(field)));
                let v = self.gen_expr(value)?;
                let stored = match assign_mnemonic(op) {
                    None => v,
                    Some(mnemonic) => {
                        let cur = self
                            .ext_call("Struct.Get", &[obj, name_reg], true, span)?
                            .expect("struct get yields a value");
                        self.em.op(format!("{mnemonic} {cur} {v} {cur}"));
                        self.release(v);
                        cur
                    }
                };
                self.ext_call("Struct.Set", &[obj, name_reg, stored], false, span)?;
                self.release(obj);
                self.release(name_reg);
                self.release(stored);
                Ok(())
            }
        }
    }

    // === Expressions ===

    /// Generate an expression into a caller-owned register.
    fn gen_expr(&mut self, expr: &Expr) -> CompileResult<RegId> {
        match self.gen_expr_opt(expr)? {
            Some(reg) => Ok(reg),
            None => {
                // Void call in value position: materialize `none`.
                let reg = self.regs.alloc("none", expr.span)?;
                self.em.op(format!("LOAD {reg} none"));
                Ok(reg)
            }
        }
    }

    /// Generate an expression; void calls produce no register.
    fn gen_expr_opt(&mut self, expr: &Expr) -> CompileResult<Option<RegId>> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Literal(lit) => {
                let reg = self.regs.alloc("lit", span)?;
                self.em.op(format!("LOAD {reg} {}", lit.asm_operand()));
                Ok(Some(reg))
            }
            ExprKind::ArrayLiteral(items) => {
                // Elements are pushed right-to-left, then packed.
                let mut regs = Vec::with_capacity(items.len());
                for item in items {
                    regs.push(self.gen_expr(item)?);
                }
                for reg in regs.iter().rev() {
                    self.em.op(format!("PUSH {reg}"));
                }
                for reg in regs {
                    self.release(reg);
                }
                let reg = self.regs.alloc("array", span)?;
                self.em.op(format!("LOAD {reg} {}", items.len()));
                self.em.op(format!("PUSH {reg}"));
                self.em.op(format!("LOAD {reg} \"Array.Pack\""));
                self.em.op(format!("EXTCALL {reg}"));
                self.em.op(format!("POP {reg}"));
                Ok(Some(reg))
            }
            ExprKind::Ident { name, binding } => {
                match binding.as_ref().expect("identifier resolved") {
                    Binding::Local { slot } | Binding::Argument { slot } => {
                        let src = *self
                            .slots
                            .get(slot)
                            .expect("slot register allocated before use");
                        let dst = self.regs.alloc(name, span)?;
                        self.em.op(format!("COPY {src} {dst}"));
                        Ok(Some(dst))
                    }
                    Binding::Global { name } => {
                        if expr.ty().is_storage_bound() {
                            // Storage containers are addressed by name.
                            let reg = self.regs.alloc(name, span)?;
                            self.em.op(format!("LOAD {reg} \"{}\"", escape(name)));
                            Ok(Some(reg))
                        } else {
                            Ok(Some(self.gen_global_read(name, span)?))
                        }
                    }
                }
            }
            ExprKind::Unary { op, operand } => {
                let reg = self.gen_expr(operand)?;
                match op {
                    UnaryOp::Not => self.em.op(format!("NOT {reg} {reg}")),
                    UnaryOp::Neg => self.em.op(format!("NEG {reg} {reg}")),
                }
                Ok(Some(reg))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.gen_expr(lhs)?;
                let r = self.gen_expr(rhs)?;
                let out = self.regs.alloc("tmp", span)?;
                match op.mnemonic() {
                    Some(mnemonic) => self.em.op(format!("{mnemonic} {l} {r} {out}")),
                    None => {
                        debug_assert_eq!(*op, BinaryOp::Ne);
                        self.em.op(format!("EQUAL {l} {r} {out}"));
                        self.em.op(format!("NOT {out} {out}"));
                    }
                }
                self.release(l);
                self.release(r);
                Ok(Some(out))
            }
            ExprKind::Call {
                target,
                args,
                resolved,
                ..
            } => self.gen_call(
                target,
                args,
                resolved.as_ref().expect("call resolved"),
                expr.ty(),
                span,
            ),
            ExprKind::Index { base, index } => {
                let call = container_get_call(base.ty(), span)?;
                let container = self.gen_expr(base)?;
                let key = self.gen_expr(index)?;
                let result = self.ext_call(call, &[container, key], true, span)?;
                self.release(container);
                self.release(key);
                Ok(result)
            }
            ExprKind::Field { base, field } => {
                let obj = self.gen_expr(base)?;
                let name_reg = self.regs.alloc("field", span)?;
                self.em
                    .op(format!("LOAD {name_reg} \"{}\"", escape(field)));
                let result = self.ext_call("Struct.Get", &[obj, name_reg], true, span)?;
                self.release(obj);
                self.release(name_reg);
                Ok(result)
            }
            ExprKind::Macro { name, .. } => Err(CompilerError::new(
                Phase::CodeGen,
                span,
                format!("internal: macro ${name} survived elaboration"),
            )),
            ExprKind::Cast { value, target } => {
                let reg = self.gen_expr(value)?;
                self.em
                    .op(format!("CAST {reg} {reg} #{}", target.code()));
                Ok(Some(reg))
            }
        }
    }

    // === Calls ===

    fn gen_call(
        &mut self,
        target: &CallTarget,
        args: &[Expr],
        resolved: &ResolvedCall,
        result_ty: &TypeRef,
        span: Span,
    ) -> CompileResult<Option<RegId>> {
        let has_result = !matches!(&**result_ty, Type::None);
        match resolved {
            ResolvedCall::Local { method } => {
                self.push_args(args, 0)?;
                self.em.op(format!("CALL {}", entry_label(method)));
                self.pop_result(has_result, "result", span)
            }
            ResolvedCall::Contract { module, method } => {
                self.push_args(args, 0)?;
                self.context_switch(module, method, span)?;
                self.pop_result(has_result, "result", span)
            }
            ResolvedCall::StructCtor { name } => self.gen_struct_ctor(name, args, span),
            ResolvedCall::Library { lib, method } => {
                let sig = self
                    .checked
                    .registry
                    .method(lib, method)
                    .expect("library call resolved against the registry")
                    .clone();
                match sig.lowering {
                    Lowering::ExtCall(qualified) => {
                        let receiver = self.gen_receiver(target)?;
                        let mut regs = Vec::new();
                        if let Some(reg) = receiver {
                            regs.push(reg);
                        }
                        for arg in args {
                            regs.push(self.gen_expr(arg)?);
                        }
                        let result = self.ext_call(qualified, &regs, has_result, span)?;
                        for reg in regs {
                            self.release(reg);
                        }
                        Ok(result)
                    }
                    Lowering::ContractCall { contract, method } => {
                        self.push_args(args, 0)?;
                        self.context_switch(contract, method, span)?;
                        self.pop_result(has_result, "result", span)
                    }
                    Lowering::LocalCall => {
                        self.push_args(args, 0)?;
                        self.em.op(format!("CALL {}", entry_label(sig.name)));
                        self.pop_result(has_result, "result", span)
                    }
                    Lowering::Builtin(key) => {
                        if self.em.require_builtin(key) {
                            debug_assert!(builtins::snippet(key).is_some());
                        }
                        self.push_args(args, 0)?;
                        self.em
                            .op(format!("CALL {}", builtins::entry_label(key)));
                        self.pop_result(has_result, "result", span)
                    }
                    Lowering::Custom(Some(CustomKind::CallMethod)) => {
                        let ExprKind::Literal(Literal::String(name)) = &args[0].kind else {
                            unreachable!("checker enforces a literal method name");
                        };
                        self.push_args(args, 1)?;
                        self.em.op(format!("CALL {}", entry_label(name)));
                        self.pop_result(has_result, "result", span)
                    }
                    Lowering::Custom(Some(CustomKind::CallInterop)) => {
                        self.push_args(args, 1)?;
                        let reg = self.gen_expr(&args[0])?;
                        self.em.op(format!("EXTCALL {reg}"));
                        self.release(reg);
                        self.pop_result(has_result, "interop", span)
                    }
                    Lowering::Custom(None) => Err(CompilerError::new(
                        Phase::CodeGen,
                        span,
                        format!("library method {lib}.{method} is not implemented"),
                    )),
                }
            }
        }
    }

    /// Receiver of a value-method call, if the call has one.
    fn gen_receiver(&mut self, target: &CallTarget) -> CompileResult<Option<RegId>> {
        match target {
            // A checked base expression is a receiver; an unchecked one is
            // a plain library namespace.
            CallTarget::Value { base, .. } if base.ty.is_some() => {
                Ok(Some(self.gen_expr(base)?))
            }
            _ => Ok(None),
        }
    }

    /// Push call arguments right-to-left, skipping the first `skip`.
    fn push_args(&mut self, args: &[Expr], skip: usize) -> CompileResult<()> {
        let mut regs = Vec::with_capacity(args.len().saturating_sub(skip));
        for arg in &args[skip..] {
            regs.push(self.gen_expr(arg)?);
        }
        for reg in regs.iter().rev() {
            self.em.op(format!("PUSH {reg}"));
        }
        for reg in regs {
            self.release(reg);
        }
        Ok(())
    }

    fn pop_result(
        &mut self,
        has_result: bool,
        hint: &str,
        span: Span,
    ) -> CompileResult<Option<RegId>> {
        if !has_result {
            return Ok(None);
        }
        let reg = self.regs.alloc(hint, span)?;
        self.em.op(format!("POP {reg}"));
        Ok(Some(reg))
    }

    /// The cross-contract call sequence.
    fn context_switch(&mut self, contract: &str, method: &str, span: Span) -> CompileResult<()> {
        let reg = self.regs.alloc("ctx", span)?;
        self.em.op(format!("LOAD {reg} \"{}\"", escape(method)));
        self.em.op(format!("PUSH {reg}"));
        self.em.op(format!("LOAD {reg} \"{}\"", escape(contract)));
        self.em.op(format!("CTX {reg} {reg}"));
        self.em.op(format!("SWITCH {reg}"));
        self.release(reg);
        Ok(())
    }

    fn gen_struct_ctor(
        &mut self,
        name: &str,
        args: &[Expr],
        span: Span,
    ) -> CompileResult<Option<RegId>> {
        let decl = self
            .checked
            .unit
            .structs
            .get(name)
            .expect("struct constructor resolved against declarations");
        let field_names: Vec<Rc<str>> = decl.fields.iter().map(|(n, _)| n.clone()).collect();

        // Push (value, field-name) pairs last-field-first, then the count
        // and the struct's name.
        let reg = self.regs.alloc("struct", span)?;
        for (arg, field) in args.iter().zip(&field_names).rev() {
            let v = self.gen_expr(arg)?;
            self.em.op(format!("PUSH {v}"));
            self.release(v);
            self.em.op(format!("LOAD {reg} \"{}\"", escape(field)));
            self.em.op(format!("PUSH {reg}"));
        }
        self.em.op(format!("LOAD {reg} {}", args.len()));
        self.em.op(format!("PUSH {reg}"));
        self.em.op(format!("LOAD {reg} \"{}\"", escape(name)));
        self.em.op(format!("PUSH {reg}"));
        self.em.op(format!("LOAD {reg} \"Struct.Pack\""));
        self.em.op(format!("EXTCALL {reg}"));
        self.em.op(format!("POP {reg}"));
        Ok(Some(reg))
    }

    /// `EXTCALL` an intrinsic: args pushed right-to-left, result popped.
    ///
    /// The argument registers stay owned by the caller.
    fn ext_call(
        &mut self,
        qualified: &str,
        args: &[RegId],
        has_result: bool,
        span: Span,
    ) -> CompileResult<Option<RegId>> {
        for reg in args.iter().rev() {
            self.em.op(format!("PUSH {reg}"));
        }
        let reg = self.regs.alloc(qualified, span)?;
        self.em.op(format!("LOAD {reg} \"{}\"", escape(qualified)));
        self.em.op(format!("EXTCALL {reg}"));
        if has_result {
            self.em.op(format!("POP {reg}"));
            Ok(Some(reg))
        } else {
            self.release(reg);
            Ok(None)
        }
    }

    // === Globals ===

    /// Read a global through contract storage.
    fn gen_global_read(&mut self, name: &str, span: Span) -> CompileResult<RegId> {
        let reg = self.regs.alloc(name, span)?;
        self.em.op(format!("LOAD {reg} \"{}\"", escape(name)));
        self.em.op(format!("PUSH {reg}"));
        self.em.op(format!("LOAD {reg} \"Data.Get\""));
        self.em.op(format!("EXTCALL {reg}"));
        self.em.op(format!("POP {reg}"));
        Ok(reg)
    }

    /// Write a global through contract storage. The value register stays
    /// owned by the caller.
    fn gen_global_write(&mut self, name: &str, value: RegId, span: Span) -> CompileResult<()> {
        self.em.op(format!("PUSH {value}"));
        let key = self.regs.alloc("key", span)?;
        self.em.op(format!("LOAD {key} \"{}\"", escape(name)));
        self.em.op(format!("PUSH {key}"));
        self.em.op(format!("LOAD {key} \"Data.Set\""));
        self.em.op(format!("EXTCALL {key}"));
        self.release(key);
        Ok(())
    }

    fn release(&mut self, reg: RegId) {
        self.regs.release(reg);
    }
}

/// The entry label of a module method.
pub fn entry_label(name: &str) -> String {
    format!("@entry_{name}")
}

fn assign_mnemonic(op: AssignOp) -> Option<&'static str> {
    match op {
        AssignOp::Set => None,
        AssignOp::Add => Some("ADD"),
        AssignOp::Sub => Some("SUB"),
        AssignOp::Mul => Some("MUL"),
        AssignOp::Div => Some("DIV"),
    }
}

fn case_literal(label: &Expr) -> CompileResult<&Literal> {
    match &label.kind {
        ExprKind::Literal(lit) => Ok(lit),
        _ => Err(CompilerError::new(
            Phase::CodeGen,
            label.span,
            "internal: case label not folded to a literal",
        )),
    }
}

fn container_get_call(ty: &TypeRef, span: Span) -> CompileResult<&'static str> {
    match &**ty {
        Type::Array(_) => Ok("Array.At"),
        Type::StorageList(_) => Ok("List.Get"),
        Type::Map(_, _) | Type::StorageMap(_, _) => Ok("Map.Get"),
        other => Err(CompilerError::new(
            Phase::CodeGen,
            span,
            format!("internal: type {other} is not indexable"),
        )),
    }
}

fn container_set_call(ty: &TypeRef, span: Span) -> CompileResult<&'static str> {
    match &**ty {
        Type::Array(_) => Ok("Array.Set"),
        Type::StorageList(_) => Ok("List.Replace"),
        Type::Map(_, _) | Type::StorageMap(_, _) => Ok("Map.Set"),
        other => Err(CompilerError::new(
            Phase::CodeGen,
            span,
            format!("internal: type {other} is not indexable"),
        )),
    }
}

/// Whether a block's last statement is an unconditional return.
fn ends_with_return(block: &Block) -> bool {
    matches!(block.stmts.last(), Some(Stmt::Return { .. }))
}

fn escape(text: &str) -> String {
    tomb_ast::escape_asm_string(text)
}
