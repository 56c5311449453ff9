//! TombLang compiler.
//!
//! Unified entry point for the compilation pipeline: lex → parse →
//! elaborate → generate assembly → assemble → serialize the ABI. Each
//! top-level module of a source file yields one [`Module`] artifact;
//! nft sub-modules nest inside their parent's artifact.
//!
//! The pipeline is a pure function of the source text: identical input
//! produces byte-identical scripts and ABIs. All per-compilation state
//! lives in stack-local instances, so compilations may run on parallel
//! threads without interference.

use tracing::debug;

pub use tomb_asm::{parse_abi, AbiMethod};
pub use tomb_ast::{CompileResult, CompilerError, ModuleKind, Phase};

use tomb_ast::{MethodKind, ModuleAst, SourceText, Visibility};
use tomb_resolve::CheckedUnit;

/// One deployable artifact.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub kind: ModuleKind,
    /// Binary VM script.
    pub script: Vec<u8>,
    /// Serialized method table.
    pub abi: Vec<u8>,
    /// The textual assembly the script was lowered from.
    pub asm: String,
    /// Nested artifacts (nft descriptions).
    pub sub_modules: Vec<Module>,
}

/// Compile a source text into its module artifacts.
pub fn compile(source: &str) -> CompileResult<Vec<Module>> {
    let text = SourceText::new(source);
    compile_text(&text)
}

/// Convenience entry point taking per-line source.
pub fn compile_lines(lines: &[&str]) -> CompileResult<Vec<Module>> {
    let text = SourceText::from_lines(lines);
    compile_text(&text)
}

fn compile_text(text: &SourceText) -> CompileResult<Vec<Module>> {
    let unit = tomb_parser::parse(text)?;
    debug!(modules = unit.modules.len(), "parsed source unit");
    let checked = tomb_resolve::elaborate(unit)?;
    debug!("elaboration finished");
    checked
        .unit
        .modules
        .iter()
        .map(|module| compile_module(&checked, module, text))
        .collect()
}

fn compile_module(
    checked: &CheckedUnit,
    module: &ModuleAst,
    text: &SourceText,
) -> CompileResult<Module> {
    let asm = tomb_codegen::generate(checked, module, text)?;
    let script = tomb_asm::assemble(&asm)?;
    debug!(
        module = %module.name,
        bytes = script.bytes.len(),
        "assembled module"
    );

    let abi_methods = abi_methods(module, &script)?;
    let abi = tomb_asm::serialize_abi(&module.name, &abi_methods);

    let sub_modules = module
        .sub_modules
        .iter()
        .map(|sub| compile_module(checked, sub, text))
        .collect::<CompileResult<Vec<_>>>()?;

    Ok(Module {
        name: module.name.to_string(),
        kind: module.kind,
        script: script.bytes,
        abi,
        asm,
        sub_modules,
    })
}

/// The ABI lists public methods in declaration order, then triggers.
fn abi_methods(
    module: &ModuleAst,
    script: &tomb_asm::AssembledScript,
) -> CompileResult<Vec<AbiMethod>> {
    let mut methods = Vec::new();
    let ordered = module
        .methods
        .iter()
        .filter(|m| m.visibility == Visibility::Public && m.kind != MethodKind::Trigger)
        .chain(
            module
                .methods
                .iter()
                .filter(|m| m.kind == MethodKind::Trigger),
        );

    for method in ordered {
        let label = format!("entry_{}", method.name);
        let offset = script.labels.get(&label).copied().ok_or_else(|| {
            CompilerError::new(
                Phase::Assemble,
                method.span,
                format!("internal: no entry label for method '{}'", method.name),
            )
        })?;
        // A missing return type is void, distinct from a declared `none`.
        let ret_code = match &method.ret {
            Some(_) => method
                .ret_ty
                .as_ref()
                .map(|ty| ty.code())
                .unwrap_or(tomb_asm::abi::VOID_RETURN),
            None => tomb_asm::abi::VOID_RETURN,
        };
        let params = method
            .params
            .iter()
            .map(|p| {
                (
                    p.name.to_string(),
                    p.ty.as_ref().expect("param type resolved").code(),
                )
            })
            .collect();
        methods.push(AbiMethod {
            name: method.name.to_string(),
            offset: u32::from(offset),
            ret_code,
            trigger: method.kind == MethodKind::Trigger,
            variadic: method.variadic,
            params,
        });
    }
    Ok(methods)
}
