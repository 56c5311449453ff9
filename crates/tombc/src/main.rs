//! Compile a TombLang source file into deployable artifacts.
//!
//! Usage: `tombc <file.tomb> [--out-dir DIR] [--emit-asm]`
//!
//! Writes `<module>.tombscript` and `<module>.abi` per top-level module
//! (nft sub-modules as `<parent>.<nft>.…`), plus a `manifest.json`
//! describing everything produced.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "tombc")]
#[command(about = "Compile a TombLang source file into bytecode and ABI")]
struct Args {
    /// Path to the TombLang source file
    source: PathBuf,

    /// Output directory for the artifacts
    #[arg(long = "out-dir", default_value = "build")]
    out_dir: PathBuf,

    /// Also write the textual VM assembly per module
    #[arg(long = "emit-asm")]
    emit_asm: bool,
}

#[derive(Debug, Serialize)]
struct Manifest {
    source: String,
    modules: Vec<ManifestEntry>,
}

#[derive(Debug, Serialize)]
struct ManifestEntry {
    name: String,
    kind: String,
    script: String,
    abi: String,
    script_bytes: usize,
    methods: Vec<String>,
    sub_modules: Vec<ManifestEntry>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run(Args::parse()) {
        error!("{err:#}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let source = fs::read_to_string(&args.source)
        .with_context(|| format!("reading {}", args.source.display()))?;

    let modules = tomb_compiler::compile(&source)
        .with_context(|| format!("compiling {}", args.source.display()))?;

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    let mut entries = Vec::new();
    for module in &modules {
        entries.push(write_module(&args, module, None)?);
    }

    let manifest = Manifest {
        source: args.source.display().to_string(),
        modules: entries,
    };
    let manifest_path = args.out_dir.join("manifest.json");
    fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?)
        .with_context(|| format!("writing {}", manifest_path.display()))?;
    info!(manifest = %manifest_path.display(), "build complete");
    Ok(())
}

fn write_module(
    args: &Args,
    module: &tomb_compiler::Module,
    parent: Option<&str>,
) -> Result<ManifestEntry> {
    let stem = match parent {
        Some(parent) => format!("{parent}.{}", module.name),
        None => module.name.clone(),
    };

    let script_path = args.out_dir.join(format!("{stem}.tombscript"));
    fs::write(&script_path, &module.script)
        .with_context(|| format!("writing {}", script_path.display()))?;

    let abi_path = args.out_dir.join(format!("{stem}.abi"));
    fs::write(&abi_path, &module.abi)
        .with_context(|| format!("writing {}", abi_path.display()))?;

    if args.emit_asm {
        let asm_path = args.out_dir.join(format!("{stem}.asm"));
        fs::write(&asm_path, &module.asm)
            .with_context(|| format!("writing {}", asm_path.display()))?;
    }

    let methods = tomb_compiler::parse_abi(&module.abi)
        .map(|(_, methods)| methods.into_iter().map(|m| m.name).collect())
        .unwrap_or_default();

    info!(
        module = %module.name,
        script = %script_path.display(),
        bytes = module.script.len(),
        "compiled module"
    );

    let mut sub_entries = Vec::new();
    for sub in &module.sub_modules {
        sub_entries.push(write_module(args, sub, Some(&stem))?);
    }

    Ok(ManifestEntry {
        name: module.name.clone(),
        kind: module.kind.keyword().to_string(),
        script: script_path.display().to_string(),
        abi: abi_path.display().to_string(),
        script_bytes: module.script.len(),
        methods,
        sub_modules: sub_entries,
    })
}
