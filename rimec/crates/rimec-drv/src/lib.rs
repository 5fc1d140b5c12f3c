//! rimec-drv - The compiler driver.
//!
//! Orchestrates the pipeline: read the source file, lex/parse/emit to SSA
//! text, hand the text to `qbe` for machine assembly, and let the system
//! C compiler link the executable. Any stage failing skips the rest and
//! exits non-zero; compile errors print their own diagnostics, so the
//! driver stays quiet about them.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use bumpalo::Bump;
use thiserror::Error;
use tracing::{debug, info};

/// The front end rejected the source. Diagnostics are already on stderr.
#[derive(Debug, Error)]
#[error("compilation failed")]
pub struct CompileFailed;

/// Command-line interface: `rimec <source-file>`.
#[derive(Debug, clap::Parser)]
#[command(name = "rimec", version, about = "Compiler for the Rime language")]
pub struct Cli {
    /// The source file to compile.
    pub input: PathBuf,
}

/// Lexes, parses, and emits `source` to SSA text.
///
/// The arena owning the AST lives only for the duration of this call; the
/// returned SSA text is self-contained.
pub fn compile_to_ssa(source: &str) -> Result<String, CompileFailed> {
    let arena = Bump::new();

    let ast = rimec_par::parse(&arena, source).map_err(|_| CompileFailed)?;
    debug!(consts = ast.consts.len(), "parsed");

    rimec_gen::emit_ast(source, &ast).map_err(|_| CompileFailed)
}

/// Runs the whole pipeline for one source file.
pub fn run(cli: Cli) -> Result<()> {
    println!("rimec version: {}", env!("CARGO_PKG_VERSION"));

    let source = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to open {}", cli.input.display()))?;
    debug!(file = %cli.input.display(), bytes = source.len(), "read source");

    let ssa = compile_to_ssa(&source)?;

    // Intermediate artifacts live in a temporary directory that vanishes
    // with the `dir` guard, so a failed build leaves nothing behind.
    let dir = tempfile::tempdir().context("failed to create a temporary directory")?;
    let ssa_path = dir.path().join("out.ssa");
    let asm_path = dir.path().join("out.s");

    std::fs::write(&ssa_path, &ssa)
        .with_context(|| format!("failed to write {}", ssa_path.display()))?;
    info!(ssa = %ssa_path.display(), "emitted SSA");

    let status = Command::new("qbe")
        .arg("-o")
        .arg(&asm_path)
        .arg(&ssa_path)
        .status()
        .context("failed to run qbe")?;
    if !status.success() {
        bail!("qbe exited with {status}");
    }

    let output = output_path(&cli.input);
    let status = Command::new("cc")
        .arg("-Wno-unused-command-line-argument")
        .arg("-o")
        .arg(&output)
        .arg(&asm_path)
        .status()
        .context("failed to run cc")?;
    if !status.success() {
        bail!("cc exited with {status}");
    }

    info!(output = %output.display(), "linked");

    Ok(())
}

/// The executable's name: the input path with its trailing extension
/// removed.
pub fn output_path(input: &Path) -> PathBuf {
    input.with_extension("")
}
