//! Driver for the `wasmc` compiler: wires the host-AST parser, the
//! initialization pass, and the lowering engine into the three public
//! entry points (`compile_file`, `compile_string`, `compile_program`),
//! gating on a shared [`DiagnosticBag`] after every phase.

use std::path::Path;

use wasmc_ast::{parse_program, Program};
use wasmc_common::options::CompileOptions;
use wasmc_common::DiagnosticBag;

/// Read `path`, parse it, and compile it. On an I/O error a single
/// diagnostic-free message is printed to stderr (unless `silent`) and
/// `Err(())` is returned — the same sentinel the rest of the driver uses
/// for "diagnostics were collected, see the bag", since the caller has no
/// bag to inspect for a read failure.
pub fn compile_file(path: impl AsRef<Path>, options: CompileOptions) -> Result<walrus::Module, ()> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|err| {
        if !options.silent {
            eprintln!("{}: {err}", path.display());
        }
    })?;
    let entry_file = path.display().to_string();
    compile_source(&source, &entry_file, options)
}

/// Compile `source` as a single synthetic file named `module.wat-src`.
pub fn compile_string(source: &str, options: CompileOptions) -> Result<walrus::Module, ()> {
    compile_source(source, ENTRY_FILE, options)
}

/// Compile an already-parsed [`Program`]. The first file in `program.files`
/// is treated as the entry file for name-mangling purposes.
pub fn compile_program(program: &Program, options: CompileOptions) -> Result<walrus::Module, ()> {
    let entry_file = program.files.first().map(|file| file.path.clone()).unwrap_or_else(|| ENTRY_FILE.to_string());
    let mut diagnostics = DiagnosticBag::new();
    let result = lower(program, &entry_file, &options, &mut diagnostics);
    diagnostics.print(options.silent);
    result.ok_or(())
}

const ENTRY_FILE: &str = "module.wat-src";

fn compile_source(source: &str, entry_file: &str, options: CompileOptions) -> Result<walrus::Module, ()> {
    let mut diagnostics = DiagnosticBag::new();
    let program = tracing::debug_span!("parse", file = entry_file).in_scope(|| parse_program(source, entry_file, &mut diagnostics));

    if diagnostics.has_errors() {
        diagnostics.print(options.silent);
        return Err(());
    }

    let result = lower(&program, entry_file, &options, &mut diagnostics);
    diagnostics.print(options.silent);
    result.ok_or(())
}

fn lower(program: &Program, entry_file: &str, options: &CompileOptions, diagnostics: &mut DiagnosticBag) -> Option<walrus::Module> {
    tracing::debug_span!("compile", entry_file).in_scope(|| wasmc_lower::lower_program(program, entry_file, options, diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_minimal_exported_function() {
        let module = compile_string("export function add(a: int, b: int): int { return a + b; }", CompileOptions::default());
        assert!(module.is_ok());
    }

    #[test]
    fn syntax_errors_bail_before_lowering_runs() {
        let module = compile_string("export function add(a: int, b: int): int { return a + ; }", CompileOptions::default());
        assert!(module.is_err());
    }

    #[test]
    fn illegal_implicit_conversion_is_reported_and_bails() {
        let module = compile_string("export function f(): void { let x: int = 1; let y: byte = x; }", CompileOptions::default());
        assert!(module.is_err());
    }

    #[test]
    fn constructor_field_assignment_compiles() {
        let module = compile_string(
            "class Point { x: int; y: int; Point(x: int, y: int): void { this.x = x; this.y = y; } function sum(): int { return this.x + this.y; } } export function make(): int { let p: Point = new Point(1, 2); return p.sum(); }",
            CompileOptions::default(),
        );
        assert!(module.is_ok());
    }
}
