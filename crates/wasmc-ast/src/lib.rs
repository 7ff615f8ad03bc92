//! Scanner, parser, and AST for the wasmc surface language.
//!
//! This crate is a deliberately narrow stand-in for a host-language parser:
//! it covers exactly the restricted grammar the rest of the compiler needs
//! (primitive-typed declarations, the enumerated statement and expression
//! kinds) and nothing more.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::*;
pub use parser::parse_source_file;

use wasmc_common::DiagnosticBag;

/// Parse a single file into a one-file [`Program`].
pub fn parse_program(source: &str, file: &str, diagnostics: &mut DiagnosticBag) -> Program {
    Program {
        files: vec![parse_source_file(source, file, diagnostics)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exported_function_with_return() {
        let mut diagnostics = DiagnosticBag::new();
        let file = parse_source_file(
            "export function add(a: int, b: int): int { return a + b; }",
            "module.wat-src",
            &mut diagnostics,
        );
        assert!(!diagnostics.has_errors());
        assert_eq!(file.statements.len(), 1);
        match &file.statements[0] {
            TopLevel::Function(f) => {
                assert_eq!(f.name, "add");
                assert!(f.exported);
                assert_eq!(f.params.len(), 2);
                assert!(f.body.is_some());
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn parses_while_loop_with_increment() {
        let mut diagnostics = DiagnosticBag::new();
        let file = parse_source_file(
            "export function loop(): int { let i: int = 0; while (i < 10) { i++; } return i; }",
            "module.wat-src",
            &mut diagnostics,
        );
        assert!(!diagnostics.has_errors());
        let TopLevel::Function(f) = &file.statements[0] else {
            panic!("expected function");
        };
        let body = f.body.as_ref().unwrap();
        assert_eq!(body.len(), 3);
        assert!(matches!(body[1], Stmt::While { .. }));
    }

    #[test]
    fn parses_class_with_field_and_method() {
        let mut diagnostics = DiagnosticBag::new();
        let file = parse_source_file(
            "class Point { x: int; y: int; Point(x: int, y: int): void { this.x = x; } function sum(): int { return this.x + this.y; } }",
            "module.wat-src",
            &mut diagnostics,
        );
        assert!(!diagnostics.has_errors());
        let TopLevel::Class(class) = &file.statements[0] else {
            panic!("expected class");
        };
        assert_eq!(class.members.len(), 4);
    }

    #[test]
    fn reports_diagnostic_on_malformed_input() {
        let mut diagnostics = DiagnosticBag::new();
        parse_source_file("function (: int {", "bad.wat-src", &mut diagnostics);
        assert!(diagnostics.has_errors());
    }
}
