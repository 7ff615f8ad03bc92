//! Common types and utilities shared across the wasmc compiler crates.
//!
//! This crate provides the foundational pieces every later phase depends on:
//! - String interning (`Atom`, `Interner`) for mangled names and identifiers
//! - Source spans (`Span`, `Spanned`, `SpanBuilder`, `ByteSpan`)
//! - Numeric literal parsing shared by the parser and the expression lowerer
//! - The diagnostic model (`Diagnostic`, `DiagnosticCategory`) and message table
//! - Compiler options (`CompileOptions`)

pub mod diagnostics;
pub mod interner;
pub mod numeric;
pub mod options;
pub mod span;

pub use diagnostics::{Diagnostic, DiagnosticBag, DiagnosticCategory, DiagnosticMessage, diagnostic_messages};
pub use interner::{Atom, Interner};
pub use numeric::parse_numeric_literal_value;
pub use options::CompileOptions;
pub use span::{ByteSpan, Span, SpanBuilder, Spanned};
