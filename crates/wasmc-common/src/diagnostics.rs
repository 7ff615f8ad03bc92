//! Diagnostic model shared by every compiler phase.
//!
//! Every phase (initialize, compile) reports through the same
//! [`DiagnosticBag`] so the driver can gate on error category after each
//! phase completes, regardless of which lowerer raised the diagnostic.

use crate::span::Span;

/// Diagnostic severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticCategory {
    Message,
    Suggestion,
    Warning,
    Error,
}

/// A statically known diagnostic message template.
#[derive(Clone, Copy, Debug)]
pub struct DiagnosticMessage {
    pub code: u32,
    pub category: DiagnosticCategory,
    pub message: &'static str,
}

/// The error taxonomy this compiler can report (see the error handling design).
pub mod diagnostic_messages {
    use super::{DiagnosticCategory, DiagnosticMessage};

    pub const UNSUPPORTED_TOP_LEVEL_STATEMENT: DiagnosticMessage = DiagnosticMessage {
        code: 1001,
        category: DiagnosticCategory::Error,
        message: "Unsupported top-level statement.",
    };
    pub const UNSUPPORTED_STATEMENT: DiagnosticMessage = DiagnosticMessage {
        code: 1002,
        category: DiagnosticCategory::Error,
        message: "Unsupported statement.",
    };
    pub const UNSUPPORTED_EXPRESSION: DiagnosticMessage = DiagnosticMessage {
        code: 1003,
        category: DiagnosticCategory::Error,
        message: "Unsupported expression.",
    };
    pub const UNSUPPORTED_UNARY_OPERATOR: DiagnosticMessage = DiagnosticMessage {
        code: 1004,
        category: DiagnosticCategory::Error,
        message: "Unsupported unary operator '{0}'.",
    };
    pub const UNSUPPORTED_BINARY_OPERATOR: DiagnosticMessage = DiagnosticMessage {
        code: 1005,
        category: DiagnosticCategory::Error,
        message: "Unsupported binary operator '{0}'.",
    };
    pub const UNSUPPORTED_CLASS_MEMBER: DiagnosticMessage = DiagnosticMessage {
        code: 1006,
        category: DiagnosticCategory::Error,
        message: "Unsupported class member.",
    };
    pub const UNSUPPORTED_TYPE: DiagnosticMessage = DiagnosticMessage {
        code: 1007,
        category: DiagnosticCategory::Error,
        message: "Unsupported type.",
    };
    pub const UNRESOLVABLE_TYPE: DiagnosticMessage = DiagnosticMessage {
        code: 1008,
        category: DiagnosticCategory::Error,
        message: "Cannot find name '{0}'.",
    };
    pub const TYPE_EXPECTED: DiagnosticMessage = DiagnosticMessage {
        code: 1009,
        category: DiagnosticCategory::Error,
        message: "Type expected.",
    };
    pub const ILLEGAL_TYPE: DiagnosticMessage = DiagnosticMessage {
        code: 1010,
        category: DiagnosticCategory::Error,
        message: "Illegal type.",
    };
    pub const ILLEGAL_IMPLICIT_CONVERSION: DiagnosticMessage = DiagnosticMessage {
        code: 1011,
        category: DiagnosticCategory::Error,
        message: "Type '{0}' cannot be changed to type '{1}' implicitly. An explicit 'as' cast is required.",
    };
    pub const UNDEFINED_LOCAL_VARIABLE: DiagnosticMessage = DiagnosticMessage {
        code: 1012,
        category: DiagnosticCategory::Error,
        message: "Undefined local variable '{0}'.",
    };
    pub const UNSUPPORTED_GLOBAL_CONSTANT_INITIALIZER: DiagnosticMessage = DiagnosticMessage {
        code: 1013,
        category: DiagnosticCategory::Error,
        message: "A const global must be initialized with a constant expression.",
    };

    // Non-error diagnostics used by the conversion engine's implicit-widening
    // warnings; they never gate compilation on their own.
    pub const POINTER_WIDTH_NARROWING: DiagnosticMessage = DiagnosticMessage {
        code: 2001,
        category: DiagnosticCategory::Warning,
        message: "Conversion from '{0}' to '{1}' assumes a pointer width that may not hold on other targets.",
    };
}

/// Replace `{0}`, `{1}`, ... placeholders in a message template with `args`.
#[must_use]
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

/// A related source location attached to a diagnostic (e.g. "declared here").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticRelatedInformation {
    pub file: String,
    pub span: Span,
    pub message_text: String,
}

/// A single diagnostic: a source location, a category, and a rendered message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub code: u32,
    pub file: String,
    pub span: Span,
    pub message_text: String,
    pub related_information: Vec<DiagnosticRelatedInformation>,
}

impl Diagnostic {
    pub fn new(message: DiagnosticMessage, file: impl Into<String>, span: Span, args: &[&str]) -> Self {
        Self {
            category: message.category,
            code: message.code,
            file: file.into(),
            span,
            message_text: format_message(message.message, args),
            related_information: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_related(
        mut self,
        file: impl Into<String>,
        span: Span,
        message: impl Into<String>,
    ) -> Self {
        self.related_information.push(DiagnosticRelatedInformation {
            file: file.into(),
            span,
            message_text: message.into(),
        });
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.category {
            DiagnosticCategory::Error => "error",
            DiagnosticCategory::Warning => "warning",
            DiagnosticCategory::Suggestion => "suggestion",
            DiagnosticCategory::Message => "message",
        };
        write!(
            f,
            "{}:{}: {} W{}: {}",
            self.file, self.span.start, kind, self.code, self.message_text
        )
    }
}

/// Accumulates diagnostics across the initialize and compile phases.
///
/// A single bag is threaded through every phase of one compilation so the
/// driver can gate on `has_errors()` after each phase completes (see the
/// driver's phase gating).
#[derive(Default)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Print every diagnostic to stderr, honoring `CompileOptions::silent`.
    pub fn print(&self, silent: bool) {
        if silent {
            return;
        }
        for diagnostic in &self.diagnostics {
            eprintln!("{diagnostic}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_message_substitutes_positional_args() {
        let msg = format_message("Type '{0}' cannot convert to '{1}'.", &["float", "int"]);
        assert_eq!(msg, "Type 'float' cannot convert to 'int'.");
    }

    #[test]
    fn bag_has_errors_only_with_error_category() {
        let mut bag = DiagnosticBag::new();
        bag.push(Diagnostic::new(
            diagnostic_messages::POINTER_WIDTH_NARROWING,
            "a.ts",
            Span::new(0, 1),
            &["uintptr", "uint"],
        ));
        assert!(!bag.has_errors());

        bag.push(Diagnostic::new(
            diagnostic_messages::UNDEFINED_LOCAL_VARIABLE,
            "a.ts",
            Span::new(2, 3),
            &["x"],
        ));
        assert!(bag.has_errors());
    }
}
