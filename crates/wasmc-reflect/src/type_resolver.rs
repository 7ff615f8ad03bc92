//! Maps a host-AST type-node to a reflection [`Type`].

use rustc_hash::FxHashMap;
use wasmc_ast::TypeNode;
use wasmc_common::diagnostics::diagnostic_messages;
use wasmc_common::options::PointerSize;
use wasmc_common::{Diagnostic, DiagnosticBag};

use crate::module::Module;
use crate::types::Type;

/// Primitive keywords reserved as type names; these resolve directly
/// without requiring a user-visible declaration (the prelude's role).
const PRIMITIVE_KEYWORDS: &[(&str, fn(PointerSize) -> Type)] = &[
    ("sbyte", |_| Type::SByte),
    ("short", |_| Type::Short),
    ("int", |_| Type::Int),
    ("long", |_| Type::Long),
    ("bool", |_| Type::Bool),
    ("byte", |_| Type::Byte),
    ("ushort", |_| Type::UShort),
    ("uint", |_| Type::UInt),
    ("ulong", |_| Type::ULong),
    ("float", |_| Type::Float),
    ("double", |_| Type::Double),
    ("uintptr", Type::Uintptr),
];

#[must_use]
pub fn is_primitive_type_name(name: &str) -> bool {
    PRIMITIVE_KEYWORDS.iter().any(|(kw, _)| *kw == name)
}

/// Resolve a type-node to a reflection type.
///
/// `accept_void` controls whether the bare `void` keyword is legal here
/// (function return types accept it; parameter and variable types do not).
pub fn resolve_type_node(
    node: &TypeNode,
    accept_void: bool,
    uintptr_size: PointerSize,
    module: &Module,
    file: &str,
    diagnostics: &mut DiagnosticBag,
) -> Type {
    match node {
        TypeNode::Void(span) => {
            if accept_void {
                Type::Void
            } else {
                diagnostics.push(Diagnostic::new(
                    diagnostic_messages::ILLEGAL_TYPE,
                    file,
                    *span,
                    &[],
                ));
                Type::Void
            }
        }
        TypeNode::Named { name, type_args, span } => {
            if type_args.is_empty() {
                if let Some((_, ctor)) = PRIMITIVE_KEYWORDS.iter().find(|(kw, _)| kw == name) {
                    return ctor(uintptr_size);
                }
                if let Some(class) = module.classes.get(name) {
                    return Type::ClassInstance(class.id);
                }
            } else {
                let resolved_args: Vec<Type> = type_args
                    .iter()
                    .map(|arg| resolve_type_node(arg, false, uintptr_size, module, file, diagnostics))
                    .collect();
                let instance_name = module.instance_name(name, &resolved_args);
                if let Some(class) = module.classes.get(&instance_name) {
                    return Type::ClassInstance(class.id);
                }
            }
            diagnostics.push(Diagnostic::new(
                diagnostic_messages::UNRESOLVABLE_TYPE,
                file,
                *span,
                &[name],
            ));
            Type::Void
        }
    }
}

/// Like [`resolve_type_node`], but a bare type-parameter name (e.g. `T`) is
/// resolved through `substitution` first. Used when lowering the body of an
/// already-instantiated generic function or class, where `T` has no entry
/// in `module.classes` of its own.
pub fn resolve_type_node_with_substitution(
    node: &TypeNode,
    accept_void: bool,
    uintptr_size: PointerSize,
    module: &Module,
    file: &str,
    substitution: &FxHashMap<String, Type>,
    diagnostics: &mut DiagnosticBag,
) -> Type {
    if let TypeNode::Named { name, type_args, .. } = node {
        if type_args.is_empty() {
            if let Some(ty) = substitution.get(name) {
                return *ty;
            }
        }
    }
    resolve_type_node(node, accept_void, uintptr_size, module, file, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmc_ast::Span;

    #[test]
    fn primitive_keywords_resolve_without_a_module_entry() {
        let module = Module::new();
        let mut diagnostics = DiagnosticBag::new();
        let ty = resolve_type_node(
            &TypeNode::Named {
                name: "uint".into(),
                type_args: Vec::new(),
                span: Span::at(0),
            },
            false,
            PointerSize::Wasm32,
            &module,
            "module.wat-src",
            &mut diagnostics,
        );
        assert_eq!(ty, Type::UInt);
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn void_is_rejected_unless_accepted() {
        let module = Module::new();
        let mut diagnostics = DiagnosticBag::new();
        resolve_type_node(
            &TypeNode::Void(Span::at(0)),
            false,
            PointerSize::Wasm32,
            &module,
            "module.wat-src",
            &mut diagnostics,
        );
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn unknown_names_are_reported_unresolvable() {
        let module = Module::new();
        let mut diagnostics = DiagnosticBag::new();
        resolve_type_node(
            &TypeNode::Named {
                name: "Bogus".into(),
                type_args: Vec::new(),
                span: Span::at(0),
            },
            false,
            PointerSize::Wasm32,
            &module,
            "module.wat-src",
            &mut diagnostics,
        );
        assert!(diagnostics.has_errors());
    }
}
