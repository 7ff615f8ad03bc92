//! The initialization pass: walks every source file's top-level
//! declarations and populates a [`wasmc_reflect::Module`].
//!
//! Classes are laid out in two phases to break cyclic references (a field
//! of type `B` inside class `A` declared before `B` itself): first every
//! class gets a shell (a reserved [`ClassId`] and mangled name, no
//! properties yet), then a second pass fills in properties/offsets/methods
//! now that every class name resolves. See the design notes for why this
//! beats eagerly failing on forward references.

use rustc_hash::FxHashMap;
use wasmc_ast::{ClassDecl, DeclKind, EnumDecl, Expr, FunctionDecl, MemberKind, Program, TopLevel};
use wasmc_common::diagnostics::diagnostic_messages;
use wasmc_common::options::PointerSize;
use wasmc_common::{parse_numeric_literal_value, Diagnostic, DiagnosticBag};
use wasmc_reflect::{
    mangle, resolve_type_node, resolve_type_node_with_substitution, ClassId, ConstValue, Function, FunctionFlags,
    FunctionTemplate, Module, Property, Type, Variable, VariableFlags,
};

/// A global whose initializer could not be folded to a constant; its
/// expression is lowered into the synthesized start function instead (see
/// `start.rs`).
pub struct DeferredGlobalInit {
    pub name: String,
    pub ty: Type,
    pub initializer: Expr,
    pub file: String,
}

/// Everything the rest of `wasmc-lower` needs from the initialization pass,
/// beyond the reflection module itself.
pub struct InitResult {
    pub reflect: Module,
    /// Functions in declaration order, so later emission is deterministic
    /// despite `Module::functions` being an `FxHashMap`.
    pub function_order: Vec<String>,
    pub deferred_globals: Vec<DeferredGlobalInit>,
    /// Folded constant initializers for globals whose initializer was a
    /// numeric literal (including negated literals); these are emitted as
    /// the global's `InitExpr` directly instead of going through the
    /// synthesized start function.
    pub global_literals: FxHashMap<String, ConstValue>,
    /// The user's `start` function, if declared at top level with no params.
    pub user_start: Option<String>,
}

struct PendingClass {
    decl: ClassDecl,
    source_file: String,
    mangled_name: String,
    id: ClassId,
}

pub fn initialize_module(program: &Program, entry_file: &str, uintptr_size: PointerSize, diagnostics: &mut DiagnosticBag) -> InitResult {
    let mut reflect = Module::new();
    let mut pending_classes: Vec<PendingClass> = Vec::new();
    let mut pending_functions: Vec<(FunctionDecl, String)> = Vec::new();
    let mut pending_globals: Vec<(wasmc_ast::VariableDecl, String)> = Vec::new();

    // Pass 1: shells for every concrete class, enums (no forward-reference
    // problem since their members are always integer constants), and
    // generic templates. Functions and globals are collected for pass 2,
    // since their types may name a class declared later in the same file.
    for file in &program.files {
        for item in &file.statements {
            match item {
                TopLevel::Class(decl) => {
                    if decl.type_params.is_empty() {
                        let mangled = mangle(&decl.name, &file.path, entry_file);
                        let id = reflect.reserve_class_id(&mangled);
                        pending_classes.push(PendingClass {
                            decl: decl.clone(),
                            source_file: file.path.clone(),
                            mangled_name: mangled,
                            id,
                        });
                    } else {
                        reflect.class_templates.insert(
                            decl.name.clone(),
                            wasmc_reflect::ClassTemplate {
                                decl: decl.clone(),
                                type_params: decl.type_params.iter().map(|p| p.name.clone()).collect(),
                                source_file: file.path.clone(),
                            },
                        );
                    }
                }
                TopLevel::Enum(decl) => initialize_enum(&mut reflect, decl, &file.path, entry_file),
                TopLevel::Function(decl) => {
                    if decl.type_params.is_empty() {
                        pending_functions.push((decl.clone(), file.path.clone()));
                    } else {
                        reflect.function_templates.insert(
                            decl.name.clone(),
                            FunctionTemplate {
                                decl: decl.clone(),
                                type_params: decl.type_params.iter().map(|p| p.name.clone()).collect(),
                                source_file: file.path.clone(),
                            },
                        );
                    }
                }
                TopLevel::Variable(decl) => pending_globals.push((decl.clone(), file.path.clone())),
                TopLevel::Ignored(_) => {}
            }
        }
    }

    // Register every class's name -> id mapping in `reflect.classes` with an
    // empty-but-sized-later shell so `resolve_type_node` can already see it
    // while pass 2 fills in properties (classes referencing each other
    // resolve to `ClassInstance`, always pointer-sized, regardless of
    // whether the pointee's own layout is finished yet).
    for pending in &pending_classes {
        reflect.classes.insert(
            pending.decl.name.clone(),
            wasmc_reflect::Class {
                id: pending.id,
                mangled_name: reflect.intern(&pending.mangled_name),
                properties: Vec::new(),
                size: 0,
                constructor: None,
                methods: Vec::new(),
            },
        );
    }

    // Pass 2: fill in class bodies now that every class name resolves.
    for pending in &pending_classes {
        initialize_class_body(&mut reflect, pending, uintptr_size, entry_file, diagnostics);
    }

    // Pass 2b: instantiate every generic function/class referenced with
    // explicit type arguments (`foo<int>(x)`, `new Box<int>(x)`, `Box<int>`
    // type annotations) into `reflect.functions`/`reflect.classes`, so the
    // rest of initialization (and later, signature declaration) sees them
    // like any other concrete declaration.
    crate::monomorphize::instantiate_generics(&mut reflect, program, uintptr_size, entry_file, diagnostics);

    // Pass 3: globals (literal initializers fold immediately; everything
    // else is deferred to the start function).
    let mut deferred_globals = Vec::new();
    let mut global_literals = FxHashMap::default();
    for (decl, file) in &pending_globals {
        initialize_global(&mut reflect, decl, file, uintptr_size, diagnostics, &mut deferred_globals, &mut global_literals);
    }

    // Pass 4: free functions (class methods were already registered by
    // `initialize_class_body`).
    let mut function_order = Vec::new();
    let mut user_start = None;
    for (decl, file) in &pending_functions {
        if decl.name == "start" && decl.params.is_empty() {
            user_start = Some(decl.name.clone());
        }
        register_function(&mut reflect, decl, &decl.name, None, file, uintptr_size, entry_file, diagnostics);
        function_order.push(decl.name.clone());
    }

    InitResult { reflect, function_order, deferred_globals, global_literals, user_start }
}

fn initialize_enum(reflect: &mut Module, decl: &EnumDecl, file: &str, entry_file: &str) {
    let mangled = mangle(&decl.name, file, entry_file);
    let mut next_value: i64 = 0;
    let mut members = Vec::with_capacity(decl.members.len());
    for member in &decl.members {
        let value = match &member.value {
            Some(Expr::Literal(wasmc_ast::Literal::Number(text), _)) => {
                parse_numeric_literal_value(text).unwrap_or(next_value as f64) as i64
            }
            _ => next_value,
        };
        next_value = value + 1;
        members.push(Property {
            name: reflect.intern(&member.name),
            ty: Type::Int,
            offset: 0,
            constant_value: Some(ConstValue::Int(value)),
        });
    }
    reflect.enums.insert(
        decl.name.clone(),
        wasmc_reflect::Enum { mangled_name: reflect.intern(&mangled), members },
    );
}

fn initialize_class_body(reflect: &mut Module, pending: &PendingClass, uintptr_size: PointerSize, entry_file: &str, diagnostics: &mut DiagnosticBag) {
    let mut offset = 0u32;
    let mut properties = Vec::new();
    let mut methods = Vec::new();
    let mut constructor = None;

    for member in &pending.decl.members {
        match member.kind {
            MemberKind::Field => {
                let Some(field_type) = &member.field_type else {
                    diagnostics.push(Diagnostic::new(diagnostic_messages::TYPE_EXPECTED, &pending.source_file, member.span, &[]));
                    continue;
                };
                let ty = resolve_type_node(field_type, false, uintptr_size, reflect, &pending.source_file, diagnostics);
                let size = ty.size(uintptr_size);
                properties.push(Property { name: reflect.intern(&member.name), ty, offset, constant_value: None });
                offset += size;
            }
            MemberKind::Constructor => {
                if let Some(method) = &member.method {
                    let qualified = pending.decl.name.clone();
                    register_function(reflect, method, &qualified, Some(&pending.decl.name), &pending.source_file, uintptr_size, entry_file, diagnostics);
                    constructor = Some(reflect.intern(&qualified));
                }
            }
            MemberKind::Method => {
                if let Some(method) = &member.method {
                    let qualified = format!("{}#{}", pending.decl.name, method.name);
                    register_function(reflect, method, &qualified, Some(&pending.decl.name), &pending.source_file, uintptr_size, entry_file, diagnostics);
                    methods.push(reflect.intern(&qualified));
                }
            }
            MemberKind::StaticMethod => {
                if let Some(method) = &member.method {
                    let qualified = format!("{}.{}", pending.decl.name, method.name);
                    register_function(reflect, method, &qualified, None, &pending.source_file, uintptr_size, entry_file, diagnostics);
                    methods.push(reflect.intern(&qualified));
                }
            }
        }
    }

    if let Some(class) = reflect.classes.get_mut(&pending.decl.name) {
        class.properties = properties;
        class.size = offset;
        class.constructor = constructor;
        class.methods = methods;
    }
}

fn initialize_global(
    reflect: &mut Module,
    decl: &wasmc_ast::VariableDecl,
    file: &str,
    uintptr_size: PointerSize,
    diagnostics: &mut DiagnosticBag,
    deferred: &mut Vec<DeferredGlobalInit>,
    global_literals: &mut FxHashMap<String, ConstValue>,
) {
    let ty = decl
        .ty
        .as_ref()
        .map(|node| resolve_type_node(node, false, uintptr_size, reflect, file, diagnostics))
        .unwrap_or(Type::Int);
    let is_const = decl.kind == DeclKind::Const;

    let literal_value = decl.initializer.as_ref().and_then(literal_number);
    if is_const && decl.initializer.is_some() && literal_value.is_none() {
        diagnostics.push(Diagnostic::new(
            diagnostic_messages::UNSUPPORTED_GLOBAL_CONSTANT_INITIALIZER,
            file,
            decl.span,
            &[],
        ));
    }

    match (literal_value, &decl.initializer) {
        (Some(value), _) => {
            let const_value = if ty.is_float_family() { ConstValue::Float(value) } else { ConstValue::Int(value as i64) };
            global_literals.insert(decl.name.clone(), const_value);
        }
        (None, Some(initializer)) => {
            deferred.push(DeferredGlobalInit { name: decl.name.clone(), ty, initializer: initializer.clone(), file: file.to_string() });
        }
        (None, None) => {}
    }

    let mut flags = VariableFlags::GLOBAL;
    if is_const {
        flags |= VariableFlags::CONSTANT;
    }
    reflect.globals.insert(
        decl.name.clone(),
        Variable { name: reflect.intern(&decl.name), ty, flags, index: 0 },
    );
}

fn literal_number(expr: &Expr) -> Option<f64> {
    match expr {
        Expr::Literal(wasmc_ast::Literal::Number(text), _) => parse_numeric_literal_value(text),
        Expr::Unary { op: wasmc_ast::UnaryOp::Neg, operand, .. } => literal_number(operand).map(|v| -v),
        _ => None,
    }
}

/// Register a concrete function (free function, method, or constructor) in
/// `reflect.functions` under `key` (already flattened by the caller to
/// `name` / `Class#method` / `Class.method` / the bare class name). `this_of`
/// is `Some(class_name)` for instance methods and constructors, `None` for
/// free functions and static methods, and controls whether an implicit
/// `this` param is prepended at slot 0.
fn register_function(
    reflect: &mut Module,
    decl: &FunctionDecl,
    key: &str,
    this_of: Option<&str>,
    file: &str,
    uintptr_size: PointerSize,
    entry_file: &str,
    diagnostics: &mut DiagnosticBag,
) {
    let substitution = FxHashMap::default();
    register_function_with_substitution(reflect, decl, key, this_of, file, uintptr_size, entry_file, &substitution, diagnostics);
}

/// Like [`register_function`], but every type-parameter-typed param/return
/// (keyed by name in `substitution`) resolves to its monomorphized concrete
/// type instead of failing to resolve as an unknown class name.
pub(crate) fn register_function_with_substitution(
    reflect: &mut Module,
    decl: &FunctionDecl,
    key: &str,
    this_of: Option<&str>,
    file: &str,
    uintptr_size: PointerSize,
    entry_file: &str,
    substitution: &FxHashMap<String, Type>,
    diagnostics: &mut DiagnosticBag,
) {
    let mut params = smallvec::SmallVec::new();
    let mut index = 0u32;
    if let Some(class_name) = this_of {
        if let Some(class) = reflect.classes.get(class_name) {
            params.push(Variable {
                name: reflect.intern("this"),
                ty: Type::ClassInstance(class.id),
                flags: VariableFlags::empty(),
                index,
            });
            index += 1;
        }
    }
    for param in &decl.params {
        let ty = resolve_type_node_with_substitution(&param.ty, false, uintptr_size, reflect, file, substitution, diagnostics);
        params.push(Variable { name: reflect.intern(&param.name), ty, flags: VariableFlags::empty(), index });
        index += 1;
    }

    let return_type = resolve_type_node_with_substitution(&decl.return_type, true, uintptr_size, reflect, file, substitution, diagnostics);

    let mut flags = FunctionFlags::empty();
    if decl.exported {
        flags |= FunctionFlags::EXPORT;
    }
    if decl.imported {
        flags |= FunctionFlags::IMPORT;
    }
    if this_of.is_some() {
        flags |= FunctionFlags::INSTANCE;
    }

    let (import_module, import_base) = match &decl.import_qualifier {
        Some((module, base)) => (Some(module.clone()), Some(base.clone())),
        None => {
            if decl.imported {
                (Some("env".to_string()), Some(decl.name.clone()))
            } else {
                (None, None)
            }
        }
    };

    // `key` is the source-level lookup name (plain for free functions,
    // `Class#method`/`Class.method`/bare class name for members); `name`
    // carries the mangled emission-time name so declarations in non-entry
    // files never collide on export.
    let mangled = mangle(key, file, entry_file);
    let locals = params.iter().cloned().collect();
    let function = Function {
        name: reflect.intern(&mangled),
        params,
        return_type,
        flags,
        import_module,
        import_base,
        locals,
    };

    let signature_key = function.signature_key(uintptr_size);
    reflect.register_signature(&signature_key);
    reflect.functions.insert(key.to_string(), function);
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmc_ast::parse_program;

    fn init(source: &str) -> (InitResult, DiagnosticBag) {
        let mut diagnostics = DiagnosticBag::new();
        let program = parse_program(source, "module.wat-src", &mut diagnostics);
        let result = initialize_module(&program, "module.wat-src", PointerSize::Wasm32, &mut diagnostics);
        (result, diagnostics)
    }

    #[test]
    fn registers_free_function_with_params() {
        let (result, diagnostics) = init("export function add(a: int, b: int): int { return a + b; }");
        assert!(!diagnostics.has_errors());
        let function = result.reflect.functions.get("add").expect("add registered");
        assert_eq!(function.params.len(), 2);
        assert_eq!(function.return_type, Type::Int);
        assert!(function.is_export());
    }

    #[test]
    fn literal_global_const_folds_without_deferral() {
        let (result, _) = init("const N: int = 7;");
        assert!(result.deferred_globals.is_empty());
        let global = result.reflect.globals.get("N").expect("N registered");
        assert!(global.is_constant());
    }

    #[test]
    fn class_fields_get_increasing_offsets() {
        let (result, diagnostics) = init("class Point { x: int; y: int; }");
        assert!(!diagnostics.has_errors());
        let class = result.reflect.classes.get("Point").expect("Point registered");
        assert_eq!(class.properties.len(), 2);
        assert_eq!(class.properties[0].offset, 0);
        assert_eq!(class.properties[1].offset, 4);
        assert_eq!(class.size, 8);
    }

    #[test]
    fn instance_method_param_indices_are_contiguous_with_this_at_zero() {
        let (result, diagnostics) = init(
            "class Point { x: int; y: int; Point(x: int, y: int): void { this.x = x; this.y = y; } function dist(dx: int, dy: int): int { return dx + dy; } }",
        );
        assert!(!diagnostics.has_errors());
        let method = result.reflect.functions.get("Point#dist").expect("Point#dist registered");
        assert_eq!(method.params.len(), 3);
        assert_eq!(result.reflect.resolve(method.params[0].name), "this");
        for (expected_index, param) in method.params.iter().enumerate() {
            assert_eq!(param.index, expected_index as u32);
        }
    }

    #[test]
    fn free_function_param_indices_start_at_zero_without_this() {
        let (result, diagnostics) = init("export function add(a: int, b: int): int { return a + b; }");
        assert!(!diagnostics.has_errors());
        let function = result.reflect.functions.get("add").expect("add registered");
        assert_eq!(function.params[0].index, 0);
        assert_eq!(function.params[1].index, 1);
    }

    #[test]
    fn deferred_global_with_non_literal_initializer_is_not_folded() {
        let (result, diagnostics) = init("function seed(): int { return 5; } let g: int = seed();");
        assert!(!diagnostics.has_errors());
        assert_eq!(result.deferred_globals.len(), 1);
        assert!(!result.reflect.globals.get("g").expect("g registered").is_constant());
    }
}
