//! Generic monomorphization: instantiates `FunctionTemplate`/`ClassTemplate`
//! entries into `reflect.functions`/`reflect.classes` the first time a
//! `(template name, type arguments)` pair is referenced in source order,
//! keyed by the canonical instance name `Module::instance_name` builds
//! (e.g. `"Box<int>"`).
//!
//! Only one level of `<...>` nesting is supported: the lexer merges `>>`
//! into a single shift-right token, so a nested reference like
//! `Array<Array<int>>`'s inner `<...>` cannot be told apart from a shift
//! operator. This mirrors the parser's `try_parse_type_args` scope.

use rustc_hash::FxHashMap;
use wasmc_ast::{Expr, FunctionDecl, MemberKind, Program, Stmt, TopLevel, TypeNode, VariableDecl};
use wasmc_common::diagnostics::diagnostic_messages;
use wasmc_common::options::PointerSize;
use wasmc_common::{Diagnostic, DiagnosticBag};
use wasmc_reflect::{mangle, resolve_type_node, resolve_type_node_with_substitution, Class, Module, Property, Type};

use crate::init::register_function_with_substitution;

/// Walk every declaration in `program` for generic call sites (`foo<int>`,
/// `new Box<int>`) and generic type annotations (`let b: Box<int>`),
/// instantiating each one into `reflect` the first time it's seen.
pub fn instantiate_generics(reflect: &mut Module, program: &Program, uintptr_size: PointerSize, entry_file: &str, diagnostics: &mut DiagnosticBag) {
    for file in &program.files {
        for item in &file.statements {
            match item {
                TopLevel::Function(decl) => walk_function_decl(reflect, decl, &file.path, uintptr_size, entry_file, diagnostics),
                TopLevel::Class(decl) => {
                    for member in &decl.members {
                        if let Some(ty) = &member.field_type {
                            walk_type_node(reflect, ty, &file.path, uintptr_size, entry_file, diagnostics);
                        }
                        if let Some(method) = &member.method {
                            walk_function_decl(reflect, method, &file.path, uintptr_size, entry_file, diagnostics);
                        }
                    }
                }
                TopLevel::Variable(decl) => walk_variable_decl(reflect, decl, &file.path, uintptr_size, entry_file, diagnostics),
                TopLevel::Enum(_) | TopLevel::Ignored(_) => {}
            }
        }
    }
}

fn walk_function_decl(reflect: &mut Module, decl: &FunctionDecl, file: &str, uintptr_size: PointerSize, entry_file: &str, diagnostics: &mut DiagnosticBag) {
    for param in &decl.params {
        walk_type_node(reflect, &param.ty, file, uintptr_size, entry_file, diagnostics);
    }
    walk_type_node(reflect, &decl.return_type, file, uintptr_size, entry_file, diagnostics);
    if let Some(body) = &decl.body {
        walk_stmts(reflect, body, file, uintptr_size, entry_file, diagnostics);
    }
}

fn walk_variable_decl(reflect: &mut Module, decl: &VariableDecl, file: &str, uintptr_size: PointerSize, entry_file: &str, diagnostics: &mut DiagnosticBag) {
    if let Some(ty) = &decl.ty {
        walk_type_node(reflect, ty, file, uintptr_size, entry_file, diagnostics);
    }
    if let Some(init) = &decl.initializer {
        walk_expr(reflect, init, file, uintptr_size, entry_file, diagnostics);
    }
}

fn walk_stmts(reflect: &mut Module, stmts: &[Stmt], file: &str, uintptr_size: PointerSize, entry_file: &str, diagnostics: &mut DiagnosticBag) {
    for stmt in stmts {
        walk_stmt(reflect, stmt, file, uintptr_size, entry_file, diagnostics);
    }
}

fn walk_stmt(reflect: &mut Module, stmt: &Stmt, file: &str, uintptr_size: PointerSize, entry_file: &str, diagnostics: &mut DiagnosticBag) {
    match stmt {
        Stmt::Block(body, _) => walk_stmts(reflect, body, file, uintptr_size, entry_file, diagnostics),
        Stmt::If { cond, then_branch, else_branch, .. } => {
            walk_expr(reflect, cond, file, uintptr_size, entry_file, diagnostics);
            walk_stmt(reflect, then_branch, file, uintptr_size, entry_file, diagnostics);
            if let Some(else_branch) = else_branch {
                walk_stmt(reflect, else_branch, file, uintptr_size, entry_file, diagnostics);
            }
        }
        Stmt::While { cond, body, .. } => {
            walk_expr(reflect, cond, file, uintptr_size, entry_file, diagnostics);
            walk_stmt(reflect, body, file, uintptr_size, entry_file, diagnostics);
        }
        Stmt::DoWhile { body, cond, .. } => {
            walk_stmt(reflect, body, file, uintptr_size, entry_file, diagnostics);
            walk_expr(reflect, cond, file, uintptr_size, entry_file, diagnostics);
        }
        Stmt::For { init, cond, update, body, .. } => {
            if let Some(init) = init {
                walk_stmt(reflect, init, file, uintptr_size, entry_file, diagnostics);
            }
            if let Some(cond) = cond {
                walk_expr(reflect, cond, file, uintptr_size, entry_file, diagnostics);
            }
            if let Some(update) = update {
                walk_expr(reflect, update, file, uintptr_size, entry_file, diagnostics);
            }
            walk_stmt(reflect, body, file, uintptr_size, entry_file, diagnostics);
        }
        Stmt::Switch { discriminant, cases, .. } => {
            walk_expr(reflect, discriminant, file, uintptr_size, entry_file, diagnostics);
            for case in cases {
                if let Some(test) = &case.test {
                    walk_expr(reflect, test, file, uintptr_size, entry_file, diagnostics);
                }
                walk_stmts(reflect, &case.body, file, uintptr_size, entry_file, diagnostics);
            }
        }
        Stmt::Break(_) | Stmt::Continue(_) => {}
        Stmt::Return(value, _) => {
            if let Some(value) = value {
                walk_expr(reflect, value, file, uintptr_size, entry_file, diagnostics);
            }
        }
        Stmt::Variable(decl) => walk_variable_decl(reflect, decl, file, uintptr_size, entry_file, diagnostics),
        Stmt::Expr(expr, _) => walk_expr(reflect, expr, file, uintptr_size, entry_file, diagnostics),
    }
}

fn walk_expr(reflect: &mut Module, expr: &Expr, file: &str, uintptr_size: PointerSize, entry_file: &str, diagnostics: &mut DiagnosticBag) {
    match expr {
        Expr::Literal(..) | Expr::Identifier(..) => {}
        Expr::Paren(inner, _) => walk_expr(reflect, inner, file, uintptr_size, entry_file, diagnostics),
        Expr::Cast { expr, ty, .. } => {
            walk_expr(reflect, expr, file, uintptr_size, entry_file, diagnostics);
            walk_type_node(reflect, ty, file, uintptr_size, entry_file, diagnostics);
        }
        Expr::Unary { operand, .. } => walk_expr(reflect, operand, file, uintptr_size, entry_file, diagnostics),
        Expr::Binary { left, right, .. } => {
            walk_expr(reflect, left, file, uintptr_size, entry_file, diagnostics);
            walk_expr(reflect, right, file, uintptr_size, entry_file, diagnostics);
        }
        Expr::Assign { target, value, .. } => {
            walk_expr(reflect, target, file, uintptr_size, entry_file, diagnostics);
            walk_expr(reflect, value, file, uintptr_size, entry_file, diagnostics);
        }
        Expr::Conditional { cond, then_expr, else_expr, .. } => {
            walk_expr(reflect, cond, file, uintptr_size, entry_file, diagnostics);
            walk_expr(reflect, then_expr, file, uintptr_size, entry_file, diagnostics);
            walk_expr(reflect, else_expr, file, uintptr_size, entry_file, diagnostics);
        }
        Expr::Call { callee, args, type_args, .. } => {
            if !type_args.is_empty() {
                if let Expr::Identifier(name, _) = callee.as_ref() {
                    let resolved = resolve_type_args(reflect, type_args, file, uintptr_size, diagnostics);
                    resolve_function_instance(reflect, name, &resolved, uintptr_size, entry_file, diagnostics);
                }
            }
            walk_expr(reflect, callee, file, uintptr_size, entry_file, diagnostics);
            for arg in args {
                walk_expr(reflect, arg, file, uintptr_size, entry_file, diagnostics);
            }
        }
        Expr::New { class_name, args, type_args, .. } => {
            if !type_args.is_empty() {
                let resolved = resolve_type_args(reflect, type_args, file, uintptr_size, diagnostics);
                resolve_class_instance(reflect, class_name, &resolved, uintptr_size, entry_file, diagnostics);
            }
            for arg in args {
                walk_expr(reflect, arg, file, uintptr_size, entry_file, diagnostics);
            }
        }
        Expr::Property { base, .. } => walk_expr(reflect, base, file, uintptr_size, entry_file, diagnostics),
        Expr::Element { base, index, .. } => {
            walk_expr(reflect, base, file, uintptr_size, entry_file, diagnostics);
            walk_expr(reflect, index, file, uintptr_size, entry_file, diagnostics);
        }
    }
}

fn walk_type_node(reflect: &mut Module, node: &TypeNode, file: &str, uintptr_size: PointerSize, entry_file: &str, diagnostics: &mut DiagnosticBag) {
    if let TypeNode::Named { name, type_args, .. } = node {
        if !type_args.is_empty() {
            let resolved = resolve_type_args(reflect, type_args, file, uintptr_size, diagnostics);
            resolve_class_instance(reflect, name, &resolved, uintptr_size, entry_file, diagnostics);
        }
    }
}

fn resolve_type_args(reflect: &Module, type_args: &[TypeNode], file: &str, uintptr_size: PointerSize, diagnostics: &mut DiagnosticBag) -> Vec<Type> {
    type_args
        .iter()
        .map(|arg| resolve_type_node(arg, false, uintptr_size, reflect, file, diagnostics))
        .collect()
}

fn resolve_function_instance(
    reflect: &mut Module,
    name: &str,
    type_args: &[Type],
    uintptr_size: PointerSize,
    entry_file: &str,
    diagnostics: &mut DiagnosticBag,
) {
    let cache_key = (name.to_string(), type_args.to_vec());
    if reflect.function_instances.contains_key(&cache_key) {
        return;
    }
    let Some(template) = reflect.function_templates.get(name).cloned() else {
        return;
    };
    if template.type_params.len() != type_args.len() {
        diagnostics.push(Diagnostic::new(diagnostic_messages::UNRESOLVABLE_TYPE, &template.source_file, template.decl.span, &[name]));
        return;
    }
    let instance_name = reflect.instance_name(name, type_args);
    reflect.function_instances.insert(cache_key, instance_name.clone());

    let substitution: FxHashMap<String, Type> = template.type_params.iter().cloned().zip(type_args.iter().copied()).collect();
    register_function_with_substitution(
        reflect,
        &template.decl,
        &instance_name,
        None,
        &template.source_file,
        uintptr_size,
        entry_file,
        &substitution,
        diagnostics,
    );
}

fn resolve_class_instance(
    reflect: &mut Module,
    name: &str,
    type_args: &[Type],
    uintptr_size: PointerSize,
    entry_file: &str,
    diagnostics: &mut DiagnosticBag,
) {
    let cache_key = (name.to_string(), type_args.to_vec());
    if reflect.class_instances.contains_key(&cache_key) {
        return;
    }
    let Some(template) = reflect.class_templates.get(name).cloned() else {
        return;
    };
    if template.type_params.len() != type_args.len() {
        diagnostics.push(Diagnostic::new(diagnostic_messages::UNRESOLVABLE_TYPE, &template.source_file, template.decl.span, &[name]));
        return;
    }
    let instance_name = reflect.instance_name(name, type_args);
    reflect.class_instances.insert(cache_key, instance_name.clone());

    let mangled = mangle(&instance_name, &template.source_file, entry_file);
    let id = reflect.reserve_class_id(&mangled);
    reflect.classes.insert(
        instance_name.clone(),
        Class {
            id,
            mangled_name: reflect.intern(&mangled),
            properties: Vec::new(),
            size: 0,
            constructor: None,
            methods: Vec::new(),
        },
    );

    let substitution: FxHashMap<String, Type> = template.type_params.iter().cloned().zip(type_args.iter().copied()).collect();

    let mut offset = 0u32;
    let mut properties = Vec::new();
    let mut methods = Vec::new();
    let mut constructor = None;

    for member in &template.decl.members {
        match member.kind {
            MemberKind::Field => {
                let Some(field_type) = &member.field_type else {
                    diagnostics.push(Diagnostic::new(diagnostic_messages::TYPE_EXPECTED, &template.source_file, member.span, &[]));
                    continue;
                };
                let ty = resolve_type_node_with_substitution(field_type, false, uintptr_size, reflect, &template.source_file, &substitution, diagnostics);
                let size = ty.size(uintptr_size);
                properties.push(Property { name: reflect.intern(&member.name), ty, offset, constant_value: None });
                offset += size;
            }
            MemberKind::Constructor => {
                if let Some(method) = &member.method {
                    register_function_with_substitution(
                        reflect,
                        method,
                        &instance_name,
                        Some(&instance_name),
                        &template.source_file,
                        uintptr_size,
                        entry_file,
                        &substitution,
                        diagnostics,
                    );
                    constructor = Some(reflect.intern(&instance_name));
                }
            }
            MemberKind::Method => {
                if let Some(method) = &member.method {
                    let qualified = format!("{instance_name}#{}", method.name);
                    register_function_with_substitution(
                        reflect,
                        method,
                        &qualified,
                        Some(&instance_name),
                        &template.source_file,
                        uintptr_size,
                        entry_file,
                        &substitution,
                        diagnostics,
                    );
                    methods.push(reflect.intern(&qualified));
                }
            }
            MemberKind::StaticMethod => {
                if let Some(method) = &member.method {
                    let qualified = format!("{instance_name}.{}", method.name);
                    register_function_with_substitution(
                        reflect,
                        method,
                        &qualified,
                        None,
                        &template.source_file,
                        uintptr_size,
                        entry_file,
                        &substitution,
                        diagnostics,
                    );
                    methods.push(reflect.intern(&qualified));
                }
            }
        }
    }

    if let Some(class) = reflect.classes.get_mut(&instance_name) {
        class.properties = properties;
        class.size = offset;
        class.constructor = constructor;
        class.methods = methods;
    }
}
