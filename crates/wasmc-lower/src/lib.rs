//! Wires the initialization pass, module builder, allocator integration,
//! statement/expression lowering, and start-function synthesis into one
//! `compile` entry point that turns a [`wasmc_ast::Program`] into a
//! `walrus::Module`.

pub mod allocator;
pub mod context;
pub mod conversion;
pub mod expr;
pub mod init;
pub mod module_builder;
pub mod monomorphize;
pub mod start;
pub mod stmt;

use rustc_hash::FxHashMap;
use walrus::{FunctionBuilder, FunctionId, GlobalId, ValType};
use wasmc_ast::{Program, TopLevel};
use wasmc_common::options::{CompileOptions, PointerSize};
use wasmc_common::DiagnosticBag;
use wasmc_reflect::{Function, Module as ReflectModule};

use crate::allocator::build_memory_and_allocator;
use crate::context::FunctionContext;
use crate::expr::ExprLowerCtx;
use crate::init::initialize_module;
use crate::module_builder::{val_type_of, ModuleBuilder};
use crate::start::synthesize_start;
use crate::stmt::lower_stmts;

/// Lower an already-initialized program into a finished `walrus::Module`.
/// The caller (the root driver) is responsible for running the host-AST
/// parse phase and surfacing its own diagnostics before calling this.
pub fn lower_program(program: &Program, entry_file: &str, options: &CompileOptions, diagnostics: &mut DiagnosticBag) -> Option<walrus::Module> {
    let init = initialize_module(program, entry_file, options.uintptr_size, diagnostics);
    if diagnostics.has_errors() {
        return None;
    }

    let (base_module, wiring) = build_memory_and_allocator(options.uintptr_size, options.no_lib);
    let mut builder = ModuleBuilder::from_module(base_module, options.uintptr_size);
    let malloc_fn = wiring.as_ref().map(|w| w.malloc);

    let mut global_ids: FxHashMap<String, GlobalId> = FxHashMap::default();
    declare_globals(&mut builder, &init.reflect, &init.global_literals, &mut global_ids);

    let mut function_ids: FxHashMap<String, FunctionId> = FxHashMap::default();
    declare_function_signatures(&mut builder, &init.reflect, &mut function_ids);

    for (key, function) in &init.reflect.functions {
        if function.is_import() {
            continue;
        }
        let Some(&function_id) = function_ids.get(key) else { continue };
        lower_function_body(
            &mut builder,
            function_id,
            key,
            function,
            program,
            entry_file,
            &init.reflect,
            &function_ids,
            &global_ids,
            malloc_fn,
            wiring.as_ref().map(|w| w.memory).or_else(|| builder.module.memories.iter().next().map(|m| m.id())),
            options.uintptr_size,
            diagnostics,
        );
    }

    synthesize_start(
        &mut builder,
        &init.deferred_globals,
        &global_ids,
        &function_ids,
        &init.reflect,
        wiring.as_ref(),
        malloc_fn,
        init.user_start.as_deref(),
        options.uintptr_size,
        diagnostics,
    );

    if diagnostics.has_errors() {
        return None;
    }

    Some(builder.module)
}

fn declare_globals(
    builder: &mut ModuleBuilder,
    reflect: &ReflectModule,
    global_literals: &FxHashMap<String, wasmc_reflect::ConstValue>,
    global_ids: &mut FxHashMap<String, GlobalId>,
) {
    for (name, variable) in &reflect.globals {
        let val_type = val_type_of(variable.ty, builder.uintptr_size);
        let init = match global_literals.get(name) {
            Some(const_value) => walrus::InitExpr::Value(literal_value(*const_value, val_type)),
            None => walrus::InitExpr::Value(zero_value(val_type)),
        };
        let mutable = !variable.is_constant();
        let id = builder.module.globals.add_local(val_type, mutable, init);
        global_ids.insert(name.clone(), id);
    }
}

/// A global with a numeric-literal initializer is emitted with that
/// constant baked straight into its `InitExpr`, never zero-then-assigned in
/// the start function.
fn literal_value(const_value: wasmc_reflect::ConstValue, val_type: ValType) -> walrus::ir::Value {
    use wasmc_reflect::ConstValue;
    match (const_value, val_type) {
        (ConstValue::Int(v), ValType::I64) => walrus::ir::Value::I64(v),
        (ConstValue::Int(v), ValType::F32) => walrus::ir::Value::F32(v as f32),
        (ConstValue::Int(v), ValType::F64) => walrus::ir::Value::F64(v as f64),
        (ConstValue::Int(v), _) => walrus::ir::Value::I32(v as i32),
        (ConstValue::Float(v), ValType::I64) => walrus::ir::Value::I64(v as i64),
        (ConstValue::Float(v), ValType::F32) => walrus::ir::Value::F32(v as f32),
        (ConstValue::Float(v), ValType::F64) => walrus::ir::Value::F64(v),
        (ConstValue::Float(v), _) => walrus::ir::Value::I32(v as i32),
    }
}

fn zero_value(val_type: ValType) -> walrus::ir::Value {
    match val_type {
        ValType::I32 => walrus::ir::Value::I32(0),
        ValType::I64 => walrus::ir::Value::I64(0),
        ValType::F32 => walrus::ir::Value::F32(0.0),
        ValType::F64 => walrus::ir::Value::F64(0.0),
        _ => walrus::ir::Value::I32(0),
    }
}

fn declare_function_signatures(builder: &mut ModuleBuilder, reflect: &ReflectModule, function_ids: &mut FxHashMap<String, FunctionId>) {
    for (key, function) in &reflect.functions {
        let params: Vec<ValType> = function.params.iter().map(|p| val_type_of(p.ty, builder.uintptr_size)).collect();
        let results: Vec<ValType> = if function.return_type == wasmc_reflect::Type::Void {
            Vec::new()
        } else {
            vec![val_type_of(function.return_type, builder.uintptr_size)]
        };

        let id = if function.is_import() {
            let module_name = function.import_module.as_deref().unwrap_or("env");
            let base_name = function.import_base.as_deref().unwrap_or(key.as_str());
            let type_id = builder.module.types.add(&params, &results);
            let (func_id, _) = builder.module.add_import_func(module_name, base_name, type_id);
            func_id
        } else {
            let mut fn_builder = FunctionBuilder::new(&mut builder.module.types, &params, &results);
            let locals: Vec<walrus::LocalId> = function.params.iter().map(|p| builder.module.locals.add(val_type_of(p.ty, builder.uintptr_size))).collect();
            fn_builder.name(key.clone());
            fn_builder.func_body().unreachable();
            fn_builder.finish(locals, &mut builder.module.funcs)
        };

        if function.is_export() {
            builder.module.exports.add(key, id);
        }
        function_ids.insert(key.clone(), id);
    }
}

#[allow(clippy::too_many_arguments)]
fn lower_function_body(
    builder: &mut ModuleBuilder,
    function_id: FunctionId,
    key: &str,
    function: &Function,
    program: &Program,
    entry_file: &str,
    reflect: &ReflectModule,
    function_ids: &FxHashMap<String, FunctionId>,
    global_ids: &FxHashMap<String, GlobalId>,
    malloc_fn: Option<FunctionId>,
    memory: Option<walrus::MemoryId>,
    uintptr_size: PointerSize,
    diagnostics: &mut DiagnosticBag,
) {
    let Some((decl, file)) = find_function_decl(program, key) else { return };
    let Some(body) = &decl.body else { return };
    let Some(memory) = memory else { return };

    // The signature pass already inserted this function with a placeholder
    // `unreachable` body (to get a concrete `FunctionId` for forward/mutual
    // calls); its `FunctionBuilder` is still reachable through the arena
    // entry, so the real body can be built into it now.
    let (func_builder, arg_locals) = match &mut builder.module.funcs.get_mut(function_id).kind {
        walrus::FunctionKind::Local(local) => local.builder_and_args(),
        _ => return,
    };

    let mut fctx = FunctionContext::new(function.return_type, uintptr_size, entry_file);
    let param_names: Vec<&str> = std::iter::once("this")
        .filter(|_| function.is_instance())
        .chain(decl.params.iter().map(|p| p.name.as_str()))
        .collect();
    for (variable, local_id) in function.params.iter().zip(arg_locals.iter()) {
        let name = param_names.get(variable.index as usize).copied().unwrap_or("");
        fctx.declare_local(name, variable.clone(), *local_id);
    }

    {
        let mut seq = func_builder.func_body();
        let mut lctx = ExprLowerCtx {
            reflect,
            function_ids,
            global_ids,
            malloc_fn,
            memory,
            uintptr_size,
            file: &file,
            diagnostics,
            locals: &mut builder.module.locals,
        };
        lower_stmts(&mut seq, body, &mut fctx, &mut lctx);
        if function.return_type == wasmc_reflect::Type::Void {
            seq.return_();
        } else {
            seq.unreachable();
        }
    }
}

fn find_function_decl<'p>(program: &'p Program, key: &str) -> Option<(&'p wasmc_ast::FunctionDecl, String)> {
    if let Some(lt_pos) = key.find('<') {
        return find_generic_function_decl(program, key, lt_pos);
    }
    for file in &program.files {
        for item in &file.statements {
            match item {
                TopLevel::Function(decl) if decl.name == key => return Some((decl, file.path.clone())),
                TopLevel::Class(class) => {
                    for member in &class.members {
                        if let Some(method) = &member.method {
                            let qualified = match member.kind {
                                wasmc_ast::MemberKind::Constructor => class.name.clone(),
                                wasmc_ast::MemberKind::Method => format!("{}#{}", class.name, method.name),
                                wasmc_ast::MemberKind::StaticMethod => format!("{}.{}", class.name, method.name),
                                wasmc_ast::MemberKind::Field => continue,
                            };
                            if qualified == key {
                                return Some((method, file.path.clone()));
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
    None
}

/// Resolve a monomorphized instance key (`"Box<int>"`, `"Box<int>#get"`,
/// `"Box<int>.make"`, or a bare generic function's `"identity<int>"`) back
/// to the template declaration its body should be lowered from. `lt_pos` is
/// the byte offset of the `<` that starts the type-argument list, so the
/// base template name (before it) and the member qualifier (after the
/// matching `>`) can be split out.
fn find_generic_function_decl<'p>(program: &'p Program, key: &str, lt_pos: usize) -> Option<(&'p wasmc_ast::FunctionDecl, String)> {
    let base_name = &key[..lt_pos];
    let rest = &key[lt_pos..];
    let close = rest.find('>')?;
    let qualifier = &rest[close + 1..];

    for file in &program.files {
        for item in &file.statements {
            match item {
                TopLevel::Function(decl) if decl.name == base_name && !decl.type_params.is_empty() && qualifier.is_empty() => {
                    return Some((decl, file.path.clone()));
                }
                TopLevel::Class(class) if class.name == base_name && !class.type_params.is_empty() => {
                    if qualifier.is_empty() {
                        for member in &class.members {
                            if member.kind == wasmc_ast::MemberKind::Constructor {
                                if let Some(method) = &member.method {
                                    return Some((method, file.path.clone()));
                                }
                            }
                        }
                    } else if let Some(method_name) = qualifier.strip_prefix('#').or_else(|| qualifier.strip_prefix('.')) {
                        for member in &class.members {
                            if let Some(method) = &member.method {
                                if method.name == method_name {
                                    return Some((method, file.path.clone()));
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
    None
}
