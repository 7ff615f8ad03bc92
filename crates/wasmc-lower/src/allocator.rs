//! Allocator integration: wires the precompiled bump-allocator blob (see
//! `build.rs`) into a compilation, or declares a bare linear memory when
//! `no_lib` asks for freestanding output.
//!
//! Grounded on the `clar2wasm` generator's own bootstrap, which starts its
//! whole module from a precompiled `standard.wasm` decoded via
//! `walrus::Module::from_buffer` rather than hand-assembling stdlib
//! functions at compile time.

use once_cell::sync::Lazy;
use walrus::ir::Value;
use walrus::{ExportItem, FunctionBuilder, FunctionId, GlobalId, InitExpr, MemoryId, Module, ModuleConfig, ValType};
use wasmc_common::options::PointerSize;

const ALLOCATOR_WASM: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/allocator.wasm"));

/// First free heap address: one page is reserved below it for module
/// statics (none are emitted yet, but this leaves room without having to
/// re-link the allocator later).
pub const HEAP_BASE: i32 = 1 << 16;

static DECODED_ALLOCATOR: Lazy<Module> =
    Lazy::new(|| Module::from_buffer(ALLOCATOR_WASM).expect("decoding precompiled allocator module"));

/// Allocator wiring a compilation needs to reference afterward: the
/// exported `malloc`/`free` wrappers (for `new`-expression lowering) and
/// the raw `mspace_init` function plus `.msp` global (for the start-function
/// synthesizer to call and store into).
pub struct AllocatorWiring {
    pub memory: MemoryId,
    pub malloc: FunctionId,
    pub free: FunctionId,
    pub msp_global: GlobalId,
    pub mspace_init: FunctionId,
}

/// Build the module's linear memory and allocator, returning the starting
/// `walrus::Module` (either the decoded allocator blob or a fresh module
/// with a bare memory) plus the wiring the rest of the compiler needs.
pub fn build_memory_and_allocator(uintptr_size: PointerSize, no_lib: bool) -> (Module, Option<AllocatorWiring>) {
    if no_lib {
        (build_freestanding_memory(), None)
    } else {
        let (module, wiring) = link_allocator(uintptr_size);
        (module, Some(wiring))
    }
}

fn build_freestanding_memory() -> Module {
    let mut module = Module::with_config(ModuleConfig::new());
    let memory = module.memories.add_local(false, 1, Some(0xffff));
    module.exports.add("memory", memory);
    module
}

fn link_allocator(uintptr_size: PointerSize) -> (Module, AllocatorWiring) {
    let mut module = DECODED_ALLOCATOR.clone();

    let memory = module.memories.iter().next().map(|m| m.id()).expect("allocator module declares a memory import");

    let mspace_init = find_and_unexport(&mut module, "mspace_init");
    let mspace_malloc = find_and_unexport(&mut module, "mspace_malloc");
    let mspace_free = find_and_unexport(&mut module, "mspace_free");

    // `.msp` holds the opaque handle `mspace_init` returns, always i32
    // regardless of `uintptr_size` (the bump allocator itself never
    // represents a pointer wider than i32).
    let msp_global = module.globals.add_local(ValType::I32, true, InitExpr::Value(Value::I32(0)));

    let malloc = build_malloc_wrapper(&mut module, msp_global, mspace_malloc, uintptr_size);
    let free = build_free_wrapper(&mut module, msp_global, mspace_free, uintptr_size);
    module.exports.add("malloc", malloc);
    module.exports.add("free", free);

    (module, AllocatorWiring { memory, malloc, free, msp_global, mspace_init })
}

fn find_and_unexport(module: &mut Module, name: &str) -> FunctionId {
    let export = module
        .exports
        .iter()
        .find(|export| export.name == name)
        .unwrap_or_else(|| panic!("allocator module missing expected export '{name}'"));
    let export_id = export.id();
    let function = match export.item {
        ExportItem::Function(id) => id,
        _ => panic!("allocator export '{name}' is not a function"),
    };
    module.exports.delete(export_id);
    function
}

/// `malloc(size: uintptr) -> uintptr`. When `uintptr_size` is 8, the
/// wrapper wraps its i64 argument down to the allocator's native i32 and
/// zero-extends the i32 result back up; at 4 it's a direct passthrough.
fn build_malloc_wrapper(module: &mut Module, msp_global: GlobalId, mspace_malloc: FunctionId, uintptr_size: PointerSize) -> FunctionId {
    let outer_ty = outer_ptr_type(uintptr_size);
    let size_param = module.locals.add(outer_ty);
    let mut builder = FunctionBuilder::new(&mut module.types, &[outer_ty], &[outer_ty]);
    let mut body = builder.func_body();
    body.global_get(msp_global).local_get(size_param);
    if uintptr_size == PointerSize::Wasm64 {
        body.unop(walrus::ir::UnaryOp::I32WrapI64);
    }
    body.call(mspace_malloc);
    if uintptr_size == PointerSize::Wasm64 {
        body.unop(walrus::ir::UnaryOp::I64ExtendUI32);
    }
    builder.finish(vec![size_param], &mut module.funcs)
}

fn build_free_wrapper(module: &mut Module, msp_global: GlobalId, mspace_free: FunctionId, uintptr_size: PointerSize) -> FunctionId {
    let outer_ty = outer_ptr_type(uintptr_size);
    let ptr_param = module.locals.add(outer_ty);
    let mut builder = FunctionBuilder::new(&mut module.types, &[outer_ty], &[]);
    let mut body = builder.func_body();
    body.global_get(msp_global).local_get(ptr_param);
    if uintptr_size == PointerSize::Wasm64 {
        body.unop(walrus::ir::UnaryOp::I32WrapI64);
    }
    body.call(mspace_free);
    builder.finish(vec![ptr_param], &mut module.funcs)
}

fn outer_ptr_type(uintptr_size: PointerSize) -> ValType {
    if uintptr_size == PointerSize::Wasm64 {
        ValType::I64
    } else {
        ValType::I32
    }
}
