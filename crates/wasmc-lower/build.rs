//! Generates the precompiled bump-allocator module consumed by
//! `src/allocator.rs`.
//!
//! This stands in for a real `mspace`-style allocator binary: it is a
//! minimal bump allocator (no free list, `mspace_free` is a no-op) exposing
//! the three exports the allocator-integration pass expects to find and
//! rewrap (`mspace_init`, `mspace_malloc`, `mspace_free`).

use std::env;
use std::path::PathBuf;

use walrus::{FunctionBuilder, MemoryId, Module, ModuleConfig, ValType};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let mut module = Module::with_config(ModuleConfig::new());
    // Non-freestanding output imports its memory rather than declaring one,
    // so the allocator blob imports it too; `allocator.rs` never has to
    // reconcile two separately declared memories.
    let memory_id: MemoryId = module.memories.add_import(false, 1, None, "env", "memory");

    // `.bump` holds the next free address; mutable, initialized by
    // `mspace_init`.
    let bump_global = module
        .globals
        .add_local(ValType::I32, true, walrus::InitExpr::Value(walrus::ir::Value::I32(0)));

    // mspace_init(heap_base: i32) -> i32: stores heap_base into .bump and
    // returns it as the opaque mspace handle.
    let heap_base = module.locals.add(ValType::I32);
    let mut init_builder = FunctionBuilder::new(&mut module.types, &[ValType::I32], &[ValType::I32]);
    init_builder
        .func_body()
        .local_get(heap_base)
        .global_set(bump_global)
        .global_get(bump_global);
    let mspace_init = init_builder.finish(vec![heap_base], &mut module.funcs);
    module.exports.add("mspace_init", mspace_init);

    // mspace_malloc(_mspace: i32, size: i32) -> i32: bump-allocate and
    // return the old `.bump` value.
    let mspace_param = module.locals.add(ValType::I32);
    let size_param = module.locals.add(ValType::I32);
    let result_local = module.locals.add(ValType::I32);
    let mut malloc_builder =
        FunctionBuilder::new(&mut module.types, &[ValType::I32, ValType::I32], &[ValType::I32]);
    malloc_builder
        .func_body()
        .global_get(bump_global)
        .local_set(result_local)
        .global_get(bump_global)
        .local_get(size_param)
        .binop(walrus::ir::BinaryOp::I32Add)
        .global_set(bump_global)
        .local_get(result_local);
    let mspace_malloc = malloc_builder.finish(vec![mspace_param, size_param], &mut module.funcs);
    module.exports.add("mspace_malloc", mspace_malloc);

    // mspace_free(_mspace: i32, _ptr: i32): no-op, this allocator never
    // reclaims memory.
    let mspace_param2 = module.locals.add(ValType::I32);
    let ptr_param = module.locals.add(ValType::I32);
    let free_builder = FunctionBuilder::new(&mut module.types, &[ValType::I32, ValType::I32], &[]);
    let mspace_free = free_builder.finish(vec![mspace_param2, ptr_param], &mut module.funcs);
    module.exports.add("mspace_free", mspace_free);

    let _ = memory_id;

    let bytes = module.emit_wasm();
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR set by cargo"));
    std::fs::write(out_dir.join("allocator.wasm"), bytes).expect("writing allocator.wasm");
}
