//! Start-function synthesis: concatenates the allocator's `mspace_init`
//! call, deferred global initializers, and a call to the user's `start`
//! (if declared) into a single void-signature function set as the
//! module's `start`.

use rustc_hash::FxHashMap;
use walrus::{FunctionBuilder, FunctionId, GlobalId};
use wasmc_common::options::PointerSize;
use wasmc_common::DiagnosticBag;
use wasmc_reflect::{Module as ReflectModule, Type};

use crate::allocator::{AllocatorWiring, HEAP_BASE};
use crate::context::FunctionContext;
use crate::conversion::maybe_convert_value;
use crate::expr::{lower_expr, ExprLowerCtx};
use crate::init::DeferredGlobalInit;
use crate::module_builder::ModuleBuilder;

/// Synthesize and install the module's start function, or set the user's
/// `start` directly if there is nothing else to run first. Returns the
/// `FunctionId` installed as `start`, or `None` if the module has no start
/// behavior at all.
#[allow(clippy::too_many_arguments)]
pub fn synthesize_start(
    builder: &mut ModuleBuilder,
    deferred_globals: &[DeferredGlobalInit],
    global_ids: &FxHashMap<String, GlobalId>,
    function_ids: &FxHashMap<String, FunctionId>,
    reflect: &ReflectModule,
    allocator: Option<&AllocatorWiring>,
    malloc_fn: Option<FunctionId>,
    user_start: Option<&str>,
    uintptr_size: PointerSize,
    diagnostics: &mut DiagnosticBag,
) -> Option<FunctionId> {
    let user_start_fn = user_start.and_then(|name| function_ids.get(name).copied());

    if allocator.is_none() && deferred_globals.is_empty() {
        // Nothing to run before the user's own `start`: install it directly,
        // without wrapping it in a synthesized function.
        if let Some(start_fn) = user_start_fn {
            builder.module.start = Some(start_fn);
        }
        return user_start_fn;
    }

    let memory = allocator
        .map(|a| a.memory)
        .or_else(|| builder.module.memories.iter().next().map(|m| m.id()))
        .expect("module declares a memory before start synthesis");

    let mut fn_builder = FunctionBuilder::new(&mut builder.module.types, &[], &[]);
    let mut fctx = FunctionContext::new(Type::Void, uintptr_size, "<start>");

    {
        let mut body = fn_builder.func_body();

        if let Some(alloc) = allocator {
            body.i32_const(HEAP_BASE).call(alloc.mspace_init).global_set(alloc.msp_global);
        }

        for global_init in deferred_globals {
            let mut lctx = ExprLowerCtx {
                reflect,
                function_ids,
                global_ids,
                malloc_fn,
                memory,
                uintptr_size,
                file: &global_init.file,
                diagnostics,
                locals: &mut builder.module.locals,
            };
            let from_ty = lower_expr(&mut body, &global_init.initializer, &mut fctx, &mut lctx);
            maybe_convert_value(
                &mut body,
                from_ty,
                global_init.ty,
                false,
                uintptr_size,
                global_init.initializer.span(),
                &global_init.file,
                diagnostics,
            );
            let global_id = global_ids
                .get(&global_init.name)
                .copied()
                .unwrap_or_else(|| panic!("global '{}' missing from global_ids", global_init.name));
            body.global_set(global_id);
        }

        if let Some(start_fn) = user_start_fn {
            body.call(start_fn);
        }
    }

    let start_fn = fn_builder.finish(vec![], &mut builder.module.funcs);
    builder.module.start = Some(start_fn);
    Some(start_fn)
}
