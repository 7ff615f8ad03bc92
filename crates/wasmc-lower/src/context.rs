//! Per-function lowering state, threaded explicitly through every lowerer
//! call rather than held as fields on a shared compiler struct. A panic or
//! early return can never leave stale state visible to the next function.

use rustc_hash::FxHashMap;
use walrus::LocalId;
use wasmc_common::options::PointerSize;
use wasmc_common::DiagnosticBag;
use wasmc_reflect::{Module as ReflectModule, Type, Variable};

/// The nearest enclosing breakable scope's `walrus` block/loop targets.
/// `break_target` is the block to `br` to on `break`; `continue_target` is
/// the loop to `br` to on `continue`.
#[derive(Clone, Copy)]
pub struct BreakContext {
    pub break_target: walrus::InstrSeqId,
    pub continue_target: walrus::InstrSeqId,
}

/// State scoped to lowering exactly one function body.
pub struct FunctionContext<'a> {
    pub locals_by_name: FxHashMap<String, (Variable, LocalId)>,
    pub return_type: Type,
    pub break_stack: Vec<BreakContext>,
    pub uintptr_size: PointerSize,
    pub file: &'a str,
    next_shadow_suffix: FxHashMap<String, u32>,
}

impl<'a> FunctionContext<'a> {
    pub fn new(return_type: Type, uintptr_size: PointerSize, file: &'a str) -> Self {
        Self {
            locals_by_name: FxHashMap::default(),
            return_type,
            break_stack: Vec::new(),
            uintptr_size,
            file,
            next_shadow_suffix: FxHashMap::default(),
        }
    }

    /// Register a local under a unique name. Shadowed declarations are
    /// suffixed `name.2`, `name.3`, ... for diagnostics, while the walrus
    /// `LocalId` is what actually resolves references.
    pub fn declare_local(&mut self, name: &str, variable: Variable, local_id: LocalId) -> String {
        let unique_name = if self.locals_by_name.contains_key(name) {
            let counter = self.next_shadow_suffix.entry(name.to_string()).or_insert(1);
            *counter += 1;
            format!("{name}.{counter}")
        } else {
            name.to_string()
        };
        self.locals_by_name.insert(unique_name.clone(), (variable, local_id));
        unique_name
    }

    pub fn lookup(&self, name: &str) -> Option<&(Variable, LocalId)> {
        self.locals_by_name.get(name)
    }

    pub fn enter_break_context(&mut self, ctx: BreakContext) {
        self.break_stack.push(ctx);
    }

    pub fn leave_break_context(&mut self) {
        if self.break_stack.pop().is_none() {
            unreachable!("leave_break_context called with an empty break stack");
        }
    }

    pub fn innermost_break_context(&self) -> Option<BreakContext> {
        self.break_stack.last().copied()
    }
}

/// Shared, read-only context available to every lowerer: the reflection
/// module and the diagnostic bag the whole compilation reports into.
pub struct CompilerContext<'m> {
    pub reflect: &'m ReflectModule,
    pub diagnostics: &'m mut DiagnosticBag,
}
