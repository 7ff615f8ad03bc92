//! Thin wrapper around `walrus::Module` that bridges the reflection
//! model's abstract `SignatureId` to concrete `walrus::TypeId`s.
//!
//! This is the first place in the workspace that touches `walrus`; see
//! the dependency layering note in the design notes.

use rustc_hash::FxHashMap;
use walrus::{Module, ModuleConfig, ValType};
use wasmc_common::options::PointerSize;
use wasmc_reflect::SignatureId;

pub struct ModuleBuilder {
    pub module: Module,
    pub uintptr_size: PointerSize,
    signature_types: FxHashMap<SignatureId, walrus::TypeId>,
}

impl ModuleBuilder {
    pub fn new(uintptr_size: PointerSize) -> Self {
        Self::from_module(Module::with_config(ModuleConfig::new()), uintptr_size)
    }

    /// Wrap an already-constructed `walrus::Module` (e.g. the decoded
    /// allocator blob) rather than starting from an empty one.
    pub fn from_module(module: Module, uintptr_size: PointerSize) -> Self {
        Self {
            module,
            uintptr_size,
            signature_types: FxHashMap::default(),
        }
    }

    pub fn uintptr_val_type(&self) -> ValType {
        match self.uintptr_size {
            PointerSize::Wasm32 => ValType::I32,
            PointerSize::Wasm64 => ValType::I64,
        }
    }

    /// Resolve (creating if needed) the `walrus::TypeId` for `id`, given
    /// the concrete parameter/result `ValType`s computed by the caller.
    pub fn type_for_signature(&mut self, id: SignatureId, params: &[ValType], results: &[ValType]) -> walrus::TypeId {
        if let Some(&ty) = self.signature_types.get(&id) {
            return ty;
        }
        let ty = self.module.types.add(params, results);
        self.signature_types.insert(id, ty);
        ty
    }
}

/// Maps a reflection [`wasmc_reflect::Type`] to the `walrus::ValType` used
/// to hold it in a local/global/stack slot. Types narrower than 32 bits are
/// held in an `i32` slot (the conversion engine handles masking).
#[must_use]
pub fn val_type_of(ty: wasmc_reflect::Type, uintptr_size: PointerSize) -> ValType {
    use wasmc_reflect::Type;
    match ty {
        Type::Void => ValType::I32, // never actually stored; placeholder for signature building
        Type::Float => ValType::F32,
        Type::Double => ValType::F64,
        Type::Long | Type::ULong => ValType::I64,
        Type::Uintptr(size) => {
            if size == PointerSize::Wasm64 {
                ValType::I64
            } else {
                ValType::I32
            }
        }
        Type::ClassInstance(_) => {
            if uintptr_size == PointerSize::Wasm64 {
                ValType::I64
            } else {
                ValType::I32
            }
        }
        _ => ValType::I32,
    }
}
