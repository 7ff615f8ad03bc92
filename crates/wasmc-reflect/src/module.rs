//! Module-level reflection objects: variables, properties, functions,
//! classes, enums, and their generic templates.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use wasmc_ast::{ClassDecl, EnumDecl, FunctionDecl};
use wasmc_common::{Atom, Interner};

use crate::types::{ClassId, Type};

bitflags::bitflags! {
    /// Flags carried by a reflected [`Variable`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct VariableFlags: u8 {
        const GLOBAL = 1 << 0;
        const CONSTANT = 1 << 1;
    }
}

/// A reflected local or global variable.
#[derive(Clone, Debug)]
pub struct Variable {
    pub name: Atom,
    pub ty: Type,
    pub flags: VariableFlags,
    /// Local slot index, or 0 for globals (globals are addressed by name).
    pub index: u32,
}

impl Variable {
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.flags.contains(VariableFlags::GLOBAL)
    }

    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.flags.contains(VariableFlags::CONSTANT)
    }
}

/// A folded constant value, used for enum members and literal global
/// initializers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
}

/// A class field (with a byte offset) or an enum member (with a constant).
#[derive(Clone, Debug)]
pub struct Property {
    pub name: Atom,
    pub ty: Type,
    pub offset: u32,
    pub constant_value: Option<ConstValue>,
}

bitflags::bitflags! {
    /// Flags carried by a reflected [`Function`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FunctionFlags: u8 {
        const IMPORT = 1 << 0;
        const EXPORT = 1 << 1;
        const INSTANCE = 1 << 2;
    }
}

/// A concrete (non-generic, possibly monomorphized) function.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: Atom,
    pub params: SmallVec<[Variable; 4]>,
    pub return_type: Type,
    pub flags: FunctionFlags,
    pub import_module: Option<String>,
    pub import_base: Option<String>,
    /// Every local, including params and (for instance methods) `this` at
    /// slot 0, contiguous from 0.
    pub locals: Vec<Variable>,
}

impl Function {
    #[must_use]
    pub fn is_import(&self) -> bool {
        self.flags.contains(FunctionFlags::IMPORT)
    }

    #[must_use]
    pub fn is_export(&self) -> bool {
        self.flags.contains(FunctionFlags::EXPORT)
    }

    #[must_use]
    pub fn is_instance(&self) -> bool {
        self.flags.contains(FunctionFlags::INSTANCE)
    }

    /// Short signature string keying `Module::signatures`, e.g. `"ii"` for
    /// two i32-class params and void return, `"Iv"` for one i64 param and
    /// void return.
    #[must_use]
    pub fn signature_key(&self, uintptr_size: wasmc_common::options::PointerSize) -> String {
        let mut key = String::with_capacity(self.params.len() + 1);
        for param in &self.params {
            key.push(signature_char(param.ty, uintptr_size));
        }
        key.push(signature_char(self.return_type, uintptr_size));
        key
    }
}

fn signature_char(ty: Type, uintptr_size: wasmc_common::options::PointerSize) -> char {
    match ty {
        Type::Void => 'v',
        Type::Float => 'f',
        Type::Double => 'd',
        Type::Long | Type::ULong => 'I',
        Type::Uintptr(size) if size == wasmc_common::options::PointerSize::Wasm64 => 'I',
        Type::ClassInstance(_) => {
            if uintptr_size == wasmc_common::options::PointerSize::Wasm64 {
                'I'
            } else {
                'i'
            }
        }
        _ => 'i',
    }
}

/// A generic function declaration awaiting monomorphization.
#[derive(Clone, Debug)]
pub struct FunctionTemplate {
    pub decl: FunctionDecl,
    pub type_params: Vec<String>,
    pub source_file: String,
}

impl FunctionTemplate {
    #[must_use]
    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

/// A generic class declaration awaiting monomorphization.
#[derive(Clone, Debug)]
pub struct ClassTemplate {
    pub decl: ClassDecl,
    pub type_params: Vec<String>,
    pub source_file: String,
}

impl ClassTemplate {
    #[must_use]
    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

/// A reflected class: mangled name, property layout, and flattened method
/// names (looked up in `Module::functions` under `Parent#method` /
/// `Parent.method` / the bare name for the constructor).
#[derive(Clone, Debug)]
pub struct Class {
    pub id: ClassId,
    pub mangled_name: Atom,
    pub properties: Vec<Property>,
    pub size: u32,
    pub constructor: Option<Atom>,
    pub methods: Vec<Atom>,
}

/// A reflected enum: mangled name and its integer-constant members.
#[derive(Clone, Debug)]
pub struct Enum {
    pub mangled_name: Atom,
    pub members: Vec<Property>,
}

/// A signature registered for emission; the actual `walrus::TypeId` mapping
/// lives in `wasmc-lower`'s module builder, keyed by this id, so this crate
/// never depends on `walrus`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignatureId(pub u32);

/// The module-level reflection tables populated by the initialization
/// pass and consulted by every later phase.
#[derive(Default)]
pub struct Module {
    pub globals: FxHashMap<String, Variable>,
    pub functions: FxHashMap<String, Function>,
    pub classes: FxHashMap<String, Class>,
    pub enums: FxHashMap<String, Enum>,
    pub function_templates: FxHashMap<String, FunctionTemplate>,
    pub class_templates: FxHashMap<String, ClassTemplate>,
    /// Instantiation cache: `(template name, type args)` -> instance name
    /// already registered in `functions`. Keeps repeated references to the
    /// same `foo<int>(...)` call site from instantiating twice.
    pub function_instances: FxHashMap<(String, Vec<Type>), String>,
    /// Same cache for generic classes, instance name already registered in
    /// `classes`.
    pub class_instances: FxHashMap<(String, Vec<Type>), String>,
    pub signatures: FxHashMap<String, SignatureId>,
    pub interner: Interner,
    class_ids: Vec<String>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `s`, returning the `Atom` later reflection tables (and
    /// `wasmc-lower`) use to refer back to it.
    pub fn intern(&mut self, s: &str) -> Atom {
        self.interner.intern(s)
    }

    /// Resolve a previously-interned `Atom` back to its text.
    #[must_use]
    pub fn resolve(&self, atom: Atom) -> &str {
        self.interner.resolve(atom)
    }

    /// Reserve a [`ClassId`] for `mangled_name`, to be filled in by the
    /// two-phase class layout pass (shell first, then offsets).
    pub fn reserve_class_id(&mut self, mangled_name: &str) -> ClassId {
        let id = ClassId(self.class_ids.len() as u32);
        self.class_ids.push(mangled_name.to_string());
        id
    }

    #[must_use]
    pub fn class_name(&self, id: ClassId) -> &str {
        &self.class_ids[id.0 as usize]
    }

    pub fn register_signature(&mut self, key: &str) -> SignatureId {
        if let Some(&id) = self.signatures.get(key) {
            return id;
        }
        let id = SignatureId(self.signatures.len() as u32);
        self.signatures.insert(key.to_string(), id);
        id
    }

    /// Label for `ty` suitable for a monomorphized instance name. Class
    /// instances use their declared name rather than `Type::keyword()`'s
    /// generic `<class>` placeholder, so `Box<int>` and `Box<Point>` read as
    /// distinct instances.
    #[must_use]
    pub fn type_label(&self, ty: Type) -> String {
        match ty {
            Type::ClassInstance(id) => self.class_name(id).to_string(),
            other => other.keyword().to_string(),
        }
    }

    /// Canonical name for a monomorphized instance of `name`, e.g.
    /// `"Box<int>"`. Used both as the instantiation-cache key and as the
    /// lookup key in `functions`/`classes` once instantiated.
    #[must_use]
    pub fn instance_name(&self, name: &str, type_args: &[Type]) -> String {
        let labels: Vec<String> = type_args.iter().map(|ty| self.type_label(*ty)).collect();
        format!("{name}<{}>", labels.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmc_common::options::PointerSize;

    #[test]
    fn signature_key_encodes_params_and_return() {
        let func = Function {
            name: Atom::default(),
            params: SmallVec::from_vec(vec![
                Variable {
                    name: Atom::default(),
                    ty: Type::Int,
                    flags: VariableFlags::empty(),
                    index: 0,
                },
                Variable {
                    name: Atom::default(),
                    ty: Type::Long,
                    flags: VariableFlags::empty(),
                    index: 1,
                },
            ]),
            return_type: Type::Void,
            flags: FunctionFlags::empty(),
            import_module: None,
            import_base: None,
            locals: Vec::new(),
        };
        assert_eq!(func.signature_key(PointerSize::Wasm32), "iIv");
    }

    #[test]
    fn register_signature_is_idempotent() {
        let mut module = Module::new();
        let a = module.register_signature("iiv");
        let b = module.register_signature("iiv");
        assert_eq!(a, b);
        let c = module.register_signature("v");
        assert_ne!(a, c);
    }
}
