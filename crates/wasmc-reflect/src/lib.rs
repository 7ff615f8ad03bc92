//! Reflection model, name mangler, and type resolver.
//!
//! This crate has no dependency on any concrete WebAssembly IR builder:
//! every type here is representable independent of `walrus`. `wasmc-lower`
//! is the first crate in the workspace that touches IR.

pub mod mangle;
pub mod module;
pub mod type_resolver;
pub mod types;

pub use mangle::{mangle, PRELUDE_FILE};
pub use module::{
    Class, ClassTemplate, ConstValue, Enum, Function, FunctionFlags, FunctionTemplate, Module,
    Property, SignatureId, Variable, VariableFlags,
};
pub use type_resolver::{is_primitive_type_name, resolve_type_node, resolve_type_node_with_substitution};
pub use types::{ClassId, Type};
