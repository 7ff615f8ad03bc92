//! Compiler options accepted by `compileFile` / `compileString` / `compileProgram`.

/// Pointer width targeted by a compilation. Fixed for the whole compilation;
/// `uintptr` resolves to this width everywhere (see the reflection model's
/// `uintptrType` invariant).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerSize {
    Wasm32,
    Wasm64,
}

impl PointerSize {
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            PointerSize::Wasm32 => 4,
            PointerSize::Wasm64 => 8,
        }
    }

    /// Construct from the raw `uintptrSize` option value (4 or 8).
    ///
    /// Any other value is a construction error per the options contract.
    pub fn from_raw(size: u32) -> Result<Self, InvalidOption> {
        match size {
            4 => Ok(PointerSize::Wasm32),
            8 => Ok(PointerSize::Wasm64),
            other => Err(InvalidOption::UintptrSize(other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidOption {
    UintptrSize(u32),
}

impl std::fmt::Display for InvalidOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidOption::UintptrSize(size) => {
                write!(f, "uintptrSize must be 4 or 8, got {size}")
            }
        }
    }
}

impl std::error::Error for InvalidOption {}

/// Options controlling one compilation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompileOptions {
    /// Pointer-sized integer width. Defaults to `Wasm32`.
    pub uintptr_size: PointerSize,
    /// Skip allocator integration and declare the module's own memory.
    pub no_lib: bool,
    /// Suppress stderr printing of diagnostics (collection still happens).
    pub silent: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            uintptr_size: PointerSize::Wasm32,
            no_lib: false,
            silent: false,
        }
    }
}

impl CompileOptions {
    pub fn builder() -> CompileOptionsBuilder {
        CompileOptionsBuilder::default()
    }
}

/// Builder for `CompileOptions`, validating `uintptrSize` at `build()` time.
#[derive(Default)]
pub struct CompileOptionsBuilder {
    uintptr_size: Option<u32>,
    no_lib: bool,
    silent: bool,
}

impl CompileOptionsBuilder {
    #[must_use]
    pub fn uintptr_size(mut self, size: u32) -> Self {
        self.uintptr_size = Some(size);
        self
    }

    #[must_use]
    pub fn no_lib(mut self, no_lib: bool) -> Self {
        self.no_lib = no_lib;
        self
    }

    #[must_use]
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn build(self) -> Result<CompileOptions, InvalidOption> {
        let uintptr_size = match self.uintptr_size {
            Some(raw) => PointerSize::from_raw(raw)?,
            None => PointerSize::Wasm32,
        };
        Ok(CompileOptions {
            uintptr_size,
            no_lib: self.no_lib,
            silent: self.silent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_contract() {
        let opts = CompileOptions::default();
        assert_eq!(opts.uintptr_size, PointerSize::Wasm32);
        assert!(!opts.no_lib);
        assert!(!opts.silent);
    }

    #[test]
    fn invalid_uintptr_size_is_rejected() {
        let err = CompileOptions::builder().uintptr_size(16).build();
        assert!(err.is_err());
    }

    #[test]
    fn valid_uintptr_sizes_are_accepted() {
        assert_eq!(
            CompileOptions::builder().uintptr_size(4).build().unwrap().uintptr_size,
            PointerSize::Wasm32
        );
        assert_eq!(
            CompileOptions::builder().uintptr_size(8).build().unwrap().uintptr_size,
            PointerSize::Wasm64
        );
    }
}
