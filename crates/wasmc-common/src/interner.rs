//! String interning for mangled names and identifiers.
//!
//! The compiler refers to the same mangled name from many places (the
//! module-level maps, diagnostics, IR export lists); interning keeps those
//! comparisons and hashes to a `u32` instead of repeated string work.

use rustc_hash::FxHashMap;

/// An interned string. Cheap to copy and compare.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(u32);

/// Single-threaded string interner.
///
/// A compilation owns exactly one `Interner` (see the concurrency model in
/// the core driver); there is no need for the sharded, lock-based variant a
/// multi-threaded checker would use.
#[derive(Default)]
pub struct Interner {
    strings: Vec<Box<str>>,
    lookup: FxHashMap<Box<str>, Atom>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> Atom {
        if let Some(&atom) = self.lookup.get(s) {
            return atom;
        }
        let atom = Atom(self.strings.len() as u32);
        let boxed: Box<str> = s.into();
        self.strings.push(boxed.clone());
        self.lookup.insert(boxed, atom);
        atom
    }

    pub fn resolve(&self, atom: Atom) -> &str {
        &self.strings[atom.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut interner = Interner::new();
        let a = interner.intern("foo/bar$baz");
        let b = interner.intern("foo/bar$baz");
        assert_eq!(a, b);
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn distinct_strings_get_distinct_atoms() {
        let mut interner = Interner::new();
        let a = interner.intern("a");
        let b = interner.intern("b");
        assert_ne!(a, b);
        assert_eq!(interner.resolve(a), "a");
        assert_eq!(interner.resolve(b), "b");
    }
}
