//! String interning.
//!
//! All identifiers, type names, and mangled static names pass through an
//! [`Interner`]. Interning the same byte string twice yields the same
//! [`Atom`], so name equality is a `u32` comparison everywhere else in the
//! front-end.

use rustc_hash::FxHashMap;
use serde::Serialize;

/// Handle to an interned string.
///
/// Atoms are only meaningful together with the interner that produced them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Atom(u32);

impl Atom {
    /// Raw index of this atom within its interner.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Deduplicating string storage.
#[derive(Debug, Default)]
pub struct Interner {
    strings: Vec<Box<str>>,
    map: FxHashMap<Box<str>, Atom>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning the atom shared by every previous and
    /// future interning of the same bytes.
    pub fn intern(&mut self, s: &str) -> Atom {
        if let Some(&atom) = self.map.get(s) {
            return atom;
        }
        let atom = Atom(u32::try_from(self.strings.len()).expect("interner overflow"));
        let boxed: Box<str> = s.into();
        self.strings.push(boxed.clone());
        self.map.insert(boxed, atom);
        atom
    }

    /// Resolve an atom back to its string.
    #[inline]
    pub fn resolve(&self, atom: Atom) -> &str {
        &self.strings[atom.index()]
    }

    /// Look up the atom for a string without interning it.
    #[inline]
    pub fn get(&self, s: &str) -> Option<Atom> {
        self.map.get(s).copied()
    }

    /// Number of distinct strings interned so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut interner = Interner::new();
        let a = interner.intern("foo");
        let b = interner.intern("foo");
        let c = interner.intern("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(interner.resolve(a), "foo");
        assert_eq!(interner.resolve(c), "bar");
    }

    #[test]
    fn empty_string_interns() {
        let mut interner = Interner::new();
        let empty = interner.intern("");
        assert_eq!(interner.resolve(empty), "");
        assert_eq!(empty, interner.intern(""));
    }

    #[test]
    fn distinct_strings_distinct_atoms() {
        let mut interner = Interner::new();
        let atoms: Vec<Atom> = ["u8", "u16", "*u8", "[]u8", "func() void"]
            .iter()
            .map(|s| interner.intern(s))
            .collect();
        for (i, a) in atoms.iter().enumerate() {
            for (j, b) in atoms.iter().enumerate() {
                assert_eq!(i == j, a == b);
            }
        }
    }
}
