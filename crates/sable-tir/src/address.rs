//! Storage addresses.

use sable_common::Atom;

/// Where a symbol's storage lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Address {
    /// A linker label plus a byte offset into the labelled object. The name
    /// is the interned mangled static name.
    Static { name: Atom, offset: u64 },
    /// A frame-pointer-relative stack slot. Negative offsets are locals
    /// below the frame pointer; positive offsets are parameters and the
    /// return slot above the saved frame pointer and return address.
    Local { rbp_offset: i64 },
}

impl Address {
    #[inline]
    pub const fn new_static(name: Atom) -> Self {
        Address::Static { name, offset: 0 }
    }

    #[inline]
    pub const fn new_local(rbp_offset: i64) -> Self {
        Address::Local { rbp_offset }
    }

    /// The mangled label of a static address. Panics on local addresses;
    /// callers check the variant first.
    pub fn static_name(&self) -> Atom {
        match self {
            Address::Static { name, .. } => *name,
            Address::Local { .. } => unreachable!("local address has no static name"),
        }
    }
}
