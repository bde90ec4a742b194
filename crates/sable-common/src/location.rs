//! Source location tracking.
//!
//! Every CST and TIR node carries a [`SourceLocation`] so diagnostics can
//! point at the offending token. Locations are small and cheap to copy; the
//! file path is an interned atom.

use crate::interner::Atom;
use serde::Serialize;

/// A (path, line, column) triple. Lines and columns are 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SourceLocation {
    /// Interned path of the source file.
    pub path: Atom,
    pub line: u32,
    pub col: u32,
}

impl SourceLocation {
    #[inline]
    pub const fn new(path: Atom, line: u32, col: u32) -> Self {
        SourceLocation { path, line, col }
    }
}
