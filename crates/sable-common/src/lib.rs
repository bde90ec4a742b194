//! Common types and utilities for the sable compiler front-end.
//!
//! This crate provides foundational types used across all sable crates:
//! - String interning (`Atom`, `Interner`)
//! - Source locations (`SourceLocation`)
//! - Diagnostics (`Diagnostic`, `ErrorKind`)
//! - Arbitrary-precision integer helpers (literal parsing, two's-complement
//!   bit conversions)

// String interning for identifier deduplication
pub mod interner;
pub use interner::{Atom, Interner};

// Source location tracking (path/line/column triples)
pub mod location;
pub use location::SourceLocation;

// Fatal diagnostics
pub mod diagnostics;
pub use diagnostics::{Diagnostic, ErrorKind, Fatal};

// Big-integer parsing and fixed-width bit conversions
pub mod int;
