//! Fatal diagnostics.
//!
//! Every user-visible failure in the front-end is a [`Diagnostic`]: a kind,
//! a `file:line:col` position, and a single-line message. Diagnostics are
//! fatal; resolution stops at the first one and the error value unwinds to
//! the driver through `Result`. The library never prints or exits on its
//! own.

use serde::Serialize;
use std::fmt;

/// Classification of a diagnostic.
///
/// The kind is not part of the rendered message; it exists so callers (and
/// tests) can react to the failure class without parsing message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Malformed source text (lexer/parser).
    Syntax,
    /// Lookup miss for an identifier, possibly qualified.
    UndeclaredIdentifier,
    /// Local insertion of a different symbol under an existing name.
    Redeclaration,
    /// Actual type cannot be made equal to the expected type.
    TypeMismatch,
    /// Integer literal or arithmetic result outside a type's range.
    Range,
    /// Division by zero in a compile-time expression.
    DivideByZero,
    /// Disallowed cast pair, or a pointer cast in a constant expression.
    Cast,
    /// An unsized type where a byte layout is required.
    Unsized,
    /// Assignment, addressof, or array slicing applied to an rvalue.
    Lvalue,
    /// A non-constant symbol in a context requiring a compile-time value.
    NotConstant,
    /// Template arity mismatch or mis-instantiation.
    Template,
    /// An import resolved to a module still in the middle of loading.
    CircularImport,
    /// A by-value dependency cycle among top-level declarations.
    CircularDependency,
    /// A source file could not be located or read.
    Io,
    /// Invariant violation; unreachable from well-formed input.
    Internal,
}

/// A single fatal diagnostic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    /// Path of the offending source file (already resolved to a string so
    /// the diagnostic can outlive the interner that produced it).
    pub path: String,
    pub line: u32,
    pub col: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        kind: ErrorKind,
        path: impl Into<String>,
        line: u32,
        col: u32,
        message: impl Into<String>,
    ) -> Box<Self> {
        Box::new(Diagnostic {
            kind,
            path: path.into(),
            line,
            col,
            message: message.into(),
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.path, self.line, self.col, self.message
        )
    }
}

impl std::error::Error for Diagnostic {}

/// Error type threaded through the front-end. Boxed so the `Ok` path stays
/// a machine word wide.
pub type Fatal = Box<Diagnostic>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_with_location_prefix() {
        let d = Diagnostic::new(ErrorKind::Range, "main.sable", 3, 14, "out-of-range literal");
        assert_eq!(d.to_string(), "main.sable:3:14: out-of-range literal");
    }
}
