//! Symbols.
//!
//! A symbol binds an interned name to a resolved entity: a type, a variable
//! or constant with storage, a function, a template awaiting instantiation,
//! or a namespace. Symbols live in the context arena and are shared by id;
//! "the same symbol" in redeclaration and re-import checks means the same
//! [`SymbolId`].

use crate::address::Address;
use crate::context::ScopeId;
use crate::tir::FunctionId;
use crate::types::TypeId;
use crate::value::Value;
use sable_common::{Atom, SourceLocation};
use std::rc::Rc;

/// Handle to a symbol in the context's symbol arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SymbolId(pub(crate) u32);

impl SymbolId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub location: SourceLocation,
    pub name: Atom,
    pub kind: SymbolKind,
}

#[derive(Clone, Debug)]
pub enum SymbolKind {
    /// A name for a type (builtin, struct declaration, alias, or template
    /// instance).
    Type(TypeId),
    Variable {
        type_: TypeId,
        address: Address,
        /// Compile-time initial value. Present for initialized globals,
        /// absent for locals, parameters, extern variables, and `uninit`
        /// globals (which the back-end places in zeroed storage).
        value: Option<Value>,
    },
    Constant {
        type_: TypeId,
        address: Address,
        value: Value,
    },
    Function(FunctionId),
    Template(TemplateSymbol),
    Namespace(ScopeId),
}

/// An uninstantiated template declaration.
#[derive(Clone, Debug)]
pub struct TemplateSymbol {
    /// The original declaration CST; instantiation synthesizes a copy with
    /// the parameter list emptied and the name mangled.
    pub decl: Rc<sable_parser::cst::Decl>,
    /// Static-address prefix captured at the declaration site.
    pub addr_prefix: Option<Atom>,
    /// Type-name prefix captured at the declaration site.
    pub name_prefix: Option<Atom>,
    /// Lexical scope the template was declared in; instances resolve with a
    /// fresh child of this scope.
    pub parent_scope: ScopeId,
    /// Private memo table of instantiations keyed by mangled instance name.
    pub instances: ScopeId,
}

impl Symbol {
    /// The type of this symbol where that is meaningful. Functions report
    /// their function type; templates and namespaces have none.
    pub fn type_of(&self, functions: &[crate::tir::Function]) -> Option<TypeId> {
        match &self.kind {
            SymbolKind::Type(type_) => Some(*type_),
            SymbolKind::Variable { type_, .. } | SymbolKind::Constant { type_, .. } => {
                Some(*type_)
            }
            SymbolKind::Function(function) => Some(functions[function.index()].type_),
            SymbolKind::Template(_) | SymbolKind::Namespace(_) => None,
        }
    }

    /// The storage address of this symbol, if it has one.
    pub fn address(&self) -> Option<Address> {
        match &self.kind {
            SymbolKind::Variable { address, .. } | SymbolKind::Constant { address, .. } => {
                Some(*address)
            }
            SymbolKind::Function(_) => None, // resolved through the function
            _ => None,
        }
    }

    /// The compile-time value of this symbol, if it has one.
    pub fn value(&self) -> Option<&Value> {
        match &self.kind {
            SymbolKind::Variable { value, .. } => value.as_ref(),
            SymbolKind::Constant { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Human-readable kind name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            SymbolKind::Type(_) => "type",
            SymbolKind::Variable { .. } => "variable",
            SymbolKind::Constant { .. } => "constant",
            SymbolKind::Function(_) => "function",
            SymbolKind::Template(_) => "template",
            SymbolKind::Namespace(_) => "namespace",
        }
    }
}
