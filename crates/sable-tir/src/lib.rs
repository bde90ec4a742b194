//! Typed intermediate representation for the sable compiler front-end.
//!
//! This crate provides:
//! - `Context` - the per-invocation compilation context owning every arena
//! - Canonicalized types (`Type`, `TypeId`) where structural identity is id
//!   identity
//! - Symbols and lexically scoped symbol tables
//! - Storage addresses (static labels and frame-relative slots)
//! - Compile-time values with byte serialization
//! - The typed IR consumed by a code generator
//! - The static-symbol registry and the loaded-module cache

pub mod address;
pub mod context;
pub mod symbols;
pub mod tir;
pub mod types;
pub mod value;

pub use address::Address;
pub use context::{Builtins, Context, Interned, Module, ModuleId, ScopeId, SymbolTable};
pub use symbols::{Symbol, SymbolId, SymbolKind, TemplateSymbol};
pub use tir::{
    Block, BlockId, Conditional, Expr, ExprId, ExprKind, Function, FunctionId, Stmt, StmtId,
    StmtKind,
};
pub use types::{
    ArrayType, FunctionType, IntType, MemberVariable, StructType, Type, TypeId, TypeKind,
};
pub use value::Value;

// Operator enums are shared with the CST; the resolver maps syntax to IR
// one-to-one for these.
pub use sable_parser::cst::{BinaryOp, UnaryOp};
