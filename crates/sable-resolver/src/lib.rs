//! Resolver for the sable compiler front-end.
//!
//! This crate walks a parsed module and produces typed IR inside a
//! [`Context`]: it creates symbols and types, enforces the typing rules,
//! inserts implicit casts, sequences top-level declarations topologically,
//! loads and merges imports, and instantiates templates on first use.
//!
//! The entry points are [`resolve_source`] (parse and resolve in-memory
//! text) and [`resolve_file`] (load a module from disk, used by the driver
//! and by import resolution).

mod order;
mod state;
mod state_decls;
mod state_exprs;
mod state_imports;
mod state_stmts;
mod state_templates;
mod state_types;

pub use state::Resolver;
pub use state_imports::{resolve_file, resolve_source};
