//! Imports and module loading.
//!
//! An import path is searched relative to the importing module's
//! directory, then through each entry of the import search path
//! (`SABLE_IMPORT_PATH`, resolved by the driver into the context).
//! Resolved paths are canonicalized and cached; importing a module that is
//! still mid-resolution is a circular import. Importing a directory
//! imports every `.sable` file beneath it.

use crate::state::Resolver;
use sable_common::{Atom, ErrorKind, Fatal, SourceLocation};
use sable_parser::cst;
use sable_tir::{Context, Module, ModuleId, ScopeId, Symbol, SymbolId, SymbolKind};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Parse and resolve in-memory source text as a module. The path is used
/// for diagnostics and as the anchor for relative imports; it does not
/// need to exist on disk.
pub fn resolve_source(ctx: &mut Context, source: &str, path: &str) -> Result<ModuleId, Fatal> {
    let parsed = sable_parser::parse_module(source, path, &mut ctx.interner)?;
    let module = create_module(ctx, path, path, parsed);
    Resolver::resolve(ctx, module)?;
    Ok(module)
}

/// Load, parse, and resolve a module from disk, reusing the cache when the
/// canonical path has been loaded before.
pub fn resolve_file(ctx: &mut Context, path: &Path) -> Result<ModuleId, Fatal> {
    let display = path.display().to_string();
    let canonical = path
        .canonicalize()
        .map_err(|err| file_error(&display, format!("failed to load `{display}`: {err}")))?;
    let canonical_str = canonical.display().to_string();
    let canonical_atom = ctx.interner.intern(&canonical_str);
    if let Some(existing) = ctx.lookup_module(canonical_atom) {
        return Ok(existing);
    }

    let source = std::fs::read_to_string(&canonical)
        .map_err(|err| file_error(&display, format!("failed to load `{display}`: {err}")))?;
    let parsed = sable_parser::parse_module(&source, &canonical_str, &mut ctx.interner)?;
    let module = create_module(ctx, &display, &canonical_str, parsed);
    Resolver::resolve(ctx, module)?;
    Ok(module)
}

fn file_error(path: &str, message: String) -> Fatal {
    sable_common::Diagnostic::new(ErrorKind::Io, path, 0, 0, message)
}

fn create_module(ctx: &mut Context, name: &str, path: &str, parsed: cst::Module) -> ModuleId {
    let name = ctx.interner.intern(name);
    let path = ctx.interner.intern(path);
    let symbols = ctx.new_scope(Some(ctx.global_scope));
    let exports = ctx.new_scope(None);
    ctx.add_module(Module {
        name,
        path,
        cst: Rc::new(parsed),
        symbols,
        exports,
        loaded: false,
    })
}

impl Resolver<'_> {
    pub(crate) fn resolve_import(&mut self, import: &cst::Import) -> Result<(), Fatal> {
        trace!(path = %import.path, "resolving import");
        self.resolve_import_file(import.location, &import.path, false)
    }

    fn resolve_import_file(
        &mut self,
        location: SourceLocation,
        file_name: &str,
        from_directory: bool,
    ) -> Result<(), Fatal> {
        let module_path = self.ctx.name(self.ctx.module(self.module).path).to_owned();
        let Some(path) = canonical_import_path(self.ctx, &module_path, file_name) else {
            return Err(self.error(
                ErrorKind::Io,
                location,
                format!("failed to resolve import `{file_name}`"),
            ));
        };

        if path.is_dir() {
            // Directory imports pull in every sable file beneath the
            // directory, in a stable order, ignoring everything else.
            let mut entries = Vec::new();
            for entry in WalkDir::new(&path).sort_by_file_name() {
                let entry = entry.map_err(|err| {
                    self.error(
                        ErrorKind::Io,
                        location,
                        format!("failed to resolve import `{file_name}`: {err}"),
                    )
                })?;
                if entry.file_type().is_file() {
                    entries.push(entry.into_path());
                }
            }
            for entry in entries {
                let entry_name = entry.display().to_string();
                self.resolve_import_file(location, &entry_name, true)?;
            }
            return Ok(());
        }

        // Ignore non-sable files pulled in through a directory import so
        // directories with stray files still import cleanly.
        if from_directory && path.extension().is_none_or(|ext| ext != "sable") {
            return Ok(());
        }

        let canonical_str = path.display().to_string();
        let canonical_atom = self.ctx.interner.intern(&canonical_str);
        let imported = match self.ctx.lookup_module(canonical_atom) {
            Some(existing) => existing,
            None => self.load_module(location, file_name, &path)?,
        };
        if !self.ctx.module(imported).loaded {
            return Err(self.error(
                ErrorKind::CircularImport,
                location,
                format!("circular dependency when importing `{file_name}`"),
            ));
        }

        let into = self.ctx.module(self.module).symbols;
        let exports = self.ctx.module(imported).exports;
        self.merge_symbol_table(into, exports)
    }

    fn load_module(
        &mut self,
        location: SourceLocation,
        file_name: &str,
        path: &Path,
    ) -> Result<ModuleId, Fatal> {
        debug!(path = %path.display(), "loading module");
        let canonical_str = path.display().to_string();
        let source = std::fs::read_to_string(path).map_err(|err| {
            self.error(
                ErrorKind::Io,
                location,
                format!("failed to load `{file_name}`: {err}"),
            )
        })?;
        let parsed =
            sable_parser::parse_module(&source, &canonical_str, &mut self.ctx.interner)?;
        let module = create_module(self.ctx, file_name, &canonical_str, parsed);
        Resolver::resolve(self.ctx, module)?;
        Ok(module)
    }

    /// Merge an imported module's exports into this module's symbol
    /// table. Namespaces merge recursively by unioning their tables;
    /// non-namespace duplicates that are not the same symbol trigger the
    /// table's redeclaration error.
    fn merge_symbol_table(&mut self, into: ScopeId, from: ScopeId) -> Result<(), Fatal> {
        let entries: Vec<(Atom, SymbolId)> = self
            .ctx
            .scope(from)
            .symbols
            .iter()
            .map(|(&name, &symbol)| (name, symbol))
            .collect();

        for (name, symbol) in entries {
            if let SymbolKind::Namespace(from_scope) = self.ctx.symbol(symbol).kind {
                let existing = match self.ctx.lookup_local(into, name) {
                    Some(existing) => existing,
                    None => {
                        // First sight of this namespace on our side:
                        // create an empty table to merge into.
                        let table = self.ctx.new_scope(Some(into));
                        let location = self.ctx.symbol(symbol).location;
                        let namespace_name = self.ctx.symbol(symbol).name;
                        let namespace = self.ctx.alloc_symbol(Symbol {
                            location,
                            name: namespace_name,
                            kind: SymbolKind::Namespace(table),
                        });
                        self.ctx.insert_symbol(into, name, namespace)?;
                        namespace
                    }
                };

                let SymbolKind::Namespace(into_scope) = self.ctx.symbol(existing).kind else {
                    // A non-namespace already owns the name; force the
                    // insertion so the redeclaration error cites it.
                    self.ctx.insert_symbol(into, name, symbol)?;
                    unreachable!("inserting a duplicate symbol always fails");
                };
                self.merge_symbol_table(into_scope, from_scope)?;
                continue;
            }

            // Re-inserting the identical symbol (the same module imported
            // through two paths) is a no-op; a different symbol under the
            // same name is a redeclaration.
            self.ctx.insert_symbol(into, name, symbol)?;
        }
        Ok(())
    }
}

/// Resolve an import path to a canonical filesystem path: first relative
/// to the importing module's directory, then through the context's import
/// search paths.
fn canonical_import_path(ctx: &Context, module_path: &str, import_path: &str) -> Option<PathBuf> {
    let module_dir = Path::new(module_path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    // Joining an absolute path (as directory imports produce) yields the
    // absolute path itself.
    let relative = module_dir.join(import_path);
    if relative.exists() {
        return relative.canonicalize().ok();
    }

    for search_path in &ctx.search_paths {
        let candidate = search_path.join(import_path);
        if candidate.exists() {
            return candidate.canonicalize().ok();
        }
    }
    None
}
