//! The compilation context.
//!
//! One [`Context`] exists per compiler invocation. It owns every arena the
//! front-end allocates from: interned strings, types, symbols, symbol
//! tables, TIR nodes, functions, the static-symbol registry, and the
//! loaded-module cache. The discipline is append-only: nodes are pushed,
//! referenced by id, and never removed for the life of the invocation.

use crate::symbols::{Symbol, SymbolId, SymbolKind};
use crate::tir::{Block, BlockId, Expr, ExprId, ExprKind, Function, FunctionId, Stmt, StmtId};
use crate::types::{
    ArrayType, FunctionType, IntType, MemberVariable, StructType, Type, TypeId, TypeKind,
    POINTER_SIZE,
};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use sable_common::{Atom, Diagnostic, ErrorKind, Fatal, Interner, SourceLocation};
use smallvec::SmallVec;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::debug;

/// Handle to a symbol table in the context's scope arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A lexical symbol table: name → symbol, with a parent link for transitive
/// lookup. Iteration order is insertion order, which keeps export merging
/// and diagnostics deterministic.
#[derive(Clone, Debug)]
pub struct SymbolTable {
    pub parent: Option<ScopeId>,
    pub symbols: IndexMap<Atom, SymbolId>,
}

/// Handle to a loaded (or loading) module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModuleId(u32);

impl ModuleId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A source file in the loaded-module cache.
#[derive(Clone, Debug)]
pub struct Module {
    /// Import name as written in the importing module.
    pub name: Atom,
    /// Canonical filesystem path; the cache key.
    pub path: Atom,
    pub cst: Rc<sable_parser::cst::Module>,
    /// The module's own symbol table (parent is the global scope).
    pub symbols: ScopeId,
    /// The table other modules see when importing this one.
    pub exports: ScopeId,
    /// False while the module is mid-resolution; an import hitting an
    /// unloaded cache entry is a circular import.
    pub loaded: bool,
}

/// Ids of the builtin types, created once at context construction.
#[derive(Clone, Debug)]
pub struct Builtins {
    pub void_: TypeId,
    pub bool_: TypeId,
    pub byte: TypeId,
    pub any: TypeId,
    /// The unsized type of suffix-less integer literals.
    pub integer: TypeId,
    pub u8_: TypeId,
    pub s8_: TypeId,
    pub u16_: TypeId,
    pub s16_: TypeId,
    pub u32_: TypeId,
    pub s32_: TypeId,
    pub u64_: TypeId,
    pub s64_: TypeId,
    pub usize_: TypeId,
    pub ssize_: TypeId,
    /// Location attached to synthesized builtin symbols.
    pub location: SourceLocation,
}

/// Frequently compared atoms, interned once up front.
#[derive(Clone, Debug)]
pub struct Interned {
    pub empty: Atom,
    pub y: Atom,
    pub u8_: Atom,
    pub s8_: Atom,
    pub u16_: Atom,
    pub s16_: Atom,
    pub u32_: Atom,
    pub s32_: Atom,
    pub u64_: Atom,
    pub s64_: Atom,
    pub u: Atom,
    pub s: Atom,
    pub return_: Atom,
}

pub struct Context {
    pub interner: Interner,
    types: Vec<Type>,
    /// Canonical name → type; the uniquing table behind the `unique_*`
    /// constructors.
    types_by_name: FxHashMap<Atom, TypeId>,
    symbols: Vec<Symbol>,
    scopes: Vec<SymbolTable>,
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
    blocks: Vec<Block>,
    functions: Vec<Function>,
    /// Every statically addressed symbol, in registration order. The
    /// back-end walks this to emit data and text sections.
    pub static_symbols: Vec<SymbolId>,
    static_names: FxHashSet<Atom>,
    modules: Vec<Module>,
    modules_by_path: FxHashMap<Atom, ModuleId>,
    /// Colon-separated `SABLE_IMPORT_PATH` entries, resolved by the driver.
    pub search_paths: Vec<PathBuf>,
    /// Counter feeding the hidden names of slice-literal backing arrays.
    pub slice_backing_counter: u64,
    pub global_scope: ScopeId,
    pub builtins: Builtins,
    pub interned: Interned,
}

impl Context {
    pub fn new() -> Self {
        let mut interner = Interner::new();
        let interned = Interned {
            empty: interner.intern(""),
            y: interner.intern("y"),
            u8_: interner.intern("u8"),
            s8_: interner.intern("s8"),
            u16_: interner.intern("u16"),
            s16_: interner.intern("s16"),
            u32_: interner.intern("u32"),
            s32_: interner.intern("s32"),
            u64_: interner.intern("u64"),
            s64_: interner.intern("s64"),
            u: interner.intern("u"),
            s: interner.intern("s"),
            return_: interner.intern("return"),
        };
        let builtin_path = interner.intern("<builtin>");
        let location = SourceLocation::new(builtin_path, 0, 0);

        let mut ctx = Context {
            interner,
            types: Vec::new(),
            types_by_name: FxHashMap::default(),
            symbols: Vec::new(),
            scopes: vec![SymbolTable {
                parent: None,
                symbols: IndexMap::new(),
            }],
            exprs: Vec::new(),
            stmts: Vec::new(),
            blocks: Vec::new(),
            functions: Vec::new(),
            static_symbols: Vec::new(),
            static_names: FxHashSet::default(),
            modules: Vec::new(),
            modules_by_path: FxHashMap::default(),
            search_paths: Vec::new(),
            slice_backing_counter: 0,
            global_scope: ScopeId(0),
            builtins: Builtins {
                void_: TypeId(0),
                bool_: TypeId(0),
                byte: TypeId(0),
                any: TypeId(0),
                integer: TypeId(0),
                u8_: TypeId(0),
                s8_: TypeId(0),
                u16_: TypeId(0),
                s16_: TypeId(0),
                u32_: TypeId(0),
                s32_: TypeId(0),
                u64_: TypeId(0),
                s64_: TypeId(0),
                usize_: TypeId(0),
                ssize_: TypeId(0),
                location,
            },
            interned,
        };

        ctx.builtins.void_ = ctx.new_builtin_type("void", Some(0), Some(0), TypeKind::Void, true);
        ctx.builtins.bool_ = ctx.new_builtin_type("bool", Some(1), Some(1), TypeKind::Bool, true);
        ctx.builtins.byte = ctx.new_builtin_type("byte", Some(1), Some(1), TypeKind::Byte, true);
        ctx.builtins.any = ctx.new_builtin_type("any", None, None, TypeKind::Any, true);
        // The untyped integer type cannot be named in source, so it gets no
        // symbol in the global scope.
        ctx.builtins.integer =
            ctx.new_builtin_type("integer", None, None, TypeKind::Integer, false);
        ctx.builtins.u8_ = ctx.new_builtin_int("u8", false, 1);
        ctx.builtins.s8_ = ctx.new_builtin_int("s8", true, 1);
        ctx.builtins.u16_ = ctx.new_builtin_int("u16", false, 2);
        ctx.builtins.s16_ = ctx.new_builtin_int("s16", true, 2);
        ctx.builtins.u32_ = ctx.new_builtin_int("u32", false, 4);
        ctx.builtins.s32_ = ctx.new_builtin_int("s32", true, 4);
        ctx.builtins.u64_ = ctx.new_builtin_int("u64", false, 8);
        ctx.builtins.s64_ = ctx.new_builtin_int("s64", true, 8);
        ctx.builtins.usize_ = ctx.new_builtin_int("usize", false, 8);
        ctx.builtins.ssize_ = ctx.new_builtin_int("ssize", true, 8);
        ctx
    }

    fn new_builtin_type(
        &mut self,
        name: &str,
        size: Option<u64>,
        align: Option<u64>,
        kind: TypeKind,
        named: bool,
    ) -> TypeId {
        let name = self.interner.intern(name);
        let type_ = self.push_type(Type {
            name,
            size,
            align,
            kind,
            member_scope: None,
        });
        if named {
            let symbol = self.alloc_symbol(Symbol {
                location: self.builtins.location,
                name,
                kind: SymbolKind::Type(type_),
            });
            self.insert_symbol(self.global_scope, name, symbol)
                .expect("builtin type names are distinct");
        }
        type_
    }

    fn new_builtin_int(&mut self, name: &str, signed: bool, size: u64) -> TypeId {
        self.new_builtin_type(
            name,
            Some(size),
            Some(size),
            TypeKind::Int(IntType::with_width(signed, size)),
            true,
        )
    }

    // ===== Arena accessors =====

    #[inline]
    pub fn ty(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    #[inline]
    pub fn ty_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.types[id.index()]
    }

    #[inline]
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    #[inline]
    pub fn scope(&self, id: ScopeId) -> &SymbolTable {
        &self.scopes[id.index()]
    }

    #[inline]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    #[inline]
    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    #[inline]
    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    #[inline]
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    #[inline]
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    #[inline]
    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.index()]
    }

    pub fn alloc_symbol(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(u32::try_from(self.symbols.len()).expect("symbol arena overflow"));
        self.symbols.push(symbol);
        id
    }

    pub fn alloc_expr(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(u32::try_from(self.exprs.len()).expect("expr arena overflow"));
        self.exprs.push(expr);
        id
    }

    pub fn alloc_stmt(&mut self, stmt: Stmt) -> StmtId {
        let id = StmtId(u32::try_from(self.stmts.len()).expect("stmt arena overflow"));
        self.stmts.push(stmt);
        id
    }

    pub fn alloc_block(&mut self, block: Block) -> BlockId {
        let id = BlockId(u32::try_from(self.blocks.len()).expect("block arena overflow"));
        self.blocks.push(block);
        id
    }

    pub fn alloc_function(&mut self, function: Function) -> FunctionId {
        let id = FunctionId(u32::try_from(self.functions.len()).expect("function arena overflow"));
        self.functions.push(function);
        id
    }

    fn push_type(&mut self, type_: Type) -> TypeId {
        let id = TypeId(u32::try_from(self.types.len()).expect("type arena overflow"));
        // First registration wins: a duplicate nominal name is on its way
        // to a redeclaration diagnostic, and compound constructors check
        // the table before constructing.
        self.types_by_name.entry(type_.name).or_insert(id);
        self.types.push(type_);
        id
    }

    // ===== Strings and diagnostics =====

    #[inline]
    pub fn name(&self, atom: Atom) -> &str {
        self.interner.resolve(atom)
    }

    /// Build a fatal diagnostic at `location`.
    pub fn error(
        &self,
        kind: ErrorKind,
        location: SourceLocation,
        message: impl Into<String>,
    ) -> Fatal {
        Diagnostic::new(
            kind,
            self.name(location.path),
            location.line,
            location.col,
            message,
        )
    }

    // ===== Scopes =====

    pub fn new_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(u32::try_from(self.scopes.len()).expect("scope arena overflow"));
        self.scopes.push(SymbolTable {
            parent,
            symbols: IndexMap::new(),
        });
        id
    }

    /// Look up `name` in `scope` only.
    pub fn lookup_local(&self, scope: ScopeId, name: Atom) -> Option<SymbolId> {
        self.scopes[scope.index()].symbols.get(&name).copied()
    }

    /// Look up `name` in `scope`, climbing parent scopes on a miss.
    pub fn lookup(&self, scope: ScopeId, name: Atom) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(scope) = current {
            let table = &self.scopes[scope.index()];
            if let Some(&symbol) = table.symbols.get(&name) {
                return Some(symbol);
            }
            current = table.parent;
        }
        None
    }

    /// Insert `symbol` under `name`. Re-inserting the exact same symbol is
    /// a no-op (this is how multi-path re-imports stay silent); inserting a
    /// different symbol under an existing local name is a redeclaration
    /// error citing the previous site.
    pub fn insert_symbol(
        &mut self,
        scope: ScopeId,
        name: Atom,
        symbol: SymbolId,
    ) -> Result<(), Fatal> {
        if let Some(existing) = self.lookup_local(scope, name) {
            if existing == symbol {
                return Ok(());
            }
            let previous = self.symbol(existing).location;
            let new = self.symbol(symbol).location;
            return Err(self.error(
                ErrorKind::Redeclaration,
                new,
                format!(
                    "redeclaration of `{}` previously declared at [{}:{}]",
                    self.name(name),
                    self.name(previous.path),
                    previous.line
                ),
            ));
        }
        self.scopes[scope.index()].symbols.insert(name, symbol);
        Ok(())
    }

    // ===== Type uniquing =====

    fn intern_type(&mut self, name: String, build: impl FnOnce(Atom) -> Type) -> TypeId {
        let name = self.interner.intern(&name);
        if let Some(&existing) = self.types_by_name.get(&name) {
            return existing;
        }
        self.push_type(build(name))
    }

    pub fn unique_pointer(&mut self, base: TypeId) -> TypeId {
        let name = format!("*{}", self.name(self.ty(base).name));
        self.intern_type(name, |name| Type {
            name,
            size: Some(POINTER_SIZE),
            align: Some(POINTER_SIZE),
            kind: TypeKind::Pointer(base),
            member_scope: None,
        })
    }

    pub fn unique_array(&mut self, count: u64, base: TypeId) -> TypeId {
        let name = format!("[{count}]{}", self.name(self.ty(base).name));
        let base_size = self.ty(base).size;
        let base_align = self.ty(base).align;
        self.intern_type(name, |name| Type {
            name,
            size: base_size.map(|size| {
                count
                    .checked_mul(size)
                    .expect("array size overflows a u64")
            }),
            align: base_align,
            kind: TypeKind::Array(ArrayType { count, base }),
            member_scope: None,
        })
    }

    pub fn unique_slice(&mut self, base: TypeId) -> TypeId {
        let name = format!("[]{}", self.name(self.ty(base).name));
        self.intern_type(name, |name| Type {
            name,
            size: Some(POINTER_SIZE * 2),
            align: Some(POINTER_SIZE),
            kind: TypeKind::Slice(base),
            member_scope: None,
        })
    }

    pub fn unique_function(&mut self, parameter_types: &[TypeId], return_type: TypeId) -> TypeId {
        let mut name = String::from("func(");
        for (i, &param) in parameter_types.iter().enumerate() {
            if i != 0 {
                name.push_str(", ");
            }
            name.push_str(self.name(self.ty(param).name));
        }
        name.push_str(") ");
        name.push_str(self.name(self.ty(return_type).name));

        let parameter_types: SmallVec<[TypeId; 4]> = parameter_types.iter().copied().collect();
        self.intern_type(name, |name| Type {
            name,
            size: Some(POINTER_SIZE),
            align: Some(POINTER_SIZE),
            kind: TypeKind::Function(FunctionType {
                parameter_types,
                return_type,
            }),
            member_scope: None,
        })
    }

    /// Create a (pre-declared, incomplete) struct type. Struct types are
    /// nominal; the caller passes the fully qualified name.
    pub fn new_struct_type(&mut self, name: Atom, member_scope: ScopeId) -> TypeId {
        self.push_type(Type {
            name,
            size: Some(0),
            align: Some(1),
            kind: TypeKind::Struct(StructType {
                members: Vec::new(),
                is_complete: false,
            }),
            member_scope: Some(member_scope),
        })
    }

    /// Append a member variable to a struct type using natural layout:
    /// the field is placed at the next offset aligned for it, and the
    /// struct's alignment grows to the field's.
    pub fn struct_add_member_variable(&mut self, type_: TypeId, name: Atom, member_type: TypeId) {
        let member_size = self.ty(member_type).size.expect("sized member variable");
        let member_align = self.ty(member_type).align.expect("sized member variable");
        let ty = &mut self.types[type_.index()];
        let size = ty.size.expect("struct types are sized");
        let align = ty.align.expect("struct types are sized");
        let offset = align_up(size, member_align.max(1));
        ty.size = Some(offset + member_size);
        ty.align = Some(align.max(member_align));
        let TypeKind::Struct(struct_) = &mut ty.kind else {
            unreachable!("member variable added to non-struct type");
        };
        struct_.members.push(MemberVariable {
            name,
            type_: member_type,
            offset,
        });
    }

    /// Mark a struct complete and round its size up to its alignment.
    /// Completing a struct twice is an internal error upstream.
    pub fn struct_finalize(&mut self, type_: TypeId) {
        let ty = &mut self.types[type_.index()];
        let size = ty.size.expect("struct types are sized");
        let align = ty.align.expect("struct types are sized").max(1);
        ty.size = Some(align_up(size, align));
        let TypeKind::Struct(struct_) = &mut ty.kind else {
            unreachable!("finalizing non-struct type");
        };
        struct_.is_complete = true;
    }

    /// The member symbol table of a type, created on first use so `extend`
    /// works on builtins as well as structs.
    pub fn type_member_scope(&mut self, type_: TypeId) -> ScopeId {
        if let Some(scope) = self.ty(type_).member_scope {
            return scope;
        }
        let scope = self.new_scope(None);
        self.ty_mut(type_).member_scope = Some(scope);
        scope
    }

    /// Look up a member constant/function attached to a type.
    pub fn type_member_symbol(&self, type_: TypeId, name: Atom) -> Option<SymbolId> {
        let scope = self.ty(type_).member_scope?;
        self.lookup_local(scope, name)
    }

    // ===== Static-symbol registry =====

    /// True if a static object with this mangled name has been registered.
    pub fn static_name_exists(&self, name: Atom) -> bool {
        self.static_names.contains(&name)
    }

    /// The mangled static name of a symbol's address.
    pub fn symbol_static_name(&self, symbol: SymbolId) -> Atom {
        match &self.symbol(symbol).kind {
            SymbolKind::Variable { address, .. } | SymbolKind::Constant { address, .. } => {
                address.static_name()
            }
            SymbolKind::Function(function) => self.function(*function).address.static_name(),
            _ => unreachable!("symbol kind has no static address"),
        }
    }

    /// Add a statically addressed symbol to the registry consumed by the
    /// back-end. A duplicate mangled name means `normalize_unique` was
    /// bypassed, which is an internal error.
    pub fn register_static_symbol(&mut self, symbol: SymbolId) -> Result<(), Fatal> {
        let name = self.symbol_static_name(symbol);
        if !self.static_names.insert(name) {
            let location = self.symbol(symbol).location;
            return Err(self.error(
                ErrorKind::Internal,
                location,
                format!(
                    "normalized symbol name `{}` already exists",
                    self.name(name)
                ),
            ));
        }
        debug!(name = self.name(name), "registered static symbol");
        self.static_symbols.push(symbol);
        Ok(())
    }

    // ===== Module cache =====

    pub fn lookup_module(&self, path: Atom) -> Option<ModuleId> {
        self.modules_by_path.get(&path).copied()
    }

    /// Insert a freshly parsed module into the cache, marked unloaded until
    /// its resolution finishes.
    pub fn add_module(&mut self, module: Module) -> ModuleId {
        let id = ModuleId(u32::try_from(self.modules.len()).expect("module arena overflow"));
        debug!(path = self.name(module.path), "caching module");
        self.modules_by_path.insert(module.path, id);
        self.modules.push(module);
        id
    }

    // ===== Lvalue analysis =====

    /// Lvalue-ness is a pure function of expression shape: identifiers
    /// naming variables or constants, indexing into an array lvalue or any
    /// slice, and pointer dereference.
    pub fn expr_is_lvalue(&self, expr: ExprId) -> bool {
        match &self.expr(expr).kind {
            ExprKind::Symbol(symbol) => matches!(
                self.symbol(*symbol).kind,
                SymbolKind::Variable { .. } | SymbolKind::Constant { .. }
            ),
            ExprKind::Index { lhs, .. } => {
                matches!(self.ty(self.expr(*lhs).type_).kind, TypeKind::Slice(_))
                    || self.expr_is_lvalue(*lhs)
            }
            ExprKind::Unary {
                op: crate::UnaryOp::Dereference,
                ..
            } => true,
            _ => false,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

fn align_up(value: u64, align: u64) -> u64 {
    debug_assert!(align > 0);
    value.div_ceil(align) * align
}

#[cfg(test)]
#[path = "tests/context_tests.rs"]
mod tests;
