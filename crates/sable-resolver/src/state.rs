//! Resolver state and the module resolution driver.
//!
//! A [`Resolver`] exists for the duration of one module's resolution. It
//! tracks the lexical scope, the static-address prefix, the enclosing
//! function and loop, the active defer chain, and the queue of functions
//! whose bodies are completed after all top-level declarations resolve.

use crate::order::order_declarations;
use num_bigint::BigInt;
use sable_common::{Atom, ErrorKind, Fatal, SourceLocation};
use sable_parser::cst;
use sable_tir::{
    Address, Context, Expr, ExprId, ExprKind, FunctionId, ModuleId, ScopeId, StmtId, SymbolKind,
    TypeId, TypeKind,
};
use std::rc::Rc;
use tracing::debug;

/// A function whose signature has been resolved but whose body is pending.
/// Bodies are deferred to the end of the module so mutually recursive
/// functions see each other's symbols.
pub(crate) struct IncompleteFunction {
    pub decl: Rc<cst::Decl>,
    pub function: FunctionId,
    pub scope: ScopeId,
}

pub struct Resolver<'ctx> {
    pub ctx: &'ctx mut Context,
    pub(crate) module: ModuleId,
    /// Dot-separated prefix applied to mangled static names.
    pub(crate) static_addr_prefix: Option<Atom>,
    /// `::`-separated prefix applied to nominal type names.
    pub(crate) name_prefix: Option<Atom>,
    pub(crate) current_function: Option<FunctionId>,
    pub(crate) current_scope: ScopeId,
    pub(crate) current_export_scope: ScopeId,
    /// Current rbp offset for stack-allocated data; zero outside function
    /// completion.
    pub(crate) current_rbp_offset: i64,
    /// True while resolving the initializer of a constant declaration;
    /// decides whether slice-literal backing arrays become constants.
    pub(crate) is_within_const_decl: bool,
    pub(crate) is_within_loop: bool,
    /// Defer head captured at loop entry; bounds the unwinding emitted for
    /// break and continue.
    pub(crate) current_loop_defer: Option<StmtId>,
    /// Head of the defer chain in effect at the current statement.
    pub(crate) current_defer: Option<StmtId>,
    // Must not be iterated with a cached length: template function
    // instantiations push onto it mid-drain.
    pub(crate) incomplete_functions: Vec<IncompleteFunction>,
}

impl<'ctx> Resolver<'ctx> {
    pub(crate) fn new(ctx: &'ctx mut Context, module: ModuleId) -> Self {
        let symbols = ctx.module(module).symbols;
        let exports = ctx.module(module).exports;
        Resolver {
            ctx,
            module,
            static_addr_prefix: None,
            name_prefix: None,
            current_function: None,
            current_scope: symbols,
            current_export_scope: exports,
            current_rbp_offset: 0,
            is_within_const_decl: false,
            is_within_loop: false,
            current_loop_defer: None,
            current_defer: None,
            incomplete_functions: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn is_global(&self) -> bool {
        self.current_function.is_none()
    }

    pub(crate) fn error(
        &self,
        kind: ErrorKind,
        location: SourceLocation,
        message: impl Into<String>,
    ) -> Fatal {
        self.ctx.error(kind, location, message)
    }

    #[inline]
    pub(crate) fn type_name(&self, type_: TypeId) -> &str {
        self.ctx.name(self.ctx.ty(type_).name)
    }

    // ===== Naming =====

    /// `prefix::name`, interned. A `None` prefix implies no prefix.
    pub(crate) fn qualified_name(&mut self, prefix: Option<Atom>, name: Atom) -> Atom {
        match prefix {
            Some(prefix) => {
                let qualified =
                    format!("{}::{}", self.ctx.name(prefix), self.ctx.name(name));
                self.ctx.interner.intern(&qualified)
            }
            None => name,
        }
    }

    /// `prefix.name`, interned. A `None` prefix implies no prefix.
    pub(crate) fn qualified_addr(&mut self, prefix: Option<Atom>, name: Atom) -> Atom {
        match prefix {
            Some(prefix) => {
                let qualified = format!("{}.{}", self.ctx.name(prefix), self.ctx.name(name));
                self.ctx.interner.intern(&qualified)
            }
            None => name,
        }
    }

    /// Normalize `name` under `prefix` into an identifier-safe mangled
    /// static name. Every character that is not alphanumeric or `_` is
    /// replaced with `_`; a non-zero `unique_id` is appended as `.N`.
    pub(crate) fn normalize(
        &mut self,
        prefix: Option<Atom>,
        name: &str,
        unique_id: u32,
    ) -> Atom {
        let mut normalized = String::with_capacity(name.len());
        for c in name.chars() {
            if c.is_ascii_alphanumeric() || c == '_' {
                normalized.push(c);
            } else {
                normalized.push('_');
            }
        }
        debug_assert!(!normalized.is_empty());

        let mut mangled = String::new();
        if let Some(prefix) = prefix {
            mangled.push_str(self.ctx.name(prefix));
            mangled.push('.');
        }
        mangled.push_str(&normalized);
        if unique_id != 0 {
            mangled.push('.');
            mangled.push_str(&unique_id.to_string());
        }
        self.ctx.interner.intern(&mangled)
    }

    /// Normalize with the smallest unique id that avoids a collision in
    /// the static-symbol registry. The first occurrence of a name carries
    /// no numeric suffix.
    pub(crate) fn normalize_unique(&mut self, prefix: Option<Atom>, name: &str) -> Atom {
        let mut unique_id = 0;
        loop {
            let normalized = self.normalize(prefix, name, unique_id);
            if !self.ctx.static_name_exists(normalized) {
                return normalized;
            }
            unique_id += 1;
        }
    }

    // ===== Storage =====

    /// Reserve static storage for an object with the provided name.
    pub(crate) fn reserve_storage_static(&mut self, name: &str) -> Address {
        let prefix = self.static_addr_prefix;
        let normalized = self.normalize_unique(prefix, name);
        Address::new_static(normalized)
    }

    /// Reserve a stack slot for an object of the provided type, tracking
    /// the function's frame low-water mark. Slots are rounded up to eight
    /// bytes.
    pub(crate) fn reserve_storage_local(&mut self, type_: TypeId) -> Address {
        let function = self
            .current_function
            .expect("local storage reserved outside of a function");
        let size = self.ctx.ty(type_).size.expect("sized local") as i64;
        self.current_rbp_offset -= ceil8(size);
        if self.current_rbp_offset < self.ctx.function(function).local_stack_offset {
            self.ctx.function_mut(function).local_stack_offset = self.current_rbp_offset;
        }
        Address::new_local(self.current_rbp_offset)
    }

    // ===== Common checks =====

    pub(crate) fn check_type_compatibility(
        &self,
        location: SourceLocation,
        actual: TypeId,
        expected: TypeId,
    ) -> Result<(), Fatal> {
        if actual != expected {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                location,
                format!(
                    "incompatible type `{}` (expected `{}`)",
                    self.type_name(actual),
                    self.type_name(expected)
                ),
            ));
        }
        Ok(())
    }

    /// Construct an integer literal expression, range-checking typed
    /// literals against their type's bounds. Untyped integer literals are
    /// unbounded.
    pub(crate) fn new_integer_expr(
        &mut self,
        location: SourceLocation,
        type_: TypeId,
        value: BigInt,
    ) -> Result<ExprId, Fatal> {
        let (min, max, what) = match &self.ctx.ty(type_).kind {
            TypeKind::Byte => (BigInt::from(0), BigInt::from(255), "byte"),
            TypeKind::Int(int) => (int.min.clone(), int.max.clone(), "integer"),
            TypeKind::Integer => {
                return Ok(self.ctx.alloc_expr(Expr {
                    location,
                    type_,
                    kind: ExprKind::Integer(value),
                }));
            }
            _ => unreachable!("integer literal of non-integer type"),
        };
        if value < min {
            return Err(self.error(
                ErrorKind::Range,
                location,
                format!("out-of-range {what} literal ({value} < {min})"),
            ));
        }
        if value > max {
            return Err(self.error(
                ErrorKind::Range,
                location,
                format!("out-of-range {what} literal ({value} > {max})"),
            ));
        }
        Ok(self.ctx.alloc_expr(Expr {
            location,
            type_,
            kind: ExprKind::Integer(value),
        }))
    }

    /// Implicitly cast `expr` to `type_` when a shallow conversion exists,
    /// returning the expression unchanged otherwise.
    ///
    /// The cast is "shallow": it inspects only the top-level node. The
    /// valid targets are untyped integer literals (retyped with a range
    /// check), `*T` to `*any`, and function-typed expressions whose
    /// parameter/return positions differ only by `*T` to `*any`. Integer
    /// constant sub-expressions are folded during resolution, so by the
    /// time this runs a literal operand really is a single node.
    pub(crate) fn shallow_implicit_cast(
        &mut self,
        type_: TypeId,
        expr: ExprId,
    ) -> Result<ExprId, Fatal> {
        let expr_type = self.ctx.expr(expr).type_;
        if type_ == expr_type {
            return Ok(expr);
        }

        let location = self.ctx.expr(expr).location;
        let target_is_integer_like = matches!(
            self.ctx.ty(type_).kind,
            TypeKind::Byte | TypeKind::Int(_)
        );

        // FROM untyped integer TO byte or typed integer.
        if target_is_integer_like && matches!(self.ctx.ty(expr_type).kind, TypeKind::Integer) {
            let ExprKind::Integer(value) = self.ctx.expr(expr).kind.clone() else {
                unreachable!("untyped integer expression is always a literal");
            };
            let (min, max) = self.integer_bounds(type_);
            if value < min {
                return Err(self.error(
                    ErrorKind::Range,
                    location,
                    format!(
                        "out-of-range conversion from `{}` to `{}` ({} < {})",
                        self.type_name(expr_type),
                        self.type_name(type_),
                        value,
                        min
                    ),
                ));
            }
            if value > max {
                return Err(self.error(
                    ErrorKind::Range,
                    location,
                    format!(
                        "out-of-range conversion from `{}` to `{}` ({} > {})",
                        self.type_name(expr_type),
                        self.type_name(type_),
                        value,
                        max
                    ),
                ));
            }
            return Ok(self.ctx.alloc_expr(Expr {
                location,
                type_,
                kind: ExprKind::Integer(value),
            }));
        }

        // FROM non-any pointer TO any pointer.
        if self.is_any_pointer(type_)
            && matches!(self.ctx.ty(expr_type).kind, TypeKind::Pointer(_))
            && !self.is_any_pointer(expr_type)
        {
            return Ok(self.ctx.alloc_expr(Expr {
                location,
                type_,
                kind: ExprKind::Cast { expr },
            }));
        }

        // FROM function with typed pointers TO function with any pointers.
        if let (TypeKind::Function(to), TypeKind::Function(from)) =
            (&self.ctx.ty(type_).kind, &self.ctx.ty(expr_type).kind)
        {
            if to.parameter_types.len() != from.parameter_types.len() {
                return Ok(expr);
            }
            let pairs: Vec<(TypeId, TypeId)> = to
                .parameter_types
                .iter()
                .copied()
                .zip(from.parameter_types.iter().copied())
                .chain(std::iter::once((to.return_type, from.return_type)))
                .collect();
            for (to_type, from_type) in pairs {
                let same = to_type == from_type;
                let widens = self.is_any_pointer(to_type)
                    && matches!(self.ctx.ty(from_type).kind, TypeKind::Pointer(_))
                    && !self.is_any_pointer(from_type);
                if !same && !widens {
                    return Ok(expr);
                }
            }
            return Ok(self.ctx.alloc_expr(Expr {
                location,
                type_,
                kind: ExprKind::Cast { expr },
            }));
        }

        Ok(expr)
    }

    fn integer_bounds(&self, type_: TypeId) -> (BigInt, BigInt) {
        match &self.ctx.ty(type_).kind {
            TypeKind::Byte => (BigInt::from(0), BigInt::from(255)),
            TypeKind::Int(int) => (int.min.clone(), int.max.clone()),
            _ => unreachable!("bounds of non-integer type"),
        }
    }

    pub(crate) fn is_any_pointer(&self, type_: TypeId) -> bool {
        match self.ctx.ty(type_).kind {
            TypeKind::Pointer(base) => matches!(self.ctx.ty(base).kind, TypeKind::Any),
            _ => false,
        }
    }

    // ===== Module resolution =====

    /// Resolve a parsed module end to end: namespace, imports, topological
    /// declaration order, struct pre-declaration and completion, and the
    /// deferred function-body queue.
    pub fn resolve(ctx: &'ctx mut Context, module: ModuleId) -> Result<(), Fatal> {
        let mut resolver = Resolver::new(ctx, module);
        let cst = resolver.ctx.module(module).cst.clone();
        debug!(
            path = resolver.ctx.name(resolver.ctx.module(module).path),
            "resolving module"
        );

        // Module namespace.
        if let Some(namespace) = &cst.namespace {
            resolver.enter_namespace(namespace)?;
        }

        // Imports merge into the module's own symbol table, so they stay
        // visible underneath any namespace.
        for import in &cst.imports {
            resolver.resolve_import(import)?;
        }

        let ordered = order_declarations(resolver.ctx, &cst)?;

        // Structs have their symbols created before all other declarations
        // so self- and cross-referential pointer members can resolve; the
        // bodies are completed later in topological order.
        for &index in &ordered {
            let decl = &cst.decls[index];
            if !matches!(decl.kind, cst::DeclKind::Struct(_)) {
                continue;
            }
            let symbol = resolver.resolve_decl_struct(decl)?;
            resolver.export_top_level(&cst, decl.name, symbol)?;
        }

        for &index in &ordered {
            let decl = &cst.decls[index];
            if let cst::DeclKind::Struct(_) = &decl.kind {
                let symbol = resolver
                    .ctx
                    .lookup_local(resolver.current_scope, decl.name)
                    .expect("struct was pre-declared");
                if matches!(resolver.ctx.symbol(symbol).kind, SymbolKind::Template(_)) {
                    continue;
                }
                resolver.complete_struct(symbol, decl)?;
                continue;
            }

            let symbol = resolver.resolve_decl(decl)?;
            resolver.export_top_level(&cst, decl.name, symbol)?;
        }

        // Complete queued function bodies. Instantiating a template during
        // completion may grow the queue, so index rather than iterate.
        let mut index = 0;
        while index < resolver.incomplete_functions.len() {
            let incomplete = &resolver.incomplete_functions[index];
            let (decl, function, scope) = (
                incomplete.decl.clone(),
                incomplete.function,
                incomplete.scope,
            );
            resolver.complete_function(&decl, function, scope)?;
            index += 1;
        }

        resolver.ctx.module_mut(module).loaded = true;
        Ok(())
    }

    /// Create or extend the namespace chain `a::b::c`, leaving the current
    /// scope, export scope, and static-address prefix inside it.
    fn enter_namespace(&mut self, namespace: &cst::Namespace) -> Result<(), Fatal> {
        let mut nsname: Option<Atom> = None;
        let mut nsaddr: Option<Atom> = None;
        for identifier in &namespace.identifiers {
            let name = identifier.name;
            nsname = Some(self.qualified_name(nsname, name));
            nsaddr = Some(self.qualified_addr(nsaddr, name));

            let module_table = self.ctx.new_scope(Some(self.current_scope));
            let export_table = self.ctx.new_scope(Some(self.current_export_scope));

            // Both symbols share the module-side table: everything the
            // module declares under the namespace is thereby exported.
            let module_symbol = self.ctx.alloc_symbol(sable_tir::Symbol {
                location: identifier.location,
                name: nsname.expect("set above"),
                kind: SymbolKind::Namespace(module_table),
            });
            let export_symbol = self.ctx.alloc_symbol(sable_tir::Symbol {
                location: identifier.location,
                name: nsname.expect("set above"),
                kind: SymbolKind::Namespace(module_table),
            });

            self.ctx
                .insert_symbol(self.current_scope, name, module_symbol)?;
            self.ctx
                .insert_symbol(self.current_export_scope, name, export_symbol)?;
            self.current_scope = module_table;
            self.current_export_scope = export_table;
        }

        self.static_addr_prefix = nsaddr;
        self.name_prefix = nsname;
        Ok(())
    }

    /// Without a namespace, top-level declarations are also visible under
    /// their bare names in the module's export table and the process-wide
    /// global table.
    fn export_top_level(
        &mut self,
        cst: &cst::Module,
        name: Atom,
        symbol: sable_tir::SymbolId,
    ) -> Result<(), Fatal> {
        if cst.namespace.is_some() {
            return Ok(());
        }
        let exports = self.ctx.module(self.module).exports;
        self.ctx.insert_symbol(exports, name, symbol)?;
        self.ctx
            .insert_symbol(self.ctx.global_scope, name, symbol)?;
        Ok(())
    }

    // ===== Symbol lookup =====

    /// Find the symbol named by a possibly-qualified CST symbol path,
    /// instantiating templates along the way.
    pub(crate) fn xget_symbol(
        &mut self,
        target: &cst::SymbolPath,
    ) -> Result<sable_tir::SymbolId, Fatal> {
        let element = &target.elements[0];
        let name = element.identifier.name;
        let scope = if target.is_from_root {
            self.ctx.module(self.module).symbols
        } else {
            self.current_scope
        };
        let mut lhs = self.ctx.lookup(scope, name).ok_or_else(|| {
            self.error(
                ErrorKind::UndeclaredIdentifier,
                target.location,
                format!("use of undeclared identifier `{}`", self.ctx.name(name)),
            )
        })?;
        if !element.template_arguments.is_empty() {
            lhs = self.instantiate_template(element.location, lhs, &element.template_arguments)?;
        }

        for element in &target.elements[1..] {
            let name = element.identifier.name;
            let lhs_symbol = self.ctx.symbol(lhs);
            let lhs_name = lhs_symbol.name;

            let member = match &lhs_symbol.kind {
                SymbolKind::Namespace(scope) => self.ctx.lookup_local(*scope, name),
                SymbolKind::Type(type_) => self.ctx.type_member_symbol(*type_, name),
                SymbolKind::Template(_) => {
                    return Err(self.error(
                        ErrorKind::Template,
                        element.location,
                        format!(
                            "template `{}` must be instantiated",
                            self.ctx.name(lhs_name)
                        ),
                    ));
                }
                _ => {
                    return Err(self.error(
                        ErrorKind::UndeclaredIdentifier,
                        element.location,
                        format!(
                            "`{}` is not a namespace or type",
                            self.ctx.name(lhs_name)
                        ),
                    ));
                }
            };
            let mut symbol = member.ok_or_else(|| {
                self.error(
                    ErrorKind::UndeclaredIdentifier,
                    element.location,
                    format!(
                        "use of undeclared identifier `{}` within `{}`",
                        self.ctx.name(name),
                        self.ctx.name(lhs_name)
                    ),
                )
            })?;
            if !element.template_arguments.is_empty() {
                symbol =
                    self.instantiate_template(element.location, symbol, &element.template_arguments)?;
            }
            lhs = symbol;
        }

        Ok(lhs)
    }

    // ===== Blocks and function completion =====

    pub(crate) fn resolve_block(
        &mut self,
        scope: ScopeId,
        block: &cst::Block,
    ) -> Result<sable_tir::BlockId, Fatal> {
        let save_scope = self.current_scope;
        let save_rbp_offset = self.current_rbp_offset;
        let save_defer = self.current_defer;
        self.current_scope = scope;

        let mut stmts = Vec::new();
        let mut result = Ok(());
        for stmt in &block.stmts {
            match self.resolve_stmt(stmt) {
                Ok(Some(stmt)) => stmts.push(stmt),
                Ok(None) => {}
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }

        let resolved = self.ctx.alloc_block(sable_tir::Block {
            location: block.location,
            scope,
            stmts,
            defer_begin: self.current_defer,
            defer_end: save_defer,
        });

        self.current_scope = save_scope;
        self.current_rbp_offset = save_rbp_offset;
        self.current_defer = save_defer;
        result.map(|()| resolved)
    }

    pub(crate) fn complete_function(
        &mut self,
        decl: &cst::Decl,
        function: FunctionId,
        scope: ScopeId,
    ) -> Result<(), Fatal> {
        let cst::DeclKind::Function(function_decl) = &decl.kind else {
            unreachable!("incomplete function queued from non-function declaration");
        };

        debug_assert!(self.current_function.is_none());
        debug_assert_eq!(self.current_rbp_offset, 0);
        debug_assert!(!self.is_within_loop);

        let save_prefix = self.static_addr_prefix;
        self.static_addr_prefix = Some(self.ctx.function(function).address.static_name());
        self.current_function = Some(function);
        let body = self.resolve_block(scope, &function_decl.body);
        self.static_addr_prefix = save_prefix;
        self.current_function = None;
        debug_assert_eq!(self.current_rbp_offset, 0);
        let body = body?;
        self.ctx.function_mut(function).body = Some(body);

        // A non-void-returning function must end with a textual return
        // statement; an exhaustive if/else is not accepted as a
        // terminator.
        let function_type = self.ctx.function(function).type_;
        let return_type = self
            .ctx
            .ty(function_type)
            .as_function()
            .expect("functions have function types")
            .return_type;
        if return_type != self.ctx.builtins.void_ {
            let stmts = &self.ctx.block(body).stmts;
            let ends_with_return = stmts.last().is_some_and(|&stmt| {
                matches!(self.ctx.stmt(stmt).kind, sable_tir::StmtKind::Return { .. })
            });
            if !ends_with_return {
                return Err(self.error(
                    ErrorKind::TypeMismatch,
                    decl.location,
                    "non-void-returning function does not end with a return statement",
                ));
            }
        }
        Ok(())
    }
}

pub(crate) fn ceil8(value: i64) -> i64 {
    (value + 7) & !7
}
