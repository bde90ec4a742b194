//! Declaration resolution.
//!
//! Every declaration kind follows the same shape: resolve the typespec,
//! resolve the initializer, apply the shallow implicit cast, check
//! compatibility, allocate storage, synthesize the symbol, insert it into
//! the current scope, and register it as static where applicable.

use crate::state::{ceil8, IncompleteFunction, Resolver};
use sable_common::{ErrorKind, Fatal};
use sable_eval::Evaluator;
use sable_parser::cst;
use sable_tir::{
    Address, Expr, ExprId, ExprKind, Function, Symbol, SymbolId, SymbolKind, TemplateSymbol,
};
use std::rc::Rc;
use tracing::trace;

impl Resolver<'_> {
    pub(crate) fn resolve_decl(&mut self, decl: &cst::Decl) -> Result<SymbolId, Fatal> {
        match &decl.kind {
            cst::DeclKind::Variable { .. } => {
                let (symbol, _) = self.resolve_decl_variable(decl)?;
                Ok(symbol)
            }
            cst::DeclKind::Constant { .. } => self.resolve_decl_constant(decl),
            cst::DeclKind::Function(_) => self.resolve_decl_function(decl),
            // Structs are resolved in the pre-declaration pass.
            cst::DeclKind::Struct(_) => unreachable!("struct declaration outside pre-declaration"),
            cst::DeclKind::Extend { .. } => self.resolve_decl_extend(decl),
            cst::DeclKind::Alias { .. } => self.resolve_decl_alias(decl),
            cst::DeclKind::ExternVariable { .. } => self.resolve_decl_extern_variable(decl),
            cst::DeclKind::ExternFunction { .. } => self.resolve_decl_extern_function(decl),
        }
    }

    /// Resolve a variable declaration. For local variables the returned
    /// pair carries the (lhs, rhs) expressions of the assignment statement
    /// the declaration lowers to; `uninit` initializers produce none.
    pub(crate) fn resolve_decl_variable(
        &mut self,
        decl: &cst::Decl,
    ) -> Result<(SymbolId, Option<(ExprId, ExprId)>), Fatal> {
        let cst::DeclKind::Variable {
            identifier,
            typespec,
            expr,
        } = &decl.kind
        else {
            unreachable!("caller checked the declaration kind");
        };

        if matches!(expr.kind, cst::ExprKind::Uninit) {
            let Some(typespec) = typespec else {
                return Err(self.error(
                    ErrorKind::Syntax,
                    decl.location,
                    "uninitialized variable declaration requires a type specification",
                ));
            };
            let type_ = self.resolve_typespec(typespec)?;
            if self.ctx.ty(type_).is_unsized() {
                return Err(self.error(
                    ErrorKind::Unsized,
                    decl.location,
                    format!(
                        "declaration of variable with unsized type `{}`",
                        self.type_name(type_)
                    ),
                ));
            }
            let is_static = self.is_global();
            let decl_name = self.ctx.name(decl.name).to_owned();
            let address = if is_static {
                self.reserve_storage_static(&decl_name)
            } else {
                self.reserve_storage_local(type_)
            };
            let symbol = self.ctx.alloc_symbol(Symbol {
                location: decl.location,
                name: decl.name,
                kind: SymbolKind::Variable {
                    type_,
                    address,
                    value: None,
                },
            });
            self.ctx.insert_symbol(self.current_scope, decl.name, symbol)?;
            if is_static {
                self.ctx.register_static_symbol(symbol)?;
            }
            return Ok((symbol, None));
        }

        let mut resolved = self.resolve_expr(expr)?;
        let type_ = match typespec {
            Some(typespec) => self.resolve_typespec(typespec)?,
            None => self.ctx.expr(resolved).type_,
        };
        if self.ctx.ty(type_).is_unsized() {
            return Err(self.error(
                ErrorKind::Unsized,
                decl.location,
                format!(
                    "declaration of variable with unsized type `{}`",
                    self.type_name(type_)
                ),
            ));
        }

        resolved = self.shallow_implicit_cast(type_, resolved)?;
        let resolved_location = self.ctx.expr(resolved).location;
        self.check_type_compatibility(resolved_location, self.ctx.expr(resolved).type_, type_)?;

        // Global variables have their initial values computed at compile
        // time; locals are assigned at runtime when the frame slot is
        // populated.
        let is_static = self.is_global();
        let value = if is_static {
            Some(Evaluator::new(self.ctx).eval_rvalue(resolved)?)
        } else {
            None
        };

        let decl_name = self.ctx.name(decl.name).to_owned();
        let address = if is_static {
            self.reserve_storage_static(&decl_name)
        } else {
            self.reserve_storage_local(type_)
        };

        let symbol = self.ctx.alloc_symbol(Symbol {
            location: decl.location,
            name: decl.name,
            kind: SymbolKind::Variable {
                type_,
                address,
                value,
            },
        });
        self.ctx.insert_symbol(self.current_scope, decl.name, symbol)?;
        if is_static {
            self.ctx.register_static_symbol(symbol)?;
        }

        let lhs = self.ctx.alloc_expr(Expr {
            location: identifier.location,
            type_,
            kind: ExprKind::Symbol(symbol),
        });
        Ok((symbol, Some((lhs, resolved))))
    }

    pub(crate) fn resolve_decl_constant(&mut self, decl: &cst::Decl) -> Result<SymbolId, Fatal> {
        let cst::DeclKind::Constant { typespec, expr, .. } = &decl.kind else {
            unreachable!("caller checked the declaration kind");
        };

        let save_within_const_decl = self.is_within_const_decl;
        self.is_within_const_decl = true;
        let result = self.resolve_decl_constant_inner(decl, typespec.as_ref(), expr);
        self.is_within_const_decl = save_within_const_decl;
        result
    }

    fn resolve_decl_constant_inner(
        &mut self,
        decl: &cst::Decl,
        typespec: Option<&cst::TypeSpec>,
        expr: &cst::Expr,
    ) -> Result<SymbolId, Fatal> {
        let mut resolved = self.resolve_expr(expr)?;
        let type_ = match typespec {
            Some(typespec) => self.resolve_typespec(typespec)?,
            None => self.ctx.expr(resolved).type_,
        };
        if self.ctx.ty(type_).is_unsized() {
            return Err(self.error(
                ErrorKind::Unsized,
                decl.location,
                format!(
                    "declaration of constant with unsized type `{}`",
                    self.type_name(type_)
                ),
            ));
        }

        resolved = self.shallow_implicit_cast(type_, resolved)?;
        let resolved_location = self.ctx.expr(resolved).location;
        self.check_type_compatibility(resolved_location, self.ctx.expr(resolved).type_, type_)?;

        // Constants always carry a compile-time value, local or not.
        let value = Evaluator::new(self.ctx).eval_rvalue(resolved)?;

        let decl_name = self.ctx.name(decl.name).to_owned();
        let address = self.reserve_storage_static(&decl_name);
        let symbol = self.ctx.alloc_symbol(Symbol {
            location: decl.location,
            name: decl.name,
            kind: SymbolKind::Constant {
                type_,
                address,
                value,
            },
        });
        self.ctx.insert_symbol(self.current_scope, decl.name, symbol)?;
        self.ctx.register_static_symbol(symbol)?;
        Ok(symbol)
    }

    pub(crate) fn resolve_decl_function(&mut self, decl: &cst::Decl) -> Result<SymbolId, Fatal> {
        let cst::DeclKind::Function(function_decl) = &decl.kind else {
            unreachable!("caller checked the declaration kind");
        };

        // Template functions defer everything to instantiation.
        if !function_decl.template_parameters.is_empty() {
            return self.declare_template(decl);
        }

        let mut parameter_types = Vec::with_capacity(function_decl.parameters.len());
        for parameter in &function_decl.parameters {
            let type_ = self.resolve_typespec(&parameter.typespec)?;
            if self.ctx.ty(type_).is_unsized() {
                return Err(self.error(
                    ErrorKind::Unsized,
                    parameter.typespec.location,
                    format!(
                        "declaration of function parameter with unsized type `{}`",
                        self.type_name(type_)
                    ),
                ));
            }
            parameter_types.push(type_);
        }

        let return_type = self.resolve_typespec(&function_decl.return_typespec)?;
        if self.ctx.ty(return_type).is_unsized() {
            return Err(self.error(
                ErrorKind::Unsized,
                function_decl.return_typespec.location,
                format!(
                    "declaration of function with unsized return type `{}`",
                    self.type_name(return_type)
                ),
            ));
        }

        let function_type = self.ctx.unique_function(&parameter_types, return_type);
        let decl_name = self.ctx.name(decl.name).to_owned();
        let address = self.reserve_storage_static(&decl_name);

        let function = self.ctx.alloc_function(Function {
            name: function_decl.identifier.name,
            type_: function_type,
            address,
            parameters: Vec::new(),
            return_symbol: None,
            scope: None,
            body: None,
            local_stack_offset: 0,
            is_extern: false,
        });

        // Insert the function before its body resolves so recursive calls
        // find it.
        let symbol = self.ctx.alloc_symbol(Symbol {
            location: decl.location,
            name: decl.name,
            kind: SymbolKind::Function(function),
        });
        self.ctx.insert_symbol(self.current_scope, decl.name, symbol)?;
        self.ctx.register_static_symbol(symbol)?;

        // A call pushes the return address and the prologue saves rbp, so
        // parameters start 16 bytes above the frame pointer. Parameters are
        // laid out from the rightmost at the lowest address.
        let mut rbp_offset: i64 = 0x10;
        let mut parameters = vec![None; function_decl.parameters.len()];
        for (index, parameter) in function_decl.parameters.iter().enumerate().rev() {
            let type_ = parameter_types[index];
            let address = Address::new_local(rbp_offset);
            rbp_offset += ceil8(self.ctx.ty(type_).size.expect("sized parameter") as i64);
            let parameter_symbol = self.ctx.alloc_symbol(Symbol {
                location: parameter.location,
                name: parameter.identifier.name,
                kind: SymbolKind::Variable {
                    type_,
                    address,
                    value: None,
                },
            });
            parameters[index] = Some(parameter_symbol);
        }
        let parameters: Vec<SymbolId> = parameters
            .into_iter()
            .map(|symbol| symbol.expect("every parameter slot is filled"))
            .collect();

        // Insert parameters left to right so a duplicate-name diagnostic
        // cites the leftmost declaration as the earlier site.
        let scope = self.ctx.new_scope(Some(self.current_scope));
        for (parameter, symbol) in function_decl.parameters.iter().zip(&parameters) {
            self.ctx
                .insert_symbol(scope, parameter.identifier.name, *symbol)?;
        }

        // The return slot lives above the parameters.
        let return_symbol = self.ctx.alloc_symbol(Symbol {
            location: function_decl.return_typespec.location,
            name: self.ctx.interned.return_,
            kind: SymbolKind::Variable {
                type_: return_type,
                address: Address::new_local(rbp_offset),
                value: None,
            },
        });
        let return_name = self.ctx.interned.return_;
        self.ctx.insert_symbol(scope, return_name, return_symbol)?;

        let function_mut = self.ctx.function_mut(function);
        function_mut.parameters = parameters;
        function_mut.return_symbol = Some(return_symbol);
        function_mut.scope = Some(scope);

        self.incomplete_functions.push(IncompleteFunction {
            decl: Rc::new(decl.clone()),
            function,
            scope,
        });

        Ok(symbol)
    }

    pub(crate) fn resolve_decl_struct(&mut self, decl: &cst::Decl) -> Result<SymbolId, Fatal> {
        let cst::DeclKind::Struct(struct_decl) = &decl.kind else {
            unreachable!("caller checked the declaration kind");
        };

        if !struct_decl.template_parameters.is_empty() {
            return self.declare_template(decl);
        }

        let member_scope = self.ctx.new_scope(Some(self.current_scope));
        let prefix = self.name_prefix;
        let type_name = self.qualified_name(prefix, decl.name);
        let type_ = self.ctx.new_struct_type(type_name, member_scope);

        let symbol = self.ctx.alloc_symbol(Symbol {
            location: decl.location,
            name: decl.name,
            kind: SymbolKind::Type(type_),
        });
        // Insert before completion so self-referential pointer and slice
        // members resolve.
        self.ctx.insert_symbol(self.current_scope, decl.name, symbol)?;

        // Duplicate member definitions are diagnosed up front, before any
        // member resolution runs.
        for (i, member) in struct_decl.members.iter().enumerate() {
            for later in &struct_decl.members[i + 1..] {
                if member.name == later.name {
                    return Err(self.error(
                        ErrorKind::Redeclaration,
                        later.location,
                        format!(
                            "duplicate definition of member `{}`",
                            self.ctx.name(later.name)
                        ),
                    ));
                }
            }
        }

        Ok(symbol)
    }

    /// Fill in a pre-declared struct's member list and member symbol
    /// table. Members resolve with the struct's mangled name as the
    /// static-address prefix.
    pub(crate) fn complete_struct(
        &mut self,
        symbol: SymbolId,
        decl: &cst::Decl,
    ) -> Result<(), Fatal> {
        let cst::DeclKind::Struct(struct_decl) = &decl.kind else {
            unreachable!("caller checked the declaration kind");
        };
        let SymbolKind::Type(type_) = self.ctx.symbol(symbol).kind else {
            unreachable!("struct symbol is a type symbol");
        };
        let already_complete = self
            .ctx
            .ty(type_)
            .as_struct()
            .is_some_and(|struct_| struct_.is_complete);
        if already_complete {
            return Err(self.error(
                ErrorKind::Internal,
                decl.location,
                format!(
                    "struct `{}` completed twice",
                    self.ctx.name(decl.name)
                ),
            ));
        }
        trace!(name = self.ctx.name(decl.name), "completing struct");

        let member_scope = self
            .ctx
            .ty(type_)
            .member_scope
            .expect("struct types carry a member scope");

        let save_addr_prefix = self.static_addr_prefix;
        let save_scope = self.current_scope;
        let type_name = self.type_name(type_).to_owned();
        self.static_addr_prefix = Some(self.normalize(None, &type_name, 0));
        self.current_scope = member_scope;

        let mut result = Ok(());
        for member in &struct_decl.members {
            match &member.kind {
                cst::MemberKind::Variable { typespec } => {
                    let member_type = match self.resolve_typespec(typespec) {
                        Ok(member_type) => member_type,
                        Err(err) => {
                            result = Err(err);
                            break;
                        }
                    };
                    if self.ctx.ty(member_type).is_unsized() {
                        result = Err(self.error(
                            ErrorKind::Unsized,
                            typespec.location,
                            format!(
                                "declaration of member variable with unsized type `{}`",
                                self.type_name(member_type)
                            ),
                        ));
                        break;
                    }
                    self.ctx
                        .struct_add_member_variable(type_, member.name, member_type);
                }
                cst::MemberKind::Constant(decl) => {
                    if let Err(err) = self.resolve_decl_constant(decl) {
                        result = Err(err);
                        break;
                    }
                }
                cst::MemberKind::Function(decl) => {
                    if let Err(err) = self.resolve_decl_function(decl) {
                        result = Err(err);
                        break;
                    }
                }
            }
        }

        self.static_addr_prefix = save_addr_prefix;
        self.current_scope = save_scope;
        result?;

        self.ctx.struct_finalize(type_);
        Ok(())
    }

    /// `extend T <decl>` attaches a constant or function to an existing
    /// type's member table.
    pub(crate) fn resolve_decl_extend(&mut self, decl: &cst::Decl) -> Result<SymbolId, Fatal> {
        let cst::DeclKind::Extend {
            typespec,
            decl: inner,
        } = &decl.kind
        else {
            unreachable!("caller checked the declaration kind");
        };

        if !matches!(
            inner.kind,
            cst::DeclKind::Constant { .. } | cst::DeclKind::Function(_)
        ) {
            return Err(self.error(
                ErrorKind::Syntax,
                decl.location,
                "type extension declaration must be a constant or function",
            ));
        }

        let type_ = self.resolve_typespec(typespec)?;

        // The declaration resolves inside a scope of its own so the new
        // symbol is hidden from the rest of the module.
        let hidden_scope = self.ctx.new_scope(Some(self.current_scope));

        let save_addr_prefix = self.static_addr_prefix;
        let save_scope = self.current_scope;
        let type_name = self.type_name(type_).to_owned();
        self.static_addr_prefix = Some(self.normalize(None, &type_name, 0));
        self.current_scope = hidden_scope;
        let symbol = self.resolve_decl(inner);
        self.static_addr_prefix = save_addr_prefix;
        self.current_scope = save_scope;
        let symbol = symbol?;

        let member_scope = self.ctx.type_member_scope(type_);
        self.ctx.insert_symbol(member_scope, inner.name, symbol)?;
        Ok(symbol)
    }

    pub(crate) fn resolve_decl_alias(&mut self, decl: &cst::Decl) -> Result<SymbolId, Fatal> {
        let cst::DeclKind::Alias { typespec, .. } = &decl.kind else {
            unreachable!("caller checked the declaration kind");
        };
        let type_ = self.resolve_typespec(typespec)?;
        let symbol = self.ctx.alloc_symbol(Symbol {
            location: decl.location,
            name: decl.name,
            kind: SymbolKind::Type(type_),
        });
        self.ctx.insert_symbol(self.current_scope, decl.name, symbol)?;
        Ok(symbol)
    }

    pub(crate) fn resolve_decl_extern_variable(
        &mut self,
        decl: &cst::Decl,
    ) -> Result<SymbolId, Fatal> {
        let cst::DeclKind::ExternVariable { typespec, .. } = &decl.kind else {
            unreachable!("caller checked the declaration kind");
        };
        debug_assert!(self.is_global());

        let type_ = self.resolve_typespec(typespec)?;
        if self.ctx.ty(type_).is_unsized() {
            return Err(self.error(
                ErrorKind::Unsized,
                typespec.location,
                format!(
                    "declaration of extern variable with unsized type `{}`",
                    self.type_name(type_)
                ),
            ));
        }

        let decl_name = self.ctx.name(decl.name).to_owned();
        let address = self.reserve_storage_static(&decl_name);
        let symbol = self.ctx.alloc_symbol(Symbol {
            location: decl.location,
            name: decl.name,
            kind: SymbolKind::Variable {
                type_,
                address,
                value: None,
            },
        });
        self.ctx.insert_symbol(self.current_scope, decl.name, symbol)?;
        self.ctx.register_static_symbol(symbol)?;
        Ok(symbol)
    }

    pub(crate) fn resolve_decl_extern_function(
        &mut self,
        decl: &cst::Decl,
    ) -> Result<SymbolId, Fatal> {
        let cst::DeclKind::ExternFunction {
            identifier,
            parameters,
            return_typespec,
        } = &decl.kind
        else {
            unreachable!("caller checked the declaration kind");
        };
        debug_assert!(self.is_global());

        let mut parameter_types = Vec::with_capacity(parameters.len());
        for parameter in parameters {
            let type_ = self.resolve_typespec(&parameter.typespec)?;
            if self.ctx.ty(type_).is_unsized() {
                return Err(self.error(
                    ErrorKind::Unsized,
                    parameter.typespec.location,
                    format!(
                        "declaration of function parameter with unsized type `{}`",
                        self.type_name(type_)
                    ),
                ));
            }
            parameter_types.push(type_);
        }
        let return_type = self.resolve_typespec(return_typespec)?;
        if self.ctx.ty(return_type).is_unsized() {
            return Err(self.error(
                ErrorKind::Unsized,
                return_typespec.location,
                format!(
                    "declaration of function with unsized return type `{}`",
                    self.type_name(return_type)
                ),
            ));
        }

        let function_type = self.ctx.unique_function(&parameter_types, return_type);
        let decl_name = self.ctx.name(decl.name).to_owned();
        let address = self.reserve_storage_static(&decl_name);
        let function = self.ctx.alloc_function(Function {
            name: identifier.name,
            type_: function_type,
            address,
            parameters: Vec::new(),
            return_symbol: None,
            scope: None,
            body: None,
            local_stack_offset: 0,
            is_extern: true,
        });
        let symbol = self.ctx.alloc_symbol(Symbol {
            location: decl.location,
            name: decl.name,
            kind: SymbolKind::Function(function),
        });
        self.ctx.insert_symbol(self.current_scope, decl.name, symbol)?;
        self.ctx.register_static_symbol(symbol)?;
        Ok(symbol)
    }

    /// Declare a template symbol carrying the original CST; resolution of
    /// the body waits for the first instantiation.
    fn declare_template(&mut self, decl: &cst::Decl) -> Result<SymbolId, Fatal> {
        let instances = self.ctx.new_scope(None);
        let symbol = self.ctx.alloc_symbol(Symbol {
            location: decl.location,
            name: decl.name,
            kind: SymbolKind::Template(TemplateSymbol {
                decl: Rc::new(decl.clone()),
                addr_prefix: self.static_addr_prefix,
                name_prefix: self.name_prefix,
                parent_scope: self.current_scope,
                instances,
            }),
        });
        self.ctx.insert_symbol(self.current_scope, decl.name, symbol)?;
        Ok(symbol)
    }
}
