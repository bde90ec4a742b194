//! Statement resolution.
//!
//! Statements only appear inside function bodies. Local variable
//! declarations lower to assignment statements; local constants and
//! aliases produce no statement at all.

use crate::state::Resolver;
use sable_common::{ErrorKind, Fatal};
use sable_parser::cst;
use sable_tir::{Conditional, Expr, ExprKind, Stmt, StmtId, StmtKind, Symbol, SymbolKind, TypeKind};

impl Resolver<'_> {
    pub(crate) fn resolve_stmt(&mut self, stmt: &cst::Stmt) -> Result<Option<StmtId>, Fatal> {
        debug_assert!(!self.is_global());
        match &stmt.kind {
            cst::StmtKind::Decl(decl) => self.resolve_stmt_decl(stmt, decl),
            cst::StmtKind::Defer(block) => self.resolve_stmt_defer(stmt, block).map(Some),
            cst::StmtKind::If(conditionals) => self.resolve_stmt_if(conditionals).map(Some),
            cst::StmtKind::ForRange {
                identifier,
                begin,
                end,
                body,
            } => self
                .resolve_stmt_for_range(stmt, identifier, begin.as_ref(), end, body)
                .map(Some),
            cst::StmtKind::ForExpr { expr, body } => {
                self.resolve_stmt_for_expr(stmt, expr, body).map(Some)
            }
            cst::StmtKind::Break => {
                if !self.is_within_loop {
                    return Err(self.error(
                        ErrorKind::Syntax,
                        stmt.location,
                        "break statement outside of loop",
                    ));
                }
                Ok(Some(self.ctx.alloc_stmt(Stmt {
                    location: stmt.location,
                    kind: StmtKind::Break {
                        defer: self.current_defer,
                        loop_defer: self.current_loop_defer,
                    },
                })))
            }
            cst::StmtKind::Continue => {
                if !self.is_within_loop {
                    return Err(self.error(
                        ErrorKind::Syntax,
                        stmt.location,
                        "continue statement outside of loop",
                    ));
                }
                Ok(Some(self.ctx.alloc_stmt(Stmt {
                    location: stmt.location,
                    kind: StmtKind::Continue {
                        defer: self.current_defer,
                        loop_defer: self.current_loop_defer,
                    },
                })))
            }
            cst::StmtKind::Dump(expr) => {
                let resolved = self.resolve_expr(expr)?;
                let type_ = self.ctx.expr(resolved).type_;
                if self.ctx.ty(type_).is_unsized() {
                    return Err(self.error(
                        ErrorKind::Unsized,
                        stmt.location,
                        format!("type `{}` has no defined size", self.type_name(type_)),
                    ));
                }
                Ok(Some(self.ctx.alloc_stmt(Stmt {
                    location: stmt.location,
                    kind: StmtKind::Dump { expr: resolved },
                })))
            }
            cst::StmtKind::Return(expr) => self.resolve_stmt_return(stmt, expr.as_ref()).map(Some),
            cst::StmtKind::Assign { lhs, rhs } => {
                self.resolve_stmt_assign(stmt, lhs, rhs).map(Some)
            }
            cst::StmtKind::Expr(expr) => {
                let resolved = self.resolve_expr(expr)?;
                let type_ = self.ctx.expr(resolved).type_;
                if self.ctx.ty(type_).is_unsized() {
                    return Err(self.error(
                        ErrorKind::Unsized,
                        self.ctx.expr(resolved).location,
                        format!(
                            "statement-expression produces result of unsized type `{}`",
                            self.type_name(type_)
                        ),
                    ));
                }
                Ok(Some(self.ctx.alloc_stmt(Stmt {
                    location: stmt.location,
                    kind: StmtKind::Expr(resolved),
                })))
            }
        }
    }

    fn resolve_stmt_decl(
        &mut self,
        stmt: &cst::Stmt,
        decl: &cst::Decl,
    ) -> Result<Option<StmtId>, Fatal> {
        match &decl.kind {
            cst::DeclKind::Variable { .. } => {
                let (_, assign) = self.resolve_decl_variable(decl)?;
                // An `uninit` local reserves its slot without an
                // initializing store.
                Ok(assign.map(|(lhs, rhs)| {
                    self.ctx.alloc_stmt(Stmt {
                        location: stmt.location,
                        kind: StmtKind::Assign { lhs, rhs },
                    })
                }))
            }
            cst::DeclKind::Constant { .. } => {
                self.resolve_decl_constant(decl)?;
                Ok(None)
            }
            cst::DeclKind::Alias { .. } => {
                self.resolve_decl_alias(decl)?;
                Ok(None)
            }
            cst::DeclKind::Function(_) => Err(self.error(
                ErrorKind::Syntax,
                stmt.location,
                "nested function declaration",
            )),
            cst::DeclKind::Struct(_) => Err(self.error(
                ErrorKind::Syntax,
                decl.location,
                format!(
                    "local declaration of struct `{}`",
                    self.ctx.name(decl.name)
                ),
            )),
            cst::DeclKind::Extend { .. } => Err(self.error(
                ErrorKind::Syntax,
                decl.location,
                format!(
                    "local declaration of type extension `{}`",
                    self.ctx.name(decl.name)
                ),
            )),
            cst::DeclKind::ExternVariable { .. } => Err(self.error(
                ErrorKind::Syntax,
                decl.location,
                format!(
                    "local declaration of extern variable `{}`",
                    self.ctx.name(decl.name)
                ),
            )),
            cst::DeclKind::ExternFunction { .. } => Err(self.error(
                ErrorKind::Syntax,
                decl.location,
                format!(
                    "local declaration of extern function `{}`",
                    self.ctx.name(decl.name)
                ),
            )),
        }
    }

    /// A defer statement becomes a chain node; the statement itself is a
    /// no-op at its textual position and the chain is consumed by
    /// break/continue/return and block exits.
    fn resolve_stmt_defer(&mut self, stmt: &cst::Stmt, block: &cst::Block) -> Result<StmtId, Fatal> {
        let scope = self.ctx.new_scope(Some(self.current_scope));
        let body = self.resolve_block(scope, block)?;

        let resolved = self.ctx.alloc_stmt(Stmt {
            location: stmt.location,
            kind: StmtKind::Defer {
                prev: self.current_defer,
                body,
            },
        });
        self.current_defer = Some(resolved);
        Ok(resolved)
    }

    fn resolve_stmt_if(&mut self, conditionals: &[cst::Conditional]) -> Result<StmtId, Fatal> {
        let mut resolved_conditionals = Vec::with_capacity(conditionals.len());
        for conditional in conditionals {
            let condition = match &conditional.condition {
                Some(condition) => {
                    let resolved = self.resolve_expr(condition)?;
                    let type_ = self.ctx.expr(resolved).type_;
                    if !matches!(self.ctx.ty(type_).kind, TypeKind::Bool) {
                        return Err(self.error(
                            ErrorKind::TypeMismatch,
                            self.ctx.expr(resolved).location,
                            format!(
                                "illegal condition with non-boolean type `{}`",
                                self.type_name(type_)
                            ),
                        ));
                    }
                    Some(resolved)
                }
                None => None,
            };

            let scope = self.ctx.new_scope(Some(self.current_scope));
            let body = self.resolve_block(scope, &conditional.body)?;
            resolved_conditionals.push(Conditional {
                location: conditional.location,
                condition,
                body,
            });
        }

        Ok(self.ctx.alloc_stmt(Stmt {
            location: resolved_conditionals[0].location,
            kind: StmtKind::If {
                conditionals: resolved_conditionals,
            },
        }))
    }

    fn resolve_stmt_for_range(
        &mut self,
        stmt: &cst::Stmt,
        identifier: &cst::Identifier,
        begin: Option<&cst::Expr>,
        end: &cst::Expr,
        body: &cst::Block,
    ) -> Result<StmtId, Fatal> {
        let usize_ = self.ctx.builtins.usize_;

        let begin = match begin {
            Some(begin) => {
                let mut resolved = self.resolve_expr(begin)?;
                resolved = self.shallow_implicit_cast(usize_, resolved)?;
                let type_ = self.ctx.expr(resolved).type_;
                if type_ != usize_ {
                    return Err(self.error(
                        ErrorKind::TypeMismatch,
                        self.ctx.expr(resolved).location,
                        format!(
                            "illegal range-begin-expression with non-usize type `{}`",
                            self.type_name(type_)
                        ),
                    ));
                }
                resolved
            }
            None => self.ctx.alloc_expr(Expr {
                location: stmt.location,
                type_: usize_,
                kind: ExprKind::Integer(0.into()),
            }),
        };

        let mut end = self.resolve_expr(end)?;
        end = self.shallow_implicit_cast(usize_, end)?;
        let end_type = self.ctx.expr(end).type_;
        if end_type != usize_ {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                self.ctx.expr(end).location,
                format!(
                    "illegal range-end-expression with non-usize type `{}`",
                    self.type_name(end_type)
                ),
            ));
        }

        // The loop variable lives in a fresh scope of its own so sibling
        // statements never see it.
        let save_rbp_offset = self.current_rbp_offset;
        let address = self.reserve_storage_local(usize_);
        let loop_variable = self.ctx.alloc_symbol(Symbol {
            location: identifier.location,
            name: identifier.name,
            kind: SymbolKind::Variable {
                type_: usize_,
                address,
                value: None,
            },
        });
        let scope = self.ctx.new_scope(Some(self.current_scope));
        self.ctx.insert_symbol(scope, identifier.name, loop_variable)?;

        let save_is_within_loop = self.is_within_loop;
        let save_loop_defer = self.current_loop_defer;
        self.is_within_loop = true;
        self.current_loop_defer = self.current_defer;
        let body = self.resolve_block(scope, body);
        self.current_rbp_offset = save_rbp_offset;
        self.is_within_loop = save_is_within_loop;
        self.current_loop_defer = save_loop_defer;
        let body = body?;

        Ok(self.ctx.alloc_stmt(Stmt {
            location: stmt.location,
            kind: StmtKind::ForRange {
                loop_variable,
                begin,
                end,
                body,
            },
        }))
    }

    fn resolve_stmt_for_expr(
        &mut self,
        stmt: &cst::Stmt,
        expr: &cst::Expr,
        body: &cst::Block,
    ) -> Result<StmtId, Fatal> {
        let condition = self.resolve_expr(expr)?;
        let type_ = self.ctx.expr(condition).type_;
        if !matches!(self.ctx.ty(type_).kind, TypeKind::Bool) {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                self.ctx.expr(condition).location,
                format!(
                    "illegal condition with non-boolean type `{}`",
                    self.type_name(type_)
                ),
            ));
        }

        let scope = self.ctx.new_scope(Some(self.current_scope));
        let save_is_within_loop = self.is_within_loop;
        let save_loop_defer = self.current_loop_defer;
        self.is_within_loop = true;
        self.current_loop_defer = self.current_defer;
        let body = self.resolve_block(scope, body);
        self.is_within_loop = save_is_within_loop;
        self.current_loop_defer = save_loop_defer;
        let body = body?;

        Ok(self.ctx.alloc_stmt(Stmt {
            location: stmt.location,
            kind: StmtKind::ForExpr { condition, body },
        }))
    }

    fn resolve_stmt_return(
        &mut self,
        stmt: &cst::Stmt,
        expr: Option<&cst::Expr>,
    ) -> Result<StmtId, Fatal> {
        let function = self
            .current_function
            .expect("return statement inside a function");
        let function_type = self.ctx.function(function).type_;
        let return_type = self
            .ctx
            .ty(function_type)
            .as_function()
            .expect("functions have function types")
            .return_type;

        let resolved = match expr {
            Some(expr) => {
                let mut resolved = self.resolve_expr(expr)?;
                resolved = self.shallow_implicit_cast(return_type, resolved)?;
                let location = self.ctx.expr(resolved).location;
                self.check_type_compatibility(
                    location,
                    self.ctx.expr(resolved).type_,
                    return_type,
                )?;
                Some(resolved)
            }
            None => {
                if return_type != self.ctx.builtins.void_ {
                    return Err(self.error(
                        ErrorKind::TypeMismatch,
                        stmt.location,
                        "illegal return statement in function with non-void return type",
                    ));
                }
                None
            }
        };

        Ok(self.ctx.alloc_stmt(Stmt {
            location: stmt.location,
            kind: StmtKind::Return {
                expr: resolved,
                defer: self.current_defer,
            },
        }))
    }

    fn resolve_stmt_assign(
        &mut self,
        stmt: &cst::Stmt,
        lhs: &cst::Expr,
        rhs: &cst::Expr,
    ) -> Result<StmtId, Fatal> {
        let lhs = self.resolve_expr(lhs)?;
        let mut rhs = self.resolve_expr(rhs)?;

        if !self.ctx.expr_is_lvalue(lhs) {
            return Err(self.error(
                ErrorKind::Lvalue,
                self.ctx.expr(lhs).location,
                "left hand side of assignment statement is not an lvalue",
            ));
        }

        let lhs_type = self.ctx.expr(lhs).type_;
        rhs = self.shallow_implicit_cast(lhs_type, rhs)?;
        self.check_type_compatibility(stmt.location, self.ctx.expr(rhs).type_, lhs_type)?;

        Ok(self.ctx.alloc_stmt(Stmt {
            location: stmt.location,
            kind: StmtKind::Assign { lhs, rhs },
        }))
    }
}
