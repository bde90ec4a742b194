//! Expression resolution.
//!
//! Every routine here produces a typed IR expression. Operator dispatch
//! mirrors the categories of the type system: logical operators want
//! booleans, arithmetic wants integers, bitwise wants a bit
//! representation, and comparisons want a comparable type. Binary and
//! unary operations over integer literal operands are folded to literals
//! during resolution.

use crate::state::Resolver;
use num_bigint::BigInt;
use sable_common::{Atom, ErrorKind, Fatal, SourceLocation};
use sable_eval::Evaluator;
use sable_parser::cst::{self, BinaryOp, UnaryOp};
use sable_tir::{Expr, ExprId, ExprKind, Symbol, SymbolKind, TypeId, TypeKind, Value};

impl Resolver<'_> {
    pub(crate) fn resolve_expr(&mut self, expr: &cst::Expr) -> Result<ExprId, Fatal> {
        match &expr.kind {
            cst::ExprKind::Symbol(symbol) => self.resolve_expr_symbol(expr, symbol),
            cst::ExprKind::Boolean(value) => Ok(self.new_boolean_expr(expr.location, *value)),
            cst::ExprKind::Integer { value, suffix } => {
                let type_ = self.integer_literal_suffix_to_type(expr.location, *suffix)?;
                self.new_integer_expr(expr.location, type_, value.clone())
            }
            cst::ExprKind::Character(c) => {
                let type_ = self.ctx.builtins.integer;
                self.new_integer_expr(expr.location, type_, BigInt::from(*c as u32))
            }
            cst::ExprKind::Bytes(bytes) => self.resolve_expr_bytes(expr.location, bytes),
            cst::ExprKind::Uninit => Err(self.error(
                ErrorKind::Syntax,
                expr.location,
                "`uninit` is only valid as a variable initializer",
            )),
            cst::ExprKind::ArrayList {
                typespec,
                elements,
                ellipsis,
            } => self.resolve_expr_array_list(expr, typespec, elements, ellipsis.as_deref()),
            cst::ExprKind::SliceList { typespec, elements } => {
                self.resolve_expr_slice_list(expr, typespec, elements)
            }
            cst::ExprKind::Slice {
                typespec,
                pointer,
                count,
            } => self.resolve_expr_slice(expr, typespec, pointer, count),
            cst::ExprKind::Struct {
                typespec,
                initializers,
            } => self.resolve_expr_struct(expr, typespec, initializers),
            cst::ExprKind::Cast { typespec, expr: rhs } => {
                self.resolve_expr_cast(expr, typespec, rhs)
            }
            cst::ExprKind::Grouped(inner) => self.resolve_expr(inner),
            cst::ExprKind::Syscall(arguments) => self.resolve_expr_syscall(expr, arguments),
            cst::ExprKind::Call { func, arguments } => {
                self.resolve_expr_call(expr, func, arguments)
            }
            cst::ExprKind::AccessIndex { lhs, idx } => {
                self.resolve_expr_access_index(expr, lhs, idx)
            }
            cst::ExprKind::AccessSlice { lhs, begin, end } => {
                self.resolve_expr_access_slice(expr, lhs, begin, end)
            }
            cst::ExprKind::AccessMember { lhs, member } => {
                self.resolve_expr_access_member(expr, lhs, member)
            }
            cst::ExprKind::AccessDereference { lhs } => {
                let resolved = self.resolve_expr(lhs)?;
                self.new_dereference_expr(expr.location, resolved)
            }
            cst::ExprKind::Sizeof(typespec) => {
                let operand = self.resolve_typespec(typespec)?;
                let Some(_) = self.ctx.ty(operand).size else {
                    return Err(self.error(
                        ErrorKind::Unsized,
                        expr.location,
                        format!("type `{}` has no defined size", self.type_name(operand)),
                    ));
                };
                Ok(self.ctx.alloc_expr(Expr {
                    location: expr.location,
                    type_: self.ctx.builtins.usize_,
                    kind: ExprKind::Sizeof { operand },
                }))
            }
            cst::ExprKind::Alignof(typespec) => {
                let operand = self.resolve_typespec(typespec)?;
                let Some(_) = self.ctx.ty(operand).align else {
                    return Err(self.error(
                        ErrorKind::Unsized,
                        expr.location,
                        format!(
                            "type `{}` has no defined alignment",
                            self.type_name(operand)
                        ),
                    ));
                };
                Ok(self.ctx.alloc_expr(Expr {
                    location: expr.location,
                    type_: self.ctx.builtins.usize_,
                    kind: ExprKind::Alignof { operand },
                }))
            }
            cst::ExprKind::Unary {
                op,
                op_location,
                rhs,
            } => self.resolve_expr_unary(*op, *op_location, rhs),
            cst::ExprKind::Binary {
                op,
                op_location,
                lhs,
                rhs,
            } => self.resolve_expr_binary(*op, *op_location, lhs, rhs),
        }
    }

    fn new_boolean_expr(&mut self, location: SourceLocation, value: bool) -> ExprId {
        self.ctx.alloc_expr(Expr {
            location,
            type_: self.ctx.builtins.bool_,
            kind: ExprKind::Boolean(value),
        })
    }

    fn new_dereference_expr(
        &mut self,
        location: SourceLocation,
        rhs: ExprId,
    ) -> Result<ExprId, Fatal> {
        let rhs_type = self.ctx.expr(rhs).type_;
        let TypeKind::Pointer(base) = self.ctx.ty(rhs_type).kind else {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                self.ctx.expr(rhs).location,
                format!(
                    "cannot dereference non-pointer type `{}`",
                    self.type_name(rhs_type)
                ),
            ));
        };
        Ok(self.ctx.alloc_expr(Expr {
            location,
            type_: base,
            kind: ExprKind::Unary {
                op: UnaryOp::Dereference,
                rhs,
            },
        }))
    }

    pub(crate) fn integer_literal_suffix_to_type(
        &self,
        location: SourceLocation,
        suffix: Atom,
    ) -> Result<TypeId, Fatal> {
        let interned = &self.ctx.interned;
        let builtins = &self.ctx.builtins;
        let type_ = if suffix == interned.empty {
            builtins.integer
        } else if suffix == interned.y {
            builtins.byte
        } else if suffix == interned.u8_ {
            builtins.u8_
        } else if suffix == interned.s8_ {
            builtins.s8_
        } else if suffix == interned.u16_ {
            builtins.u16_
        } else if suffix == interned.s16_ {
            builtins.s16_
        } else if suffix == interned.u32_ {
            builtins.u32_
        } else if suffix == interned.s32_ {
            builtins.s32_
        } else if suffix == interned.u64_ {
            builtins.u64_
        } else if suffix == interned.s64_ {
            builtins.s64_
        } else if suffix == interned.u {
            builtins.usize_
        } else if suffix == interned.s {
            builtins.ssize_
        } else {
            // The scanner validates suffixes; anything else slipped past
            // it.
            return Err(self.error(
                ErrorKind::Internal,
                location,
                format!(
                    "unknown integer literal suffix `{}`",
                    self.ctx.name(suffix)
                ),
            ));
        };
        Ok(type_)
    }

    fn resolve_expr_symbol(
        &mut self,
        expr: &cst::Expr,
        path: &cst::SymbolPath,
    ) -> Result<ExprId, Fatal> {
        let symbol = self.xget_symbol(path)?;
        let name = self.ctx.symbol(symbol).name;
        match &self.ctx.symbol(symbol).kind {
            SymbolKind::Type(_) => Err(self.error(
                ErrorKind::TypeMismatch,
                expr.location,
                format!("use of type `{}` as an expression", self.ctx.name(name)),
            )),
            SymbolKind::Template(_) => Err(self.error(
                ErrorKind::Template,
                expr.location,
                format!(
                    "use of template `{}` as an expression",
                    self.ctx.name(name)
                ),
            )),
            SymbolKind::Namespace(_) => Err(self.error(
                ErrorKind::TypeMismatch,
                expr.location,
                format!(
                    "use of namespace `{}` as an expression",
                    self.ctx.name(name)
                ),
            )),
            SymbolKind::Variable { .. } | SymbolKind::Constant { .. } | SymbolKind::Function(_) => {
                let type_ = self
                    .ctx
                    .symbol(symbol)
                    .type_of(self.ctx.functions())
                    .expect("value symbols are typed");
                Ok(self.ctx.alloc_expr(Expr {
                    location: expr.location,
                    type_,
                    kind: ExprKind::Symbol(symbol),
                }))
            }
        }
    }

    /// A bytes literal becomes a hidden NUL-terminated static byte array
    /// plus a `[]byte` expression over it; the NUL is excluded from the
    /// count.
    fn resolve_expr_bytes(
        &mut self,
        location: SourceLocation,
        bytes: &str,
    ) -> Result<ExprId, Fatal> {
        let address = self.reserve_storage_static("__bytes");
        let count = bytes.len() as u64;
        let array_type = self.ctx.unique_array(count + 1, self.ctx.builtins.byte);

        let mut elements: Vec<Value> = bytes.bytes().map(Value::Byte).collect();
        elements.push(Value::Byte(0x00));
        let value = Value::Array {
            type_: array_type,
            elements,
        };

        let symbol = self.ctx.alloc_symbol(Symbol {
            location,
            name: address.static_name(),
            kind: SymbolKind::Constant {
                type_: array_type,
                address,
                value,
            },
        });
        self.ctx.register_static_symbol(symbol)?;

        let slice_type = self.ctx.unique_slice(self.ctx.builtins.byte);
        Ok(self.ctx.alloc_expr(Expr {
            location,
            type_: slice_type,
            kind: ExprKind::Bytes { address, count },
        }))
    }

    fn resolve_expr_array_list(
        &mut self,
        expr: &cst::Expr,
        typespec: &cst::TypeSpec,
        elements: &[cst::Expr],
        ellipsis: Option<&cst::Expr>,
    ) -> Result<ExprId, Fatal> {
        let type_ = self.resolve_typespec(typespec)?;
        let Some(array) = self.ctx.ty(type_).as_array() else {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                typespec.location,
                format!(
                    "expected array or slice type (received `{}`)",
                    self.type_name(type_)
                ),
            ));
        };
        let (count, base) = (array.count, array.base);

        let mut resolved_elements = Vec::with_capacity(elements.len());
        for element in elements {
            let mut resolved = self.resolve_expr(element)?;
            resolved = self.shallow_implicit_cast(base, resolved)?;
            let location = self.ctx.expr(resolved).location;
            self.check_type_compatibility(location, self.ctx.expr(resolved).type_, base)?;
            resolved_elements.push(resolved);
        }

        let resolved_ellipsis = match ellipsis {
            Some(ellipsis) => {
                let mut resolved = self.resolve_expr(ellipsis)?;
                resolved = self.shallow_implicit_cast(base, resolved)?;
                let location = self.ctx.expr(resolved).location;
                self.check_type_compatibility(location, self.ctx.expr(resolved).type_, base)?;
                Some(resolved)
            }
            None => None,
        };

        let element_count = resolved_elements.len() as u64;
        if element_count > count || (element_count != count && resolved_ellipsis.is_none()) {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                expr.location,
                format!(
                    "array of type `{}` created with {} element(s) (expected {})",
                    self.type_name(type_),
                    element_count,
                    count
                ),
            ));
        }

        Ok(self.ctx.alloc_expr(Expr {
            location: expr.location,
            type_,
            kind: ExprKind::ArrayList {
                elements: resolved_elements,
                ellipsis: resolved_ellipsis,
            },
        }))
    }

    /// A slice list synthesizes backing storage for its elements: a static
    /// constant inside constant declarations, a static variable at module
    /// scope, a stack slot inside functions.
    fn resolve_expr_slice_list(
        &mut self,
        expr: &cst::Expr,
        typespec: &cst::TypeSpec,
        elements: &[cst::Expr],
    ) -> Result<ExprId, Fatal> {
        let type_ = self.resolve_typespec(typespec)?;
        let TypeKind::Slice(base) = self.ctx.ty(type_).kind else {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                typespec.location,
                format!(
                    "expected array or slice type (received `{}`)",
                    self.type_name(type_)
                ),
            ));
        };

        let mut resolved_elements = Vec::with_capacity(elements.len());
        for element in elements {
            let mut resolved = self.resolve_expr(element)?;
            resolved = self.shallow_implicit_cast(base, resolved)?;
            let location = self.ctx.expr(resolved).location;
            self.check_type_compatibility(location, self.ctx.expr(resolved).type_, base)?;
            resolved_elements.push(resolved);
        }

        let backing_name = {
            let id = self.ctx.slice_backing_counter;
            self.ctx.slice_backing_counter += 1;
            format!("__slice_elements_{id}")
        };
        let backing_atom = self.ctx.interner.intern(&backing_name);
        let array_type = self.ctx.unique_array(resolved_elements.len() as u64, base);

        let is_static = self.is_global() || self.is_within_const_decl;
        let address = if is_static {
            self.reserve_storage_static(&backing_name)
        } else {
            self.reserve_storage_local(array_type)
        };

        let value = if is_static {
            let mut values = Vec::with_capacity(resolved_elements.len());
            for &element in &resolved_elements {
                values.push(Evaluator::new(self.ctx).eval_rvalue(element)?);
            }
            Some(Value::Array {
                type_: array_type,
                elements: values,
            })
        } else {
            None
        };

        let backing = if self.is_within_const_decl {
            self.ctx.alloc_symbol(Symbol {
                location: expr.location,
                name: backing_atom,
                kind: SymbolKind::Constant {
                    type_: array_type,
                    address,
                    value: value.expect("constant backing arrays are static"),
                },
            })
        } else {
            self.ctx.alloc_symbol(Symbol {
                location: expr.location,
                name: backing_atom,
                kind: SymbolKind::Variable {
                    type_: array_type,
                    address,
                    value,
                },
            })
        };
        if is_static {
            self.ctx.register_static_symbol(backing)?;
        }
        self.ctx
            .insert_symbol(self.current_scope, backing_atom, backing)?;

        Ok(self.ctx.alloc_expr(Expr {
            location: expr.location,
            type_,
            kind: ExprKind::SliceList {
                backing,
                elements: resolved_elements,
            },
        }))
    }

    fn resolve_expr_slice(
        &mut self,
        expr: &cst::Expr,
        typespec: &cst::TypeSpec,
        pointer: &cst::Expr,
        count: &cst::Expr,
    ) -> Result<ExprId, Fatal> {
        let type_ = self.resolve_typespec(typespec)?;
        let TypeKind::Slice(base) = self.ctx.ty(type_).kind else {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                typespec.location,
                format!("expected slice type (received `{}`)", self.type_name(type_)),
            ));
        };

        let pointer = self.resolve_expr(pointer)?;
        let pointer_type = self.ctx.expr(pointer).type_;
        if !matches!(self.ctx.ty(pointer_type).kind, TypeKind::Pointer(_)) {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                self.ctx.expr(pointer).location,
                format!(
                    "expression of type `{}` is not a pointer",
                    self.type_name(pointer_type)
                ),
            ));
        }
        let expected_pointer = self.ctx.unique_pointer(base);
        self.check_type_compatibility(
            self.ctx.expr(pointer).location,
            pointer_type,
            expected_pointer,
        )?;

        let mut count = self.resolve_expr(count)?;
        let usize_ = self.ctx.builtins.usize_;
        count = self.shallow_implicit_cast(usize_, count)?;
        self.check_type_compatibility(
            self.ctx.expr(count).location,
            self.ctx.expr(count).type_,
            usize_,
        )?;

        Ok(self.ctx.alloc_expr(Expr {
            location: expr.location,
            type_,
            kind: ExprKind::Slice { pointer, count },
        }))
    }

    fn resolve_expr_struct(
        &mut self,
        expr: &cst::Expr,
        typespec: &cst::TypeSpec,
        initializers: &[cst::MemberInitializer],
    ) -> Result<ExprId, Fatal> {
        let type_ = self.resolve_typespec(typespec)?;
        if self.ctx.ty(type_).as_struct().is_none() {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                expr.location,
                format!(
                    "expected struct type (received `{}`)",
                    self.type_name(type_)
                ),
            ));
        }

        // Resolve the initializer expressions before any shape checks so
        // malformed expressions are reported before mismatches against the
        // struct definition.
        let mut initializer_exprs = Vec::with_capacity(initializers.len());
        for initializer in initializers {
            initializer_exprs.push(self.resolve_expr(&initializer.expr)?);
        }

        let member_count = self
            .ctx
            .ty(type_)
            .as_struct()
            .expect("checked above")
            .members
            .len();
        let mut fields: Vec<Option<ExprId>> = vec![None; member_count];

        for (initializer, &resolved) in initializers.iter().zip(&initializer_exprs) {
            let name = initializer.identifier.name;
            let Some((index, member)) = self.ctx.ty(type_).struct_member_variable(name) else {
                return Err(self.error(
                    ErrorKind::UndeclaredIdentifier,
                    initializer.location,
                    format!(
                        "struct `{}` does not have a member variable `{}`",
                        self.type_name(type_),
                        self.ctx.name(name)
                    ),
                ));
            };
            let member_type = member.type_;
            if fields[index].is_some() {
                return Err(self.error(
                    ErrorKind::Redeclaration,
                    initializer.location,
                    format!(
                        "duplicate initializer for member variable `{}`",
                        self.ctx.name(name)
                    ),
                ));
            }

            let casted = self.shallow_implicit_cast(member_type, resolved)?;
            let location = self.ctx.expr(casted).location;
            self.check_type_compatibility(location, self.ctx.expr(casted).type_, member_type)?;
            fields[index] = Some(casted);
        }

        let mut resolved_fields = Vec::with_capacity(member_count);
        for (index, field) in fields.into_iter().enumerate() {
            let Some(field) = field else {
                let member_name = self
                    .ctx
                    .ty(type_)
                    .as_struct()
                    .expect("checked above")
                    .members[index]
                    .name;
                return Err(self.error(
                    ErrorKind::TypeMismatch,
                    expr.location,
                    format!(
                        "missing initializer for member variable `{}`",
                        self.ctx.name(member_name)
                    ),
                ));
            };
            resolved_fields.push(field);
        }

        Ok(self.ctx.alloc_expr(Expr {
            location: expr.location,
            type_,
            kind: ExprKind::Struct {
                fields: resolved_fields,
            },
        }))
    }

    fn resolve_expr_cast(
        &mut self,
        expr: &cst::Expr,
        typespec: &cst::TypeSpec,
        rhs: &cst::Expr,
    ) -> Result<ExprId, Fatal> {
        let type_ = self.resolve_typespec(typespec)?;
        let rhs = self.resolve_expr(rhs)?;
        let rhs_type = self.ctx.expr(rhs).type_;
        let rhs_location = self.ctx.expr(rhs).location;

        // Casts involving unsized types have no defined narrowing
        // behavior.
        if self.ctx.ty(rhs_type).is_unsized() {
            return Err(self.error(
                ErrorKind::Cast,
                rhs_location,
                format!(
                    "invalid cast from unsized type `{}` to `{}`",
                    self.type_name(rhs_type),
                    self.type_name(type_)
                ),
            ));
        }
        if self.ctx.ty(type_).is_unsized() {
            return Err(self.error(
                ErrorKind::Cast,
                rhs_location,
                format!(
                    "invalid cast to unsized type `{}` from `{}`",
                    self.type_name(type_),
                    self.type_name(rhs_type)
                ),
            ));
        }

        let to = self.ctx.ty(type_);
        let from = self.ctx.ty(rhs_type);
        let usize_ = self.ctx.builtins.usize_;
        let valid = (to.is_any_integer() && from.is_any_integer())
            || (matches!(to.kind, TypeKind::Bool) && matches!(from.kind, TypeKind::Byte))
            || (matches!(to.kind, TypeKind::Byte) && matches!(from.kind, TypeKind::Bool))
            || (matches!(to.kind, TypeKind::Bool) && from.is_any_integer())
            || (to.is_any_integer() && matches!(from.kind, TypeKind::Bool))
            || (matches!(to.kind, TypeKind::Byte) && from.is_any_integer())
            || (to.is_any_integer() && matches!(from.kind, TypeKind::Byte))
            || (matches!(to.kind, TypeKind::Pointer(_)) && rhs_type == usize_)
            || (type_ == usize_ && matches!(from.kind, TypeKind::Pointer(_)))
            || (matches!(to.kind, TypeKind::Pointer(_))
                && matches!(from.kind, TypeKind::Pointer(_)))
            // Function-to-function casts are permitted without checking
            // the parameter lists so structs can implement interfaces
            // through pointer-to-self erasure.
            || (matches!(to.kind, TypeKind::Function(_))
                && matches!(from.kind, TypeKind::Function(_)));
        if !valid {
            return Err(self.error(
                ErrorKind::Cast,
                rhs_location,
                format!(
                    "invalid cast from `{}` to `{}`",
                    self.type_name(rhs_type),
                    self.type_name(type_)
                ),
            ));
        }

        Ok(self.ctx.alloc_expr(Expr {
            location: expr.location,
            type_,
            kind: ExprKind::Cast { expr: rhs },
        }))
    }

    fn resolve_expr_syscall(
        &mut self,
        expr: &cst::Expr,
        arguments: &[cst::Expr],
    ) -> Result<ExprId, Fatal> {
        let mut resolved = Vec::with_capacity(arguments.len());
        for argument in arguments {
            let argument = self.resolve_expr(argument)?;
            let type_ = self.ctx.expr(argument).type_;
            if self.ctx.ty(type_).is_unsized() {
                return Err(self.error(
                    ErrorKind::Unsized,
                    self.ctx.expr(argument).location,
                    format!(
                        "system call argument of unsized type `{}`",
                        self.type_name(type_)
                    ),
                ));
            }
            resolved.push(argument);
        }
        Ok(self.ctx.alloc_expr(Expr {
            location: expr.location,
            type_: self.ctx.builtins.ssize_,
            kind: ExprKind::Syscall {
                arguments: resolved,
            },
        }))
    }

    fn resolve_expr_call(
        &mut self,
        expr: &cst::Expr,
        func: &cst::Expr,
        arguments: &[cst::Expr],
    ) -> Result<ExprId, Fatal> {
        // A call through member access may be a member function call with
        // an implicit pointer-to-self first argument.
        if let cst::ExprKind::AccessMember { lhs, member } = &func.kind {
            if let Some(resolved) = self.resolve_member_function_call(expr, lhs, member, arguments)?
            {
                return Ok(resolved);
            }
        }

        let function = self.resolve_expr(func)?;
        let function_type = self.ctx.expr(function).type_;
        let Some(signature) = self.ctx.ty(function_type).as_function() else {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                expr.location,
                format!(
                    "non-callable type `{}` used in function call expression",
                    self.type_name(function_type)
                ),
            ));
        };
        let parameter_types: Vec<TypeId> = signature.parameter_types.to_vec();
        let return_type = signature.return_type;

        if arguments.len() != parameter_types.len() {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                expr.location,
                format!(
                    "function with type `{}` expects {} argument(s) ({} provided)",
                    self.type_name(function_type),
                    parameter_types.len(),
                    arguments.len()
                ),
            ));
        }

        let mut resolved_arguments = Vec::with_capacity(arguments.len());
        for (argument, &parameter_type) in arguments.iter().zip(&parameter_types) {
            let mut resolved = self.resolve_expr(argument)?;
            resolved = self.shallow_implicit_cast(parameter_type, resolved)?;
            let received = self.ctx.expr(resolved).type_;
            if received != parameter_type {
                return Err(self.error(
                    ErrorKind::TypeMismatch,
                    self.ctx.expr(resolved).location,
                    format!(
                        "incompatible argument type `{}` (expected `{}`)",
                        self.type_name(received),
                        self.type_name(parameter_type)
                    ),
                ));
            }
            resolved_arguments.push(resolved);
        }

        Ok(self.ctx.alloc_expr(Expr {
            location: expr.location,
            type_: return_type,
            kind: ExprKind::Call {
                function,
                arguments: resolved_arguments,
            },
        }))
    }

    /// Attempt to resolve `instance.name(args)` as a member function call.
    /// Returns `None` when the access names a function-typed member
    /// *variable*, in which case the caller falls back to an ordinary call
    /// through member access.
    fn resolve_member_function_call(
        &mut self,
        expr: &cst::Expr,
        lhs: &cst::Expr,
        member: &cst::SymbolElement,
        arguments: &[cst::Expr],
    ) -> Result<Option<ExprId>, Fatal> {
        let name = member.identifier.name;
        let instance = self.resolve_expr(lhs)?;
        let instance_type = self.ctx.expr(instance).type_;

        if !self.ctx.expr_is_lvalue(instance) {
            return Err(self.error(
                ErrorKind::Lvalue,
                self.ctx.expr(instance).location,
                format!(
                    "attempted to call member function `{}` on non-lvalue instance of type `{}`",
                    self.ctx.name(name),
                    self.type_name(instance_type)
                ),
            ));
        }

        if self
            .ctx
            .ty(instance_type)
            .struct_member_variable(name)
            .is_some()
        {
            // A member variable that happens to have a function type: an
            // ordinary call through member access, not a method call.
            return Ok(None);
        }

        let Some(mut symbol) = self.ctx.type_member_symbol(instance_type, name) else {
            return Err(self.error(
                ErrorKind::UndeclaredIdentifier,
                self.ctx.expr(instance).location,
                format!(
                    "type `{}` has no member function `{}`",
                    self.type_name(instance_type),
                    self.ctx.name(name)
                ),
            ));
        };
        if matches!(self.ctx.symbol(symbol).kind, SymbolKind::Template(_)) {
            symbol = self.instantiate_template(member.location, symbol, &member.template_arguments)?;
        }
        let SymbolKind::Function(function) = self.ctx.symbol(symbol).kind else {
            return Err(self.error(
                ErrorKind::UndeclaredIdentifier,
                self.ctx.expr(instance).location,
                format!(
                    "type `{}` has no member function `{}`",
                    self.type_name(instance_type),
                    self.ctx.name(name)
                ),
            ));
        };

        let function_type = self.ctx.function(function).type_;
        let signature = self
            .ctx
            .ty(function_type)
            .as_function()
            .expect("functions have function types");
        let parameter_types: Vec<TypeId> = signature.parameter_types.to_vec();
        let return_type = signature.return_type;
        let selfptr_type = self.ctx.unique_pointer(instance_type);

        let Some(&first_parameter) = parameter_types.first() else {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                self.ctx.expr(instance).location,
                format!(
                    "expected type `{}` for the first parameter of member function `{}` of type `{}`",
                    self.type_name(selfptr_type),
                    self.ctx.name(name),
                    self.type_name(instance_type)
                ),
            ));
        };
        if first_parameter != selfptr_type {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                self.ctx.expr(instance).location,
                format!(
                    "expected type `{}` for the first parameter of member function `{}` of type `{}` (found `{}`)",
                    self.type_name(selfptr_type),
                    self.ctx.name(name),
                    self.type_name(instance_type),
                    self.type_name(first_parameter)
                ),
            ));
        }

        let expected_argument_count = parameter_types.len() - 1;
        if arguments.len() != expected_argument_count {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                expr.location,
                format!(
                    "member function with type `{}` expects {} argument(s) ({} provided)",
                    self.type_name(function_type),
                    expected_argument_count,
                    arguments.len()
                ),
            ));
        }

        // The implicit pointer to self is the first argument.
        let selfptr = self.ctx.alloc_expr(Expr {
            location: expr.location,
            type_: selfptr_type,
            kind: ExprKind::Unary {
                op: UnaryOp::Addressof,
                rhs: instance,
            },
        });
        let mut resolved_arguments = vec![selfptr];
        for (argument, &parameter_type) in arguments.iter().zip(&parameter_types[1..]) {
            let mut resolved = self.resolve_expr(argument)?;
            resolved = self.shallow_implicit_cast(parameter_type, resolved)?;
            let received = self.ctx.expr(resolved).type_;
            if received != parameter_type {
                return Err(self.error(
                    ErrorKind::TypeMismatch,
                    self.ctx.expr(resolved).location,
                    format!(
                        "incompatible argument type `{}` (expected `{}`)",
                        self.type_name(received),
                        self.type_name(parameter_type)
                    ),
                ));
            }
            resolved_arguments.push(resolved);
        }

        let callee = self.ctx.alloc_expr(Expr {
            location: member.identifier.location,
            type_: function_type,
            kind: ExprKind::Symbol(symbol),
        });
        Ok(Some(self.ctx.alloc_expr(Expr {
            location: expr.location,
            type_: return_type,
            kind: ExprKind::Call {
                function: callee,
                arguments: resolved_arguments,
            },
        })))
    }

    fn resolve_expr_access_index(
        &mut self,
        expr: &cst::Expr,
        lhs: &cst::Expr,
        idx: &cst::Expr,
    ) -> Result<ExprId, Fatal> {
        let lhs = self.resolve_expr(lhs)?;
        let lhs_type = self.ctx.expr(lhs).type_;
        let base = match &self.ctx.ty(lhs_type).kind {
            TypeKind::Array(array) => array.base,
            TypeKind::Slice(base) => *base,
            _ => {
                return Err(self.error(
                    ErrorKind::TypeMismatch,
                    self.ctx.expr(lhs).location,
                    format!(
                        "illegal index operation with left-hand-side of type `{}`",
                        self.type_name(lhs_type)
                    ),
                ));
            }
        };

        let mut idx = self.resolve_expr(idx)?;
        let usize_ = self.ctx.builtins.usize_;
        idx = self.shallow_implicit_cast(usize_, idx)?;
        let idx_type = self.ctx.expr(idx).type_;
        if idx_type != usize_ {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                self.ctx.expr(idx).location,
                format!(
                    "illegal index operation with index of non-usize type `{}`",
                    self.type_name(idx_type)
                ),
            ));
        }

        Ok(self.ctx.alloc_expr(Expr {
            location: expr.location,
            type_: base,
            kind: ExprKind::Index { lhs, idx },
        }))
    }

    fn resolve_expr_access_slice(
        &mut self,
        expr: &cst::Expr,
        lhs: &cst::Expr,
        begin: &cst::Expr,
        end: &cst::Expr,
    ) -> Result<ExprId, Fatal> {
        let lhs = self.resolve_expr(lhs)?;
        let lhs_type = self.ctx.expr(lhs).type_;
        let (base, is_array) = match &self.ctx.ty(lhs_type).kind {
            TypeKind::Array(array) => (array.base, true),
            TypeKind::Slice(base) => (*base, false),
            _ => {
                return Err(self.error(
                    ErrorKind::TypeMismatch,
                    self.ctx.expr(lhs).location,
                    format!(
                        "illegal slice operation with left-hand-side of type `{}`",
                        self.type_name(lhs_type)
                    ),
                ));
            }
        };
        // An array rvalue has no stable storage to point into.
        if is_array && !self.ctx.expr_is_lvalue(lhs) {
            return Err(self.error(
                ErrorKind::Lvalue,
                self.ctx.expr(lhs).location,
                "left hand side of slice operation is an rvalue array",
            ));
        }

        let usize_ = self.ctx.builtins.usize_;
        let mut begin = self.resolve_expr(begin)?;
        begin = self.shallow_implicit_cast(usize_, begin)?;
        let begin_type = self.ctx.expr(begin).type_;
        if begin_type != usize_ {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                self.ctx.expr(begin).location,
                format!(
                    "illegal slice operation with index of non-usize type `{}`",
                    self.type_name(begin_type)
                ),
            ));
        }
        let mut end = self.resolve_expr(end)?;
        end = self.shallow_implicit_cast(usize_, end)?;
        let end_type = self.ctx.expr(end).type_;
        if end_type != usize_ {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                self.ctx.expr(end).location,
                format!(
                    "illegal slice operation with index of non-usize type `{}`",
                    self.type_name(end_type)
                ),
            ));
        }

        let type_ = self.ctx.unique_slice(base);
        Ok(self.ctx.alloc_expr(Expr {
            location: expr.location,
            type_,
            kind: ExprKind::AccessSlice { lhs, begin, end },
        }))
    }

    fn resolve_expr_access_member(
        &mut self,
        expr: &cst::Expr,
        lhs: &cst::Expr,
        member: &cst::SymbolElement,
    ) -> Result<ExprId, Fatal> {
        let lhs = self.resolve_expr(lhs)?;
        let lhs_type = self.ctx.expr(lhs).type_;
        if self.ctx.ty(lhs_type).as_struct().is_none() {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                self.ctx.expr(lhs).location,
                format!(
                    "attempted member access on non-struct type `{}`",
                    self.type_name(lhs_type)
                ),
            ));
        }

        let name = member.identifier.name;
        if let Some((index, member_variable)) = self.ctx.ty(lhs_type).struct_member_variable(name) {
            let member_type = member_variable.type_;
            if !member.template_arguments.is_empty() {
                return Err(self.error(
                    ErrorKind::Template,
                    expr.location,
                    format!(
                        "attempted template instantiation of member variable `{}` on type `{}`",
                        self.ctx.name(name),
                        self.type_name(lhs_type)
                    ),
                ));
            }
            return Ok(self.ctx.alloc_expr(Expr {
                location: expr.location,
                type_: member_type,
                kind: ExprKind::MemberVariable { lhs, member: index },
            }));
        }

        // Member constants, functions, and templates are not values; they
        // are only reachable through qualified symbols or call syntax.
        if let Some(symbol) = self.ctx.type_member_symbol(lhs_type, name) {
            let (kind, what) = match &self.ctx.symbol(symbol).kind {
                SymbolKind::Constant { .. } => (ErrorKind::TypeMismatch, "member constant"),
                SymbolKind::Function(_) => (ErrorKind::TypeMismatch, "member function"),
                SymbolKind::Template(_) => (ErrorKind::Template, "member template"),
                _ => (ErrorKind::TypeMismatch, "member"),
            };
            return Err(self.error(
                kind,
                expr.location,
                format!(
                    "attempted to take the value of {what} `{}` on type `{}`",
                    self.ctx.name(name),
                    self.type_name(lhs_type)
                ),
            ));
        }

        Err(self.error(
            ErrorKind::UndeclaredIdentifier,
            self.ctx.expr(lhs).location,
            format!(
                "struct `{}` has no member `{}`",
                self.type_name(lhs_type),
                self.ctx.name(name)
            ),
        ))
    }

    fn resolve_expr_unary(
        &mut self,
        op: UnaryOp,
        op_location: SourceLocation,
        rhs: &cst::Expr,
    ) -> Result<ExprId, Fatal> {
        // `-128s8` parses as negation applied to the out-of-range literal
        // `128s8`; fold the sign into the literal before range checking so
        // the minimum value of each signed type is expressible.
        if matches!(op, UnaryOp::Pos | UnaryOp::Neg) {
            if let cst::ExprKind::Integer { value, suffix } = &rhs.kind {
                let value = if matches!(op, UnaryOp::Neg) {
                    -value.clone()
                } else {
                    value.clone()
                };
                let type_ = self.integer_literal_suffix_to_type(rhs.location, *suffix)?;
                return self.new_integer_expr(op_location, type_, value);
            }
        }

        let rhs = self.resolve_expr(rhs)?;
        let rhs_type = self.ctx.expr(rhs).type_;
        match op {
            UnaryOp::Not => {
                if !matches!(self.ctx.ty(rhs_type).kind, TypeKind::Bool) {
                    return Err(self.invalid_unary_operand(op, op_location, rhs_type));
                }
                Ok(self.ctx.alloc_expr(Expr {
                    location: op_location,
                    type_: rhs_type,
                    kind: ExprKind::Unary { op, rhs },
                }))
            }
            UnaryOp::Pos => {
                if !self.ctx.ty(rhs_type).is_any_integer() {
                    return Err(self.invalid_unary_operand(op, op_location, rhs_type));
                }
                Ok(self.ctx.alloc_expr(Expr {
                    location: op_location,
                    type_: rhs_type,
                    kind: ExprKind::Unary { op, rhs },
                }))
            }
            UnaryOp::Neg => {
                if self.ctx.ty(rhs_type).is_unsigned_integer() {
                    return Err(self.invalid_unary_operand(op, op_location, rhs_type));
                }
                if !self.ctx.ty(rhs_type).is_any_integer() {
                    return Err(self.invalid_unary_operand(op, op_location, rhs_type));
                }
                Ok(self.ctx.alloc_expr(Expr {
                    location: op_location,
                    type_: rhs_type,
                    kind: ExprKind::Unary { op, rhs },
                }))
            }
            UnaryOp::Bitnot => {
                if self.ctx.ty(rhs_type).is_unsized() {
                    return Err(self.error(
                        ErrorKind::Unsized,
                        op_location,
                        format!(
                            "unsized type `{}` in unary `{op}` expression has no bit-representation",
                            self.type_name(rhs_type)
                        ),
                    ));
                }
                let valid = matches!(self.ctx.ty(rhs_type).kind, TypeKind::Byte)
                    || self.ctx.ty(rhs_type).is_any_integer();
                if !valid {
                    return Err(self.error(
                        ErrorKind::TypeMismatch,
                        self.ctx.expr(rhs).location,
                        format!(
                            "cannot apply bitwise NOT to type `{}`",
                            self.type_name(rhs_type)
                        ),
                    ));
                }
                Ok(self.ctx.alloc_expr(Expr {
                    location: op_location,
                    type_: rhs_type,
                    kind: ExprKind::Unary { op, rhs },
                }))
            }
            UnaryOp::Dereference => self.new_dereference_expr(op_location, rhs),
            UnaryOp::Addressof => {
                if !self.ctx.expr_is_lvalue(rhs) {
                    return Err(self.error(
                        ErrorKind::Lvalue,
                        self.ctx.expr(rhs).location,
                        "cannot take the address of a non-lvalue",
                    ));
                }
                let type_ = self.ctx.unique_pointer(rhs_type);
                Ok(self.ctx.alloc_expr(Expr {
                    location: op_location,
                    type_,
                    kind: ExprKind::Unary { op, rhs },
                }))
            }
            UnaryOp::Countof => {
                if !matches!(
                    self.ctx.ty(rhs_type).kind,
                    TypeKind::Array(_) | TypeKind::Slice(_)
                ) {
                    return Err(self.error(
                        ErrorKind::TypeMismatch,
                        self.ctx.expr(rhs).location,
                        format!(
                            "expected array or slice type (received `{}`)",
                            self.type_name(rhs_type)
                        ),
                    ));
                }
                Ok(self.ctx.alloc_expr(Expr {
                    location: op_location,
                    type_: self.ctx.builtins.usize_,
                    kind: ExprKind::Unary { op, rhs },
                }))
            }
        }
    }

    fn invalid_unary_operand(
        &self,
        op: UnaryOp,
        op_location: SourceLocation,
        rhs_type: TypeId,
    ) -> Fatal {
        self.error(
            ErrorKind::TypeMismatch,
            op_location,
            format!(
                "invalid argument of type `{}` in unary `{op}` expression",
                self.type_name(rhs_type)
            ),
        )
    }

    fn invalid_binary_operands(
        &self,
        op: BinaryOp,
        op_location: SourceLocation,
        lhs_type: TypeId,
        rhs_type: TypeId,
    ) -> Fatal {
        self.error(
            ErrorKind::TypeMismatch,
            op_location,
            format!(
                "invalid arguments of types `{}` and `{}` in binary `{op}` expression",
                self.type_name(lhs_type),
                self.type_name(rhs_type)
            ),
        )
    }

    fn resolve_expr_binary(
        &mut self,
        op: BinaryOp,
        op_location: SourceLocation,
        lhs: &cst::Expr,
        rhs: &cst::Expr,
    ) -> Result<ExprId, Fatal> {
        let lhs = self.resolve_expr(lhs)?;
        let rhs = self.resolve_expr(rhs)?;
        match op {
            BinaryOp::Or | BinaryOp::And => {
                self.resolve_expr_binary_logical(op, op_location, lhs, rhs)
            }
            BinaryOp::Shl | BinaryOp::Shr => {
                self.resolve_expr_binary_shift(op, op_location, lhs, rhs)
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                self.resolve_expr_binary_compare(op, op_location, lhs, rhs, false)
            }
            BinaryOp::Le | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Gt => {
                self.resolve_expr_binary_compare(op, op_location, lhs, rhs, true)
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                self.resolve_expr_binary_arithmetic(op, op_location, lhs, rhs)
            }
            BinaryOp::Bitor | BinaryOp::Bitxor | BinaryOp::Bitand => {
                self.resolve_expr_binary_bitwise(op, op_location, lhs, rhs)
            }
        }
    }

    fn resolve_expr_binary_logical(
        &mut self,
        op: BinaryOp,
        op_location: SourceLocation,
        lhs: ExprId,
        rhs: ExprId,
    ) -> Result<ExprId, Fatal> {
        let lhs_type = self.ctx.expr(lhs).type_;
        let rhs_type = self.ctx.expr(rhs).type_;
        let valid = lhs_type == rhs_type && matches!(self.ctx.ty(lhs_type).kind, TypeKind::Bool);
        if !valid {
            return Err(self.invalid_binary_operands(op, op_location, lhs_type, rhs_type));
        }
        Ok(self.ctx.alloc_expr(Expr {
            location: op_location,
            type_: self.ctx.builtins.bool_,
            kind: ExprKind::Binary { op, lhs, rhs },
        }))
    }

    fn resolve_expr_binary_shift(
        &mut self,
        op: BinaryOp,
        op_location: SourceLocation,
        lhs: ExprId,
        mut rhs: ExprId,
    ) -> Result<ExprId, Fatal> {
        let lhs_type = self.ctx.expr(lhs).type_;
        if !self.ctx.ty(lhs_type).is_any_integer() {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                op_location,
                format!(
                    "invalid left-hand argument of type `{}` in binary `{op}` expression",
                    self.type_name(lhs_type)
                ),
            ));
        }
        if self.ctx.ty(lhs_type).is_unsized() {
            return Err(self.error(
                ErrorKind::Unsized,
                op_location,
                format!(
                    "unsized type `{}` in binary `{op}` expression has no bit-representation",
                    self.type_name(lhs_type)
                ),
            ));
        }

        let usize_ = self.ctx.builtins.usize_;
        rhs = self.shallow_implicit_cast(usize_, rhs)?;
        let rhs_type = self.ctx.expr(rhs).type_;
        if rhs_type != usize_ {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                op_location,
                format!(
                    "invalid non-usize right-hand argument of type `{}` in binary `{op}` expression",
                    self.type_name(rhs_type)
                ),
            ));
        }

        Ok(self.ctx.alloc_expr(Expr {
            location: op_location,
            type_: lhs_type,
            kind: ExprKind::Binary { op, lhs, rhs },
        }))
    }

    fn resolve_expr_binary_compare(
        &mut self,
        op: BinaryOp,
        op_location: SourceLocation,
        mut lhs: ExprId,
        mut rhs: ExprId,
        ordering: bool,
    ) -> Result<ExprId, Fatal> {
        lhs = self.shallow_implicit_cast(self.ctx.expr(rhs).type_, lhs)?;
        rhs = self.shallow_implicit_cast(self.ctx.expr(lhs).type_, rhs)?;

        let lhs_type = self.ctx.expr(lhs).type_;
        let rhs_type = self.ctx.expr(rhs).type_;
        if lhs_type != rhs_type {
            return Err(self.invalid_binary_operands(op, op_location, lhs_type, rhs_type));
        }
        let comparable = if ordering {
            self.ctx.ty(lhs_type).can_compare_order()
        } else {
            self.ctx.ty(lhs_type).can_compare_equality()
        };
        if !comparable {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                op_location,
                format!(
                    "invalid arguments of type `{}` in binary `{op}` expression",
                    self.type_name(lhs_type)
                ),
            ));
        }

        let resolved = self.ctx.alloc_expr(Expr {
            location: op_location,
            type_: self.ctx.builtins.bool_,
            kind: ExprKind::Binary { op, lhs, rhs },
        });

        // Comparisons of integer literal constants fold to boolean
        // literals.
        if self.both_integer_literals(lhs, rhs) {
            let value = Evaluator::new(self.ctx).eval_rvalue(resolved)?;
            let Value::Boolean(boolean) = value else {
                unreachable!("comparison evaluates to a boolean");
            };
            return Ok(self.new_boolean_expr(op_location, boolean));
        }

        Ok(resolved)
    }

    fn resolve_expr_binary_arithmetic(
        &mut self,
        op: BinaryOp,
        op_location: SourceLocation,
        mut lhs: ExprId,
        mut rhs: ExprId,
    ) -> Result<ExprId, Fatal> {
        lhs = self.shallow_implicit_cast(self.ctx.expr(rhs).type_, lhs)?;
        rhs = self.shallow_implicit_cast(self.ctx.expr(lhs).type_, rhs)?;

        let lhs_type = self.ctx.expr(lhs).type_;
        let rhs_type = self.ctx.expr(rhs).type_;
        let valid = lhs_type == rhs_type && self.ctx.ty(lhs_type).is_any_integer();
        if !valid {
            return Err(self.invalid_binary_operands(op, op_location, lhs_type, rhs_type));
        }

        let resolved = self.ctx.alloc_expr(Expr {
            location: op_location,
            type_: lhs_type,
            kind: ExprKind::Binary { op, lhs, rhs },
        });

        // Arithmetic over integer literal constants folds at resolve time,
        // diagnosing overflow and division by zero immediately.
        if self.both_integer_literals(lhs, rhs) {
            let value = Evaluator::new(self.ctx).eval_rvalue(resolved)?;
            let Value::Integer { value, .. } = value else {
                unreachable!("integer arithmetic evaluates to an integer");
            };
            return Ok(self.ctx.alloc_expr(Expr {
                location: op_location,
                type_: lhs_type,
                kind: ExprKind::Integer(value),
            }));
        }

        Ok(resolved)
    }

    fn resolve_expr_binary_bitwise(
        &mut self,
        op: BinaryOp,
        op_location: SourceLocation,
        mut lhs: ExprId,
        mut rhs: ExprId,
    ) -> Result<ExprId, Fatal> {
        lhs = self.shallow_implicit_cast(self.ctx.expr(rhs).type_, lhs)?;
        rhs = self.shallow_implicit_cast(self.ctx.expr(lhs).type_, rhs)?;

        let lhs_type = self.ctx.expr(lhs).type_;
        let rhs_type = self.ctx.expr(rhs).type_;
        if lhs_type != rhs_type {
            return Err(self.invalid_binary_operands(op, op_location, lhs_type, rhs_type));
        }
        if self.ctx.ty(lhs_type).is_unsized() {
            return Err(self.error(
                ErrorKind::Unsized,
                op_location,
                format!(
                    "unsized types `{}` in binary `{op}` expression have no bit-representation",
                    self.type_name(lhs_type)
                ),
            ));
        }
        let valid = matches!(self.ctx.ty(lhs_type).kind, TypeKind::Bool | TypeKind::Byte)
            || self.ctx.ty(lhs_type).is_any_integer();
        if !valid {
            return Err(self.invalid_binary_operands(op, op_location, lhs_type, rhs_type));
        }

        let resolved = self.ctx.alloc_expr(Expr {
            location: op_location,
            type_: lhs_type,
            kind: ExprKind::Binary { op, lhs, rhs },
        });

        if self.both_integer_literals(lhs, rhs) && self.ctx.ty(lhs_type).is_any_integer() {
            let value = Evaluator::new(self.ctx).eval_rvalue(resolved)?;
            let Value::Integer { value, .. } = value else {
                unreachable!("integer bitwise operation evaluates to an integer");
            };
            return Ok(self.ctx.alloc_expr(Expr {
                location: op_location,
                type_: lhs_type,
                kind: ExprKind::Integer(value),
            }));
        }

        Ok(resolved)
    }

    fn both_integer_literals(&self, lhs: ExprId, rhs: ExprId) -> bool {
        matches!(self.ctx.expr(lhs).kind, ExprKind::Integer(_))
            && matches!(self.ctx.expr(rhs).kind, ExprKind::Integer(_))
    }
}
