//! Typespec resolution.
//!
//! Typespecs resolve to canonical `TypeId`s through the context's
//! uniquing constructors. Array counts are full constant expressions,
//! evaluated on the spot.

use crate::state::Resolver;
use num_traits::ToPrimitive;
use sable_common::{ErrorKind, Fatal};
use sable_parser::cst;
use sable_tir::{SymbolKind, TypeId, Value};

impl Resolver<'_> {
    pub(crate) fn resolve_typespec(&mut self, typespec: &cst::TypeSpec) -> Result<TypeId, Fatal> {
        match &typespec.kind {
            cst::TypeSpecKind::Symbol(symbol) => self.resolve_typespec_symbol(typespec, symbol),
            cst::TypeSpecKind::Function {
                parameter_typespecs,
                return_typespec,
            } => {
                let mut parameter_types = Vec::with_capacity(parameter_typespecs.len());
                for parameter in parameter_typespecs {
                    parameter_types.push(self.resolve_typespec(parameter)?);
                }
                let return_type = self.resolve_typespec(return_typespec)?;
                Ok(self.ctx.unique_function(&parameter_types, return_type))
            }
            cst::TypeSpecKind::Pointer(base) => {
                let base = self.resolve_typespec(base)?;
                Ok(self.ctx.unique_pointer(base))
            }
            cst::TypeSpecKind::Array { count, base } => {
                let count = self.resolve_array_count(count)?;
                let base = self.resolve_typespec(base)?;
                Ok(self.ctx.unique_array(count, base))
            }
            cst::TypeSpecKind::Slice(base) => {
                let base = self.resolve_typespec(base)?;
                Ok(self.ctx.unique_slice(base))
            }
            cst::TypeSpecKind::Typeof(expr) => {
                let resolved = self.resolve_expr(expr)?;
                Ok(self.ctx.expr(resolved).type_)
            }
        }
    }

    fn resolve_typespec_symbol(
        &mut self,
        typespec: &cst::TypeSpec,
        symbol: &cst::SymbolPath,
    ) -> Result<TypeId, Fatal> {
        let symbol = self.xget_symbol(symbol)?;
        match &self.ctx.symbol(symbol).kind {
            SymbolKind::Type(type_) => Ok(*type_),
            SymbolKind::Template(_) => Err(self.error(
                ErrorKind::Template,
                typespec.location,
                format!(
                    "template `{}` must be instantiated",
                    self.ctx.name(self.ctx.symbol(symbol).name)
                ),
            )),
            _ => Err(self.error(
                ErrorKind::TypeMismatch,
                typespec.location,
                format!(
                    "identifier `{}` is not a type",
                    self.ctx.name(self.ctx.symbol(symbol).name)
                ),
            )),
        }
    }

    /// Array counts are compile-time `usize` expressions.
    fn resolve_array_count(&mut self, count: &cst::Expr) -> Result<u64, Fatal> {
        let mut resolved = self.resolve_expr(count)?;
        let usize_ = self.ctx.builtins.usize_;
        resolved = self.shallow_implicit_cast(usize_, resolved)?;
        let type_ = self.ctx.expr(resolved).type_;
        if type_ != usize_ {
            return Err(self.error(
                ErrorKind::TypeMismatch,
                self.ctx.expr(resolved).location,
                format!(
                    "illegal array count with non-usize type `{}`",
                    self.type_name(type_)
                ),
            ));
        }

        let value = sable_eval::Evaluator::new(self.ctx).eval_rvalue(resolved)?;
        let Value::Integer { value, .. } = value else {
            unreachable!("usize expression evaluates to an integer");
        };
        value.to_u64().ok_or_else(|| {
            self.error(
                ErrorKind::Range,
                self.ctx.expr(resolved).location,
                format!("array count too large (received {value})"),
            )
        })
    }
}
