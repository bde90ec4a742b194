//! Compile-time values.
//!
//! The evaluator reduces constant expressions to these. Values own their
//! payload and clone deeply. Comparison and byte serialization are defined
//! only for the kinds where they are meaningful; calling them elsewhere is
//! a front-end bug, not a user-visible diagnostic.

use crate::address::Address;
use crate::context::Context;
use crate::tir::FunctionId;
use crate::types::{TypeId, TypeKind};
use num_bigint::BigInt;
use sable_common::int::{from_twos_complement, to_twos_complement};

#[derive(Clone, Debug)]
pub enum Value {
    Boolean(bool),
    Byte(u8),
    Integer { type_: TypeId, value: BigInt },
    Function(FunctionId),
    Pointer { type_: TypeId, address: Address },
    Array { type_: TypeId, elements: Vec<Value> },
    Slice {
        type_: TypeId,
        pointer: Box<Value>,
        count: Box<Value>,
    },
    Struct { type_: TypeId, fields: Vec<Value> },
}

impl Value {
    /// The type of this value.
    pub fn type_of(&self, ctx: &Context) -> TypeId {
        match self {
            Value::Boolean(_) => ctx.builtins.bool_,
            Value::Byte(_) => ctx.builtins.byte,
            Value::Integer { type_, .. }
            | Value::Pointer { type_, .. }
            | Value::Array { type_, .. }
            | Value::Slice { type_, .. }
            | Value::Struct { type_, .. } => *type_,
            Value::Function(function) => ctx.function(*function).type_,
        }
    }

    /// Equality; defined for bool, byte, integer, function, and pointer
    /// values of the same type.
    pub fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Boolean(lhs), Value::Boolean(rhs)) => lhs == rhs,
            (Value::Byte(lhs), Value::Byte(rhs)) => lhs == rhs,
            (Value::Integer { value: lhs, .. }, Value::Integer { value: rhs, .. }) => lhs == rhs,
            (Value::Function(lhs), Value::Function(rhs)) => lhs == rhs,
            (Value::Pointer { address: lhs, .. }, Value::Pointer { address: rhs, .. }) => {
                lhs == rhs
            }
            _ => unreachable!("equality comparison on incomparable values"),
        }
    }

    /// Strict less-than; defined for bool, byte, and integer values.
    pub fn lt(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Boolean(lhs), Value::Boolean(rhs)) => lhs < rhs,
            (Value::Byte(lhs), Value::Byte(rhs)) => lhs < rhs,
            (Value::Integer { value: lhs, .. }, Value::Integer { value: rhs, .. }) => lhs < rhs,
            _ => unreachable!("ordering comparison on unordered values"),
        }
    }

    /// Strict greater-than; defined for bool, byte, and integer values.
    pub fn gt(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Boolean(lhs), Value::Boolean(rhs)) => lhs > rhs,
            (Value::Byte(lhs), Value::Byte(rhs)) => lhs > rhs,
            (Value::Integer { value: lhs, .. }, Value::Integer { value: rhs, .. }) => lhs > rhs,
            _ => unreachable!("ordering comparison on unordered values"),
        }
    }

    /// Serialize into the little-endian byte layout of the value's type.
    ///
    /// Function, pointer, and slice values have no compile-time byte
    /// representation (their addresses are chosen by the linker); reaching
    /// them here is a front-end bug.
    pub fn to_bytes(&self, ctx: &Context) -> Vec<u8> {
        match self {
            Value::Boolean(boolean) => vec![u8::from(*boolean)],
            Value::Byte(byte) => vec![*byte],
            Value::Integer { type_, value } => {
                let size = ctx.ty(*type_).size.expect("integer value of unsized type");
                to_twos_complement(value, size as usize)
                    .expect("integer value out of range for its type")
            }
            Value::Array { type_, elements } => {
                let ty = ctx.ty(*type_);
                let element_size = ctx
                    .ty(ty.as_array().expect("array value of non-array type").base)
                    .size
                    .expect("array element of unsized type");
                let mut bytes = Vec::with_capacity(ty.size.unwrap_or(0) as usize);
                for element in elements {
                    let element_bytes = element.to_bytes(ctx);
                    debug_assert_eq!(element_bytes.len() as u64, element_size);
                    bytes.extend(element_bytes);
                }
                bytes
            }
            Value::Struct { type_, fields } => {
                let ty = ctx.ty(*type_);
                let struct_ = ty.as_struct().expect("struct value of non-struct type");
                let size = ty.size.expect("struct value of unsized type");
                let mut bytes = vec![0u8; size as usize];
                for (member, field) in struct_.members.iter().zip(fields) {
                    let field_bytes = field.to_bytes(ctx);
                    let offset = member.offset as usize;
                    bytes[offset..offset + field_bytes.len()].copy_from_slice(&field_bytes);
                }
                bytes
            }
            Value::Function(_) | Value::Pointer { .. } | Value::Slice { .. } => {
                unreachable!("value kind has no compile-time byte representation")
            }
        }
    }

    /// Rebuild a value of `type_` from its byte layout. Defined for the
    /// same kinds as [`Value::to_bytes`]; returns `None` when the byte
    /// count does not match the type's size.
    pub fn from_bytes(ctx: &Context, type_: TypeId, bytes: &[u8]) -> Option<Value> {
        let ty = ctx.ty(type_);
        if bytes.len() as u64 != ty.size? {
            return None;
        }
        match &ty.kind {
            TypeKind::Bool => Some(Value::Boolean(bytes[0] != 0)),
            TypeKind::Byte => Some(Value::Byte(bytes[0])),
            TypeKind::Int(int) => Some(Value::Integer {
                type_,
                value: from_twos_complement(bytes, int.signed),
            }),
            TypeKind::Array(array) => {
                let element_size = ctx.ty(array.base).size? as usize;
                let elements = if element_size == 0 {
                    Vec::new()
                } else {
                    bytes
                        .chunks_exact(element_size)
                        .map(|chunk| Value::from_bytes(ctx, array.base, chunk))
                        .collect::<Option<Vec<_>>>()?
                };
                Some(Value::Array { type_, elements })
            }
            TypeKind::Struct(struct_) => {
                let mut fields = Vec::with_capacity(struct_.members.len());
                for member in &struct_.members {
                    let size = ctx.ty(member.type_).size? as usize;
                    let offset = member.offset as usize;
                    fields.push(Value::from_bytes(
                        ctx,
                        member.type_,
                        &bytes[offset..offset + size],
                    )?);
                }
                Some(Value::Struct { type_, fields })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "tests/value_tests.rs"]
mod tests;
