//! Type definitions.
//!
//! Types live in the [`Context`](crate::Context) arena and are referred to
//! by [`TypeId`]. Compound types are only ever created through the
//! `unique_*` constructors on the context, which canonicalize by interned
//! name; two structurally identical types therefore share a `TypeId` and
//! type equality everywhere else in the front-end is id comparison.

use crate::context::ScopeId;
use num_bigint::BigInt;
use sable_common::Atom;
use smallvec::SmallVec;

/// Size in bytes of a pointer on every supported target.
pub const POINTER_SIZE: u64 = 8;

/// Handle to a type in the context's type arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
pub struct Type {
    /// Interned canonical name, e.g. `*[]u8` or `func(u32) bool`.
    pub name: Atom,
    /// Size in bytes; `None` marks the unsized types (the untyped integer
    /// and `any`).
    pub size: Option<u64>,
    /// Alignment in bytes; `None` exactly when `size` is `None`.
    pub align: Option<u64>,
    pub kind: TypeKind,
    /// Member constants and functions attached to this type by struct
    /// declarations or `extend`. Created lazily for non-struct types.
    pub member_scope: Option<ScopeId>,
}

#[derive(Clone, Debug)]
pub enum TypeKind {
    Void,
    Bool,
    Byte,
    /// The unsized `any` type; only meaningful behind a pointer.
    Any,
    /// The unsized type of suffix-less integer literals.
    Integer,
    Int(IntType),
    Function(FunctionType),
    Pointer(TypeId),
    Array(ArrayType),
    Slice(TypeId),
    Struct(StructType),
}

/// A sized integer type with its inclusive value range.
#[derive(Clone, Debug)]
pub struct IntType {
    pub signed: bool,
    pub min: BigInt,
    pub max: BigInt,
}

#[derive(Clone, Debug)]
pub struct FunctionType {
    pub parameter_types: SmallVec<[TypeId; 4]>,
    pub return_type: TypeId,
}

#[derive(Clone, Debug)]
pub struct ArrayType {
    pub count: u64,
    pub base: TypeId,
}

#[derive(Clone, Debug)]
pub struct StructType {
    /// Member variables in declaration order with their byte offsets.
    pub members: Vec<MemberVariable>,
    /// Set once the struct's field list has been completed; completing a
    /// struct twice is an internal error.
    pub is_complete: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct MemberVariable {
    pub name: Atom,
    pub type_: TypeId,
    pub offset: u64,
}

impl Type {
    /// Typed (sized) integer.
    #[inline]
    pub fn is_integer(&self) -> bool {
        matches!(self.kind, TypeKind::Int(_))
    }

    /// Typed integer or the untyped integer literal type.
    #[inline]
    pub fn is_any_integer(&self) -> bool {
        matches!(self.kind, TypeKind::Int(_) | TypeKind::Integer)
    }

    #[inline]
    pub fn is_unsigned_integer(&self) -> bool {
        matches!(self.kind, TypeKind::Int(IntType { signed: false, .. }))
    }

    #[inline]
    pub fn is_signed_integer(&self) -> bool {
        matches!(self.kind, TypeKind::Int(IntType { signed: true, .. }))
    }

    #[inline]
    pub fn is_unsized(&self) -> bool {
        self.size.is_none()
    }

    /// Types whose values may be compared with `==` and `!=`.
    pub fn can_compare_equality(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Bool | TypeKind::Byte | TypeKind::Function(_) | TypeKind::Pointer(_)
        ) || self.is_any_integer()
    }

    /// Types whose values may be compared with the ordering operators.
    pub fn can_compare_order(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Bool | TypeKind::Byte | TypeKind::Pointer(_)
        ) || self.is_any_integer()
    }

    /// Base type of a pointer, array, or slice type.
    pub fn base(&self) -> Option<TypeId> {
        match &self.kind {
            TypeKind::Pointer(base) | TypeKind::Slice(base) => Some(*base),
            TypeKind::Array(array) => Some(array.base),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionType> {
        match &self.kind {
            TypeKind::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayType> {
        match &self.kind {
            TypeKind::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructType> {
        match &self.kind {
            TypeKind::Struct(struct_) => Some(struct_),
            _ => None,
        }
    }

    /// Look up a member variable by name, returning its index in the
    /// declaration-ordered member list.
    pub fn struct_member_variable(&self, name: Atom) -> Option<(usize, &MemberVariable)> {
        self.as_struct()?
            .members
            .iter()
            .enumerate()
            .find(|(_, member)| member.name == name)
    }
}

impl IntType {
    /// Range for a sized integer of `size` bytes.
    pub fn with_width(signed: bool, size: u64) -> Self {
        let bits = size * 8;
        let (min, max) = if signed {
            (
                -(BigInt::from(1) << (bits - 1)),
                (BigInt::from(1) << (bits - 1)) - 1,
            )
        } else {
            (BigInt::from(0), (BigInt::from(1) << bits) - 1)
        };
        IntType { signed, min, max }
    }
}
