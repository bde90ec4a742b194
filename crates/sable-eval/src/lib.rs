//! Compile-time evaluator for the sable compiler front-end.
//!
//! A tree-walking interpreter over the typed IR. The resolver hands it
//! constant initializers, array counts, and foldable sub-expressions; the
//! result is a [`Value`] that either lands in a symbol table or is folded
//! back into the IR.
//!
//! Addresses have no byte representation at compile time (they are chosen
//! by the assembler and linker), so anything that would require one -
//! pointer casts, slice indexing, dereference, calls - is rejected with a
//! diagnostic rather than simulated.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use sable_common::int::{bit_binop, bit_not, bit_shl, bit_shr};
use sable_common::{ErrorKind, Fatal, SourceLocation};
use sable_tir::{
    Address, BinaryOp, Context, ExprId, ExprKind, SymbolKind, TypeId, TypeKind, UnaryOp, Value,
};

pub struct Evaluator<'ctx> {
    pub ctx: &'ctx mut Context,
}

impl<'ctx> Evaluator<'ctx> {
    pub fn new(ctx: &'ctx mut Context) -> Self {
        Evaluator { ctx }
    }

    /// True when `value` falls outside the representable range of `type_`.
    /// The untyped integer type is unbounded.
    fn out_of_range(&self, type_: TypeId, value: &BigInt) -> bool {
        match &self.ctx.ty(type_).kind {
            TypeKind::Int(int) => *value < int.min || *value > int.max,
            _ => false,
        }
    }

    fn range_error(
        &self,
        location: SourceLocation,
        operation: String,
        result: &BigInt,
    ) -> Fatal {
        self.ctx.error(
            ErrorKind::Range,
            location,
            format!("arithmetic operation produces out-of-range result ({operation} == {result})"),
        )
    }

    /// Reduce an expression to its compile-time value.
    pub fn eval_rvalue(&mut self, expr: ExprId) -> Result<Value, Fatal> {
        let location = self.ctx.expr(expr).location;
        let type_ = self.ctx.expr(expr).type_;
        match self.ctx.expr(expr).kind.clone() {
            ExprKind::Symbol(symbol) => match &self.ctx.symbol(symbol).kind {
                SymbolKind::Constant { value, .. } => Ok(value.clone()),
                SymbolKind::Function(function) => Ok(Value::Function(*function)),
                _ => Err(self.ctx.error(
                    ErrorKind::NotConstant,
                    location,
                    format!(
                        "identifier `{}` is not a constant",
                        self.ctx.name(self.ctx.symbol(symbol).name)
                    ),
                )),
            },
            ExprKind::Boolean(boolean) => Ok(Value::Boolean(boolean)),
            ExprKind::Integer(integer) => {
                if matches!(self.ctx.ty(type_).kind, TypeKind::Byte) {
                    let byte = integer.to_u8().expect("byte literal range-checked");
                    return Ok(Value::Byte(byte));
                }
                Ok(Value::Integer {
                    type_,
                    value: integer,
                })
            }
            ExprKind::Bytes { address, count } => {
                let byte_pointer = self.ctx.unique_pointer(self.ctx.builtins.byte);
                Ok(Value::Slice {
                    type_,
                    pointer: Box::new(Value::Pointer {
                        type_: byte_pointer,
                        address,
                    }),
                    count: Box::new(Value::Integer {
                        type_: self.ctx.builtins.usize_,
                        value: BigInt::from(count),
                    }),
                })
            }
            ExprKind::ArrayList { elements, ellipsis } => {
                let mut evaled = Vec::with_capacity(elements.len());
                for element in &elements {
                    evaled.push(self.eval_rvalue(*element)?);
                }
                if let Some(ellipsis) = ellipsis {
                    let fill = self.eval_rvalue(ellipsis)?;
                    let count = self
                        .ctx
                        .ty(type_)
                        .as_array()
                        .expect("array literal of array type")
                        .count;
                    for _ in evaled.len() as u64..count {
                        evaled.push(fill.clone());
                    }
                }
                Ok(Value::Array {
                    type_,
                    elements: evaled,
                })
            }
            ExprKind::SliceList { backing, elements } => {
                let backing_symbol = self.ctx.symbol(backing);
                let Some(Address::Static { .. }) = backing_symbol.address() else {
                    return Err(self.ctx.error(
                        ErrorKind::NotConstant,
                        location,
                        "constant expression contains slice literal with non-static storage",
                    ));
                };
                let address = backing_symbol.address().expect("checked above");
                let base = self
                    .ctx
                    .ty(type_)
                    .base()
                    .expect("slice literal of slice type");
                let pointer_type = self.ctx.unique_pointer(base);
                Ok(Value::Slice {
                    type_,
                    pointer: Box::new(Value::Pointer {
                        type_: pointer_type,
                        address,
                    }),
                    count: Box::new(Value::Integer {
                        type_: self.ctx.builtins.usize_,
                        value: BigInt::from(elements.len()),
                    }),
                })
            }
            ExprKind::Slice { pointer, count } => {
                let pointer = self.eval_rvalue(pointer)?;
                let count = self.eval_rvalue(count)?;
                Ok(Value::Slice {
                    type_,
                    pointer: Box::new(pointer),
                    count: Box::new(count),
                })
            }
            ExprKind::Struct { fields } => {
                let mut evaled = Vec::with_capacity(fields.len());
                for field in &fields {
                    evaled.push(self.eval_rvalue(*field)?);
                }
                Ok(Value::Struct {
                    type_,
                    fields: evaled,
                })
            }
            ExprKind::Cast { expr: operand } => self.eval_cast(location, type_, operand),
            ExprKind::Syscall { .. } => Err(self.ctx.error(
                ErrorKind::NotConstant,
                location,
                "constant expression contains system call",
            )),
            ExprKind::Call { .. } => Err(self.ctx.error(
                ErrorKind::NotConstant,
                location,
                "constant expression contains function call",
            )),
            ExprKind::Index { lhs, idx } => self.eval_index(location, lhs, idx),
            ExprKind::AccessSlice { lhs, begin, end } => {
                self.eval_access_slice(location, type_, lhs, begin, end)
            }
            ExprKind::MemberVariable { lhs, member } => {
                let lhs = self.eval_rvalue(lhs)?;
                let Value::Struct { mut fields, .. } = lhs else {
                    unreachable!("member access on non-struct value");
                };
                Ok(fields.swap_remove(member))
            }
            ExprKind::Sizeof { operand } => Ok(Value::Integer {
                type_: self.ctx.builtins.usize_,
                value: BigInt::from(self.ctx.ty(operand).size.expect("sizeof of sized type")),
            }),
            ExprKind::Alignof { operand } => Ok(Value::Integer {
                type_: self.ctx.builtins.usize_,
                value: BigInt::from(self.ctx.ty(operand).align.expect("alignof of sized type")),
            }),
            ExprKind::Unary { op, rhs } => self.eval_unary(location, type_, op, rhs),
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(location, type_, op, lhs, rhs),
        }
    }

    fn eval_cast(
        &mut self,
        location: SourceLocation,
        type_: TypeId,
        operand: ExprId,
    ) -> Result<Value, Fatal> {
        let from = self.eval_rvalue(operand)?;
        let from_type = from.type_of(self.ctx);

        if matches!(self.ctx.ty(from_type).kind, TypeKind::Pointer(_)) {
            return Err(self.ctx.error(
                ErrorKind::Cast,
                location,
                "constant expression contains cast from pointer type",
            ));
        }
        if matches!(self.ctx.ty(type_).kind, TypeKind::Pointer(_)) {
            return Err(self.ctx.error(
                ErrorKind::Cast,
                location,
                "constant expression contains cast to pointer type",
            ));
        }
        // Function-to-function casts carry the handle through unchanged;
        // there are no bytes to reinterpret.
        if matches!(self.ctx.ty(type_).kind, TypeKind::Function(_)) {
            debug_assert!(matches!(from, Value::Function(_)));
            return Ok(from);
        }

        let bytes = from.to_bytes(self.ctx);
        match &self.ctx.ty(type_).kind {
            TypeKind::Bool => Ok(Value::Boolean(bytes.iter().any(|&b| b != 0))),
            TypeKind::Byte => Ok(Value::Byte(bytes[0])),
            TypeKind::Int(int) => {
                // Widen (or narrow) with the extension bit computed from
                // the source's signedness and top bit.
                let extend = self.ctx.ty(from_type).is_signed_integer()
                    && bytes.last().is_some_and(|&b| b & 0x80 != 0);
                let size = self.ctx.ty(type_).size.expect("sized integer cast target") as usize;
                let mut widened = bytes;
                widened.resize(size, if extend { 0xFF } else { 0x00 });
                widened.truncate(size);
                let value = sable_common::int::from_twos_complement(&widened, int.signed);
                Ok(Value::Integer { type_, value })
            }
            _ => unreachable!("cast target rejected by the resolver"),
        }
    }

    fn eval_index(
        &mut self,
        location: SourceLocation,
        lhs: ExprId,
        idx: ExprId,
    ) -> Result<Value, Fatal> {
        let idx_location = self.ctx.expr(idx).location;
        let lhs_value = self.eval_rvalue(lhs)?;
        let idx_value = self.eval_rvalue(idx)?;
        let idx_uz = self.expect_usize(idx_location, &idx_value)?;

        match lhs_value {
            Value::Array {
                type_,
                mut elements,
            } => {
                let count = self
                    .ctx
                    .ty(type_)
                    .as_array()
                    .expect("array value of array type")
                    .count;
                if idx_uz >= count {
                    return Err(self.ctx.error(
                        ErrorKind::Range,
                        idx_location,
                        format!("index out-of-bounds (array count is {count}, received {idx_uz})"),
                    ));
                }
                Ok(elements.swap_remove(idx_uz as usize))
            }
            Value::Slice { type_, .. } => {
                // A slice is a (pointer, count) pair; indexing it would be
                // a dereference, which compile-time expressions cannot do.
                Err(self.ctx.error(
                    ErrorKind::NotConstant,
                    location,
                    format!(
                        "indexing with left-hand-type `{}` not supported in compile-time expressions",
                        self.ctx.name(self.ctx.ty(type_).name)
                    ),
                ))
            }
            _ => unreachable!("index into non-array, non-slice value"),
        }
    }

    fn eval_access_slice(
        &mut self,
        location: SourceLocation,
        type_: TypeId,
        lhs: ExprId,
        begin: ExprId,
        end: ExprId,
    ) -> Result<Value, Fatal> {
        let lhs_type = self.ctx.expr(lhs).type_;
        if matches!(self.ctx.ty(lhs_type).kind, TypeKind::Slice(_)) {
            return Err(self.ctx.error(
                ErrorKind::NotConstant,
                location,
                format!(
                    "slicing with left-hand-type `{}` not supported in compile-time expressions",
                    self.ctx.name(self.ctx.ty(lhs_type).name)
                ),
            ));
        }

        let begin_location = self.ctx.expr(begin).location;
        let end_location = self.ctx.expr(end).location;
        let begin_value = self.eval_rvalue(begin)?;
        let end_value = self.eval_rvalue(end)?;
        let begin_uz = self.expect_usize(begin_location, &begin_value)?;
        let end_uz = self.expect_usize(end_location, &end_value)?;

        let count = self
            .ctx
            .ty(lhs_type)
            .as_array()
            .expect("slice of non-array checked above")
            .count;
        if begin_uz >= count {
            return Err(self.ctx.error(
                ErrorKind::Range,
                begin_location,
                format!("index out-of-bounds (array count is {count}, received {begin_uz})"),
            ));
        }
        if end_uz > count {
            return Err(self.ctx.error(
                ErrorKind::Range,
                end_location,
                format!("index out-of-bounds (array count is {count}, received {end_uz})"),
            ));
        }
        if begin_uz > end_uz {
            return Err(self.ctx.error(
                ErrorKind::Range,
                begin_location,
                format!("slice begin {begin_uz} exceeds slice end {end_uz}"),
            ));
        }

        let base = self.ctx.ty(type_).base().expect("slice result type");
        let base_size = self.ctx.ty(base).size.expect("sized slice base");
        let mut pointer = self.eval_lvalue(lhs)?;
        let Value::Pointer { type_: ref mut pointer_type, ref mut address } = pointer else {
            unreachable!("lvalue evaluation yields a pointer");
        };
        *pointer_type = self.ctx.unique_pointer(base);
        let Address::Static { offset, .. } = address else {
            unreachable!("compile-time lvalues are static");
        };
        *offset += begin_uz * base_size;

        Ok(Value::Slice {
            type_,
            pointer: Box::new(pointer),
            count: Box::new(Value::Integer {
                type_: self.ctx.builtins.usize_,
                value: BigInt::from(end_uz - begin_uz),
            }),
        })
    }

    fn eval_unary(
        &mut self,
        location: SourceLocation,
        type_: TypeId,
        op: UnaryOp,
        rhs: ExprId,
    ) -> Result<Value, Fatal> {
        match op {
            UnaryOp::Not => {
                let rhs = self.eval_rvalue(rhs)?;
                let Value::Boolean(boolean) = rhs else {
                    unreachable!("logical not on non-boolean value");
                };
                Ok(Value::Boolean(!boolean))
            }
            UnaryOp::Pos => self.eval_rvalue(rhs),
            UnaryOp::Neg => {
                let rhs = self.eval_rvalue(rhs)?;
                let Value::Integer { value, .. } = rhs else {
                    unreachable!("negation of non-integer value");
                };
                let result = -&value;
                if self.out_of_range(type_, &result) {
                    return Err(self.range_error(location, format!("-({value})"), &result));
                }
                Ok(Value::Integer {
                    type_,
                    value: result,
                })
            }
            UnaryOp::Bitnot => {
                let rhs = self.eval_rvalue(rhs)?;
                match rhs {
                    Value::Byte(byte) => Ok(Value::Byte(!byte)),
                    Value::Integer { type_, value } => {
                        let size =
                            self.ctx.ty(type_).size.expect("sized bitwise operand") as usize;
                        let signed = self.ctx.ty(type_).is_signed_integer();
                        Ok(Value::Integer {
                            type_,
                            value: bit_not(&value, size, signed),
                        })
                    }
                    _ => unreachable!("bitwise not on unsupported value"),
                }
            }
            UnaryOp::Dereference => Err(self.ctx.error(
                ErrorKind::NotConstant,
                location,
                "dereference operator not supported in compile-time expressions",
            )),
            UnaryOp::Addressof => self.eval_lvalue(rhs),
            UnaryOp::Countof => {
                let rhs_value = self.eval_rvalue(rhs)?;
                let count = match rhs_value {
                    Value::Array { type_, .. } => BigInt::from(
                        self.ctx
                            .ty(type_)
                            .as_array()
                            .expect("array value of array type")
                            .count,
                    ),
                    Value::Slice { count, .. } => {
                        let Value::Integer { value, .. } = *count else {
                            unreachable!("slice count is a usize value");
                        };
                        value
                    }
                    _ => unreachable!("countof on unsupported value"),
                };
                Ok(Value::Integer {
                    type_: self.ctx.builtins.usize_,
                    value: count,
                })
            }
        }
    }

    fn eval_binary(
        &mut self,
        location: SourceLocation,
        type_: TypeId,
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    ) -> Result<Value, Fatal> {
        // Logical operators short-circuit; everything else evaluates both
        // sides first.
        if matches!(op, BinaryOp::Or | BinaryOp::And) {
            let Value::Boolean(lhs) = self.eval_rvalue(lhs)? else {
                unreachable!("logical operator on non-boolean value");
            };
            let short = match op {
                BinaryOp::Or => lhs,
                BinaryOp::And => !lhs,
                _ => unreachable!(),
            };
            if short {
                return Ok(Value::Boolean(lhs));
            }
            let Value::Boolean(rhs) = self.eval_rvalue(rhs)? else {
                unreachable!("logical operator on non-boolean value");
            };
            return Ok(Value::Boolean(rhs));
        }

        let lhs = self.eval_rvalue(lhs)?;
        let rhs = self.eval_rvalue(rhs)?;

        match op {
            BinaryOp::Eq => Ok(Value::Boolean(lhs.eq(&rhs))),
            BinaryOp::Ne => Ok(Value::Boolean(!lhs.eq(&rhs))),
            BinaryOp::Le => Ok(Value::Boolean(lhs.lt(&rhs) || lhs.eq(&rhs))),
            BinaryOp::Lt => Ok(Value::Boolean(lhs.lt(&rhs))),
            BinaryOp::Ge => Ok(Value::Boolean(lhs.gt(&rhs) || lhs.eq(&rhs))),
            BinaryOp::Gt => Ok(Value::Boolean(lhs.gt(&rhs))),
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
                let (Value::Integer { value: a, .. }, Value::Integer { value: b, .. }) =
                    (&lhs, &rhs)
                else {
                    unreachable!("arithmetic on non-integer values");
                };
                let (result, symbol) = match op {
                    BinaryOp::Add => (a + b, "+"),
                    BinaryOp::Sub => (a - b, "-"),
                    BinaryOp::Mul => (a * b, "*"),
                    _ => unreachable!(),
                };
                if self.out_of_range(type_, &result) {
                    return Err(self.range_error(location, format!("{a} {symbol} {b}"), &result));
                }
                Ok(Value::Integer {
                    type_,
                    value: result,
                })
            }
            BinaryOp::Div => {
                let (Value::Integer { value: a, .. }, Value::Integer { value: b, .. }) =
                    (&lhs, &rhs)
                else {
                    unreachable!("arithmetic on non-integer values");
                };
                if b.is_zero() {
                    return Err(self.ctx.error(
                        ErrorKind::DivideByZero,
                        location,
                        format!("divide by zero ({a} / {b})"),
                    ));
                }
                // BigInt division truncates toward zero, matching the
                // target machine's division.
                let result = a / b;
                if self.out_of_range(type_, &result) {
                    return Err(self.range_error(location, format!("{a} / {b}"), &result));
                }
                Ok(Value::Integer {
                    type_,
                    value: result,
                })
            }
            BinaryOp::Shl | BinaryOp::Shr => {
                let (Value::Integer { value: a, type_: lhs_type }, Value::Integer { value: b, .. }) =
                    (&lhs, &rhs)
                else {
                    unreachable!("shift on non-integer values");
                };
                let size = self.ctx.ty(*lhs_type).size.expect("sized shift operand") as usize;
                let signed = self.ctx.ty(*lhs_type).is_signed_integer();
                let amount = b.to_u64().unwrap_or(u64::MAX);
                let result = match op {
                    BinaryOp::Shl => bit_shl(a, amount, size, signed),
                    BinaryOp::Shr => bit_shr(a, amount, size, signed),
                    _ => unreachable!(),
                };
                Ok(Value::Integer {
                    type_,
                    value: result,
                })
            }
            BinaryOp::Bitor | BinaryOp::Bitxor | BinaryOp::Bitand => {
                self.eval_bitwise(op, type_, lhs, rhs)
            }
            BinaryOp::Or | BinaryOp::And => unreachable!("handled above"),
        }
    }

    fn eval_bitwise(
        &mut self,
        op: BinaryOp,
        type_: TypeId,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value, Fatal> {
        let combine: fn(u8, u8) -> u8 = match op {
            BinaryOp::Bitor => |a, b| a | b,
            BinaryOp::Bitxor => |a, b| a ^ b,
            BinaryOp::Bitand => |a, b| a & b,
            _ => unreachable!(),
        };
        match (lhs, rhs) {
            (Value::Boolean(a), Value::Boolean(b)) => {
                Ok(Value::Boolean(combine(u8::from(a), u8::from(b)) != 0))
            }
            (Value::Byte(a), Value::Byte(b)) => Ok(Value::Byte(combine(a, b))),
            (Value::Integer { value: a, .. }, Value::Integer { value: b, .. }) => {
                let size = self.ctx.ty(type_).size.expect("sized bitwise operand") as usize;
                let signed = self.ctx.ty(type_).is_signed_integer();
                Ok(Value::Integer {
                    type_,
                    value: bit_binop(&a, &b, size, signed, combine),
                })
            }
            _ => unreachable!("bitwise operator on unsupported values"),
        }
    }

    /// Evaluate an lvalue expression to a pointer value with a static
    /// address.
    pub fn eval_lvalue(&mut self, expr: ExprId) -> Result<Value, Fatal> {
        debug_assert!(self.ctx.expr_is_lvalue(expr));
        let location = self.ctx.expr(expr).location;
        match self.ctx.expr(expr).kind.clone() {
            ExprKind::Symbol(symbol) => {
                let address = self
                    .ctx
                    .symbol(symbol)
                    .address()
                    .expect("variable and constant symbols are addressed");
                if !matches!(address, Address::Static { .. }) {
                    return Err(self.ctx.error(
                        ErrorKind::NotConstant,
                        location,
                        "addressof operator applied to non-static object in compile-time expression",
                    ));
                }
                let type_ = self
                    .ctx
                    .symbol(symbol)
                    .type_of(self.ctx.functions())
                    .expect("variable and constant symbols are typed");
                let pointer_type = self.ctx.unique_pointer(type_);
                Ok(Value::Pointer {
                    type_: pointer_type,
                    address,
                })
            }
            ExprKind::Index { lhs, idx } => {
                let idx_location = self.ctx.expr(idx).location;
                let lhs_pointer = self.eval_lvalue(lhs)?;
                let idx_value = self.eval_rvalue(idx)?;
                let idx_uz = self.expect_usize(idx_location, &idx_value)?;

                let array_type = self.ctx.expr(lhs).type_;
                let Some(array) = self.ctx.ty(array_type).as_array() else {
                    // Indexing a slice dereferences its pointer.
                    return Err(self.ctx.error(
                        ErrorKind::NotConstant,
                        location,
                        format!(
                            "indexing with left-hand-type `{}` not supported in compile-time expressions",
                            self.ctx.name(self.ctx.ty(array_type).name)
                        ),
                    ));
                };
                let (count, element_type) = (array.count, array.base);
                if idx_uz >= count {
                    return Err(self.ctx.error(
                        ErrorKind::Range,
                        idx_location,
                        format!("index out-of-bounds (array count is {count}, received {idx_uz})"),
                    ));
                }

                let element_size = self.ctx.ty(element_type).size.expect("sized array element");
                let Value::Pointer { address, .. } = lhs_pointer else {
                    unreachable!("lvalue evaluation yields a pointer");
                };
                let Address::Static { name, offset } = address else {
                    unreachable!("compile-time lvalues are static");
                };
                let pointer_type = self.ctx.unique_pointer(element_type);
                Ok(Value::Pointer {
                    type_: pointer_type,
                    address: Address::Static {
                        name,
                        offset: offset + element_size * idx_uz,
                    },
                })
            }
            ExprKind::Unary {
                op: UnaryOp::Dereference,
                ..
            } => Err(self.ctx.error(
                ErrorKind::NotConstant,
                location,
                "dereference operator not supported in compile-time expressions",
            )),
            _ => unreachable!("expression is not an lvalue"),
        }
    }

    fn expect_usize(&self, location: SourceLocation, value: &Value) -> Result<u64, Fatal> {
        let Value::Integer { value, .. } = value else {
            unreachable!("index expressions are usize-typed");
        };
        if value.is_negative() {
            unreachable!("usize values are non-negative");
        }
        value.to_u64().ok_or_else(|| {
            self.ctx.error(
                ErrorKind::Range,
                location,
                format!("index out-of-range (received {value})"),
            )
        })
    }
}

#[cfg(test)]
#[path = "tests/eval_tests.rs"]
mod tests;
