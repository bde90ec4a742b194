use super::Evaluator;
use num_bigint::BigInt;
use sable_common::ErrorKind;
use sable_tir::{BinaryOp, Context, Expr, ExprId, ExprKind, TypeId, UnaryOp, Value};

fn int_expr(ctx: &mut Context, type_: TypeId, value: i64) -> ExprId {
    ctx.alloc_expr(Expr {
        location: ctx.builtins.location,
        type_,
        kind: ExprKind::Integer(BigInt::from(value)),
    })
}

fn binary_expr(
    ctx: &mut Context,
    type_: TypeId,
    op: BinaryOp,
    lhs: ExprId,
    rhs: ExprId,
) -> ExprId {
    ctx.alloc_expr(Expr {
        location: ctx.builtins.location,
        type_,
        kind: ExprKind::Binary { op, lhs, rhs },
    })
}

fn expect_integer(value: &Value) -> &BigInt {
    let Value::Integer { value, .. } = value else {
        panic!("expected integer value");
    };
    value
}

#[test]
fn folds_arithmetic() {
    let mut ctx = Context::new();
    let u32_ = ctx.builtins.u32_;
    let two = int_expr(&mut ctx, u32_, 2);
    let three = int_expr(&mut ctx, u32_, 3);
    let four = int_expr(&mut ctx, u32_, 4);
    let product = binary_expr(&mut ctx, u32_, BinaryOp::Mul, two, three);
    let sum = binary_expr(&mut ctx, u32_, BinaryOp::Add, product, four);

    let value = Evaluator::new(&mut ctx).eval_rvalue(sum).unwrap();
    assert_eq!(expect_integer(&value), &BigInt::from(10));
}

#[test]
fn arithmetic_overflow_is_range_error() {
    let mut ctx = Context::new();
    let u8_ = ctx.builtins.u8_;
    let lhs = int_expr(&mut ctx, u8_, 200);
    let rhs = int_expr(&mut ctx, u8_, 100);
    let sum = binary_expr(&mut ctx, u8_, BinaryOp::Add, lhs, rhs);

    let err = Evaluator::new(&mut ctx).eval_rvalue(sum).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Range);
    assert!(err.message.contains("200 + 100 == 300"));
}

#[test]
fn division_truncates_and_rejects_zero() {
    let mut ctx = Context::new();
    let s32_ = ctx.builtins.s32_;
    let lhs = int_expr(&mut ctx, s32_, -7);
    let rhs = int_expr(&mut ctx, s32_, 2);
    let div = binary_expr(&mut ctx, s32_, BinaryOp::Div, lhs, rhs);
    let value = Evaluator::new(&mut ctx).eval_rvalue(div).unwrap();
    assert_eq!(expect_integer(&value), &BigInt::from(-3));

    let lhs = int_expr(&mut ctx, s32_, 1);
    let zero = int_expr(&mut ctx, s32_, 0);
    let div = binary_expr(&mut ctx, s32_, BinaryOp::Div, lhs, zero);
    let err = Evaluator::new(&mut ctx).eval_rvalue(div).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DivideByZero);
}

#[test]
fn untyped_integer_arithmetic_is_unbounded() {
    let mut ctx = Context::new();
    let integer = ctx.builtins.integer;
    let lhs = int_expr(&mut ctx, integer, i64::MAX);
    let rhs = int_expr(&mut ctx, integer, i64::MAX);
    let sum = binary_expr(&mut ctx, integer, BinaryOp::Add, lhs, rhs);

    let value = Evaluator::new(&mut ctx).eval_rvalue(sum).unwrap();
    assert_eq!(
        expect_integer(&value),
        &(BigInt::from(i64::MAX) + i64::MAX)
    );
}

#[test]
fn bitwise_ops_widen_to_type_size() {
    let mut ctx = Context::new();
    let s8_ = ctx.builtins.s8_;
    let zero = int_expr(&mut ctx, s8_, 0);
    let bitnot = ctx.alloc_expr(Expr {
        location: ctx.builtins.location,
        type_: s8_,
        kind: ExprKind::Unary {
            op: UnaryOp::Bitnot,
            rhs: zero,
        },
    });
    let value = Evaluator::new(&mut ctx).eval_rvalue(bitnot).unwrap();
    assert_eq!(expect_integer(&value), &BigInt::from(-1));

    let u16_ = ctx.builtins.u16_;
    let lhs = int_expr(&mut ctx, u16_, 0xFF00);
    let rhs = int_expr(&mut ctx, u16_, 0x0FF0);
    let and = binary_expr(&mut ctx, u16_, BinaryOp::Bitand, lhs, rhs);
    let value = Evaluator::new(&mut ctx).eval_rvalue(and).unwrap();
    assert_eq!(expect_integer(&value), &BigInt::from(0x0F00));
}

#[test]
fn shifts_stay_within_operand_width() {
    let mut ctx = Context::new();
    let u8_ = ctx.builtins.u8_;
    let usize_ = ctx.builtins.usize_;
    let lhs = int_expr(&mut ctx, u8_, 0x81);
    let amount = int_expr(&mut ctx, usize_, 1);
    let shl = binary_expr(&mut ctx, u8_, BinaryOp::Shl, lhs, amount);
    let value = Evaluator::new(&mut ctx).eval_rvalue(shl).unwrap();
    assert_eq!(expect_integer(&value), &BigInt::from(0x02));
}

#[test]
fn cast_sign_extends_from_signed_sources() {
    let mut ctx = Context::new();
    let s8_ = ctx.builtins.s8_;
    let u16_ = ctx.builtins.u16_;
    let minus_one = int_expr(&mut ctx, s8_, -1);
    let cast = ctx.alloc_expr(Expr {
        location: ctx.builtins.location,
        type_: u16_,
        kind: ExprKind::Cast { expr: minus_one },
    });
    let value = Evaluator::new(&mut ctx).eval_rvalue(cast).unwrap();
    assert_eq!(expect_integer(&value), &BigInt::from(0xFFFF));
}

#[test]
fn cast_zero_extends_from_unsigned_sources() {
    let mut ctx = Context::new();
    let u8_ = ctx.builtins.u8_;
    let s16_ = ctx.builtins.s16_;
    let high = int_expr(&mut ctx, u8_, 0xFF);
    let cast = ctx.alloc_expr(Expr {
        location: ctx.builtins.location,
        type_: s16_,
        kind: ExprKind::Cast { expr: high },
    });
    let value = Evaluator::new(&mut ctx).eval_rvalue(cast).unwrap();
    assert_eq!(expect_integer(&value), &BigInt::from(255));
}

#[test]
fn cast_to_bool_ors_all_bytes() {
    let mut ctx = Context::new();
    let u16_ = ctx.builtins.u16_;
    let bool_ = ctx.builtins.bool_;
    for (raw, expected) in [(0x0100, true), (0, false)] {
        let source = int_expr(&mut ctx, u16_, raw);
        let cast = ctx.alloc_expr(Expr {
            location: ctx.builtins.location,
            type_: bool_,
            kind: ExprKind::Cast { expr: source },
        });
        let value = Evaluator::new(&mut ctx).eval_rvalue(cast).unwrap();
        let Value::Boolean(boolean) = value else {
            panic!("expected boolean");
        };
        assert_eq!(boolean, expected);
    }
}

#[test]
fn array_literals_index_and_countof() {
    let mut ctx = Context::new();
    let u8_ = ctx.builtins.u8_;
    let usize_ = ctx.builtins.usize_;
    let array_type = ctx.unique_array(3, u8_);
    let elements = vec![
        int_expr(&mut ctx, u8_, 10),
        int_expr(&mut ctx, u8_, 20),
        int_expr(&mut ctx, u8_, 30),
    ];
    let array = ctx.alloc_expr(Expr {
        location: ctx.builtins.location,
        type_: array_type,
        kind: ExprKind::ArrayList {
            elements,
            ellipsis: None,
        },
    });

    let idx = int_expr(&mut ctx, usize_, 1);
    let index = ctx.alloc_expr(Expr {
        location: ctx.builtins.location,
        type_: u8_,
        kind: ExprKind::Index { lhs: array, idx },
    });
    let value = Evaluator::new(&mut ctx).eval_rvalue(index).unwrap();
    assert_eq!(expect_integer(&value), &BigInt::from(20));

    let countof = ctx.alloc_expr(Expr {
        location: ctx.builtins.location,
        type_: usize_,
        kind: ExprKind::Unary {
            op: UnaryOp::Countof,
            rhs: array,
        },
    });
    let value = Evaluator::new(&mut ctx).eval_rvalue(countof).unwrap();
    assert_eq!(expect_integer(&value), &BigInt::from(3));

    let oob = int_expr(&mut ctx, usize_, 3);
    let index = ctx.alloc_expr(Expr {
        location: ctx.builtins.location,
        type_: u8_,
        kind: ExprKind::Index { lhs: array, idx: oob },
    });
    let err = Evaluator::new(&mut ctx).eval_rvalue(index).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Range);
}

#[test]
fn ellipsis_fills_remaining_elements() {
    let mut ctx = Context::new();
    let u8_ = ctx.builtins.u8_;
    let array_type = ctx.unique_array(4, u8_);
    let first = int_expr(&mut ctx, u8_, 7);
    let fill = int_expr(&mut ctx, u8_, 9);
    let array = ctx.alloc_expr(Expr {
        location: ctx.builtins.location,
        type_: array_type,
        kind: ExprKind::ArrayList {
            elements: vec![first],
            ellipsis: Some(fill),
        },
    });
    let value = Evaluator::new(&mut ctx).eval_rvalue(array).unwrap();
    let Value::Array { elements, .. } = value else {
        panic!("expected array");
    };
    assert_eq!(elements.len(), 4);
    assert_eq!(expect_integer(&elements[3]), &BigInt::from(9));
}

#[test]
fn comparisons_produce_booleans() {
    let mut ctx = Context::new();
    let u32_ = ctx.builtins.u32_;
    let bool_ = ctx.builtins.bool_;
    let lhs = int_expr(&mut ctx, u32_, 2);
    let rhs = int_expr(&mut ctx, u32_, 3);
    let lt = binary_expr(&mut ctx, bool_, BinaryOp::Lt, lhs, rhs);
    let value = Evaluator::new(&mut ctx).eval_rvalue(lt).unwrap();
    assert!(matches!(value, Value::Boolean(true)));
}

#[test]
fn calls_are_rejected() {
    let mut ctx = Context::new();
    let void_ = ctx.builtins.void_;
    let usize_ = ctx.builtins.usize_;
    let callee = int_expr(&mut ctx, usize_, 0);
    let call = ctx.alloc_expr(Expr {
        location: ctx.builtins.location,
        type_: void_,
        kind: ExprKind::Call {
            function: callee,
            arguments: Vec::new(),
        },
    });
    let err = Evaluator::new(&mut ctx).eval_rvalue(call).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotConstant);
    assert!(err.message.contains("function call"));
}
