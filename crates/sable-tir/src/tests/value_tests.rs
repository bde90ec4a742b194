use super::Value;
use crate::context::Context;
use crate::types::TypeId;
use num_bigint::BigInt;

fn int_value(type_: TypeId, value: i64) -> Value {
    Value::Integer {
        type_,
        value: BigInt::from(value),
    }
}

#[test]
fn scalar_bytes_round_trip() {
    let ctx = Context::new();
    for value in [Value::Boolean(true), Value::Boolean(false)] {
        let bytes = value.to_bytes(&ctx);
        let back = Value::from_bytes(&ctx, ctx.builtins.bool_, &bytes).unwrap();
        assert!(value.eq(&back));
    }

    let byte = Value::Byte(0xA5);
    let back = Value::from_bytes(&ctx, ctx.builtins.byte, &byte.to_bytes(&ctx)).unwrap();
    assert!(byte.eq(&back));
}

#[test]
fn integer_bytes_round_trip() {
    let ctx = Context::new();
    let cases = [
        (ctx.builtins.u8_, 0i64),
        (ctx.builtins.u8_, 255),
        (ctx.builtins.s8_, -128),
        (ctx.builtins.s8_, 127),
        (ctx.builtins.u16_, 300),
        (ctx.builtins.s32_, -1),
        (ctx.builtins.u64_, i64::MAX),
        (ctx.builtins.ssize_, i64::MIN),
    ];
    for (type_, raw) in cases {
        let value = int_value(type_, raw);
        let bytes = value.to_bytes(&ctx);
        assert_eq!(bytes.len() as u64, ctx.ty(type_).size.unwrap());
        let back = Value::from_bytes(&ctx, type_, &bytes).unwrap();
        assert!(value.eq(&back), "round trip failed for {raw}");
    }
}

#[test]
fn integer_serialization_is_little_endian() {
    let ctx = Context::new();
    let value = int_value(ctx.builtins.u32_, 0x0102_0304);
    assert_eq!(value.to_bytes(&ctx), vec![0x04, 0x03, 0x02, 0x01]);

    let value = int_value(ctx.builtins.s16_, -2);
    assert_eq!(value.to_bytes(&ctx), vec![0xFE, 0xFF]);
}

#[test]
fn array_bytes_concatenate_elements() {
    let mut ctx = Context::new();
    let type_ = ctx.unique_array(3, ctx.builtins.u8_);
    let value = Value::Array {
        type_,
        elements: vec![
            int_value(ctx.builtins.u8_, 1),
            int_value(ctx.builtins.u8_, 2),
            int_value(ctx.builtins.u8_, 3),
        ],
    };
    assert_eq!(value.to_bytes(&ctx), vec![0x01, 0x02, 0x03]);

    let back = Value::from_bytes(&ctx, type_, &[1, 2, 3]).unwrap();
    let Value::Array { elements, .. } = back else {
        panic!("expected array");
    };
    assert_eq!(elements.len(), 3);
}

#[test]
fn struct_bytes_respect_offsets_and_padding() {
    let mut ctx = Context::new();
    let scope = ctx.new_scope(None);
    let name = ctx.interner.intern("Pair");
    let struct_ = ctx.new_struct_type(name, scope);
    let (a, b) = (ctx.interner.intern("a"), ctx.interner.intern("b"));
    ctx.struct_add_member_variable(struct_, a, ctx.builtins.byte);
    ctx.struct_add_member_variable(struct_, b, ctx.builtins.u16_);
    ctx.struct_finalize(struct_);

    let value = Value::Struct {
        type_: struct_,
        fields: vec![Value::Byte(0xAA), int_value(ctx.builtins.u16_, 0x0102)],
    };
    // byte at 0, one byte of padding, u16 at 2.
    assert_eq!(value.to_bytes(&ctx), vec![0xAA, 0x00, 0x02, 0x01]);

    let back = Value::from_bytes(&ctx, struct_, &[0xAA, 0x00, 0x02, 0x01]).unwrap();
    let Value::Struct { fields, .. } = back else {
        panic!("expected struct");
    };
    assert!(fields[0].eq(&Value::Byte(0xAA)));
}

#[test]
fn comparisons_follow_type_semantics() {
    let ctx = Context::new();
    let one = int_value(ctx.builtins.u32_, 1);
    let two = int_value(ctx.builtins.u32_, 2);
    assert!(one.lt(&two));
    assert!(two.gt(&one));
    assert!(!one.eq(&two));
    assert!(one.eq(&one.clone()));
    assert!(Value::Byte(3).lt(&Value::Byte(4)));
    assert!(Value::Boolean(false).lt(&Value::Boolean(true)));
}
