//! End-to-end resolution tests over real source text.

use num_bigint::BigInt;
use sable_common::ErrorKind;
use sable_resolver::resolve_source;
use sable_tir::{Address, Context, ModuleId, StmtKind, SymbolId, SymbolKind, Value};

fn resolve(source: &str) -> (Context, ModuleId) {
    let mut ctx = Context::new();
    let module = resolve_source(&mut ctx, source, "test.sable").expect("resolution failure");
    (ctx, module)
}

fn resolve_err(source: &str) -> Box<sable_common::Diagnostic> {
    let mut ctx = Context::new();
    resolve_source(&mut ctx, source, "test.sable").expect_err("expected resolution failure")
}

fn lookup(ctx: &Context, module: ModuleId, name: &str) -> SymbolId {
    let scope = ctx.module(module).symbols;
    let atom = ctx
        .interner
        .get(name)
        .unwrap_or_else(|| panic!("`{name}` was never interned"));
    ctx.lookup(scope, atom)
        .unwrap_or_else(|| panic!("`{name}` is not in scope"))
}

fn constant_value<'a>(ctx: &'a Context, module: ModuleId, name: &str) -> &'a Value {
    let symbol = lookup(ctx, module, name);
    let SymbolKind::Constant { value, .. } = &ctx.symbol(symbol).kind else {
        panic!("`{name}` is not a constant");
    };
    value
}

fn expect_integer(value: &Value) -> &BigInt {
    let Value::Integer { value, .. } = value else {
        panic!("expected integer value");
    };
    value
}

// ===== Literals and ranges =====

#[test]
fn out_of_range_typed_literal_is_rejected() {
    // S1: the literal is range-checked before any later pass runs.
    let err = resolve_err("const N: u16 = 300u8;");
    assert_eq!(err.kind, ErrorKind::Range);
    assert!(err.message.contains("300 > 255"), "{}", err.message);
}

#[test]
fn negative_literal_fills_signed_range() {
    // S2: the sign folds into the literal before the range check.
    let (ctx, module) = resolve("var a: s8 = -128s8;");
    let symbol = lookup(&ctx, module, "a");
    let SymbolKind::Variable { value, .. } = &ctx.symbol(symbol).kind else {
        panic!("expected variable");
    };
    let value = value.as_ref().expect("globals carry values");
    assert_eq!(expect_integer(value), &BigInt::from(-128));
}

#[test]
fn positive_literal_overflow_still_rejected() {
    let err = resolve_err("var a: s8 = 128s8;");
    assert_eq!(err.kind, ErrorKind::Range);
}

#[test]
fn untyped_literal_converts_with_range_check() {
    let (ctx, module) = resolve("const N: u16 = 300;");
    assert_eq!(
        expect_integer(constant_value(&ctx, module, "N")),
        &BigInt::from(300)
    );

    let err = resolve_err("const N: u8 = 300;");
    assert_eq!(err.kind, ErrorKind::Range);
    assert!(err.message.contains("out-of-range conversion"));
}

#[test]
fn character_literals_are_untyped_integers() {
    let (ctx, module) = resolve("const C: u8 = 'A';");
    assert_eq!(
        expect_integer(constant_value(&ctx, module, "C")),
        &BigInt::from(65)
    );
}

// ===== Constant folding =====

#[test]
fn constant_expressions_fold() {
    // S7: folded at resolve time into a u32 literal.
    let (ctx, module) = resolve("const X: u32 = 2u32 * 3u32 + 4u32;");
    let value = constant_value(&ctx, module, "X");
    assert_eq!(expect_integer(value), &BigInt::from(10));
    let Value::Integer { type_, .. } = value else {
        unreachable!();
    };
    assert_eq!(*type_, ctx.builtins.u32_);
}

#[test]
fn folded_overflow_is_range_error() {
    let err = resolve_err("const X: u8 = 200u8 + 100u8;");
    assert_eq!(err.kind, ErrorKind::Range);
    assert!(err.message.contains("200 + 100 == 300"));
}

#[test]
fn folded_divide_by_zero_is_diagnosed() {
    let err = resolve_err("const X: u32 = 1u32 / 0u32;");
    assert_eq!(err.kind, ErrorKind::DivideByZero);
}

#[test]
fn comparison_of_literals_folds_to_boolean() {
    let (ctx, module) = resolve("const B: bool = 3u32 < 4u32;");
    assert!(matches!(
        constant_value(&ctx, module, "B"),
        Value::Boolean(true)
    ));
}

// ===== Declarations and symbols =====

#[test]
fn redeclaration_cites_previous_site() {
    let err = resolve_err("const X: u32 = 1u32;\nconst X: u32 = 2u32;");
    assert_eq!(err.kind, ErrorKind::Redeclaration);
    assert!(err.message.contains("previously declared at"));
    assert!(err.message.contains("test.sable:1"));
}

#[test]
fn undeclared_identifier_is_diagnosed() {
    let err = resolve_err("const X: u32 = missing;");
    assert_eq!(err.kind, ErrorKind::UndeclaredIdentifier);
    assert!(err.message.contains("`missing`"));
}

#[test]
fn incompatible_initializer_type_is_diagnosed() {
    let err = resolve_err("const X: u32 = true;");
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
    assert!(err.message.contains("incompatible type `bool`"));
}

#[test]
fn declarations_resolve_in_dependency_order() {
    // B references A lexically before A is declared.
    let (ctx, module) = resolve("const B: u32 = A + 1u32;\nconst A: u32 = 41u32;");
    assert_eq!(
        expect_integer(constant_value(&ctx, module, "B")),
        &BigInt::from(42)
    );
}

#[test]
fn by_value_declaration_cycle_is_rejected() {
    let err = resolve_err("const A: u32 = B;\nconst B: u32 = A;");
    assert_eq!(err.kind, ErrorKind::CircularDependency);

    let err = resolve_err("struct T { var t: T; }");
    assert_eq!(err.kind, ErrorKind::CircularDependency);
}

#[test]
fn alias_binds_existing_type() {
    let (ctx, module) = resolve("alias Word = u32;\nconst X: Word = 7u32;");
    let symbol = lookup(&ctx, module, "Word");
    let SymbolKind::Type(type_) = ctx.symbol(symbol).kind else {
        panic!("expected type symbol");
    };
    assert_eq!(type_, ctx.builtins.u32_);
}

#[test]
fn uninit_global_reserves_zeroed_storage() {
    let (ctx, module) = resolve("var g: u64 = uninit;");
    let symbol = lookup(&ctx, module, "g");
    let SymbolKind::Variable { value, address, .. } = &ctx.symbol(symbol).kind else {
        panic!("expected variable");
    };
    assert!(value.is_none());
    assert!(matches!(address, Address::Static { .. }));
    assert!(ctx.static_symbols.contains(&symbol));
}

#[test]
fn uninit_requires_type_specification() {
    let err = resolve_err("var g = uninit;");
    assert_eq!(err.kind, ErrorKind::Syntax);
}

#[test]
fn unsized_declarations_are_rejected() {
    let err = resolve_err("var x: typeof(5) = 5;");
    assert_eq!(err.kind, ErrorKind::Unsized);

    let err = resolve_err("func f(x: any) void { return; }");
    assert_eq!(err.kind, ErrorKind::Unsized);
}

#[test]
fn extern_declarations_are_static_without_values() {
    let (ctx, module) = resolve(
        "extern var errno: s32;\n\
         extern func write(fd: s32, buf: *any, count: u64) s64;\n",
    );
    let errno = lookup(&ctx, module, "errno");
    let SymbolKind::Variable { value, .. } = &ctx.symbol(errno).kind else {
        panic!("expected variable");
    };
    assert!(value.is_none());

    let write = lookup(&ctx, module, "write");
    let SymbolKind::Function(function) = ctx.symbol(write).kind else {
        panic!("expected function");
    };
    assert!(ctx.function(function).is_extern);
    assert!(ctx.function(function).body.is_none());
    assert!(ctx.static_symbols.contains(&write));
}

// ===== Static storage =====

#[test]
fn static_registry_carries_byte_serializations() {
    // S5: the registry entry for A serializes to 01 02 03.
    let (ctx, module) = resolve("const A: [3]u8 = (:[3]u8)[1u8, 2u8, 3u8];");
    let symbol = lookup(&ctx, module, "A");
    assert!(ctx.static_symbols.contains(&symbol));
    let value = constant_value(&ctx, module, "A");
    assert_eq!(value.to_bytes(&ctx), vec![0x01, 0x02, 0x03]);
}

#[test]
fn bytes_literals_emit_nul_terminated_backing() {
    let (ctx, _) = resolve("const S: []byte = \"abc\";");
    let hidden = ctx
        .static_symbols
        .iter()
        .find(|&&symbol| ctx.name(ctx.symbol(symbol).name).starts_with("__bytes"))
        .copied()
        .expect("hidden bytes constant registered");
    let SymbolKind::Constant { value, .. } = &ctx.symbol(hidden).kind else {
        panic!("expected constant");
    };
    assert_eq!(value.to_bytes(&ctx), b"abc\0".to_vec());
}

#[test]
fn colliding_static_names_get_numeric_suffixes() {
    let (ctx, _) = resolve("const A: []byte = \"a\";\nconst B: []byte = \"b\";");
    let names: Vec<&str> = ctx
        .static_symbols
        .iter()
        .map(|&symbol| ctx.name(ctx.symbol_static_name(symbol)))
        .filter(|name| name.starts_with("__bytes"))
        .collect();
    assert_eq!(names, vec!["__bytes", "__bytes.1"]);
}

#[test]
fn function_locals_mangle_under_the_function_name() {
    let (ctx, _) = resolve(
        "func f() u32 {\n\
             const LOCAL: u32 = 3u32;\n\
             return LOCAL;\n\
         }\n",
    );
    let names: Vec<&str> = ctx
        .static_symbols
        .iter()
        .map(|&symbol| ctx.name(ctx.symbol_static_name(symbol)))
        .collect();
    assert!(names.contains(&"f.LOCAL"), "{names:?}");
}

#[test]
fn parameters_and_locals_get_frame_offsets() {
    let (ctx, module) = resolve(
        "func f(a: u32, b: u64) u64 {\n\
             var x: u32 = a;\n\
             return b;\n\
         }\n",
    );
    let symbol = lookup(&ctx, module, "f");
    let SymbolKind::Function(function) = ctx.symbol(symbol).kind else {
        panic!("expected function");
    };
    let function = ctx.function(function);

    // Rightmost parameter lowest: b at rbp+16, a above it, the return
    // slot above both.
    let offsets: Vec<i64> = function
        .parameters
        .iter()
        .map(|&parameter| match ctx.symbol(parameter).kind {
            SymbolKind::Variable {
                address: Address::Local { rbp_offset },
                ..
            } => rbp_offset,
            _ => panic!("expected local parameter"),
        })
        .collect();
    assert_eq!(offsets, vec![24, 16]);

    let return_symbol = function.return_symbol.expect("return slot");
    let SymbolKind::Variable {
        address: Address::Local { rbp_offset },
        ..
    } = ctx.symbol(return_symbol).kind
    else {
        panic!("expected local return slot");
    };
    assert_eq!(rbp_offset, 32);

    // One local, rounded to eight bytes below the frame pointer.
    assert_eq!(function.local_stack_offset, -8);
}

// ===== Functions and statements =====

#[test]
fn non_void_function_must_end_with_return() {
    // S4: an exhaustive if/else is not accepted as a terminator.
    let err = resolve_err(
        "func f(x: u32) u32 {\n\
             if x == 0u32 { return 1u32; } else { return x; }\n\
         }\n",
    );
    assert!(err.message.contains("does not end with a return statement"));

    // The same body with a trailing return is accepted.
    resolve(
        "func f(x: u32) u32 {\n\
             if x == 0u32 { return 1u32; }\n\
             return x;\n\
         }\n",
    );
}

#[test]
fn return_type_checking() {
    let err = resolve_err("func f() void { return 1u32; }");
    assert_eq!(err.kind, ErrorKind::TypeMismatch);

    let err = resolve_err("func f() u32 { return; }");
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
    assert!(err.message.contains("non-void return type"));
}

#[test]
fn mutually_recursive_functions_resolve() {
    resolve(
        "func even(n: u32) bool {\n\
             if n == 0u32 { return true; }\n\
             return odd(n - 1u32);\n\
         }\n\
         func odd(n: u32) bool {\n\
             if n == 0u32 { return false; }\n\
             return even(n - 1u32);\n\
         }\n",
    );
}

#[test]
fn assignment_requires_lvalue() {
    let err = resolve_err("func f() void { 1u32 = 2u32; return; }");
    assert_eq!(err.kind, ErrorKind::Lvalue);

    let err = resolve_err("func f() *u32 { return &3u32; }");
    assert_eq!(err.kind, ErrorKind::Lvalue);
}

#[test]
fn slicing_an_rvalue_array_is_rejected() {
    let err = resolve_err(
        "func f() void {\n\
             var s: []u8 = (:[2]u8)[1u8, 2u8][0u:1u];\n\
             return;\n\
         }\n",
    );
    assert_eq!(err.kind, ErrorKind::Lvalue);
    assert!(err.message.contains("rvalue array"));
}

#[test]
fn break_and_continue_require_a_loop() {
    let err = resolve_err("func f() void { break; return; }");
    assert_eq!(err.kind, ErrorKind::Syntax);
    let err = resolve_err("func f() void { continue; return; }");
    assert_eq!(err.kind, ErrorKind::Syntax);
}

#[test]
fn local_declarations_lower_to_assignments() {
    let (ctx, module) = resolve(
        "func f() u32 {\n\
             var x: u32 = 7u32;\n\
             var y: u32 = uninit;\n\
             y = x;\n\
             return y;\n\
         }\n",
    );
    let symbol = lookup(&ctx, module, "f");
    let SymbolKind::Function(function) = ctx.symbol(symbol).kind else {
        panic!("expected function");
    };
    let body = ctx.function(function).body.expect("completed body");
    let stmts = &ctx.block(body).stmts;
    // var x lowers to an assignment; the uninit declaration produces no
    // statement; then the explicit assignment and the return remain.
    assert_eq!(stmts.len(), 3);
    assert!(matches!(
        ctx.stmt(stmts[0]).kind,
        StmtKind::Assign { .. }
    ));
    assert!(matches!(
        ctx.stmt(stmts[1]).kind,
        StmtKind::Assign { .. }
    ));
    assert!(matches!(
        ctx.stmt(stmts[2]).kind,
        StmtKind::Return { .. }
    ));
}

#[test]
fn defer_chains_are_captured_by_return_and_break() {
    let (ctx, module) = resolve(
        "func f() void {\n\
             defer { dump 1u32; }\n\
             for true {\n\
                 defer { dump 2u32; }\n\
                 break;\n\
             }\n\
             return;\n\
         }\n",
    );
    let symbol = lookup(&ctx, module, "f");
    let SymbolKind::Function(function) = ctx.symbol(symbol).kind else {
        panic!("expected function");
    };
    let body = ctx.function(function).body.expect("completed body");
    let stmts = &ctx.block(body).stmts;

    let StmtKind::Defer { .. } = ctx.stmt(stmts[0]).kind else {
        panic!("expected outer defer");
    };
    let outer_defer = stmts[0];

    let StmtKind::ForExpr { body: loop_body, .. } = ctx.stmt(stmts[1]).kind else {
        panic!("expected loop");
    };
    let loop_stmts = &ctx.block(loop_body).stmts;
    let inner_defer = loop_stmts[0];
    assert!(matches!(
        ctx.stmt(inner_defer).kind,
        StmtKind::Defer { prev: Some(prev), .. } if prev == outer_defer
    ));

    // Break captures the chain head at its position and the head at loop
    // entry.
    let StmtKind::Break { defer, loop_defer } = ctx.stmt(loop_stmts[1]).kind else {
        panic!("expected break");
    };
    assert_eq!(defer, Some(inner_defer));
    assert_eq!(loop_defer, Some(outer_defer));

    // The return outside the loop sees only the outer defer.
    let StmtKind::Return { defer, .. } = ctx.stmt(stmts[2]).kind else {
        panic!("expected return");
    };
    assert_eq!(defer, Some(outer_defer));
}

#[test]
fn dump_rejects_unsized_operands() {
    let err = resolve_err("func f() void { dump 5; return; }");
    assert_eq!(err.kind, ErrorKind::Unsized);
}

// ===== Casts =====

#[test]
fn cast_pairs_are_enumerated() {
    // Integer <-> integer, bool <-> byte, pointer <-> usize all pass.
    resolve(
        "func f(p: *u32, n: usize) void {\n\
             var a: u8 = (:u8)65535u16;\n\
             var b: byte = (:byte)true;\n\
             var c: usize = (:usize)p;\n\
             var d: *u32 = (:*u32)n;\n\
             var e: bool = (:bool)0u32;\n\
             return;\n\
         }\n",
    );

    // Pointer to bool has no defined conversion.
    let err = resolve_err("func f(p: *u32) bool { return (:bool)p; }");
    assert_eq!(err.kind, ErrorKind::Cast);
    assert!(err.message.contains("invalid cast"));
}

#[test]
fn casts_involving_unsized_types_are_rejected() {
    let err = resolve_err("const X: u32 = (:u32)5;");
    assert_eq!(err.kind, ErrorKind::Cast);
    assert!(err.message.contains("unsized"));
}

#[test]
fn pointer_widens_implicitly_to_any() {
    resolve(
        "func take(p: *any) void { return; }\n\
         func f(x: *u32) void {\n\
             take(x);\n\
             return;\n\
         }\n",
    );
}

// ===== Structs =====

#[test]
fn struct_literals_check_their_field_lists() {
    let header = "struct P { var x: u32; var y: u32; }\n";

    resolve(&format!(
        "{header}const ORIGIN: P = (:P){{.x = 0u32, .y = 0u32}};"
    ));

    let err = resolve_err(&format!("{header}const p: P = (:P){{.x = 1u32}};"));
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
    assert!(err.message.contains("missing initializer"));

    let err = resolve_err(&format!(
        "{header}const p: P = (:P){{.x = 1u32, .x = 2u32, .y = 3u32}};"
    ));
    assert_eq!(err.kind, ErrorKind::Redeclaration);
    assert!(err.message.contains("duplicate initializer"));

    let err = resolve_err(&format!(
        "{header}const p: P = (:P){{.x = 1u32, .z = 2u32, .y = 3u32}};"
    ));
    assert_eq!(err.kind, ErrorKind::UndeclaredIdentifier);
    assert!(err.message.contains("does not have a member variable"));
}

#[test]
fn struct_constants_serialize_fields_at_offsets() {
    let (ctx, module) = resolve(
        "struct P { var x: u32; var y: u32; }\n\
         const ORIGIN: P = (:P){.x = 1u32, .y = 2u32};\n",
    );
    let value = constant_value(&ctx, module, "ORIGIN");
    assert_eq!(value.to_bytes(&ctx), vec![1, 0, 0, 0, 2, 0, 0, 0]);
}

#[test]
fn duplicate_members_are_rejected() {
    let err = resolve_err("struct S { var x: u32; var x: u32; }");
    assert_eq!(err.kind, ErrorKind::Redeclaration);
    assert!(err.message.contains("duplicate definition of member"));
}

#[test]
fn member_access_and_member_constants() {
    let (ctx, module) = resolve(
        "struct V {\n\
             var x: u32;\n\
             const LIMIT: u32 = 10u32;\n\
         }\n\
         const L: u32 = V::LIMIT;\n\
         func get_x(v: V) u32 { return v.x; }\n",
    );
    assert_eq!(
        expect_integer(constant_value(&ctx, module, "L")),
        &BigInt::from(10)
    );

    // Member constants are not values through dot access.
    let err = resolve_err(
        "struct V { const LIMIT: u32 = 10u32; var x: u32; }\n\
         func f(v: V) u32 { return v.LIMIT; }\n",
    );
    assert!(err.message.contains("member constant"));
}

#[test]
fn member_function_calls_take_implicit_self_pointer() {
    resolve(
        "struct Counter {\n\
             var count: u32;\n\
             func get(self: *Counter) u32 {\n\
                 return 0u32;\n\
             }\n\
         }\n\
         func f(c: Counter) u32 {\n\
             return c.get();\n\
         }\n",
    );

    // Wrong first parameter type is diagnosed against `*Counter`.
    let err = resolve_err(
        "struct Counter {\n\
             var count: u32;\n\
             func get(self: u32) u32 { return self; }\n\
         }\n\
         func f(c: Counter) u32 { return c.get(); }\n",
    );
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
    assert!(err.message.contains("first parameter"));
}

#[test]
fn mutually_referential_structs_resolve_through_pointers() {
    resolve(
        "struct A { var b: *B; }\n\
         struct B { var a: *A; }\n\
         var root: *A = uninit;\n",
    );
}

#[test]
fn extend_attaches_members_to_builtin_types() {
    resolve(
        "extend u32 const LIMIT: u32 = 10u32;\n\
         const L: u32 = u32::LIMIT;\n",
    );
}

// ===== Namespaces =====

#[test]
fn namespaces_nest_and_hold_declarations() {
    let (ctx, module) = resolve(
        "namespace a::b;\n\
         const N: u32 = 7u32;\n",
    );
    let scope = ctx.module(module).symbols;
    let a = ctx
        .lookup_local(scope, ctx.interner.get("a").unwrap())
        .expect("namespace a");
    let SymbolKind::Namespace(a_scope) = ctx.symbol(a).kind else {
        panic!("expected namespace");
    };
    let b = ctx
        .lookup_local(a_scope, ctx.interner.get("b").unwrap())
        .expect("namespace b");
    let SymbolKind::Namespace(b_scope) = ctx.symbol(b).kind else {
        panic!("expected namespace");
    };
    let n = ctx
        .lookup_local(b_scope, ctx.interner.get("N").unwrap())
        .expect("constant N");
    assert!(matches!(
        ctx.symbol(n).kind,
        SymbolKind::Constant { .. }
    ));
    assert_eq!(ctx.name(ctx.symbol(a).name), "a");
    assert_eq!(ctx.name(ctx.symbol(b).name), "a::b");
}

// ===== Types =====

#[test]
fn sizeof_and_alignof_resolve_to_usize_values() {
    let (ctx, module) = resolve(
        "const S: usize = sizeof(u64);\n\
         const A: usize = alignof(u16);\n\
         const W: usize = sizeof([4]u32);\n",
    );
    assert_eq!(
        expect_integer(constant_value(&ctx, module, "S")),
        &BigInt::from(8)
    );
    assert_eq!(
        expect_integer(constant_value(&ctx, module, "A")),
        &BigInt::from(2)
    );
    assert_eq!(
        expect_integer(constant_value(&ctx, module, "W")),
        &BigInt::from(16)
    );

    let err = resolve_err("const S: usize = sizeof(any);");
    assert_eq!(err.kind, ErrorKind::Unsized);
}

#[test]
fn array_counts_are_constant_expressions() {
    let (ctx, module) = resolve(
        "const N: usize = 2u;\n\
         const A: [N * 2u]u8 = (:[N * 2u]u8)[0u8...];\n",
    );
    let symbol = lookup(&ctx, module, "A");
    let SymbolKind::Constant { type_, .. } = ctx.symbol(symbol).kind else {
        panic!("expected constant");
    };
    assert_eq!(ctx.name(ctx.ty(type_).name), "[4]u8");
}

#[test]
fn array_literal_counts_must_match() {
    let err = resolve_err("const A: [3]u8 = (:[3]u8)[1u8, 2u8];");
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
    assert!(err.message.contains("expected 3"));
}

#[test]
fn slice_literals_synthesize_constant_backing_in_const_decls() {
    let (ctx, _) = resolve("const S: []u8 = (:[]u8)[1u8, 2u8];");
    let backing = ctx
        .static_symbols
        .iter()
        .find(|&&symbol| {
            ctx.name(ctx.symbol(symbol).name)
                .starts_with("__slice_elements")
        })
        .copied()
        .expect("backing array registered");
    let SymbolKind::Constant { value, .. } = &ctx.symbol(backing).kind else {
        panic!("slice backing inside a const decl is itself a constant");
    };
    assert_eq!(value.to_bytes(&ctx), vec![1, 2]);
}

#[test]
fn type_expressions_are_not_values() {
    let err = resolve_err("const X: u32 = u32;");
    assert!(err.message.contains("use of type"));
}
