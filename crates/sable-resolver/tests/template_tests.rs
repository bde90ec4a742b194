//! Template declaration and instantiation tests.

use sable_common::ErrorKind;
use sable_resolver::resolve_source;
use sable_tir::{Context, ModuleId, SymbolId, SymbolKind, TypeId, Value};

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
    let atom = ctx.interner.get(name).expect("name interned");
    ctx.lookup(scope, atom).expect("name in scope")
}

fn variable_type(ctx: &Context, module: ModuleId, name: &str) -> TypeId {
    let symbol = lookup(ctx, module, name);
    let SymbolKind::Variable { type_, .. } = ctx.symbol(symbol).kind else {
        panic!("`{name}` is not a variable");
    };
    type_
}

#[test]
fn struct_instantiations_share_the_resolved_type() {
    // S3: both pointers resolve to the same type id.
    let (ctx, module) = resolve(
        "struct T[[U]] { var x: U; }\n\
         var p: *T[[u32]] = uninit;\n\
         var q: *T[[u32]] = uninit;\n\
         var r: *T[[u16]] = uninit;\n",
    );
    let p = variable_type(&ctx, module, "p");
    let q = variable_type(&ctx, module, "q");
    let r = variable_type(&ctx, module, "r");
    assert_eq!(p, q);
    assert_ne!(p, r);
    assert_eq!(ctx.name(ctx.ty(p).name), "*T[[u32]]");
}

#[test]
fn function_instantiations_are_memoized() {
    let (ctx, module) = resolve(
        "func id[[T]](x: T) T { return x; }\n\
         var f: func(u32) u32 = id[[u32]];\n\
         var g: func(u32) u32 = id[[u32]];\n",
    );
    let f = lookup(&ctx, module, "f");
    let g = lookup(&ctx, module, "g");
    let handle = |symbol: SymbolId| -> sable_tir::FunctionId {
        let SymbolKind::Variable { value, .. } = &ctx.symbol(symbol).kind else {
            panic!("expected variable");
        };
        let Some(Value::Function(function)) = value else {
            panic!("expected function value");
        };
        *function
    };
    // Two references to the same instance resolve to the same function.
    assert_eq!(handle(f), handle(g));
}

#[test]
fn instances_resolve_with_bound_parameters() {
    let (ctx, module) = resolve(
        "struct Pair[[A, B]] {\n\
             var first: A;\n\
             var second: B;\n\
         }\n\
         var p: *Pair[[u8, u64]] = uninit;\n",
    );
    let pointer = variable_type(&ctx, module, "p");
    let base = ctx.ty(pointer).base().expect("pointer base");
    let members = &ctx.ty(base).as_struct().expect("struct instance").members;
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].type_, ctx.builtins.u8_);
    assert_eq!(members[1].type_, ctx.builtins.u64_);
    // u64 alignment: first at 0, second at 8.
    assert_eq!(members[1].offset, 8);
}

#[test]
fn self_referential_template_instantiation_terminates() {
    resolve(
        "struct List[[T]] {\n\
             var head: T;\n\
             var next: *List[[T]];\n\
         }\n\
         var l: *List[[u32]] = uninit;\n",
    );
}

#[test]
fn template_functions_instantiate_recursively_in_bodies() {
    // The template is visible under its own name inside the instance, so
    // a recursive call needs no qualification beyond its argument list.
    resolve(
        "func wrap[[T]](x: T) T {\n\
             return wrap[[T]](x);\n\
         }\n\
         var f: func(u8) u8 = wrap[[u8]];\n",
    );
}

#[test]
fn arity_mismatch_is_a_template_error() {
    let err = resolve_err(
        "struct T[[U]] { var x: U; }\n\
         var p: *T[[u32, u8]] = uninit;\n",
    );
    assert_eq!(err.kind, ErrorKind::Template);
    assert!(err.message.contains("expected 1 template argument(s)"));
}

#[test]
fn instantiating_a_non_template_is_a_template_error() {
    let err = resolve_err(
        "const C: u32 = 1u32;\n\
         var p: *C[[u32]] = uninit;\n",
    );
    assert_eq!(err.kind, ErrorKind::Template);
    assert!(err.message.contains("attempted template instantiation of constant"));
}

#[test]
fn uninstantiated_template_cannot_name_a_type() {
    let err = resolve_err(
        "struct T[[U]] { var x: U; }\n\
         var p: *T = uninit;\n",
    );
    assert_eq!(err.kind, ErrorKind::Template);
    assert!(err.message.contains("must be instantiated"));
}

#[test]
fn templates_are_not_expressions() {
    let err = resolve_err(
        "func id[[T]](x: T) T { return x; }\n\
         var f: func(u32) u32 = id;\n",
    );
    assert_eq!(err.kind, ErrorKind::Template);
    assert!(err.message.contains("use of template"));
}
