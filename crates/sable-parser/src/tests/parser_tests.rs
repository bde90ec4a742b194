use super::parse_module;
use crate::cst::{BinaryOp, DeclKind, Expr, ExprKind, Module, StmtKind, TypeSpecKind, UnaryOp};
use sable_common::{Fatal, Interner};

fn parse(source: &str) -> Module {
    let mut interner = Interner::new();
    parse_module(source, "test.sable", &mut interner).expect("parse failure")
}

fn parse_err(source: &str) -> Fatal {
    let mut interner = Interner::new();
    parse_module(source, "test.sable", &mut interner).expect_err("expected parse failure")
}

fn parse_expr_text(source: &str) -> Expr {
    // Wrap in a statement so the expression grammar gets a full drive.
    let module = parse(&format!("func f() void {{ {source}; return; }}"));
    let DeclKind::Function(func) = &module.decls[0].kind else {
        panic!("expected function");
    };
    let StmtKind::Expr(expr) = &func.body.stmts[0].kind else {
        panic!("expected expression statement");
    };
    expr.clone()
}

#[test]
fn parses_module_shape() {
    let module = parse(
        "namespace a::b;\n\
         import \"std\";\n\
         const N: u32 = 1u32;\n\
         var x = 2u32;\n\
         func id(n: u32) u32 { return n; }\n",
    );
    let ns = module.namespace.as_ref().expect("namespace");
    assert_eq!(ns.identifiers.len(), 2);
    assert_eq!(module.imports.len(), 1);
    assert_eq!(module.imports[0].path, "std");
    assert_eq!(module.decls.len(), 3);
    assert!(matches!(module.decls[0].kind, DeclKind::Constant { .. }));
    assert!(matches!(module.decls[1].kind, DeclKind::Variable { .. }));
    assert!(matches!(module.decls[2].kind, DeclKind::Function(_)));
}

#[test]
fn parses_struct_with_members() {
    let module = parse(
        "struct Point {\n\
             var x: u32;\n\
             var y: u32;\n\
             const ORIGIN_X: u32 = 0u32;\n\
             func norm(self: *Point) u32 { return 0u32; }\n\
         }\n",
    );
    let DeclKind::Struct(decl) = &module.decls[0].kind else {
        panic!("expected struct");
    };
    assert_eq!(decl.members.len(), 4);
}

#[test]
fn precedence_product_binds_tighter_than_sum() {
    let expr = parse_expr_text("a + b * c");
    let ExprKind::Binary { op, rhs, .. } = expr.kind else {
        panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::Add);
    assert!(matches!(
        rhs.kind,
        ExprKind::Binary {
            op: BinaryOp::Mul,
            ..
        }
    ));
}

#[test]
fn comparison_binds_looser_than_arithmetic() {
    let expr = parse_expr_text("a + b == c");
    assert!(matches!(
        expr.kind,
        ExprKind::Binary {
            op: BinaryOp::Eq,
            ..
        }
    ));
}

#[test]
fn unary_and_postfix() {
    let expr = parse_expr_text("-x[0u]");
    let ExprKind::Unary { op, rhs, .. } = expr.kind else {
        panic!("expected unary");
    };
    assert_eq!(op, UnaryOp::Neg);
    assert!(matches!(rhs.kind, ExprKind::AccessIndex { .. }));
}

#[test]
fn nested_index_splits_double_rbracket() {
    let expr = parse_expr_text("a[b[0u]]");
    let ExprKind::AccessIndex { idx, .. } = expr.kind else {
        panic!("expected index");
    };
    assert!(matches!(idx.kind, ExprKind::AccessIndex { .. }));
}

#[test]
fn parses_typed_literal_forms() {
    assert!(matches!(
        parse_expr_text("(:[3]u8)[1u8, 2u8, 3u8]").kind,
        ExprKind::ArrayList { .. }
    ));
    assert!(matches!(
        parse_expr_text("(:[4]u8)[0u8...]").kind,
        ExprKind::ArrayList {
            ellipsis: Some(_),
            ..
        }
    ));
    assert!(matches!(
        parse_expr_text("(:[]u8)[1u8, 2u8]").kind,
        ExprKind::SliceList { .. }
    ));
    assert!(matches!(
        parse_expr_text("(:[]u8){p, 2u}").kind,
        ExprKind::Slice { .. }
    ));
    assert!(matches!(
        parse_expr_text("(:Point){.x = 1u32, .y = 2u32}").kind,
        ExprKind::Struct { .. }
    ));
    assert!(matches!(
        parse_expr_text("(:u8)x").kind,
        ExprKind::Cast { .. }
    ));
    assert!(matches!(
        parse_expr_text("(x)").kind,
        ExprKind::Grouped { .. }
    ));
}

#[test]
fn parses_qualified_symbols_and_templates() {
    let expr = parse_expr_text("std::vec[[u32]]::new");
    let ExprKind::Symbol(path) = expr.kind else {
        panic!("expected symbol");
    };
    assert!(!path.is_from_root);
    assert_eq!(path.elements.len(), 3);
    assert_eq!(path.elements[1].template_arguments.len(), 1);

    let expr = parse_expr_text("::top");
    let ExprKind::Symbol(path) = expr.kind else {
        panic!("expected symbol");
    };
    assert!(path.is_from_root);
}

#[test]
fn parses_statements() {
    let module = parse(
        "func f(n: u32) void {\n\
             var i: u32 = 0u32;\n\
             i = n;\n\
             if i == 0u32 { return; } elif true { dump i; } else { }\n\
             for it in 0u:10u { continue; }\n\
             for true { break; }\n\
             defer { dump i; }\n\
             return;\n\
         }\n",
    );
    let DeclKind::Function(func) = &module.decls[0].kind else {
        panic!("expected function");
    };
    let kinds: Vec<&StmtKind> = func.body.stmts.iter().map(|s| &s.kind).collect();
    assert!(matches!(kinds[0], StmtKind::Decl(_)));
    assert!(matches!(kinds[1], StmtKind::Assign { .. }));
    let StmtKind::If(conditionals) = kinds[2] else {
        panic!("expected if");
    };
    assert_eq!(conditionals.len(), 3);
    assert!(conditionals[2].condition.is_none());
    assert!(matches!(kinds[3], StmtKind::ForRange { begin: Some(_), .. }));
    assert!(matches!(kinds[4], StmtKind::ForExpr { .. }));
    assert!(matches!(kinds[5], StmtKind::Defer(_)));
    assert!(matches!(kinds[6], StmtKind::Return(None)));
}

#[test]
fn parses_typespecs() {
    let module = parse("alias T = *[]func(u32, *any) [8u]bool;");
    let DeclKind::Alias { typespec, .. } = &module.decls[0].kind else {
        panic!("expected alias");
    };
    let TypeSpecKind::Pointer(slice) = &typespec.kind else {
        panic!("expected pointer");
    };
    let TypeSpecKind::Slice(func) = &slice.kind else {
        panic!("expected slice");
    };
    let TypeSpecKind::Function {
        parameter_typespecs,
        return_typespec,
    } = &func.kind
    else {
        panic!("expected function typespec");
    };
    assert_eq!(parameter_typespecs.len(), 2);
    assert!(matches!(return_typespec.kind, TypeSpecKind::Array { .. }));
}

#[test]
fn parses_extern_and_extend() {
    let module = parse(
        "extern var errno: s32;\n\
         extern func write(fd: s32, buf: *any, count: u64) s64;\n\
         extend u32 func double(self: *u32) u32 { return 0u32; }\n",
    );
    assert!(matches!(module.decls[0].kind, DeclKind::ExternVariable { .. }));
    assert!(matches!(module.decls[1].kind, DeclKind::ExternFunction { .. }));
    assert!(matches!(module.decls[2].kind, DeclKind::Extend { .. }));
}

#[test]
fn rejects_empty_template_lists() {
    let err = parse_err("func f[[]](x: u32) u32 { return x; }");
    assert_eq!(err.kind, sable_common::ErrorKind::Syntax);
}

#[test]
fn rejects_malformed_declaration() {
    let err = parse_err("var = 3u32;");
    assert_eq!(err.kind, sable_common::ErrorKind::Syntax);
    assert!(err.message.contains("expected identifier"));
}

#[test]
fn uninit_parses_as_initializer() {
    let module = parse("var x: u32 = uninit;");
    let DeclKind::Variable { expr, .. } = &module.decls[0].kind else {
        panic!("expected variable");
    };
    assert!(matches!(expr.kind, ExprKind::Uninit));
}
