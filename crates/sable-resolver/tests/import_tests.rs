//! Import and module-loading tests over real files.

use num_bigint::BigInt;
use sable_common::ErrorKind;
use sable_resolver::resolve_file;
use sable_tir::{Context, ModuleId, SymbolKind, Value};
use std::fs;
use std::path::Path;

fn write_file(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create module directory");
    }
    fs::write(&path, contents).expect("write module file");
    path
}

fn constant_u32(ctx: &Context, module: ModuleId, name: &str) -> BigInt {
    let scope = ctx.module(module).symbols;
    let atom = ctx.interner.get(name).expect("name interned");
    let symbol = ctx.lookup(scope, atom).expect("name in scope");
    let SymbolKind::Constant { value, .. } = &ctx.symbol(symbol).kind else {
        panic!("`{name}` is not a constant");
    };
    let Value::Integer { value, .. } = value else {
        panic!("`{name}` is not an integer constant");
    };
    value.clone()
}

#[test]
fn imports_resolve_relative_to_the_importing_module() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "a.sable", "const A: u32 = 1u32;\n");
    let main = write_file(
        dir.path(),
        "main.sable",
        "import \"a.sable\";\nconst B: u32 = A + 1u32;\n",
    );

    let mut ctx = Context::new();
    let module = resolve_file(&mut ctx, &main).expect("resolution failure");
    assert_eq!(constant_u32(&ctx, module, "B"), BigInt::from(2));
}

#[test]
fn diamond_imports_are_idempotent() {
    // d is reachable through both a and b; the second merge re-inserts
    // the same symbols, which is a no-op.
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "d.sable", "const D: u32 = 4u32;\n");
    write_file(
        dir.path(),
        "a.sable",
        "import \"d.sable\";\nconst A: u32 = D + 1u32;\n",
    );
    write_file(
        dir.path(),
        "b.sable",
        "import \"d.sable\";\nconst B: u32 = D + 2u32;\n",
    );
    let main = write_file(
        dir.path(),
        "main.sable",
        "import \"a.sable\";\nimport \"b.sable\";\nconst M: u32 = A + B;\n",
    );

    let mut ctx = Context::new();
    let module = resolve_file(&mut ctx, &main).expect("resolution failure");
    assert_eq!(constant_u32(&ctx, module, "M"), BigInt::from(11));
}

#[test]
fn circular_imports_are_rejected() {
    // S6: a two-module cycle fails citing the offending import.
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(
        dir.path(),
        "x.sable",
        "import \"y.sable\";\nconst X: u32 = 1u32;\n",
    );
    write_file(
        dir.path(),
        "y.sable",
        "import \"x.sable\";\nconst Y: u32 = 2u32;\n",
    );
    let main = dir.path().join("x.sable");

    let mut ctx = Context::new();
    let err = resolve_file(&mut ctx, &main).expect_err("expected circular import");
    assert_eq!(err.kind, ErrorKind::CircularImport);
    assert!(err.message.contains("circular dependency when importing"));
}

#[test]
fn self_import_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let main = write_file(dir.path(), "self.sable", "import \"self.sable\";\n");

    let mut ctx = Context::new();
    let err = resolve_file(&mut ctx, &main).expect_err("expected circular import");
    assert_eq!(err.kind, ErrorKind::CircularImport);
}

#[test]
fn missing_imports_are_diagnosed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let main = write_file(dir.path(), "main.sable", "import \"nowhere.sable\";\n");

    let mut ctx = Context::new();
    let err = resolve_file(&mut ctx, &main).expect_err("expected missing import");
    assert_eq!(err.kind, ErrorKind::Io);
    assert!(err.message.contains("failed to resolve import"));
}

#[test]
fn directory_imports_pull_in_every_sable_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "lib/one.sable", "const ONE: u32 = 1u32;\n");
    write_file(dir.path(), "lib/two.sable", "const TWO: u32 = 2u32;\n");
    // Stray non-sable files are ignored.
    write_file(dir.path(), "lib/readme.txt", "not sable\n");
    let main = write_file(
        dir.path(),
        "main.sable",
        "import \"lib\";\nconst M: u32 = ONE + TWO;\n",
    );

    let mut ctx = Context::new();
    let module = resolve_file(&mut ctx, &main).expect("resolution failure");
    assert_eq!(constant_u32(&ctx, module, "M"), BigInt::from(3));
}

#[test]
fn import_search_paths_are_consulted_after_the_module_directory() {
    let lib_dir = tempfile::tempdir().expect("tempdir");
    write_file(lib_dir.path(), "shared.sable", "const SHARED: u32 = 9u32;\n");

    let dir = tempfile::tempdir().expect("tempdir");
    let main = write_file(
        dir.path(),
        "main.sable",
        "import \"shared.sable\";\nconst M: u32 = SHARED;\n",
    );

    let mut ctx = Context::new();
    ctx.search_paths.push(lib_dir.path().to_path_buf());
    let module = resolve_file(&mut ctx, &main).expect("resolution failure");
    assert_eq!(constant_u32(&ctx, module, "M"), BigInt::from(9));
}

#[test]
fn namespaced_exports_merge_under_their_namespace() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(
        dir.path(),
        "util.sable",
        "namespace util;\nconst ANSWER: u32 = 42u32;\n",
    );
    let main = write_file(
        dir.path(),
        "main.sable",
        "import \"util.sable\";\nconst M: u32 = util::ANSWER;\n",
    );

    let mut ctx = Context::new();
    let module = resolve_file(&mut ctx, &main).expect("resolution failure");
    assert_eq!(constant_u32(&ctx, module, "M"), BigInt::from(42));
}

#[test]
fn shared_namespaces_union_across_modules() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(
        dir.path(),
        "m1.sable",
        "namespace util;\nconst FIRST: u32 = 1u32;\n",
    );
    write_file(
        dir.path(),
        "m2.sable",
        "namespace util;\nconst SECOND: u32 = 2u32;\n",
    );
    let main = write_file(
        dir.path(),
        "main.sable",
        "import \"m1.sable\";\n\
         import \"m2.sable\";\n\
         const M: u32 = util::FIRST + util::SECOND;\n",
    );

    let mut ctx = Context::new();
    let module = resolve_file(&mut ctx, &main).expect("resolution failure");
    assert_eq!(constant_u32(&ctx, module, "M"), BigInt::from(3));
}

#[test]
fn conflicting_unnamespaced_exports_are_redeclarations() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "m1.sable", "const N: u32 = 1u32;\n");
    write_file(dir.path(), "m2.sable", "const N: u32 = 2u32;\n");
    let main = write_file(
        dir.path(),
        "main.sable",
        "import \"m1.sable\";\nimport \"m2.sable\";\n",
    );

    let mut ctx = Context::new();
    let err = resolve_file(&mut ctx, &main).expect_err("expected redeclaration");
    assert_eq!(err.kind, ErrorKind::Redeclaration);
}
