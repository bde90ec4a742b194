//! Topological ordering of top-level declarations.
//!
//! Sable declarations are order-independent in source; resolution walks
//! them in dependency order instead. A declaration depends on another when
//! it names it *by value*: typespecs, array counts, initializer
//! expressions, and struct member variables all count, while function
//! bodies do not (bodies are completed after every top-level declaration)
//! and pointer/slice indirection does not (pre-declared struct symbols are
//! enough to resolve `*T` and `[]T`).
//!
//! A genuine by-value cycle (`struct T { var t: T; }`, mutually recursive
//! constants) has no valid order and is a fatal diagnostic.

use rustc_hash::FxHashMap;
use sable_common::{Atom, ErrorKind, Fatal};
use sable_parser::cst;
use sable_tir::Context;

/// Return indices into `module.decls` in resolution order.
pub(crate) fn order_declarations(
    ctx: &Context,
    module: &cst::Module,
) -> Result<Vec<usize>, Fatal> {
    let mut by_name: FxHashMap<Atom, usize> = FxHashMap::default();
    for (index, decl) in module.decls.iter().enumerate() {
        // Duplicates produce a redeclaration error later; ordering just
        // keeps the first.
        by_name.entry(decl.name).or_insert(index);
    }

    let mut dependencies: Vec<Vec<usize>> = Vec::with_capacity(module.decls.len());
    for decl in &module.decls {
        let mut names = Vec::new();
        decl_dependencies(decl, &mut names);
        let mut edges: Vec<usize> = names
            .into_iter()
            .filter_map(|name| by_name.get(&name).copied())
            .collect();
        edges.sort_unstable();
        edges.dedup();
        dependencies.push(edges);
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; module.decls.len()];
    let mut ordered = Vec::with_capacity(module.decls.len());
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..module.decls.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        stack.push((root, 0));
        marks[root] = Mark::InProgress;
        while let Some(&(index, edge)) = stack.last() {
            if edge < dependencies[index].len() {
                let next = dependencies[index][edge];
                stack.last_mut().expect("stack is non-empty").1 += 1;
                match marks[next] {
                    Mark::Unvisited => {
                        marks[next] = Mark::InProgress;
                        stack.push((next, 0));
                    }
                    Mark::InProgress if next == index => {
                        // Self-references are fine for functions (recursion)
                        // and already excluded for pointer members; a
                        // remaining self-edge is a by-value cycle.
                        let decl = &module.decls[index];
                        return Err(ctx.error(
                            ErrorKind::CircularDependency,
                            decl.location,
                            format!(
                                "declaration of `{}` depends on itself",
                                ctx.name(decl.name)
                            ),
                        ));
                    }
                    Mark::InProgress => {
                        let decl = &module.decls[next];
                        return Err(ctx.error(
                            ErrorKind::CircularDependency,
                            decl.location,
                            format!(
                                "circular dependency involving declaration of `{}`",
                                ctx.name(decl.name)
                            ),
                        ));
                    }
                    Mark::Done => {}
                }
            } else {
                marks[index] = Mark::Done;
                ordered.push(index);
                stack.pop();
            }
        }
    }

    Ok(ordered)
}

fn decl_dependencies(decl: &cst::Decl, names: &mut Vec<Atom>) {
    match &decl.kind {
        cst::DeclKind::Variable { typespec, expr, .. }
        | cst::DeclKind::Constant { typespec, expr, .. } => {
            if let Some(typespec) = typespec {
                typespec_dependencies(typespec, names);
            }
            expr_dependencies(expr, names);
        }
        cst::DeclKind::Function(function) => {
            // Signature only; the body resolves after every top-level
            // declaration is in scope.
            for parameter in &function.parameters {
                typespec_dependencies(&parameter.typespec, names);
            }
            typespec_dependencies(&function.return_typespec, names);
        }
        cst::DeclKind::Struct(struct_) => {
            for member in &struct_.members {
                match &member.kind {
                    cst::MemberKind::Variable { typespec } => {
                        typespec_dependencies(typespec, names);
                    }
                    cst::MemberKind::Constant(decl) | cst::MemberKind::Function(decl) => {
                        decl_dependencies(decl, names);
                    }
                }
            }
        }
        cst::DeclKind::Extend { typespec, decl } => {
            typespec_dependencies(typespec, names);
            decl_dependencies(decl, names);
        }
        cst::DeclKind::Alias { typespec, .. } | cst::DeclKind::ExternVariable { typespec, .. } => {
            typespec_dependencies(typespec, names);
        }
        cst::DeclKind::ExternFunction {
            parameters,
            return_typespec,
            ..
        } => {
            for parameter in parameters {
                typespec_dependencies(&parameter.typespec, names);
            }
            typespec_dependencies(return_typespec, names);
        }
    }
}

fn typespec_dependencies(typespec: &cst::TypeSpec, names: &mut Vec<Atom>) {
    match &typespec.kind {
        cst::TypeSpecKind::Symbol(symbol) => {
            symbol_dependencies(symbol, names);
        }
        cst::TypeSpecKind::Function {
            parameter_typespecs,
            return_typespec,
        } => {
            for parameter in parameter_typespecs {
                typespec_dependencies(parameter, names);
            }
            typespec_dependencies(return_typespec, names);
        }
        // Indirection breaks the dependency: a pointer or slice member
        // only needs the base symbol pre-declared, never completed.
        cst::TypeSpecKind::Pointer(_) | cst::TypeSpecKind::Slice(_) => {}
        cst::TypeSpecKind::Array { count, base } => {
            expr_dependencies(count, names);
            typespec_dependencies(base, names);
        }
        cst::TypeSpecKind::Typeof(expr) => expr_dependencies(expr, names),
    }
}

fn symbol_dependencies(symbol: &cst::SymbolPath, names: &mut Vec<Atom>) {
    names.push(symbol.elements[0].identifier.name);
    for element in &symbol.elements {
        for argument in &element.template_arguments {
            typespec_dependencies(argument, names);
        }
    }
}

fn expr_dependencies(expr: &cst::Expr, names: &mut Vec<Atom>) {
    match &expr.kind {
        cst::ExprKind::Symbol(symbol) => symbol_dependencies(symbol, names),
        cst::ExprKind::Boolean(_)
        | cst::ExprKind::Integer { .. }
        | cst::ExprKind::Character(_)
        | cst::ExprKind::Bytes(_)
        | cst::ExprKind::Uninit => {}
        cst::ExprKind::ArrayList {
            typespec,
            elements,
            ellipsis,
        } => {
            typespec_dependencies(typespec, names);
            for element in elements {
                expr_dependencies(element, names);
            }
            if let Some(ellipsis) = ellipsis {
                expr_dependencies(ellipsis, names);
            }
        }
        cst::ExprKind::SliceList { typespec, elements } => {
            typespec_dependencies(typespec, names);
            for element in elements {
                expr_dependencies(element, names);
            }
        }
        cst::ExprKind::Slice {
            typespec,
            pointer,
            count,
        } => {
            typespec_dependencies(typespec, names);
            expr_dependencies(pointer, names);
            expr_dependencies(count, names);
        }
        cst::ExprKind::Struct {
            typespec,
            initializers,
        } => {
            typespec_dependencies(typespec, names);
            for initializer in initializers {
                expr_dependencies(&initializer.expr, names);
            }
        }
        cst::ExprKind::Cast { typespec, expr } => {
            typespec_dependencies(typespec, names);
            expr_dependencies(expr, names);
        }
        cst::ExprKind::Grouped(expr) => expr_dependencies(expr, names),
        cst::ExprKind::Syscall(arguments) => {
            for argument in arguments {
                expr_dependencies(argument, names);
            }
        }
        cst::ExprKind::Call { func, arguments } => {
            expr_dependencies(func, names);
            for argument in arguments {
                expr_dependencies(argument, names);
            }
        }
        cst::ExprKind::AccessIndex { lhs, idx } => {
            expr_dependencies(lhs, names);
            expr_dependencies(idx, names);
        }
        cst::ExprKind::AccessSlice { lhs, begin, end } => {
            expr_dependencies(lhs, names);
            expr_dependencies(begin, names);
            expr_dependencies(end, names);
        }
        cst::ExprKind::AccessMember { lhs, member } => {
            expr_dependencies(lhs, names);
            for argument in &member.template_arguments {
                typespec_dependencies(argument, names);
            }
        }
        cst::ExprKind::AccessDereference { lhs } => expr_dependencies(lhs, names),
        cst::ExprKind::Sizeof(typespec) | cst::ExprKind::Alignof(typespec) => {
            typespec_dependencies(typespec, names);
        }
        cst::ExprKind::Unary { rhs, .. } => expr_dependencies(rhs, names),
        cst::ExprKind::Binary { lhs, rhs, .. } => {
            expr_dependencies(lhs, names);
            expr_dependencies(rhs, names);
        }
    }
}
