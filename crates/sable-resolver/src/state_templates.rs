//! Template instantiation.
//!
//! A template symbol carries its original declaration CST and a private
//! memo table of instantiations keyed by the mangled instance name
//! (`Name[[arg, ...]]`). Instantiation resolves the argument types in the
//! *calling* scope, then re-enters declaration resolution in a fresh scope
//! where each template parameter names its argument type, with the
//! resolver's lexical position swapped to the template's declaration site.

use crate::state::Resolver;
use sable_common::{Atom, ErrorKind, Fatal, SourceLocation};
use sable_parser::cst;
use sable_tir::{Symbol, SymbolId, SymbolKind, TemplateSymbol, TypeId};
use tracing::debug;

impl Resolver<'_> {
    pub(crate) fn instantiate_template(
        &mut self,
        location: SourceLocation,
        symbol: SymbolId,
        template_arguments: &[cst::TypeSpec],
    ) -> Result<SymbolId, Fatal> {
        let template = match &self.ctx.symbol(symbol).kind {
            SymbolKind::Template(template) => template.clone(),
            other => {
                let what = match other {
                    SymbolKind::Type(_) => "non-template type",
                    SymbolKind::Variable { .. } => "variable",
                    SymbolKind::Constant { .. } => "constant",
                    SymbolKind::Function(_) => "function",
                    SymbolKind::Namespace(_) => "namespace",
                    SymbolKind::Template(_) => unreachable!("matched above"),
                };
                return Err(self.error(
                    ErrorKind::Template,
                    location,
                    format!(
                        "attempted template instantiation of {what} `{}`",
                        self.ctx.name(self.ctx.symbol(symbol).name)
                    ),
                ));
            }
        };

        // `[[]]` is rejected by the parser, so an empty argument list here
        // means the reference site supplied none at all.
        if template_arguments.is_empty() {
            return Err(self.error(
                ErrorKind::Template,
                location,
                format!(
                    "template instantiation of `{}` requires a template argument list",
                    self.ctx.name(self.ctx.symbol(symbol).name)
                ),
            ));
        }

        let template_name = self.ctx.symbol(symbol).name;
        let (template_parameters, is_struct) = match &template.decl.kind {
            cst::DeclKind::Function(function) => (function.template_parameters.clone(), false),
            cst::DeclKind::Struct(struct_) => (struct_.template_parameters.clone(), true),
            _ => unreachable!("only functions and structs declare templates"),
        };

        if template_parameters.len() != template_arguments.len() {
            return Err(self.error(
                ErrorKind::Template,
                location,
                format!(
                    "expected {} template argument(s) for template `{}` (received {})",
                    template_parameters.len(),
                    self.ctx.name(template_name),
                    template_arguments.len()
                ),
            ));
        }

        // Argument types resolve in the scope of the reference, not the
        // template's declaration scope.
        let mut argument_types: Vec<TypeId> = Vec::with_capacity(template_arguments.len());
        for argument in template_arguments {
            argument_types.push(self.resolve_typespec(argument)?);
        }

        let mangled = self.mangle_instance_name(template_name, &argument_types);
        if let Some(existing) = self.ctx.lookup_local(template.instances, mangled) {
            return Ok(existing);
        }
        debug!(
            name = self.ctx.name(mangled),
            "instantiating template"
        );

        // The instance resolves in a child of the template's lexical
        // parent, with each parameter bound to its argument type. The
        // template itself is also visible under its own name so recursive
        // templates need no qualification.
        let instance_scope = self.ctx.new_scope(Some(template.parent_scope));
        for (parameter, &argument_type) in template_parameters.iter().zip(&argument_types) {
            let type_symbol = self.ctx.alloc_symbol(Symbol {
                location: parameter.location,
                name: parameter.name,
                kind: SymbolKind::Type(argument_type),
            });
            self.ctx
                .insert_symbol(instance_scope, parameter.name, type_symbol)?;
        }
        self.ctx
            .insert_symbol(instance_scope, template_name, symbol)?;

        let instance_decl = synthesize_instance_decl(&template, location, mangled);

        // Swap the resolver to the template's declaration position for the
        // duration of the instance's resolution.
        let save_scope = self.current_scope;
        let save_addr_prefix = self.static_addr_prefix;
        let save_name_prefix = self.name_prefix;
        self.current_scope = instance_scope;
        self.static_addr_prefix = template.addr_prefix;
        self.name_prefix = template.name_prefix;
        let resolved = if is_struct {
            self.resolve_decl_struct(&instance_decl)
        } else {
            self.resolve_decl_function(&instance_decl)
        };
        self.current_scope = save_scope;
        self.static_addr_prefix = save_addr_prefix;
        self.name_prefix = save_name_prefix;
        let resolved = resolved?;

        self.ctx
            .insert_symbol(template.instances, mangled, resolved)?;

        // Struct instances complete *after* entering the cache so a
        // self-referential instantiation terminates.
        if is_struct {
            self.complete_struct(resolved, &instance_decl)?;
        }

        Ok(resolved)
    }

    fn mangle_instance_name(&mut self, name: Atom, arguments: &[TypeId]) -> Atom {
        let mut mangled = self.ctx.name(name).to_owned();
        mangled.push_str("[[");
        for (i, &argument) in arguments.iter().enumerate() {
            if i != 0 {
                mangled.push_str(", ");
            }
            mangled.push_str(self.type_name(argument));
        }
        mangled.push_str("]]");
        self.ctx.interner.intern(&mangled)
    }
}

/// Clone the original declaration with the template parameter list emptied
/// and the identifier replaced by the mangled instance name. Parameters,
/// members, and bodies are unchanged: they resolve inside the instance
/// scope where the template parameter names map to the chosen types.
fn synthesize_instance_decl(
    template: &TemplateSymbol,
    location: SourceLocation,
    mangled: Atom,
) -> cst::Decl {
    let mut decl: cst::Decl = (*template.decl).clone();
    decl.location = location;
    decl.name = mangled;
    match &mut decl.kind {
        cst::DeclKind::Function(function) => {
            function.template_parameters.clear();
            function.identifier = cst::Identifier {
                location,
                name: mangled,
            };
        }
        cst::DeclKind::Struct(struct_) => {
            struct_.template_parameters.clear();
            struct_.identifier = cst::Identifier {
                location,
                name: mangled,
            };
        }
        _ => unreachable!("only functions and structs declare templates"),
    }
    decl
}
