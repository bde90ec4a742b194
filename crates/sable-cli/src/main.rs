//! `sable` - driver for the sable compiler front-end.
//!
//! Locates the module, threads the import search path into the
//! compilation context, runs resolution, and renders the first diagnostic
//! (if any) to the error channel. Code generation hooks in after this
//! stage; the driver's output today is the resolved symbol summary.

mod args;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use sable_tir::{Context, SymbolKind};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = args::Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(args: &args::Args) -> Result<ExitCode> {
    let mut ctx = Context::new();
    ctx.search_paths = import_search_paths(args);

    match sable_resolver::resolve_file(&mut ctx, &args.file) {
        Ok(_) => {
            if args.dump_symbols {
                dump_symbols(&ctx);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(diagnostic) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&diagnostic)?);
            } else {
                eprintln!("{} {diagnostic}", "error:".red().bold());
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

/// `SABLE_IMPORT_PATH` entries (colon-separated) followed by any
/// `--import-path` flags. An absent variable is an empty list.
fn import_search_paths(args: &args::Args) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(value) = std::env::var("SABLE_IMPORT_PATH") {
        paths.extend(
            value
                .split(':')
                .filter(|entry| !entry.is_empty())
                .map(PathBuf::from),
        );
    }
    paths.extend(args.import_paths.iter().cloned());
    paths
}

/// One line per registry entry: the mangled label, the type, and the size
/// of the byte image a back-end would emit.
fn dump_symbols(ctx: &Context) {
    for &symbol in &ctx.static_symbols {
        let entry = ctx.symbol(symbol);
        let label = ctx.name(ctx.symbol_static_name(symbol));
        match &entry.kind {
            SymbolKind::Constant { type_, .. } => {
                println!(
                    "const {label}: {} ({} bytes)",
                    ctx.name(ctx.ty(*type_).name),
                    ctx.ty(*type_).size.unwrap_or(0)
                );
            }
            SymbolKind::Variable { type_, value, .. } => {
                let section = if value.is_some() { "data" } else { "bss" };
                println!(
                    "var   {label}: {} ({section})",
                    ctx.name(ctx.ty(*type_).name)
                );
            }
            SymbolKind::Function(function) => {
                let function = ctx.function(*function);
                let linkage = if function.is_extern { "extern " } else { "" };
                println!(
                    "{linkage}func  {label}: {}",
                    ctx.name(ctx.ty(function.type_).name)
                );
            }
            _ => {}
        }
    }
}
