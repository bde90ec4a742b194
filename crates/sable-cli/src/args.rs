//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;

/// Semantic front-end for the sable language: parses and resolves a
/// module, reporting the first diagnostic encountered.
#[derive(Debug, Parser)]
#[command(name = "sable", version, about)]
pub struct Args {
    /// Source file to check.
    pub file: PathBuf,

    /// Additional import search directories, tried after the entries of
    /// `SABLE_IMPORT_PATH`.
    #[arg(long = "import-path", value_name = "DIR")]
    pub import_paths: Vec<PathBuf>,

    /// Emit the diagnostic as JSON on stdout instead of human-readable
    /// text on stderr.
    #[arg(long)]
    pub json: bool,

    /// Print a summary of the static symbols the back-end would receive.
    #[arg(long)]
    pub dump_symbols: bool,
}
