//! Command-line interface definitions.

use clap::{ColorChoice, Parser};
use std::path::PathBuf;

/// Start tally for FILENAMES on http://host:port.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Ledger files to serve
    #[arg(value_name = "FILENAMES", value_parser = existing_path, value_hint = clap::ValueHint::FilePath)]
    pub filenames: Vec<PathBuf>,

    /// The port to listen on
    #[arg(short, long, default_value_t = 5000)]
    pub port: u16,

    /// The host to listen on
    #[arg(short = 'H', long, default_value = "localhost")]
    pub host: String,

    /// Set an URL prefix (for reverse proxy)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Turn on debugging. Disables live-reloading
    #[arg(short, long)]
    pub debug: bool,

    /// Turn on profiling. Implies --debug
    #[arg(long)]
    pub profile: bool,

    /// Output directory for profiling data
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub profile_dir: Option<PathBuf>,

    /// Number of routes to show in profile
    #[arg(long, default_value_t = 30)]
    pub profile_restriction: usize,

    /// Control colored output (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,
}

/// Accept only paths that exist, resolved to absolute form.
fn existing_path(value: &str) -> Result<PathBuf, String> {
    std::fs::canonicalize(value).map_err(|e| format!("path `{value}` does not exist: {e}"))
}
