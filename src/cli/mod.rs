//! Command-line interface module.

mod args;
pub mod serve;

pub use args::Cli;

use clap::{CommandFactory, error::ErrorKind};

/// Print a usage error in clap's format and exit with status 2.
pub fn usage_error(message: impl std::fmt::Display) -> ! {
    Cli::command()
        .error(ErrorKind::ValueValidation, message)
        .exit()
}
