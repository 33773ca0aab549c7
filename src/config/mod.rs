//! Server configuration, resolved once from the command line.
//!
//! `ServerConfig` is built in `main` and passed by reference to the mode
//! selector and the server runner. There is no global config handle.

mod error;

pub use error::ConfigError;

use crate::cli::Cli;
use std::path::PathBuf;

/// Environment variable supplying one additional ledger file.
pub const ENV_FILE: &str = "LEDGER_FILE";

/// Immutable server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Ledger files, positional first, then the environment value.
    pub filenames: Vec<PathBuf>,
    pub host: String,
    pub port: u16,
    /// URL prefix, normalized to `/segment` form (no trailing slash).
    pub prefix: Option<String>,
    pub debug: bool,
    pub profile: bool,
    pub profile_dir: Option<PathBuf>,
    /// Number of routes listed in each profile table.
    pub profile_restriction: usize,
}

impl ServerConfig {
    /// Merge CLI arguments with the environment filename.
    ///
    /// The environment file is appended as-is, even when it is already
    /// among the positional filenames.
    pub fn resolve(cli: Cli, env_file: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut filenames = cli.filenames;
        if let Some(file) = env_file.filter(|f| !f.as_os_str().is_empty()) {
            filenames.push(file);
        }

        if filenames.is_empty() {
            return Err(ConfigError::NoFile);
        }

        // Order matters: profile_dir -> profile -> debug
        let profile_dir = cli.profile_dir.filter(|d| !d.as_os_str().is_empty());
        let profile = cli.profile || profile_dir.is_some();
        let debug = cli.debug || profile;

        Ok(Self {
            filenames,
            host: cli.host,
            port: cli.port,
            prefix: cli.prefix.as_deref().and_then(normalize_prefix),
            debug,
            profile,
            profile_dir,
            profile_restriction: cli.profile_restriction,
        })
    }

    /// Read the environment filename, if set.
    pub fn env_file() -> Option<PathBuf> {
        std::env::var_os(ENV_FILE).map(PathBuf::from)
    }
}

/// Normalize a URL prefix: leading slash, no trailing slash.
///
/// Returns `None` for empty or root prefixes.
fn normalize_prefix(prefix: &str) -> Option<String> {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!("/{trimmed}"))
}

#[cfg(test)]
pub(crate) fn test_cli(filenames: &[&str]) -> Cli {
    Cli {
        filenames: filenames.iter().map(PathBuf::from).collect(),
        port: 5000,
        host: "localhost".into(),
        prefix: None,
        debug: false,
        profile: false,
        profile_dir: None,
        profile_restriction: 30,
        color: clap::ColorChoice::Auto,
    }
}
