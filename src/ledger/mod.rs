//! Loaded ledgers ("data sources").
//!
//! # Module Structure
//!
//! - `loader` - reads a ledger file and its includes into a `DataSource`
//! - `registry` - keyed set of loaded sources with atomic reload
//! - `files` - dependency paths of a source (the files to watch)

mod files;
mod loader;
mod registry;

pub use files::{WatchSet, file_set};
pub use loader::{LoadError, load_file};
pub use registry::{Ledgers, ReloadError, SourceRegistry};

use std::borrow::Borrow;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Opaque identifier of a loaded source, used in URLs and refresh messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey(Arc<str>);

impl SourceKey {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SourceKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Options declared inside a ledger.
///
/// Paths are stored as written, relative to the directory of the main
/// ledger file (absolute paths stay absolute).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceOptions {
    /// Loaded ledger files: the main file, then includes in declaration order.
    pub include: Vec<PathBuf>,
    /// Linked document directories.
    pub documents: Vec<PathBuf>,
}

/// One loaded ledger.
///
/// Never mutated after construction; a reload builds a new value and
/// publishes it in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub key: SourceKey,
    /// Absolute path of the main ledger file.
    pub path: PathBuf,
    pub encrypted: bool,
    pub options: SourceOptions,
    /// Number of dated entries across the main file and its includes.
    pub entries: usize,
    /// Incremented on every successful reload (starts at 0).
    pub generation: u64,
}

impl DataSource {
    /// Directory containing the main ledger file.
    pub fn dir(&self) -> &std::path::Path {
        self.path.parent().unwrap_or_else(|| std::path::Path::new("/"))
    }
}
