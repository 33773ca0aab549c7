//! Keyed set of loaded ledgers.
//!
//! Each source lives in an `ArcSwap` slot: request handlers load the
//! current snapshot without locking, and a reload publishes a fully built
//! `DataSource` in one atomic store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;

use super::{DataSource, LoadError, SourceKey, load_file};
use crate::utils::path::{normalize_path, slugify};

/// A source could not be reloaded.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("unknown source `{0}`")]
    UnknownSource(SourceKey),

    #[error("failed to reload `{key}`")]
    Load {
        key: SourceKey,
        #[source]
        source: LoadError,
    },
}

/// Access to loaded sources.
pub trait SourceRegistry: Send + Sync {
    /// Keys in load order.
    fn keys(&self) -> Vec<SourceKey>;

    /// Current snapshot of a source.
    fn get(&self, key: &str) -> Option<Arc<DataSource>>;

    /// Load the source again and publish the result.
    ///
    /// On error the previous snapshot stays published.
    fn reload(&self, key: &str) -> Result<Arc<DataSource>, ReloadError>;
}

struct Slot {
    path: PathBuf,
    current: ArcSwap<DataSource>,
    /// Serializes reloads of this slot.
    reload_lock: Mutex<()>,
}

/// Ledgers loaded from disk.
pub struct Ledgers {
    order: Vec<SourceKey>,
    slots: FxHashMap<SourceKey, Slot>,
}

impl Ledgers {
    /// Load every file, in order.
    ///
    /// Paths are canonicalized; a file listed twice is loaded once. Files
    /// whose names slugify to the same key get numeric suffixes (`main`, `main-2`, ...).
    pub fn load(filenames: &[PathBuf]) -> Result<Self, LoadError> {
        let mut ledgers = Self {
            order: Vec::new(),
            slots: FxHashMap::default(),
        };

        for path in filenames {
            let path = &normalize_path(path);
            if ledgers.slots.values().any(|slot| slot.path == *path) {
                crate::debug!("load"; "skipping duplicate {}", path.display());
                continue;
            }

            let key = ledgers.unique_key(path);
            let source = load_file(key.clone(), path, 0)?;
            crate::debug!("load"; "{} -> {}", key, path.display());

            ledgers.order.push(key.clone());
            ledgers.slots.insert(
                key,
                Slot {
                    path: path.clone(),
                    current: ArcSwap::from_pointee(source),
                    reload_lock: Mutex::new(()),
                },
            );
        }

        Ok(ledgers)
    }

    fn unique_key(&self, path: &Path) -> SourceKey {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        let base = slugify(&stem);

        let mut candidate = base.clone();
        let mut n = 2;
        while self.slots.contains_key(candidate.as_str()) {
            candidate = format!("{base}-{n}");
            n += 1;
        }
        SourceKey::new(candidate)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}

impl SourceRegistry for Ledgers {
    fn keys(&self) -> Vec<SourceKey> {
        self.order.clone()
    }

    fn get(&self, key: &str) -> Option<Arc<DataSource>> {
        self.slots.get(key).map(|slot| slot.current.load_full())
    }

    fn reload(&self, key: &str) -> Result<Arc<DataSource>, ReloadError> {
        let slot = self
            .slots
            .get_key_value(key)
            .ok_or_else(|| ReloadError::UnknownSource(SourceKey::new(key)))?;
        let (key, slot) = slot;

        let _guard = slot.reload_lock.lock();
        let generation = slot.current.load().generation + 1;
        let source = load_file(key.clone(), &slot.path, generation).map_err(|source| {
            ReloadError::Load {
                key: key.clone(),
                source,
            }
        })?;

        let source = Arc::new(source);
        slot.current.store(Arc::clone(&source));
        Ok(source)
    }
}
