//! Per-source watch bookkeeping and reload sequencing.
//!
//! State per source key:
//!
//! ```text
//! Unwatched --start (unencrypted)--> Watching --change--> reload --> Watching
//! ```
//!
//! Encrypted sources stay Unwatched. After every successful reload the
//! watch set is recomputed from the new snapshot and diffed against the
//! old one; a failed reload leaves it untouched.

use std::path::Path;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::mpsc::UnboundedSender;

use super::watch_roots::WatchBackend;
use crate::actor::messages::WsMsg;
use crate::ledger::{DataSource, ReloadError, SourceKey, SourceRegistry, WatchSet, file_set};
use crate::logger::{status_error, status_success};
use crate::utils::plural::plural_count;

/// Keeps backend watches in sync with each source's dependency files.
pub struct WatchOrchestrator<R, B> {
    registry: Arc<R>,
    backend: B,
    /// Source key → currently watched paths (absent = Unwatched)
    watched: FxHashMap<SourceKey, WatchSet>,
    /// Path → number of sources watching it
    refs: FxHashMap<std::path::PathBuf, usize>,
    /// Sources with a reload running
    in_flight: FxHashSet<SourceKey>,
    /// Sources that changed again while their reload was running
    pending: FxHashSet<SourceKey>,
    refresh_tx: UnboundedSender<WsMsg>,
}

impl<R: SourceRegistry, B: WatchBackend> WatchOrchestrator<R, B> {
    pub fn new(registry: Arc<R>, backend: B, refresh_tx: UnboundedSender<WsMsg>) -> Self {
        Self {
            registry,
            backend,
            watched: FxHashMap::default(),
            refs: FxHashMap::default(),
            in_flight: FxHashSet::default(),
            pending: FxHashSet::default(),
            refresh_tx,
        }
    }

    /// Watch every unencrypted source. Returns how many are watched.
    pub fn start(&mut self) -> usize {
        let mut count = 0;
        for key in self.registry.keys() {
            let Some(source) = self.registry.get(key.as_str()) else {
                continue;
            };
            if source.encrypted {
                crate::debug!("watch"; "{} is encrypted, not watching", key);
                continue;
            }
            self.sync(&key, file_set(&source));
            count += 1;
        }
        count
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Paths currently watched for `key` (empty when Unwatched).
    #[cfg(test)]
    pub fn watch_set(&self, key: &str) -> WatchSet {
        self.watched.get(key).cloned().unwrap_or_default()
    }

    #[cfg(test)]
    pub fn is_watching(&self, key: &str) -> bool {
        self.watched.contains_key(key)
    }

    /// Sources owning any of `paths`, each listed once.
    pub fn owners<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) -> Vec<SourceKey> {
        let mut keys: Vec<SourceKey> = Vec::new();
        for path in paths {
            for key in self.sources_for(path) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Sources owning `path`: the path itself is watched, or it lies inside
    /// a watched directory.
    pub fn sources_for(&self, path: &Path) -> Vec<SourceKey> {
        let mut keys: Vec<_> = self
            .watched
            .iter()
            .filter(|(_, set)| set.iter().any(|watched| path.starts_with(watched)))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Claim the reload slot of `key`.
    ///
    /// Returns `false` when a reload is already running; the change is then
    /// remembered and reported by `finish_reload` as a single rerun.
    pub fn begin_reload(&mut self, key: &SourceKey) -> bool {
        if self.in_flight.contains(key) {
            self.pending.insert(key.clone());
            return false;
        }
        self.in_flight.insert(key.clone());
        true
    }

    /// Apply a reload result and release the slot.
    ///
    /// Returns `true` when the source changed again meanwhile and must be
    /// reloaded once more.
    pub fn finish_reload(
        &mut self,
        key: &SourceKey,
        result: Result<Arc<DataSource>, ReloadError>,
    ) -> bool {
        self.in_flight.remove(key);

        match result {
            Ok(source) => self.apply(key, &source),
            Err(e) => status_error(
                key.as_str(),
                &format!("reload failed: {key}"),
                &failure_detail(e),
            ),
        }

        self.pending.remove(key)
    }

    /// Reload `key` on the calling thread, including coalesced reruns.
    ///
    /// Returns the number of reloads performed (0 if one was in flight).
    #[cfg(test)]
    pub fn reload_now(&mut self, key: &SourceKey) -> usize {
        let mut count = 0;
        while self.begin_reload(key) {
            count += 1;
            let result = self.registry.reload(key.as_str());
            if !self.finish_reload(key, result) {
                break;
            }
        }
        count
    }

    /// Handle changed paths synchronously: reload each owning source once.
    #[cfg(test)]
    pub fn handle_changes<'a>(&mut self, paths: impl IntoIterator<Item = &'a Path>) -> usize {
        let keys = self.owners(paths);
        keys.iter().map(|key| self.reload_now(key)).sum()
    }

    fn apply(&mut self, key: &SourceKey, source: &DataSource) {
        if source.encrypted {
            self.sync(key, WatchSet::default());
            self.watched.remove(key);
        } else {
            self.sync(key, file_set(source));
        }

        status_success(
            key.as_str(),
            &format!(
                "reloaded: {} ({})",
                key,
                plural_count(source.entries, "entry")
            ),
        );
        let _ = self.refresh_tx.send(WsMsg::Reload {
            source: key.clone(),
        });
    }

    /// Replace the watch set of `key` with `next`, touching only the diff.
    fn sync(&mut self, key: &SourceKey, next: WatchSet) {
        let previous = self.watched.remove(key).unwrap_or_default();

        for path in previous.difference(&next) {
            if let Some(count) = self.refs.get_mut(path) {
                *count -= 1;
                if *count == 0 {
                    self.refs.remove(path);
                    self.backend.unwatch(path);
                    crate::debug!("watch"; "unwatch {}", path.display());
                }
            }
        }

        for path in next.difference(&previous) {
            let count = self.refs.entry(path.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                self.backend.watch(path);
                crate::debug!("watch"; "watch {}", path.display());
            }
        }

        self.watched.insert(key.clone(), next);
    }
}

/// The reload error with its causes on one line, the way errors are
/// logged everywhere else.
pub(super) fn failure_detail(error: ReloadError) -> String {
    format!("{:#}", anyhow::Error::new(error))
}
