use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::{FxHashMap, FxHashSet};

/// Registers file system watches for individual paths.
///
/// Each path is registered at most once at a time; the orchestrator keeps
/// the reference counts across sources.
pub trait WatchBackend: Send {
    /// Start watching `path` (which may not exist yet).
    fn watch(&mut self, path: &Path);

    /// Stop watching `path`.
    fn unwatch(&mut self, path: &Path);

    /// Periodic upkeep (re-attach watches whose target appeared again or
    /// changed between file and directory).
    fn maintain(&mut self) {}
}

/// OS watch placed for one or more watched paths.
struct Attachment {
    refs: usize,
    recursive: bool,
}

/// `notify` watcher over file paths.
///
/// Files are watched through their parent directory (so atomic saves that
/// replace the file keep being seen), directories recursively. Paths whose
/// target does not exist yet stay detached and are attached by `maintain`
/// once it appears.
pub struct NotifyBackend {
    watcher: RecommendedWatcher,
    /// Watched path → OS watch target
    targets: FxHashMap<PathBuf, PathBuf>,
    /// OS watch target → attachment
    attached: FxHashMap<PathBuf, Attachment>,
    /// Watched paths without a target yet
    detached: FxHashSet<PathBuf>,
}

impl NotifyBackend {
    /// Create the watcher; events are forwarded into `tx`.
    pub fn new(tx: std::sync::mpsc::Sender<notify::Result<notify::Event>>) -> notify::Result<Self> {
        let watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;

        Ok(Self {
            watcher,
            targets: FxHashMap::default(),
            attached: FxHashMap::default(),
            detached: FxHashSet::default(),
        })
    }

    fn attach(&mut self, path: &Path) -> bool {
        let Some((target, recursive)) = watch_target(path) else {
            return false;
        };

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        match self.attached.get_mut(&target) {
            Some(attachment) if attachment.recursive || !recursive => {
                attachment.refs += 1;
            }
            Some(attachment) => {
                // Upgrade a parent-directory watch to a recursive one
                let _ = self.watcher.unwatch(&target);
                if let Err(e) = self.watcher.watch(&target, mode) {
                    crate::debug!("watch"; "failed to watch {}: {}", target.display(), e);
                    let _ = self.watcher.watch(&target, RecursiveMode::NonRecursive);
                    return false;
                }
                attachment.recursive = true;
                attachment.refs += 1;
            }
            None => {
                if let Err(e) = self.watcher.watch(&target, mode) {
                    crate::debug!("watch"; "failed to watch {}: {}", target.display(), e);
                    return false;
                }
                self.attached.insert(target.clone(), Attachment { refs: 1, recursive });
            }
        }

        self.targets.insert(path.to_path_buf(), target);
        true
    }

    fn release(&mut self, target: &Path) {
        let Some(attachment) = self.attached.get_mut(target) else {
            return;
        };
        attachment.refs -= 1;
        if attachment.refs == 0 {
            self.attached.remove(target);
            let _ = self.watcher.unwatch(target);
        }
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, path: &Path) {
        if self.targets.contains_key(path) || self.detached.contains(path) {
            return;
        }
        if !self.attach(path) {
            crate::debug!("watch"; "waiting for {}", path.display());
            self.detached.insert(path.to_path_buf());
        }
    }

    fn unwatch(&mut self, path: &Path) {
        if self.detached.remove(path) {
            return;
        }
        if let Some(target) = self.targets.remove(path) {
            self.release(&target);
        }
    }

    fn maintain(&mut self) {
        // Targets that vanished lose their OS watch; park their paths.
        let stale: Vec<PathBuf> = self
            .targets
            .iter()
            .filter(|(_, target)| !target.exists())
            .map(|(path, _)| path.clone())
            .collect();
        for path in stale {
            if let Some(target) = self.targets.remove(&path) {
                self.release(&target);
            }
            self.detached.insert(path);
        }

        // A path watched through its parent that is now a directory needs a
        // recursive watch, and a watched directory replaced by a file needs
        // its parent watched instead.
        let reshaped: Vec<PathBuf> = self
            .targets
            .iter()
            .filter(|(path, target)| (path == target) != path.is_dir())
            .map(|(path, _)| path.clone())
            .collect();
        for path in reshaped {
            if let Some(target) = self.targets.remove(&path) {
                self.release(&target);
            }
            if self.attach(&path) {
                crate::debug!("watch"; "re-shaped watch: {}", path.display());
            } else {
                self.detached.insert(path);
            }
        }

        let waiting: Vec<PathBuf> = self.detached.iter().cloned().collect();
        for path in waiting {
            if self.attach(&path) {
                self.detached.remove(&path);
                crate::debug!("watch"; "re-attached watch: {}", path.display());
            }
        }
    }
}

/// Directory to watch for `path`, and whether recursively.
fn watch_target(path: &Path) -> Option<(PathBuf, bool)> {
    if path.is_dir() {
        return Some((path.to_path_buf(), true));
    }
    let parent = path.parent()?;
    parent.is_dir().then(|| (parent.to_path_buf(), false))
}
