//! FileSystem Actor
//!
//! Watches ledger files and reloads the sources that own changed paths.
//!
//! Architecture:
//! ```text
//! notify → Debouncer (pure timing) → WatchOrchestrator (ownership) → reload task
//!                                          ↑                              |
//!                                          +-------- ReloadDone ----------+
//! ```
//!
//! Reloads run on the blocking pool so a slow ledger never stalls event
//! intake; the orchestrator allows one reload per source at a time.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::ledger::{DataSource, ReloadError, SourceKey, SourceRegistry};

// Pure timing and deduplication.
mod debouncer;
// Per-source watch sets and reload sequencing.
mod orchestrator;
// Path watches on top of notify.
mod watch_roots;

#[cfg(test)]
mod tests;

pub use orchestrator::WatchOrchestrator;
pub use watch_roots::{NotifyBackend, WatchBackend};

use debouncer::Debouncer;

/// How often detached watches are retried.
const MAINTAIN_INTERVAL: Duration = Duration::from_secs(1);

type ReloadDone = (SourceKey, Result<Arc<DataSource>, ReloadError>);

/// FileSystem Actor - turns file changes into source reloads
pub struct FsActor<R, B> {
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    orchestrator: WatchOrchestrator<R, B>,
    debouncer: Debouncer,
}

impl<R, B> FsActor<R, B>
where
    R: SourceRegistry + 'static,
    B: WatchBackend + 'static,
{
    /// `orchestrator` must already be started, so no change between the
    /// initial watch and the first event is lost.
    pub fn new(
        notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
        orchestrator: WatchOrchestrator<R, B>,
    ) -> Self {
        Self {
            notify_rx,
            orchestrator,
            debouncer: Debouncer::new(),
        }
    }

    /// Run the actor event loop
    pub async fn run(self) {
        let Self {
            notify_rx,
            mut orchestrator,
            mut debouncer,
        } = self;

        let (event_tx, mut event_rx) = mpsc::channel::<notify::Event>(64);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<ReloadDone>();
        let mut maintain = tokio::time::interval(MAINTAIN_INTERVAL);

        // notify delivers on a std channel; forward onto the async one
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if event_tx.blocking_send(event).is_err() {
                            break; // Receiver dropped
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            tokio::select! {
                biased;
                Some((key, result)) = done_rx.recv() => {
                    if orchestrator.finish_reload(&key, result) && orchestrator.begin_reload(&key) {
                        crate::debug!("watch"; "{} changed during reload, reloading again", key);
                        spawn_reload(orchestrator.registry(), key, &done_tx);
                    }
                }
                event = event_rx.recv() => match event {
                    Some(event) => debouncer.add_event(&event),
                    None => break,
                },
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    let Some(changes) = debouncer.take_if_ready() else {
                        continue;
                    };

                    for (path, kind) in &changes {
                        crate::debug!("watch"; "{}: {}", kind.label(), path.display());
                    }

                    for key in orchestrator.owners(changes.keys().map(PathBuf::as_path)) {
                        if orchestrator.begin_reload(&key) {
                            spawn_reload(orchestrator.registry(), key, &done_tx);
                        }
                    }
                }
                _ = maintain.tick() => orchestrator.backend_mut().maintain(),
            }
        }

        crate::debug!("watch"; "stopped");
    }
}

fn spawn_reload<R: SourceRegistry + 'static>(
    registry: &Arc<R>,
    key: SourceKey,
    done_tx: &mpsc::UnboundedSender<ReloadDone>,
) {
    let registry = Arc::clone(registry);
    let done_tx = done_tx.clone();
    tokio::task::spawn_blocking(move || {
        let result = registry.reload(key.as_str());
        let _ = done_tx.send((key, result));
    });
}
