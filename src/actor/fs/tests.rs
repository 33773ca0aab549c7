use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rustc_hash::FxHashSet;
use tempfile::TempDir;
use tokio::sync::mpsc;

use super::debouncer::{ChangeKind, DEBOUNCE_MS, Debouncer};
use super::orchestrator::{WatchOrchestrator, failure_detail};
use super::watch_roots::{NotifyBackend, WatchBackend};
use super::{FsActor, MAINTAIN_INTERVAL};
use crate::actor::messages::WsMsg;
use crate::ledger::{
    DataSource, Ledgers, ReloadError, SourceKey, SourceRegistry, WatchSet, file_set,
};

// =============================================================================
// Fakes
// =============================================================================

/// Records the paths the orchestrator asked to watch.
#[derive(Default)]
struct FakeBackend {
    watched: FxHashSet<PathBuf>,
    calls: usize,
}

impl WatchBackend for FakeBackend {
    fn watch(&mut self, path: &Path) {
        assert!(self.watched.insert(path.to_path_buf()), "double watch");
        self.calls += 1;
    }

    fn unwatch(&mut self, path: &Path) {
        assert!(self.watched.remove(path), "unwatch of unknown path");
        self.calls += 1;
    }
}

/// Real ledgers, counting reloads. Each reload takes at least `delay`.
struct CountingRegistry {
    inner: Ledgers,
    reloads: AtomicUsize,
    delay: Duration,
}

impl SourceRegistry for CountingRegistry {
    fn keys(&self) -> Vec<SourceKey> {
        self.inner.keys()
    }

    fn get(&self, key: &str) -> Option<Arc<DataSource>> {
        self.inner.get(key)
    }

    fn reload(&self, key: &str) -> Result<Arc<DataSource>, ReloadError> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.inner.reload(key)
    }
}

type Orchestrator = WatchOrchestrator<CountingRegistry, FakeBackend>;

struct Fixture {
    temp: TempDir,
    orchestrator: Orchestrator,
    refresh_rx: mpsc::UnboundedReceiver<WsMsg>,
}

impl Fixture {
    /// Write `files` (name, content) and load the first `sources` of them.
    fn new(files: &[(&str, &str)], sources: &[&str]) -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        for (name, content) in files {
            write(&root, name, content);
        }

        let paths: Vec<PathBuf> = sources.iter().map(|name| root.join(name)).collect();
        let registry = CountingRegistry {
            inner: Ledgers::load(&paths).unwrap(),
            reloads: AtomicUsize::new(0),
            delay: Duration::ZERO,
        };
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let orchestrator =
            WatchOrchestrator::new(Arc::new(registry), FakeBackend::default(), refresh_tx);

        Self {
            temp,
            orchestrator,
            refresh_rx,
        }
    }

    fn root(&self) -> PathBuf {
        self.temp.path().canonicalize().unwrap()
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root().join(name)
    }

    fn write(&self, name: &str, content: &str) {
        write(&self.root(), name, content);
    }

    fn set(&self, names: &[&str]) -> WatchSet {
        names.iter().map(|name| self.path(name)).collect()
    }

    fn reloads(&self) -> usize {
        self.orchestrator.registry().reloads.load(Ordering::SeqCst)
    }

    fn refreshed(&mut self) -> Vec<String> {
        let mut keys = Vec::new();
        while let Ok(msg) = self.refresh_rx.try_recv() {
            if let WsMsg::Reload { source } = msg {
                keys.push(source.to_string());
            }
        }
        keys
    }
}

fn write(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn key(name: &str) -> SourceKey {
    SourceKey::new(name)
}

// =============================================================================
// Orchestrator
// =============================================================================

#[test]
fn test_start_watches_resolved_file_set() {
    let mut fx = Fixture::new(
        &[
            ("a.dat", "include \"inc.dat\"\noption \"documents\" \"docs\"\n"),
            ("inc.dat", ""),
        ],
        &["a.dat"],
    );

    assert_eq!(fx.orchestrator.start(), 1);
    let expected = fx.set(&["a.dat", "inc.dat", "docs"]);
    assert_eq!(fx.orchestrator.watch_set("a"), expected);
    assert_eq!(fx.orchestrator.backend().watched, expected);
}

#[test]
fn test_include_change_rewatches() {
    let mut fx = Fixture::new(
        &[("a.dat", "include \"inc.dat\"\n"), ("inc.dat", "")],
        &["a.dat"],
    );
    fx.orchestrator.start();
    assert_eq!(fx.orchestrator.watch_set("a"), fx.set(&["a.dat", "inc.dat"]));

    fx.write("a.dat", "include \"inc2.dat\"\n");
    let main = fx.path("a.dat");
    let reloads = fx.orchestrator.handle_changes([main.as_path()]);

    assert_eq!(reloads, 1);
    assert_eq!(fx.reloads(), 1);
    let expected = fx.set(&["a.dat", "inc2.dat"]);
    assert_eq!(fx.orchestrator.watch_set("a"), expected);
    assert_eq!(fx.orchestrator.backend().watched, expected);
    assert_eq!(fx.refreshed(), ["a"]);
}

#[test]
fn test_post_reload_set_matches_resolver() {
    let mut fx = Fixture::new(
        &[
            ("a.dat", "include \"x.dat\"\ninclude \"y.dat\"\n"),
            ("x.dat", ""),
            ("y.dat", ""),
        ],
        &["a.dat"],
    );
    fx.orchestrator.start();
    let calls_after_start = fx.orchestrator.backend().calls;

    fx.write(
        "a.dat",
        "include \"y.dat\"\ninclude \"z.dat\"\noption \"documents\" \"docs\"\n",
    );
    let y = fx.path("y.dat");
    fx.orchestrator.handle_changes([y.as_path()]);

    let current = fx.orchestrator.registry().get("a").unwrap();
    assert_eq!(fx.orchestrator.watch_set("a"), file_set(&current));
    // x removed, z and docs added, y untouched
    assert_eq!(fx.orchestrator.backend().calls - calls_after_start, 3);
}

#[test]
fn test_encrypted_source_never_watched() {
    let mut fx = Fixture::new(
        &[
            ("secret.dat.gpg", "binary"),
            ("a.dat", "include \"inc.dat\"\n"),
        ],
        &["secret.dat.gpg", "a.dat"],
    );

    assert_eq!(fx.orchestrator.start(), 1);
    assert!(!fx.orchestrator.is_watching("secret-dat"));
    assert!(fx.orchestrator.watch_set("secret-dat").is_empty());

    // Changes next to the encrypted file never reach it
    let path = fx.path("secret.dat.gpg");
    assert_eq!(fx.orchestrator.handle_changes([path.as_path()]), 0);
    assert!(fx.orchestrator.watch_set("secret-dat").is_empty());
}

#[test]
fn test_all_encrypted_watches_nothing() {
    let mut fx = Fixture::new(&[("a.dat.asc", "")], &["a.dat.asc"]);
    assert_eq!(fx.orchestrator.start(), 0);
    assert!(fx.orchestrator.backend().watched.is_empty());
}

#[test]
fn test_failed_reload_keeps_watch_set_and_retries() {
    let mut fx = Fixture::new(
        &[("a.dat", "include \"inc.dat\"\n"), ("inc.dat", "")],
        &["a.dat"],
    );
    fx.orchestrator.start();
    let before = fx.orchestrator.watch_set("a");

    fx.write("a.dat", "include \"inc2.dat\n");
    let inc = fx.path("inc.dat");
    assert_eq!(fx.orchestrator.handle_changes([inc.as_path()]), 1);
    assert_eq!(fx.orchestrator.watch_set("a"), before);
    assert_eq!(fx.orchestrator.backend().watched, before);
    assert!(fx.refreshed().is_empty());

    // Fix and save: the old watch still triggers a reload
    fx.write("a.dat", "include \"inc2.dat\"\n");
    assert_eq!(fx.orchestrator.handle_changes([inc.as_path()]), 1);
    assert_eq!(fx.reloads(), 2);
    assert_eq!(fx.orchestrator.watch_set("a"), fx.set(&["a.dat", "inc2.dat"]));
    assert_eq!(fx.refreshed(), ["a"]);
}

#[test]
fn test_unowned_path_ignored() {
    let mut fx = Fixture::new(
        &[("a.dat", "include \"inc.dat\"\n"), ("inc.dat", "")],
        &["a.dat"],
    );
    fx.orchestrator.start();

    let other = fx.path("inc.dat.bak");
    assert_eq!(fx.orchestrator.handle_changes([other.as_path()]), 0);
    assert_eq!(fx.reloads(), 0);
}

#[test]
fn test_document_directory_owns_children() {
    let mut fx = Fixture::new(&[("a.dat", "option \"documents\" \"docs\"\n")], &["a.dat"]);
    fx.orchestrator.start();

    let receipt = fx.path("docs/2024/receipt.pdf");
    assert_eq!(fx.orchestrator.sources_for(&receipt), [key("a")]);
}

#[test]
fn test_shared_include_watched_once() {
    let mut fx = Fixture::new(
        &[
            ("a.dat", "include \"prices.dat\"\n"),
            ("b.dat", "include \"prices.dat\"\n"),
            ("prices.dat", ""),
        ],
        &["a.dat", "b.dat"],
    );
    assert_eq!(fx.orchestrator.start(), 2);
    // a.dat, b.dat and prices.dat once
    assert_eq!(fx.orchestrator.backend().calls, 3);

    let prices = fx.path("prices.dat");
    assert_eq!(fx.orchestrator.sources_for(&prices), [key("a"), key("b")]);

    // a drops the include; b still needs the watch
    fx.write("a.dat", "");
    fx.orchestrator.reload_now(&key("a"));
    assert_eq!(fx.orchestrator.watch_set("a"), fx.set(&["a.dat"]));
    assert_eq!(
        fx.orchestrator.backend().watched,
        fx.set(&["a.dat", "b.dat", "prices.dat"])
    );

    fx.write("b.dat", "");
    fx.orchestrator.reload_now(&key("b"));
    assert_eq!(fx.orchestrator.backend().watched, fx.set(&["a.dat", "b.dat"]));
}

#[test]
fn test_change_during_reload_coalesces() {
    let mut fx = Fixture::new(
        &[("a.dat", "include \"inc.dat\"\n"), ("inc.dat", "")],
        &["a.dat"],
    );
    fx.orchestrator.start();
    let a = key("a");

    assert!(fx.orchestrator.begin_reload(&a));
    // Three more changes while the first reload runs
    assert!(!fx.orchestrator.begin_reload(&a));
    assert!(!fx.orchestrator.begin_reload(&a));
    assert!(!fx.orchestrator.begin_reload(&a));

    let result = fx.orchestrator.registry().reload("a");
    assert!(fx.orchestrator.finish_reload(&a, result));

    // Exactly one follow-up
    assert!(fx.orchestrator.begin_reload(&a));
    let result = fx.orchestrator.registry().reload("a");
    assert!(!fx.orchestrator.finish_reload(&a, result));
    assert_eq!(fx.reloads(), 2);
}

#[test]
fn test_failure_detail_includes_cause() {
    let fx = Fixture::new(&[("a.dat", "")], &["a.dat"]);
    fx.write("a.dat", "include \"broken\n");

    let Err(err) = fx.orchestrator.registry().reload("a") else {
        panic!("broken ledger reloaded");
    };
    let detail = failure_detail(err);
    assert!(detail.starts_with("failed to reload `a`: "));
    assert!(detail.ends_with(":1: unterminated string"));
}

#[test]
fn test_reloads_of_different_sources_independent() {
    let mut fx = Fixture::new(&[("a.dat", ""), ("b.dat", "")], &["a.dat", "b.dat"]);
    fx.orchestrator.start();

    assert!(fx.orchestrator.begin_reload(&key("a")));
    assert!(fx.orchestrator.begin_reload(&key("b")));
}

// =============================================================================
// Debouncer
// =============================================================================

fn make_event(paths: Vec<&str>, kind: notify::EventKind) -> notify::Event {
    notify::Event {
        kind,
        paths: paths.into_iter().map(PathBuf::from).collect(),
        attrs: Default::default(),
    }
}

fn modify_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Data(
        notify::event::DataChange::Any,
    ))
}

fn create_kind() -> notify::EventKind {
    notify::EventKind::Create(notify::event::CreateKind::File)
}

fn remove_kind() -> notify::EventKind {
    notify::EventKind::Remove(notify::event::RemoveKind::File)
}

#[test]
fn test_debouncer_empty() {
    let debouncer = Debouncer::new();
    assert!(!debouncer.is_ready());
}

#[test]
fn test_debouncer_kinds() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec!["/books/a.dat"], create_kind()));
    debouncer.add_event(&make_event(vec!["/books/b.dat"], modify_kind()));
    debouncer.add_event(&make_event(vec!["/books/c.dat"], remove_kind()));

    assert_eq!(debouncer.changes.len(), 3);
    assert_eq!(
        debouncer.changes[&PathBuf::from("/books/c.dat")],
        ChangeKind::Removed
    );
}

#[test]
fn test_debouncer_ignores_temp_and_metadata() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(
        vec!["/books/.a.dat.swp", "/books/a.dat~", "/books/.#a.dat"],
        modify_kind(),
    ));
    debouncer.add_event(&make_event(
        vec!["/books/a.dat"],
        notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
            notify::event::MetadataKind::AccessTime,
        )),
    ));

    assert!(debouncer.changes.is_empty());
    assert!(debouncer.last_event.is_none());
}

#[test]
fn test_debouncer_transitions() {
    let mut debouncer = Debouncer::new();

    // Created then removed within the window: nothing happened
    debouncer.add_event(&make_event(vec!["/books/tmp.dat"], create_kind()));
    debouncer.add_event(&make_event(vec!["/books/tmp.dat"], remove_kind()));
    assert!(!debouncer.changes.contains_key(Path::new("/books/tmp.dat")));

    // Removed then created (atomic save): created
    debouncer.add_event(&make_event(vec!["/books/a.dat"], remove_kind()));
    debouncer.add_event(&make_event(vec!["/books/a.dat"], create_kind()));
    assert_eq!(
        debouncer.changes[&PathBuf::from("/books/a.dat")],
        ChangeKind::Created
    );

    // Modified then removed: removed
    debouncer.add_event(&make_event(vec!["/books/b.dat"], modify_kind()));
    debouncer.add_event(&make_event(vec!["/books/b.dat"], remove_kind()));
    assert_eq!(
        debouncer.changes[&PathBuf::from("/books/b.dat")],
        ChangeKind::Removed
    );
}

#[test]
fn test_debouncer_net_removal_kept() {
    let mut debouncer = Debouncer::new();
    let inc = PathBuf::from("/books/inc.dat");

    // Existed before the window, gone after it
    debouncer.add_event(&make_event(vec!["/books/inc.dat"], remove_kind()));
    debouncer.add_event(&make_event(vec!["/books/inc.dat"], create_kind()));
    debouncer.add_event(&make_event(vec!["/books/inc.dat"], remove_kind()));
    assert_eq!(debouncer.changes[&inc], ChangeKind::Removed);
}

#[test]
fn test_debouncer_first_kind_resets_per_window() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec!["/books/inc.dat"], remove_kind()));
    std::thread::sleep(Duration::from_millis(DEBOUNCE_MS + 20));
    assert!(debouncer.take_if_ready().is_some());

    // A fresh window that starts with the creation
    debouncer.add_event(&make_event(vec!["/books/inc.dat"], create_kind()));
    debouncer.add_event(&make_event(vec!["/books/inc.dat"], remove_kind()));
    assert!(debouncer.changes.is_empty());
}

#[test]
fn test_debouncer_ready_after_quiet_period() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec!["/books/a.dat"], modify_kind()));
    assert!(debouncer.take_if_ready().is_none());
    assert!(debouncer.sleep_duration() <= Duration::from_millis(DEBOUNCE_MS));

    std::thread::sleep(Duration::from_millis(DEBOUNCE_MS + 20));
    let changes = debouncer.take_if_ready().unwrap();
    assert_eq!(changes.len(), 1);
    assert!(debouncer.changes.is_empty());
    assert!(debouncer.take_if_ready().is_none());
}

// =============================================================================
// FsActor
// =============================================================================

/// `FsActor` running on a real notify watcher over a ledger `a.dat`.
struct Running {
    _temp: TempDir,
    root: PathBuf,
    registry: Arc<CountingRegistry>,
    refresh_rx: mpsc::UnboundedReceiver<WsMsg>,
    actor: tokio::task::JoinHandle<()>,
}

impl Running {
    fn start(files: &[(&str, &str)], delay: Duration) -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        for (name, content) in files {
            write(&root, name, content);
        }

        let registry = Arc::new(CountingRegistry {
            inner: Ledgers::load(&[root.join("a.dat")]).unwrap(),
            reloads: AtomicUsize::new(0),
            delay,
        });
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let backend = NotifyBackend::new(notify_tx).unwrap();
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let mut orchestrator = WatchOrchestrator::new(Arc::clone(&registry), backend, refresh_tx);
        assert_eq!(orchestrator.start(), 1);

        let actor = tokio::spawn(FsActor::new(notify_rx, orchestrator).run());
        Self {
            _temp: temp,
            root,
            registry,
            refresh_rx,
            actor,
        }
    }

    fn write(&self, name: &str, content: &str) {
        write(&self.root, name, content);
    }

    fn reloads(&self) -> usize {
        self.registry.reloads.load(Ordering::SeqCst)
    }

    async fn wait_for_reloads(&self, count: usize) {
        for _ in 0..250 {
            if self.reloads() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("expected {count} reloads, saw {}", self.reloads());
    }

    fn refreshed(&mut self) -> Vec<String> {
        let mut keys = Vec::new();
        while let Ok(msg) = self.refresh_rx.try_recv() {
            if let WsMsg::Reload { source } = msg {
                keys.push(source.to_string());
            }
        }
        keys
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.actor.abort();
    }
}

/// Long enough for any pending debounce window to fire.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS * 3)).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_actor_reloads_once_per_save() {
    let mut run = Running::start(
        &[("a.dat", "include \"inc.dat\"\n"), ("inc.dat", "")],
        Duration::ZERO,
    );

    // An editor save touches the file several times in a row
    for day in 1..=3 {
        run.write("inc.dat", &format!("2024-01-0{day} open Assets:Cash\n"));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    run.wait_for_reloads(1).await;
    settle().await;

    assert_eq!(run.reloads(), 1);
    assert_eq!(run.refreshed(), ["a"]);
    assert_eq!(run.registry.get("a").unwrap().entries, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_actor_coalesces_changes_during_reload() {
    let delay = Duration::from_millis(1000);
    let mut run = Running::start(&[("a.dat", "include \"inc.dat\"\n"), ("inc.dat", "")], delay);

    run.write("inc.dat", "; first\n");
    run.wait_for_reloads(1).await;

    // Two separately debounced saves while the first reload still runs
    run.write("inc.dat", "; second\n");
    tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS + 100)).await;
    run.write("inc.dat", "; third\n");

    run.wait_for_reloads(2).await;
    tokio::time::sleep(delay).await;
    settle().await;

    assert_eq!(run.reloads(), 2);
    assert_eq!(run.refreshed(), ["a", "a"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_actor_watches_documents_directory_created_later() {
    let run = Running::start(&[("a.dat", "option \"documents\" \"docs\"\n")], Duration::ZERO);

    fs::create_dir(run.root.join("docs")).unwrap();
    run.wait_for_reloads(1).await;

    // The next maintain tick moves the watch onto the new directory
    tokio::time::sleep(MAINTAIN_INTERVAL + Duration::from_millis(500)).await;
    run.write("docs/receipt.pdf", "%PDF");
    run.wait_for_reloads(2).await;
}
