//! Per-request profiling layer.
//!
//! Every request is timed and folded into per-route statistics. After each
//! request the slowest routes (by cumulative time) are printed; with a
//! profile directory, the same table is also written to a file named
//!
//! ```text
//! {METHOD}.{path}.{elapsed}ms.{unix_secs}.prof
//! ```
//!
//! where `path` has its slashes replaced by dots (`root` for `/`).

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::http::{Handler, Request, Response};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RouteStats {
    calls: u64,
    total: Duration,
    max: Duration,
}

impl RouteStats {
    fn record(&mut self, elapsed: Duration) {
        self.calls += 1;
        self.total += elapsed;
        self.max = self.max.max(elapsed);
    }
}

/// Wraps a handler and profiles every request.
pub struct Profiler<H> {
    inner: H,
    /// Number of routes listed per table
    restriction: usize,
    dir: Option<PathBuf>,
    stats: Mutex<FxHashMap<String, RouteStats>>,
}

impl<H: Handler> Profiler<H> {
    pub fn new(inner: H, restriction: usize, dir: Option<PathBuf>) -> Self {
        Self {
            inner,
            restriction,
            dir,
            stats: Mutex::new(FxHashMap::default()),
        }
    }

    /// Top routes by cumulative time, rendered as a text table.
    fn table(&self) -> String {
        let stats = self.stats.lock();
        let mut routes: Vec<(&String, &RouteStats)> = stats.iter().collect();
        routes.sort_by(|a, b| b.1.total.cmp(&a.1.total).then_with(|| a.0.cmp(b.0)));

        let mut table = format!(
            "{:>8} {:>12} {:>10}  route\n",
            "calls", "cumul (ms)", "max (ms)"
        );
        for (route, stat) in routes.into_iter().take(self.restriction) {
            let _ = writeln!(
                table,
                "{:>8} {:>12.3} {:>10.3}  {}",
                stat.calls,
                millis(stat.total),
                millis(stat.max),
                route
            );
        }
        table
    }

    fn write_artifact(&self, dir: &Path, request: &Request, elapsed: Duration, table: &str) {
        let name = artifact_name(request, elapsed, SystemTime::now());
        let content = format!(
            "{} {} {:.3}ms\n\n{}",
            request.method,
            request.url,
            millis(elapsed),
            table
        );

        let result = fs::create_dir_all(dir).and_then(|()| fs::write(dir.join(&name), content));
        if let Err(e) = result {
            crate::log!("profile"; "failed to write {}: {}", dir.join(&name).display(), e);
        }
    }
}

impl<H: Handler> Handler for Profiler<H> {
    fn handle(&self, request: &Request) -> Result<Response> {
        let start = Instant::now();
        let result = self.inner.handle(request);
        let elapsed = start.elapsed();

        self.stats
            .lock()
            .entry(request.path().to_string())
            .or_default()
            .record(elapsed);

        let table = self.table();
        crate::log!("profile"; "{} {} {:.3}ms\n{}", request.method, request.url, millis(elapsed), table);

        if let Some(dir) = &self.dir {
            self.write_artifact(dir, request, elapsed, &table);
        }

        result
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// `{METHOD}.{path}.{elapsed}ms.{unix_secs}.prof`
fn artifact_name(request: &Request, elapsed: Duration, now: SystemTime) -> String {
    let path = request.path().trim_matches('/').replace('/', ".");
    let path = if path.is_empty() { "root" } else { &path };
    let secs = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!(
        "{}.{}.{:.0}ms.{}.prof",
        request.method,
        path,
        millis(elapsed),
        secs
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Sleepy;

    impl Handler for Sleepy {
        fn handle(&self, request: &Request) -> Result<Response> {
            if request.path() == "/slow/" {
                std::thread::sleep(Duration::from_millis(20));
            }
            Ok(Response::text(200, "ok"))
        }
    }

    #[test]
    fn test_artifact_name() {
        let at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(
            artifact_name(&Request::get("/books/journal/?x=1"), Duration::from_millis(12), at),
            "GET.books.journal.12ms.1700000000.prof"
        );
        assert_eq!(
            artifact_name(&Request::get("/"), Duration::from_micros(400), at),
            "GET.root.0ms.1700000000.prof"
        );
    }

    #[test]
    fn test_stats_and_restriction() {
        let profiler = Profiler::new(Sleepy, 1, None);
        profiler.handle(&Request::get("/")).unwrap();
        profiler.handle(&Request::get("/slow/")).unwrap();
        profiler.handle(&Request::get("/slow/?again")).unwrap();

        let stats = profiler.stats.lock().clone();
        assert_eq!(stats["/slow/"].calls, 2);
        assert_eq!(stats["/"].calls, 1);
        assert!(stats["/slow/"].max >= Duration::from_millis(20));

        let table = profiler.table();
        assert!(table.contains("/slow/"));
        assert!(!table.contains("  /\n"));
    }

    #[test]
    fn test_writes_artifacts() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("profiles");
        let profiler = Profiler::new(Sleepy, 30, Some(dir.clone()));

        let response = profiler.handle(&Request::get("/books/")).unwrap();
        assert_eq!(response.status, 200);

        let files: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].starts_with("GET.books."));
        assert!(files[0].ends_with(".prof"));
    }
}
