//! The report application: a source list and one summary page per source.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tiny_http::Method;

use super::http::{Handler, Request, Response};
use crate::embed::report::{INDEX_HTML, IndexVars, SOURCE_HTML, SourceVars};
use crate::ledger::{DataSource, SourceKey, SourceRegistry};
use crate::utils::html::escape;
use crate::utils::plural::plural_count;

const TITLE: &str = "Ledgers";

/// Renders pages from the registry's current snapshots.
pub struct ReportApp<R> {
    registry: Arc<R>,
    /// Render every request from scratch (debug mode)
    template_auto_reload: AtomicBool,
    /// Source key → (generation, rendered page)
    cache: Mutex<FxHashMap<SourceKey, (u64, Arc<str>)>>,
}

impl<R: SourceRegistry> ReportApp<R> {
    pub fn new(registry: Arc<R>) -> Self {
        Self {
            registry,
            template_auto_reload: AtomicBool::new(false),
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn set_template_auto_reload(&self, enabled: bool) {
        self.template_auto_reload.store(enabled, Ordering::Relaxed);
        if enabled {
            self.cache.lock().clear();
        }
    }

    pub fn template_auto_reload(&self) -> bool {
        self.template_auto_reload.load(Ordering::Relaxed)
    }

    fn index(&self) -> Response {
        let rows: String = self
            .registry
            .keys()
            .iter()
            .filter_map(|key| self.registry.get(key.as_str()))
            .map(|source| {
                let key = escape(source.key.as_str());
                format!(
                    "<li><a href=\"{key}/\">{key}</a> <code>{}</code> ({})</li>\n",
                    escape(&source.path.to_string_lossy()),
                    summary(&source)
                )
            })
            .collect();

        Response::html(
            200,
            INDEX_HTML.render(&IndexVars {
                title: TITLE.to_string(),
                rows,
            }),
        )
    }

    fn source_page(&self, key: &str) -> Option<Response> {
        let source = self.registry.get(key)?;

        if self.template_auto_reload() {
            return Some(Response::html(200, render_source(&source)));
        }

        let mut cache = self.cache.lock();
        if let Some((generation, page)) = cache.get(key)
            && *generation == source.generation
        {
            return Some(Response::html(200, page.to_string()));
        }

        let page: Arc<str> = render_source(&source).into();
        cache.insert(source.key.clone(), (source.generation, Arc::clone(&page)));
        Some(Response::html(200, page.to_string()))
    }
}

impl<R: SourceRegistry> Handler for ReportApp<R> {
    fn handle(&self, request: &Request) -> Result<Response> {
        if !matches!(request.method, Method::Get | Method::Head) {
            return Ok(Response::method_not_allowed());
        }

        let path = request.path();
        if path == "/" || path.is_empty() {
            return Ok(self.index());
        }

        let Some(rest) = path.strip_prefix('/') else {
            return Ok(Response::not_found());
        };
        let response = match rest.split_once('/') {
            Some((key, "")) => self.source_page(key),
            // Relative, so it stays below a mount prefix
            None => self.registry.get(rest).map(|_| Response::redirect(format!("{rest}/"))),
            Some(_) => None,
        };
        Ok(response.unwrap_or_else(Response::not_found))
    }
}

fn summary(source: &DataSource) -> String {
    if source.encrypted {
        "encrypted".to_string()
    } else {
        plural_count(source.entries, "entry")
    }
}

fn render_source(source: &DataSource) -> String {
    SOURCE_HTML.render(&SourceVars {
        key: escape(source.key.as_str()).into_owned(),
        path: escape(&source.path.to_string_lossy()).into_owned(),
        entries: summary(source),
        generation: source.generation,
        includes: list_items(&source.options.include),
        documents: list_items(&source.options.documents),
    })
}

fn list_items(paths: &[impl AsRef<Path>]) -> String {
    paths
        .iter()
        .map(|p| format!("<li><code>{}</code></li>\n", escape(&p.as_ref().to_string_lossy())))
        .collect()
}
