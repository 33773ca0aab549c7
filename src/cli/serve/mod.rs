//! Report server in its four serving modes.
//!
//! Handler layering, outermost first:
//!
//! ```text
//! Profiler (profile mode) → Mount (--prefix) → Livereload (live-reload mode) → ReportApp
//! ```

mod app;
mod bind;
mod http;
mod lifecycle;
mod livereload;
mod mount;
mod profile;

pub use app::ReportApp;
pub use bind::ServeError;
pub use http::{Handler, Request, Response};

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tiny_http::Server;
use tokio::sync::mpsc;

use crate::actor::ws::{DEFAULT_WS_PORT, start_ws_server};
use crate::actor::messages::WsMsg;
use crate::actor::{Coordinator, NotifyBackend, WatchOrchestrator};
use crate::config::ServerConfig;
use crate::ledger::Ledgers;
use crate::mode::ServingMode;
use crate::utils::html::escape;
use crate::utils::plural::plural_count;
use crate::{debug, log};
use livereload::Livereload;
use mount::Mount;
use profile::Profiler;

/// Number of request worker threads
const REQUEST_THREADS: usize = 4;

/// Serve `ledgers` in `mode` until shutdown.
pub fn run(mode: ServingMode, config: &ServerConfig, ledgers: Arc<Ledgers>) -> Result<()> {
    let app = Arc::new(ReportApp::new(Arc::clone(&ledgers)));
    debug!("serve"; "mode: {}", mode);

    let mode = match mode {
        ServingMode::LiveReload => match start_watching(ledgers)? {
            Some(watching) => return run_live_reload(config, app, watching),
            None => {
                log!("watch"; "no ledger can be watched, serving without live reload");
                ServingMode::Plain
            }
        },
        mode => mode,
    };

    if mode.is_debug() {
        crate::logger::set_verbose(true);
        app.set_template_auto_reload(true);
    }
    let profile = mode == ServingMode::Profile;
    bind_server(config)?.run(build_handler(app, config, None, profile), mode.is_debug())
}

/// Started watches, waiting for the actor system.
struct Watching {
    orchestrator: WatchOrchestrator<Ledgers, NotifyBackend>,
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    ws_tx: mpsc::UnboundedSender<WsMsg>,
    ws_rx: mpsc::UnboundedReceiver<WsMsg>,
}

/// Watch every unencrypted source. `None` when there is nothing to watch;
/// the watcher is dropped with the orchestrator then.
fn start_watching(ledgers: Arc<Ledgers>) -> Result<Option<Watching>> {
    let (notify_tx, notify_rx) = std::sync::mpsc::channel();
    let backend = NotifyBackend::new(notify_tx).context("failed to create file watcher")?;
    let (ws_tx, ws_rx) = mpsc::unbounded_channel();

    let mut orchestrator = WatchOrchestrator::new(ledgers, backend, ws_tx.clone());
    let watched = orchestrator.start();
    if watched == 0 {
        return Ok(None);
    }
    log!("watch"; "watching {}", plural_count(watched, "ledger"));

    Ok(Some(Watching {
        orchestrator,
        notify_rx,
        ws_tx,
        ws_rx,
    }))
}

/// Watches are in place before the first request can be served.
fn run_live_reload(
    config: &ServerConfig,
    app: Arc<ReportApp<Ledgers>>,
    watching: Watching,
) -> Result<()> {
    let Watching {
        orchestrator,
        notify_rx,
        ws_tx,
        ws_rx,
    } = watching;
    let server = bind_server(config)?;

    let ws_port = match start_ws_server(&config.host, DEFAULT_WS_PORT, ws_tx.clone()) {
        Ok(port) => {
            debug!("ws"; "ws://{}:{}", config.host, port);
            Some(port)
        }
        Err(e) => {
            log!("ws"; "{:#}, browsers will not refresh", e);
            None
        }
    };

    let (shutdown_tx, shutdown_rx) = crossbeam::channel::unbounded::<()>();
    crate::core::register_actors(shutdown_tx);
    let coordinator = Coordinator::new(orchestrator, notify_rx, ws_tx, ws_rx, shutdown_rx);
    let actors = lifecycle::spawn_actors(coordinator);

    let result = server.run(build_handler(app, config, ws_port, false), false);
    lifecycle::wait_for_shutdown(actors);
    result
}

fn build_handler(
    app: Arc<ReportApp<Ledgers>>,
    config: &ServerConfig,
    ws_port: Option<u16>,
    profile: bool,
) -> Arc<dyn Handler> {
    let mut handler: Box<dyn Handler> = Box::new(app);
    if let Some(port) = ws_port {
        handler = Box::new(Livereload::new(handler, port));
    }
    if let Some(prefix) = &config.prefix {
        handler = Box::new(Mount::new(prefix.as_str(), handler));
    }
    if profile {
        handler = Box::new(Profiler::new(
            handler,
            config.profile_restriction,
            config.profile_dir.clone(),
        ));
    }
    Arc::from(handler)
}

/// Bound server ready to accept requests
struct BoundServer {
    server: Arc<Server>,
}

/// Bind the HTTP server and register it for graceful shutdown.
fn bind_server(config: &ServerConfig) -> Result<BoundServer, ServeError> {
    let (server, addr) = bind::bind(&config.host, config.port)?;
    let server = Arc::new(server);
    crate::core::register_server(Arc::clone(&server));

    let addr = addr.map_or_else(
        || format!("{}:{}", config.host, config.port),
        |addr: SocketAddr| addr.to_string(),
    );
    log!("serve"; "http://{}{}/", addr, config.prefix.as_deref().unwrap_or(""));

    Ok(BoundServer { server })
}

impl BoundServer {
    /// Run the request loop until the server is unblocked.
    fn run(self, handler: Arc<dyn Handler>, debug: bool) -> Result<()> {
        // Requests are answered concurrently so a slow page doesn't block others
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(REQUEST_THREADS)
            .build()
            .context("failed to create request thread pool")?;

        for request in self.server.incoming_requests() {
            let handler = Arc::clone(&handler);
            pool.spawn(move || {
                if let Err(e) = handle_request(request, handler.as_ref(), debug) {
                    log!("serve"; "request error: {e}");
                }
            });
        }
        Ok(())
    }
}

/// Handle a single HTTP request
fn handle_request(request: tiny_http::Request, handler: &dyn Handler, debug: bool) -> Result<()> {
    if crate::core::is_shutdown() {
        return request
            .respond(Response::text(503, "503 Service Unavailable").into_tiny())
            .map_err(Into::into);
    }

    let req = Request::new(request.method().clone(), request.url());
    let response = match handler.handle(&req) {
        Ok(response) => response,
        Err(e) => {
            log!("error"; "{} {}: {:#}", req.method, req.url, e);
            error_response(&e, debug)
        }
    };

    request.respond(response.into_tiny())?;
    Ok(())
}

/// 500 response; the error detail is only shown in debug mode.
fn error_response(error: &anyhow::Error, debug: bool) -> Response {
    if !debug {
        return Response::text(500, "500 Internal Server Error");
    }
    let detail = format!("{error:?}");
    Response::html(
        500,
        format!(
            "<html><body><h1>Internal Server Error</h1><pre>{}</pre></body></html>",
            escape(&detail)
        ),
    )
}
