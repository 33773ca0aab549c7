//! Actor Coordinator - Wires up the Live Reload Actor System
//!
//! The Coordinator is a thin orchestrator that:
//! - Takes the started watch orchestrator and the refresh channel
//! - Wires up FsActor and WsActor
//! - Runs them until shutdown

mod runtime;

use anyhow::Result;
use crossbeam::channel::Receiver;
use tokio::sync::mpsc;

use super::fs::{FsActor, WatchBackend, WatchOrchestrator};
use super::messages::WsMsg;
use super::ws::WsActor;
use crate::ledger::SourceRegistry;

type NotifyReceiver = std::sync::mpsc::Receiver<notify::Result<notify::Event>>;

/// Coordinator - wires up and runs the actor system.
pub struct Coordinator<R, B> {
    fs: FsActor<R, B>,
    ws: WsActor,
    ws_tx: mpsc::UnboundedSender<WsMsg>,
    shutdown_rx: Receiver<()>,
}

impl<R, B> Coordinator<R, B>
where
    R: SourceRegistry + 'static,
    B: WatchBackend + 'static,
{
    /// `orchestrator` must be started and hold a sender of `ws_rx`'s channel.
    /// The actors run until a message arrives on `shutdown_rx`.
    pub fn new(
        orchestrator: WatchOrchestrator<R, B>,
        notify_rx: NotifyReceiver,
        ws_tx: mpsc::UnboundedSender<WsMsg>,
        ws_rx: mpsc::UnboundedReceiver<WsMsg>,
        shutdown_rx: Receiver<()>,
    ) -> Self {
        Self {
            fs: FsActor::new(notify_rx, orchestrator),
            ws: WsActor::new(ws_rx),
            ws_tx,
            shutdown_rx,
        }
    }

    /// Run the actor system.
    pub async fn run(self) -> Result<()> {
        crate::debug!("actor"; "start");
        runtime::run_actors(self.fs, self.ws, self.ws_tx, self.shutdown_rx).await?;
        crate::debug!("actor"; "stopped");
        Ok(())
    }
}
