use std::time::Duration;

use anyhow::Result;
use crossbeam::channel::{Receiver, TryRecvError};
use tokio::sync::mpsc;

use crate::actor::fs::{FsActor, WatchBackend};
use crate::actor::messages::WsMsg;
use crate::actor::ws::WsActor;
use crate::ledger::SourceRegistry;

/// Run all actors concurrently.
pub(super) async fn run_actors<R, B>(
    fs: FsActor<R, B>,
    ws: WsActor,
    ws_tx: mpsc::UnboundedSender<WsMsg>,
    shutdown_rx: Receiver<()>,
) -> Result<()>
where
    R: SourceRegistry + 'static,
    B: WatchBackend + 'static,
{
    let ws_handle = tokio::spawn(async move { ws.run().await });
    let fs_handle = tokio::spawn(async move { fs.run().await });

    // The signal comes from the ctrlc thread, so poll it
    while let Err(TryRecvError::Empty) = shutdown_rx.try_recv() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    crate::debug!("actor"; "shutdown signal received");
    fs_handle.abort();

    crate::debug!("actor"; "sending shutdown to ws");
    let _ = ws_tx.send(WsMsg::Shutdown);

    let _ = tokio::time::timeout(Duration::from_millis(500), ws_handle).await;

    Ok(())
}
