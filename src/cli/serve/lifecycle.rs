//! Actor system lifecycle in live-reload mode.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::actor::{Coordinator, WatchBackend};
use crate::ledger::SourceRegistry;

/// Run the actor system on its own thread with a dedicated runtime.
pub fn spawn_actors<R, B>(coordinator: Coordinator<R, B>) -> JoinHandle<()>
where
    R: SourceRegistry + 'static,
    B: WatchBackend + 'static,
{
    thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                crate::log!("error"; "failed to create runtime, live reload disabled: {}", e);
                return;
            }
        };

        rt.block_on(async {
            if let Err(e) = coordinator.run().await {
                crate::log!("actor"; "error: {}", e);
            }
        });
        // Reload tasks on the blocking pool are not waited for
        rt.shutdown_timeout(Duration::from_millis(500));
    })
}

/// Wait for actor system to shutdown gracefully (max 2 seconds).
pub fn wait_for_shutdown(handle: JoinHandle<()>) {
    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
}
