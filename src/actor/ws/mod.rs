//! WebSocket Actor - Live Reload Channel
//!
//! This actor is responsible for:
//! - Managing WebSocket client connections
//! - Pushing reload messages to clients showing the reloaded source
//! - Receiving client messages (the source a page shows)
//!
//! # Architecture
//!
//! ```text
//! FsActor --[Reload]--> WsActor --[targeted]--> Clients
//!                          ^                       |
//!                          +-----[page source]-----+
//! ```

mod client_io;
mod delivery;
mod message;
mod server;


use std::net::TcpStream;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::messages::WsMsg;
use crate::ledger::SourceKey;

pub use message::{ClientMessage, ServerMessage};
pub use server::{DEFAULT_WS_PORT, start_ws_server};

/// A registered WebSocket client with the source it shows
struct RegisteredClient {
    ws: WebSocket<TcpStream>,
    /// `None` until announced, or when the page shows no single source
    source: Option<SourceKey>,
}

/// WebSocket Actor - manages client connections and reload pushes
pub struct WsActor {
    /// Channel to receive messages
    rx: mpsc::UnboundedReceiver<WsMsg>,
    /// Connected clients (shared for push + read threads)
    clients: Arc<Mutex<Vec<RegisteredClient>>>,
}

impl WsActor {
    pub fn new(rx: mpsc::UnboundedReceiver<WsMsg>) -> Self {
        Self {
            rx,
            clients: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let clients_for_reader = Arc::clone(&self.clients);
        std::thread::spawn(move || {
            Self::client_reader_loop(clients_for_reader);
        });

        while let Some(msg) = self.rx.recv().await {
            match msg {
                WsMsg::Reload { source } => {
                    let json = ServerMessage::reload(source.as_str()).to_json();
                    self.send_to_source(&source, Message::Text(json.into()));
                }

                WsMsg::AddClient(stream) => {
                    self.add_client(stream);
                }

                WsMsg::Shutdown => {
                    crate::debug!("ws"; "shutting down");
                    let mut clients = self.clients.lock();
                    for mut client in clients.drain(..) {
                        let _ = client.ws.close(None);
                    }
                    break;
                }
            }
        }
    }
}

/// Whether a client showing `shown` wants the reload of `target`.
///
/// Clients that have not announced a source get every reload.
fn wants_reload(shown: Option<&SourceKey>, target: &SourceKey) -> bool {
    shown.is_none_or(|key| key == target)
}
