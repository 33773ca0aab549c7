use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::{ClientMessage, RegisteredClient, ServerMessage, WsActor};
use crate::ledger::SourceKey;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Longest wait for a connecting client to finish its handshake.
pub(super) const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

impl WsActor {
    /// Add a new client connection
    pub(super) fn add_client(&self, stream: TcpStream) {
        // Blocking during handshake (bounded, so a stalled client can't hold
        // up reloads), non-blocking after
        if let Err(e) = stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT)) {
            crate::log!("ws"; "failed to set handshake timeout: {}", e);
            return;
        }
        match tungstenite::accept(stream) {
            Ok(mut ws) => {
                let _ = ws.get_ref().set_nonblocking(true);

                let connected = ServerMessage::connected().to_json();
                if let Err(e) = ws.send(Message::Text(connected.into())) {
                    crate::log!("ws"; "failed to send connected message: {}", e);
                    return;
                }

                // The page announces itself on open; catch it now so a reload
                // pushed right after is already targeted
                let source = Self::try_read_initial_source(&mut ws);

                let mut clients = self.clients.lock();
                crate::debug!("ws"; "client connected (total: {}, source: {:?})", clients.len() + 1, source);
                clients.push(RegisteredClient { ws, source });
            }
            Err(e) => {
                crate::log!("ws"; "handshake failed: {}", e);
            }
        }
    }

    /// Background thread to read client messages (non-blocking poll)
    pub(super) fn client_reader_loop(clients: Arc<Mutex<Vec<RegisteredClient>>>) {
        while !crate::core::is_shutdown() {
            std::thread::sleep(POLL_INTERVAL);

            let mut clients_guard = clients.lock();
            clients_guard.retain_mut(|client| match client.ws.read() {
                Ok(Message::Text(text)) => {
                    if let Some(source) = parse_page_message(&text) {
                        client.source = source;
                    }
                    true
                }
                Ok(Message::Close(_)) => false,
                Err(tungstenite::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    true
                }
                Err(_) => false,
                Ok(_) => true,
            });
        }
    }

    fn try_read_initial_source(ws: &mut WebSocket<TcpStream>) -> Option<SourceKey> {
        for _ in 0..5 {
            match ws.read() {
                Ok(Message::Text(text)) => {
                    if let Some(source) = parse_page_message(&text) {
                        return source;
                    }
                }
                Err(tungstenite::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(5));
                }
                _ => break,
            }
        }
        None
    }
}

/// Source announced by a page message.
///
/// Outer `None`: not a page message. Inner `None`: a page without a source.
pub(super) fn parse_page_message(text: &str) -> Option<Option<SourceKey>> {
    let ClientMessage::Page { source } = ClientMessage::from_json(text)?;
    let source = source.filter(|s| !s.is_empty()).map(|s| {
        let decoded = percent_decode_str(&s)
            .decode_utf8()
            .map(|d| d.into_owned())
            .unwrap_or(s);
        SourceKey::new(decoded)
    });
    crate::debug!("ws"; "client source: {:?}", source);
    Some(source)
}
