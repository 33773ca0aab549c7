use tungstenite::protocol::Message;

use super::{WsActor, wants_reload};
use crate::ledger::SourceKey;

impl WsActor {
    /// Send a message to clients showing `target` (or no particular source)
    pub(super) fn send_to_source(&self, target: &SourceKey, msg: Message) {
        let mut clients = self.clients.lock();
        if clients.is_empty() {
            crate::debug!("ws"; "no clients connected");
            return;
        }

        let mut sent = 0;
        clients.retain_mut(|client| {
            if !wants_reload(client.source.as_ref(), target) {
                return true; // Keep client, just don't send
            }
            match client.ws.send(msg.clone()) {
                Ok(()) => {
                    sent += 1;
                    true
                }
                Err(e) => {
                    crate::debug!("ws"; "client disconnected: {}", e);
                    false
                }
            }
        });

        crate::debug!("ws"; "sent reload of {} to {} clients", target, sent);
    }
}
