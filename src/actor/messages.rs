//! Actor Message Definitions
//!
//! ```text
//! FsActor --Reload--> WsActor
//! accept loop --AddClient--> WsActor
//! ```

use std::net::TcpStream;

use crate::ledger::SourceKey;

/// Messages to WebSocket Actor
pub enum WsMsg {
    /// Refresh clients showing this source (and clients showing no source)
    Reload { source: SourceKey },
    /// Add client
    AddClient(TcpStream),
    /// Shutdown
    Shutdown,
}
