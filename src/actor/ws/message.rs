//! Live Reload Message Protocol
//!
//! JSON messages exchanged with the browser client.
//!
//! ```text
//! server → client  {"type":"connected","version":"0.1.0"}
//! server → client  {"type":"reload","source":"books"}
//! client → server  {"type":"page","source":"books"}   (null on the index)
//! ```

use serde::{Deserialize, Serialize};

/// Message sent to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Connection established
    Connected { version: String },
    /// A source was reloaded
    Reload { source: String },
}

impl ServerMessage {
    pub fn connected() -> Self {
        Self::Connected {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn reload(source: impl Into<String>) -> Self {
        Self::Reload {
            source: source.into(),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload"}"#.to_string())
    }
}

/// Message received from clients
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// The page a client shows; `None` for pages outside any source.
    Page {
        #[serde(default)]
        source: Option<String>,
    },
}

impl ClientMessage {
    /// Parse from JSON string
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}
