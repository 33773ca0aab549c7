//! Actor System for Live Reload
//!
//! Message-passing concurrency for live-reload mode:
//!
//! ```text
//! notify --> FsActor --reload--> SourceRegistry
//!              |
//!              +--Reload{source}--> WsActor --> browsers
//! ```
//!
//! # Module Structure
//!
//! - `messages` - Message types for inter-actor communication
//! - `fs` - File watcher, debouncing and the per-source watch orchestrator
//! - `ws` - WebSocket refresh broadcast
//! - `coordinator` - Wires up and runs actors

pub mod coordinator;
pub mod fs;
pub mod messages;
pub mod ws;

pub use coordinator::Coordinator;
pub use fs::{NotifyBackend, WatchBackend, WatchOrchestrator};
