//! # Engine Runtime
//!
//! The messaging engine the UI talks to. One engine per local node; each
//! directly connected peer gets its own conversation.
//!
//! ## Data Flow
//!
//! ```text
//! UI ──submit_block──→ MessageStream ──frame──→ PeerTransport ──→ peer
//!                                                                  │
//! UI ←─EventBus←─ Trackers ←─ BlockRegistry ←─ MessageStream ←─handle_incoming
//! ```
//!
//! ## Modules
//!
//! - `config` - engine configuration from environment
//! - `engine` - the [`MessagingEngine`] facade
//! - `observer` - stream notifications turned into events and narration
//! - `conversation_log` - display-ordered block log per conversation
//! - `events` - UI events published on the bus
//! - `adapters` - transport implementations

pub mod adapters;
pub mod config;
pub mod conversation_log;
pub mod engine;
pub mod errors;
pub mod events;
pub mod observer;
mod state;

pub use adapters::InMemoryTransport;
pub use config::{ConfigError, EngineConfig};
pub use conversation_log::ConversationLog;
pub use engine::{MessagingEngine, Submitted};
pub use errors::EngineError;
pub use events::{EngineEvent, EngineTopic};
pub use observer::EngineObserver;
