//! # Adapters
//!
//! Implementations of the stream's outbound `PeerTransport` port.

mod memory_transport;

pub use memory_transport::{Frame, InMemoryTransport};
