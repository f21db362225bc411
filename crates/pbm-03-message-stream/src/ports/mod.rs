//! Ports (hexagonal architecture) for the message stream.

pub mod inbound;
pub mod outbound;
