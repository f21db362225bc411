//! # Message Stream (pbm-03)
//!
//! The protocol core: ordering, deduplication, acknowledgment and offline
//! queuing of envelopes exchanged with one directly connected peer.
//!
//! ## Architecture Role
//!
//! ```text
//! [Engine] ──send_reliable──→ [Message Stream] ──frame──→ [PeerTransport]
//!                                   ↑                            │
//!                                   └────── handle_frame ←───────┘
//!                                   │
//!                                   ↓ in-order deliveries
//!                          [Registry / Trackers]
//! ```
//!
//! ## Guarantees
//!
//! - Reliable envelopes reach the upper layer exactly once and in strictly
//!   increasing per-sender sequence order, whatever the arrival interleaving.
//! - A retransmission keeps its envelope id and sequence number.
//! - An unreachable peer never loses an envelope: it stays in the outbox.
//! - Typing indicators bypass sequencing, acks and the outbox.
//!
//! All sequencing logic is synchronous and lives in [`Conversation`]; the
//! service only adds locking, transport I/O and timers.

pub mod codec;
pub mod domain;
pub mod events;
pub mod ports;
pub mod service;

pub use codec::{decode_envelope, encode_envelope, PROTOCOL_VERSION};
pub use domain::*;
pub use events::{CodecError, DeliveryFailure, StreamError};
pub use ports::inbound::FrameHandler;
pub use ports::outbound::{PeerTransport, StreamObserver, TransportError};
pub use service::MessageStreamService;
