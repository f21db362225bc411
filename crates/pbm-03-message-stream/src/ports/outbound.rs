//! Outbound ports (SPI) for the message stream.

use async_trait::async_trait;
use shared_types::{EnvelopeId, PeerId};
use thiserror::Error;

use crate::events::DeliveryFailure;

/// Transport-level failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Peer {0} is unreachable")]
    Unreachable(PeerId),

    #[error("Transport I/O error: {0}")]
    Io(String),
}

/// Raw byte delivery to directly connected peers.
///
/// Connection setup, NAT traversal and encryption live behind this trait.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Hands one frame to the transport.
    ///
    /// `Ok` means the transport accepted the frame, not that the peer read it.
    async fn send(&self, peer: PeerId, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Consulted before retransmitting; `false` keeps the outbox untouched.
    fn is_reachable(&self, peer: &PeerId) -> bool;
}

/// Notifications the stream raises outside any request.
pub trait StreamObserver: Send + Sync {
    /// Retry budget of an envelope ran out.
    fn delivery_failed(&self, peer: PeerId, failure: DeliveryFailure);

    /// Peer went offline (send reported unreachable) or came back.
    fn reachability_changed(&self, peer: PeerId, online: bool);

    /// A frame was resent after its retry timeout.
    fn envelope_retransmitted(&self, _peer: PeerId, _envelope_id: EnvelopeId, _attempt: u32) {}
}
