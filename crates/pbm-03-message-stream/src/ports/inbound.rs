//! Inbound ports (API) for the message stream.

use async_trait::async_trait;
use shared_types::PeerId;

use crate::domain::ReceiveOutcome;
use crate::events::StreamError;

/// Entry point for bytes the transport received from a peer.
#[async_trait]
pub trait FrameHandler: Send + Sync {
    async fn on_receive(&self, peer: PeerId, frame: Vec<u8>) -> Result<ReceiveOutcome, StreamError>;
}
