//! Error and notification types for the message stream.

use pbm_01_block_model::BlockModelError;
use shared_types::{EnvelopeId, PeerId};
use thiserror::Error;

use crate::domain::PayloadKind;
use crate::ports::outbound::TransportError;

/// Retry budget of a reliable envelope ran out.
///
/// Surfaced to the UI as a recoverable notification; the envelope stays
/// parked in the outbox until it is acked, revived, or the conversation ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub envelope_id: EnvelopeId,
    pub sequence: u64,
    pub attempts: u32,
}

impl From<DeliveryFailure> for StreamError {
    fn from(failure: DeliveryFailure) -> Self {
        StreamError::DeliveryFailed {
            envelope_id: failure.envelope_id,
            attempts: failure.attempts,
        }
    }
}

/// Wire codec errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Frame too short: {len} bytes")]
    Truncated { len: usize },

    #[error("Unsupported protocol version {found} (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },

    #[error("Envelope encoding failed: {0}")]
    Encode(String),

    #[error("Envelope decoding failed: {0}")]
    Decode(String),
}

/// Message stream errors.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Peer {0} is unreachable")]
    TransportUnreachable(PeerId),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Delivery of envelope {envelope_id} failed after {attempts} attempts")]
    DeliveryFailed {
        envelope_id: EnvelopeId,
        attempts: u32,
    },

    #[error("Envelope claims sender {claimed} but arrived from {peer}")]
    SenderMismatch { peer: PeerId, claimed: PeerId },

    #[error("Reliable envelope {0} has no sequence number")]
    Malformed(EnvelopeId),

    #[error("Payload kind {0:?} cannot be sent reliably")]
    NotReliable(PayloadKind),

    #[error("Unknown envelope: {0}")]
    UnknownEnvelope(EnvelopeId),

    /// The payload builder refused to produce a payload.
    #[error("Payload rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    BlockModel(#[from] BlockModelError),
}

impl From<TransportError> for StreamError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unreachable(peer) => StreamError::TransportUnreachable(peer),
            TransportError::Io(reason) => StreamError::Transport(reason),
        }
    }
}
