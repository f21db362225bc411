//! Wire-level units managed by the message stream.

use pbm_01_block_model::{WidgetResponse, WireBlock, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use shared_types::{BlockId, EnvelopeId, LogicalTimestamp, PeerId};

/// Sequence number carried by unsequenced envelopes (typing, ack).
pub const UNSEQUENCED: u64 = 0;

/// Payload discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadKind {
    Block,
    Typing,
    Ack,
    WidgetResponse,
}

impl PayloadKind {
    /// Reliable kinds are sequenced, acknowledged and retransmitted.
    pub fn is_reliable(&self) -> bool {
        matches!(self, PayloadKind::Block | PayloadKind::WidgetResponse)
    }
}

/// Envelope payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    Block(WireBlock),
    Typing {
        active: bool,
    },
    Ack {
        envelope_id: EnvelopeId,
    },
    WidgetResponse {
        block_id: BlockId,
        response: WidgetResponse,
    },
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Block(_) => PayloadKind::Block,
            Payload::Typing { .. } => PayloadKind::Typing,
            Payload::Ack { .. } => PayloadKind::Ack,
            Payload::WidgetResponse { .. } => PayloadKind::WidgetResponse,
        }
    }
}

/// Wire unit exchanged with a peer.
///
/// `sequence` is strictly increasing per sender and the only ordering key of
/// reliable envelopes. `envelope_id` is the dedup key and never changes across
/// retransmissions. `session` restarts the sequence space: a sender bumps
/// it after tearing a conversation down and numbers from 1 again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub envelope_id: EnvelopeId,
    pub session: u32,
    pub sequence: u64,
    pub sender_id: PeerId,
    /// Schema version of the payload.
    pub payload_version: u32,
    /// Sender's logical clock at send time.
    pub sent_at: LogicalTimestamp,
    pub payload: Payload,
}

impl Envelope {
    pub fn new(
        sequence: u64,
        sender_id: PeerId,
        sent_at: LogicalTimestamp,
        payload: Payload,
    ) -> Self {
        Self {
            envelope_id: EnvelopeId::new(),
            session: 0,
            sequence,
            sender_id,
            payload_version: SCHEMA_VERSION,
            sent_at,
            payload,
        }
    }

    #[must_use]
    pub fn with_session(mut self, session: u32) -> Self {
        self.session = session;
        self
    }

    /// Typing or ack envelope.
    pub fn unsequenced(sender_id: PeerId, sent_at: LogicalTimestamp, payload: Payload) -> Self {
        Self::new(UNSEQUENCED, sender_id, sent_at, payload)
    }

    pub fn kind(&self) -> PayloadKind {
        self.payload.kind()
    }

    pub fn is_reliable(&self) -> bool {
        self.kind().is_reliable()
    }

    pub fn display_key(&self) -> DisplayKey {
        DisplayKey {
            sent_at: self.sent_at,
            sender_id: self.sender_id,
            sequence: self.sequence,
        }
    }
}

/// Cross-sender display order.
///
/// Compares the logical send time first, then the sender id as a total-order
/// tiebreak. Arrival order never participates. Field order is the sort order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayKey {
    pub sent_at: LogicalTimestamp,
    pub sender_id: PeerId,
    pub sequence: u64,
}

/// Something the stream hands to the upper layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Reliable envelope, released in per-sender sequence order.
    Envelope(Envelope),
    /// Typing indicator, released immediately.
    Typing { sender_id: PeerId, active: bool },
}
