//! # UI Events
//!
//! Everything the engine tells the UI travels as an [`EngineEvent`] on the
//! shared bus.

use pbm_01_block_model::{TransferStatus, WidgetResponse};
use pbm_02_block_registry::ResolvedBlock;
use pbm_03_message_stream::DeliveryFailure;
use pbm_04_widget_interaction::RecordOutcome;
use shared_bus::BusEvent;
use shared_types::{BlockId, PeerId};

/// Event categories for subscription filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineTopic {
    Blocks,
    Typing,
    Widgets,
    Transfers,
    Delivery,
    Connectivity,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// A peer's block was released in order and resolved.
    BlockDelivered { peer: PeerId, block: ResolvedBlock },

    TypingChanged { peer: PeerId, active: bool },

    /// A response (local or remote) was accepted by a widget.
    WidgetResponseRecorded {
        peer: PeerId,
        block_id: BlockId,
        response: WidgetResponse,
        outcome: RecordOutcome,
    },

    /// Status or progress of a transfer moved.
    TransferProgress {
        peer: PeerId,
        block_id: BlockId,
        status: TransferStatus,
        progress: u8,
    },

    TransferFailed {
        peer: PeerId,
        block_id: BlockId,
        reason: String,
    },

    /// An envelope ran out of retries. Recoverable via `retry_delivery`.
    DeliveryFailed {
        peer: PeerId,
        failure: DeliveryFailure,
    },

    ConnectivityChanged { peer: PeerId, online: bool },
}

impl EngineEvent {
    pub fn peer(&self) -> PeerId {
        match self {
            EngineEvent::BlockDelivered { peer, .. }
            | EngineEvent::TypingChanged { peer, .. }
            | EngineEvent::WidgetResponseRecorded { peer, .. }
            | EngineEvent::TransferProgress { peer, .. }
            | EngineEvent::TransferFailed { peer, .. }
            | EngineEvent::DeliveryFailed { peer, .. }
            | EngineEvent::ConnectivityChanged { peer, .. } => *peer,
        }
    }
}

impl BusEvent for EngineEvent {
    type Topic = EngineTopic;

    fn topic(&self) -> EngineTopic {
        match self {
            EngineEvent::BlockDelivered { .. } => EngineTopic::Blocks,
            EngineEvent::TypingChanged { .. } => EngineTopic::Typing,
            EngineEvent::WidgetResponseRecorded { .. } => EngineTopic::Widgets,
            EngineEvent::TransferProgress { .. } | EngineEvent::TransferFailed { .. } => {
                EngineTopic::Transfers
            }
            EngineEvent::DeliveryFailed { .. } => EngineTopic::Delivery,
            EngineEvent::ConnectivityChanged { .. } => EngineTopic::Connectivity,
        }
    }
}
