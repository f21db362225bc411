//! Stream notifications turned into UI events, metrics and narration.

use std::sync::Arc;

use pbm_01_block_model::{Severity, SystemBlock};
use pbm_03_message_stream::{DeliveryFailure, StreamObserver};
use pbm_telemetry::{log_peer_event, metric_inc, DELIVERY_FAILURES, ENVELOPES_RETRANSMITTED};
use shared_types::{EnvelopeId, PeerId};

use crate::events::EngineEvent;
use crate::state::EngineShared;

const OFFLINE_LINE: &str = "Peer unreachable. New messages are queued and will be sent on reconnect.";
const ONLINE_LINE: &str = "Peer reachable again. Queued messages are being delivered.";

pub struct EngineObserver {
    shared: Arc<EngineShared>,
}

impl EngineObserver {
    pub(crate) fn new(shared: Arc<EngineShared>) -> Self {
        Self { shared }
    }
}

impl StreamObserver for EngineObserver {
    fn delivery_failed(&self, peer: PeerId, failure: DeliveryFailure) {
        metric_inc!(DELIVERY_FAILURES);
        self.shared.emit(EngineEvent::DeliveryFailed { peer, failure });
    }

    fn reachability_changed(&self, peer: PeerId, online: bool) {
        let line = if online {
            SystemBlock::new(ONLINE_LINE, Severity::Success)
        } else {
            SystemBlock::new(OFFLINE_LINE, Severity::Warning)
        };

        let block_id = self
            .shared
            .state(peer)
            .lock()
            .log
            .narrate(self.shared.local_id, line);

        log_peer_event!(info, "engine", "Connectivity narrated", peer, online, %block_id);
        self.shared
            .emit(EngineEvent::ConnectivityChanged { peer, online });
    }

    fn envelope_retransmitted(&self, _peer: PeerId, _envelope_id: EnvelopeId, _attempt: u32) {
        metric_inc!(ENVELOPES_RETRANSMITTED);
    }
}
