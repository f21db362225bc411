//! # Messaging Engine
//!
//! Facade over the message stream, the block registry and the two trackers.
//!
//! ## Locking
//!
//! Each conversation has two locks: the stream's `Conversation` and the
//! engine's `ConversationState`. The engine state lock may be taken while the
//! stream lock is held (payload builders do this), never the other way round.
//! Events are emitted with no lock held.

use std::sync::Arc;

use parking_lot::Mutex;
use pbm_01_block_model::{
    Block, BlockContent, ResponseValue, TransferStatus, WidgetResponse,
};
use pbm_02_block_registry::{BlockRegistry, ResolvedBlock};
use pbm_03_message_stream::{
    Delivery, DeliveryFailure, Disposition, DisplayKey, Envelope, MessageStreamService, Payload,
    PeerTransport, RetransmitReport, StreamError, TeardownReport,
};
use pbm_04_widget_interaction::PollTally;
use pbm_05_file_transfer::{ProgressOutcome, TransferError};
use pbm_telemetry::{
    log_event, BLOCKS_DELIVERED, DUPLICATES_DROPPED, ENVELOPES_SENT, TRANSFERS_FAILED,
};
use shared_bus::{EventFilter, EventStream, Subscription};
use shared_types::{AttemptId, BlockId, EnvelopeId, PeerId};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::events::{EngineEvent, EngineTopic};
use crate::observer::EngineObserver;
use crate::state::{ConversationState, EngineShared};

/// Result of submitting a block or a widget response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submitted {
    pub envelope_id: EnvelopeId,
    /// The new block, or the widget answered.
    pub block_id: BlockId,
    pub sequence: u64,
    /// Peer unreachable; the envelope waits in the outbox.
    pub queued: bool,
}

/// The engine of one local node.
pub struct MessagingEngine<T>
where
    T: PeerTransport + 'static,
{
    config: EngineConfig,
    registry: Arc<BlockRegistry>,
    stream: Arc<MessageStreamService<T, EngineObserver>>,
    shared: Arc<EngineShared>,
}

impl<T> MessagingEngine<T>
where
    T: PeerTransport + 'static,
{
    /// Engine with the built-in block types registered.
    pub fn new(local_id: PeerId, config: EngineConfig, transport: Arc<T>) -> Result<Self, EngineError> {
        Self::with_registry(
            local_id,
            config,
            transport,
            Arc::new(BlockRegistry::with_builtin_types()),
        )
    }

    /// Engine sharing an existing registry.
    pub fn with_registry(
        local_id: PeerId,
        config: EngineConfig,
        transport: Arc<T>,
        registry: Arc<BlockRegistry>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let shared = Arc::new(EngineShared::new(
            local_id,
            config.transfer.clone(),
            config.event_capacity,
        ));
        let observer = Arc::new(EngineObserver::new(shared.clone()));
        let stream = Arc::new(MessageStreamService::new(
            local_id,
            config.stream.clone(),
            transport,
            observer,
        ));

        info!(local = %local_id, "Messaging engine created");
        Ok(Self {
            config,
            registry,
            stream,
            shared,
        })
    }

    pub fn local_id(&self) -> PeerId {
        self.shared.local_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    fn open(&self, peer: PeerId) -> Arc<Mutex<ConversationState>> {
        if self.config.auto_retransmit {
            self.stream.spawn_retransmitter(peer);
        }
        self.shared.state(peer)
    }

    fn existing(&self, peer: PeerId) -> Result<Arc<Mutex<ConversationState>>, EngineError> {
        self.shared
            .existing(&peer)
            .ok_or(EngineError::UnknownConversation(peer))
    }

    fn emit_all(&self, events: Vec<EngineEvent>) {
        for event in events {
            self.shared.emit(event);
        }
    }

    // =========================================================================
    // OUTGOING
    // =========================================================================

    /// Creates a block from `content` and sends it to `peer`.
    ///
    /// An unreachable peer does not fail the call; the block is logged and
    /// its envelope waits in the outbox.
    pub async fn submit_block(
        &self,
        peer: PeerId,
        content: BlockContent,
    ) -> Result<Submitted, EngineError> {
        let kind = content.kind();
        if kind.is_local_only() {
            return Err(EngineError::LocalOnlyContent(kind));
        }

        let state = self.open(peer);
        let local_id = self.local_id();
        let mut built = None;

        let receipt = self
            .stream
            .send_reliable(peer, |timestamp| {
                let block = Block::new(local_id, timestamp, content);
                let wire = block.to_wire()?;
                built = Some(block);
                Ok(Payload::Block(wire))
            })
            .await?;

        let Some(block) = built else {
            return Err(StreamError::Rejected("block was not built".to_string()).into());
        };
        let block_id = block.id();
        let key = DisplayKey {
            sent_at: receipt.sent_at,
            sender_id: local_id,
            sequence: receipt.sequence,
        };

        {
            let mut state = state.lock();
            state.track(&block);
            state.log.insert(key, ResolvedBlock::Typed(block));
        }

        ENVELOPES_SENT.with_label_values(&["block"]).inc();
        debug!(
            %peer,
            %block_id,
            kind = kind.tag(),
            sequence = receipt.sequence,
            queued = receipt.queued,
            "Block submitted"
        );

        Ok(Submitted {
            envelope_id: receipt.envelope_id,
            block_id,
            sequence: receipt.sequence,
            queued: receipt.queued,
        })
    }

    pub async fn send_typing(&self, peer: PeerId, active: bool) -> Result<(), EngineError> {
        self.stream.send_typing(peer, active).await?;
        Ok(())
    }

    /// Records the local user's answer to a widget and sends it to `peer`.
    ///
    /// The response is validated before anything is sent; a rejected answer
    /// never reaches the wire.
    pub async fn respond_to_widget(
        &self,
        peer: PeerId,
        block_id: BlockId,
        value: ResponseValue,
    ) -> Result<Submitted, EngineError> {
        let state = self.existing(peer)?;
        let local_id = self.local_id();
        let mut recorded = None;
        let mut rejected = None;

        let result = self
            .stream
            .send_reliable(peer, |timestamp| {
                let response = WidgetResponse::new(local_id, timestamp, value);
                match state.lock().widgets.record(block_id, response.clone()) {
                    Ok(outcome) => {
                        recorded = Some((response.clone(), outcome));
                        Ok(Payload::WidgetResponse { block_id, response })
                    }
                    Err(err) => {
                        let reason = err.to_string();
                        rejected = Some(err);
                        Err(StreamError::Rejected(reason))
                    }
                }
            })
            .await;

        let receipt = match (result, rejected) {
            (Err(_), Some(err)) => return Err(err.into()),
            (result, _) => result?,
        };

        if let Some((response, outcome)) = recorded {
            self.shared.emit(EngineEvent::WidgetResponseRecorded {
                peer,
                block_id,
                response,
                outcome,
            });
        }

        ENVELOPES_SENT.with_label_values(&["widget_response"]).inc();
        Ok(Submitted {
            envelope_id: receipt.envelope_id,
            block_id,
            sequence: receipt.sequence,
            queued: receipt.queued,
        })
    }

    /// Moves a progress widget. Progress is local state and is not sent.
    pub fn update_progress_widget(
        &self,
        peer: PeerId,
        block_id: BlockId,
        value: u32,
        reset: bool,
    ) -> Result<u32, EngineError> {
        let state = self.existing(peer)?;
        let value = state.lock().widgets.update_progress(block_id, value, reset)?;
        Ok(value)
    }

    // =========================================================================
    // INCOMING
    // =========================================================================

    /// Feeds a frame received from `peer` through the stream and applies
    /// whatever it releases.
    pub async fn handle_incoming(&self, peer: PeerId, frame: &[u8]) -> Result<Disposition, EngineError> {
        let state = self.open(peer);
        let outcome = self.stream.handle_frame(peer, frame).await?;

        match outcome.disposition {
            Disposition::Duplicate => DUPLICATES_DROPPED.with_label_values(&["duplicate"]).inc(),
            Disposition::Late => DUPLICATES_DROPPED.with_label_values(&["late"]).inc(),
            _ => {}
        }

        let mut events = Vec::new();
        {
            let mut state = state.lock();
            for delivery in outcome.deliveries {
                match delivery {
                    Delivery::Typing { active, .. } => {
                        events.push(EngineEvent::TypingChanged { peer, active });
                    }
                    Delivery::Envelope(envelope) => {
                        self.apply_envelope(peer, &mut state, envelope, &mut events);
                    }
                }
            }
        }
        self.emit_all(events);

        Ok(outcome.disposition)
    }

    fn apply_envelope(
        &self,
        peer: PeerId,
        state: &mut ConversationState,
        envelope: Envelope,
        events: &mut Vec<EngineEvent>,
    ) {
        let key = envelope.display_key();
        match envelope.payload {
            Payload::Block(wire) => {
                let resolved = self.registry.accept_from(&wire, peer, envelope.sent_at);
                let label = match &resolved {
                    ResolvedBlock::Typed(block) => {
                        state.track(block);
                        block.kind().tag()
                    }
                    ResolvedBlock::Placeholder(_) => "placeholder",
                };

                if state.log.insert(key, resolved.clone()) {
                    BLOCKS_DELIVERED.with_label_values(&[label]).inc();
                    events.push(EngineEvent::BlockDelivered {
                        peer,
                        block: resolved,
                    });
                }
            }
            Payload::WidgetResponse { block_id, response } => {
                // A peer only ever answers for itself.
                if response.responder_id != peer {
                    warn!(
                        %peer,
                        %block_id,
                        claimed = %response.responder_id,
                        "Widget response for another responder dropped"
                    );
                    return;
                }
                match state.widgets.record(block_id, response.clone()) {
                    Ok(outcome) => events.push(EngineEvent::WidgetResponseRecorded {
                        peer,
                        block_id,
                        response,
                        outcome,
                    }),
                    Err(err) => {
                        warn!(%peer, %block_id, error = %err, "Peer widget response dropped")
                    }
                }
            }
            // Unsequenced kinds are never released as envelopes.
            Payload::Typing { .. } | Payload::Ack { .. } => {}
        }
    }

    // =========================================================================
    // FILE TRANSFERS
    // =========================================================================

    pub fn start_transfer(&self, peer: PeerId, block_id: BlockId) -> Result<AttemptId, EngineError> {
        let state = self.existing(peer)?;
        let attempt = state.lock().transfers.start(block_id)?;
        self.shared.emit(EngineEvent::TransferProgress {
            peer,
            block_id,
            status: TransferStatus::Transferring,
            progress: 0,
        });
        Ok(attempt)
    }

    pub fn report_transfer_progress(
        &self,
        peer: PeerId,
        block_id: BlockId,
        attempt: AttemptId,
        percent: u8,
        received_bytes: u64,
    ) -> Result<ProgressOutcome, EngineError> {
        let state = self.existing(peer)?;
        let outcome = state
            .lock()
            .transfers
            .report_progress(block_id, attempt, percent, received_bytes)?;

        match &outcome {
            ProgressOutcome::Applied(progress) => self.shared.emit(EngineEvent::TransferProgress {
                peer,
                block_id,
                status: TransferStatus::Transferring,
                progress: *progress,
            }),
            ProgressOutcome::Completed => self.shared.emit(EngineEvent::TransferProgress {
                peer,
                block_id,
                status: TransferStatus::Completed,
                progress: 100,
            }),
            ProgressOutcome::Failed { reason } => {
                self.transfer_failed(peer, block_id, reason.clone(), "size_mismatch")
            }
            ProgressOutcome::Unchanged | ProgressOutcome::Ignored { .. } => {}
        }
        Ok(outcome)
    }

    /// Completes a transfer after checking the received byte count.
    pub fn complete_transfer(
        &self,
        peer: PeerId,
        block_id: BlockId,
        attempt: AttemptId,
        received_bytes: u64,
    ) -> Result<(), EngineError> {
        let state = self.existing(peer)?;
        let result = state
            .lock()
            .transfers
            .complete(block_id, attempt, received_bytes);

        match result {
            Ok(()) => {
                self.shared.emit(EngineEvent::TransferProgress {
                    peer,
                    block_id,
                    status: TransferStatus::Completed,
                    progress: 100,
                });
                Ok(())
            }
            Err(TransferError::TransferFailed { reason }) => {
                self.transfer_failed(peer, block_id, reason.clone(), "size_mismatch");
                Err(TransferError::TransferFailed { reason }.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn fail_transfer(
        &self,
        peer: PeerId,
        block_id: BlockId,
        attempt: AttemptId,
        reason: impl Into<String>,
    ) -> Result<(), EngineError> {
        let state = self.existing(peer)?;
        let reason = reason.into();
        state.lock().transfers.fail(block_id, attempt, reason.clone())?;
        self.transfer_failed(peer, block_id, reason, "reported");
        Ok(())
    }

    /// New attempt for a failed transfer, progress back at 0.
    pub fn retry_transfer(&self, peer: PeerId, block_id: BlockId) -> Result<AttemptId, EngineError> {
        let state = self.existing(peer)?;
        let attempt = state.lock().transfers.retry(block_id)?;
        self.shared.emit(EngineEvent::TransferProgress {
            peer,
            block_id,
            status: TransferStatus::Transferring,
            progress: 0,
        });
        Ok(attempt)
    }

    fn transfer_failed(&self, peer: PeerId, block_id: BlockId, reason: String, cause: &str) {
        TRANSFERS_FAILED.with_label_values(&[cause]).inc();
        log_event!(warn, "engine", "File transfer failed", %peer, %block_id, cause, %reason);
        self.shared.emit(EngineEvent::TransferFailed {
            peer,
            block_id,
            reason,
        });
    }

    // =========================================================================
    // DELIVERY AND LIFECYCLE
    // =========================================================================

    /// Resends envelopes whose retry timeout elapsed. The background timer
    /// calls this when `auto_retransmit` is on.
    pub async fn retransmit_due(&self, peer: PeerId) -> RetransmitReport {
        self.stream.retransmit_due(peer).await
    }

    /// The transport saw `peer` come back: replay the whole outbox.
    pub async fn peer_reconnected(&self, peer: PeerId) -> RetransmitReport {
        info!(%peer, "Peer reconnected, replaying outbox");
        self.stream.flush_outbox(peer).await
    }

    /// Fresh retry budget for an envelope that failed delivery.
    pub async fn retry_delivery(
        &self,
        peer: PeerId,
        envelope_id: EnvelopeId,
    ) -> Result<RetransmitReport, EngineError> {
        Ok(self.stream.retry_delivery(peer, envelope_id).await?)
    }

    /// Flushes within the configured grace period, then drops all state for `peer`.
    pub async fn teardown(&self, peer: PeerId) -> TeardownReport {
        let report = self.stream.teardown(peer, self.config.teardown_grace).await;
        self.shared.remove(&peer);
        report
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Blocks in display order with current transfer and widget state merged in.
    pub fn conversation_snapshot(&self, peer: PeerId) -> Vec<ResolvedBlock> {
        self.shared
            .existing(&peer)
            .map(|state| state.lock().snapshot())
            .unwrap_or_default()
    }

    pub fn poll_results(&self, peer: PeerId, block_id: BlockId) -> Result<Vec<PollTally>, EngineError> {
        let state = self.existing(peer)?;
        let tallies = state.lock().widgets.results(block_id)?;
        Ok(tallies)
    }

    pub fn is_online(&self, peer: PeerId) -> bool {
        self.stream.is_online(peer)
    }

    pub fn outbox_len(&self, peer: PeerId) -> usize {
        self.stream.outbox_len(peer)
    }

    /// Envelopes that exhausted their retry budget and wait for a retry.
    pub fn parked(&self, peer: PeerId) -> Vec<EnvelopeId> {
        self.stream.parked(peer)
    }

    pub fn has_conversation(&self, peer: PeerId) -> bool {
        self.shared.existing(&peer).is_some()
    }

    // =========================================================================
    // NOTIFICATIONS
    // =========================================================================

    pub fn subscribe(&self, filter: EventFilter<EngineTopic>) -> Subscription<EngineEvent> {
        self.shared.bus.subscribe(filter)
    }

    pub fn event_stream(&self, filter: EventFilter<EngineTopic>) -> EventStream<EngineEvent> {
        self.shared.bus.event_stream(filter)
    }

    /// Callbacks run synchronously on the task that produced the event.
    pub fn on_block_delivered<F>(&self, callback: F)
    where
        F: Fn(PeerId, &ResolvedBlock) + Send + Sync + 'static,
    {
        self.shared.listen(
            EngineTopic::Blocks,
            Arc::new(move |event: &EngineEvent| {
                if let EngineEvent::BlockDelivered { peer, block } = event {
                    callback(*peer, block);
                }
            }),
        );
    }

    pub fn on_widget_response_recorded<F>(&self, callback: F)
    where
        F: Fn(PeerId, BlockId, &WidgetResponse) + Send + Sync + 'static,
    {
        self.shared.listen(
            EngineTopic::Widgets,
            Arc::new(move |event: &EngineEvent| {
                if let EngineEvent::WidgetResponseRecorded {
                    peer,
                    block_id,
                    response,
                    ..
                } = event
                {
                    callback(*peer, *block_id, response);
                }
            }),
        );
    }

    pub fn on_transfer_progress<F>(&self, callback: F)
    where
        F: Fn(PeerId, BlockId, TransferStatus, u8) + Send + Sync + 'static,
    {
        self.shared.listen(
            EngineTopic::Transfers,
            Arc::new(move |event: &EngineEvent| {
                if let EngineEvent::TransferProgress {
                    peer,
                    block_id,
                    status,
                    progress,
                } = event
                {
                    callback(*peer, *block_id, *status, *progress);
                }
            }),
        );
    }

    pub fn on_delivery_failed<F>(&self, callback: F)
    where
        F: Fn(PeerId, &DeliveryFailure) + Send + Sync + 'static,
    {
        self.shared.listen(
            EngineTopic::Delivery,
            Arc::new(move |event: &EngineEvent| {
                if let EngineEvent::DeliveryFailed { peer, failure } = event {
                    callback(*peer, failure);
                }
            }),
        );
    }
}
