//! Per-conversation engine state and the pieces shared with the observer.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

use pbm_01_block_model::{Block, BlockContent};
use pbm_02_block_registry::ResolvedBlock;
use pbm_04_widget_interaction::WidgetTracker;
use pbm_05_file_transfer::{FileTransferTracker, TransferConfig};
use pbm_telemetry::CONVERSATIONS_OPEN;
use shared_bus::InMemoryEventBus;
use shared_types::PeerId;
use tracing::debug;

use crate::conversation_log::ConversationLog;
use crate::events::{EngineEvent, EngineTopic};

/// Everything the engine knows about one conversation above the stream.
#[derive(Debug)]
pub(crate) struct ConversationState {
    pub log: ConversationLog,
    pub widgets: WidgetTracker,
    pub transfers: FileTransferTracker,
}

impl ConversationState {
    fn new(transfer: TransferConfig) -> Self {
        Self {
            log: ConversationLog::new(),
            widgets: WidgetTracker::new(),
            transfers: FileTransferTracker::new(transfer),
        }
    }

    /// Starts tracking derived state for widget and file blocks.
    pub fn track(&mut self, block: &Block) {
        match &block.content {
            BlockContent::File(file) => {
                self.transfers.track(block.id(), file);
            }
            BlockContent::Widget(widget) => {
                self.widgets.track(block.id(), widget.clone());
            }
            BlockContent::Text(_) | BlockContent::Code(_) | BlockContent::System(_) => {}
        }
    }

    /// The log with tracker state merged into copies of the blocks.
    pub fn snapshot(&self) -> Vec<ResolvedBlock> {
        self.log
            .iter()
            .map(|resolved| {
                let mut resolved = resolved.clone();
                if let Some(block) = resolved.as_block_mut() {
                    let id = block.id();
                    match &mut block.content {
                        BlockContent::File(file) => {
                            self.transfers.apply_to(&id, file);
                        }
                        BlockContent::Widget(widget) => {
                            if let Some(tracked) = self.widgets.widget(&id) {
                                *widget = tracked.clone();
                            }
                        }
                        BlockContent::Text(_) | BlockContent::Code(_) | BlockContent::System(_) => {}
                    }
                }
                resolved
            })
            .collect()
    }
}

pub(crate) type Listener = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// State shared between the engine and its stream observer.
pub(crate) struct EngineShared {
    pub local_id: PeerId,
    transfer: TransferConfig,
    conversations: RwLock<HashMap<PeerId, Arc<Mutex<ConversationState>>>>,
    pub bus: InMemoryEventBus<EngineEvent>,
    listeners: RwLock<Vec<(EngineTopic, Listener)>>,
}

impl EngineShared {
    pub fn new(local_id: PeerId, transfer: TransferConfig, event_capacity: usize) -> Self {
        Self {
            local_id,
            transfer,
            conversations: RwLock::new(HashMap::new()),
            bus: InMemoryEventBus::with_capacity(event_capacity),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn state(&self, peer: PeerId) -> Arc<Mutex<ConversationState>> {
        if let Some(existing) = self.conversations.read().get(&peer) {
            return existing.clone();
        }

        self.conversations
            .write()
            .entry(peer)
            .or_insert_with(|| {
                CONVERSATIONS_OPEN.inc();
                Arc::new(Mutex::new(ConversationState::new(self.transfer.clone())))
            })
            .clone()
    }

    pub fn existing(&self, peer: &PeerId) -> Option<Arc<Mutex<ConversationState>>> {
        self.conversations.read().get(peer).cloned()
    }

    pub fn remove(&self, peer: &PeerId) -> bool {
        let removed = self.conversations.write().remove(peer).is_some();
        if removed {
            CONVERSATIONS_OPEN.dec();
        }
        removed
    }

    pub fn listen(&self, topic: EngineTopic, listener: Listener) {
        self.listeners.write().push((topic, listener));
    }

    /// Runs matching callbacks, then publishes on the bus.
    ///
    /// Never call with a conversation lock held: callbacks may re-enter.
    pub fn emit(&self, event: EngineEvent) {
        let topic = shared_bus::BusEvent::topic(&event);
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .filter(|(wanted, _)| *wanted == topic)
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(&event);
        }

        let receivers = self.bus.emit(event);
        debug!(?topic, receivers, "Engine event emitted");
    }
}
