//! Two engines joined by an in-memory link that can misbehave on purpose.

use std::sync::Arc;
use std::time::Duration;

use engine_runtime::{EngineConfig, InMemoryTransport, MessagingEngine};
use pbm_01_block_model::{BlockContent, TextBlock};
use pbm_02_block_registry::ResolvedBlock;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use shared_types::{BlockId, PeerId};

pub const ALICE: PeerId = PeerId([0xA1; 32]);
pub const BOB: PeerId = PeerId([0xB0; 32]);

/// Upper bound on link rounds before a run is declared stuck.
const MAX_ROUNDS: usize = 500;

pub struct Node {
    pub engine: MessagingEngine<InMemoryTransport>,
    pub transport: Arc<InMemoryTransport>,
}

impl Node {
    pub fn new(id: PeerId, config: EngineConfig) -> Self {
        let transport = Arc::new(InMemoryTransport::new(id));
        let engine = MessagingEngine::new(id, config, transport.clone()).unwrap();
        Self { engine, transport }
    }

    pub fn id(&self) -> PeerId {
        self.engine.local_id()
    }

    /// Ids of the conversation with `peer`, in display order.
    pub fn view(&self, peer: PeerId) -> Vec<BlockId> {
        self.engine
            .conversation_snapshot(peer)
            .iter()
            .map(ResolvedBlock::id)
            .collect()
    }

    pub async fn say(&self, peer: PeerId, body: &str) -> BlockId {
        self.engine
            .submit_block(peer, BlockContent::Text(TextBlock::plain(body)))
            .await
            .unwrap()
            .block_id
    }
}

/// Timer-free engine config: retransmission is driven by the test.
pub fn manual_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.auto_retransmit = false;
    config.stream.retry_timeout = Duration::from_millis(100);
    config.stream.max_retries = 64;
    config.teardown_grace = Duration::from_millis(50);
    config
}

pub fn pair() -> (Node, Node) {
    (Node::new(ALICE, manual_config()), Node::new(BOB, manual_config()))
}

/// How the link mangles each batch of frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct Faults {
    pub shuffle: bool,
    pub duplicate_rate: f64,
    pub drop_rate: f64,
}

impl Faults {
    pub fn reorder_and_duplicate() -> Self {
        Self {
            shuffle: true,
            duplicate_rate: 0.4,
            drop_rate: 0.0,
        }
    }

    pub fn lossy() -> Self {
        Self {
            shuffle: true,
            duplicate_rate: 0.2,
            drop_rate: 0.25,
        }
    }
}

/// A seeded link between two nodes.
pub struct Link {
    rng: StdRng,
    faults: Faults,
}

impl Link {
    pub fn new(rng: StdRng, faults: Faults) -> Self {
        Self { rng, faults }
    }

    /// Delivers one batch from `from` to `to`. Returns how many frames left `from`.
    pub async fn deliver(&mut self, from: &Node, to: &Node) -> usize {
        let sent = from.transport.drain_to(to.id());
        let count = sent.len();

        let mut frames = Vec::with_capacity(count);
        for frame in sent {
            if self.rng.gen_bool(self.faults.drop_rate) {
                continue;
            }
            if self.rng.gen_bool(self.faults.duplicate_rate) {
                frames.push(frame.clone());
            }
            frames.push(frame);
        }
        if self.faults.shuffle {
            frames.shuffle(&mut self.rng);
        }

        for frame in frames {
            to.engine.handle_incoming(from.id(), &frame).await.unwrap();
        }
        count
    }

    /// Runs the link until both outboxes are empty.
    ///
    /// Needs paused tokio time when the link drops frames: each quiet round
    /// advances past the retry timeout and retransmits.
    pub async fn settle(&mut self, a: &Node, b: &Node) {
        for _ in 0..MAX_ROUNDS {
            let moved = self.deliver(a, b).await + self.deliver(b, a).await;
            if moved > 0 {
                continue;
            }
            if a.engine.outbox_len(b.id()) == 0 && b.engine.outbox_len(a.id()) == 0 {
                return;
            }

            let timeout = a.engine.config().stream.retry_timeout;
            tokio::time::advance(timeout + Duration::from_millis(1)).await;
            a.engine.retransmit_due(b.id()).await;
            b.engine.retransmit_due(a.id()).await;
        }
        panic!("link did not settle within {MAX_ROUNDS} rounds");
    }
}

/// Frames `from` has queued for `to`, without delivering them.
pub fn take_frames(from: &Node, to: &Node) -> Vec<Vec<u8>> {
    from.transport.drain_to(to.id())
}
