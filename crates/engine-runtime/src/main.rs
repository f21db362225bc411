//! # P2P Block Messaging Demo
//!
//! Two engines exchanging blocks over a lossy in-memory link.
//!
//! ## Flow
//!
//! ```text
//!   alice ──submit──→ InMemoryTransport ──shuffle + duplicate──→ bob
//!     ↑                                                           │
//!     └──────────────────────── acks, responses ──────────────────┘
//! ```
//!
//! 1. Initialize telemetry (logging + metrics)
//! 2. Alice sends text, a poll and a file; Bob votes and replies
//! 3. Every hop reorders and duplicates frames with a seeded RNG
//! 4. Print both conversation views and the metrics dump

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use engine_runtime::{EngineConfig, InMemoryTransport, MessagingEngine};
use pbm_01_block_model::{
    BlockContent, CodeBlock, FileBlock, ResponseValue, TextBlock, WidgetBlock, WidgetConfig,
};
use pbm_02_block_registry::ResolvedBlock;
use pbm_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared_types::PeerId;
use tracing::info;

const DEMO_SEED: u64 = 0x5EED;
const DUPLICATE_RATE: f64 = 0.3;

/// One side of the demo link.
struct DemoNode {
    name: &'static str,
    engine: MessagingEngine<InMemoryTransport>,
    transport: Arc<InMemoryTransport>,
}

impl DemoNode {
    fn new(name: &'static str, id: PeerId) -> Result<Self> {
        let transport = Arc::new(InMemoryTransport::new(id));
        let config = EngineConfig::from_env().context("Invalid engine configuration")?;
        let engine = MessagingEngine::new(id, config, transport.clone())
            .context("Failed to create messaging engine")?;
        Ok(Self {
            name,
            engine,
            transport,
        })
    }

    fn id(&self) -> PeerId {
        self.engine.local_id()
    }
}

/// Moves frames from `from` to `to`, shuffled and partly duplicated.
async fn deliver(from: &DemoNode, to: &DemoNode, rng: &mut StdRng) -> Result<usize> {
    let mut frames = from.transport.drain_to(to.id());
    let duplicates: Vec<Vec<u8>> = frames
        .iter()
        .filter(|_| rng.gen_bool(DUPLICATE_RATE))
        .cloned()
        .collect();
    frames.extend(duplicates);
    frames.shuffle(rng);

    let count = frames.len();
    for frame in frames {
        to.engine
            .handle_incoming(from.id(), &frame)
            .await
            .with_context(|| format!("{} rejected a frame from {}", to.name, from.name))?;
    }
    Ok(count)
}

/// Keeps the link busy until neither side has anything left to send.
async fn settle(a: &DemoNode, b: &DemoNode, rng: &mut StdRng) -> Result<()> {
    loop {
        let moved = deliver(a, b, rng).await? + deliver(b, a, rng).await?;
        if moved == 0 {
            return Ok(());
        }
    }
}

fn describe(block: &ResolvedBlock) -> String {
    let Some(block) = block.as_block() else {
        return format!("[unsupported {}]", block.header().id);
    };
    match &block.content {
        BlockContent::Text(text) => format!("text: {}", text.content),
        BlockContent::Code(code) => format!("code ({}): {} bytes", code.language, code.content.len()),
        BlockContent::File(file) => format!(
            "file: {} {:?} {}%",
            file.filename, file.transfer_status, file.transfer_progress
        ),
        BlockContent::Widget(widget) => format!(
            "widget {:?}: {} response(s)",
            widget.variant(),
            widget.responses.len()
        ),
        BlockContent::System(line) => format!("system {:?}: {}", line.severity, line.message),
    }
}

fn print_conversation(node: &DemoNode, peer: PeerId) {
    println!("--- {} sees ---", node.name);
    for block in node.engine.conversation_snapshot(peer) {
        println!("  {}", describe(&block));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env()).context("Telemetry init failed")?;
    let mut rng = StdRng::seed_from_u64(DEMO_SEED);

    let alice = DemoNode::new("alice", PeerId::new([0xA1; 32]))?;
    let bob = DemoNode::new("bob", PeerId::new([0xB0; 32]))?;
    info!(alice = %alice.id(), bob = %bob.id(), seed = DEMO_SEED, "Demo link up");

    for line in ["hi bob", "shipping the release today", "one more thing"] {
        alice
            .engine
            .submit_block(bob.id(), BlockContent::Text(TextBlock::plain(line)))
            .await?;
    }
    alice
        .engine
        .submit_block(
            bob.id(),
            BlockContent::Code(CodeBlock::new("cargo publish", "sh").with_filename("release.sh")),
        )
        .await?;
    let poll = alice
        .engine
        .submit_block(
            bob.id(),
            BlockContent::Widget(WidgetBlock::new(WidgetConfig::poll(
                "Ship it?",
                vec!["yes", "no", "later"],
            ))),
        )
        .await?;
    let file = alice
        .engine
        .submit_block(
            bob.id(),
            BlockContent::File(FileBlock::new("notes.md", 2048, "text/markdown")),
        )
        .await?;

    alice.engine.send_typing(bob.id(), true).await?;
    settle(&alice, &bob, &mut rng).await?;

    bob.engine
        .respond_to_widget(alice.id(), poll.block_id, ResponseValue::Choices(vec![0]))
        .await?;
    alice
        .engine
        .respond_to_widget(bob.id(), poll.block_id, ResponseValue::Choices(vec![2]))
        .await?;
    bob.engine
        .submit_block(alice.id(), BlockContent::Text(TextBlock::markdown("**yes**")))
        .await?;
    settle(&alice, &bob, &mut rng).await?;

    let attempt = alice.engine.start_transfer(bob.id(), file.block_id)?;
    for percent in [10, 40, 25, 60, 100] {
        alice
            .engine
            .report_transfer_progress(bob.id(), file.block_id, attempt, percent, 2048)?;
    }

    let alice_view: Vec<_> = alice
        .engine
        .conversation_snapshot(bob.id())
        .iter()
        .map(ResolvedBlock::id)
        .collect();
    let bob_view: Vec<_> = bob
        .engine
        .conversation_snapshot(alice.id())
        .iter()
        .map(ResolvedBlock::id)
        .collect();
    if alice_view != bob_view {
        bail!("conversation views diverged");
    }

    print_conversation(&alice, bob.id());
    print_conversation(&bob, alice.id());

    println!("--- poll results ---");
    for tally in alice.engine.poll_results(bob.id(), poll.block_id)? {
        println!(
            "  {}: {} vote(s), {:.1}%",
            tally.label,
            tally.count,
            tally.rounded_percentage()
        );
    }

    println!("--- metrics ---");
    println!("{}", encode_metrics()?);

    alice.engine.teardown(bob.id()).await;
    bob.engine.teardown(alice.id()).await;
    info!("Demo finished");
    Ok(())
}
