//! # Seeded Property Runs
//!
//! Each run draws a workload and a link behaviour from a seeded `StdRng`, so
//! a failing seed reproduces exactly.

use std::collections::HashMap;

use engine_runtime::{EngineEvent, EngineTopic};
use pbm_01_block_model::{BlockContent, ResponseValue, WidgetBlock, WidgetConfig, WidgetResponse};
use pbm_04_widget_interaction::WidgetTracker;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared_bus::EventFilter;
use shared_types::{BlockId, PeerId};

use super::harness::{manual_config, pair, take_frames, Faults, Link, Node, ALICE, BOB};

const SEEDS: u64 = 24;

/// Random conversation: each step one side speaks, sometimes the link runs.
async fn random_exchange(alice: &Node, bob: &Node, rng: &mut StdRng, link: &mut Link) -> usize {
    let steps = rng.gen_range(5..25);
    for step in 0..steps {
        if rng.gen_bool(0.5) {
            alice.say(BOB, &format!("a{step}")).await;
        } else {
            bob.say(ALICE, &format!("b{step}")).await;
        }
        if rng.gen_bool(0.3) {
            link.settle(alice, bob).await;
        }
    }
    link.settle(alice, bob).await;
    steps
}

fn own_order(node: &Node, peer: PeerId, prefix: char) -> Vec<String> {
    node.engine
        .conversation_snapshot(peer)
        .iter()
        .filter_map(|block| match &block.as_block()?.content {
            BlockContent::Text(text) if text.content.starts_with(prefix) => {
                Some(text.content.clone())
            }
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_reordered_duplicated_link_converges() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut link = Link::new(StdRng::seed_from_u64(seed ^ 0xF00D), Faults::reorder_and_duplicate());
        let (alice, bob) = pair();

        let steps = random_exchange(&alice, &bob, &mut rng, &mut link).await;

        let view = alice.view(BOB);
        assert_eq!(view.len(), steps, "seed {seed}");
        assert_eq!(view, bob.view(ALICE), "seed {seed}");
        assert_eq!(
            own_order(&alice, BOB, 'a'),
            own_order(&bob, ALICE, 'a'),
            "seed {seed}"
        );
        assert_eq!(alice.engine.outbox_len(BOB), 0, "seed {seed}");
        assert_eq!(bob.engine.outbox_len(ALICE), 0, "seed {seed}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_lossy_link_delivers_each_block_exactly_once() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut link = Link::new(StdRng::seed_from_u64(seed.wrapping_mul(31)), Faults::lossy());
        let (alice, bob) = pair();
        let mut at_alice = alice.engine.subscribe(EventFilter::topics(vec![EngineTopic::Blocks]));
        let mut at_bob = bob.engine.subscribe(EventFilter::topics(vec![EngineTopic::Blocks]));

        let steps = random_exchange(&alice, &bob, &mut rng, &mut link).await;

        let mut deliveries: HashMap<BlockId, usize> = HashMap::new();
        for event in at_alice.drain().into_iter().chain(at_bob.drain()) {
            if let EngineEvent::BlockDelivered { block, .. } = event {
                *deliveries.entry(block.id()).or_default() += 1;
            }
        }
        assert_eq!(deliveries.len(), steps, "seed {seed}");
        assert!(deliveries.values().all(|count| *count == 1), "seed {seed}");
        assert_eq!(alice.view(BOB), bob.view(ALICE), "seed {seed}");
    }
}

#[tokio::test]
async fn test_any_arrival_order_yields_identical_snapshot() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let alice = Node::new(ALICE, manual_config());
        let count = rng.gen_range(2..20);
        for n in 0..count {
            alice.say(BOB, &format!("m{n}")).await;
        }

        let probe = Node::new(BOB, manual_config());
        let frames = take_frames(&alice, &probe);

        let in_order = Node::new(BOB, manual_config());
        for frame in &frames {
            in_order.engine.handle_incoming(ALICE, frame).await.unwrap();
        }

        let scrambled = Node::new(BOB, manual_config());
        let mut replay: Vec<&Vec<u8>> = frames.iter().chain(frames.iter()).collect();
        replay.shuffle(&mut rng);
        for frame in replay {
            scrambled.engine.handle_incoming(ALICE, frame).await.unwrap();
        }

        let expected = in_order.engine.conversation_snapshot(ALICE);
        assert_eq!(expected.len(), count, "seed {seed}");
        assert_eq!(scrambled.engine.conversation_snapshot(ALICE), expected, "seed {seed}");
    }
}

#[tokio::test]
async fn test_replaying_delivered_frames_changes_nothing() {
    let mut rng = StdRng::seed_from_u64(42);
    let (alice, bob) = pair();
    for n in 0..10 {
        alice.say(BOB, &format!("m{n}")).await;
    }

    let frames = take_frames(&alice, &bob);
    for frame in &frames {
        bob.engine.handle_incoming(ALICE, frame).await.unwrap();
    }
    let before = bob.engine.conversation_snapshot(ALICE);
    let mut delivered = bob.engine.subscribe(EventFilter::topics(vec![EngineTopic::Blocks]));

    for _ in 0..3 {
        let mut again = frames.clone();
        again.shuffle(&mut rng);
        for frame in &again {
            bob.engine.handle_incoming(ALICE, frame).await.unwrap();
        }
    }

    assert_eq!(bob.engine.conversation_snapshot(ALICE), before);
    assert!(delivered.drain().is_empty());
}

#[test]
fn test_poll_projection_ignores_replay_order() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let responses: Vec<WidgetResponse> = (0..rng.gen_range(1..30))
            .map(|n| {
                WidgetResponse::new(
                    PeerId::new([rng.gen_range(1..6); 32]),
                    n,
                    ResponseValue::Choices(vec![rng.gen_range(0..3)]),
                )
            })
            .collect();

        let tally = |responses: &[WidgetResponse]| {
            let mut tracker = WidgetTracker::new();
            let poll = BlockId::new();
            tracker.track(
                poll,
                WidgetBlock::new(WidgetConfig::poll("Pick", vec!["x", "y", "z"])),
            );
            for response in responses {
                tracker.record(poll, response.clone()).unwrap();
            }
            tracker.results(poll).unwrap()
        };

        let expected = tally(&responses);
        let total: f64 = expected.iter().map(|row| row.percentage).sum();
        assert!(total <= 100.0 + 1e-9, "seed {seed}");

        let mut shuffled = responses.clone();
        shuffled.shuffle(&mut rng);
        assert_eq!(tally(&shuffled), expected, "seed {seed}");
    }
}
