//! # Engine Scenarios
//!
//! End-to-end flows between two engines:
//!
//! 1. **Ordering**: out-of-order arrival is held back and released in sequence
//! 2. **Widgets**: poll votes and button presses correlate on both sides
//! 3. **Transfers**: progress stays monotonic and failures can be retried
//! 4. **Connectivity**: sends to an unreachable peer are queued and replayed
//! 5. **Identity and lifecycle**: authorship comes from the link, and a torn
//!    down conversation can be reopened

use std::sync::Arc;

use engine_runtime::{EngineEvent, EngineTopic};
use parking_lot::Mutex;
use pbm_01_block_model::{
    Block, BlockContent, FileBlock, ResponseValue, Severity, TextBlock, TransferStatus,
    WidgetBlock, WidgetConfig, WidgetResponse,
};
use pbm_02_block_registry::ResolvedBlock;
use pbm_03_message_stream::{encode_envelope, Disposition, Envelope, Payload};
use pbm_04_widget_interaction::WidgetTracker;
use pbm_05_file_transfer::ProgressOutcome;
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared_bus::EventFilter;
use shared_types::{BlockId, PeerId};
use tokio_stream::StreamExt;

use super::harness::{pair, take_frames, Faults, Link, ALICE, BOB};

fn content(block: &ResolvedBlock) -> &BlockContent {
    &block.as_block().unwrap().content
}

fn body(block: &ResolvedBlock) -> String {
    match content(block) {
        BlockContent::Text(text) => text.content.clone(),
        other => panic!("expected text, got {other:?}"),
    }
}

// =============================================================================
// ORDERING
// =============================================================================

#[tokio::test]
async fn test_sequence_one_three_two_delivers_in_order() {
    let (alice, bob) = pair();
    let mut delivered = bob.engine.subscribe(EventFilter::topics(vec![EngineTopic::Blocks]));

    for body in ["one", "two", "three"] {
        alice.say(BOB, body).await;
    }
    let frames = take_frames(&alice, &bob);
    assert_eq!(frames.len(), 3);

    let first = bob.engine.handle_incoming(ALICE, &frames[0]).await.unwrap();
    let third = bob.engine.handle_incoming(ALICE, &frames[2]).await.unwrap();
    assert_eq!(first, Disposition::Delivered(1));
    assert_eq!(third, Disposition::Buffered);
    assert_eq!(bob.view(ALICE).len(), 1);

    let second = bob.engine.handle_incoming(ALICE, &frames[1]).await.unwrap();
    assert_eq!(second, Disposition::Delivered(2));

    let order: Vec<String> = delivered
        .drain()
        .iter()
        .map(|event| match event {
            EngineEvent::BlockDelivered { block, .. } => body(block),
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(order, vec!["one", "two", "three"]);

    let snapshot: Vec<String> = bob.engine.conversation_snapshot(ALICE).iter().map(body).collect();
    assert_eq!(snapshot, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_interleaved_senders_agree_on_display_order() {
    let (alice, bob) = pair();
    let mut link = Link::new(StdRng::seed_from_u64(7), Faults::reorder_and_duplicate());

    alice.say(BOB, "a1").await;
    bob.say(ALICE, "b1").await;
    alice.say(BOB, "a2").await;
    link.settle(&alice, &bob).await;
    bob.say(ALICE, "b2").await;
    alice.say(BOB, "a3").await;
    link.settle(&alice, &bob).await;

    assert_eq!(alice.view(BOB).len(), 5);
    assert_eq!(alice.view(BOB), bob.view(ALICE));

    // b2 was written after b1 and a2 were seen, so it sorts after both.
    let bodies: Vec<String> = alice.engine.conversation_snapshot(BOB).iter().map(body).collect();
    let position = |text: &str| bodies.iter().position(|b| b == text).unwrap();
    assert!(position("b2") > position("a2"));
    assert!(position("b2") > position("b1"));
}

#[tokio::test]
async fn test_forged_sender_is_rejected() {
    let (alice, bob) = pair();
    alice.say(BOB, "hello").await;
    let frame = take_frames(&alice, &bob).remove(0);

    let mallory = PeerId::new([0x66; 32]);
    assert!(bob.engine.handle_incoming(mallory, &frame).await.is_err());
    assert!(bob.view(mallory).is_empty());
}

#[tokio::test]
async fn test_unknown_block_type_kept_as_placeholder_in_order() {
    let (alice, bob) = pair();
    alice.say(BOB, "before").await;
    let first = take_frames(&alice, &bob).remove(0);
    bob.engine.handle_incoming(ALICE, &first).await.unwrap();

    let mut wire = Block::new(ALICE, 5, BlockContent::Text(TextBlock::plain("")))
        .to_wire()
        .unwrap();
    wire.type_tag = "location".to_string();
    wire.body = br#"{"lat":52.5,"lon":13.4}"#.to_vec();
    let frame = encode_envelope(&Envelope::new(2, ALICE, 5, Payload::Block(wire))).unwrap();
    bob.engine.handle_incoming(ALICE, &frame).await.unwrap();

    let snapshot = bob.engine.conversation_snapshot(ALICE);
    assert_eq!(snapshot.len(), 2);
    assert!(!snapshot[0].is_placeholder());
    assert!(snapshot[1].is_placeholder());
}

// =============================================================================
// WIDGETS
// =============================================================================

#[test]
fn test_three_responder_poll_percentages() {
    let mut tracker = WidgetTracker::new();
    let poll = BlockId::new();
    tracker.track(
        poll,
        WidgetBlock::new(WidgetConfig::poll("Where?", vec!["park", "beach", "home"])),
    );

    for (responder, choice) in [(1u8, 0u32), (2, 0), (3, 1)] {
        let response = WidgetResponse::new(
            PeerId::new([responder; 32]),
            u64::from(responder) + 1,
            ResponseValue::Choices(vec![choice]),
        );
        tracker.record(poll, response).unwrap();
    }

    let results: Vec<(u32, f64)> = tracker
        .results(poll)
        .unwrap()
        .iter()
        .map(|tally| (tally.count, tally.rounded_percentage()))
        .collect();
    assert_eq!(results, vec![(2, 66.7), (1, 33.3), (0, 0.0)]);
}

#[tokio::test]
async fn test_poll_vote_change_converges_on_both_sides() {
    let (alice, bob) = pair();
    let mut link = Link::new(StdRng::seed_from_u64(11), Faults::reorder_and_duplicate());
    let poll = alice
        .engine
        .submit_block(
            BOB,
            BlockContent::Widget(WidgetBlock::new(WidgetConfig::poll(
                "Release?",
                vec!["now", "tomorrow"],
            ))),
        )
        .await
        .unwrap()
        .block_id;
    link.settle(&alice, &bob).await;

    bob.engine
        .respond_to_widget(ALICE, poll, ResponseValue::Choices(vec![0]))
        .await
        .unwrap();
    alice
        .engine
        .respond_to_widget(BOB, poll, ResponseValue::Choices(vec![1]))
        .await
        .unwrap();
    bob.engine
        .respond_to_widget(ALICE, poll, ResponseValue::Choices(vec![1]))
        .await
        .unwrap();
    link.settle(&alice, &bob).await;

    let counts = |tallies: Vec<pbm_04_widget_interaction::PollTally>| -> Vec<u32> {
        tallies.iter().map(|tally| tally.count).collect()
    };
    assert_eq!(counts(alice.engine.poll_results(BOB, poll).unwrap()), vec![0, 2]);
    assert_eq!(counts(bob.engine.poll_results(ALICE, poll).unwrap()), vec![0, 2]);
}

#[tokio::test]
async fn test_confirm_widget_answer_reaches_author() {
    let (alice, bob) = pair();
    let mut link = Link::new(StdRng::seed_from_u64(3), Faults::default());
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = recorded.clone();
    alice
        .engine
        .on_widget_response_recorded(move |peer, _, response: &WidgetResponse| {
            sink.lock().push((peer, response.value.clone()));
        });

    let confirm = alice
        .engine
        .submit_block(
            BOB,
            BlockContent::Widget(WidgetBlock::new(WidgetConfig::Confirm {
                prompt: "Delete branch?".to_string(),
                allow_reanswer: false,
            })),
        )
        .await
        .unwrap()
        .block_id;
    link.settle(&alice, &bob).await;

    bob.engine
        .respond_to_widget(ALICE, confirm, ResponseValue::Confirmed(true))
        .await
        .unwrap();
    link.settle(&alice, &bob).await;

    assert_eq!(*recorded.lock(), vec![(BOB, ResponseValue::Confirmed(true))]);
    match content(&alice.engine.conversation_snapshot(BOB)[0]) {
        BlockContent::Widget(widget) => assert!(widget.has_response_from(&BOB)),
        other => panic!("unexpected content {other:?}"),
    }
}

// =============================================================================
// TRANSFERS
// =============================================================================

#[tokio::test]
async fn test_transfer_progress_sequence_is_monotonic() {
    let (alice, _bob) = pair();
    let mut stream = alice
        .engine
        .event_stream(EventFilter::topics(vec![EngineTopic::Transfers]));

    let file = alice
        .engine
        .submit_block(BOB, BlockContent::File(FileBlock::new("photo.jpg", 4096, "image/jpeg")))
        .await
        .unwrap()
        .block_id;
    let attempt = alice.engine.start_transfer(BOB, file).unwrap();

    let mut outcomes = Vec::new();
    for percent in [10, 40, 25, 60, 100] {
        outcomes.push(
            alice
                .engine
                .report_transfer_progress(BOB, file, attempt, percent, 4096)
                .unwrap(),
        );
    }
    assert_eq!(
        outcomes,
        vec![
            ProgressOutcome::Applied(10),
            ProgressOutcome::Applied(40),
            ProgressOutcome::Ignored {
                last: 40,
                reported: 25
            },
            ProgressOutcome::Applied(60),
            ProgressOutcome::Completed,
        ]
    );

    let mut observed = Vec::new();
    while observed.len() < 5 {
        match stream.next().await {
            Some(EngineEvent::TransferProgress { progress, .. }) => observed.push(progress),
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(observed, vec![0, 10, 40, 60, 100]);
}

#[tokio::test]
async fn test_failed_transfer_retry_resets_progress() {
    let (alice, _bob) = pair();
    let file = alice
        .engine
        .submit_block(BOB, BlockContent::File(FileBlock::new("a.zip", 1000, "application/zip")))
        .await
        .unwrap()
        .block_id;

    let first = alice.engine.start_transfer(BOB, file).unwrap();
    alice
        .engine
        .report_transfer_progress(BOB, file, first, 70, 700)
        .unwrap();
    alice.engine.fail_transfer(BOB, file, first, "connection reset").unwrap();

    let second = alice.engine.retry_transfer(BOB, file).unwrap();
    // Reports from the abandoned attempt are stale.
    assert!(alice
        .engine
        .report_transfer_progress(BOB, file, first, 80, 800)
        .is_err());
    alice
        .engine
        .report_transfer_progress(BOB, file, second, 30, 300)
        .unwrap();

    match content(&alice.engine.conversation_snapshot(BOB)[0]) {
        BlockContent::File(file) => {
            assert_eq!(file.transfer_status, TransferStatus::Transferring);
            assert_eq!(file.transfer_progress, 30);
            assert_eq!(file.retry_count, Some(1));
        }
        other => panic!("unexpected content {other:?}"),
    }
}

// =============================================================================
// CONNECTIVITY
// =============================================================================

#[tokio::test]
async fn test_offline_queue_replays_in_order_after_reconnect() {
    let (alice, bob) = pair();
    let mut link = Link::new(StdRng::seed_from_u64(5), Faults::reorder_and_duplicate());

    alice.transport.set_reachable(BOB, false);
    for body in ["q1", "q2", "q3"] {
        let submitted = alice
            .engine
            .submit_block(BOB, BlockContent::Text(TextBlock::plain(body)))
            .await
            .unwrap();
        assert!(submitted.queued);
    }
    assert_eq!(alice.engine.outbox_len(BOB), 3);
    assert!(take_frames(&alice, &bob).is_empty());

    alice.transport.set_reachable(BOB, true);
    let report = alice.engine.peer_reconnected(BOB).await;
    assert_eq!(report.sent, 3);
    link.settle(&alice, &bob).await;

    let bodies: Vec<String> = bob.engine.conversation_snapshot(ALICE).iter().map(body).collect();
    assert_eq!(bodies, vec!["q1", "q2", "q3"]);

    let notices: Vec<Severity> = alice
        .engine
        .conversation_snapshot(BOB)
        .iter()
        .filter_map(|block| match content(block) {
            BlockContent::System(line) => Some(line.severity),
            _ => None,
        })
        .collect();
    assert_eq!(notices, vec![Severity::Warning, Severity::Success]);
}

#[tokio::test]
async fn test_incoming_frame_marks_peer_online() {
    let (alice, bob) = pair();
    let mut connectivity = alice
        .engine
        .subscribe(EventFilter::topics(vec![EngineTopic::Connectivity]));

    alice.transport.set_reachable(BOB, false);
    alice.say(BOB, "anyone?").await;
    assert!(!alice.engine.is_online(BOB));

    bob.say(ALICE, "here").await;
    let frame = take_frames(&bob, &alice).remove(0);
    alice.engine.handle_incoming(BOB, &frame).await.unwrap();

    assert!(alice.engine.is_online(BOB));
    let transitions: Vec<bool> = connectivity
        .drain()
        .iter()
        .filter_map(|event| match event {
            EngineEvent::ConnectivityChanged { online, .. } => Some(*online),
            _ => None,
        })
        .collect();
    assert_eq!(transitions, vec![false, true]);
}

// =============================================================================
// IDENTITY AND LIFECYCLE
// =============================================================================

#[tokio::test]
async fn test_conversation_reopened_after_teardown_keeps_delivering() {
    let (alice, bob) = pair();
    let mut link = Link::new(StdRng::seed_from_u64(19), Faults::reorder_and_duplicate());

    alice.say(BOB, "one").await;
    alice.say(BOB, "two").await;
    link.settle(&alice, &bob).await;

    alice.engine.teardown(BOB).await;
    alice.say(BOB, "three").await;
    link.settle(&alice, &bob).await;

    let bodies: Vec<String> = bob.engine.conversation_snapshot(ALICE).iter().map(body).collect();
    assert_eq!(bodies, vec!["one", "two", "three"]);
    assert_eq!(alice.engine.outbox_len(BOB), 0);

    // The receiving side can tear down too without losing the next block.
    bob.engine.teardown(ALICE).await;
    alice.say(BOB, "four").await;
    link.settle(&alice, &bob).await;

    let bodies: Vec<String> = bob.engine.conversation_snapshot(ALICE).iter().map(body).collect();
    assert_eq!(bodies, vec!["four"]);
    assert_eq!(alice.view(BOB).len(), 2);
}

#[tokio::test]
async fn test_votes_cast_for_other_peers_are_not_counted() {
    let (alice, bob) = pair();
    let mut link = Link::new(StdRng::seed_from_u64(23), Faults::reorder_and_duplicate());
    let poll = alice
        .engine
        .submit_block(
            BOB,
            BlockContent::Widget(WidgetBlock::new(WidgetConfig::poll(
                "Deploy?",
                vec!["yes", "no"],
            ))),
        )
        .await
        .unwrap()
        .block_id;
    link.settle(&alice, &bob).await;

    bob.engine
        .respond_to_widget(ALICE, poll, ResponseValue::Choices(vec![1]))
        .await
        .unwrap();
    link.settle(&alice, &bob).await;

    // Bob's next sequences carry votes signed with made-up responder ids.
    for (sequence, responder) in (2u64..).zip([[7u8; 32], [8u8; 32], [9u8; 32]]) {
        let sent_at = 100 + sequence;
        let response = WidgetResponse::new(
            PeerId::new(responder),
            sent_at,
            ResponseValue::Choices(vec![0]),
        );
        let envelope = Envelope::new(
            sequence,
            BOB,
            sent_at,
            Payload::WidgetResponse {
                block_id: poll,
                response,
            },
        );
        let frame = encode_envelope(&envelope).unwrap();
        let disposition = alice.engine.handle_incoming(BOB, &frame).await.unwrap();
        assert_eq!(disposition, Disposition::Delivered(1));
    }

    let counts: Vec<u32> = alice
        .engine
        .poll_results(BOB, poll)
        .unwrap()
        .iter()
        .map(|tally| tally.count)
        .collect();
    assert_eq!(counts, vec![0, 1]);
}

#[tokio::test]
async fn test_block_claiming_another_author_is_attributed_to_sender() {
    let (alice, _bob) = pair();
    let carol = PeerId::new([3u8; 32]);

    let forged = Block::new(carol, 1, BlockContent::Text(TextBlock::plain("hi, it's carol")));
    let frame =
        encode_envelope(&Envelope::new(1, BOB, 1, Payload::Block(forged.to_wire().unwrap())))
            .unwrap();
    alice.engine.handle_incoming(BOB, &frame).await.unwrap();

    let backdated = Block::new(BOB, 1, BlockContent::Text(TextBlock::plain("old news")));
    let frame =
        encode_envelope(&Envelope::new(2, BOB, 9, Payload::Block(backdated.to_wire().unwrap())))
            .unwrap();
    alice.engine.handle_incoming(BOB, &frame).await.unwrap();

    let snapshot = alice.engine.conversation_snapshot(BOB);
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.iter().all(ResolvedBlock::is_placeholder));
    assert!(snapshot.iter().all(|block| block.header().sender_id == BOB));
    assert_eq!(snapshot[1].header().timestamp, 9);
    assert!(alice.view(carol).is_empty());
}
