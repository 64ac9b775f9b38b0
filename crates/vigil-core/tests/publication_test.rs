//! Integration test: publication coordinator over the in-memory store.
//!
//! Verifies that:
//! 1. Concurrent redelivery of one message publishes and broadcasts exactly once.
//! 2. Blocked messages leave one audit record and nothing in the feed.
//! 3. Stored content never contains the raw secrets that were redacted.

use std::sync::Arc;
use vigil_core::{
    AuditDecision, InboundMessage, MemoryStore, MessageRole, PublicationOutcome, Publisher,
    BLOCKED_SENTINEL,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redelivery_publishes_once() {
    let publisher = Arc::new(Publisher::new(Arc::new(MemoryStore::new()), 64));
    let mut rx = publisher.subscribe();
    let msg = InboundMessage::new("conv-7", "msg-1", MessageRole::Assistant, "Deploy done, Morgan.");

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let p = Arc::clone(&publisher);
            let m = msg.clone();
            tokio::task::spawn_blocking(move || p.handle_message(&m).unwrap())
        })
        .collect();

    let mut published = 0;
    let mut duplicates = 0;
    for h in handles {
        match h.await.unwrap() {
            PublicationOutcome::Published(_) => published += 1,
            PublicationOutcome::AlreadyHandled { .. } => duplicates += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(published, 1);
    assert_eq!(duplicates, 9);

    let live = rx.recv().await.unwrap();
    assert_eq!(live.content, "Deploy done, Warden.");
    assert!(rx.try_recv().is_err(), "exactly one broadcast");

    assert_eq!(publisher.published_messages("conv-7").unwrap().len(), 1);
    assert_eq!(publisher.audit_trail("conv-7").unwrap().len(), 1);
}

#[test]
fn blocked_message_leaves_only_an_audit() {
    let publisher = Publisher::new(Arc::new(MemoryStore::new()), 8);
    let msg = InboundMessage::new(
        "conv-8",
        "msg-1",
        MessageRole::User,
        "[OFF THE RECORD] my password is hunter2",
    );
    let outcome = publisher.handle_message(&msg).unwrap();
    assert_eq!(
        outcome,
        PublicationOutcome::Blocked {
            reason: "blocker:off_the_record".to_string(),
            layer: 1
        }
    );
    assert!(publisher.published_messages("conv-8").unwrap().is_empty());

    let trail = publisher.audit_trail("conv-8").unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].decision, AuditDecision::Blocked);
    assert_eq!(trail[0].redacted_hash, BLOCKED_SENTINEL);
    assert_eq!(trail[0].matched_labels, vec!["blocker:off_the_record".to_string()]);
}

#[test]
fn feed_never_holds_raw_secrets() {
    let publisher = Publisher::new(Arc::new(MemoryStore::new()), 8);
    let lines = [
        "My SSH password is hunter2 — don't tell Morgan",
        "token = abcdefghijklmnop1234",
        "ssh admin@10.20.30.40 then check /home/morgan/.env",
        "reach me at someone@gmail.com or 555-867-5309",
    ];
    for (i, line) in lines.iter().enumerate() {
        let msg = InboundMessage::new("conv-9", format!("m{i}"), MessageRole::User, *line);
        publisher.handle_message(&msg).unwrap();
    }

    let feed = publisher.published_messages("conv-9").unwrap();
    assert_eq!(feed.len(), lines.len());
    for entry in &feed {
        assert!(entry.redaction_applied, "{} should be rewritten", entry.content);
        for raw in ["hunter2", "abcdefghijklmnop1234", "10.20.30.40", "someone@gmail.com", "867-5309"] {
            assert!(!entry.content.contains(raw), "{raw} leaked into {}", entry.content);
        }
        assert!(!entry.content.to_lowercase().contains("morgan"));
    }

    let trail = publisher.audit_trail("conv-9").unwrap();
    assert!(trail.iter().all(|a| a.decision == AuditDecision::Redacted));
    let json = serde_json::to_string(&trail).unwrap();
    assert!(!json.contains("hunter2"));
}
