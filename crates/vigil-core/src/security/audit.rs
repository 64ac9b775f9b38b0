//! Audit recorder: turns a redaction decision into a hash-only [`AuditRecord`].
//!
//! The record carries digests of the original and redacted content, never the content itself.
//! For blocked messages the redacted digest is the `BLOCKED` sentinel.

use super::redaction::{RedactionOutcome, RedactionReport};
use crate::hashing::sha256_hex;
use crate::shared::{AuditDecision, AuditRecord, InboundMessage, BLOCKED_SENTINEL};
use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;

/// Builds audit records. Stateless; persistence is the caller's job.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuditRecorder;

impl AuditRecorder {
    /// Record for a message that was not published.
    pub fn blocked(message: &InboundMessage, reason: &str, elapsed: Duration) -> AuditRecord {
        AuditRecord {
            id: Uuid::new_v4().to_string(),
            conversation_id: message.conversation_id.clone(),
            source_message_id: message.message_id.clone(),
            published_message_id: None,
            original_hash: original_hash(message),
            redacted_hash: BLOCKED_SENTINEL.to_string(),
            decision: AuditDecision::Blocked,
            layer: 1,
            matched_labels: vec![reason.to_string()],
            processing_micros: micros(elapsed),
            recorded_at: Utc::now(),
        }
    }

    /// Record paired with a published message. `decision` is `redacted` when the content
    /// changed and `allowed` otherwise.
    pub fn published(
        message: &InboundMessage,
        report: &RedactionReport,
        published_message_id: &str,
        published_content: &str,
        elapsed: Duration,
    ) -> AuditRecord {
        let decision = match report.outcome {
            RedactionOutcome::Rewritten { .. } => AuditDecision::Redacted,
            _ => AuditDecision::Allowed,
        };
        AuditRecord {
            id: Uuid::new_v4().to_string(),
            conversation_id: message.conversation_id.clone(),
            source_message_id: message.message_id.clone(),
            published_message_id: Some(published_message_id.to_string()),
            original_hash: original_hash(message),
            redacted_hash: sha256_hex(published_content.as_bytes()),
            decision,
            layer: report.layer,
            matched_labels: report.labels.clone(),
            processing_micros: micros(elapsed),
            recorded_at: Utc::now(),
        }
    }
}

fn original_hash(message: &InboundMessage) -> String {
    sha256_hex(message.content.as_deref().unwrap_or("").as_bytes())
}

fn micros(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::RedactionEngine;
    use crate::shared::MessageRole;

    #[test]
    fn blocked_record_holds_no_content() {
        let msg = InboundMessage::new("c1", "m1", MessageRole::User, "[PRIVATE] launch codes 1234");
        let rec = AuditRecorder::blocked(&msg, "blocker:private", Duration::from_micros(42));
        assert_eq!(rec.redacted_hash, BLOCKED_SENTINEL);
        assert_eq!(rec.decision, AuditDecision::Blocked);
        assert_eq!(rec.layer, 1);
        assert!(rec.published_message_id.is_none());
        assert_eq!(rec.processing_micros, 42);
        let json = serde_json::to_string(&rec).unwrap();
        assert!(!json.contains("launch codes"));
    }

    #[test]
    fn allowed_record_hashes_match_when_unchanged() {
        let engine = RedactionEngine::new();
        let msg = InboundMessage::new("c1", "m2", MessageRole::Assistant, "all clear");
        let report = engine.evaluate(msg.content.as_deref());
        let content = report.outcome.content().unwrap().to_string();
        let rec = AuditRecorder::published(&msg, &report, "p1", &content, Duration::ZERO);
        assert_eq!(rec.decision, AuditDecision::Allowed);
        assert_eq!(rec.original_hash, rec.redacted_hash);
        assert_eq!(rec.layer, 0);
    }

    #[test]
    fn redacted_record_hashes_differ() {
        let engine = RedactionEngine::new();
        let msg = InboundMessage::new("c1", "m3", MessageRole::User, "ping Morgan");
        let report = engine.evaluate(msg.content.as_deref());
        let content = report.outcome.content().unwrap().to_string();
        let rec = AuditRecorder::published(&msg, &report, "p1", &content, Duration::ZERO);
        assert_eq!(rec.decision, AuditDecision::Redacted);
        assert_ne!(rec.original_hash, rec.redacted_hash);
        assert_eq!(rec.matched_labels, vec!["identity:name".to_string()]);
        assert_eq!(rec.published_message_id.as_deref(), Some("p1"));
    }
}
