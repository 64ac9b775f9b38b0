//! Publication coordinator: the only path from an inbound message to the public feed.
//!
//! Each message is redacted, audited and (unless blocked) persisted together with its audit record
//! in one atomic store call, then broadcast to live subscribers. Redelivery of a message whose
//! (conversation id, message id) key is already stored is a no-op: no second row, no second
//! broadcast.

use crate::error::StoreResult;
use crate::hashing::digest_prefix;
use crate::security::{AuditRecorder, RedactionEngine, RedactionOutcome};
use crate::shared::{AuditRecord, InboundMessage, PublishedMessage};
use crate::store::{FeedStore, InsertOutcome};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default capacity of the live broadcast channel.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PublicationOutcome {
    /// Stored and broadcast. Carries the feed entry exactly as persisted.
    Published(PublishedMessage),
    /// The idempotency key was already taken; nothing was written or broadcast.
    AlreadyHandled {
        conversation_id: String,
        message_id: String,
    },
    /// A hard blocker matched. Only an audit record was written.
    Blocked { reason: String, layer: u8 },
}

/// Redacts, audits, persists and broadcasts conversation messages.
pub struct Publisher<S: FeedStore> {
    store: Arc<S>,
    engine: RedactionEngine,
    live: broadcast::Sender<PublishedMessage>,
}

impl<S: FeedStore> Publisher<S> {
    pub fn new(store: Arc<S>, broadcast_capacity: usize) -> Self {
        let (live, _) = broadcast::channel(broadcast_capacity.max(1));
        Self {
            store,
            engine: RedactionEngine::new(),
            live,
        }
    }

    /// Live feed. Receivers only see messages published after they subscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedMessage> {
        self.live.subscribe()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Handles one delivery of `message`. Store failures propagate with nothing committed and
    /// nothing broadcast, so the caller can retry the same message.
    pub fn handle_message(&self, message: &InboundMessage) -> StoreResult<PublicationOutcome> {
        let started = Instant::now();
        let report = self.engine.evaluate(message.content.as_deref());

        if let RedactionOutcome::Blocked { reason, layer } = &report.outcome {
            let audit = AuditRecorder::blocked(message, reason, started.elapsed());
            let stored = self.store.record_blocked(&audit)?;
            log_decision(&audit, stored);
            return Ok(PublicationOutcome::Blocked {
                reason: reason.clone(),
                layer: layer.number(),
            });
        }

        let content = report.outcome.content().unwrap_or_default().to_string();
        let published = PublishedMessage {
            id: Uuid::new_v4().to_string(),
            conversation_id: message.conversation_id.clone(),
            source_message_id: message.message_id.clone(),
            role: message.role,
            content,
            original_timestamp: message.timestamp,
            redaction_applied: report.outcome.is_rewritten(),
            matched_labels: report.labels.clone(),
            blocked: false,
            published_at: Utc::now(),
        };
        let audit = AuditRecorder::published(
            message,
            &report,
            &published.id,
            &published.content,
            started.elapsed(),
        );

        let stored = self.store.record_publication(&published, &audit)?;
        log_decision(&audit, stored);
        match stored {
            InsertOutcome::Inserted => {
                // No subscribers is not an error.
                let _ = self.live.send(published.clone());
                Ok(PublicationOutcome::Published(published))
            }
            InsertOutcome::AlreadyPresent => Ok(PublicationOutcome::AlreadyHandled {
                conversation_id: message.conversation_id.clone(),
                message_id: message.message_id.clone(),
            }),
        }
    }

    pub fn published_messages(&self, conversation_id: &str) -> StoreResult<Vec<PublishedMessage>> {
        self.store.published_messages(conversation_id)
    }

    pub fn audit_trail(&self, conversation_id: &str) -> StoreResult<Vec<AuditRecord>> {
        self.store.audit_records(conversation_id)
    }
}

/// Redaction-only helper for callers that need no persistence (CLI previews, other agents).
pub fn preview(text: &str) -> RedactionOutcome {
    RedactionEngine::new().evaluate(Some(text)).outcome
}

fn log_decision(audit: &AuditRecord, stored: InsertOutcome) {
    if stored == InsertOutcome::AlreadyPresent {
        tracing::debug!(
            target: "vigil::publication",
            conversation_id = %audit.conversation_id,
            message_id = %audit.source_message_id,
            "duplicate delivery ignored"
        );
        return;
    }
    tracing::info!(
        target: "vigil::publication",
        conversation_id = %audit.conversation_id,
        message_id = %audit.source_message_id,
        decision = audit.decision.as_str(),
        layer = audit.layer,
        labels = ?audit.matched_labels,
        original = digest_prefix(&audit.original_hash),
        redacted = digest_prefix(&audit.redacted_hash),
        micros = audit.processing_micros,
        "message processed"
    );
}
