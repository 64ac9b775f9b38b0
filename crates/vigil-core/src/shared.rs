//! Shared records: inbound messages, published feed entries, audit records, and memory-chain links.
//!
//! Raw inbound content only ever lives in [`InboundMessage`]. Everything that is persisted
//! ([`PublishedMessage`], [`AuditRecord`], [`MemoryChainLink`]) is append-only and never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel stored as the redacted-content hash of a blocked message.
pub const BLOCKED_SENTINEL: &str = "BLOCKED";

/// Speaker role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }

    /// Parses a stored or caller-supplied role label (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            "tool" => Some(Self::Tool),
            _ => None,
        }
    }
}

/// A message as delivered by the message source. Ephemeral; never persisted unredacted.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub conversation_id: String,
    /// Caller-supplied id, stable across redelivery. Together with `conversation_id` it is the
    /// idempotency key.
    pub message_id: String,
    pub role: MessageRole,
    /// Raw content; `None` is treated as empty.
    pub content: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(
        conversation_id: impl Into<String>,
        message_id: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            message_id: message_id.into(),
            role,
            content: Some(content.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A feed entry that passed redaction (possibly rewritten).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedMessage {
    pub id: String,
    pub conversation_id: String,
    pub source_message_id: String,
    pub role: MessageRole,
    /// Redacted content; the only form of the message that is ever stored.
    pub content: String,
    pub original_timestamp: DateTime<Utc>,
    pub redaction_applied: bool,
    /// Labels of every pattern that fired, in pipeline order.
    pub matched_labels: Vec<String>,
    /// Always false for stored rows; blocked messages are never published.
    pub blocked: bool,
    pub published_at: DateTime<Utc>,
}

/// Decision category recorded on an [`AuditRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditDecision {
    Redacted,
    Blocked,
    Allowed,
}

impl AuditDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redacted => "redacted",
            Self::Blocked => "blocked",
            Self::Allowed => "allowed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "redacted" => Some(Self::Redacted),
            "blocked" => Some(Self::Blocked),
            "allowed" => Some(Self::Allowed),
            _ => None,
        }
    }
}

/// Hash-only trail of one redaction decision. Created for every message regardless of outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub conversation_id: String,
    pub source_message_id: String,
    /// `None` for blocked decisions; a blocked record never references a published message.
    pub published_message_id: Option<String>,
    pub original_hash: String,
    /// SHA-256 of the redacted content, or [`BLOCKED_SENTINEL`].
    pub redacted_hash: String,
    pub decision: AuditDecision,
    /// Lowest layer (1–5) that made a decision; 0 when nothing fired.
    pub layer: u8,
    pub matched_labels: Vec<String>,
    pub processing_micros: u64,
    pub recorded_at: DateTime<Utc>,
}

/// One extracted fact supplied by the fact-extraction collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFact {
    pub content: Option<String>,
    /// Overrides the batch-level source document hash when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_document_hash: Option<String>,
}

impl ExtractedFact {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            source_document_hash: None,
        }
    }

    pub fn with_source_document_hash(mut self, hash: impl Into<String>) -> Self {
        self.source_document_hash = Some(hash.into());
        self
    }
}

/// One link of an (owner, agent) memory chain. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryChainLink {
    pub id: String,
    pub chain_id: String,
    pub owner: String,
    pub source_agent: String,
    /// Starts at 1 and increases by exactly one per link.
    pub sequence: u64,
    pub previous_hash: String,
    pub content: Option<String>,
    pub content_hash: String,
    pub source_document_hash: Option<String>,
    /// Truncated to microseconds so it hashes identically after a store round-trip.
    pub created_at: DateTime<Utc>,
    pub link_hash: String,
}

/// Highest sequence of a chain and the hash the next link must reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTail {
    pub sequence: u64,
    pub link_hash: String,
}

/// Aggregate a store can compute without reading link bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSummary {
    pub max_sequence: u64,
    pub record_count: u64,
    pub latest_link_id: String,
}

/// Monitoring view of one chain. Derived on demand; never persisted and never verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainStatus {
    pub chain_id: String,
    pub length: u64,
    pub record_count: u64,
    pub latest_link_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_labels_roundtrip() {
        for role in [
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::System,
            MessageRole::Tool,
        ] {
            assert_eq!(MessageRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(MessageRole::parse(" Assistant "), Some(MessageRole::Assistant));
        assert_eq!(MessageRole::parse("narrator"), None);
    }

    #[test]
    fn decision_serializes_snake_case() {
        let json = serde_json::to_string(&AuditDecision::Redacted).unwrap();
        assert_eq!(json, "\"redacted\"");
        assert_eq!(AuditDecision::parse("blocked"), Some(AuditDecision::Blocked));
    }
}
