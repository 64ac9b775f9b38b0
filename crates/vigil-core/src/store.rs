//! Persistence seams. The core never talks to a database directly; it needs a store with atomic
//! multi-record writes and a uniqueness constraint on the idempotency key.

use crate::error::StoreResult;
use crate::shared::{AuditRecord, ChainSummary, ChainTail, MemoryChainLink, PublishedMessage};

/// Result of an insert guarded by the (conversation id, source message id) uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same key already exists; nothing was written.
    AlreadyPresent,
}

/// Storage for the public feed and its audit trail.
pub trait FeedStore: Send + Sync {
    /// Inserts `message` and its paired `audit` record in one atomic unit. A key conflict
    /// writes neither and returns [`InsertOutcome::AlreadyPresent`].
    fn record_publication(
        &self,
        message: &PublishedMessage,
        audit: &AuditRecord,
    ) -> StoreResult<InsertOutcome>;

    /// Inserts the audit record of a blocked message. No published message is written.
    fn record_blocked(&self, audit: &AuditRecord) -> StoreResult<InsertOutcome>;

    /// Published messages of one conversation, oldest first.
    fn published_messages(&self, conversation_id: &str) -> StoreResult<Vec<PublishedMessage>>;

    /// Audit records of one conversation, oldest first.
    fn audit_records(&self, conversation_id: &str) -> StoreResult<Vec<AuditRecord>>;
}

/// Builds the links to append given the chain's current tail (`None` for an empty chain).
pub type LinkPlanner<'a> = dyn Fn(Option<&ChainTail>) -> Vec<MemoryChainLink> + 'a;

/// Append-only storage for memory chains.
pub trait ChainStore: Send + Sync {
    /// Reads the tail of `chain_id`, asks `plan` for the links to append, and writes them, all in
    /// one transaction. Returns the links written.
    fn append_links(
        &self,
        chain_id: &str,
        plan: &LinkPlanner<'_>,
    ) -> StoreResult<Vec<MemoryChainLink>>;

    /// All links of `chain_id`, ordered by sequence ascending.
    fn load_chain(&self, chain_id: &str) -> StoreResult<Vec<MemoryChainLink>>;

    /// Cheap aggregate over `chain_id`; `None` when the chain has no links.
    fn chain_summary(&self, chain_id: &str) -> StoreResult<Option<ChainSummary>>;
}
