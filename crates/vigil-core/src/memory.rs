//! In-process store: feed tables behind one mutex, chains in a DashMap.
//!
//! Useful for tests and single-process deployments. Holding a chain's DashMap entry across the
//! tail read and the append gives the same per-chain serialization a database transaction would.

use crate::error::{StoreError, StoreResult};
use crate::shared::{AuditRecord, ChainSummary, ChainTail, MemoryChainLink, PublishedMessage};
use crate::store::{ChainStore, FeedStore, InsertOutcome, LinkPlanner};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

type IdempotencyKey = (String, String);

#[derive(Default)]
struct FeedTables {
    messages: Vec<PublishedMessage>,
    audits: Vec<AuditRecord>,
    message_keys: HashSet<IdempotencyKey>,
    audit_keys: HashSet<IdempotencyKey>,
}

/// Volatile [`FeedStore`] + [`ChainStore`]. Cloning shares the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    feed: Arc<Mutex<FeedTables>>,
    chains: Arc<DashMap<String, Vec<MemoryChainLink>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn overwrite_link(
        &self,
        chain_id: &str,
        sequence: u64,
        edit: impl FnOnce(&mut MemoryChainLink),
    ) {
        if let Some(mut links) = self.chains.get_mut(chain_id) {
            if let Some(link) = links.iter_mut().find(|l| l.sequence == sequence) {
                edit(link);
            }
        }
    }
}

fn key(conversation_id: &str, message_id: &str) -> IdempotencyKey {
    (conversation_id.to_string(), message_id.to_string())
}

impl FeedStore for MemoryStore {
    fn record_publication(
        &self,
        message: &PublishedMessage,
        audit: &AuditRecord,
    ) -> StoreResult<InsertOutcome> {
        let mut feed = self.feed.lock().map_err(|_| StoreError::Poisoned)?;
        let k = key(&message.conversation_id, &message.source_message_id);
        if feed.message_keys.contains(&k) || feed.audit_keys.contains(&k) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        feed.message_keys.insert(k.clone());
        feed.audit_keys.insert(k);
        feed.messages.push(message.clone());
        feed.audits.push(audit.clone());
        Ok(InsertOutcome::Inserted)
    }

    fn record_blocked(&self, audit: &AuditRecord) -> StoreResult<InsertOutcome> {
        let mut feed = self.feed.lock().map_err(|_| StoreError::Poisoned)?;
        if !feed
            .audit_keys
            .insert(key(&audit.conversation_id, &audit.source_message_id))
        {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        feed.audits.push(audit.clone());
        Ok(InsertOutcome::Inserted)
    }

    fn published_messages(&self, conversation_id: &str) -> StoreResult<Vec<PublishedMessage>> {
        let feed = self.feed.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(feed
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    fn audit_records(&self, conversation_id: &str) -> StoreResult<Vec<AuditRecord>> {
        let feed = self.feed.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(feed
            .audits
            .iter()
            .filter(|a| a.conversation_id == conversation_id)
            .cloned()
            .collect())
    }
}

impl ChainStore for MemoryStore {
    fn append_links(
        &self,
        chain_id: &str,
        plan: &LinkPlanner<'_>,
    ) -> StoreResult<Vec<MemoryChainLink>> {
        let mut links = self.chains.entry(chain_id.to_string()).or_default();
        let tail = links.last().map(|l| ChainTail {
            sequence: l.sequence,
            link_hash: l.link_hash.clone(),
        });
        let planned = plan(tail.as_ref());
        links.extend(planned.iter().cloned());
        Ok(planned)
    }

    fn load_chain(&self, chain_id: &str) -> StoreResult<Vec<MemoryChainLink>> {
        let mut links = self
            .chains
            .get(chain_id)
            .map(|l| l.value().clone())
            .unwrap_or_default();
        links.sort_by_key(|l| l.sequence);
        Ok(links)
    }

    fn chain_summary(&self, chain_id: &str) -> StoreResult<Option<ChainSummary>> {
        Ok(self.chains.get(chain_id).and_then(|links| {
            let latest = links.iter().max_by_key(|l| l.sequence)?;
            Some(ChainSummary {
                max_sequence: latest.sequence,
                record_count: links.len() as u64,
                latest_link_id: latest.id.clone(),
            })
        }))
    }
}
