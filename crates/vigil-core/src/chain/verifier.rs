//! Chain verifier: walks a persisted chain from its genesis hash and reports the first broken
//! link. Verification only reports; it never repairs.

use super::{chain_id, genesis_hash, link_hash, validate_agent, FACT_EXTRACTOR_AGENT};
use crate::error::{ChainResult, StoreResult};
use crate::hashing::{content_hash, digest_prefix};
use crate::shared::{ChainStatus, MemoryChainLink};
use crate::store::ChainStore;
use serde::Serialize;
use std::sync::Arc;

/// Integrity finding for one chain. A broken chain is a result, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChainVerification {
    Verified { links: u64 },
    EmptyChain,
    BrokenChain { at_sequence: u64, details: String },
}

impl ChainVerification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }
}

pub struct ChainVerifier<S: ChainStore> {
    store: Arc<S>,
    agent: String,
}

impl<S: ChainStore> ChainVerifier<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            agent: FACT_EXTRACTOR_AGENT.to_string(),
        }
    }

    pub fn for_agent(store: Arc<S>, agent: &str) -> ChainResult<Self> {
        validate_agent(agent)?;
        Ok(Self {
            store,
            agent: agent.to_string(),
        })
    }

    /// Checks previous-hash linkage from the genesis hash, link by link, in sequence order.
    pub fn verify(&self, chain_id: &str) -> StoreResult<ChainVerification> {
        let links = self.store.load_chain(chain_id)?;
        let result = walk(chain_id, &links, false);
        log_result(chain_id, &result);
        Ok(result)
    }

    /// Like [`ChainVerifier::verify`], additionally recomputing every content and link hash and
    /// checking that sequences run 1..N without gaps.
    pub fn verify_thorough(&self, chain_id: &str) -> StoreResult<ChainVerification> {
        let links = self.store.load_chain(chain_id)?;
        let result = walk(chain_id, &links, true);
        log_result(chain_id, &result);
        Ok(result)
    }

    /// Cheap monitoring aggregate for `owner`'s chain. Does not verify anything.
    pub fn status(&self, owner: &str) -> ChainResult<ChainStatus> {
        let id = chain_id(owner, &self.agent)?;
        let summary = self.store.chain_summary(&id)?;
        Ok(match summary {
            Some(s) => ChainStatus {
                chain_id: id,
                length: s.max_sequence,
                record_count: s.record_count,
                latest_link_id: Some(s.latest_link_id),
            },
            None => ChainStatus {
                chain_id: id,
                length: 0,
                record_count: 0,
                latest_link_id: None,
            },
        })
    }
}

fn walk(chain_id: &str, links: &[MemoryChainLink], thorough: bool) -> ChainVerification {
    if links.is_empty() {
        return ChainVerification::EmptyChain;
    }
    let mut expected_previous = genesis_hash(chain_id);
    for (index, link) in links.iter().enumerate() {
        let broken = |details: String| ChainVerification::BrokenChain {
            at_sequence: link.sequence,
            details,
        };
        if thorough && link.sequence != index as u64 + 1 {
            return broken(format!(
                "expected sequence {} but found {}",
                index + 1,
                link.sequence
            ));
        }
        if link.previous_hash != expected_previous {
            return broken(format!(
                "previous hash {} does not match expected {}",
                digest_prefix(&link.previous_hash),
                digest_prefix(&expected_previous)
            ));
        }
        if thorough {
            let recomputed_content = content_hash(link.content.as_deref());
            if link.content_hash != recomputed_content {
                return broken("content hash does not match stored content".to_string());
            }
            let recomputed = link_hash(
                link.sequence,
                &link.previous_hash,
                chain_id,
                &link.content_hash,
                link.source_document_hash.as_deref(),
                &link.created_at,
            );
            if link.link_hash != recomputed {
                return broken(format!(
                    "link hash {} does not match recomputed {}",
                    digest_prefix(&link.link_hash),
                    digest_prefix(&recomputed)
                ));
            }
        }
        expected_previous = link.link_hash.clone();
    }
    ChainVerification::Verified {
        links: links.len() as u64,
    }
}

fn log_result(chain_id: &str, result: &ChainVerification) {
    match result {
        ChainVerification::BrokenChain { at_sequence, details } => tracing::warn!(
            target: "vigil::chain",
            chain_id = %chain_id,
            at_sequence = *at_sequence,
            details = %details,
            "memory chain broken"
        ),
        other => tracing::debug!(target: "vigil::chain", chain_id = %chain_id, result = ?other, "memory chain checked"),
    }
}
