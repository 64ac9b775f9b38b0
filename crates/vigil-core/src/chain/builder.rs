//! Hash-chain builder: assigns sequence numbers and link hashes to a batch of extracted facts.

use super::{chain_id, genesis_hash, link_hash, validate_agent, FACT_EXTRACTOR_AGENT};
use crate::error::{ChainError, ChainResult, StoreError};
use crate::hashing::{canonical_instant, content_hash, digest_prefix, is_digest};
use crate::shared::{ChainTail, ExtractedFact, MemoryChainLink};
use crate::store::ChainStore;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Appends fact batches to per-owner chains.
///
/// Writers for the same chain are serialized by an in-process lock on top of the store's own
/// transaction, so two concurrent batches can never claim overlapping sequence numbers.
pub struct ChainBuilder<S: ChainStore> {
    store: Arc<S>,
    agent: String,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<S: ChainStore> ChainBuilder<S> {
    /// Builder for the fact-extraction agent.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            agent: FACT_EXTRACTOR_AGENT.to_string(),
            locks: DashMap::new(),
        }
    }

    /// Builder for another agent label.
    pub fn for_agent(store: Arc<S>, agent: &str) -> ChainResult<Self> {
        validate_agent(agent)?;
        Ok(Self {
            store,
            agent: agent.to_string(),
            locks: DashMap::new(),
        })
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn chain_id_for(&self, owner: &str) -> ChainResult<String> {
        chain_id(owner, &self.agent)
    }

    /// Chains `facts` onto `owner`'s chain in input order.
    ///
    /// `source_document_hash` applies to every fact that does not carry its own. All input is
    /// validated before any hash is computed; an empty batch returns an empty vec and touches
    /// nothing.
    pub fn chain_batch(
        &self,
        owner: &str,
        facts: &[ExtractedFact],
        source_document_hash: Option<&str>,
    ) -> ChainResult<Vec<MemoryChainLink>> {
        let chain_id = self.chain_id_for(owner)?;
        validate_source_hash(source_document_hash)?;
        for fact in facts {
            validate_source_hash(fact.source_document_hash.as_deref())?;
        }
        if facts.is_empty() {
            return Ok(Vec::new());
        }

        let lock = self
            .locks
            .entry(chain_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock().map_err(|_| StoreError::Poisoned)?;

        let planner = |tail: Option<&ChainTail>| {
            plan_links(
                &chain_id,
                owner,
                &self.agent,
                tail,
                facts,
                source_document_hash,
            )
        };
        let appended = self.store.append_links(&chain_id, &planner);
        drop(guard);
        // Only the map and this call hold the lock, so no writer is queued on it.
        self.locks.remove_if(&chain_id, |_, held| Arc::strong_count(held) == 2);
        let links = appended?;

        if let (Some(first), Some(last)) = (links.first(), links.last()) {
            tracing::info!(
                target: "vigil::chain",
                chain_id = %chain_id,
                appended = links.len(),
                first_sequence = first.sequence,
                last_sequence = last.sequence,
                tail = digest_prefix(&last.link_hash),
                "memory chain extended"
            );
        }
        Ok(links)
    }
}

fn validate_source_hash(hash: Option<&str>) -> ChainResult<()> {
    match hash {
        Some(h) if !is_digest(h) => Err(ChainError::MalformedInput(
            "source document hash must be 64 lowercase hex characters".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Pure link computation from a tail snapshot. Sequence continues from the tail (1 for an empty
/// chain) and each link's hash becomes the next link's previous hash.
fn plan_links(
    chain_id: &str,
    owner: &str,
    agent: &str,
    tail: Option<&ChainTail>,
    facts: &[ExtractedFact],
    batch_source: Option<&str>,
) -> Vec<MemoryChainLink> {
    let (mut previous, mut sequence) = match tail {
        Some(t) => (t.link_hash.clone(), t.sequence),
        None => (genesis_hash(chain_id), 0),
    };
    let created_at = canonical_instant(Utc::now());
    let mut links = Vec::with_capacity(facts.len());
    for fact in facts {
        sequence += 1;
        let source = fact.source_document_hash.as_deref().or(batch_source);
        let c_hash = content_hash(fact.content.as_deref());
        let l_hash = link_hash(sequence, &previous, chain_id, &c_hash, source, &created_at);
        links.push(MemoryChainLink {
            id: Uuid::new_v4().to_string(),
            chain_id: chain_id.to_string(),
            owner: owner.to_string(),
            source_agent: agent.to_string(),
            sequence,
            previous_hash: previous,
            content: fact.content.clone(),
            content_hash: c_hash,
            source_document_hash: source.map(str::to_string),
            created_at,
            link_hash: l_hash.clone(),
        });
        previous = l_hash;
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::sha256_hex;
    use crate::memory::MemoryStore;
    use crate::store::ChainStore;

    fn facts(n: usize) -> Vec<ExtractedFact> {
        (0..n).map(|i| ExtractedFact::new(format!("fact {i}"))).collect()
    }

    #[test]
    fn fresh_chain_starts_at_genesis() {
        let store = Arc::new(MemoryStore::new());
        let builder = ChainBuilder::new(Arc::clone(&store));
        let links = builder.chain_batch("alice", &facts(4), None).unwrap();
        let id = builder.chain_id_for("alice").unwrap();

        assert_eq!(links.iter().map(|l| l.sequence).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(links[0].previous_hash, genesis_hash(&id));
        for pair in links.windows(2) {
            assert_eq!(pair[1].previous_hash, pair[0].link_hash);
        }
        assert!(links.iter().all(|l| l.source_agent == FACT_EXTRACTOR_AGENT && l.owner == "alice"));
    }

    #[test]
    fn second_batch_continues_from_tail() {
        let store = Arc::new(MemoryStore::new());
        let builder = ChainBuilder::new(Arc::clone(&store));
        let first = builder.chain_batch("bob", &facts(2), None).unwrap();
        let second = builder.chain_batch("bob", &facts(3), None).unwrap();
        assert_eq!(second[0].sequence, 3);
        assert_eq!(second[0].previous_hash, first[1].link_hash);
        let id = builder.chain_id_for("bob").unwrap();
        assert_eq!(store.load_chain(&id).unwrap().len(), 5);
    }

    #[test]
    fn empty_batch_touches_nothing() {
        let store = Arc::new(MemoryStore::new());
        let builder = ChainBuilder::new(Arc::clone(&store));
        assert!(builder.chain_batch("carol", &[], None).unwrap().is_empty());
        let id = builder.chain_id_for("carol").unwrap();
        assert!(store.chain_summary(&id).unwrap().is_none());
    }

    #[test]
    fn malformed_input_is_rejected_before_writing() {
        let store = Arc::new(MemoryStore::new());
        let builder = ChainBuilder::new(Arc::clone(&store));
        let bad = vec![
            ExtractedFact::new("ok"),
            ExtractedFact::new("bad").with_source_document_hash("not-a-digest"),
        ];
        assert!(matches!(
            builder.chain_batch("dave", &bad, None),
            Err(ChainError::MalformedInput(_))
        ));
        assert!(matches!(
            builder.chain_batch("", &facts(1), None),
            Err(ChainError::MalformedInput(_))
        ));
        let id = builder.chain_id_for("dave").unwrap();
        assert!(store.load_chain(&id).unwrap().is_empty());
    }

    #[test]
    fn null_content_and_source_hash() {
        let store = Arc::new(MemoryStore::new());
        let builder = ChainBuilder::new(Arc::clone(&store));
        let doc = sha256_hex(b"source.pdf");
        let batch = vec![
            ExtractedFact::default(),
            ExtractedFact::new("x").with_source_document_hash(sha256_hex(b"other")),
        ];
        let links = builder.chain_batch("erin", &batch, Some(&doc)).unwrap();
        assert_eq!(links[0].content_hash, content_hash(Some("")));
        assert_eq!(links[0].source_document_hash.as_deref(), Some(doc.as_str()));
        assert_eq!(links[1].source_document_hash, Some(sha256_hex(b"other")));
    }

    #[test]
    fn concurrent_batches_never_overlap() {
        let store = Arc::new(MemoryStore::new());
        let builder = Arc::new(ChainBuilder::new(Arc::clone(&store)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let b = Arc::clone(&builder);
                std::thread::spawn(move || b.chain_batch("frank", &facts(5), None).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let id = builder.chain_id_for("frank").unwrap();
        let links = store.load_chain(&id).unwrap();
        assert_eq!(links.len(), 40);
        for (i, link) in links.iter().enumerate() {
            assert_eq!(link.sequence, i as u64 + 1);
        }
        for pair in links.windows(2) {
            assert_eq!(pair[1].previous_hash, pair[0].link_hash);
        }
        assert!(builder.locks.is_empty());
    }

    #[test]
    fn idle_chain_locks_are_released() {
        let store = Arc::new(MemoryStore::new());
        let builder = ChainBuilder::new(Arc::clone(&store));
        for owner in ["gina", "hank", "iris", "gina"] {
            builder.chain_batch(owner, &facts(2), None).unwrap();
        }
        assert!(builder.locks.is_empty());
        let id = builder.chain_id_for("gina").unwrap();
        assert_eq!(store.load_chain(&id).unwrap().len(), 4);
    }
}
