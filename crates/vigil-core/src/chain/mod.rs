//! Memory hash-chain: every fact an agent extracts for an owner becomes one immutable link whose
//! hash covers its predecessor's hash, so rewriting any stored link is detectable.
//!
//! | Value | Definition |
//! |-------|------------|
//! | chain id | `memory-chain/<agent>/<owner>` |
//! | genesis hash | `sha256(chain_id)` |
//! | content hash | `sha256(content or "")` |
//! | link hash | `sha256(sequence ++ previous_hash ++ chain_id ++ content_hash ++ source_doc_hash_or_"" ++ timestamp)` |
//!
//! Field order in the link hash is fixed; the timestamp is the canonical microsecond RFC 3339
//! form from [`crate::hashing::canonical_timestamp`].

pub mod builder;
pub mod verifier;

pub use builder::ChainBuilder;
pub use verifier::{ChainVerification, ChainVerifier};

use crate::error::{ChainError, ChainResult};
use crate::hashing::{canonical_timestamp, sha256_hex};
use chrono::{DateTime, Utc};

/// Agent label of the fact-extraction collaborator.
pub const FACT_EXTRACTOR_AGENT: &str = "fact-extractor";

const CHAIN_ID_PREFIX: &str = "memory-chain";

/// Deterministic chain id for an (owner, agent) pair.
///
/// Agents may not contain `/` and owners may not be blank, which makes the mapping injective:
/// distinct pairs never share a chain.
pub fn chain_id(owner: &str, agent: &str) -> ChainResult<String> {
    validate_agent(agent)?;
    if owner.trim().is_empty() {
        return Err(ChainError::MalformedInput("owner must not be blank".to_string()));
    }
    Ok(format!("{CHAIN_ID_PREFIX}/{agent}/{owner}"))
}

pub(crate) fn validate_agent(agent: &str) -> ChainResult<()> {
    if agent.trim().is_empty() || agent.contains('/') {
        return Err(ChainError::MalformedInput(format!(
            "agent label {agent:?} must be non-blank and contain no '/'"
        )));
    }
    Ok(())
}

/// Required `previous_hash` of a chain's first link.
pub fn genesis_hash(chain_id: &str) -> String {
    sha256_hex(chain_id.as_bytes())
}

/// Tamper-evidence digest of one link.
pub fn link_hash(
    sequence: u64,
    previous_hash: &str,
    chain_id: &str,
    content_hash: &str,
    source_document_hash: Option<&str>,
    created_at: &DateTime<Utc>,
) -> String {
    let input = format!(
        "{sequence}{previous_hash}{chain_id}{content_hash}{}{}",
        source_document_hash.unwrap_or(""),
        canonical_timestamp(created_at)
    );
    sha256_hex(input.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::is_digest;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn genesis_hashes_are_distinct_per_pair() {
        let mut seen = HashSet::new();
        for i in 0..1000 {
            let owner = format!("owner-{}", i / 10);
            let agent = format!("agent-{}", i % 10);
            let id = chain_id(&owner, &agent).unwrap();
            let genesis = genesis_hash(&id);
            assert!(is_digest(&genesis));
            assert_eq!(genesis, genesis_hash(&id));
            seen.insert(genesis);
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn chain_id_rejects_ambiguous_input() {
        assert!(matches!(
            chain_id("  ", FACT_EXTRACTOR_AGENT),
            Err(ChainError::MalformedInput(_))
        ));
        assert!(chain_id("alice", "a/b").is_err());
        assert!(chain_id("alice", "").is_err());
        assert_eq!(
            chain_id("alice", FACT_EXTRACTOR_AGENT).unwrap(),
            "memory-chain/fact-extractor/alice"
        );
    }

    #[test]
    fn every_field_changes_the_link_hash() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let prev = genesis_hash("c");
        let content = sha256_hex(b"fact");
        let base = link_hash(1, &prev, "c", &content, None, &ts);
        assert!(is_digest(&base));
        assert_eq!(base, link_hash(1, &prev, "c", &content, None, &ts));
        assert_ne!(base, link_hash(2, &prev, "c", &content, None, &ts));
        assert_ne!(base, link_hash(1, &content, "c", &content, None, &ts));
        assert_ne!(base, link_hash(1, &prev, "d", &content, None, &ts));
        assert_ne!(base, link_hash(1, &prev, "c", &prev, None, &ts));
        assert_ne!(base, link_hash(1, &prev, "c", &content, Some(&prev), &ts));
        let later = ts + chrono::Duration::microseconds(1);
        assert_ne!(base, link_hash(1, &prev, "c", &content, None, &later));
    }
}
