//! vigil-core: redaction, audit and tamper-evident memory for an AI-conversation feed.
//!
//! Inbound messages pass a five-layer redaction pipeline before anything reaches the public feed;
//! every decision leaves a hash-only audit record. Facts extracted from conversations are chained
//! per owner with SHA-256 links so stored history can be verified later. Storage is behind the
//! [`FeedStore`] and [`ChainStore`] traits; `vigil-ledger` provides the SQLite backend.

mod config;
mod error;
mod memory;
mod publication;
mod shared;
mod store;
pub mod chain;
pub mod hashing;
pub mod security;

// Records
pub use shared::{
    AuditDecision, AuditRecord, ChainStatus, ChainSummary, ChainTail, ExtractedFact,
    InboundMessage, MemoryChainLink, MessageRole, PublishedMessage, BLOCKED_SENTINEL,
};

// Errors + persistence seams
pub use error::{ChainError, ChainResult, StoreError, StoreResult};
pub use memory::MemoryStore;
pub use store::{ChainStore, FeedStore, InsertOutcome, LinkPlanner};

// Redaction + publication
pub use publication::{preview, PublicationOutcome, Publisher, DEFAULT_BROADCAST_CAPACITY};
pub use security::{
    AuditRecorder, Layer, PatternLibrary, RedactionEngine, RedactionOutcome, RedactionReport,
    SAFE_ALIAS,
};

// Memory chain
pub use chain::{
    chain_id, genesis_hash, link_hash, ChainBuilder, ChainVerification, ChainVerifier,
    FACT_EXTRACTOR_AGENT,
};

pub use config::VigilConfig;
