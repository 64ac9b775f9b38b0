//! Error types. Blocked messages, duplicate deliveries and broken chains are results, not errors;
//! only genuine faults end up here.

use thiserror::Error;

/// Failure reported by a [`crate::FeedStore`] or [`crate::ChainStore`] backend.
/// Transient by contract: nothing was committed and the caller may retry.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A persisted row could not be decoded (unknown enum label, bad timestamp, bad JSON).
    #[error("corrupt stored row: {0}")]
    Corrupt(String),

    /// The in-process store's lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }
}

/// Errors from building or reading a memory chain.
#[derive(Error, Debug)]
pub enum ChainError {
    /// Rejected before any hash was computed; nothing was written.
    #[error("malformed chain input: {0}")]
    MalformedInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type ChainResult<T> = Result<T, ChainError>;
