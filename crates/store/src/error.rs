use thiserror::Error;

/// Store operation error.
///
/// These are **infrastructure errors** (storage, concurrency, timeouts) as
/// opposed to domain errors (validation, invariants).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Conditional update lost a race: the row's version moved under us.
    /// The caller re-reads and retries within its budget.
    #[error("version conflict: {0}")]
    Conflict(String),

    /// An append hit an existing row with the same deduplication key.
    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// The store call did not complete in time. Treated identically to a
    /// write failure by the update engine (triggers rollback).
    #[error("store timeout: {0}")]
    Timeout(String),

    /// A referenced row does not exist.
    #[error("row not found: {0}")]
    NotFound(String),

    /// Serialization of a stored document failed.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Anything else the backend reports (connection failures, constraint
    /// violations outside the mapped set).
    #[error("store backend error: {0}")]
    Backend(String),
}
