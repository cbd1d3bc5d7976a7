//! Engine capability errors.
//!
//! Storage failures carry their retry semantics explicitly so transports
//! can decide mechanically; resolver failures are bounded (they are
//! treated as declines, never fatal to the item).

use thiserror::Error;

use crate::core::identity::ItemId;
use crate::error::{Effect, Transience};

use super::storage::Etag;

/// Failures surfaced by an [`ItemStore`](super::storage::ItemStore).
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum StorageError {
    /// Optimistic concurrency check failed: the record changed between
    /// read and write.
    #[error("optimistic concurrency check failed on `{id}`")]
    Conflict {
        id: ItemId,
        expected: Option<Etag>,
        actual: Option<Etag>,
    },
    /// Backend unreachable or refusing work.
    #[error("storage unavailable: {reason}")]
    Unavailable { reason: String },
}

impl StorageError {
    pub fn transience(&self) -> Transience {
        match self {
            StorageError::Conflict { .. } => Transience::Retryable,
            StorageError::Unavailable { .. } => Transience::Retryable,
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            StorageError::Conflict { .. } => Effect::None,
            StorageError::Unavailable { .. } => Effect::Unknown,
        }
    }
}

/// A resolver failed while computing. The chain logs and declines.
#[derive(Debug, Error, Clone)]
#[error("resolver failed: {reason}")]
pub struct ResolverError {
    pub reason: String,
}

impl ResolverError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Failures surfaced by one `replicate` call.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum ReplicateError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The decision required a causal comparison but the incoming
    /// metadata lacks `{key}`. The item is rejected; the peer resends.
    #[error("replicated item `{id}` rejected: metadata missing `{key}`")]
    MalformedMetadata { id: ItemId, key: &'static str },

    /// Replication cannot start without the conflict-cleanup trigger.
    #[error("replication requires a registered conflict-cleanup trigger")]
    MissingCleanupTrigger,

    /// The transport withdrew this invocation between decision steps.
    #[error("replication of `{id}` cancelled")]
    Cancelled { id: ItemId },
}

impl ReplicateError {
    pub fn transience(&self) -> Transience {
        match self {
            ReplicateError::Storage(e) => e.transience(),
            ReplicateError::MalformedMetadata { .. } => Transience::Permanent,
            ReplicateError::MissingCleanupTrigger => Transience::Permanent,
            ReplicateError::Cancelled { .. } => Transience::Retryable,
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            ReplicateError::Storage(e) => e.effect(),
            // Cancellation is honored before write steps only.
            ReplicateError::MalformedMetadata { .. } => Effect::None,
            ReplicateError::MissingCleanupTrigger => Effect::None,
            ReplicateError::Cancelled { .. } => Effect::None,
        }
    }
}
