//! Storage capability consumed by the engine.
//!
//! One `ItemStore` per item kind; all operations are synchronous and run
//! inside whatever transaction the backend scopes around a `replicate`
//! call. Writes on this path bypass normal triggers by contract.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::body::ReplicatedBody;
use crate::core::identity::ItemId;
use crate::core::meta::ItemMeta;

use super::error::StorageError;

/// Opaque monotonic version token issued by the backend per write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Etag(u64);

impl Etag {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Local projection of one id: live record or retained tombstone.
///
/// Tombstones carry `B::empty()` bodies; their metadata keeps the history
/// that future merges need.
#[derive(Clone, Debug)]
pub struct ExistingItem<B> {
    pub meta: ItemMeta,
    pub body: B,
    pub etag: Etag,
    pub deleted: bool,
}

/// Deferred action scheduled through [`ItemStore::defer`].
pub type CommitHook = Box<dyn FnOnce() + Send>;

/// Per-item-kind storage operations.
pub trait ItemStore<B: ReplicatedBody>: Send + Sync {
    /// None iff no record - neither live nor tombstone - exists.
    fn try_get_existing(&self, id: &ItemId) -> Result<Option<ExistingItem<B>>, StorageError>;

    /// Upsert. When `expected` is Some, the write only succeeds against a
    /// record currently at that etag; None overwrites unconditionally.
    fn add_without_conflict(
        &self,
        id: &ItemId,
        expected: Option<Etag>,
        meta: ItemMeta,
        body: B,
    ) -> Result<Etag, StorageError>;

    /// Hard-delete. `expected` enforces optimistic concurrency; deleting a
    /// missing record without an expectation is a no-op.
    fn delete_item(&self, id: &ItemId, expected: Option<Etag>) -> Result<(), StorageError>;

    /// Write a tombstone preserving `meta`.
    fn mark_as_deleted(&self, id: &ItemId, meta: ItemMeta) -> Result<Etag, StorageError>;

    /// Run `hook` when the active transaction commits, or immediately when
    /// the backend has no transaction scoped around this call.
    fn defer(&self, hook: CommitHook) {
        hook();
    }
}
