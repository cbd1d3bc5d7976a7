#![forbid(unsafe_code)]

//! folio - replication ingestion core for a multi-master replicated
//! document store.
//!
//! The entry point is [`ReplicationBehavior::replicate`]: called once per
//! incoming replicated item, it fast-forwards, suppresses a replay,
//! applies a resolver's resolution, or materializes a conflict preserving
//! every contender.

pub mod core;
pub mod engine;
pub mod error;
pub mod store;

pub use error::{Effect, Error, Transience};
pub type Result<T> = std::result::Result<T, Error>;

// Re-export the working set at crate root for convenience
pub use crate::core::{
    keys, relation, ArtifactId, AttachmentBody, CausalRelation, CoreError, DocumentBody,
    InvalidId, ItemId, ItemKind, ItemMeta, ReplicaTag, ReplicatedBody, VersionHistory,
    VersionStamp, VersionView, CONFLICTS_FIELD, CONFLICT_INFIX, HISTORY_MAX,
};
pub use crate::engine::{
    CancelToken, CommitHook, ConflictBus, ConflictCleanupTrigger, ConflictNotification,
    ConflictResolver, CreatedConflict, Etag, ExistingItem, ItemStore, ReplicateError,
    ReplicateOutcome, ReplicationBehavior, ReplicationConfig, ReplicationOp, Resolution,
    ResolverChain, ResolverError, StorageError, TriggerBridge, DEFAULT_WRITE_RETRIES,
};
pub use crate::store::MemoryStore;
