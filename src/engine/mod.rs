//! Replication ingestion engine
//!
//! - storage: the per-kind capability the engine consumes
//! - conflict: artifact + placeholder materialization
//! - resolver: pluggable automatic resolution
//! - trigger: conflict-cleanup re-entry on resolver-mediated puts
//! - notify: conflict notifications and the fan-out bus
//! - behavior: the decision machine itself

pub mod behavior;
pub mod config;
pub mod conflict;
pub mod error;
pub mod notify;
pub mod resolver;
pub mod storage;
pub mod trigger;

pub use behavior::{CancelToken, ReplicateOutcome, ReplicationBehavior};
pub use config::{ReplicationConfig, DEFAULT_WRITE_RETRIES};
pub use conflict::{ConflictWriter, CreatedConflict};
pub use error::{ReplicateError, ResolverError, StorageError};
pub use notify::{ConflictBus, ConflictNotification, ReplicationOp};
pub use resolver::{ConflictResolver, Resolution, ResolverChain};
pub use storage::{CommitHook, Etag, ExistingItem, ItemStore};
pub use trigger::{ConflictCleanupTrigger, TriggerBridge};
