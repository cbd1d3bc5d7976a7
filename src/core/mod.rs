//! Core domain types (Layers 0-4)
//!
//! Module hierarchy follows type dependency order:
//! - version: VersionStamp, VersionHistory (Layer 0)
//! - identity: ReplicaTag, ItemId, ArtifactId (Layer 1)
//! - meta: ItemMeta, VersionView, reserved keys (Layer 2)
//! - historian: causal relation over version views (Layer 3)
//! - body: ReplicatedBody, DocumentBody, AttachmentBody (Layer 4)

pub mod body;
pub mod error;
pub mod historian;
pub mod identity;
pub mod meta;
pub mod version;

pub use body::{AttachmentBody, DocumentBody, ItemKind, ReplicatedBody, CONFLICTS_FIELD};
pub use error::{CoreError, InvalidId};
pub use historian::{relation, CausalRelation};
pub use identity::{ArtifactId, ItemId, ReplicaTag, CONFLICT_INFIX};
pub use meta::{keys, ItemMeta, VersionView};
pub use version::{VersionHistory, VersionStamp, HISTORY_MAX};
