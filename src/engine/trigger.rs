//! Conflict-cleanup trigger re-entry.
//!
//! The replication write path runs with normal triggers disabled. A
//! resolver-mediated put is a conflict resolution, so the one trigger that
//! must still observe it - conflict cleanup, e.g. index repair - is
//! re-invoked manually here. Opaque byte bodies are skipped; triggers only
//! understand structured payloads.

use std::sync::Arc;

use crate::core::body::ReplicatedBody;
use crate::core::identity::ItemId;
use crate::core::meta::ItemMeta;

use super::storage::Etag;

/// The registered "remove conflict on put" trigger.
pub trait ConflictCleanupTrigger<B: ReplicatedBody>: Send + Sync {
    fn on_put(&self, id: &ItemId, body: &B, meta: &ItemMeta, etag: Option<Etag>);
}

/// Engine-side handle; read-only after startup.
#[derive(Clone)]
pub struct TriggerBridge<B: ReplicatedBody> {
    trigger: Arc<dyn ConflictCleanupTrigger<B>>,
}

impl<B: ReplicatedBody> TriggerBridge<B> {
    pub fn new(trigger: Arc<dyn ConflictCleanupTrigger<B>>) -> Self {
        Self { trigger }
    }

    /// Invoked before the parent write of a resolver-mediated put.
    pub fn on_resolved_put(&self, id: &ItemId, meta: &ItemMeta, body: &B) {
        if body.as_json().is_none() {
            return;
        }
        self.trigger.on_put(id, body, meta, None);
    }
}
