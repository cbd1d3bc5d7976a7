//! Conflict materialization.
//!
//! Losing and contending versions are preserved as artifact records under
//! `<id>/conflicts/<tag>`; the parent id becomes (or stays) a placeholder
//! whose body enumerates the contenders in arrival order.

use crate::core::body::ReplicatedBody;
use crate::core::identity::{ArtifactId, ItemId, ReplicaTag};
use crate::core::meta::{keys, ItemMeta};

use super::error::StorageError;
use super::storage::{Etag, ExistingItem, ItemStore};

/// Result of materializing or extending a conflict: the parent's
/// post-write etag and its full contender list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedConflict {
    pub etag: Etag,
    pub artifacts: Vec<ArtifactId>,
}

/// Writes conflict state through the storage capability.
pub struct ConflictWriter<'a, B, S> {
    store: &'a S,
    history_max: usize,
    _body: std::marker::PhantomData<B>,
}

impl<'a, B: ReplicatedBody, S: ItemStore<B>> ConflictWriter<'a, B, S> {
    pub fn new(store: &'a S, history_max: usize) -> Self {
        Self {
            store,
            history_max,
            _body: std::marker::PhantomData,
        }
    }

    /// Persist one contender under its artifact id.
    ///
    /// Artifact identity is (parent, source): the write ignores etags and
    /// overwrites, so replayed contenders never accumulate. Bodiless
    /// contenders (delete conflicts) are stored with an empty body and the
    /// tombstone metadata intact.
    pub fn save_contender(
        &self,
        id: &ItemId,
        source: &ReplicaTag,
        incoming_meta: &ItemMeta,
        incoming_body: Option<&B>,
    ) -> Result<ArtifactId, StorageError> {
        let artifact = ArtifactId::new(id, source);
        let meta = self.artifact_meta(incoming_meta);
        let body = incoming_body.cloned().unwrap_or_else(B::empty);
        self.store
            .add_without_conflict(artifact.as_item_id(), None, meta, body)?;
        tracing::debug!("stored conflict contender `{artifact}`");
        Ok(artifact)
    }

    /// First conflict on this id: the current winning record becomes its
    /// own artifact under the local tag, then the parent is replaced by a
    /// placeholder listing `[existing, new]`.
    pub fn create_parent(
        &self,
        id: &ItemId,
        local: &ExistingItem<B>,
        new_artifact: &ArtifactId,
        local_tag: &ReplicaTag,
    ) -> Result<CreatedConflict, StorageError> {
        let existing_artifact = ArtifactId::new(id, local_tag);
        self.store.add_without_conflict(
            existing_artifact.as_item_id(),
            None,
            self.artifact_meta(&local.meta),
            local.body.clone(),
        )?;

        let artifacts = vec![existing_artifact, new_artifact.clone()];
        let expected = (!local.deleted).then_some(local.etag);
        let etag = self.store.add_without_conflict(
            id,
            expected,
            self.placeholder_meta(&local.meta),
            B::conflict_placeholder(&artifacts),
        )?;
        Ok(CreatedConflict { etag, artifacts })
    }

    /// The parent is already a placeholder: extend its contender list.
    /// An already-listed artifact id is not duplicated.
    pub fn append_to_existing(
        &self,
        id: &ItemId,
        local: &ExistingItem<B>,
        new_artifact: &ArtifactId,
    ) -> Result<CreatedConflict, StorageError> {
        let mut artifacts = local.body.conflict_ids().unwrap_or_default();
        if !artifacts.contains(new_artifact) {
            artifacts.push(new_artifact.clone());
        }
        let etag = self.store.add_without_conflict(
            id,
            Some(local.etag),
            local.meta.clone(),
            B::conflict_placeholder(&artifacts),
        )?;
        Ok(CreatedConflict { etag, artifacts })
    }

    /// Contender copy: the source metadata plus both conflict flags.
    fn artifact_meta(&self, source_meta: &ItemMeta) -> ItemMeta {
        let mut meta = source_meta.clone();
        meta.set_flag(keys::REPLICATION_CONFLICT, true);
        meta.set_flag(keys::REPLICATION_CONFLICT_DOC, true);
        meta.clamp_history(self.history_max);
        meta
    }

    /// Parent placeholder: keeps the displaced record's causal position so
    /// replays of that version stay suppressible, drops its delete marker,
    /// gains the conflict flag.
    fn placeholder_meta(&self, local_meta: &ItemMeta) -> ItemMeta {
        let mut meta = ItemMeta::new();
        if let Some(stamp) = local_meta.stamp() {
            meta.set_stamp(&stamp);
        }
        let history = local_meta.history();
        if !history.is_empty() {
            meta.set_history(&history);
        }
        meta.set_flag(keys::REPLICATION_CONFLICT, true);
        meta.clamp_history(self.history_max);
        meta
    }
}
