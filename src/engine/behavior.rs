//! The per-item replication decision machine.
//!
//! `replicate` is the linearization point where a peer's write meets local
//! state: fast-forward, suppress, resolve, or materialize a conflict. Every
//! decision not to write is either a suppressed replay or a deliberate
//! conflict materialization - incoming data is never silently dropped.
//!
//! Per-id serialization is optimistic: writes carry the etag observed at
//! the initial read, and a concurrency miss restarts the whole decision
//! with a fresh read, up to the configured retry budget.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::body::ReplicatedBody;
use crate::core::historian::{relation, CausalRelation};
use crate::core::identity::{ArtifactId, ItemId};
use crate::core::meta::{ItemMeta, VersionView};
use crate::core::version::VersionStamp;

use super::config::ReplicationConfig;
use super::conflict::{ConflictWriter, CreatedConflict};
use super::error::{ReplicateError, StorageError};
use super::notify::{ConflictBus, ConflictNotification, ReplicationOp};
use super::resolver::{Resolution, ResolverChain};
use super::storage::{ExistingItem, ItemStore};
use super::trigger::{ConflictCleanupTrigger, TriggerBridge};

/// Cooperative cancellation, honored between decision steps only; a
/// started storage write always runs to completion.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What one `replicate` call did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplicateOutcome {
    /// No local record existed; the incoming item was stored as-is.
    Created,
    /// Incoming causally dominated local and replaced it.
    FastForwarded,
    /// Duplicate replay; no writes, no notification.
    ReplaySuppressed,
    /// Incoming is causally dominated by local state: old news.
    StaleSuppressed,
    /// Delete of a non-existent id.
    DeleteNoop,
    /// Incoming delete dominated the live local record.
    Deleted,
    /// Delete over local tombstone: ancestries were unioned.
    HistoriesMerged,
    /// A resolver accepted and its put was applied.
    Resolved { resolver: String },
    /// A resolver accepted and requested deletion.
    ResolvedAsDelete { resolver: String },
    /// First conflict on this id was materialized.
    ConflictCreated { artifacts: Vec<ArtifactId> },
    /// A contender joined an existing conflict.
    ConflictAppended { artifacts: Vec<ArtifactId> },
}

/// The decision engine for one item kind.
///
/// Shared state is the storage backend (serialization delegated to it via
/// etags), the notification bus (thread-safe), and the resolver chain and
/// trigger (read-only after startup). Concurrent calls are safe; calls
/// targeting the same id serialize through the optimistic restart loop.
pub struct ReplicationBehavior<B: ReplicatedBody, S: ItemStore<B>> {
    store: Arc<S>,
    config: ReplicationConfig,
    resolvers: ResolverChain<B>,
    trigger: TriggerBridge<B>,
    bus: Arc<ConflictBus>,
}

impl<B: ReplicatedBody, S: ItemStore<B>> ReplicationBehavior<B, S> {
    /// Replication cannot run without the conflict-cleanup trigger; a
    /// missing registration is a configuration error at startup, never a
    /// per-item failure.
    pub fn new(
        store: Arc<S>,
        config: ReplicationConfig,
        resolvers: ResolverChain<B>,
        trigger: Option<Arc<dyn ConflictCleanupTrigger<B>>>,
        bus: Arc<ConflictBus>,
    ) -> Result<Self, ReplicateError> {
        let Some(trigger) = trigger else {
            return Err(ReplicateError::MissingCleanupTrigger);
        };
        Ok(Self {
            store,
            config,
            resolvers,
            trigger: TriggerBridge::new(trigger),
            bus,
        })
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<ConflictBus> {
        &self.bus
    }

    /// Ingest one replicated item from a peer.
    pub fn replicate(
        &self,
        id: &ItemId,
        meta: ItemMeta,
        body: Option<B>,
    ) -> Result<ReplicateOutcome, ReplicateError> {
        self.replicate_cancellable(&CancelToken::new(), id, meta, body)
    }

    /// `replicate` with the transport's cancellation token.
    pub fn replicate_cancellable(
        &self,
        cancel: &CancelToken,
        id: &ItemId,
        meta: ItemMeta,
        body: Option<B>,
    ) -> Result<ReplicateOutcome, ReplicateError> {
        let mut attempt: u32 = 0;
        loop {
            match self.replicate_once(cancel, id, &meta, body.as_ref()) {
                Err(ReplicateError::Storage(StorageError::Conflict { .. }))
                    if attempt < self.config.max_write_retries =>
                {
                    attempt += 1;
                    tracing::debug!(
                        "optimistic miss on `{id}`, restarting decision (attempt {attempt})"
                    );
                }
                other => return other,
            }
        }
    }

    fn replicate_once(
        &self,
        cancel: &CancelToken,
        id: &ItemId,
        meta: &ItemMeta,
        body: Option<&B>,
    ) -> Result<ReplicateOutcome, ReplicateError> {
        let incoming = VersionView::of(meta);
        if incoming.deleted {
            self.replicate_delete(cancel, id, meta, &incoming)
        } else {
            self.replicate_put(cancel, id, meta, &incoming, body)
        }
    }

    fn replicate_put(
        &self,
        cancel: &CancelToken,
        id: &ItemId,
        meta: &ItemMeta,
        incoming: &VersionView,
        body: Option<&B>,
    ) -> Result<ReplicateOutcome, ReplicateError> {
        let Some(local) = self.store.try_get_existing(id)? else {
            let stored = self.clamped(meta);
            self.store.add_without_conflict(
                id,
                None,
                stored,
                body.cloned().unwrap_or_else(B::empty),
            )?;
            tracing::debug!("created `{id}` from replication");
            return Ok(ReplicateOutcome::Created);
        };

        let stamp = self.require_stamp(id, meta, incoming)?;
        let local_view = VersionView::of(&local.meta);
        let rel = relation(incoming, &local_view);
        if rel == CausalRelation::IdenticalReplay {
            return Ok(ReplicateOutcome::ReplaySuppressed);
        }
        let parent_conflicted = local_view.conflicted;
        if parent_conflicted && self.is_known_contender(id, &stamp, &local)? {
            return Ok(ReplicateOutcome::ReplaySuppressed);
        }
        if rel == CausalRelation::LocalDescendsIncoming {
            tracing::debug!("suppressing stale replicated version of `{id}`");
            return Ok(ReplicateOutcome::StaleSuppressed);
        }
        self.ensure_live(cancel, id)?;

        if !parent_conflicted && rel == CausalRelation::IncomingDescendsLocal {
            let expected = (!local.deleted).then_some(local.etag);
            let stored = self.clamped(meta);
            self.store.add_without_conflict(
                id,
                expected,
                stored,
                body.cloned().unwrap_or_else(B::empty),
            )?;
            tracing::debug!("fast-forwarded `{id}` to {}/{}", stamp.source, stamp.version);
            return Ok(ReplicateOutcome::FastForwarded);
        }

        self.ensure_live(cancel, id)?;
        if let Some((resolver, resolution)) = self.resolvers.resolve(id, meta, body, &local) {
            return self.apply_resolution(id, &local, resolver, resolution);
        }

        self.ensure_live(cancel, id)?;
        self.materialize_conflict(id, &stamp, meta, body, &local, parent_conflicted, ReplicationOp::Put)
    }

    fn replicate_delete(
        &self,
        cancel: &CancelToken,
        id: &ItemId,
        meta: &ItemMeta,
        incoming: &VersionView,
    ) -> Result<ReplicateOutcome, ReplicateError> {
        let Some(local) = self.store.try_get_existing(id)? else {
            return Ok(ReplicateOutcome::DeleteNoop);
        };

        let stamp = self.require_stamp(id, meta, incoming)?;
        let local_view = VersionView::of(&local.meta);
        let rel = relation(incoming, &local_view);
        if rel == CausalRelation::IdenticalReplay {
            return Ok(ReplicateOutcome::ReplaySuppressed);
        }
        if local_view.conflicted && self.is_known_contender(id, &stamp, &local)? {
            return Ok(ReplicateOutcome::ReplaySuppressed);
        }
        self.ensure_live(cancel, id)?;

        if local.deleted {
            // Both sides deleted independently: union the ancestries so a
            // future write descending either side fast-forwards cleanly.
            let mut merged = local_view.history.clone();
            merged.merge_from(&incoming.history, self.config.history_max);
            let mut stored = meta.clone();
            stored.set_history(&merged);
            self.store.mark_as_deleted(id, stored)?;
            tracing::debug!("merged tombstone ancestry for `{id}`");
            return Ok(ReplicateOutcome::HistoriesMerged);
        }

        if rel == CausalRelation::LocalDescendsIncoming {
            tracing::debug!("suppressing stale replicated delete of `{id}`");
            return Ok(ReplicateOutcome::StaleSuppressed);
        }

        if rel == CausalRelation::IncomingDescendsLocal {
            self.store.delete_item(id, Some(local.etag))?;
            self.store.mark_as_deleted(id, self.clamped(meta))?;
            tracing::debug!("fast-forward delete of `{id}`");
            return Ok(ReplicateOutcome::Deleted);
        }

        self.ensure_live(cancel, id)?;
        if let Some((resolver, resolution)) = self.resolvers.resolve(id, meta, None, &local) {
            return self.apply_delete_resolution(id, &local, resolver, resolution);
        }

        self.ensure_live(cancel, id)?;
        self.materialize_conflict(
            id,
            &stamp,
            meta,
            None,
            &local,
            local_view.conflicted,
            ReplicationOp::Delete,
        )
    }

    /// Put-path resolution: a delete-marked resolution tombstones the id;
    /// otherwise the resolved value replaces the parent, with the cleanup
    /// trigger re-run over structured bodies first.
    fn apply_resolution(
        &self,
        id: &ItemId,
        local: &ExistingItem<B>,
        resolver: String,
        resolution: Resolution<B>,
    ) -> Result<ReplicateOutcome, ReplicateError> {
        tracing::debug!("resolver `{resolver}` accepted `{id}`");
        if resolution.is_delete() {
            self.store.delete_item(id, None)?;
            self.store
                .mark_as_deleted(id, self.clamped(&resolution.meta))?;
            return Ok(ReplicateOutcome::ResolvedAsDelete { resolver });
        }

        let expected = (!local.deleted).then_some(local.etag);
        let body = resolution.body.unwrap_or_else(B::empty);
        let stored = self.clamped(&resolution.meta);
        self.trigger.on_resolved_put(id, &stored, &body);
        self.store.add_without_conflict(id, expected, stored, body)?;
        Ok(ReplicateOutcome::Resolved { resolver })
    }

    /// Delete-path resolution: same outcomes, but a put-resolution writes
    /// against the observed etag unconditionally and bypasses the trigger
    /// (the replicated operation was a delete; there is no incoming put to
    /// clean up after).
    fn apply_delete_resolution(
        &self,
        id: &ItemId,
        local: &ExistingItem<B>,
        resolver: String,
        resolution: Resolution<B>,
    ) -> Result<ReplicateOutcome, ReplicateError> {
        tracing::debug!("resolver `{resolver}` accepted delete of `{id}`");
        if resolution.is_delete() {
            self.store.delete_item(id, None)?;
            self.store
                .mark_as_deleted(id, self.clamped(&resolution.meta))?;
            return Ok(ReplicateOutcome::ResolvedAsDelete { resolver });
        }

        let body = resolution.body.unwrap_or_else(B::empty);
        let stored = self.clamped(&resolution.meta);
        self.store
            .add_without_conflict(id, Some(local.etag), stored, body)?;
        Ok(ReplicateOutcome::Resolved { resolver })
    }

    #[allow(clippy::too_many_arguments)]
    fn materialize_conflict(
        &self,
        id: &ItemId,
        stamp: &VersionStamp,
        meta: &ItemMeta,
        body: Option<&B>,
        local: &ExistingItem<B>,
        parent_conflicted: bool,
        op: ReplicationOp,
    ) -> Result<ReplicateOutcome, ReplicateError> {
        let writer = ConflictWriter::new(self.store.as_ref(), self.config.history_max);
        let new_artifact = writer.save_contender(id, &stamp.source, meta, body)?;
        let (created, appended) = if parent_conflicted {
            (writer.append_to_existing(id, local, &new_artifact)?, true)
        } else {
            (
                writer.create_parent(id, local, &new_artifact, &self.config.local_tag)?,
                false,
            )
        };
        tracing::debug!(
            "conflict on `{id}`: {} contenders ({op:?})",
            created.artifacts.len()
        );
        self.emit(id, &created, op);
        let artifacts = created.artifacts;
        Ok(if appended {
            ReplicateOutcome::ConflictAppended { artifacts }
        } else {
            ReplicateOutcome::ConflictCreated { artifacts }
        })
    }

    /// Publication is deferred through the storage capability so the
    /// notification lands after the materializing transaction commits.
    fn emit(&self, id: &ItemId, created: &CreatedConflict, op: ReplicationOp) {
        let notification = ConflictNotification {
            id: id.clone(),
            etag: created.etag,
            kind: B::KIND,
            op,
            conflicts: created.artifacts.clone(),
        };
        let bus = Arc::clone(&self.bus);
        self.store.defer(Box::new(move || bus.publish(notification)));
    }

    /// A conflicted parent already holding this exact version as an
    /// enumerated artifact makes the incoming item a replayed contender.
    ///
    /// Both conditions matter: an artifact can exist without being listed
    /// when a prior attempt lost its optimistic race after the artifact
    /// write, and such a contender must still be appended.
    fn is_known_contender(
        &self,
        id: &ItemId,
        stamp: &VersionStamp,
        local: &ExistingItem<B>,
    ) -> Result<bool, ReplicateError> {
        let artifact = ArtifactId::new(id, &stamp.source);
        let listed = local
            .body
            .conflict_ids()
            .is_some_and(|ids| ids.contains(&artifact));
        if !listed {
            return Ok(false);
        }
        let Some(existing) = self.store.try_get_existing(artifact.as_item_id())? else {
            return Ok(false);
        };
        Ok(existing.meta.stamp().as_ref() == Some(stamp))
    }

    fn require_stamp(
        &self,
        id: &ItemId,
        meta: &ItemMeta,
        incoming: &VersionView,
    ) -> Result<VersionStamp, ReplicateError> {
        if let Some(stamp) = incoming.stamp.clone() {
            return Ok(stamp);
        }
        let key = meta
            .missing_stamp_key()
            .unwrap_or(crate::core::meta::keys::REPLICATION_VERSION);
        tracing::warn!("rejecting replicated item `{id}`: metadata missing `{key}`");
        Err(ReplicateError::MalformedMetadata {
            id: id.clone(),
            key,
        })
    }

    fn ensure_live(&self, cancel: &CancelToken, id: &ItemId) -> Result<(), ReplicateError> {
        if cancel.is_cancelled() {
            return Err(ReplicateError::Cancelled { id: id.clone() });
        }
        Ok(())
    }

    fn clamped(&self, meta: &ItemMeta) -> ItemMeta {
        let mut meta = meta.clone();
        meta.clamp_history(self.config.history_max);
        meta
    }
}
