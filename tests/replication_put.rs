//! Put-path decisions: creation, fast-forward, replay suppression, stale
//! suppression, resolver-mediated resolution, and metadata hygiene.

mod fixtures;

use std::sync::Arc;

use serde_json::json;

use fixtures::{
    delete_meta, doc, harness, harness_configured, harness_with, item, put_meta, tag, LOCAL,
};
use folio::{
    keys, ConflictResolver, DocumentBody, ItemId, ItemMeta, ReplicateError, ReplicateOutcome,
    ReplicationConfig, Resolution, ResolverChain, ResolverError, VersionView,
};

#[test]
fn put_into_empty_store_creates_without_notification() {
    let h = harness();
    let rx = h.bus.subscribe();

    let outcome = h
        .engine
        .replicate(&item("a"), put_meta("x", 1, &[]), Some(doc(1)))
        .unwrap();
    assert_eq!(outcome, ReplicateOutcome::Created);

    let record = h.store.record(&item("a")).unwrap();
    assert_eq!(record.body, doc(1));
    assert!(!record.deleted);
    assert!(rx.try_recv().is_err());
}

#[test]
fn incoming_child_fast_forwards() {
    let h = harness();
    let rx = h.bus.subscribe();
    h.engine
        .replicate(&item("a"), put_meta("x", 1, &[]), Some(doc(1)))
        .unwrap();

    let outcome = h
        .engine
        .replicate(&item("a"), put_meta("x", 2, &[("x", 1)]), Some(doc(2)))
        .unwrap();
    assert_eq!(outcome, ReplicateOutcome::FastForwarded);

    let record = h.store.record(&item("a")).unwrap();
    assert_eq!(record.body, doc(2));
    let view = VersionView::of(&record.meta);
    assert_eq!(view.stamp.unwrap().version, 2);
    assert!(rx.try_recv().is_err());
    assert_eq!(h.store.len(), 1);
}

#[test]
fn identical_replay_is_suppressed() {
    let h = harness();
    let rx = h.bus.subscribe();
    h.engine
        .replicate(&item("a"), put_meta("x", 1, &[]), Some(doc(1)))
        .unwrap();
    let before = h.store.record(&item("a")).unwrap();

    let outcome = h
        .engine
        .replicate(&item("a"), put_meta("x", 1, &[]), Some(doc(99)))
        .unwrap();
    assert_eq!(outcome, ReplicateOutcome::ReplaySuppressed);

    let after = h.store.record(&item("a")).unwrap();
    assert_eq!(after.etag, before.etag);
    assert_eq!(after.body, doc(1));
    assert!(rx.try_recv().is_err());
}

#[test]
fn replicating_twice_is_idempotent() {
    let h = harness();
    let meta = put_meta("x", 2, &[("x", 1)]);
    let first = h
        .engine
        .replicate(&item("a"), meta.clone(), Some(doc(2)))
        .unwrap();
    assert_eq!(first, ReplicateOutcome::Created);
    let snapshot = h.store.record(&item("a")).unwrap();

    let second = h.engine.replicate(&item("a"), meta, Some(doc(2))).unwrap();
    assert_eq!(second, ReplicateOutcome::ReplaySuppressed);
    assert_eq!(h.store.record(&item("a")).unwrap().etag, snapshot.etag);
}

#[test]
fn causally_dominated_incoming_is_old_news() {
    let h = harness();
    let rx = h.bus.subscribe();
    h.engine
        .replicate(&item("a"), put_meta("x", 2, &[("x", 1)]), Some(doc(2)))
        .unwrap();

    let outcome = h
        .engine
        .replicate(&item("a"), put_meta("x", 1, &[]), Some(doc(1)))
        .unwrap();
    assert_eq!(outcome, ReplicateOutcome::StaleSuppressed);

    assert_eq!(h.store.record(&item("a")).unwrap().body, doc(2));
    assert_eq!(h.store.len(), 1);
    assert!(rx.try_recv().is_err());
}

#[test]
fn ordering_of_comparable_versions_does_not_matter() {
    let newer = put_meta("x", 2, &[("x", 1)]);
    let older = put_meta("x", 1, &[]);

    let forward = harness();
    forward
        .engine
        .replicate(&item("a"), older.clone(), Some(doc(1)))
        .unwrap();
    forward
        .engine
        .replicate(&item("a"), newer.clone(), Some(doc(2)))
        .unwrap();

    let reverse = harness();
    reverse
        .engine
        .replicate(&item("a"), newer, Some(doc(2)))
        .unwrap();
    reverse
        .engine
        .replicate(&item("a"), older, Some(doc(1)))
        .unwrap();

    let a = forward.store.record(&item("a")).unwrap();
    let b = reverse.store.record(&item("a")).unwrap();
    assert_eq!(a.body, b.body);
    assert_eq!(a.meta.stamp(), b.meta.stamp());
}

#[test]
fn resurrects_local_tombstone_on_descending_put() {
    let h = harness();
    h.engine
        .replicate(&item("a"), put_meta("x", 1, &[]), Some(doc(1)))
        .unwrap();
    h.engine
        .replicate(&item("a"), delete_meta("x", 2, &[("x", 1)]), None)
        .unwrap();
    assert!(h.store.record(&item("a")).unwrap().deleted);

    let outcome = h
        .engine
        .replicate(
            &item("a"),
            put_meta("x", 3, &[("x", 1), ("x", 2)]),
            Some(doc(3)),
        )
        .unwrap();
    assert_eq!(outcome, ReplicateOutcome::FastForwarded);
    let record = h.store.record(&item("a")).unwrap();
    assert!(!record.deleted);
    assert_eq!(record.body, doc(3));
}

#[test]
fn missing_version_on_existing_item_is_rejected() {
    let h = harness();
    h.engine
        .replicate(&item("a"), put_meta("x", 1, &[]), Some(doc(1)))
        .unwrap();
    let before = h.store.record(&item("a")).unwrap();

    let mut malformed = ItemMeta::new();
    malformed.insert(keys::REPLICATION_SOURCE, json!("y"));
    let err = h
        .engine
        .replicate(&item("a"), malformed, Some(doc(2)))
        .unwrap_err();
    assert!(matches!(
        err,
        ReplicateError::MalformedMetadata { key, .. } if key == keys::REPLICATION_VERSION
    ));
    assert_eq!(h.store.record(&item("a")).unwrap().etag, before.etag);
}

#[test]
fn oversized_incoming_history_is_clamped() {
    let h = harness_configured(
        ResolverChain::empty(),
        ReplicationConfig::new(tag(LOCAL)).with_history_max(3),
    );
    let ancestry: Vec<(&str, u64)> =
        vec![("x", 1), ("x", 2), ("x", 3), ("x", 4), ("x", 5)];
    h.engine
        .replicate(&item("a"), put_meta("x", 6, &ancestry), Some(doc(6)))
        .unwrap();

    let history = h.store.record(&item("a")).unwrap().meta.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history.entries()[0].version, 3);
    assert_eq!(history.entries()[2].version, 5);
}

/// Takes the incoming side whenever the item is marked mergeable.
struct PreferIncoming;

impl ConflictResolver<DocumentBody> for PreferIncoming {
    fn name(&self) -> &str {
        "prefer-incoming"
    }

    fn try_resolve(
        &self,
        _id: &ItemId,
        incoming_meta: &ItemMeta,
        incoming_body: Option<&DocumentBody>,
        _existing: &folio::ExistingItem<DocumentBody>,
    ) -> Result<Option<Resolution<DocumentBody>>, ResolverError> {
        let Some(body) = incoming_body else {
            return Ok(None);
        };
        Ok(Some(Resolution::put(incoming_meta.clone(), body.clone())))
    }
}

#[test]
fn accepted_resolution_writes_and_reruns_cleanup_trigger() {
    let h = harness_with(ResolverChain::new(vec![Arc::new(PreferIncoming)]));
    let rx = h.bus.subscribe();
    h.engine
        .replicate(&item("a"), put_meta("x", 1, &[]), Some(doc(1)))
        .unwrap();

    // Concurrent with local state: same id, unrelated ancestry.
    let outcome = h
        .engine
        .replicate(&item("a"), put_meta("y", 1, &[]), Some(doc(2)))
        .unwrap();
    assert_eq!(
        outcome,
        ReplicateOutcome::Resolved {
            resolver: "prefer-incoming".into()
        }
    );

    let record = h.store.record(&item("a")).unwrap();
    assert_eq!(record.body, doc(2));
    assert!(!VersionView::of(&record.meta).conflicted);
    assert_eq!(h.trigger.calls(), 1);
    assert!(rx.try_recv().is_err());
    // No artifacts were materialized.
    assert_eq!(h.store.item_ids(), vec![item("a")]);
}

/// Resolves every conflict by requesting deletion.
struct ResolveToDelete;

impl ConflictResolver<DocumentBody> for ResolveToDelete {
    fn name(&self) -> &str {
        "resolve-to-delete"
    }

    fn try_resolve(
        &self,
        _id: &ItemId,
        incoming_meta: &ItemMeta,
        _incoming_body: Option<&DocumentBody>,
        _existing: &folio::ExistingItem<DocumentBody>,
    ) -> Result<Option<Resolution<DocumentBody>>, ResolverError> {
        Ok(Some(Resolution::delete(incoming_meta.clone())))
    }
}

#[test]
fn delete_resolution_tombstones_without_conflict() {
    let h = harness_with(ResolverChain::new(vec![Arc::new(ResolveToDelete)]));
    let rx = h.bus.subscribe();
    h.engine
        .replicate(&item("a"), put_meta("x", 1, &[]), Some(doc(1)))
        .unwrap();

    let outcome = h
        .engine
        .replicate(&item("a"), put_meta("y", 1, &[]), Some(doc(2)))
        .unwrap();
    assert_eq!(
        outcome,
        ReplicateOutcome::ResolvedAsDelete {
            resolver: "resolve-to-delete".into()
        }
    );

    let record = h.store.record(&item("a")).unwrap();
    assert!(record.deleted);
    assert!(record.meta.flag(keys::RESOLVER_DELETE_MARKER));
    // No artifacts, no notification.
    assert_eq!(h.store.item_ids(), vec![item("a")]);
    assert!(rx.try_recv().is_err());
    assert_eq!(h.trigger.calls(), 0);
}

#[test]
fn engine_refuses_to_start_without_cleanup_trigger() {
    let store = Arc::new(folio::MemoryStore::<DocumentBody>::new());
    let bus = Arc::new(folio::ConflictBus::new());
    let err = folio::ReplicationBehavior::new(
        store,
        ReplicationConfig::new(tag(LOCAL)),
        ResolverChain::empty(),
        None,
        bus,
    )
    .err()
    .unwrap();
    assert!(matches!(err, ReplicateError::MissingCleanupTrigger));
}
