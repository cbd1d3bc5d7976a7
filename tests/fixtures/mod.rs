//! Shared builders for the replication integration suites.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;

use folio::{
    keys, ArtifactId, ConflictBus, ConflictCleanupTrigger, DocumentBody, Etag, ItemId, ItemMeta,
    MemoryStore, ReplicaTag, ReplicatedBody, ReplicationBehavior, ReplicationConfig,
    ResolverChain, VersionHistory, VersionStamp,
};

/// This store's tag in every suite.
pub const LOCAL: &str = "local";

/// Records invocations of the conflict-cleanup trigger.
#[derive(Default)]
pub struct CountingTrigger {
    calls: AtomicUsize,
}

impl CountingTrigger {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<B: ReplicatedBody> ConflictCleanupTrigger<B> for CountingTrigger {
    fn on_put(&self, _id: &ItemId, _body: &B, _meta: &ItemMeta, _etag: Option<Etag>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// One engine over a fresh in-memory store, plus handles the tests probe.
pub struct Harness<B: ReplicatedBody> {
    pub engine: ReplicationBehavior<B, MemoryStore<B>>,
    pub store: Arc<MemoryStore<B>>,
    pub bus: Arc<ConflictBus>,
    pub trigger: Arc<CountingTrigger>,
}

pub fn harness() -> Harness<DocumentBody> {
    harness_with(ResolverChain::empty())
}

pub fn harness_with<B: ReplicatedBody>(resolvers: ResolverChain<B>) -> Harness<B> {
    harness_configured(resolvers, ReplicationConfig::new(tag(LOCAL)))
}

pub fn harness_configured<B: ReplicatedBody>(
    resolvers: ResolverChain<B>,
    config: ReplicationConfig,
) -> Harness<B> {
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(ConflictBus::new());
    let trigger = Arc::new(CountingTrigger::default());
    let engine = ReplicationBehavior::new(
        Arc::clone(&store),
        config,
        resolvers,
        Some(trigger.clone() as Arc<dyn ConflictCleanupTrigger<B>>),
        Arc::clone(&bus),
    )
    .expect("engine construction");
    Harness {
        engine,
        store,
        bus,
        trigger,
    }
}

pub fn item(s: &str) -> ItemId {
    ItemId::new(s).expect("item id")
}

pub fn tag(s: &str) -> ReplicaTag {
    ReplicaTag::new(s).expect("replica tag")
}

pub fn artifact(parent: &str, replica: &str) -> ArtifactId {
    ArtifactId::new(&item(parent), &tag(replica))
}

pub fn doc(n: u64) -> DocumentBody {
    DocumentBody::new(json!({ "n": n }))
}

pub fn history(entries: &[(&str, u64)]) -> VersionHistory {
    VersionHistory::from_entries(
        entries
            .iter()
            .map(|(source, version)| VersionStamp::new(tag(source), *version))
            .collect(),
    )
}

/// Metadata of one replicated put.
pub fn put_meta(source: &str, version: u64, ancestry: &[(&str, u64)]) -> ItemMeta {
    let mut meta = ItemMeta::new();
    meta.set_stamp(&VersionStamp::new(tag(source), version));
    meta.set_history(&history(ancestry));
    meta
}

/// Metadata of one replicated delete.
pub fn delete_meta(source: &str, version: u64, ancestry: &[(&str, u64)]) -> ItemMeta {
    let mut meta = put_meta(source, version, ancestry);
    meta.set_flag(keys::DELETE_MARKER, true);
    meta
}
