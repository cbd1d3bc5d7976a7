//! Layer 3: Historian
//!
//! Pure causal comparison between an incoming version and the local one.
//! A side's summit is the per-source maximum over its ancestry plus its
//! own stamp; descendance is setwise dominance of summits.

use std::collections::BTreeMap;

use super::identity::ReplicaTag;
use super::meta::VersionView;

/// Causal relationship between incoming and local versions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CausalRelation {
    /// Same (source, version) pair: a replayed write.
    IdenticalReplay,
    /// Incoming causally dominates local: fast-forward.
    IncomingDescendsLocal,
    /// Local causally dominates incoming: the peer is behind.
    LocalDescendsIncoming,
    /// Neither dominates: a genuine conflict.
    Concurrent,
}

/// Compare two versions by their metadata alone.
///
/// A side missing its own stamp can never claim descendance: the result is
/// `Concurrent` unless both stamps are present and equal. Mutual dominance
/// (equal summits under distinct stamps) is also `Concurrent` - there is
/// no evidence either write saw the other.
pub fn relation(incoming: &VersionView, local: &VersionView) -> CausalRelation {
    let (Some(incoming_stamp), Some(local_stamp)) = (&incoming.stamp, &local.stamp) else {
        return CausalRelation::Concurrent;
    };
    if incoming_stamp == local_stamp {
        return CausalRelation::IdenticalReplay;
    }

    let incoming_summit = summit(incoming);
    let local_summit = summit(local);
    let incoming_dominates = dominates(&incoming_summit, &local_summit);
    let local_dominates = dominates(&local_summit, &incoming_summit);
    match (incoming_dominates, local_dominates) {
        (true, false) => CausalRelation::IncomingDescendsLocal,
        (false, true) => CausalRelation::LocalDescendsIncoming,
        _ => CausalRelation::Concurrent,
    }
}

/// Per-source maximum over history plus the side's own stamp.
fn summit(view: &VersionView) -> BTreeMap<&ReplicaTag, u64> {
    let mut max: BTreeMap<&ReplicaTag, u64> = BTreeMap::new();
    let own = view.stamp.iter();
    for entry in view.history.entries().iter().chain(own) {
        let slot = max.entry(&entry.source).or_insert(0);
        if entry.version > *slot {
            *slot = entry.version;
        }
    }
    max
}

/// Every source in `other` is covered by `this` at an equal or higher
/// version.
fn dominates(this: &BTreeMap<&ReplicaTag, u64>, other: &BTreeMap<&ReplicaTag, u64>) -> bool {
    other
        .iter()
        .all(|(source, version)| this.get(source).is_some_and(|seen| seen >= version))
}
