//! Layer 0: Causal version primitives
//!
//! VersionStamp: (source, version) uniquely names one written version.
//! VersionHistory: bounded ordered ancestry carried in item metadata.

use serde::{Deserialize, Serialize};

use super::identity::ReplicaTag;

/// Default ancestry bound; configurable per engine.
pub const HISTORY_MAX: usize = 50;

/// One written version: a monotonic counter within its source replica.
///
/// !Copy intentional - stamps travel through metadata and artifact keys,
/// cloning should be a visible decision.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionStamp {
    pub source: ReplicaTag,
    pub version: u64,
}

impl VersionStamp {
    pub fn new(source: ReplicaTag, version: u64) -> Self {
        Self { source, version }
    }
}

/// Ordered ancestry, oldest first.
///
/// The bound is enforced on every mutation: overflow evicts from the front.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionHistory {
    entries: Vec<VersionStamp>,
}

impl VersionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<VersionStamp>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[VersionStamp] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, stamp: &VersionStamp) -> bool {
        self.entries.contains(stamp)
    }

    /// Append one entry, evicting the oldest past `max`.
    pub fn push(&mut self, stamp: VersionStamp, max: usize) {
        self.entries.push(stamp);
        self.clamp(max);
    }

    /// Drop oldest entries until the bound holds.
    pub fn clamp(&mut self, max: usize) {
        if self.entries.len() > max {
            let excess = self.entries.len() - max;
            self.entries.drain(..excess);
        }
    }

    /// Append `other`'s entries absent from `self` (deep equality),
    /// preserving both orders, then clamp.
    pub fn merge_from(&mut self, other: &VersionHistory, max: usize) {
        for entry in &other.entries {
            if !self.entries.contains(entry) {
                self.entries.push(entry.clone());
            }
        }
        self.clamp(max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(source: &str, version: u64) -> VersionStamp {
        VersionStamp::new(ReplicaTag::new(source).unwrap(), version)
    }

    #[test]
    fn push_evicts_oldest_past_bound() {
        let mut history = VersionHistory::new();
        for v in 1..=5 {
            history.push(stamp("x", v), 3);
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.entries()[0], stamp("x", 3));
        assert_eq!(history.entries()[2], stamp("x", 5));
    }

    #[test]
    fn merge_appends_only_missing_entries() {
        let mut left = VersionHistory::from_entries(vec![stamp("x", 1), stamp("x", 2)]);
        let right = VersionHistory::from_entries(vec![stamp("y", 1), stamp("x", 2)]);
        left.merge_from(&right, HISTORY_MAX);
        assert_eq!(
            left.entries(),
            &[stamp("x", 1), stamp("x", 2), stamp("y", 1)]
        );
    }

    #[test]
    fn merge_clamps_after_union() {
        let mut left = VersionHistory::from_entries(vec![stamp("x", 1), stamp("x", 2)]);
        let right = VersionHistory::from_entries(vec![stamp("y", 1), stamp("y", 2)]);
        left.merge_from(&right, 3);
        assert_eq!(
            left.entries(),
            &[stamp("x", 2), stamp("y", 1), stamp("y", 2)]
        );
    }

    #[test]
    fn serde_is_flat_array() {
        let history = VersionHistory::from_entries(vec![stamp("x", 1)]);
        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "source": "x", "version": 1 }])
        );
    }
}
