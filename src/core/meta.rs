//! Layer 2: Item metadata
//!
//! Metadata stays an open string->JSON map at the boundary; the engine
//! parses the reserved keys into a typed [`VersionView`] once per decision
//! and writes flags back explicitly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::identity::ReplicaTag;
use super::version::{VersionHistory, VersionStamp};

/// Reserved metadata keys. These are the only keys the engine reads or
/// writes; everything else passes through untouched.
pub mod keys {
    /// Incoming tombstone flag.
    pub const DELETE_MARKER: &str = "@delete-marker";
    /// Replica that last mutated this version.
    pub const REPLICATION_SOURCE: &str = "@replication-source";
    /// Monotonic counter within that source.
    pub const REPLICATION_VERSION: &str = "@replication-version";
    /// Bounded ordered ancestry of prior (source, version) pairs.
    pub const REPLICATION_HISTORY: &str = "@replication-history";
    /// Set on a parent record that is a conflict placeholder.
    pub const REPLICATION_CONFLICT: &str = "@replication-conflict";
    /// Set on stored conflict artifacts.
    pub const REPLICATION_CONFLICT_DOC: &str = "@replication-conflict-doc";
    /// Set by a resolver to request resolution-as-delete.
    pub const RESOLVER_DELETE_MARKER: &str = "@resolver-delete-marker";
}

/// Open item metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemMeta(BTreeMap<String, Value>);

impl ItemMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// A missing flag reads as false; any non-boolean value also reads as
    /// false (peers are not trusted to be well-formed).
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(Value::Bool(true)))
    }

    pub fn set_flag(&mut self, key: &str, value: bool) {
        self.0.insert(key.to_string(), Value::Bool(value));
    }

    /// The (source, version) stamp, if both keys parse.
    pub fn stamp(&self) -> Option<VersionStamp> {
        let source = self.0.get(keys::REPLICATION_SOURCE)?.as_str()?;
        let source = ReplicaTag::new(source).ok()?;
        let version = self.0.get(keys::REPLICATION_VERSION)?.as_u64()?;
        Some(VersionStamp::new(source, version))
    }

    pub fn set_stamp(&mut self, stamp: &VersionStamp) {
        self.0.insert(
            keys::REPLICATION_SOURCE.to_string(),
            Value::String(stamp.source.as_str().to_string()),
        );
        self.0.insert(
            keys::REPLICATION_VERSION.to_string(),
            Value::Number(stamp.version.into()),
        );
    }

    /// Which stamp key a descendance decision would be missing.
    ///
    /// Returns None when the stamp parses.
    pub fn missing_stamp_key(&self) -> Option<&'static str> {
        if self
            .0
            .get(keys::REPLICATION_SOURCE)
            .and_then(Value::as_str)
            .is_none()
        {
            return Some(keys::REPLICATION_SOURCE);
        }
        if self
            .0
            .get(keys::REPLICATION_VERSION)
            .and_then(Value::as_u64)
            .is_none()
        {
            return Some(keys::REPLICATION_VERSION);
        }
        None
    }

    /// Parse `@replication-history`. Missing key reads as empty; entries
    /// that do not parse are skipped rather than failing the whole item.
    pub fn history(&self) -> VersionHistory {
        let Some(Value::Array(raw)) = self.0.get(keys::REPLICATION_HISTORY) else {
            return VersionHistory::new();
        };
        let entries = raw
            .iter()
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect();
        VersionHistory::from_entries(entries)
    }

    pub fn set_history(&mut self, history: &VersionHistory) {
        // Stamps serialize infallibly (string + u64).
        let value = serde_json::to_value(history).unwrap_or(Value::Array(Vec::new()));
        self.0.insert(keys::REPLICATION_HISTORY.to_string(), value);
    }

    /// Enforce the ancestry bound before a write, evicting oldest first.
    pub fn clamp_history(&mut self, max: usize) {
        let mut history = self.history();
        if history.len() > max {
            history.clamp(max);
            self.set_history(&history);
        }
    }
}

/// Typed projection of the reserved keys, parsed once per decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionView {
    pub stamp: Option<VersionStamp>,
    pub history: VersionHistory,
    pub deleted: bool,
    pub conflicted: bool,
    pub conflict_doc: bool,
    pub resolver_delete: bool,
}

impl VersionView {
    pub fn of(meta: &ItemMeta) -> Self {
        Self {
            stamp: meta.stamp(),
            history: meta.history(),
            deleted: meta.flag(keys::DELETE_MARKER),
            conflicted: meta.flag(keys::REPLICATION_CONFLICT),
            conflict_doc: meta.flag(keys::REPLICATION_CONFLICT_DOC),
            resolver_delete: meta.flag(keys::RESOLVER_DELETE_MARKER),
        }
    }
}
