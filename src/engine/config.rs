//! Engine construction parameters (normative defaults).
//!
//! No file or environment loading at this layer: the host constructs the
//! config and hands it over.

use serde::{Deserialize, Serialize};

use crate::core::identity::ReplicaTag;
use crate::core::version::HISTORY_MAX;

/// Bounded restart budget for optimistic write contention.
pub const DEFAULT_WRITE_RETRIES: u32 = 5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// This store's stable tag; names locally-produced conflict artifacts.
    pub local_tag: ReplicaTag,
    /// Ancestry bound; oldest entries are evicted first on overflow.
    #[serde(default = "default_history_max")]
    pub history_max: usize,
    /// Whole-decision restarts allowed on optimistic write contention.
    #[serde(default = "default_write_retries")]
    pub max_write_retries: u32,
}

fn default_history_max() -> usize {
    HISTORY_MAX
}

fn default_write_retries() -> u32 {
    DEFAULT_WRITE_RETRIES
}

impl ReplicationConfig {
    pub fn new(local_tag: ReplicaTag) -> Self {
        Self {
            local_tag,
            history_max: HISTORY_MAX,
            max_write_retries: DEFAULT_WRITE_RETRIES,
        }
    }

    pub fn with_history_max(mut self, history_max: usize) -> Self {
        self.history_max = history_max;
        self
    }

    pub fn with_write_retries(mut self, retries: u32) -> Self {
        self.max_write_retries = retries;
        self
    }
}
