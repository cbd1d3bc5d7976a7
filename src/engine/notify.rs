//! Conflict notifications and the in-process fan-out bus.
//!
//! Exactly one notification per materialized conflict, delivered after the
//! materializing transaction commits (the engine routes publication
//! through the storage capability's commit hook).

use std::sync::Mutex;

use crossbeam::channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::core::body::ItemKind;
use crate::core::identity::{ArtifactId, ItemId};

use super::storage::Etag;

/// Which decision path materialized the conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplicationOp {
    Put,
    Delete,
}

/// Emitted iff a conflict was materialized: the parent id now enumerates
/// `conflicts` and carries `etag`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictNotification {
    pub id: ItemId,
    pub etag: Etag,
    pub kind: ItemKind,
    pub op: ReplicationOp,
    pub conflicts: Vec<ArtifactId>,
}

/// Append-only multi-consumer fan-out.
///
/// Subscribers get an unbounded receiver; disconnected subscribers are
/// pruned on the next publish.
#[derive(Default)]
pub struct ConflictBus {
    subscribers: Mutex<Vec<Sender<ConflictNotification>>>,
}

impl ConflictBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<ConflictNotification> {
        let (tx, rx) = unbounded();
        self.lock().push(tx);
        rx
    }

    pub fn publish(&self, notification: ConflictNotification) {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| tx.send(notification.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sender<ConflictNotification>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|err| err.into_inner())
    }
}
