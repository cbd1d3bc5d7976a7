//! In-process reference backend.
//!
//! A `BTreeMap` of records behind one mutex, issuing monotonic etags.
//! There is no transaction scope, so deferred hooks run immediately -
//! which is exactly the contract's fallback.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::core::body::ReplicatedBody;
use crate::core::identity::ItemId;
use crate::core::meta::ItemMeta;
use crate::engine::error::StorageError;
use crate::engine::storage::{Etag, ExistingItem, ItemStore};

#[derive(Clone, Debug)]
struct StoredRecord<B> {
    meta: ItemMeta,
    body: B,
    etag: Etag,
    deleted: bool,
}

#[derive(Debug)]
struct Inner<B> {
    records: BTreeMap<ItemId, StoredRecord<B>>,
    next_etag: u64,
}

/// Thread-safe in-memory [`ItemStore`].
#[derive(Debug)]
pub struct MemoryStore<B> {
    inner: Mutex<Inner<B>>,
}

impl<B: ReplicatedBody> Default for MemoryStore<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ReplicatedBody> MemoryStore<B> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                records: BTreeMap::new(),
                next_etag: 0,
            }),
        }
    }

    /// All record keys, artifacts included, in key order.
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.lock().records.keys().cloned().collect()
    }

    /// Snapshot one record (live or tombstone).
    pub fn record(&self, id: &ItemId) -> Option<ExistingItem<B>> {
        self.lock().records.get(id).map(|record| ExistingItem {
            meta: record.meta.clone(),
            body: record.body.clone(),
            etag: record.etag,
            deleted: record.deleted,
        })
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<B>> {
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }
}

fn check_expected<B>(
    id: &ItemId,
    expected: Option<Etag>,
    current: Option<&StoredRecord<B>>,
) -> Result<(), StorageError> {
    let actual = current.map(|record| record.etag);
    match expected {
        None => Ok(()),
        Some(_) if expected == actual => Ok(()),
        Some(_) => Err(StorageError::Conflict {
            id: id.clone(),
            expected,
            actual,
        }),
    }
}

impl<B: ReplicatedBody> ItemStore<B> for MemoryStore<B> {
    fn try_get_existing(&self, id: &ItemId) -> Result<Option<ExistingItem<B>>, StorageError> {
        Ok(self.record(id))
    }

    fn add_without_conflict(
        &self,
        id: &ItemId,
        expected: Option<Etag>,
        meta: ItemMeta,
        body: B,
    ) -> Result<Etag, StorageError> {
        let mut inner = self.lock();
        check_expected(id, expected, inner.records.get(id))?;
        inner.next_etag += 1;
        let etag = Etag::new(inner.next_etag);
        inner.records.insert(
            id.clone(),
            StoredRecord {
                meta,
                body,
                etag,
                deleted: false,
            },
        );
        Ok(etag)
    }

    fn delete_item(&self, id: &ItemId, expected: Option<Etag>) -> Result<(), StorageError> {
        let mut inner = self.lock();
        check_expected(id, expected, inner.records.get(id))?;
        inner.records.remove(id);
        Ok(())
    }

    fn mark_as_deleted(&self, id: &ItemId, meta: ItemMeta) -> Result<Etag, StorageError> {
        let mut inner = self.lock();
        inner.next_etag += 1;
        let etag = Etag::new(inner.next_etag);
        inner.records.insert(
            id.clone(),
            StoredRecord {
                meta,
                body: B::empty(),
                etag,
                deleted: true,
            },
        );
        Ok(etag)
    }
}
