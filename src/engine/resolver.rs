//! Pluggable conflict resolvers.
//!
//! Resolvers compute only; the engine performs the writes a resolution
//! implies. Order in the chain is authoritative - first acceptance wins.

use std::sync::Arc;

use crate::core::body::ReplicatedBody;
use crate::core::identity::ItemId;
use crate::core::meta::{keys, ItemMeta};

use super::error::ResolverError;
use super::storage::ExistingItem;

/// A resolver's proposed outcome.
///
/// A delete resolution sets `@resolver-delete-marker` on `meta` and
/// carries no body.
#[derive(Clone, Debug)]
pub struct Resolution<B> {
    pub meta: ItemMeta,
    pub body: Option<B>,
}

impl<B> Resolution<B> {
    pub fn put(meta: ItemMeta, body: B) -> Self {
        Self {
            meta,
            body: Some(body),
        }
    }

    pub fn delete(mut meta: ItemMeta) -> Self {
        meta.set_flag(keys::RESOLVER_DELETE_MARKER, true);
        Self { meta, body: None }
    }

    pub fn is_delete(&self) -> bool {
        self.meta.flag(keys::RESOLVER_DELETE_MARKER)
    }
}

/// One pluggable resolver. Side-effect free with respect to storage.
///
/// `incoming_body` is None on the delete path (the incoming item is a
/// tombstone).
pub trait ConflictResolver<B: ReplicatedBody>: Send + Sync {
    fn name(&self) -> &str;

    fn try_resolve(
        &self,
        id: &ItemId,
        incoming_meta: &ItemMeta,
        incoming_body: Option<&B>,
        existing: &ExistingItem<B>,
    ) -> Result<Option<Resolution<B>>, ResolverError>;
}

/// Ordered chain; read-only after startup.
#[derive(Clone)]
pub struct ResolverChain<B: ReplicatedBody> {
    resolvers: Vec<Arc<dyn ConflictResolver<B>>>,
}

impl<B: ReplicatedBody> Default for ResolverChain<B> {
    fn default() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }
}

impl<B: ReplicatedBody> ResolverChain<B> {
    pub fn new(resolvers: Vec<Arc<dyn ConflictResolver<B>>>) -> Self {
        Self { resolvers }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// First acceptance wins. A failing resolver is logged and treated as
    /// a decline; a put acceptance without a body is malformed and also
    /// declines.
    pub fn resolve(
        &self,
        id: &ItemId,
        incoming_meta: &ItemMeta,
        incoming_body: Option<&B>,
        existing: &ExistingItem<B>,
    ) -> Option<(String, Resolution<B>)> {
        for resolver in &self.resolvers {
            match resolver.try_resolve(id, incoming_meta, incoming_body, existing) {
                Ok(Some(resolution)) => {
                    if !resolution.is_delete() && resolution.body.is_none() {
                        tracing::error!(
                            "resolver `{}` accepted `{id}` without a body, ignoring",
                            resolver.name()
                        );
                        continue;
                    }
                    return Some((resolver.name().to_string(), resolution));
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::error!("resolver `{}` failed on `{id}`: {err}", resolver.name());
                }
            }
        }
        None
    }
}
