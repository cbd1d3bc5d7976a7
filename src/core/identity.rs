//! Layer 1: Identity atoms
//!
//! ReplicaTag: stable identifier of a participating store
//! ItemId: replicated item identifier (documents and attachments share a keyspace)
//! ArtifactId: `<parent>/conflicts/<tag>` form naming one conflict contender

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{CoreError, InvalidId};

/// Replica identifier - non-empty string without `/`.
///
/// Replicas name themselves; the `/` restriction exists because tags embed
/// in artifact ids.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReplicaTag(String);

impl ReplicaTag {
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.is_empty() {
            return Err(InvalidId::Replica {
                raw: s,
                reason: "empty".into(),
            }
            .into());
        }
        if s.contains('/') {
            return Err(InvalidId::Replica {
                raw: s,
                reason: "must not contain '/'".into(),
            }
            .into());
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ReplicaTag {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, CoreError> {
        Self::new(s)
    }
}

impl From<ReplicaTag> for String {
    fn from(tag: ReplicaTag) -> String {
        tag.0
    }
}

impl fmt::Debug for ReplicaTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReplicaTag({:?})", self.0)
    }
}

impl fmt::Display for ReplicaTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Replicated item identifier - non-empty, otherwise opaque.
///
/// Conflict artifacts live in the same keyspace under the reserved
/// `<id>/conflicts/<tag>` suffix form; see [`ArtifactId`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(String);

impl ItemId {
    pub fn new(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        if s.is_empty() {
            return Err(InvalidId::Item {
                raw: s,
                reason: "empty".into(),
            }
            .into());
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ItemId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, CoreError> {
        Self::new(s)
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> String {
        id.0
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({:?})", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Infix separating a parent id from the contender's replica tag.
pub const CONFLICT_INFIX: &str = "/conflicts/";

/// Identifier of one stored conflict contender.
///
/// Artifacts are ordinary records addressed as `<parent>/conflicts/<tag>`;
/// identity is (parent, tag), so re-writing the same contender overwrites
/// rather than accumulates.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId {
    id: ItemId,
    parent: ItemId,
    tag: ReplicaTag,
}

impl ArtifactId {
    pub fn new(parent: &ItemId, tag: &ReplicaTag) -> Self {
        let raw = format!("{}{}{}", parent.as_str(), CONFLICT_INFIX, tag.as_str());
        Self {
            // Non-empty by construction.
            id: ItemId(raw),
            parent: parent.clone(),
            tag: tag.clone(),
        }
    }

    /// Parse the `<parent>/conflicts/<tag>` form.
    ///
    /// The rightmost infix wins, so parent ids containing the infix are
    /// still addressable.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let Some((parent_raw, tag_raw)) = s.rsplit_once(CONFLICT_INFIX) else {
            return Err(InvalidId::Artifact {
                raw: s.to_string(),
                reason: format!("missing `{CONFLICT_INFIX}` infix"),
            }
            .into());
        };
        let parent = ItemId::new(parent_raw)?;
        let tag = ReplicaTag::new(tag_raw)?;
        Ok(Self::new(&parent, &tag))
    }

    /// The artifact's own storage key.
    pub fn as_item_id(&self) -> &ItemId {
        &self.id
    }

    pub fn parent(&self) -> &ItemId {
        &self.parent
    }

    pub fn tag(&self) -> &ReplicaTag {
        &self.tag
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, CoreError> {
        Self::parse(&s)
    }
}

impl From<ArtifactId> for String {
    fn from(artifact: ArtifactId) -> String {
        artifact.id.0
    }
}

impl fmt::Debug for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArtifactId({:?})", self.id.0)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id.0)
    }
}
