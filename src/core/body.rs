//! Layer 4: Item bodies
//!
//! The engine is generic over the replicated payload. Documents carry
//! structured JSON; attachments carry opaque bytes. Both must be able to
//! materialize and read back the conflict-placeholder form so a parent
//! record can enumerate its contenders regardless of kind.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::identity::ArtifactId;

/// Replicated item kinds, as reported in conflict notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Document,
    Attachment,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Document => write!(f, "document"),
            ItemKind::Attachment => write!(f, "attachment"),
        }
    }
}

/// Key under which a placeholder body lists its contender artifacts.
pub const CONFLICTS_FIELD: &str = "conflicts";

/// Payload carried by a replicated item.
pub trait ReplicatedBody: Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: ItemKind;

    /// The body stored for tombstones and bodiless contenders.
    fn empty() -> Self;

    /// Structured view, when the payload is JSON-shaped. Triggers only run
    /// over structured bodies.
    fn as_json(&self) -> Option<&Value>;

    /// Materialize the conflict-placeholder body enumerating `artifacts`.
    fn conflict_placeholder(artifacts: &[ArtifactId]) -> Self;

    /// Read back a placeholder's artifact list, if this body is one.
    fn conflict_ids(&self) -> Option<Vec<ArtifactId>>;
}

fn placeholder_value(artifacts: &[ArtifactId]) -> Value {
    let ids: Vec<Value> = artifacts
        .iter()
        .map(|artifact| Value::String(artifact.to_string()))
        .collect();
    serde_json::json!({ (CONFLICTS_FIELD): ids })
}

fn placeholder_ids(value: &Value) -> Option<Vec<ArtifactId>> {
    let raw = value.get(CONFLICTS_FIELD)?.as_array()?;
    Some(
        raw.iter()
            .filter_map(Value::as_str)
            .filter_map(|s| ArtifactId::parse(s).ok())
            .collect(),
    )
}

/// JSON document payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentBody(pub Value);

impl DocumentBody {
    pub fn new(value: Value) -> Self {
        Self(value)
    }
}

impl ReplicatedBody for DocumentBody {
    const KIND: ItemKind = ItemKind::Document;

    fn empty() -> Self {
        Self(serde_json::json!({}))
    }

    fn as_json(&self) -> Option<&Value> {
        Some(&self.0)
    }

    fn conflict_placeholder(artifacts: &[ArtifactId]) -> Self {
        Self(placeholder_value(artifacts))
    }

    fn conflict_ids(&self) -> Option<Vec<ArtifactId>> {
        placeholder_ids(&self.0)
    }
}

/// Opaque attachment payload.
///
/// The placeholder form is the same JSON artifact-list, encoded - the
/// parent's contender enumeration stays readable for either kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentBody(pub Bytes);

impl AttachmentBody {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl ReplicatedBody for AttachmentBody {
    const KIND: ItemKind = ItemKind::Attachment;

    fn empty() -> Self {
        Self(Bytes::new())
    }

    fn as_json(&self) -> Option<&Value> {
        None
    }

    fn conflict_placeholder(artifacts: &[ArtifactId]) -> Self {
        // String keys and values only; serialization cannot fail.
        let encoded = serde_json::to_vec(&placeholder_value(artifacts)).unwrap_or_default();
        Self(Bytes::from(encoded))
    }

    fn conflict_ids(&self) -> Option<Vec<ArtifactId>> {
        let value: Value = serde_json::from_slice(&self.0).ok()?;
        placeholder_ids(&value)
    }
}
