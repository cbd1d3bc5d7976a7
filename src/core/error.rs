//! Core capability errors (identity validation).
//!
//! These are bounded and stable: core errors represent domain/refusal
//! states, not library implementation details.

use thiserror::Error;

use crate::error::{Effect, Transience};

/// Invalid identifier.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum InvalidId {
    #[error("item id `{raw}` is invalid: {reason}")]
    Item { raw: String, reason: String },
    #[error("replica tag `{raw}` is invalid: {reason}")]
    Replica { raw: String, reason: String },
    #[error("artifact id `{raw}` is invalid: {reason}")]
    Artifact { raw: String, reason: String },
}

/// Canonical error enum for the core capability.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum CoreError {
    #[error(transparent)]
    InvalidId(#[from] InvalidId),
}

impl CoreError {
    pub fn transience(&self) -> Transience {
        // Core errors are pure domain/input failures.
        Transience::Permanent
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}
