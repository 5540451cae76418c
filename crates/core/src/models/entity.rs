use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoreError;
use super::mutation::MutationBody;

const TEMP_PREFIX: &str = "temp-";

/// Identifier of a business entity.
///
/// Backend-issued ids are opaque strings (numeric ids are accepted and stringified).
/// Speculative entries inserted ahead of backend confirmation carry a temporary id
/// of the form `temp-<uuid>`, which the backend never issues.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh, locally unique temporary id.
    pub fn temporary() -> Self {
        Self(format!("{TEMP_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<u64> for EntityId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(u64),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(s) => EntityId(s),
            Repr::Number(n) => EntityId(n.to_string()),
        })
    }
}

/// An entity that can appear in an optimistically updated cached list.
///
/// `placeholder` synthesizes the speculative entry shown while a create or
/// update request is in flight.
pub trait OptimisticEntity: Clone + Send + Sync + 'static {
    /// The payload used to create or update this entity.
    type Draft: Clone + Send + Sync;

    fn id(&self) -> &EntityId;

    fn placeholder(draft: &Self::Draft, id: EntityId) -> Self;

    /// True while this entry has not been confirmed by the backend.
    fn is_speculative(&self) -> bool {
        self.id().is_temporary()
    }
}

/// Drafts that know how to encode themselves as a create/update request body.
pub trait IntoMutationBody {
    fn to_body(&self) -> Result<MutationBody, CoreError>;
}
