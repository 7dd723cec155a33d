//! Entity trait - common interface for every register table row

use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::hash::Hash;

/// Common trait for all register entities
pub trait Entity: Clone + Serialize + DeserializeOwned {
    /// Which table this entity lives in
    const KIND: EntityKind;

    /// Key type rows are indexed by
    type Id: Clone + Eq + Hash + fmt::Display + fmt::Debug;

    /// Get the entity's unique id
    fn id(&self) -> &Self::Id;

    /// Human-readable label used in listings
    fn title(&self) -> &str;
}

/// The four tables of a register document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Risk,
    Control,
    UseCase,
    Relationship,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Risk => "risk",
            EntityKind::Control => "control",
            EntityKind::UseCase => "use case",
            EntityKind::Relationship => "relationship",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
