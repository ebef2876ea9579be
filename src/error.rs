// Error taxonomy for the tracker core
//
// Two channels:
// - recoverable: DuplicateName / NotFound (operation aborted, nothing mutated)
// - fatal to the call: AllocatorExhausted / Persistence

use std::fmt;
use std::path::PathBuf;

use crate::entities::EntityId;

/// Which kind of entity an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Student,
    Event,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Student => "student",
            EntityKind::Event => "event",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a missing entity was addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Id(EntityId),
    Name(String),
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Id(id) => write!(f, "id {}", id),
            Lookup::Name(name) => write!(f, "name '{}'", name),
        }
    }
}

/// Errors raised by the persistence adapter
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Injected by `MemoryStore` to simulate a failing disk
    #[error("write to {collection} rejected")]
    WriteRejected { collection: &'static str },
}

/// Errors surfaced by the tracker facade
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("{kind} name already exists: '{name}'")]
    DuplicateName { kind: EntityKind, name: String },

    #[error("{kind} does not exist ({key})")]
    NotFound { kind: EntityKind, key: Lookup },

    #[error("could not generate a unique {digits}-digit ID after {tries} tries")]
    AllocatorExhausted { tries: u32, digits: u32 },

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TrackerError {
    pub(crate) fn student_not_found(id: EntityId) -> Self {
        TrackerError::NotFound {
            kind: EntityKind::Student,
            key: Lookup::Id(id),
        }
    }

    pub(crate) fn event_not_found(id: EntityId) -> Self {
        TrackerError::NotFound {
            kind: EntityKind::Event,
            key: Lookup::Id(id),
        }
    }

    /// Non-fatal conditions: the operation was rejected before any mutation
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TrackerError::DuplicateName { .. } | TrackerError::NotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
