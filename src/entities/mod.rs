// Entity Models
//
// Students and events share one ID space (see `ids`), so an `EntityId`
// never identifies a student and an event at the same time.
//
// Each entity has:
// - Stable identity (numeric ID) that NEVER changes
// - Mutable values (name and kind-specific fields)
// - A registry keyed by ID, with name lookup by linear scan

pub mod event;
pub mod registry;
pub mod student;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use event::Event;
pub use registry::{EventRegistry, Registry, StudentRegistry};
pub use student::Student;

/// Short numeric identity shared by students and events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u32);

impl EntityId {
    pub const fn new(raw: u32) -> Self {
        EntityId(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u32> for EntityId {
    fn from(raw: u32) -> Self {
        EntityId(raw)
    }
}

/// Common surface of anything held in a `Registry`
pub trait Entity {
    fn id(&self) -> EntityId;
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
}
