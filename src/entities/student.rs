// 🎓 Student Entity
//
// "The ID is IDENTITY (never changes), name and class year are VALUES"
//
// The name doubles as a secondary lookup key, so the tracker keeps it
// unique among students.

use serde::{Deserialize, Serialize};

use super::{Entity, EntityId};

/// Student entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Stable identity - assigned at creation, NEVER changes
    pub id: EntityId,

    /// Display name, unique among students
    pub name: String,

    /// Graduating class ("class of 2025")
    pub class_year: i32,
}

impl Student {
    pub fn new(id: EntityId, name: impl Into<String>, class_year: i32) -> Self {
        Student {
            id,
            name: name.into(),
            class_year,
        }
    }

    pub fn set_class_year(&mut self, class_year: i32) {
        self.class_year = class_year;
    }
}

impl Entity for Student {
    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}
