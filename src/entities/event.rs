// 🏆 Event Entity
//
// An event awards `points` to every registered student. `duration` is a
// free-form tag naming the reporting period (e.g. "2023Q1"); reports match
// it exactly.

use serde::{Deserialize, Serialize};

use super::{Entity, EntityId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Stable identity, drawn from the same ID space as students
    pub id: EntityId,

    /// Display name, unique among events
    pub name: String,

    /// Points awarded per registration
    pub points: i32,

    /// Reporting period tag
    pub duration: String,
}

impl Event {
    pub fn new(
        id: EntityId,
        name: impl Into<String>,
        points: i32,
        duration: impl Into<String>,
    ) -> Self {
        Event {
            id,
            name: name.into(),
            points,
            duration: duration.into(),
        }
    }

    pub fn set_points(&mut self, points: i32) {
        self.points = points;
    }

    pub fn set_duration(&mut self, duration: String) {
        self.duration = duration;
    }

    /// Exact tag match, no normalization
    pub fn is_in_quarter(&self, tag: &str) -> bool {
        self.duration == tag
    }
}

impl Entity for Event {
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
