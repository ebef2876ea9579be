// 📊 Read models - table-shaped views over the tracker
//
// Serializable rows for the CLI (--json) and the HTTP API. Nothing here
// holds domain state; every view is recomputed from the tracker on demand.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::entities::{EntityId, Student};
use crate::store::TrackerStore;
use crate::tracker::StudentTracker;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentRow {
    pub id: EntityId,
    pub name: String,
    pub class_year: i32,
    pub total_points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRow {
    pub id: EntityId,
    pub name: String,
    pub points: i32,
    pub duration: String,
    pub participants: usize,
}

/// One student's standing in a quarter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarterStanding {
    pub id: EntityId,
    pub name: String,
    pub class_year: i32,
    pub quarter_points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WinnerSummary {
    pub quarter: String,
    pub top_student: Option<StudentRow>,
    pub top_points: i64,
    pub random_winner: Option<StudentRow>,
}

impl<S: TrackerStore> StudentTracker<S> {
    pub fn student_row(&self, student: &Student) -> StudentRow {
        StudentRow {
            id: student.id,
            name: student.name.clone(),
            class_year: student.class_year,
            total_points: self.total_points(student.id),
        }
    }

    /// Every student with their total points, ascending by ID
    pub fn student_rows(&self) -> Vec<StudentRow> {
        self.students().iter().map(|s| self.student_row(s)).collect()
    }

    /// Every event with its participant count, ascending by ID
    pub fn event_rows(&self) -> Vec<EventRow> {
        self.events()
            .iter()
            .map(|e| EventRow {
                id: e.id,
                name: e.name.clone(),
                points: e.points,
                duration: e.duration.clone(),
                participants: self.students_for(e.id).len(),
            })
            .collect()
    }

    /// Students registered for an event, ascending by ID
    pub fn participants(&self, event: EntityId) -> Vec<StudentRow> {
        self.students_for(event)
            .into_iter()
            .filter_map(|id| self.student(id))
            .map(|s| self.student_row(s))
            .collect()
    }

    /// Events a student is registered for, as rows
    pub fn registrations_of(&self, student: EntityId) -> Vec<EventRow> {
        let registered = self.events_for(student);
        self.event_rows()
            .into_iter()
            .filter(|row| registered.contains(&row.id))
            .collect()
    }

    /// All students ranked by points in `quarter` (ties by ascending ID)
    pub fn quarterly_standings(&self, quarter: &str) -> Vec<QuarterStanding> {
        let mut standings: Vec<QuarterStanding> = self
            .students()
            .iter()
            .map(|s| QuarterStanding {
                id: s.id,
                name: s.name.clone(),
                class_year: s.class_year,
                quarter_points: self.quarterly_report(quarter, s.id),
            })
            .collect();

        standings.sort_by(|a, b| b.quarter_points.cmp(&a.quarter_points).then(a.id.cmp(&b.id)));
        standings
    }

    /// Top student and a random draw for `quarter`
    pub fn winners(&mut self, quarter: &str) -> WinnerSummary {
        let top = self.top_student_of_quarter(quarter).cloned();
        let top_points = top
            .as_ref()
            .map_or(0, |s| self.quarterly_report(quarter, s.id));
        let top_student = top.map(|s| self.student_row(&s));

        let random = self.random_winner().cloned();
        let random_winner = random.map(|s| self.student_row(&s));

        WinnerSummary {
            quarter: quarter.to_string(),
            top_student,
            top_points,
            random_winner,
        }
    }

    /// Distinct duration tags across all events, sorted
    pub fn known_quarters(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|e| e.duration.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
