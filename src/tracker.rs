// 🧭 Student Tracker - the single authoritative domain object
//
// Composes the entity registries, the registration ledger and the ID
// allocator, and writes every successful mutation through to the store
// before returning. There is no rollback: if a save fails the in-memory
// state has already changed and the error tells the caller so.
//
// Names and durations are trimmed on the way in; the file store trims every
// field on load, so stored values must already be trimmed to reload equal.
//
// Not internally synchronized. Shared use needs one lock around the whole
// tracker (see bin/server.rs).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{info, warn};

use crate::config::TrackerConfig;
use crate::entities::{Entity, EntityId, Event, EventRegistry, Student, StudentRegistry};
use crate::error::{EntityKind, Lookup, Result, TrackerError};
use crate::ids::IdAllocator;
use crate::ledger::RegistrationLedger;
use crate::store::TrackerStore;

pub struct StudentTracker<S: TrackerStore> {
    students: StudentRegistry,
    events: EventRegistry,
    ledger: RegistrationLedger,
    ids: IdAllocator,
    store: S,
    rng: StdRng,
}

impl<S: TrackerStore> StudentTracker<S> {
    /// Load state from `store` and seed randomness from the OS
    pub fn open(store: S, config: &TrackerConfig) -> Result<Self> {
        Self::open_with_rngs(store, config, StdRng::from_os_rng(), StdRng::from_os_rng())
    }

    /// Deterministic variant for tests and simulations
    pub fn open_seeded(store: S, config: &TrackerConfig, seed: u64) -> Result<Self> {
        Self::open_with_rngs(
            store,
            config,
            StdRng::seed_from_u64(seed),
            StdRng::seed_from_u64(seed.wrapping_add(1)),
        )
    }

    fn open_with_rngs(
        mut store: S,
        config: &TrackerConfig,
        id_rng: StdRng,
        rng: StdRng,
    ) -> Result<Self> {
        config.validate()?;
        let snapshot = store.load()?;

        let mut students = StudentRegistry::new();
        for student in snapshot.students {
            if students.contains(student.id) {
                warn!(id = %student.id, name = %student.name, "duplicate student ID, later record skipped");
                continue;
            }
            if students.name_taken(&student.name, None) {
                warn!(id = %student.id, name = %student.name, "duplicate student name, later record skipped");
                continue;
            }
            students.insert(student);
        }

        let mut events = EventRegistry::new();
        for event in snapshot.events {
            if students.contains(event.id) {
                warn!(id = %event.id, name = %event.name, "event shares an ID with a student, skipped");
                continue;
            }
            if events.contains(event.id) {
                warn!(id = %event.id, name = %event.name, "duplicate event ID, later record skipped");
                continue;
            }
            if events.name_taken(&event.name, None) {
                warn!(id = %event.id, name = %event.name, "duplicate event name, later record skipped");
                continue;
            }
            events.insert(event);
        }

        let mut ledger = RegistrationLedger::new();
        for (student, event) in snapshot.registrations {
            if !students.contains(student) || !events.contains(event) {
                warn!(student = %student, event = %event, "dangling registration skipped");
                continue;
            }
            ledger.register(student, event);
        }

        let mut ids = IdAllocator::with_rng(snapshot.used_ids, id_rng)
            .with_policy(config.id_digits, config.max_id_tries)?;
        let live: Vec<EntityId> = students.ids().chain(events.ids()).collect();
        for id in live {
            if ids.reserve(id) {
                warn!(id = %id, "live ID missing from used set, reserved");
            }
        }

        info!(
            students = students.len(),
            events = events.len(),
            registrations = ledger.len(),
            "tracker ready"
        );

        Ok(StudentTracker {
            students,
            events,
            ledger,
            ids,
            store,
            rng,
        })
    }

    // ========================================================================
    // READ ACCESS
    // ========================================================================

    pub fn students(&self) -> &StudentRegistry {
        &self.students
    }

    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    pub fn ledger(&self) -> &RegistrationLedger {
        &self.ledger
    }

    pub fn used_ids(&self) -> &BTreeSet<EntityId> {
        self.ids.used()
    }

    pub fn student(&self, id: EntityId) -> Option<&Student> {
        self.students.get(id)
    }

    pub fn event(&self, id: EntityId) -> Option<&Event> {
        self.events.get(id)
    }

    pub fn student_id(&self, name: &str) -> Option<EntityId> {
        self.students.find_id_by_name(name)
    }

    pub fn event_id(&self, name: &str) -> Option<EntityId> {
        self.events.find_id_by_name(name)
    }

    /// Like `student_id`, but a missing name is a `NotFound` error
    pub fn require_student(&self, name: &str) -> Result<EntityId> {
        self.student_id(name).ok_or_else(|| {
            reject(TrackerError::NotFound {
                kind: EntityKind::Student,
                key: Lookup::Name(name.to_string()),
            })
        })
    }

    pub fn require_event(&self, name: &str) -> Result<EntityId> {
        self.event_id(name).ok_or_else(|| {
            reject(TrackerError::NotFound {
                kind: EntityKind::Event,
                key: Lookup::Name(name.to_string()),
            })
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // ========================================================================
    // STUDENTS
    // ========================================================================

    pub fn add_student(&mut self, name: &str, class_year: i32) -> Result<EntityId> {
        let name = name.trim();
        if self.students.name_taken(name, None) {
            return Err(reject(TrackerError::DuplicateName {
                kind: EntityKind::Student,
                name: name.to_string(),
            }));
        }

        let id = self.ids.allocate(&mut self.store)?;
        self.students.insert(Student::new(id, name, class_year));
        self.store.save_students(&self.students)?;

        info!(id = %id, name, class_year, "student added");
        Ok(id)
    }

    /// Remove a student, cascade its registrations and free its ID
    pub fn remove_student(&mut self, id: EntityId) -> Result<Student> {
        let student = self
            .students
            .remove(id)
            .ok_or_else(|| reject(TrackerError::student_not_found(id)))?;
        let dropped = self.ledger.cascade_student(id);

        // Release before any write so a failed save never leaves the ID reserved
        self.ids.release(id, &mut self.store)?;
        self.store.save_students(&self.students)?;
        self.store.save_registrations(&self.ledger)?;

        info!(id = %id, name = %student.name, registrations = dropped, "student removed");
        Ok(student)
    }

    pub fn rename_student(&mut self, current: &str, new_name: &str) -> Result<EntityId> {
        let (current, new_name) = (current.trim(), new_name.trim());
        let id = self.require_student(current)?;
        if self.students.name_taken(new_name, Some(id)) {
            return Err(reject(TrackerError::DuplicateName {
                kind: EntityKind::Student,
                name: new_name.to_string(),
            }));
        }

        if let Some(student) = self.students.get_mut(id) {
            student.set_name(new_name.to_string());
        }
        self.store.save_students(&self.students)?;

        info!(id = %id, from = current, to = new_name, "student renamed");
        Ok(id)
    }

    pub fn set_student_year(&mut self, id: EntityId, class_year: i32) -> Result<()> {
        let student = self
            .students
            .get_mut(id)
            .ok_or_else(|| reject(TrackerError::student_not_found(id)))?;
        student.set_class_year(class_year);
        self.store.save_students(&self.students)?;

        info!(id = %id, class_year, "student class year updated");
        Ok(())
    }

    // ========================================================================
    // EVENTS
    // ========================================================================

    pub fn add_event(&mut self, name: &str, points: i32, duration: &str) -> Result<EntityId> {
        let name = name.trim();
        let duration = duration.trim();
        if self.events.name_taken(name, None) {
            return Err(reject(TrackerError::DuplicateName {
                kind: EntityKind::Event,
                name: name.to_string(),
            }));
        }

        let id = self.ids.allocate(&mut self.store)?;
        self.events.insert(Event::new(id, name, points, duration));
        self.store.save_events(&self.events)?;

        info!(id = %id, name, points, duration, "event added");
        Ok(id)
    }

    /// Remove an event, strip it from every registration and free its ID
    pub fn remove_event(&mut self, id: EntityId) -> Result<Event> {
        let event = self
            .events
            .remove(id)
            .ok_or_else(|| reject(TrackerError::event_not_found(id)))?;
        let affected = self.ledger.cascade_event(id);

        // Release before any write so a failed save never leaves the ID reserved
        self.ids.release(id, &mut self.store)?;
        self.store.save_events(&self.events)?;
        self.store.save_registrations(&self.ledger)?;

        info!(id = %id, name = %event.name, students = affected, "event removed");
        Ok(event)
    }

    pub fn rename_event(&mut self, current: &str, new_name: &str) -> Result<EntityId> {
        let (current, new_name) = (current.trim(), new_name.trim());
        let id = self.require_event(current)?;
        if self.events.name_taken(new_name, Some(id)) {
            return Err(reject(TrackerError::DuplicateName {
                kind: EntityKind::Event,
                name: new_name.to_string(),
            }));
        }

        if let Some(event) = self.events.get_mut(id) {
            event.set_name(new_name.to_string());
        }
        self.store.save_events(&self.events)?;

        info!(id = %id, from = current, to = new_name, "event renamed");
        Ok(id)
    }

    pub fn set_event_duration(&mut self, id: EntityId, duration: &str) -> Result<()> {
        let duration = duration.trim();
        let event = self
            .events
            .get_mut(id)
            .ok_or_else(|| reject(TrackerError::event_not_found(id)))?;
        event.set_duration(duration.to_string());
        self.store.save_events(&self.events)?;

        info!(id = %id, duration, "event duration updated");
        Ok(())
    }

    pub fn set_event_points(&mut self, id: EntityId, points: i32) -> Result<()> {
        let event = self
            .events
            .get_mut(id)
            .ok_or_else(|| reject(TrackerError::event_not_found(id)))?;
        event.set_points(points);
        self.store.save_events(&self.events)?;

        info!(id = %id, points, "event points updated");
        Ok(())
    }

    // ========================================================================
    // REGISTRATIONS
    // ========================================================================

    /// Register a student for an event.
    ///
    /// Returns `Ok(false)` without writing anything if the pair was already
    /// registered.
    pub fn register(&mut self, student: EntityId, event: EntityId) -> Result<bool> {
        if !self.students.contains(student) {
            return Err(reject(TrackerError::student_not_found(student)));
        }
        if !self.events.contains(event) {
            return Err(reject(TrackerError::event_not_found(event)));
        }

        if !self.ledger.register(student, event) {
            return Ok(false);
        }
        self.store.save_registrations(&self.ledger)?;

        info!(student = %student, event = %event, "registered");
        Ok(true)
    }

    /// Drop a registration; unknown pairs are a silent no-op
    pub fn dropoff(&mut self, student: EntityId, event: EntityId) -> Result<bool> {
        if !self.ledger.dropoff(student, event) {
            return Ok(false);
        }
        self.store.save_registrations(&self.ledger)?;

        info!(student = %student, event = %event, "dropped off");
        Ok(true)
    }

    pub fn is_registered(&self, student: EntityId, event: EntityId) -> bool {
        self.ledger.is_registered(student, event)
    }

    pub fn events_for(&self, student: EntityId) -> BTreeSet<EntityId> {
        self.ledger.events_for(student)
    }

    pub fn students_for(&self, event: EntityId) -> BTreeSet<EntityId> {
        self.ledger.students_for(event)
    }

    // ========================================================================
    // AGGREGATES
    // ========================================================================

    /// Sum of points over every event the student is registered for
    pub fn total_points(&self, student: EntityId) -> i64 {
        self.registered_events(student)
            .map(|e| i64::from(e.points))
            .sum()
    }

    /// Points from registered events whose duration equals `quarter` exactly
    pub fn quarterly_report(&self, quarter: &str, student: EntityId) -> i64 {
        self.registered_events(student)
            .filter(|e| e.is_in_quarter(quarter))
            .map(|e| i64::from(e.points))
            .sum()
    }

    /// Student with the most points in `quarter`.
    ///
    /// Ties go to the lowest ID. With at least one student there is always a
    /// winner, even if everyone scored zero.
    pub fn top_student_of_quarter(&self, quarter: &str) -> Option<&Student> {
        let mut best: Option<(&Student, i64)> = None;
        for student in self.students.iter() {
            let points = self.quarterly_report(quarter, student.id);
            match best {
                Some((_, top)) if points <= top => {}
                _ => best = Some((student, points)),
            }
        }
        best.map(|(student, _)| student)
    }

    /// Uniform pick among all current students
    pub fn random_winner(&mut self) -> Option<&Student> {
        if self.students.is_empty() {
            return None;
        }
        let index = self.rng.random_range(0..self.students.len());
        self.students.iter().nth(index)
    }

    fn registered_events(&self, student: EntityId) -> impl Iterator<Item = &Event> + '_ {
        self.ledger
            .events_for_iter(student)
            .filter_map(|id| self.events.get(id))
    }

    // ========================================================================
    // INTEGRITY
    // ========================================================================

    /// Every invariant currently violated (empty when consistent)
    pub fn verify_integrity(&self) -> Vec<IntegrityViolation> {
        let mut violations = Vec::new();

        for (student, event) in self.ledger.pairs() {
            if !self.students.contains(student) {
                violations.push(IntegrityViolation::DanglingStudent { student, event });
            }
            if !self.events.contains(event) {
                violations.push(IntegrityViolation::DanglingEvent { student, event });
            }
        }

        for id in self.students.ids() {
            if self.events.contains(id) {
                violations.push(IntegrityViolation::SharedId(id));
            }
        }

        for id in self.students.ids().chain(self.events.ids()) {
            if !self.ids.is_used(id) {
                violations.push(IntegrityViolation::UnreservedId(id));
            }
        }

        let mut seen = BTreeSet::new();
        for student in self.students.iter() {
            if !seen.insert(student.name.as_str()) {
                violations.push(IntegrityViolation::DuplicateName {
                    kind: EntityKind::Student,
                    name: student.name.clone(),
                });
            }
        }
        let mut seen = BTreeSet::new();
        for event in self.events.iter() {
            if !seen.insert(event.name.as_str()) {
                violations.push(IntegrityViolation::DuplicateName {
                    kind: EntityKind::Event,
                    name: event.name.clone(),
                });
            }
        }

        violations
    }
}

/// Log a non-fatal rejection and hand the error back
fn reject(err: TrackerError) -> TrackerError {
    warn!("{}", err);
    err
}

/// A broken invariant found by `verify_integrity`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    DanglingStudent { student: EntityId, event: EntityId },
    DanglingEvent { student: EntityId, event: EntityId },
    SharedId(EntityId),
    UnreservedId(EntityId),
    DuplicateName { kind: EntityKind, name: String },
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityViolation::DanglingStudent { student, event } => {
                write!(f, "registration {},{} references a missing student", student, event)
            }
            IntegrityViolation::DanglingEvent { student, event } => {
                write!(f, "registration {},{} references a missing event", student, event)
            }
            IntegrityViolation::SharedId(id) => {
                write!(f, "ID {} is used by both a student and an event", id)
            }
            IntegrityViolation::UnreservedId(id) => {
                write!(f, "live ID {} is not marked as used", id)
            }
            IntegrityViolation::DuplicateName { kind, name } => {
                write!(f, "{} name '{}' appears more than once", kind, name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CsvStore, MemoryStore, Snapshot};
    use tempfile::TempDir;

    fn tracker() -> StudentTracker<MemoryStore> {
        StudentTracker::open_seeded(MemoryStore::new(), &TrackerConfig::default(), 42).unwrap()
    }

    #[test]
    fn test_hackathon_scenario() {
        let mut tracker = tracker();

        let ada = tracker.add_student("Ada", 2025).unwrap();
        let hackathon = tracker.add_event("Hackathon", 10, "2023Q1").unwrap();
        assert!(tracker.register(ada, hackathon).unwrap());

        assert_eq!(tracker.total_points(ada), 10);
        assert_eq!(tracker.quarterly_report("2023Q1", ada), 10);
        assert_eq!(tracker.quarterly_report("2023Q2", ada), 0);
    }

    #[test]
    fn test_ids_unique_across_students_and_events() {
        let mut tracker = tracker();

        let mut ids = BTreeSet::new();
        for i in 0..50 {
            assert!(ids.insert(tracker.add_student(&format!("student-{}", i), 2025).unwrap()));
            assert!(ids.insert(tracker.add_event(&format!("event-{}", i), i, "2023Q1").unwrap()));
        }

        assert_eq!(ids.len(), 100);
        assert!(tracker.verify_integrity().is_empty());
    }

    #[test]
    fn test_duplicate_names_rejected_without_mutation() {
        let mut tracker = tracker();
        tracker.add_student("Ada", 2025).unwrap();
        tracker.add_event("Hackathon", 10, "2023Q1").unwrap();
        let writes = tracker.store().writes();

        let err = tracker.add_student("Ada", 2030).unwrap_err();
        assert!(matches!(err, TrackerError::DuplicateName { kind: EntityKind::Student, .. }));
        assert!(err.is_recoverable());

        let err = tracker.add_event("Hackathon", 1, "2023Q2").unwrap_err();
        assert!(matches!(err, TrackerError::DuplicateName { kind: EntityKind::Event, .. }));

        // A student and an event may share a name
        tracker.add_event("Ada", 1, "2023Q1").unwrap();

        assert_eq!(tracker.students().len(), 1);
        assert_eq!(tracker.store().writes().students, writes.students);
    }

    #[test]
    fn test_remove_frees_name_and_id() {
        let mut tracker = tracker();
        let ada = tracker.add_student("Ada", 2025).unwrap();

        let removed = tracker.remove_student(ada).unwrap();
        assert_eq!(removed.name, "Ada");
        assert!(!tracker.used_ids().contains(&ada));
        assert_eq!(tracker.student_id("Ada"), None);

        let again = tracker.add_student("Ada", 2025).unwrap();
        assert_eq!(tracker.student(again).map(|s| s.class_year), Some(2025));
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let mut tracker = tracker();

        let err = tracker.remove_student(EntityId::new(1)).unwrap_err();
        assert!(matches!(err, TrackerError::NotFound { kind: EntityKind::Student, .. }));

        let err = tracker.remove_event(EntityId::new(1)).unwrap_err();
        assert!(matches!(err, TrackerError::NotFound { kind: EntityKind::Event, .. }));
        assert_eq!(tracker.store().writes().total(), 0);
    }

    #[test]
    fn test_register_is_idempotent_and_writes_once() {
        let mut tracker = tracker();
        let ada = tracker.add_student("Ada", 2025).unwrap();
        let hackathon = tracker.add_event("Hackathon", 10, "2023Q1").unwrap();

        assert!(tracker.register(ada, hackathon).unwrap());
        assert!(!tracker.register(ada, hackathon).unwrap());

        assert!(tracker.is_registered(ada, hackathon));
        assert_eq!(tracker.store().writes().registrations, 1);
        assert_eq!(tracker.total_points(ada), 10);
    }

    #[test]
    fn test_register_requires_existing_entities() {
        let mut tracker = tracker();
        let ada = tracker.add_student("Ada", 2025).unwrap();
        let hackathon = tracker.add_event("Hackathon", 10, "2023Q1").unwrap();

        let err = tracker.register(hackathon, hackathon).unwrap_err();
        assert!(matches!(err, TrackerError::NotFound { kind: EntityKind::Student, .. }));

        let err = tracker.register(ada, ada).unwrap_err();
        assert!(matches!(err, TrackerError::NotFound { kind: EntityKind::Event, .. }));

        assert!(tracker.ledger().is_empty());
    }

    #[test]
    fn test_dropoff_never_registered_is_noop() {
        let mut tracker = tracker();
        let ada = tracker.add_student("Ada", 2025).unwrap();
        let hackathon = tracker.add_event("Hackathon", 10, "2023Q1").unwrap();

        assert!(!tracker.dropoff(ada, hackathon).unwrap());
        assert!(!tracker.dropoff(EntityId::new(1), EntityId::new(2)).unwrap());
        assert_eq!(tracker.store().writes().registrations, 0);

        tracker.register(ada, hackathon).unwrap();
        assert!(tracker.dropoff(ada, hackathon).unwrap());
        assert_eq!(tracker.total_points(ada), 0);
        assert!(tracker.store().snapshot().registrations.is_empty());
    }

    #[test]
    fn test_points_grow_with_registrations() {
        let mut tracker = tracker();
        let ada = tracker.add_student("Ada", 2025).unwrap();
        let a = tracker.add_event("A", 5, "2023Q1").unwrap();
        let b = tracker.add_event("B", 7, "2023Q2").unwrap();

        assert_eq!(tracker.total_points(ada), 0);
        tracker.register(ada, a).unwrap();
        assert_eq!(tracker.total_points(ada), 5);
        tracker.register(ada, b).unwrap();
        assert_eq!(tracker.total_points(ada), 12);
        tracker.register(ada, b).unwrap();
        assert_eq!(tracker.total_points(ada), 12);

        // Points follow the event's current value
        tracker.set_event_points(b, 20).unwrap();
        assert_eq!(tracker.total_points(ada), 25);
    }

    #[test]
    fn test_remove_event_cascades() {
        let mut tracker = tracker();
        let ada = tracker.add_student("Ada", 2025).unwrap();
        let grace = tracker.add_student("Grace", 2026).unwrap();
        let a = tracker.add_event("A", 5, "2023Q1").unwrap();
        let b = tracker.add_event("B", 7, "2023Q1").unwrap();
        tracker.register(ada, a).unwrap();
        tracker.register(ada, b).unwrap();
        tracker.register(grace, a).unwrap();

        tracker.remove_event(a).unwrap();

        assert_eq!(tracker.total_points(ada), 7);
        assert_eq!(tracker.total_points(grace), 0);
        assert!(tracker.events_for(grace).is_empty());
        assert!(!tracker.used_ids().contains(&a));
        assert_eq!(tracker.store().snapshot().registrations, vec![(ada, b)]);
        assert!(tracker.verify_integrity().is_empty());
    }

    #[test]
    fn test_remove_student_cascades() {
        let mut tracker = tracker();
        let ada = tracker.add_student("Ada", 2025).unwrap();
        let grace = tracker.add_student("Grace", 2026).unwrap();
        let a = tracker.add_event("A", 5, "2023Q1").unwrap();
        tracker.register(ada, a).unwrap();
        tracker.register(grace, a).unwrap();

        tracker.remove_student(ada).unwrap();

        let students: Vec<EntityId> = tracker.students_for(a).into_iter().collect();
        assert_eq!(students, vec![grace]);
        assert!(tracker.verify_integrity().is_empty());
    }

    #[test]
    fn test_quarterly_report_filters_exactly() {
        let mut tracker = tracker();
        let ada = tracker.add_student("Ada", 2025).unwrap();
        let q1 = tracker.add_event("Winter Fair", 5, "2023Q1").unwrap();
        let q1b = tracker.add_event("Robotics", 3, "2023Q1").unwrap();
        let q2 = tracker.add_event("Spring Fair", 8, "2023Q2").unwrap();
        let odd = tracker.add_event("Odd", 100, "2023q1").unwrap();
        for event in [q1, q1b, q2, odd] {
            tracker.register(ada, event).unwrap();
        }

        assert_eq!(tracker.quarterly_report("2023Q1", ada), 8);
        assert_eq!(tracker.quarterly_report("2023Q2", ada), 8);
        assert_eq!(tracker.quarterly_report("2023Q3", ada), 0);

        tracker.set_event_duration(q2, "2023Q1").unwrap();
        assert_eq!(tracker.quarterly_report("2023Q1", ada), 16);
    }

    #[test]
    fn test_top_student_of_quarter() {
        let mut tracker = tracker();
        let low = tracker.add_student("Low", 2025).unwrap();
        let high = tracker.add_student("High", 2025).unwrap();
        let five = tracker.add_event("Five", 5, "2023Q1").unwrap();
        let fifteen = tracker.add_event("Fifteen", 15, "2023Q1").unwrap();
        tracker.register(low, five).unwrap();
        tracker.register(high, fifteen).unwrap();

        let top = tracker.top_student_of_quarter("2023Q1").unwrap();
        assert_eq!(top.id, high);
    }

    #[test]
    fn test_top_student_ties_go_to_lowest_id() {
        let mut tracker = tracker();
        let first = tracker.add_student("First", 2025).unwrap();
        let second = tracker.add_student("Second", 2025).unwrap();
        let event = tracker.add_event("Tie", 10, "2023Q1").unwrap();
        tracker.register(first, event).unwrap();
        tracker.register(second, event).unwrap();

        let top = tracker.top_student_of_quarter("2023Q1").unwrap();
        assert_eq!(top.id, first.min(second));

        // Nobody scored: still the lowest ID
        let top = tracker.top_student_of_quarter("1999Q4").unwrap();
        assert_eq!(top.id, first.min(second));
    }

    #[test]
    fn test_no_winner_without_students() {
        let mut tracker = tracker();
        tracker.add_event("Lonely", 10, "2023Q1").unwrap();

        assert!(tracker.top_student_of_quarter("2023Q1").is_none());
        assert!(tracker.random_winner().is_none());
    }

    #[test]
    fn test_random_winner_is_a_current_student() {
        let mut tracker = tracker();
        let ids: BTreeSet<EntityId> = ["Ada", "Grace", "Linus"]
            .iter()
            .map(|name| tracker.add_student(name, 2025).unwrap())
            .collect();

        let mut picked = BTreeSet::new();
        for _ in 0..100 {
            let winner = tracker.random_winner().unwrap().id;
            assert!(ids.contains(&winner));
            picked.insert(winner);
        }
        assert_eq!(picked, ids);
    }

    #[test]
    fn test_rename_checks_collisions() {
        let mut tracker = tracker();
        let ada = tracker.add_student("Ada", 2025).unwrap();
        tracker.add_student("Grace", 2025).unwrap();

        let err = tracker.rename_student("Ada", "Grace").unwrap_err();
        assert!(matches!(err, TrackerError::DuplicateName { .. }));

        let err = tracker.rename_student("Nobody", "Someone").unwrap_err();
        assert!(matches!(err, TrackerError::NotFound { key: Lookup::Name(_), .. }));

        assert_eq!(tracker.rename_student("Ada", "Ada Lovelace").unwrap(), ada);
        assert_eq!(tracker.student_id("Ada Lovelace"), Some(ada));
        assert_eq!(tracker.student_id("Ada"), None);

        // Renaming to the same name is allowed
        assert_eq!(tracker.rename_student("Ada Lovelace", "Ada Lovelace").unwrap(), ada);
    }

    #[test]
    fn test_event_setters() {
        let mut tracker = tracker();
        let event = tracker.add_event("Hackathon", 10, "2023Q1").unwrap();

        tracker.rename_event("Hackathon", "Hackathon 2023").unwrap();
        tracker.set_event_points(event, 25).unwrap();
        tracker.set_event_duration(event, "2023Q3").unwrap();

        let saved = tracker.store().snapshot().events.iter().find(|e| e.id == event).cloned().unwrap();
        assert_eq!(saved, Event::new(event, "Hackathon 2023", 25, "2023Q3"));

        assert!(tracker.set_event_points(EntityId::new(99_999), 1).is_err());
        assert!(tracker.set_student_year(event, 2025).is_err());
    }

    #[test]
    fn test_allocator_exhaustion_stops_creation() {
        let config = TrackerConfig {
            id_digits: 1,
            max_id_tries: 1_000,
            ..TrackerConfig::default()
        };
        let mut tracker = StudentTracker::open_seeded(MemoryStore::new(), &config, 1).unwrap();
        for i in 0..10 {
            tracker.add_student(&format!("s{}", i), 2025).unwrap();
        }

        let err = tracker.add_event("One too many", 1, "2023Q1").unwrap_err();
        assert!(matches!(err, TrackerError::AllocatorExhausted { .. }));
        assert!(!err.is_recoverable());
        assert!(tracker.events().is_empty());
    }

    #[test]
    fn test_save_failure_propagates_without_rollback() {
        let mut tracker = tracker();
        let ada = tracker.add_student("Ada", 2025).unwrap();

        tracker.store_mut().reject_writes(true);
        let err = tracker.set_student_year(ada, 2030).unwrap_err();
        assert!(matches!(err, TrackerError::Persistence(_)));

        assert_eq!(tracker.student(ada).map(|s| s.class_year), Some(2030));
        assert_eq!(
            tracker.store().snapshot().students.iter().find(|s| s.id == ada).map(|s| s.class_year),
            Some(2025)
        );
    }

    #[test]
    fn test_load_reconciles_snapshot() {
        let students = vec![Student::new(EntityId::new(1), "Ada", 2025)];
        let events = vec![
            Event::new(EntityId::new(2), "Hackathon", 10, "2023Q1"),
            Event::new(EntityId::new(1), "Clash", 1, "2023Q1"),
        ];
        let snapshot = Snapshot {
            students: students.into_iter().collect(),
            events: events.into_iter().collect(),
            registrations: vec![
                (EntityId::new(1), EntityId::new(2)),
                (EntityId::new(1), EntityId::new(77)),
                (EntityId::new(5), EntityId::new(2)),
            ],
            used_ids: BTreeSet::new(),
        };

        let tracker = StudentTracker::open_seeded(
            MemoryStore::with_snapshot(snapshot),
            &TrackerConfig::default(),
            3,
        )
        .unwrap();

        assert_eq!(tracker.events().len(), 1);
        assert_eq!(tracker.ledger().len(), 1);
        assert!(tracker.used_ids().contains(&EntityId::new(1)));
        assert!(tracker.used_ids().contains(&EntityId::new(2)));
        assert!(tracker.verify_integrity().is_empty());
    }

    #[test]
    fn test_load_skips_duplicate_ids_and_names() {
        let snapshot = Snapshot {
            students: vec![
                Student::new(EntityId::new(1), "Ada", 2025),
                Student::new(EntityId::new(1), "Bob", 2026),
                Student::new(EntityId::new(2), "Ada", 2027),
                Student::new(EntityId::new(3), "Grace", 2026),
            ],
            events: vec![
                Event::new(EntityId::new(10), "Hackathon", 10, "2023Q1"),
                Event::new(EntityId::new(10), "Fair", 4, "2023Q1"),
                Event::new(EntityId::new(11), "Hackathon", 7, "2023Q2"),
            ],
            registrations: vec![
                (EntityId::new(1), EntityId::new(10)),
                (EntityId::new(2), EntityId::new(10)),
                (EntityId::new(3), EntityId::new(11)),
            ],
            used_ids: BTreeSet::new(),
        };

        let tracker = StudentTracker::open_seeded(
            MemoryStore::with_snapshot(snapshot),
            &TrackerConfig::default(),
            4,
        )
        .unwrap();

        // First record wins for both ID and name clashes
        let names: Vec<&str> = tracker.students().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Ada", "Grace"]);
        assert_eq!(tracker.student(EntityId::new(1)).map(|s| s.class_year), Some(2025));
        assert_eq!(tracker.events().len(), 1);
        assert_eq!(tracker.event(EntityId::new(10)).map(|e| e.points), Some(10));

        assert_eq!(tracker.ledger().len(), 1);
        assert_eq!(tracker.total_points(EntityId::new(1)), 10);
        assert!(tracker.verify_integrity().is_empty());
    }

    #[test]
    fn test_inputs_are_trimmed() {
        let mut tracker = tracker();
        let ada = tracker.add_student("Ada", 2025).unwrap();

        let err = tracker.add_student(" Ada ", 2026).unwrap_err();
        assert!(matches!(err, TrackerError::DuplicateName { .. }));

        let event = tracker.add_event("  Hackathon", 10, " 2023Q1 ").unwrap();
        assert_eq!(tracker.event_id("Hackathon"), Some(event));
        assert_eq!(tracker.event(event).map(|e| e.duration.as_str()), Some("2023Q1"));

        tracker.rename_student(" Ada", "Ada Lovelace ").unwrap();
        assert_eq!(tracker.student_id("Ada Lovelace"), Some(ada));

        tracker.set_event_duration(event, "2023Q2\t").unwrap();
        assert_eq!(tracker.quarterly_report("2023Q2", ada), 0);
        tracker.register(ada, event).unwrap();
        assert_eq!(tracker.quarterly_report("2023Q2", ada), 10);
    }

    #[test]
    fn test_padded_input_reloads_equal() {
        let temp_dir = TempDir::new().unwrap();
        let config = TrackerConfig {
            data_dir: temp_dir.path().to_path_buf(),
            ..TrackerConfig::default()
        };

        let mut tracker =
            StudentTracker::open_seeded(CsvStore::open(&config).unwrap(), &config, 11).unwrap();
        tracker.add_student("Ada", 2025).unwrap();
        assert!(tracker.add_student(" Ada ", 2025).is_err());
        let grace = tracker.add_student(" Grace ", 2026).unwrap();
        let event = tracker.add_event(" Hackathon ", 10, " 2023Q1 ").unwrap();
        tracker.register(grace, event).unwrap();

        let reloaded =
            StudentTracker::open_seeded(CsvStore::open(&config).unwrap(), &config, 12).unwrap();

        assert_eq!(reloaded.students(), tracker.students());
        assert_eq!(reloaded.events(), tracker.events());
        assert_eq!(reloaded.ledger(), tracker.ledger());
        assert_eq!(reloaded.quarterly_report("2023Q1", grace), 10);
        assert!(reloaded.verify_integrity().is_empty());
    }

    #[test]
    fn test_failed_remove_still_frees_id() {
        let mut tracker = tracker();
        let ada = tracker.add_student("Ada", 2025).unwrap();
        let event = tracker.add_event("Hackathon", 10, "2023Q1").unwrap();

        tracker.store_mut().reject_writes(true);
        let err = tracker.remove_student(ada).unwrap_err();
        assert!(matches!(err, TrackerError::Persistence(_)));
        assert!(!tracker.used_ids().contains(&ada));
        assert!(tracker.student(ada).is_none());

        let err = tracker.remove_event(event).unwrap_err();
        assert!(matches!(err, TrackerError::Persistence(_)));
        assert!(!tracker.used_ids().contains(&event));
        assert!(tracker.verify_integrity().is_empty());
    }

    #[test]
    fn test_csv_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let config = TrackerConfig {
            data_dir: temp_dir.path().to_path_buf(),
            ..TrackerConfig::default()
        };

        let mut tracker =
            StudentTracker::open_seeded(CsvStore::open(&config).unwrap(), &config, 9).unwrap();
        let ada = tracker.add_student("Ada", 2025).unwrap();
        let grace = tracker.add_student("Grace", 2026).unwrap();
        let a = tracker.add_event("Hackathon", 10, "2023Q1").unwrap();
        let b = tracker.add_event("Science Fair", 4, "2023Q2").unwrap();
        tracker.register(ada, a).unwrap();
        tracker.register(ada, b).unwrap();
        tracker.register(grace, b).unwrap();
        tracker.set_student_year(grace, 2027).unwrap();

        let reloaded =
            StudentTracker::open_seeded(CsvStore::open(&config).unwrap(), &config, 10).unwrap();

        assert_eq!(reloaded.students(), tracker.students());
        assert_eq!(reloaded.events(), tracker.events());
        assert_eq!(reloaded.ledger(), tracker.ledger());
        assert_eq!(reloaded.used_ids(), tracker.used_ids());
        assert_eq!(reloaded.total_points(ada), 14);
    }
}
