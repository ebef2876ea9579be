// 📋 Registration Ledger - student → set of events
//
// Sparse: a student with no registrations has no entry at all.
// The ledger does not know which IDs exist; the tracker checks referential
// integrity before calling `register` and drives the cascades on removal.

use std::collections::{BTreeMap, BTreeSet};

use crate::entities::EntityId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationLedger {
    entries: BTreeMap<EntityId, BTreeSet<EntityId>>,
}

impl RegistrationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a registration. Returns false if the pair already existed.
    pub fn register(&mut self, student: EntityId, event: EntityId) -> bool {
        self.entries.entry(student).or_default().insert(event)
    }

    /// Remove a registration. Returns false if the pair was not registered.
    pub fn dropoff(&mut self, student: EntityId, event: EntityId) -> bool {
        let Some(events) = self.entries.get_mut(&student) else {
            return false;
        };
        let removed = events.remove(&event);
        if events.is_empty() {
            self.entries.remove(&student);
        }
        removed
    }

    pub fn is_registered(&self, student: EntityId, event: EntityId) -> bool {
        self.entries
            .get(&student)
            .is_some_and(|events| events.contains(&event))
    }

    /// Events the student is registered for (empty if none)
    pub fn events_for(&self, student: EntityId) -> BTreeSet<EntityId> {
        self.entries.get(&student).cloned().unwrap_or_default()
    }

    pub fn events_for_iter(&self, student: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.entries.get(&student).into_iter().flatten().copied()
    }

    /// Students registered for the event
    pub fn students_for(&self, event: EntityId) -> BTreeSet<EntityId> {
        self.entries
            .iter()
            .filter(|(_, events)| events.contains(&event))
            .map(|(student, _)| *student)
            .collect()
    }

    // ========================================================================
    // CASCADES (invoked by the tracker's remove operations)
    // ========================================================================

    /// Drop every registration of a removed student
    pub fn cascade_student(&mut self, student: EntityId) -> usize {
        self.entries.remove(&student).map_or(0, |events| events.len())
    }

    /// Strip a removed event from every student, dropping emptied entries
    pub fn cascade_event(&mut self, event: EntityId) -> usize {
        let mut affected = 0;
        self.entries.retain(|_, events| {
            if events.remove(&event) {
                affected += 1;
            }
            !events.is_empty()
        });
        affected
    }

    /// All (student, event) pairs, ordered by student then event
    pub fn pairs(&self) -> impl Iterator<Item = (EntityId, EntityId)> + '_ {
        self.entries
            .iter()
            .flat_map(|(student, events)| events.iter().map(move |event| (*student, *event)))
    }

    /// Students that currently have an entry
    pub fn students(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entries.keys().copied()
    }

    /// Number of registered pairs
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(EntityId, EntityId)> for RegistrationLedger {
    fn from_iter<I: IntoIterator<Item = (EntityId, EntityId)>>(iter: I) -> Self {
        let mut ledger = RegistrationLedger::new();
        for (student, event) in iter {
            ledger.register(student, event);
        }
        ledger
    }
}
