// Entity Registry - ID-keyed storage with name lookup
//
// Iteration is in ascending ID order; reports that break ties by "first
// encountered" depend on this.

use std::collections::BTreeMap;

use super::{Entity, EntityId, Event, Student};

pub type StudentRegistry = Registry<Student>;
pub type EventRegistry = Registry<Event>;

/// Registry of all live entities of one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry<T> {
    entries: BTreeMap<EntityId, T>,
}

impl<T: Entity> Registry<T> {
    pub fn new() -> Self {
        Registry {
            entries: BTreeMap::new(),
        }
    }

    /// Insert (or replace) an entity under its own ID
    pub fn insert(&mut self, entity: T) -> Option<T> {
        self.entries.insert(entity.id(), entity)
    }

    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        self.entries.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.entries.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Find entity by exact name (linear scan)
    pub fn find_by_name(&self, name: &str) -> Option<&T> {
        self.entries.values().find(|e| e.name() == name)
    }

    /// Get the ID for a name, if any entity carries it
    pub fn find_id_by_name(&self, name: &str) -> Option<EntityId> {
        self.find_by_name(name).map(|e| e.id())
    }

    /// Check whether `name` is used by any entity other than `except`
    pub fn name_taken(&self, name: &str, except: Option<EntityId>) -> bool {
        self.entries
            .values()
            .any(|e| e.name() == name && Some(e.id()) != except)
    }

    /// All entities, ascending by ID
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Entity> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> FromIterator<T> for Registry<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut registry = Registry::new();
        for entity in iter {
            registry.insert(entity);
        }
        registry
    }
}
