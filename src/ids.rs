// 🔢 ID Allocator - one ID space for students AND events
//
// IDs are random integers in [0, 10^digits). A candidate is accepted if it
// is not in the used set; after `max_tries` misses the allocation fails.
// Every successful allocate/release writes the used set through to the store
// before returning.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use tracing::debug;

use crate::entities::EntityId;
use crate::error::{Result, TrackerError};
use crate::store::TrackerStore;

pub const DEFAULT_ID_DIGITS: u32 = 4;
pub const DEFAULT_MAX_TRIES: u32 = 100;

/// Largest digit count whose range still fits in a u32
pub const MAX_ID_DIGITS: u32 = 9;

#[derive(Debug)]
pub struct IdAllocator {
    used: BTreeSet<EntityId>,
    digits: u32,
    max_tries: u32,
    rng: StdRng,
}

impl IdAllocator {
    /// Allocator seeded from the OS, with the default 4-digit / 100-try policy
    pub fn new(used: BTreeSet<EntityId>) -> Self {
        Self::with_rng(used, StdRng::from_os_rng())
    }

    pub fn with_rng(used: BTreeSet<EntityId>, rng: StdRng) -> Self {
        IdAllocator {
            used,
            digits: DEFAULT_ID_DIGITS,
            max_tries: DEFAULT_MAX_TRIES,
            rng,
        }
    }

    /// Override the ID length and retry bound
    pub fn with_policy(mut self, digits: u32, max_tries: u32) -> Result<Self> {
        if digits == 0 || digits > MAX_ID_DIGITS {
            return Err(TrackerError::InvalidConfig(format!(
                "id_digits must be between 1 and {}, got {}",
                MAX_ID_DIGITS, digits
            )));
        }
        if max_tries == 0 {
            return Err(TrackerError::InvalidConfig(
                "max_id_tries must be at least 1".to_string(),
            ));
        }
        self.digits = digits;
        self.max_tries = max_tries;
        Ok(self)
    }

    /// Exclusive upper bound of the ID range (10^digits)
    pub fn capacity(&self) -> u32 {
        10u32.pow(self.digits)
    }

    /// Draw a fresh unused ID, mark it used and persist the used set
    pub fn allocate<S: TrackerStore + ?Sized>(&mut self, store: &mut S) -> Result<EntityId> {
        let upper = self.capacity();

        for _ in 0..self.max_tries {
            let candidate = EntityId::new(self.rng.random_range(0..upper));
            if self.used.insert(candidate) {
                store.save_used_ids(&self.used)?;
                debug!(id = %candidate, used = self.used.len(), "allocated ID");
                return Ok(candidate);
            }
        }

        Err(TrackerError::AllocatorExhausted {
            tries: self.max_tries,
            digits: self.digits,
        })
    }

    /// Free an ID for reuse. Untracked IDs are ignored and nothing is written.
    pub fn release<S: TrackerStore + ?Sized>(&mut self, id: EntityId, store: &mut S) -> Result<bool> {
        if !self.used.remove(&id) {
            return Ok(false);
        }
        store.save_used_ids(&self.used)?;
        debug!(id = %id, used = self.used.len(), "released ID");
        Ok(true)
    }

    /// Mark an ID as used without persisting (load-time reconciliation)
    pub(crate) fn reserve(&mut self, id: EntityId) -> bool {
        self.used.insert(id)
    }

    pub fn is_used(&self, id: EntityId) -> bool {
        self.used.contains(&id)
    }

    pub fn used(&self) -> &BTreeSet<EntityId> {
        &self.used
    }
}
