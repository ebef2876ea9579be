// Student Tracker - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod config;
pub mod entities;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod quarter;
pub mod report;
pub mod store;
pub mod tracker;

// Re-export commonly used types
pub use config::TrackerConfig;
pub use entities::{Entity, EntityId, Event, EventRegistry, Registry, Student, StudentRegistry};
pub use error::{EntityKind, Lookup, Result, StoreError, TrackerError};
pub use ids::IdAllocator;
pub use ledger::RegistrationLedger;
pub use report::{EventRow, QuarterStanding, StudentRow, WinnerSummary};
pub use store::{CsvStore, MemoryStore, Snapshot, TrackerStore, WriteCounts};
pub use tracker::{IntegrityViolation, StudentTracker};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tracker backed by the flat files under the configured data directory
pub fn open_file_tracker(config: &TrackerConfig) -> Result<StudentTracker<CsvStore>> {
    let store = CsvStore::open(config)?;
    StudentTracker::open(store, config)
}
