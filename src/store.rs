// 💾 Persistence Adapter - flat delimited files, one entity per line
//
// Formats (headerless, comma-separated):
//   student        id,name,classYear
//   event          id,name,points,duration
//   participation  studentId,eventId
//   usedIDs        id
//
// Load is best-effort: malformed lines are skipped with a warning.
// Save fully rewrites the target file from in-memory state.

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::entities::{EntityId, Event, EventRegistry, Student, StudentRegistry};
use crate::error::StoreError;
use crate::ledger::RegistrationLedger;

/// Everything a store hands back on load, in stored order.
///
/// Entities stay as raw rows: duplicate IDs or names are left for the
/// tracker to reconcile rather than collapsed here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub students: Vec<Student>,
    pub events: Vec<Event>,
    pub registrations: Vec<(EntityId, EntityId)>,
    pub used_ids: BTreeSet<EntityId>,
}

/// Backing store for the tracker; one save per collection
pub trait TrackerStore {
    fn load(&mut self) -> Result<Snapshot, StoreError>;

    fn save_students(&mut self, students: &StudentRegistry) -> Result<(), StoreError>;

    fn save_events(&mut self, events: &EventRegistry) -> Result<(), StoreError>;

    fn save_registrations(&mut self, ledger: &RegistrationLedger) -> Result<(), StoreError>;

    fn save_used_ids(&mut self, used: &BTreeSet<EntityId>) -> Result<(), StoreError>;
}

// ============================================================================
// CSV FILE STORE
// ============================================================================

#[derive(Debug, Clone)]
pub struct CsvStore {
    student_path: PathBuf,
    event_path: PathBuf,
    participation_path: PathBuf,
    used_ids_path: PathBuf,
}

impl CsvStore {
    /// Store rooted at the configured data directory (created if missing)
    pub fn open(config: &TrackerConfig) -> Result<Self, StoreError> {
        fs::create_dir_all(&config.data_dir).map_err(|source| StoreError::Io {
            path: config.data_dir.clone(),
            source,
        })?;

        Ok(CsvStore {
            student_path: config.student_path(),
            event_path: config.event_path(),
            participation_path: config.participation_path(),
            used_ids_path: config.used_ids_path(),
        })
    }

    /// Store with the default file names inside `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let config = TrackerConfig {
            data_dir: dir.into(),
            ..TrackerConfig::default()
        };
        Self::open(&config)
    }

    pub fn student_path(&self) -> &Path {
        &self.student_path
    }

    pub fn event_path(&self) -> &Path {
        &self.event_path
    }

    pub fn participation_path(&self) -> &Path {
        &self.participation_path
    }

    pub fn used_ids_path(&self) -> &Path {
        &self.used_ids_path
    }
}

impl TrackerStore for CsvStore {
    fn load(&mut self) -> Result<Snapshot, StoreError> {
        let students = read_records(&self.student_path, "student", 3, |r| {
            Some(Student::new(parse_id(r, 0)?, r.get(1)?, r.get(2)?.parse().ok()?))
        })?;

        let events = read_records(&self.event_path, "event", 4, |r| {
            Some(Event::new(
                parse_id(r, 0)?,
                r.get(1)?,
                r.get(2)?.parse().ok()?,
                r.get(3)?,
            ))
        })?;

        let registrations = read_records(&self.participation_path, "participation", 2, |r| {
            Some((parse_id(r, 0)?, parse_id(r, 1)?))
        })?;

        let used_ids = read_records(&self.used_ids_path, "used ID", 1, |r| parse_id(r, 0))?
            .into_iter()
            .collect();

        info!(
            students = students.len(),
            events = events.len(),
            registrations = registrations.len(),
            "loaded tracker files"
        );

        Ok(Snapshot {
            students,
            events,
            registrations,
            used_ids,
        })
    }

    fn save_students(&mut self, students: &StudentRegistry) -> Result<(), StoreError> {
        write_records(
            &self.student_path,
            students.iter().map(|s| {
                vec![s.id.to_string(), s.name.clone(), s.class_year.to_string()]
            }),
        )
    }

    fn save_events(&mut self, events: &EventRegistry) -> Result<(), StoreError> {
        write_records(
            &self.event_path,
            events.iter().map(|e| {
                vec![
                    e.id.to_string(),
                    e.name.clone(),
                    e.points.to_string(),
                    e.duration.clone(),
                ]
            }),
        )
    }

    fn save_registrations(&mut self, ledger: &RegistrationLedger) -> Result<(), StoreError> {
        write_records(
            &self.participation_path,
            ledger
                .pairs()
                .map(|(student, event)| vec![student.to_string(), event.to_string()]),
        )
    }

    fn save_used_ids(&mut self, used: &BTreeSet<EntityId>) -> Result<(), StoreError> {
        write_records(&self.used_ids_path, used.iter().map(|id| vec![id.to_string()]))
    }
}

fn parse_id(record: &StringRecord, index: usize) -> Option<EntityId> {
    record.get(index)?.parse::<u32>().ok().map(EntityId::new)
}

/// Read every well-formed line; a missing file reads as empty
fn read_records<T, F>(
    path: &Path,
    kind: &str,
    expected_fields: usize,
    parse: F,
) -> Result<Vec<T>, StoreError>
where
    F: Fn(&StringRecord) -> Option<T>,
{
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "{} file not found, starting empty", kind);
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(file);

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let line = index + 1;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %path.display(), line, error = %e, "unreadable {} line skipped", kind);
                continue;
            }
        };

        if record.len() != expected_fields {
            warn!(
                path = %path.display(),
                line,
                fields = record.len(),
                "bad {} line skipped: {:?}",
                kind,
                record
            );
            continue;
        }

        match parse(&record) {
            Some(row) => rows.push(row),
            None => warn!(
                path = %path.display(),
                line,
                "bad {} line skipped: {:?}",
                kind,
                record
            ),
        }
    }

    Ok(rows)
}

/// Rewrite `path` with one record per item
fn write_records<I>(path: &Path, records: I) -> Result<(), StoreError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err)?;

    let mut count = 0usize;
    for record in records {
        writer.write_record(&record).map_err(csv_err)?;
        count += 1;
    }

    writer.flush().map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), records = count, "rewrote file");
    Ok(())
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// How many times each collection has been written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub students: usize,
    pub events: usize,
    pub registrations: usize,
    pub used_ids: usize,
}

impl WriteCounts {
    pub fn total(&self) -> usize {
        self.students + self.events + self.registrations + self.used_ids
    }
}

/// Store that keeps the last saved state in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    saved: Snapshot,
    writes: WriteCounts,
    reject_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from previously saved state
    pub fn with_snapshot(saved: Snapshot) -> Self {
        MemoryStore {
            saved,
            ..Self::default()
        }
    }

    /// Make every subsequent save fail
    pub fn reject_writes(&mut self, reject: bool) {
        self.reject_writes = reject;
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.saved
    }

    pub fn writes(&self) -> WriteCounts {
        self.writes
    }

    fn check(&self, collection: &'static str) -> Result<(), StoreError> {
        if self.reject_writes {
            Err(StoreError::WriteRejected { collection })
        } else {
            Ok(())
        }
    }
}

impl TrackerStore for MemoryStore {
    fn load(&mut self) -> Result<Snapshot, StoreError> {
        Ok(self.saved.clone())
    }

    fn save_students(&mut self, students: &StudentRegistry) -> Result<(), StoreError> {
        self.check("students")?;
        self.saved.students = students.iter().cloned().collect();
        self.writes.students += 1;
        Ok(())
    }

    fn save_events(&mut self, events: &EventRegistry) -> Result<(), StoreError> {
        self.check("events")?;
        self.saved.events = events.iter().cloned().collect();
        self.writes.events += 1;
        Ok(())
    }

    fn save_registrations(&mut self, ledger: &RegistrationLedger) -> Result<(), StoreError> {
        self.check("registrations")?;
        self.saved.registrations = ledger.pairs().collect();
        self.writes.registrations += 1;
        Ok(())
    }

    fn save_used_ids(&mut self, used: &BTreeSet<EntityId>) -> Result<(), StoreError> {
        self.check("used IDs")?;
        self.saved.used_ids = used.clone();
        self.writes.used_ids += 1;
        Ok(())
    }
}
