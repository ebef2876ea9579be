// Tracker configuration
//
// Loaded from an optional TOML file; every field has a default so an empty
// file (or no file) gives the stock layout under ./data.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TrackerError};
use crate::ids::{DEFAULT_ID_DIGITS, DEFAULT_MAX_TRIES, MAX_ID_DIGITS};
use crate::quarter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Directory holding the four data files
    pub data_dir: PathBuf,

    pub student_file: String,
    pub event_file: String,
    pub participation_file: String,
    pub used_ids_file: String,

    /// Digits per generated ID (4 → 0..=9999)
    pub id_digits: u32,

    /// Random draws before allocation gives up
    pub max_id_tries: u32,

    /// Quarter used by reports when none is given (None = current quarter)
    pub default_quarter: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            data_dir: PathBuf::from("data"),
            student_file: "student".to_string(),
            event_file: "event".to_string(),
            participation_file: "participation".to_string(),
            used_ids_file: "usedIDs".to_string(),
            id_digits: DEFAULT_ID_DIGITS,
            max_id_tries: DEFAULT_MAX_TRIES,
            default_quarter: None,
        }
    }
}

impl TrackerConfig {
    /// Parse a TOML config file and validate it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            TrackerError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: TrackerConfig = toml::from_str(content)
            .map_err(|e| TrackerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id_digits == 0 || self.id_digits > MAX_ID_DIGITS {
            return Err(TrackerError::InvalidConfig(format!(
                "id_digits must be between 1 and {}, got {}",
                MAX_ID_DIGITS, self.id_digits
            )));
        }
        if self.max_id_tries == 0 {
            return Err(TrackerError::InvalidConfig(
                "max_id_tries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Configured default quarter, or the current calendar quarter
    pub fn report_quarter(&self) -> String {
        self.default_quarter
            .clone()
            .unwrap_or_else(quarter::current_quarter)
    }

    pub fn student_path(&self) -> PathBuf {
        self.data_dir.join(&self.student_file)
    }

    pub fn event_path(&self) -> PathBuf {
        self.data_dir.join(&self.event_file)
    }

    pub fn participation_path(&self) -> PathBuf {
        self.data_dir.join(&self.participation_file)
    }

    pub fn used_ids_path(&self) -> PathBuf {
        self.data_dir.join(&self.used_ids_file)
    }
}
