// State module - Persistent health record for the supervisor

use crate::error::{Result, VigilError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::warn;

/// Version of the state file format
const STATE_VERSION: &str = "1.0.0";

/// Last-observed status of a managed service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Healthy,
    Down,
    Restarted,
    RestartFailed,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceStatus::Healthy => write!(f, "healthy"),
            ServiceStatus::Down => write!(f, "down"),
            ServiceStatus::Restarted => write!(f, "restarted"),
            ServiceStatus::RestartFailed => write!(f, "restart_failed"),
        }
    }
}

/// Health record that survives supervisor restarts.
///
/// Restart counts are cumulative for the lifetime of the state file: a new
/// supervisor run keeps counting where the previous one stopped. Only a
/// missing or unparsable state file resets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthState {
    #[serde(default = "default_version")]
    pub version: String,
    /// Start of the current supervisor run
    #[serde(default = "SystemTime::now")]
    pub started_at: SystemTime,
    /// Completed sweeps since the state file was created
    #[serde(default)]
    pub checks_performed: u64,
    #[serde(default)]
    pub last_check_at: Option<SystemTime>,
    /// Cumulative restart attempts per service, never decreasing
    #[serde(default)]
    pub restart_counts: HashMap<String, u64>,
    #[serde(default)]
    pub status_by_service: HashMap<String, ServiceStatus>,
}

fn default_version() -> String {
    STATE_VERSION.to_string()
}

impl HealthState {
    /// Create a fresh, empty health state
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            started_at: SystemTime::now(),
            checks_performed: 0,
            last_check_at: None,
            restart_counts: HashMap::new(),
            status_by_service: HashMap::new(),
        }
    }

    /// Count one restart attempt for a service and return the new total.
    ///
    /// Counted on every attempt regardless of launch outcome; success vs
    /// failure is recorded separately in `status_by_service`.
    pub fn record_restart_attempt(&mut self, name: &str) -> u64 {
        let count = self.restart_counts.entry(name.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Cumulative restart attempts for a service since the state file was created
    pub fn restart_count(&self, name: &str) -> u64 {
        self.restart_counts.get(name).copied().unwrap_or(0)
    }

    /// Record the last-observed status of a service
    pub fn set_status(&mut self, name: &str, status: ServiceStatus) {
        self.status_by_service.insert(name.to_string(), status);
    }

    /// Last-observed status of a service, if it has been swept at least once
    pub fn status(&self, name: &str) -> Option<ServiceStatus> {
        self.status_by_service.get(name).copied()
    }

    /// Elapsed time of the current supervisor run
    pub fn uptime(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.started_at)
            .unwrap_or(Duration::from_secs(0))
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

/// State store handles persistence of the health record to disk
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Create a new state store with the given file path
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load state from disk, degrading to defaults instead of failing.
    ///
    /// A missing or unparsable file yields a fresh state: losing historical
    /// restart counts is acceptable, aborting startup is not. Fields absent
    /// from an older file merge over in-memory defaults.
    pub fn load(&self) -> HealthState {
        if !self.path.exists() {
            return HealthState::new();
        }

        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                warn!(
                    "unreadable state file {}, starting fresh: {}",
                    self.path.display(),
                    e
                );
                return HealthState::new();
            }
        };

        match serde_json::from_reader(BufReader::new(file)) {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    "corrupt state file {}, starting fresh: {}",
                    self.path.display(),
                    e
                );
                HealthState::new()
            }
        }
    }

    /// Save state to disk with atomic writes.
    ///
    /// Writes to a temporary file and renames it over the target, so an
    /// interrupted save leaves the previous valid record intact.
    pub fn save(&self, state: &HealthState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                VigilError::StateSaveError(format!("Failed to create state directory: {}", e))
            })?;
        }

        let temp_path = self.path.with_extension("tmp");

        {
            let file = File::create(&temp_path).map_err(|e| {
                VigilError::StateSaveError(format!("Failed to create temp state file: {}", e))
            })?;

            let mut writer = BufWriter::new(file);

            serde_json::to_writer_pretty(&mut writer, state).map_err(|e| {
                VigilError::StateSaveError(format!("Failed to serialize state: {}", e))
            })?;

            writer.flush().map_err(|e| {
                VigilError::StateSaveError(format!("Failed to flush state file: {}", e))
            })?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            VigilError::StateSaveError(format!("Failed to rename temp state file: {}", e))
        })?;

        Ok(())
    }

    /// Get the path to the state file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
