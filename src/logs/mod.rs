// Event log - append-only timestamped record of every observation and action

use crate::error::{Result, VigilError};
use chrono::{Local, SecondsFormat};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Append-only event log, mirrored to standard output.
///
/// Every line carries an ISO-8601 timestamp prefix. The log is the sole
/// user-visible feedback channel of the supervisor; retention and rotation
/// are left to external tooling.
pub struct EventLog {
    path: PathBuf,
    file: File,
}

impl EventLog {
    /// Open the event log in append mode, creating it and its parent
    /// directory as needed.
    ///
    /// Failing here is fatal for the daemon: a supervisor that cannot record
    /// events must not start.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                VigilError::LogFileError(format!("Failed to create log directory: {}", e))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| VigilError::LogFileError(format!("Failed to open event log: {}", e)))?;

        Ok(Self { path, file })
    }

    /// Append a timestamped line and mirror it to stdout.
    ///
    /// Best-effort: a failed file write is reported through tracing and
    /// otherwise swallowed, since losing a log line must not halt
    /// supervision.
    pub fn record(&mut self, message: &str) {
        let line = format!(
            "{} {}",
            Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            message
        );

        println!("{}", line);

        if let Err(e) = writeln!(self.file, "{}", line) {
            warn!(
                "failed to append to event log {}: {}",
                self.path.display(),
                e
            );
        }
    }

    /// Get the path to the event log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
