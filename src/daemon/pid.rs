// PID file guard - one supervisor instance per state file

use crate::error::{Result, VigilError};
use std::fs;
use std::path::{Path, PathBuf};

/// Manages the supervisor PID file.
///
/// Two supervisors against the same state file is undefined behavior; the
/// PID file turns that into a fail-fast startup error instead.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Create a PID file manager for the given path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Claim the PID file for the current process.
    ///
    /// Fails with `AlreadyRunning` when another live supervisor holds it;
    /// a stale file left by a dead run is cleaned up and reclaimed.
    pub fn acquire(&self) -> Result<()> {
        if self.exists() {
            if let Ok(pid) = self.read() {
                if pid != std::process::id() && Self::is_process_alive(pid) {
                    return Err(VigilError::AlreadyRunning(pid));
                }
            }
            self.remove()?;
        }

        self.write()
    }

    /// Write the current process PID to the file
    pub fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                VigilError::PidFileError(format!("Failed to create PID file directory: {}", e))
            })?;
        }

        let pid = std::process::id();
        fs::write(&self.path, pid.to_string())
            .map_err(|e| VigilError::PidFileError(format!("Failed to write PID file: {}", e)))?;
        Ok(())
    }

    /// Read the PID from the file
    pub fn read(&self) -> Result<u32> {
        let content = fs::read_to_string(&self.path)
            .map_err(|e| VigilError::PidFileError(format!("Failed to read PID file: {}", e)))?;

        content
            .trim()
            .parse::<u32>()
            .map_err(|e| VigilError::PidFileError(format!("Invalid PID in file: {}", e)))
    }

    /// Check if the PID file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Remove the PID file
    pub fn remove(&self) -> Result<()> {
        if self.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                VigilError::PidFileError(format!("Failed to remove PID file: {}", e))
            })?;
        }
        Ok(())
    }

    /// Check if a process with the given PID is alive
    #[cfg(unix)]
    fn is_process_alive(pid: u32) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        // Signal 0 probes for existence without delivering anything
        match kill(Pid::from_raw(pid as i32), None) {
            Ok(_) => true,
            Err(nix::errno::Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    #[cfg(not(unix))]
    fn is_process_alive(_pid: u32) -> bool {
        // Without a portable liveness check, assume the holder is alive
        true
    }

    /// Get the path to the PID file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
