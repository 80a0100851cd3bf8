use crate::error::{Result, VigilError};
use crate::service::ServiceDescriptor;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, System};
use tokio::process::Command;
use tracing::debug;

/// Liveness check capability for one service.
///
/// Implementations report `Ok(true)` only on a positive signal; `Ok(false)`
/// and `Err` are both treated by the checker as "not alive".
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self) -> Result<bool>;
}

/// Execute a descriptor's probe with a bounded wall-clock timeout.
///
/// Probe errors and timeouts are treated identically to "not alive": an
/// unreachable probe cannot confirm the target healthy, and restarting on
/// uncertainty beats silent staleness.
pub async fn check_liveness(descriptor: &ServiceDescriptor, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, descriptor.probe().check()).await {
        Ok(Ok(alive)) => alive,
        Ok(Err(e)) => {
            debug!("probe for '{}' errored: {}", descriptor.name, e);
            false
        }
        Err(_) => {
            debug!(
                "probe for '{}' timed out after {:?}",
                descriptor.name, timeout
            );
            false
        }
    }
}

/// Probe that scans the OS process table for a name or command-line match.
///
/// The supervisor's own process is excluded so a pattern that happens to
/// match the daemon never reports a dead service as alive.
pub struct ProcessPatternProbe {
    pattern: String,
}

impl ProcessPatternProbe {
    /// Create a probe matching the given substring
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

#[async_trait]
impl Probe for ProcessPatternProbe {
    async fn check(&self) -> Result<bool> {
        let pattern = self.pattern.clone();

        // sysinfo refreshes synchronously; keep it off the runtime threads
        tokio::task::spawn_blocking(move || process_table_matches(&pattern))
            .await
            .map_err(|e| VigilError::ProbeFailed(format!("process table scan failed: {}", e)))
    }
}

fn process_table_matches(pattern: &str) -> bool {
    let mut system = System::new();
    system.refresh_processes_specifics(
        sysinfo::ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::everything(),
    );

    let own_pid = sysinfo::get_current_pid().ok();

    system.processes().iter().any(|(pid, process)| {
        if Some(*pid) == own_pid {
            return false;
        }
        if process.name().to_string_lossy().contains(pattern) {
            return true;
        }
        process
            .cmd()
            .iter()
            .any(|arg| arg.to_string_lossy().contains(pattern))
    })
}

/// Probe that runs a shell command and reads its output as the signal.
///
/// A non-empty stdout is the positive signal (pgrep-style: matching output
/// means a live target was found); an empty result or a non-zero exit means
/// the target could not be confirmed.
pub struct CommandProbe {
    command: String,
}

impl CommandProbe {
    /// Create a probe running the given shell command
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Probe for CommandProbe {
    async fn check(&self) -> Result<bool> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                VigilError::ProbeFailed(format!(
                    "failed to run probe command '{}': {}",
                    self.command, e
                ))
            })?;

        if !output.status.success() {
            return Ok(false);
        }

        Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::launcher::StartAction;
    use std::sync::Arc;

    struct NoopStart;

    #[async_trait]
    impl StartAction for NoopStart {
        async fn launch(&self) -> Result<()> {
            Ok(())
        }
    }

    struct FailingProbe;

    #[async_trait]
    impl Probe for FailingProbe {
        async fn check(&self) -> Result<bool> {
            Err(VigilError::ProbeFailed("unreachable".to_string()))
        }
    }

    struct SlowProbe;

    #[async_trait]
    impl Probe for SlowProbe {
        async fn check(&self) -> Result<bool> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(true)
        }
    }

    fn descriptor_with(probe: Arc<dyn Probe>) -> ServiceDescriptor {
        ServiceDescriptor::new("svc", false, probe, Arc::new(NoopStart))
    }

    #[tokio::test]
    async fn test_command_probe_nonempty_output_is_alive() {
        let probe = CommandProbe::new("echo one-matching-process");
        assert!(probe.check().await.unwrap());
    }

    #[tokio::test]
    async fn test_command_probe_empty_output_is_not_alive() {
        let probe = CommandProbe::new("true");
        assert!(!probe.check().await.unwrap());
    }

    #[tokio::test]
    async fn test_command_probe_failing_command_is_not_alive() {
        let probe = CommandProbe::new("echo found; exit 1");
        assert!(!probe.check().await.unwrap());
    }

    #[tokio::test]
    async fn test_process_pattern_probe_finds_running_process() {
        // A real process we control, same approach as probing any service
        let mut child = std::process::Command::new("/bin/sleep")
            .arg("5")
            .spawn()
            .expect("Failed to spawn process");

        let probe = ProcessPatternProbe::new("sleep");
        assert!(probe.check().await.unwrap());

        let _ = child.kill();
        let _ = child.wait();
    }

    #[tokio::test]
    async fn test_process_pattern_probe_misses_absent_process() {
        let probe = ProcessPatternProbe::new("vigil-no-such-process-zz9");
        assert!(!probe.check().await.unwrap());
    }

    #[tokio::test]
    async fn test_check_liveness_maps_probe_error_to_down() {
        let descriptor = descriptor_with(Arc::new(FailingProbe));
        assert!(!check_liveness(&descriptor, Duration::from_secs(5)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_liveness_maps_timeout_to_down() {
        let descriptor = descriptor_with(Arc::new(SlowProbe));
        assert!(!check_liveness(&descriptor, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_check_liveness_passes_through_alive() {
        let descriptor = descriptor_with(Arc::new(CommandProbe::new("echo alive")));
        assert!(check_liveness(&descriptor, Duration::from_secs(5)).await);
    }
}
