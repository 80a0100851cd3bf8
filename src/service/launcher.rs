use crate::config::StartConfig;
use crate::error::{Result, VigilError};
use crate::service::ServiceDescriptor;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Capability to bring a down service back up.
///
/// The launch must leave the service detached: it outlives the invocation,
/// and the supervisor never owns or reaps the started process.
#[async_trait]
pub trait StartAction: Send + Sync {
    async fn launch(&self) -> Result<()>;
}

/// Execute a descriptor's start action once, bounded by a timeout.
///
/// Returns true if the launch itself completed without error. That is not a
/// guarantee the service is now alive; the next sweep's probe is the
/// confirmation. There is no retry here, the next sweep is the retry.
pub async fn invoke_restart(descriptor: &ServiceDescriptor, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, descriptor.start().launch()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!("launch for '{}' failed: {}", descriptor.name, e);
            false
        }
        Err(_) => {
            debug!(
                "launch for '{}' timed out after {:?}",
                descriptor.name, timeout
            );
            false
        }
    }
}

/// Start action that spawns a shell command detached from the supervisor.
///
/// Working directory, environment, and redirection of the service's output
/// to its own log file are part of the action. The spawned process is placed
/// in its own process group and the child handle is dropped immediately:
/// no reaping, no PID tracking.
pub struct DetachedCommand {
    command: String,
    cwd: Option<PathBuf>,
    env: HashMap<String, String>,
    log: Option<PathBuf>,
}

impl DetachedCommand {
    /// Create a start action for a shell command
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            env: HashMap::new(),
            log: None,
        }
    }

    /// Build from a service's start configuration
    pub fn from_config(config: &StartConfig) -> Self {
        Self {
            command: config.command.clone(),
            cwd: config.cwd.clone(),
            env: config.env.clone(),
            log: config.log.clone(),
        }
    }

    /// Set the working directory for the launch
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Add an environment variable for the launch
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Append the service's stdout and stderr to the given file
    pub fn with_log(mut self, log: impl Into<PathBuf>) -> Self {
        self.log = Some(log.into());
        self
    }

    fn open_log(&self, path: &PathBuf) -> Result<(std::fs::File, std::fs::File)> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                VigilError::LaunchFailed(format!("Failed to create service log directory: {}", e))
            })?;
        }

        let out = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                VigilError::LaunchFailed(format!(
                    "Failed to open service log {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let err = out.try_clone().map_err(|e| {
            VigilError::LaunchFailed(format!("Failed to clone service log handle: {}", e))
        })?;

        Ok((out, err))
    }
}

#[async_trait]
impl StartAction for DetachedCommand {
    async fn launch(&self) -> Result<()> {
        let mut command = Command::new("sh");
        command.arg("-c").arg(&self.command);

        if let Some(ref cwd) = self.cwd {
            command.current_dir(cwd);
        }

        for (key, value) in &self.env {
            command.env(key, value);
        }

        command.stdin(Stdio::null());

        match &self.log {
            Some(path) => {
                let (out, err) = self.open_log(path)?;
                command.stdout(Stdio::from(out));
                command.stderr(Stdio::from(err));
            }
            None => {
                command.stdout(Stdio::null());
                command.stderr(Stdio::null());
            }
        }

        // Own process group: the service survives the supervisor's exit
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|e| {
            VigilError::LaunchFailed(format!("Failed to spawn '{}': {}", self.command, e))
        })?;

        // The started process is not a child the supervisor is responsible
        // for; the only observation channel is the next sweep's probe.
        drop(child);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    use crate::service::probe::Probe;

    struct NeverAlive;

    #[async_trait]
    impl Probe for NeverAlive {
        async fn check(&self) -> Result<bool> {
            Ok(false)
        }
    }

    struct SlowStart;

    #[async_trait]
    impl StartAction for SlowStart {
        async fn launch(&self) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    struct BrokenStart;

    #[async_trait]
    impl StartAction for BrokenStart {
        async fn launch(&self) -> Result<()> {
            Err(VigilError::LaunchFailed("binary missing".to_string()))
        }
    }

    fn descriptor_with(start: Arc<dyn StartAction>) -> ServiceDescriptor {
        ServiceDescriptor::new("svc", false, Arc::new(NeverAlive), start)
    }

    async fn wait_for_file(path: &std::path::Path) {
        for _ in 0..50 {
            if path.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("file {} never appeared", path.display());
    }

    #[tokio::test]
    async fn test_launch_runs_detached_command() {
        let temp_dir = TempDir::new().unwrap();
        let marker = temp_dir.path().join("started");

        let action = DetachedCommand::new(format!("touch {}", marker.display()));
        action.launch().await.unwrap();

        wait_for_file(&marker).await;
    }

    #[tokio::test]
    async fn test_launch_applies_working_directory() {
        let temp_dir = TempDir::new().unwrap();

        let action = DetachedCommand::new("pwd > cwd.txt").with_cwd(temp_dir.path());
        action.launch().await.unwrap();

        let marker = temp_dir.path().join("cwd.txt");
        wait_for_file(&marker).await;
    }

    #[tokio::test]
    async fn test_launch_applies_environment() {
        let temp_dir = TempDir::new().unwrap();
        let marker = temp_dir.path().join("env.txt");

        let action = DetachedCommand::new(format!("echo $VIGIL_TEST_VAR > {}", marker.display()))
            .with_env("VIGIL_TEST_VAR", "injected");
        action.launch().await.unwrap();

        wait_for_file(&marker).await;
        // Give the shell a moment to finish the redirect
        tokio::time::sleep(Duration::from_millis(50)).await;
        let contents = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(contents.trim(), "injected");
    }

    #[tokio::test]
    async fn test_launch_redirects_output_to_service_log() {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("logs").join("svc.log");

        let action = DetachedCommand::new("echo from-the-service").with_log(&log);
        action.launch().await.unwrap();

        wait_for_file(&log).await;
        for _ in 0..50 {
            let contents = std::fs::read_to_string(&log).unwrap();
            if contents.contains("from-the-service") {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("service output never reached its log");
    }

    #[tokio::test]
    async fn test_launch_fails_for_bad_working_directory() {
        let action = DetachedCommand::new("true").with_cwd("/nonexistent/directory");

        let result = action.launch().await;
        assert!(matches!(result, Err(VigilError::LaunchFailed(_))));
    }

    #[tokio::test]
    async fn test_invoke_restart_reports_success() {
        let temp_dir = TempDir::new().unwrap();
        let marker = temp_dir.path().join("started");
        let descriptor = descriptor_with(Arc::new(DetachedCommand::new(format!(
            "touch {}",
            marker.display()
        ))));

        assert!(invoke_restart(&descriptor, Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_invoke_restart_reports_launch_failure() {
        let descriptor = descriptor_with(Arc::new(BrokenStart));
        assert!(!invoke_restart(&descriptor, Duration::from_secs(5)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_restart_reports_timeout_as_failure() {
        let descriptor = descriptor_with(Arc::new(SlowStart));
        assert!(!invoke_restart(&descriptor, Duration::from_secs(1)).await);
    }
}
