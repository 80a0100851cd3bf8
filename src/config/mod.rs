use crate::error::{Result, VigilError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level supervisor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Sweep cadence in seconds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Wall-clock bound on a single probe (in seconds)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Wall-clock bound on a single start action (in seconds)
    #[serde(default = "default_start_timeout")]
    pub start_timeout_secs: u64,

    /// Path to the persisted health state file
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Path to the append-only event log
    #[serde(default = "default_event_log")]
    pub event_log: PathBuf,

    /// Path to the PID file guarding against a second instance
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,

    /// Managed services
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

/// Configuration for a single managed service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name (unique identifier)
    pub name: String,

    /// Advisory criticality flag, surfaced in log lines only
    #[serde(default)]
    pub critical: bool,

    /// How to check whether the service is alive
    pub probe: ProbeConfig,

    /// How to bring the service back up
    pub start: StartConfig,
}

/// Liveness probe definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeConfig {
    /// Match a pattern against names and command lines in the process table
    Process { pattern: String },
    /// Run a shell command; non-empty stdout is the liveness signal
    Command { command: String },
}

/// Start action definition: a detached shell launch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartConfig {
    /// Shell command that brings the service up
    pub command: String,

    /// Working directory for the launch
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Environment variables for the launch
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// File the service's stdout and stderr are appended to
    #[serde(default)]
    pub log: Option<PathBuf>,
}

// Default value functions for serde
fn default_interval() -> u64 {
    300
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_start_timeout() -> u64 {
    30
}

fn default_state_file() -> PathBuf {
    PathBuf::from("/tmp/vigil_state.json")
}

fn default_event_log() -> PathBuf {
    PathBuf::from("/tmp/vigil_events.log")
}

fn default_pid_file() -> PathBuf {
    PathBuf::from("/tmp/vigil.pid")
}

impl SupervisorConfig {
    /// Load configuration from a file (supports TOML and JSON)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| VigilError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let config: SupervisorConfig = match extension {
            "toml" => toml::from_str(&contents)
                .map_err(|e| VigilError::InvalidConfig(format!("Failed to parse TOML: {}", e)))?,
            "json" => serde_json::from_str(&contents)
                .map_err(|e| VigilError::InvalidConfig(format!("Failed to parse JSON: {}", e)))?,
            _ => {
                return Err(VigilError::InvalidConfig(format!(
                    "Unsupported file format: {}. Use .toml or .json",
                    extension
                )))
            }
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(VigilError::ConfigValidationError(
                "interval_secs must be at least 1".to_string(),
            ));
        }

        if self.probe_timeout_secs == 0 {
            return Err(VigilError::ConfigValidationError(
                "probe_timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.start_timeout_secs == 0 {
            return Err(VigilError::ConfigValidationError(
                "start_timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.services.is_empty() {
            return Err(VigilError::ConfigValidationError(
                "at least one service must be configured".to_string(),
            ));
        }

        let mut seen_names = HashSet::new();
        for service in &self.services {
            service.validate()?;
            if !seen_names.insert(&service.name) {
                return Err(VigilError::DuplicateService(service.name.clone()));
            }
        }

        Ok(())
    }

    /// Sweep cadence as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Probe timeout as a Duration
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Start-action timeout as a Duration
    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }
}

impl ServiceConfig {
    /// Validate a single service entry
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(VigilError::MissingConfigField("name".to_string()));
        }

        match &self.probe {
            ProbeConfig::Process { pattern } if pattern.is_empty() => {
                return Err(VigilError::MissingConfigField("probe.pattern".to_string()));
            }
            ProbeConfig::Command { command } if command.is_empty() => {
                return Err(VigilError::MissingConfigField("probe.command".to_string()));
            }
            _ => {}
        }

        if self.start.command.is_empty() {
            return Err(VigilError::MissingConfigField("start.command".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_service(name: &str) -> ServiceConfig {
        ServiceConfig {
            name: name.to_string(),
            critical: false,
            probe: ProbeConfig::Process {
                pattern: name.to_string(),
            },
            start: StartConfig {
                command: format!("/usr/local/bin/{}", name),
                cwd: None,
                env: HashMap::new(),
                log: None,
            },
        }
    }

    fn minimal_config() -> SupervisorConfig {
        SupervisorConfig {
            interval_secs: default_interval(),
            probe_timeout_secs: default_probe_timeout(),
            start_timeout_secs: default_start_timeout(),
            state_file: default_state_file(),
            event_log: default_event_log(),
            pid_file: default_pid_file(),
            services: vec![minimal_service("svc1")],
        }
    }

    #[test]
    fn test_parse_toml() {
        let toml_content = r#"
            interval_secs = 60

            [[services]]
            name = "indexer"
            critical = true
            probe = { type = "process", pattern = "indexer" }
            start = { command = "./run.sh", cwd = "/srv/indexer" }

            [[services]]
            name = "gateway"
            probe = { type = "command", command = "pgrep -f gateway" }
            start = { command = "./gateway --daemon" }
        "#;

        let config: SupervisorConfig = toml::from_str(toml_content).unwrap();
        config.validate().unwrap();

        assert_eq!(config.interval_secs, 60);
        assert_eq!(config.probe_timeout_secs, default_probe_timeout());
        assert_eq!(config.services.len(), 2);
        assert!(config.services[0].critical);
        assert!(!config.services[1].critical);
        assert!(matches!(
            config.services[1].probe,
            ProbeConfig::Command { .. }
        ));
    }

    #[test]
    fn test_parse_json() {
        let json_content = r#"{
            "services": [
                {
                    "name": "indexer",
                    "probe": { "type": "process", "pattern": "indexer" },
                    "start": { "command": "./run.sh" }
                }
            ]
        }"#;

        let config: SupervisorConfig = serde_json::from_str(json_content).unwrap();
        config.validate().unwrap();

        assert_eq!(config.interval_secs, 300);
        assert_eq!(config.services.len(), 1);
    }

    #[test]
    fn test_from_file_rejects_unknown_extension() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "interval_secs: 60").unwrap();

        let result = SupervisorConfig::from_file(&path);
        assert!(matches!(result, Err(VigilError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_file_toml_round_trip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("vigil.toml");
        std::fs::write(
            &path,
            r#"
                interval_secs = 120

                [[services]]
                name = "svc1"
                probe = { type = "process", pattern = "svc1" }
                start = { command = "/usr/local/bin/svc1" }
            "#,
        )
        .unwrap();

        let config = SupervisorConfig::from_file(&path).unwrap();
        assert_eq!(config.interval(), Duration::from_secs(120));
        assert_eq!(config.services[0].name, "svc1");
    }

    #[test]
    fn test_validate_rejects_empty_services() {
        let mut config = minimal_config();
        config.services.clear();

        assert!(matches!(
            config.validate(),
            Err(VigilError::ConfigValidationError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let mut config = minimal_config();
        config.services.push(minimal_service("svc1"));

        assert!(matches!(
            config.validate(),
            Err(VigilError::DuplicateService(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = minimal_config();
        config.interval_secs = 0;

        assert!(matches!(
            config.validate(),
            Err(VigilError::ConfigValidationError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_probe_pattern() {
        let mut config = minimal_config();
        config.services[0].probe = ProbeConfig::Process {
            pattern: String::new(),
        };

        assert!(matches!(
            config.validate(),
            Err(VigilError::MissingConfigField(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_start_command() {
        let mut config = minimal_config();
        config.services[0].start.command = String::new();

        assert!(matches!(
            config.validate(),
            Err(VigilError::MissingConfigField(_))
        ));
    }
}
