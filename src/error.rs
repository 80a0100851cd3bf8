use thiserror::Error;

/// Main error type for the vigil supervisor
#[derive(Debug, Error)]
#[allow(dead_code)]
pub enum VigilError {
    // Probe and restart errors
    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("Failed to launch service: {0}")]
    LaunchFailed(String),

    // State store errors
    #[error("Failed to save state: {0}")]
    StateSaveError(String),

    #[error("State corruption detected: {0}")]
    StateCorruption(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Missing required configuration field: {0}")]
    MissingConfigField(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    #[error("Duplicate service name: {0}")]
    DuplicateService(String),

    // Event log errors
    #[error("Failed to open event log: {0}")]
    LogFileError(String),

    // Daemon lifecycle errors
    #[error("PID file error: {0}")]
    PidFileError(String),

    #[error("Another supervisor instance is already running (PID: {0})")]
    AlreadyRunning(u32),

    // IO errors (automatically converted from std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for vigil operations
pub type Result<T> = std::result::Result<T, VigilError>;
