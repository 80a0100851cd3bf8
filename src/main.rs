use clap::Parser;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use vigil::config::SupervisorConfig;
use vigil::daemon::PidFile;
use vigil::error::Result;
use vigil::logs::EventLog;
use vigil::service::Registry;
use vigil::state::StateStore;
use vigil::supervisor::{Supervisor, SupervisorOptions};

/// Process health supervisor daemon
#[derive(Debug, Parser)]
#[command(name = "vigil", version, about = "Process health supervisor daemon")]
struct Cli {
    /// Path to the supervisor configuration file (TOML or JSON)
    #[arg(short, long, default_value = "vigil.toml")]
    config: PathBuf,

    /// Override the sweep interval in seconds
    #[arg(long)]
    interval: Option<u64>,

    /// Override the state file path
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Override the event log path
    #[arg(long)]
    event_log: Option<PathBuf>,

    /// Override the PID file path
    #[arg(long)]
    pid_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("✗ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = SupervisorConfig::from_file(&cli.config)?;

    if let Some(secs) = cli.interval {
        config.interval_secs = secs;
    }
    if let Some(path) = cli.state_file {
        config.state_file = path;
    }
    if let Some(path) = cli.event_log {
        config.event_log = path;
    }
    if let Some(path) = cli.pid_file {
        config.pid_file = path;
    }
    config.validate()?;

    let pid_file = PidFile::with_path(&config.pid_file);
    pid_file.acquire()?;

    let registry = Registry::from_config(&config.services)?;
    let events = EventLog::open(&config.event_log)?;
    let store = StateStore::new(&config.state_file);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_termination().await;
        let _ = shutdown_tx.send(true);
    });

    let options = SupervisorOptions {
        interval: config.interval(),
        probe_timeout: config.probe_timeout(),
        start_timeout: config.start_timeout(),
    };

    let result = Supervisor::new(registry, store, events, options, shutdown_rx)
        .run()
        .await;

    if let Err(e) = pid_file.remove() {
        warn!("failed to remove PID file: {}", e);
    }

    result
}

/// Resolves when a termination request arrives.
///
/// SIGTERM and SIGINT mean the same thing: persist state and exit 0.
#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        Err(e) => {
            tracing::error!("failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
}
