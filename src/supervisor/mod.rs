// Supervision loop - drives sweeps over the registry on a fixed cadence and
// owns the lifecycle of the whole daemon

use crate::error::Result;
use crate::logs::EventLog;
use crate::service::{check_liveness, invoke_restart, Registry};
use crate::state::{HealthState, ServiceStatus, StateStore};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error};

/// Supervisor timing options
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// How often to sweep the registry
    pub interval: Duration,
    /// Wall-clock bound on a single probe
    pub probe_timeout: Duration,
    /// Wall-clock bound on a single start action
    pub start_timeout: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(10),
            start_timeout: Duration::from_secs(30),
        }
    }
}

/// The supervision loop.
///
/// One sweep probes every descriptor in registry order, restarts the dead
/// ones, persists health state, and logs an aggregate line. Sweeps never
/// overlap: a sweep that outruns the interval defers the next tick instead
/// of running concurrently with it.
pub struct Supervisor {
    registry: Registry,
    store: StateStore,
    events: EventLog,
    options: SupervisorOptions,
    shutdown: watch::Receiver<bool>,
}

impl Supervisor {
    /// Create a supervisor over a fixed registry.
    ///
    /// `shutdown` flips to true when a termination signal arrives; the loop
    /// then persists state and exits without a final sweep.
    pub fn new(
        registry: Registry,
        store: StateStore,
        events: EventLog,
        options: SupervisorOptions,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            registry,
            store,
            events,
            options,
            shutdown,
        }
    }

    /// Run the supervisor until shutdown.
    ///
    /// Loads persisted state, performs one immediate sweep so failures are
    /// caught right away, then enters the recurring cadence. Returns Ok on a
    /// clean shutdown; the caller maps that to exit code 0.
    pub async fn run(mut self) -> Result<()> {
        let mut state = self.store.load();
        state.started_at = SystemTime::now();

        self.events.record(&format!(
            "supervisor started (pid {}, {} services, interval {}s, {} prior sweeps on record)",
            std::process::id(),
            self.registry.len(),
            self.options.interval.as_secs(),
            state.checks_performed,
        ));

        // First sweep runs now, not at the first timer tick
        self.sweep(&mut state).await;

        let mut ticker = interval_at(
            Instant::now() + self.options.interval,
            self.options.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut shutdown_rx = self.shutdown.clone();

        while !*self.shutdown.borrow() {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = ticker.tick() => {
                    self.sweep(&mut state).await;
                }
            }
        }

        // STOPPING: persist state exactly as it stands, no final sweep
        if let Err(e) = self.store.save(&state) {
            error!("failed to persist state during shutdown: {}", e);
            self.events
                .record(&format!("state save failed during shutdown: {}", e));
        }
        self.events.record(&format!(
            "supervisor shutting down after {} sweeps (uptime {}s)",
            state.checks_performed,
            state.uptime().as_secs(),
        ));

        Ok(())
    }

    /// One full pass over the registry.
    ///
    /// Public so tests can drive sweeps directly without the timer. A
    /// failing service is isolated: its outcome is recorded and the sweep
    /// proceeds to the next descriptor. If shutdown is requested mid-sweep,
    /// the current descriptor finishes and no further descriptor is started.
    pub async fn sweep(&mut self, state: &mut HealthState) {
        let Self {
            registry,
            store,
            events,
            options,
            shutdown,
        } = self;

        state.checks_performed += 1;
        state.last_check_at = Some(SystemTime::now());
        debug!("sweep #{} starting", state.checks_performed);

        let mut healthy = 0usize;
        for descriptor in registry.iter() {
            if *shutdown.borrow() {
                events.record("shutdown requested, cutting sweep short");
                break;
            }

            if check_liveness(descriptor, options.probe_timeout).await {
                state.set_status(&descriptor.name, ServiceStatus::Healthy);
                healthy += 1;
                events.record(&format!("{}: healthy", descriptor.name));
                continue;
            }

            state.set_status(&descriptor.name, ServiceStatus::Down);
            if descriptor.critical {
                events.record(&format!(
                    "{}: DOWN (critical) - attempting restart",
                    descriptor.name
                ));
            } else {
                events.record(&format!("{}: DOWN - attempting restart", descriptor.name));
            }

            let launched = invoke_restart(descriptor, options.start_timeout).await;
            let attempts = state.record_restart_attempt(&descriptor.name);

            if launched {
                state.set_status(&descriptor.name, ServiceStatus::Restarted);
                events.record(&format!(
                    "{}: restart launched ({} attempts on record)",
                    descriptor.name, attempts
                ));
            } else {
                state.set_status(&descriptor.name, ServiceStatus::RestartFailed);
                events.record(&format!(
                    "{}: restart FAILED ({} attempts on record)",
                    descriptor.name, attempts
                ));
            }
        }

        if let Err(e) = store.save(state) {
            error!("failed to persist health state: {}", e);
            events.record(&format!("state save failed: {}", e));
        }

        if healthy == registry.len() {
            events.record(&format!(
                "sweep #{} complete: all {} services healthy (uptime {}s)",
                state.checks_performed,
                registry.len(),
                state.uptime().as_secs(),
            ));
        } else {
            events.record(&format!(
                "sweep #{} complete: {}/{} services healthy (uptime {}s)",
                state.checks_performed,
                healthy,
                registry.len(),
                state.uptime().as_secs(),
            ));
        }
    }
}
