// Service module - descriptor registry and the capability seams around
// managed services (liveness probes and start actions)

pub mod launcher;
pub mod probe;

pub use launcher::{invoke_restart, DetachedCommand, StartAction};
pub use probe::{check_liveness, CommandProbe, Probe, ProcessPatternProbe};

use crate::config::{ProbeConfig, ServiceConfig};
use crate::error::{Result, VigilError};
use std::collections::HashSet;
use std::sync::Arc;

/// Static definition of one managed service.
///
/// Descriptors are immutable: the probe and start action are injected at
/// construction, so the supervisor core never spawns real processes in tests.
pub struct ServiceDescriptor {
    /// Unique service name
    pub name: String,
    /// Advisory flag; surfaced in log lines, no differential behavior
    pub critical: bool,
    probe: Arc<dyn Probe>,
    start: Arc<dyn StartAction>,
}

impl ServiceDescriptor {
    /// Create a descriptor with injected capabilities
    pub fn new(
        name: impl Into<String>,
        critical: bool,
        probe: Arc<dyn Probe>,
        start: Arc<dyn StartAction>,
    ) -> Self {
        Self {
            name: name.into(),
            critical,
            probe,
            start,
        }
    }

    /// The liveness probe for this service
    pub fn probe(&self) -> &dyn Probe {
        self.probe.as_ref()
    }

    /// The start action for this service
    pub fn start(&self) -> &dyn StartAction {
        self.start.as_ref()
    }
}

impl std::fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .field("critical", &self.critical)
            .finish()
    }
}

/// Read-only registry of service descriptors.
///
/// Fixed for the lifetime of one supervisor process; no dynamic add/remove.
pub struct Registry {
    services: Vec<ServiceDescriptor>,
}

impl Registry {
    /// Build a registry, rejecting duplicate service names
    pub fn new(services: Vec<ServiceDescriptor>) -> Result<Self> {
        let mut seen_names = HashSet::new();
        for service in &services {
            if !seen_names.insert(service.name.clone()) {
                return Err(VigilError::DuplicateService(service.name.clone()));
            }
        }

        Ok(Self { services })
    }

    /// Build a registry from configuration, wiring up the production
    /// probe and start-action implementations.
    pub fn from_config(configs: &[ServiceConfig]) -> Result<Self> {
        let mut services = Vec::with_capacity(configs.len());

        for config in configs {
            let probe: Arc<dyn Probe> = match &config.probe {
                ProbeConfig::Process { pattern } => Arc::new(ProcessPatternProbe::new(pattern)),
                ProbeConfig::Command { command } => Arc::new(CommandProbe::new(command)),
            };

            let start: Arc<dyn StartAction> = Arc::new(DetachedCommand::from_config(&config.start));

            services.push(ServiceDescriptor::new(
                &config.name,
                config.critical,
                probe,
                start,
            ));
        }

        Self::new(services)
    }

    /// Iterate descriptors in registry order
    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.iter()
    }

    /// Number of registered services
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
