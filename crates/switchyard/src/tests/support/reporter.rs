//! Test double for [`HealthReporter`] that records structured events for assertions.
//!
//! The recorder captures the lifecycle telemetry emitted by bootstrap,
//! adapters, plugins and discovery so behaviour tests can validate
//! observable events.

use std::sync::Mutex;

use switchyard_config::Config;

use crate::bootstrap::BootstrapError;
use crate::discovery::DiscoveryError;
use crate::health::HealthReporter;
use crate::plugin::PluginError;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// An adapter was activated.
    AdapterActivated(String),
    /// An adapter began draining.
    AdapterDeactivating { adapter: String, in_flight: usize },
    /// An adapter reached its terminal state.
    AdapterDeactivated(String),
    /// A plugin initialised.
    PluginInitialised(String),
    /// A plugin failed to initialise.
    PluginFailed(String),
    /// A plugin was destroyed.
    PluginDestroyed(String),
    /// Discovery resolved an endpoint.
    DiscoveryResolved(String),
    /// Discovery failed with an error description.
    DiscoveryFailed(String),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Counts recorded events equal to `event`.
    #[must_use]
    pub fn count(&self, event: &HealthEvent) -> usize {
        self.events().iter().filter(|seen| *seen == event).count()
    }

    pub fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn adapter_activated(&self, adapter: &str) {
        self.record(HealthEvent::AdapterActivated(adapter.to_owned()));
    }

    fn adapter_deactivating(&self, adapter: &str, in_flight: usize) {
        self.record(HealthEvent::AdapterDeactivating {
            adapter: adapter.to_owned(),
            in_flight,
        });
    }

    fn adapter_deactivated(&self, adapter: &str) {
        self.record(HealthEvent::AdapterDeactivated(adapter.to_owned()));
    }

    fn plugin_initialised(&self, plugin: &str) {
        self.record(HealthEvent::PluginInitialised(plugin.to_owned()));
    }

    fn plugin_failed(&self, plugin: &str, _error: &PluginError) {
        self.record(HealthEvent::PluginFailed(plugin.to_owned()));
    }

    fn plugin_destroyed(&self, plugin: &str) {
        self.record(HealthEvent::PluginDestroyed(plugin.to_owned()));
    }

    fn discovery_resolved(&self, endpoint: &str, _attempts: u32) {
        self.record(HealthEvent::DiscoveryResolved(endpoint.to_owned()));
    }

    fn discovery_failed(&self, error: &DiscoveryError) {
        self.record(HealthEvent::DiscoveryFailed(error.to_string()));
    }
}
