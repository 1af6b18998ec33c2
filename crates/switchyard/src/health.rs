//! Structured health reporting for runtime lifecycle events.

use std::sync::Arc;

use switchyard_config::Config;

use crate::bootstrap::BootstrapError;
use crate::discovery::DiscoveryError;
use crate::plugin::PluginError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked when an adapter starts accepting requests.
    fn adapter_activated(&self, adapter: &str);

    /// Invoked when an adapter begins draining in-flight requests.
    fn adapter_deactivating(&self, adapter: &str, in_flight: usize);

    /// Invoked once an adapter reaches its terminal state.
    fn adapter_deactivated(&self, adapter: &str);

    /// Invoked after a plugin initialises successfully.
    fn plugin_initialised(&self, plugin: &str);

    /// Invoked when a plugin fails to initialise.
    fn plugin_failed(&self, plugin: &str, error: &PluginError);

    /// Invoked after a plugin is destroyed.
    fn plugin_destroyed(&self, plugin: &str);

    /// Invoked when discovery resolves a locator endpoint.
    fn discovery_resolved(&self, endpoint: &str, attempts: u32);

    /// Invoked when a discovery lookup fails.
    fn discovery_failed(&self, error: &DiscoveryError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn adapter_activated(&self, adapter: &str) {
        (**self).adapter_activated(adapter);
    }

    fn adapter_deactivating(&self, adapter: &str, in_flight: usize) {
        (**self).adapter_deactivating(adapter, in_flight);
    }

    fn adapter_deactivated(&self, adapter: &str) {
        (**self).adapter_deactivated(adapter);
    }

    fn plugin_initialised(&self, plugin: &str) {
        (**self).plugin_initialised(plugin);
    }

    fn plugin_failed(&self, plugin: &str, error: &PluginError) {
        (**self).plugin_failed(plugin, error);
    }

    fn plugin_destroyed(&self, plugin: &str) {
        (**self).plugin_destroyed(plugin);
    }

    fn discovery_resolved(&self, endpoint: &str, attempts: u32) {
        (**self).discovery_resolved(endpoint, attempts);
    }

    fn discovery_failed(&self, error: &DiscoveryError) {
        (**self).discovery_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting communicator bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            adapter = %config.adapter_name(),
            endpoint = %config.adapter_endpoint(),
            discovery = config.discovery_active(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "communicator bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "communicator bootstrap failed"
        );
    }

    fn adapter_activated(&self, adapter: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "adapter_activated",
            adapter,
            "object adapter activated"
        );
    }

    fn adapter_deactivating(&self, adapter: &str, in_flight: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "adapter_deactivating",
            adapter,
            in_flight,
            "object adapter draining in-flight requests"
        );
    }

    fn adapter_deactivated(&self, adapter: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "adapter_deactivated",
            adapter,
            "object adapter deactivated"
        );
    }

    fn plugin_initialised(&self, plugin: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "plugin_initialised",
            plugin,
            "plugin initialised"
        );
    }

    fn plugin_failed(&self, plugin: &str, error: &PluginError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "plugin_failed",
            plugin,
            error = %error,
            "plugin failed to initialise"
        );
    }

    fn plugin_destroyed(&self, plugin: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "plugin_destroyed",
            plugin,
            "plugin destroyed"
        );
    }

    fn discovery_resolved(&self, endpoint: &str, attempts: u32) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "discovery_resolved",
            endpoint,
            attempts,
            "locator discovered"
        );
    }

    fn discovery_failed(&self, error: &DiscoveryError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "discovery_failed",
            error = %error,
            "locator discovery failed"
        );
    }
}
