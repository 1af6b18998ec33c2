//! Runtime bootstrap orchestration.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use switchyard_config::Config;

use crate::communicator::{Communicator, CommunicatorError};
use crate::health::HealthReporter;
use crate::plugin::DiscoveryPlugin;
use crate::telemetry::{self, TelemetryError};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the runtime configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when any configuration layer is invalid.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// A bootstrap plugin failed to initialise.
    #[error("failed to install plugin: {source}")]
    Plugin {
        /// Communicator error raised while adding the plugin.
        #[source]
        source: CommunicatorError,
    },
}

/// Loads configuration, initialises telemetry, and builds a communicator.
///
/// The discovery plugin is installed when discovery is enabled and no
/// explicit locator is configured.
///
/// # Errors
///
/// Returns a [`BootstrapError`] describing the first step that failed; the
/// failure is also reported to `reporter`.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Communicator, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    if let Err(source) = telemetry::initialise(&config) {
        let error = BootstrapError::Telemetry { source };
        reporter.bootstrap_failed(&error);
        return Err(error);
    }

    let communicator = Communicator::new(config.clone(), Arc::clone(&reporter));
    if config.discovery_active() {
        let plugin = DiscoveryPlugin::new(config.discovery());
        if let Err(source) = communicator.add_plugin(Box::new(plugin)) {
            let error = BootstrapError::Plugin { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    }

    reporter.bootstrap_succeeded(&config);
    Ok(communicator)
}
