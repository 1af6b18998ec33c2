//! Process-level owner of adapters, plugins, and the locator source.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use switchyard_config::Config;
use thiserror::Error;
use tracing::{debug, info};

use crate::adapter::ObjectAdapter;
use crate::discovery::{DiscoveryClient, DiscoveryError};
use crate::health::HealthReporter;
use crate::plugin::{Plugin, PluginError};

const COMMUNICATOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::communicator");

/// Supplies the locator endpoint when none is configured explicitly.
pub trait LocatorSource: Send + Sync {
    /// Returns the current locator endpoint, resolving it if necessary.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscoveryError`] when no endpoint can be resolved.
    fn locator(&self) -> Result<String, DiscoveryError>;

    /// Forgets any cached endpoint, typically after a connection failure.
    fn invalidate(&self);
}

impl LocatorSource for DiscoveryClient {
    fn locator(&self) -> Result<String, DiscoveryError> {
        Self::locator(self)
    }

    fn invalidate(&self) {
        Self::invalidate(self);
    }
}

/// Errors raised by [`Communicator`] operations.
#[derive(Debug, Error)]
pub enum CommunicatorError {
    /// An adapter with the same name already exists.
    #[error("object adapter '{name}' already exists")]
    AdapterExists {
        /// Conflicting adapter name.
        name: String,
    },

    /// No locator is configured and no locator source is installed.
    #[error("no locator configured and discovery is not available")]
    NoLocator,

    /// The locator source failed to resolve an endpoint.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// A plugin failed to initialise.
    #[error("plugin '{name}' failed to initialise: {source}")]
    Plugin {
        /// Plugin name.
        name: String,
        /// Initialisation failure.
        #[source]
        source: PluginError,
    },

    /// The communicator has been shut down.
    #[error("communicator has been shut down")]
    ShutDown,
}

/// Owns the adapters and plugins of one process.
pub struct Communicator {
    config: Config,
    reporter: Arc<dyn HealthReporter>,
    adapters: Mutex<HashMap<String, ObjectAdapter>>,
    plugins: Mutex<Vec<Box<dyn Plugin>>>,
    locator_source: RwLock<Option<Arc<dyn LocatorSource>>>,
    shut_down: AtomicBool,
}

impl Communicator {
    /// Creates a communicator using `config` for adapter defaults and the
    /// explicit locator.
    #[must_use]
    pub fn new(config: Config, reporter: Arc<dyn HealthReporter>) -> Self {
        Self {
            config,
            reporter,
            adapters: Mutex::new(HashMap::new()),
            plugins: Mutex::new(Vec::new()),
            locator_source: RwLock::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reporter shared with adapters and plugins.
    #[must_use]
    pub fn reporter(&self) -> Arc<dyn HealthReporter> {
        Arc::clone(&self.reporter)
    }

    fn adapters(&self) -> MutexGuard<'_, HashMap<String, ObjectAdapter>> {
        self.adapters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn plugins(&self) -> MutexGuard<'_, Vec<Box<dyn Plugin>>> {
        self.plugins.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a named adapter in the `Created` state using the configured
    /// registration policy.
    ///
    /// # Errors
    ///
    /// Returns [`CommunicatorError::AdapterExists`] when the name is taken and
    /// [`CommunicatorError::ShutDown`] after shutdown.
    pub fn create_object_adapter(&self, name: &str) -> Result<ObjectAdapter, CommunicatorError> {
        let mut adapters = self.adapters();
        if self.is_shut_down() {
            return Err(CommunicatorError::ShutDown);
        }
        match adapters.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(CommunicatorError::AdapterExists {
                name: name.to_owned(),
            }),
            Entry::Vacant(slot) => {
                let adapter = ObjectAdapter::with_reporter(
                    name,
                    self.config.registration_policy(),
                    Arc::clone(&self.reporter),
                );
                slot.insert(adapter.clone());
                debug!(target: COMMUNICATOR_TARGET, adapter = name, "object adapter created");
                Ok(adapter)
            }
        }
    }

    /// Looks up an adapter by name.
    #[must_use]
    pub fn find_object_adapter(&self, name: &str) -> Option<ObjectAdapter> {
        self.adapters().get(name).cloned()
    }

    /// Installs `source` unless one is already present. Returns `false` when
    /// another source is installed.
    pub fn install_locator_source(&self, source: Arc<dyn LocatorSource>) -> bool {
        let mut slot = self
            .locator_source
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(source);
        true
    }

    /// Removes the installed locator source.
    pub fn clear_locator_source(&self) {
        self.locator_source
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn locator_source(&self) -> Option<Arc<dyn LocatorSource>> {
        self.locator_source
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the locator endpoint: the configured one when present,
    /// otherwise whatever the installed locator source resolves.
    ///
    /// # Errors
    ///
    /// Returns [`CommunicatorError::NoLocator`] when neither is available and
    /// [`CommunicatorError::Discovery`] when resolution fails.
    pub fn default_locator(&self) -> Result<String, CommunicatorError> {
        if let Some(endpoint) = self.config.locator() {
            return Ok(endpoint.to_string());
        }
        let source = self.locator_source().ok_or(CommunicatorError::NoLocator)?;
        Ok(source.locator()?)
    }

    /// Drops any cached locator endpoint held by the locator source.
    pub fn invalidate_locator(&self) {
        if let Some(source) = self.locator_source() {
            source.invalidate();
        }
    }

    /// Initialises `plugin` and keeps it until shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`CommunicatorError::Plugin`] when initialisation fails and
    /// [`CommunicatorError::ShutDown`] after shutdown.
    pub fn add_plugin(&self, mut plugin: Box<dyn Plugin>) -> Result<(), CommunicatorError> {
        if self.is_shut_down() {
            return Err(CommunicatorError::ShutDown);
        }
        let name = plugin.name().to_owned();
        if let Err(source) = plugin.initialize(self) {
            self.reporter.plugin_failed(&name, &source);
            return Err(CommunicatorError::Plugin { name, source });
        }

        let mut plugins = self.plugins();
        if self.is_shut_down() {
            drop(plugins);
            plugin.destroy(self);
            return Err(CommunicatorError::ShutDown);
        }
        plugins.push(plugin);
        drop(plugins);
        self.reporter.plugin_initialised(&name);
        Ok(())
    }

    /// Deactivates every adapter and destroys plugins in reverse order of
    /// addition. Later calls do nothing.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let adapters: Vec<ObjectAdapter> = self.adapters().values().cloned().collect();
        for adapter in &adapters {
            adapter.deactivate();
        }

        let plugins = std::mem::take(&mut *self.plugins());
        for mut plugin in plugins.into_iter().rev() {
            plugin.destroy(self);
            self.reporter.plugin_destroyed(plugin.name());
        }
        self.clear_locator_source();
        info!(
            target: COMMUNICATOR_TARGET,
            adapters = adapters.len(),
            "communicator shut down"
        );
    }

    /// Returns `true` once [`Communicator::shutdown`] has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl Drop for Communicator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Communicator {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let adapters: Vec<String> = self.adapters().keys().cloned().collect();
        formatter
            .debug_struct("Communicator")
            .field("adapters", &adapters)
            .field("plugins", &self.plugins().len())
            .field("locator_source", &self.locator_source().is_some())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}
