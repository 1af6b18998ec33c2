//! Object adapters: servant registration, locators, and lifecycle.
//!
//! An [`ObjectAdapter`] owns a [`ServantRegistry`] and a [`LocatorTable`],
//! gates dispatch on its lifecycle state, and notifies every remaining
//! locator exactly once when it reaches [`AdapterState::Deactivated`].
//! Handles are cheap to clone; every clone refers to the same adapter.

mod dispatch;
mod errors;
mod lifecycle;

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use switchyard_config::RegistrationPolicy;
use tracing::{debug, error};

use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::identity::Identity;
use crate::locator::{LocatorTable, ServantLocator};
use crate::registry::ServantRegistry;
use crate::servant::Servant;

pub use dispatch::DispatchStatus;
pub use errors::AdapterError;
pub use lifecycle::AdapterState;

use lifecycle::{DeactivateOutcome, Lifecycle};

const ADAPTER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::adapter");

pub(crate) struct AdapterShared {
    name: String,
    servants: ServantRegistry,
    locators: LocatorTable,
    lifecycle: Arc<Lifecycle>,
    reporter: Arc<dyn HealthReporter>,
}

impl AdapterShared {
    /// Runs once, on whichever thread moved the adapter to `Deactivated`.
    fn finish_deactivation(&self) {
        for (category, locator) in self.locators.drain() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| locator.deactivate(&category)));
            if outcome.is_err() {
                error!(
                    target: ADAPTER_TARGET,
                    adapter = %self.name,
                    category = %category,
                    "servant locator panicked during deactivation"
                );
            }
        }
        self.reporter.adapter_deactivated(&self.name);
    }
}

/// Handle to an object adapter.
#[derive(Clone)]
pub struct ObjectAdapter {
    shared: Arc<AdapterShared>,
}

impl ObjectAdapter {
    /// Creates an adapter in the `Created` state that reports lifecycle events
    /// through `tracing`.
    #[must_use]
    pub fn new(name: impl Into<String>, policy: RegistrationPolicy) -> Self {
        Self::with_reporter(name, policy, Arc::new(StructuredHealthReporter::new()))
    }

    /// Creates an adapter reporting lifecycle events to `reporter`.
    #[must_use]
    pub fn with_reporter(
        name: impl Into<String>,
        policy: RegistrationPolicy,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            shared: Arc::new(AdapterShared {
                name: name.into(),
                servants: ServantRegistry::new(policy),
                locators: LocatorTable::new(),
                lifecycle: Arc::new(Lifecycle::new()),
                reporter,
            }),
        }
    }

    /// Adapter name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.shared.name.as_str()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> AdapterState {
        self.shared.lifecycle.state()
    }

    /// Number of dispatches admitted but not yet finalized.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.shared.lifecycle.in_flight()
    }

    /// Registration policy chosen at construction.
    #[must_use]
    pub fn policy(&self) -> RegistrationPolicy {
        self.shared.servants.policy()
    }

    /// Starts accepting dispatches. Activating an active adapter is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Deactivated`] once deactivation has begun.
    pub fn activate(&self) -> Result<(), AdapterError> {
        match self.shared.lifecycle.activate() {
            Ok(true) => {
                self.shared.reporter.adapter_activated(&self.shared.name);
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(state) => Err(AdapterError::deactivated(self.name(), state)),
        }
    }

    /// Stops accepting dispatches. The adapter reaches `Deactivated` once
    /// every in-flight dispatch has been finalized; calling this again is a
    /// no-op.
    pub fn deactivate(&self) {
        match self.shared.lifecycle.deactivate() {
            DeactivateOutcome::Deactivated => self.shared.finish_deactivation(),
            DeactivateOutcome::Draining => {
                let in_flight = self.in_flight();
                self.shared
                    .reporter
                    .adapter_deactivating(&self.shared.name, in_flight);
            }
            DeactivateOutcome::Unchanged => {
                debug!(
                    target: ADAPTER_TARGET,
                    adapter = %self.shared.name,
                    "deactivate called on an adapter already shutting down"
                );
            }
        }
    }

    /// Blocks until the adapter is deactivated or `timeout` elapses.
    /// Returns `true` when the adapter reached `Deactivated`.
    pub fn wait_for_deactivate(&self, timeout: Duration) -> bool {
        self.shared.lifecycle.wait_for_deactivate(timeout)
    }

    /// Registers `servant` for the default facet of `identity`.
    ///
    /// # Errors
    ///
    /// See [`ObjectAdapter::add_facet`].
    pub fn add(&self, identity: Identity, servant: Arc<dyn Servant>) -> Result<(), AdapterError> {
        self.add_facet(identity, "", servant)
    }

    /// Registers `servant` for `(identity, facet)`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Deactivated`] once deactivation has begun,
    /// otherwise any registration error from the registry.
    pub fn add_facet(
        &self,
        identity: Identity,
        facet: &str,
        servant: Arc<dyn Servant>,
    ) -> Result<(), AdapterError> {
        self.shared
            .lifecycle
            .while_accepting(|| self.shared.servants.add(identity, facet, servant))
            .map_err(|state| AdapterError::deactivated(self.name(), state))?
    }

    /// Removes the servant for the default facet of `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::NotFound`] when nothing is registered.
    pub fn remove(&self, identity: &Identity) -> Result<Arc<dyn Servant>, AdapterError> {
        self.remove_facet(identity, "")
    }

    /// Removes the servant for `(identity, facet)`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::NotFound`] when nothing is registered.
    pub fn remove_facet(
        &self,
        identity: &Identity,
        facet: &str,
    ) -> Result<Arc<dyn Servant>, AdapterError> {
        self.shared.servants.remove(identity, facet)
    }

    /// Removes every facet registered for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::NotFound`] when the identity has no facets.
    pub fn remove_all_facets(
        &self,
        identity: &Identity,
    ) -> Result<HashMap<String, Arc<dyn Servant>>, AdapterError> {
        self.shared.servants.remove_all_facets(identity)
    }

    /// Looks up the servant registered for exactly `(identity, facet)`.
    #[must_use]
    pub fn find(&self, identity: &Identity, facet: &str) -> Option<Arc<dyn Servant>> {
        self.shared.servants.find(identity, facet)
    }

    /// Returns every facet registered for `identity`.
    #[must_use]
    pub fn find_all_facets(&self, identity: &Identity) -> HashMap<String, Arc<dyn Servant>> {
        self.shared.servants.find_all_facets(identity)
    }

    /// Installs `locator` for `category`, returning the locator it replaced.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Deactivated`] once deactivation has begun.
    pub fn add_servant_locator(
        &self,
        locator: Arc<dyn ServantLocator>,
        category: &str,
    ) -> Result<Option<Arc<dyn ServantLocator>>, AdapterError> {
        self.shared
            .lifecycle
            .while_accepting(|| self.shared.locators.add(category, locator))
            .map_err(|state| AdapterError::deactivated(self.name(), state))
    }

    /// Removes and returns the locator installed for `category`.
    pub fn remove_servant_locator(&self, category: &str) -> Option<Arc<dyn ServantLocator>> {
        self.shared.locators.remove(category)
    }

    /// Returns the locator installed for exactly `category`.
    #[must_use]
    pub fn find_servant_locator(&self, category: &str) -> Option<Arc<dyn ServantLocator>> {
        self.shared.locators.get(category)
    }
}

impl fmt::Debug for ObjectAdapter {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ObjectAdapter")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .field("in_flight", &self.in_flight())
            .field("servants", &self.shared.servants)
            .field("locators", &self.shared.locators)
            .finish()
    }
}
