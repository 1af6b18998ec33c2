//! BDD test world: encapsulates the loader, reporter, and bootstrap or daemon
//! state for the runtime step functions.

use std::cell::RefCell;
use std::sync::Arc;

use switchyard_config::Endpoint;

use crate::adapter::ObjectAdapter;
use crate::bootstrap::{BootstrapError, ConfigLoader, bootstrap_with};
use crate::communicator::Communicator;
use crate::identity::Identity;
use crate::process::{DaemonRuntime, LaunchError};
use crate::servant::sync_servant;
use crate::transport::{WireReply, send_request};

use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::reporter::RecordingHealthReporter;

/// Scenario world shared across bootstrap and daemon steps.
pub struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingHealthReporter>,
    communicator: Option<Communicator>,
    bootstrap_error: Option<BootstrapError>,
    runtime: Option<DaemonRuntime>,
    adapter: Option<ObjectAdapter>,
    stop_result: Option<Result<(), LaunchError>>,
    reply: Option<WireReply>,
}

impl TestWorld {
    /// Builds a world with a successful configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: Box::new(TestConfigLoader::new()),
            reporter: Arc::new(RecordingHealthReporter::default()),
            communicator: None,
            bootstrap_error: None,
            runtime: None,
            adapter: None,
            stop_result: None,
            reply: None,
        }
    }

    /// Installs a loader that always fails.
    pub fn use_failing_loader(&mut self) {
        self.use_loader(FailingConfigLoader);
    }

    /// Installs a loader that succeeds.
    pub fn use_successful_loader(&mut self) {
        self.use_loader(TestConfigLoader::new());
    }

    /// Installs a loader with discovery enabled.
    pub fn use_discovery_loader(&mut self) {
        self.use_loader(TestConfigLoader::new().with_discovery());
    }

    /// Installs a loader with discovery enabled and an explicit locator.
    pub fn use_locator_loader(&mut self, locator: Endpoint) {
        self.use_loader(TestConfigLoader::new().with_discovery().with_locator(locator));
    }

    fn use_loader(&mut self, loader: impl ConfigLoader + 'static) {
        self.loader = Box::new(loader);
        self.communicator = None;
        self.bootstrap_error = None;
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        if self.communicator.is_some() || self.bootstrap_error.is_some() {
            return;
        }

        match bootstrap_with(&*self.loader, self.reporter.clone()) {
            Ok(communicator) => self.communicator = Some(communicator),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    /// Returns the bootstrap error, if any.
    #[must_use]
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    /// Returns the bootstrapped communicator, if any.
    #[must_use]
    pub fn communicator(&self) -> Option<&Communicator> {
        self.communicator.as_ref()
    }

    /// Starts a full daemon runtime with the current loader.
    ///
    /// # Errors
    ///
    /// Returns the launch error rendered as text.
    pub fn start_daemon(&mut self) -> Result<(), String> {
        let runtime = DaemonRuntime::start(&*self.loader, self.reporter.clone())
            .map_err(|error| format!("daemon failed to start: {error}"))?;
        self.adapter = Some(runtime.adapter().clone());
        self.runtime = Some(runtime);
        Ok(())
    }

    /// Registers a servant replying `payload` on the daemon's adapter.
    ///
    /// # Errors
    ///
    /// Fails when no daemon runs or the identity cannot be registered.
    pub fn serve(&self, identity: &str, payload: &str) -> Result<(), String> {
        let runtime = self.runtime.as_ref().ok_or("daemon is not running")?;
        let identity = identity.parse::<Identity>().map_err(|error| error.to_string())?;
        let reply = payload.as_bytes().to_vec();
        runtime
            .adapter()
            .add(identity, sync_servant(move |_| Ok(reply.clone())))
            .map_err(|error| error.to_string())
    }

    /// Sends one JSONL request for `identity` to the running daemon.
    ///
    /// # Errors
    ///
    /// Fails when no daemon runs.
    pub fn send(&mut self, identity: &str) -> Result<(), String> {
        let runtime = self.runtime.as_ref().ok_or("daemon is not running")?;
        let addr = runtime.local_addr().ok_or("daemon has no local address")?;
        let line = serde_json::json!({ "identity": identity, "operation": "status" });
        self.reply = Some(send_request(addr, line.to_string().as_bytes()));
        Ok(())
    }

    /// Last reply read from the daemon.
    #[must_use]
    pub fn reply(&self) -> Option<&WireReply> {
        self.reply.as_ref()
    }

    /// The daemon adapter, kept after the daemon stops.
    #[must_use]
    pub fn daemon_adapter(&self) -> Option<&ObjectAdapter> {
        self.adapter.as_ref()
    }

    /// Stops the daemon runtime.
    pub fn stop_daemon(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            self.stop_result = Some(runtime.stop());
        }
    }

    /// Outcome of the last daemon stop.
    #[must_use]
    pub fn stop_result(&self) -> Option<&Result<(), LaunchError>> {
        self.stop_result.as_ref()
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Default test world fixture.
#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
