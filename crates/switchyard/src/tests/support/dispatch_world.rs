//! Scenario world for the routing and lifecycle suites.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::Receiver;

use switchyard_config::RegistrationPolicy;

use crate::adapter::{AdapterError, DispatchStatus, ObjectAdapter};
use crate::identity::Identity;
use crate::servant::{Reply, Request};

use super::reporter::RecordingHealthReporter;
use super::servants::{CountingServant, DeferredServant, REPLY_TIMEOUT, RecordingLocator, reply_probe};

/// Adapter name used by every routing scenario.
pub const ROUTING_ADAPTER: &str = "routing";

/// Adapter, doubles, and captured replies for one scenario.
pub struct DispatchWorld {
    pub reporter: Arc<RecordingHealthReporter>,
    adapter: ObjectAdapter,
    servants: HashMap<Identity, CountingServant>,
    deferred: Arc<DeferredServant>,
    locators: HashMap<String, Arc<RecordingLocator>>,
    status: Option<DispatchStatus>,
    reply: Option<Reply>,
    parked: Option<Receiver<Reply>>,
    registration: Option<Result<(), AdapterError>>,
}

impl DispatchWorld {
    /// Builds a world around a freshly created adapter.
    #[must_use]
    pub fn new() -> Self {
        let reporter = Arc::new(RecordingHealthReporter::default());
        let adapter =
            ObjectAdapter::with_reporter(ROUTING_ADAPTER, RegistrationPolicy::Replace, reporter.clone());
        Self {
            reporter,
            adapter,
            servants: HashMap::new(),
            deferred: DeferredServant::new(),
            locators: HashMap::new(),
            status: None,
            reply: None,
            parked: None,
            registration: None,
        }
    }

    /// The adapter under test.
    #[must_use]
    pub fn adapter(&self) -> &ObjectAdapter {
        &self.adapter
    }

    /// Activates the adapter.
    ///
    /// # Errors
    ///
    /// Returns the adapter error rendered as text.
    pub fn activate(&self) -> Result<(), String> {
        self.adapter.activate().map_err(|error| error.to_string())
    }

    /// Registers a counting servant replying `payload` for `identity`.
    ///
    /// # Errors
    ///
    /// Fails when the identity text is malformed or registration fails.
    pub fn register(&mut self, identity: &str, payload: &str) -> Result<(), String> {
        let identity = parse_identity(identity)?;
        let servant = CountingServant::replying(payload.as_bytes());
        self.adapter
            .add(identity.clone(), servant.servant())
            .map_err(|error| error.to_string())?;
        self.servants.insert(identity, servant);
        Ok(())
    }

    /// Attempts a registration, keeping the outcome for later assertions.
    ///
    /// # Errors
    ///
    /// Fails only when the identity text is malformed.
    pub fn try_register(&mut self, identity: &str) -> Result<(), String> {
        let identity = parse_identity(identity)?;
        let servant = CountingServant::replying(b"late");
        self.registration = Some(self.adapter.add(identity, servant.servant()));
        Ok(())
    }

    /// Registers the parking servant for `identity`.
    ///
    /// # Errors
    ///
    /// Fails when the identity text is malformed or registration fails.
    pub fn register_deferred(&self, identity: &str) -> Result<(), String> {
        let identity = parse_identity(identity)?;
        self.adapter
            .add(identity, self.deferred.clone())
            .map_err(|error| error.to_string())
    }

    /// Installs `locator` for `category`.
    ///
    /// # Errors
    ///
    /// Returns the adapter error rendered as text.
    pub fn install_locator(
        &mut self,
        category: &str,
        locator: Arc<RecordingLocator>,
    ) -> Result<(), String> {
        self.adapter
            .add_servant_locator(locator.clone(), category)
            .map_err(|error| error.to_string())?;
        self.locators.insert(category.to_owned(), locator);
        Ok(())
    }

    /// Dispatches a request and waits for its reply.
    ///
    /// # Errors
    ///
    /// Fails when the identity is malformed or no reply arrives in time.
    pub fn dispatch(&mut self, identity: &str, facet: &str) -> Result<(), String> {
        let request = Request::new(parse_identity(identity)?, "invoke").with_facet(facet);
        let (sink, replies) = reply_probe();
        self.status = Some(self.adapter.dispatch(request, sink));
        let reply = replies
            .recv_timeout(REPLY_TIMEOUT)
            .map_err(|_| format!("no reply for {identity}"))?;
        self.reply = Some(reply);
        Ok(())
    }

    /// Dispatches a request whose reply is collected later.
    ///
    /// # Errors
    ///
    /// Fails when the identity text is malformed.
    pub fn dispatch_detached(&mut self, identity: &str) -> Result<(), String> {
        let request = Request::new(parse_identity(identity)?, "invoke");
        let (sink, replies) = reply_probe();
        self.status = Some(self.adapter.dispatch(request, sink));
        self.parked = Some(replies);
        Ok(())
    }

    /// Completes the oldest parked continuation with `payload` and collects
    /// the reply it produces.
    ///
    /// # Errors
    ///
    /// Fails when nothing is parked or the completion is rejected.
    pub fn complete_parked(&mut self, payload: &str) -> Result<(), String> {
        if self.deferred.pending() == 0 {
            return Err("no continuation is parked".to_owned());
        }
        self.deferred
            .take()
            .complete(Ok(payload.as_bytes().to_vec()))
            .map_err(|error| error.to_string())?;
        let replies = self.parked.take().ok_or("no detached dispatch is waiting")?;
        let reply = replies
            .recv_timeout(REPLY_TIMEOUT)
            .map_err(|_| "parked dispatch never replied".to_owned())?;
        self.reply = Some(reply);
        Ok(())
    }

    /// Status returned by the last dispatch.
    #[must_use]
    pub fn status(&self) -> Option<DispatchStatus> {
        self.status
    }

    /// Reply produced by the last completed dispatch.
    #[must_use]
    pub fn reply(&self) -> Option<&Reply> {
        self.reply.as_ref()
    }

    /// Outcome of the last [`DispatchWorld::try_register`].
    #[must_use]
    pub fn registration(&self) -> Option<&Result<(), AdapterError>> {
        self.registration.as_ref()
    }

    /// Invocation count of the servant registered for `identity`.
    ///
    /// # Errors
    ///
    /// Fails when no counting servant was registered for it.
    pub fn calls(&self, identity: &str) -> Result<usize, String> {
        let identity = parse_identity(identity)?;
        self.servants
            .get(&identity)
            .map(CountingServant::calls)
            .ok_or_else(|| format!("no servant registered for {identity}"))
    }

    /// Locator installed for `category`.
    ///
    /// # Errors
    ///
    /// Fails when no locator was installed there.
    pub fn locator(&self, category: &str) -> Result<&Arc<RecordingLocator>, String> {
        self.locators
            .get(category)
            .ok_or_else(|| format!("no locator installed for category '{category}'"))
    }

    /// Every installed locator.
    pub fn locators(&self) -> impl Iterator<Item = &Arc<RecordingLocator>> {
        self.locators.values()
    }
}

impl Default for DispatchWorld {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_identity(text: &str) -> Result<Identity, String> {
    text.parse()
        .map_err(|error| format!("invalid identity '{text}': {error}"))
}
