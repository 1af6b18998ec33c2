//! Communicator plugins and the discovery plugin.
//!
//! Plugins are owned by a [`Communicator`] and live for its full lifetime:
//! they are initialised when added and destroyed, in reverse order, when the
//! communicator shuts down.

use std::fmt;
use std::sync::Arc;

use switchyard_config::DiscoverySettings;
use thiserror::Error;
use tracing::debug;

use crate::communicator::{Communicator, LocatorSource};
use crate::discovery::{
    DiscoveryClient, DiscoveryError, LookupTransport, MulticastTransport, ReplyReceiver,
};

const PLUGIN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::plugin");

/// Errors raised while initialising a plugin.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Discovery sockets or threads could not be set up.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Another plugin already provides the communicator's locator.
    #[error("a locator source is already installed")]
    LocatorSourceInstalled,

    /// The plugin was added to a communicator that has shut down.
    #[error("communicator has been shut down")]
    ShutDown,
}

/// Extension hooked into a [`Communicator`]'s lifetime.
pub trait Plugin: Send {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Called once when the plugin is added to `communicator`.
    ///
    /// # Errors
    ///
    /// Returns a [`PluginError`] when the plugin cannot start; the
    /// communicator then discards it without calling [`Plugin::destroy`].
    fn initialize(&mut self, communicator: &Communicator) -> Result<(), PluginError>;

    /// Called once when `communicator` shuts down.
    fn destroy(&mut self, communicator: &Communicator);
}

/// Installs a [`DiscoveryClient`] as the communicator's locator source.
pub struct DiscoveryPlugin {
    settings: DiscoverySettings,
    transport: Option<Arc<dyn LookupTransport>>,
    client: Option<Arc<DiscoveryClient>>,
    receiver: Option<ReplyReceiver>,
}

impl DiscoveryPlugin {
    /// Name reported for the discovery plugin.
    pub const NAME: &'static str = "discovery";

    /// Creates a plugin that binds a multicast transport on initialisation.
    #[must_use]
    pub fn new(settings: DiscoverySettings) -> Self {
        Self {
            settings,
            transport: None,
            client: None,
            receiver: None,
        }
    }

    /// Creates a plugin broadcasting through `transport`. Replies must be fed
    /// to [`DiscoveryPlugin::client`] by the caller.
    #[must_use]
    pub fn with_transport(settings: DiscoverySettings, transport: Arc<dyn LookupTransport>) -> Self {
        Self {
            transport: Some(transport),
            ..Self::new(settings)
        }
    }

    /// Client owned by the plugin while it is initialised.
    #[must_use]
    pub fn client(&self) -> Option<Arc<DiscoveryClient>> {
        self.client.clone()
    }

    fn start_client(
        &mut self,
        communicator: &Communicator,
    ) -> Result<Arc<DiscoveryClient>, DiscoveryError> {
        let settings = self.settings.clone();
        if let Some(transport) = self.transport.clone() {
            let client = DiscoveryClient::new(transport, settings)
                .with_reporter(communicator.reporter());
            return Ok(Arc::new(client));
        }

        let multicast = Arc::new(MulticastTransport::bind(settings.group)?);
        let transport: Arc<dyn LookupTransport> = multicast.clone();
        let client = Arc::new(
            DiscoveryClient::new(transport, settings).with_reporter(communicator.reporter()),
        );
        self.receiver = Some(multicast.spawn_receiver(&client)?);
        Ok(client)
    }

    fn release(&mut self) {
        if let Some(client) = self.client.take() {
            client.shutdown();
        }
        if let Some(mut receiver) = self.receiver.take() {
            receiver.stop();
        }
    }
}

impl Plugin for DiscoveryPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&mut self, communicator: &Communicator) -> Result<(), PluginError> {
        let client = self.start_client(communicator)?;
        let source: Arc<dyn LocatorSource> = client.clone();
        self.client = Some(client);
        if !communicator.install_locator_source(source) {
            self.release();
            return Err(PluginError::LocatorSourceInstalled);
        }
        debug!(
            target: PLUGIN_TARGET,
            group = %self.settings.group,
            instance = %self.settings.instance_name,
            "discovery client installed as locator source"
        );
        Ok(())
    }

    fn destroy(&mut self, communicator: &Communicator) {
        communicator.clear_locator_source();
        self.release();
        debug!(target: PLUGIN_TARGET, "discovery client released");
    }
}

impl fmt::Debug for DiscoveryPlugin {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DiscoveryPlugin")
            .field("settings", &self.settings)
            .field("injected_transport", &self.transport.is_some())
            .field("client", &self.client)
            .field("receiver", &self.receiver)
            .finish()
    }
}
