//! Daemon runtime: wiring the adapter, listener, and responder, then waiting
//! for a shutdown signal.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ortho_config::OrthoError;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::{info, warn};

use crate::adapter::{AdapterError, ObjectAdapter};
use crate::bootstrap::{BootstrapError, ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::communicator::{Communicator, CommunicatorError};
use crate::discovery::{DiscoveryError, DiscoveryResponder};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::{DispatchConnectionHandler, ListenerError, ListenerHandle, SocketListener};

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced while launching or supervising the daemon.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Bootstrapping the runtime failed.
    #[error("bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// The configured adapter could not be created.
    #[error("failed to create object adapter: {source}")]
    Adapter {
        /// Underlying communicator error.
        #[source]
        source: CommunicatorError,
    },
    /// The adapter refused to activate.
    #[error("failed to activate object adapter: {source}")]
    Activate {
        /// Underlying adapter error.
        #[source]
        source: AdapterError,
    },
    /// The request listener could not be started.
    #[error("failed to start request listener: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// The discovery responder could not be started.
    #[error("failed to start discovery responder: {source}")]
    Responder {
        /// Underlying discovery error.
        #[source]
        source: DiscoveryError,
    },
    /// Waiting for shutdown failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        match source {
            BootstrapError::Configuration { source } => Self::Config { source },
            other => Self::Bootstrap { source: other },
        }
    }
}

impl From<ListenerError> for LaunchError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until shutdown should proceed.
    ///
    /// # Errors
    ///
    /// Returns a [`ShutdownError`] when the notification source cannot be
    /// installed.
    fn wait(&self) -> Result<(), ShutdownError>;
}

/// Shutdown listener that waits for termination signals.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        if let Some(signal) = signals.forever().next() {
            info!(
                target: PROCESS_TARGET,
                signal,
                timeout_ms = SHUTDOWN_TIMEOUT.as_millis(),
                "shutdown signal received"
            );
        }
        Ok(())
    }
}

/// Running daemon: communicator, active adapter, listener, and optional
/// discovery responder.
#[derive(Debug)]
pub struct DaemonRuntime {
    communicator: Communicator,
    adapter: ObjectAdapter,
    listener: ListenerHandle,
    local_addr: Option<SocketAddr>,
    responder: Option<DiscoveryResponder>,
}

impl DaemonRuntime {
    /// Bootstraps the communicator and starts serving requests.
    ///
    /// # Errors
    ///
    /// Returns a [`LaunchError`] naming the first component that failed to
    /// start; components already started are shut down again.
    pub fn start(
        loader: &dyn ConfigLoader,
        reporter: Arc<dyn HealthReporter>,
    ) -> Result<Self, LaunchError> {
        let communicator = bootstrap_with(loader, reporter)?;
        let config = communicator.config().clone();
        let adapter = communicator
            .create_object_adapter(config.adapter_name())
            .map_err(|source| LaunchError::Adapter { source })?;
        adapter
            .activate()
            .map_err(|source| LaunchError::Activate { source })?;

        let listener = SocketListener::bind(config.adapter_endpoint())?;
        let local_addr = listener.local_addr();
        let handler = Arc::new(DispatchConnectionHandler::new(adapter.clone(), REPLY_TIMEOUT));
        let listener = listener.start(handler)?;

        let responder = match config.discovery_advertise() {
            Some(advertised) => Some(
                DiscoveryResponder::start(&config.discovery(), advertised.to_string())
                    .map_err(|source| LaunchError::Responder { source })?,
            ),
            None => None,
        };

        info!(
            target: PROCESS_TARGET,
            adapter = adapter.name(),
            endpoint = %config.adapter_endpoint(),
            responder = responder.is_some(),
            "daemon runtime ready"
        );
        Ok(Self {
            communicator,
            adapter,
            listener,
            local_addr,
            responder,
        })
    }

    /// Address the request listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// The daemon's object adapter.
    #[must_use]
    pub fn adapter(&self) -> &ObjectAdapter {
        &self.adapter
    }

    /// The daemon's communicator.
    #[must_use]
    pub fn communicator(&self) -> &Communicator {
        &self.communicator
    }

    /// Address the discovery responder is bound to, when one runs.
    #[must_use]
    pub fn responder_addr(&self) -> Option<SocketAddr> {
        self.responder.as_ref().map(DiscoveryResponder::local_addr)
    }

    /// Stops accepting connections, deactivates the adapter, and waits for
    /// in-flight requests to drain.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Listener`] when the listener thread panicked.
    pub fn stop(self) -> Result<(), LaunchError> {
        let Self {
            communicator,
            adapter,
            listener,
            responder,
            ..
        } = self;
        listener.shutdown();
        drop(responder);
        communicator.shutdown();
        if !adapter.wait_for_deactivate(SHUTDOWN_TIMEOUT) {
            warn!(
                target: PROCESS_TARGET,
                in_flight = adapter.in_flight(),
                "in-flight requests still running at shutdown"
            );
        }
        listener.join()?;
        info!(target: PROCESS_TARGET, "shutdown sequence completed");
        Ok(())
    }
}

/// Runs the daemon using the production collaborators.
///
/// # Errors
///
/// Returns a [`LaunchError`] when startup fails or signals cannot be
/// awaited.
pub fn run_daemon() -> Result<(), LaunchError> {
    let reporter = Arc::new(StructuredHealthReporter::new());
    run_daemon_with(&SystemConfigLoader, reporter, &SystemShutdownSignal)
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    info!(target: PROCESS_TARGET, "starting daemon runtime");
    let runtime = DaemonRuntime::start(loader, reporter)?;
    if let Err(error) = shutdown.wait() {
        runtime.stop()?;
        return Err(error.into());
    }
    runtime.stop()
}
