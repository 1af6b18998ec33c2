//! Object adapter routing core with multicast locator discovery.
//!
//! An [`ObjectAdapter`] routes decoded requests to servants registered under
//! an [`Identity`] and facet, falling back to a [`ServantLocator`] registered
//! for the identity's category. Servants reply through a [`Continuation`]
//! that must be completed exactly once, synchronously or from any thread.
//! Adapters move through `Created`, `Activated`, `Deactivating`, and
//! `Deactivated`; deactivation waits for in-flight dispatches to drain.
//!
//! A [`Communicator`] owns the adapters of a process together with its
//! plugins. The [`DiscoveryPlugin`] installs a [`DiscoveryClient`] that finds
//! the locator by broadcasting lookup datagrams and correlating replies by
//! request id; a [`DiscoveryResponder`] answers those lookups.
//!
//! The `switchyardd` binary wires everything together behind a JSONL TCP
//! front end; see [`run_daemon`].

mod adapter;
mod bootstrap;
mod communicator;
mod completion;
pub mod discovery;
mod health;
mod identity;
mod locator;
mod plugin;
mod process;
mod registry;
mod servant;
mod telemetry;
mod transport;

pub use adapter::{AdapterError, AdapterState, DispatchStatus, ObjectAdapter};
pub use bootstrap::{
    BootstrapError, ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use communicator::{Communicator, CommunicatorError, LocatorSource};
pub use completion::{Continuation, DoubleCompletionError};
pub use discovery::{DiscoveryClient, DiscoveryError, DiscoveryResponder};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use identity::{Identity, IdentityParseError};
pub use locator::{Cookie, LocateError, Located, LocatorTable, ServantLocator};
pub use plugin::{DiscoveryPlugin, Plugin, PluginError};
pub use process::{
    DaemonRuntime, LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon,
};
pub use registry::ServantRegistry;
pub use servant::{
    Failure, FailureKind, Reply, ReplySink, Request, Servant, ServantResult, UserFailure,
    sync_servant,
};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{WireReply, WireRequest};

#[cfg(test)]
mod tests;
