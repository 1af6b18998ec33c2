//! Test harness utilities shared by the unit and behavioural suites.

mod config_loader;
mod discovery_world;
mod dispatch_world;
mod reporter;
mod servants;
mod world;

pub use config_loader::{FailingConfigLoader, TEST_ADAPTER_NAME, TestConfigLoader};
pub use discovery_world::DiscoveryWorld;
pub use dispatch_world::DispatchWorld;
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use servants::{
    CountingServant, DeferredServant, FinishedCall, REPLY_TIMEOUT, RecordingLocator, reply_probe,
};
pub use world::{TestWorld, world};
