//! Shared configuration for the switchyard runtime and daemon.
//!
//! Configuration is layered by [`ortho_config`]: built-in defaults, then the
//! configuration file, then `SWITCHYARD_*` environment variables, then command
//! line flags. The resolved [`Config`] is consumed by the communicator
//! bootstrap, the telemetry layer, and the discovery subsystem (through the
//! [`DiscoverySettings`] projection).

mod defaults;
mod discovery;
mod endpoint;
mod logging;
mod policy;

use std::ffi::OsString;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_ADAPTER_NAME, DEFAULT_ADAPTER_PORT, DEFAULT_DISCOVERY_PORT,
    DEFAULT_DISCOVERY_RETRY_COUNT, DEFAULT_DISCOVERY_TIMEOUT_MS, DEFAULT_MULTICAST_ADDRESS,
    default_adapter_endpoint, default_adapter_name, default_discovery_enabled,
    default_discovery_port, default_discovery_retry_count, default_discovery_timeout_ms,
    default_multicast_address,
};
pub use discovery::DiscoverySettings;
pub use endpoint::{Endpoint, EndpointParseError, EndpointResolveError};
pub use logging::{
    DEFAULT_LOG_FILTER, LogFormat, LogFormatParseError, default_log_filter,
    default_log_filter_string, default_log_format,
};
pub use policy::{RegistrationPolicy, RegistrationPolicyParseError};

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SWITCHYARD")]
pub struct Config {
    /// Name of the object adapter created by the daemon.
    #[serde(default = "default_adapter_name")]
    #[ortho_config(default = default_adapter_name())]
    pub adapter_name: String,
    /// Endpoint the daemon serves JSONL requests on.
    #[serde(default = "default_adapter_endpoint")]
    #[ortho_config(default = default_adapter_endpoint())]
    pub adapter_endpoint: Endpoint,
    /// Behaviour when a servant key is registered twice.
    #[serde(default)]
    #[ortho_config(default = RegistrationPolicy::default())]
    pub registration_policy: RegistrationPolicy,
    /// Explicit locator endpoint; when present discovery is never consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<Endpoint>,
    /// Installs the discovery plugin at bootstrap.
    ///
    /// Set through the file or environment only: a clap switch that is
    /// absent would resolve to `false` and mask both lower layers.
    #[serde(default = "default_discovery_enabled")]
    #[ortho_config(default = default_discovery_enabled(), skip_cli)]
    pub discovery_enabled: bool,
    /// Multicast group that lookups are sent to.
    #[serde(default = "default_multicast_address")]
    #[ortho_config(default = default_multicast_address())]
    pub discovery_multicast_address: IpAddr,
    /// UDP port shared by lookups and responders.
    #[serde(default = "default_discovery_port")]
    #[ortho_config(default = default_discovery_port())]
    pub discovery_port: u16,
    /// Per-attempt lookup timeout in milliseconds.
    #[serde(default = "default_discovery_timeout_ms")]
    #[ortho_config(default = default_discovery_timeout_ms())]
    pub discovery_timeout_ms: u64,
    /// Lookups re-sent after the first attempt times out.
    #[serde(default = "default_discovery_retry_count")]
    #[ortho_config(default = default_discovery_retry_count())]
    pub discovery_retry_count: u32,
    /// Locator instance name filter; empty matches any instance.
    #[serde(default)]
    #[ortho_config(default = String::new())]
    pub discovery_instance_name: String,
    /// Locator endpoint this process advertises to discovery lookups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_advertise: Option<Endpoint>,
    /// Tracing filter expression.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Tracing output format.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            adapter_name: default_adapter_name(),
            adapter_endpoint: default_adapter_endpoint(),
            registration_policy: RegistrationPolicy::default(),
            locator: None,
            discovery_enabled: default_discovery_enabled(),
            discovery_multicast_address: default_multicast_address(),
            discovery_port: default_discovery_port(),
            discovery_timeout_ms: default_discovery_timeout_ms(),
            discovery_retry_count: default_discovery_retry_count(),
            discovery_instance_name: String::new(),
            discovery_advertise: None,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads configuration from every layer, reading the process arguments.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Loads configuration using the supplied argument iterator in place of
    /// the process arguments.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Name of the daemon's object adapter.
    #[must_use]
    pub fn adapter_name(&self) -> &str {
        self.adapter_name.as_str()
    }

    /// Endpoint the daemon serves requests on.
    #[must_use]
    pub fn adapter_endpoint(&self) -> &Endpoint {
        &self.adapter_endpoint
    }

    /// Registration policy applied to new adapters.
    #[must_use]
    pub fn registration_policy(&self) -> RegistrationPolicy {
        self.registration_policy
    }

    /// Explicitly configured locator, if any.
    #[must_use]
    pub fn locator(&self) -> Option<&Endpoint> {
        self.locator.as_ref()
    }

    /// Returns `true` when bootstrap should install the discovery plugin.
    #[must_use]
    pub fn discovery_active(&self) -> bool {
        self.discovery_enabled && self.locator.is_none()
    }

    /// Endpoint advertised to discovery lookups, if any.
    #[must_use]
    pub fn discovery_advertise(&self) -> Option<&Endpoint> {
        self.discovery_advertise.as_ref()
    }

    /// Projects the discovery fields into [`DiscoverySettings`].
    #[must_use]
    pub fn discovery(&self) -> DiscoverySettings {
        DiscoverySettings::new(self.discovery_multicast_address, self.discovery_port)
            .with_timeout(Duration::from_millis(self.discovery_timeout_ms))
            .with_retry_count(self.discovery_retry_count)
            .with_instance_name(self.discovery_instance_name.clone())
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Tracing output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
