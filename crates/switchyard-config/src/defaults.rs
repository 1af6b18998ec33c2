use std::net::{IpAddr, Ipv4Addr};

use crate::endpoint::Endpoint;

/// Port the daemon listens on for JSONL requests when none is configured.
pub const DEFAULT_ADAPTER_PORT: u16 = 4062;

/// Name given to the daemon's object adapter.
pub const DEFAULT_ADAPTER_NAME: &str = "switchyard";

/// Multicast group that lookups are sent to.
pub const DEFAULT_MULTICAST_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::new(239, 255, 0, 1));

/// UDP port shared by discovery lookups and responders.
pub const DEFAULT_DISCOVERY_PORT: u16 = 4061;

/// Time a single lookup waits for a matching reply.
pub const DEFAULT_DISCOVERY_TIMEOUT_MS: u64 = 300;

/// Lookups re-sent after the first one times out.
pub const DEFAULT_DISCOVERY_RETRY_COUNT: u32 = 3;

/// Owned adapter name used where allocation is required (e.g. serde).
#[must_use]
pub fn default_adapter_name() -> String {
    DEFAULT_ADAPTER_NAME.to_owned()
}

/// Loopback endpoint the daemon serves requests on.
#[must_use]
pub fn default_adapter_endpoint() -> Endpoint {
    Endpoint::tcp("127.0.0.1", DEFAULT_ADAPTER_PORT)
}

/// Multicast group used by discovery.
#[must_use]
pub const fn default_multicast_address() -> IpAddr {
    DEFAULT_MULTICAST_ADDRESS
}

/// UDP port used by discovery.
#[must_use]
pub const fn default_discovery_port() -> u16 {
    DEFAULT_DISCOVERY_PORT
}

/// Per-attempt discovery timeout in milliseconds.
#[must_use]
pub const fn default_discovery_timeout_ms() -> u64 {
    DEFAULT_DISCOVERY_TIMEOUT_MS
}

/// Number of discovery retries after the first attempt.
#[must_use]
pub const fn default_discovery_retry_count() -> u32 {
    DEFAULT_DISCOVERY_RETRY_COUNT
}

/// Discovery is enabled unless a locator is configured explicitly.
#[must_use]
pub const fn default_discovery_enabled() -> bool {
    true
}
