use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Settings consumed by the discovery client, plugin, and responder.
///
/// Projected from [`crate::Config`] so the discovery subsystem does not depend
/// on the full configuration surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverySettings {
    /// Group (or unicast address, in tests) lookups are sent to.
    pub group: SocketAddr,
    /// Time each attempt waits for a matching reply.
    pub timeout: Duration,
    /// Attempts made after the first one times out.
    pub retry_count: u32,
    /// Locator instance to look for; empty matches any instance.
    pub instance_name: String,
}

impl DiscoverySettings {
    /// Builds settings for the given group address and port.
    #[must_use]
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self {
            group: SocketAddr::new(address, port),
            timeout: Duration::from_millis(crate::defaults::DEFAULT_DISCOVERY_TIMEOUT_MS),
            retry_count: crate::defaults::DEFAULT_DISCOVERY_RETRY_COUNT,
            instance_name: String::new(),
        }
    }

    /// Overrides the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the retry budget.
    #[must_use]
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Restricts lookups to a named locator instance.
    #[must_use]
    pub fn with_instance_name(mut self, instance_name: impl Into<String>) -> Self {
        self.instance_name = instance_name.into();
        self
    }

    /// Upper bound on the time a full lookup may take.
    #[must_use]
    pub fn total_budget(&self) -> Duration {
        self.timeout
            .saturating_mul(self.retry_count.saturating_add(1))
    }
}
