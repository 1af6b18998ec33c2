//! Error types for locator discovery.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;

/// Errors surfaced by discovery lookups and sockets.
///
/// Cloneable so a single lookup outcome can be handed to every queued
/// caller; I/O sources are shared through [`Arc`].
#[derive(Debug, Error, Clone)]
pub enum DiscoveryError {
    /// Every lookup attempt expired without a matching reply.
    #[error("no locator replied after {attempts} lookup attempts")]
    Timeout {
        /// Number of lookups broadcast.
        attempts: u32,
    },

    /// The client was shut down; no further lookups are serviced.
    #[error("discovery has been shut down")]
    ShutDown,

    /// A discovery socket could not be bound.
    #[error("failed to bind discovery socket on {address}: {source}")]
    Bind {
        /// Address the bind was attempted on.
        address: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The responder could not join its multicast group.
    #[error("failed to join multicast group {group}: {source}")]
    Join {
        /// Group being joined.
        group: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// A datagram could not be sent.
    #[error("failed to send discovery datagram to {target}: {source}")]
    Send {
        /// Destination of the datagram.
        target: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// A message could not be encoded.
    #[error("failed to encode discovery message: {source}")]
    Encode {
        /// Underlying serializer error.
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// A socket option or worker thread could not be set up.
    #[error("failed to configure discovery {resource}: {source}")]
    Setup {
        /// What was being configured.
        resource: &'static str,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl DiscoveryError {
    pub(crate) fn bind(address: SocketAddr, source: io::Error) -> Self {
        Self::Bind {
            address,
            source: Arc::new(source),
        }
    }

    pub(crate) fn join(group: SocketAddr, source: io::Error) -> Self {
        Self::Join {
            group,
            source: Arc::new(source),
        }
    }

    pub(crate) fn send(target: SocketAddr, source: io::Error) -> Self {
        Self::Send {
            target,
            source: Arc::new(source),
        }
    }

    pub(crate) fn encode(source: serde_json::Error) -> Self {
        Self::Encode {
            source: Arc::new(source),
        }
    }

    pub(crate) fn setup(resource: &'static str, source: io::Error) -> Self {
        Self::Setup {
            resource,
            source: Arc::new(source),
        }
    }
}
