//! Discovery datagram encoding.
//!
//! Lookups and replies travel as single JSON datagrams tagged by `kind`.
//! Decoding is lenient by contract: anything that does not parse is dropped
//! by the receiver rather than reported.

use serde::{Deserialize, Serialize};

/// Largest datagram the discovery sockets read.
pub const MAX_DATAGRAM_BYTES: usize = 1024;

/// Broadcast request for a locator endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LookupMessage {
    /// Correlates replies with this lookup attempt.
    pub request_id: u32,
    /// Locator instance filter; empty matches any instance.
    #[serde(default)]
    pub instance_name: String,
    /// Address replies should be sent to (`host:port`).
    pub reply_endpoint: String,
}

/// Point-to-point answer to a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReplyMessage {
    /// Request id copied from the lookup being answered.
    pub request_id: u32,
    /// Endpoint of the responding locator.
    pub locator_endpoint: String,
}

/// Any datagram exchanged by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscoveryMessage {
    /// A lookup broadcast.
    Lookup(LookupMessage),
    /// A reply to a lookup.
    Reply(ReplyMessage),
}

impl DiscoveryMessage {
    /// Encodes the message as a JSON datagram.
    ///
    /// # Errors
    ///
    /// Returns the serializer error.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes a datagram, returning `None` for anything malformed.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice(bytes).ok()
    }
}

impl From<LookupMessage> for DiscoveryMessage {
    fn from(message: LookupMessage) -> Self {
        Self::Lookup(message)
    }
}

impl From<ReplyMessage> for DiscoveryMessage {
    fn from(message: ReplyMessage) -> Self {
        Self::Reply(message)
    }
}
