//! Multicast locator discovery.
//!
//! A [`DiscoveryClient`] broadcasts lookup datagrams and correlates replies
//! by request id; a [`DiscoveryResponder`] answers lookups on behalf of a
//! locator. Both speak the JSON datagrams defined in [`wire`].

mod client;
mod errors;
mod responder;
mod transport;
pub mod wire;

pub use client::DiscoveryClient;
pub use errors::DiscoveryError;
pub use responder::DiscoveryResponder;
pub use transport::{LookupTransport, MulticastTransport, ReplyReceiver};
#[cfg(test)]
pub(crate) use transport::MockLookupTransport;
pub use wire::{DiscoveryMessage, LookupMessage, ReplyMessage};

/// Tracing target for discovery operations.
pub(crate) const DISCOVERY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::discovery");
