//! JSONL request front end.
//!
//! The listener binds the adapter's TCP endpoint and accepts connections in
//! a background thread. Each connection carries one JSON request line that
//! is dispatched through an [`ObjectAdapter`](crate::ObjectAdapter); the
//! reply is written back as one JSON line.

mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod test_utils;
mod wire;

pub(crate) use self::errors::{ListenerError, TransportError};
pub(crate) use self::handler::{ConnectionHandler, DispatchConnectionHandler};
pub(crate) use self::listener::{ListenerHandle, SocketListener};
#[cfg(test)]
pub(crate) use self::test_utils::{CountingHandler, send_request};
pub use self::wire::{WireReply, WireRequest};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
