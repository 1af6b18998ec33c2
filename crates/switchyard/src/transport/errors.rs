//! Error types for the request front end.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced while binding or running the socket listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty { host: String, port: u16 },
    #[error("failed to bind TCP listener at {addr}: {source}")]
    BindTcp {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("endpoint {endpoint} cannot serve requests; use a tcp:// endpoint")]
    UnsupportedEndpoint { endpoint: String },
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
    #[error("failed to start listener thread: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },
    #[error("listener thread panicked")]
    ThreadPanic,
}

/// Errors raised while serving a single connection.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Reading or writing the connection failed.
    #[error("connection I/O failed: {0}")]
    Io(#[from] io::Error),
    /// The request line exceeded the size limit.
    #[error("request exceeds {limit} bytes")]
    RequestTooLarge { limit: usize },
    /// A reply could not be encoded.
    #[error("failed to encode reply: {0}")]
    Encode(#[from] serde_json::Error),
}
