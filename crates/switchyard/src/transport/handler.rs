//! Connection handling for the request listener.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::mpsc;
use std::time::Duration;

use tracing::{debug, warn};

use super::wire::{WireReply, WireRequest};
use super::{LISTENER_TARGET, TransportError};
use crate::adapter::ObjectAdapter;
use crate::servant::{FailureKind, Reply, Request};

/// Largest accepted request line, newline included.
pub(crate) const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Handles accepted socket connections.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection. Implementations should avoid panicking.
    fn handle(&self, stream: TcpStream);
}

/// Serves one JSONL request per connection through an adapter.
#[derive(Debug, Clone)]
pub(crate) struct DispatchConnectionHandler {
    adapter: ObjectAdapter,
    reply_timeout: Duration,
}

impl DispatchConnectionHandler {
    pub(crate) fn new(adapter: ObjectAdapter, reply_timeout: Duration) -> Self {
        Self {
            adapter,
            reply_timeout,
        }
    }

    fn serve(&self, stream: &mut TcpStream) -> Result<(), TransportError> {
        let line = match read_request_line(stream) {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(()),
            Err(TransportError::RequestTooLarge { limit }) => {
                let reply = WireReply::invalid(format!("request exceeds {limit} bytes"));
                return write_reply(stream, &reply);
            }
            Err(error) => return Err(error),
        };

        let reply = match decode_request(&line) {
            Ok(request) => self.dispatch(request),
            Err(message) => {
                debug!(target: LISTENER_TARGET, %message, "rejecting malformed request");
                WireReply::invalid(message)
            }
        };
        write_reply(stream, &reply)
    }

    fn dispatch(&self, request: Request) -> WireReply {
        let (sender, receiver) = mpsc::channel();
        let status = self.adapter.dispatch(request, move |reply: Reply| {
            // The connection may have given up waiting.
            sender.send(reply).ok();
        });
        debug!(target: LISTENER_TARGET, ?status, "request dispatched");
        match receiver.recv_timeout(self.reply_timeout) {
            Ok(reply) => WireReply::from(reply),
            Err(_) => WireReply::from(Reply::failure(
                FailureKind::HandlerAbandoned,
                format!("no reply within {} ms", self.reply_timeout.as_millis()),
            )),
        }
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, mut stream: TcpStream) {
        if let Err(error) = self.serve(&mut stream) {
            warn!(
                target: LISTENER_TARGET,
                error = %error,
                "connection handler error"
            );
        }
    }
}

fn decode_request(line: &[u8]) -> Result<Request, String> {
    let wire: WireRequest = serde_json::from_slice(line.trim_ascii_end())
        .map_err(|error| format!("malformed request: {error}"))?;
    wire.into_request()
}

fn write_reply(stream: &mut TcpStream, reply: &WireReply) -> Result<(), TransportError> {
    let mut line = serde_json::to_vec(reply)?;
    line.push(b'\n');
    stream.write_all(&line)?;
    stream.flush()?;
    Ok(())
}

fn read_request_line(stream: &mut impl Read) -> Result<Option<Vec<u8>>, TransportError> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let bytes_read = read_chunk_with_retry(stream, &mut chunk)?;
        if bytes_read == 0 {
            return Ok((!buffer.is_empty()).then_some(buffer));
        }

        let received = chunk.get(..bytes_read).unwrap_or_default();
        if let Some(position) = received.iter().position(|byte| *byte == b'\n') {
            buffer.extend_from_slice(received.get(..=position).unwrap_or_default());
            enforce_request_limit(buffer.len())?;
            return Ok(Some(buffer));
        }

        buffer.extend_from_slice(received);
        enforce_request_limit(buffer.len())?;
    }
}

fn read_chunk_with_retry(stream: &mut impl Read, chunk: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(chunk) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}

fn enforce_request_limit(size: usize) -> Result<(), TransportError> {
    if size > MAX_REQUEST_BYTES {
        return Err(TransportError::RequestTooLarge {
            limit: MAX_REQUEST_BYTES,
        });
    }
    Ok(())
}
