//! Test helpers for the transport module.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use super::{ConnectionHandler, WireReply};

pub(crate) struct CountingHandler {
    count: Arc<AtomicUsize>,
}

impl CountingHandler {
    pub(crate) fn new() -> (Arc<AtomicUsize>, Arc<Self>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Self {
            count: Arc::clone(&count),
        });
        (count, handler)
    }
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, _stream: TcpStream) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sends one request line to `addr` and decodes the reply line.
pub(crate) fn send_request(addr: SocketAddr, request: &[u8]) -> WireReply {
    let mut client = TcpStream::connect(addr).expect("connect client");
    client.write_all(request).expect("write request");
    client.write_all(b"\n").expect("write newline");
    client.flush().expect("flush request");

    let mut response = String::new();
    BufReader::new(&mut client)
        .read_line(&mut response)
        .expect("read response");
    serde_json::from_str(&response).expect("decode reply line")
}
