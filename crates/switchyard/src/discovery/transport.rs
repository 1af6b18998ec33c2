//! UDP transport for discovery lookups and replies.

use std::io::{self, ErrorKind};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::DISCOVERY_TARGET;
use super::client::DiscoveryClient;
use super::errors::DiscoveryError;
use super::wire::{DiscoveryMessage, LookupMessage, MAX_DATAGRAM_BYTES};

/// Read timeout used by receiver threads so they notice shutdown promptly.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Sends lookup broadcasts on behalf of a [`DiscoveryClient`].
#[cfg_attr(test, mockall::automock)]
pub trait LookupTransport: Send + Sync {
    /// Broadcasts one lookup datagram.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscoveryError`] when the datagram could not be sent.
    fn broadcast(&self, message: &LookupMessage) -> Result<(), DiscoveryError>;

    /// Endpoint (`host:port`) replies should be sent to.
    fn reply_endpoint(&self) -> String;
}

/// Lookup transport sending to a multicast group and receiving replies on an
/// ephemeral unicast socket.
#[derive(Debug)]
pub struct MulticastTransport {
    socket: UdpSocket,
    group: SocketAddr,
    reply_endpoint: String,
}

impl MulticastTransport {
    /// Binds an ephemeral socket for lookups sent to `group`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Bind`] when the socket cannot be bound, or
    /// [`DiscoveryError::Setup`] when socket options cannot be applied.
    pub fn bind(group: SocketAddr) -> Result<Self, DiscoveryError> {
        let local = SocketAddr::new(unspecified_for(group.ip()), 0);
        let socket = UdpSocket::bind(local).map_err(|source| DiscoveryError::bind(local, source))?;
        if matches!(group.ip(), IpAddr::V4(ip) if ip.is_multicast()) {
            socket
                .set_multicast_loop_v4(true)
                .map_err(|source| DiscoveryError::setup("multicast loopback", source))?;
        }
        let bound = socket
            .local_addr()
            .map_err(|source| DiscoveryError::setup("reply socket address", source))?;
        Ok(Self {
            socket,
            group,
            reply_endpoint: bound.to_string(),
        })
    }

    /// Multicast group lookups are sent to.
    #[must_use]
    pub fn group(&self) -> SocketAddr {
        self.group
    }

    /// Starts a thread feeding replies received on this transport's socket
    /// into `client`. The thread holds only a weak reference to the client.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Setup`] when the socket cannot be cloned or
    /// the thread cannot be spawned.
    pub fn spawn_receiver(&self, client: &Arc<DiscoveryClient>) -> Result<ReplyReceiver, DiscoveryError> {
        let socket = self
            .socket
            .try_clone()
            .map_err(|source| DiscoveryError::setup("reply socket", source))?;
        socket
            .set_read_timeout(Some(POLL_INTERVAL))
            .map_err(|source| DiscoveryError::setup("reply socket timeout", source))?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let client = Arc::downgrade(client);
        let handle = thread::Builder::new()
            .name("switchyard-discovery-replies".to_owned())
            .spawn(move || receive_replies(&socket, &client, &flag))
            .map_err(|source| DiscoveryError::setup("reply receiver thread", source))?;
        Ok(ReplyReceiver {
            shutdown,
            handle: Some(handle),
        })
    }
}

impl LookupTransport for MulticastTransport {
    fn broadcast(&self, message: &LookupMessage) -> Result<(), DiscoveryError> {
        let datagram = DiscoveryMessage::from(message.clone())
            .encode()
            .map_err(DiscoveryError::encode)?;
        self.socket
            .send_to(&datagram, self.group)
            .map_err(|source| DiscoveryError::send(self.group, source))?;
        Ok(())
    }

    fn reply_endpoint(&self) -> String {
        self.reply_endpoint.clone()
    }
}

fn receive_replies(socket: &UdpSocket, client: &Weak<DiscoveryClient>, shutdown: &AtomicBool) {
    let mut buffer = [0_u8; MAX_DATAGRAM_BYTES];
    while !shutdown.load(Ordering::SeqCst) {
        let (length, source) = match socket.recv_from(&mut buffer) {
            Ok(received) => received,
            Err(error) if is_timeout(&error) => continue,
            Err(error) => {
                warn!(target: DISCOVERY_TARGET, %error, "reply socket failed; receiver stopping");
                return;
            }
        };
        let Some(client) = client.upgrade() else {
            return;
        };
        match buffer.get(..length).and_then(DiscoveryMessage::decode) {
            Some(DiscoveryMessage::Reply(reply)) => {
                client.handle_reply(&reply);
            }
            Some(DiscoveryMessage::Lookup(_)) | None => {
                debug!(target: DISCOVERY_TARGET, %source, length, "ignoring unexpected datagram");
            }
        }
    }
}

pub(crate) fn is_timeout(error: &io::Error) -> bool {
    matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

pub(crate) fn unspecified_for(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}

/// Handle to a running reply receiver thread; stops it on drop.
#[derive(Debug)]
pub struct ReplyReceiver {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReplyReceiver {
    /// Signals the thread and waits for it to exit.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.join().is_err() {
            warn!(target: DISCOVERY_TARGET, "reply receiver thread panicked");
        }
    }
}

impl Drop for ReplyReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}
