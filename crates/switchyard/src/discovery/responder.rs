//! Server side of discovery: answers lookups with the advertised locator.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use switchyard_config::DiscoverySettings;
use tracing::{debug, info, warn};

use super::DISCOVERY_TARGET;
use super::errors::DiscoveryError;
use super::transport::{POLL_INTERVAL, is_timeout, unspecified_for};
use super::wire::{DiscoveryMessage, LookupMessage, MAX_DATAGRAM_BYTES, ReplyMessage};

/// Background responder answering discovery lookups.
#[derive(Debug)]
pub struct DiscoveryResponder {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DiscoveryResponder {
    /// Binds the discovery port and starts answering lookups with
    /// `advertised`.
    ///
    /// A multicast group address is joined on the wildcard interface; any
    /// other address is bound directly, which lets a responder serve unicast
    /// lookups (port `0` picks an ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns a [`DiscoveryError`] when the socket cannot be bound, the group
    /// cannot be joined, or the worker thread cannot be started.
    pub fn start(
        settings: &DiscoverySettings,
        advertised: impl Into<String>,
    ) -> Result<Self, DiscoveryError> {
        let socket = bind_responder_socket(settings.group)?;
        socket
            .set_read_timeout(Some(POLL_INTERVAL))
            .map_err(|source| DiscoveryError::setup("responder socket timeout", source))?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| DiscoveryError::setup("responder socket address", source))?;

        let answerer = Answerer {
            instance_name: settings.instance_name.clone(),
            advertised: advertised.into(),
        };
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        info!(
            target: DISCOVERY_TARGET,
            group = %settings.group,
            local = %local_addr,
            advertised = %answerer.advertised,
            "discovery responder listening"
        );
        let handle = thread::Builder::new()
            .name("switchyard-discovery-responder".to_owned())
            .spawn(move || serve(&socket, &answerer, &flag))
            .map_err(|source| DiscoveryError::setup("responder thread", source))?;
        Ok(Self {
            local_addr,
            shutdown,
            handle: Some(handle),
        })
    }

    /// Address the responder socket is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops the responder thread and waits for it to exit.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.join().is_err() {
            warn!(target: DISCOVERY_TARGET, "discovery responder thread panicked");
        }
    }
}

impl Drop for DiscoveryResponder {
    fn drop(&mut self) {
        self.stop();
    }
}

fn bind_responder_socket(group: SocketAddr) -> Result<UdpSocket, DiscoveryError> {
    if !group.ip().is_multicast() {
        return UdpSocket::bind(group).map_err(|source| DiscoveryError::bind(group, source));
    }

    let local = SocketAddr::new(unspecified_for(group.ip()), group.port());
    let socket = UdpSocket::bind(local).map_err(|source| DiscoveryError::bind(local, source))?;
    let joined = match group.ip() {
        IpAddr::V4(ip) => socket.join_multicast_v4(&ip, &Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(ip) => socket.join_multicast_v6(&ip, 0),
    };
    joined.map_err(|source| DiscoveryError::join(group, source))?;
    Ok(socket)
}

/// Decides whether and where to answer a lookup.
#[derive(Debug, Clone)]
pub(crate) struct Answerer {
    pub(crate) instance_name: String,
    pub(crate) advertised: String,
}

impl Answerer {
    /// Returns the reply for `lookup` and the address to send it to, or
    /// `None` when the lookup targets another instance or carries an
    /// unusable reply endpoint.
    pub(crate) fn answer(
        &self,
        lookup: &LookupMessage,
        source: SocketAddr,
    ) -> Option<(SocketAddr, ReplyMessage)> {
        if !lookup.instance_name.is_empty() && lookup.instance_name != self.instance_name {
            return None;
        }
        let mut target: SocketAddr = lookup.reply_endpoint.parse().ok()?;
        if target.ip().is_unspecified() {
            target.set_ip(source.ip());
        }
        Some((
            target,
            ReplyMessage {
                request_id: lookup.request_id,
                locator_endpoint: self.advertised.clone(),
            },
        ))
    }
}

fn serve(socket: &UdpSocket, answerer: &Answerer, shutdown: &AtomicBool) {
    let mut buffer = [0_u8; MAX_DATAGRAM_BYTES];
    while !shutdown.load(Ordering::SeqCst) {
        let (length, source) = match socket.recv_from(&mut buffer) {
            Ok(received) => received,
            Err(error) if is_timeout(&error) => continue,
            Err(error) => {
                warn!(target: DISCOVERY_TARGET, %error, "responder socket failed; stopping");
                return;
            }
        };
        let Some(DiscoveryMessage::Lookup(lookup)) =
            buffer.get(..length).and_then(DiscoveryMessage::decode)
        else {
            debug!(target: DISCOVERY_TARGET, %source, length, "ignoring non-lookup datagram");
            continue;
        };
        let Some((target, reply)) = answerer.answer(&lookup, source) else {
            debug!(
                target: DISCOVERY_TARGET,
                request_id = lookup.request_id,
                instance = %lookup.instance_name,
                "lookup not addressed to this responder"
            );
            continue;
        };
        let datagram = match DiscoveryMessage::from(reply).encode() {
            Ok(datagram) => datagram,
            Err(error) => {
                warn!(target: DISCOVERY_TARGET, %error, "failed to encode discovery reply");
                continue;
            }
        };
        if let Err(error) = socket.send_to(&datagram, target) {
            warn!(target: DISCOVERY_TARGET, %error, %target, "failed to send discovery reply");
        } else {
            debug!(
                target: DISCOVERY_TARGET,
                request_id = lookup.request_id,
                %target,
                "answered locator lookup"
            );
        }
    }
}
