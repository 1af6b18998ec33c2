//! Scenario world driving a discovery client by hand.
//!
//! Broadcasts go through a mocked transport that forwards each lookup to a
//! channel; replies are fed straight into the client, so no sockets are
//! involved.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use switchyard_config::DiscoverySettings;

use crate::discovery::{
    DiscoveryClient, DiscoveryError, LookupMessage, MockLookupTransport, ReplyMessage,
};

use super::reporter::RecordingHealthReporter;

const BROADCAST_WAIT: Duration = Duration::from_secs(5);

/// Client, captured broadcasts, and the lookup running in the background.
pub struct DiscoveryWorld {
    pub reporter: Arc<RecordingHealthReporter>,
    first_request_id: u32,
    timeout: Duration,
    retry_count: u32,
    client: Option<Arc<DiscoveryClient>>,
    broadcasts: Option<Receiver<LookupMessage>>,
    lookup: Option<JoinHandle<Result<String, DiscoveryError>>>,
    outcome: Option<Result<String, DiscoveryError>>,
}

impl DiscoveryWorld {
    /// World with a two second budget per attempt and no retries.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reporter: Arc::new(RecordingHealthReporter::default()),
            first_request_id: 1,
            timeout: Duration::from_secs(2),
            retry_count: 0,
            client: None,
            broadcasts: None,
            lookup: None,
            outcome: None,
        }
    }

    /// Sets the request id of the first broadcast.
    pub fn start_at(&mut self, request_id: u32) {
        self.first_request_id = request_id;
    }

    /// Sets the per-attempt timeout and retry count.
    pub fn budget(&mut self, timeout: Duration, retry_count: u32) {
        self.timeout = timeout;
        self.retry_count = retry_count;
    }

    fn client(&mut self) -> Arc<DiscoveryClient> {
        if let Some(client) = self.client.as_ref() {
            return Arc::clone(client);
        }
        let (sender, receiver) = mpsc::channel();
        let mut transport = MockLookupTransport::new();
        transport
            .expect_reply_endpoint()
            .return_const("127.0.0.1:40999".to_owned());
        transport.expect_broadcast().returning(move |message| {
            sender.send(message.clone()).ok();
            Ok(())
        });
        let settings = DiscoverySettings::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 4061)
            .with_timeout(self.timeout)
            .with_retry_count(self.retry_count);
        let client = Arc::new(
            DiscoveryClient::new(Arc::new(transport), settings)
                .with_reporter(self.reporter.clone())
                .with_first_request_id(self.first_request_id),
        );
        self.client = Some(Arc::clone(&client));
        self.broadcasts = Some(receiver);
        client
    }

    /// Starts `locator()` on a background thread.
    pub fn start_lookup(&mut self) {
        let client = self.client();
        self.outcome = None;
        self.lookup = Some(thread::spawn(move || client.locator()));
    }

    /// Waits for the next broadcast lookup.
    ///
    /// # Errors
    ///
    /// Fails when nothing is broadcast in time.
    pub fn next_broadcast(&self) -> Result<LookupMessage, String> {
        let broadcasts = self.broadcasts.as_ref().ok_or("no lookup has started")?;
        broadcasts
            .recv_timeout(BROADCAST_WAIT)
            .map_err(|_| "no lookup was broadcast".to_owned())
    }

    /// Returns `true` when no further lookup has been broadcast.
    #[must_use]
    pub fn no_pending_broadcast(&self) -> bool {
        self.broadcasts
            .as_ref()
            .is_none_or(|broadcasts| broadcasts.try_recv().is_err())
    }

    /// Offers a reply to the client, returning whether it was accepted.
    ///
    /// # Errors
    ///
    /// Fails when no client exists yet.
    pub fn deliver(&self, request_id: u32, endpoint: &str) -> Result<bool, String> {
        let client = self.client.as_ref().ok_or("no discovery client exists")?;
        Ok(client.handle_reply(&ReplyMessage {
            request_id,
            locator_endpoint: endpoint.to_owned(),
        }))
    }

    /// Joins the background lookup and returns its outcome.
    ///
    /// # Errors
    ///
    /// Fails when no lookup was started or its thread panicked.
    pub fn outcome(&mut self) -> Result<&Result<String, DiscoveryError>, String> {
        if let Some(handle) = self.lookup.take() {
            let outcome = handle
                .join()
                .map_err(|_| "lookup thread panicked".to_owned())?;
            self.outcome = Some(outcome);
        }
        self.outcome
            .as_ref()
            .ok_or_else(|| "no lookup was started".to_owned())
    }

    /// Clears the client's cached endpoint.
    pub fn invalidate(&self) {
        if let Some(client) = self.client.as_ref() {
            client.invalidate();
        }
    }

    /// Endpoint currently cached by the client.
    #[must_use]
    pub fn cached(&self) -> Option<String> {
        self.client.as_ref().and_then(|client| client.cached())
    }
}

impl Default for DiscoveryWorld {
    fn default() -> Self {
        Self::new()
    }
}
