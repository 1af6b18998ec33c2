//! Discovery client: request correlation, retries, and the endpoint cache.
//!
//! The client keeps a single pending-request slot. Each broadcast installs a
//! fresh request id in the slot, so a reply is accepted only when it carries
//! the id of the most recent broadcast; replies for superseded attempts are
//! dropped. Only one lookup runs at a time: callers arriving while a lookup
//! is in progress wait for its outcome instead of broadcasting again.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use switchyard_config::DiscoverySettings;
use tracing::{debug, warn};

use crate::health::{HealthReporter, StructuredHealthReporter};

use super::DISCOVERY_TARGET;
use super::errors::DiscoveryError;
use super::transport::LookupTransport;
use super::wire::{LookupMessage, ReplyMessage};

#[derive(Debug)]
struct PendingLookup {
    request_id: u32,
    sent_at: Instant,
    resolved: Option<String>,
}

#[derive(Debug, Default)]
struct ClientState {
    cached: Option<String>,
    pending: Option<PendingLookup>,
    lookup_running: bool,
    generation: u64,
    last_outcome: Option<Result<String, DiscoveryError>>,
    shut_down: bool,
}

/// Multicast locator discovery client.
pub struct DiscoveryClient {
    transport: Arc<dyn LookupTransport>,
    settings: DiscoverySettings,
    reporter: Arc<dyn HealthReporter>,
    next_request_id: AtomicU32,
    state: Mutex<ClientState>,
    changed: Condvar,
}

impl DiscoveryClient {
    /// Creates a client broadcasting through `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn LookupTransport>, settings: DiscoverySettings) -> Self {
        Self {
            transport,
            settings,
            reporter: Arc::new(StructuredHealthReporter::new()),
            next_request_id: AtomicU32::new(wall_clock_seed()),
            state: Mutex::new(ClientState::default()),
            changed: Condvar::new(),
        }
    }

    /// Reports lookup outcomes to `reporter`.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn HealthReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Starts request ids at `request_id` instead of a clock-derived seed.
    #[must_use]
    pub fn with_first_request_id(self, request_id: u32) -> Self {
        self.next_request_id.store(request_id, Ordering::SeqCst);
        self
    }

    /// Settings the client was built with.
    #[must_use]
    pub fn settings(&self) -> &DiscoverySettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached locator endpoint, running a lookup with the
    /// configured budget when nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Timeout`] when no locator answers and
    /// [`DiscoveryError::ShutDown`] once the client has been shut down.
    pub fn locator(&self) -> Result<String, DiscoveryError> {
        self.run_lookup(self.settings.timeout, self.settings.retry_count, true)
    }

    /// Returns the cached endpoint without looking one up.
    #[must_use]
    pub fn cached(&self) -> Option<String> {
        self.lock().cached.clone()
    }

    /// Clears the cached endpoint so the next [`DiscoveryClient::locator`]
    /// call broadcasts again.
    pub fn invalidate(&self) {
        if let Some(endpoint) = self.lock().cached.take() {
            debug!(target: DISCOVERY_TARGET, %endpoint, "locator endpoint invalidated");
        }
    }

    /// Broadcasts a lookup, waiting up to `timeout` per attempt and retrying
    /// `retry_count` times with a fresh request id.
    ///
    /// Callers arriving while another lookup runs share its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Timeout`] once every attempt expires and
    /// [`DiscoveryError::ShutDown`] when the client shuts down meanwhile.
    pub fn lookup(&self, timeout: Duration, retry_count: u32) -> Result<String, DiscoveryError> {
        self.run_lookup(timeout, retry_count, false)
    }

    /// Checks the cache and claims the lookup slot under one lock.
    fn run_lookup(
        &self,
        timeout: Duration,
        retry_count: u32,
        use_cache: bool,
    ) -> Result<String, DiscoveryError> {
        let mut state = self.lock();
        if state.shut_down {
            return Err(DiscoveryError::ShutDown);
        }
        if use_cache && let Some(endpoint) = state.cached.as_ref() {
            return Ok(endpoint.clone());
        }
        if state.lookup_running {
            let generation = state.generation;
            while state.generation == generation && !state.shut_down {
                state = self
                    .changed
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if state.generation == generation {
                return Err(DiscoveryError::ShutDown);
            }
            return state
                .last_outcome
                .clone()
                .unwrap_or(Err(DiscoveryError::ShutDown));
        }
        state.lookup_running = true;
        drop(state);

        let attempts = retry_count.saturating_add(1);
        let mut outcome = self.broadcast_until_resolved(timeout, attempts);

        let mut state = self.lock();
        state.lookup_running = false;
        state.pending = None;
        state.generation = state.generation.wrapping_add(1);
        if state.shut_down {
            outcome = Err(DiscoveryError::ShutDown);
        } else if let Ok((endpoint, _)) = outcome.as_ref() {
            state.cached = Some(endpoint.clone());
        }
        let shared = outcome.clone().map(|(endpoint, _)| endpoint);
        state.last_outcome = Some(shared.clone());
        self.changed.notify_all();
        drop(state);

        match &outcome {
            Ok((endpoint, attempt)) => self.reporter.discovery_resolved(endpoint, *attempt),
            Err(error) => self.reporter.discovery_failed(error),
        }
        shared
    }

    fn broadcast_until_resolved(
        &self,
        timeout: Duration,
        attempts: u32,
    ) -> Result<(String, u32), DiscoveryError> {
        let reply_endpoint = self.transport.reply_endpoint();
        for attempt in 1..=attempts {
            let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
            {
                let mut state = self.lock();
                if state.shut_down {
                    return Err(DiscoveryError::ShutDown);
                }
                state.pending = Some(PendingLookup {
                    request_id,
                    sent_at: Instant::now(),
                    resolved: None,
                });
            }

            let message = LookupMessage {
                request_id,
                instance_name: self.settings.instance_name.clone(),
                reply_endpoint: reply_endpoint.clone(),
            };
            debug!(
                target: DISCOVERY_TARGET,
                request_id,
                attempt,
                instance = %message.instance_name,
                "broadcasting locator lookup"
            );
            if let Err(error) = self.transport.broadcast(&message) {
                warn!(
                    target: DISCOVERY_TARGET,
                    request_id,
                    attempt,
                    %error,
                    "lookup broadcast failed; treating it as lost"
                );
            }

            if let Some(endpoint) = self.await_reply(timeout)? {
                return Ok((endpoint, attempt));
            }
            debug!(target: DISCOVERY_TARGET, request_id, attempt, "lookup attempt timed out");
        }
        Err(DiscoveryError::Timeout { attempts })
    }

    fn await_reply(&self, timeout: Duration) -> Result<Option<String>, DiscoveryError> {
        let mut state = self.lock();
        let Some(sent_at) = state.pending.as_ref().map(|pending| pending.sent_at) else {
            return Ok(None);
        };
        let deadline = sent_at + timeout;
        loop {
            if state.shut_down {
                return Err(DiscoveryError::ShutDown);
            }
            if let Some(endpoint) = state
                .pending
                .as_mut()
                .and_then(|pending| pending.resolved.take())
            {
                return Ok(Some(endpoint));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (guard, _) = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }

    /// Offers a reply to the pending lookup. Returns `true` when the reply
    /// resolved it; stale, duplicate, or empty replies are ignored.
    pub fn handle_reply(&self, reply: &ReplyMessage) -> bool {
        if reply.locator_endpoint.trim().is_empty() {
            debug!(
                target: DISCOVERY_TARGET,
                request_id = reply.request_id,
                "ignoring reply with an empty locator endpoint"
            );
            return false;
        }

        let mut state = self.lock();
        let Some(pending) = state.pending.as_mut() else {
            debug!(
                target: DISCOVERY_TARGET,
                request_id = reply.request_id,
                "ignoring reply: no lookup pending"
            );
            return false;
        };
        if pending.request_id != reply.request_id || pending.resolved.is_some() {
            debug!(
                target: DISCOVERY_TARGET,
                request_id = reply.request_id,
                expected = pending.request_id,
                "ignoring stale or duplicate reply"
            );
            return false;
        }
        pending.resolved = Some(reply.locator_endpoint.clone());
        self.changed.notify_all();
        true
    }

    /// Stops servicing lookups, waking every waiter with
    /// [`DiscoveryError::ShutDown`] and dropping the cached endpoint.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        if state.shut_down {
            return;
        }
        state.shut_down = true;
        state.cached = None;
        state.pending = None;
        self.changed.notify_all();
        debug!(target: DISCOVERY_TARGET, "discovery client shut down");
    }

    /// Returns `true` once [`DiscoveryClient::shutdown`] has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }
}

impl fmt::Debug for DiscoveryClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        formatter
            .debug_struct("DiscoveryClient")
            .field("settings", &self.settings)
            .field("cached", &state.cached)
            .field("pending", &state.pending.as_ref().map(|pending| pending.request_id))
            .field("shut_down", &state.shut_down)
            .finish_non_exhaustive()
    }
}

fn wall_clock_seed() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(1, |elapsed| elapsed.subsec_nanos())
}
