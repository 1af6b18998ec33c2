//! Adapter lifecycle state machine and in-flight request accounting.
//!
//! State and the in-flight counter live under one mutex so that admission
//! (`begin_dispatch`) and the deactivation check cannot interleave: once the
//! adapter leaves `Activated` no new dispatch is admitted, and the transition
//! to `Deactivated` happens exactly when the last admitted dispatch ends.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::error;

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::adapter");

/// Lifecycle states of an object adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterState {
    /// Constructed; registrations accepted, dispatch rejected.
    Created,
    /// Dispatch admitted.
    Activated,
    /// Draining in-flight requests; new dispatch rejected.
    Deactivating,
    /// Terminal.
    Deactivated,
}

impl fmt::Display for AdapterState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Created => "created",
            Self::Activated => "activated",
            Self::Deactivating => "deactivating",
            Self::Deactivated => "deactivated",
        };
        formatter.write_str(label)
    }
}

/// Outcome of a call to [`Lifecycle::deactivate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeactivateOutcome {
    /// No requests were in flight; the adapter is now deactivated.
    Deactivated,
    /// Requests are still in flight; the last one completes the transition.
    Draining,
    /// The adapter was already deactivating or deactivated.
    Unchanged,
}

#[derive(Debug)]
struct LifecycleState {
    state: AdapterState,
    in_flight: usize,
}

/// Shared lifecycle cell guarding state and the in-flight counter.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    inner: Mutex<LifecycleState>,
    changed: Condvar,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(LifecycleState {
                state: AdapterState::Created,
                in_flight: 0,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LifecycleState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> AdapterState {
        self.lock().state
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Moves `Created` to `Activated`. Activating twice is a no-op.
    ///
    /// Returns the rejecting state when the adapter is shutting down.
    pub(crate) fn activate(&self) -> Result<bool, AdapterState> {
        let mut inner = self.lock();
        match inner.state {
            AdapterState::Created => {
                inner.state = AdapterState::Activated;
                Ok(true)
            }
            AdapterState::Activated => Ok(false),
            state @ (AdapterState::Deactivating | AdapterState::Deactivated) => Err(state),
        }
    }

    /// Runs `action` while holding the lifecycle lock, provided deactivation
    /// has not begun. Registrations go through here so none can slip in after
    /// the locator table has been drained.
    pub(crate) fn while_accepting<T>(&self, action: impl FnOnce() -> T) -> Result<T, AdapterState> {
        let inner = self.lock();
        match inner.state {
            AdapterState::Created | AdapterState::Activated => Ok(action()),
            state @ (AdapterState::Deactivating | AdapterState::Deactivated) => Err(state),
        }
    }

    /// Admits a dispatch, incrementing the in-flight counter.
    ///
    /// Returns the observed state when the adapter is not activated.
    pub(crate) fn begin_dispatch(self: &Arc<Self>) -> Result<InFlightGuard, AdapterState> {
        let mut inner = self.lock();
        if inner.state != AdapterState::Activated {
            return Err(inner.state);
        }
        inner.in_flight += 1;
        Ok(InFlightGuard {
            lifecycle: Some(Arc::clone(self)),
        })
    }

    /// Ends an admitted dispatch. Returns `true` when this call moved the
    /// adapter to `Deactivated`.
    fn end_dispatch(&self) -> bool {
        let mut inner = self.lock();
        if inner.in_flight == 0 {
            error!(
                target: LIFECYCLE_TARGET,
                state = %inner.state,
                "in-flight counter underflow"
            );
            return false;
        }
        inner.in_flight -= 1;
        if inner.in_flight == 0 && inner.state == AdapterState::Deactivating {
            inner.state = AdapterState::Deactivated;
            self.changed.notify_all();
            return true;
        }
        false
    }

    pub(crate) fn deactivate(&self) -> DeactivateOutcome {
        let mut inner = self.lock();
        match inner.state {
            AdapterState::Created | AdapterState::Activated => {
                if inner.in_flight == 0 {
                    inner.state = AdapterState::Deactivated;
                    self.changed.notify_all();
                    DeactivateOutcome::Deactivated
                } else {
                    inner.state = AdapterState::Deactivating;
                    self.changed.notify_all();
                    DeactivateOutcome::Draining
                }
            }
            AdapterState::Deactivating | AdapterState::Deactivated => DeactivateOutcome::Unchanged,
        }
    }

    /// Blocks until the adapter is deactivated or `timeout` elapses.
    /// Returns `true` when the adapter reached `Deactivated`.
    pub(crate) fn wait_for_deactivate(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        while inner.state != AdapterState::Deactivated {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .changed
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            inner = guard;
        }
        true
    }
}

/// RAII token for one admitted dispatch.
///
/// Callers use [`InFlightGuard::release`] so they can observe the transition
/// to `Deactivated`; a plain drop still ends the dispatch.
pub(crate) struct InFlightGuard {
    lifecycle: Option<Arc<Lifecycle>>,
}

impl InFlightGuard {
    /// Ends the dispatch now. Returns `true` when this moved the adapter to
    /// `Deactivated`.
    pub(crate) fn release(mut self) -> bool {
        self.lifecycle
            .take()
            .is_some_and(|lifecycle| lifecycle.end_dispatch())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(lifecycle) = self.lifecycle.take() {
            lifecycle.end_dispatch();
        }
    }
}

impl fmt::Debug for InFlightGuard {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("InFlightGuard")
            .field("released", &self.lifecycle.is_none())
            .finish()
    }
}
