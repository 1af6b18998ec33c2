//! Request resolution and dispatch.
//!
//! Resolution order is fixed: a servant registered for the exact
//! `(identity, facet)` key always wins; otherwise the locator for the
//! identity's category (falling back to the default locator) is asked to
//! resolve one. Every dispatch served through a locator triggers exactly one
//! `finished` callback, which runs before the reply reaches the sink.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::completion::{Continuation, Finalizer};
use crate::locator::{Cookie, LocateError, Located, ServantLocator};
use crate::servant::{FailureKind, Reply, ReplySink, Request, Servant};

use super::lifecycle::InFlightGuard;
use super::{AdapterShared, ObjectAdapter};

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Whether the reply was delivered before `dispatch` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// The reply sink has already been invoked.
    Completed,
    /// The servant holds the continuation and will reply later.
    Pending,
}

/// How a request reached its servant.
enum Route {
    Direct(Arc<dyn Servant>),
    Located {
        locator: Arc<dyn ServantLocator>,
        servant: Arc<dyn Servant>,
        cookie: Option<Cookie>,
    },
}

impl Route {
    fn servant(&self) -> Arc<dyn Servant> {
        match self {
            Self::Direct(servant) | Self::Located { servant, .. } => Arc::clone(servant),
        }
    }
}

impl ObjectAdapter {
    /// Dispatches `request`, delivering exactly one reply to `sink`.
    ///
    /// Failures (adapter not active, object or facet not found, locator
    /// errors, servant failures) arrive at the sink as [`Reply::Failure`]
    /// values; they are never raised to the caller.
    pub fn dispatch<S>(&self, request: Request, sink: S) -> DispatchStatus
    where
        S: ReplySink + 'static,
    {
        Arc::clone(&self.shared).dispatch(request, Box::new(sink))
    }
}

impl AdapterShared {
    fn dispatch(self: Arc<Self>, request: Request, sink: Box<dyn ReplySink>) -> DispatchStatus {
        let guard = match self.lifecycle.begin_dispatch() {
            Ok(guard) => guard,
            Err(state) => {
                debug!(
                    target: DISPATCH_TARGET,
                    adapter = %self.name,
                    identity = %request.identity(),
                    %state,
                    "rejecting request: adapter not active"
                );
                sink.deliver(Reply::failure(
                    FailureKind::AdapterNotActive,
                    format!("object adapter '{}' is {state}", self.name),
                ));
                return DispatchStatus::Completed;
            }
        };

        let request = Arc::new(request);
        let route = match self.resolve(&request) {
            Ok(route) => route,
            Err(reply) => {
                self.finalize(guard, sink, reply);
                return DispatchStatus::Completed;
            }
        };

        let servant = route.servant();
        let finalizer = Arc::clone(&self).finalizer(Arc::clone(&request), route, guard, sink);
        let continuation = Continuation::new(&request, finalizer);
        let observer = continuation.clone();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            servant.dispatch(&request, continuation);
        }));
        if let Err(payload) = outcome {
            error!(
                target: DISPATCH_TARGET,
                adapter = %self.name,
                identity = %request.identity(),
                facet = %request.facet(),
                operation = %request.operation(),
                panic = %panic_message(payload.as_ref()),
                "servant panicked during dispatch"
            );
            observer.abandon(format!("servant for {} panicked", request.identity()));
            return DispatchStatus::Completed;
        }

        if observer.is_completed() || !observer.is_shared() {
            // Dropping the last handle finalizes an unanswered request.
            DispatchStatus::Completed
        } else {
            DispatchStatus::Pending
        }
    }

    fn resolve(&self, request: &Request) -> Result<Route, Reply> {
        let identity = request.identity();
        if let Some(servant) = self.servants.find(identity, request.facet()) {
            return Ok(Route::Direct(servant));
        }

        let Some(locator) = self.locators.find(identity.category()) else {
            return Err(self.not_found(request));
        };

        let located = panic::catch_unwind(AssertUnwindSafe(|| locator.locate(request)));
        let failure = match located {
            Ok(Ok(Some(Located { servant, cookie }))) => {
                return Ok(Route::Located {
                    locator,
                    servant,
                    cookie,
                });
            }
            Ok(Ok(None)) => self.not_found(request),
            Ok(Err(LocateError::FacetNotFound { identity, facet })) => Reply::failure(
                FailureKind::FacetNotFound,
                format!("{identity} has no facet '{facet}'"),
            ),
            Ok(Err(LocateError::Failed { message })) => {
                warn!(
                    target: DISPATCH_TARGET,
                    adapter = %self.name,
                    identity = %identity,
                    category = %identity.category(),
                    %message,
                    "servant locator failed"
                );
                Reply::failure(FailureKind::LocatorResolution, message)
            }
            Err(payload) => {
                error!(
                    target: DISPATCH_TARGET,
                    adapter = %self.name,
                    identity = %identity,
                    category = %identity.category(),
                    panic = %panic_message(payload.as_ref()),
                    "servant locator panicked"
                );
                Reply::failure(
                    FailureKind::LocatorResolution,
                    format!("servant locator for {identity} panicked"),
                )
            }
        };
        notify_finished(&locator, request, None, None);
        Err(failure)
    }

    fn not_found(&self, request: &Request) -> Reply {
        let identity = request.identity();
        if self.servants.has_identity(identity) {
            Reply::failure(
                FailureKind::FacetNotFound,
                format!("{identity} has no facet '{}'", request.facet()),
            )
        } else {
            Reply::failure(
                FailureKind::ObjectNotFound,
                format!("no servant for {identity}"),
            )
        }
    }

    fn finalizer(
        self: Arc<Self>,
        request: Arc<Request>,
        route: Route,
        guard: InFlightGuard,
        sink: Box<dyn ReplySink>,
    ) -> Finalizer {
        Box::new(move |reply| {
            if let Route::Located {
                locator,
                servant,
                cookie,
            } = route
            {
                notify_finished(&locator, &request, Some(&servant), cookie);
            }
            self.finalize(guard, sink, reply);
        })
    }

    fn finalize(&self, guard: InFlightGuard, sink: Box<dyn ReplySink>, reply: Reply) {
        let delivered = panic::catch_unwind(AssertUnwindSafe(|| sink.deliver(reply)));
        if let Err(payload) = delivered {
            error!(
                target: DISPATCH_TARGET,
                adapter = %self.name,
                panic = %panic_message(payload.as_ref()),
                "reply sink panicked during delivery"
            );
        }
        if guard.release() {
            self.finish_deactivation();
        }
    }
}

fn notify_finished(
    locator: &Arc<dyn ServantLocator>,
    request: &Request,
    servant: Option<&Arc<dyn Servant>>,
    cookie: Option<Cookie>,
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        locator.finished(request, servant, cookie);
    }));
    if let Err(payload) = outcome {
        error!(
            target: DISPATCH_TARGET,
            identity = %request.identity(),
            facet = %request.facet(),
            operation = %request.operation(),
            panic = %panic_message(payload.as_ref()),
            "servant locator panicked in finished callback"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
