//! One-shot continuations used to deliver deferred replies.
//!
//! A [`Continuation`] wraps the finalizer the dispatch engine built for a
//! request. The finalizer is taken out of its slot by the first completion, so
//! it runs exactly once whether the servant completes inline, completes from
//! another thread, or abandons the request by dropping every clone.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{error, warn};

use crate::identity::Identity;
use crate::servant::{FailureKind, Reply, Request, ServantResult};

const COMPLETION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Finalizer run once with the reply of a dispatch.
pub(crate) type Finalizer = Box<dyn FnOnce(Reply) + Send>;

/// Raised when a continuation is completed more than once.
///
/// This is a programming error in the servant; the first reply stands and the
/// second one is discarded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("continuation for {identity} (facet '{facet}', operation '{operation}') completed twice")]
pub struct DoubleCompletionError {
    /// Identity of the request.
    pub identity: Identity,
    /// Facet of the request.
    pub facet: String,
    /// Operation of the request.
    pub operation: String,
}

struct CompletionCell {
    identity: Identity,
    facet: String,
    operation: String,
    finalizer: Mutex<Option<Finalizer>>,
}

impl CompletionCell {
    fn take(&self) -> Option<Finalizer> {
        self.finalizer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn double_completion(&self) -> DoubleCompletionError {
        DoubleCompletionError {
            identity: self.identity.clone(),
            facet: self.facet.clone(),
            operation: self.operation.clone(),
        }
    }
}

impl Drop for CompletionCell {
    fn drop(&mut self) {
        let slot = self
            .finalizer
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(finalizer) = slot.take() {
            warn!(
                target: COMPLETION_TARGET,
                identity = %self.identity,
                facet = %self.facet,
                operation = %self.operation,
                "continuation dropped without a reply"
            );
            finalizer(Reply::failure(
                FailureKind::HandlerAbandoned,
                format!("servant for {} did not reply", self.identity),
            ));
        }
    }
}

/// Handle a servant completes to deliver its reply.
///
/// Clones share the same one-shot slot: the first completion wins and every
/// later one fails with [`DoubleCompletionError`].
#[derive(Clone)]
pub struct Continuation {
    cell: Arc<CompletionCell>,
}

impl Continuation {
    pub(crate) fn new(request: &Request, finalizer: Finalizer) -> Self {
        Self {
            cell: Arc::new(CompletionCell {
                identity: request.identity().clone(),
                facet: request.facet().to_owned(),
                operation: request.operation().to_owned(),
                finalizer: Mutex::new(Some(finalizer)),
            }),
        }
    }

    /// Completes the dispatch with the servant's result.
    ///
    /// # Errors
    ///
    /// Returns [`DoubleCompletionError`] when the continuation was already
    /// completed. The error is also logged, since it indicates a servant bug.
    pub fn complete(&self, result: ServantResult) -> Result<(), DoubleCompletionError> {
        match self.cell.take() {
            Some(finalizer) => {
                finalizer(Reply::from(result));
                Ok(())
            }
            None => {
                let error = self.cell.double_completion();
                error!(
                    target: COMPLETION_TARGET,
                    identity = %error.identity,
                    facet = %error.facet,
                    operation = %error.operation,
                    "continuation completed more than once"
                );
                Err(error)
            }
        }
    }

    /// Returns `true` once the continuation has been completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.cell
            .finalizer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Finalizes the dispatch as abandoned unless a reply was already
    /// delivered. Returns `true` when this call finalized it.
    pub(crate) fn abandon(&self, message: impl Into<String>) -> bool {
        match self.cell.take() {
            Some(finalizer) => {
                finalizer(Reply::failure(FailureKind::HandlerAbandoned, message));
                true
            }
            None => false,
        }
    }

    /// Returns `true` when other clones of this continuation are alive.
    pub(crate) fn is_shared(&self) -> bool {
        Arc::strong_count(&self.cell) > 1
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Continuation")
            .field("identity", &self.cell.identity)
            .field("facet", &self.cell.facet)
            .field("operation", &self.cell.operation)
            .field("completed", &self.is_completed())
            .finish()
    }
}
