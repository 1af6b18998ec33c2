//! Requests, replies, and the servant abstraction dispatched to by adapters.
//!
//! A servant receives each request together with a [`Continuation`]. It may
//! complete the continuation before returning (a synchronous reply) or hand it
//! to its own machinery and complete it later from any thread.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::completion::Continuation;
use crate::identity::Identity;

/// Decoded request handed to the dispatch engine by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    identity: Identity,
    facet: String,
    operation: String,
    payload: Vec<u8>,
}

impl Request {
    /// Builds a request for the default facet with an empty payload.
    #[must_use]
    pub fn new(identity: Identity, operation: impl Into<String>) -> Self {
        Self {
            identity,
            facet: String::new(),
            operation: operation.into(),
            payload: Vec::new(),
        }
    }

    /// Targets a named facet.
    #[must_use]
    pub fn with_facet(mut self, facet: impl Into<String>) -> Self {
        self.facet = facet.into();
        self
    }

    /// Attaches the marshalled operation arguments.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Target identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Target facet; empty for the default facet.
    #[must_use]
    pub fn facet(&self) -> &str {
        self.facet.as_str()
    }

    /// Operation name.
    #[must_use]
    pub fn operation(&self) -> &str {
        self.operation.as_str()
    }

    /// Marshalled arguments.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        self.payload.as_slice()
    }
}

/// Classification of a failed reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The adapter was not accepting requests.
    AdapterNotActive,
    /// No servant or locator resolved the identity.
    ObjectNotFound,
    /// The identity exists but not under the requested facet.
    FacetNotFound,
    /// The servant locator itself failed.
    LocatorResolution,
    /// The servant reported an application-level failure.
    Application,
    /// The servant dropped its continuation or panicked without replying.
    HandlerAbandoned,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AdapterNotActive => "adapter not active",
            Self::ObjectNotFound => "object not found",
            Self::FacetNotFound => "facet not found",
            Self::LocatorResolution => "locator resolution failed",
            Self::Application => "application failure",
            Self::HandlerAbandoned => "handler abandoned request",
        };
        formatter.write_str(label)
    }
}

/// Failure descriptor carried by a failed reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Failure {
    /// Failure classification.
    pub kind: FailureKind,
    /// Human-readable detail.
    pub message: String,
}

impl Failure {
    /// Builds a failure descriptor.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.kind, self.message)
    }
}

/// Final outcome of a dispatch, delivered to the reply sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The servant produced a result payload.
    Success(Vec<u8>),
    /// Resolution or the servant failed.
    Failure(Failure),
}

impl Reply {
    /// Builds a failed reply.
    #[must_use]
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure(Failure::new(kind, message))
    }

    /// Returns `true` for a successful reply.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Failure classification, if the reply failed.
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure.kind),
        }
    }
}

impl From<ServantResult> for Reply {
    fn from(result: ServantResult) -> Self {
        match result {
            Ok(payload) => Self::Success(payload),
            Err(failure) => Self::failure(FailureKind::Application, failure.message),
        }
    }
}

/// Application-level failure raised by a servant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct UserFailure {
    message: String,
}

impl UserFailure {
    /// Builds a user failure with the given description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Failure description.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Result a servant completes its continuation with.
pub type ServantResult = Result<Vec<u8>, UserFailure>;

/// Unit of behaviour implementing an identity's operations.
pub trait Servant: Send + Sync {
    /// Handles a request, completing `continuation` exactly once.
    ///
    /// The continuation may be completed before returning or later from any
    /// thread. Dropping every clone of it without completing finalizes the
    /// dispatch with [`FailureKind::HandlerAbandoned`].
    fn dispatch(&self, request: &Request, continuation: Continuation);
}

impl<F> Servant for F
where
    F: Fn(&Request, Continuation) + Send + Sync,
{
    fn dispatch(&self, request: &Request, continuation: Continuation) {
        self(request, continuation);
    }
}

/// Servant adapter for handlers that always reply synchronously.
struct SyncServant<F>(F);

impl<F> Servant for SyncServant<F>
where
    F: Fn(&Request) -> ServantResult + Send + Sync,
{
    fn dispatch(&self, request: &Request, continuation: Continuation) {
        let result = (self.0)(request);
        continuation.complete(result).ok();
    }
}

/// Wraps a synchronous handler function as a shareable servant.
#[must_use]
pub fn sync_servant<F>(handler: F) -> Arc<dyn Servant>
where
    F: Fn(&Request) -> ServantResult + Send + Sync + 'static,
{
    Arc::new(SyncServant(handler))
}

/// Destination for the final reply of a dispatch.
///
/// Supplied by the transport layer; invoked exactly once per dispatch, on
/// whichever thread finalizes the request.
pub trait ReplySink: Send {
    /// Delivers the reply.
    fn deliver(self: Box<Self>, reply: Reply);
}

impl<F> ReplySink for F
where
    F: FnOnce(Reply) + Send,
{
    fn deliver(self: Box<Self>, reply: Reply) {
        (*self)(reply);
    }
}
