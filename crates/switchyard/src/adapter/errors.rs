//! Error types for servant registration and adapter lifecycle operations.
//!
//! Dispatch-time resolution failures are not represented here: they travel to
//! the caller as [`crate::Reply::Failure`] values so one request's outcome can
//! never abort the dispatch loop.

use thiserror::Error;

use crate::identity::Identity;

use super::lifecycle::AdapterState;

/// Errors surfaced by registration and lifecycle calls on an adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// A servant is already bound to the key and the policy rejects
    /// replacement.
    #[error("a servant is already registered for {identity} (facet '{facet}')")]
    AlreadyRegistered {
        /// Identity of the existing binding.
        identity: Identity,
        /// Facet of the existing binding.
        facet: String,
    },

    /// No servant is bound to the key being removed.
    #[error("no servant is registered for {identity} (facet '{facet}')")]
    NotFound {
        /// Identity that was looked up.
        identity: Identity,
        /// Facet that was looked up.
        facet: String,
    },

    /// The identity cannot be registered (for example an empty name).
    #[error("illegal identity '{identity}': {reason}")]
    IllegalIdentity {
        /// Offending identity.
        identity: Identity,
        /// Why the identity was rejected.
        reason: &'static str,
    },

    /// The adapter no longer accepts registrations or activation.
    #[error("object adapter '{adapter}' is {state}")]
    Deactivated {
        /// Adapter name.
        adapter: String,
        /// State observed when the call was rejected.
        state: AdapterState,
    },
}

impl AdapterError {
    /// Creates an already-registered error.
    pub fn already_registered(identity: &Identity, facet: &str) -> Self {
        Self::AlreadyRegistered {
            identity: identity.clone(),
            facet: facet.to_owned(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(identity: &Identity, facet: &str) -> Self {
        Self::NotFound {
            identity: identity.clone(),
            facet: facet.to_owned(),
        }
    }

    /// Creates an illegal identity error.
    pub fn illegal_identity(identity: &Identity, reason: &'static str) -> Self {
        Self::IllegalIdentity {
            identity: identity.clone(),
            reason,
        }
    }

    /// Creates a deactivated error.
    pub fn deactivated(adapter: impl Into<String>, state: AdapterState) -> Self {
        Self::Deactivated {
            adapter: adapter.into(),
            state,
        }
    }
}
