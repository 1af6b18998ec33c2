//! JSON line formats spoken by the request front end.

use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::servant::{Failure, Reply, Request};

/// One request line.
///
/// `identity` uses the text form of [`Identity`]: `name` or `category/name`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WireRequest {
    /// Target identity in text form.
    pub identity: String,
    /// Target facet; empty or absent for the default facet.
    #[serde(default)]
    pub facet: String,
    /// Operation name.
    pub operation: String,
    /// Marshalled arguments.
    #[serde(default)]
    pub payload: Vec<u8>,
}

impl WireRequest {
    /// Converts the line into a dispatchable [`Request`].
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the identity is malformed.
    pub fn into_request(self) -> Result<Request, String> {
        let identity: Identity = self
            .identity
            .parse()
            .map_err(|error| format!("invalid identity: {error}"))?;
        Ok(Request::new(identity, self.operation)
            .with_facet(self.facet)
            .with_payload(self.payload))
    }
}

/// One reply line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireReply {
    /// The servant replied successfully.
    Success {
        /// Reply payload.
        payload: Vec<u8>,
    },
    /// Resolution or the servant failed.
    Failure {
        /// Failure descriptor.
        failure: Failure,
    },
    /// The request line could not be understood; nothing was dispatched.
    Invalid {
        /// Why the line was rejected.
        message: String,
    },
}

impl WireReply {
    /// Builds an [`WireReply::Invalid`] line.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

impl From<Reply> for WireReply {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Success(payload) => Self::Success { payload },
            Reply::Failure(failure) => Self::Failure { failure },
        }
    }
}
