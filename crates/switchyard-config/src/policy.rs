use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Behaviour when a servant is registered under an `(identity, facet)` key
/// that is already bound.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RegistrationPolicy {
    /// The new servant silently replaces the previous binding.
    #[default]
    Replace,
    /// The registration fails and the previous binding is kept.
    Reject,
}

/// Errors encountered while parsing a [`RegistrationPolicy`] from text.
pub type RegistrationPolicyParseError = strum::ParseError;
