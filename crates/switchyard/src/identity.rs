//! Object identities used as the primary dispatch key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of a remote object: a name plus a routing category.
///
/// The category selects the servant locator consulted when no servant is
/// registered for the identity. An empty category routes to the default
/// locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize, Serialize)]
pub struct Identity {
    /// Object name; must be non-empty for registration.
    pub name: String,
    /// Routing category; may be empty.
    #[serde(default)]
    pub category: String,
}

impl Identity {
    /// Builds an identity from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
        }
    }

    /// Builds an identity in the default (empty) category.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, "")
    }

    /// Object name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Routing category.
    #[must_use]
    pub fn category(&self) -> &str {
        self.category.as_str()
    }
}

/// Renders `name` for the default category and `category/name` otherwise.
/// A default-category name containing `/` is written as `/name` so that it
/// parses back unchanged.
impl fmt::Display for Identity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.category.is_empty() {
            if self.name.contains('/') {
                formatter.write_str("/")?;
            }
            formatter.write_str(&self.name)
        } else {
            write!(formatter, "{}/{}", self.category, self.name)
        }
    }
}

/// Errors raised while parsing an [`Identity`] from text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityParseError {
    /// The name component was empty.
    #[error("identity '{0}' has an empty name")]
    EmptyName(String),
}

/// Parses `name` or `category/name`; the first `/` separates the parts, so
/// categories never contain `/`.
impl FromStr for Identity {
    type Err = IdentityParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let identity = match input.split_once('/') {
            Some((category, name)) => Self::new(name, category),
            None => Self::named(input),
        };
        if identity.name.is_empty() {
            return Err(IdentityParseError::EmptyName(input.to_owned()));
        }
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::plain("printer", Identity::named("printer"))]
    #[case::categorised("cat/widget", Identity::new("widget", "cat"))]
    #[case::nested_name("cat/a/b", Identity::new("a/b", "cat"))]
    fn parses_text_form(#[case] input: &str, #[case] expected: Identity) {
        assert_eq!(input.parse::<Identity>().expect("parse identity"), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::missing_name("cat/")]
    fn rejects_empty_names(#[case] input: &str) {
        assert!(matches!(
            input.parse::<Identity>(),
            Err(IdentityParseError::EmptyName(_))
        ));
    }

    #[rstest]
    #[case::plain(Identity::named("printer"))]
    #[case::categorised(Identity::new("widget", "cat"))]
    #[case::slash_in_default_name(Identity::named("a/b"))]
    #[case::slash_in_categorised_name(Identity::new("a/b", "cat"))]
    fn text_form_parses_back_unchanged(#[case] identity: Identity) {
        let text = identity.to_string();
        assert_eq!(text.parse::<Identity>().expect("parse identity"), identity);
    }

    #[test]
    fn display_round_trips_category() {
        let identity = Identity::new("widget", "cat");
        assert_eq!(identity.to_string(), "cat/widget");
        assert_eq!(Identity::named("printer").to_string(), "printer");
        assert_eq!(Identity::named("a/b").to_string(), "/a/b");
    }
}
