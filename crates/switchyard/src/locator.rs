//! Servant locators and the per-category locator table.
//!
//! A locator resolves servants on demand for identities that have no direct
//! registration. Locators are keyed by identity category; the empty category
//! holds the default locator consulted when no category-specific one exists.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::identity::Identity;
use crate::servant::{Request, Servant};

/// Opaque per-request value a locator threads from `locate` to `finished`.
pub type Cookie = Box<dyn Any + Send>;

/// Servant resolved by a locator, plus its optional cookie.
pub struct Located {
    /// Servant the request is dispatched to.
    pub servant: Arc<dyn Servant>,
    /// Value handed back to [`ServantLocator::finished`].
    pub cookie: Option<Cookie>,
}

impl Located {
    /// Wraps a servant without a cookie.
    #[must_use]
    pub fn new(servant: Arc<dyn Servant>) -> Self {
        Self {
            servant,
            cookie: None,
        }
    }

    /// Attaches a cookie.
    #[must_use]
    pub fn with_cookie(mut self, cookie: impl Any + Send) -> Self {
        self.cookie = Some(Box::new(cookie));
        self
    }
}

impl fmt::Debug for Located {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Located")
            .field("cookie", &self.cookie.is_some())
            .finish_non_exhaustive()
    }
}

/// Errors a locator may raise while resolving a servant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocateError {
    /// The object exists but not under the requested facet.
    #[error("{identity} has no facet '{facet}'")]
    FacetNotFound {
        /// Requested identity.
        identity: Identity,
        /// Requested facet.
        facet: String,
    },
    /// Resolution failed for another reason.
    #[error("{message}")]
    Failed {
        /// Failure description.
        message: String,
    },
}

impl LocateError {
    /// Builds a facet-not-found error for `request`.
    #[must_use]
    pub fn facet_not_found(request: &Request) -> Self {
        Self::FacetNotFound {
            identity: request.identity().clone(),
            facet: request.facet().to_owned(),
        }
    }

    /// Builds a generic resolution failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// On-demand servant resolver registered for an identity category.
pub trait ServantLocator: Send + Sync {
    /// Resolves a servant for `request`, or `None` when the object does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns a [`LocateError`] when resolution itself fails.
    fn locate(&self, request: &Request) -> Result<Option<Located>, LocateError>;

    /// Called exactly once after every `locate` call, once the dispatch has
    /// completed (or immediately when no servant was found or `locate`
    /// failed).
    fn finished(&self, request: &Request, servant: Option<&Arc<dyn Servant>>, cookie: Option<Cookie>);

    /// Called once when the owning adapter finishes deactivating.
    fn deactivate(&self, category: &str);
}

/// Table of locators keyed by identity category.
#[derive(Default)]
pub struct LocatorTable {
    locators: RwLock<HashMap<String, Arc<dyn ServantLocator>>>,
}

impl LocatorTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `locator` for `category`, returning any locator it replaced.
    pub fn add(
        &self,
        category: impl Into<String>,
        locator: Arc<dyn ServantLocator>,
    ) -> Option<Arc<dyn ServantLocator>> {
        self.locators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(category.into(), locator)
    }

    /// Removes and returns the locator for `category`.
    pub fn remove(&self, category: &str) -> Option<Arc<dyn ServantLocator>> {
        self.locators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(category)
    }

    /// Returns the locator registered for exactly `category`.
    #[must_use]
    pub fn get(&self, category: &str) -> Option<Arc<dyn ServantLocator>> {
        self.locators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(category)
            .cloned()
    }

    /// Returns the locator for `category`, falling back to the default
    /// locator registered under the empty category.
    #[must_use]
    pub fn find(&self, category: &str) -> Option<Arc<dyn ServantLocator>> {
        let locators = self.locators.read().unwrap_or_else(PoisonError::into_inner);
        locators
            .get(category)
            .or_else(|| locators.get(""))
            .cloned()
    }

    /// Removes every locator, returning them with their categories.
    pub fn drain(&self) -> Vec<(String, Arc<dyn ServantLocator>)> {
        self.locators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect()
    }

    /// Number of installed locators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when no locator is installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for LocatorTable {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let locators = self.locators.read().unwrap_or_else(PoisonError::into_inner);
        let mut categories: Vec<&str> = locators.keys().map(String::as_str).collect();
        categories.sort_unstable();
        formatter
            .debug_struct("LocatorTable")
            .field("categories", &categories)
            .finish()
    }
}
