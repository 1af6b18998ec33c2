//! Servant registry keyed by identity and facet.
//!
//! The [`ServantRegistry`] stores servants under `(identity, facet)` keys.
//! Lookups take a shared read lock so concurrent dispatches never contend
//! with each other; registration changes take the write lock briefly. Each
//! facet is an independent registration: a lookup for one facet never falls
//! back to another.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use switchyard_config::RegistrationPolicy;

use crate::adapter::AdapterError;
use crate::identity::Identity;
use crate::servant::Servant;

type FacetMap = HashMap<String, Arc<dyn Servant>>;

/// Registry of servants bound to `(identity, facet)` keys.
pub struct ServantRegistry {
    policy: RegistrationPolicy,
    servants: RwLock<HashMap<Identity, FacetMap>>,
}

impl ServantRegistry {
    /// Creates an empty registry applying `policy` to duplicate keys.
    #[must_use]
    pub fn new(policy: RegistrationPolicy) -> Self {
        Self {
            policy,
            servants: RwLock::new(HashMap::new()),
        }
    }

    /// Policy applied when a key is registered twice.
    #[must_use]
    pub fn policy(&self) -> RegistrationPolicy {
        self.policy
    }

    /// Binds `servant` to `(identity, facet)`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::IllegalIdentity`] for an empty name or a
    /// category containing `/`, and
    /// [`AdapterError::AlreadyRegistered`] when the key is bound and the
    /// policy is [`RegistrationPolicy::Reject`].
    pub fn add(
        &self,
        identity: Identity,
        facet: &str,
        servant: Arc<dyn Servant>,
    ) -> Result<(), AdapterError> {
        if identity.name().is_empty() {
            return Err(AdapterError::illegal_identity(
                &identity,
                "identity name must not be empty",
            ));
        }
        if identity.category().contains('/') {
            return Err(AdapterError::illegal_identity(
                &identity,
                "identity category must not contain '/'",
            ));
        }

        let mut servants = self
            .servants
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let bound = servants
            .get(&identity)
            .is_some_and(|facets| facets.contains_key(facet));
        if bound && self.policy == RegistrationPolicy::Reject {
            return Err(AdapterError::already_registered(&identity, facet));
        }
        servants
            .entry(identity)
            .or_default()
            .insert(facet.to_owned(), servant);
        Ok(())
    }

    /// Removes the servant bound to `(identity, facet)`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::NotFound`] when the key is not bound.
    pub fn remove(&self, identity: &Identity, facet: &str) -> Result<Arc<dyn Servant>, AdapterError> {
        let mut servants = self
            .servants
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(facets) = servants.get_mut(identity) else {
            return Err(AdapterError::not_found(identity, facet));
        };
        let removed = facets
            .remove(facet)
            .ok_or_else(|| AdapterError::not_found(identity, facet))?;
        if facets.is_empty() {
            servants.remove(identity);
        }
        Ok(removed)
    }

    /// Looks up the servant bound to exactly `(identity, facet)`.
    #[must_use]
    pub fn find(&self, identity: &Identity, facet: &str) -> Option<Arc<dyn Servant>> {
        self.servants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .and_then(|facets| facets.get(facet))
            .cloned()
    }

    /// Returns every facet registered for `identity`.
    #[must_use]
    pub fn find_all_facets(&self, identity: &Identity) -> HashMap<String, Arc<dyn Servant>> {
        self.servants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned()
            .unwrap_or_default()
    }

    /// Removes every facet registered for `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::NotFound`] when the identity has no facets.
    pub fn remove_all_facets(
        &self,
        identity: &Identity,
    ) -> Result<HashMap<String, Arc<dyn Servant>>, AdapterError> {
        self.servants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity)
            .ok_or_else(|| AdapterError::not_found(identity, ""))
    }

    /// Returns `true` when any facet is registered for `identity`.
    #[must_use]
    pub fn has_identity(&self, identity: &Identity) -> bool {
        self.servants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(identity)
    }

    /// Returns the number of registered `(identity, facet)` keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.servants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(HashMap::len)
            .sum()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ServantRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ServantRegistry")
            .field("policy", &self.policy)
            .field("entries", &self.len())
            .finish()
    }
}
