//! Endpoint Registry module.
//!
//! Provides thread-safe in-memory storage of outbound endpoint definitions.

mod endpoint;
mod error;

pub use endpoint::*;
pub use error::*;

use dashmap::DashMap;

/// The Endpoint Registry stores all known endpoint definitions.
///
/// Backed by a sharded concurrent map, so operations on distinct ids never
/// contend with each other. Per-endpoint state owned by other components
/// (cache entries, limiter windows, metrics) is purged by the caller of
/// [`EndpointRegistry::unregister`].
///
/// # Examples
///
/// ```
/// use conduit::registry::{Endpoint, EndpointRegistry};
///
/// let registry = EndpointRegistry::new();
/// registry
///     .register(Endpoint::new("users", "Users", "https://api.example.com/users"))
///     .unwrap();
/// assert_eq!(registry.len(), 1);
/// ```
#[derive(Debug)]
pub struct EndpointRegistry {
    endpoints: DashMap<String, Endpoint>,
}

impl EndpointRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            endpoints: DashMap::new(),
        }
    }

    /// Register a new endpoint.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidEndpoint` if the definition fails
    /// [`Endpoint::validate`], or `RegistryError::DuplicateEndpoint` if the id
    /// is already registered.
    pub fn register(&self, endpoint: Endpoint) -> Result<(), RegistryError> {
        endpoint.validate()?;
        match self.endpoints.entry(endpoint.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                Err(RegistryError::DuplicateEndpoint(entry.key().clone()))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(endpoint);
                Ok(())
            }
        }
    }

    /// Remove an endpoint and return its definition.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::EndpointNotFound` if no endpoint has this id.
    pub fn unregister(&self, id: &str) -> Result<Endpoint, RegistryError> {
        self.endpoints
            .remove(id)
            .map(|(_, endpoint)| endpoint)
            .ok_or_else(|| RegistryError::EndpointNotFound(id.to_string()))
    }

    /// Shallow-merge `update` into the endpoint and return the new definition.
    ///
    /// The merged definition is validated before it replaces the stored one,
    /// so a rejected update leaves the endpoint unchanged.
    pub fn update(&self, id: &str, update: EndpointUpdate) -> Result<Endpoint, RegistryError> {
        let mut entry = self
            .endpoints
            .get_mut(id)
            .ok_or_else(|| RegistryError::EndpointNotFound(id.to_string()))?;

        let mut merged = entry.clone();
        merged.apply(update);
        merged.validate()?;
        *entry = merged.clone();
        Ok(merged)
    }

    /// Get a copy of an endpoint definition.
    pub fn get(&self, id: &str) -> Option<Endpoint> {
        self.endpoints.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.endpoints.contains_key(id)
    }

    /// All endpoint definitions, ordered by id.
    pub fn list(&self) -> Vec<Endpoint> {
        let mut endpoints: Vec<Endpoint> = self
            .endpoints
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        endpoints.sort_by(|a, b| a.id.cmp(&b.id));
        endpoints
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.endpoints.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Remove every endpoint.
    pub fn clear(&self) {
        self.endpoints.clear();
    }
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}
