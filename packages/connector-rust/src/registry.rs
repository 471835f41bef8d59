//! Registry of remote destinations.
//!
//! Connection properties are looked up by destination name. The registry is
//! an ordinary value: create it at startup, hand it by reference (or `Arc`)
//! to whatever needs a destination, and [`clear`](DestinationRegistry::clear)
//! it on shutdown.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConnectorError;

/// Connection properties of one remote destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationProperties {
    pub name: String,
    pub host: String,
    /// Three-digit client number.
    pub client: String,
    pub user: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// Additional transport properties passed through untouched.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

fn default_language() -> String {
    "EN".to_string()
}

/// Outcome of [`DestinationRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Registration {
    Registered,
    /// A destination with the same name exists; the registry is unchanged.
    AlreadyRegistered,
}

/// Destination lookup keyed by name.
#[derive(Debug, Default)]
pub struct DestinationRegistry {
    destinations: DashMap<String, Arc<DestinationProperties>>,
}

impl DestinationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with `destinations`. Later entries
    /// with a name already seen are ignored.
    #[must_use]
    pub fn with_destinations(
        destinations: impl IntoIterator<Item = DestinationProperties>,
    ) -> Self {
        let registry = Self::new();
        for properties in destinations {
            let name = properties.name.clone();
            if registry.register(properties) == Registration::AlreadyRegistered {
                debug!(destination = %name, "ignoring duplicate destination");
            }
        }
        registry
    }

    /// Registers a destination unless one with the same name exists.
    pub fn register(&self, properties: DestinationProperties) -> Registration {
        match self.destinations.entry(properties.name.clone()) {
            Entry::Occupied(_) => Registration::AlreadyRegistered,
            Entry::Vacant(slot) => {
                info!(
                    destination = %properties.name,
                    host = %properties.host,
                    "registered destination"
                );
                slot.insert(Arc::new(properties));
                Registration::Registered
            }
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<DestinationProperties>> {
        self.destinations.get(name).map(|entry| entry.value().clone())
    }

    /// Like [`get`](Self::get), but a missing destination is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::UnknownDestination`] if `name` is not registered.
    pub fn require(&self, name: &str) -> Result<Arc<DestinationProperties>, ConnectorError> {
        self.get(name).ok_or_else(|| ConnectorError::UnknownDestination {
            name: name.to_string(),
        })
    }

    pub fn remove(&self, name: &str) -> Option<Arc<DestinationProperties>> {
        self.destinations.remove(name).map(|(_, v)| v)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.destinations.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Drops every destination.
    pub fn clear(&self) {
        info!(count = self.destinations.len(), "clearing destination registry");
        self.destinations.clear();
    }
}
