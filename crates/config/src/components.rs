//! Type-erased registries filled by directives: adapter factories and event descriptors.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// What an adapter needs and what it provides.
///
/// `provides` must be set explicitly; there is no inference from the factory type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterSpec {
    pub required: Vec<String>,
    pub provides: Option<String>,
    pub name: String,
}

impl AdapterSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "AdapterSpec builders return the updated spec"]
    pub fn requires(mut self, capability: impl Into<String>) -> Self {
        self.required.push(capability.into());
        self
    }

    #[must_use = "AdapterSpec builders return the updated spec"]
    pub fn provides(mut self, capability: impl Into<String>) -> Self {
        self.provides = Some(capability.into());
        self
    }

    #[must_use = "AdapterSpec builders return the updated spec"]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Registration key of an adapter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AdapterKey {
    pub required: Vec<String>,
    pub provides: String,
    pub name: String,
}

/// Adapter factories keyed by (required capabilities, provided capability, name).
#[derive(Default)]
pub struct ComponentRegistry {
    adapters: RwLock<BTreeMap<AdapterKey, Arc<dyn Any + Send + Sync>>>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry").field("adapters", &self.adapters.read().len()).finish()
    }
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `factory` under `key`, replacing any previous registration.
    pub fn register_adapter<F: Any + Send + Sync>(&self, key: AdapterKey, factory: F) {
        debug!(provides = %key.provides, name = %key.name, required = ?key.required, "Adapter registered");
        self.adapters.write().insert(key, Arc::new(factory));
    }

    /// Returns the factory registered under the given key, if it has type `F`.
    #[must_use]
    pub fn lookup_adapter<F: Any + Send + Sync>(
        &self,
        required: &[&str],
        provides: &str,
        name: &str,
    ) -> Option<Arc<F>> {
        let key = AdapterKey {
            required: required.iter().map(|s| (*s).to_owned()).collect(),
            provides: provides.to_owned(),
            name: name.to_owned(),
        };
        let factory = Arc::clone(self.adapters.read().get(&key)?);
        factory.downcast::<F>().ok()
    }

    /// Keys of every registered adapter, sorted.
    #[must_use]
    pub fn adapters(&self) -> Vec<AdapterKey> {
        self.adapters.read().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.adapters.write().clear();
    }
}

/// Introspection record of a declared event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDescriptor {
    pub name: String,
    pub title: String,
    pub category: String,
    pub description: String,
}

/// Event descriptors keyed by full type name.
#[derive(Debug, Default)]
pub struct EventCatalog {
    events: RwLock<BTreeMap<String, EventDescriptor>>,
}

impl EventCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, descriptor: EventDescriptor) {
        debug!(event = %descriptor.name, category = %descriptor.category, "Event described");
        self.events.write().insert(descriptor.name.clone(), descriptor);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<EventDescriptor> {
        self.events.read().get(name).cloned()
    }

    #[must_use]
    pub fn descriptors(&self) -> Vec<EventDescriptor> {
        self.events.read().values().cloned().collect()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }
}
