use crate::error::StorageError;
use crate::loader::{Loader, RawSettingsMap};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// In-process [`Loader`] backed by two maps.
///
/// Useful for embedding and tests; `save` merges into the value map exactly
/// like a file section would.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    defaults: RwLock<RawSettingsMap>,
    values: RwLock<RawSettingsMap>,
    saves: AtomicUsize,
    closed: AtomicBool,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_values(defaults: RawSettingsMap, values: RawSettingsMap) -> Self {
        Self { defaults: RwLock::new(defaults), values: RwLock::new(values), ..Self::default() }
    }

    /// Replaces the stored values, as an external writer would.
    pub fn replace_values(&self, values: RawSettingsMap) {
        *self.values.write() = values;
    }

    #[must_use]
    pub fn values(&self) -> RawSettingsMap {
        self.values.read().clone()
    }

    /// Number of successful `save` calls.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Loader for MemoryStorage {
    fn load(&self) -> Result<RawSettingsMap, StorageError> {
        Ok(self.values.read().clone())
    }

    fn load_defaults(&self) -> Result<RawSettingsMap, StorageError> {
        Ok(self.defaults.read().clone())
    }

    fn save(&self, values: &RawSettingsMap) -> Result<(), StorageError> {
        self.values.write().extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
