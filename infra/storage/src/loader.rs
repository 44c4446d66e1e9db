use crate::error::StorageError;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Flat `"group.node" -> string` map exchanged between a [`Loader`] and the
/// settings registry.
pub type RawSettingsMap = BTreeMap<String, String>;

/// Key injected by file-backed loaders: the directory of the file that was read.
pub const HERE_KEY: &str = "here";

/// Storage backend of a settings registry.
///
/// Implementations hold only their own configuration (paths, section name);
/// all typed state lives in the registry.
pub trait Loader: Send + Sync + fmt::Debug {
    /// Current values.
    ///
    /// # Errors
    /// Returns a [`StorageError`] when the backing store cannot be read.
    fn load(&self) -> Result<RawSettingsMap, StorageError>;

    /// Values that replace the built-in schema defaults.
    ///
    /// # Errors
    /// Returns a [`StorageError`] when the backing store cannot be read.
    fn load_defaults(&self) -> Result<RawSettingsMap, StorageError>;

    /// Merges `values` into the store, leaving every other entry untouched.
    ///
    /// # Errors
    /// Returns a [`StorageError`] when the store cannot be written.
    fn save(&self, values: &RawSettingsMap) -> Result<(), StorageError>;

    /// Releases backend resources. Called once when the registry detaches the loader.
    fn close(&self) {}

    /// File whose changes should trigger a reload, if the backend has one.
    fn watch_path(&self) -> Option<&Path> {
        None
    }
}
