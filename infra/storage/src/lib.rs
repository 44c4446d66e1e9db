//! Settings storage backends.
//!
//! The settings registry talks to storage only through the [`Loader`] contract,
//! exchanging flat [`RawSettingsMap`]s (`"group.node" -> string`). This crate
//! ships two loaders and the file watcher used for hot reload.
//!
//! # Core Features
//!
//! - **Layered INI files**: [`FileStorage`] merges `DEFAULT` beneath the target
//!   section and follows `include = <path>` keys, outer file first.
//! - **Atomic writes**: saves go through a unique temp file, `fsync` and `rename`,
//!   so a crash never leaves a half-written settings file.
//! - **Order preserving**: saving merges into the target section only; every other
//!   section and key keeps its place.
//! - **Hot reload**: [`FileWatcher`] debounces change events and skips rewrites
//!   that leave the content unchanged.
//!
//! # Examples
//!
//! ```rust
//! use strata_storage::{FileStorage, Loader, RawSettingsMap, StorageError};
//!
//! fn main() -> Result<(), StorageError> {
//!     # let tmp = tempfile::tempdir().unwrap();
//!     # let path = tmp.path().join("settings.cfg");
//!     let storage = FileStorage::builder().settings(&path).build();
//!
//!     let mut values = RawSettingsMap::new();
//!     values.insert("server.port".into(), "8080".into());
//!     storage.save(&values)?;
//!
//!     let loaded = storage.load()?;
//!     assert_eq!(loaded["server.port"], "8080");
//!     Ok(())
//! }
//! ```

mod error;
mod file;
pub mod ini;
mod loader;
mod memory;
pub mod watcher;

pub use error::{StorageError, StorageErrorExt};
pub use file::{FileStorage, FileStorageBuilder, INCLUDE_KEY};
pub use loader::{HERE_KEY, Loader, RawSettingsMap};
pub use memory::MemoryStorage;
pub use watcher::{FileWatcher, WatchConfig, WatchMode};
