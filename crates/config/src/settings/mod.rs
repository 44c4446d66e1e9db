//! Live, schema-typed settings groups backed by a pluggable [`Loader`](strata_storage::Loader).

mod events;
mod group;
mod registry;
mod spec;
mod state;

pub use events::{SettingsGroupModified, SettingsInitialized, SettingsInitializing};
pub use group::{NodeHandle, SettingsGroup};
pub use registry::{LoadMode, SettingsRegistry};
pub use spec::GroupSpec;
