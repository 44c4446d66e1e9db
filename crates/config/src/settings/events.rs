use crate::settings::group::SettingsGroup;

/// Published before the action pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsInitializing {
    /// Names of the scanned root modules.
    pub roots: Vec<String>,
}

/// Published once settings are loaded and the watcher, if any, is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsInitialized {
    pub roots: Vec<String>,
}

/// Published after a group's live values changed, outside the registry lock.
#[derive(Debug, Clone)]
pub struct SettingsGroupModified {
    pub group: SettingsGroup,
}
