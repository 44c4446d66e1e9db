use crate::error::{ConfigError, ConfigErrorExt};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use strata_storage::{FileStorage, RawSettingsMap, WatchConfig, WatchMode};
use tracing::info;

const DEFAULT_SECTION: &str = "DEFAULT";
const DEFAULT_DEBOUNCE_MS: u64 = 50;
const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Watcher mode as written in options files and environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchSetting {
    Off,
    #[default]
    Native,
    Poll,
}

impl FromStr for WatchSetting {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "false" | "no" | "0" => Ok(Self::Off),
            "native" | "true" | "yes" | "1" => Ok(Self::Native),
            "poll" => Ok(Self::Poll),
            other => Err(options_error(format!("Invalid watch mode '{other}'"))),
        }
    }
}

impl From<WatchSetting> for WatchMode {
    fn from(setting: WatchSetting) -> Self {
        match setting {
            WatchSetting::Off => Self::Off,
            WatchSetting::Native => Self::Native,
            WatchSetting::Poll => Self::Poll,
        }
    }
}

/// Where settings live and how they are watched.
///
/// Every field has a default, so an empty options file is valid and yields
/// a storage-less registry with native watching.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SettingsOptions {
    /// Runtime settings file, read by `load` and rewritten by `save`.
    pub settings: Option<PathBuf>,
    /// File whose values replace the built-in node defaults.
    pub defaults: Option<PathBuf>,
    /// Extra defaults files merged beneath `defaults`.
    pub include: Vec<PathBuf>,
    pub section: String,
    pub watch: WatchSetting,
    pub debounce_ms: u64,
    pub poll_interval_ms: u64,
    /// Explicit `"group.node"` defaults applied before the loader's own.
    pub overrides: RawSettingsMap,
}

impl Default for SettingsOptions {
    fn default() -> Self {
        Self {
            settings: None,
            defaults: None,
            include: Vec::new(),
            section: DEFAULT_SECTION.to_owned(),
            watch: WatchSetting::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            overrides: RawSettingsMap::new(),
        }
    }
}

impl SettingsOptions {
    /// Builds options from a flat key/value map.
    ///
    /// `settings`, `defaults`, `include`, `section`, `watch`, `debounce_ms` and
    /// `poll_interval_ms` configure storage; `include` takes whitespace or comma
    /// separated paths. Every other key becomes an override.
    ///
    /// # Errors
    /// Returns [`ConfigError::Options`] for malformed watch modes or intervals.
    pub fn from_raw(raw: &RawSettingsMap) -> Result<Self, ConfigError> {
        let mut options = Self::default();
        for (key, value) in raw {
            match key.as_str() {
                "settings" => options.settings = non_empty(value).map(PathBuf::from),
                "defaults" => options.defaults = non_empty(value).map(PathBuf::from),
                "include" => {
                    options.include = value
                        .split(|c: char| c == ',' || c.is_whitespace())
                        .filter(|p| !p.is_empty())
                        .map(PathBuf::from)
                        .collect();
                },
                "section" => options.section = value.trim().to_owned(),
                "watch" => options.watch = value.parse()?,
                "debounce_ms" => options.debounce_ms = parse_millis(key, value)?,
                "poll_interval_ms" => options.poll_interval_ms = parse_millis(key, value)?,
                _ => {
                    options.overrides.insert(key.clone(), value.clone());
                },
            }
        }
        Ok(options)
    }

    /// Reads options from `path`, then overlays `STRATA__*` environment variables
    /// (e.g. `STRATA__WATCH=poll`).
    ///
    /// # Errors
    /// Returns [`ConfigError::Options`] if the file is missing or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading settings options");

        let options = Config::builder()
            .add_source(File::from(path).required(true))
            .add_source(Environment::with_prefix("STRATA").separator("__").convert_case(config::Case::Snake))
            .build()
            .context("Failed to build settings options")?
            .try_deserialize::<Self>()
            .context("Failed to deserialize settings options")?;

        Ok(options)
    }

    /// File-backed loader described by these options.
    #[must_use]
    pub fn storage(&self) -> FileStorage {
        let mut builder = FileStorage::builder().section(self.section.as_str());
        if let Some(settings) = &self.settings {
            builder = builder.settings(settings);
        }
        if let Some(defaults) = &self.defaults {
            builder = builder.defaults(defaults);
        }
        for include in &self.include {
            builder = builder.include(include);
        }
        builder.build()
    }

    #[must_use]
    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            mode: self.watch.into(),
            debounce: Duration::from_millis(self.debounce_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

fn parse_millis(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|e| options_error(format!("Invalid {key} '{value}': {e}")))
}

fn options_error(message: String) -> ConfigError {
    ConfigError::Options { source: config::ConfigError::Message(message), context: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn from_raw_splits_storage_keys_from_overrides() {
        let raw: RawSettingsMap = [
            ("settings", "/etc/app/settings.cfg"),
            ("include", "base.cfg, extra.cfg"),
            ("watch", "poll"),
            ("server.port", "9000"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();

        let options = SettingsOptions::from_raw(&raw).unwrap();

        assert_eq!(options.settings.as_deref(), Some(Path::new("/etc/app/settings.cfg")));
        assert_eq!(options.include, vec![PathBuf::from("base.cfg"), PathBuf::from("extra.cfg")]);
        assert_eq!(options.watch, WatchSetting::Poll);
        assert_eq!(options.section, "DEFAULT");
        assert_eq!(options.overrides.len(), 1);
        assert_eq!(options.overrides["server.port"], "9000");
    }

    #[test]
    fn from_raw_rejects_unknown_watch_mode() {
        let raw: RawSettingsMap = [("watch".to_owned(), "sometimes".to_owned())].into();
        let err = SettingsOptions::from_raw(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::Options { .. }));
    }

    #[test]
    fn watch_config_uses_millisecond_fields() {
        let options = SettingsOptions { watch: WatchSetting::Off, debounce_ms: 10, ..Default::default() };
        let config = options.watch_config();
        assert_eq!(config.mode, WatchMode::Off);
        assert_eq!(config.debounce, Duration::from_millis(10));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn load_reads_file_with_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.json");
        fs::write(&path, r#"{ "settings": "app.cfg", "watch": "off", "poll_interval_ms": 500 }"#).unwrap();

        let options = SettingsOptions::load(&path).unwrap();

        assert_eq!(options.settings.as_deref(), Some(Path::new("app.cfg")));
        assert_eq!(options.watch, WatchSetting::Off);
        assert_eq!(options.debounce_ms, 50);
        assert_eq!(options.poll_interval_ms, 500);
        assert!(options.overrides.is_empty());
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SettingsOptions::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Options { .. }));
    }
}
