use crate::error::ConfigError;
use crate::settings::group::SettingsGroup;
use crate::settings::spec::GroupSpec;
use crate::settings::state::{GroupEntry, Shared, unknown_group};
use fxhash::FxHashSet;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Weak};
use strata_event_bus::EventBus;
use strata_schema::{GroupSchema, SchemaNode, Value, qualified_key, split_key};
use strata_storage::{FileWatcher, Loader, RawSettingsMap, WatchConfig, WatchMode};
use tracing::{debug, info, trace, warn};

/// How [`SettingsRegistry::load_raw`] applies a raw map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Values become live overrides.
    Values,
    /// Values replace node defaults; live values are kept.
    Defaults,
}

/// Aggregate of every settings group, owning the active loader and watcher.
///
/// Cloning is cheap; clones share the same groups. All reads and writes of
/// group state, reloads and saves are serialized through one lock, so readers
/// see each group either fully before or fully after a reload.
#[derive(Clone)]
pub struct SettingsRegistry {
    shared: Arc<Shared>,
}

impl fmt::Debug for SettingsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsRegistry").field("shared", &self.shared).finish()
    }
}

impl SettingsRegistry {
    /// Creates an empty registry publishing notifications on `bus`.
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self { shared: Arc::new(Shared::new(bus)) }
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.shared.bus
    }

    /// Registers a group, or merges `spec` into the group of the same name.
    ///
    /// The same handle is returned for every registration under one name.
    /// Metadata of the first registration is kept unless it was empty.
    ///
    /// # Errors
    /// Returns [`ConfigError::DuplicateNode`] when a node name is already taken;
    /// nothing is added in that case.
    pub fn register_group(&self, spec: GroupSpec) -> Result<SettingsGroup, ConfigError> {
        let (name, title, description, nodes, validators) = spec.into_parts();
        let mut state = self.shared.state.write();

        if let Some(entry) = state.groups.get_mut(&name) {
            check_nodes(&entry.schema, &nodes)?;
            for node in nodes {
                entry.schema.add_node(node).map_err(|e| duplicate(&name, e.message()))?;
            }
            for validator in validators {
                entry.schema.add_validator(validator);
            }
            if entry.title.is_empty() {
                entry.title = title;
            }
            if entry.description.is_empty() {
                entry.description = description;
            }
            debug!(group = %name, nodes = entry.schema.nodes().len(), "Settings group extended");
            return Ok(entry.handle.clone());
        }

        let mut schema = GroupSchema::new(name.as_str());
        check_nodes(&schema, &nodes)?;
        for node in nodes {
            schema.add_node(node).map_err(|e| duplicate(&name, e.message()))?;
        }
        for validator in validators {
            schema.add_validator(validator);
        }

        let handle = SettingsGroup::new(&name, Arc::downgrade(&self.shared));
        debug!(group = %name, nodes = schema.nodes().len(), "Settings group registered");
        state.groups.insert(
            name,
            GroupEntry {
                handle: handle.clone(),
                title,
                description,
                schema,
                values: BTreeMap::new(),
                dirty: BTreeSet::new(),
            },
        );
        Ok(handle)
    }

    /// # Errors
    /// Returns [`ConfigError::UnknownGroup`].
    pub fn group(&self, name: &str) -> Result<SettingsGroup, ConfigError> {
        self.shared.state.read().groups.get(name).map(|e| e.handle.clone()).ok_or_else(|| unknown_group(name))
    }

    /// Every group, sorted by name.
    #[must_use]
    pub fn groups(&self) -> Vec<SettingsGroup> {
        self.shared.state.read().groups.values().map(|e| e.handle.clone()).collect()
    }

    /// Installs `defaults` as node defaults, attaches `loader` and loads from it.
    ///
    /// A previously attached loader is closed first.
    ///
    /// # Errors
    /// Returns [`ConfigError::Storage`] when the loader cannot be read.
    pub fn init(&self, loader: Option<Arc<dyn Loader>>, defaults: &RawSettingsMap) -> Result<(), ConfigError> {
        let _io = self.shared.io.lock();
        self.load_raw(defaults, LoadMode::Defaults);

        let previous = std::mem::replace(&mut self.shared.state.write().loader, loader);
        if let Some(previous) = previous {
            previous.close();
        }

        self.load()?;
        info!(groups = self.shared.state.read().groups.len(), "Settings initialized");
        Ok(())
    }

    /// Replaces defaults with the loader's defaults, then layers its values on top.
    ///
    /// Values that fail to parse are discarded one by one; only storage
    /// failures abort the load. Nodes absent from the loader keep their value.
    /// Runs exclusively with [`SettingsRegistry::save`].
    ///
    /// # Errors
    /// Returns [`ConfigError::Storage`] when the loader cannot be read.
    pub fn load(&self) -> Result<(), ConfigError> {
        let _io = self.shared.io.lock();
        let Some(loader) = self.loader() else {
            debug!("No settings loader attached");
            return Ok(());
        };

        let defaults = loader.load_defaults()?;
        let values = loader.load()?;
        let changed = self.apply(&[(&defaults, LoadMode::Defaults), (&values, LoadMode::Values)]);
        info!(defaults = defaults.len(), values = values.len(), changed, "Settings loaded");
        Ok(())
    }

    /// [`SettingsRegistry::load`] triggered by a storage change.
    ///
    /// # Errors
    /// Returns [`ConfigError::Storage`] when the loader cannot be read.
    pub fn reload(&self) -> Result<(), ConfigError> {
        debug!("Reloading settings");
        self.load()
    }

    /// Applies one raw map and returns how many groups changed.
    pub fn load_raw(&self, raw: &RawSettingsMap, mode: LoadMode) -> usize {
        self.apply(&[(raw, mode)])
    }

    fn apply(&self, layers: &[(&RawSettingsMap, LoadMode)]) -> usize {
        let _io = self.shared.io.lock();
        let changed: Vec<SettingsGroup> = {
            let mut state = self.shared.state.write();
            let mut before: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();

            for (raw, mode) in layers {
                for (key, raw_value) in *raw {
                    let Some((group, node)) = split_key(key) else {
                        trace!(key = %key, "Ignoring key outside any group");
                        continue;
                    };
                    let Some(entry) = state.groups.get_mut(group) else {
                        trace!(key = %key, "Ignoring key of unknown group");
                        continue;
                    };
                    let Some(schema_node) = entry.schema.node(node) else {
                        trace!(key = %key, "Ignoring key of unknown node");
                        continue;
                    };
                    let value = match schema_node.deserialize(raw_value) {
                        Ok(value) => value,
                        Err(err) => {
                            warn!(key = %key, value = %raw_value, error = %err, "Discarding invalid settings value");
                            continue;
                        },
                    };

                    before.entry(group.to_owned()).or_insert_with(|| entry.snapshot());
                    apply_value(entry, node, value, *mode);
                }
            }

            before
                .into_iter()
                .filter_map(|(name, snapshot)| {
                    let entry = state.groups.get(&name)?;
                    (entry.snapshot() != snapshot).then(|| entry.handle.clone())
                })
                .collect()
        };

        for group in &changed {
            self.shared.notify(group);
        }
        changed.len()
    }

    /// Stringified defaults of every node when `only_defaults`, otherwise the
    /// current values of dirty nodes only.
    #[must_use]
    pub fn export(&self, only_defaults: bool) -> RawSettingsMap {
        self.shared.state.read().export(only_defaults)
    }

    /// Writes the dirty nodes through the loader and clears the dirty set.
    ///
    /// Without a loader nothing is written and the dirty set is kept.
    ///
    /// # Errors
    /// Returns [`ConfigError::Storage`]; the dirty set is kept on failure.
    pub fn save(&self) -> Result<(), ConfigError> {
        let _io = self.shared.io.lock();
        let mut state = self.shared.state.write();
        let Some(loader) = state.loader.clone() else {
            debug!("No settings loader attached, nothing saved");
            return Ok(());
        };

        let data = state.export(false);
        loader.save(&data)?;
        for entry in state.groups.values_mut() {
            entry.dirty.clear();
        }
        info!(count = data.len(), "Settings saved");
        Ok(())
    }

    #[must_use]
    pub fn loader(&self) -> Option<Arc<dyn Loader>> {
        self.shared.state.read().loader.clone()
    }

    /// Starts watching the loader's file and reloading on change.
    ///
    /// Returns `false` when there is nothing to watch. A running watcher is replaced.
    ///
    /// # Errors
    /// Returns [`ConfigError::Storage`] when the watcher cannot start.
    pub fn attach_watcher(&self, config: WatchConfig) -> Result<bool, ConfigError> {
        if config.mode == WatchMode::Off {
            return Ok(false);
        }
        let Some(path) = self.loader().and_then(|l| l.watch_path().map(Path::to_path_buf)) else {
            debug!("Loader has no watchable file");
            return Ok(false);
        };

        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let watcher = FileWatcher::new(path, config, move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if let Err(err) = (SettingsRegistry { shared }).reload() {
                warn!(error = %err, "Settings reload failed");
            }
        });
        watcher.start()?;

        let previous = self.shared.watcher.lock().replace(watcher);
        if let Some(previous) = previous {
            previous.stop();
        }
        Ok(true)
    }

    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.shared.watcher.lock().as_ref().is_some_and(FileWatcher::is_running)
    }

    /// Stops the watcher and detaches and closes the loader.
    ///
    /// No reload runs after this returns.
    pub fn close(&self) {
        let watcher = self.shared.watcher.lock().take();
        if let Some(watcher) = watcher {
            watcher.stop();
        }
        let loader = self.shared.state.write().loader.take();
        if let Some(loader) = loader {
            loader.close();
            info!("Settings loader closed");
        }
    }

    /// Drops every group. Outstanding handles report [`ConfigError::UnknownGroup`].
    pub fn clear(&self) {
        self.shared.state.write().groups.clear();
    }
}

fn apply_value(entry: &mut GroupEntry, node: &str, value: Value, mode: LoadMode) {
    match mode {
        LoadMode::Values => {
            entry.values.insert(node.to_owned(), value);
            entry.dirty.remove(node);
        },
        LoadMode::Defaults => {
            // A live value survives; it stays dirty only while it differs.
            if entry.values.get(node) == Some(&value) {
                entry.dirty.remove(node);
            }
            if let Some(schema_node) = entry.schema.node_mut(node) {
                schema_node.set_default(value);
            }
        },
    }
}

fn check_nodes(schema: &GroupSchema, nodes: &[SchemaNode]) -> Result<(), ConfigError> {
    let mut names = FxHashSet::default();
    for node in nodes {
        if schema.contains(node.name()) || !names.insert(node.name()) {
            return Err(duplicate(schema.name(), node.name()));
        }
    }
    Ok(())
}

fn duplicate(group: &str, node: &str) -> ConfigError {
    ConfigError::DuplicateNode { message: qualified_key(group, node).into(), context: None }
}
