use crate::error::ConfigError;
use crate::settings::events::SettingsGroupModified;
use crate::settings::group::SettingsGroup;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use strata_event_bus::EventBus;
use strata_schema::{GroupSchema, SchemaNode, Value, qualified_key};
use strata_storage::{FileWatcher, Loader, RawSettingsMap};
use tracing::warn;

/// State shared by a registry and every group handle it issued.
///
/// All group and registry mutation goes through `state`. Storage round trips
/// (read then apply, export then write) additionally hold `io` end to end.
pub(crate) struct Shared {
    pub(crate) state: RwLock<RegistryState>,
    pub(crate) io: ReentrantMutex<()>,
    pub(crate) bus: EventBus,
    pub(crate) watcher: Mutex<Option<FileWatcher>>,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("state", &*self.state.read())
            .field("watching", &self.watcher.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl Shared {
    pub(crate) fn new(bus: EventBus) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            io: ReentrantMutex::new(()),
            bus,
            watcher: Mutex::new(None),
        }
    }

    /// Publishes a modification notice. Call without holding `state`.
    pub(crate) fn notify(&self, group: &SettingsGroup) {
        if let Err(err) = self.bus.publish(SettingsGroupModified { group: group.clone() }) {
            warn!(group = group.name(), error = %err, "Failed to publish group modification");
        }
    }
}

#[derive(Default)]
pub(crate) struct RegistryState {
    pub(crate) groups: BTreeMap<String, GroupEntry>,
    pub(crate) loader: Option<Arc<dyn Loader>>,
}

impl fmt::Debug for RegistryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryState")
            .field("groups", &self.groups.keys().collect::<Vec<_>>())
            .field("loader", &self.loader)
            .finish()
    }
}

impl RegistryState {
    pub(crate) fn entry(&self, name: &str) -> Result<&GroupEntry, ConfigError> {
        self.groups.get(name).ok_or_else(|| unknown_group(name))
    }

    pub(crate) fn entry_mut(&mut self, name: &str) -> Result<&mut GroupEntry, ConfigError> {
        self.groups.get_mut(name).ok_or_else(|| unknown_group(name))
    }

    /// Stringified defaults of every node, or the current values of dirty nodes.
    pub(crate) fn export(&self, only_defaults: bool) -> RawSettingsMap {
        let mut out = RawSettingsMap::new();
        for (name, entry) in &self.groups {
            for node in entry.schema.nodes() {
                let value = if only_defaults {
                    node.default_value()
                } else if entry.dirty.contains(node.name()) {
                    entry.effective(node)
                } else {
                    continue;
                };
                match node.serialize(&value) {
                    Ok(raw) => {
                        out.insert(qualified_key(name, node.name()), raw);
                    },
                    Err(err) => warn!(group = %name, node = node.name(), error = %err, "Value not exportable"),
                }
            }
        }
        out
    }
}

/// One group's schema and live values.
///
/// `values` holds explicit overrides only; every other node reads its default.
pub(crate) struct GroupEntry {
    pub(crate) handle: SettingsGroup,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) schema: GroupSchema,
    pub(crate) values: BTreeMap<String, Value>,
    pub(crate) dirty: BTreeSet<String>,
}

impl GroupEntry {
    pub(crate) fn effective(&self, node: &SchemaNode) -> Value {
        self.values.get(node.name()).cloned().unwrap_or_else(|| node.default_value())
    }

    pub(crate) fn snapshot(&self) -> BTreeMap<String, Value> {
        self.schema.nodes().iter().map(|n| (n.name().to_owned(), self.effective(n))).collect()
    }

    /// Stores a validated value and updates the dirty set. Returns whether the live value changed.
    pub(crate) fn assign(&mut self, node: &str, value: Value) -> bool {
        let Some(schema_node) = self.schema.node(node) else {
            return false;
        };
        let previous = self.effective(schema_node);
        let default = schema_node.default_value();

        if value == default {
            self.dirty.remove(node);
        } else {
            self.dirty.insert(node.to_owned());
        }
        let changed = previous != value;
        self.values.insert(node.to_owned(), value);
        changed
    }
}

pub(crate) fn unknown_group(name: &str) -> ConfigError {
    ConfigError::UnknownGroup { message: name.to_owned().into(), context: None }
}

pub(crate) fn unknown_node(group: &str, node: &str) -> ConfigError {
    ConfigError::UnknownNode { message: qualified_key(group, node).into(), context: None }
}
