use crate::error::ConfigError;
use crate::settings::events::SettingsGroupModified;
use crate::settings::state::{GroupEntry, Shared, unknown_group, unknown_node};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Weak};
use strata_event_bus::HandlerId;
use strata_schema::{GroupSchema, Invalid, SchemaNode, Target, ValidationError, Value, qualified_key};
use strata_storage::RawSettingsMap;

const CATEGORY_PREFIX: &str = "strata.settings";

struct GroupInner {
    name: String,
    category: String,
    shared: Weak<Shared>,
}

/// Handle to one named settings group.
///
/// Cloning is cheap and every clone refers to the same group; compare with
/// [`SettingsGroup::same_as`]. Key-style (`get`/`set`) and attribute-style
/// ([`SettingsGroup::node`]) access are two views over the same state.
#[derive(Clone)]
pub struct SettingsGroup {
    inner: Arc<GroupInner>,
}

impl fmt::Debug for SettingsGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsGroup")
            .field("name", &self.inner.name)
            .field("category", &self.inner.category)
            .finish_non_exhaustive()
    }
}

impl SettingsGroup {
    pub(crate) fn new(name: &str, shared: Weak<Shared>) -> Self {
        Self {
            inner: Arc::new(GroupInner {
                name: name.to_owned(),
                category: format!("{CATEGORY_PREFIX}.{name}"),
                shared,
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Token carried by this group's modification notices.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.inner.category
    }

    /// Whether both handles refer to the same group instance.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn shared(&self) -> Result<Arc<Shared>, ConfigError> {
        self.inner.shared.upgrade().ok_or_else(|| unknown_group(&self.inner.name))
    }

    fn read<R>(&self, f: impl FnOnce(&GroupEntry) -> R) -> Result<R, ConfigError> {
        let shared = self.shared()?;
        let state = shared.state.read();
        let entry = state.entry(&self.inner.name)?;
        Ok(f(entry))
    }

    /// Applies `f` under the registry lock and notifies when it reports a change.
    ///
    /// Waits for an in-flight reload or save, so a write never lands between
    /// a reload's read and its apply.
    fn write(
        &self,
        f: impl FnOnce(&mut GroupEntry) -> Result<bool, ConfigError>,
    ) -> Result<(), ConfigError> {
        let shared = self.shared()?;
        let _io = shared.io.lock();
        let changed = {
            let mut state = shared.state.write();
            f(state.entry_mut(&self.inner.name)?)?
        };
        if changed {
            shared.notify(self);
        }
        Ok(())
    }

    /// # Errors
    /// Returns [`ConfigError::UnknownGroup`] once the registry dropped the group.
    pub fn title(&self) -> Result<String, ConfigError> {
        self.read(|entry| entry.title.clone())
    }

    /// # Errors
    /// Returns [`ConfigError::UnknownGroup`] once the registry dropped the group.
    pub fn description(&self) -> Result<String, ConfigError> {
        self.read(|entry| entry.description.clone())
    }

    /// Schema nodes in declaration order.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownGroup`] once the registry dropped the group.
    pub fn nodes(&self) -> Result<Vec<SchemaNode>, ConfigError> {
        self.read(|entry| entry.schema.nodes().to_vec())
    }

    /// # Errors
    /// Returns [`ConfigError::UnknownGroup`] once the registry dropped the group.
    pub fn schema(&self) -> Result<GroupSchema, ConfigError> {
        self.read(|entry| entry.schema.clone())
    }

    /// Live value of `key`: override, else node default, else type default.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownNode`] for names outside the schema.
    pub fn get(&self, key: &str) -> Result<Value, ConfigError> {
        self.read(|entry| {
            entry
                .schema
                .node(key)
                .map(|node| entry.effective(node))
                .ok_or_else(|| unknown_node(&self.inner.name, key))
        })?
    }

    /// Validates and stores `value`, marks the node dirty when it differs from
    /// the default and notifies subscribers when the live value changed.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownNode`] or [`ConfigError::Validation`].
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        let value = value.into();
        self.write(|entry| {
            let node = entry.schema.node(key).ok_or_else(|| unknown_node(&self.inner.name, key))?;
            let value = node.validate(value).map_err(|e| validation(&self.inner.name, &e))?;
            Ok(entry.assign(key, value))
        })
    }

    /// Like [`SettingsGroup::set`], parsing the raw string form first.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownNode`] or [`ConfigError::Validation`].
    pub fn set_raw(&self, key: &str, raw: &str) -> Result<(), ConfigError> {
        self.write(|entry| {
            let node = entry.schema.node(key).ok_or_else(|| unknown_node(&self.inner.name, key))?;
            let value = node.deserialize(raw).map_err(|e| validation(&self.inner.name, &e))?;
            Ok(entry.assign(key, value))
        })
    }

    /// Attribute-style accessor for one node.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownNode`] for names outside the schema.
    pub fn node(&self, name: &str) -> Result<NodeHandle, ConfigError> {
        self.read(|entry| entry.schema.contains(name))?
            .then(|| NodeHandle { group: self.clone(), name: name.to_owned() })
            .ok_or_else(|| unknown_node(&self.inner.name, name))
    }

    /// Live values of every node.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownGroup`] once the registry dropped the group.
    pub fn values(&self) -> Result<BTreeMap<String, Value>, ConfigError> {
        self.read(GroupEntry::snapshot)
    }

    /// Current schema defaults of every node.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownGroup`] once the registry dropped the group.
    pub fn defaults(&self) -> Result<BTreeMap<String, Value>, ConfigError> {
        self.read(|entry| entry.schema.defaults())
    }

    /// Nodes changed locally since the last clear or save.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownGroup`] once the registry dropped the group.
    pub fn dirty(&self) -> Result<BTreeSet<String>, ConfigError> {
        self.read(|entry| entry.dirty.clone())
    }

    /// Resets every node to its current default and forgets local changes.
    /// Storage is not touched.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownGroup`] once the registry dropped the group.
    pub fn clear(&self) -> Result<(), ConfigError> {
        self.write(|entry| {
            let before = entry.snapshot();
            entry.values.clear();
            entry.dirty.clear();
            Ok(entry.snapshot() != before)
        })
    }

    /// Deserializes this group's `"group.node"` keys of `raw` and runs the
    /// validator chain, collecting every failure.
    ///
    /// # Errors
    /// Returns [`ConfigError::Validation`] with all node and group failures.
    pub fn deserialize(&self, raw: &RawSettingsMap) -> Result<BTreeMap<String, Value>, ConfigError> {
        self.read(|entry| entry.schema.deserialize(raw))?
            .map_err(|source| ConfigError::Validation { source, context: None })
    }

    /// Calls `handler` after every change of this group's live values.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownGroup`] once the registry dropped the group.
    pub fn on_modified(
        &self,
        handler: impl Fn(&Self) + Send + Sync + 'static,
    ) -> Result<HandlerId, ConfigError> {
        let shared = self.shared()?;
        let category = self.inner.category.clone();
        Ok(shared.bus.on::<SettingsGroupModified>(move |event| {
            if event.group.category() == category {
                handler(&event.group);
            }
        }))
    }
}

/// Attribute-style view of one node of a [`SettingsGroup`].
#[derive(Debug, Clone)]
pub struct NodeHandle {
    group: SettingsGroup,
    name: String,
}

impl NodeHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// # Errors
    /// See [`SettingsGroup::get`].
    pub fn value(&self) -> Result<Value, ConfigError> {
        self.group.get(&self.name)
    }

    /// # Errors
    /// See [`SettingsGroup::set`].
    pub fn set(&self, value: impl Into<Value>) -> Result<(), ConfigError> {
        self.group.set(&self.name, value)
    }

    /// The live value converted to `T`.
    ///
    /// # Errors
    /// Returns [`ConfigError::Validation`] when the value is not a `T`.
    pub fn get_as<T>(&self) -> Result<T, ConfigError>
    where
        T: TryFrom<Value, Error = Invalid>,
    {
        T::try_from(self.value()?).map_err(|e| validation(self.group.name(), &e.at(&self.name)))
    }
}

fn validation(group: &str, invalid: &Invalid) -> ConfigError {
    let key = match invalid.target() {
        Target::Node(node) => qualified_key(group, node),
        Target::Group => qualified_key(group, group),
    };
    let mut source = ValidationError::new();
    source.insert(key, invalid.message());
    ConfigError::Validation { source, context: None }
}
