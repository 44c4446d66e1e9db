use crate::invalid::{Invalid, Target, ValidationError};
use crate::node::SchemaNode;
use crate::value::Value;
use crate::{RawValues, qualified_key};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Chain-level validator receiving the fully deserialized node values.
pub type GroupValidator =
    Arc<dyn Fn(&GroupSchema, &BTreeMap<String, Value>) -> Result<(), Invalid> + Send + Sync>;

/// The schema of one settings group: ordered nodes plus a validator chain.
#[derive(Clone)]
pub struct GroupSchema {
    name: String,
    nodes: Vec<SchemaNode>,
    validators: Vec<GroupValidator>,
}

impl fmt::Debug for GroupSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupSchema")
            .field("name", &self.name)
            .field("nodes", &self.nodes)
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl GroupSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), nodes: Vec::new(), validators: Vec::new() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn nodes(&self) -> &[SchemaNode] {
        &self.nodes
    }

    #[must_use]
    pub fn node(&self, name: &str) -> Option<&SchemaNode> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut SchemaNode> {
        self.nodes.iter_mut().find(|n| n.name() == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.node(name).is_some()
    }

    /// Appends a node, keeping declaration order.
    ///
    /// # Errors
    /// Returns [`Invalid`] targeted at the node when its name is already taken.
    pub fn add_node(&mut self, node: SchemaNode) -> Result<(), Invalid> {
        if self.contains(node.name()) {
            return Err(Invalid::node(node.name(), "Node already exists in group"));
        }
        self.nodes.push(node);
        Ok(())
    }

    pub fn add_validator(&mut self, validator: GroupValidator) {
        self.validators.push(validator);
    }

    /// Effective defaults of every node.
    #[must_use]
    pub fn defaults(&self) -> BTreeMap<String, Value> {
        self.nodes.iter().map(|n| (n.name().to_owned(), n.default_value())).collect()
    }

    /// Deserializes every node from a flat `"group.node"` map and runs the validator chain.
    ///
    /// Missing optional nodes take their default; missing required nodes without a
    /// declared default fail. All failures of the pass are collected.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] with one entry per failing node plus one
    /// `"<group>.<group>"` entry per chain-level failure.
    pub fn deserialize(&self, raw: &RawValues) -> Result<BTreeMap<String, Value>, ValidationError> {
        let mut errors = ValidationError::new();
        let mut values = BTreeMap::new();

        for node in &self.nodes {
            let key = qualified_key(&self.name, node.name());
            let parsed = match raw.get(&key) {
                Some(raw) => node.deserialize(raw),
                None if node.is_required() && node.declared_default().is_none() => {
                    Err(Invalid::node(node.name(), "Required"))
                },
                None => Ok(node.default_value()),
            };
            match parsed {
                Ok(value) => {
                    values.insert(node.name().to_owned(), value);
                },
                Err(invalid) => self.record(&mut errors, &invalid),
            }
        }

        if errors.is_empty() {
            for validator in &self.validators {
                if let Err(invalid) = validator(self, &values) {
                    self.record(&mut errors, &invalid);
                }
            }
        }

        errors.into_result(values)
    }

    /// Renders values into the flat raw form, skipping values that do not fit their node.
    #[must_use]
    pub fn serialize(&self, values: &BTreeMap<String, Value>) -> RawValues {
        self.nodes
            .iter()
            .filter_map(|node| {
                let value = values.get(node.name())?;
                let raw = node.serialize(value).ok()?;
                Some((qualified_key(&self.name, node.name()), raw))
            })
            .collect()
    }

    fn record(&self, errors: &mut ValidationError, invalid: &Invalid) {
        let key = match invalid.target() {
            Target::Node(node) => qualified_key(&self.name, node),
            Target::Group => qualified_key(&self.name, &self.name),
        };
        errors.insert(key, invalid.message());
    }
}
