//! # Schema
//!
//! Typed schema declarations consumed by the settings registry.
//! Keep it lean: values, node types, and the validation error model. No I/O.
//!
//! A [`SchemaNode`] knows how to turn a raw string into a typed [`Value`] and back,
//! what its default is, and whether it is required. A [`GroupSchema`] bundles
//! nodes under a group name and runs a validator chain over the whole group,
//! collecting every failure into one [`ValidationError`].
//!
//! ```rust
//! use strata_schema::{GroupSchema, SchemaNode, SchemaType, Value};
//! use std::collections::BTreeMap;
//!
//! let mut schema = GroupSchema::new("server");
//! schema.add_node(SchemaNode::new("port", SchemaType::Int).default(8080)).unwrap();
//!
//! let raw = BTreeMap::from([("server.port".to_owned(), "9000".to_owned())]);
//! let values = schema.deserialize(&raw).unwrap();
//! assert_eq!(values["port"], Value::Int(9000));
//! ```

mod group;
mod invalid;
mod node;
mod types;
mod value;

pub use group::{GroupSchema, GroupValidator};
pub use invalid::{Invalid, Target, ValidationError};
pub use node::{NodeValidator, SchemaNode};
pub use types::SchemaType;
pub use value::Value;

use std::collections::BTreeMap;

/// Flat `"group.node" -> string` map, the raw form of settings.
pub type RawValues = BTreeMap<String, String>;

/// Builds the flat `"group.node"` key used in raw maps and error reports.
#[must_use]
pub fn qualified_key(group: &str, node: &str) -> String {
    format!("{group}.{node}")
}

/// Splits a `"group.node"` key at the first dot.
///
/// Returns `None` when either side would be empty.
#[must_use]
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    key.split_once('.').filter(|(group, node)| !group.is_empty() && !node.is_empty())
}
