use std::collections::BTreeMap;
use std::fmt;

/// What an [`Invalid`] refers to inside a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A single node, by name.
    Node(String),
    /// The group as a whole (chain-level validator failure).
    Group,
}

/// A single validation failure raised by a type, a node validator or a group validator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Invalid {
    target: Target,
    message: String,
}

impl Invalid {
    /// A failure without a specific target; treated as group-level when collected.
    pub fn new(message: impl Into<String>) -> Self {
        Self { target: Target::Group, message: message.into() }
    }

    pub fn node(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { target: Target::Node(name.into()), message: message.into() }
    }

    pub fn group(message: impl Into<String>) -> Self {
        Self::new(message)
    }

    #[must_use]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Re-targets the failure at `node`.
    #[must_use]
    pub fn at(mut self, node: impl Into<String>) -> Self {
        self.target = Target::Node(node.into());
        self
    }
}

/// Every failure of one deserialize pass, keyed `"group.node"` or `"group.group"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    errors: BTreeMap<String, String>,
}

impl ValidationError {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(key.into(), message.into());
    }

    pub fn merge(&mut self, other: Self) {
        self.errors.extend(other.errors);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub const fn as_map(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    #[must_use]
    pub fn into_map(self) -> BTreeMap<String, String> {
        self.errors
    }

    /// `Ok(value)` when nothing was collected.
    ///
    /// # Errors
    /// Returns `self` when at least one failure was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Invalid settings:")?;
        for (key, message) in &self.errors {
            write!(f, " {key}: {message};")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
