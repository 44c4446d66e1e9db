use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use strata_schema::{GroupSchema, GroupValidator, Invalid, SchemaNode, Value};

/// Declaration of a settings group: nodes, metadata and validators.
///
/// ```rust
/// use strata_config::GroupSpec;
/// use strata_schema::{SchemaNode, SchemaType};
///
/// let spec = GroupSpec::new("server")
///     .title("Server")
///     .node(SchemaNode::new("port", SchemaType::Int).default(8080));
/// assert_eq!(spec.nodes().len(), 1);
/// ```
#[derive(Clone)]
pub struct GroupSpec {
    name: String,
    title: String,
    description: String,
    nodes: Vec<SchemaNode>,
    validators: Vec<GroupValidator>,
}

impl fmt::Debug for GroupSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupSpec")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("nodes", &self.nodes)
            .field("validators", &self.validators.len())
            .finish_non_exhaustive()
    }
}

impl GroupSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: String::new(),
            description: String::new(),
            nodes: Vec::new(),
            validators: Vec::new(),
        }
    }

    #[must_use = "GroupSpec builders return the updated spec"]
    pub fn node(mut self, node: SchemaNode) -> Self {
        self.nodes.push(node);
        self
    }

    #[must_use = "GroupSpec builders return the updated spec"]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use = "GroupSpec builders return the updated spec"]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a chain-level validator run over the whole deserialized group.
    #[must_use = "GroupSpec builders return the updated spec"]
    pub fn validator(
        mut self,
        validator: impl Fn(&GroupSchema, &BTreeMap<String, Value>) -> Result<(), Invalid>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn nodes(&self) -> &[SchemaNode] {
        &self.nodes
    }

    /// Metadata only; nodes and validators are attached later.
    pub(crate) fn header(&self) -> Self {
        Self {
            name: self.name.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            nodes: Vec::new(),
            validators: Vec::new(),
        }
    }

    pub(crate) fn into_parts(self) -> (String, String, String, Vec<SchemaNode>, Vec<GroupValidator>) {
        (self.name, self.title, self.description, self.nodes, self.validators)
    }
}
