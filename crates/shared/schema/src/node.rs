use crate::invalid::Invalid;
use crate::types::SchemaType;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Per-node validator run after type coercion.
pub type NodeValidator = Arc<dyn Fn(&Value) -> Result<(), Invalid> + Send + Sync>;

/// One typed setting inside a group.
#[derive(Clone)]
pub struct SchemaNode {
    name: String,
    kind: SchemaType,
    default: Option<Value>,
    required: bool,
    title: String,
    description: String,
    validator: Option<NodeValidator>,
}

impl fmt::Debug for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaNode")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("required", &self.required)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

impl SchemaNode {
    pub fn new(name: impl Into<String>, kind: SchemaType) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            required: false,
            title: String::new(),
            description: String::new(),
            validator: None,
        }
    }

    #[must_use = "SchemaNode builders return the updated node"]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use = "SchemaNode builders return the updated node"]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use = "SchemaNode builders return the updated node"]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use = "SchemaNode builders return the updated node"]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use = "SchemaNode builders return the updated node"]
    pub fn validator(
        mut self,
        validator: impl Fn(&Value) -> Result<(), Invalid> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> SchemaType {
        self.kind
    }

    #[must_use]
    pub fn get_title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn get_description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// The explicitly declared (or reassigned) default, if any.
    #[must_use]
    pub const fn declared_default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Effective default: the declared one, else the type default. Never absent.
    #[must_use]
    pub fn default_value(&self) -> Value {
        self.default
            .clone()
            .and_then(|v| self.kind.coerce(v).ok())
            .unwrap_or_else(|| self.kind.type_default())
    }

    /// Replaces the declared default, e.g. with a value from a defaults file.
    pub fn set_default(&mut self, value: Value) {
        self.default = Some(value);
    }

    /// Coerces `value` into the node type and runs the node validator.
    ///
    /// # Errors
    /// Returns [`Invalid`] targeted at this node.
    pub fn validate(&self, value: Value) -> Result<Value, Invalid> {
        let value = self.kind.coerce(value).map_err(|e| e.at(&self.name))?;
        if let Some(validator) = &self.validator {
            validator(&value).map_err(|e| e.at(&self.name))?;
        }
        Ok(value)
    }

    /// Parses the raw string form and validates it.
    ///
    /// # Errors
    /// Returns [`Invalid`] targeted at this node.
    pub fn deserialize(&self, raw: &str) -> Result<Value, Invalid> {
        let value = self.kind.deserialize(raw).map_err(|e| e.at(&self.name))?;
        self.validate(value)
    }

    /// Renders `value` into the raw string form.
    ///
    /// # Errors
    /// Returns [`Invalid`] when `value` does not fit the node type.
    pub fn serialize(&self, value: &Value) -> Result<String, Invalid> {
        self.kind.serialize(value).map_err(|e| e.at(&self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invalid::Target;

    #[test]
    fn default_value_falls_back_to_type_default() {
        let node = SchemaNode::new("retries", SchemaType::Int);
        assert_eq!(node.default_value(), Value::Int(0));

        let node = node.default(3);
        assert_eq!(node.default_value(), Value::Int(3));
    }

    #[test]
    fn deserialize_runs_validator() {
        let node = SchemaNode::new("port", SchemaType::Int).validator(|v| match v.as_int() {
            Some(p) if p > 0 && p < 65536 => Ok(()),
            _ => Err(Invalid::new("out of range")),
        });

        assert_eq!(node.deserialize("80").ok(), Some(Value::Int(80)));
        let err = node.deserialize("70000").expect_err("out of range");
        assert_eq!(err.target(), &Target::Node("port".to_owned()));
        assert_eq!(err.message(), "out of range");
    }
}
