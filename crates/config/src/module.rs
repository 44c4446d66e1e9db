use crate::context::Scope;
use crate::error::ConfigError;
use std::fmt;
use std::sync::Arc;

/// Declares a module's actions when the module is loaded.
pub type DeclareFn = Arc<dyn Fn(&Scope<'_>) -> Result<(), ConfigError> + Send + Sync>;

/// A named unit of declarations. A module with children is a package.
///
/// Identity is the dotted name; children are renamed under their parent.
///
/// ```rust
/// use strata_config::Module;
///
/// let app = Module::new("app").child(Module::new("settings").child(Module::new("logging")));
/// let names: Vec<_> = app.descendants().iter().map(|m| m.name().to_owned()).collect();
/// assert_eq!(names, ["app.settings", "app.settings.logging"]);
/// ```
#[derive(Clone)]
pub struct Module {
    name: String,
    declare: Option<DeclareFn>,
    children: Vec<Self>,
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("declares", &self.declare.is_some())
            .field("children", &self.children)
            .finish()
    }
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), declare: None, children: Vec::new() }
    }

    #[must_use = "Module builders return the updated module"]
    pub fn declare(
        mut self,
        declare: impl Fn(&Scope<'_>) -> Result<(), ConfigError> + Send + Sync + 'static,
    ) -> Self {
        self.declare = Some(Arc::new(declare));
        self
    }

    /// Adds a child module, prefixing its name (and its descendants') with this module's name.
    #[must_use = "Module builders return the updated module"]
    pub fn child(mut self, mut child: Self) -> Self {
        let prefix = format!("{}.", self.name);
        if !child.name.starts_with(&prefix) {
            let renamed = format!("{prefix}{}", child.name);
            child.rename(renamed);
        }
        self.children.push(child);
        self
    }

    fn rename(&mut self, name: String) {
        let old_prefix = format!("{}.", self.name);
        for child in &mut self.children {
            let local = child.name.strip_prefix(&old_prefix).unwrap_or(&child.name).to_owned();
            child.rename(format!("{name}.{local}"));
        }
        self.name = name;
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_package(&self) -> bool {
        !self.children.is_empty()
    }

    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    pub(crate) fn declare_fn(&self) -> Option<&DeclareFn> {
        self.declare.as_ref()
    }

    /// Every descendant, depth-first in declaration order, without `self`.
    #[must_use]
    pub fn descendants(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        let mut stack: Vec<&Self> = self.children.iter().rev().collect();
        while let Some(module) = stack.pop() {
            out.push(module);
            stack.extend(module.children.iter().rev());
        }
        out
    }
}
