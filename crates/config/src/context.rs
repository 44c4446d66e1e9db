//! Declaration context: who declared an action and from where.
//!
//! Locations are captured at the call site with `#[track_caller]`; nothing
//! here inspects the runtime stack.

use crate::action::Action;
use crate::error::ConfigError;
use crate::lifecycle::ConfigContext;
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::panic::Location;

/// The kind of scope a directive runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeKind {
    /// Top level of a module's declare function.
    Module,
    /// Inside a type declaration opened with [`Scope::class`].
    Class,
    /// Inside a function opened with [`Scope::function`].
    FunctionCall,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::FunctionCall => "function call",
        })
    }
}

/// File, line and column of a directive call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceLocation {
    file: Cow<'static, str>,
    line: u32,
    column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<Cow<'static, str>>, line: u32, column: u32) -> Self {
        Self { file: file.into(), line, column }
    }

    /// Location of the caller, propagated through `#[track_caller]` frames.
    #[track_caller]
    #[must_use]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self::new(location.file(), location.line(), location.column())
    }

    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }

    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Diagnostic record attached to every action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationInfo {
    scope: ScopeKind,
    module: String,
    enclosing: String,
    location: SourceLocation,
    source: Option<String>,
}

impl DeclarationInfo {
    pub fn new(
        scope: ScopeKind,
        module: impl Into<String>,
        enclosing: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Self {
            scope,
            module: module.into(),
            enclosing: enclosing.into(),
            location,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub const fn scope(&self) -> ScopeKind {
        self.scope
    }

    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Module name, type name or function name, depending on the scope.
    #[must_use]
    pub fn enclosing(&self) -> &str {
        &self.enclosing
    }

    #[must_use]
    pub const fn location(&self) -> &SourceLocation {
        &self.location
    }

    /// Declaration file; the resolver's precedence key.
    #[must_use]
    pub fn file(&self) -> &str {
        self.location.file()
    }

    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

/// The value handed to a module's declare function.
///
/// Directives read the current [`ScopeKind`] from it, check it against the
/// scopes they allow and attach their actions to the owning module.
pub struct Scope<'a> {
    ctx: &'a ConfigContext,
    module: &'a str,
    kind: ScopeKind,
    enclosing: String,
    type_name: Option<&'static str>,
    actions: &'a RefCell<Vec<Action>>,
    source: RefCell<Option<String>>,
    doc: RefCell<Option<String>>,
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("module", &self.module)
            .field("kind", &self.kind)
            .field("enclosing", &self.enclosing)
            .field("attached", &self.actions.borrow().len())
            .finish_non_exhaustive()
    }
}

impl<'a> Scope<'a> {
    pub(crate) fn module_scope(
        ctx: &'a ConfigContext,
        module: &'a str,
        actions: &'a RefCell<Vec<Action>>,
    ) -> Self {
        Self {
            ctx,
            module,
            kind: ScopeKind::Module,
            enclosing: module.to_owned(),
            type_name: None,
            actions,
            source: RefCell::new(None),
            doc: RefCell::new(None),
        }
    }

    fn nested(&self, kind: ScopeKind, enclosing: String, type_name: Option<&'static str>) -> Self {
        Self {
            ctx: self.ctx,
            module: self.module,
            kind,
            enclosing,
            type_name,
            actions: self.actions,
            source: RefCell::new(None),
            doc: RefCell::new(None),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Dotted name of the module being loaded.
    #[must_use]
    pub const fn module_name(&self) -> &'a str {
        self.module
    }

    #[must_use]
    pub fn enclosing(&self) -> &str {
        &self.enclosing
    }

    /// Full type name in class scope.
    #[must_use]
    pub const fn type_name(&self) -> Option<&'static str> {
        self.type_name
    }

    #[must_use]
    pub const fn context(&self) -> &'a ConfigContext {
        self.ctx
    }

    /// Opens a class scope for `T`.
    ///
    /// # Errors
    /// Propagates the error returned by `declare`.
    pub fn class<T: ?Sized + 'static>(
        &self,
        declare: impl FnOnce(&Scope<'_>) -> Result<(), ConfigError>,
    ) -> Result<(), ConfigError> {
        let full = std::any::type_name::<T>();
        let scope = self.nested(ScopeKind::Class, short_type_name(full).to_owned(), Some(full));
        declare(&scope)
    }

    /// Opens a function-call scope named `name`.
    ///
    /// # Errors
    /// Propagates the error returned by `declare`.
    pub fn function(
        &self,
        name: &str,
        declare: impl FnOnce(&Scope<'_>) -> Result<(), ConfigError>,
    ) -> Result<(), ConfigError> {
        let scope = self.nested(ScopeKind::FunctionCall, name.to_owned(), None);
        declare(&scope)
    }

    /// Source text recorded with the next declaration, shown in conflict reports.
    pub fn with_source(&self, text: impl Into<String>) -> &Self {
        *self.source.borrow_mut() = Some(text.into());
        self
    }

    /// Human-readable description of the enclosing type.
    pub fn doc(&self, text: impl Into<String>) -> &Self {
        *self.doc.borrow_mut() = Some(text.into());
        self
    }

    pub(crate) fn doc_text(&self) -> Option<String> {
        self.doc.borrow().clone()
    }

    /// Builds the declaration record for a directive called from the caller's location.
    #[track_caller]
    #[must_use]
    pub fn info(&self) -> DeclarationInfo {
        let info =
            DeclarationInfo::new(self.kind, self.module, &self.enclosing, SourceLocation::caller());
        match self.source.borrow_mut().take() {
            Some(source) => info.with_source(source),
            None => info,
        }
    }

    /// Fails unless the current scope kind is one of `allowed`.
    ///
    /// # Errors
    /// Returns [`ConfigError::Scope`].
    pub fn ensure_allowed(
        &self,
        directive: &'static str,
        allowed: &[ScopeKind],
    ) -> Result<(), ConfigError> {
        if allowed.contains(&self.kind) {
            Ok(())
        } else {
            Err(ConfigError::Scope { directive: directive.into(), scope: self.kind, context: None })
        }
    }

    /// Queues `action` on the module being loaded.
    pub fn attach(&self, action: Action) {
        self.actions.borrow_mut().push(action);
    }
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;

    #[test]
    fn caller_location_points_at_call_site() {
        let here = line!() + 1;
        let location = SourceLocation::caller();
        assert_eq!(location.line(), here);
        assert!(location.file().ends_with("context.rs"));
    }

    #[test]
    fn nested_scopes_report_kind_and_enclosing_name() {
        let ctx = ConfigContext::new();
        let actions = RefCell::new(Vec::new());
        let scope = Scope::module_scope(&ctx, "app.settings", &actions);

        assert_eq!(scope.kind(), ScopeKind::Module);
        assert_eq!(scope.enclosing(), "app.settings");

        scope
            .class::<Widget>(|class| {
                assert_eq!(class.kind(), ScopeKind::Class);
                assert_eq!(class.enclosing(), "Widget");
                assert!(class.type_name().is_some_and(|n| n.ends_with("Widget")));
                class.function("build", |func| {
                    assert_eq!(func.kind(), ScopeKind::FunctionCall);
                    assert_eq!(func.enclosing(), "build");
                    Ok(())
                })
            })
            .unwrap();
    }

    #[test]
    fn info_takes_pending_source_once() {
        let ctx = ConfigContext::new();
        let actions = RefCell::new(Vec::new());
        let scope = Scope::module_scope(&ctx, "app", &actions);

        let first = scope.with_source("action(register)").info();
        let second = scope.info();

        assert_eq!(first.source(), Some("action(register)"));
        assert_eq!(second.source(), None);
        assert_eq!(first.module(), "app");
    }

    #[test]
    fn ensure_allowed_rejects_other_scopes() {
        let ctx = ConfigContext::new();
        let actions = RefCell::new(Vec::new());
        let scope = Scope::module_scope(&ctx, "app", &actions);

        assert!(scope.ensure_allowed("action", &[ScopeKind::Module]).is_ok());
        let err = scope.ensure_allowed("event", &[ScopeKind::Class]).unwrap_err();
        assert_eq!(err.to_string(), "Directive `event` is not allowed in module scope");
    }

    #[test]
    fn short_type_name_strips_paths_and_generics() {
        assert_eq!(short_type_name("app::events::Saved"), "Saved");
        assert_eq!(short_type_name("app::Wrapper<core::option::Option<u8>>"), "Wrapper");
    }
}
