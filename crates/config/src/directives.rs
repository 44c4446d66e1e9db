//! Registration functions called from a module's declare function.
//!
//! Each directive checks the scope it runs in, records the call site and
//! attaches one [`Action`] to the module being loaded. Nothing takes effect
//! until the pipeline resolves and executes the collected actions.
//!
//! ```rust
//! use strata_config::{ConfigContext, ConflictKey, Module, SettingsOptions, directives};
//!
//! let app = Module::new("app").declare(|scope| {
//!     directives::action(scope, ConflictKey::from(["greeting"]), |_ctx| Ok(()))
//! });
//!
//! let ctx = ConfigContext::new();
//! ctx.initialize(&[app], &SettingsOptions::default()).unwrap();
//! assert!(ctx.is_loaded("app"));
//! ```

use crate::action::{Action, ConflictKey, Discriminator};
use crate::components::{AdapterKey, AdapterSpec, EventDescriptor};
use crate::context::{Scope, ScopeKind};
use crate::error::ConfigError;
use crate::lifecycle::ConfigContext;
use crate::settings::{GroupSpec, SettingsGroup};
use std::any::{Any, type_name};
use std::sync::Arc;
use strata_event_bus::Event;

const ACTION_SCOPES: &[ScopeKind] = &[ScopeKind::Module, ScopeKind::FunctionCall];
const ANY_SCOPE: &[ScopeKind] = &[ScopeKind::Module, ScopeKind::Class, ScopeKind::FunctionCall];

/// Attaches a plain action.
///
/// # Errors
/// Returns [`ConfigError::Scope`] outside module and function-call scope.
#[track_caller]
pub fn action(
    scope: &Scope<'_>,
    discriminator: impl Into<Discriminator>,
    f: impl Fn(&ConfigContext) -> Result<(), ConfigError> + Send + Sync + 'static,
) -> Result<(), ConfigError> {
    scope.ensure_allowed("action", ACTION_SCOPES)?;
    scope.attach(Action::new(discriminator, scope.info(), f));
    Ok(())
}

/// Describes the enclosing class type as an event.
///
/// The description comes from [`Scope::doc`] when set.
///
/// # Errors
/// Returns [`ConfigError::Scope`] outside class scope.
#[track_caller]
pub fn event(scope: &Scope<'_>, title: &str, category: &str) -> Result<(), ConfigError> {
    scope.ensure_allowed("event", &[ScopeKind::Class])?;
    let name = scope.type_name().map_or_else(|| scope.enclosing().to_owned(), str::to_owned);
    let descriptor = EventDescriptor {
        name: name.clone(),
        title: title.to_owned(),
        category: category.to_owned(),
        description: scope.doc_text().unwrap_or_default(),
    };

    scope.attach(Action::new(ConflictKey::from(["strata:event", name.as_str()]), scope.info(), move |ctx| {
        ctx.catalog().register(descriptor.clone());
        Ok(())
    }));
    Ok(())
}

/// Registers an adapter factory for an explicit provided capability.
///
/// # Errors
/// Returns [`ConfigError::AmbiguousCapability`] when `spec` names no provided
/// capability.
#[track_caller]
pub fn adapter<F: Any + Send + Sync + Clone>(
    scope: &Scope<'_>,
    spec: AdapterSpec,
    factory: F,
) -> Result<(), ConfigError> {
    scope.ensure_allowed("adapter", ANY_SCOPE)?;
    let Some(provides) = spec.provides else {
        return Err(ConfigError::AmbiguousCapability {
            message: format!(
                "adapter `{}` for [{}] must name the capability it provides",
                type_name::<F>(),
                spec.required.join(", ")
            )
            .into(),
            context: None,
        });
    };

    let key = AdapterKey { required: spec.required, provides, name: spec.name };
    let discriminator = ConflictKey::new(
        std::iter::once("strata:adapter".to_owned())
            .chain(key.required.iter().cloned())
            .chain([key.provides.clone(), key.name.clone()]),
    );

    scope.attach(Action::new(discriminator, scope.info(), move |ctx| {
        ctx.components().register_adapter(key.clone(), factory.clone());
        Ok(())
    }));
    Ok(())
}

/// Subscribes `handler` to events of type `E` on the context's bus.
///
/// # Errors
/// Returns [`ConfigError::Scope`] outside module and function-call scope.
#[track_caller]
pub fn subscriber<E: Event>(
    scope: &Scope<'_>,
    handler_name: &str,
    handler: impl Fn(&E) + Send + Sync + 'static,
) -> Result<(), ConfigError> {
    scope.ensure_allowed("subscriber", ACTION_SCOPES)?;
    let handler = Arc::new(handler);
    let key = ConflictKey::from(["strata:subscriber", handler_name, type_name::<E>()]);

    scope.attach(Action::new(key, scope.info(), move |ctx| {
        let handler = Arc::clone(&handler);
        ctx.events().on::<E>(move |event| handler(event));
        Ok(())
    }));
    Ok(())
}

/// Declares a settings group.
///
/// The group exists as soon as this returns, so the caller can keep the
/// handle; its nodes are attached when the pipeline executes.
///
/// # Errors
/// Returns [`ConfigError::Scope`] outside module scope.
#[track_caller]
pub fn settings(scope: &Scope<'_>, spec: GroupSpec) -> Result<SettingsGroup, ConfigError> {
    scope.ensure_allowed("settings", &[ScopeKind::Module])?;
    let group = scope.context().settings().register_group(spec.header())?;

    let key = ConflictKey::new(
        ["strata:settings".to_owned(), spec.name().to_owned()]
            .into_iter()
            .chain(spec.nodes().iter().map(|n| n.name().to_owned())),
    );
    scope.attach(Action::new(key, scope.info(), move |ctx| {
        ctx.settings().register_group(spec.clone())?;
        Ok(())
    }));
    Ok(group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Module;
    use std::cell::RefCell;

    struct Reloaded;

    #[test]
    fn event_requires_class_scope() {
        let ctx = ConfigContext::new();
        let actions = RefCell::new(Vec::new());
        let scope = Scope::module_scope(&ctx, "app", &actions);

        let err = event(&scope, "Reloaded", "app").unwrap_err();
        assert!(matches!(err, ConfigError::Scope { scope: ScopeKind::Module, .. }));

        scope.class::<Reloaded>(|class| event(class.doc("Fired after reload"), "Reloaded", "app")).unwrap();
        assert_eq!(actions.borrow().len(), 1);
    }

    #[test]
    fn adapter_without_capability_is_ambiguous() {
        let ctx = ConfigContext::new();
        let actions = RefCell::new(Vec::new());
        let scope = Scope::module_scope(&ctx, "app", &actions);

        let err = adapter(&scope, AdapterSpec::new().requires("db"), 1_u8).unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousCapability { .. }));
        assert!(actions.borrow().is_empty());
    }

    #[test]
    fn settings_group_exists_before_nodes_attach() {
        let ctx = ConfigContext::new();
        let module = Module::new("app").declare(|scope| {
            let group = settings(
                scope,
                GroupSpec::new("server").node(strata_schema::SchemaNode::new(
                    "port",
                    strata_schema::SchemaType::Int,
                )),
            )?;
            assert!(group.nodes()?.is_empty());
            Ok(())
        });

        ctx.configure(&[module]).unwrap();
        let group = ctx.settings().group("server").unwrap();
        assert_eq!(group.nodes().unwrap().len(), 1);
    }
}
