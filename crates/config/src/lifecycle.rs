use crate::action::Action;
use crate::components::{ComponentRegistry, EventCatalog};
use crate::context::Scope;
use crate::error::ConfigError;
use crate::executor::execute;
use crate::module::Module;
use crate::options::SettingsOptions;
use crate::resolver::resolve_conflicts;
use crate::scanner::scan;
use crate::settings::{SettingsInitialized, SettingsInitializing, SettingsRegistry};
use fxhash::{FxHashMap, FxHashSet};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;
use strata_event_bus::EventBus;
use strata_storage::Loader;
use tracing::{debug, info, warn};

/// Lifecycle state of a [`ConfigContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitState {
    #[default]
    Uninitialized,
    Initializing,
    Initialized,
}

/// Process-scoped home of every registry the configuration engine mutates.
///
/// Construct one per application (or per test), run [`ConfigContext::initialize`]
/// once and call [`ConfigContext::teardown`] to start over. Dropping the context
/// stops its watcher and closes its loader.
pub struct ConfigContext {
    pending: Mutex<FxHashMap<String, Vec<Action>>>,
    loaded: Mutex<FxHashSet<String>>,
    components: ComponentRegistry,
    catalog: EventCatalog,
    settings: SettingsRegistry,
    events: EventBus,
    state: Mutex<InitState>,
}

impl fmt::Debug for ConfigContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigContext")
            .field("loaded", &self.loaded.lock().len())
            .field("components", &self.components)
            .field("catalog", &self.catalog)
            .field("settings", &self.settings)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl Default for ConfigContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigContext {
    #[must_use]
    pub fn new() -> Self {
        let events = EventBus::new();
        Self {
            pending: Mutex::new(FxHashMap::default()),
            loaded: Mutex::new(FxHashSet::default()),
            components: ComponentRegistry::new(),
            catalog: EventCatalog::new(),
            settings: SettingsRegistry::new(events.clone()),
            events,
            state: Mutex::new(InitState::Uninitialized),
        }
    }

    #[must_use]
    pub const fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    #[must_use]
    pub const fn catalog(&self) -> &EventCatalog {
        &self.catalog
    }

    #[must_use]
    pub const fn settings(&self) -> &SettingsRegistry {
        &self.settings
    }

    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    #[must_use]
    pub fn state(&self) -> InitState {
        *self.state.lock()
    }

    /// Whether `name` was loaded during this context's lifetime.
    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.lock().contains(name)
    }

    /// Runs the module's declare function unless it already ran.
    ///
    /// Returns `true` when the module was loaded by this call. A failing
    /// declare function leaves the module unloaded and discards its actions.
    ///
    /// # Errors
    /// Returns the declare function's error.
    pub fn load_module(&self, module: &Module) -> Result<bool, ConfigError> {
        if self.is_loaded(module.name()) {
            return Ok(false);
        }

        let actions = RefCell::new(Vec::new());
        if let Some(declare) = module.declare_fn() {
            let scope = Scope::module_scope(self, module.name(), &actions);
            declare(&scope)?;
        }

        let actions = actions.into_inner();
        debug!(module = module.name(), actions = actions.len(), "Module loaded");
        self.pending.lock().insert(module.name().to_owned(), actions);
        self.loaded.lock().insert(module.name().to_owned());
        Ok(true)
    }

    /// Actions a loaded module declared, in declaration order.
    #[must_use]
    pub fn pending_actions(&self, module: &str) -> Vec<Action> {
        self.pending.lock().get(module).cloned().unwrap_or_default()
    }

    /// Scans `roots`, resolves conflicts and executes the winners.
    ///
    /// Returns the number of executed actions.
    ///
    /// # Errors
    /// Returns the first scan error, [`ConfigError::Conflict`] or
    /// [`ConfigError::ActionFailed`].
    pub fn configure(&self, roots: &[Module]) -> Result<usize, ConfigError> {
        let mut seen = FxHashSet::default();
        let mut actions = Vec::new();
        for root in roots {
            actions.extend(scan(self, root, &mut seen, None)?);
        }

        let resolved = resolve_conflicts(actions)?;
        execute(self, &resolved)?;
        Ok(resolved.len())
    }

    /// Runs the declaration pipeline and brings settings online.
    ///
    /// # Errors
    /// Returns [`ConfigError::AlreadyInitialized`] unless the context is
    /// uninitialized. Any other failure rolls back every module, registration
    /// and settings group, so the same roots can be initialized again.
    /// Handlers already attached to [`ConfigContext::events`] are kept.
    pub fn initialize(&self, roots: &[Module], options: &SettingsOptions) -> Result<(), ConfigError> {
        {
            let mut state = self.state.lock();
            if *state != InitState::Uninitialized {
                return Err(ConfigError::AlreadyInitialized {
                    message: format!("context is {:?}", *state).into(),
                    context: None,
                });
            }
            *state = InitState::Initializing;
        }

        let result = self.bring_up(roots, options);
        let mut state = self.state.lock();
        match &result {
            Ok(()) => *state = InitState::Initialized,
            Err(err) => {
                warn!(error = %err, "Initialization failed");
                *state = InitState::Uninitialized;
                drop(state);
                self.reset();
            },
        }
        result
    }

    fn bring_up(&self, roots: &[Module], options: &SettingsOptions) -> Result<(), ConfigError> {
        let names: Vec<String> = roots.iter().map(|m| m.name().to_owned()).collect();
        info!(roots = ?names, "Initializing configuration");
        self.events.publish(SettingsInitializing { roots: names.clone() })?;

        let executed = self.configure(roots)?;

        let loader: Arc<dyn Loader> = Arc::new(options.storage());
        self.settings.init(Some(loader), &options.overrides)?;
        let watching = self.settings.attach_watcher(options.watch_config())?;

        info!(actions = executed, watching, "Configuration initialized");
        self.events.publish(SettingsInitialized { roots: names })?;
        Ok(())
    }

    /// Releases the loader and watcher, forgets every loaded module and
    /// registration, drops event handlers and returns to uninitialized.
    pub fn teardown(&self) {
        self.reset();
        let topics = self.events.shutdown();
        *self.state.lock() = InitState::Uninitialized;
        info!(topics, "Configuration torn down");
    }

    fn reset(&self) {
        self.settings.close();
        self.settings.clear();
        self.components.clear();
        self.catalog.clear();
        self.pending.lock().clear();
        self.loaded.lock().clear();
    }
}

impl Drop for ConfigContext {
    fn drop(&mut self) {
        self.settings.close();
    }
}
