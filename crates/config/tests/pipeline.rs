use fxhash::FxHashSet;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use strata_config::scanner::scan;
use strata_config::{
    AdapterSpec, ConfigContext, ConfigError, ConflictKey, Discriminator, GroupSpec, InitState,
    Module, ScopeKind, SettingsInitialized, SettingsInitializing, SettingsOptions, directives,
};
use strata_schema::{SchemaNode, SchemaType, Value};

fn recording(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Module {
    let log = Arc::clone(log);
    let label = name.to_owned();
    Module::new(name).declare(move |scope| {
        let log = Arc::clone(&log);
        let label = label.clone();
        directives::action(scope, Discriminator::None, move |_| {
            log.lock().push(label.clone());
            Ok(())
        })
    })
}

fn tree(log: &Arc<Mutex<Vec<String>>>) -> Module {
    recording("app", log)
        .child(recording("web", log).child(recording("views", log)))
        .child(recording("jobs", log))
}

#[test]
fn scan_visits_descendants_depth_first_once() {
    let ctx = ConfigContext::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let root = tree(&log);
    let mut seen = FxHashSet::default();

    let first = scan(&ctx, &root, &mut seen, None).unwrap();
    let again = scan(&ctx, &root, &mut seen, None).unwrap();

    assert_eq!(first.len(), 4);
    assert!(again.is_empty());
    let modules: Vec<&str> = first.iter().map(|a| a.info().module()).collect();
    assert_eq!(modules, ["app", "app.web", "app.web.views", "app.jobs"]);
}

#[test]
fn scan_exclude_skips_module_but_not_root() {
    let ctx = ConfigContext::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let root = tree(&log);
    let mut seen = FxHashSet::default();
    let keep = |name: &str| name != "app.web" && name != "app";

    let actions = scan(&ctx, &root, &mut seen, Some(&keep)).unwrap();

    let modules: Vec<&str> = actions.iter().map(|a| a.info().module()).collect();
    assert_eq!(modules, ["app", "app.web.views", "app.jobs"]);
    assert!(!ctx.is_loaded("app.web"));
}

#[test]
fn configure_executes_in_declaration_order() {
    let ctx = ConfigContext::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let executed = ctx.configure(&[tree(&log)]).unwrap();

    assert_eq!(executed, 4);
    assert_eq!(*log.lock(), ["app", "web", "views", "jobs"]);
}

#[test]
fn action_in_class_scope_is_rejected() {
    struct Handler;
    let ctx = ConfigContext::new();
    let module = Module::new("app").declare(|scope| {
        scope.class::<Handler>(|class| directives::action(class, Discriminator::None, |_| Ok(())))
    });

    let err = ctx.configure(&[module]).unwrap_err();
    assert!(matches!(err, ConfigError::Scope { scope: ScopeKind::Class, .. }));
    assert!(!ctx.is_loaded("app"));
}

#[test]
fn settings_directive_requires_module_scope() {
    let ctx = ConfigContext::new();
    let module = Module::new("app").declare(|scope| {
        scope.function("setup", |func| directives::settings(func, GroupSpec::new("g")).map(|_| ()))
    });

    let err = ctx.configure(&[module]).unwrap_err();
    assert!(matches!(err, ConfigError::Scope { scope: ScopeKind::FunctionCall, .. }));
}

#[test]
fn adapter_needs_explicit_capability() {
    let ctx = ConfigContext::new();
    let module = Module::new("app").declare(|scope| directives::adapter(scope, AdapterSpec::new().requires("db"), 1_u32));

    let err = ctx.configure(&[module]).unwrap_err();
    assert!(matches!(err, ConfigError::AmbiguousCapability { .. }));
}

#[test]
fn adapters_and_events_register_on_execution() {
    struct Saved;
    let ctx = ConfigContext::new();
    let module = Module::new("app").declare(|scope| {
        directives::adapter(scope, AdapterSpec::new().requires("db").provides("repo").named("sql"), 7_u32)?;
        scope.class::<Saved>(|class| directives::event(class.doc("Emitted after save"), "Saved", "storage"))
    });

    ctx.configure(&[module]).unwrap();

    let factory = ctx.components().lookup_adapter::<u32>(&["db"], "repo", "sql");
    assert_eq!(factory.as_deref(), Some(&7));
    let descriptor = ctx.catalog().descriptors().into_iter().next().unwrap();
    assert!(descriptor.name.ends_with("Saved"));
    assert_eq!(descriptor.category, "storage");
    assert_eq!(descriptor.description, "Emitted after save");
}

#[test]
fn subscriber_receives_published_events() {
    #[derive(Debug)]
    struct Ping(u32);

    let ctx = ConfigContext::new();
    let total = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&total);
    let module = Module::new("app").declare(move |scope| {
        let sink = Arc::clone(&sink);
        directives::subscriber::<Ping>(scope, "count", move |ping| {
            sink.fetch_add(ping.0 as usize, Ordering::SeqCst);
        })
    });

    ctx.configure(&[module]).unwrap();
    ctx.events().publish(Ping(3)).unwrap();

    assert_eq!(total.load(Ordering::SeqCst), 3);
}

#[test]
fn same_key_in_one_file_is_a_conflict() {
    let ctx = ConfigContext::new();
    let module = Module::new("app").declare(|scope| {
        directives::action(scope, ConflictKey::from(["slot"]), |_| Ok(()))?;
        directives::action(scope, ConflictKey::from(["slot"]), |_| Ok(()))
    });

    let err = ctx.configure(&[module]).unwrap_err();
    let ConfigError::Conflict { report, .. } = err else {
        panic!("expected a conflict");
    };
    let locations = report.locations(&ConflictKey::from(["slot"])).unwrap();
    assert_eq!(locations.len(), 2);
    assert!(locations[0].file().ends_with("pipeline.rs"));
}

#[test]
fn failing_action_reports_its_key() {
    let ctx = ConfigContext::new();
    let ran_after = Arc::new(AtomicUsize::new(0));
    let after = Arc::clone(&ran_after);
    let module = Module::new("app").declare(move |scope| {
        directives::action(scope, ConflictKey::from(["broken"]), |_| Err(ConfigError::from("boom")))?;
        let after = Arc::clone(&after);
        directives::action(scope, ConflictKey::from(["later"]), move |_| {
            after.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    });

    let err = ctx.configure(&[module]).unwrap_err();
    assert!(matches!(&err, ConfigError::ActionFailed { key, .. } if key == "(broken)"));
    assert_eq!(ran_after.load(Ordering::SeqCst), 0);
}

#[test]
fn initialize_runs_once_and_publishes_lifecycle_events() {
    let ctx = ConfigContext::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let on_start = Arc::clone(&seen);
    let on_done = Arc::clone(&seen);
    ctx.events().on::<SettingsInitializing>(move |e| on_start.lock().push(format!("start {:?}", e.roots)));
    ctx.events().on::<SettingsInitialized>(move |e| on_done.lock().push(format!("done {:?}", e.roots)));

    let app = Module::new("app").declare(|scope| {
        directives::settings(
            scope,
            GroupSpec::new("server").node(SchemaNode::new("port", SchemaType::Int).default(80)),
        )
        .map(|_| ())
    });
    let options = SettingsOptions { overrides: [("server.port".to_owned(), "8080".to_owned())].into(), ..Default::default() };

    ctx.initialize(&[app], &options).unwrap();

    assert_eq!(ctx.state(), InitState::Initialized);
    assert_eq!(*seen.lock(), ["start [\"app\"]", "done [\"app\"]"]);
    let server = ctx.settings().group("server").unwrap();
    assert_eq!(server.get("port").unwrap(), Value::Int(8080));

    let err = ctx.initialize(&[], &options).unwrap_err();
    assert!(matches!(err, ConfigError::AlreadyInitialized { .. }));
}

#[test]
fn failed_initialize_can_be_retried() {
    let ctx = ConfigContext::new();
    let broken = Module::new("broken").declare(|scope| {
        directives::action(scope, ConflictKey::from(["x"]), |_| Err(ConfigError::from("nope")))
    });

    assert!(ctx.initialize(&[broken], &SettingsOptions::default()).is_err());
    assert_eq!(ctx.state(), InitState::Uninitialized);

    ctx.initialize(&[Module::new("fine")], &SettingsOptions::default()).unwrap();
    assert_eq!(ctx.state(), InitState::Initialized);
}
