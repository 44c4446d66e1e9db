use serial_test::serial;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use strata_config::{
    ConfigContext, GroupSpec, Module, SettingsGroup, SettingsOptions, WatchSetting, directives,
};
use strata_schema::{SchemaNode, SchemaType, Value};
use strata_storage::{FileStorage, Loader};

fn app_module() -> Module {
    Module::new("app").declare(|scope| {
        directives::settings(scope, GroupSpec::new("a").node(SchemaNode::new("b", SchemaType::Int)))
            .map(|_| ())
    })
}

fn options(path: &Path, watch: WatchSetting) -> SettingsOptions {
    SettingsOptions {
        settings: Some(path.to_path_buf()),
        defaults: Some(path.to_path_buf()),
        watch,
        debounce_ms: 20,
        poll_interval_ms: 20,
        ..Default::default()
    }
}

fn wait_for(group: &SettingsGroup, expected: i64) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if group.get("b").ok() == Some(Value::Int(expected)) {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn defaults_file_reports_here() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.ini");
    fs::write(&path, "[DEFAULT]\na.b = 5\n").unwrap();

    let storage = FileStorage::builder().defaults(&path).build();
    let defaults = storage.load_defaults().unwrap();

    assert_eq!(defaults["a.b"], "5");
    assert_eq!(defaults["here"], dir.path().display().to_string());
}

#[test]
#[serial]
fn save_rewrites_default_section_and_reload_keeps_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.ini");
    fs::write(&path, "[DEFAULT]\na.b = 5\n").unwrap();

    let ctx = ConfigContext::new();
    ctx.initialize(&[app_module()], &options(&path, WatchSetting::Poll)).unwrap();
    let group = ctx.settings().group("a").unwrap();
    assert_eq!(group.get("b").unwrap(), Value::Int(5));
    assert!(ctx.settings().is_watching());

    let reloads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reloads);
    group
        .on_modified(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    group.set("b", 7).unwrap();
    ctx.settings().save().unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("[DEFAULT]\n"));
    assert!(text.contains("a.b = 7"));
    assert!(!text.contains("a.b = 5"));

    thread::sleep(Duration::from_millis(300));
    assert_eq!(group.get("b").unwrap(), Value::Int(7));
    assert!(group.dirty().unwrap().is_empty());
    assert_eq!(reloads.load(Ordering::SeqCst), 1);

    ctx.teardown();
    assert!(!ctx.settings().is_watching());
}

#[test]
#[serial]
fn external_edit_is_picked_up_by_watcher() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.ini");
    fs::write(&path, "[DEFAULT]\na.b = 5\n").unwrap();

    let ctx = ConfigContext::new();
    ctx.initialize(&[app_module()], &options(&path, WatchSetting::Native)).unwrap();
    let group = ctx.settings().group("a").unwrap();

    fs::write(&path, "[DEFAULT]\na.b = 9\n").unwrap();

    assert!(wait_for(&group, 9), "watcher did not reload the edited file");
}

#[test]
#[serial]
fn invalid_value_on_disk_keeps_previous_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.ini");
    fs::write(&path, "[DEFAULT]\na.b = 5\n").unwrap();

    let ctx = ConfigContext::new();
    ctx.initialize(&[app_module()], &options(&path, WatchSetting::Off)).unwrap();
    let group = ctx.settings().group("a").unwrap();
    assert!(!ctx.settings().is_watching());

    fs::write(&path, "[DEFAULT]\na.b = five\n").unwrap();
    ctx.settings().reload().unwrap();

    assert_eq!(group.get("b").unwrap(), Value::Int(5));
}

#[test]
#[serial]
fn broken_file_fails_initialize() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.ini");
    fs::write(&path, "[DEFAULT\nnot an entry\n").unwrap();

    let ctx = ConfigContext::new();
    let err = ctx.initialize(&[app_module()], &options(&path, WatchSetting::Off)).unwrap_err();

    assert!(matches!(err, strata_config::ConfigError::Storage { .. }));
    assert!(ctx.settings().loader().is_none());
}

#[test]
#[serial]
fn same_modules_initialize_after_broken_file_is_fixed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.ini");
    fs::write(&path, "[DEFAULT\nnot an entry\n").unwrap();

    let ctx = ConfigContext::new();
    let app = app_module();
    assert!(ctx.initialize(std::slice::from_ref(&app), &options(&path, WatchSetting::Off)).is_err());
    assert!(!ctx.is_loaded("app"));
    assert!(ctx.settings().groups().is_empty());

    fs::write(&path, "[DEFAULT]\na.b = 5\n").unwrap();
    ctx.initialize(&[app], &options(&path, WatchSetting::Off)).unwrap();

    assert_eq!(ctx.state(), strata_config::InitState::Initialized);
    assert_eq!(ctx.settings().group("a").unwrap().get("b").unwrap(), Value::Int(5));
}
