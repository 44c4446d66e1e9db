use std::fs;
use std::path::Path;
use strata_storage::{FileStorage, HERE_KEY, Loader, RawSettingsMap, StorageError};
use tempfile::TempDir;

fn raw(pairs: &[(&str, &str)]) -> RawSettingsMap {
    pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
}

fn with_here(dir: &Path, pairs: &[(&str, &str)]) -> RawSettingsMap {
    let mut map = raw(pairs);
    map.insert(HERE_KEY.to_owned(), dir.display().to_string());
    map
}

#[test]
fn no_paths_is_a_no_op() {
    let fs = FileStorage::builder().build();
    assert!(fs.load().unwrap().is_empty());
    assert!(fs.load_defaults().unwrap().is_empty());
    fs.save(&raw(&[("group.node1", "test")])).unwrap();
    fs.close();
}

#[test]
fn missing_defaults_file_is_empty() {
    let dir = TempDir::new().unwrap();
    let fs = FileStorage::builder().defaults(dir.path().join("defaults.cfg")).build();
    assert!(fs.load_defaults().unwrap().is_empty());
}

#[test]
fn defaults_read_the_default_section() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("defaults.cfg");
    fs::write(&path, "[DEFAULT]\ngroup.node1 = test\ngroup.node2 = 40").unwrap();

    let fs = FileStorage::builder().defaults(&path).build();
    assert_eq!(
        fs.load_defaults().unwrap(),
        with_here(dir.path(), &[("group.node1", "test"), ("group.node2", "40")])
    );
}

#[test]
fn includes_merge_beneath_the_including_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("extra.cfg"), "[DEFAULT]\nsection.item = 40\ngroup.node = extra").unwrap();
    let path = dir.path().join("defaults.cfg");
    fs::write(&path, "[DEFAULT]\ngroup.node = test\ninclude = extra.cfg").unwrap();

    let data = FileStorage::builder().defaults(&path).build().load_defaults().unwrap();
    assert_eq!(data["group.node"], "test");
    assert_eq!(data["section.item"], "40");
    assert!(!data.contains_key("include"));
}

#[test]
fn include_cycle_is_reported() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.cfg"), "[DEFAULT]\ninclude = b.cfg").unwrap();
    fs::write(dir.path().join("b.cfg"), "[DEFAULT]\ninclude = a.cfg").unwrap();

    let err = FileStorage::builder().defaults(dir.path().join("a.cfg")).build().load_defaults();
    assert!(matches!(err, Err(StorageError::IncludeCycle { .. })));
}

#[test]
fn builder_includes_sit_beneath_defaults_file() {
    let dir = TempDir::new().unwrap();
    let extra = dir.path().join("extra.cfg");
    fs::write(&extra, "[DEFAULT]\ngroup.node1 = from-include\ngroup.node2 = 5").unwrap();
    let defaults = dir.path().join("defaults.cfg");
    fs::write(&defaults, "[DEFAULT]\ngroup.node1 = from-defaults").unwrap();

    let data = FileStorage::builder().defaults(&defaults).include(&extra).build().load_defaults().unwrap();
    assert_eq!(data["group.node1"], "from-defaults");
    assert_eq!(data["group.node2"], "5");
}

#[test]
fn load_reads_settings_and_injects_here() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.cfg");
    fs::write(&path, "[DEFAULT]\ngroup.node1 = test\ngroup.node2 = 40\ngroup.path = %(here)s/data").unwrap();

    let data = FileStorage::builder().settings(&path).build().load().unwrap();
    let here = dir.path().display().to_string();
    assert_eq!(data["group.node1"], "test");
    assert_eq!(data["group.node2"], "40");
    assert_eq!(data[HERE_KEY], here);
    assert_eq!(data["group.path"], format!("{here}/data"));
}

#[test]
fn missing_settings_file_is_created() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.cfg");

    let fs = FileStorage::builder().settings(&path).build();
    assert_eq!(fs.load().unwrap(), with_here(dir.path(), &[]));
    assert!(path.exists());
}

#[test]
fn save_writes_the_default_section() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.cfg");

    let fs = FileStorage::builder().settings(&path).build();
    fs.load().unwrap();
    fs.save(&raw(&[("group.node1", "value")])).unwrap();

    assert_eq!(fs.load().unwrap(), with_here(dir.path(), &[("group.node1", "value")]));
    assert_eq!(fs::read_to_string(&path).unwrap(), "[DEFAULT]\ngroup.node1 = value\n\n");
}

#[test]
fn save_keeps_other_sections() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.cfg");
    fs::write(&path, "[TEST]\ngroup.node1 = value\n\n").unwrap();

    let fs = FileStorage::builder().settings(&path).build();
    assert_eq!(fs.load().unwrap(), with_here(dir.path(), &[]));

    fs.save(&raw(&[("group.node1", "value")])).unwrap();
    assert_eq!(fs.load().unwrap(), with_here(dir.path(), &[("group.node1", "value")]));
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "[DEFAULT]\ngroup.node1 = value\n\n[TEST]\ngroup.node1 = value\n\n"
    );
}

#[test]
fn save_into_a_named_section() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.cfg");
    fs::write(&path, "[DEFAULT]\ngroup.node = value\n\n").unwrap();

    let fs = FileStorage::builder().settings(&path).section("TEST").build();
    assert!(fs.load().unwrap().is_empty());

    fs.save(&raw(&[("group.node3", "value")])).unwrap();
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "[DEFAULT]\ngroup.node = value\n\n[TEST]\ngroup.node3 = value\n\n"
    );

    let data = fs.load().unwrap();
    assert_eq!(data["group.node"], "value");
    assert_eq!(data["group.node3"], "value");
}

#[test]
fn save_replaces_values_in_place() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.cfg");
    fs::write(&path, "[DEFAULT]\na.first = 1\na.second = 2\n").unwrap();

    let fs = FileStorage::builder().settings(&path).build();
    fs.save(&raw(&[("a.first", "10"), ("a.third", "3")])).unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "[DEFAULT]\na.first = 10\na.second = 2\na.third = 3\n\n"
    );
    let leftovers = fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftovers, 1, "temp files must not survive a save");
}

#[test]
fn malformed_file_reports_line() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.cfg");
    fs::write(&path, "[DEFAULT]\njust some words\n").unwrap();

    let err = FileStorage::builder().settings(&path).build().load().unwrap_err();
    assert!(matches!(err, StorageError::Parse { line: 2, .. }), "{err}");
}
