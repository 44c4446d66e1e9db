use serial_test::serial;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use strata_storage::watcher::{self, FileWatcher, WatchConfig, WatchMode};
use tempfile::TempDir;

fn config(mode: WatchMode) -> WatchConfig {
    WatchConfig {
        mode,
        debounce: Duration::from_millis(30),
        poll_interval: Duration::from_millis(30),
    }
}

fn wait_for(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    done()
}

fn counting_watcher(path: &std::path::Path, mode: WatchMode) -> (FileWatcher, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let watcher = FileWatcher::new(path, config(mode), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (watcher, hits)
}

#[test]
#[serial]
fn content_change_triggers_callback() {
    for mode in [WatchMode::Native, WatchMode::Poll] {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.cfg");
        fs::write(&path, "[DEFAULT]\ngroup.node1 = value\n\n").unwrap();

        let (watcher, hits) = counting_watcher(&path, mode);
        watcher.start().unwrap();
        assert!(watcher.is_running());

        std::thread::sleep(Duration::from_millis(50));
        fs::write(&path, "[DEFAULT]\ngroup.node1 = new_value\n\n").unwrap();

        assert!(
            wait_for(Duration::from_secs(5), || hits.load(Ordering::SeqCst) >= 1),
            "no reload observed in {mode:?} mode"
        );
        assert!(watcher.stop());
    }
}

#[test]
#[serial]
fn identical_rewrite_is_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.cfg");
    fs::write(&path, "[DEFAULT]\na.b = 5\n").unwrap();

    let (watcher, hits) = counting_watcher(&path, WatchMode::Poll);
    watcher.start().unwrap();
    std::thread::sleep(Duration::from_millis(50));

    fs::write(&path, "[DEFAULT]\na.b = 5\n").unwrap();
    std::thread::sleep(Duration::from_millis(300));

    assert_eq!(hits.load(Ordering::SeqCst), 0);
    watcher.stop();
}

#[test]
#[serial]
fn no_callback_after_stop() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.cfg");
    fs::write(&path, "one").unwrap();

    let (watcher, hits) = counting_watcher(&path, WatchMode::Native);
    watcher.start().unwrap();
    assert!(watcher.stop());
    assert!(!watcher.stop(), "second stop is a no-op");

    fs::write(&path, "two").unwrap();
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(!watcher.is_running());
}

#[test]
#[serial]
fn shutdown_stops_every_watcher() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("a.cfg");
    let second = dir.path().join("b.cfg");

    let (a, _) = counting_watcher(&first, WatchMode::Native);
    let (b, _) = counting_watcher(&second, WatchMode::Poll);
    a.start().unwrap();
    b.start().unwrap();

    assert_eq!(watcher::shutdown(), 2);
    assert!(!a.is_running());
    assert!(!b.is_running());
    assert_eq!(watcher::shutdown(), 0);
}

#[test]
#[serial]
fn off_mode_never_starts() {
    let dir = TempDir::new().unwrap();
    let (watcher, _) = counting_watcher(&dir.path().join("s.cfg"), WatchMode::Off);
    watcher.start().unwrap();
    assert!(!watcher.is_running());
}
