//! Background change detection for a single settings file.
//!
//! The watcher observes the file's parent directory (atomic saves replace the
//! file, which would orphan a watch on the file itself), debounces bursts of
//! events into one episode and invokes the callback only when the file content
//! fingerprint actually changed.

use crate::error::StorageError;
use notify::{Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

static ACTIVE: Mutex<Vec<Weak<WatcherInner>>> = parking_lot::const_mutex(Vec::new());

/// How changes are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchMode {
    /// No watching; `start` is a no-op.
    Off,
    /// OS notifications, falling back to polling when unavailable.
    #[default]
    Native,
    /// Periodic modification-time polling.
    Poll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchConfig {
    pub mode: WatchMode,
    /// Quiet period that closes a change episode.
    pub debounce: Duration,
    /// Scan interval in [`WatchMode::Poll`] and for the native fallback.
    pub poll_interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            mode: WatchMode::Native,
            debounce: Duration::from_millis(50),
            poll_interval: Duration::from_millis(250),
        }
    }
}

enum Signal {
    Fs(notify::Result<Event>),
    Stop,
}

struct Running {
    worker: JoinHandle<()>,
    stop_tx: mpsc::Sender<Signal>,
    stopped: Arc<AtomicBool>,
    backend: Box<dyn Watcher + Send>,
}

struct WatcherInner {
    path: PathBuf,
    config: WatchConfig,
    callback: Arc<dyn Fn() + Send + Sync>,
    running: Mutex<Option<Running>>,
}

impl fmt::Debug for WatcherInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherInner")
            .field("path", &self.path)
            .field("config", &self.config)
            .field("running", &self.running.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl WatcherInner {
    fn stop(&self) -> bool {
        let Some(running) = self.running.lock().take() else {
            return false;
        };

        running.stopped.store(true, Ordering::SeqCst);
        drop(running.backend);
        let _ = running.stop_tx.send(Signal::Stop);

        if running.worker.thread().id() == thread::current().id() {
            debug!(path = %self.path.display(), "Watcher stopped from its own callback");
        } else if running.worker.join().is_err() {
            warn!(path = %self.path.display(), "Watcher thread panicked");
        }
        info!(path = %self.path.display(), "File watcher stopped");
        true
    }
}

/// Watches one file and calls back once per debounced content change.
///
/// Dropping the watcher stops it.
#[derive(Debug)]
pub struct FileWatcher {
    inner: Arc<WatcherInner>,
}

impl FileWatcher {
    pub fn new(
        path: impl Into<PathBuf>,
        config: WatchConfig,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(WatcherInner {
                path: path.into(),
                config,
                callback: Arc::new(callback),
                running: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.lock().is_some()
    }

    /// Starts monitoring on a background thread. Calling it on a running watcher
    /// does nothing.
    ///
    /// # Errors
    /// Returns [`StorageError::Watch`] when neither backend can observe the
    /// parent directory, or [`StorageError::Io`] when the thread cannot spawn.
    pub fn start(&self) -> Result<(), StorageError> {
        if self.inner.config.mode == WatchMode::Off {
            debug!(path = %self.inner.path.display(), "Watching disabled");
            return Ok(());
        }

        let mut running = self.inner.running.lock();
        if running.is_some() {
            return Ok(());
        }

        let (tx, rx) = mpsc::channel();
        let dir = watch_dir(&self.inner.path);
        let backend = spawn_backend(&dir, &self.inner.config, &tx)?;
        let stopped = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            path: self.inner.path.clone(),
            debounce: self.inner.config.debounce,
            callback: Arc::clone(&self.inner.callback),
            stopped: Arc::clone(&stopped),
            last: fingerprint(&self.inner.path),
        };
        let handle = thread::Builder::new()
            .name("strata-watcher".to_owned())
            .spawn(move || worker.run(&rx))
            .map_err(|source| StorageError::Io {
                source,
                context: Some("Failed to spawn watcher thread".into()),
            })?;

        *running = Some(Running { worker: handle, stop_tx: tx, stopped, backend });
        drop(running);

        let mut active = ACTIVE.lock();
        active.retain(|w| w.strong_count() > 0);
        active.push(Arc::downgrade(&self.inner));

        info!(path = %self.inner.path.display(), mode = ?self.inner.config.mode, "File watcher started");
        Ok(())
    }

    /// Stops monitoring and waits for the worker thread. Idempotent.
    ///
    /// Once this returns, the callback will not be invoked again.
    pub fn stop(&self) -> bool {
        self.inner.stop()
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

/// Stops every watcher running in this process. Returns how many were stopped.
///
/// Nothing runs this at exit on its own; binaries call it before returning
/// from `main`.
pub fn shutdown() -> usize {
    let watchers: Vec<_> = ACTIVE.lock().drain(..).filter_map(|w| w.upgrade()).collect();
    watchers.iter().filter(|w| w.stop()).count()
}

struct Worker {
    path: PathBuf,
    debounce: Duration,
    callback: Arc<dyn Fn() + Send + Sync>,
    stopped: Arc<AtomicBool>,
    last: Option<u64>,
}

impl Worker {
    fn run(mut self, rx: &mpsc::Receiver<Signal>) {
        let mut deadline: Option<Instant> = None;

        loop {
            let signal = match deadline {
                Some(at) => rx.recv_timeout(at.saturating_duration_since(Instant::now())),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match signal {
                Ok(Signal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(Signal::Fs(Ok(event))) => {
                    if self.is_relevant(&event) {
                        trace!(path = %self.path.display(), kind = ?event.kind, "Change observed");
                        deadline = Some(Instant::now() + self.debounce);
                    }
                },
                Ok(Signal::Fs(Err(err))) => {
                    warn!(path = %self.path.display(), error = %err, "Watcher backend error");
                },
                Err(RecvTimeoutError::Timeout) => {
                    deadline = None;
                    self.fire();
                },
            }

            if self.stopped.load(Ordering::SeqCst) {
                break;
            }
        }
        debug!(path = %self.path.display(), "Watcher thread exiting");
    }

    fn is_relevant(&self, event: &Event) -> bool {
        !matches!(event.kind, EventKind::Access(_))
            && event.paths.iter().any(|p| p.file_name() == self.path.file_name())
    }

    fn fire(&mut self) {
        let current = fingerprint(&self.path);
        if current == self.last {
            trace!(path = %self.path.display(), "Content unchanged, skipping reload");
            return;
        }
        self.last = current;

        if current.is_none() {
            debug!(path = %self.path.display(), "Watched file removed");
            return;
        }
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }

        debug!(path = %self.path.display(), "Watched file changed");
        (self.callback)();
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

fn fingerprint(path: &Path) -> Option<u64> {
    fs::read(path).ok().map(|bytes| fxhash::hash64(&bytes))
}

fn spawn_backend(
    dir: &Path,
    config: &WatchConfig,
    tx: &mpsc::Sender<Signal>,
) -> Result<Box<dyn Watcher + Send>, StorageError> {
    if config.mode == WatchMode::Native {
        let sender = tx.clone();
        let native = notify::recommended_watcher(move |res| {
            if sender.send(Signal::Fs(res)).is_err() {
                trace!("Watcher channel closed");
            }
        })
        .and_then(|mut w| w.watch(dir, RecursiveMode::NonRecursive).map(|()| w));

        match native {
            Ok(watcher) => return Ok(Box::new(watcher)),
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "Native watcher unavailable, polling instead");
            },
        }
    }

    let sender = tx.clone();
    let notify_config = notify::Config::default().with_poll_interval(config.poll_interval);
    let mut poll = PollWatcher::new(
        move |res| {
            if sender.send(Signal::Fs(res)).is_err() {
                trace!("Watcher channel closed");
            }
        },
        notify_config,
    )
    .map_err(|source| StorageError::Watch { source, context: Some("Creating poll watcher".into()) })?;
    poll.watch(dir, RecursiveMode::NonRecursive).map_err(|source| StorageError::Watch {
        source,
        context: Some(format!("Watching {}", dir.display()).into()),
    })?;
    Ok(Box::new(poll))
}
