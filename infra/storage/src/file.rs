use crate::error::{StorageError, StorageErrorExt};
use crate::ini::{DEFAULT_SECTION, IniDocument};
use crate::loader::{HERE_KEY, Loader, RawSettingsMap};
use fxhash::FxHashSet;
use parking_lot::Mutex;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Reserved key that pulls another file's `DEFAULT` section into the current one.
pub const INCLUDE_KEY: &str = "include";

const MAX_INTERPOLATION_DEPTH: usize = 10;

/// Fluent builder for [`FileStorage`]. Every path is optional.
#[derive(Debug, Default)]
pub struct FileStorageBuilder {
    settings: Option<PathBuf>,
    defaults: Option<PathBuf>,
    includes: Vec<PathBuf>,
    section: Option<String>,
}

impl FileStorageBuilder {
    /// Runtime settings file: read by `load`, written by `save`.
    #[must_use = "FileStorageBuilder methods return the updated builder"]
    pub fn settings(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings = Some(path.into());
        self
    }

    /// Defaults file: only its `DEFAULT` section is read, by `load_defaults`.
    #[must_use = "FileStorageBuilder methods return the updated builder"]
    pub fn defaults(mut self, path: impl Into<PathBuf>) -> Self {
        self.defaults = Some(path.into());
        self
    }

    /// Extra defaults file merged beneath the defaults file. May be repeated.
    #[must_use = "FileStorageBuilder methods return the updated builder"]
    pub fn include(mut self, path: impl Into<PathBuf>) -> Self {
        self.includes.push(path.into());
        self
    }

    /// Target section of the settings file (default `DEFAULT`).
    #[must_use = "FileStorageBuilder methods return the updated builder"]
    pub fn section(mut self, name: impl Into<String>) -> Self {
        self.section = Some(name.into());
        self
    }

    #[must_use]
    pub fn build(self) -> FileStorage {
        FileStorage {
            settings: self.settings,
            defaults: self.defaults,
            includes: self.includes,
            section: self.section.unwrap_or_else(|| DEFAULT_SECTION.to_owned()),
            write_lock: Mutex::new(()),
            tmp_counter: AtomicU64::new(1),
        }
    }
}

/// [`Loader`] over layered INI files.
///
/// `DEFAULT` is merged beneath the target section, `include = <path>` pulls in
/// another file's `DEFAULT` (the including file wins), and `%(name)s` references
/// are expanded against the merged section, `here` included.
#[derive(Debug)]
pub struct FileStorage {
    settings: Option<PathBuf>,
    defaults: Option<PathBuf>,
    includes: Vec<PathBuf>,
    section: String,
    write_lock: Mutex<()>,
    tmp_counter: AtomicU64,
}

impl FileStorage {
    #[must_use]
    pub fn builder() -> FileStorageBuilder {
        FileStorageBuilder::default()
    }

    #[must_use]
    pub fn settings_path(&self) -> Option<&Path> {
        self.settings.as_deref()
    }

    #[must_use]
    pub fn defaults_path(&self) -> Option<&Path> {
        self.defaults.as_deref()
    }

    #[must_use]
    pub fn section(&self) -> &str {
        &self.section
    }

    fn read_settings(&self, path: &Path) -> Result<RawSettingsMap, StorageError> {
        let _guard = self.write_lock.lock();
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create directory: {}", parent.display()))?;
            }
            fs::write(path, "").context(format!("Failed to create {}", path.display()))?;
            info!(path = %path.display(), "Created empty settings file");
        }

        let doc = read_document(path)?;
        let mut visiting = FxHashSet::default();
        let defaults = resolve_defaults(path, &doc, &mut visiting)?;

        let mut merged = defaults;
        if self.section != DEFAULT_SECTION {
            let Some(section) = doc.section(&self.section) else {
                debug!(path = %path.display(), section = %self.section, "Target section absent");
                return Ok(RawSettingsMap::new());
            };
            for (key, value) in section.entries().filter(|(k, _)| *k != INCLUDE_KEY) {
                merged.insert(key.to_owned(), value.to_owned());
            }
        }

        Ok(finish(merged, path))
    }
}

impl Loader for FileStorage {
    fn load(&self) -> Result<RawSettingsMap, StorageError> {
        match &self.settings {
            Some(path) => self.read_settings(path),
            None => Ok(RawSettingsMap::new()),
        }
    }

    fn load_defaults(&self) -> Result<RawSettingsMap, StorageError> {
        let mut merged = RawSettingsMap::new();
        let mut here = None;

        let files = self.includes.iter().chain(self.defaults.as_ref());
        for path in files {
            if !path.exists() {
                debug!(path = %path.display(), "Defaults file not found, skipping");
                continue;
            }
            let doc = read_document(path)?;
            let mut visiting = FxHashSet::default();
            merged.extend(resolve_defaults(path, &doc, &mut visiting)?);
            here = Some(path.as_path());
        }

        Ok(here.map_or_else(RawSettingsMap::new, |path| finish(merged, path)))
    }

    fn save(&self, values: &RawSettingsMap) -> Result<(), StorageError> {
        let Some(path) = &self.settings else {
            return Ok(());
        };

        let _guard = self.write_lock.lock();
        let mut doc = if path.exists() { read_document(path)? } else { IniDocument::new() };
        let section = doc.section_mut(&self.section);
        for (key, value) in values {
            section.set(key.as_str(), value.as_str());
        }

        write_atomic(path, doc.render().as_bytes(), &self.tmp_counter)?;
        info!(path = %path.display(), section = %self.section, count = values.len(), "Settings saved");
        Ok(())
    }

    fn watch_path(&self) -> Option<&Path> {
        self.settings.as_deref()
    }
}

fn read_document(path: &Path) -> Result<IniDocument, StorageError> {
    let text =
        fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
    IniDocument::parse(&text, &path.display().to_string())
}

/// `DEFAULT` of `doc` with its includes merged beneath it, `include` removed.
fn resolve_defaults(
    path: &Path,
    doc: &IniDocument,
    visiting: &mut FxHashSet<PathBuf>,
) -> Result<RawSettingsMap, StorageError> {
    let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if !visiting.insert(canonical) {
        return Err(StorageError::IncludeCycle {
            message: path.display().to_string().into(),
            context: None,
        });
    }

    let mut merged = RawSettingsMap::new();
    if let Some(includes) = doc.defaults().get(INCLUDE_KEY) {
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for include in includes.split_whitespace() {
            let target = base.join(include);
            if !target.exists() {
                warn!(path = %target.display(), from = %path.display(), "Included file not found");
                continue;
            }
            let included = read_document(&target)?;
            merged.extend(resolve_defaults(&target, &included, visiting)?);
        }
    }

    for (key, value) in doc.defaults().entries().filter(|(k, _)| *k != INCLUDE_KEY) {
        merged.insert(key.to_owned(), value.to_owned());
    }

    Ok(merged)
}

/// Injects `here` and expands `%(name)s` references.
fn finish(mut merged: RawSettingsMap, path: &Path) -> RawSettingsMap {
    let here = path.parent().map(|p| p.display().to_string()).unwrap_or_default();
    merged.entry(HERE_KEY.to_owned()).or_insert(here);

    let snapshot = merged.clone();
    for (key, value) in &mut merged {
        if value.contains('%') {
            *value = interpolate(key, value, &snapshot, 0);
        }
    }
    merged
}

fn interpolate(key: &str, value: &str, vars: &RawSettingsMap, depth: usize) -> String {
    if depth >= MAX_INTERPOLATION_DEPTH {
        warn!(key, "Interpolation depth exceeded; value left as is");
        return value.to_owned();
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("%%") {
            out.push('%');
            rest = after;
        } else if let Some((name, after)) =
            tail.strip_prefix("%(").and_then(|t| t.split_once(")s"))
        {
            match vars.get(name) {
                Some(found) => out.push_str(&interpolate(name, found, vars, depth + 1)),
                None => {
                    warn!(key, reference = name, "Unknown interpolation reference");
                    out.push_str(&tail[..name.len() + 4]);
                },
            }
            rest = after;
        } else {
            out.push('%');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Atomic swap: unique temp file, `fsync`, rename over the target.
fn write_atomic(target: &Path, data: &[u8], counter: &AtomicU64) -> Result<(), StorageError> {
    let file_name = target.file_name().and_then(|s| s.to_str()).unwrap_or("settings");
    let temp = target.with_file_name(format!(
        ".{file_name}.strata-tmp.{}",
        counter.fetch_add(1, Ordering::Relaxed)
    ));

    {
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp)
            .context(format!("Temp creation failed: {}", temp.display()))?;
        file.write_all(data).context("Write failed")?;
        file.sync_all().context("Hardware sync failed")?;
    }

    if let Err(err) = fs::rename(&temp, target) {
        if err.kind() == ErrorKind::AlreadyExists {
            fs::remove_file(target)
                .context(format!("Failed to replace existing file: {}", target.display()))?;
            fs::rename(&temp, target).context(format!(
                "Atomic swap failed: {} -> {}",
                temp.display(),
                target.display()
            ))?;
        } else {
            let _ = fs::remove_file(&temp);
            return Err(StorageError::Io {
                source: err,
                context: Some(
                    format!("Atomic swap failed: {} -> {}", temp.display(), target.display()).into(),
                ),
            });
        }
    }

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        sync_dir(parent);
    }
    debug!(path = %target.display(), "File saved atomically");
    Ok(())
}

fn sync_dir(path: &Path) {
    match fs::File::open(path) {
        Ok(dir) => {
            if let Err(err) = dir.sync_all() {
                debug!(path = %path.display(), error = %err, "Directory sync failed");
            }
        },
        Err(err) => debug!(path = %path.display(), error = %err, "Directory open failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> RawSettingsMap {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
    }

    #[test]
    fn interpolation_expands_references() {
        let vars = vars(&[("here", "/etc/app"), ("db.dir", "%(here)s/db")]);
        assert_eq!(interpolate("db.url", "sqlite://%(db.dir)s/app.sqlite", &vars, 0), "sqlite:///etc/app/db/app.sqlite");
        assert_eq!(interpolate("k", "100%% sure", &vars, 0), "100% sure");
        assert_eq!(interpolate("k", "%(missing)s!", &vars, 0), "%(missing)s!");
        assert_eq!(interpolate("k", "50% off", &vars, 0), "50% off");
    }

    #[test]
    fn self_reference_stops_at_depth_limit() {
        let vars = vars(&[("a", "%(a)s")]);
        assert_eq!(interpolate("a", "%(a)s", &vars, 0), "%(a)s");
    }
}
