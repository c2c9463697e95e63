//! File-backed state store.
//!
//! The state is a single JSON document, `{ "appliedIdentifiers": [...] }`,
//! validated strictly on every read. Every push rewrites the whole file by
//! writing a sibling temp file, syncing it, and renaming it over the
//! original. The containing directory is synced after the rename on Unix, so
//! a crash or power loss leaves either the old or the new document.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use super::StateStore;
use crate::error::StoreError;
use crate::state::AppliedState;

/// When the file store re-reads its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Read the file once and serve later loads from memory.
    ///
    /// External modifications made after the first read are not observed
    /// until [`FileStore::invalidate`] is called.
    #[default]
    Retain,
    /// Re-read and re-validate the file on every load and push.
    Reload,
}

/// File store configuration.
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Path of the state document.
    pub path: PathBuf,
    /// Cache policy.
    pub cache_policy: CachePolicy,
    /// Create missing parent directories on first write.
    pub create_parent_dirs: bool,
}

impl FileStoreConfig {
    /// Create a configuration for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache_policy: CachePolicy::default(),
            create_parent_dirs: true,
        }
    }

    /// Set the cache policy.
    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Set whether missing parent directories are created.
    pub fn with_create_parent_dirs(mut self, create: bool) -> Self {
        self.create_parent_dirs = create;
        self
    }
}

/// [`StateStore`] persisted as a JSON document.
#[derive(Debug)]
pub struct FileStore {
    config: FileStoreConfig,
    cache: Mutex<Option<AppliedState>>,
}

impl FileStore {
    /// Open a store with the given configuration.
    ///
    /// Nothing is read or created until the first load or push.
    pub fn open(config: FileStoreConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(None),
        }
    }

    /// Open a store at `path` with the default configuration.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self::open(FileStoreConfig::new(path))
    }

    /// Path of the state document.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// The store's configuration.
    pub fn config(&self) -> &FileStoreConfig {
        &self.config
    }

    /// Drop the cached state so the next access re-reads the file.
    pub fn invalidate(&self) {
        *self.cache.lock() = None;
    }

    /// Current state, honoring the cache policy.
    ///
    /// Caller must hold the cache lock.
    fn current(&self, cache: &mut Option<AppliedState>) -> Result<AppliedState, StoreError> {
        if self.config.cache_policy == CachePolicy::Retain {
            if let Some(state) = cache.as_ref() {
                return Ok(state.clone());
            }
        }

        let state = self.read_file()?;
        if self.config.cache_policy == CachePolicy::Retain {
            *cache = Some(state.clone());
        }
        Ok(state)
    }

    fn read_file(&self) -> Result<AppliedState, StoreError> {
        let path = &self.config.path;
        match fs::read(path) {
            Ok(bytes) => {
                let state = AppliedState::parse_json(&bytes, path)?;
                debug!(path = %path.display(), applied = state.len(), "read applied state");
                Ok(state)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(AppliedState::empty()),
            Err(e) => Err(io_error(path, e)),
        }
    }

    fn write_file(&self, state: &AppliedState) -> Result<(), StoreError> {
        let path = &self.config.path;

        if self.config.create_parent_dirs {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
            }
        }

        let bytes = state.to_json_pretty()?;
        let tmp = temp_path(path);
        if let Err(e) = write_synced(&tmp, &bytes) {
            let _ = fs::remove_file(&tmp);
            return Err(io_error(&tmp, e));
        }
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_error(path, e));
        }
        sync_parent(path)?;

        debug!(path = %path.display(), applied = state.len(), "wrote applied state");
        Ok(())
    }
}

impl StateStore for FileStore {
    fn load(&self) -> Result<AppliedState, StoreError> {
        let mut cache = self.cache.lock();
        self.current(&mut cache)
    }

    fn push(&self, id: &str) -> Result<(), StoreError> {
        let mut cache = self.cache.lock();
        let mut state = self.current(&mut cache)?;
        state.push(id);
        if let Err(e) = self.write_file(&state) {
            // The rename may have landed before the failure.
            *cache = None;
            return Err(e);
        }

        if self.config.cache_policy == CachePolicy::Retain {
            *cache = Some(state);
        }
        Ok(())
    }
}

fn io_error(path: &Path, source: io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `bytes` to a fresh file at `path` and flush it to disk.
fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_data()
}

/// Persist the directory entry created by a rename.
#[cfg(unix)]
fn sync_parent(path: &Path) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)
        .and_then(|dir| dir.sync_all())
        .map_err(|e| io_error(parent, e))
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
