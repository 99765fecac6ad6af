//! Key-value stores backing persisted settings.
//!
//! Any conforming store is substitutable: in-memory for tests, a directory of
//! files for the shipped app, or an OS preference service behind the same
//! trait.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by a settings store.
///
/// Callers above the store absorb these (read falls back to the default,
/// write is skipped with a warning); they never reach the UI.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A byte-oriented key-value store with removal.
///
/// Writing `None` removes the entry.
pub trait SettingsStore: Send + Sync {
    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;
    fn write(&self, key: &str, value: Option<&[u8]>) -> StoreResult<()>;
}

/// Ephemeral store used by tests and previews.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for MemoryStore {
    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: Option<&[u8]>) -> StoreResult<()> {
        let mut entries = self.entries.lock();
        match value {
            Some(bytes) => {
                entries.insert(key.to_string(), bytes.to_vec());
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(())
    }
}

/// File-backed store keeping one `<key>.json` file per entry.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SettingsStore for JsonFileStore {
    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: Option<&[u8]>) -> StoreResult<()> {
        let path = self.path_for(key);
        match value {
            Some(bytes) => std::fs::write(path, bytes)?,
            None => match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }
}
