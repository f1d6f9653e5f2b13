//! Best-effort JSON file storage.
//!
//! Every operation here degrades instead of failing: a missing file reads as
//! the type's default, a malformed file or an I/O error reads as the default
//! and logs a warning, and writes report success as a plain `bool`. Callers
//! never see an error from this layer.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// JSON files rooted at a single data directory.
#[derive(Debug, Clone)]
pub struct BestEffortStore {
    root: PathBuf,
}

impl BestEffortStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a file relative to the root.
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Whether the file exists.
    pub fn exists(&self, relative: impl AsRef<Path>) -> bool {
        self.path(relative).is_file()
    }

    /// Read and decode a JSON file, falling back to `T::default()`.
    pub fn read<T>(&self, relative: impl AsRef<Path>) -> T
    where
        T: DeserializeOwned + Default,
    {
        self.try_read(relative).unwrap_or_default()
    }

    /// Read and decode a JSON file, `None` when it is missing or unusable.
    pub fn try_read<T>(&self, relative: impl AsRef<Path>) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let path = self.path(relative);
        if !path.is_file() {
            return None;
        }
        read_json_file(&path)
    }

    /// Encode `value` as pretty JSON and write it, creating parent
    /// directories as needed. Returns `false` on any failure.
    pub fn write<T>(&self, relative: impl AsRef<Path>, value: &T) -> bool
    where
        T: Serialize + ?Sized,
    {
        let path = self.path(relative);

        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("Failed to create directory {}: {}", parent.display(), e);
                return false;
            }
        }

        let content = match serde_json::to_string_pretty(value) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to serialize {}: {}", path.display(), e);
                return false;
            }
        };

        match fs::write(&path, content) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to write {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Delete a file. A missing file counts as removed.
    pub fn remove(&self, relative: impl AsRef<Path>) -> bool {
        let path = self.path(relative);
        if !path.exists() {
            return true;
        }
        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to remove {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Decode every `*.json` file in a subdirectory, sorted by file name.
    /// Files that fail to decode are skipped.
    pub fn read_dir<T>(&self, relative_dir: impl AsRef<Path>) -> Vec<T>
    where
        T: DeserializeOwned,
    {
        let dir = self.path(relative_dir);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().map(|ext| ext == "json").unwrap_or(false))
            .collect();
        paths.sort();

        paths.iter().filter_map(|path| read_json_file(path)).collect()
    }
}

fn read_json_file<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring malformed JSON in {}: {}", path.display(), e);
            None
        }
    }
}
