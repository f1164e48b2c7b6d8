//! Single-writer JSON collections persisted by whole-file atomic replacement.
//!
//! Every collection keeps its last committed contents as an immutable
//! snapshot. Readers clone the snapshot handle and never wait on file I/O.
//! Writers are serialized by a dedicated mutex, work on a private copy, write
//! it to a sibling temporary file, fsync it, and rename it over the original.
//! The snapshot is only swapped once the rename succeeded, so a failed write
//! leaves both the file and the in-memory view untouched.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode collection for {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Outcome of a collection update closure.
pub enum Mutation<R> {
    /// The working copy changed and must be persisted.
    Changed(R),
    /// Nothing changed; no write happens.
    Unchanged(R),
}

pub struct JsonCollection<T> {
    path: PathBuf,
    snapshot: RwLock<Arc<Vec<T>>>,
    writer: Mutex<()>,
}

impl<T> JsonCollection<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Loads the collection. A missing or empty file is an empty collection.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let items = match read_json_array(&path) {
            Ok(items) => items,
            Err(StorageError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "collection file missing; starting empty");
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        Ok(Self {
            path,
            snapshot: RwLock::new(Arc::new(items)),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last committed contents.
    pub fn snapshot(&self) -> Arc<Vec<T>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs a read-modify-write cycle under the collection's writer lock.
    ///
    /// `apply` sees a private copy of the committed contents. An `Err` from
    /// `apply` or from persistence discards the copy.
    pub fn update<R, E, F>(&self, apply: F) -> Result<R, E>
    where
        F: FnOnce(&mut Vec<T>) -> Result<Mutation<R>, E>,
        E: From<StorageError>,
    {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut working = Vec::clone(&self.snapshot());

        match apply(&mut working)? {
            Mutation::Unchanged(outcome) => Ok(outcome),
            Mutation::Changed(outcome) => {
                write_json_atomic(&self.path, &working)?;
                *self
                    .snapshot
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = Arc::new(working);
                Ok(outcome)
            }
        }
    }
}

/// Reads a JSON array file. Whitespace-only files decode as empty.
pub fn read_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StorageError> {
    let raw = fs::read_to_string(path).map_err(|source| StorageError::Read {
        path: path.display().to_string(),
        source,
    })?;

    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&raw).map_err(|source| StorageError::Decode {
        path: path.display().to_string(),
        source,
    })
}

fn write_json_atomic<T: Serialize>(path: &Path, items: &[T]) -> Result<(), StorageError> {
    let encoded = serde_json::to_vec_pretty(items).map_err(|source| StorageError::Encode {
        path: path.display().to_string(),
        source,
    })?;

    let write_err = |source: io::Error| StorageError::Write {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let temp_path = temp_path_for(path);
    let mut file = File::create(&temp_path).map_err(write_err)?;
    file.write_all(&encoded).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(write_err(err));
    }

    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "collection".to_string());
    path.with_file_name(format!(".{file_name}.tmp"))
}
