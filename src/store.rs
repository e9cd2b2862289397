//! Object storage boundary used by the pipeline stages.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::errors::PipelineError;

/// Listing metadata for one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Full object key relative to the container root.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
}

/// The three storage capabilities the pipeline requires.
///
/// No versioning, conditional writes, or multipart uploads: the stages only
/// ever list a prefix, fetch whole objects, and write whole objects.
pub trait ObjectStore {
    /// Lists every object under `prefix`, sorted by key.
    ///
    /// Prefixes match on `/` boundaries, so `raw` matches `raw/cars.csv` but
    /// never `rawest/cars.csv`. An empty prefix lists the whole container.
    fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, PipelineError>;

    /// Fetches the raw bytes stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>, PipelineError>;

    /// Stores `bytes` under `key` in a single put, creating or overwriting.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), PipelineError>;
}

/// Directory-rooted store where the container identifier is a local path.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Opens a store rooted at `root`. The directory must exist for listing.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Container root backing this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in key.split('/').filter(|part| !part.is_empty()) {
            path.push(part);
        }
        path
    }
}

impl ObjectStore for FsObjectStore {
    fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, PipelineError> {
        if !self.root.is_dir() {
            return Err(storage_error(
                prefix,
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("container {} is not a directory", self.root.display()),
                ),
            ));
        }
        let wanted = prefix.trim_matches('/');
        let mut objects = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|err| storage_error(wanted, err.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let key = relative_key(&self.root, entry.path());
            if !key_under_prefix(&key, wanted) {
                continue;
            }
            let size = entry.metadata().map(|meta| meta.len()).unwrap_or(0);
            objects.push(ObjectInfo { key, size });
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(prefix = wanted, count = objects.len(), "listed objects");
        Ok(objects)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, PipelineError> {
        fs::read(self.object_path(key)).map_err(|err| storage_error(key, err))
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), PipelineError> {
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| storage_error(key, err))?;
        }
        fs::write(&path, bytes).map_err(|err| storage_error(key, err))?;
        debug!(key, bytes = bytes.len(), "stored object");
        Ok(())
    }
}

fn storage_error(key: &str, source: io::Error) -> PipelineError {
    PipelineError::Storage {
        key: key.to_string(),
        source,
    }
}

fn relative_key(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn key_under_prefix(key: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    key.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}
