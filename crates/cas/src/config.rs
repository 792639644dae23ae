//! Local cache configuration.
//!
//! There is no default root: callers build a `CasConfig` from
//! whatever configuration layer they own and inject it into `FileStore::new`.

use std::path::PathBuf;

/// Configuration for the local content-addressed cache.
#[derive(Debug, Clone)]
pub struct CasConfig {
    /// Root of the cache.
    /// Objects stored in `{base_path}/objects/`, metadata in `{base_path}/metadata/`.
    pub base_path: PathBuf,

    /// Whether to write metadata JSON alongside objects.
    pub store_metadata: bool,

    /// Read-only mode - prevents any writes.
    pub read_only: bool,
}

impl CasConfig {
    /// Create a writable config with a specific base path.
    pub fn with_base_path(path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: path.into(),
            store_metadata: true,
            read_only: false,
        }
    }

    /// Create a read-only config with a specific base path.
    pub fn read_only(path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: path.into(),
            store_metadata: false,
            read_only: true,
        }
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.base_path.join("objects")
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.base_path.join("metadata")
    }
}
