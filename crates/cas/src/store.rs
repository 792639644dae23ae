//! FileStore: filesystem-backed local image cache.
//!
//! Implements the ContentStore trait using a local filesystem with directory sharding.
//!
//! Layout:
//! ```text
//! {base_path}/
//! ├── objects/
//! │   ├── ab/
//! │   │   └── cde123...  # Content file (remainder of hash), mode 0444
//! │   └── 12/
//! │       └── 3456789...
//! └── metadata/
//!     ├── ab/
//!     │   └── cde123....json  # {mime_type, size}
//!     └── 12/
//!         └── 3456789....json
//! ```
//!
//! Objects are write-once. A write goes to a temp file in the shard directory
//! and is then persisted without clobbering, so concurrent writers of the same
//! hash (in this process or another one sharing the root) race benignly: one
//! wins, the others observe [`WriteOutcome::AlreadyPresent`].

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::CasConfig;
use crate::hash::ContentHash;
use crate::metadata::{CasMetadata, CasReference, OCTET_STREAM};

/// Result of a write-once store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// This call created the object.
    Written,
    /// The object was already cached; nothing was touched.
    AlreadyPresent,
}

/// Trait for local content storage backends.
pub trait ContentStore: Send + Sync {
    /// Write `data` under `hash` unless an object already exists there.
    ///
    /// The caller vouches that `hash` is the digest of `data`.
    fn write(&self, hash: &ContentHash, data: &[u8], mime_type: &str) -> Result<WriteOutcome>;

    /// Retrieve data by its content hash.
    ///
    /// Returns `Ok(None)` if the hash doesn't exist.
    fn retrieve(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>>;

    /// Check if content exists without retrieving it.
    fn exists(&self, hash: &ContentHash) -> bool;

    /// Get metadata about stored content.
    ///
    /// Returns `Ok(None)` if the hash doesn't exist.
    fn inspect(&self, hash: &ContentHash) -> Result<Option<CasReference>>;

    /// Hash `data` and write it, returning the hash.
    fn store(&self, data: &[u8], mime_type: &str) -> Result<ContentHash> {
        let hash = ContentHash::from_data(data);
        self.write(&hash, data, mime_type)?;
        Ok(hash)
    }
}

/// Filesystem-based content store.
#[derive(Debug, Clone)]
pub struct FileStore {
    config: CasConfig,
}

impl FileStore {
    /// Create a new FileStore with the given configuration.
    ///
    /// Creates the objects and metadata directories if they don't exist
    /// (unless in read-only mode).
    pub fn new(config: CasConfig) -> Result<Self> {
        if !config.read_only {
            fs::create_dir_all(config.objects_dir())
                .context("failed to create CAS objects directory")?;
            fs::create_dir_all(config.metadata_dir())
                .context("failed to create CAS metadata directory")?;
        }

        Ok(Self { config })
    }

    /// Create a FileStore at a specific path.
    pub fn at_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::new(CasConfig::with_base_path(path))
    }

    /// Create a read-only FileStore at a specific path.
    pub fn read_only_at(path: impl Into<PathBuf>) -> Result<Self> {
        Self::new(CasConfig::read_only(path))
    }

    fn object_path(&self, hash: &ContentHash) -> PathBuf {
        self.config
            .objects_dir()
            .join(hash.prefix())
            .join(hash.remainder())
    }

    fn metadata_path(&self, hash: &ContentHash) -> PathBuf {
        self.config
            .metadata_dir()
            .join(hash.prefix())
            .join(format!("{}.json", hash.remainder()))
    }

    fn write_metadata(&self, hash: &ContentHash, mime_type: &str, size: u64) -> Result<()> {
        let meta_path = self.metadata_path(hash);
        if meta_path.exists() {
            return Ok(());
        }

        let metadata = CasMetadata {
            mime_type: mime_type.to_string(),
            size,
        };
        let json = serde_json::to_vec(&metadata).context("failed to serialize metadata")?;
        create_new(&meta_path, &json, false).context("failed to write metadata file")?;
        Ok(())
    }
}

/// Atomically create `path` with `data` unless it already exists.
///
/// Returns `true` if this call created the file.
fn create_new(path: &Path, data: &[u8], read_only: bool) -> Result<bool> {
    let parent = path
        .parent()
        .with_context(|| format!("no parent directory for {}", path.display()))?;
    fs::create_dir_all(parent).context("failed to create prefix directory")?;

    let mut tmp = NamedTempFile::new_in(parent).context("failed to create temp file")?;
    tmp.write_all(data).context("failed to write temp file")?;
    tmp.as_file().sync_all().context("failed to sync temp file")?;

    if read_only {
        let mut perms = tmp
            .as_file()
            .metadata()
            .context("failed to stat temp file")?
            .permissions();
        perms.set_readonly(true);
        tmp.as_file()
            .set_permissions(perms)
            .context("failed to mark temp file read-only")?;
    }

    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        // Lost the race to another writer; the temp file is removed on drop.
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error).with_context(|| format!("failed to persist {}", path.display())),
    }
}

impl ContentStore for FileStore {
    fn write(&self, hash: &ContentHash, data: &[u8], mime_type: &str) -> Result<WriteOutcome> {
        if self.config.read_only {
            anyhow::bail!("CAS is in read-only mode");
        }

        let obj_path = self.object_path(hash);

        let outcome = if obj_path.exists() {
            WriteOutcome::AlreadyPresent
        } else if create_new(&obj_path, data, true).context("failed to write object file")? {
            WriteOutcome::Written
        } else {
            WriteOutcome::AlreadyPresent
        };

        if self.config.store_metadata {
            self.write_metadata(hash, mime_type, data.len() as u64)?;
        }

        debug!(id = %hash, bytes = data.len(), ?outcome, "cache write");
        Ok(outcome)
    }

    fn retrieve(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>> {
        let path = self.object_path(hash);

        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("failed to read object file"),
        }
    }

    fn exists(&self, hash: &ContentHash) -> bool {
        self.object_path(hash).exists()
    }

    fn inspect(&self, hash: &ContentHash) -> Result<Option<CasReference>> {
        let obj_path = self.object_path(hash);
        let meta_path = self.metadata_path(hash);

        if !obj_path.exists() {
            return Ok(None);
        }

        if meta_path.exists() {
            let json = fs::read_to_string(&meta_path).context("failed to read metadata file")?;
            let metadata: CasMetadata =
                serde_json::from_str(&json).context("failed to parse metadata")?;

            Ok(Some(CasReference::new(
                hash.clone(),
                metadata.mime_type,
                metadata.size,
            )))
        } else {
            // No metadata - infer size from file, use generic mime type
            let file_size = fs::metadata(&obj_path)
                .context("failed to stat object file")?
                .len();

            Ok(Some(CasReference::new(hash.clone(), OCTET_STREAM, file_size)))
        }
    }
}
