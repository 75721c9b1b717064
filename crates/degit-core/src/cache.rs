//! Snapshot cache.
//!
//! Archives are stored per repository:
//!
//! ```text
//! <root>/<site>/<owner>/<repo>/<blake3(url)[..32]>.tar.gz
//! <root>/<site>/<owner>/<repo>/index.json
//! ```
//!
//! The index maps each url hash to its URL, archive digest and retrieval
//! time. The key is the fully resolved URL, so two refs of one repository
//! never collide. Nothing is evicted and staleness is not detected: a tag
//! moved upstream keeps serving the archive recorded first.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DegitError, IoContext, Result};
use crate::fs::hash_file;
use crate::source::SourceDescriptor;

const INDEX_FILE: &str = "index.json";

/// One cached snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Resolved retrieval URL.
    pub url: String,
    /// blake3 digest of the archive bytes.
    pub content_hash: String,
    /// When the archive was recorded.
    pub retrieved_at: DateTime<Utc>,
    /// Location of the archive on disk.
    #[serde(skip)]
    pub archive: PathBuf,
}

type Index = BTreeMap<String, CacheRecord>;

/// Local snapshot cache rooted at an explicit directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at `root`. Nothing is created until the first record.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every archive of one repository. Also used as
    /// the work directory for stashing.
    pub fn repo_dir(&self, descriptor: &SourceDescriptor) -> PathBuf {
        self.root
            .join(&descriptor.site)
            .join(&descriptor.owner)
            .join(&descriptor.repo)
    }

    /// Where the archive for `url` lives (or will live).
    pub fn archive_path(&self, descriptor: &SourceDescriptor, url: &str) -> PathBuf {
        self.repo_dir(descriptor)
            .join(format!("{}.tar.gz", url_key(url)))
    }

    /// Find a record for `url`. Reads only the local index; a record whose
    /// archive is missing on disk counts as absent.
    pub fn lookup(&self, descriptor: &SourceDescriptor, url: &str) -> Result<Option<CacheRecord>> {
        let dir = self.repo_dir(descriptor);
        let index = read_index(&dir)?;
        let Some(mut record) = index.get(&url_key(url)).cloned() else {
            tracing::debug!(url, "cache miss");
            return Ok(None);
        };
        if record.url != url {
            tracing::debug!(url, recorded = %record.url, "cache key collision, ignoring record");
            return Ok(None);
        }

        record.archive = self.archive_path(descriptor, url);
        if !record.archive.is_file() {
            tracing::debug!(url, archive = %record.archive.display(), "cached archive missing");
            return Ok(None);
        }

        tracing::debug!(url, archive = %record.archive.display(), "cache hit");
        Ok(Some(record))
    }

    /// Record a downloaded archive for `url`.
    ///
    /// The archive is moved into its cache location (when not already
    /// there) and the index is rewritten atomically.
    pub fn record(
        &self,
        descriptor: &SourceDescriptor,
        url: &str,
        archive: &Path,
    ) -> Result<CacheRecord> {
        let dir = self.repo_dir(descriptor);
        fs::create_dir_all(&dir)
            .io_context(|| format!("Failed to create cache directory: {}", dir.display()))?;

        let target = self.archive_path(descriptor, url);
        if archive != target {
            fs::rename(archive, &target).io_context(|| {
                format!(
                    "Failed to move {} into cache at {}",
                    archive.display(),
                    target.display()
                )
            })?;
        }
        if !target.is_file() {
            return Err(DegitError::Io {
                context: format!("Cached archive missing after write: {}", target.display()),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

        let record = CacheRecord {
            url: url.to_string(),
            content_hash: hash_file(&target)?,
            retrieved_at: Utc::now(),
            archive: target,
        };

        let mut index = read_index(&dir)?;
        index.insert(url_key(url), record.clone());
        write_index(&dir, &index)?;

        tracing::debug!(url, hash = %record.content_hash, "recorded snapshot in cache");
        Ok(record)
    }
}

/// Cache key for a resolved URL.
fn url_key(url: &str) -> String {
    blake3::hash(url.as_bytes()).to_hex()[..32].to_string()
}

fn read_index(dir: &Path) -> Result<Index> {
    let path = dir.join(INDEX_FILE);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Index::new()),
        Err(err) => {
            return Err(err)
                .io_context(|| format!("Failed to read cache index: {}", path.display()));
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(index) => Ok(index),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "corrupt cache index, starting fresh");
            Ok(Index::new())
        }
    }
}

/// Write to a temp name, then rename into place.
fn write_index(dir: &Path, index: &Index) -> Result<()> {
    let path = dir.join(INDEX_FILE);
    let tmp_path = dir.join(format!("{INDEX_FILE}.{}.tmp", std::process::id()));

    let bytes = serde_json::to_vec_pretty(index).map_err(|e| DegitError::Io {
        context: "Failed to serialize cache index".to_string(),
        source: std::io::Error::other(e),
    })?;
    fs::write(&tmp_path, bytes)
        .io_context(|| format!("Failed to write cache index: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, &path)
        .io_context(|| format!("Failed to rename cache index: {}", tmp_path.display()))
}
