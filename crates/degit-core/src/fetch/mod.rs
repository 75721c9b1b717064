//! Retrieval of snapshots and shallow clones.
//!
//! - Snapshot mode downloads a `.tar.gz` over HTTPS, following redirects
//!   up to [`MAX_REDIRECTS`] hops, optionally through a proxy.
//! - Git mode runs `git clone --depth=1` and strips `.git`.
//!
//! Neither touches the destination directory.

mod git;
mod http;

use std::path::{Path, PathBuf};

pub use git::GitClient;
pub use http::{MAX_REDIRECTS, SnapshotClient};

use crate::error::{IoContext, Result};
use crate::source::SourceDescriptor;

/// What a retrieval produced, handed to the extractor.
#[derive(Debug)]
pub enum RetrievedArtifact {
    /// A gzip-compressed tarball on disk (usually inside the cache).
    Archive(PathBuf),
    /// A cloned working tree inside a temporary directory that is deleted
    /// when the artifact is dropped.
    Clone {
        dir: tempfile::TempDir,
        root: PathBuf,
    },
}

impl RetrievedArtifact {
    /// Root of the fetched content.
    pub fn path(&self) -> &Path {
        match self {
            Self::Archive(path) => path,
            Self::Clone { root, .. } => root,
        }
    }
}

/// Performs snapshot downloads and shallow clones.
#[derive(Debug, Clone)]
pub struct Retriever {
    http: SnapshotClient,
    git: GitClient,
}

impl Retriever {
    /// Create a retriever; `proxy` applies to both HTTP and git traffic.
    pub fn new(proxy: Option<&str>) -> Result<Self> {
        Ok(Self {
            http: SnapshotClient::new(proxy)?,
            git: GitClient::new(proxy),
        })
    }

    /// Download an archive to `dest`.
    pub async fn fetch_snapshot(&self, url: &str, dest: &Path) -> Result<()> {
        self.http.fetch_snapshot(url, dest).await
    }

    /// Shallow-clone `url` into `dest` and remove its `.git` directory.
    pub async fn clone_shallow(&self, url: &str, dest: &Path, reference: Option<&str>) -> Result<()> {
        self.git.clone_shallow(url, dest, reference).await
    }

    /// Shallow-clone a descriptor into a fresh temporary directory.
    pub async fn clone_to_temp(&self, descriptor: &SourceDescriptor) -> Result<RetrievedArtifact> {
        let dir = tempfile::Builder::new()
            .prefix("degit-clone-")
            .tempdir()
            .io_context(|| "Failed to create temporary clone directory")?;
        let root = dir.path().join(&descriptor.repo);
        self.clone_shallow(&descriptor.remote_url, &root, Some(&descriptor.reference))
            .await?;
        Ok(RetrievedArtifact::Clone { dir, root })
    }

    /// Resolve the `HEAD` placeholder to a branch name for hosts whose
    /// snapshot endpoint requires one. Other refs are returned unchanged.
    pub async fn effective_ref(&self, descriptor: &SourceDescriptor) -> Result<String> {
        if !(descriptor.uses_default_ref() && descriptor.needs_concrete_ref()) {
            return Ok(descriptor.reference.clone());
        }
        let branch = self
            .git
            .resolve_default_branch(&descriptor.https_url())
            .await?;
        Ok(branch.unwrap_or_else(|| descriptor.reference.clone()))
    }
}
