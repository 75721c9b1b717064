//! The scaffolding pipeline.
//!
//! gate → resolve → cache lookup/record → retrieve → stash → extract →
//! actions → unstash
//!
//! Nothing in the destination is touched until retrieval has succeeded.

use std::path::{Path, PathBuf};

use crate::actions::{
    ActionManifest, ActionRunner, FetchFuture, MANIFEST_FILE, MAX_NESTED_CLONES, RemoteFetcher,
};
use crate::cache::CacheStore;
use crate::config::DegitOptions;
use crate::error::{DegitError, Result};
use crate::extract::{ensure_destination, extract};
use crate::fetch::{RetrievedArtifact, Retriever};
use crate::fs::{hash_tree, is_empty_dir, remove_path};
use crate::source::{Host, RetrievalMode, SourceDescriptor, SourceResolver};
use crate::stash::{stash, unstash};

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct ScaffoldOutcome {
    /// The descriptor that was fetched, after mode overrides.
    pub descriptor: SourceDescriptor,
    /// Directory that was scaffolded.
    pub dest: PathBuf,
    /// Whether the snapshot came from the cache.
    pub cache_hit: bool,
    /// Digest of the final destination tree.
    pub tree_hash: String,
}

/// One scaffolding run for a single source.
#[derive(Debug)]
pub struct Degit {
    descriptor: SourceDescriptor,
    options: DegitOptions,
    cache: CacheStore,
    retriever: Retriever,
    depth: usize,
}

impl Degit {
    /// Resolve `specifier` and prepare a run with `options`.
    pub fn new(specifier: &str, options: DegitOptions) -> Result<Self> {
        let descriptor = SourceResolver::new().resolve(specifier)?;
        Self::from_descriptor(descriptor, options)
    }

    /// Prepare a run for an already resolved descriptor.
    pub fn from_descriptor(descriptor: SourceDescriptor, options: DegitOptions) -> Result<Self> {
        let descriptor = apply_mode_override(descriptor, options.mode);
        let retriever = Retriever::new(options.proxy.as_deref())?;
        Ok(Self {
            cache: CacheStore::new(options.cache_root.clone()),
            descriptor,
            options,
            retriever,
            depth: 0,
        })
    }

    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    pub fn options(&self) -> &DegitOptions {
        &self.options
    }

    /// Scaffold the source into `dest`.
    pub async fn clone(&self, dest: &Path) -> Result<ScaffoldOutcome> {
        ensure_destination(dest, self.options.force)?;
        let descriptor = &self.descriptor;
        tracing::debug!(source = %descriptor, mode = %descriptor.mode, depth = self.depth, "starting run");

        let (artifact, cache_hit) = self.retrieve().await?;

        let stashed = !is_empty_dir(dest)?;
        let work_dir = self.work_dir();
        if stashed {
            stash(&work_dir, dest)?;
        }

        let populated = self.populate(artifact, dest).await;
        if stashed {
            let restored = unstash(&work_dir, dest);
            if let Err(err) = &restored
                && populated.is_err()
            {
                tracing::error!(error = %err, "failed to restore stashed entries");
            }
            populated?;
            restored?;
        } else {
            populated?;
        }

        let tree_hash = hash_tree(dest)?;
        tracing::info!(source = %descriptor, dest = %dest.display(), cache_hit, "scaffolded");
        Ok(ScaffoldOutcome {
            descriptor: descriptor.clone(),
            dest: dest.to_path_buf(),
            cache_hit,
            tree_hash,
        })
    }

    /// Produce an artifact without touching the destination.
    async fn retrieve(&self) -> Result<(RetrievedArtifact, bool)> {
        let descriptor = &self.descriptor;
        match descriptor.mode {
            RetrievalMode::Git => {
                let artifact = self.retriever.clone_to_temp(descriptor).await?;
                Ok((artifact, false))
            }
            RetrievalMode::Snapshot => {
                let reference = self.retriever.effective_ref(descriptor).await?;
                let url = descriptor.snapshot_url(&reference).ok_or_else(|| {
                    DegitError::UnsupportedMode {
                        host: descriptor.host.to_string(),
                        mode: descriptor.mode.to_string(),
                    }
                })?;

                if self.options.refresh {
                    tracing::debug!(url, "refresh requested, skipping cache");
                } else if let Some(record) = self.cache.lookup(descriptor, &url)? {
                    return Ok((RetrievedArtifact::Archive(record.archive), true));
                }

                let archive = self.cache.archive_path(descriptor, &url);
                self.retriever.fetch_snapshot(&url, &archive).await?;
                let record = self.cache.record(descriptor, &url, &archive)?;
                Ok((RetrievedArtifact::Archive(record.archive), false))
            }
        }
    }

    /// Extract the artifact into an empty `dest` and replay its manifest.
    async fn populate(&self, artifact: RetrievedArtifact, dest: &Path) -> Result<()> {
        extract(artifact, dest, self.descriptor.subdir.as_deref())?;

        let manifest = ActionManifest::load(dest)?;
        if !manifest.is_empty() {
            tracing::debug!(actions = manifest.actions.len(), "applying manifest");
            let nested = NestedFetcher { parent: self };
            ActionRunner::with_remote(&nested)
                .apply(&manifest, dest, dest)
                .await?;
        }
        remove_path(&dest.join(MANIFEST_FILE))?;
        Ok(())
    }

    /// Stash location for this run. Nested runs get their own so they
    /// cannot clobber an outer run's stash of the same repository.
    fn work_dir(&self) -> PathBuf {
        let dir = self.cache.repo_dir(&self.descriptor);
        if self.depth == 0 {
            dir
        } else {
            dir.join(format!(".nested-{}", self.depth))
        }
    }
}

/// Runs a `clone` action's remote source through a child pipeline.
struct NestedFetcher<'p> {
    parent: &'p Degit,
}

impl RemoteFetcher for NestedFetcher<'_> {
    fn fetch_into<'a>(&'a self, specifier: &'a str, dest: &'a Path) -> FetchFuture<'a> {
        Box::pin(async move {
            let depth = self.parent.depth + 1;
            if depth > MAX_NESTED_CLONES {
                return Err(DegitError::CloneDepthExceeded {
                    limit: MAX_NESTED_CLONES,
                });
            }
            let options = self.parent.options.clone().with_force(true).with_mode(None);
            let mut child = Degit::new(specifier, options)?;
            child.depth = depth;
            child.clone(dest).await.map(|_| ())
        })
    }
}

fn apply_mode_override(
    descriptor: SourceDescriptor,
    mode: Option<RetrievalMode>,
) -> SourceDescriptor {
    match mode {
        None => descriptor,
        Some(RetrievalMode::Snapshot) if descriptor.host == Host::Generic => {
            tracing::warn!(source = %descriptor, "generic remotes have no snapshot endpoint, using git");
            descriptor
        }
        Some(mode) => descriptor.with_mode(mode),
    }
}
