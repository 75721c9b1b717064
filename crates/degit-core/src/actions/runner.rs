use std::fs;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;

use crate::error::{DegitError, IoContext, Result};
use crate::fs::{copy_tree, move_entry, normalize_relative, remove_path};

use super::manifest::{Action, ActionManifest};

/// Upper bound on `clone` actions that pull in further remote sources.
pub const MAX_NESTED_CLONES: usize = 4;

/// Boxed future returned by [`RemoteFetcher`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a>>;

/// Fetches a remote source specifier into a directory.
///
/// Implemented by the pipeline so that `clone` actions can scaffold another
/// repository without the action layer knowing how retrieval works.
pub trait RemoteFetcher {
    fn fetch_into<'a>(&'a self, specifier: &'a str, dest: &'a Path) -> FetchFuture<'a>;
}

/// Applies a manifest's actions in order.
pub struct ActionRunner<'a> {
    remote: Option<&'a dyn RemoteFetcher>,
}

impl<'a> ActionRunner<'a> {
    /// A runner that only resolves `clone` sources inside the fetched tree.
    pub fn local() -> Self {
        Self { remote: None }
    }

    /// A runner that hands non-local `clone` sources to `remote`.
    pub fn with_remote(remote: &'a dyn RemoteFetcher) -> Self {
        Self {
            remote: Some(remote),
        }
    }

    /// Run every action against `dest`.
    ///
    /// `fetched_root` is where local `clone` sources are read from; it is
    /// usually `dest` itself. Stops at the first failing action.
    pub async fn apply(
        &self,
        manifest: &ActionManifest,
        fetched_root: &Path,
        dest: &Path,
    ) -> Result<()> {
        for action in &manifest.actions {
            match action {
                Action::Clone { src, dest: target } => {
                    self.clone_entry(src, target, fetched_root, dest).await?
                }
                Action::Remove { paths } => {
                    for path in paths {
                        remove_entry(path, dest)?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn clone_entry(
        &self,
        src: &str,
        target: &str,
        fetched_root: &Path,
        dest: &Path,
    ) -> Result<()> {
        let target_rel = safe_relative(target)?;
        let target_path = resolve_inside(dest, &target_rel)?;

        let src_rel = safe_relative(src)?;
        let source = fetched_root.join(&src_rel);
        if !src_rel.as_os_str().is_empty() && fs::symlink_metadata(&source).is_ok() {
            if target_rel.as_os_str().is_empty() && !source.is_dir() {
                return Err(DegitError::UnsafeActionPath {
                    path: target.to_string(),
                });
            }
            tracing::info!(src, dest = target, "copying local entry");
            return copy_local(&source, &target_path);
        }

        let Some(remote) = self.remote else {
            return Err(DegitError::bad_specifier(
                src,
                "not a path in the fetched tree and remote sources are disabled",
            ));
        };
        tracing::info!(src, dest = target, "cloning remote source");
        remote.fetch_into(src, &target_path).await
    }
}

fn remove_entry(path: &str, dest: &Path) -> Result<()> {
    let rel = safe_relative(path)?;
    if rel.as_os_str().is_empty() {
        return Err(DegitError::UnsafeActionPath {
            path: path.to_string(),
        });
    }
    let target = resolve_inside(dest, &rel)?;
    if remove_path(&target)? {
        tracing::info!(path, "removed");
    } else {
        tracing::debug!(path, "nothing to remove");
    }
    Ok(())
}

/// Copy `source` over `target`, replacing whatever was there.
///
/// The copy is staged first so overlapping source and target paths are safe.
fn copy_local(source: &Path, target: &Path) -> Result<()> {
    if source == target {
        return Ok(());
    }
    let source_is_dir = fs::symlink_metadata(source)
        .io_context(|| format!("Failed to stat: {}", source.display()))?
        .is_dir();
    if source_is_dir && target.starts_with(source) {
        return Err(DegitError::UnsafeActionPath {
            path: target.to_string_lossy().into_owned(),
        });
    }

    let staging = tempfile::Builder::new()
        .prefix("degit-action-")
        .tempdir()
        .io_context(|| "Failed to create staging directory")?;
    let staged = staging.path().join("entry");
    copy_tree(source, &staged)?;

    remove_path(target)?;
    move_entry(&staged, target)
}

fn safe_relative(path: &str) -> Result<PathBuf> {
    normalize_relative(path).ok_or_else(|| DegitError::UnsafeActionPath {
        path: path.to_string(),
    })
}

/// Join `rel` onto `root`, refusing to walk through a symlink on the way.
fn resolve_inside(root: &Path, rel: &Path) -> Result<PathBuf> {
    let mut current = root.to_path_buf();
    let mut components = rel.components().peekable();
    while let Some(component) = components.next() {
        let Component::Normal(part) = component else {
            continue;
        };
        current.push(part);
        let is_last = components.peek().is_none();
        if !is_last
            && fs::symlink_metadata(&current)
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false)
        {
            return Err(DegitError::UnsafeActionPath {
                path: rel.to_string_lossy().into_owned(),
            });
        }
    }
    Ok(current)
}
