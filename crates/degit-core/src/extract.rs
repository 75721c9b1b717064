//! Materialize retrieved artifacts into the destination directory.

use std::fs;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;

use crate::error::{DegitError, IoContext, Result};
use crate::fetch::RetrievedArtifact;
use crate::fs::{is_empty_dir, move_entry, normalize_relative, remove_path};

/// Refuse to touch a non-empty destination unless `force` is set.
///
/// Must run before any destructive filesystem mutation.
pub fn ensure_destination(dest: &Path, force: bool) -> Result<()> {
    if force || is_empty_dir(dest)? {
        return Ok(());
    }
    Err(DegitError::DestinationNotEmpty {
        path: dest.to_path_buf(),
    })
}

/// Write an artifact's tree into `dest`.
///
/// With `subdir`, only that subdirectory's contents end up in `dest`,
/// flattened to its root. Archives are left in place (they belong to the
/// cache); clone directories are consumed.
pub fn extract(artifact: RetrievedArtifact, dest: &Path, subdir: Option<&str>) -> Result<()> {
    fs::create_dir_all(dest)
        .io_context(|| format!("Failed to create destination: {}", dest.display()))?;

    match artifact {
        RetrievedArtifact::Archive(path) => extract_archive(&path, dest, subdir),
        RetrievedArtifact::Clone { dir, root } => {
            relocate_tree(&root, dest, subdir)?;
            dir.close()
                .io_context(|| "Failed to remove temporary clone directory")
        }
    }
}

/// Stream a `.tar.gz` into `dest`, stripping the archive's top-level
/// directory and applying the subdirectory filter on the fly.
pub fn extract_archive(archive_path: &Path, dest: &Path, subdir: Option<&str>) -> Result<()> {
    let subdir = subdir.map(subdir_path).transpose()?;
    fs::create_dir_all(dest)
        .io_context(|| format!("Failed to create destination: {}", dest.display()))?;
    let root = fs::canonicalize(dest)
        .io_context(|| format!("Failed to resolve destination: {}", dest.display()))?;

    let file = fs::File::open(archive_path)
        .io_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(false);
    archive.set_overwrite(true);

    let mut entry_count = 0usize;
    let mut subdir_seen = false;

    let entries = archive
        .entries()
        .map_err(|e| DegitError::Archive(format!("failed to read archive entries: {e}")))?;
    for entry in entries {
        let mut entry =
            entry.map_err(|e| DegitError::Archive(format!("failed to read archive entry: {e}")))?;
        entry_count += 1;

        let entry_type = entry.header().entry_type();
        if matches!(
            entry_type,
            tar::EntryType::XGlobalHeader | tar::EntryType::XHeader
        ) {
            continue;
        }

        let entry_path = entry
            .path()
            .map_err(|e| DegitError::Archive(format!("failed to read entry path: {e}")))?
            .into_owned();
        check_entry_path(&entry_path)?;

        // Drop the `repo-ref/` wrapper directory.
        let stripped = strip_first_component(&entry_path);
        if stripped.as_os_str().is_empty() {
            continue;
        }

        let relative = match &subdir {
            Some(subdir) => match stripped.strip_prefix(subdir) {
                Ok(rest) => {
                    // A file named like the subdirectory does not count.
                    if !rest.as_os_str().is_empty() || entry_type.is_dir() {
                        subdir_seen = true;
                    }
                    rest.to_path_buf()
                }
                Err(_) => continue,
            },
            None => stripped,
        };
        if relative.as_os_str().is_empty() {
            continue;
        }

        match entry_type {
            tar::EntryType::Regular | tar::EntryType::Directory | tar::EntryType::Continuous => {}
            tar::EntryType::Symlink => {
                let link = entry
                    .link_name()
                    .map_err(|e| DegitError::Archive(format!("failed to read link name: {e}")))?
                    .ok_or_else(|| DegitError::Archive("symlink without target".into()))?;
                check_link_target(&relative, &link)?;
            }
            other => {
                tracing::warn!(path = %entry_path.display(), entry_type = ?other, "skipping unsupported archive entry");
                continue;
            }
        }

        let target = root.join(&relative);
        prepare_parent(&root, &target, &entry_path)?;
        if fs::symlink_metadata(&target).is_ok_and(|m| m.file_type().is_symlink()) {
            remove_path(&target)?;
        }
        entry.unpack(&target).map_err(|e| {
            DegitError::Archive(format!("failed to unpack {}: {e}", entry_path.display()))
        })?;
    }

    if entry_count == 0 {
        return Err(DegitError::Archive("archive is empty".into()));
    }
    if let Some(subdir) = subdir
        && !subdir_seen
    {
        return Err(DegitError::SubdirNotFound {
            subdir: subdir.to_string_lossy().into_owned(),
        });
    }

    tracing::debug!(archive = %archive_path.display(), dest = %dest.display(), entries = entry_count, "extracted archive");
    Ok(())
}

/// Move a cloned working tree (or one of its subdirectories) into `dest`.
/// `.git` is never carried over; existing entries in `dest` are replaced.
pub fn relocate_tree(root: &Path, dest: &Path, subdir: Option<&str>) -> Result<()> {
    let source = match subdir {
        Some(s) => root.join(subdir_path(s)?),
        None => root.to_path_buf(),
    };
    if !source.is_dir() {
        return Err(DegitError::SubdirNotFound {
            subdir: subdir.unwrap_or_default().to_string(),
        });
    }

    for entry in
        fs::read_dir(&source).io_context(|| format!("Failed to read directory: {}", source.display()))?
    {
        let entry = entry.io_context(|| format!("Failed to read directory: {}", source.display()))?;
        let name = entry.file_name();
        if name == ".git" {
            continue;
        }
        let target = dest.join(&name);
        remove_path(&target)?;
        move_entry(&entry.path(), &target)?;
    }

    tracing::debug!(src = %source.display(), dest = %dest.display(), "relocated cloned tree");
    Ok(())
}

fn subdir_path(subdir: &str) -> Result<PathBuf> {
    match normalize_relative(subdir) {
        Some(path) if !path.as_os_str().is_empty() => Ok(path),
        _ => Err(DegitError::UnsafeActionPath {
            path: subdir.to_string(),
        }),
    }
}

fn check_entry_path(path: &Path) -> Result<()> {
    let unsafe_component = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if unsafe_component {
        return Err(DegitError::Archive(format!(
            "entry escapes the archive root: {}",
            path.display()
        )));
    }
    Ok(())
}

/// Create the parent directories of `target`, refusing any that resolve
/// outside `root` through symlinks unpacked by earlier entries.
fn prepare_parent(root: &Path, target: &Path, entry_path: &Path) -> Result<()> {
    let Some(parent) = target.parent() else {
        return Ok(());
    };
    let existing = parent
        .ancestors()
        .find(|p| fs::symlink_metadata(p).is_ok())
        .unwrap_or(root);
    ensure_within(root, existing, entry_path)?;
    fs::create_dir_all(parent)
        .io_context(|| format!("Failed to create directory: {}", parent.display()))?;
    ensure_within(root, parent, entry_path)
}

fn ensure_within(root: &Path, path: &Path, entry_path: &Path) -> Result<()> {
    match fs::canonicalize(path) {
        Ok(resolved) if resolved.starts_with(root) => Ok(()),
        _ => Err(DegitError::Archive(format!(
            "entry escapes the destination: {}",
            entry_path.display()
        ))),
    }
}

/// A symlink at `relative` pointing at `link` must stay inside the tree.
fn check_link_target(relative: &Path, link: &Path) -> Result<()> {
    let base = relative.parent().unwrap_or(Path::new(""));
    let joined = base.join(link);
    if link.is_absolute() || normalize_relative(&joined.to_string_lossy()).is_none() {
        return Err(DegitError::Archive(format!(
            "symlink {} points outside the tree: {}",
            relative.display(),
            link.display()
        )));
    }
    Ok(())
}

/// Strip the first path component (`repo-main/src/lib.rs` → `src/lib.rs`).
fn strip_first_component(path: &Path) -> PathBuf {
    let mut components = path.components();
    components.next();
    components.as_path().to_path_buf()
}
