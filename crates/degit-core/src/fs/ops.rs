//! Move, copy and delete helpers used by the extractor, stash and actions.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{IoContext, Result};

/// Whether `path` is missing or an empty directory.
pub fn is_empty_dir(path: &Path) -> Result<bool> {
    match fs::read_dir(path) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(err) => Err(err).io_context(|| format!("Failed to read directory: {}", path.display())),
    }
}

/// Move `src` to `dst`, replacing nothing. Falls back to copy-then-delete
/// when a rename is impossible (e.g. across filesystems).
pub fn move_entry(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .io_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    tracing::debug!(src = %src.display(), dst = %dst.display(), "rename failed, copying");
    copy_tree(src, dst)?;
    remove_path(src)?;
    Ok(())
}

/// Copy a file, symlink, or directory tree. Existing files at the target
/// are overwritten; existing directories are merged into.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(src)
        .io_context(|| format!("Failed to stat: {}", src.display()))?;

    if meta.file_type().is_symlink() {
        remove_path(dst)?;
        copy_symlink(src, dst)?;
    } else if meta.is_dir() {
        if fs::symlink_metadata(dst).is_ok_and(|m| !m.is_dir()) {
            remove_path(dst)?;
        }
        fs::create_dir_all(dst)
            .io_context(|| format!("Failed to create directory: {}", dst.display()))?;
        for entry in
            fs::read_dir(src).io_context(|| format!("Failed to read directory: {}", src.display()))?
        {
            let entry =
                entry.io_context(|| format!("Failed to read directory: {}", src.display()))?;
            copy_tree(&entry.path(), &dst.join(entry.file_name()))?;
        }
    } else {
        if fs::symlink_metadata(dst).is_ok_and(|m| m.is_dir()) {
            remove_path(dst)?;
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .io_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::copy(src, dst).io_context(|| {
            format!("Failed to copy {} to {}", src.display(), dst.display())
        })?;
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target =
        fs::read_link(src).io_context(|| format!("Failed to read link: {}", src.display()))?;
    std::os::unix::fs::symlink(&target, dst)
        .io_context(|| format!("Failed to create link: {}", dst.display()))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)
        .map(|_| ())
        .io_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))
}

/// Delete a file, symlink, or directory tree. Returns `false` when nothing
/// was there.
pub fn remove_path(path: &Path) -> Result<bool> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(err) => {
            return Err(err).io_context(|| format!("Failed to stat: {}", path.display()));
        }
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)
            .io_context(|| format!("Failed to remove directory: {}", path.display()))?;
    } else {
        fs::remove_file(path)
            .io_context(|| format!("Failed to remove file: {}", path.display()))?;
    }
    Ok(true)
}

/// Lexically normalize a relative path.
///
/// Returns `None` for absolute paths and for paths whose `..` components
/// climb above their starting point. `""` and `"."` normalize to an empty
/// path meaning "the root itself".
pub fn normalize_relative(path: &str) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.iter().collect())
}
