//! Temporary relocation of a destination's existing entries.
//!
//! `stash` empties the destination into a hidden directory so the fetched
//! tree and its actions run against a clean root. `unstash` merges the
//! stashed entries back underneath the fetched content: where both sides
//! have the same path, directories are merged and the fetched entry wins.

use std::fs;
use std::path::{Path, PathBuf};

use crate::actions::MANIFEST_FILE;
use crate::error::{DegitError, IoContext, Result};
use crate::fs::{move_entry, remove_path};

/// Name of the hidden stash directory inside the work directory.
pub const STASH_DIR: &str = ".degit-stash";

/// Location of the stash area for a work directory.
pub fn stash_area(dir: &Path) -> PathBuf {
    dir.join(STASH_DIR)
}

/// Move every top-level entry of `dest` into `dir/.degit-stash`.
///
/// A stash area left behind by an interrupted run is discarded first.
pub fn stash(dir: &Path, dest: &Path) -> Result<()> {
    let area = stash_area(dir);
    if remove_path(&area)? {
        tracing::warn!(area = %area.display(), "removed stale stash area");
    }
    fs::create_dir_all(&area)
        .io_context(|| format!("Failed to create stash area: {}", area.display()))?;

    let mut moved = 0usize;
    for entry in
        fs::read_dir(dest).io_context(|| format!("Failed to read directory: {}", dest.display()))?
    {
        let entry = entry.io_context(|| format!("Failed to read directory: {}", dest.display()))?;
        if entry.path() == area {
            continue;
        }
        move_entry(&entry.path(), &area.join(entry.file_name()))?;
        moved += 1;
    }

    tracing::debug!(dest = %dest.display(), area = %area.display(), entries = moved, "stashed destination");
    Ok(())
}

/// Move stashed entries back into `dest` and delete the stash area.
///
/// A top-level `degit.json` in the stash is dropped, whoever created it.
/// Fails with [`DegitError::NothingStashed`] when no stash area exists.
pub fn unstash(dir: &Path, dest: &Path) -> Result<()> {
    let area = stash_area(dir);
    if !area.is_dir() {
        return Err(DegitError::NothingStashed {
            dir: dir.to_path_buf(),
        });
    }
    fs::create_dir_all(dest)
        .io_context(|| format!("Failed to create directory: {}", dest.display()))?;

    for entry in
        fs::read_dir(&area).io_context(|| format!("Failed to read stash area: {}", area.display()))?
    {
        let entry = entry.io_context(|| format!("Failed to read stash area: {}", area.display()))?;
        if entry.file_name() == MANIFEST_FILE {
            tracing::debug!("dropping stashed manifest file");
            continue;
        }
        merge_back(&entry.path(), &dest.join(entry.file_name()))?;
    }

    remove_path(&area)?;
    tracing::debug!(dest = %dest.display(), "unstashed destination");
    Ok(())
}

/// Put `src` at `dst` unless the fetched tree already has something there.
fn merge_back(src: &Path, dst: &Path) -> Result<()> {
    let Ok(existing) = fs::symlink_metadata(dst) else {
        return move_entry(src, dst);
    };
    let src_meta =
        fs::symlink_metadata(src).io_context(|| format!("Failed to stat: {}", src.display()))?;

    if existing.is_dir() && src_meta.is_dir() {
        for entry in
            fs::read_dir(src).io_context(|| format!("Failed to read directory: {}", src.display()))?
        {
            let entry = entry.io_context(|| format!("Failed to read directory: {}", src.display()))?;
            merge_back(&entry.path(), &dst.join(entry.file_name()))?;
        }
        return Ok(());
    }

    tracing::debug!(path = %dst.display(), "fetched entry supersedes stashed entry");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::hash_tree;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let work = tmp.path().join("work");
        let dest = tmp.path().join("dest");
        fs::create_dir_all(&work).unwrap();
        fs::create_dir_all(&dest).unwrap();
        (tmp, work, dest)
    }

    #[test]
    fn round_trip_restores_tree() {
        let (_tmp, work, dest) = setup();
        fs::write(dest.join("a.txt"), "a").unwrap();
        fs::create_dir_all(dest.join("nested/deeper")).unwrap();
        fs::write(dest.join("nested/deeper/b.bin"), [0u8, 1, 2, 255]).unwrap();
        let before = hash_tree(&dest).unwrap();

        stash(&work, &dest).unwrap();
        assert!(fs::read_dir(&dest).unwrap().next().is_none());

        unstash(&work, &dest).unwrap();
        assert_eq!(hash_tree(&dest).unwrap(), before);
        assert!(!stash_area(&work).exists());
    }

    #[test]
    fn unstash_without_stash_fails() {
        let (_tmp, work, dest) = setup();
        let err = unstash(&work, &dest).unwrap_err();
        assert!(matches!(err, DegitError::NothingStashed { .. }));
    }

    #[test]
    fn manifest_never_comes_back() {
        let (_tmp, work, dest) = setup();
        fs::write(dest.join(MANIFEST_FILE), "{}").unwrap();
        fs::write(dest.join("keep.txt"), "keep").unwrap();

        stash(&work, &dest).unwrap();
        unstash(&work, &dest).unwrap();

        assert!(!dest.join(MANIFEST_FILE).exists());
        assert!(dest.join("keep.txt").exists());
    }

    #[test]
    fn fetched_entries_win_and_directories_merge() {
        let (_tmp, work, dest) = setup();
        fs::write(dest.join("file.txt"), "mine").unwrap();
        fs::create_dir_all(dest.join("dir")).unwrap();
        fs::write(dest.join("dir/mine.txt"), "mine").unwrap();

        stash(&work, &dest).unwrap();
        fs::write(dest.join("file.txt"), "fetched").unwrap();
        fs::create_dir_all(dest.join("dir")).unwrap();
        fs::write(dest.join("dir/fetched.txt"), "fetched").unwrap();
        unstash(&work, &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("file.txt")).unwrap(), "fetched");
        assert!(dest.join("dir/mine.txt").exists());
        assert!(dest.join("dir/fetched.txt").exists());
    }

    #[test]
    fn stale_stash_is_replaced() {
        let (_tmp, work, dest) = setup();
        fs::create_dir_all(stash_area(&work)).unwrap();
        fs::write(stash_area(&work).join("stale.txt"), "old").unwrap();
        fs::write(dest.join("fresh.txt"), "new").unwrap();

        stash(&work, &dest).unwrap();
        unstash(&work, &dest).unwrap();

        assert!(dest.join("fresh.txt").exists());
        assert!(!dest.join("stale.txt").exists());
    }
}
