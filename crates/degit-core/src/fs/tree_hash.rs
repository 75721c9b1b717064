//! Deterministic content hashing for archives and scaffolded trees.

use std::fs;
use std::path::Path;

use crate::error::{DegitError, IoContext, Result};

/// blake3 digest of one file, read in a streaming fashion.
pub fn hash_file(path: &Path) -> Result<String> {
    let file = fs::File::open(path)
        .io_context(|| format!("Failed to open file for hashing: {}", path.display()))?;
    let mut hasher = blake3::Hasher::new();
    hasher
        .update_reader(file)
        .io_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Digest of a directory tree, used to report what a run produced.
///
/// Entries are visited in byte order of their names. Each one feeds its
/// `/`-joined relative path followed by a type marker:
/// - file: `0x00` then the content
/// - directory: `0xFF`, then its children
/// - symlink: `0xFE` then the link target (links are never followed)
///
/// Trees hash equal exactly when names, layout, contents and link targets
/// all match. Empty directories count.
pub fn hash_tree(root: &Path) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    feed_dir(&mut hasher, root, "")?;
    Ok(hasher.finalize().to_hex().to_string())
}

fn feed_dir(hasher: &mut blake3::Hasher, dir: &Path, prefix: &str) -> Result<()> {
    let mut children = Vec::new();
    for entry in
        fs::read_dir(dir).io_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let entry = entry.io_context(|| format!("Failed to read directory: {}", dir.display()))?;
        children.push((entry.file_name(), entry.path()));
    }
    children.sort();

    for (name, path) in children {
        let rel = match prefix {
            "" => name.to_string_lossy().into_owned(),
            _ => format!("{prefix}/{}", name.to_string_lossy()),
        };
        let kind = fs::symlink_metadata(&path)
            .io_context(|| format!("Failed to stat: {}", path.display()))?
            .file_type();
        hasher.update(rel.as_bytes());

        if kind.is_symlink() {
            let target = fs::read_link(&path)
                .io_context(|| format!("Failed to read link: {}", path.display()))?;
            hasher.update(&[0xFE]);
            hasher.update(target.as_os_str().as_encoded_bytes());
        } else if kind.is_dir() {
            hasher.update(&[0xFF]);
            feed_dir(hasher, &path, &rel)?;
        } else if kind.is_file() {
            hasher.update(&[0x00]);
            let file = fs::File::open(&path)
                .io_context(|| format!("Failed to open file for hashing: {}", path.display()))?;
            hasher
                .update_reader(file)
                .io_context(|| format!("Failed to read file: {}", path.display()))?;
        } else {
            return Err(DegitError::Io {
                context: format!("Unsupported filesystem entry: {}", path.display()),
                source: std::io::Error::from(std::io::ErrorKind::Unsupported),
            });
        }
    }
    Ok(())
}
