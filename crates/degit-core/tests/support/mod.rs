//! Fixture builders shared by the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use git2::{IndexAddOption, Repository};

use degit_core::cache::CacheStore;
use degit_core::source::{SourceDescriptor, SourceResolver};

/// Gzip-compressed tarball whose entries sit under `wrapper/`, the way
/// hosting providers lay out snapshot archives.
pub fn tarball(wrapper: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    let mut dir = tar::Header::new_gnu();
    dir.set_entry_type(tar::EntryType::Directory);
    dir.set_size(0);
    dir.set_mode(0o755);
    dir.set_cksum();
    builder
        .append_data(&mut dir, format!("{wrapper}/"), std::io::empty())
        .unwrap();

    for (name, body) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{wrapper}/{name}"), body.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

pub fn descriptor(specifier: &str) -> SourceDescriptor {
    SourceResolver::new().resolve(specifier).unwrap()
}

/// Record a snapshot for `specifier` at `url` so a run never goes online.
pub fn seed_cache(cache_root: &Path, specifier: &str, url: &str, files: &[(&str, &str)]) {
    let store = CacheStore::new(cache_root);
    let descriptor = descriptor(specifier);
    let archive = store.archive_path(&descriptor, url);
    fs::create_dir_all(archive.parent().unwrap()).unwrap();
    fs::write(&archive, tarball("repo-main", files)).unwrap();
    store.record(&descriptor, url, &archive).unwrap();
}

/// Sorted list of every file under `root`, relative and `/`-separated.
pub fn list_files(root: &Path) -> Vec<String> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap();
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

/// Initialize a repository at `dir` containing `files`, committed on
/// branch `main`.
pub fn git_fixture(dir: &Path, files: &[(&str, &str)]) -> PathBuf {
    let repo = Repository::init(dir).unwrap();
    {
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Fixture").unwrap();
        config.set_str("user.email", "fixture@example.com").unwrap();
    }
    for (name, body) in files {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = repo.signature().unwrap();
    let commit = repo
        .commit(None, &sig, &sig, "fixture", &tree, &[])
        .unwrap();
    let commit = repo.find_commit(commit).unwrap();
    repo.branch("main", &commit, true).unwrap();
    repo.set_head("refs/heads/main").unwrap();
    dir.to_path_buf()
}

/// Commit `files` on top of `main` and return the new commit id.
pub fn git_commit(dir: &Path, files: &[(&str, &str)]) -> String {
    let repo = Repository::open(dir).unwrap();
    for (name, body) in files {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let parent = repo.head().unwrap().peel_to_commit().unwrap();
    let sig = repo.signature().unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, "update", &tree, &[&parent])
        .unwrap()
        .to_string()
}

/// Id of the commit `main` points at.
pub fn git_head(dir: &Path) -> String {
    let repo = Repository::open(dir).unwrap();
    repo.head().unwrap().target().unwrap().to_string()
}

/// `file://` URL for a local path.
pub fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}
