use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::*;
use crate::error::DegitError;

fn manifest(json: &str) -> ActionManifest {
    ActionManifest::parse(json, Path::new(MANIFEST_FILE)).unwrap()
}

fn tree() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("dest");
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join("README.md"), "readme").unwrap();
    fs::write(root.join("secrets.txt"), "hunter2").unwrap();
    fs::write(root.join("docs/guide.md"), "guide").unwrap();
    (tmp, root)
}

#[derive(Default)]
struct RecordingFetcher {
    calls: RefCell<Vec<(String, PathBuf)>>,
}

impl RemoteFetcher for RecordingFetcher {
    fn fetch_into<'a>(&'a self, specifier: &'a str, dest: &'a Path) -> FetchFuture<'a> {
        Box::pin(async move {
            self.calls
                .borrow_mut()
                .push((specifier.to_string(), dest.to_path_buf()));
            fs::create_dir_all(dest).unwrap();
            fs::write(dest.join("remote.txt"), specifier).unwrap();
            Ok(())
        })
    }
}

mod parse_tests {
    use super::*;

    #[test]
    fn remove_accepts_string_array_or_dest() {
        let m = manifest(
            r#"{"actions": [
                {"action": "remove", "files": "a.txt"},
                {"action": "remove", "files": ["b.txt", "c/d.txt"]},
                {"action": "remove", "dest": "e.txt"}
            ]}"#,
        );
        assert_eq!(
            m.actions,
            vec![
                Action::Remove {
                    paths: vec!["a.txt".into()]
                },
                Action::Remove {
                    paths: vec!["b.txt".into(), "c/d.txt".into()]
                },
                Action::Remove {
                    paths: vec!["e.txt".into()]
                },
            ]
        );
    }

    #[test]
    fn clone_dest_defaults_to_root() {
        let m = manifest(r#"{"actions": [{"action": "clone", "src": "owner/repo", "cache": false}]}"#);
        assert_eq!(
            m.actions,
            vec![Action::Clone {
                src: "owner/repo".into(),
                dest: ".".into()
            }]
        );
    }

    #[test]
    fn empty_object_has_no_actions() {
        assert!(manifest("{}").is_empty());
    }

    #[test]
    fn malformed_manifests_are_rejected() {
        let path = Path::new(MANIFEST_FILE);
        for json in [
            "not json",
            r#"{"actions": [{"action": "rename", "src": "a"}]}"#,
            r#"{"actions": [{"action": "clone"}]}"#,
            r#"{"actions": [{"action": "remove"}]}"#,
        ] {
            let err = ActionManifest::parse(json, path).unwrap_err();
            assert!(
                matches!(err, DegitError::InvalidManifest { .. }),
                "{json}: {err:?}"
            );
        }
    }

    #[test]
    fn load_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(ActionManifest::load(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn load_reads_manifest_from_root() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(MANIFEST_FILE),
            r#"{"actions": [{"action": "remove", "files": ["x"]}]}"#,
        )
        .unwrap();
        assert_eq!(ActionManifest::load(tmp.path()).unwrap().actions.len(), 1);
    }
}

mod remove_tests {
    use super::*;

    #[tokio::test]
    async fn removes_files_and_directories() {
        let (_tmp, root) = tree();
        let m = manifest(r#"{"actions": [{"action": "remove", "files": ["secrets.txt", "docs"]}]}"#);

        ActionRunner::local().apply(&m, &root, &root).await.unwrap();

        assert!(!root.join("secrets.txt").exists());
        assert!(!root.join("docs").exists());
        assert!(root.join("README.md").exists());
    }

    #[tokio::test]
    async fn missing_paths_are_ignored() {
        let (_tmp, root) = tree();
        let m = manifest(r#"{"actions": [{"action": "remove", "files": ["nope.txt"]}]}"#);
        ActionRunner::local().apply(&m, &root, &root).await.unwrap();
    }

    #[tokio::test]
    async fn traversal_stops_the_run() {
        let (_tmp, root) = tree();
        let m = manifest(
            r#"{"actions": [
                {"action": "remove", "files": "../outside.txt"},
                {"action": "remove", "files": "secrets.txt"}
            ]}"#,
        );
        fs::write(root.parent().unwrap().join("outside.txt"), "keep").unwrap();

        let err = ActionRunner::local().apply(&m, &root, &root).await.unwrap_err();

        assert!(matches!(err, DegitError::UnsafeActionPath { .. }));
        assert!(root.parent().unwrap().join("outside.txt").exists());
        assert!(root.join("secrets.txt").exists());
    }

    #[tokio::test]
    async fn root_cannot_be_removed() {
        let (_tmp, root) = tree();
        for path in [".", "docs/.."] {
            let m = manifest(&format!(
                r#"{{"actions": [{{"action": "remove", "files": "{path}"}}]}}"#
            ));
            let err = ActionRunner::local().apply(&m, &root, &root).await.unwrap_err();
            assert!(matches!(err, DegitError::UnsafeActionPath { .. }));
        }
        assert!(root.join("README.md").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_parents_are_refused() {
        let (tmp, root) = tree();
        let outside = tmp.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("victim.txt"), "keep").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let m = manifest(r#"{"actions": [{"action": "remove", "files": "link/victim.txt"}]}"#);
        let err = ActionRunner::local().apply(&m, &root, &root).await.unwrap_err();

        assert!(matches!(err, DegitError::UnsafeActionPath { .. }));
        assert!(outside.join("victim.txt").exists());
    }
}

mod clone_tests {
    use super::*;

    #[tokio::test]
    async fn copies_local_subtree() {
        let (_tmp, root) = tree();
        let m = manifest(r#"{"actions": [{"action": "clone", "src": "docs", "dest": "copy/of/docs"}]}"#);

        ActionRunner::local().apply(&m, &root, &root).await.unwrap();

        assert_eq!(fs::read_to_string(root.join("copy/of/docs/guide.md")).unwrap(), "guide");
        assert!(root.join("docs/guide.md").exists());
    }

    #[tokio::test]
    async fn local_file_overwrites_target() {
        let (_tmp, root) = tree();
        let m = manifest(r#"{"actions": [{"action": "clone", "src": "README.md", "dest": "secrets.txt"}]}"#);

        ActionRunner::local().apply(&m, &root, &root).await.unwrap();

        assert_eq!(fs::read_to_string(root.join("secrets.txt")).unwrap(), "readme");
    }

    #[tokio::test]
    async fn directory_replaces_existing_directory() {
        let (_tmp, root) = tree();
        fs::create_dir_all(root.join("out/nested")).unwrap();
        fs::write(root.join("out/stale.txt"), "stale").unwrap();
        fs::write(root.join("out/nested/old.txt"), "old").unwrap();
        let m = manifest(r#"{"actions": [{"action": "clone", "src": "docs", "dest": "out"}]}"#);

        ActionRunner::local().apply(&m, &root, &root).await.unwrap();

        let names: Vec<_> = fs::read_dir(root.join("out"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("guide.md")]);
        assert_eq!(fs::read_to_string(root.join("out/guide.md")).unwrap(), "guide");
    }

    #[tokio::test]
    async fn file_can_replace_its_parent_directory() {
        let (_tmp, root) = tree();
        let m = manifest(r#"{"actions": [{"action": "clone", "src": "docs/guide.md", "dest": "docs"}]}"#);

        ActionRunner::local().apply(&m, &root, &root).await.unwrap();

        assert_eq!(fs::read_to_string(root.join("docs")).unwrap(), "guide");
    }

    #[tokio::test]
    async fn directory_into_itself_is_refused() {
        let (_tmp, root) = tree();
        let m = manifest(r#"{"actions": [{"action": "clone", "src": "docs", "dest": "docs/inner"}]}"#);
        let err = ActionRunner::local().apply(&m, &root, &root).await.unwrap_err();
        assert!(matches!(err, DegitError::UnsafeActionPath { .. }));
    }

    #[tokio::test]
    async fn escaping_destination_is_refused() {
        let (_tmp, root) = tree();
        let m = manifest(r#"{"actions": [{"action": "clone", "src": "docs", "dest": "../elsewhere"}]}"#);
        let err = ActionRunner::local().apply(&m, &root, &root).await.unwrap_err();
        assert!(matches!(err, DegitError::UnsafeActionPath { .. }));
        assert!(!root.parent().unwrap().join("elsewhere").exists());
    }

    #[tokio::test]
    async fn unknown_source_goes_to_remote_fetcher() {
        let (_tmp, root) = tree();
        let fetcher = RecordingFetcher::default();
        let m = manifest(
            r#"{"actions": [{"action": "clone", "src": "github:owner/other#v1", "dest": "vendor/other"}]}"#,
        );

        ActionRunner::with_remote(&fetcher)
            .apply(&m, &root, &root)
            .await
            .unwrap();

        let calls = fetcher.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "github:owner/other#v1");
        assert_eq!(calls[0].1, root.join("vendor/other"));
        assert!(root.join("vendor/other/remote.txt").exists());
    }

    #[tokio::test]
    async fn remote_source_without_fetcher_fails() {
        let (_tmp, root) = tree();
        let m = manifest(r#"{"actions": [{"action": "clone", "src": "owner/other"}]}"#);
        let err = ActionRunner::local().apply(&m, &root, &root).await.unwrap_err();
        assert!(matches!(err, DegitError::BadSpecifier { .. }));
    }

    #[tokio::test]
    async fn actions_run_in_order() {
        let (_tmp, root) = tree();
        let m = manifest(
            r#"{"actions": [
                {"action": "clone", "src": "secrets.txt", "dest": "kept.txt"},
                {"action": "remove", "files": "secrets.txt"}
            ]}"#,
        );

        ActionRunner::local().apply(&m, &root, &root).await.unwrap();

        assert_eq!(fs::read_to_string(root.join("kept.txt")).unwrap(), "hunter2");
        assert!(!root.join("secrets.txt").exists());
    }
}
