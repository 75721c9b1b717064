use std::fs;

use tempfile::TempDir;

use degit_core::DegitError;
use degit_core::fetch::GitClient;

mod support;

#[tokio::test]
async fn clone_removes_git_metadata() {
    let temp = TempDir::new().unwrap();
    let origin = support::git_fixture(
        &temp.path().join("origin"),
        &[("README.md", "hello"), ("src/lib.rs", "pub fn x() {}")],
    );
    let dest = temp.path().join("checkout");

    GitClient::new(None)
        .clone_shallow(&support::file_url(&origin), &dest, None)
        .await
        .unwrap();

    assert_eq!(fs::read_to_string(dest.join("README.md")).unwrap(), "hello");
    assert!(dest.join("src/lib.rs").is_file());
    assert!(!dest.join(".git").exists());
}

#[tokio::test]
async fn clone_checks_out_named_branch() {
    let temp = TempDir::new().unwrap();
    let origin = support::git_fixture(&temp.path().join("origin"), &[("file.txt", "main")]);
    let dest = temp.path().join("checkout");

    GitClient::new(None)
        .clone_shallow(&support::file_url(&origin), &dest, Some("main"))
        .await
        .unwrap();

    assert_eq!(fs::read_to_string(dest.join("file.txt")).unwrap(), "main");
}

#[tokio::test]
async fn clone_checks_out_commit_id() {
    let temp = TempDir::new().unwrap();
    let origin = support::git_fixture(&temp.path().join("origin"), &[("file.txt", "pinned")]);
    let pinned = support::git_head(&origin);
    support::git_commit(&origin, &[("file.txt", "newer"), ("added.txt", "later")]);
    git2::Repository::open(&origin)
        .unwrap()
        .config()
        .unwrap()
        .set_bool("uploadpack.allowAnySHA1InWant", true)
        .unwrap();
    let dest = temp.path().join("checkout");

    GitClient::new(None)
        .clone_shallow(&support::file_url(&origin), &dest, Some(&pinned))
        .await
        .unwrap();

    assert_eq!(fs::read_to_string(dest.join("file.txt")).unwrap(), "pinned");
    assert!(!dest.join("added.txt").exists());
    assert!(!dest.join(".git").exists());
}

#[tokio::test]
async fn unknown_commit_id_reports_clone_failure() {
    let temp = TempDir::new().unwrap();
    let origin = support::git_fixture(&temp.path().join("origin"), &[("file.txt", "x")]);

    let err = GitClient::new(None)
        .clone_shallow(
            &support::file_url(&origin),
            &temp.path().join("checkout"),
            Some("0123456789abcdef0123456789abcdef01234567"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DegitError::CloneFailed { .. }));
}

#[tokio::test]
async fn missing_ref_reports_clone_failure() {
    let temp = TempDir::new().unwrap();
    let origin = support::git_fixture(&temp.path().join("origin"), &[("file.txt", "x")]);

    let err = GitClient::new(None)
        .clone_shallow(
            &support::file_url(&origin),
            &temp.path().join("checkout"),
            Some("no-such-branch"),
        )
        .await
        .unwrap_err();

    match err {
        DegitError::CloneFailed { exit_code, stderr } => {
            assert_ne!(exit_code, Some(0));
            assert!(!stderr.is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn missing_remote_reports_clone_failure() {
    let temp = TempDir::new().unwrap();
    let err = GitClient::new(None)
        .clone_shallow(
            &support::file_url(&temp.path().join("nowhere")),
            &temp.path().join("checkout"),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DegitError::CloneFailed { .. }));
}

#[tokio::test]
async fn default_branch_is_read_from_symref() {
    let temp = TempDir::new().unwrap();
    let origin = support::git_fixture(&temp.path().join("origin"), &[("file.txt", "x")]);

    let branch = GitClient::new(None)
        .resolve_default_branch(&support::file_url(&origin))
        .await
        .unwrap();

    assert_eq!(branch.as_deref(), Some("main"));
}
