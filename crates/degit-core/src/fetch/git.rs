//! Shallow clones through the external git client.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::config::normalize_proxy;
use crate::error::{DegitError, IoContext, Result};
use crate::fs::remove_path;
use crate::source::DEFAULT_REF;

/// Timeout for a single git invocation.
const GIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Variables that would redirect git away from the clone target.
const GIT_ENV_OVERRIDES: [&str; 4] = ["GIT_DIR", "GIT_WORK_TREE", "GIT_INDEX_FILE", "GIT_COMMON_DIR"];

/// Runs `git` subprocesses for clone-mode retrieval.
#[derive(Debug, Clone, Default)]
pub struct GitClient {
    proxy: Option<String>,
}

impl GitClient {
    pub fn new(proxy: Option<&str>) -> Self {
        Self {
            proxy: proxy.map(normalize_proxy),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("git");
        for key in GIT_ENV_OVERRIDES {
            cmd.env_remove(key);
        }
        // Fail fast instead of prompting for credentials.
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.env("GIT_SSH_COMMAND", "ssh -o BatchMode=yes");
        if let Some(proxy) = &self.proxy {
            cmd.env("HTTPS_PROXY", proxy);
            cmd.env("HTTP_PROXY", proxy);
        }
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        cmd
    }

    /// Clone `url` at depth 1 into `dest`, then delete `dest/.git` so the
    /// result looks like a snapshot.
    ///
    /// Branch and tag names are passed as `--branch`. A full commit id is
    /// fetched by id into a fresh repository instead, since `--branch`
    /// rejects commits.
    pub async fn clone_shallow(&self, url: &str, dest: &Path, reference: Option<&str>) -> Result<()> {
        tracing::info!(url, dest = %dest.display(), reference, "cloning repository");
        match reference.filter(|r| *r != DEFAULT_REF) {
            Some(commit) if is_commit_id(commit) => self.fetch_commit(url, dest, commit).await?,
            reference => {
                let mut cmd = self.command();
                cmd.args(["clone", "--depth=1", "--quiet"]);
                if let Some(r) = reference {
                    cmd.args(["--branch", r]);
                }
                cmd.arg("--").arg(url).arg(dest);
                run(cmd, "git clone").await?;
            }
        }

        remove_path(&dest.join(".git"))?;
        Ok(())
    }

    async fn fetch_commit(&self, url: &str, dest: &Path, commit: &str) -> Result<()> {
        let mut init = self.command();
        init.args(["init", "--quiet", "--"]).arg(dest);
        run(init, "git init").await?;

        let mut fetch = self.command();
        fetch
            .arg("-C")
            .arg(dest)
            .args(["fetch", "--depth=1", "--quiet", "--", url, commit]);
        run(fetch, "git fetch").await?;

        let mut checkout = self.command();
        checkout
            .arg("-C")
            .arg(dest)
            .args(["checkout", "--quiet", "FETCH_HEAD"]);
        run(checkout, "git checkout").await?;
        Ok(())
    }

    /// Ask the remote which branch `HEAD` points at.
    ///
    /// Returns `None` when the remote does not advertise a symbolic `HEAD`.
    pub async fn resolve_default_branch(&self, url: &str) -> Result<Option<String>> {
        let mut cmd = self.command();
        cmd.args(["ls-remote", "--symref", "--", url, "HEAD"]);

        let output = run(cmd, "git ls-remote").await?;
        let branch = parse_symref(&String::from_utf8_lossy(&output.stdout));
        tracing::debug!(url, branch = ?branch, "resolved default branch");
        Ok(branch)
    }
}

/// Run a git command to completion; a non-zero exit becomes `CloneFailed`.
async fn run(mut cmd: Command, what: &str) -> Result<std::process::Output> {
    let output = match tokio::time::timeout(GIT_TIMEOUT, cmd.output()).await {
        Ok(output) => output.io_context(|| format!("Failed to run {what}"))?,
        Err(_) => {
            return Err(DegitError::CloneFailed {
                exit_code: None,
                stderr: format!("{what} timed out after {}s", GIT_TIMEOUT.as_secs()),
            });
        }
    };
    if !output.status.success() {
        return Err(DegitError::CloneFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

/// A full SHA-1 or SHA-256 object id. Abbreviated ids cannot be fetched.
fn is_commit_id(reference: &str) -> bool {
    matches!(reference.len(), 40 | 64) && reference.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Extract `main` from `ref: refs/heads/main\tHEAD`.
fn parse_symref(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let rest = line.strip_prefix("ref:")?;
        let target = rest.split_whitespace().next()?;
        Some(target.strip_prefix("refs/heads/").unwrap_or(target).to_string())
    })
}
