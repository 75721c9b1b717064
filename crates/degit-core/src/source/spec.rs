//! Source descriptor types.

use std::fmt;
use std::str::FromStr;

use super::hosts::{self, HostEntry};

/// Placeholder ref meaning "the remote's default branch".
pub const DEFAULT_REF: &str = "HEAD";

/// Supported hosting providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Host {
    GitHub,
    GitLab,
    Bitbucket,
    Sourcehut,
    /// Any other git remote; only reachable through a clone.
    Generic,
}

impl Host {
    /// Keyword used in `host:owner/repo` specifiers.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Generic => "git",
            known => hosts::entry(known).map_or("git", |e| e.keyword),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// How a source is transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RetrievalMode {
    /// Compressed archive over HTTPS.
    #[default]
    Snapshot,
    /// Depth-1 clone through the external git client.
    Git,
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snapshot => f.write_str("tar"),
            Self::Git => f.write_str("git"),
        }
    }
}

impl FromStr for RetrievalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tar" | "snapshot" => Ok(Self::Snapshot),
            "git" => Ok(Self::Git),
            other => Err(format!("unknown mode '{other}', expected 'tar' or 'git'")),
        }
    }
}

/// A fully parsed source specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Hosting provider.
    pub host: Host,
    /// Site domain, e.g. `github.com`.
    pub site: String,
    /// Owner, user, or group path.
    pub owner: String,
    /// Repository name without `.git`.
    pub repo: String,
    /// Branch, tag, or commit. `HEAD` when not given.
    pub reference: String,
    /// Subdirectory filter applied after extraction.
    pub subdir: Option<String>,
    /// Retrieval mode.
    pub mode: RetrievalMode,
    /// Whether the specifier used the `git@host:` form.
    pub ssh: bool,
    /// Remote URL handed to `git clone`.
    pub remote_url: String,
}

impl SourceDescriptor {
    /// Build a descriptor for a host from the static table.
    pub(crate) fn known(
        entry: &HostEntry,
        owner: String,
        repo: String,
        reference: Option<String>,
        subdir: Option<String>,
        ssh: bool,
    ) -> Self {
        let remote_url = if ssh {
            format!("git@{}:{}/{}", entry.site, owner, repo)
        } else {
            format!("https://{}/{}/{}", entry.site, owner, repo)
        };
        Self {
            host: entry.host,
            site: entry.site.to_string(),
            owner,
            repo,
            reference: reference.unwrap_or_else(|| DEFAULT_REF.to_string()),
            subdir,
            mode: RetrievalMode::Snapshot,
            ssh,
            remote_url,
        }
    }

    /// Override the retrieval mode.
    pub fn with_mode(mut self, mode: RetrievalMode) -> Self {
        self.mode = mode;
        self
    }

    /// Whether the ref is still the default-branch placeholder.
    pub fn uses_default_ref(&self) -> bool {
        self.reference == DEFAULT_REF
    }

    /// Whether this host's snapshot endpoint rejects `HEAD`.
    pub fn needs_concrete_ref(&self) -> bool {
        hosts::entry(self.host).is_some_and(|e| e.concrete_ref)
    }

    /// Snapshot archive URL at `reference`, or `None` for generic remotes.
    pub fn snapshot_url(&self, reference: &str) -> Option<String> {
        hosts::entry(self.host).map(|e| e.snapshot_url(&self.owner, &self.repo, reference))
    }

    /// HTTPS URL of the repository, used for `git ls-remote`.
    pub fn https_url(&self) -> String {
        match self.host {
            Host::Generic => self.remote_url.clone(),
            _ => format!("https://{}/{}/{}", self.site, self.owner, self.repo),
        }
    }

    /// Directory name to scaffold into when none is given.
    pub fn default_dest_name(&self) -> &str {
        &self.repo
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.owner, self.repo)?;
        if let Some(subdir) = &self.subdir {
            write!(f, "/{subdir}")?;
        }
        write!(f, "#{}", self.reference)
    }
}
