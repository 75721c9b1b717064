//! Source resolver implementation.

use crate::error::{DegitError, Result};

use super::hosts::{self, HostEntry};
use super::spec::{DEFAULT_REF, Host, RetrievalMode, SourceDescriptor};

/// Resolves specifier strings into [`SourceDescriptor`]s.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    /// Host used for bare `owner/repo` specifiers.
    default_host: Host,
}

impl Default for SourceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceResolver {
    /// Create a resolver that maps bare shorthand to GitHub.
    pub fn new() -> Self {
        Self {
            default_host: Host::GitHub,
        }
    }

    /// Map bare shorthand to another known host.
    pub fn with_default_host(mut self, host: Host) -> Self {
        if host != Host::Generic {
            self.default_host = host;
        }
        self
    }

    /// Resolve a specifier.
    ///
    /// Dialects, first match wins:
    /// - `github:owner/repo[/subdir][#ref]` (also `gitlab:`, `bitbucket:`, `sourcehut:`)
    /// - `https://github.com/owner/repo[.git][/subdir][#ref]`
    /// - `git@github.com:owner/repo[/subdir][#ref]`
    /// - `owner/repo[/subdir][#ref]`
    /// - any other `https://`, `ssh://` or `git@` URL, cloned with git
    pub fn resolve(&self, specifier: &str) -> Result<SourceDescriptor> {
        let trimmed = specifier.trim();
        if trimmed.is_empty() {
            return Err(DegitError::bad_specifier(specifier, "empty specifier"));
        }

        let (body, reference) = split_fragment(trimmed);
        if let Some(r) = &reference {
            validate_ref(specifier, r)?;
        }

        let descriptor = self.resolve_body(specifier, body, reference)?;
        tracing::debug!(%descriptor, mode = %descriptor.mode, "resolved source");
        Ok(descriptor)
    }

    fn resolve_body(
        &self,
        specifier: &str,
        body: &str,
        reference: Option<String>,
    ) -> Result<SourceDescriptor> {
        // Explicit host keyword
        if let Some((keyword, rest)) = body.split_once(':')
            && !rest.starts_with("//")
            && let Some(entry) = hosts::by_keyword(keyword)
        {
            return parse_known(specifier, entry, rest, reference, false);
        }

        // Full HTTPS URL
        if let Some(after) = body.strip_prefix("https://") {
            let (site, path) = after.split_once('/').unwrap_or((after, ""));
            return match hosts::by_site(site) {
                Some(entry) => parse_known(specifier, entry, path, reference, false),
                None => parse_generic(specifier, "https://", site, '/', path, reference),
            };
        }

        // SCP-style SSH
        if let Some(after) = body.strip_prefix("git@") {
            let (site, path) = after
                .split_once(':')
                .ok_or_else(|| DegitError::bad_specifier(specifier, "expected git@host:path"))?;
            return match hosts::by_site(site) {
                Some(entry) => parse_known(specifier, entry, path, reference, true),
                None => parse_generic(specifier, "git@", site, ':', path, reference),
            };
        }

        // ssh:// URL
        if let Some(after) = body.strip_prefix("ssh://") {
            let (authority, path) = after.split_once('/').unwrap_or((after, ""));
            let site = authority.rsplit('@').next().unwrap_or(authority);
            if authority.starts_with("git@")
                && let Some(entry) = hosts::by_site(site)
            {
                return parse_known(specifier, entry, path, reference, true);
            }
            return parse_generic(specifier, "ssh://", authority, '/', path, reference);
        }

        if body.contains("://") {
            return Err(DegitError::bad_specifier(
                specifier,
                "only https:// and ssh:// URLs are supported",
            ));
        }

        // Known site without a scheme, e.g. `git.sr.ht/~user/repo`
        if let Some((first, rest)) = body.split_once('/')
            && let Some(entry) = hosts::by_site(first)
        {
            return parse_known(specifier, entry, rest, reference, false);
        }

        // Bare shorthand
        let entry = hosts::entry(self.default_host)
            .ok_or_else(|| DegitError::bad_specifier(specifier, "no default host"))?;
        parse_known(specifier, entry, body, reference, false)
    }
}

/// Split `body#ref` into its parts. An empty fragment counts as absent.
fn split_fragment(s: &str) -> (&str, Option<String>) {
    match s.split_once('#') {
        Some((body, fragment)) if !fragment.is_empty() => (body, Some(fragment.to_string())),
        Some((body, _)) => (body, None),
        None => (s, None),
    }
}

fn parse_known(
    specifier: &str,
    entry: &HostEntry,
    path: &str,
    reference: Option<String>,
    ssh: bool,
) -> Result<SourceDescriptor> {
    let segments = path_segments(specifier, path)?;
    if segments.len() < 2 {
        return Err(DegitError::bad_specifier(
            specifier,
            "expected owner/repo after the host",
        ));
    }

    let mut owner = segments[0].to_string();
    if entry.host == Host::Sourcehut && !owner.starts_with('~') {
        owner.insert(0, '~');
    }
    let repo = strip_git_suffix(segments[1]).to_string();
    validate_component(specifier, "owner", owner.trim_start_matches('~'))?;
    validate_component(specifier, "repo", &repo)?;

    let subdir = (segments.len() > 2).then(|| segments[2..].join("/"));

    Ok(SourceDescriptor::known(
        entry, owner, repo, reference, subdir, ssh,
    ))
}

/// Parse a remote on an unknown host. `prefix` and `separator` rebuild the
/// clone URL in the same shape the user wrote it.
fn parse_generic(
    specifier: &str,
    prefix: &str,
    authority: &str,
    separator: char,
    path: &str,
    reference: Option<String>,
) -> Result<SourceDescriptor> {
    if authority.is_empty() {
        return Err(DegitError::bad_specifier(specifier, "missing host"));
    }
    let segments = path_segments(specifier, path)?;

    // A `.git` segment ends the repository path; anything after it is a subdir.
    let repo_len = segments
        .iter()
        .position(|s| s.ends_with(".git"))
        .map_or(segments.len(), |i| i + 1);
    if repo_len < 2 {
        return Err(DegitError::bad_specifier(
            specifier,
            "expected owner/repo in the URL path",
        ));
    }

    let repo_path = segments[..repo_len].join("/");
    let owner = segments[..repo_len - 1].join("/");
    let repo = strip_git_suffix(segments[repo_len - 1]).to_string();
    validate_component(specifier, "repo", &repo)?;
    let subdir = (segments.len() > repo_len).then(|| segments[repo_len..].join("/"));
    let site = authority.rsplit('@').next().unwrap_or(authority).to_string();

    Ok(SourceDescriptor {
        host: Host::Generic,
        site,
        owner,
        repo,
        reference: reference.unwrap_or_else(|| DEFAULT_REF.to_string()),
        subdir,
        mode: RetrievalMode::Git,
        ssh: prefix != "https://",
        remote_url: format!("{prefix}{authority}{separator}{repo_path}"),
    })
}

fn path_segments<'a>(specifier: &str, path: &'a str) -> Result<Vec<&'a str>> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    for segment in &segments {
        if *segment == "." || *segment == ".." {
            return Err(DegitError::bad_specifier(
                specifier,
                "path segments must not be '.' or '..'",
            ));
        }
        if segment.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(DegitError::bad_specifier(
                specifier,
                "path contains whitespace or control characters",
            ));
        }
    }
    Ok(segments)
}

fn strip_git_suffix(s: &str) -> &str {
    s.strip_suffix(".git").unwrap_or(s)
}

fn validate_component(specifier: &str, label: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(DegitError::bad_specifier(
            specifier,
            format!("{label} must not be empty"),
        ));
    }
    let is_valid = value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    if !is_valid || value.starts_with('-') {
        return Err(DegitError::bad_specifier(
            specifier,
            format!("{label} contains invalid characters: '{value}'"),
        ));
    }
    Ok(())
}

/// Refs are handed to `git`, so option-like and traversal forms are refused.
fn validate_ref(specifier: &str, reference: &str) -> Result<()> {
    let is_valid = reference
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'/'));
    if !is_valid
        || reference.starts_with('-')
        || reference.contains("..")
        || reference.starts_with('/')
        || reference.ends_with('/')
    {
        return Err(DegitError::bad_specifier(
            specifier,
            format!("invalid ref '{reference}'"),
        ));
    }
    Ok(())
}
