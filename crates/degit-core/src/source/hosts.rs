//! Static table of supported hosting providers.
//!
//! This is the only place host-specific knowledge lives. Adding a host
//! means adding one entry here and one `Host` variant.

use super::spec::Host;

/// URL shape and ref requirements for one hosting provider.
#[derive(Debug)]
pub struct HostEntry {
    pub host: Host,
    /// Keyword accepted in `keyword:owner/repo`.
    pub keyword: &'static str,
    /// Site domain.
    pub site: &'static str,
    /// Archive URL with `{owner}`, `{repo}` and `{ref}` placeholders.
    /// `{file_ref}` is the ref with `/` replaced by `-`, for use in a
    /// file name.
    pub snapshot_template: &'static str,
    /// The snapshot endpoint needs a branch name rather than `HEAD`.
    pub concrete_ref: bool,
}

impl HostEntry {
    /// Expand the snapshot template.
    pub fn snapshot_url(&self, owner: &str, repo: &str, reference: &str) -> String {
        self.snapshot_template
            .replace("{owner}", owner)
            .replace("{repo}", repo)
            .replace("{file_ref}", &reference.replace('/', "-"))
            .replace("{ref}", reference)
    }
}

/// Bare `owner/repo` specifiers use the first entry.
pub static HOSTS: [HostEntry; 4] = [
    HostEntry {
        host: Host::GitHub,
        keyword: "github",
        site: "github.com",
        snapshot_template: "https://github.com/{owner}/{repo}/archive/{ref}.tar.gz",
        concrete_ref: false,
    },
    HostEntry {
        host: Host::GitLab,
        keyword: "gitlab",
        site: "gitlab.com",
        snapshot_template: "https://gitlab.com/{owner}/{repo}/-/archive/{ref}/{repo}-{file_ref}.tar.gz",
        concrete_ref: false,
    },
    HostEntry {
        host: Host::Bitbucket,
        keyword: "bitbucket",
        site: "bitbucket.org",
        snapshot_template: "https://bitbucket.org/{owner}/{repo}/get/{ref}.tar.gz",
        concrete_ref: true,
    },
    HostEntry {
        host: Host::Sourcehut,
        keyword: "sourcehut",
        site: "git.sr.ht",
        snapshot_template: "https://git.sr.ht/{owner}/{repo}/archive/{ref}.tar.gz",
        concrete_ref: true,
    },
];

/// Look up a host entry; `None` for `Host::Generic`.
pub fn entry(host: Host) -> Option<&'static HostEntry> {
    HOSTS.iter().find(|e| e.host == host)
}

/// Look up a host by its specifier keyword.
pub fn by_keyword(keyword: &str) -> Option<&'static HostEntry> {
    HOSTS
        .iter()
        .find(|e| e.keyword.eq_ignore_ascii_case(keyword))
}

/// Look up a host by its site domain.
pub fn by_site(site: &str) -> Option<&'static HostEntry> {
    HOSTS.iter().find(|e| e.site.eq_ignore_ascii_case(site))
}
