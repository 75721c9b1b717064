//! Error types for the scaffolding pipeline.

use std::fmt;
use std::path::PathBuf;

/// Result alias used throughout `degit-core`.
pub type Result<T> = std::result::Result<T, DegitError>;

/// Why a snapshot download stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// The server answered with this HTTP status code.
    Http(u16),
    /// The redirect chain exceeded the given number of hops.
    RedirectLimit(usize),
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(code) => write!(f, "HTTP {code}"),
            Self::RedirectLimit(hops) => write!(f, "redirect loop (more than {hops} hops)"),
        }
    }
}

/// Errors raised while resolving, fetching, or materializing a source.
#[derive(Debug, thiserror::Error)]
pub enum DegitError {
    /// The source string matched none of the recognized dialects.
    #[error("could not parse source specifier '{specifier}': {reason}")]
    BadSpecifier {
        /// The raw specifier.
        specifier: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A snapshot download failed.
    #[error("could not download {url}: {status}")]
    DownloadFailed {
        /// URL of the hop that failed.
        url: String,
        /// Status of the failing hop.
        status: DownloadStatus,
    },

    /// The external git client exited unsuccessfully.
    #[error("git clone failed (exit code {}): {stderr}", exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    CloneFailed {
        /// Exit code, or `None` when the process was killed or timed out.
        exit_code: Option<i32>,
        /// Captured standard error, verbatim.
        stderr: String,
    },

    /// The destination holds entries and no override was given.
    #[error("destination directory is not empty, aborting. Use --force to override: {}", path.display())]
    DestinationNotEmpty {
        /// The destination directory.
        path: PathBuf,
    },

    /// A manifest action tried to leave its root directory.
    #[error("unsafe action path '{path}': resolves outside the destination")]
    UnsafeActionPath {
        /// The offending path as declared.
        path: String,
    },

    /// `unstash` ran without a matching `stash`.
    #[error("nothing stashed in {}", dir.display())]
    NothingStashed {
        /// Directory that should have held the stash area.
        dir: PathBuf,
    },

    /// The requested subdirectory is absent from the fetched tree.
    #[error("subdirectory '{subdir}' not found in fetched repository")]
    SubdirNotFound {
        /// The requested subdirectory.
        subdir: String,
    },

    /// The `degit.json` manifest could not be parsed.
    #[error("invalid manifest {}: {message}", path.display())]
    InvalidManifest {
        /// Manifest location.
        path: PathBuf,
        /// Parse error message.
        message: String,
    },

    /// Nested `clone` actions went deeper than allowed.
    #[error("nested clone actions exceed the maximum depth of {limit}")]
    CloneDepthExceeded {
        /// The configured limit.
        limit: usize,
    },

    /// The descriptor cannot be retrieved in the requested mode.
    #[error("{host} sources cannot be retrieved in {mode} mode")]
    UnsupportedMode {
        /// Host keyword.
        host: String,
        /// Requested mode.
        mode: String,
    },

    /// The archive was malformed or contained an unsafe entry.
    #[error("archive error: {0}")]
    Archive(String),

    /// Transport-level HTTP failure (DNS, TLS, connection reset).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem failure with the operation that caused it.
    #[error("{context}: {source}")]
    Io {
        /// What was being done.
        context: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl DegitError {
    pub(crate) fn bad_specifier(specifier: &str, reason: impl Into<String>) -> Self {
        Self::BadSpecifier {
            specifier: specifier.to_string(),
            reason: reason.into(),
        }
    }
}

/// `with_context` for `std::io::Result`, yielding the typed [`DegitError::Io`].
pub(crate) trait IoContext<T> {
    fn io_context<S: Into<String>>(self, context: impl FnOnce() -> S) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<S: Into<String>>(self, context: impl FnOnce() -> S) -> Result<T> {
        self.map_err(|source| DegitError::Io {
            context: context().into(),
            source,
        })
    }
}
