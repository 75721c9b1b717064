//! Degit Core Library
//!
//! Scaffolds a directory from the current tree of a remote repository:
//! resolves a source specifier, retrieves a snapshot archive or shallow
//! clone, caches snapshots, extracts them and replays the fetched tree's
//! `degit.json` actions.

pub mod actions;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod fs;
pub mod pipeline;
pub mod source;
pub mod stash;

pub use error::{DegitError, DownloadStatus, Result};
pub use pipeline::{Degit, ScaffoldOutcome};

/// Re-exports of commonly used types
pub mod prelude {
    // Pipeline
    pub use crate::config::DegitOptions;
    pub use crate::pipeline::{Degit, ScaffoldOutcome};

    // Source
    pub use crate::source::{Host, RetrievalMode, SourceDescriptor, SourceResolver};

    // Cache and retrieval
    pub use crate::cache::{CacheRecord, CacheStore};
    pub use crate::fetch::{RetrievedArtifact, Retriever};

    // Actions
    pub use crate::actions::{Action, ActionManifest, ActionRunner, RemoteFetcher};

    // Errors
    pub use crate::error::{DegitError, DownloadStatus, Result};
}
