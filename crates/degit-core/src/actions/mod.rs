//! Post-fetch actions declared by the fetched tree's `degit.json`.
//!
//! ```json
//! {
//!   "actions": [
//!     { "action": "clone", "src": "owner/other-repo", "dest": "vendor/other" },
//!     { "action": "remove", "files": ["LICENSE", "docs/internal.md"] }
//!   ]
//! }
//! ```
//!
//! Every path is relative to the destination root and must stay inside it.

mod manifest;
mod runner;

pub use manifest::{Action, ActionManifest};
pub use runner::{ActionRunner, FetchFuture, MAX_NESTED_CLONES, RemoteFetcher};

/// Manifest file name looked up at the root of the fetched tree.
pub const MANIFEST_FILE: &str = "degit.json";

#[cfg(test)]
mod tests;
