//! Source resolution.
//!
//! Turns a short specifier such as `owner/repo/subdir#v1.2` into a
//! [`SourceDescriptor`]: host, owner, repo, ref, subdirectory and
//! retrieval mode. Host-specific URL shapes live in [`hosts::HOSTS`].

pub mod hosts;
mod resolver;
mod spec;

pub use resolver::SourceResolver;
pub use spec::{DEFAULT_REF, Host, RetrievalMode, SourceDescriptor};
