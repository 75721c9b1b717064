//! `degit.json` manifest parsing.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{DegitError, IoContext, Result};

use super::MANIFEST_FILE;

/// One post-fetch action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Copy `src` (a path in the fetched tree, or a source specifier) to
    /// `dest`, relative to the destination root.
    Clone { src: String, dest: String },
    /// Delete each path, relative to the destination root.
    Remove { paths: Vec<String> },
}

/// Ordered list of actions read from the fetched tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionManifest {
    pub actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    actions: Vec<RawAction>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum RawAction {
    Clone {
        src: String,
        #[serde(default)]
        dest: Option<String>,
    },
    Remove {
        #[serde(default)]
        dest: Option<String>,
        #[serde(default)]
        files: Option<OneOrMany>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl ActionManifest {
    /// Read `degit.json` from `root`. A missing file yields an empty manifest.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(MANIFEST_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err)
                    .io_context(|| format!("Failed to read manifest: {}", path.display()));
            }
        };
        Self::parse(&content, &path)
    }

    /// Parse manifest JSON; `path` is used in error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let invalid = |message: String| DegitError::InvalidManifest {
            path: path.to_path_buf(),
            message,
        };

        let raw: RawManifest = serde_json::from_str(content).map_err(|e| invalid(e.to_string()))?;
        let mut actions = Vec::with_capacity(raw.actions.len());
        for (i, action) in raw.actions.into_iter().enumerate() {
            actions.push(match action {
                RawAction::Clone { src, dest } => Action::Clone {
                    src,
                    dest: dest.unwrap_or_else(|| ".".to_string()),
                },
                RawAction::Remove { dest, files } => {
                    let mut paths: Vec<String> = dest.into_iter().collect();
                    match files {
                        Some(OneOrMany::One(file)) => paths.push(file),
                        Some(OneOrMany::Many(files)) => paths.extend(files),
                        None => {}
                    }
                    if paths.is_empty() {
                        return Err(invalid(format!(
                            "action {i}: remove needs 'dest' or 'files'"
                        )));
                    }
                    Action::Remove { paths }
                }
            });
        }
        Ok(Self { actions })
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
