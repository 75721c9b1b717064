//! Options threaded through the pipeline.

use std::path::PathBuf;

use crate::source::RetrievalMode;

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "DEGIT_CACHE_DIR";

/// Options for one scaffolding run.
///
/// The cache root is an explicit value rather than process-wide state so
/// tests can point it at an isolated directory.
#[derive(Debug, Clone)]
pub struct DegitOptions {
    /// Allow writing into a non-empty destination.
    pub force: bool,
    /// Retrieval mode override; `None` keeps the descriptor's mode.
    pub mode: Option<RetrievalMode>,
    /// HTTP(S) proxy, with or without a scheme.
    pub proxy: Option<String>,
    /// Root of the snapshot cache.
    pub cache_root: PathBuf,
    /// Ignore existing cache records and download again.
    pub refresh: bool,
}

impl DegitOptions {
    /// Options with the default cache root.
    pub fn new() -> Self {
        Self::with_cache_root(Self::default_cache_root())
    }

    /// Options rooted at an explicit cache directory.
    pub fn with_cache_root(cache_root: PathBuf) -> Self {
        Self {
            force: false,
            mode: None,
            proxy: None,
            cache_root,
            refresh: false,
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_mode(mut self, mode: Option<RetrievalMode>) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Default cache root.
    ///
    /// `$DEGIT_CACHE_DIR`, then `~/.degit`, then `<tmp>/.degit` when no
    /// home directory can be determined.
    pub fn default_cache_root() -> PathBuf {
        if let Some(dir) = std::env::var_os(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(dir);
        }
        dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(".degit")
    }

    /// Proxy URL with a scheme, `http://` being assumed when missing.
    pub fn normalized_proxy(&self) -> Option<String> {
        self.proxy.as_deref().map(normalize_proxy)
    }
}

impl Default for DegitOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Prepend `http://` to a proxy address that has no scheme.
pub fn normalize_proxy(proxy: &str) -> String {
    let proxy = proxy.trim();
    if proxy.contains("://") {
        proxy.to_string()
    } else {
        format!("http://{proxy}")
    }
}
