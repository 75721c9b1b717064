//! Snapshot downloads over HTTP(S).

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::LOCATION;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::config::normalize_proxy;
use crate::error::{DegitError, DownloadStatus, IoContext, Result};

/// Maximum number of redirects followed for one download.
pub const MAX_REDIRECTS: usize = 5;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP client that follows redirects itself so the hop count is bounded
/// and every hop's status is visible.
#[derive(Debug, Clone)]
pub struct SnapshotClient {
    client: reqwest::Client,
}

impl SnapshotClient {
    /// Build a client, routing all traffic through `proxy` when given.
    pub fn new(proxy: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("degit/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT);

        if let Some(proxy) = proxy {
            let proxy = normalize_proxy(proxy);
            tracing::debug!(%proxy, "using proxy");
            builder = builder.proxy(reqwest::Proxy::all(&proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Download `url` into `dest`.
    ///
    /// 3xx responses are followed through their `Location` header, at most
    /// [`MAX_REDIRECTS`] times. Any status >= 400 fails with that hop's code.
    /// The body is streamed to a temporary sibling and renamed into place,
    /// so `dest` never holds a partial archive.
    pub async fn fetch_snapshot(&self, url: &str, dest: &Path) -> Result<()> {
        let mut current = Url::parse(url)
            .map_err(|e| DegitError::bad_specifier(url, format!("invalid URL: {e}")))?;

        for hop in 0..=MAX_REDIRECTS {
            let response = self.client.get(current.clone()).send().await?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| DegitError::DownloadFailed {
                        url: current.to_string(),
                        status: DownloadStatus::Http(status.as_u16()),
                    })?;
                let next = current.join(location).map_err(|e| {
                    DegitError::bad_specifier(location, format!("invalid redirect target: {e}"))
                })?;
                tracing::debug!(hop, from = %current, to = %next, status = status.as_u16(), "following redirect");
                current = next;
                continue;
            }

            if status.as_u16() >= 400 {
                return Err(DegitError::DownloadFailed {
                    url: current.to_string(),
                    status: DownloadStatus::Http(status.as_u16()),
                });
            }

            tracing::info!(url = %current, "downloading snapshot");
            return write_body(response, dest).await;
        }

        Err(DegitError::DownloadFailed {
            url: current.to_string(),
            status: DownloadStatus::RedirectLimit(MAX_REDIRECTS),
        })
    }
}

async fn write_body(mut response: reqwest::Response, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .io_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let tmp_path = part_path(dest);
    let result = async {
        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .io_context(|| format!("Failed to create file: {}", tmp_path.display()))?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)
                .await
                .io_context(|| format!("Failed to write file: {}", tmp_path.display()))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .io_context(|| format!("Failed to flush file: {}", tmp_path.display()))?;
        drop(file);

        tokio::fs::rename(&tmp_path, dest).await.io_context(|| {
            format!(
                "Failed to move {} into place at {}",
                tmp_path.display(),
                dest.display()
            )
        })?;
        tracing::debug!(bytes = written, dest = %dest.display(), "snapshot written");
        Ok::<(), DegitError>(())
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp_path).await;
    }
    result
}

/// Temporary download name next to `dest`.
fn part_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    dest.with_file_name(format!("{name}.{}.part", std::process::id()))
}
