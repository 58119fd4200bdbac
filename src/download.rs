use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures::StreamExt;
use reqwest::{Client, Url};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::format::format_size;

pub fn build_client(connect_timeout: Duration) -> Result<Client> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

pub fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("Invalid URL '{raw}'"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        bail!("Only http/https URLs are supported");
    }
    Ok(url)
}

/// Last non-empty path segment of the URL; query and fragment are ignored.
pub fn file_name_from_url(url: &Url) -> Result<String> {
    url.path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(|s| s.to_string())
        .filter(|s| s != "." && s != "..")
        .with_context(|| format!("Cannot determine a file name from URL '{url}'"))
}

/// Stream `url` into `dest`, truncating whatever is there. Returns bytes written.
///
/// Bodies larger than `max_bytes` are refused; a partially written `dest` is
/// removed on any failure after it was created.
pub async fn fetch_to_file(
    client: &Client,
    url: Url,
    dest: &Path,
    max_bytes: u64,
) -> Result<u64> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("HTTP request to {url} failed"))?
        .error_for_status()
        .with_context(|| format!("HTTP request to {url} failed"))?;
    if let Some(len) = response.content_length()
        && len > max_bytes
    {
        bail!(too_large(max_bytes));
    }

    let file = fs::File::create(dest)
        .await
        .with_context(|| format!("Cannot create {}", dest.display()))?;
    let written = write_body(response, file, dest, max_bytes).await;
    if written.is_err()
        && let Err(rm) = fs::remove_file(dest).await
        && rm.kind() != std::io::ErrorKind::NotFound
    {
        warn!(dest = %dest.display(), "failed to clean up partial download: {rm}");
    }
    written
}

async fn write_body(
    response: reqwest::Response,
    mut file: fs::File,
    dest: &Path,
    max_bytes: u64,
) -> Result<u64> {
    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Failed to read response body")?;
        written += chunk.len() as u64;
        if written > max_bytes {
            bail!(too_large(max_bytes));
        }
        file.write_all(&chunk)
            .await
            .with_context(|| format!("Cannot write {}", dest.display()))?;
    }
    file.flush().await?;
    Ok(written)
}

fn too_large(max_bytes: u64) -> String {
    format!("Download exceeds size limit of {}", format_size(max_bytes))
}

/// Detached downloads keyed by destination path.
///
/// A task's outcome is only visible on disk: the file is complete on success
/// and removed on failure.
#[derive(Debug, Clone, Default)]
pub struct DownloadRegistry {
    tasks: Arc<Mutex<HashMap<PathBuf, JoinHandle<()>>>>,
}

impl DownloadRegistry {
    pub fn spawn(&self, client: Client, url: Url, dest: PathBuf, max_bytes: u64) {
        let task_dest = dest.clone();
        let handle = tokio::spawn(async move {
            match fetch_to_file(&client, url.clone(), &task_dest, max_bytes).await {
                Ok(bytes) => {
                    debug!(%url, dest = %task_dest.display(), bytes, "background download completed");
                }
                Err(err) => {
                    warn!(%url, dest = %task_dest.display(), "background download failed: {err:#}");
                    if let Err(rm) = fs::remove_file(&task_dest).await
                        && rm.kind() != std::io::ErrorKind::NotFound
                    {
                        warn!(dest = %task_dest.display(), "failed to clean up partial download: {rm}");
                    }
                }
            }
        });

        let mut tasks = self.lock();
        tasks.retain(|_, h| !h.is_finished());
        tasks.insert(dest, handle);
    }

    /// Destinations whose transfer has not finished yet.
    pub fn in_flight(&self) -> Vec<PathBuf> {
        self.lock()
            .iter()
            .filter(|(_, h)| !h.is_finished())
            .map(|(p, _)| p.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub async fn wait(&self, dest: &Path) {
        let handle = self.lock().remove(dest);
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
