//! Background cache refresh task.
//!
//! # Responsibilities
//! - Walk the cache directory for pointer files every interval
//! - Fetch each pointer's URL and replace the content file
//! - Keep going when individual entries fail
//!
//! # Design Decisions
//! - The body is streamed into `.<name>.part` and renamed over the content
//!   file only after the whole body arrived; a failed fetch leaves the
//!   previous content in place
//! - Non-2xx responses are failures
//! - Every fetch is bounded by `fetch_timeout`

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;

use crate::observability::metrics;
use crate::refresh::pointer::{discover, PointerFile};

/// Errors for a single cache entry (or the directory walk).
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pointer file {} is empty", .0.display())]
    EmptyPointer(PathBuf),

    #[error("invalid source URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported URL scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
}

/// Outcome of one pass over the cache directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub updated: usize,
    pub failed: usize,
}

/// Periodically re-fetches every pointer file's URL.
#[derive(Debug, Clone)]
pub struct CacheRefresher {
    cache_dir: PathBuf,
    interval: Duration,
    client: reqwest::Client,
}

impl CacheRefresher {
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        interval: Duration,
        fetch_timeout: Duration,
        tls: Arc<ClientConfig>,
    ) -> Result<Self, RefreshError> {
        let client = reqwest::Client::builder()
            .use_preconfigured_tls((*tls).clone())
            .timeout(fetch_timeout)
            .build()?;

        Ok(Self {
            cache_dir: cache_dir.into(),
            interval,
            client,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Run refresh passes until shutdown is signalled.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            cache_dir = %self.cache_dir.display(),
            interval_secs = self.interval.as_secs(),
            "Cache refresher starting"
        );

        loop {
            let report = tokio::select! {
                report = self.refresh_once() => report,
                _ = shutdown.recv() => break,
            };
            tracing::debug!(updated = report.updated, failed = report.failed, "Cache refresh pass finished");

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!("Cache refresher stopped");
    }

    /// Refresh every entry once.
    pub async fn refresh_once(&self) -> RefreshReport {
        let mut report = RefreshReport::default();

        let pointers = match discover(&self.cache_dir).await {
            Ok(pointers) => pointers,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to scan cache directory");
                return report;
            }
        };

        for pointer in &pointers {
            match self.refresh_entry(pointer).await {
                Ok(bytes) => {
                    report.updated += 1;
                    metrics::record_cache_refresh(true);
                    tracing::info!(entry = %pointer.name, bytes, "Cache entry updated");
                }
                Err(e) => {
                    report.failed += 1;
                    metrics::record_cache_refresh(false);
                    tracing::warn!(entry = %pointer.name, error = %e, "Cache entry refresh failed");
                }
            }
        }

        report
    }

    async fn refresh_entry(&self, pointer: &PointerFile) -> Result<u64, RefreshError> {
        let url = pointer.read_url().await?;
        let response = self.client.get(url).send().await?.error_for_status()?;

        let temp = pointer.temp_path();
        let result = write_body(response, &temp, &pointer.content).await;
        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(&temp).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(path = %temp.display(), error = %e, "Failed to remove partial download");
                }
            }
        }
        result
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> RefreshError {
    let path = path.to_path_buf();
    move |source| RefreshError::Io { path, source }
}

async fn write_body(mut response: reqwest::Response, temp: &Path, target: &Path) -> Result<u64, RefreshError> {
    let mut file = tokio::fs::File::create(temp).await.map_err(io_error(temp))?;
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await.map_err(io_error(temp))?;
        written += chunk.len() as u64;
    }
    file.sync_all().await.map_err(io_error(temp))?;
    drop(file);

    tokio::fs::rename(temp, target).await.map_err(io_error(target))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::tls::client_config;

    fn refresher(dir: &Path) -> CacheRefresher {
        CacheRefresher::new(dir, Duration::from_secs(60), Duration::from_secs(2), client_config().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        // Port 9 (discard) on loopback refuses connections.
        std::fs::write(dir.path().join("lib.js.txt"), "http://127.0.0.1:9/lib.js").unwrap();
        std::fs::write(dir.path().join("lib.js"), "previous").unwrap();

        let report = refresher(dir.path()).refresh_once().await;

        assert_eq!(report, RefreshReport { updated: 0, failed: 1 });
        assert_eq!(std::fs::read_to_string(dir.path().join("lib.js")).unwrap(), "previous");
        assert!(!dir.path().join(".lib.js.part").exists());
    }

    #[tokio::test]
    async fn missing_directory_is_an_empty_pass() {
        let dir = tempfile::tempdir().unwrap();
        let report = refresher(&dir.path().join("absent")).refresh_once().await;
        assert_eq!(report, RefreshReport::default());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(refresher(dir.path()).run(rx));

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    }
}
