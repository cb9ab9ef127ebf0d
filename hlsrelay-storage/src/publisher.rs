// Segment publisher: turns a local file into a remote locator
//
// `SegmentPublisher` is the capability the ingestion pipeline depends on.
// `StoragePublisher` implements it on top of any `HlsStorage` backend.

use crate::backend::HlsStorage;
use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::io::{Error, ErrorKind, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Publishes one local file and returns where it can be fetched from.
///
/// Called from a background task; every call yields exactly one result.
#[async_trait]
pub trait SegmentPublisher: Send + Sync {
    async fn publish(&self, local_path: &Path, publish_name: &str) -> Result<String>;
}

/// How published files are keyed in the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLayout {
    /// Hex SHA-256 of the content. Identical files share one object.
    ContentAddressed,
    /// `{publish_name}/{variant}/{file_name}`, or `{publish_name}/{file_name}`
    /// for files directly inside the session directory.
    Named,
}

pub struct StoragePublisher {
    storage: Arc<dyn HlsStorage>,
    layout: KeyLayout,
    public_base_url: Option<String>,
}

impl StoragePublisher {
    pub fn new(storage: Arc<dyn HlsStorage>, layout: KeyLayout) -> Self {
        Self {
            storage,
            layout,
            public_base_url: None,
        }
    }

    /// Prefix for locators when the backend has no public URL of its own
    #[must_use]
    pub fn with_public_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.public_base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    fn object_key(&self, local_path: &Path, publish_name: &str, data: &[u8]) -> Result<String> {
        match self.layout {
            KeyLayout::ContentAddressed => Ok(hex::encode(Sha256::digest(data))),
            KeyLayout::Named => {
                let file_name = local_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| {
                        Error::new(
                            ErrorKind::InvalidInput,
                            format!("No file name in {}", local_path.display()),
                        )
                    })?;
                let parent = local_path
                    .parent()
                    .and_then(Path::file_name)
                    .and_then(|n| n.to_str())
                    .filter(|parent| *parent != publish_name);

                Ok(match parent {
                    Some(variant) => format!("{publish_name}/{variant}/{file_name}"),
                    None => format!("{publish_name}/{file_name}"),
                })
            }
        }
    }

    async fn locator(&self, key: &str) -> Result<String> {
        if let Some(url) = self.storage.get_public_url(key).await? {
            return Ok(url);
        }
        Ok(match &self.public_base_url {
            Some(base) => format!("{base}/{key}"),
            None => key.to_string(),
        })
    }
}

#[async_trait]
impl SegmentPublisher for StoragePublisher {
    async fn publish(&self, local_path: &Path, publish_name: &str) -> Result<String> {
        let data = Bytes::from(tokio::fs::read(local_path).await?);
        let key = self.object_key(local_path, publish_name, &data)?;

        // A failed lookup only costs a redundant upload
        let already_stored = self.layout == KeyLayout::ContentAddressed
            && match self.storage.exists(&key).await {
                Ok(exists) => exists,
                Err(e) => {
                    tracing::debug!(key = %key, "Existence check failed, uploading: {}", e);
                    false
                }
            };
        if already_stored {
            tracing::trace!(key = %key, "Content already stored, skipping write");
        } else {
            write_with_retry(self.storage.as_ref(), &key, data).await?;
        }

        let locator = self.locator(&key).await?;
        tracing::debug!(
            publish_name = %publish_name,
            path = %local_path.display(),
            locator = %locator,
            "Published file"
        );
        Ok(locator)
    }
}

/// Write data to storage with exponential backoff retry (via `backon` crate)
///
/// Retries transient storage failures (timeouts, connection errors) up to
/// 3 times with exponential backoff (100ms base, 2s max, with jitter).
async fn write_with_retry(storage: &dyn HlsStorage, key: &str, data: Bytes) -> Result<()> {
    use backon::{BackoffBuilder, ExponentialBuilder};

    let backoff = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(3)
        .with_jitter()
        .build();

    let mut last_err = None;
    for delay in std::iter::once(Duration::ZERO).chain(backoff) {
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }

        match storage.write(key, data.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) if is_transient_error(&e) => {
                tracing::warn!("Storage write failed: {} - retrying", e);
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| Error::other("Retry exhausted")))
}

/// Check if an I/O error is transient and worth retrying
fn is_transient_error(err: &Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::TimedOut
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
    )
}
