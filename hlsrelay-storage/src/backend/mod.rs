// Storage backends for published HLS content
//
// - FileStorage: local directory (default)
// - MemoryStorage: in-process, bounded (tests, single-node demos)
// - OssStorage: S3-compatible object storage via OpenDAL (`oss` feature)

pub mod file;
pub mod memory;
pub mod oss;

use async_trait::async_trait;
use bytes::Bytes;
use std::io::Result;

/// Key/value storage for published files.
///
/// The backend knows nothing about sessions or playlists; the publisher
/// decides the key and turns it into a locator.
#[async_trait]
pub trait HlsStorage: Send + Sync {
    /// Write data under `key`, replacing any previous value
    async fn write(&self, key: &str, data: Bytes) -> Result<()>;

    /// Read data, `NotFound` if the key is absent
    async fn read(&self, key: &str) -> Result<Bytes>;

    /// Delete data, a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if key exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Public URL for direct access, if the backend has one.
    ///
    /// - `Ok(Some(url))` - CDN or presigned URL
    /// - `Ok(None)` - served by this process; caller builds the URL
    async fn get_public_url(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use oss::{OssConfig, OssStorage};
