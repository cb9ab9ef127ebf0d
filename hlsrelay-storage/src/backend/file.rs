// File system storage backend
//
// Keys map to relative paths under `base_path` ("abc123" or
// "publish/0/seg0.ts"). Keys that could escape the base directory are
// rejected. Writes go through a temporary sibling and a rename so readers
// never observe a partially written file.

use super::HlsStorage;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::{Error, ErrorKind, Result};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// File system storage backend
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create new file storage with base path
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Resolve a key to a path below `base_path`
    fn get_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let is_safe = !key.is_empty()
            && !key.contains('\\')
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !is_safe {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Invalid storage key: {key}"),
            ));
        }

        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl HlsStorage for FileStorage {
    async fn write(&self, key: &str, data: Bytes) -> Result<()> {
        let file_path = self.get_path(key)?;
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut tmp_name = file_path.as_os_str().to_owned();
        tmp_name.push(".part");
        let tmp_path = PathBuf::from(tmp_name);

        let size = data.len();
        fs::write(&tmp_path, &data).await?;
        fs::rename(&tmp_path, &file_path).await?;

        tracing::trace!("Wrote: {:?} ({} bytes) for key: {}", file_path, size, key);

        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Bytes> {
        let file_path = self.get_path(key)?;
        let data = fs::read(&file_path).await?;

        tracing::trace!("Read: {:?} ({} bytes) for key: {}", file_path, data.len(), key);

        Ok(Bytes::from(data))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let file_path = self.get_path(key)?;
        match fs::remove_file(&file_path).await {
            Ok(()) => {
                tracing::trace!("Deleted: {:?} for key: {}", file_path, key);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let file_path = self.get_path(key)?;
        fs::try_exists(&file_path).await
    }
}
