// Storage backend selection

use anyhow::{Context, Result};
use hlsrelay_core::config::{KeyLayoutKind, StorageBackendKind};
use hlsrelay_core::Config;
use hlsrelay_storage::{
    FileStorage, HlsStorage, KeyLayout, MemoryStorage, OssConfig, OssStorage, SegmentPublisher,
    StoragePublisher,
};
use std::sync::Arc;
use tracing::info;

pub struct StorageWiring {
    /// Publishes segments for the pipeline; `None` serves local paths
    pub publisher: Option<Arc<dyn SegmentPublisher>>,
    /// Backend readable through `/content`, when this process serves it
    pub content: Option<Arc<dyn HlsStorage>>,
}

pub fn build_storage(config: &Config) -> Result<StorageWiring> {
    let storage_config = &config.storage;

    let (storage, served_locally): (Arc<dyn HlsStorage>, bool) = match storage_config.backend {
        StorageBackendKind::None => {
            info!("No storage backend configured, segments are served from local paths");
            return Ok(StorageWiring {
                publisher: None,
                content: None,
            });
        }
        StorageBackendKind::File => {
            info!("Using file storage at {}", storage_config.file.base_path);
            (Arc::new(FileStorage::new(&storage_config.file.base_path)), true)
        }
        StorageBackendKind::Memory => {
            info!(
                "Using memory storage (max {} keys, {} bytes)",
                storage_config.memory.max_keys, storage_config.memory.max_memory_bytes
            );
            (
                Arc::new(MemoryStorage::with_limits(
                    storage_config.memory.max_memory_bytes,
                    storage_config.memory.max_keys,
                )),
                true,
            )
        }
        StorageBackendKind::Oss => {
            let oss = &storage_config.oss;
            let storage = OssStorage::new(OssConfig {
                endpoint: oss.endpoint.clone(),
                access_key_id: oss.access_key_id.clone(),
                secret_access_key: oss.secret_access_key.clone(),
                bucket: oss.bucket.clone(),
                region: oss.region.clone(),
                base_path: oss.base_path.clone(),
                public_url_prefix: oss.public_url_prefix.clone(),
                presign_expires_in: oss.presign_expires_in,
            })
            .context("Failed to initialize OSS storage")?;
            (Arc::new(storage), false)
        }
    };

    let layout = match storage_config.key_layout {
        KeyLayoutKind::ContentAddressed => KeyLayout::ContentAddressed,
        KeyLayoutKind::Named => KeyLayout::Named,
    };
    let public_base_url = storage_config.public_base_url.clone().unwrap_or_else(|| {
        format!(
            "{}/content",
            config.gateway.default_gateway.trim_end_matches('/')
        )
    });

    let publisher = StoragePublisher::new(storage.clone(), layout).with_public_base_url(public_base_url);

    Ok(StorageWiring {
        publisher: Some(Arc::new(publisher)),
        content: served_locally.then_some(storage),
    })
}
