// Object Storage Service (OSS) backend
//
// Works with AWS S3, MinIO, Aliyun OSS and any S3-compatible service,
// through OpenDAL.

#[cfg(feature = "oss")]
mod inner {
    use crate::backend::HlsStorage;
    use async_trait::async_trait;
    use bytes::Bytes;
    use opendal::{services::S3, Operator};
    use std::io::{Error, ErrorKind, Result};
    use std::time::Duration;

    /// OSS storage configuration
    #[derive(Debug, Clone)]
    pub struct OssConfig {
        /// OSS endpoint (e.g., "s3.amazonaws.com" or "http://minio:9000")
        pub endpoint: String,
        pub access_key_id: String,
        pub secret_access_key: String,
        pub bucket: String,
        /// Region (for S3)
        pub region: Option<String>,
        /// Key prefix in bucket (e.g., "hls/")
        pub base_path: String,
        /// Public URL prefix for serving (e.g., "<https://cdn.example.com/hls>/").
        /// Presigned URLs are generated when empty.
        pub public_url_prefix: String,
        /// Presigned URL expiration in seconds
        pub presign_expires_in: u64,
    }

    /// OSS storage backend
    pub struct OssStorage {
        config: OssConfig,
        operator: Operator,
    }

    impl OssStorage {
        pub fn new(config: OssConfig) -> Result<Self> {
            tracing::info!(
                "Initializing OSS storage: bucket={}, endpoint={}",
                config.bucket,
                config.endpoint
            );

            let mut builder = S3::default()
                .endpoint(&config.endpoint)
                .access_key_id(&config.access_key_id)
                .secret_access_key(&config.secret_access_key)
                .bucket(&config.bucket);

            if let Some(region) = &config.region {
                builder = builder.region(region);
            }

            let operator = Operator::new(builder)
                .map_err(|e| Error::other(format!("OSS init failed: {e}")))?
                .finish();

            Ok(Self { config, operator })
        }

        /// Bucket path for a storage key, under `base_path`
        fn object_path(&self, key: &str) -> String {
            let prefix = self.config.base_path.trim_matches('/');
            if prefix.is_empty() {
                key.to_string()
            } else {
                format!("{prefix}/{key}")
            }
        }
    }

    // Keep NotFound and the transient kinds distinguishable for the publisher's retry
    fn io_error(op: &str, path: &str, e: &opendal::Error) -> Error {
        let kind = match e.kind() {
            opendal::ErrorKind::NotFound => ErrorKind::NotFound,
            opendal::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            opendal::ErrorKind::RateLimited => ErrorKind::WouldBlock,
            _ if e.is_temporary() => ErrorKind::TimedOut,
            _ => ErrorKind::Other,
        };
        Error::new(kind, format!("OSS {op} {path} failed: {e}"))
    }

    #[async_trait]
    impl HlsStorage for OssStorage {
        async fn write(&self, key: &str, data: Bytes) -> Result<()> {
            let path = self.object_path(key);
            let size = data.len();

            self.operator
                .write(&path, data)
                .await
                .map_err(|e| io_error("write", &path, &e))?;

            tracing::trace!(path = %path, bytes = size, "Uploaded object");

            Ok(())
        }

        async fn read(&self, key: &str) -> Result<Bytes> {
            let path = self.object_path(key);

            let buffer = self
                .operator
                .read(&path)
                .await
                .map_err(|e| io_error("read", &path, &e))?;

            Ok(buffer.to_bytes())
        }

        async fn delete(&self, key: &str) -> Result<()> {
            let path = self.object_path(key);

            self.operator
                .delete(&path)
                .await
                .map_err(|e| io_error("delete", &path, &e))?;

            Ok(())
        }

        async fn exists(&self, key: &str) -> Result<bool> {
            let path = self.object_path(key);
            self.operator
                .exists(&path)
                .await
                .map_err(|e| io_error("stat", &path, &e))
        }

        async fn get_public_url(&self, key: &str) -> Result<Option<String>> {
            let path = self.object_path(key);

            let prefix = self.config.public_url_prefix.trim_end_matches('/');
            if !prefix.is_empty() {
                return Ok(Some(format!("{prefix}/{path}")));
            }

            // No CDN in front of the bucket: hand out a time-limited link
            let expires_in = Duration::from_secs(self.config.presign_expires_in);
            let presigned = self
                .operator
                .presign_read(&path, expires_in)
                .await
                .map_err(|e| io_error("presign", &path, &e))?;

            Ok(Some(presigned.uri().to_string()))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn config(public_url_prefix: &str) -> OssConfig {
            OssConfig {
                endpoint: "http://minio.example.com:9000".to_string(),
                access_key_id: "test".to_string(),
                secret_access_key: "test".to_string(),
                bucket: "hls".to_string(),
                region: Some("us-east-1".to_string()),
                base_path: "live/".to_string(),
                public_url_prefix: public_url_prefix.to_string(),
                presign_expires_in: 3600,
            }
        }

        #[tokio::test]
        async fn test_cdn_locator_for_segment() {
            let storage = OssStorage::new(config("https://cdn.example.com/hls/")).unwrap();

            let url = storage.get_public_url("abcdef0123/0/seg0.ts").await.unwrap();
            assert_eq!(
                url.as_deref(),
                Some("https://cdn.example.com/hls/live/abcdef0123/0/seg0.ts")
            );
        }

        #[test]
        fn test_object_path_prefix() {
            let storage = OssStorage::new(config("")).unwrap();
            assert_eq!(storage.object_path("9f86d081"), "live/9f86d081");

            let mut bare = config("");
            bare.base_path = String::new();
            let storage = OssStorage::new(bare).unwrap();
            assert_eq!(storage.object_path("9f86d081"), "9f86d081");
        }

        #[test]
        fn test_error_kinds_survive_mapping() {
            let not_found = opendal::Error::new(opendal::ErrorKind::NotFound, "missing");
            assert_eq!(io_error("read", "live/a", &not_found).kind(), ErrorKind::NotFound);

            let throttled = opendal::Error::new(opendal::ErrorKind::RateLimited, "slow down");
            assert_eq!(io_error("write", "live/a", &throttled).kind(), ErrorKind::WouldBlock);
        }
    }
}

#[cfg(feature = "oss")]
pub use inner::*;

// Without the `oss` feature the types still exist so configuration code compiles
#[cfg(not(feature = "oss"))]
mod stub {
    use crate::backend::HlsStorage;
    use async_trait::async_trait;
    use bytes::Bytes;

    fn unsupported() -> std::io::Error {
        std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "OSS storage requires the `oss` feature to be enabled",
        )
    }

    /// OSS storage configuration (requires `oss` feature)
    #[derive(Debug, Clone)]
    pub struct OssConfig {
        pub endpoint: String,
        pub access_key_id: String,
        pub secret_access_key: String,
        pub bucket: String,
        pub region: Option<String>,
        pub base_path: String,
        pub public_url_prefix: String,
        pub presign_expires_in: u64,
    }

    /// OSS storage backend (requires `oss` feature)
    pub struct OssStorage;

    impl OssStorage {
        pub fn new(_config: OssConfig) -> std::io::Result<Self> {
            Err(unsupported())
        }
    }

    #[async_trait]
    impl HlsStorage for OssStorage {
        async fn write(&self, _key: &str, _data: Bytes) -> std::io::Result<()> {
            Err(unsupported())
        }

        async fn read(&self, _key: &str) -> std::io::Result<Bytes> {
            Err(unsupported())
        }

        async fn delete(&self, _key: &str) -> std::io::Result<()> {
            Err(unsupported())
        }

        async fn exists(&self, _key: &str) -> std::io::Result<bool> {
            Err(unsupported())
        }
    }
}

#[cfg(not(feature = "oss"))]
pub use stub::*;
