use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub transcode: TranscodeConfig,
    pub watcher: WatcherConfig,
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8889,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Where the transcoder writes and where the rewritten tree is served from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Root watched for transcoder output (one directory per publish name)
    pub private_hls_path: String,
    /// Root of the public tree served to players
    pub public_hls_path: String,
    pub master_file_name: String,
    pub variant_file_name: String,
    /// Number of quality tiers the transcoder emits per session
    pub quality_count: usize,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            private_hls_path: "hls/private".to_string(),
            public_hls_path: "hls/public".to_string(),
            master_file_name: "index.m3u8".to_string(),
            variant_file_name: "stream.m3u8".to_string(),
            quality_count: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub poll_interval_ms: u64,
    /// Session directories with shorter names are transient and ignored
    pub min_publish_name_len: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            min_publish_name_len: 10,
        }
    }
}

/// Delivery gateways.
///
/// Locators returned by storage embed `default_gateway`; every entry in
/// `sub_gateways` gets a mirrored set of playlists with the host swapped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub default_gateway: String,
    pub sub_gateways: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_gateway: "http://localhost:8888".to_string(),
            sub_gateways: Vec::new(),
        }
    }
}

/// Storage backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    /// No remote publishing; segments are served from their local path
    None,
    /// Local directory
    #[default]
    File,
    /// In-process memory (testing, demos)
    Memory,
    /// S3-compatible object storage
    Oss,
}

/// How published files are keyed inside the storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyLayoutKind {
    /// Key is the SHA-256 of the file content
    #[default]
    ContentAddressed,
    /// Key is `{publish_name}/{variant}/{file_name}`
    Named,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    pub key_layout: KeyLayoutKind,
    /// Prefix used to build locators when the backend has no public URL.
    /// Defaults to `{gateway.default_gateway}/content` when unset.
    pub public_base_url: Option<String>,
    pub file: FileStorageConfig,
    pub memory: MemoryStorageConfig,
    pub oss: OssStorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    pub base_path: String,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            base_path: "hls/content".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStorageConfig {
    pub max_keys: usize,
    pub max_memory_bytes: usize,
}

impl Default for MemoryStorageConfig {
    fn default() -> Self {
        Self {
            max_keys: 10_000,
            max_memory_bytes: 512 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OssStorageConfig {
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub region: Option<String>,
    /// Key prefix inside the bucket (e.g. "hls/")
    pub base_path: String,
    /// CDN prefix; presigned URLs are generated when empty
    pub public_url_prefix: String,
    pub presign_expires_in: u64,
}

impl Default for OssStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            bucket: String::new(),
            region: None,
            base_path: String::new(),
            public_url_prefix: String::new(),
            presign_expires_in: 3600,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // HLSRELAY_SERVER__HTTP_PORT, HLSRELAY_TRANSCODE__QUALITY_COUNT, ...
        builder = builder.add_source(
            Environment::with_prefix("HLSRELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Get HTTP address
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }

    /// Collect every configuration problem instead of stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let transcode = &self.transcode;
        if transcode.private_hls_path.is_empty() {
            errors.push("transcode.private_hls_path must not be empty".to_string());
        }
        if transcode.public_hls_path.is_empty() {
            errors.push("transcode.public_hls_path must not be empty".to_string());
        }
        if transcode.private_hls_path == transcode.public_hls_path {
            errors.push("transcode.private_hls_path and transcode.public_hls_path must differ".to_string());
        }
        // Variant folders are single-character indexes, so at most 0..=9
        if !(1..=10).contains(&transcode.quality_count) {
            errors.push(format!(
                "transcode.quality_count must be between 1 and 10, got {}",
                transcode.quality_count
            ));
        }
        for (field, name) in [
            ("master_file_name", &transcode.master_file_name),
            ("variant_file_name", &transcode.variant_file_name),
        ] {
            if !name.ends_with(".m3u8") || name.contains('/') {
                errors.push(format!("transcode.{field} must be a bare .m3u8 file name, got '{name}'"));
            }
        }

        if self.watcher.poll_interval_ms == 0 {
            errors.push("watcher.poll_interval_ms must be greater than 0".to_string());
        }
        if self.watcher.min_publish_name_len == 0 {
            errors.push("watcher.min_publish_name_len must be greater than 0".to_string());
        }

        for gateway in std::iter::once(&self.gateway.default_gateway).chain(&self.gateway.sub_gateways) {
            match url::Url::parse(gateway) {
                Ok(url) if url.host_str().is_some() => {}
                Ok(_) => errors.push(format!("gateway '{gateway}' has no host")),
                Err(e) => errors.push(format!("gateway '{gateway}' is not a valid URL: {e}")),
            }
        }

        if self.storage.backend == StorageBackendKind::Oss {
            let oss = &self.storage.oss;
            if oss.endpoint.is_empty() {
                errors.push("storage.oss.endpoint is required for the oss backend".to_string());
            }
            if oss.bucket.is_empty() {
                errors.push("storage.oss.bucket is required for the oss backend".to_string());
            }
        }
        if self.storage.backend == StorageBackendKind::File && self.storage.file.base_path.is_empty() {
            errors.push("storage.file.base_path is required for the file backend".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Resolve and load the configuration file.
///
/// Lookup order: explicit path > `HLSRELAY_CONFIG_PATH` > `./config.yaml` >
/// `/config/config.yaml`. Missing files fall back to defaults + environment.
pub fn load_config(explicit: Option<&str>) -> anyhow::Result<Config> {
    let config_path = explicit
        .map(ToString::to_string)
        .or_else(|| std::env::var("HLSRELAY_CONFIG_PATH").ok())
        .filter(|p| Path::new(p).exists())
        .or_else(|| {
            ["config.yaml", "/config/config.yaml"]
                .into_iter()
                .find(|p| Path::new(p).exists())
                .map(ToString::to_string)
        });

    let config = if let Some(path) = config_path {
        eprintln!("Loading config from {path}");
        Config::from_file(&path).map_err(|e| anyhow::anyhow!("Failed to load {path}: {e}"))?
    } else {
        eprintln!("No config file found, using defaults and environment");
        Config::from_env()?
    };

    Ok(config)
}
