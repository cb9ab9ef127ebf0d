// Live HLS ingestion pipeline
//
// Watches the transcoder's private output tree, publishes segments through a
// `SegmentPublisher`, keeps the public live playlists pointing at published
// locations and writes a VOD set when a session ends.

pub mod classifier;
pub mod gateway;
pub mod lifecycle;
pub mod model;
pub mod output;
pub mod registry;
pub mod rewriter;
pub mod strategy;
pub mod vod;
pub mod watcher;

pub use classifier::{Classifier, FileKind};
pub use gateway::GatewayMirror;
pub use lifecycle::{SessionLifecycle, VodLifecycle};
pub use registry::SessionRegistry;
pub use strategy::WatcherStrategy;
pub use vod::{VodAccumulator, VodOutcome};
pub use watcher::{Dispatcher, DispatcherHandle};

use hlsrelay_core::Config;
use hlsrelay_storage::SegmentPublisher;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Paths and naming shared by the strategy and the dispatcher
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub private_root: PathBuf,
    pub public_root: PathBuf,
    pub master_file_name: String,
    pub variant_file_name: String,
    pub quality_count: usize,
    pub min_publish_name_len: usize,
    pub poll_interval: Duration,
}

impl PipelineSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            private_root: PathBuf::from(&config.transcode.private_hls_path),
            public_root: PathBuf::from(&config.transcode.public_hls_path),
            master_file_name: config.transcode.master_file_name.clone(),
            variant_file_name: config.transcode.variant_file_name.clone(),
            quality_count: config.transcode.quality_count,
            min_publish_name_len: config.watcher.min_publish_name_len,
            poll_interval: Duration::from_millis(config.watcher.poll_interval_ms),
        }
    }
}

/// Strategy and lifecycle hooks sharing one registry
pub struct Pipeline {
    settings: PipelineSettings,
    registry: Arc<SessionRegistry>,
    strategy: Arc<WatcherStrategy>,
    lifecycle: Arc<VodLifecycle>,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        gateways: GatewayMirror,
        publisher: Option<Arc<dyn SegmentPublisher>>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let lifecycle = Arc::new(VodLifecycle::new(
            registry.clone(),
            gateways.clone(),
            settings.variant_file_name.clone(),
            settings.quality_count,
        ));
        let strategy = Arc::new(WatcherStrategy::new(
            settings.clone(),
            registry.clone(),
            publisher,
            gateways,
        ));

        Self {
            settings,
            registry,
            strategy,
            lifecycle,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn strategy(&self) -> &Arc<WatcherStrategy> {
        &self.strategy
    }

    #[must_use]
    pub fn lifecycle(&self) -> Arc<dyn SessionLifecycle> {
        self.lifecycle.clone()
    }

    #[must_use]
    pub fn classifier(&self) -> Classifier {
        Classifier::new(
            &self.settings.private_root,
            self.settings.min_publish_name_len,
        )
    }

    /// Dispatcher over the private root; call `start` to begin watching
    #[must_use]
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.classifier(),
            self.strategy.clone(),
            self.settings.poll_interval,
        )
    }
}
