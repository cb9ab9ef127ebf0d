// Watcher strategy
//
// Turns classified notifications into registry updates, published segments
// and rewritten playlists. All callbacks run on the dispatcher task, one at
// a time. Errors are returned to the dispatcher, which logs and moves on.
//
// A new `.ts` file is still being written when it first shows up, so it is
// only held as pending. It is published once the tier playlist lists it.

use crate::classifier::{session_of, FileKind, TierPath};
use crate::gateway::GatewayMirror;
use crate::model::Segment;
use crate::output::{copy_master, write_with_mirrors};
use crate::registry::SessionRegistry;
use crate::rewriter::{listed_segments, rewrite_playlist};
use crate::PipelineSettings;
use hlsrelay_core::{Error, Result};
use hlsrelay_storage::SegmentPublisher;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;

pub struct WatcherStrategy {
    settings: PipelineSettings,
    registry: Arc<SessionRegistry>,
    publisher: Option<Arc<dyn SegmentPublisher>>,
    gateways: GatewayMirror,
}

impl WatcherStrategy {
    pub fn new(
        settings: PipelineSettings,
        registry: Arc<SessionRegistry>,
        publisher: Option<Arc<dyn SegmentPublisher>>,
        gateways: GatewayMirror,
    ) -> Self {
        Self {
            settings,
            registry,
            publisher,
            gateways,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Route one classified path to its callback
    pub async fn handle(&self, kind: FileKind, path: &Path) -> Result<()> {
        match kind {
            FileKind::SessionStart => self.on_session_start(path).await,
            FileKind::Master => self.on_master(path).await,
            FileKind::Variant => self.on_variant(path).await,
            FileKind::Segment => self.on_segment(path).await,
            FileKind::Thumbnail => self.on_thumbnail(path).await,
            FileKind::Unrecognized => Ok(()),
        }
    }

    pub async fn on_session_start(&self, dir: &Path) -> Result<()> {
        let publish_name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidPath(dir.display().to_string()))?;

        let public_dir = self.settings.public_root.join(publish_name);
        tokio::fs::create_dir_all(&public_dir)
            .await
            .map_err(|e| Error::io(&public_dir, e))?;

        if self
            .registry
            .start_session(publish_name, self.settings.quality_count)
        {
            tracing::info!(publish_name = %publish_name, "Session started");
        } else {
            tracing::debug!(publish_name = %publish_name, "Session already registered");
        }
        Ok(())
    }

    pub async fn on_master(&self, path: &Path) -> Result<()> {
        let publish_name = session_of(path)?;
        let dest_dir = self.settings.public_root.join(&publish_name);

        copy_master(
            path,
            &dest_dir,
            &self.settings.master_file_name,
            &self.settings.variant_file_name,
            &self.gateways,
        )
        .await?;

        tracing::debug!(publish_name = %publish_name, "Master playlist published");
        Ok(())
    }

    pub async fn on_variant(&self, path: &Path) -> Result<()> {
        let info = TierPath::parse(path)?;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io(path, e))?;

        let closed = self.registry.take_listed(
            &info.publish_name,
            info.variant_index,
            &listed_segments(&content),
        )?;
        for local_path in closed {
            self.finalize_segment(&info.publish_name, info.variant_index, local_path)
                .await?;
        }

        let variant = self.registry.variant(&info.publish_name, info.variant_index)?;
        let registry = &self.registry;
        let rewritten = rewrite_playlist(&content, &variant, |line| {
            registry.accumulate(&info.publish_name, info.variant_index, line);
        });

        let tier_dir = self
            .settings
            .public_root
            .join(&info.publish_name)
            .join(info.variant_index.to_string());
        write_with_mirrors(&tier_dir, &info.file_name, &rewritten, &self.gateways).await?;

        tracing::trace!(
            publish_name = %info.publish_name,
            variant = info.variant_index,
            segments = variant.segments.len(),
            "Variant playlist rewritten"
        );
        Ok(())
    }

    pub async fn on_segment(&self, path: &Path) -> Result<()> {
        let info = TierPath::parse(path)?;
        // Growth of the same file notifies again
        if !self
            .registry
            .add_pending(&info.publish_name, info.variant_index, path)?
        {
            tracing::trace!(path = %path.display(), "Segment already known");
            return Ok(());
        }
        tracing::trace!(path = %path.display(), "Segment pending");

        // The playlist may have been handled before this notification
        let playlist = path.with_file_name(&self.settings.variant_file_name);
        match tokio::fs::read_to_string(&playlist).await {
            Ok(content) if listed_segments(&content).contains(&info.file_name.as_str()) => {
                self.on_variant(&playlist).await
            }
            _ => Ok(()),
        }
    }

    async fn finalize_segment(
        &self,
        publish_name: &str,
        variant_index: usize,
        local_path: PathBuf,
    ) -> Result<()> {
        let remote_locator = self.publish(&local_path, publish_name).await;
        let file = local_path.file_name().map(|n| n.to_string_lossy().into_owned());
        let appended = self.registry.append_segment(Segment {
            publish_name: publish_name.to_string(),
            variant_index,
            local_path,
            remote_locator,
        })?;

        if appended {
            tracing::debug!(
                publish_name = %publish_name,
                variant = variant_index,
                file = ?file,
                "Segment appended"
            );
        }
        Ok(())
    }

    pub async fn on_thumbnail(&self, path: &Path) -> Result<()> {
        let publish_name = session_of(path)?;
        if !self.registry.contains(&publish_name) {
            return Err(Error::NotFound(format!(
                "session {publish_name} for thumbnail {}",
                path.display()
            )));
        }

        if self.publisher.is_some() {
            let locator = self.publish(path, &publish_name).await;
            tracing::debug!(publish_name = %publish_name, locator = %locator, "Thumbnail published");
        }
        Ok(())
    }

    /// Publish on a background task and wait for its single result.
    ///
    /// Falls back to the local path when there is no publisher or the
    /// publish fails, so the segment stays playable.
    async fn publish(&self, path: &Path, publish_name: &str) -> String {
        let fallback = path.to_string_lossy().into_owned();
        let Some(publisher) = self.publisher.clone() else {
            return fallback;
        };

        let (tx, rx) = oneshot::channel();
        let local_path = path.to_path_buf();
        let owner = publish_name.to_string();
        tokio::spawn(async move {
            let result = publisher.publish(&local_path, &owner).await;
            let _ = tx.send(result);
        });

        match rx.await {
            Ok(Ok(locator)) => locator,
            Ok(Err(e)) => {
                tracing::warn!(
                    publish_name = %publish_name,
                    path = %path.display(),
                    "Publish failed, serving local path: {}",
                    e
                );
                fallback
            }
            Err(_) => {
                tracing::error!(path = %path.display(), "Publish task ended without a result");
                fallback
            }
        }
    }
}
