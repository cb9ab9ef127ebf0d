// Session lifecycle hooks
//
// Called by the ingestion layer when a publisher connects and disconnects.
// Ending a session turns the accumulated history into a static VOD set
// under `{output_root}/{publish_name}/vods/{timestamp}/`.

use crate::gateway::GatewayMirror;
use crate::output::{copy_master, write_with_mirrors};
use crate::registry::SessionRegistry;
use crate::vod::VodOutcome;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[async_trait]
pub trait SessionLifecycle: Send + Sync {
    async fn on_stream_start(&self, publish_name: &str);

    async fn on_stream_end(
        &self,
        publish_name: &str,
        output_root: &Path,
        master_file_name: &str,
    ) -> VodOutcome;
}

pub struct VodLifecycle {
    registry: Arc<SessionRegistry>,
    gateways: GatewayMirror,
    variant_file_name: String,
    quality_count: usize,
}

impl VodLifecycle {
    pub fn new(
        registry: Arc<SessionRegistry>,
        gateways: GatewayMirror,
        variant_file_name: impl Into<String>,
        quality_count: usize,
    ) -> Self {
        Self {
            registry,
            gateways,
            variant_file_name: variant_file_name.into(),
            quality_count,
        }
    }
}

#[async_trait]
impl SessionLifecycle for VodLifecycle {
    async fn on_stream_start(&self, publish_name: &str) {
        if self.registry.start_session(publish_name, self.quality_count) {
            tracing::info!(publish_name = %publish_name, "Stream started");
        }
    }

    async fn on_stream_end(
        &self,
        publish_name: &str,
        output_root: &Path,
        master_file_name: &str,
    ) -> VodOutcome {
        let Some(accumulator) = self.registry.take_accumulator(publish_name) else {
            self.registry.remove_stream(publish_name);
            tracing::debug!(publish_name = %publish_name, "Stream end for inactive session");
            return VodOutcome::Skipped;
        };

        let stream_dir = output_root.join(publish_name);
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let vod_dir = unique_vod_dir(&stream_dir.join("vods"), &timestamp).await;

        let mut tiers_written = 0;
        for index in 0..accumulator.tier_count() {
            let playlist = accumulator.render_variant(index);
            let tier_dir = vod_dir.join(index.to_string());
            match write_with_mirrors(&tier_dir, &self.variant_file_name, &playlist, &self.gateways)
                .await
            {
                Ok(()) => tiers_written += 1,
                Err(e) => tracing::error!(
                    publish_name = %publish_name,
                    variant = index,
                    "Failed to write VOD playlist: {}",
                    e
                ),
            }
        }

        if let Err(e) = copy_master(
            &stream_dir.join(master_file_name),
            &vod_dir,
            master_file_name,
            &self.variant_file_name,
            &self.gateways,
        )
        .await
        {
            tracing::warn!(publish_name = %publish_name, "Failed to copy master into VOD: {}", e);
        }

        self.registry.remove_stream(publish_name);
        tracing::info!(
            publish_name = %publish_name,
            dir = %vod_dir.display(),
            tiers_written,
            "Stream ended, VOD written"
        );

        VodOutcome::Written {
            dir: vod_dir,
            tiers_written,
        }
    }
}

/// `vods/{timestamp}`, or the first free `vods/{timestamp}-{n}`
async fn unique_vod_dir(vods: &Path, timestamp: &str) -> PathBuf {
    let mut candidate = vods.join(timestamp);
    let mut suffix = 0;
    // An unreadable directory counts as free; the write reports the real error
    while tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        suffix += 1;
        candidate = vods.join(format!("{timestamp}-{suffix}"));
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn lifecycle(registry: Arc<SessionRegistry>, sub_gateways: &[String]) -> VodLifecycle {
        let gateways = GatewayMirror::new("http://localhost:8888", sub_gateways).unwrap();
        VodLifecycle::new(registry, gateways, "stream.m3u8", 2)
    }

    #[tokio::test]
    async fn test_start_then_end_writes_every_tier() {
        let dir = tempdir().unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let hooks = lifecycle(registry.clone(), &[]);
        std::fs::create_dir_all(dir.path().join("abcdef0123")).unwrap();
        std::fs::write(
            dir.path().join("abcdef0123/index.m3u8"),
            "#EXTM3U\n0/stream.m3u8\n",
        )
        .unwrap();

        hooks.on_stream_start("abcdef0123").await;
        for line in [
            "#EXT-X-VERSION:3",
            "#EXT-X-TARGETDURATION:4",
            "#EXTINF:4.0,",
            "cid:Qm0?fileName=seg0.ts",
        ] {
            registry.accumulate("abcdef0123", 0, line);
        }

        let outcome = hooks.on_stream_end("abcdef0123", dir.path(), "index.m3u8").await;

        let VodOutcome::Written { dir: vod_dir, tiers_written } = outcome else {
            panic!("expected VOD output");
        };
        assert_eq!(tiers_written, 2);
        assert!(vod_dir.starts_with(dir.path().join("abcdef0123/vods")));
        assert_eq!(
            std::fs::read_to_string(vod_dir.join("0/stream.m3u8")).unwrap(),
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:4\n#EXT-X-PLAYLIST-TYPE:VOD\n\
             #EXTINF:4.0,\ncid:Qm0?fileName=seg0.ts\n#EXT-X-ENDLIST\n"
        );
        assert!(vod_dir.join("1/stream.m3u8").is_file());
        assert!(vod_dir.join("index.m3u8").is_file());
        assert!(!registry.contains("abcdef0123"));
    }

    #[tokio::test]
    async fn test_second_end_is_noop() {
        let dir = tempdir().unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let hooks = lifecycle(registry, &[]);

        hooks.on_stream_start("abcdef0123").await;
        let first = hooks.on_stream_end("abcdef0123", dir.path(), "index.m3u8").await;
        let second = hooks.on_stream_end("abcdef0123", dir.path(), "index.m3u8").await;

        assert!(matches!(first, VodOutcome::Written { .. }));
        assert_eq!(second, VodOutcome::Skipped);
        let vods: Vec<_> = std::fs::read_dir(dir.path().join("abcdef0123/vods"))
            .unwrap()
            .collect();
        assert_eq!(vods.len(), 1);
    }

    #[tokio::test]
    async fn test_end_without_master_still_tears_down() {
        let dir = tempdir().unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let hooks = lifecycle(registry.clone(), &["http://gw2:9000".to_string()]);

        hooks.on_stream_start("abcdef0123").await;
        let outcome = hooks.on_stream_end("abcdef0123", dir.path(), "index.m3u8").await;

        let VodOutcome::Written { dir: vod_dir, tiers_written } = outcome else {
            panic!("expected VOD output");
        };
        assert_eq!(tiers_written, 2);
        assert!(vod_dir.join("0/gw2:9000_stream.m3u8").is_file());
        assert!(!vod_dir.join("index.m3u8").exists());
        assert!(!registry.contains("abcdef0123"));
    }

    #[tokio::test]
    async fn test_end_of_unknown_session() {
        let dir = tempdir().unwrap();
        let hooks = lifecycle(Arc::new(SessionRegistry::new()), &[]);

        let outcome = hooks.on_stream_end("never-started", dir.path(), "index.m3u8").await;
        assert_eq!(outcome, VodOutcome::Skipped);
        assert!(!dir.path().join("never-started").exists());
    }

    #[tokio::test]
    async fn test_vod_dir_never_reused() {
        let dir = tempdir().unwrap();
        let vods = dir.path().join("vods");
        let timestamp = "2026-10-18T12:00:00.123Z";

        assert_eq!(unique_vod_dir(&vods, timestamp).await, vods.join(timestamp));

        std::fs::create_dir_all(vods.join(timestamp)).unwrap();
        std::fs::create_dir_all(vods.join(format!("{timestamp}-1"))).unwrap();
        assert_eq!(
            unique_vod_dir(&vods, timestamp).await,
            vods.join(format!("{timestamp}-2"))
        );
    }

    #[tokio::test]
    async fn test_restarted_session_gets_a_new_vod() {
        let dir = tempdir().unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let hooks = lifecycle(registry, &[]);

        let mut dirs = Vec::new();
        for segment in ["cid:A?fileName=seg0.ts", "cid:B?fileName=seg0.ts"] {
            hooks.on_stream_start("abcdef0123").await;
            hooks.registry.accumulate("abcdef0123", 0, segment);
            let VodOutcome::Written { dir: vod_dir, .. } =
                hooks.on_stream_end("abcdef0123", dir.path(), "index.m3u8").await
            else {
                panic!("expected VOD output");
            };
            dirs.push(vod_dir);
        }

        assert_ne!(dirs[0], dirs[1]);
        assert!(std::fs::read_to_string(dirs[0].join("0/stream.m3u8"))
            .unwrap()
            .contains("cid:A"));
        assert!(std::fs::read_to_string(dirs[1].join("0/stream.m3u8"))
            .unwrap()
            .contains("cid:B"));
    }
}
