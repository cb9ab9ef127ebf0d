// VOD accumulation and playlist synthesis
//
// Every rewritten live playlist line is fed through a `VodAccumulator`.
// The live playlist is a sliding window that is rewritten in full on every
// change, so the same tail arrives many times; segment lines are kept once,
// in first-seen order. When the stream ends the accumulated history becomes
// a static playlist per tier.

use serde::Serialize;
use std::path::PathBuf;

const VERSION_TAG: &str = "#EXT-X-VERSION";
const TARGET_DURATION_TAG: &str = "#EXT-X-TARGETDURATION";
const DURATION_TAG: &str = "#EXTINF";

#[derive(Debug, Clone, PartialEq, Eq)]
struct VodEntry {
    /// `#EXTINF` line that preceded the URI, if any
    duration: Option<String>,
    uri: String,
}

#[derive(Debug, Clone, Default)]
pub struct VodAccumulator {
    version: Option<String>,
    target_duration: Option<String>,
    /// First `#EXTINF` seen, used for entries that arrived without one
    default_duration: Option<String>,
    pending_duration: Vec<Option<String>>,
    tiers: Vec<Vec<VodEntry>>,
}

impl VodAccumulator {
    #[must_use]
    pub fn new(quality_count: usize) -> Self {
        Self {
            pending_duration: vec![None; quality_count],
            tiers: vec![Vec::new(); quality_count],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Accumulated segment URIs of one tier, in order
    #[must_use]
    pub fn segment_lines(&self, variant_index: usize) -> Vec<&str> {
        self.tiers
            .get(variant_index)
            .map(|entries| entries.iter().map(|e| e.uri.as_str()).collect())
            .unwrap_or_default()
    }

    /// Feed one rewritten line of tier `variant_index`.
    ///
    /// Returns true when a new segment line was recorded.
    pub fn accept_line(&mut self, variant_index: usize, line: &str) -> bool {
        if variant_index >= self.tiers.len() {
            tracing::warn!(variant_index, "Line for unknown tier ignored");
            return false;
        }

        if line.is_empty() {
            self.pending_duration[variant_index] = None;
            return false;
        }

        if line.starts_with('#') {
            self.capture_directive(variant_index, line);
            return false;
        }

        let duration = self.pending_duration[variant_index].take();
        let entries = &mut self.tiers[variant_index];
        if entries.iter().any(|e| e.uri == line) {
            return false;
        }

        entries.push(VodEntry {
            duration,
            uri: line.to_string(),
        });
        true
    }

    fn capture_directive(&mut self, variant_index: usize, line: &str) {
        if line.starts_with(VERSION_TAG) {
            self.version.get_or_insert_with(|| line.to_string());
        } else if line.starts_with(TARGET_DURATION_TAG) {
            self.target_duration.get_or_insert_with(|| line.to_string());
        } else if line.starts_with(DURATION_TAG) {
            self.default_duration.get_or_insert_with(|| line.to_string());
            self.pending_duration[variant_index] = Some(line.to_string());
        }
    }

    /// Static playlist for one tier
    #[must_use]
    pub fn render_variant(&self, variant_index: usize) -> String {
        let mut playlist = String::from("#EXTM3U\n");
        for header in [&self.version, &self.target_duration].into_iter().flatten() {
            playlist.push_str(header);
            playlist.push('\n');
        }
        playlist.push_str("#EXT-X-PLAYLIST-TYPE:VOD\n");

        for entry in self.tiers.get(variant_index).into_iter().flatten() {
            if let Some(duration) = entry.duration.as_ref().or(self.default_duration.as_ref()) {
                playlist.push_str(duration);
                playlist.push('\n');
            }
            playlist.push_str(&entry.uri);
            playlist.push('\n');
        }

        playlist.push_str("#EXT-X-ENDLIST\n");
        playlist
    }
}

/// What `on_stream_end` produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VodOutcome {
    /// Session was not live; nothing written
    Skipped,
    Written { dir: PathBuf, tiers_written: usize },
}
