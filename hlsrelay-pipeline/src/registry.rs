// Session registry
//
// Live streams and their VOD accumulators, keyed by publish name. Reached
// from the watch dispatcher and from the lifecycle hooks, which run on
// different tasks. Creating or removing entries takes the map write lock;
// per-event updates take the read lock plus the entry's own mutex. No guard
// is held across an await point.

use crate::model::{Segment, Stream, Variant};
use crate::vod::VodAccumulator;
use hlsrelay_core::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Default)]
struct Inner {
    streams: HashMap<String, Mutex<Stream>>,
    accumulators: HashMap<String, Mutex<VodAccumulator>>,
}

#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<Inner>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session with `quality_count` empty tiers.
    ///
    /// Existing entries are left untouched. Returns true if anything was created.
    pub fn start_session(&self, publish_name: &str, quality_count: usize) -> bool {
        let mut inner = self.inner.write();
        let mut created = false;

        if !inner.streams.contains_key(publish_name) {
            inner.streams.insert(
                publish_name.to_string(),
                Mutex::new(Stream::new(publish_name, quality_count)),
            );
            created = true;
        }
        if !inner.accumulators.contains_key(publish_name) {
            inner.accumulators.insert(
                publish_name.to_string(),
                Mutex::new(VodAccumulator::new(quality_count)),
            );
            created = true;
        }

        created
    }

    #[must_use]
    pub fn contains(&self, publish_name: &str) -> bool {
        self.inner.read().streams.contains_key(publish_name)
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.inner.read().streams.len()
    }

    /// Snapshot of one tier's segments
    pub fn variant(&self, publish_name: &str, variant_index: usize) -> Result<Variant> {
        let inner = self.inner.read();
        let stream = inner
            .streams
            .get(publish_name)
            .ok_or_else(|| Error::NotFound(format!("session {publish_name}")))?
            .lock();

        stream
            .variants
            .get(variant_index)
            .cloned()
            .ok_or_else(|| out_of_range(publish_name, variant_index))
    }

    /// Remember a segment file the transcoder has started writing.
    ///
    /// Returns false if the file is already pending or recorded.
    pub fn add_pending(
        &self,
        publish_name: &str,
        variant_index: usize,
        local_path: &Path,
    ) -> Result<bool> {
        self.with_variant(publish_name, variant_index, |variant| {
            if variant.contains_path(local_path) || variant.is_pending(local_path) {
                return false;
            }
            variant.pending.push(local_path.to_path_buf());
            true
        })
    }

    /// Detach the pending files whose names appear in `listed`, oldest first.
    ///
    /// The transcoder adds a segment to its playlist only after closing it,
    /// so these are complete on disk.
    pub fn take_listed(
        &self,
        publish_name: &str,
        variant_index: usize,
        listed: &[&str],
    ) -> Result<Vec<PathBuf>> {
        self.with_variant(publish_name, variant_index, |variant| {
            let (closed, open): (Vec<PathBuf>, Vec<PathBuf>) =
                std::mem::take(&mut variant.pending)
                    .into_iter()
                    .partition(|path| {
                        path.file_name()
                            .and_then(|n| n.to_str())
                            .is_some_and(|name| listed.contains(&name))
                    });
            variant.pending = open;
            closed
        })
    }

    /// Append a published segment to its tier.
    ///
    /// Returns false if the same local file was already recorded.
    pub fn append_segment(&self, segment: Segment) -> Result<bool> {
        let publish_name = segment.publish_name.clone();
        self.with_variant(&publish_name, segment.variant_index, |variant| {
            if variant.contains_path(&segment.local_path) {
                return false;
            }
            variant.segments.push(segment);
            true
        })
    }

    fn with_variant<T>(
        &self,
        publish_name: &str,
        variant_index: usize,
        f: impl FnOnce(&mut Variant) -> T,
    ) -> Result<T> {
        let inner = self.inner.read();
        let mut stream = inner
            .streams
            .get(publish_name)
            .ok_or_else(|| Error::NotFound(format!("session {publish_name}")))?
            .lock();

        let variant = stream
            .variants
            .get_mut(variant_index)
            .ok_or_else(|| out_of_range(publish_name, variant_index))?;
        Ok(f(variant))
    }

    /// Feed one rewritten live playlist line to the session's accumulator.
    ///
    /// A no-op once the session has ended.
    pub fn accumulate(&self, publish_name: &str, variant_index: usize, line: &str) -> bool {
        let inner = self.inner.read();
        match inner.accumulators.get(publish_name) {
            Some(acc) => acc.lock().accept_line(variant_index, line),
            None => false,
        }
    }

    /// Detach the accumulator so it can be rendered without holding the lock
    pub fn take_accumulator(&self, publish_name: &str) -> Option<VodAccumulator> {
        self.inner
            .write()
            .accumulators
            .remove(publish_name)
            .map(Mutex::into_inner)
    }

    pub fn remove_stream(&self, publish_name: &str) -> Option<Stream> {
        self.inner
            .write()
            .streams
            .remove(publish_name)
            .map(Mutex::into_inner)
    }
}

fn out_of_range(publish_name: &str, variant_index: usize) -> Error {
    Error::InvalidPath(format!(
        "tier {variant_index} out of range for session {publish_name}"
    ))
}
