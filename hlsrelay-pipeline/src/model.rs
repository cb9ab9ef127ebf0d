use std::path::{Path, PathBuf};

/// One published chunk of a quality tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub publish_name: String,
    pub variant_index: usize,
    pub local_path: PathBuf,
    /// Where players fetch the chunk from; the local path when publishing failed
    pub remote_locator: String,
}

impl Segment {
    /// Basename of the local file, as it appears in the transcoder's playlist
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.local_path.file_name().and_then(|n| n.to_str())
    }
}

/// One quality tier and its segments in file-creation order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variant {
    pub index: usize,
    pub segments: Vec<Segment>,
    /// Files the transcoder is still writing, oldest first
    pub pending: Vec<PathBuf>,
}

impl Variant {
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self {
            index,
            segments: Vec::new(),
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub fn find_by_file_name(&self, file_name: &str) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|segment| segment.file_name() == Some(file_name))
    }

    #[must_use]
    pub fn contains_path(&self, local_path: &Path) -> bool {
        self.segments.iter().any(|s| s.local_path == local_path)
    }

    #[must_use]
    pub fn is_pending(&self, local_path: &Path) -> bool {
        self.pending.iter().any(|p| p == local_path)
    }
}

/// One live session with a fixed number of tiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    pub publish_name: String,
    pub variants: Vec<Variant>,
}

impl Stream {
    #[must_use]
    pub fn new(publish_name: impl Into<String>, quality_count: usize) -> Self {
        Self {
            publish_name: publish_name.into(),
            variants: (0..quality_count).map(Variant::new).collect(),
        }
    }
}
