// Maps a notified path to the kind of transcoder artifact it is
//
// Layout written by the transcoder under the private root:
//
//   {root}/{publish_name}/                 session directory
//   {root}/{publish_name}/index.m3u8       master playlist
//   {root}/{publish_name}/{n}/stream.m3u8  variant playlist
//   {root}/{publish_name}/{n}/seg7.ts      segment
//   {root}/{publish_name}/thumbnail.jpeg   thumbnail

use hlsrelay_core::{Error, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    SessionStart,
    Master,
    Variant,
    Segment,
    Thumbnail,
    Unrecognized,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    root: PathBuf,
    min_publish_name_len: usize,
}

impl Classifier {
    pub fn new(root: impl Into<PathBuf>, min_publish_name_len: usize) -> Self {
        Self {
            root: root.into(),
            min_publish_name_len,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Classify a created or modified path.
    ///
    /// `is_dir` is passed in, classification never touches the file system.
    #[must_use]
    pub fn classify(&self, path: &Path, is_dir: bool) -> FileKind {
        let kind = if is_dir {
            self.classify_dir(path)
        } else {
            classify_file(path)
        };

        if kind == FileKind::Unrecognized {
            tracing::debug!(path = %path.display(), "Unrecognized file in watched tree");
        }
        kind
    }

    fn classify_dir(&self, path: &Path) -> FileKind {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return FileKind::Unrecognized;
        };

        if path.parent() == Some(self.root.as_path())
            && name.chars().count() >= self.min_publish_name_len
        {
            FileKind::SessionStart
        } else {
            FileKind::Unrecognized
        }
    }
}

fn classify_file(path: &Path) -> FileKind {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("ts") => FileKind::Segment,
        Some("jpg" | "jpeg") => FileKind::Thumbnail,
        Some("m3u8") => {
            // Tier folders are named by a single digit
            let parent_is_tier = path
                .parent()
                .and_then(Path::file_name)
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.chars().count() == 1);
            if parent_is_tier {
                FileKind::Variant
            } else {
                FileKind::Master
            }
        }
        _ => FileKind::Unrecognized,
    }
}

/// A file inside a tier folder, split into its owning session and tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierPath {
    pub publish_name: String,
    pub variant_index: usize,
    pub file_name: String,
}

impl TierPath {
    /// Decompose `.../{publish_name}/{variant_index}/{file_name}`
    pub fn parse(path: &Path) -> Result<Self> {
        let invalid = || Error::InvalidPath(path.display().to_string());

        let file_name = component(Some(path)).ok_or_else(invalid)?;
        let tier_dir = path.parent();
        let variant_index = component(tier_dir)
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or_else(invalid)?;
        let publish_name = component(tier_dir.and_then(Path::parent)).ok_or_else(invalid)?;

        Ok(Self {
            publish_name: publish_name.to_string(),
            variant_index,
            file_name: file_name.to_string(),
        })
    }
}

fn component(path: Option<&Path>) -> Option<&str> {
    path?.file_name()?.to_str()
}

/// Session a file placed directly inside a session directory belongs to
pub fn session_of(path: &Path) -> Result<String> {
    component(path.parent())
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidPath(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new("/hls/private", 10)
    }

    #[test]
    fn test_session_directory() {
        let c = classifier();
        assert_eq!(
            c.classify(Path::new("/hls/private/abcdef0123"), true),
            FileKind::SessionStart
        );
    }

    #[test]
    fn test_short_directory_is_not_a_session() {
        let c = classifier();
        assert_eq!(
            c.classify(Path::new("/hls/private/ab"), true),
            FileKind::Unrecognized
        );
        assert_eq!(
            c.classify(Path::new("/hls/private/abcdef012"), true),
            FileKind::Unrecognized
        );
    }

    #[test]
    fn test_nested_directory_is_not_a_session() {
        let c = classifier();
        assert_eq!(
            c.classify(Path::new("/hls/private/abcdef0123/0"), true),
            FileKind::Unrecognized
        );
        assert_eq!(
            c.classify(Path::new("/hls/private/abcdef0123/longer-than-ten"), true),
            FileKind::Unrecognized
        );
    }

    #[test]
    fn test_playlists() {
        let c = classifier();
        assert_eq!(
            c.classify(Path::new("/hls/private/abcdef0123/index.m3u8"), false),
            FileKind::Master
        );
        assert_eq!(
            c.classify(Path::new("/hls/private/abcdef0123/2/stream.m3u8"), false),
            FileKind::Variant
        );
    }

    #[test]
    fn test_media_files() {
        let c = classifier();
        assert_eq!(
            c.classify(Path::new("/hls/private/abcdef0123/0/seg0.ts"), false),
            FileKind::Segment
        );
        assert_eq!(
            c.classify(Path::new("/hls/private/abcdef0123/thumb.jpg"), false),
            FileKind::Thumbnail
        );
        assert_eq!(
            c.classify(Path::new("/hls/private/abcdef0123/thumb.JPEG"), false),
            FileKind::Thumbnail
        );
        assert_eq!(
            c.classify(Path::new("/hls/private/abcdef0123/0/seg0.ts.tmp"), false),
            FileKind::Unrecognized
        );
        assert_eq!(
            c.classify(Path::new("/hls/private/abcdef0123/notes"), false),
            FileKind::Unrecognized
        );
    }

    #[test]
    fn test_tier_path_parse() {
        let parsed = TierPath::parse(Path::new("/hls/private/abcdef0123/1/seg4.ts")).unwrap();
        assert_eq!(
            parsed,
            TierPath {
                publish_name: "abcdef0123".to_string(),
                variant_index: 1,
                file_name: "seg4.ts".to_string(),
            }
        );
    }

    #[test]
    fn test_tier_path_rejects_non_numeric_tier() {
        let err = TierPath::parse(Path::new("/hls/private/abcdef0123/x/seg4.ts")).unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)));
        assert!(TierPath::parse(Path::new("seg4.ts")).is_err());
    }

    #[test]
    fn test_session_of() {
        assert_eq!(
            session_of(Path::new("/hls/private/abcdef0123/thumb.jpg")).unwrap(),
            "abcdef0123"
        );
    }
}
