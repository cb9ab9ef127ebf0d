// Live playlist rewriting
//
// The transcoder references segments by bare file name. Players need the
// published location instead, so every media line becomes
// `{remote_locator}?fileName={basename}`; the query keeps the real extension
// visible for container detection. Lines for segments that have not been
// published yet come out empty and are filled in by a later rewrite.

use crate::model::Variant;
use std::path::Path;

/// Rewrite playlist text against the tier's current segments.
///
/// `on_line` sees every emitted line in order, directives and empty lines
/// included.
pub fn rewrite_playlist(content: &str, variant: &Variant, mut on_line: impl FnMut(&str)) -> String {
    let mut output = String::with_capacity(content.len() * 2);

    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        let rewritten = rewrite_line(line, variant);
        on_line(&rewritten);
        output.push_str(&rewritten);
        output.push('\n');
    }

    output
}

fn rewrite_line(line: &str, variant: &Variant) -> String {
    if line.is_empty() || line.starts_with('#') {
        return line.to_string();
    }
    let Some(file_name) = segment_name(line) else {
        return String::new();
    };

    match variant.find_by_file_name(file_name) {
        Some(segment) if !segment.remote_locator.is_empty() => {
            format!("{}?fileName={file_name}", segment.remote_locator)
        }
        _ => String::new(),
    }
}

/// Basename of a media line; `None` for directives and blank lines
fn segment_name(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Path::new(line).file_name().and_then(|n| n.to_str())
}

/// Segment file names a playlist references, in playlist order
#[must_use]
pub fn listed_segments(content: &str) -> Vec<&str> {
    content.lines().filter_map(segment_name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Segment;
    use std::path::PathBuf;

    const PLAYLIST: &str = "#EXTM3U\n\
        #EXT-X-VERSION:3\n\
        #EXT-X-TARGETDURATION:4\n\
        #EXT-X-MEDIA-SEQUENCE:0\n\
        #EXTINF:4.000000,\n\
        seg0.ts\n\
        #EXTINF:4.000000,\n\
        seg1.ts\n";

    fn variant_with(segments: &[(&str, &str)]) -> Variant {
        let mut variant = Variant::new(0);
        for (name, locator) in segments {
            variant.segments.push(Segment {
                publish_name: "abcdef0123".to_string(),
                variant_index: 0,
                local_path: PathBuf::from(format!("/hls/private/abcdef0123/0/{name}")),
                remote_locator: (*locator).to_string(),
            });
        }
        variant
    }

    #[test]
    fn test_rewrites_known_segments() {
        let variant = variant_with(&[("seg0.ts", "cid:Qm0"), ("seg1.ts", "cid:Qm1")]);

        let output = rewrite_playlist(PLAYLIST, &variant, |_| {});

        assert_eq!(
            output,
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:4\n#EXT-X-MEDIA-SEQUENCE:0\n\
             #EXTINF:4.000000,\ncid:Qm0?fileName=seg0.ts\n\
             #EXTINF:4.000000,\ncid:Qm1?fileName=seg1.ts\n"
        );
    }

    #[test]
    fn test_unknown_segment_becomes_empty() {
        let variant = variant_with(&[("seg0.ts", "cid:Qm0")]);

        let output = rewrite_playlist(PLAYLIST, &variant, |_| {});
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines[5], "cid:Qm0?fileName=seg0.ts");
        assert_eq!(lines[7], "");
    }

    #[test]
    fn test_empty_locator_becomes_empty() {
        let variant = variant_with(&[("seg0.ts", "")]);

        let output = rewrite_playlist("seg0.ts\n", &variant, |_| {});
        assert_eq!(output, "\n");
    }

    #[test]
    fn test_every_line_reaches_callback() {
        let variant = variant_with(&[("seg0.ts", "cid:Qm0")]);
        let mut seen = Vec::new();

        let output = rewrite_playlist(PLAYLIST, &variant, |line| seen.push(line.to_string()));

        assert_eq!(seen.len(), 8);
        assert_eq!(seen.join("\n") + "\n", output);
    }

    #[test]
    fn test_rewrite_is_stable() {
        let variant = variant_with(&[("seg0.ts", "cid:Qm0"), ("seg1.ts", "cid:Qm1")]);

        let first = rewrite_playlist(PLAYLIST, &variant, |_| {});
        let second = rewrite_playlist(PLAYLIST, &variant, |_| {});
        assert_eq!(first, second);
    }

    #[test]
    fn test_blank_lines_and_crlf() {
        let variant = variant_with(&[("seg0.ts", "cid:Qm0")]);

        let output = rewrite_playlist("#EXTM3U\r\n\r\nseg0.ts\r\n", &variant, |_| {});
        assert_eq!(output, "#EXTM3U\n\ncid:Qm0?fileName=seg0.ts\n");
    }

    #[test]
    fn test_listed_segments() {
        assert_eq!(listed_segments(PLAYLIST), vec!["seg0.ts", "seg1.ts"]);
        assert_eq!(
            listed_segments("#EXTM3U\r\n\r\n/abs/dir/seg7.ts\r\n"),
            vec!["seg7.ts"]
        );
        assert!(listed_segments("#EXTM3U\n#EXT-X-ENDLIST\n").is_empty());
    }
}
