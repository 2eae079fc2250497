use crate::error::{DownloadError, Result};
use url::Url;

/// Ordered, absolute segment URLs of a line-based playlist.
///
/// Lines starting with `#` are directives and blank lines are ignored.
/// Absolute references pass through; relative ones resolve against the
/// playlist's own directory.
pub fn segment_urls(playlist_url: &Url, body: &str) -> Result<Vec<Url>> {
    let segments = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| resolve_segment(playlist_url, line))
        .collect::<Result<Vec<_>>>()?;

    if segments.is_empty() {
        return Err(DownloadError::Manifest {
            url: playlist_url.to_string(),
            reason: "no media segments".into(),
        });
    }
    Ok(segments)
}

fn resolve_segment(playlist_url: &Url, reference: &str) -> Result<Url> {
    let resolved = if reference.starts_with("http://") || reference.starts_with("https://") {
        Url::parse(reference)
    } else {
        playlist_url.join(reference)
    };
    resolved.map_err(|e| DownloadError::Manifest {
        url: playlist_url.to_string(),
        reason: format!("bad segment reference {reference:?}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYLIST: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:10
#EXTINF:10.0,
seg-000.ts

#EXTINF:10.0,
seg 001.ts
#EXTINF:4.2,
https://cdn.example.net/other/seg-002.ts
#EXT-X-ENDLIST
";

    #[test]
    fn test_segment_urls_in_order() {
        let playlist =
            Url::parse("https://tokybook.com/api/v1/public/audio/B0X/Chapter%201.m3u8").unwrap();
        let urls: Vec<String> = segment_urls(&playlist, PLAYLIST)
            .unwrap()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            urls,
            [
                "https://tokybook.com/api/v1/public/audio/B0X/seg-000.ts",
                "https://tokybook.com/api/v1/public/audio/B0X/seg%20001.ts",
                "https://cdn.example.net/other/seg-002.ts",
            ]
        );
    }

    #[test]
    fn test_empty_playlist_is_an_error() {
        let playlist = Url::parse("https://tokybook.com/a/b.m3u8").unwrap();
        let err = segment_urls(&playlist, "#EXTM3U\n#EXT-X-ENDLIST\n").unwrap_err();
        assert!(matches!(err, DownloadError::Manifest { .. }));
    }
}
