//! Chapter transports: direct session GET, external tool and segmented
//! stream assembly.

pub mod direct;
pub mod external;
pub mod manifest;
pub mod segmented;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Appended to a chapter's final path while it is being written.
pub const STAGING_SUFFIX: &str = ".part";

pub fn staging_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(STAGING_SUFFIX);
    PathBuf::from(name)
}

/// Move a completed staging file into place.
pub async fn promote(staging: &Path, dest: &Path) -> std::io::Result<()> {
    tokio::fs::rename(staging, dest).await
}

/// Best-effort removal of a staging file after a failed attempt.
pub async fn discard(staging: &Path) {
    if let Err(e) = tokio::fs::remove_file(staging).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %staging.display(), error = %e, "Could not remove staging file");
        }
    }
}

/// Convert a header mapping into a `HeaderMap`, skipping entries that are
/// not valid HTTP headers.
pub fn request_headers(headers: &BTreeMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping invalid request header"),
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_path_keeps_extension_visible() {
        assert_eq!(
            staging_path(Path::new("Audiobooks/Book/Chapter 001.mp3")),
            PathBuf::from("Audiobooks/Book/Chapter 001.mp3.part")
        );
    }

    #[test]
    fn test_request_headers_skips_invalid() {
        let headers = BTreeMap::from([
            ("x-stream-token".to_string(), "tok".to_string()),
            ("bad header".to_string(), "v".to_string()),
        ]);
        let map = request_headers(&headers);
        assert_eq!(map.len(), 1);
        assert_eq!(map["x-stream-token"], "tok");
    }

    #[tokio::test]
    async fn test_discard_missing_file_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        discard(&dir.path().join("nothing.part")).await;
    }
}
