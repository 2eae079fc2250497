use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed set of sites audiograb knows how to download from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Site {
    Tokybook,
    GoldenAudiobook,
    Zaudiobooks,
    FullLengthAudiobooks,
    HdAudiobooks,
    BigAudiobooks,
}

/// How the chapters of a site are transported to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// Streamed GET through the shared, cookie-carrying client.
    Session,
    /// Delegated to an external media retrieval tool (yt-dlp).
    ExternalTool,
    /// Playlist + per-segment authenticated GETs, concatenated and remuxed.
    Segmented,
}

impl Site {
    pub fn domain(self) -> &'static str {
        match self {
            Site::Tokybook => "tokybook.com",
            Site::GoldenAudiobook => "goldenaudiobook.net",
            Site::Zaudiobooks => "zaudiobooks.com",
            Site::FullLengthAudiobooks => "fulllengthaudiobooks.net",
            Site::HdAudiobooks => "hdaudiobooks.net",
            Site::BigAudiobooks => "bigaudiobooks.net",
        }
    }

    pub fn base_url(self) -> String {
        format!("https://{}", self.domain())
    }

    pub fn fetch_strategy(self) -> FetchStrategy {
        match self {
            Site::GoldenAudiobook | Site::Zaudiobooks => FetchStrategy::Session,
            Site::FullLengthAudiobooks | Site::HdAudiobooks | Site::BigAudiobooks => {
                FetchStrategy::ExternalTool
            }
            Site::Tokybook => FetchStrategy::Segmented,
        }
    }

    /// Whether an interrupted run may have left the newest chapter file truncated,
    /// in which case it is fetched again instead of skipped.
    pub fn resumes_last_chapter(self) -> bool {
        matches!(self, Site::Tokybook)
    }

    /// Sites that answer bursts of media requests with 403 and need a longer backoff.
    pub fn is_403_prone(self) -> bool {
        matches!(self, Site::GoldenAudiobook)
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.domain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_table() {
        assert_eq!(Site::Tokybook.fetch_strategy(), FetchStrategy::Segmented);
        assert_eq!(Site::GoldenAudiobook.fetch_strategy(), FetchStrategy::Session);
        assert_eq!(Site::Zaudiobooks.fetch_strategy(), FetchStrategy::Session);
        assert_eq!(Site::HdAudiobooks.fetch_strategy(), FetchStrategy::ExternalTool);
    }

    #[test]
    fn test_only_tokybook_resumes() {
        assert!(Site::Tokybook.resumes_last_chapter());
        assert!(!Site::GoldenAudiobook.resumes_last_chapter());
        assert!(!Site::BigAudiobooks.resumes_last_chapter());
    }

    #[test]
    fn test_display_is_domain() {
        assert_eq!(Site::FullLengthAudiobooks.to_string(), "fulllengthaudiobooks.net");
        assert_eq!(Site::Tokybook.base_url(), "https://tokybook.com");
    }
}
