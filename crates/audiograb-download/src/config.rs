use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Retry policy for direct chapter downloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, the first one included (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Upper bound for any single delay (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Same policy with a longer first delay, for sites that answer bursts with 403.
    pub fn with_initial_delay(&self, initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            ..self.clone()
        }
    }
}

/// Initial backoff for sites flagged as 403-prone.
pub const FORBIDDEN_PRONE_INITIAL_DELAY: Duration = Duration::from_secs(3);

/// Everything the download pipeline needs besides the book itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root under which one directory per book is created (default: ./Audiobooks)
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Container extension of the chapter files (default: mp3)
    #[serde(default = "default_extension")]
    pub extension: String,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Concurrent segment fetches within one chapter (default: 10)
    #[serde(default = "default_segment_concurrency")]
    pub segment_concurrency: usize,

    /// Timeout for playlist and segment requests (default: 15 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Retry count handed to the external downloader (default: 5)
    #[serde(default = "default_tool_retries")]
    pub tool_retries: u32,

    /// Fetch tokybook chapters through yt-dlp instead of assembling segments
    #[serde(default)]
    pub tokybook_via_tool: bool,

    /// Chapters fetched between politeness pauses on segmented sites (default: 5)
    #[serde(default = "default_pause_every")]
    pub pause_every: usize,

    /// Length of that pause (default: 1 second)
    #[serde(default = "default_pause", with = "duration_serde")]
    pub pause: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            extension: default_extension(),
            retry: RetryConfig::default(),
            segment_concurrency: default_segment_concurrency(),
            request_timeout: default_request_timeout(),
            tool_retries: default_tool_retries(),
            tokybook_via_tool: false,
            pause_every: default_pause_every(),
            pause: default_pause(),
        }
    }
}

impl DownloadConfig {
    /// The directory a book's chapters are written to.
    pub fn book_dir(&self, sanitized_title: &str) -> PathBuf {
        self.output_dir.join(sanitized_title)
    }

    /// Final on-disk path of a chapter.
    pub fn chapter_path(&self, book_dir: &std::path::Path, chapter_title: &str) -> PathBuf {
        book_dir.join(format!("{chapter_title}.{}", self.extension))
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("Audiobooks")
}

fn default_extension() -> String {
    "mp3".to_string()
}

fn default_segment_concurrency() -> usize {
    10
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_tool_retries() -> u32 {
    5
}

fn default_pause_every() -> usize {
    5
}

fn default_pause() -> Duration {
    Duration::from_secs(1)
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
