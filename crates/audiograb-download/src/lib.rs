//! Fetching, remuxing and tagging of scraped chapters.
//!
//! [`Downloader::run`] walks a [`audiograb_model::BookData`] in track order and
//! writes one tagged file per chapter under the configured output directory.

pub mod config;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod retry;
pub mod tagger;
pub mod tool;

pub use config::{DownloadConfig, RetryConfig};
pub use error::{DownloadError, IsRetryable};
pub use orchestrator::{ChapterOutcome, Downloader, RunSummary};
pub use tagger::{FfmpegTagger, Tagger};
pub use tool::{MediaTool, Toolchain};
