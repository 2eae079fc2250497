use crate::config::{DownloadConfig, RetryConfig, FORBIDDEN_PRONE_INITIAL_DELAY};
use crate::error::Result;
use crate::fetch::direct::fetch_direct;
use crate::fetch::external::fetch_external;
use crate::fetch::segmented::{fetch_segmented, SegmentOptions};
use crate::fetch::request_headers;
use crate::tagger::{FfmpegTagger, Tagger};
use crate::tool::{MediaTool, Toolchain};
use audiograb_acquire::HttpSession;
use audiograb_model::{BookData, Chapter, FetchStrategy, Site, TrackTags};
use std::fmt;
use std::path::{Path, PathBuf};

/// The transport used for a site under the given configuration.
pub fn strategy_for(site: Site, config: &DownloadConfig) -> FetchStrategy {
    match site.fetch_strategy() {
        FetchStrategy::Segmented if config.tokybook_via_tool => FetchStrategy::ExternalTool,
        strategy => strategy,
    }
}

/// What to do with one chapter before any network work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    Fetch,
    Skip,
    /// The file exists but may be truncated by an interrupted run.
    Refetch,
}

/// Decide per chapter, from what is already on disk, whether to fetch it.
///
/// Existing files are skipped. For sites that resume, the highest-numbered
/// existing chapter is fetched again instead.
pub fn plan(site: Site, existing: &[bool]) -> Vec<PlannedAction> {
    let mut actions: Vec<PlannedAction> = existing
        .iter()
        .map(|&exists| if exists { PlannedAction::Skip } else { PlannedAction::Fetch })
        .collect();

    if site.resumes_last_chapter() {
        if let Some(last) = existing.iter().rposition(|&exists| exists) {
            actions[last] = PlannedAction::Refetch;
        }
    }
    actions
}

/// How one chapter ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterOutcome {
    Skipped,
    Downloaded,
    /// The audio is on disk but its tags could not be written.
    TagFailed(String),
    Failed(String),
}

/// Totals for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub book_dir: PathBuf,
    pub total: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub tag_failed: Vec<String>,
    pub failed: Vec<String>,
}

impl RunSummary {
    fn record(&mut self, title: &str, outcome: &ChapterOutcome) {
        match outcome {
            ChapterOutcome::Skipped => self.skipped += 1,
            ChapterOutcome::Downloaded => self.downloaded += 1,
            ChapterOutcome::TagFailed(_) => {
                self.downloaded += 1;
                self.tag_failed.push(title.to_string());
            }
            ChapterOutcome::Failed(_) => self.failed.push(title.to_string()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} chapters: {} downloaded, {} skipped, {} failed",
            self.total,
            self.downloaded,
            self.skipped,
            self.failed.len()
        )?;
        if !self.tag_failed.is_empty() {
            write!(f, ", {} untagged", self.tag_failed.len())?;
        }
        Ok(())
    }
}

/// Downloads and tags every chapter of one book, one chapter at a time.
pub struct Downloader {
    client: reqwest::Client,
    config: DownloadConfig,
    external: Box<dyn MediaTool>,
    remux: Box<dyn MediaTool>,
    tagger: Box<dyn Tagger>,
}

impl Downloader {
    pub fn new(session: &HttpSession, config: DownloadConfig, tools: &Toolchain) -> Self {
        let external = tools.external_downloader(config.tool_retries);
        Self::with_tools(
            session,
            config,
            external,
            tools.remuxer(),
            Box::new(FfmpegTagger::new(tools.ffmpeg.clone())),
        )
    }

    pub fn with_tools(
        session: &HttpSession,
        config: DownloadConfig,
        external: Box<dyn MediaTool>,
        remux: Box<dyn MediaTool>,
        tagger: Box<dyn Tagger>,
    ) -> Self {
        Self {
            client: session.client().clone(),
            config,
            external,
            remux,
            tagger,
        }
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Download every chapter of `book` into its directory.
    ///
    /// A failing chapter is logged and the run moves on. Only a missing
    /// external tool stops the run early.
    pub async fn run(&self, book: &BookData) -> Result<RunSummary> {
        let book_dir = self.config.book_dir(&book.title);
        tokio::fs::create_dir_all(&book_dir).await?;

        let strategy = strategy_for(book.site, &self.config);
        let total = book.chapter_count();
        let paths: Vec<PathBuf> = book
            .chapters
            .iter()
            .map(|c| self.config.chapter_path(&book_dir, &c.title))
            .collect();
        let existing: Vec<bool> = paths.iter().map(|p| p.exists()).collect();
        let actions = plan(book.site, &existing);

        tracing::info!(
            title = %book.title,
            site = %book.site,
            chapters = total,
            dir = %book_dir.display(),
            "Starting download"
        );

        let mut summary = RunSummary {
            book_dir: book_dir.clone(),
            total,
            ..Default::default()
        };
        let mut prewarmed = false;
        let mut fetched = 0usize;

        for (i, ((chapter, dest), action)) in book.chapters.iter().zip(&paths).zip(&actions).enumerate() {
            let index = i + 1;

            if *action == PlannedAction::Skip {
                tracing::info!(chapter = %chapter.title, "Skipping, already exists");
                summary.record(&chapter.title, &ChapterOutcome::Skipped);
                continue;
            }

            if strategy == FetchStrategy::Session && !prewarmed {
                self.prewarm(book).await;
                prewarmed = true;
            }
            if strategy == FetchStrategy::Segmented && pause_due(fetched, self.config.pause_every) {
                tracing::debug!(fetched, pause_ms = self.config.pause.as_millis() as u64, "Pausing");
                tokio::time::sleep(self.config.pause).await;
            }

            if *action == PlannedAction::Refetch {
                tracing::info!(chapter = %chapter.title, "Fetching again, last file may be incomplete");
                // yt-dlp skips outputs that already exist.
                if strategy == FetchStrategy::ExternalTool {
                    if let Err(e) = remove_stale(dest).await {
                        tracing::error!(chapter = %chapter.title, error = %e, "Failed");
                        summary.record(&chapter.title, &ChapterOutcome::Failed(e.to_string()));
                        continue;
                    }
                }
            }

            tracing::info!(chapter = %chapter.title, index, total, "Downloading");
            let outcome = match self.fetch(strategy, book, chapter, dest).await {
                Ok(()) => {
                    fetched += 1;
                    self.tag(book, index, dest).await?
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::error!(chapter = %chapter.title, site = %book.site, error = %e, "Failed");
                    ChapterOutcome::Failed(e.to_string())
                }
            };
            summary.record(&chapter.title, &outcome);
        }

        tracing::info!(title = %book.title, "{summary}");
        if !summary.failed.is_empty() {
            tracing::warn!(chapters = ?summary.failed, "Some chapters failed");
        }
        Ok(summary)
    }

    async fn fetch(
        &self,
        strategy: FetchStrategy,
        book: &BookData,
        chapter: &Chapter,
        dest: &Path,
    ) -> Result<()> {
        match strategy {
            FetchStrategy::Session => {
                let bytes = fetch_direct(
                    &self.client,
                    &self.retry_for(book.site),
                    &chapter.url,
                    &book.site_headers,
                    dest,
                )
                .await?;
                tracing::debug!(chapter = %chapter.title, bytes, "Received chapter");
            }
            FetchStrategy::ExternalTool => {
                fetch_external(self.external.as_ref(), book, chapter, dest).await?;
            }
            FetchStrategy::Segmented => {
                let assembled = fetch_segmented(
                    &self.client,
                    self.remux.as_ref(),
                    book,
                    chapter,
                    dest,
                    SegmentOptions {
                        concurrency: self.config.segment_concurrency,
                        timeout: self.config.request_timeout,
                    },
                )
                .await?;
                tracing::debug!(
                    chapter = %chapter.title,
                    segments = assembled.segments,
                    bytes = assembled.bytes,
                    "Assembled chapter"
                );
            }
        }
        Ok(())
    }

    /// Tag a fetched chapter. Only a missing tool is an error here; any other
    /// tagging failure leaves the audio in place and is reported as such.
    async fn tag(&self, book: &BookData, index: usize, dest: &Path) -> Result<ChapterOutcome> {
        let Some(tags) = TrackTags::for_chapter(book, index) else {
            return Ok(ChapterOutcome::Downloaded);
        };
        match self.tagger.write_tags(dest, &tags).await {
            Ok(()) => {
                tracing::info!(chapter = %tags.title, track = %tags.track, "Completed");
                Ok(ChapterOutcome::Downloaded)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::warn!(chapter = %tags.title, error = %e, "Downloaded but tagging failed");
                Ok(ChapterOutcome::TagFailed(e.to_string()))
            }
        }
    }

    fn retry_for(&self, site: Site) -> RetryConfig {
        if site.is_403_prone() {
            self.config.retry.with_initial_delay(FORBIDDEN_PRONE_INITIAL_DELAY)
        } else {
            self.config.retry.clone()
        }
    }

    /// Visit the book page once so the shared client holds the site's cookies.
    async fn prewarm(&self, book: &BookData) {
        tracing::debug!(url = %book.book_url, "Visiting book page for session cookies");
        let result = self
            .client
            .get(&book.book_url)
            .headers(request_headers(&book.site_headers))
            .timeout(self.config.request_timeout)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                tracing::warn!(url = %book.book_url, status = %response.status(), "Session warm-up failed")
            }
            Err(e) => tracing::warn!(url = %book.book_url, error = %e, "Session warm-up failed"),
        }
    }
}

/// Whether to pause before the next chapter after `fetched` fetches.
fn pause_due(fetched: usize, every: usize) -> bool {
    every > 0 && fetched > 0 && fetched % every == 0
}

async fn remove_stale(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
