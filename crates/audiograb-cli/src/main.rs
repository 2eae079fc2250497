mod prompt;

use anyhow::{Context, Result};
use audiograb_acquire::metadata::{reconcile, KeepScraped, OverrideProvider, ScriptedOverrides};
use audiograb_acquire::registry::extractor_for;
use audiograb_acquire::{resolve_site, HttpConfig, HttpSession};
use audiograb_download::orchestrator::strategy_for;
use audiograb_download::{DownloadConfig, Downloader, RetryConfig, Toolchain};
use audiograb_model::FetchStrategy;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "audiograb")]
#[command(about = "Download an audiobook from a supported site as tagged, numbered chapter files")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_HASH"), ")"))]
struct Cli {
    /// Book page URL; prompted for when omitted
    url: Option<String>,

    /// Root directory; each book gets a subdirectory named after its title
    #[arg(short = 'O', long, default_value = "Audiobooks")]
    output_dir: PathBuf,

    /// Container extension of the chapter files
    #[arg(short, long, default_value = "mp3")]
    extension: String,

    /// Attempts per chapter request, and retries passed to yt-dlp
    #[arg(long, default_value_t = 5)]
    retries: u32,

    /// Segment requests in flight at once for segmented streams
    #[arg(long, default_value_t = 10)]
    segment_workers: usize,

    /// Hand tokybook chapters to yt-dlp instead of fetching segments directly
    #[arg(long)]
    tokybook_via_ytdlp: bool,

    /// User-Agent header (defaults to $USER_AGENT, then a desktop browser)
    #[arg(long)]
    user_agent: Option<String>,

    /// Replace a scraped field without prompting: title, author, narrator, year, cover_url
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    overrides: Vec<String>,

    /// Keep the scraped details without asking
    #[arg(short, long)]
    yes: bool,

    /// Print the extracted book as JSON and exit
    #[arg(long)]
    dump: bool,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, default_value = "info", value_enum)]
    log_level: LogLevel,

    /// Use UTC timestamps instead of local time
    #[arg(long)]
    utc: bool,
}

#[derive(Clone, clap::ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Cli {
    fn download_config(&self) -> DownloadConfig {
        DownloadConfig {
            output_dir: self.output_dir.clone(),
            extension: self.extension.trim_start_matches('.').to_string(),
            retry: RetryConfig {
                max_attempts: self.retries.max(1),
                ..Default::default()
            },
            segment_concurrency: self.segment_workers.max(1),
            tool_retries: self.retries,
            tokybook_via_tool: self.tokybook_via_ytdlp,
            ..Default::default()
        }
    }

    fn http_config(&self) -> HttpConfig {
        let mut config = HttpConfig::default();
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        config
    }
}

fn init_logging(log_level: &LogLevel, utc: bool) {
    // HTML parsing and HTTP internals are noisy at debug/trace
    let level = match log_level {
        LogLevel::Error => "error",
        LogLevel::Warn  => "warn",
        LogLevel::Info  => "info",
        LogLevel::Debug => "debug,selectors=warn,html5ever=warn,hyper=warn,reqwest=warn",
        LogLevel::Trace => "trace,selectors=warn,html5ever=warn,hyper=warn,reqwest=warn",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // Timestamp format: 2026-02-14 19:44:09.123 -08:00
    let time_format = "%Y-%m-%d %H:%M:%S%.3f %:z";

    if utc {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_timer(tracing_subscriber::fmt::time::ChronoUtc::new(time_format.to_string()))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(time_format.to_string()))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.utc);

    let (url, site) = match &cli.url {
        Some(url) => {
            let site = resolve_site(url).with_context(|| format!("Unsupported site: {url}"))?;
            (url.clone(), site)
        }
        None => prompt::ask_for_url(&mut std::io::stdin().lock(), &mut std::io::stdout())?,
    };

    let config = cli.download_config();
    let tools = if cli.dump {
        None
    } else {
        let needs_yt_dlp = strategy_for(site, &config) == FetchStrategy::ExternalTool;
        Some(Toolchain::discover(needs_yt_dlp)?)
    };

    let session = HttpSession::new(&cli.http_config())?;
    tracing::info!(url = %url, site = %site, "Extracting book data");
    let book = extractor_for(site)
        .fetch_book_data(&session, &url)
        .await
        .with_context(|| format!("Failed to extract book data from {url}"))?;
    tracing::info!(title = %book.title, chapters = book.chapter_count(), "Found book");

    let Some(tools) = tools else {
        println!("{}", serde_json::to_string_pretty(&book)?);
        return Ok(());
    };

    let mut provider: Box<dyn OverrideProvider> = if !cli.overrides.is_empty() {
        Box::new(ScriptedOverrides::from_pairs(&cli.overrides)?)
    } else if cli.yes {
        Box::new(KeepScraped)
    } else {
        Box::new(prompt::LinePrompt::new(std::io::stdin().lock(), std::io::stdout()))
    };
    let book = reconcile(book, &session, provider.as_mut()).await?;

    let summary = Downloader::new(&session, config, &tools).run(&book).await?;
    tracing::info!(dir = %summary.book_dir.display(), "Finished {}", book.title);
    if !summary.is_complete() {
        anyhow::bail!(
            "{} of {} chapters failed: {}",
            summary.failed.len(),
            summary.total,
            summary.failed.join(", ")
        );
    }
    Ok(())
}
