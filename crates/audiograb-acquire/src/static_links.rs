use crate::html::{first_attr, first_text, og_meta, resolve_url};
use crate::{Extractor, HttpSession};
use anyhow::{Context, Result};
use async_trait::async_trait;
use audiograb_model::{BookData, Chapter, Site};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

/// Where the player's relative chapter links live.
pub const MEDIA_BASE: &str = "https://files01.freeaudiobooks.top/audio/";

static TRACK_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(name|chapter_link_dropbox)["']?\s*:\s*["']((?:[^"'\\]|\\.)*)["']"#)
        .expect("valid regex")
});

/// zaudiobooks.com: chapter links sit in an inline `tracks = [...]` script
/// block rather than in the markup.
#[derive(Debug, Clone)]
pub struct StaticLinksExtractor {
    base_url: String,
    media_base: String,
}

impl Default for StaticLinksExtractor {
    fn default() -> Self {
        Self {
            base_url: Site::Zaudiobooks.base_url(),
            media_base: MEDIA_BASE.to_string(),
        }
    }
}

#[async_trait]
impl Extractor for StaticLinksExtractor {
    fn site(&self) -> Site {
        Site::Zaudiobooks
    }

    async fn fetch_book_data(&self, session: &HttpSession, url: &str) -> Result<BookData> {
        tracing::info!(url = %url, "Fetching from zaudiobooks.com");
        let html = session.fetch_page(url, &BTreeMap::new()).await?;
        tracing::debug!(bytes = html.len(), "Received HTML");
        self.parse_book_page(&html, url)
    }
}

impl StaticLinksExtractor {
    pub fn parse_book_page(&self, html: &str, book_url: &str) -> Result<BookData> {
        let document = Html::parse_document(html);

        let title = first_text(&document, "h1.page-title")
            .or_else(|| og_meta(&document, "og:title"))
            .context("Could not find the book title")?;

        let cover_url = first_attr(&document, ".inner-article-content img", &["src"])
            .or_else(|| og_meta(&document, "og:image"))
            .and_then(|src| resolve_url(&self.base_url, &src));

        let script = track_script(&document).context("Could not find the tracks script")?;
        let links = track_links(&script);
        tracing::info!(chapters = links.len(), "Parsed track list");

        let chapters = links
            .iter()
            .map(|link| self.media_url(link))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .enumerate()
            .map(|(i, url)| Chapter::numbered(i + 1, url))
            .collect();

        Ok(BookData::new(Site::Zaudiobooks, &title, book_url, chapters)?.with_cover_url(cover_url))
    }

    fn media_url(&self, link: &str) -> Result<String> {
        if link.starts_with("http://") || link.starts_with("https://") {
            return Ok(link.to_string());
        }
        let base = Url::parse(&self.media_base).context("Invalid media base")?;
        let url = base
            .join(link.trim_start_matches('/'))
            .with_context(|| format!("Invalid chapter link: {link}"))?;
        Ok(url.to_string())
    }
}

fn track_script(document: &Html) -> Option<String> {
    let sel = Selector::parse("script").expect("valid selector");
    document
        .select(&sel)
        .map(|s| s.text().collect::<String>())
        .find(|text| text.contains("tracks = [") && text.contains("chapter_link_dropbox"))
}

/// Chapter links from the `tracks` block, in order, without the welcome intro.
fn track_links(script: &str) -> Vec<String> {
    let Some(start) = script.find("tracks = [") else {
        return Vec::new();
    };
    let block = &script[start..];
    let end = ["],", "];"]
        .iter()
        .filter_map(|close| block.find(close))
        .min()
        .unwrap_or(block.len());
    let block = &block[..end];

    let mut links = Vec::new();
    let mut skip_current = false;
    for caps in TRACK_FIELD.captures_iter(block) {
        let value = caps[2].replace('\\', "");
        let value = value.trim();
        match &caps[1] {
            "name" => skip_current = value.eq_ignore_ascii_case("welcome"),
            _ => {
                if skip_current || value.contains("welcome-you-to") || value.is_empty() {
                    continue;
                }
                links.push(value.to_string());
            }
        }
    }
    links
}
