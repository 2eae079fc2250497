use crate::html::{detail_credits, first_attr, first_text, resolve_url};
use crate::{Extractor, HttpSession};
use anyhow::{Context, Result};
use async_trait::async_trait;
use audiograb_model::{normalize_year, BookData, Chapter, Credits, Site};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

/// Which half of an `A - B` heading is the author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingOrder {
    AuthorFirst,
    TitleFirst,
}

/// Where a cover image may be found, tried in order.
#[derive(Debug, Clone, Copy)]
pub struct CoverSource {
    pub selector: &'static str,
    pub attrs: &'static [&'static str],
}

/// Per-site markup layout for pages that embed direct media URLs in
/// `<audio>`/`<source>` tags.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub title_selectors: &'static [&'static str],
    pub order: HeadingOrder,
    /// Trailing noise removed from the heading before it is split.
    pub suffix: &'static str,
    /// Separator between author and title; only the first occurrence splits.
    pub separator: &'static str,
    pub covers: &'static [CoverSource],
    /// Media selectors; the first one with any match wins.
    pub media: &'static [&'static str],
    /// Drop `?_=1`-style cache busters from media URLs.
    pub strip_query: bool,
    /// `(selector, attribute)` of a date whose leading year is used.
    pub year: Option<(&'static str, &'static str)>,
    /// Send browser-like headers with every chapter request.
    pub browser_headers: bool,
}

const OG_IMAGE: CoverSource = CoverSource {
    selector: r#"meta[property="og:image"]"#,
    attrs: &["content"],
};

pub fn layout(site: Site) -> Option<Layout> {
    let layout = match site {
        Site::GoldenAudiobook => Layout {
            title_selectors: &["h1.title-page"],
            order: HeadingOrder::AuthorFirst,
            suffix: r"(?i)\s*\bAudiobook\b",
            separator: r"\s*\u{2013}\s*",
            covers: &[CoverSource {
                selector: "figure.wp-caption img",
                attrs: &["src"],
            }],
            media: &["audio.wp-audio-shortcode"],
            strip_query: false,
            year: Some(("time.entry-date", "datetime")),
            browser_headers: true,
        },
        Site::FullLengthAudiobooks => Layout {
            title_selectors: &["h1.entry-title.post-title"],
            order: HeadingOrder::AuthorFirst,
            suffix: r"(?i)\s*(Audiobook\s*Free|Audio Book Online|Audiobook|Free)$",
            separator: r"\s*[-\u{2013}]\s*",
            covers: &[CoverSource {
                selector: ".wp-caption img",
                attrs: &["src"],
            }],
            media: &[r#".entry source[type="audio/mpeg"]"#],
            strip_query: true,
            year: None,
            browser_headers: false,
        },
        Site::HdAudiobooks => Layout {
            title_selectors: &[r#"h1[itemprop="headline"]"#, "h1"],
            order: HeadingOrder::TitleFirst,
            suffix: r"(?i)\s*(\(AUDIOBOOK\)|&#8217;s)$",
            separator: r"\s*[-\u{2013}]\s*",
            covers: &[
                CoverSource {
                    selector: r#"img[itemprop="image"]"#,
                    attrs: &["src"],
                },
                OG_IMAGE,
            ],
            media: &[
                r#".entry source[type="audio/mpeg"]"#,
                r#".entry-box source[type="audio/mpeg"]"#,
            ],
            strip_query: true,
            year: None,
            browser_headers: false,
        },
        Site::BigAudiobooks => Layout {
            title_selectors: &["h1.title-page", "h1"],
            order: HeadingOrder::AuthorFirst,
            suffix: r"(?i)\s*(Audiobook|Audio Book|Free)$",
            separator: r"\s*[-\u{2013}]\s*",
            covers: &[
                CoverSource {
                    selector: ".wp-caption img",
                    attrs: &["data-lazy-src", "src"],
                },
                OG_IMAGE,
            ],
            media: &[r#".post-single source[type="audio/mpeg"]"#],
            strip_query: true,
            year: None,
            browser_headers: false,
        },
        Site::Tokybook | Site::Zaudiobooks => return None,
    };
    Some(layout)
}

struct HeadingPatterns {
    suffix: Regex,
    separator: Regex,
}

/// Heading patterns of every layout, compiled once.
static HEADING_PATTERNS: LazyLock<HashMap<Site, HeadingPatterns>> = LazyLock::new(|| {
    [
        Site::GoldenAudiobook,
        Site::FullLengthAudiobooks,
        Site::HdAudiobooks,
        Site::BigAudiobooks,
    ]
    .into_iter()
    .filter_map(|site| {
        let layout = layout(site)?;
        let patterns = HeadingPatterns {
            suffix: Regex::new(layout.suffix).expect("valid regex"),
            separator: Regex::new(layout.separator).expect("valid regex"),
        };
        Some((site, patterns))
    })
    .collect()
});

/// goldenaudiobook.net, fulllengthaudiobooks.net, hdaudiobooks.net and
/// bigaudiobooks.net. Chapters are numbered by document order of the media tags.
#[derive(Debug, Clone)]
pub struct EmbeddedMediaExtractor {
    site: Site,
    base_url: String,
}

impl EmbeddedMediaExtractor {
    pub fn new(site: Site) -> Self {
        Self {
            site,
            base_url: site.base_url(),
        }
    }

    pub fn parse_book_page(&self, html: &str, book_url: &str, user_agent: &str) -> Result<BookData> {
        let layout = layout(self.site)
            .with_context(|| format!("{} pages have no embedded media layout", self.site))?;
        let document = Html::parse_document(html);

        let heading = layout
            .title_selectors
            .iter()
            .find_map(|sel| first_text(&document, sel))
            .context("Could not find the book heading")?;
        let (title, author) = split_heading(self.site, &layout, &heading);
        anyhow::ensure!(!title.is_empty(), "Empty book title in heading {heading:?}");

        let cover_url = layout
            .covers
            .iter()
            .find_map(|cover| first_attr(&document, cover.selector, cover.attrs))
            .and_then(|src| resolve_url(&self.base_url, &src));

        let year = layout.year.and_then(|(selector, attr)| {
            let date = first_attr(&document, selector, &[attr])?;
            normalize_year(&date.chars().take(4).collect::<String>())
        });

        let urls = media_urls(&document, &layout);
        tracing::info!(chapters = urls.len(), site = %self.site, "Found embedded media");

        let chapters = urls
            .into_iter()
            .enumerate()
            .map(|(i, url)| Chapter::numbered(i + 1, url))
            .collect();

        let mut book = BookData::new(self.site, &title, book_url, chapters)?
            .with_cover_url(cover_url)
            .with_credits(Credits {
                author,
                narrator: None,
                year,
            })
            .with_credits(detail_credits(&document));

        if layout.browser_headers {
            book = book.with_site_headers(browser_headers(&self.base_url, user_agent));
        }
        Ok(book)
    }
}

#[async_trait]
impl Extractor for EmbeddedMediaExtractor {
    fn site(&self) -> Site {
        self.site
    }

    async fn fetch_book_data(&self, session: &HttpSession, url: &str) -> Result<BookData> {
        tracing::info!(url = %url, site = %self.site, "Fetching book page");
        let headers = BTreeMap::from([("Referer".to_string(), url.to_string())]);
        let html = session.fetch_page(url, &headers).await?;
        tracing::debug!(bytes = html.len(), "Received HTML");
        self.parse_book_page(&html, url, session.user_agent())
    }
}

/// Strip the site's suffix, then split `A - B` once into `(title, author)`.
fn split_heading(site: Site, layout: &Layout, heading: &str) -> (String, Option<String>) {
    let Some(patterns) = HEADING_PATTERNS.get(&site) else {
        return (heading.trim().to_string(), None);
    };

    let cleaned = patterns.suffix.replace_all(heading.trim(), "");
    let cleaned = cleaned.trim();

    let mut parts = patterns.separator.splitn(cleaned, 2).map(str::trim);
    match (parts.next(), parts.next()) {
        (Some(first), Some(second)) if !first.is_empty() && !second.is_empty() => {
            match layout.order {
                HeadingOrder::AuthorFirst => (second.to_string(), Some(first.to_string())),
                HeadingOrder::TitleFirst => (first.to_string(), Some(second.to_string())),
            }
        }
        _ => (cleaned.to_string(), None),
    }
}

fn media_urls(document: &Html, layout: &Layout) -> Vec<String> {
    let source_sel = Selector::parse("source[src]").expect("valid selector");

    for media in layout.media {
        let sel = Selector::parse(media).expect("valid selector");
        let urls: Vec<String> = document
            .select(&sel)
            .filter_map(|el| media_src(&el, &source_sel))
            .map(|src| {
                if layout.strip_query {
                    strip_query(&src).to_string()
                } else {
                    src
                }
            })
            .collect();
        if !urls.is_empty() {
            return urls;
        }
    }
    Vec::new()
}

/// An `<audio>` element's own `src` or its first `<source src>`; a `<source>`'s `src`.
fn media_src(el: &ElementRef<'_>, source_sel: &Selector) -> Option<String> {
    let own = el.value().attr("src").map(str::trim).filter(|s| !s.is_empty());
    if el.value().name() != "audio" {
        return own.map(str::to_string);
    }
    el.select(source_sel)
        .filter_map(|s| s.value().attr("src"))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .or(own)
        .map(str::to_string)
}

fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(head, _)| head)
}

fn browser_headers(base_url: &str, user_agent: &str) -> [(String, String); 6] {
    [
        ("Referer".into(), base_url.into()),
        ("User-Agent".into(), user_agent.into()),
        ("Accept".into(), "*/*".into()),
        ("Accept-Language".into(), "en-US,en;q=0.9".into()),
        ("Accept-Encoding".into(), "identity;q=1, *;q=0".into()),
        ("Range".into(), "bytes=0-".into()),
    ]
}
