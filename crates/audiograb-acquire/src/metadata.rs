use crate::http::SHORT_REQUEST_TIMEOUT;
use crate::HttpSession;
use anyhow::{Context, Result};
use audiograb_model::{Artwork, BookData};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// The scraped fields offered for review, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataField {
    Title,
    Author,
    Narrator,
    Year,
    CoverUrl,
}

impl MetadataField {
    pub const ALL: [MetadataField; 5] = [
        MetadataField::Title,
        MetadataField::Author,
        MetadataField::Narrator,
        MetadataField::Year,
        MetadataField::CoverUrl,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MetadataField::Title => "Title",
            MetadataField::Author => "Author",
            MetadataField::Narrator => "Narrator",
            MetadataField::Year => "Year",
            MetadataField::CoverUrl => "Cover Url",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            MetadataField::Title => "title",
            MetadataField::Author => "author",
            MetadataField::Narrator => "narrator",
            MetadataField::Year => "year",
            MetadataField::CoverUrl => "cover_url",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL.into_iter().find(|field| field.key() == key)
    }

    pub fn current(self, book: &BookData) -> Option<&str> {
        match self {
            MetadataField::Title => Some(book.title.as_str()),
            MetadataField::Author => book.author.as_deref(),
            MetadataField::Narrator => book.narrator.as_deref(),
            MetadataField::Year => book.year.as_deref(),
            MetadataField::CoverUrl => book.cover_url.as_deref(),
        }
    }
}

/// Source of metadata corrections: a person at a terminal or a script.
pub trait OverrideProvider {
    /// Look at the scraped values and decide whether to edit any of them.
    fn review(&mut self, _book: &BookData) -> Result<bool> {
        Ok(true)
    }

    /// A replacement for `field`, or `None` (or an empty string) to keep `current`.
    fn replacement(&mut self, field: MetadataField, current: Option<&str>) -> Result<Option<String>>;
}

/// Keeps every scraped value.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeepScraped;

impl OverrideProvider for KeepScraped {
    fn review(&mut self, _book: &BookData) -> Result<bool> {
        Ok(false)
    }

    fn replacement(&mut self, _field: MetadataField, _current: Option<&str>) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Fixed `field=value` replacements, e.g. from the command line.
#[derive(Debug, Default, Clone)]
pub struct ScriptedOverrides {
    values: BTreeMap<MetadataField, String>,
}

impl ScriptedOverrides {
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values = BTreeMap::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("Expected field=value, got {pair:?}"))?;
            let field = MetadataField::from_key(key)
                .with_context(|| format!("Unknown metadata field: {key}"))?;
            values.insert(field, value.trim().to_string());
        }
        Ok(Self { values })
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl OverrideProvider for ScriptedOverrides {
    fn review(&mut self, _book: &BookData) -> Result<bool> {
        Ok(!self.values.is_empty())
    }

    fn replacement(&mut self, field: MetadataField, _current: Option<&str>) -> Result<Option<String>> {
        Ok(self.values.get(&field).cloned())
    }
}

/// Plain-text table of the reviewable fields.
pub fn review_table(book: &BookData) -> String {
    let mut table = String::from("Scraped Book Details\n");
    for field in MetadataField::ALL {
        let _ = writeln!(
            table,
            "  {:<10} {}",
            field.label(),
            field.current(book).unwrap_or("N/A")
        );
    }
    let _ = writeln!(table, "  {:<10} {}", "Chapters", book.chapter_count());
    table
}

/// Offer every field to `provider` and apply the replacements it returns.
pub fn apply_overrides(book: &mut BookData, provider: &mut dyn OverrideProvider) -> Result<()> {
    if !provider.review(book)? {
        return Ok(());
    }

    for field in MetadataField::ALL {
        let current = field.current(book).map(str::to_string);
        let Some(value) = provider.replacement(field, current.as_deref())? else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        tracing::info!(field = field.key(), value = %value, "Overriding metadata");
        match field {
            MetadataField::Title => book.set_title(value),
            MetadataField::Author => book.author = Some(value.to_string()),
            MetadataField::Narrator => book.narrator = Some(value.to_string()),
            MetadataField::Year => book.set_year(value),
            MetadataField::CoverUrl => book.cover_url = Some(value.to_string()),
        }
    }
    Ok(())
}

/// Download cover art. The response must declare an `image/*` content type.
pub async fn fetch_cover(session: &HttpSession, url: &str) -> Result<Artwork> {
    let response = session
        .client()
        .get(url)
        .timeout(SHORT_REQUEST_TIMEOUT)
        .send()
        .await
        .with_context(|| format!("Failed to fetch cover {url}"))?;

    let status = response.status();
    anyhow::ensure!(status.is_success(), "HTTP {status} for {url}");

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let mime_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    anyhow::ensure!(
        mime_type.starts_with("image/"),
        "Cover URL did not point to an image (Content-Type: {content_type:?})"
    );

    let bytes = response.bytes().await.context("Failed to read cover body")?;
    Ok(Artwork {
        bytes: bytes.to_vec(),
        mime_type,
    })
}

/// Apply overrides, then try to attach cover art.
///
/// A failed or non-image cover download is logged and leaves the book without
/// artwork; it never fails reconciliation.
pub async fn reconcile(
    mut book: BookData,
    session: &HttpSession,
    provider: &mut dyn OverrideProvider,
) -> Result<BookData> {
    apply_overrides(&mut book, provider)?;

    book.artwork = None;
    if let Some(url) = book.cover_url.clone() {
        tracing::info!(url = %url, "Downloading cover art");
        match fetch_cover(session, &url).await {
            Ok(artwork) => {
                tracing::info!(bytes = artwork.bytes.len(), mime = %artwork.mime_type, "Cover art ready");
                book.artwork = Some(artwork);
            }
            Err(e) => tracing::warn!(url = %url, "Could not download cover art: {e:#}"),
        }
    }
    Ok(book)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpConfig;
    use audiograb_model::{Chapter, Site};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn book() -> BookData {
        BookData::new(
            Site::GoldenAudiobook,
            "Red Rising",
            "https://goldenaudiobook.net/red-rising/",
            vec![Chapter::numbered(1, "https://example.com/1.mp3")],
        )
        .unwrap()
    }

    struct Answers(Vec<&'static str>, Vec<Option<String>>);

    impl OverrideProvider for Answers {
        fn replacement(&mut self, _field: MetadataField, current: Option<&str>) -> Result<Option<String>> {
            self.1.push(current.map(str::to_string));
            Ok(Some(self.0.remove(0).to_string()))
        }
    }

    #[test]
    fn test_field_keys() {
        assert_eq!(MetadataField::from_key("cover-url"), Some(MetadataField::CoverUrl));
        assert_eq!(MetadataField::from_key("YEAR"), Some(MetadataField::Year));
        assert_eq!(MetadataField::from_key("genre"), None);
    }

    #[test]
    fn test_empty_answers_keep_values() {
        let mut book = book();
        book.author = Some("Pierce Brown".into());
        let mut answers = Answers(vec!["", "", "Tim Gerard Reynolds", "14", ""], Vec::new());

        apply_overrides(&mut book, &mut answers).unwrap();

        assert_eq!(book.title, "Red Rising");
        assert_eq!(book.author.as_deref(), Some("Pierce Brown"));
        assert_eq!(book.narrator.as_deref(), Some("Tim Gerard Reynolds"));
        assert_eq!(book.year.as_deref(), Some("2014"));
        assert_eq!(book.cover_url, None);
        assert_eq!(answers.1[0].as_deref(), Some("Red Rising"));
        assert_eq!(answers.1[2], None);
    }

    #[test]
    fn test_scripted_title_is_resanitized() {
        let mut book = book();
        let mut overrides = ScriptedOverrides::from_pairs(["title=Golden Son: Book 2"]).unwrap();
        apply_overrides(&mut book, &mut overrides).unwrap();
        assert_eq!(book.title, "Golden Son - Book 2");
    }

    #[test]
    fn test_scripted_rejects_unknown_field() {
        assert!(ScriptedOverrides::from_pairs(["genre=Fantasy"]).is_err());
        assert!(ScriptedOverrides::from_pairs(["no-equals"]).is_err());
    }

    #[test]
    fn test_keep_scraped_skips_review() {
        let mut book = book();
        apply_overrides(&mut book, &mut KeepScraped).unwrap();
        assert_eq!(book.title, "Red Rising");
    }

    #[test]
    fn test_review_table_lists_fields() {
        let table = review_table(&book());
        assert!(table.contains("Title      Red Rising"));
        assert!(table.contains("Narrator   N/A"));
        assert!(table.contains("Chapters   1"));
    }

    #[tokio::test]
    async fn test_cover_with_html_content_type_is_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cover.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<html>blocked</html>"),
            )
            .mount(&server)
            .await;

        let session = HttpSession::new(&HttpConfig::default()).unwrap();
        let book = book().with_cover_url(Some(format!("{}/cover.jpg", server.uri())));

        let book = reconcile(book, &session, &mut KeepScraped).await.unwrap();
        assert!(book.artwork.is_none());
        assert!(book.mime_type().is_none());
    }

    #[tokio::test]
    async fn test_cover_image_is_attached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cover.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
            )
            .mount(&server)
            .await;

        let session = HttpSession::new(&HttpConfig::default()).unwrap();
        let book = book().with_cover_url(Some(format!("{}/cover.png", server.uri())));

        let book = reconcile(book, &session, &mut KeepScraped).await.unwrap();
        assert_eq!(book.mime_type(), Some("image/png"));
        assert_eq!(book.artwork_bytes(), Some(&[0x89, b'P', b'N', b'G'][..]));
    }

    #[tokio::test]
    async fn test_unreachable_cover_is_not_fatal() {
        let session = HttpSession::new(&HttpConfig::default()).unwrap();
        let book = book().with_cover_url(Some("http://127.0.0.1:9/cover.jpg".into()));
        let book = reconcile(book, &session, &mut KeepScraped).await.unwrap();
        assert!(book.artwork.is_none());
    }
}
