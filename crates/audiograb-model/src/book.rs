use crate::credits::{normalize_year, Credits};
use crate::sanitize::sanitize_filename;
use crate::site::Site;
use crate::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A normalized audiobook: metadata plus the ordered chapter list, independent
/// of the site it was scraped from.
///
/// `chapters` keeps the source's track order. Nothing downstream reorders it;
/// the 1-based position drives the track tag and the on-disk name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookData {
    pub site: Site,
    /// Filesystem-safe title, also the name of the book's directory.
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrator: Option<String>,
    /// Four-digit year when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    /// Cover image bytes, filled in by metadata reconciliation.
    #[serde(skip)]
    pub artwork: Option<Artwork>,
    pub book_url: String,
    /// Site-specific request headers the chapter fetcher has to send.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub site_headers: BTreeMap<String, String>,
    pub chapters: Vec<Chapter>,
}

/// One addressable unit of audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Display name and on-disk file stem, unique within its book.
    pub title: String,
    /// Direct media URL, or the playlist URL for segmented sites.
    pub url: String,
    /// Raw request path, used to rebuild per-request headers at fetch time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

/// Downloaded cover art. Bytes and media type are always set together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Chapter {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            src: None,
        }
    }

    /// A chapter named by its 1-based position: `Chapter 007`.
    pub fn numbered(index: usize, url: impl Into<String>) -> Self {
        Self::new(numbered_title(index), url)
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }
}

/// `Chapter NNN`, zero-padded to three digits.
pub fn numbered_title(index: usize) -> String {
    format!("Chapter {index:03}")
}

impl BookData {
    /// Assemble a book from scraped parts.
    ///
    /// Sanitizes the book and chapter titles, makes chapter titles unique and
    /// rejects an empty chapter list.
    pub fn new(
        site: Site,
        raw_title: &str,
        book_url: impl Into<String>,
        chapters: Vec<Chapter>,
    ) -> Result<Self, ModelError> {
        if chapters.is_empty() {
            return Err(ModelError::NoChapters(site));
        }

        Ok(Self {
            site,
            title: sanitize_filename(raw_title),
            author: None,
            narrator: None,
            year: None,
            cover_url: None,
            artwork: None,
            book_url: book_url.into(),
            site_headers: BTreeMap::new(),
            chapters: unique_chapter_titles(chapters),
        })
    }

    /// Fill author/narrator/year from credits; fields already set are only
    /// replaced when the credits carry a value.
    pub fn with_credits(mut self, credits: Credits) -> Self {
        self.author = non_empty(credits.author).or(self.author);
        self.narrator = non_empty(credits.narrator).or(self.narrator);
        self.year = credits.year.or(self.year);
        self
    }

    pub fn with_cover_url(mut self, cover_url: Option<String>) -> Self {
        self.cover_url = non_empty(cover_url);
        self
    }

    pub fn with_site_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.site_headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Replace the title, keeping it filesystem-safe.
    pub fn set_title(&mut self, raw_title: &str) {
        self.title = sanitize_filename(raw_title);
    }

    /// Replace the year, normalizing two-digit and date-shaped input.
    pub fn set_year(&mut self, raw_year: &str) {
        let trimmed = raw_year.trim();
        self.year = if trimmed.is_empty() {
            None
        } else {
            Some(normalize_year(trimmed).unwrap_or_else(|| trimmed.to_string()))
        };
    }

    pub fn artwork_bytes(&self) -> Option<&[u8]> {
        self.artwork.as_ref().map(|a| a.bytes.as_slice())
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.artwork.as_ref().map(|a| a.mime_type.as_str())
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Sanitize chapter titles and suffix duplicates with their 1-based position.
fn unique_chapter_titles(chapters: Vec<Chapter>) -> Vec<Chapter> {
    let sanitized: Vec<Chapter> = chapters
        .into_iter()
        .enumerate()
        .map(|(i, mut chapter)| {
            chapter.title = if chapter.title.trim().is_empty() {
                numbered_title(i + 1)
            } else {
                sanitize_filename(&chapter.title)
            };
            chapter
        })
        .collect();

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for chapter in &sanitized {
        *counts.entry(chapter.title.to_lowercase()).or_default() += 1;
    }

    let mut taken: HashSet<String> = HashSet::new();
    sanitized
        .into_iter()
        .enumerate()
        .map(|(i, mut chapter)| {
            let duplicated = counts[&chapter.title.to_lowercase()] > 1;
            if duplicated || taken.contains(&chapter.title.to_lowercase()) {
                let base = chapter.title.clone();
                let mut candidate = format!("{base} ({})", i + 1);
                let mut bump = 1;
                while taken.contains(&candidate.to_lowercase()) {
                    candidate = format!("{base} ({}-{bump})", i + 1);
                    bump += 1;
                }
                chapter.title = candidate;
            }
            taken.insert(chapter.title.to_lowercase());
            chapter
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapters(titles: &[&str]) -> Vec<Chapter> {
        titles
            .iter()
            .enumerate()
            .map(|(i, t)| Chapter::new(*t, format!("https://example.com/{i}.mp3")))
            .collect()
    }

    #[test]
    fn test_numbered_title_is_zero_padded() {
        assert_eq!(numbered_title(7), "Chapter 007");
        assert_eq!(numbered_title(123), "Chapter 123");
        assert_eq!(Chapter::numbered(1, "u").title, "Chapter 001");
    }

    #[test]
    fn test_new_rejects_empty_chapter_list() {
        let err = BookData::new(Site::Zaudiobooks, "Title", "https://zaudiobooks.com/x", vec![]);
        assert!(matches!(err, Err(ModelError::NoChapters(Site::Zaudiobooks))));
    }

    #[test]
    fn test_new_sanitizes_title() {
        let book = BookData::new(
            Site::GoldenAudiobook,
            "Dune: The Machine Crusade",
            "https://goldenaudiobook.net/dune/",
            chapters(&["Chapter 001"]),
        )
        .unwrap();
        assert_eq!(book.title, "Dune - The Machine Crusade");
    }

    #[test]
    fn test_duplicate_chapter_titles_are_disambiguated_in_order() {
        let book = BookData::new(
            Site::Tokybook,
            "Book",
            "https://tokybook.com/post/book",
            chapters(&["Intro", "Part One", "intro", "", "Part Two"]),
        )
        .unwrap();
        let titles: Vec<&str> = book.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["Intro (1)", "Part One", "intro (3)", "Chapter 004", "Part Two"]);
        assert_eq!(book.chapters[2].url, "https://example.com/2.mp3");
    }

    #[test]
    fn test_disambiguation_avoids_existing_names() {
        let book = BookData::new(
            Site::Tokybook,
            "Book",
            "https://tokybook.com/post/book",
            chapters(&["A (2)", "A", "A"]),
        )
        .unwrap();
        let titles: Vec<&str> = book.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["A (2)", "A (2-1)", "A (3)"]);
    }

    #[test]
    fn test_with_credits_keeps_existing_when_absent() {
        let book = BookData::new(Site::GoldenAudiobook, "T", "u", chapters(&["c"]))
            .unwrap()
            .with_credits(Credits {
                author: Some("Andy Weir".into()),
                narrator: None,
                year: Some("2021".into()),
            })
            .with_credits(Credits {
                author: None,
                narrator: Some("Ray Porter".into()),
                year: None,
            });
        assert_eq!(book.author.as_deref(), Some("Andy Weir"));
        assert_eq!(book.narrator.as_deref(), Some("Ray Porter"));
        assert_eq!(book.year.as_deref(), Some("2021"));
    }

    #[test]
    fn test_set_year_normalizes() {
        let mut book = BookData::new(Site::GoldenAudiobook, "T", "u", chapters(&["c"])).unwrap();
        book.set_year("17");
        assert_eq!(book.year.as_deref(), Some("2017"));
        book.set_year("sometime");
        assert_eq!(book.year.as_deref(), Some("sometime"));
        book.set_year("");
        assert_eq!(book.year, None);
    }

    #[test]
    fn test_artwork_accessors() {
        let mut book = BookData::new(Site::GoldenAudiobook, "T", "u", chapters(&["c"])).unwrap();
        assert!(book.artwork_bytes().is_none());
        book.artwork = Some(Artwork {
            bytes: vec![0xff, 0xd8],
            mime_type: "image/jpeg".into(),
        });
        assert_eq!(book.artwork_bytes(), Some(&[0xff, 0xd8][..]));
        assert_eq!(book.mime_type(), Some("image/jpeg"));
    }

    #[test]
    fn test_json_omits_artwork_and_empty_fields() {
        let mut book = BookData::new(Site::Tokybook, "T", "u", chapters(&["c"])).unwrap();
        book.artwork = Some(Artwork {
            bytes: vec![1],
            mime_type: "image/png".into(),
        });
        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(json["site"], "tokybook");
        assert!(json.get("artwork").is_none());
        assert!(json.get("author").is_none());
        assert!(json.get("site_headers").is_none());
        assert_eq!(json["chapters"][0]["title"], "c");
    }
}
