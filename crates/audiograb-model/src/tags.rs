use crate::book::{numbered_title, Artwork, BookData};

/// Genre written on every chapter.
pub const AUDIOBOOK_GENRE: &str = "Audiobook";

/// The literal tag fields written into one chapter file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTags<'a> {
    pub album: String,
    pub genre: &'static str,
    /// `"{index}/{total}"`.
    pub track: String,
    pub title: String,
    pub artist: Option<String>,
    pub album_artist: Option<String>,
    pub year: Option<String>,
    pub cover: Option<&'a Artwork>,
}

impl<'a> TrackTags<'a> {
    /// Tags for the chapter at 1-based `index`; `None` when the index is out of range.
    pub fn for_chapter(book: &'a BookData, index: usize) -> Option<Self> {
        let chapter = book.chapters.get(index.checked_sub(1)?)?;
        let title = if chapter.title.trim().is_empty() {
            numbered_title(index)
        } else {
            chapter.title.clone()
        };

        Some(Self {
            album: book.title.clone(),
            genre: AUDIOBOOK_GENRE,
            track: track_number(index, book.chapter_count()),
            title,
            artist: book.author.clone(),
            album_artist: book.narrator.clone(),
            year: book.year.clone(),
            cover: book.artwork.as_ref(),
        })
    }
}

pub fn track_number(index: usize, total: usize) -> String {
    format!("{index}/{total}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Chapter, Site};

    fn book(n: usize) -> BookData {
        let chapters = (1..=n)
            .map(|i| Chapter::numbered(i, format!("https://example.com/{i}.mp3")))
            .collect();
        BookData::new(Site::GoldenAudiobook, "Red Rising", "https://goldenaudiobook.net/rr/", chapters)
            .unwrap()
    }

    #[test]
    fn test_track_number_literal() {
        assert_eq!(track_number(3, 12), "3/12");
    }

    #[test]
    fn test_for_chapter_fields() {
        let mut book = book(12);
        book.author = Some("Pierce Brown".into());
        book.year = Some("2014".into());

        let tags = TrackTags::for_chapter(&book, 3).unwrap();
        assert_eq!(tags.album, "Red Rising");
        assert_eq!(tags.genre, "Audiobook");
        assert_eq!(tags.track, "3/12");
        assert_eq!(tags.title, "Chapter 003");
        assert_eq!(tags.artist.as_deref(), Some("Pierce Brown"));
        assert_eq!(tags.album_artist, None);
        assert_eq!(tags.year.as_deref(), Some("2014"));
        assert!(tags.cover.is_none());
    }

    #[test]
    fn test_for_chapter_out_of_range() {
        let book = book(2);
        assert!(TrackTags::for_chapter(&book, 0).is_none());
        assert!(TrackTags::for_chapter(&book, 3).is_none());
    }

    #[test]
    fn test_cover_is_borrowed() {
        let mut book = book(1);
        book.artwork = Some(Artwork {
            bytes: vec![1, 2, 3],
            mime_type: "image/png".into(),
        });
        let tags = TrackTags::for_chapter(&book, 1).unwrap();
        assert_eq!(tags.cover.map(|c| c.mime_type.as_str()), Some("image/png"));
    }
}
