use crate::ModelError;
use std::collections::BTreeMap;
use url::Url;

pub const AUDIOBOOK_ID_HEADER: &str = "x-audiobook-id";
pub const STREAM_TOKEN_HEADER: &str = "x-stream-token";
pub const TRACK_SRC_HEADER: &str = "x-track-src";

/// Credentials issued by a two-stage playlist API, needed on every media request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAuth {
    pub book_id: String,
    pub stream_token: String,
}

impl StreamAuth {
    /// Recover the credentials an extractor stored in `BookData::site_headers`.
    pub fn from_site_headers(headers: &BTreeMap<String, String>) -> Result<Self, ModelError> {
        let book_id = headers
            .get(AUDIOBOOK_ID_HEADER)
            .ok_or(ModelError::MissingStreamCredential(AUDIOBOOK_ID_HEADER))?;
        let stream_token = headers
            .get(STREAM_TOKEN_HEADER)
            .ok_or(ModelError::MissingStreamCredential(STREAM_TOKEN_HEADER))?;
        Ok(Self {
            book_id: book_id.clone(),
            stream_token: stream_token.clone(),
        })
    }

    pub fn headers_for(&self, request_url: &Url) -> BTreeMap<String, String> {
        track_headers(request_url, &self.book_id, &self.stream_token)
    }
}

/// Headers for one media request: the book ID, the stream token and the
/// request's own (percent-encoded) URL path.
///
/// The path header differs for the playlist and for every segment, so this
/// must be called per request and never cached.
pub fn track_headers(
    request_url: &Url,
    book_id: &str,
    stream_token: &str,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (AUDIOBOOK_ID_HEADER.to_string(), book_id.to_string()),
        (STREAM_TOKEN_HEADER.to_string(), stream_token.to_string()),
        (TRACK_SRC_HEADER.to_string(), request_url.path().to_string()),
    ])
}
